//! Property-based tests for line parsing, envelope encoding and the
//! completion policy.
//!
//! - Parsing arbitrary input never panics
//! - Well-formed lines keep every field, app order included
//! - Encoded payloads decode to the parsed values
//! - The verdict depends only on `errors / processed` against the limit

use proptest::prelude::*;

use appsload_ingest::envelope;
use appsload_ingest::processor::{CompletionPolicy, FileRunStats, Verdict, NORMAL_ERR_RATE};
use appsload_ingest::record::{self, ParseError, FIELD_COUNT};

fn device_type_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("idfa".to_string()),
        Just("gaid".to_string()),
        Just("adid".to_string()),
        Just("dvid".to_string()),
        "[a-z]{1,8}",
    ]
}

fn device_id_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9]{1,32}"
}

fn apps_strategy() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(any::<u32>(), 1..40)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        ..ProptestConfig::default()
    })]

    /// Property: any input yields a record or a parse error, never a panic.
    #[test]
    fn prop_parse_is_total(line in any::<String>()) {
        let _ = record::parse(&line);
    }

    /// Property: raw bytes are handled the same way.
    #[test]
    fn prop_parse_bytes_is_total(line in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = record::parse_bytes(&line);
    }

    /// Property: a well-formed line round-trips every field.
    #[test]
    fn prop_well_formed_line(
        device_type in device_type_strategy(),
        device_id in device_id_strategy(),
        lat in -90.0f64..90.0,
        lon in -180.0f64..180.0,
        apps in apps_strategy(),
    ) {
        let joined = apps.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
        let line = format!("{device_type}\t{device_id}\t{lat}\t{lon}\t{joined}");

        let parsed = record::parse(&line).unwrap();
        prop_assert_eq!(&parsed.device_type, &device_type);
        prop_assert_eq!(&parsed.device_id, &device_id);
        prop_assert_eq!(parsed.latitude, lat);
        prop_assert_eq!(parsed.longitude, lon);
        prop_assert_eq!(&parsed.apps, &apps);
        prop_assert_eq!(parsed.coerced_apps, 0);
        prop_assert!(!parsed.invalid_coords);
        prop_assert_eq!(parsed.key(), format!("{device_type}:{device_id}"));
    }

    /// Property: fewer than the required fields is always a malformed line.
    #[test]
    fn prop_short_lines_are_malformed(
        fields in prop::collection::vec("[a-z0-9.,]{1,8}", 1..FIELD_COUNT),
    ) {
        let line = fields.join("\t");
        prop_assert_eq!(
            record::parse(&line),
            Err(ParseError::MalformedLine { found: fields.len() })
        );
    }

    /// Property: the app list keeps its length when entries are coerced.
    #[test]
    fn prop_coerced_apps_keep_length(
        pieces in prop::collection::vec(prop_oneof!["[0-9]{1,5}", "[a-z]{1,4}"], 1..20),
    ) {
        let line = format!("idfa\tdev\t1\t2\t{}", pieces.join(","));
        let parsed = record::parse(&line).unwrap();

        let non_numeric = pieces.iter().filter(|p| p.parse::<u32>().is_err()).count();
        prop_assert_eq!(parsed.apps.len(), pieces.len());
        prop_assert_eq!(parsed.coerced_apps, non_numeric);
    }

    /// Property: the envelope carries exactly the parsed values.
    #[test]
    fn prop_envelope_matches_record(
        device_id in device_id_strategy(),
        lat in -90.0f64..90.0,
        lon in -180.0f64..180.0,
        apps in apps_strategy(),
    ) {
        let joined = apps.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
        let parsed = record::parse(&format!("gaid\t{device_id}\t{lat}\t{lon}\t{joined}")).unwrap();

        let bytes = envelope::encode(&parsed);
        prop_assert_eq!(envelope::encode(&parsed), bytes.clone());

        let decoded = envelope::decode(&bytes).unwrap();
        prop_assert_eq!(decoded.apps, apps);
        prop_assert_eq!(decoded.lat, Some(lat));
        prop_assert_eq!(decoded.lon, Some(lon));
    }

    /// Property: the verdict follows the error rate, exclusive at the limit.
    #[test]
    fn prop_verdict_follows_error_rate(processed in 0u64..10_000, errors in 0u64..500) {
        let stats = FileRunStats { processed, errors, ..Default::default() };
        let verdict = CompletionPolicy::default().evaluate(&stats);

        if processed == 0 {
            prop_assert_eq!(verdict, Verdict::NothingProcessed);
        } else {
            let rate = errors as f64 / processed as f64;
            prop_assert_eq!(verdict.is_success(), rate < NORMAL_ERR_RATE);
        }
    }
}
