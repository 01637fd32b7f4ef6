//! Loader configuration
//!
//! Values are layered, later layers winning:
//!
//! 1. Built-in defaults (four device types on `127.0.0.1:33013..33016`)
//! 2. The optional TOML file given with `--config`
//! 3. Command-line flags and their `APPSLOAD_*` environment variables
//!
//! Example file:
//!
//! ```toml
//! pattern = "/data/appsinstalled/*.tsv.gz"
//! workers = 4
//! timeout_ms = 1500
//!
//! [routes]
//! idfa = "10.0.0.1:11211"
//! imei = "10.0.0.5:11211"
//! ```

use crate::cli::Cli;
use crate::processor::DEFAULT_CHUNK_SIZE;
use crate::routing::RouteTable;
use crate::writer::MemcacheSettings;
use appsload_common::{LoadError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_PATTERN: &str = "/data/appsinstalled/*.tsv.gz";

pub const DEFAULT_ROUTES: [(&str, &str); 4] = [
    ("idfa", "127.0.0.1:33013"),
    ("gaid", "127.0.0.1:33014"),
    ("adid", "127.0.0.1:33015"),
    ("dvid", "127.0.0.1:33016"),
];

/// Contents of the `--config` file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub pattern: Option<String>,
    pub dry_run: Option<bool>,
    pub log: Option<PathBuf>,
    pub workers: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub max_idle: Option<usize>,
    pub chunk_size: Option<usize>,
    pub routes: BTreeMap<String, String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            LoadError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&text)
            .map_err(|e| LoadError::config(format!("{}: {e}", path.display())))
    }

    pub fn parse(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub pattern: String,
    pub dry_run: bool,
    pub log_file: Option<PathBuf>,
    pub workers: usize,
    pub chunk_size: usize,
    pub memcache: MemcacheSettings,
    pub routes: RouteTable,
}

impl LoaderConfig {
    /// Resolve from the command line, reading `--config` if given
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let file = match cli.config.as_deref() {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(cli, file)
    }

    pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Self> {
        let mut routes: BTreeMap<String, String> = DEFAULT_ROUTES
            .iter()
            .map(|(device_type, addr)| (device_type.to_string(), addr.to_string()))
            .collect();
        routes.extend(file.routes);

        let named = [
            ("idfa", &cli.idfa),
            ("gaid", &cli.gaid),
            ("adid", &cli.adid),
            ("dvid", &cli.dvid),
        ];
        for (device_type, addr) in named {
            if let Some(addr) = addr {
                routes.insert(device_type.to_string(), addr.clone());
            }
        }
        routes.extend(cli.routes.iter().cloned());

        let workers = cli.workers.or(file.workers).unwrap_or(1);
        if workers == 0 {
            return Err(LoadError::config("workers must be at least 1"));
        }

        let chunk_size = file.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(LoadError::config("chunk_size must be at least 1"));
        }

        let defaults = MemcacheSettings::default();
        let memcache = MemcacheSettings {
            timeout_ms: cli.timeout_ms.or(file.timeout_ms).unwrap_or(defaults.timeout_ms),
            max_idle: file.max_idle.unwrap_or(defaults.max_idle),
        };
        if memcache.timeout_ms == 0 {
            return Err(LoadError::config("timeout_ms must be positive"));
        }

        Ok(Self {
            pattern: cli
                .pattern
                .clone()
                .or(file.pattern)
                .unwrap_or_else(|| DEFAULT_PATTERN.to_string()),
            dry_run: cli.dry || file.dry_run.unwrap_or(false),
            log_file: cli.log.clone().or(file.log),
            workers,
            chunk_size,
            memcache,
            routes: RouteTable::builder().routes(routes).build()?,
        })
    }
}
