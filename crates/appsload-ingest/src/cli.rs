//! Command-line surface of the `appsload` binary

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "appsload")]
#[command(author, version, about = "Load gzipped device app logs into memcached")]
pub struct Cli {
    /// Check the envelope encoder against sample records and exit
    #[arg(short, long)]
    pub test: bool,

    /// Write logs to this file instead of stderr
    #[arg(short, long, env = "APPSLOAD_LOG")]
    pub log: Option<PathBuf>,

    /// Compute every write but send nothing; each one is logged at debug level
    #[arg(long, env = "APPSLOAD_DRY")]
    pub dry: bool,

    /// Glob pattern of input files [default: /data/appsinstalled/*.tsv.gz]
    #[arg(long, env = "APPSLOAD_PATTERN")]
    pub pattern: Option<String>,

    /// memcached address for idfa devices [default: 127.0.0.1:33013]
    #[arg(long, env = "APPSLOAD_IDFA")]
    pub idfa: Option<String>,

    /// memcached address for gaid devices [default: 127.0.0.1:33014]
    #[arg(long, env = "APPSLOAD_GAID")]
    pub gaid: Option<String>,

    /// memcached address for adid devices [default: 127.0.0.1:33015]
    #[arg(long, env = "APPSLOAD_ADID")]
    pub adid: Option<String>,

    /// memcached address for dvid devices [default: 127.0.0.1:33016]
    #[arg(long, env = "APPSLOAD_DVID")]
    pub dvid: Option<String>,

    /// Additional route for another device type (repeatable)
    #[arg(long = "route", value_name = "TYPE=ADDR", value_parser = parse_route)]
    pub routes: Vec<(String, String)>,

    /// TOML config file; command-line flags take precedence over it
    #[arg(short, long, env = "APPSLOAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Files processed concurrently [default: 1]
    #[arg(short, long, env = "APPSLOAD_WORKERS")]
    pub workers: Option<usize>,

    /// memcached connect and write timeout in milliseconds [default: 2000]
    #[arg(long, env = "APPSLOAD_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_route(s: &str) -> Result<(String, String), String> {
    let (device_type, addr) = s
        .split_once('=')
        .ok_or_else(|| format!("expected TYPE=ADDR, got `{s}`"))?;
    let (device_type, addr) = (device_type.trim(), addr.trim());
    if device_type.is_empty() || addr.is_empty() {
        return Err(format!("expected TYPE=ADDR, got `{s}`"));
    }
    Ok((device_type.to_string(), addr.to_string()))
}
