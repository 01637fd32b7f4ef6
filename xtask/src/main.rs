//! Build automation tasks for appsload
//!
//! - `generate-cli-docs`: render the `appsload` command reference from the
//!   clap definitions

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for appsload", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<appsload_ingest::cli::Cli>();

    let content = format!(
        r#"# appsload CLI Reference

Generated from the CLI source code. Last updated: {}.

## Overview

`appsload` reads gzipped TSV logs of installed apps per device, encodes each
record as a `UserApps` protobuf message and stores it in memcached under
`<device_type>:<device_id>`. Each device type is routed to its own memcached
instance. A file is renamed to `.<name>` once it has been read to the end, so
re-running over the same directory skips it.

## Quick Start

```bash
# Verify the envelope encoder
appsload --test

# Preview what would be written, without touching memcached
appsload --dry --pattern '/data/appsinstalled/*.tsv.gz'

# Load into non-default backends, four files at a time
appsload --idfa 10.0.0.1:11211 --gaid 10.0.0.2:11211 --workers 4
```

## Commands

{}

## Environment Variables

- `APPSLOAD_PATTERN`, `APPSLOAD_DRY`, `APPSLOAD_LOG`, `APPSLOAD_CONFIG`,
  `APPSLOAD_WORKERS`, `APPSLOAD_TIMEOUT_MS` - same as the flags
- `APPSLOAD_IDFA`, `APPSLOAD_GAID`, `APPSLOAD_ADID`, `APPSLOAD_DVID` - backend addresses
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_FILE`, `LOG_ROTATION`, `LOG_FILTER`, `LOG_TARGETS` - logging overrides
- `RUST_LOG` - extra tracing filter directives

## Configuration File

```toml
pattern = "/data/appsinstalled/*.tsv.gz"
workers = 4
timeout_ms = 1500
max_idle = 4
chunk_size = 5000

[routes]
idfa = "10.0.0.1:11211"
imei = "10.0.0.5:11211"
```

Command-line flags override the file; the file overrides the built-in defaults.

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
