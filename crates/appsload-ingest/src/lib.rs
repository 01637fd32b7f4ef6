//! appsload Ingest Library
//!
//! Loads gzip-compressed "apps installed" logs into memcached.
//!
//! Each line `device_type \t device_id \t lat \t lon \t app,app,...` is parsed
//! into a [`record::DeviceRecord`], routed by device type to a backend
//! ([`routing::RouteTable`]), encoded as a protobuf
//! [`envelope::UserApps`] and stored under `device_type:device_id`. When a
//! file has been read to the end its error rate is judged by the
//! [`processor::CompletionPolicy`] and the file is renamed to `.<name>`.
//!
//! # Example
//!
//! ```no_run
//! use appsload_ingest::batch::BatchDriver;
//! use appsload_ingest::cli::Cli;
//! use appsload_ingest::config::LoaderConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cli = Cli { dry: true, ..Default::default() };
//!     let config = LoaderConfig::from_cli(&cli)?;
//!     let report = BatchDriver::from_config(&config).run(&config.pattern).await?;
//!     println!("{} files loaded", report.successful());
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod batch;
pub mod cli;
pub mod config;
pub mod envelope;
pub mod processor;
pub mod record;
pub mod routing;
pub mod writer;
