//! # Installer image download ingestion
//!
//! Walks a directory of mirror access logs, counts the installer image
//! downloads in each file with [iso_downloads_logs] and loads the results
//! into InfluxDB through [iso_downloads_influxdb].
//!
//! Every log file belongs to one [LogUnit] (server, mirror and date). A unit
//! that was already loaded is skipped without reading the file, which makes
//! repeated runs over the same directory safe.

pub mod config;
mod discover;
mod ingest;
mod pipeline;
mod reader;
mod unit;
pub mod util;

pub use crate::config::{Config, InfluxDbConfig};
pub use crate::discover::discover_log_files;
pub use crate::ingest::{Ingestor, RunSummary, Stores};
pub use crate::pipeline::process_unit;
pub use crate::reader::{BoxedLogStream, FileLogReader, LogReader};
pub use crate::unit::{LogUnit, is_access_log};
