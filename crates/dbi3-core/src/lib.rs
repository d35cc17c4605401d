//! # DBI3 Core Library
//!
//! Core functionality for retrieving and decoding flight logs from the DBI3
//! altimeter/variometer.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Serial protocol communication with the DBI3 command line
//! - RAD26 log identifier decoding
//! - Log catalog sync against the local log directory
//! - Log parsing into unit-converted track data and trip statistics
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbi3_core::prelude::*;
//!
//! let config = AppConfig::load(&default_config_path())?;
//!
//! // Connect to the device (port discovered by USB VID:PID)
//! let mut session = Session::open(SessionConfig::from(&config))?;
//!
//! // Download logs newer than the last one on disk
//! let catalog = LogCatalog::for_device(&config, session.serial_number());
//! let entries = catalog.list_logs(&mut session, CatalogFilter::from_config(&config), Utc::now())?;
//! catalog.download_new(&mut session, &entries)?;
//!
//! // Parse one of them
//! for log in catalog.store().list()? {
//!     let options = ConversionOptions::for_log(&log.path, &config, None)?;
//!     let track = FlightLog::parse(&log.path, &options, Some(session.serial_number()))?;
//!     if let Some(summary) = track.summary() {
//!         println!("{}", summary);
//!     }
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod flightlog;
pub mod protocol;
pub mod rad26;
pub mod unit_conversion;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::catalog::{
        CatalogFilter, DownloadReport, DownloadStatus, LocalLogStore, LogCatalog,
        LogCatalogEntry, LogIdentifier,
    };
    pub use crate::config::{default_config_path, AppConfig, ConversionOptions};
    pub use crate::flightlog::{FlightLog, ParsedTrack, TrackStatus, TrackSummary};
    pub use crate::protocol::{Session, SessionConfig};
    pub use crate::rad26::DeviceTimestamp;
    pub use crate::unit_conversion::UnitSystem;
    pub use chrono::Utc;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
