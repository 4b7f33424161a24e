//! # trapper-core
//!
//! **Push host metrics to a Zabbix server or proxy.**
//!
//! `trapper-core` samples a host's main-loop tick rate and named event counts,
//! renames and filters the resulting keys, and pushes them to a collector in
//! the "sender data" trapper format over TCP.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use trapper_core::{CounterSource, ManagerConfig, StatusManager, TrapperSender};
//!
//! let events = Arc::new(CounterSource::with_prefix(""));
//! let manager = StatusManager::new(
//!     ManagerConfig::new("srv1")
//!         .sender(TrapperSender::new("zabbix.example.net"))
//!         .source(events.clone()),
//! )
//! .unwrap();
//!
//! events.increment("tick_event");
//! if let Some(result) = manager.send() {
//!     println!("{}", result.response);
//! }
//! ```
//!
//! ## Architecture
//!
//! Sources → Manager (filter, rename, bind host) → Sender → Collector
//!
//! - **Sources** own their state. The tick path writes to
//!   [`RollingRateSource`], event handlers write to [`CounterSource`]; the
//!   reporting path only reads.
//! - **[`StatusManager`]** gathers readings in registration order, drops
//!   disabled raw keys and converts the rest.
//! - **[`TrapperSender`]** renders the JSON body, frames it and performs one
//!   blocking round-trip per send.
//! - **[`Driver`]** runs the tick and send workers and stops them in reverse
//!   order.

pub mod config;
pub mod driver;
pub mod error;
pub mod json;
pub mod manager;
pub mod protocol;
pub mod reply;
pub mod sender;
pub mod source;
pub mod sources;
pub mod status;
pub mod trapper;

pub use config::{KeyMap, TrapperConfig};
pub use driver::{Driver, Teardown};
pub use error::{Error, Result};
pub use manager::{KeyConverter, ManagerConfig, SendStats, StatusManager};
pub use protocol::{FrameHeader, ParsedResponse, RenderedBody};
pub use reply::{CollectorReply, ProcessedInfo};
pub use sender::{SendResult, StatusSender};
pub use source::{MetricSource, SourceInfo, SourceKind, StaticSource};
pub use sources::{CounterSource, RateWindow, RollingRateSource};
pub use status::{Reading, Status, StatusClock, StatusValue};
pub use trapper::TrapperSender;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
