//! One measurement on its way to the collector.
//!
//! A [`Status`] carries the reporting host, the reported key, and two
//! accessors, value and clock, that may be resolved lazily. Sources hand out
//! deferred values so that the number sent reflects the state at render time
//! rather than at collection time. Deferred accessors must only read shared
//! state; all mutation belongs to the sampling path.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in whole seconds since the Unix epoch.
pub fn epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Value of a measurement, either already known or computed on demand.
#[derive(Clone)]
pub enum StatusValue {
    Resolved(String),
    Deferred(Arc<dyn Fn() -> String + Send + Sync>),
}

impl StatusValue {
    /// Wrap a closure that is evaluated when the value is rendered.
    pub fn deferred(f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self::Deferred(Arc::new(f))
    }

    /// Materialize the value.
    pub fn get(&self) -> String {
        match self {
            Self::Resolved(v) => v.clone(),
            Self::Deferred(f) => f(),
        }
    }
}

impl From<String> for StatusValue {
    fn from(v: String) -> Self {
        Self::Resolved(v)
    }
}

impl From<&str> for StatusValue {
    fn from(v: &str) -> Self {
        Self::Resolved(v.to_string())
    }
}

impl fmt::Debug for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(v) => f.debug_tuple("Resolved").field(v).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Timestamp of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusClock {
    /// Stamp with the time the status is rendered.
    #[default]
    Now,
    /// Stamp with a fixed epoch-seconds value chosen by the source.
    Pinned(i64),
}

impl StatusClock {
    pub fn get(&self) -> i64 {
        match self {
            Self::Now => epoch_seconds(),
            Self::Pinned(secs) => *secs,
        }
    }
}

/// A raw measurement emitted by a metric source, before the manager binds a
/// host and converts the key.
#[derive(Debug, Clone)]
pub struct Reading {
    pub key: String,
    pub value: StatusValue,
    pub clock: StatusClock,
}

impl Reading {
    pub fn new(key: impl Into<String>, value: impl Into<StatusValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            clock: StatusClock::Now,
        }
    }

    pub fn pinned_at(mut self, secs: i64) -> Self {
        self.clock = StatusClock::Pinned(secs);
        self
    }
}

/// A measurement addressed to the collector.
#[derive(Debug, Clone)]
pub struct Status {
    pub host: String,
    pub key: String,
    pub value: StatusValue,
    pub clock: StatusClock,
}

impl Status {
    pub fn new(
        host: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<StatusValue>,
    ) -> Self {
        Self {
            host: host.into(),
            key: key.into(),
            value: value.into(),
            clock: StatusClock::Now,
        }
    }

    /// Pin the clock to an explicit epoch-seconds value.
    pub fn with_clock(mut self, secs: i64) -> Self {
        self.clock = StatusClock::Pinned(secs);
        self
    }

    pub fn value(&self) -> String {
        self.value.get()
    }

    pub fn clock(&self) -> i64 {
        self.clock.get()
    }
}
