//! Abstract metric source trait.
//!
//! Every metric source implements the [`MetricSource`] trait, which provides
//! metadata via [`SourceInfo`] and the current set of readings. Sources own
//! their concurrency-safe state: producers (ticks, events) write to it,
//! the reporting path only reads.

use crate::status::Reading;

/// Shape of the numbers a source produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Averaged per-second rate over a sliding window of samples.
    RollingRate,
    /// Monotonically increasing tallies per category.
    Counter,
    /// Fixed values supplied by the caller.
    Static,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RollingRate => write!(f, "rolling_rate"),
            Self::Counter => write!(f, "counter"),
            Self::Static => write!(f, "static"),
        }
    }
}

/// Metadata about a metric source.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// Unique identifier (e.g. `"tick_rate"`).
    pub name: &'static str,
    /// One-line human-readable description.
    pub description: &'static str,
    pub kind: SourceKind,
}

/// Trait that every metric source must implement.
pub trait MetricSource: Send + Sync {
    /// Source metadata.
    fn info(&self) -> &SourceInfo;

    /// Current readings, in the source's own stable emission order.
    ///
    /// Must not mutate shared state; values may be deferred so they are
    /// read when the status is rendered.
    fn readings(&self) -> Vec<Reading>;

    /// Convenience: name from info.
    fn name(&self) -> &'static str {
        self.info().name
    }
}

/// A source that reports a fixed list of key/value pairs.
///
/// Used for one-shot sends from the command line and as a deterministic
/// source in tests.
pub struct StaticSource {
    info: SourceInfo,
    items: Vec<(String, String)>,
}

impl StaticSource {
    pub fn new(items: Vec<(String, String)>) -> Self {
        Self {
            info: SourceInfo {
                name: "static",
                description: "Fixed key/value pairs supplied by the caller",
                kind: SourceKind::Static,
            },
            items,
        }
    }

    /// Parse `key=value` items. Returns the offending item on failure.
    pub fn parse_items<S: AsRef<str>>(items: &[S]) -> std::result::Result<Self, String> {
        let mut parsed = Vec::with_capacity(items.len());
        for item in items {
            let item = item.as_ref();
            match item.split_once('=') {
                Some((k, v)) if !k.trim().is_empty() => {
                    parsed.push((k.trim().to_string(), v.to_string()));
                }
                _ => return Err(item.to_string()),
            }
        }
        Ok(Self::new(parsed))
    }
}

impl MetricSource for StaticSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn readings(&self) -> Vec<Reading> {
        self.items
            .iter()
            .map(|(k, v)| Reading::new(k.clone(), v.as_str()))
            .collect()
    }
}
