//! Status manager: many metric sources, one reporting unit.
//!
//! Each send cycle:
//! 1. Ask every registered source for its readings, in registration order
//! 2. Drop readings whose raw key is disabled
//! 3. Convert the surviving raw keys and bind the host
//! 4. Hand the ordered statuses to the sender
//! 5. Record the outcome in [`SendStats`]
//!
//! The manager is immutable after construction apart from its stats. Sources
//! keep mutating their own state from the tick and event paths.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::sender::{SendResult, StatusSender};
use crate::source::MetricSource;
use crate::status::Status;

/// Maps a raw source key to the key reported to the collector.
pub type KeyConverter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Everything needed to build a [`StatusManager`].
///
/// Validated once by [`StatusManager::new`].
pub struct ManagerConfig {
    pub host: String,
    pub key_converter: Option<KeyConverter>,
    pub disabled_keys: HashSet<String>,
    pub sources: Vec<Arc<dyn MetricSource>>,
    pub sender: Option<Box<dyn StatusSender>>,
}

impl ManagerConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            key_converter: None,
            disabled_keys: HashSet::new(),
            sources: Vec::new(),
            sender: None,
        }
    }

    pub fn sender(mut self, sender: impl StatusSender + 'static) -> Self {
        self.sender = Some(Box::new(sender));
        self
    }

    pub fn key_converter(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.key_converter = Some(Arc::new(f));
        self
    }

    /// Merge `keys` into the disabled set.
    pub fn disable_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Append a source. Sources are reported in the order they are added.
    pub fn source(mut self, source: Arc<dyn MetricSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Append several sources in order.
    pub fn sources<I>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn MetricSource>>,
    {
        self.sources.extend(sources);
        self
    }
}

impl fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("host", &self.host)
            .field("disabled_keys", &self.disabled_keys)
            .field("sources", &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("sender", &self.sender.as_ref().map(|s| s.destination()))
            .finish()
    }
}

/// Running totals for the manager's send cycles.
#[derive(Debug, Clone, Default)]
pub struct SendStats {
    /// Send cycles that completed with a response.
    pub sends: u64,
    /// Send cycles that failed.
    pub failures: u64,
    /// Triggers skipped because a send was already in flight.
    pub skipped: u64,
    pub last_error: Option<String>,
    pub last_response: Option<String>,
}

/// Clears the in-flight flag when dropped, including on unwind.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Aggregates metric sources and pushes their statuses through a sender.
pub struct StatusManager {
    host: String,
    key_converter: Option<KeyConverter>,
    disabled_keys: HashSet<String>,
    sources: Vec<Arc<dyn MetricSource>>,
    sender: Box<dyn StatusSender>,
    in_flight: AtomicBool,
    stats: Mutex<SendStats>,
}

impl StatusManager {
    /// Validate `config` and build the manager.
    pub fn new(config: ManagerConfig) -> Result<Self> {
        if config.host.trim().is_empty() {
            return Err(Error::config("host must not be empty"));
        }
        let Some(sender) = config.sender else {
            return Err(Error::config("no status sender configured"));
        };

        debug!(
            "status manager for {} with {} sources, {} disabled keys, sending to {}",
            config.host,
            config.sources.len(),
            config.disabled_keys.len(),
            sender.destination()
        );

        Ok(Self {
            host: config.host,
            key_converter: config.key_converter,
            disabled_keys: config.disabled_keys,
            sources: config.sources,
            sender,
            in_flight: AtomicBool::new(false),
            stats: Mutex::new(SendStats::default()),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn is_disabled(&self, raw_key: &str) -> bool {
        self.disabled_keys.contains(raw_key)
    }

    /// Reported key for `raw_key`.
    pub fn convert_key(&self, raw_key: &str) -> String {
        match &self.key_converter {
            Some(f) => f(raw_key),
            None => raw_key.to_string(),
        }
    }

    /// Current statuses from every source, filtered and keyed, in stable
    /// order: source registration order, then each source's own order.
    pub fn collect(&self) -> Vec<Status> {
        let mut out = Vec::new();
        for source in &self.sources {
            for reading in source.readings() {
                if self.is_disabled(&reading.key) {
                    continue;
                }
                out.push(Status {
                    host: self.host.clone(),
                    key: self.convert_key(&reading.key),
                    value: reading.value,
                    clock: reading.clock,
                });
            }
        }
        out
    }

    /// Run one send cycle and return the sender's result or error.
    pub fn try_send(&self) -> Result<SendResult> {
        let statuses = self.collect();
        let outcome = self.sender.send(&statuses);

        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        match &outcome {
            Ok(result) => {
                stats.sends += 1;
                stats.last_response = Some(result.response.clone());
            }
            Err(e) => {
                stats.failures += 1;
                stats.last_error = Some(e.to_string());
            }
        }
        outcome
    }

    /// Run one send cycle, logging instead of returning errors.
    ///
    /// If another `send` is still in flight the trigger is skipped and
    /// counted in [`SendStats::skipped`].
    pub fn send(&self) -> Option<SendResult> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("send already in flight, skipping trigger");
            self.stats.lock().unwrap_or_else(|e| e.into_inner()).skipped += 1;
            return None;
        }

        let outcome = {
            let _guard = InFlight(&self.in_flight);
            self.try_send()
        };

        match outcome {
            Ok(result) => {
                match result.reply() {
                    Some(reply) => info!(
                        "sent {} values to {}: {} ({})",
                        result.data.len(),
                        self.sender.destination(),
                        reply.response,
                        reply.info.as_deref().unwrap_or("no info")
                    ),
                    None => info!(
                        "sent {} values to {}: {}",
                        result.data.len(),
                        self.sender.destination(),
                        result.response
                    ),
                }
                Some(result)
            }
            Err(e) => {
                warn!("send to {} failed: {e}", self.sender.destination());
                None
            }
        }
    }

    /// Copy of the running totals.
    pub fn stats(&self) -> SendStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
