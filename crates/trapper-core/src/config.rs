//! Configuration loading from JSON files and environment variables.
//!
//! Every field has a default, so an empty object `{}` is a complete file.
//! Environment variables take precedence over the file:
//!
//! - `TRAPPER_HOST` - sender identity reported with every value
//! - `TRAPPER_SERVER` - collector hostname
//! - `TRAPPER_PORT` - collector port
//! - `TRAPPER_INTERVAL` - send interval in seconds (`<= 0` disables)

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::manager::ManagerConfig;
use crate::protocol::DEFAULT_PORT;
use crate::sources::rolling_rate::{DEFAULT_TICK_HZ, MAX_TICK_HZ};
use crate::trapper::TrapperSender;

/// Settings for the whole pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrapperConfig {
    /// Sender identity; must match the host name configured on the collector.
    pub host: String,
    pub server: String,
    pub port: u16,
    /// Seconds between sends; `<= 0` disables periodic sending.
    pub interval: i64,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    /// Raw keys that are never sent.
    pub disable: BTreeSet<String>,
    /// Raw key → reported key. Unmapped keys are reported unchanged.
    pub keys: BTreeMap<String, String>,
    /// Target tick cadence of the host.
    pub tick_hz: u32,
}

impl Default for TrapperConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            server: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            interval: 60,
            connect_timeout_ms: 3000,
            read_timeout_ms: 3000,
            disable: BTreeSet::new(),
            keys: BTreeMap::new(),
            tick_hz: DEFAULT_TICK_HZ,
        }
    }
}

impl TrapperConfig {
    /// Parse a JSON document.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::config(format!("invalid config: {e}")))
    }

    /// Load a JSON file, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_overrides(path, |name| std::env::var(name).ok())
    }

    /// [`load`](Self::load) with overrides taken from `lookup` instead of the
    /// process environment.
    pub fn load_with_overrides(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;
        let config = Self::from_json(&text)?.with_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TRAPPER_*` environment variables.
    pub fn with_env(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(host) = lookup("TRAPPER_HOST") {
            self.host = host;
        }
        if let Some(server) = lookup("TRAPPER_SERVER") {
            self.server = server;
        }
        if let Some(port) = lookup("TRAPPER_PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| Error::config(format!("TRAPPER_PORT is not a port: {port:?}")))?;
        }
        if let Some(interval) = lookup("TRAPPER_INTERVAL") {
            self.interval = interval.trim().parse().map_err(|_| {
                Error::config(format!("TRAPPER_INTERVAL is not a number: {interval:?}"))
            })?;
        }
        Ok(self)
    }

    /// Check required settings.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("host must not be empty"));
        }
        if self.server.trim().is_empty() {
            return Err(Error::config("server must not be empty"));
        }
        if self.port == 0 {
            return Err(Error::config("port must not be 0"));
        }
        if self.tick_hz == 0 || self.tick_hz > MAX_TICK_HZ {
            return Err(Error::config(format!(
                "tick_hz must be between 1 and {MAX_TICK_HZ}, got {}",
                self.tick_hz
            )));
        }
        if self.connect_timeout_ms == 0 || self.read_timeout_ms == 0 {
            return Err(Error::config("timeouts must be at least 1 ms"));
        }
        Ok(())
    }

    /// Send period, or `None` when periodic sending is disabled.
    pub fn interval(&self) -> Option<Duration> {
        (self.interval > 0).then(|| Duration::from_secs(self.interval as u64))
    }

    pub fn sender(&self) -> TrapperSender {
        TrapperSender::with_port(self.server.clone(), self.port).timeouts(
            Duration::from_millis(self.connect_timeout_ms),
            Duration::from_millis(self.read_timeout_ms),
        )
    }

    pub fn key_map(&self) -> KeyMap {
        KeyMap::new(self.keys.clone())
    }

    /// Manager settings with host, key conversion, disabled keys and the TCP
    /// sender filled in. Sources are left to the caller.
    pub fn manager_config(&self) -> ManagerConfig {
        let key_map = self.key_map();
        ManagerConfig::new(self.host.clone())
            .sender(self.sender())
            .key_converter(move |raw| key_map.convert(raw))
            .disable_keys(self.disable.iter().cloned())
    }
}

/// Table-driven key conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMap {
    map: BTreeMap<String, String>,
}

impl KeyMap {
    pub fn new(map: BTreeMap<String, String>) -> Self {
        Self { map }
    }

    /// Mapped key, or `raw` unchanged.
    pub fn convert(&self, raw: &str) -> String {
        self.map
            .get(raw)
            .cloned()
            .unwrap_or_else(|| raw.to_string())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::StatusSender;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    #[test]
    fn test_empty_object_gives_defaults() {
        let c = TrapperConfig::from_json("{}").unwrap();
        assert_eq!(c, TrapperConfig::default());
        assert_eq!(c.port, 10051);
        assert_eq!(c.interval(), Some(Duration::from_secs(60)));
        assert_eq!(c.tick_hz, 20);
    }

    #[test]
    fn test_full_document() {
        let c = TrapperConfig::from_json(
            r#"{
                "host": "mc-lobby",
                "server": "zabbix.example.net",
                "port": 10052,
                "interval": 30,
                "connect_timeout_ms": 500,
                "read_timeout_ms": 1500,
                "disable": ["tick_count"],
                "keys": {"tick_rate.1s": "mc.tps"},
                "tick_hz": 10
            }"#,
        )
        .unwrap();
        assert_eq!(c.host, "mc-lobby");
        assert_eq!(c.port, 10052);
        assert!(c.disable.contains("tick_count"));
        assert_eq!(c.key_map().convert("tick_rate.1s"), "mc.tps");
        let s = c.sender();
        assert_eq!(s.destination(), "zabbix.example.net:10052");
        assert_eq!(s.connect_timeout(), Duration::from_millis(500));
        assert_eq!(s.read_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_invalid_json_is_configuration_error() {
        let err = TrapperConfig::from_json("{\"port\": \"nope\"}").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_validate_requires_host() {
        assert!(TrapperConfig::default().validate().is_err());
        let c = TrapperConfig {
            host: "srv1".into(),
            ..Default::default()
        };
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_port_and_hz() {
        let base = TrapperConfig {
            host: "srv1".into(),
            ..Default::default()
        };
        assert!(
            TrapperConfig {
                port: 0,
                ..base.clone()
            }
            .validate()
            .is_err()
        );
        assert!(TrapperConfig { tick_hz: 0, ..base }.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_huge_tick_hz() {
        let c = TrapperConfig::from_json(r#"{"host":"srv1","tick_hz":4000000000}"#).unwrap();
        let err = c.validate().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("tick_hz"));

        let max = TrapperConfig {
            host: "srv1".into(),
            tick_hz: MAX_TICK_HZ,
            ..Default::default()
        };
        assert!(max.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        for json in [
            r#"{"host":"srv1","connect_timeout_ms":0}"#,
            r#"{"host":"srv1","read_timeout_ms":0}"#,
        ] {
            let err = TrapperConfig::from_json(json).unwrap().validate().unwrap_err();
            assert!(err.to_string().contains("timeouts"), "{json}: {err}");
        }
    }

    #[test]
    fn test_non_positive_interval_disables_sending() {
        for interval in [0, -5] {
            let c = TrapperConfig {
                interval,
                ..Default::default()
            };
            assert_eq!(c.interval(), None);
        }
    }

    // -----------------------------------------------------------------------
    // Environment overrides
    // -----------------------------------------------------------------------

    #[test]
    fn test_env_overrides_file() {
        let c = TrapperConfig::from_json(r#"{"host":"file-host","port":1}"#)
            .unwrap()
            .with_overrides(env(&[
                ("TRAPPER_HOST", "env-host"),
                ("TRAPPER_PORT", "10055"),
                ("TRAPPER_INTERVAL", "0"),
            ]))
            .unwrap();
        assert_eq!(c.host, "env-host");
        assert_eq!(c.port, 10055);
        assert_eq!(c.interval(), None);
        assert_eq!(c.server, "127.0.0.1");
    }

    #[test]
    fn test_bad_env_port() {
        let err = TrapperConfig::default()
            .with_overrides(env(&[("TRAPPER_PORT", "70000")]))
            .unwrap_err();
        assert!(err.to_string().contains("TRAPPER_PORT"));
    }

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    #[test]
    fn test_load_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"host":"srv1","interval":5}}"#).unwrap();
        f.flush().unwrap();
        let c = TrapperConfig::load_with_overrides(f.path(), env(&[])).unwrap();
        assert_eq!(c.host, "srv1");
        assert_eq!(c.interval(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_load_applies_overrides_then_validates() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"host":"srv1"}}"#).unwrap();
        f.flush().unwrap();
        let c = TrapperConfig::load_with_overrides(f.path(), env(&[("TRAPPER_PORT", "10060")]))
            .unwrap();
        assert_eq!(c.port, 10060);
        let err =
            TrapperConfig::load_with_overrides(f.path(), env(&[("TRAPPER_PORT", "0")])).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = TrapperConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    // -----------------------------------------------------------------------
    // Key map and manager wiring
    // -----------------------------------------------------------------------

    #[test]
    fn test_key_map_passthrough() {
        let m = KeyMap::new(BTreeMap::from([("a".to_string(), "b".to_string())]));
        assert_eq!(m.convert("a"), "b");
        assert_eq!(m.convert("c"), "c");
        assert_eq!(m.len(), 1);
        assert!(KeyMap::default().is_empty());
    }

    #[test]
    fn test_manager_config_wiring() {
        let c = TrapperConfig {
            host: "srv1".into(),
            disable: BTreeSet::from(["tick_count".to_string()]),
            keys: BTreeMap::from([("x".to_string(), "y".to_string())]),
            ..Default::default()
        };
        let mc = c.manager_config();
        assert_eq!(mc.host, "srv1");
        assert!(mc.disabled_keys.contains("tick_count"));
        assert!(mc.sender.is_some());
        let convert = mc.key_converter.as_ref().unwrap();
        assert_eq!(convert("x"), "y");
        assert_eq!(convert("z"), "z");
    }
}
