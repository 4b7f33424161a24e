//! Collector reply to a `sender data` request.
//!
//! A successful answer looks like
//! `{"response":"success","info":"processed: 1; failed: 0; total: 1; seconds spent: 0.000055"}`.

use serde::{Deserialize, Serialize};

/// Top-level collector answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorReply {
    pub response: String,
    #[serde(default)]
    pub info: Option<String>,
}

/// Counters parsed out of the reply's `info` string.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessedInfo {
    pub processed: u64,
    pub failed: u64,
    pub total: u64,
    pub seconds_spent: f64,
}

impl CollectorReply {
    /// Parse a reply body. Returns `None` for the empty `"[]"` fallback or
    /// anything that is not a reply object.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    pub fn is_success(&self) -> bool {
        self.response == "success"
    }

    /// Parse the `info` string. Missing fields are left at zero.
    pub fn processed(&self) -> Option<ProcessedInfo> {
        let info = self.info.as_deref()?;
        let mut out = ProcessedInfo::default();
        let mut seen = false;
        for part in info.split(';') {
            let Some((name, value)) = part.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match name.trim() {
                "processed" => out.processed = value.parse().ok()?,
                "failed" => out.failed = value.parse().ok()?,
                "total" => out.total = value.parse().ok()?,
                "seconds spent" => out.seconds_spent = value.parse().ok()?,
                _ => continue,
            }
            seen = true;
        }
        seen.then_some(out)
    }
}
