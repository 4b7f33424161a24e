//! Status sender abstraction.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::reply::CollectorReply;
use crate::status::Status;

/// Outcome of one send.
///
/// Built in two phases: the request body and sent values are filled in before
/// the round-trip, the response after it. Not meant to be shared across
/// concurrent sends.
#[derive(Debug, Clone, Default)]
pub struct SendResult {
    /// Rendered JSON request body.
    pub request: String,
    /// Reported key → value that was sent.
    pub data: BTreeMap<String, String>,
    /// Response body text, `"[]"` when the collector sent no usable frame.
    pub response: String,
    /// The collector declared a longer body than was received.
    pub truncated: bool,
}

impl SendResult {
    /// Parse the response text as a collector reply.
    pub fn reply(&self) -> Option<CollectorReply> {
        CollectorReply::parse(&self.response)
    }
}

/// Something that can deliver a batch of statuses and report the answer.
pub trait StatusSender: Send + Sync {
    /// Transmit `statuses` in order. Performs at most one round-trip and no
    /// retries.
    fn send(&self, statuses: &[Status]) -> Result<SendResult>;

    /// Human-readable destination, for logs.
    fn destination(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_from_response_text() {
        let r = SendResult {
            response: r#"{"response":"success","info":"processed: 1; failed: 0; total: 1; seconds spent: 0.1"}"#
                .to_string(),
            ..Default::default()
        };
        let reply = r.reply().unwrap();
        assert!(reply.is_success());
        assert_eq!(reply.processed().unwrap().total, 1);
    }

    #[test]
    fn test_reply_from_empty_fallback() {
        let r = SendResult {
            response: "[]".to_string(),
            ..Default::default()
        };
        assert!(r.reply().is_none());
    }
}
