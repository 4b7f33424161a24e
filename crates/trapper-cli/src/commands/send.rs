//! `trapper send` - one-shot send of static items.

use std::path::Path;
use std::sync::Arc;

use trapper_core::{SendResult, StatusManager, TrapperConfig};

use super::{load_config, parse_items};

/// Run the send command.
pub fn run(config: Option<&Path>, host: Option<&str>, items: &[String]) {
    let mut cfg = match config {
        Some(path) => load_config(path),
        None => match TrapperConfig::default().with_env() {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
    };
    if let Some(h) = host {
        cfg.host = h.to_string();
    }
    if let Err(e) = cfg.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let source = Arc::new(parse_items(items));
    let manager = match StatusManager::new(cfg.manager_config().source(source)) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    match manager.try_send() {
        Ok(result) => print!("{}", summarize(&result)),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn summarize(result: &SendResult) -> String {
    let mut out = String::new();
    for (key, value) in &result.data {
        out.push_str(&format!("  {key} = {value}\n"));
    }
    match result.reply() {
        Some(reply) => {
            out.push_str(&format!("response: {}\n", reply.response));
            match reply.processed() {
                Some(p) => out.push_str(&format!(
                    "processed: {}  failed: {}  total: {}\n",
                    p.processed, p.failed, p.total
                )),
                None => {
                    if let Some(info) = &reply.info {
                        out.push_str(&format!("info: {info}\n"));
                    }
                }
            }
        }
        None => out.push_str(&format!("response: {}\n", result.response)),
    }
    if result.truncated {
        out.push_str("(reply truncated)\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_summarize_success() {
        let result = SendResult {
            data: BTreeMap::from([("a".to_string(), "1".to_string())]),
            response: r#"{"response":"success","info":"processed: 1; failed: 0; total: 1; seconds spent: 0.1"}"#
                .to_string(),
            ..Default::default()
        };
        let text = summarize(&result);
        assert!(text.contains("  a = 1"));
        assert!(text.contains("response: success"));
        assert!(text.contains("processed: 1  failed: 0  total: 1"));
    }

    #[test]
    fn test_summarize_fallback() {
        let result = SendResult {
            response: "[]".to_string(),
            truncated: true,
            ..Default::default()
        };
        let text = summarize(&result);
        assert!(text.contains("response: []"));
        assert!(text.contains("truncated"));
    }
}
