pub mod frame;
pub mod run;
pub mod send;

use std::path::Path;

use trapper_core::{StaticSource, TrapperConfig};

/// Parse `key=value` items or exit with a message.
pub fn parse_items(items: &[String]) -> StaticSource {
    match StaticSource::parse_items(items) {
        Ok(source) => source,
        Err(bad) => {
            eprintln!("Error: malformed item '{bad}' (expected key=value)");
            std::process::exit(2);
        }
    }
}

/// Load and validate the config, or exit with a message.
pub fn load_config(path: &Path) -> TrapperConfig {
    match TrapperConfig::load(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
