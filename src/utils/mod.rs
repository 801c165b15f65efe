pub mod config;
pub mod logger;

pub use config::*;
pub use logger::setup_logging;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current UNIX time in whole seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
