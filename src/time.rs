//! Clock helpers.

use crate::model::Millis;
use chrono::{Local, Utc};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> Millis {
    Utc::now().timestamp_millis()
}

/// Local calendar date as `YYYY-MM-DD`.
pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}
