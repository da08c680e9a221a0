use serde_json::{json, Value};

use crate::study::DEFAULT_EXPIRE_DAYS;
use crate::sync::{MINUTES_PER_ITERATION, URL_ENDPOINT_TEMPLATE};

pub const DEFAULT_PORT: u16 = 0;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Values used for any key missing from `config.yml`.
pub fn default_config() -> Value {
    json!({
        "study": {
            "addon_version": env!("CARGO_PKG_VERSION"),
            "expire_days": DEFAULT_EXPIRE_DAYS,
            "data_collection_allowed": true,
            "permanent_private_browsing": false,
        },
        "sync": {
            "endpoint_template": URL_ENDPOINT_TEMPLATE,
            "minutes_per_iteration": MINUTES_PER_ITERATION,
            "request_timeout_secs": DEFAULT_REQUEST_TIMEOUT_SECS,
        },
        "optimizer": {
            "epsilon": crate::optimization::DEFAULT_EPSILON,
        },
        "telemetry": {
            "send": false,
            "archive": true,
        },
        "places": {},
        "server": {
            "host": "127.0.0.1",
            "port": DEFAULT_PORT,
        },
    })
}
