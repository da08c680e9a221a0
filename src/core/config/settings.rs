//! Typed view of the validated configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::defaults::{DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::optimization::DEFAULT_EPSILON;
use crate::study::StudySettings;
use crate::sync::{SyncSettings, MINUTES_PER_ITERATION, URL_ENDPOINT_TEMPLATE};

#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub send: bool,
    pub archive: bool,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub study: StudySettings,
    pub sync: SyncSettings,
    pub epsilon: i64,
    pub telemetry: TelemetrySettings,
    pub places_path: Option<PathBuf>,
    /// Browser runs in permanent private browsing mode; seeds the privacy
    /// gate before enrollment.
    pub permanent_private_browsing: bool,
    pub host: String,
    pub port: u16,
}

fn section<'a>(config: &'a Value, name: &str) -> Option<&'a Value> {
    config.get(name).filter(|value| value.is_object())
}

fn string_at(config: &Value, name: &str, key: &str) -> Option<String> {
    section(config, name)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn u64_at(config: &Value, name: &str, key: &str) -> Option<u64> {
    section(config, name)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_u64())
}

fn bool_at(config: &Value, name: &str, key: &str) -> Option<bool> {
    section(config, name)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_bool())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl AppSettings {
    pub fn from_config(config: &Value) -> Self {
        let endpoint_override = string_at(config, "sync", "endpoint_override");
        let first_run_override = string_at(config, "study", "first_run_timestamp")
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|ts| ts.with_timezone(&Utc));

        let study = StudySettings {
            variation_override: string_at(config, "study", "variation"),
            first_run_override,
            expired_override: bool_at(config, "study", "expired"),
            expire_days: u64_at(config, "study", "expire_days").map(|days| days as i64),
            model_url_overridden: endpoint_override.is_some(),
            data_collection_allowed: bool_at(config, "study", "data_collection_allowed")
                .unwrap_or(true),
        };

        let sync = SyncSettings {
            endpoint_template: string_at(config, "sync", "endpoint_template")
                .unwrap_or_else(|| URL_ENDPOINT_TEMPLATE.to_string()),
            endpoint_override,
            minutes_per_iteration: u64_at(config, "sync", "minutes_per_iteration")
                .map(|m| m.clamp(1, 60) as u32)
                .unwrap_or(MINUTES_PER_ITERATION),
            request_timeout: Duration::from_secs(
                u64_at(config, "sync", "request_timeout_secs")
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            addon_version: string_at(config, "study", "addon_version")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            testing: false,
        };

        let telemetry = TelemetrySettings {
            send: bool_at(config, "telemetry", "send").unwrap_or(false),
            archive: bool_at(config, "telemetry", "archive").unwrap_or(true),
            endpoint: string_at(config, "telemetry", "endpoint"),
        };

        let mut settings = Self {
            study,
            sync,
            epsilon: u64_at(config, "optimizer", "epsilon")
                .map(|eps| eps as i64)
                .unwrap_or(DEFAULT_EPSILON),
            telemetry,
            places_path: string_at(config, "places", "history_path").map(PathBuf::from),
            permanent_private_browsing: bool_at(config, "study", "permanent_private_browsing")
                .unwrap_or(false),
            host: string_at(config, "server", "host").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: u64_at(config, "server", "port")
                .and_then(|port| u16::try_from(port).ok())
                .unwrap_or(DEFAULT_PORT),
        };
        settings.refresh_testing_flag();
        settings
    }

    /// Applies `PORT`, `FRECENCY_MODEL_URL_OVERRIDE`, `FRECENCY_VARIATION` and
    /// `FRECENCY_PERMANENT_PRIVATE_BROWSING`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| env::var(key).ok())
    }

    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").and_then(|val| val.parse::<u16>().ok()) {
            self.port = port;
        }
        if let Some(url) = lookup("FRECENCY_MODEL_URL_OVERRIDE").filter(|v| !v.trim().is_empty()) {
            tracing::info!(
                "Note: The model url endpoint is overridden for testing purposes (\"{}\")",
                url
            );
            self.sync.endpoint_override = Some(url);
            self.study.model_url_overridden = true;
        }
        if let Some(variation) = lookup("FRECENCY_VARIATION").filter(|v| !v.trim().is_empty()) {
            self.study.variation_override = Some(variation);
        }
        if let Some(permanent) =
            lookup("FRECENCY_PERMANENT_PRIVATE_BROWSING").and_then(|v| parse_flag(&v))
        {
            self.permanent_private_browsing = permanent;
        }
        self.refresh_testing_flag();
        self
    }

    fn refresh_testing_flag(&mut self) {
        self.sync.testing = self.study.has_testing_overrides();
    }
}
