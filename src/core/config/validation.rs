use serde_json::{Map, Value};

use crate::core::errors::ApiError;
use crate::study::branch_config;

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(study) = expect_optional_object(root, "study")? {
        validate_optional_string_field(study, "study.variation", "variation")?;
        if let Some(name) = study.get("variation").and_then(|v| v.as_str()) {
            if branch_config(name).is_none() {
                return Err(ApiError::BadRequest(format!(
                    "Invalid config at 'study.variation': unknown variation '{}'",
                    name
                )));
            }
        }
        validate_optional_string_field(study, "study.addon_version", "addon_version")?;
        validate_u64_field(study, "study.expire_days", "expire_days", 1, 3_650)?;
        validate_optional_string_field(study, "study.first_run_timestamp", "first_run_timestamp")?;
        if let Some(raw) = study.get("first_run_timestamp").and_then(|v| v.as_str()) {
            if chrono::DateTime::parse_from_rfc3339(raw).is_err() {
                return Err(config_type_error("study.first_run_timestamp", "RFC 3339 timestamp"));
            }
        }
        validate_bool_field(study, "study.expired", "expired")?;
        validate_bool_field(study, "study.data_collection_allowed", "data_collection_allowed")?;
        validate_bool_field(
            study,
            "study.permanent_private_browsing",
            "permanent_private_browsing",
        )?;
    }

    if let Some(sync) = expect_optional_object(root, "sync")? {
        validate_required_string_field(sync, "sync.endpoint_template", "endpoint_template")?;
        validate_optional_string_field(sync, "sync.endpoint_override", "endpoint_override")?;
        validate_u64_field(sync, "sync.minutes_per_iteration", "minutes_per_iteration", 1, 60)?;
        if let Some(minutes) = sync.get("minutes_per_iteration").and_then(|v| v.as_u64()) {
            if 60 % minutes != 0 {
                return Err(ApiError::BadRequest(
                    "Invalid config at 'sync.minutes_per_iteration': must divide 60".to_string(),
                ));
            }
        }
        validate_u64_field(sync, "sync.request_timeout_secs", "request_timeout_secs", 1, 3_600)?;
    }

    if let Some(optimizer) = expect_optional_object(root, "optimizer")? {
        validate_u64_field(optimizer, "optimizer.epsilon", "epsilon", 1, 1_000_000)?;
    }

    if let Some(telemetry) = expect_optional_object(root, "telemetry")? {
        validate_bool_field(telemetry, "telemetry.send", "send")?;
        validate_bool_field(telemetry, "telemetry.archive", "archive")?;
        validate_optional_string_field(telemetry, "telemetry.endpoint", "endpoint")?;
        let sends = telemetry.get("send").and_then(|v| v.as_bool()).unwrap_or(false);
        if sends {
            validate_required_string_field(telemetry, "telemetry.endpoint", "endpoint")?;
        }
    }

    if let Some(places) = expect_optional_object(root, "places")? {
        validate_optional_string_field(places, "places.history_path", "history_path")?;
    }

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65_535)?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_required_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let value = section.get(key).ok_or_else(|| {
        ApiError::BadRequest(format!("Invalid config at '{}': value is required", path))
    })?;
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
