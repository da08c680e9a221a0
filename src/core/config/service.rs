use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::defaults::default_config;
use super::paths::AppPaths;
use super::settings::AppSettings;
use super::validation::validate_config;
use crate::core::errors::ApiError;

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("FRECENCY_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    /// Built-in defaults overlaid with `config.yml`, validated.
    pub fn load_config(&self) -> Result<Value, ApiError> {
        let path = self.config_path();
        let file_config = load_yaml_file(&path)?;
        let merged = deep_merge(&default_config(), &file_config);
        validate_config(&merged)?;
        Ok(merged)
    }

    pub fn load_settings(&self) -> Result<AppSettings, ApiError> {
        let config = self.load_config()?;
        Ok(AppSettings::from_config(&config))
    }
}

fn load_yaml_file(path: &Path) -> Result<Value, ApiError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(ApiError::internal)?;
    if contents.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    match serde_yaml::from_str::<Value>(&contents) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(_) => Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': expected a mapping",
            path.display()
        ))),
        Err(err) => Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': {}",
            path.display(),
            err
        ))),
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "sync": { "minutes_per_iteration": 5, "request_timeout_secs": 30 },
            "telemetry": { "send": false }
        });
        let override_value = json!({
            "sync": { "minutes_per_iteration": 15 },
            "study": { "variation": "model2" }
        });

        let merged = deep_merge(&base, &override_value);

        assert_eq!(
            merged,
            json!({
                "sync": { "minutes_per_iteration": 15, "request_timeout_secs": 30 },
                "telemetry": { "send": false },
                "study": { "variation": "model2" }
            })
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let service = ConfigService::new(Arc::new(AppPaths::with_data_dir(dir.path())));
        let config = service.load_config().unwrap();
        assert_eq!(config, default_config());
    }

    #[test]
    fn user_config_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yml"),
            "sync:\n  minutes_per_iteration: 10\noptimizer:\n  epsilon: 3\n",
        )
        .unwrap();
        let service = ConfigService::new(Arc::new(AppPaths::with_data_dir(dir.path())));

        let config = service.load_config().unwrap();
        assert_eq!(config["sync"]["minutes_per_iteration"], json!(10));
        assert_eq!(config["optimizer"]["epsilon"], json!(3));
        assert_eq!(config["telemetry"]["archive"], json!(true));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yml"), "sync:\n  minutes_per_iteration: 7\n").unwrap();
        let service = ConfigService::new(Arc::new(AppPaths::with_data_dir(dir.path())));
        assert!(matches!(service.load_config(), Err(ApiError::BadRequest(_))));

        fs::write(dir.path().join("config.yml"), "- not\n- a mapping\n").unwrap();
        assert!(matches!(service.load_config(), Err(ApiError::BadRequest(_))));
    }
}
