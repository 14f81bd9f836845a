use crate::infrastructure::error::CoreError;
use chrono_tz::Tz;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), CoreError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let value = serde_json::json!({
            "schema": 1,
            "appName": "TaskFeed",
            "timezone": "UTC"
        });
        let formatted = serde_json::to_string_pretty(&value)?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, CoreError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| CoreError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(CoreError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

/// Calendar timezone from `app.json`. A missing or blank entry means UTC;
/// an unrecognized name is a config error rather than a silent fallback.
pub fn read_timezone(config_dir: &Path) -> Result<Tz, CoreError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let Some(name) = app
        .get("timezone")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
    else {
        return Ok(Tz::UTC);
    };
    name.parse::<Tz>()
        .map_err(|_| CoreError::InvalidConfig(format!("unknown timezone '{name}' in app.json")))
}
