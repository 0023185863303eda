use std::{collections::HashMap, fs, time::Duration};

use anyhow::Context;
use url::Url;

use crate::calls::ClearPolicy;

const SETTINGS_FILE: &str = "client.toml";

/// Client settings. The backend base URL is always injected, never
/// hardcoded, so the core can run against a local fixture.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub floor_count: i64,
    pub call_timeout: Duration,
    pub clear_policy: ClearPolicy,
    pub door_overrides: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".into(),
            floor_count: 10,
            call_timeout: crate::calls::DEFAULT_CALL_TIMEOUT,
            clear_policy: ClearPolicy::AnyCar,
            door_overrides: false,
        }
    }
}

impl ClientSettings {
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    /// The base URL must be http(s) so the websocket scheme swap is defined.
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.api_base_url)
            .with_context(|| format!("invalid api_base_url '{}'", self.api_base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!(
                "api_base_url must start with http:// or https://, got '{}'",
                self.api_base_url
            );
        }
        if self.floor_count < 2 {
            anyhow::bail!("floor_count must be at least 2, got {}", self.floor_count);
        }
        Ok(())
    }
}

/// Load settings as defaults, then `client.toml`, then environment
/// overrides, last writer wins.
pub fn load_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_file_config(&mut settings, &file_cfg);
        }
    }

    if let Ok(v) = std::env::var("API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Ok(v) = std::env::var("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Ok(v) = std::env::var("APP__FLOOR_COUNT") {
        if let Ok(parsed) = v.parse::<i64>() {
            settings.floor_count = parsed;
        }
    }
    if let Ok(v) = std::env::var("APP__CALL_TIMEOUT_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.call_timeout = Duration::from_millis(parsed);
        }
    }
    if let Ok(v) = std::env::var("APP__CLEAR_POLICY") {
        if let Some(policy) = parse_clear_policy(&v) {
            settings.clear_policy = policy;
        }
    }
    if let Ok(v) = std::env::var("APP__DOOR_OVERRIDES") {
        settings.door_overrides = matches!(v.as_str(), "1" | "true" | "yes");
    }

    settings
}

fn apply_file_config(settings: &mut ClientSettings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("api_base_url") {
        settings.api_base_url = v.clone();
    }
    if let Some(v) = file_cfg.get("floor_count") {
        if let Ok(parsed) = v.parse::<i64>() {
            settings.floor_count = parsed;
        }
    }
    if let Some(v) = file_cfg.get("call_timeout_ms") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.call_timeout = Duration::from_millis(parsed);
        }
    }
    if let Some(v) = file_cfg.get("clear_policy") {
        if let Some(policy) = parse_clear_policy(v) {
            settings.clear_policy = policy;
        }
    }
    if let Some(v) = file_cfg.get("door_overrides") {
        settings.door_overrides = matches!(v.as_str(), "1" | "true" | "yes");
    }
}

fn parse_clear_policy(raw: &str) -> Option<ClearPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "any_car" => Some(ClearPolicy::AnyCar),
        "column_car" => Some(ClearPolicy::ColumnCar),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_overrides_defaults() {
        let mut settings = ClientSettings::default();
        let mut file_cfg = HashMap::new();
        file_cfg.insert("api_base_url".to_string(), "http://localhost:9000".to_string());
        file_cfg.insert("floor_count".to_string(), "16".to_string());
        file_cfg.insert("call_timeout_ms".to_string(), "1500".to_string());
        file_cfg.insert("clear_policy".to_string(), "column_car".to_string());
        file_cfg.insert("door_overrides".to_string(), "true".to_string());

        apply_file_config(&mut settings, &file_cfg);

        assert_eq!(settings.api_base_url, "http://localhost:9000");
        assert_eq!(settings.floor_count, 16);
        assert_eq!(settings.call_timeout, Duration::from_millis(1500));
        assert_eq!(settings.clear_policy, ClearPolicy::ColumnCar);
        assert!(settings.door_overrides);
    }

    #[test]
    fn unparseable_file_values_keep_defaults() {
        let mut settings = ClientSettings::default();
        let mut file_cfg = HashMap::new();
        file_cfg.insert("floor_count".to_string(), "many".to_string());
        file_cfg.insert("clear_policy".to_string(), "psychic".to_string());

        apply_file_config(&mut settings, &file_cfg);

        assert_eq!(settings.floor_count, 10);
        assert_eq!(settings.clear_policy, ClearPolicy::AnyCar);
    }

    #[test]
    fn validate_rejects_non_http_base_url() {
        let settings = ClientSettings::with_base_url("ftp://example.com");
        assert!(settings.validate().is_err());
        assert!(ClientSettings::with_base_url("nonsense").validate().is_err());
        assert!(ClientSettings::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_degenerate_floor_count() {
        let settings = ClientSettings {
            floor_count: 1,
            ..ClientSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn parses_known_clear_policies() {
        assert_eq!(parse_clear_policy("any_car"), Some(ClearPolicy::AnyCar));
        assert_eq!(parse_clear_policy(" Column_Car "), Some(ClearPolicy::ColumnCar));
        assert_eq!(parse_clear_policy("nearest"), None);
    }
}
