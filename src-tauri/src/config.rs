//! Settings loader: `parking.toml` (every field optional) overlaid with
//! `PARKING_*` environment variables, then validated.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "parking.toml";

/// Thresholds for the bay status refetch policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Status is only tracked once the visible radius drops below this.
    pub street_view_radius_m: f64,
    /// Radius around the request center that one status fetch covers.
    pub coverage_radius_m: f64,
    /// Seconds before fetched status is considered stale.
    pub freshness_interval_secs: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            street_view_radius_m: 250.0,
            coverage_radius_m: 1000.0,
            freshness_interval_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub policy: PolicyConfig,
    pub feed: FeedConfig,
}

impl AppConfig {
    /// Load from `path` if it exists, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            Self::from_toml(&raw)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Overlay values from `lookup`, which maps an env var name to its value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("PARKING_FEED_URL") {
            self.feed.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup("PARKING_STREET_VIEW_RADIUS_M") {
            self.policy.street_view_radius_m = parse_meters(&raw, "PARKING_STREET_VIEW_RADIUS_M")?;
        }
        if let Some(raw) = lookup("PARKING_COVERAGE_RADIUS_M") {
            self.policy.coverage_radius_m = parse_meters(&raw, "PARKING_COVERAGE_RADIUS_M")?;
        }
        if let Some(raw) = lookup("PARKING_FRESHNESS_SECS") {
            self.policy.freshness_interval_secs = raw
                .trim()
                .parse::<i64>()
                .map_err(|_| Error::Config("PARKING_FRESHNESS_SECS must be an integer".into()))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut issues: Vec<String> = Vec::new();
        let policy = &self.policy;

        if !(policy.street_view_radius_m.is_finite() && policy.street_view_radius_m > 0.0) {
            issues.push("policy.street_view_radius_m must be a positive number".into());
        }
        if !(policy.coverage_radius_m.is_finite() && policy.coverage_radius_m > 0.0) {
            issues.push("policy.coverage_radius_m must be a positive number".into());
        }
        if policy.street_view_radius_m > policy.coverage_radius_m {
            issues.push("policy.street_view_radius_m must not exceed policy.coverage_radius_m".into());
        }
        if policy.freshness_interval_secs < 0 {
            issues.push("policy.freshness_interval_secs must be >= 0".into());
        }
        if self.feed.base_url.trim().is_empty() {
            issues.push("feed.base_url must not be empty".into());
        }
        if self.feed.request_timeout_secs == 0 {
            issues.push("feed.request_timeout_secs must be > 0".into());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(issues.join("; ")))
        }
    }
}

fn parse_meters(raw: &str, env_name: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("{env_name} must be a number of meters")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_published_thresholds() {
        let config = AppConfig::default();
        assert_eq!(config.policy.street_view_radius_m, 250.0);
        assert_eq!(config.policy.coverage_radius_m, 1000.0);
        assert_eq!(config.policy.freshness_interval_secs, 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [policy]
            freshness_interval_secs = 60

            [feed]
            base_url = "https://bays.example.org/api"
            "#,
        )
        .unwrap();
        assert_eq!(config.policy.freshness_interval_secs, 60);
        assert_eq!(config.policy.street_view_radius_m, 250.0);
        assert_eq!(config.feed.base_url, "https://bays.example.org/api");
        assert_eq!(config.feed.request_timeout_secs, 15);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(AppConfig::from_toml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = AppConfig::from_toml("[policy\nstreet_view_radius_m = ").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)), "{err}");
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("PARKING_FEED_URL", " https://feed.local "),
                ("PARKING_STREET_VIEW_RADIUS_M", "300"),
                ("PARKING_COVERAGE_RADIUS_M", "1500.5"),
                ("PARKING_FRESHNESS_SECS", "90"),
            ]))
            .unwrap();
        assert_eq!(config.feed.base_url, "https://feed.local");
        assert_eq!(config.policy.street_view_radius_m, 300.0);
        assert_eq!(config.policy.coverage_radius_m, 1500.5);
        assert_eq!(config.policy.freshness_interval_secs, 90);
    }

    #[test]
    fn test_env_rejects_non_numeric_radius() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(env(&[("PARKING_COVERAGE_RADIUS_M", "wide")]))
            .unwrap_err();
        assert!(err.to_string().contains("PARKING_COVERAGE_RADIUS_M"));
    }

    #[test]
    fn test_validate_collects_every_issue() {
        let mut config = AppConfig::default();
        config.policy.street_view_radius_m = f64::NAN;
        config.policy.freshness_interval_secs = -1;
        config.feed.base_url = "  ".into();
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("street_view_radius_m"), "{msg}");
        assert!(msg.contains("freshness_interval_secs"), "{msg}");
        assert!(msg.contains("base_url"), "{msg}");
    }

    #[test]
    fn test_validate_rejects_trigger_wider_than_coverage() {
        let mut config = AppConfig::default();
        config.policy.street_view_radius_m = 2_000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[policy]\ncoverage_radius_m = 800.0\n").unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.policy.coverage_radius_m, 800.0);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.policy, PolicyConfig::default());
    }
}
