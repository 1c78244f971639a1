//! YAML configuration file.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::selection::CollectorSelection;
use crate::error::{Error, Result};

/// On-disk exporter configuration.
///
/// ```yaml
/// namespace: node
/// scrape_timeout_seconds: 8
/// disable_defaults: true
/// collectors:
///   loadavg: true
///   ntp: true
/// exclude_collectors: []
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Metric namespace
    pub namespace: Option<String>,
    /// Scrape deadline in seconds
    pub scrape_timeout_seconds: Option<f64>,
    /// Turn every non-overridden collector off
    pub disable_defaults: bool,
    /// Per-collector toggles
    pub collectors: BTreeMap<String, bool>,
    /// Only build these collectors
    pub enable_collectors: Vec<String>,
    /// Build every enabled collector except these
    pub exclude_collectors: Vec<String>,
}

impl FileConfig {
    /// Parse YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: FileConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Scrape deadline, if configured and representable
    pub fn scrape_timeout(&self) -> Option<Duration> {
        self.scrape_timeout_seconds
            .and_then(|secs| timeout_from_secs(secs).ok())
    }

    /// Collector selection described by this file
    pub fn selection(&self) -> CollectorSelection {
        CollectorSelection {
            disable_defaults: self.disable_defaults,
            overrides: self.collectors.clone(),
            enable_collectors: self.enable_collectors.clone(),
            exclude_collectors: self.exclude_collectors.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(secs) = self.scrape_timeout_seconds {
            timeout_from_secs(secs)?;
        }
        Ok(())
    }
}

/// Convert a timeout given in seconds, rejecting zero, negative, NaN and
/// values too large for a `Duration`.
pub fn timeout_from_secs(secs: f64) -> Result<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(timeout) if !timeout.is_zero() => Ok(timeout),
        _ => Err(Error::Config(format!(
            "scrape timeout must be a positive number of seconds, got {}",
            secs
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_full_config() {
        let config = FileConfig::from_yaml_str(
            r#"
namespace: host
scrape_timeout_seconds: 2.5
disable_defaults: true
collectors:
  loadavg: true
  ntp: false
"#,
        )
        .unwrap();

        assert_eq!(config.namespace.as_deref(), Some("host"));
        assert_eq!(config.scrape_timeout(), Some(Duration::from_millis(2500)));
        let selection = config.selection();
        assert!(selection.disable_defaults);
        assert_eq!(selection.overrides.get("loadavg"), Some(&true));
        assert_eq!(selection.overrides.get("ntp"), Some(&false));
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = FileConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_rejects_non_positive_timeout() {
        assert_matches!(
            FileConfig::from_yaml_str("scrape_timeout_seconds: 0"),
            Err(Error::Config(_))
        );
    }

    #[test]
    fn test_rejects_oversized_timeout() {
        assert_matches!(
            FileConfig::from_yaml_str("scrape_timeout_seconds: 1e20"),
            Err(Error::Config(_))
        );

        let config = FileConfig {
            scrape_timeout_seconds: Some(1e20),
            ..Default::default()
        };
        assert_eq!(config.scrape_timeout(), None);
    }

    #[test]
    fn test_timeout_from_secs() {
        assert_eq!(timeout_from_secs(0.25).unwrap(), Duration::from_millis(250));
        assert!(timeout_from_secs(-1.0).is_err());
        assert!(timeout_from_secs(f64::NAN).is_err());
        assert!(timeout_from_secs(f64::INFINITY).is_err());
        assert!(timeout_from_secs(1e-12).is_err());
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert_matches!(
            FileConfig::from_yaml_str("colectors: {}"),
            Err(Error::ConfigParse(_))
        );
    }

    #[test]
    fn test_missing_file() {
        assert_matches!(
            FileConfig::from_path("/nonexistent/nodestat.yml"),
            Err(Error::Io(_))
        );
    }
}
