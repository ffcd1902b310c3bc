//! Configuration loading for the `fraudex` binary.

use std::path::Path;

use fraudex_core::LoggingConfig;
use fraudex_signals::EngineConfig;
use serde::{Deserialize, Serialize};

/// Output rendering for a scored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// The aggregated engine result as JSON.
    #[default]
    Json,
    /// The detailed assessment, including every detector's output, as JSON.
    Detailed,
    /// A markdown report for reviewers.
    Markdown,
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FraudexConfig {
    /// Detector ensemble settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Log level and format.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Default output format when none is given on the command line.
    #[serde(default)]
    pub report_format: ReportFormat,
}

/// Load configuration from a YAML file.
pub fn load_config(path: &Path) -> anyhow::Result<FraudexConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
    let config: FraudexConfig = serde_yaml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {}", e))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper to write YAML to a temp file and return the path.
    fn write_yaml(yaml: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(yaml.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_load_config_empty_mapping_uses_defaults() {
        let f = write_yaml("{}\n");
        let config = load_config(f.path()).unwrap();
        assert_eq!(config, FraudexConfig::default());
        assert_eq!(config.engine.bid_rigging.weight, 1.4);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.report_format, ReportFormat::Json);
    }

    #[test]
    fn test_load_config_full() {
        let yaml = r#"
engine:
  benford:
    weight: 1.5
    min_numbers: 30
  split_invoice:
    thresholds: [2000, 7500]
  keywords:
    custom_keywords:
      bribery: ["sweetener"]
      sanctions: ["embargoed"]
  velocity:
    enabled: false
logging:
  level: debug
  format: json
report_format: markdown
"#;
        let f = write_yaml(yaml);
        let config = load_config(f.path()).unwrap();

        assert_eq!(config.engine.benford.weight, 1.5);
        assert_eq!(config.engine.benford.min_numbers, 30);
        assert!(config.engine.benford.enabled);
        assert_eq!(config.engine.split_invoice.thresholds, vec![2000.0, 7500.0]);
        assert_eq!(config.engine.split_invoice.weight, 1.3);
        assert_eq!(
            config.engine.keywords.custom_keywords["sanctions"],
            vec!["embargoed".to_string()]
        );
        assert!(!config.engine.velocity.enabled);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.report_format, ReportFormat::Markdown);

        let engine = fraudex_signals::SignalEngine::from_config(&config.engine).unwrap();
        assert_eq!(engine.len(), 6);
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/fraudex.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_config_invalid_yaml() {
        let f = write_yaml("engine: [unclosed\n");
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config YAML"));
    }

    #[test]
    fn test_unknown_report_format_rejected() {
        let f = write_yaml("report_format: pdf\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_invalid_weight_fails_engine_construction() {
        let f = write_yaml("engine:\n  urgency:\n    weight: -2.0\n");
        let config = load_config(f.path()).unwrap();
        assert!(fraudex_signals::SignalEngine::from_config(&config.engine).is_err());
    }
}
