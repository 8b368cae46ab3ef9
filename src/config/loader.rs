//! Configuration loader
//!
//! Loads a YAML overlay, merges it over the built-in catalog and validates
//! the result.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use super::types::{ConfigOverlay, PlannerConfig};

pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create loader from PLANNER_CONFIG env var or default to "config/planner.yaml"
    pub fn from_env() -> Self {
        let path =
            std::env::var("PLANNER_CONFIG").unwrap_or_else(|_| "config/planner.yaml".to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate the configuration file
    pub fn load(&self) -> Result<PlannerConfig> {
        info!("Loading planner configuration from {}", self.path.display());

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to load {}", self.path.display()))?;

        info!(
            "Loaded {} verbs, {} domains and {} resource types",
            config.verbs.len(),
            config.domains.len(),
            config.resources.len()
        );

        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to the built-in catalog
    pub fn load_or_default(&self) -> Result<PlannerConfig> {
        if self.path.exists() {
            self.load()
        } else {
            info!(
                "No planner configuration at {}, using built-in catalog",
                self.path.display()
            );
            Ok(PlannerConfig::default())
        }
    }

    /// Parse YAML text as an overlay over the built-in catalog
    pub fn parse(content: &str) -> Result<PlannerConfig> {
        let overlay: ConfigOverlay =
            serde_yaml::from_str(content).context("Invalid planner configuration YAML")?;
        let config = PlannerConfig::default().apply(overlay);
        config
            .validate()
            .context("Planner configuration failed validation")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_empty_document_yields_defaults() {
        let config = ConfigLoader::parse("{}").unwrap();
        assert_eq!(config, PlannerConfig::default());
    }

    #[test]
    fn test_parse_overlay_adds_verb() {
        let yaml = r#"
verbs:
  fund.launch:
    depends_on: [kyc.complete]
    produces: [fund-launched]
    duration_ms: 1200
    parallel_safe: false
"#;
        let config = ConfigLoader::parse(yaml).unwrap();
        let spec = config.verb("fund.launch").unwrap();
        assert_eq!(spec.produces, vec!["fund-launched"]);
        assert!(!spec.parallel_safe);
        assert!(spec.retryable);
        assert!(config.verb("kyc.start").is_some());
    }

    #[test]
    fn test_parse_rejects_invalid_timing() {
        let yaml = r#"
timing:
  default_verb_ms: 5000
  sequential_baseline_ms: 3000
"#;
        let err = ConfigLoader::parse(yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("sequential baseline"));
    }

    #[test]
    fn test_parse_rejects_duration_at_integer_limit() {
        let err =
            ConfigLoader::parse("verbs:\n  x.big:\n    duration_ms: 18446744073709551615\n")
                .unwrap_err();
        assert!(format!("{:#}", err).contains("sequential baseline"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "recovery:\n  max_retries: 7\n  retry_delay_ms: 100\n  notification_targets: [desk]"
        )
        .unwrap();

        let config = ConfigLoader::new(file.path()).load().unwrap();
        assert_eq!(config.recovery.max_retries, 7);
        assert_eq!(config.recovery.notification_targets, vec!["desk"]);
    }

    #[test]
    fn test_missing_file_errors_but_load_or_default_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path().join("absent.yaml"));
        assert!(loader.load().is_err());
        assert_eq!(loader.load_or_default().unwrap(), PlannerConfig::default());
    }

    #[test]
    fn test_shipped_sample_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/planner.yaml");
        let config = ConfigLoader::new(path).load().unwrap();
        assert!(config.verb("fund.launch").is_some());
    }
}
