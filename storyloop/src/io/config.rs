//! Loop configuration stored in `.storyloop.toml` at the project root.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Loop configuration (TOML).
///
/// The file is optional and intended to be edited by humans. Missing fields
/// default to the values the loop was designed around.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoopConfig {
    /// Dev-review cycles per story before escalating.
    pub max_iterations: u32,

    /// Fixed wait before the single retry of a failed agent invocation.
    pub retry_backoff_secs: u64,

    /// Agent CLI executable (looked up on `PATH`).
    pub agent_binary: String,

    /// Model used for the fast tier (dev agent).
    pub fast_model: String,

    /// Model used for the capable tier (sprint check, story creation, review).
    pub capable_model: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            retry_backoff_secs: 2,
            agent_binary: "claude".to_string(),
            fast_model: "sonnet".to_string(),
            capable_model: "opus".to_string(),
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        for (name, value) in [
            ("agent_binary", &self.agent_binary),
            ("fast_model", &self.fast_model),
            ("capable_model", &self.capable_model),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{name} must be a non-empty string"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LoopConfig::default()`.
pub fn load_config(path: &Path) -> Result<LoopConfig> {
    if !path.exists() {
        return Ok(LoopConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LoopConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid {}", path.display()))?;
    Ok(cfg)
}

/// Command-line switches that override or extend the file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub resume: bool,
    pub verbose: bool,
    pub yolo: bool,
    pub max_iterations: Option<u32>,
}

/// Effective settings for one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Resume a saved session without asking.
    pub resume: bool,
    /// Label agent output per role and enable debug output.
    pub verbose: bool,
    /// Unattended mode: auto-continue, auto-complete at the bound, auto-commit.
    pub yolo: bool,
    pub max_iterations: u32,
    pub retry_backoff: Duration,
    pub agent_binary: String,
    pub fast_model: String,
    pub capable_model: String,
}

impl RunSettings {
    pub fn new(cfg: &LoopConfig, cli: &CliOverrides) -> Self {
        Self {
            resume: cli.resume,
            verbose: cli.verbose,
            yolo: cli.yolo,
            max_iterations: cli.max_iterations.unwrap_or(cfg.max_iterations),
            retry_backoff: Duration::from_secs(cfg.retry_backoff_secs),
            agent_binary: cfg.agent_binary.clone(),
            fast_model: cfg.fast_model.clone(),
            capable_model: cfg.capable_model.clone(),
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::new(&LoopConfig::default(), &CliOverrides::default())
    }
}

/// Parse a `--max-iterations` value; anything but a positive integer is ignored.
pub fn parse_max_iterations(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, LoopConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".storyloop.toml");
        fs::write(&path, "max_iterations = 4\nfast_model = \"haiku\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_iterations, 4);
        assert_eq!(cfg.fast_model, "haiku");
        assert_eq!(cfg.capable_model, "opus");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".storyloop.toml");
        fs::write(&path, "max_iterations = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("max_iterations must be > 0"));
    }

    #[test]
    fn cli_overrides_file_bound() {
        let cfg = LoopConfig::default();
        let settings = RunSettings::new(
            &cfg,
            &CliOverrides {
                max_iterations: Some(3),
                yolo: true,
                ..CliOverrides::default()
            },
        );
        assert_eq!(settings.max_iterations, 3);
        assert!(settings.yolo);
        assert_eq!(settings.retry_backoff, Duration::from_secs(2));
        assert_eq!(RunSettings::default().max_iterations, 10);
    }

    #[test]
    fn max_iterations_must_be_positive() {
        assert_eq!(parse_max_iterations("5"), Some(5));
        assert_eq!(parse_max_iterations("0"), None);
        assert_eq!(parse_max_iterations("-2"), None);
        assert_eq!(parse_max_iterations("many"), None);
    }
}
