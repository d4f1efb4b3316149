use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::paths;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ModelConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key, if any.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_model() -> String {
    "gpt-oss:20b".to_string()
}

fn default_model_timeout() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: None,
            timeout_secs: default_model_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// RunnerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default = "default_test_command")]
    pub test_command: String,
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
    /// Debug-loop rewrites after the first failed run (≤ max_retries + 1
    /// total runs).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_test_command() -> String {
    "pytest".to_string()
}

fn default_run_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    1
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            test_command: default_test_command(),
            run_timeout_secs: default_run_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            model: ModelConfig::default(),
            runner: RunnerConfig::default(),
        }
    }
}

impl Config {
    /// Load `.forge/config.yaml`, falling back to defaults when the file is
    /// missing, then apply `FORGE_MODEL` / `FORGE_BASE_URL` overrides.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        let mut cfg = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_yaml::from_str(&data)?
        } else {
            Config::default()
        };

        if let Ok(model) = std::env::var("FORGE_MODEL") {
            if !model.is_empty() {
                cfg.model.model = model;
            }
        }
        if let Ok(base_url) = std::env::var("FORGE_BASE_URL") {
            if !base_url.is_empty() {
                cfg.model.base_url = base_url;
            }
        }
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.runner.run_timeout_secs)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model.timeout_secs)
    }

    /// API key from the configured environment variable, if both are set.
    pub fn api_key(&self) -> Option<String> {
        self.model
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|v| !v.is_empty())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if which::which(&self.runner.interpreter).is_err() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "interpreter '{}' not found on PATH — generated files cannot be run",
                    self.runner.interpreter
                ),
            });
        }

        if self.runner.run_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "runner.run_timeout_secs is 0: every run would be killed immediately"
                    .to_string(),
            });
        }

        if self.runner.max_retries > 5 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "runner.max_retries={} (>5 is unusual — each retry is a full model call)",
                    self.runner.max_retries
                ),
            });
        }

        if self.model.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "model.timeout_secs is 0: model calls would never complete".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
