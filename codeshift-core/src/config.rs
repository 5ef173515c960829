//! Configuration management for codeshift
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (CODESHIFT_*)
//! 3. Config file (~/.config/codeshift/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use humantime_serde::re::humantime;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Workflow catalog location
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowsConfig {
    /// Path to the YAML catalog; `~/.config/codeshift/workflows.yaml` when unset
    pub path: Option<PathBuf>,
}

/// Job store and report cache
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file; `<data dir>/codeshift/jobs.db` when unset
    pub database_path: Option<PathBuf>,

    /// How long job records are kept after their last update
    #[serde(with = "humantime_serde")]
    pub job_ttl: Duration,

    /// Directory for cached reports; `<data dir>/codeshift/reports` when unset
    pub reports_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            job_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            reports_dir: None,
        }
    }
}

/// LLM provider settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub openai_base_url: String,
    pub anthropic_base_url: String,

    /// Model used by steps that do not name one
    pub default_model: Option<String>,

    /// Provider defaults when no model is named anywhere
    pub openai_model: String,
    pub claude_model: String,

    /// Output token limit for steps that do not set `max_token_out`
    pub max_tokens: u32,

    /// Deadline for a single agent invocation; unlimited when unset
    #[serde(with = "humantime_serde")]
    pub step_timeout: Option<Duration>,

    /// Directory of `<task_type>.md` prompt templates
    pub prompts_dir: Option<PathBuf>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_base_url: crate::llm::openai::DEFAULT_BASE_URL.to_string(),
            anthropic_base_url: crate::llm::claude::DEFAULT_BASE_URL.to_string(),
            default_model: None,
            openai_model: crate::llm::openai::DEFAULT_MODEL.to_string(),
            claude_model: crate::llm::claude::DEFAULT_MODEL.to_string(),
            max_tokens: 15_000,
            step_timeout: None,
            prompts_dir: None,
        }
    }
}

/// Git hosting endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostingConfig {
    /// GitHub API base for GitHub Enterprise; api.github.com when unset
    pub github_api_url: Option<String>,

    pub gitlab_url: String,

    /// Azure DevOps organization, e.g. `https://dev.azure.com/acme`
    pub azure_org_url: Option<String>,

    /// Base branch when neither the job nor the provider gives one
    pub default_branch: String,
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            github_api_url: None,
            gitlab_url: "https://gitlab.com".to_string(),
            azure_org_url: None,
            default_branch: "main".to_string(),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub workflows: WorkflowsConfig,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
    pub hosting: HostingConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/codeshift/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        config_dir().map(|p| p.join("config.toml"))
    }

    /// Resolved workflow catalog path
    pub fn workflows_path(&self) -> Result<PathBuf> {
        self.workflows
            .path
            .clone()
            .or_else(|| config_dir().map(|p| p.join("workflows.yaml")))
            .ok_or_else(|| Error::Config("Could not determine workflow catalog path".to_string()))
    }

    /// Resolved database path
    pub fn database_path(&self) -> Result<PathBuf> {
        self.storage
            .database_path
            .clone()
            .or_else(|| data_dir().map(|p| p.join("jobs.db")))
            .ok_or_else(|| Error::Config("Could not determine database path".to_string()))
    }

    /// Resolved report directory
    pub fn reports_dir(&self) -> Result<PathBuf> {
        self.storage
            .reports_dir
            .clone()
            .or_else(|| data_dir().map(|p| p.join("reports")))
            .ok_or_else(|| Error::Config("Could not determine reports directory".to_string()))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - CODESHIFT_WORKFLOWS: workflow catalog path
    /// - CODESHIFT_DATABASE: job database path
    /// - CODESHIFT_MODEL: default model
    /// - CODESHIFT_STEP_TIMEOUT: per-step deadline (e.g. "10m")
    /// - CODESHIFT_AZURE_ORG_URL: Azure DevOps organization URL
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(path) = std::env::var("CODESHIFT_WORKFLOWS") {
            self.workflows.path = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("CODESHIFT_DATABASE") {
            self.storage.database_path = Some(PathBuf::from(path));
        }

        if let Ok(model) = std::env::var("CODESHIFT_MODEL") {
            self.llm.default_model = Some(model);
        }

        if let Ok(timeout) = std::env::var("CODESHIFT_STEP_TIMEOUT") {
            let parsed = humantime::parse_duration(&timeout).map_err(|e| {
                Error::Config(format!("Invalid CODESHIFT_STEP_TIMEOUT '{}': {}", timeout, e))
            })?;
            self.llm.step_timeout = Some(parsed);
        }

        if let Ok(url) = std::env::var("CODESHIFT_AZURE_ORG_URL") {
            self.hosting.azure_org_url = Some(url);
        }

        Ok(self)
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(
        mut self,
        workflows: Option<PathBuf>,
        database: Option<PathBuf>,
    ) -> Self {
        if let Some(path) = workflows {
            self.workflows.path = Some(path);
        }

        if let Some(path) = database {
            self.storage.database_path = Some(path);
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        config_file: Option<PathBuf>,
        workflows: Option<PathBuf>,
        database: Option<PathBuf>,
    ) -> Result<Self> {
        let base = match config_file {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::load()?,
        };
        Ok(base
            .with_env_overrides()?
            .with_cli_overrides(workflows, database))
    }
}

/// `~/.config/codeshift`
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("codeshift"))
}

/// `~/.local/share/codeshift`
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("codeshift"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.hosting.default_branch, "main");
        assert_eq!(config.llm.max_tokens, 15_000);
        assert!(config.llm.step_timeout.is_none());
        assert_eq!(config.storage.job_ttl, Duration::from_secs(604_800));
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::default().with_cli_overrides(
            Some(PathBuf::from("/etc/codeshift/workflows.yaml")),
            Some(PathBuf::from("/tmp/jobs.db")),
        );

        assert_eq!(
            config.workflows_path().unwrap(),
            PathBuf::from("/etc/codeshift/workflows.yaml")
        );
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/jobs.db"));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[storage]
database_path = "/var/lib/codeshift/jobs.db"
job_ttl = "2days"

[llm]
default_model = "claude-sonnet-4-5"
max_tokens = 8000
step_timeout = "15m"

[hosting]
azure_org_url = "https://dev.azure.com/acme"
default_branch = "develop"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.storage.job_ttl, Duration::from_secs(2 * 86_400));
        assert_eq!(config.llm.default_model.as_deref(), Some("claude-sonnet-4-5"));
        assert_eq!(config.llm.max_tokens, 8000);
        assert_eq!(config.llm.step_timeout, Some(Duration::from_secs(900)));
        assert_eq!(
            config.hosting.azure_org_url.as_deref(),
            Some("https://dev.azure.com/acme")
        );
        assert_eq!(config.hosting.default_branch, "develop");
    }

    #[test]
    fn test_partial_toml() {
        let toml = r#"
[llm]
default_model = "gpt-4o"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        // Everything else keeps its default
        assert_eq!(config.llm.max_tokens, 15_000);
        assert_eq!(config.hosting.gitlab_url, "https://gitlab.com");
        assert_eq!(config.llm.openai_base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm\nmax_tokens = ").unwrap();

        let result = Config::load_from_file(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
