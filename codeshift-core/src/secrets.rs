//! Credentials for hosting providers and LLM APIs
//!
//! Kept apart from `config.toml` so the config can be shared. The file lives at
//! `~/.config/codeshift/secrets.toml` and must be mode 0600 on Unix.
//!
//! Loading priority:
//! 1. Environment variables (GITHUB_TOKEN, GITLAB_TOKEN, AZURE_DEVOPS_TOKEN,
//!    OPENAI_API_KEY, ANTHROPIC_API_KEY)
//! 2. Secrets file (~/.config/codeshift/secrets.toml)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Secrets structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    pub github: TokenSecret,
    pub gitlab: TokenSecret,
    pub azure: TokenSecret,
    pub openai: ApiKeySecret,
    pub anthropic: ApiKeySecret,
}

/// Hosting provider access token
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenSecret {
    pub token: Option<String>,
}

/// LLM provider API key
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiKeySecret {
    pub api_key: Option<String>,
}

impl Secrets {
    /// Secrets from `~/.config/codeshift/secrets.toml`, or none when absent
    pub fn load() -> Result<Self> {
        match Self::default_secrets_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Read a secrets file; refuses files other users can read
    pub fn load_from_file(path: &Path) -> Result<Self> {
        ensure_private(path)?;

        let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
        let mut secrets: Secrets = toml::from_str(&raw).map_err(|e| {
            Error::Config(format!("Invalid secrets file {}: {}", path.display(), e))
        })?;
        secrets.trim_values();
        Ok(secrets)
    }

    fn trim_values(&mut self) {
        let fields = [
            &mut self.github.token,
            &mut self.gitlab.token,
            &mut self.azure.token,
            &mut self.openai.api_key,
            &mut self.anthropic.api_key,
        ];
        for value in fields.into_iter().flatten() {
            *value = value.trim().to_string();
        }
    }

    pub fn default_secrets_path() -> Option<PathBuf> {
        crate::config::config_dir().map(|dir| dir.join("secrets.toml"))
    }

    /// GitHub token; GITHUB_TOKEN env var > secrets file
    pub fn github_token(&self) -> Option<String> {
        resolve("GITHUB_TOKEN", self.github.token.as_deref())
    }

    /// GitLab token; GITLAB_TOKEN env var > secrets file
    pub fn gitlab_token(&self) -> Option<String> {
        resolve("GITLAB_TOKEN", self.gitlab.token.as_deref())
    }

    /// Azure DevOps personal access token; AZURE_DEVOPS_TOKEN env var > secrets file
    pub fn azure_token(&self) -> Option<String> {
        resolve("AZURE_DEVOPS_TOKEN", self.azure.token.as_deref())
    }

    /// OpenAI API key; OPENAI_API_KEY env var > secrets file
    pub fn openai_api_key(&self) -> Option<String> {
        resolve("OPENAI_API_KEY", self.openai.api_key.as_deref())
    }

    /// Anthropic API key; ANTHROPIC_API_KEY env var > secrets file
    pub fn anthropic_api_key(&self) -> Option<String> {
        resolve("ANTHROPIC_API_KEY", self.anthropic.api_key.as_deref())
    }

    /// Write an empty secrets file with owner-only permissions
    ///
    /// Never overwrites an existing file.
    pub fn create_template() -> Result<PathBuf> {
        let path = Self::default_secrets_path().ok_or_else(|| {
            Error::Config("No config directory available for secrets.toml".to_string())
        })?;

        if path.exists() {
            return Err(Error::Config(format!(
                "{} exists; edit it instead",
                path.display()
            )));
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(Error::Io)?;
        }

        std::fs::write(&path, SECRETS_TEMPLATE).map_err(Error::Io)?;
        restrict_to_owner(&path)?;

        warn!(path = %path.display(), "Wrote secrets template; fill in the credentials you use");
        Ok(path)
    }
}

const SECRETS_TEMPLATE: &str = r#"# codeshift credentials
# Keep this file private (chmod 600) and out of version control.

[github]
# Needs contents and pull requests read/write
token = ""

[gitlab]
# Scope: api
token = ""

[azure]
# Azure DevOps PAT with Code (read & write) scope
token = ""

[openai]
api_key = ""

[anthropic]
api_key = ""
"#;

#[cfg(unix)]
fn ensure_private(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path).map_err(Error::Io)?.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        return Err(Error::Config(format!(
            "{} is readable by other users (mode {:o}); run chmod 600 on it",
            path.display(),
            mode
        )));
    }
    debug!(path = %path.display(), mode = format!("{:o}", mode), "Secrets file is private");
    Ok(())
}

#[cfg(not(unix))]
fn ensure_private(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(Error::Io)
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<()> {
    Ok(())
}

fn resolve(env_var: &str, from_file: Option<&str>) -> Option<String> {
    if let Ok(value) = std::env::var(env_var) {
        let value = value.trim().to_string();
        if !value.is_empty() {
            debug!(env_var, "Using credential from environment");
            return Some(value);
        }
    }

    match from_file {
        Some(value) if !value.is_empty() => {
            debug!(env_var, "Using credential from secrets file");
            Some(value.to_string())
        }
        _ => None,
    }
}
