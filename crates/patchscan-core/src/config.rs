use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable pointing at a TOML config file.
pub const CONFIG_ENV: &str = "PATCHSCAN_CONFIG";

/// Environment variable holding the repository host API token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Tunables for a scan. The API token is never read from this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub api_base: String,
    pub source_suffix: String,
    pub tool: String,
    pub tool_args: Vec<String>,
    pub request_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    pub redact: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            source_suffix: ".py".to_string(),
            tool: "bandit".to_string(),
            tool_args: vec!["-r".to_string()],
            request_timeout_secs: 30,
            tool_timeout_secs: 120,
            redact: false,
        }
    }
}

impl ScanConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Load config from an explicit path, `PATCHSCAN_CONFIG`, or defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load_from_path(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config '{}'", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config '{}'", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: ScanConfig = toml::from_str(content)?;
        if config.source_suffix.is_empty() {
            anyhow::bail!("source_suffix must not be empty");
        }
        if config.tool.trim().is_empty() {
            anyhow::bail!("tool must not be empty");
        }
        Ok(config)
    }

    /// Write a template config unless one already exists.
    pub fn scaffold(path: &Path) -> anyhow::Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let template = toml::to_string_pretty(&Self::default())?;
        std::fs::write(path, template)
            .with_context(|| format!("Failed to write config '{}'", path.display()))?;
        Ok(true)
    }
}

/// Resolve the API token from an explicit value or `GITHUB_TOKEN`.
pub fn token_from_env(explicit: Option<String>) -> Option<String> {
    explicit
        .or_else(|| std::env::var(TOKEN_ENV).ok())
        .filter(|t| !t.trim().is_empty())
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("patchscan.toml")
}
