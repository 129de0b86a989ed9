//! Application configuration structures.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote catalog and fetch behavior settings
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Scoping rules
    #[serde(default)]
    pub filter: FilterConfig,

    /// Destination repository settings
    #[serde(default)]
    pub mirror: MirrorConfig,

    /// Secrets and identity, taken from the environment only
    #[serde(skip)]
    pub credentials: Credentials,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Fill credentials from the process environment.
    pub fn with_env_credentials(mut self) -> Self {
        self.credentials = Credentials::from_env();
        self
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.catalog.user_agent.trim().is_empty() {
            return Err(AppError::validation("catalog.user_agent is empty"));
        }
        if self.catalog.timeout_secs == 0 {
            return Err(AppError::validation("catalog.timeout_secs must be > 0"));
        }
        if self.catalog.max_attempts == 0 {
            return Err(AppError::validation("catalog.max_attempts must be > 0"));
        }
        if self.catalog.plugins_per_page == 0 || self.catalog.themes_per_page == 0 {
            return Err(AppError::validation("catalog page sizes must be > 0"));
        }
        Url::parse(&self.catalog.plugins_url)?;
        Url::parse(&self.catalog.themes_url)?;

        if self.mirror.max_concurrent == 0 {
            return Err(AppError::validation("mirror.max_concurrent must be > 0"));
        }
        if self.mirror.command_timeout_secs == 0 || self.mirror.download_timeout_secs == 0 {
            return Err(AppError::validation("mirror timeouts must be > 0"));
        }
        if self.mirror.default_branch.trim().is_empty() {
            return Err(AppError::validation("mirror.default_branch is empty"));
        }
        if self.mirror.git_host.trim().is_empty() {
            return Err(AppError::validation("mirror.git_host is empty"));
        }
        Ok(())
    }

    /// Path of the CI workflow template, resolved against the storage directory.
    pub fn workflow_template_path(&self, storage_dir: &Path) -> PathBuf {
        storage_dir.join(&self.mirror.workflow_template)
    }

    /// Directory under which per-entry working copies are created.
    pub fn work_dir(&self) -> PathBuf {
        self.mirror.work_dir.clone().unwrap_or_else(env::temp_dir)
    }
}

/// Remote catalog settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Plugin query endpoint
    #[serde(default = "defaults::plugins_url")]
    pub plugins_url: String,

    /// Theme query endpoint
    #[serde(default = "defaults::themes_url")]
    pub themes_url: String,

    #[serde(default = "defaults::plugins_per_page")]
    pub plugins_per_page: u32,

    #[serde(default = "defaults::themes_per_page")]
    pub themes_per_page: u32,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// First backoff delay after a throttled response
    #[serde(default = "defaults::backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Attempts per page before giving up on throttling
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            plugins_url: defaults::plugins_url(),
            themes_url: defaults::themes_url(),
            plugins_per_page: defaults::plugins_per_page(),
            themes_per_page: defaults::themes_per_page(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            backoff_base_ms: defaults::backoff_base_ms(),
            max_attempts: defaults::max_attempts(),
        }
    }
}

/// Scoping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Entries with fewer active installs are not mirrored
    #[serde(default = "defaults::min_active_installs")]
    pub min_active_installs: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_active_installs: defaults::min_active_installs(),
        }
    }
}

/// Destination repository settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// CI workflow template, relative to the storage directory
    #[serde(default = "defaults::workflow_template")]
    pub workflow_template: String,

    /// Parent directory for working copies (system temp dir when unset)
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    #[serde(default = "defaults::default_branch")]
    pub default_branch: String,

    #[serde(default = "defaults::git_host")]
    pub git_host: String,

    /// Mirror operations running at once
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Upper bound for a single git/gh invocation
    #[serde(default = "defaults::command_timeout")]
    pub command_timeout_secs: u64,

    /// Upper bound for a single package download
    #[serde(default = "defaults::download_timeout")]
    pub download_timeout_secs: u64,

    /// Fixed seed for schedule jitter (entropy when unset)
    #[serde(default)]
    pub jitter_seed: Option<u64>,

    /// Commit and push targets.json after the run
    #[serde(default = "defaults::publish_snapshot")]
    pub publish_snapshot: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            workflow_template: defaults::workflow_template(),
            work_dir: None,
            default_branch: defaults::default_branch(),
            git_host: defaults::git_host(),
            max_concurrent: defaults::max_concurrent(),
            command_timeout_secs: defaults::command_timeout(),
            download_timeout_secs: defaults::download_timeout(),
            jitter_seed: None,
            publish_snapshot: defaults::publish_snapshot(),
        }
    }
}

/// Hosting credentials and commit identity.
///
/// Nothing here is validated up front; a missing value surfaces as a
/// failure of the first hosting or git call that needs it.
#[derive(Clone, Default)]
pub struct Credentials {
    pub token: String,
    pub org: String,
    pub username: String,
    pub git_user_name: String,
    pub git_user_email: String,
}

impl Credentials {
    pub fn from_env() -> Self {
        let var = |key: &str| env::var(key).unwrap_or_default();
        Self {
            token: var("GH_TOKEN"),
            org: var("GITHUB_ORG"),
            username: var("GITHUB_USERNAME"),
            git_user_name: var("GIT_USER_NAME"),
            git_user_email: var("GIT_USER_EMAIL"),
        }
    }

    /// Names of the environment variables that are unset or empty.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("GH_TOKEN", &self.token),
            ("GITHUB_ORG", &self.org),
            ("GITHUB_USERNAME", &self.username),
            ("GIT_USER_NAME", &self.git_user_name),
            ("GIT_USER_EMAIL", &self.git_user_email),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| key)
        .collect()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &if self.token.is_empty() { "" } else { "***" })
            .field("org", &self.org)
            .field("username", &self.username)
            .field("git_user_name", &self.git_user_name)
            .field("git_user_email", &self.git_user_email)
            .finish()
    }
}

mod defaults {
    // Catalog defaults
    pub fn plugins_url() -> String {
        "https://api.wordpress.org/plugins/info/1.2/".into()
    }
    pub fn themes_url() -> String {
        "https://api.wordpress.org/themes/info/1.2/".into()
    }
    pub fn plugins_per_page() -> u32 {
        250
    }
    pub fn themes_per_page() -> u32 {
        1000
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; wpmirror/0.1)".into()
    }
    pub fn timeout() -> u64 {
        60
    }
    pub fn backoff_base_ms() -> u64 {
        1000
    }
    pub fn max_attempts() -> u32 {
        8
    }

    // Filter defaults
    pub fn min_active_installs() -> u64 {
        1000
    }

    // Mirror defaults
    pub fn workflow_template() -> String {
        "semgrep.yml".into()
    }
    pub fn default_branch() -> String {
        "main".into()
    }
    pub fn git_host() -> String {
        "github.com".into()
    }
    pub fn max_concurrent() -> usize {
        1
    }
    pub fn command_timeout() -> u64 {
        600
    }
    pub fn download_timeout() -> u64 {
        300
    }
    pub fn publish_snapshot() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.filter.min_active_installs, 1000);
        assert_eq!(config.catalog.max_attempts, 8);
        assert_eq!(config.mirror.max_concurrent, 1);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [filter]
            min_active_installs = 50000

            [mirror]
            max_concurrent = 4
            jitter_seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.filter.min_active_installs, 50000);
        assert_eq!(config.mirror.max_concurrent, 4);
        assert_eq!(config.mirror.jitter_seed, Some(7));
        assert_eq!(config.mirror.default_branch, "main");
        assert_eq!(config.catalog.plugins_per_page, 250);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.mirror.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = Config::default();
        config.catalog.themes_url = "not a url".into();
        assert!(matches!(config.validate(), Err(AppError::Url(_))));
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let config = Config::load_or_default("/definitely/not/here/config.toml");
        assert_eq!(config.mirror.workflow_template, "semgrep.yml");
    }

    #[test]
    fn test_missing_credentials() {
        let creds = Credentials {
            token: "t".into(),
            org: "org".into(),
            ..Credentials::default()
        };
        assert_eq!(
            creds.missing(),
            vec!["GITHUB_USERNAME", "GIT_USER_NAME", "GIT_USER_EMAIL"]
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let creds = Credentials {
            token: "ghp_secret".into(),
            ..Credentials::default()
        };
        assert!(!format!("{creds:?}").contains("ghp_secret"));
    }
}
