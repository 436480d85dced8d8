//! TOML-based configuration for the svn adapter.
//!
//! Passwords are never stored in the file: `*_env` fields name environment
//! variables whose values are resolved at runtime via
//! [`AdapterConfig::resolve_env_vars`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::layout::RepoLayout;
use crate::svn::{Credentials, ProxySettings};
use crate::workspace::DEFAULT_MAX_WORKING_COPIES;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Adapter configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Repository and credentials.
    pub svn: SvnConfig,

    /// Local working-copy pool.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// HTTP proxy for `http://`/`https://` repositories.
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

fn default_log_level() -> String {
    "info".into()
}

// ---------------------------------------------------------------------------
// SVN
// ---------------------------------------------------------------------------

/// SVN repository configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvnConfig {
    /// Repository URL; `trunk/`, `branches/` and `tags/` live directly below it.
    pub url: String,

    #[serde(default)]
    pub username: Option<String>,

    /// Name of the environment variable holding the SVN password.
    #[serde(default)]
    pub password_env: Option<String>,

    /// Resolved password (populated at runtime, never serialized).
    #[serde(skip)]
    pub password: Option<String>,
}

impl SvnConfig {
    /// Credentials to hand to the client, if a username is configured.
    pub fn credentials(&self) -> Option<Credentials> {
        self.username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: self.password.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

/// Where scratch working copies live and how many may exist at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_home")]
    pub home: PathBuf,

    #[serde(default = "default_max_working_copies")]
    pub max_working_copies: usize,
}

fn default_home() -> PathBuf {
    std::env::temp_dir().join("svnvcs")
}
fn default_max_working_copies() -> usize {
    DEFAULT_MAX_WORKING_COPIES
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            home: default_home(),
            max_working_copies: default_max_working_copies(),
        }
    }
}

// ---------------------------------------------------------------------------
// Proxy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password_env: Option<String>,

    #[serde(skip)]
    pub password: Option<String>,
}

impl ProxyConfig {
    pub fn settings(&self) -> ProxySettings {
        ProxySettings {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AdapterConfig {
    /// Minimal configuration for `url` with every other field defaulted.
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            log_level: default_log_level(),
            svn: SvnConfig {
                url: url.into(),
                username: None,
                password_env: None,
                password: None,
            },
            workspace: WorkspaceConfig::default(),
            proxy: None,
        }
    }

    /// Load an [`AdapterConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AdapterConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve all `*_env` fields from environment variables.
    ///
    /// A missing variable only logs a warning; the adapter then runs without
    /// that password.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref env_name) = self.svn.password_env {
            self.svn.password = resolve_optional_env(env_name, "svn.password_env");
        }
        if let Some(proxy) = self.proxy.as_mut() {
            if let Some(ref env_name) = proxy.password_env {
                proxy.password = resolve_optional_env(env_name, "proxy.password_env");
            }
        }
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.svn.url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "svn.url".into(),
                detail: "SVN URL must not be empty".into(),
            });
        }
        RepoLayout::new(&self.svn.url)?;
        if self.workspace.max_working_copies == 0 {
            return Err(ConfigError::InvalidValue {
                field: "workspace.max_working_copies".into(),
                detail: "at least one working copy is required".into(),
            });
        }
        if let Some(proxy) = &self.proxy {
            if proxy.host.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "proxy.host".into(),
                    detail: "proxy host must not be empty".into(),
                });
            }
            if proxy.port == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "proxy.port".into(),
                    detail: "proxy port must be > 0".into(),
                });
            }
        }
        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}
