use crate::cache::PersistPolicy;
use crate::portal::{Credentials, PortalConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const USERNAME_ENV: &str = "COMPASS_USERNAME";
pub const PASSWORD_ENV: &str = "COMPASS_PASSWORD";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default)]
    pub portal: PortalConfig,
    /// Directory for settled months. Defaults to `~/.compass-usage/cache/`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Address to serve on. A bare `:port` binds every interface.
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub persist_policy: PersistPolicy,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            portal: PortalConfig::default(),
            cache_dir: None,
            listen: default_listen(),
            persist_policy: PersistPolicy::default(),
            username: None,
            password: None,
        }
    }
}

fn default_listen() -> String {
    ":8080".to_string()
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file as YAML: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let base_url = &self.portal.base_url;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            anyhow::bail!("Portal base_url must be an http(s) URL, got '{}'", base_url);
        }

        if self.portal.timeout_secs == Some(0) {
            anyhow::bail!("Portal timeout_secs must be positive; omit it to wait indefinitely");
        }

        self.listen_addr()?;
        Ok(())
    }

    /// Parses `listen`, accepting the `:8080` shorthand for all interfaces.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let listen = if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        };
        listen
            .parse()
            .with_context(|| format!("Invalid listen address '{}'", self.listen))
    }

    /// Credentials from the config, falling back to `COMPASS_USERNAME` and
    /// `COMPASS_PASSWORD`.
    pub fn credentials(&self) -> Result<Credentials> {
        let username = self
            .username
            .clone()
            .or_else(|| non_empty_env(USERNAME_ENV))
            .with_context(|| format!("No portal username: pass --username or set {}", USERNAME_ENV))?;
        let password = self
            .password
            .clone()
            .or_else(|| non_empty_env(PASSWORD_ENV))
            .with_context(|| format!("No portal password: pass --password or set {}", PASSWORD_ENV))?;
        Ok(Credentials::new(username, password))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => crate::paths::default_cache_dir(),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
