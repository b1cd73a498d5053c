//! Configuration for the Anvil agent.

use anyhow::{Context, Result};
use anvil_agent_lib::CertStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure loaded from a TOML file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Coordination server endpoints
    pub server: ServerSection,
    /// TLS/certificate settings
    #[serde(default)]
    pub tls: TlsSection,
    /// Registration settings (optional)
    #[serde(default)]
    pub agent: AgentSection,
}

/// Coordination server endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    /// Server hostname
    #[serde(default = "default_host")]
    pub host: String,
    /// TLS port
    #[serde(default = "default_ssl_port")]
    pub ssl_port: u16,
    /// Plaintext HTTP port (registration only)
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

/// TLS/certificate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsSection {
    /// Directory for the fetched CA and issued agent certificates
    #[serde(default = "default_certs_dir")]
    pub certs_dir: PathBuf,
}

/// Auto-registration fields advertised to the server.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AgentSection {
    #[serde(default)]
    pub auto_register_key: String,
    #[serde(default)]
    pub auto_register_resources: String,
    #[serde(default)]
    pub auto_register_environments: String,
    #[serde(default)]
    pub auto_register_hostname: String,
    #[serde(default)]
    pub elastic_agent_id: String,
    #[serde(default)]
    pub elastic_plugin_id: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_ssl_port() -> u16 {
    8154
}

fn default_http_port() -> u16 {
    8153
}

fn default_certs_dir() -> PathBuf {
    CertStore::default_path("anvil-agent")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            ssl_port: default_ssl_port(),
            http_port: default_http_port(),
        }
    }
}

impl Default for TlsSection {
    fn default() -> Self {
        Self {
            certs_dir: default_certs_dir(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            tls: TlsSection::default(),
            agent: AgentSection::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.tls.certs_dir = expand_tilde(&config.tls.certs_dir);
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Get the default configuration file path.
    ///
    /// - macOS: `~/Library/Application Support/anvil-agent/config.toml`
    /// - Linux: `~/.config/anvil-agent/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("anvil-agent")
            .join("config.toml")
    }
}

/// Expand ~ to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if path_str.starts_with("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(&path_str[2..]);
            }
        }
    }
    path.to_path_buf()
}
