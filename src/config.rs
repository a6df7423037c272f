use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::SshmError;

pub const DEFAULT_INVENTORY_PATH: &str = "~/.sshmhosts.yaml";

fn default_inventory_path() -> String {
    DEFAULT_INVENTORY_PATH.to_string()
}

fn default_ssh_command() -> String {
    "ssh".to_string()
}

fn default_verify_tls() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Connection settings for syncing from Netbox
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetboxConfig {
    /// Base URL, eg `https://netbox.example.com`
    pub url: String,
    pub token: String,
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl NetboxConfig {
    pub fn check(&self) -> Result<(), SshmError> {
        if self.url.trim().is_empty() {
            return Err(SshmError::MissingConfiguration(
                "netbox.url is empty".to_string(),
            ));
        }
        if self.token.trim().is_empty() {
            return Err(SshmError::MissingConfiguration(
                "netbox.token is empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Hosts file, `~` is expanded
    #[serde(default = "default_inventory_path")]
    pub inventory_path: String,
    /// Login name passed to ssh when none is given on the command line
    #[serde(default)]
    pub default_user: Option<String>,
    #[serde(default = "default_ssh_command")]
    pub ssh_command: String,
    #[serde(default)]
    pub netbox: Option<NetboxConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            inventory_path: default_inventory_path(),
            default_user: None,
            ssh_command: default_ssh_command(),
            netbox: None,
        }
    }
}

impl AppConfig {
    /// `<config dir>/sshm/config.json`
    pub fn default_path() -> Result<PathBuf, SshmError> {
        match dirs::config_dir() {
            Some(val) => Ok(val.join("sshm").join("config.json")),
            None => shellexpand::tilde("~/.config/sshm/config.json")
                .parse()
                .map_err(|err| {
                    SshmError::Config(format!(
                        "Failed to determine user config directory: {err}"
                    ))
                }),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SshmError> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SshmError> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Load the config at `path`, writing a default one first if there is nothing there.
    ///
    /// A file that exists but can't be read or parsed is an error rather than being replaced.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, SshmError> {
        let path = path.as_ref();
        match Self::load_from_file(path) {
            Ok(config) => {
                debug!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(err) if path.exists() => {
                error!(
                    "Error loading existing config file '{}': {}",
                    path.display(),
                    err
                );
                Err(SshmError::Config(format!(
                    "Config file exists but cannot be loaded: {err}"
                )))
            }
            Err(_) => {
                info!(
                    "Config file '{}' not found, creating default configuration",
                    path.display()
                );
                let config = AppConfig::default();
                config.save_to_file(path)?;
                Ok(config)
            }
        }
    }

    /// The hosts file with `~` expanded.
    pub fn inventory_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.inventory_path).as_ref())
    }

    pub fn netbox(&self) -> Result<&NetboxConfig, SshmError> {
        let netbox = self.netbox.as_ref().ok_or_else(|| {
            SshmError::MissingConfiguration(
                "no \"netbox\" section in the config file, sync is unavailable".to_string(),
            )
        })?;
        netbox.check()?;
        Ok(netbox)
    }
}
