use crate::constants::{DEFAULT_GREETING, MOUNT_SEGMENT_REGEX, USERNAME_REGEX};
use crate::core_vfs::{normalize, FileSystem, LocalFs, MemoryFs, MountTable};
use anyhow::{Context, Result};
use log::{error, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Passive port range {min}-{max} is empty")]
    InvalidPortRange { min: u16, max: u16 },

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Either password or password_hash must be set")]
    MissingPassword,

    #[error("Invalid mount prefix: {0}")]
    InvalidPrefix(String),

    #[error("Mount prefix {0} is declared twice")]
    DuplicatePrefix(String),

    #[error("Local mount {0} needs a root directory")]
    MissingRoot(String),

    #[error("Memory mount {0} needs a capacity")]
    MissingCapacity(String),

    #[error("Invalid validation pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Address advertised in PASV replies. Defaults to the local address of
    /// the control connection.
    #[serde(default)]
    pub pasv_address: Option<Ipv4Addr>,
    #[serde(default = "default_pasv_port_min")]
    pub pasv_port_min: u16,
    #[serde(default = "default_pasv_port_max")]
    pub pasv_port_max: u16,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    /// bcrypt hash, takes precedence over `password`.
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    #[serde(default = "default_max_login_failures")]
    pub max_login_failures: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    Local,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MountConfig {
    pub prefix: String,
    pub kind: MountKind,
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub create: bool,
    /// Bytes available to the mount. Required for memory mounts.
    #[serde(default)]
    pub capacity: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default, rename = "mount")]
    pub mounts: Vec<MountConfig>,
}

fn default_listen_address() -> String {
    String::from("0.0.0.0")
}

fn default_listen_port() -> u16 {
    21
}

fn default_pasv_port_min() -> u16 {
    49152
}

fn default_pasv_port_max() -> u16 {
    65535
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}

fn default_idle_timeout() -> u64 {
    300
}

fn default_max_sessions() -> usize {
    8
}

fn default_max_login_failures() -> u32 {
    5
}

impl ServerConfig {
    /// Checks a PASS secret against the configured credentials.
    pub fn verify_password(&self, secret: &str) -> bool {
        if let Some(hash) = &self.password_hash {
            return match bcrypt::verify(secret, hash) {
                Ok(valid) => valid,
                Err(e) => {
                    error!("Configured password hash is unusable: {}", e);
                    false
                }
            };
        }
        self.password.as_deref() == Some(secret)
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let server = &self.server;
        if server.pasv_port_min == 0 || server.pasv_port_min > server.pasv_port_max {
            return Err(ConfigError::InvalidPortRange {
                min: server.pasv_port_min,
                max: server.pasv_port_max,
            });
        }

        if !Regex::new(USERNAME_REGEX)?.is_match(&server.username) {
            return Err(ConfigError::InvalidUsername(server.username.clone()));
        }

        if server.password.is_none() && server.password_hash.is_none() {
            return Err(ConfigError::MissingPassword);
        }

        let segment = Regex::new(MOUNT_SEGMENT_REGEX)?;
        let mut seen = HashSet::new();
        for mount in &self.mounts {
            let prefix = normalize(&mount.prefix);
            let valid = prefix != "/"
                && prefix
                    .trim_matches('/')
                    .split('/')
                    .all(|part| part != ".." && segment.is_match(part));
            if !valid {
                return Err(ConfigError::InvalidPrefix(mount.prefix.clone()));
            }
            if !seen.insert(prefix) {
                return Err(ConfigError::DuplicatePrefix(mount.prefix.clone()));
            }
            match mount.kind {
                MountKind::Local if mount.root.is_none() => {
                    return Err(ConfigError::MissingRoot(mount.prefix.clone()))
                }
                MountKind::Memory if mount.capacity.is_none() => {
                    return Err(ConfigError::MissingCapacity(mount.prefix.clone()))
                }
                _ => {}
            }
        }

        if self.mounts.is_empty() {
            warn!("No mounts configured, clients will only see an empty root");
        }
        Ok(())
    }
}

/// Parses a configuration document and validates it.
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents).context("Failed to parse configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub fn load_config(path: &str) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path))?;
    parse_config(&contents).with_context(|| format!("Failed to load configuration file: {}", path))
}

/// Initialises every configured backend. A backend that fails to come up
/// stays in the table as unavailable.
pub fn build_mounts(mounts: &[MountConfig]) -> MountTable {
    let mut table = MountTable::new();

    for mount in mounts {
        let (fs, available): (Arc<dyn FileSystem>, bool) = match mount.kind {
            MountKind::Local => {
                let root = mount.root.clone().unwrap_or_default();
                let local = LocalFs::new(&root, mount.capacity);
                let available = match local.init(mount.create) {
                    Ok(()) => true,
                    Err(e) => {
                        error!(
                            "Mount {} unavailable, cannot use {}: {}",
                            mount.prefix,
                            root.display(),
                            e
                        );
                        false
                    }
                };
                (Arc::new(local), available)
            }
            MountKind::Memory => (Arc::new(MemoryFs::new(mount.capacity.unwrap_or(0))), true),
        };

        let id = table.mount(&mount.prefix, fs, available);
        info!("Mounted {:?} at {} ({:?})", mount.kind, mount.prefix, id);
    }

    table
}
