use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{StoreOptions, DEFAULT_CAPACITY, DEFAULT_NAMESPACE, DEFAULT_TTL};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the dashboard backend, e.g. "http://localhost:5000"
  pub url: String,
  /// Username for HTTP Basic auth on protected endpoints
  pub username: String,
  /// Per-request deadline
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  10
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Disable to run without any persisted data
  pub enabled: bool,
  pub namespace: String,
  pub default_ttl_secs: u64,
  pub capacity: usize,
  /// Cache database location (defaults to the user data directory)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      namespace: DEFAULT_NAMESPACE.to_string(),
      default_ttl_secs: DEFAULT_TTL.as_secs(),
      capacity: DEFAULT_CAPACITY,
      path: None,
    }
  }
}

impl CacheConfig {
  pub fn store_options(&self) -> StoreOptions {
    StoreOptions {
      namespace: self.namespace.clone(),
      default_ttl: Duration::from_secs(self.default_ttl_secs),
      capacity: self.capacity,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./dnsdash.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/dnsdash/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/dnsdash/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("dnsdash.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("dnsdash").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.cache.default_ttl_secs == 0 {
      return Err(eyre!("cache.default_ttl_secs must be positive"));
    }
    Ok(config)
  }

  /// Get the API password from the environment.
  ///
  /// Checks DNSDASH_API_PASSWORD.
  pub fn get_password() -> Result<String> {
    std::env::var("DNSDASH_API_PASSWORD").map_err(|_| {
      eyre!("API password not found. Set the DNSDASH_API_PASSWORD environment variable.")
    })
  }
}
