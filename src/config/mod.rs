// Configuration management
use crate::arn::{parse_account_id, parse_role_arn};
use crate::error::{Result, SsoError};
use crate::url::UrlAction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SSO_NAME: &str = "Default";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Instance used when neither --sso nor AWS_SSO is given
    #[serde(default)]
    pub default_sso: Option<String>,
    #[serde(default)]
    pub sso: BTreeMap<String, SsoConfig>,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Minutes a role stays in history; 0 or less keeps it until evicted by count
    #[serde(default = "default_history_minutes")]
    pub history_minutes: i64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: i64,
    #[serde(default = "default_timeout_secs")]
    pub credential_timeout_secs: u64,
    #[serde(default)]
    pub url_action: UrlAction,
    #[serde(default)]
    pub clipboard_command: Option<Vec<String>>,
    /// Modification time of the file this was loaded from, 0 if none
    #[serde(skip)]
    modified_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SsoConfig {
    pub sso_region: String,
    pub start_url: String,
    #[serde(default)]
    pub default_region: Option<String>,
    /// `[sso-session]` name used by `aws sso login`, which keys its token cache
    #[serde(default)]
    pub sso_session: Option<String>,
    /// Overrides keyed by AWS account id
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub default_region: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Overrides keyed by role name
    #[serde(default)]
    pub roles: BTreeMap<String, RoleConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleConfig {
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub default_region: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// ARN of the role this one is assumed through
    #[serde(default)]
    pub via: Option<String>,
}

fn default_history_limit() -> usize {
    10
}

fn default_history_minutes() -> i64 {
    1440
}

fn default_cache_ttl_secs() -> i64 {
    86400
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_sso: None,
            sso: BTreeMap::new(),
            history_limit: default_history_limit(),
            history_minutes: default_history_minutes(),
            cache_ttl_secs: default_cache_ttl_secs(),
            credential_timeout_secs: default_timeout_secs(),
            url_action: UrlAction::default(),
            clipboard_command: None,
            modified_at: 0,
        }
    }
}

impl SsoConfig {
    /// Account overrides with their ids parsed
    pub fn account_overrides(&self) -> Result<Vec<(u64, &AccountConfig)>> {
        self.accounts
            .iter()
            .map(|(id, account)| Ok((parse_account_id(id)?, account)))
            .collect()
    }
}

impl Config {
    /// Get the config directory path
    ///
    /// Priority:
    /// 1. XDG_CONFIG_HOME/ssorole (if env var is set)
    /// 2. ~/.config/ssorole (if ~/.config exists)
    /// 3. ~/.ssorole (fallback on Unix, doesn't create ~/.config)
    /// 4. Platform default on Windows
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config).join("ssorole"));
        }

        #[cfg(unix)]
        {
            if let Some(home_dir) = dirs::home_dir() {
                let xdg_config = home_dir.join(".config");
                if xdg_config.exists() {
                    return Ok(xdg_config.join("ssorole"));
                }
                return Ok(home_dir.join(".ssorole"));
            }
        }

        #[cfg(not(unix))]
        {
            if let Some(config_dir) = dirs::config_dir() {
                return Ok(config_dir.join("ssorole"));
            }
        }

        Err(SsoError::ConfigError(
            "Could not determine config directory".to_string(),
        ))
    }

    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn cache_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("cache.json"))
    }

    pub fn store_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("store.json"))
    }

    /// Load configuration from `path` (or the default location) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_file_path()?,
        };

        let mut config = if config_path.exists() {
            tracing::debug!("Loading config from: {}", config_path.display());
            let contents = fs::read_to_string(&config_path)
                .map_err(|e| SsoError::ConfigError(format!("Failed to read config file: {}", e)))?;
            let mut config = Self::parse(&contents)?;
            config.modified_at = file_modified_at(&config_path)?;
            config
        } else {
            tracing::debug!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            Config::default()
        };

        // AWS_SSO_START_URL/AWS_SSO_REGION define an instance when the file has none
        if config.sso.is_empty() {
            if let (Ok(start_url), Ok(region)) = (
                std::env::var("AWS_SSO_START_URL"),
                std::env::var("AWS_SSO_REGION"),
            ) {
                tracing::debug!("Using SSO instance from environment: {}", start_url);
                config.sso.insert(
                    DEFAULT_SSO_NAME.to_string(),
                    SsoConfig {
                        sso_region: region,
                        start_url,
                        default_region: None,
                        sso_session: None,
                        accounts: BTreeMap::new(),
                    },
                );
            }
        }

        Ok(config)
    }

    /// Parse and validate TOML settings
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| SsoError::ConfigError(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, sso) in &self.sso {
            if sso.start_url.is_empty() || sso.sso_region.is_empty() {
                return Err(SsoError::InvalidConfig(format!(
                    "SSO instance '{}' needs both start_url and sso_region",
                    name
                )));
            }
            for (_, account) in sso.account_overrides()? {
                for role in account.roles.values() {
                    if let Some(via) = &role.via {
                        parse_role_arn(via)?;
                    }
                }
            }
        }
        if let Some(default) = &self.default_sso {
            if !self.sso.contains_key(default) {
                return Err(SsoError::InvalidConfig(format!(
                    "default_sso '{}' is not a configured SSO instance",
                    default
                )));
            }
        }
        Ok(())
    }

    /// Modification marker of the loaded config file (Unix seconds)
    pub fn modified_at(&self) -> i64 {
        self.modified_at
    }

    /// Resolve which SSO instance to use
    pub fn select_sso(&self, name: Option<&str>) -> Result<(&str, &SsoConfig)> {
        let name = match name.or(self.default_sso.as_deref()) {
            Some(name) => name,
            None if self.sso.len() == 1 => self.sso.keys().next().map(String::as_str).unwrap_or_default(),
            None if self.sso.is_empty() => {
                return Err(SsoError::ConfigError(
                    "No SSO instance configured. Add an [sso.<name>] section to the config file \
                     or set AWS_SSO_START_URL and AWS_SSO_REGION"
                        .to_string(),
                ))
            }
            None => {
                return Err(SsoError::ConfigError(
                    "Please specify --sso, $AWS_SSO or set default_sso in the config file"
                        .to_string(),
                ))
            }
        };

        self.sso
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| {
                let names: Vec<&str> = self.sso.keys().map(String::as_str).collect();
                SsoError::ConfigError(format!(
                    "Invalid SSO name: {}. Valid options: {}",
                    name,
                    names.join(", ")
                ))
            })
    }
}

fn file_modified_at(path: &Path) -> Result<i64> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Utc>::from(modified).timestamp())
}
