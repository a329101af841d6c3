//! Explicit configuration passed to every entry point.
//!
//! Network settings (proxy, timeout, source URLs) and display settings live
//! here instead of in process-wide state. A TOML file is optional; missing
//! keys fall back to the defaults below.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{FundsError, Result};

pub const DEFAULT_CVM_BASE_URL: &str = "http://dados.cvm.gov.br/dados";
pub const DEFAULT_BCB_BASE_URL: &str = "http://api.bcb.gov.br/dados/serie";
pub const DEFAULT_TESOURO_CSV_URL: &str = "https://www.tesourotransparente.gov.br/ckan/dataset/df56aa42-484a-4a59-8184-7676580c81e3/resource/796d2059-14e9-44e3-80c9-2d9e30b405c1/download/precotaxatesourodireto.csv";
pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
pub const DEFAULT_PROXY_USER_VAR: &str = "COTAS_PROXY_USER";

/// Trading days per year used by every annualization
pub const TRADING_DAYS_PER_YEAR: u32 = 252;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FundsConfig {
    pub cvm_base_url: String,
    pub bcb_base_url: String,
    pub tesouro_csv_url: String,
    pub yahoo_base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub proxy: Option<ProxyConfig>,
    pub display: DisplayConfig,
}

impl Default for FundsConfig {
    fn default() -> Self {
        Self {
            cvm_base_url: DEFAULT_CVM_BASE_URL.to_string(),
            bcb_base_url: DEFAULT_BCB_BASE_URL.to_string(),
            tesouro_csv_url: DEFAULT_TESOURO_CSV_URL.to_string(),
            yahoo_base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
            timeout_secs: 300,
            user_agent: "Mozilla/5.0 (compatible; CotasBot/1.0)".to_string(),
            proxy: None,
            display: DisplayConfig::default(),
        }
    }
}

/// Proxy used for every request. `verify_tls = false` mirrors corporate
/// proxies that re-sign TLS traffic.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
}

fn default_verify_tls() -> bool {
    true
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            verify_tls: true,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Build a proxy whose user name comes from the environment variable
    /// `user_var` (lower-cased), [`DEFAULT_PROXY_USER_VAR`] when `None`.
    /// The password is always supplied by the caller.
    pub fn from_env(url: impl Into<String>, user_var: Option<&str>, password: impl Into<String>) -> Result<Self> {
        let user_var = user_var.unwrap_or(DEFAULT_PROXY_USER_VAR);
        let user = std::env::var(user_var).map_err(|_| {
            FundsError::InvalidParameter(format!("environment variable {} is not set", user_var))
        })?;
        Ok(Self::new(url).with_credentials(user.trim().to_lowercase(), password))
    }
}

/// Display settings for tables rendered by [`crate::display`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Decimal places for percentages
    pub precision: usize,
    /// Maximum rows printed per table (0 = unlimited)
    pub max_rows: usize,
    pub colorize: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            precision: 2,
            max_rows: 100,
            colorize: true,
        }
    }
}

impl FundsConfig {
    /// Load configuration from `path`, or from the default location when
    /// `None`. A missing default file yields [`FundsConfig::default`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml(&content)?;
        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| FundsError::parse("invalid configuration", e))
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }
}

/// `<config dir>/cotas/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dir_spec::config_home)
        .map(|dir| dir.join("cotas").join("config.toml"))
}
