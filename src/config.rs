use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::normalize::coerce::is_hex_address;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

pub const ENV_API_KEY: &str = "QUAI_API_KEY";
pub const ENV_STORE_URL: &str = "SUPABASE_URL";
pub const ENV_STORE_KEY: &str = "SUPABASE_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

// ============================================================
// Explorer
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ExplorerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_explorer_timeout_ms")]
    pub timeout_ms: u64,
    /// Decimals of the native token's smallest unit.
    #[serde(default = "default_native_decimals")]
    pub native_decimals: u32,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_explorer_timeout_ms(),
            native_decimals: default_native_decimals(),
        }
    }
}

fn default_base_url() -> String {
    "https://quaiscan.io/api".to_string()
}

fn default_explorer_timeout_ms() -> u64 {
    10_000
}

fn default_native_decimals() -> u32 {
    18
}

// ============================================================
// Mirror store
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
    /// The schema is owned by the hosted store; only apply ours when asked.
    #[serde(default)]
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            timeout_ms: default_store_timeout_ms(),
            run_migrations: false,
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

// ============================================================
// Dashboard
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(default = "default_reference_wallet")]
    pub reference_wallet: String,
    #[serde(default = "default_latest_blocks")]
    pub latest_blocks: usize,
    #[serde(default = "default_tx_page_size")]
    pub tx_page_size: u32,
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
    #[serde(default = "default_true")]
    pub sync_on_startup: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            reference_wallet: default_reference_wallet(),
            latest_blocks: default_latest_blocks(),
            tx_page_size: default_tx_page_size(),
            refresh_secs: default_refresh_secs(),
            sync_on_startup: true,
        }
    }
}

fn default_reference_wallet() -> String {
    "0x002624Fa55DFf0ca53aF9166B4d44c16a294C4e0".to_string()
}

fn default_latest_blocks() -> usize {
    10
}

fn default_tx_page_size() -> u32 {
    25
}

fn default_refresh_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

// ============================================================
// API Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_api_host")]
    pub host: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
            host: default_api_host(),
        }
    }
}

fn default_api_port() -> u16 {
    5000
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

impl Config {
    /// Load from `path`, or from `config.toml` when present, or fall back to
    /// defaults. An explicitly named file must exist.
    pub fn load(path: Option<&str>) -> eyre::Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(DEFAULT_CONFIG_PATH)?
            }
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))
    }

    fn validate(&self) -> eyre::Result<()> {
        let base_url = &self.explorer.base_url;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(eyre::eyre!("Invalid explorer base_url '{}'", base_url));
        }
        if self.explorer.timeout_ms == 0 || self.database.timeout_ms == 0 {
            return Err(eyre::eyre!("Timeouts must be greater than zero"));
        }
        if self.explorer.native_decimals > 36 {
            return Err(eyre::eyre!(
                "native_decimals {} is out of range",
                self.explorer.native_decimals
            ));
        }
        if !is_hex_address(&self.dashboard.reference_wallet) {
            return Err(eyre::eyre!(
                "Invalid reference wallet '{}'",
                self.dashboard.reference_wallet
            ));
        }
        if !(1..=100).contains(&self.dashboard.latest_blocks) {
            return Err(eyre::eyre!("latest_blocks must be between 1 and 100"));
        }
        if !(1..=1000).contains(&self.dashboard.tx_page_size) {
            return Err(eyre::eyre!("tx_page_size must be between 1 and 1000"));
        }
        if self.dashboard.refresh_secs == 0 {
            return Err(eyre::eyre!("refresh_secs must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================
// Secrets
// ============================================================

/// Credentials supplied through the environment. Every value is required.
#[derive(Clone)]
pub struct Secrets {
    pub api_key: String,
    /// Postgres connection URL of the hosted store.
    pub store_url: String,
    /// Store password; replaces any password embedded in `store_url`.
    pub store_key: String,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("api_key", &"<redacted>")
            .field("store_url", &"<redacted>")
            .field("store_key", &"<redacted>")
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> eyre::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Fails naming every missing or empty variable.
    pub fn from_lookup<F>(lookup: F) -> eyre::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut require = |name: &'static str| match lookup(name) {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => {
                missing.push(name);
                String::new()
            }
        };

        let api_key = require(ENV_API_KEY);
        let store_url = require(ENV_STORE_URL);
        let store_key = require(ENV_STORE_KEY);

        if !missing.is_empty() {
            return Err(eyre::eyre!(
                "Missing required environment variables: {}",
                missing.join(", ")
            ));
        }

        Ok(Self {
            api_key,
            store_url,
            store_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
[explorer]
base_url = "https://explorer.example/api"
native_decimals = 18

[database]
max_connections = 2
run_migrations = true

[dashboard]
latest_blocks = 20
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.explorer.base_url, "https://explorer.example/api");
        assert_eq!(config.explorer.timeout_ms, 10_000); // default
        assert_eq!(config.database.max_connections, 2);
        assert!(config.database.run_migrations);
        assert_eq!(config.dashboard.latest_blocks, 20);
        assert_eq!(config.dashboard.tx_page_size, 25); // default
        assert_eq!(config.api.port, 5000); // default
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.explorer.base_url, "https://quaiscan.io/api");
        assert_eq!(
            config.dashboard.reference_wallet,
            "0x002624Fa55DFf0ca53aF9166B4d44c16a294C4e0"
        );
        assert!(config.dashboard.sync_on_startup);
        assert!(!config.database.run_migrations);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_base_url() {
        let mut config = Config::default();
        config.explorer.base_url = "quaiscan.io/api".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_reference_wallet() {
        let mut config = Config::default();
        config.dashboard.reference_wallet = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = Config::default();
        config.dashboard.latest_blocks = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.explorer.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        assert!(Config::load(Some("/nonexistent/dashboard.toml")).is_err());
    }

    #[test]
    fn test_secrets_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_KEY, "key"),
            (ENV_STORE_URL, "postgres://db.example/postgres"),
            (ENV_STORE_KEY, "secret"),
        ]);
        let secrets = Secrets::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(secrets.api_key, "key");
        assert_eq!(secrets.store_url, "postgres://db.example/postgres");
        assert!(!format!("{:?}", secrets).contains("secret"));
    }

    #[test]
    fn test_secrets_report_every_missing_variable() {
        let env: HashMap<&str, &str> = HashMap::from([(ENV_STORE_URL, "postgres://db")]);
        let err = Secrets::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(ENV_API_KEY));
        assert!(msg.contains(ENV_STORE_KEY));
        assert!(!msg.contains(ENV_STORE_URL));
    }

    #[test]
    fn test_blank_secret_counts_as_missing() {
        let err = Secrets::from_lookup(|k| {
            Some(if k == ENV_API_KEY { "  " } else { "x" }.to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains(ENV_API_KEY));
    }
}
