use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use anyhow::{Result, Context, anyhow};
use lazy_static::lazy_static;
use std::sync::RwLock;

/// Database configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
    /// Maximum number of connections in the connection pool
    pub max_connections: u32,
}

/// Security configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SecurityConfig {
    /// Master password the secure store key is derived from
    pub master_password: String,
    /// Salt used when deriving the secure store key
    pub master_salt: String,
    /// PBKDF2 iterations for the secure store key
    pub kdf_iterations: u32,
}

/// Two-factor challenge configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TwoFactorConfig {
    /// Minutes a freshly issued code stays valid
    pub code_ttl_minutes: i64,
    /// Wrong guesses allowed before a code is exhausted
    pub max_attempts: u32,
    /// Minutes a verification token can be used to enable 2FA
    pub verification_ttl_minutes: i64,
    /// Return the raw code to the caller. Development only.
    pub expose_codes: bool,
}

impl Default for TwoFactorConfig {
    fn default() -> Self {
        Self {
            code_ttl_minutes: 10,
            max_attempts: 3,
            verification_ttl_minutes: 5,
            expose_codes: false,
        }
    }
}

/// Upper bound for code and verification lifetimes (one day)
pub const MAX_TTL_MINUTES: i64 = 24 * 60;

/// Activity log configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ActivityConfig {
    /// Default number of entries returned by listings
    pub default_limit: usize,
}

/// Global application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Application name
    pub app_name: String,
    /// Application version
    pub version: String,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Two-factor configuration
    pub two_factor: TwoFactorConfig,
    /// Activity log configuration
    pub activity: ActivityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Account Guard".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: DatabaseConfig {
                path: "data/account_guard.db".to_string(),
                max_connections: 10,
            },
            security: SecurityConfig {
                master_password: "change_me_in_production".to_string(),
                master_salt: "account_guard_salt_v1".to_string(),
                kdf_iterations: 100_000,
            },
            two_factor: TwoFactorConfig::default(),
            activity: ActivityConfig {
                default_limit: 50,
            },
        }
    }
}

impl Config {
    /// Reject values that would make the two-factor flow unusable
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_TTL_MINUTES).contains(&self.two_factor.code_ttl_minutes) {
            return Err(anyhow!(
                "two_factor.code_ttl_minutes must be between 1 and {}",
                MAX_TTL_MINUTES
            ));
        }
        if !(1..=MAX_TTL_MINUTES).contains(&self.two_factor.verification_ttl_minutes) {
            return Err(anyhow!(
                "two_factor.verification_ttl_minutes must be between 1 and {}",
                MAX_TTL_MINUTES
            ));
        }
        if self.two_factor.max_attempts == 0 {
            return Err(anyhow!("two_factor.max_attempts must be at least 1"));
        }
        if self.database.max_connections == 0 {
            return Err(anyhow!("database.max_connections must be at least 1"));
        }
        Ok(())
    }
}

/// Environment variables that override the file, so secrets can live in `.env`
pub const ENV_MASTER_PASSWORD: &str = "ACCOUNT_GUARD_MASTER_PASSWORD";
pub const ENV_DATABASE_PATH: &str = "ACCOUNT_GUARD_DATABASE_PATH";
pub const ENV_EXPOSE_CODES: &str = "ACCOUNT_GUARD_EXPOSE_CODES";

/// Overlay environment variables on top of `config`
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Ok(password) = std::env::var(ENV_MASTER_PASSWORD) {
        config.security.master_password = password;
    }
    if let Ok(path) = std::env::var(ENV_DATABASE_PATH) {
        config.database.path = path;
    }
    if let Ok(value) = std::env::var(ENV_EXPOSE_CODES) {
        config.two_factor.expose_codes = value
            .parse()
            .map_err(|_| anyhow!("{} must be true or false, got {}", ENV_EXPOSE_CODES, value))?;
    }
    Ok(())
}

// Global configuration instance
lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::default());
}

/// Load configuration from file
pub fn load_config(path: &str) -> Result<()> {
    // Check if file exists
    if !Path::new(path).exists() {
        // If not, create default config and save it
        let mut default_config = Config::default();
        save_config(path, &default_config)?;
        apply_env_overrides(&mut default_config)?;
        return update_config(default_config);
    }

    // Read the config file
    let mut file = File::open(path).context(format!("Failed to open config file: {}", path))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).context("Failed to read config file")?;

    // Parse the config file
    let mut config: Config = match path.ends_with(".toml") {
        true => toml::from_str(&contents).context("Failed to parse TOML config")?,
        false => serde_json::from_str(&contents).context("Failed to parse JSON config")?,
    };

    apply_env_overrides(&mut config)?;
    config.validate().context(format!("Invalid configuration in {}", path))?;
    update_config(config)
}

/// Save configuration to file
pub fn save_config(path: &str, config: &Config) -> Result<()> {
    // Create parent directory if it doesn't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
    }

    // Serialize the config
    let serialized = match path.ends_with(".toml") {
        true => toml::to_string_pretty(config).context("Failed to serialize config to TOML")?,
        false => serde_json::to_string_pretty(config).context("Failed to serialize config to JSON")?,
    };

    std::fs::write(path, serialized).context(format!("Failed to write config to file: {}", path))?;

    Ok(())
}

/// Get a copy of the current config
pub fn get_config() -> Config {
    match CONFIG.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Update the current config
pub fn update_config(config: Config) -> Result<()> {
    let mut guard = CONFIG.write().map_err(|_| anyhow!("Configuration lock poisoned"))?;
    *guard = config;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.app_name, "Account Guard");
        assert_eq!(config.two_factor.code_ttl_minutes, 10);
        assert_eq!(config.two_factor.max_attempts, 3);
        assert!(!config.two_factor.expose_codes);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_two_factor_settings_rejected() {
        let mut config = Config::default();
        config.two_factor.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.two_factor.code_ttl_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lifetimes_capped_at_one_day() {
        let mut config = Config::default();
        config.two_factor.code_ttl_minutes = MAX_TTL_MINUTES;
        config.two_factor.verification_ttl_minutes = MAX_TTL_MINUTES;
        assert!(config.validate().is_ok());

        config.two_factor.code_ttl_minutes = 1_000_000_000_000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.two_factor.verification_ttl_minutes = MAX_TTL_MINUTES + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_save_config() {
        let dir = tempdir().unwrap();
        let toml_path = dir.path().join("test_config.toml");
        let json_path = dir.path().join("test_config.json");

        let mut config = Config::default();
        config.two_factor.expose_codes = true;
        config.database.path = "custom.db".to_string();

        save_config(toml_path.to_str().unwrap(), &config).unwrap();
        save_config(json_path.to_str().unwrap(), &config).unwrap();

        let contents = std::fs::read_to_string(&toml_path).unwrap();
        let parsed: Config = toml::from_str(&contents).unwrap();
        assert!(parsed.two_factor.expose_codes);
        assert_eq!(parsed.database.path, "custom.db");

        let contents = std::fs::read_to_string(&json_path).unwrap();
        let parsed: Config = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.security.master_salt, config.security.master_salt);
    }
}
