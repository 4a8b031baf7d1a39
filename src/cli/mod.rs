// Command handlers for the account-guard binary.
// Each submodule prints its own output and returns anyhow errors to main.

use anyhow::{Result, Context};
use std::sync::Arc;

use crate::audit::ActivityLogger;
use crate::config::Config;
use crate::database::DbPool;
use crate::delivery::LoggingDeliveryChannel;
use crate::security::{self, CodeVerifier};
use crate::storage::{SqliteSecureStore, SqliteUserStore};
use crate::user::{TwoFactorService, TwoFactorSettings};

pub mod activity;
pub mod password;
pub mod two_factor;
pub mod user;
pub mod utils;

/// Actor recorded for activity that is not performed by a particular user
pub const CLI_ACTOR: &str = "cli";

/// Everything a command handler needs, wired from the configuration
pub struct AppContext {
    pub users: Arc<SqliteUserStore>,
    pub two_factor: TwoFactorService,
    pub activity: ActivityLogger,
}

impl AppContext {
    pub fn new(pool: DbPool, config: &Config) -> Result<Self> {
        let users = Arc::new(SqliteUserStore::new(pool.clone()));
        let store = SqliteSecureStore::from_config(pool.clone(), &config.security)?;

        // Verification tokens outlive a single invocation, so the verifier
        // key has to be stable across runs
        let verifier_salt = format!("{}:verification", config.security.master_salt);
        let verifier_key = security::derive_key_from_password(
            &config.security.master_password,
            verifier_salt.as_bytes(),
            config.security.kdf_iterations,
        ).context("Failed to derive verification key")?;

        let two_factor = TwoFactorService::new(
            Box::new(store),
            Box::new(Arc::clone(&users)),
            Box::new(LoggingDeliveryChannel),
            TwoFactorSettings::from(&config.two_factor),
        )
        .with_verifier(CodeVerifier::new(verifier_key));

        Ok(Self {
            users,
            two_factor,
            activity: ActivityLogger::new(pool),
        })
    }
}
