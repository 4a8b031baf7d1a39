use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use rand::{rngs::OsRng, RngCore};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::sync::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::config::TwoFactorConfig;
use crate::database::models::{DeliveryMethod, TwoFactorCode, TwoFactorSetup, VerificationGrant};
use crate::delivery::{DeliveryChannel, DeliveryError, MaskedDestination};
use crate::security::{generate_verification_code, generate_verification_token, CodeVerifier};
use crate::storage::{SecureStore, UserRecordStore};
use crate::user::validation::{validate_destination, ValidationError};

/// Two-factor authentication errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TwoFactorError {
    /// Destination does not fit the delivery method
    InvalidDestination(String),
    /// No outstanding code for the user
    NoCodeRequested,
    /// The outstanding code is past its expiry
    CodeExpired,
    /// The attempt cap was reached
    MaxAttemptsReached,
    /// Wrong code, more guesses allowed
    IncorrectCode { remaining: u32 },
    /// The delivery channel did not accept the code
    DeliveryFailed(String),
    /// No setup record for the user
    SetupNotInitiated,
    /// Enabling needs a fresh token from a successful verification
    VerificationRequired,
    /// User not found
    UserNotFound,
    /// Storage error
    StorageError(String),
    /// Unknown error
    Unknown(String),
}

impl fmt::Display for TwoFactorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TwoFactorError::InvalidDestination(reason) => write!(f, "Invalid destination: {}", reason),
            TwoFactorError::NoCodeRequested => write!(f, "No code requested"),
            TwoFactorError::CodeExpired => write!(f, "Code expired"),
            TwoFactorError::MaxAttemptsReached => write!(f, "Maximum attempts reached"),
            TwoFactorError::IncorrectCode { remaining } => {
                write!(f, "Incorrect code, {} attempts remaining", remaining)
            }
            TwoFactorError::DeliveryFailed(err) => write!(f, "Failed to deliver code: {}", err),
            TwoFactorError::SetupNotInitiated => write!(f, "Two-factor setup has not been initiated"),
            TwoFactorError::VerificationRequired => {
                write!(f, "A valid verification token is required to enable two-factor authentication")
            }
            TwoFactorError::UserNotFound => write!(f, "User not found"),
            TwoFactorError::StorageError(err) => write!(f, "Storage error: {}", err),
            TwoFactorError::Unknown(err) => write!(f, "Unknown error: {}", err),
        }
    }
}

impl std::error::Error for TwoFactorError {}

impl From<ValidationError> for TwoFactorError {
    fn from(err: ValidationError) -> Self {
        TwoFactorError::InvalidDestination(err.to_string())
    }
}

impl From<DeliveryError> for TwoFactorError {
    fn from(err: DeliveryError) -> Self {
        TwoFactorError::DeliveryFailed(err.to_string())
    }
}

fn storage_error(err: anyhow::Error) -> TwoFactorError {
    TwoFactorError::StorageError(format!("{:#}", err))
}

fn setup_key(user_id: &str) -> String {
    format!("2fa_{}", user_id)
}

fn code_key(user_id: &str) -> String {
    format!("2fa_code_{}", user_id)
}

fn grant_key(user_id: &str) -> String {
    format!("2fa_verified_{}", user_id)
}

/// Timing and exposure knobs for [`TwoFactorService`]
#[derive(Debug, Clone, PartialEq)]
pub struct TwoFactorSettings {
    pub code_ttl: Duration,
    pub max_attempts: u32,
    pub verification_ttl: Duration,
    /// Hand the raw code back from `issue_code`. Development only.
    pub expose_codes: bool,
}

impl Default for TwoFactorSettings {
    fn default() -> Self {
        Self::from(&TwoFactorConfig::default())
    }
}

// Out-of-range values saturate; expiry arithmetic reports the overflow
fn minutes(value: i64) -> Duration {
    Duration::try_minutes(value).unwrap_or_else(Duration::max_value)
}

impl From<&TwoFactorConfig> for TwoFactorSettings {
    fn from(config: &TwoFactorConfig) -> Self {
        Self {
            code_ttl: minutes(config.code_ttl_minutes),
            max_attempts: config.max_attempts,
            verification_ttl: minutes(config.verification_ttl_minutes),
            expose_codes: config.expose_codes,
        }
    }
}

/// Result of issuing a code
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedCode {
    pub expires_at: DateTime<Utc>,
    /// Only populated when `expose_codes` is on
    pub code: Option<String>,
}

/// Public view of an outstanding code. Never carries the code itself.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeStatus {
    pub expires_at: DateTime<Utc>,
    pub remaining_attempts: u32,
    pub expired: bool,
}

/// Single-use proof of a successful verification
#[derive(Clone, PartialEq, Eq)]
pub struct VerificationToken(String);

impl VerificationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for VerificationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerificationToken(***)")
    }
}

/// One-time-code two-factor challenge.
///
/// A code moves from `issue_code` to one of three terminal states, each of
/// which deletes the stored record: verified, expired or exhausted. Expiry
/// is only evaluated when `verify_code` runs.
pub struct TwoFactorService {
    store: Box<dyn SecureStore>,
    users: Box<dyn UserRecordStore>,
    channel: Box<dyn DeliveryChannel>,
    clock: Box<dyn Clock>,
    rng: Mutex<Box<dyn RngCore + Send>>,
    verifier: CodeVerifier,
    settings: TwoFactorSettings,
}

impl TwoFactorService {
    /// Service on the wall clock and the OS random source
    pub fn new(
        store: Box<dyn SecureStore>,
        users: Box<dyn UserRecordStore>,
        channel: Box<dyn DeliveryChannel>,
        settings: TwoFactorSettings,
    ) -> Self {
        Self {
            store,
            users,
            channel,
            clock: Box::new(SystemClock),
            rng: Mutex::new(Box::new(OsRng)),
            verifier: CodeVerifier::random(),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rng(mut self, rng: Box<dyn RngCore + Send>) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Verifier used for code comparison and token digests. Tokens only
    /// survive a restart if the verifier key does.
    pub fn with_verifier(mut self, verifier: CodeVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn settings(&self) -> &TwoFactorSettings {
        &self.settings
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, TwoFactorError> {
        match self.store.get(key).map_err(storage_error)? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| TwoFactorError::StorageError(format!("Corrupt record {}: {}", key, e))),
            None => Ok(None),
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), TwoFactorError> {
        let json = serde_json::to_string(value)
            .map_err(|e| TwoFactorError::Unknown(format!("Failed to serialize {}: {}", key, e)))?;
        self.store.set(key, &json).map_err(storage_error)
    }

    fn remove(&self, key: &str) -> Result<(), TwoFactorError> {
        self.store.delete(key).map_err(storage_error)
    }

    fn restore_setup(&self, key: &str, previous: Option<&TwoFactorSetup>) -> Result<(), TwoFactorError> {
        match previous {
            Some(setup) => self.save(key, setup),
            None => self.remove(key),
        }
    }

    fn with_rng_locked<T>(&self, draw: impl FnOnce(&mut (dyn RngCore + Send)) -> T) -> Result<T, TwoFactorError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| TwoFactorError::Unknown("Random source lock poisoned".to_string()))?;
        Ok(draw(&mut **rng))
    }

    /// Record where and how codes should be sent. 2FA stays disabled until
    /// a verification is followed by [`TwoFactorService::enable`].
    pub fn setup(
        &self,
        user_id: &str,
        destination: &str,
        method: DeliveryMethod,
    ) -> Result<TwoFactorSetup, TwoFactorError> {
        debug!("Starting 2FA setup for user ID: {}", user_id);

        validate_destination(method, destination)?;

        let setup = TwoFactorSetup::new(
            user_id.to_string(),
            destination.to_string(),
            method,
            self.clock.now(),
        );

        if self.users.get_user(user_id).map_err(storage_error)?.is_none() {
            return Err(TwoFactorError::UserNotFound);
        }

        // Secure store first: a failure here leaves the user record untouched
        let key = setup_key(user_id);
        let previous: Option<TwoFactorSetup> = self.load(&key)?;
        self.save(&key, &setup)?;

        let stored = match self.users.set_two_factor_setup(user_id, &setup) {
            Ok(stored) => stored,
            Err(e) => {
                self.restore_setup(&key, previous.as_ref())?;
                return Err(storage_error(e));
            }
        };
        if !stored {
            self.restore_setup(&key, previous.as_ref())?;
            return Err(TwoFactorError::UserNotFound);
        }

        // A grant earned against the previous destination must not enable this one
        self.remove(&grant_key(user_id))?;

        info!(
            "2FA setup stored for user {} ({} to {})",
            user_id,
            method.as_str(),
            MaskedDestination(destination)
        );
        Ok(setup)
    }

    pub fn get_setup(&self, user_id: &str) -> Result<Option<TwoFactorSetup>, TwoFactorError> {
        self.load(&setup_key(user_id))
    }

    /// Generate, send and store a fresh code, replacing any outstanding one.
    ///
    /// Nothing is stored when the channel fails, so the user is never left
    /// with a code they cannot receive.
    pub fn issue_code(
        &self,
        user_id: &str,
        method: DeliveryMethod,
        destination: &str,
    ) -> Result<IssuedCode, TwoFactorError> {
        debug!("Issuing 2FA code for user ID: {}", user_id);

        validate_destination(method, destination)?;

        let code = self.with_rng_locked(|rng| generate_verification_code(rng))?;
        let record = TwoFactorCode::new(
            code,
            self.clock.now(),
            self.settings.code_ttl,
            self.settings.max_attempts,
        )
        .ok_or_else(|| TwoFactorError::Unknown("Code lifetime is out of range".to_string()))?;

        let key = code_key(user_id);
        self.remove(&key)?;

        if let Err(e) = self.channel.send(method, destination, &record.code) {
            warn!("Could not deliver 2FA code for user {}: {}", user_id, e);
            return Err(e.into());
        }

        self.save(&key, &record)?;
        info!("2FA code issued for user {}, expires at {}", user_id, record.expires_at);

        let code = if self.settings.expose_codes {
            warn!("Returning raw 2FA code to caller (expose_codes is on)");
            Some(record.code)
        } else {
            None
        };

        Ok(IssuedCode {
            expires_at: record.expires_at,
            code,
        })
    }

    /// Issue a code to the destination recorded by [`TwoFactorService::setup`]
    pub fn issue_code_for_setup(&self, user_id: &str) -> Result<IssuedCode, TwoFactorError> {
        let setup = self.get_setup(user_id)?.ok_or(TwoFactorError::SetupNotInitiated)?;
        self.issue_code(user_id, setup.method, &setup.destination)
    }

    /// Check `input` against the outstanding code.
    ///
    /// Checks run in a fixed order: presence, expiry, exhaustion, match.
    /// The guess that uses up the last attempt reports
    /// `MaxAttemptsReached`; the record is dropped by the next call.
    pub fn verify_code(&self, user_id: &str, input: &str) -> Result<VerificationToken, TwoFactorError> {
        debug!("Verifying 2FA code for user ID: {}", user_id);

        let key = code_key(user_id);
        let mut record: TwoFactorCode = match self.load(&key)? {
            Some(record) => record,
            None => return Err(TwoFactorError::NoCodeRequested),
        };

        let now = self.clock.now();

        if record.is_expired(now) {
            self.remove(&key)?;
            info!("2FA code for user {} expired at {}", user_id, record.expires_at);
            return Err(TwoFactorError::CodeExpired);
        }

        if record.is_exhausted() {
            self.remove(&key)?;
            info!("2FA code for user {} discarded after {} attempts", user_id, record.attempts);
            return Err(TwoFactorError::MaxAttemptsReached);
        }

        let matched = self
            .verifier
            .matches(&record.code, input)
            .map_err(|e| TwoFactorError::Unknown(e.to_string()))?;

        if !matched {
            record.attempts += 1;
            self.save(&key, &record)?;
            warn!(
                "Incorrect 2FA code for user {} (attempt {} of {})",
                user_id, record.attempts, record.max_attempts
            );

            if record.is_exhausted() {
                return Err(TwoFactorError::MaxAttemptsReached);
            }
            return Err(TwoFactorError::IncorrectCode {
                remaining: record.remaining_attempts(),
            });
        }

        // The grant is written before the code is spent, so a failed write
        // leaves the code usable for another try
        let token = self.with_rng_locked(|rng| generate_verification_token(rng))?;
        let grant = VerificationGrant {
            token_digest: self
                .verifier
                .digest(&token)
                .map_err(|e| TwoFactorError::Unknown(e.to_string()))?,
            expires_at: now
                .checked_add_signed(self.settings.verification_ttl)
                .ok_or_else(|| TwoFactorError::Unknown("Verification lifetime is out of range".to_string()))?,
        };
        self.save(&grant_key(user_id), &grant)?;
        self.remove(&key)?;

        if let Some(mut setup) = self.get_setup(user_id)? {
            if setup.verified_at.is_none() {
                setup.verified_at = Some(now);
                self.save(&setup_key(user_id), &setup)?;
                if !self.users.set_two_factor_setup(user_id, &setup).map_err(storage_error)? {
                    debug!("No user record to stamp verification time for {}", user_id);
                }
            }
        }

        info!("2FA code verified for user {}", user_id);
        Ok(VerificationToken(token))
    }

    /// Turn 2FA on, consuming the token from a successful verification
    pub fn enable(&self, user_id: &str, token: &VerificationToken) -> Result<TwoFactorSetup, TwoFactorError> {
        debug!("Enabling 2FA for user ID: {}", user_id);

        let mut setup = self.get_setup(user_id)?.ok_or(TwoFactorError::SetupNotInitiated)?;

        let key = grant_key(user_id);
        let grant: VerificationGrant = self.load(&key)?.ok_or(TwoFactorError::VerificationRequired)?;

        let now = self.clock.now();
        if now > grant.expires_at {
            self.remove(&key)?;
            warn!("Verification token for user {} expired", user_id);
            return Err(TwoFactorError::VerificationRequired);
        }

        let valid = self
            .verifier
            .matches_digest(token.as_str(), &grant.token_digest)
            .map_err(|e| TwoFactorError::Unknown(e.to_string()))?;
        if !valid {
            warn!("Verification token mismatch for user {}", user_id);
            return Err(TwoFactorError::VerificationRequired);
        }

        // verify_code already stamped verified_at on both copies of the setup
        setup.enabled = true;
        if !self.users.set_two_factor_enabled(user_id, true).map_err(storage_error)? {
            return Err(TwoFactorError::UserNotFound);
        }
        self.save(&setup_key(user_id), &setup)?;
        self.remove(&key)?;

        info!("2FA successfully enabled for user {}", user_id);
        Ok(setup)
    }

    /// Remove the setup, any outstanding code and any unused grant
    pub fn disable(&self, user_id: &str) -> Result<(), TwoFactorError> {
        debug!("Disabling 2FA for user ID: {}", user_id);

        self.remove(&setup_key(user_id))?;
        self.remove(&code_key(user_id))?;
        self.remove(&grant_key(user_id))?;

        if !self.users.clear_two_factor(user_id).map_err(storage_error)? {
            return Err(TwoFactorError::UserNotFound);
        }

        info!("2FA successfully disabled for user {}", user_id);
        Ok(())
    }

    /// Expiry and attempt information for the outstanding code, if any
    pub fn code_status(&self, user_id: &str) -> Result<Option<CodeStatus>, TwoFactorError> {
        let record: Option<TwoFactorCode> = self.load(&code_key(user_id))?;
        let now = self.clock.now();

        Ok(record.map(|record| CodeStatus {
            expires_at: record.expires_at,
            remaining_attempts: record.remaining_attempts(),
            expired: record.is_expired(now),
        }))
    }
}
