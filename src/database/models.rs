use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, Utc};

/// Channel a verification code is delivered through
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Sms,
    Email,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &str {
        match self {
            DeliveryMethod::Sms => "sms",
            DeliveryMethod::Email => "email",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "sms" => Ok(DeliveryMethod::Sms),
            "email" => Ok(DeliveryMethod::Email),
            _ => Err(format!("Invalid delivery method: {}", s)),
        }
    }
}

/// Durable per-user two-factor configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TwoFactorSetup {
    pub user_id: String,
    pub destination: String,
    pub method: DeliveryMethod,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl TwoFactorSetup {
    pub fn new(user_id: String, destination: String, method: DeliveryMethod, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            destination,
            method,
            enabled: false,
            created_at: now,
            verified_at: None,
        }
    }
}

/// Outstanding one-time code for a user
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TwoFactorCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
    pub max_attempts: u32,
}

impl TwoFactorCode {
    /// `None` when `now + ttl` is past the representable range
    pub fn new(code: String, now: DateTime<Utc>, ttl: Duration, max_attempts: u32) -> Option<Self> {
        Some(Self {
            code,
            expires_at: now.checked_add_signed(ttl)?,
            attempts: 0,
            max_attempts,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub fn remaining_attempts(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }
}

/// Proof of a successful verification, consumed when enabling 2FA.
/// Only the HMAC digest of the token is persisted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VerificationGrant {
    pub token_digest: String,
    pub expires_at: DateTime<Utc>,
}

/// User record kept alongside the two-factor state
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub age: Option<u32>,
    #[serde(default)]
    pub is_favorite: bool,
    pub two_factor_enabled: bool,
    pub two_factor_setup: Option<TwoFactorSetup>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, display_name: String, age: Option<u32>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            display_name,
            age,
            is_favorite: false,
            two_factor_enabled: false,
            two_factor_setup: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Kind of action recorded in the activity log
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Create,
    Update,
    Delete,
    Login,
    Logout,
    Export,
    Favorite,
    Permission,
}

impl ActivityType {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityType::Create => "create",
            ActivityType::Update => "update",
            ActivityType::Delete => "delete",
            ActivityType::Login => "login",
            ActivityType::Logout => "logout",
            ActivityType::Export => "export",
            ActivityType::Favorite => "favorite",
            ActivityType::Permission => "permission",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "create" => Ok(ActivityType::Create),
            "update" => Ok(ActivityType::Update),
            "delete" => Ok(ActivityType::Delete),
            "login" => Ok(ActivityType::Login),
            "logout" => Ok(ActivityType::Logout),
            "export" => Ok(ActivityType::Export),
            "favorite" => Ok(ActivityType::Favorite),
            "permission" => Ok(ActivityType::Permission),
            _ => Err(format!("Invalid activity type: {}", s)),
        }
    }
}

/// Activity log entry
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ActivityLog {
    pub id: String,
    pub user_id: String,
    pub action_type: ActivityType,
    pub target_user_id: Option<String>,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl ActivityLog {
    pub fn new(
        user_id: String,
        action_type: ActivityType,
        description: String,
        target_user_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            action_type,
            target_user_id,
            description,
            timestamp: Utc::now(),
        }
    }
}
