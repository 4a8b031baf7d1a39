use anyhow::{Result, Context, anyhow};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, OptionalExtension, Row};

use super::{SecureStore, UserRecordStore};
use crate::config::SecurityConfig;
use crate::database::{self, DbPool, models::{TwoFactorSetup, User}};
use crate::security::{self, AES_KEY_LEN};

/// [`SecureStore`] on the `secure_store` table. Values are encrypted with
/// AES-256-GCM before they reach the database.
pub struct SqliteSecureStore {
    pool: DbPool,
    key: [u8; AES_KEY_LEN],
}

impl SqliteSecureStore {
    pub fn new(pool: DbPool, key: [u8; AES_KEY_LEN]) -> Self {
        Self { pool, key }
    }

    /// Derive the value key from the configured master password
    pub fn from_config(pool: DbPool, config: &SecurityConfig) -> Result<Self> {
        let key = security::derive_key_from_password(
            &config.master_password,
            config.master_salt.as_bytes(),
            config.kdf_iterations,
        ).context("Failed to derive secure store key")?;
        Ok(Self::new(pool, key))
    }
}

impl SecureStore for SqliteSecureStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = database::get_connection(&self.pool)?;

        let encrypted: Option<String> = conn
            .query_row(
                "SELECT value FROM secure_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .context(format!("Failed to read secure store key {}", key))?;

        match encrypted {
            Some(value) => {
                let plaintext = security::decrypt_string(&value, &self.key)
                    .context(format!("Failed to decrypt secure store key {}", key))?;
                Ok(Some(plaintext))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let encrypted = security::encrypt_string(value, &self.key)
            .context("Failed to encrypt secure store value")?;

        let conn = database::get_connection(&self.pool)?;
        conn.execute(
            "INSERT INTO secure_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, encrypted, Utc::now().to_rfc3339()],
        ).context(format!("Failed to write secure store key {}", key))?;

        debug!("Secure store key {} written", key);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let conn = database::get_connection(&self.pool)?;
        conn.execute("DELETE FROM secure_store WHERE key = ?1", params![key])
            .context(format!("Failed to delete secure store key {}", key))?;
        Ok(())
    }
}

/// [`UserRecordStore`] on the `users` table
pub struct SqliteUserStore {
    pool: DbPool,
}

struct UserRow {
    id: String,
    email: String,
    display_name: String,
    age: Option<u32>,
    is_favorite: bool,
    two_factor_enabled: bool,
    two_factor_setup: Option<String>,
    created_at: String,
    updated_at: String,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            display_name: row.get(2)?,
            age: row.get(3)?,
            is_favorite: row.get::<_, i64>(4)? != 0,
            two_factor_enabled: row.get::<_, i64>(5)? != 0,
            two_factor_setup: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_user(self) -> Result<User> {
        let two_factor_setup = match self.two_factor_setup {
            Some(json) => Some(
                serde_json::from_str(&json)
                    .context(format!("Corrupt two-factor setup for user {}", self.id))?,
            ),
            None => None,
        };

        Ok(User {
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            id: self.id,
            email: self.email,
            display_name: self.display_name,
            age: self.age,
            is_favorite: self.is_favorite,
            two_factor_enabled: self.two_factor_enabled,
            two_factor_setup,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow!("Invalid timestamp '{}': {}", value, e))
}

fn collect_users<I>(rows: I) -> Result<Vec<User>>
where
    I: Iterator<Item = rusqlite::Result<UserRow>>,
{
    let mut users = Vec::new();
    for row in rows {
        let row = row.context("Failed to process user row")?;
        users.push(row.into_user()?);
    }
    Ok(users)
}

const USER_COLUMNS: &str =
    "id, email, display_name, age, is_favorite, two_factor_enabled, two_factor_setup, created_at, updated_at";

impl SqliteUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl UserRecordStore for SqliteUserStore {
    fn create_user(&self, user: &User) -> Result<()> {
        let setup_json = user
            .two_factor_setup
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to serialize two-factor setup")?;

        let conn = database::get_connection(&self.pool)?;
        conn.execute(
            "INSERT INTO users (id, email, display_name, age, is_favorite, two_factor_enabled,
                                two_factor_setup, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                user.id,
                user.email,
                user.display_name,
                user.age,
                user.is_favorite as i64,
                user.two_factor_enabled as i64,
                setup_json,
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        ).context(format!("Failed to insert user {}", user.email))?;

        debug!("Created user {}", user.id);
        Ok(())
    }

    fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let conn = database::get_connection(&self.pool)?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![user_id],
                UserRow::from_row,
            )
            .optional()
            .context("Failed to query user")?;

        row.map(UserRow::into_user).transpose()
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = database::get_connection(&self.pool)?;
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM users ORDER BY created_at ASC", USER_COLUMNS))
            .context("Failed to prepare statement for listing users")?;

        let rows = stmt
            .query_map([], UserRow::from_row)
            .context("Failed to query users")?;

        collect_users(rows)
    }

    fn search_users(&self, term: &str) -> Result<Vec<User>> {
        let conn = database::get_connection(&self.pool)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM users
                 WHERE instr(lower(display_name), lower(?1)) > 0
                    OR instr(lower(email), lower(?1)) > 0
                 ORDER BY created_at ASC",
                USER_COLUMNS
            ))
            .context("Failed to prepare statement for searching users")?;

        let rows = stmt
            .query_map(params![term], UserRow::from_row)
            .context("Failed to search users")?;

        collect_users(rows)
    }

    fn update_user(&self, user: &User) -> Result<bool> {
        let conn = database::get_connection(&self.pool)?;
        let updated = conn.execute(
            "UPDATE users SET email = ?1, display_name = ?2, age = ?3, is_favorite = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                user.email,
                user.display_name,
                user.age,
                user.is_favorite as i64,
                Utc::now().to_rfc3339(),
                user.id,
            ],
        ).context(format!("Failed to update user {}", user.id))?;

        debug!("Updated user {}", user.id);
        Ok(updated > 0)
    }

    fn set_favorite(&self, user_id: &str, favorite: bool) -> Result<bool> {
        let conn = database::get_connection(&self.pool)?;
        let updated = conn.execute(
            "UPDATE users SET is_favorite = ?1, updated_at = ?2 WHERE id = ?3",
            params![favorite as i64, Utc::now().to_rfc3339(), user_id],
        ).context("Failed to update favorite flag")?;

        Ok(updated > 0)
    }

    fn delete_user(&self, user_id: &str) -> Result<bool> {
        let conn = database::get_connection(&self.pool)?;
        let deleted = conn
            .execute("DELETE FROM users WHERE id = ?1", params![user_id])
            .context(format!("Failed to delete user {}", user_id))?;

        debug!("Deleted {} user row(s) for {}", deleted, user_id);
        Ok(deleted > 0)
    }

    fn set_two_factor_setup(&self, user_id: &str, setup: &TwoFactorSetup) -> Result<bool> {
        let setup_json = serde_json::to_string(setup).context("Failed to serialize two-factor setup")?;

        let conn = database::get_connection(&self.pool)?;
        let updated = conn.execute(
            "UPDATE users SET two_factor_setup = ?1, two_factor_enabled = ?2, updated_at = ?3
             WHERE id = ?4",
            params![setup_json, setup.enabled as i64, Utc::now().to_rfc3339(), user_id],
        ).context("Failed to update two-factor setup")?;

        Ok(updated > 0)
    }

    fn set_two_factor_enabled(&self, user_id: &str, enabled: bool) -> Result<bool> {
        let mut conn = database::get_connection(&self.pool)?;
        let tx = conn.transaction().context("Failed to start transaction")?;

        let setup_json: Option<Option<String>> = tx
            .query_row(
                "SELECT two_factor_setup FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query two-factor setup")?;

        let setup_json = match setup_json {
            Some(json) => json,
            None => return Ok(false),
        };

        // Keep the embedded setup's flag in step with the column
        let setup_json = match setup_json {
            Some(json) => {
                let mut setup: TwoFactorSetup = serde_json::from_str(&json)
                    .context(format!("Corrupt two-factor setup for user {}", user_id))?;
                setup.enabled = enabled;
                Some(serde_json::to_string(&setup).context("Failed to serialize two-factor setup")?)
            }
            None => None,
        };

        tx.execute(
            "UPDATE users SET two_factor_enabled = ?1, two_factor_setup = ?2, updated_at = ?3
             WHERE id = ?4",
            params![enabled as i64, setup_json, Utc::now().to_rfc3339(), user_id],
        ).context("Failed to update two-factor flag")?;

        tx.commit().context("Failed to commit two-factor flag update")?;
        Ok(true)
    }

    fn clear_two_factor(&self, user_id: &str) -> Result<bool> {
        let conn = database::get_connection(&self.pool)?;
        let updated = conn.execute(
            "UPDATE users SET two_factor_enabled = 0, two_factor_setup = NULL, updated_at = ?1
             WHERE id = ?2",
            params![Utc::now().to_rfc3339(), user_id],
        ).context("Failed to clear two-factor state")?;

        Ok(updated > 0)
    }
}
