// Persistence seams for the two-factor flow.
// SQLite-backed implementations are used by the CLI, in-memory ones by tests
// and embedders that bring their own persistence.

use anyhow::Result;

use crate::database::models::{TwoFactorSetup, User};

mod memory;
mod sqlite;

pub use memory::{MemorySecureStore, MemoryUserStore};
pub use sqlite::{SqliteSecureStore, SqliteUserStore};

/// Key-value store for secrets. Values are opaque strings.
#[cfg_attr(test, mockall::automock)]
pub trait SecureStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Deleting a missing key is not an error
    fn delete(&self, key: &str) -> Result<()>;
}

/// User records with partial updates of the two-factor fields.
///
/// The update and delete methods return `false` when no user has the
/// given id.
#[cfg_attr(test, mockall::automock)]
pub trait UserRecordStore: Send + Sync {
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, user_id: &str) -> Result<Option<User>>;
    fn list_users(&self) -> Result<Vec<User>>;
    /// Case-insensitive substring match on display name or email
    fn search_users(&self, term: &str) -> Result<Vec<User>>;
    /// Overwrite the profile fields (email, display name, age, favorite)
    fn update_user(&self, user: &User) -> Result<bool>;
    fn set_favorite(&self, user_id: &str, favorite: bool) -> Result<bool>;
    fn delete_user(&self, user_id: &str) -> Result<bool>;
    /// Store `setup` and mirror its `enabled` flag
    fn set_two_factor_setup(&self, user_id: &str, setup: &TwoFactorSetup) -> Result<bool>;
    fn set_two_factor_enabled(&self, user_id: &str, enabled: bool) -> Result<bool>;
    /// Drop the setup and mark 2FA disabled
    fn clear_two_factor(&self, user_id: &str) -> Result<bool>;
}

impl<T: SecureStore + ?Sized> SecureStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }
}

impl<T: UserRecordStore + ?Sized> UserRecordStore for std::sync::Arc<T> {
    fn create_user(&self, user: &User) -> Result<()> {
        (**self).create_user(user)
    }

    fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        (**self).get_user(user_id)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        (**self).list_users()
    }

    fn search_users(&self, term: &str) -> Result<Vec<User>> {
        (**self).search_users(term)
    }

    fn update_user(&self, user: &User) -> Result<bool> {
        (**self).update_user(user)
    }

    fn set_favorite(&self, user_id: &str, favorite: bool) -> Result<bool> {
        (**self).set_favorite(user_id, favorite)
    }

    fn delete_user(&self, user_id: &str) -> Result<bool> {
        (**self).delete_user(user_id)
    }

    fn set_two_factor_setup(&self, user_id: &str, setup: &TwoFactorSetup) -> Result<bool> {
        (**self).set_two_factor_setup(user_id, setup)
    }

    fn set_two_factor_enabled(&self, user_id: &str, enabled: bool) -> Result<bool> {
        (**self).set_two_factor_enabled(user_id, enabled)
    }

    fn clear_two_factor(&self, user_id: &str) -> Result<bool> {
        (**self).clear_two_factor(user_id)
    }
}
