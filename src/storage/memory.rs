use anyhow::{anyhow, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{SecureStore, UserRecordStore};
use crate::database::models::{TwoFactorSetup, User};

/// Process-local [`SecureStore`]
#[derive(Debug, Default)]
pub struct MemorySecureStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SecureStore for MemorySecureStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(|_| anyhow!("Secure store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| anyhow!("Secure store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| anyhow!("Secure store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

/// Process-local [`UserRecordStore`]
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, user_id: &str, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut User),
    {
        let mut users = self.users.write().map_err(|_| anyhow!("User store lock poisoned"))?;
        match users.get_mut(user_id) {
            Some(user) => {
                apply(user);
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl UserRecordStore for MemoryUserStore {
    fn create_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().map_err(|_| anyhow!("User store lock poisoned"))?;
        if users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(anyhow!("A user with email {} already exists", user.email));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let users = self.users.read().map_err(|_| anyhow!("User store lock poisoned"))?;
        Ok(users.get(user_id).cloned())
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let users = self.users.read().map_err(|_| anyhow!("User store lock poisoned"))?;
        let mut list: Vec<User> = users.values().cloned().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(list)
    }

    fn search_users(&self, term: &str) -> Result<Vec<User>> {
        let term = term.to_ascii_lowercase();
        Ok(self
            .list_users()?
            .into_iter()
            .filter(|u| {
                u.display_name.to_ascii_lowercase().contains(&term)
                    || u.email.to_ascii_lowercase().contains(&term)
            })
            .collect())
    }

    fn update_user(&self, user: &User) -> Result<bool> {
        let mut users = self.users.write().map_err(|_| anyhow!("User store lock poisoned"))?;
        if users
            .values()
            .any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(anyhow!("A user with email {} already exists", user.email));
        }

        match users.get_mut(&user.id) {
            Some(stored) => {
                stored.email = user.email.clone();
                stored.display_name = user.display_name.clone();
                stored.age = user.age;
                stored.is_favorite = user.is_favorite;
                stored.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn set_favorite(&self, user_id: &str, favorite: bool) -> Result<bool> {
        self.update(user_id, |user| user.is_favorite = favorite)
    }

    fn delete_user(&self, user_id: &str) -> Result<bool> {
        let mut users = self.users.write().map_err(|_| anyhow!("User store lock poisoned"))?;
        Ok(users.remove(user_id).is_some())
    }

    fn set_two_factor_setup(&self, user_id: &str, setup: &TwoFactorSetup) -> Result<bool> {
        self.update(user_id, |user| {
            user.two_factor_enabled = setup.enabled;
            user.two_factor_setup = Some(setup.clone());
        })
    }

    fn set_two_factor_enabled(&self, user_id: &str, enabled: bool) -> Result<bool> {
        self.update(user_id, |user| {
            user.two_factor_enabled = enabled;
            if let Some(setup) = user.two_factor_setup.as_mut() {
                setup.enabled = enabled;
            }
        })
    }

    fn clear_two_factor(&self, user_id: &str) -> Result<bool> {
        self.update(user_id, |user| {
            user.two_factor_enabled = false;
            user.two_factor_setup = None;
        })
    }
}
