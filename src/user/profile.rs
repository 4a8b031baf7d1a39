use log::{debug, info};

use crate::database::models::User;
use crate::storage::UserRecordStore;
use crate::user::validation::FormValidator;

/// User profile error types
#[derive(Debug, thiserror::Error)]
pub enum UserProfileError {
    #[error("User not found")]
    UserNotFound,

    #[error("Email already registered")]
    EmailExists,

    #[error("Validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("Storage error: {0}")]
    StorageError(String),
}

fn storage_error(e: anyhow::Error) -> UserProfileError {
    UserProfileError::StorageError(e.to_string())
}

/// Profile fields to change. `None` keeps the stored value; an empty age
/// clears it.
#[derive(Debug, Clone, Default)]
pub struct UserProfileUpdate {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub age: Option<String>,
}

impl UserProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.display_name.is_none() && self.age.is_none()
    }
}

fn load(users: &dyn UserRecordStore, user_id: &str) -> Result<User, UserProfileError> {
    users
        .get_user(user_id)
        .map_err(storage_error)?
        .ok_or(UserProfileError::UserNotFound)
}

/// Validate the changed fields and write them back
pub fn update_user_profile(
    users: &dyn UserRecordStore,
    user_id: &str,
    update: &UserProfileUpdate,
) -> Result<User, UserProfileError> {
    debug!("Updating profile for user ID: {}", user_id);

    let mut user = load(users, user_id)?;
    let mut validator = FormValidator::new();

    if let Some(email) = &update.email {
        let email = email.trim();
        if validator.validate_email(email) {
            user.email = email.to_string();
        }
    }
    if let Some(name) = &update.display_name {
        if validator.validate_name(name) {
            user.display_name = name.trim().to_string();
        }
    }
    if let Some(age) = &update.age {
        if age.trim().is_empty() {
            user.age = None;
        } else if validator.validate_age(age) {
            user.age = age.trim().parse::<u32>().ok();
        }
    }

    if !validator.is_valid() {
        let messages = validator
            .errors()
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        return Err(UserProfileError::ValidationFailed(messages));
    }

    if update.email.is_some() {
        let taken = users
            .list_users()
            .map_err(storage_error)?
            .iter()
            .any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email));
        if taken {
            return Err(UserProfileError::EmailExists);
        }
    }

    if !users.update_user(&user).map_err(storage_error)? {
        return Err(UserProfileError::UserNotFound);
    }

    info!("Profile updated for user {}", user.id);
    load(users, user_id)
}

/// Flip the favorite flag and return the new value
pub fn toggle_favorite(users: &dyn UserRecordStore, user_id: &str) -> Result<bool, UserProfileError> {
    let user = load(users, user_id)?;
    let favorite = !user.is_favorite;

    if !users.set_favorite(user_id, favorite).map_err(storage_error)? {
        return Err(UserProfileError::UserNotFound);
    }

    debug!("User {} favorite set to {}", user_id, favorite);
    Ok(favorite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryUserStore, MockUserRecordStore};

    fn store_with(email: &str, name: &str) -> (MemoryUserStore, User) {
        let users = MemoryUserStore::new();
        let user = User::new(email.to_string(), name.to_string(), Some(30));
        users.create_user(&user).unwrap();
        (users, user)
    }

    #[test]
    fn test_update_changes_only_given_fields() {
        let (users, user) = store_with("ana@example.com", "Ana Maria");

        let update = UserProfileUpdate {
            display_name: Some("  Ana Clara ".to_string()),
            ..Default::default()
        };
        let updated = update_user_profile(&users, &user.id, &update).unwrap();

        assert_eq!(updated.display_name, "Ana Clara");
        assert_eq!(updated.email, "ana@example.com");
        assert_eq!(updated.age, Some(30));
    }

    #[test]
    fn test_empty_age_clears_it() {
        let (users, user) = store_with("ana@example.com", "Ana Maria");

        let update = UserProfileUpdate {
            age: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(update_user_profile(&users, &user.id, &update).unwrap().age, None);
    }

    #[test]
    fn test_invalid_fields_are_reported_and_nothing_stored() {
        let (users, user) = store_with("ana@example.com", "Ana Maria");

        let update = UserProfileUpdate {
            email: Some("not-an-email".to_string()),
            display_name: Some("Al".to_string()),
            age: Some("17".to_string()),
        };
        match update_user_profile(&users, &user.id, &update).unwrap_err() {
            UserProfileError::ValidationFailed(messages) => assert_eq!(messages.len(), 3),
            other => panic!("unexpected error: {:?}", other),
        }

        assert_eq!(users.get_user(&user.id).unwrap(), Some(user));
    }

    #[test]
    fn test_email_taken_by_another_user() {
        let (users, user) = store_with("ana@example.com", "Ana Maria");
        users
            .create_user(&User::new("bia@example.com".into(), "Bia Costa".into(), None))
            .unwrap();

        let update = UserProfileUpdate {
            email: Some("BIA@example.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            update_user_profile(&users, &user.id, &update).unwrap_err(),
            UserProfileError::EmailExists
        ));

        // Re-entering your own email in another case is fine
        let update = UserProfileUpdate {
            email: Some("ANA@example.com".to_string()),
            ..Default::default()
        };
        assert!(update_user_profile(&users, &user.id, &update).is_ok());
    }

    #[test]
    fn test_unknown_user() {
        let users = MemoryUserStore::new();
        assert!(matches!(
            update_user_profile(&users, "ghost", &UserProfileUpdate::default()).unwrap_err(),
            UserProfileError::UserNotFound
        ));
        assert!(matches!(
            toggle_favorite(&users, "ghost").unwrap_err(),
            UserProfileError::UserNotFound
        ));
    }

    #[test]
    fn test_toggle_favorite() {
        let (users, user) = store_with("ana@example.com", "Ana Maria");

        assert!(toggle_favorite(&users, &user.id).unwrap());
        assert!(users.get_user(&user.id).unwrap().unwrap().is_favorite);
        assert!(!toggle_favorite(&users, &user.id).unwrap());
    }

    #[test]
    fn test_storage_failure_on_write() {
        let user = User::new("ana@example.com".into(), "Ana Maria".into(), None);
        let mut users = MockUserRecordStore::new();
        users.expect_get_user().returning(move |_| Ok(Some(user.clone())));
        users
            .expect_update_user()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("disk full")));

        let update = UserProfileUpdate {
            display_name: Some("Ana Paula".to_string()),
            ..Default::default()
        };
        let err = update_user_profile(&users, "any", &update).unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }
}
