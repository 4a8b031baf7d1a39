use log::{debug, info};

use crate::database::models::User;
use crate::storage::UserRecordStore;
use crate::user::validation::FormValidator;

/// User registration error types
#[derive(Debug, thiserror::Error)]
pub enum UserRegistrationError {
    #[error("Email already registered")]
    EmailExists,

    #[error("Validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Sign-up form as entered by the user. Age is kept as text so the form
/// can report a non-numeric value the same way as an underage one.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub email: String,
    pub display_name: String,
    pub age: String,
}

/// Validate the form and create the user record
pub fn register_user(
    users: &dyn UserRecordStore,
    form: &RegistrationForm,
) -> Result<User, UserRegistrationError> {
    debug!("Registering new user: {}", form.email);

    let email = form.email.trim();
    let mut validator = FormValidator::new();
    validator.validate_email(email);
    validator.validate_name(&form.display_name);
    validator.validate_age(&form.age);

    if !validator.is_valid() {
        let messages = validator
            .errors()
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        return Err(UserRegistrationError::ValidationFailed(messages));
    }

    let existing = users
        .list_users()
        .map_err(|e| UserRegistrationError::StorageError(e.to_string()))?;
    if existing.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
        return Err(UserRegistrationError::EmailExists);
    }

    // validate_age already accepted the value
    let age = form.age.trim().parse::<u32>().ok();
    let user = User::new(email.to_string(), form.display_name.trim().to_string(), age);

    users
        .create_user(&user)
        .map_err(|e| UserRegistrationError::StorageError(format!("Failed to store user: {}", e)))?;

    info!("User registered successfully: {}", user.email);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryUserStore, MockUserRecordStore};

    fn form(email: &str, name: &str, age: &str) -> RegistrationForm {
        RegistrationForm {
            email: email.to_string(),
            display_name: name.to_string(),
            age: age.to_string(),
        }
    }

    #[test]
    fn test_register_user_success() {
        let users = MemoryUserStore::new();
        let user = register_user(&users, &form(" ana@example.com ", " Ana Maria ", "30")).unwrap();

        assert_eq!(user.email, "ana@example.com");
        assert_eq!(user.display_name, "Ana Maria");
        assert_eq!(user.age, Some(30));
        assert!(!user.two_factor_enabled);
        assert_eq!(users.get_user(&user.id).unwrap(), Some(user));
    }

    #[test]
    fn test_register_user_reports_every_field() {
        let users = MemoryUserStore::new();
        let err = register_user(&users, &form("nope", "Al", "12")).unwrap_err();

        match err {
            UserRegistrationError::ValidationFailed(messages) => {
                assert_eq!(messages.len(), 3);
                assert!(messages[2].starts_with("age:"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(users.list_users().unwrap().is_empty());
    }

    #[test]
    fn test_register_user_duplicate_email() {
        let users = MemoryUserStore::new();
        register_user(&users, &form("ana@example.com", "Ana", "30")).unwrap();

        let err = register_user(&users, &form("ANA@example.com", "Other Ana", "41")).unwrap_err();
        assert!(matches!(err, UserRegistrationError::EmailExists));
    }

    #[test]
    fn test_register_user_storage_failure() {
        let mut users = MockUserRecordStore::new();
        users.expect_list_users().times(1).returning(|| Ok(Vec::new()));
        users
            .expect_create_user()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("database is locked")));

        let err = register_user(&users, &form("ana@example.com", "Ana", "30")).unwrap_err();
        assert!(err.to_string().contains("database is locked"));
    }
}
