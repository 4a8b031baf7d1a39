use regex::Regex;
use log::debug;

use crate::database::models::DeliveryMethod;
use crate::user::{EMAIL_REGEX, PHONE_REGEX, MIN_AGE, MIN_NAME_LENGTH, MIN_PASSWORD_LENGTH};

/// Validation error for user-supplied fields
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Name must be at least {0} characters")]
    NameTooShort(usize),

    #[error("Minimum age is {0} years")]
    AgeTooLow(u32),

    #[error("Internal validation error: {0}")]
    InternalError(String),
}

impl ValidationError {
    /// Form field the error belongs to
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::InvalidPhoneNumber(_) => "phone",
            ValidationError::InvalidEmail(_) => "email",
            ValidationError::PasswordTooShort(_) => "password",
            ValidationError::PasswordMismatch => "confirmPassword",
            ValidationError::NameTooShort(_) => "name",
            ValidationError::AgeTooLow(_) => "age",
            ValidationError::InternalError(_) => "form",
        }
    }
}

fn matches(pattern: &str, value: &str) -> Result<bool, ValidationError> {
    let regex = Regex::new(pattern)
        .map_err(|e| ValidationError::InternalError(format!("Regex error: {}", e)))?;
    Ok(regex.is_match(value))
}

/// International phone number: optional `+`, no leading zero, 2 to 15 digits
pub fn validate_phone_number(phone: &str) -> Result<(), ValidationError> {
    if !matches(PHONE_REGEX, phone)? {
        return Err(ValidationError::InvalidPhoneNumber(phone.to_string()));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if !matches(EMAIL_REGEX, email)? {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

/// Check a two-factor destination against the pattern for its channel
pub fn validate_destination(method: DeliveryMethod, destination: &str) -> Result<(), ValidationError> {
    debug!("Validating {} destination", method.as_str());
    match method {
        DeliveryMethod::Sms => validate_phone_number(destination),
        DeliveryMethod::Email => validate_email(destination),
    }
}

pub fn validate_password(password: &str, min_length: usize) -> Result<(), ValidationError> {
    if password.chars().count() < min_length {
        return Err(ValidationError::PasswordTooShort(min_length));
    }
    Ok(())
}

pub fn validate_password_match(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().chars().count() < MIN_NAME_LENGTH {
        return Err(ValidationError::NameTooShort(MIN_NAME_LENGTH));
    }
    Ok(())
}

/// Parse and check an age field. Non-numeric input counts as too young.
pub fn validate_age(age: &str) -> Result<u32, ValidationError> {
    match age.trim().parse::<u32>() {
        Ok(value) if value >= MIN_AGE => Ok(value),
        _ => Err(ValidationError::AgeTooLow(MIN_AGE)),
    }
}

/// Per-field error message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Collects at most one error per form field
#[derive(Debug, Default)]
pub struct FormValidator {
    errors: Vec<FieldError>,
}

impl FormValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn record<T>(&mut self, field: &str, result: Result<T, ValidationError>) -> bool {
        self.clear_error(field);
        match result {
            Ok(_) => true,
            Err(e) => {
                self.errors.push(FieldError {
                    field: field.to_string(),
                    message: e.to_string(),
                });
                false
            }
        }
    }

    pub fn validate_email(&mut self, email: &str) -> bool {
        self.record("email", validate_email(email))
    }

    pub fn validate_password(&mut self, password: &str) -> bool {
        self.record("password", validate_password(password, MIN_PASSWORD_LENGTH))
    }

    pub fn validate_password_match(&mut self, password: &str, confirmation: &str) -> bool {
        self.record("confirmPassword", validate_password_match(password, confirmation))
    }

    pub fn validate_name(&mut self, name: &str) -> bool {
        self.record("name", validate_name(name))
    }

    pub fn validate_age(&mut self, age: &str) -> bool {
        self.record("age", validate_age(age))
    }

    pub fn get_error(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn clear_error(&mut self, field: &str) {
        self.errors.retain(|e| e.field != field);
    }

    pub fn clear_all(&mut self) {
        self.errors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("+551234567890")]
    #[case("551234567890")]
    #[case("12")]
    #[case("+123456789012345")]
    fn test_valid_phone_numbers(#[case] phone: &str) {
        assert!(validate_phone_number(phone).is_ok());
    }

    #[rstest]
    #[case("not-a-phone")]
    #[case("+0123456789")]
    #[case("1")]
    #[case("+1234567890123456")]
    #[case("+55 11 99999 9999")]
    #[case("")]
    fn test_invalid_phone_numbers(#[case] phone: &str) {
        assert!(matches!(
            validate_phone_number(phone),
            Err(ValidationError::InvalidPhoneNumber(_))
        ));
    }

    #[test]
    fn test_destination_uses_channel_pattern() {
        assert!(validate_destination(DeliveryMethod::Sms, "+551234567890").is_ok());
        assert!(validate_destination(DeliveryMethod::Sms, "ana@example.com").is_err());
        assert!(validate_destination(DeliveryMethod::Email, "ana@example.com").is_ok());
        assert!(matches!(
            validate_destination(DeliveryMethod::Email, "+551234567890"),
            Err(ValidationError::InvalidEmail(_))
        ));
    }

    #[rstest]
    #[case("ana@example.com", true)]
    #[case("a.b@sub.example.org", true)]
    #[case("ana@example", false)]
    #[case("ana example@x.com", false)]
    #[case("@example.com", false)]
    fn test_email(#[case] email: &str, #[case] valid: bool) {
        assert_eq!(validate_email(email).is_ok(), valid);
    }

    #[test]
    fn test_password_and_confirmation() {
        assert!(validate_password("12345", MIN_PASSWORD_LENGTH).is_err());
        assert!(validate_password("123456", MIN_PASSWORD_LENGTH).is_ok());
        assert_eq!(validate_password_match("a", "b"), Err(ValidationError::PasswordMismatch));
        assert!(validate_password_match("same", "same").is_ok());
    }

    #[test]
    fn test_name_and_age() {
        assert!(validate_name("  Al  ").is_err());
        assert!(validate_name("Ana").is_ok());
        assert_eq!(validate_age("18"), Ok(18));
        assert_eq!(validate_age("17"), Err(ValidationError::AgeTooLow(MIN_AGE)));
        assert!(validate_age("eighteen").is_err());
    }

    #[test]
    fn test_form_validator_keeps_one_error_per_field() {
        let mut form = FormValidator::new();
        assert!(!form.validate_email("bad"));
        assert!(!form.validate_email("still bad"));
        assert!(!form.validate_age("12"));
        assert_eq!(form.errors().len(), 2);
        assert_eq!(form.get_error("age"), Some("Minimum age is 18 years"));

        assert!(form.validate_email("ok@example.com"));
        assert!(form.get_error("email").is_none());

        form.clear_all();
        assert!(form.is_valid());
    }

    #[test]
    fn test_error_fields() {
        assert_eq!(ValidationError::PasswordMismatch.field(), "confirmPassword");
        assert_eq!(ValidationError::InvalidPhoneNumber(String::new()).field(), "phone");
    }
}
