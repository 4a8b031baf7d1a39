// User management module
// This module provides user registration, profile editing, form
// validation and the one-time-code two-factor flow.

pub mod profile;
pub mod registration;
pub mod validation;
pub mod two_factor;

pub use profile::{toggle_favorite, update_user_profile, UserProfileError, UserProfileUpdate};
pub use registration::{register_user, RegistrationForm, UserRegistrationError};
pub use validation::{validate_destination, FormValidator, ValidationError};
pub use two_factor::{
    CodeStatus, IssuedCode, TwoFactorError, TwoFactorService, TwoFactorSettings, VerificationToken,
};

/// Minimum password length accepted by the sign-up form
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Minimum display name length, after trimming
pub const MIN_NAME_LENGTH: usize = 3;

/// Minimum user age
pub const MIN_AGE: u32 = 18;

/// International phone number pattern for SMS destinations
pub const PHONE_REGEX: &str = r"^\+?[1-9]\d{1,14}$";

/// Email regex pattern for validation
pub const EMAIL_REGEX: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
