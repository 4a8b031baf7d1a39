use log::debug;
use serde::Serialize;
use std::fmt;

/// Punctuation that counts towards the symbol criterion
pub const PASSWORD_SYMBOLS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Strength band derived from the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PasswordStrength {
    Weak,
    Medium,
    Strong,
    VeryStrong,
}

impl PasswordStrength {
    pub fn as_str(&self) -> &str {
        match self {
            PasswordStrength::Weak => "weak",
            PasswordStrength::Medium => "medium",
            PasswordStrength::Strong => "strong",
            PasswordStrength::VeryStrong => "very-strong",
        }
    }

    fn from_score(score: u8) -> Self {
        match score {
            s if s >= 5 => PasswordStrength::VeryStrong,
            4 => PasswordStrength::Strong,
            2 | 3 => PasswordStrength::Medium,
            _ => PasswordStrength::Weak,
        }
    }
}

impl fmt::Display for PasswordStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of scoring a password
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordStrengthReport {
    pub strength: PasswordStrength,
    /// 0 to 6, one point per satisfied criterion
    pub score: u8,
    /// Hints for every unmet criterion, in evaluation order
    pub feedback: Vec<String>,
}

/// Score a password against six additive criteria.
///
/// The two length thresholds both apply to long passwords, so length is
/// worth up to two points.
pub fn evaluate_password_strength(password: &str) -> PasswordStrengthReport {
    let length = password.chars().count();

    let criteria: [(bool, &str); 6] = [
        (length >= 8, "Use at least 8 characters"),
        (length >= 12, "Use more than 12 characters for extra security"),
        (password.chars().any(|c| c.is_ascii_lowercase()), "Use lowercase letters"),
        (password.chars().any(|c| c.is_ascii_uppercase()), "Use uppercase letters"),
        (password.chars().any(|c| c.is_ascii_digit()), "Use numbers"),
        (password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)), "Use special characters"),
    ];

    let mut score = 0u8;
    let mut feedback = Vec::new();
    for (met, hint) in criteria {
        if met {
            score += 1;
        } else {
            feedback.push(hint.to_string());
        }
    }

    let strength = PasswordStrength::from_score(score);
    debug!("Password scored {} ({})", score, strength);

    PasswordStrengthReport { strength, score, feedback }
}
