use anyhow::{anyhow, Result};

use crate::cli::utils::{print_info, print_success, print_warning, read_password};
use crate::security::{evaluate_password_strength, PasswordStrength};
use crate::user::FormValidator;

/// Handle `password check`. With `confirm` the password is asked twice and
/// both entries must match.
pub fn check(password: Option<&str>, confirm: bool, json: bool) -> Result<()> {
    let password = match password {
        Some(p) => p.to_string(),
        None => read_password("Password: ")?,
    };

    let mut form = FormValidator::new();
    form.validate_password(&password);
    if confirm {
        let again = read_password("Confirm password: ")?;
        form.validate_password_match(&password, &again);
    }

    let report = evaluate_password_strength(&password);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let line = format!("Strength: {} (score {}/6)", report.strength, report.score);
        match report.strength {
            PasswordStrength::Strong | PasswordStrength::VeryStrong => print_success(&line),
            _ => print_warning(&line),
        }
        for hint in &report.feedback {
            print_info(&format!("  - {}", hint));
        }
    }

    if let Some(field) = form.errors().first() {
        return Err(anyhow!("{}", field.message));
    }
    Ok(())
}
