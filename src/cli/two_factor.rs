use anyhow::{anyhow, Result};
use log::error;

use crate::cli::utils::{format_timestamp, print_info, print_success, print_warning, read_line};
use crate::cli::AppContext;
use crate::database::models::{ActivityType, DeliveryMethod};
use crate::delivery::MaskedDestination;
use crate::security::codes::is_well_formed_code;
use crate::user::{TwoFactorError, VerificationToken};

fn record(ctx: &AppContext, user_id: &str, description: &str) {
    if let Err(e) = ctx.activity.log_activity(user_id, ActivityType::Update, description, Some(user_id)) {
        error!("Failed to record activity for user {}: {}", user_id, e);
    }
}

/// Handle `two-factor setup`
pub fn setup(ctx: &AppContext, user_id: &str, method: &str, destination: &str) -> Result<()> {
    let method = DeliveryMethod::from_str(method).map_err(|e| anyhow!(e))?;

    let setup = ctx.two_factor.setup(user_id, destination, method)?;
    record(ctx, user_id, &format!("Started two-factor setup via {}", method.as_str()));

    print_success(&format!(
        "Two-factor setup saved: codes will be sent by {} to {}",
        setup.method.as_str(),
        setup.destination
    ));
    print_info("Run `two-factor send` to receive a code, then `two-factor verify --enable`.");
    Ok(())
}

/// Handle `two-factor send`
pub fn send(ctx: &AppContext, user_id: &str) -> Result<()> {
    let issued = match ctx.two_factor.issue_code_for_setup(user_id) {
        Ok(issued) => issued,
        Err(TwoFactorError::SetupNotInitiated) => {
            return Err(anyhow!("Two-factor setup has not been started. Run `two-factor setup` first"));
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(setup) = ctx.two_factor.get_setup(user_id)? {
        print_success(&format!(
            "Verification code sent by {} to {}",
            setup.method.as_str(),
            MaskedDestination(&setup.destination)
        ));
    }
    print_info(&format!("The code expires at {} UTC", format_timestamp(&issued.expires_at)));

    if let Some(code) = issued.code {
        print_warning(&format!("Development mode, code is {}", code));
    }
    Ok(())
}

/// Handle `two-factor verify`. With `enable` the fresh token is used right
/// away, otherwise it is printed for a later `two-factor enable --token`.
pub fn verify(ctx: &AppContext, user_id: &str, code: Option<&str>, enable: bool) -> Result<()> {
    let code = match code {
        Some(code) => code.to_string(),
        None => read_line("Enter the 6-digit code: ")?,
    };

    if !is_well_formed_code(&code) {
        print_warning("Codes are 6 digits. This attempt still counts against the limit.");
    }

    let token = match ctx.two_factor.verify_code(user_id, &code) {
        Ok(token) => token,
        Err(e @ (TwoFactorError::CodeExpired | TwoFactorError::MaxAttemptsReached)) => {
            record(ctx, user_id, &format!("Two-factor code rejected: {}", e));
            return Err(anyhow!("{}. Run `two-factor send` for a new code", e));
        }
        Err(e) => return Err(e.into()),
    };

    record(ctx, user_id, "Verified two-factor code");
    print_success("Code verified");

    if enable {
        return enable_with_token(ctx, user_id, &token);
    }

    print_info(&format!(
        "Verification token (valid for {} minutes): {}",
        ctx.two_factor.settings().verification_ttl.num_minutes(),
        token.as_str()
    ));
    Ok(())
}

/// Handle `two-factor enable`
pub fn enable(ctx: &AppContext, user_id: &str, token: &str) -> Result<()> {
    enable_with_token(ctx, user_id, &VerificationToken::new(token))
}

fn enable_with_token(ctx: &AppContext, user_id: &str, token: &VerificationToken) -> Result<()> {
    match ctx.two_factor.enable(user_id, token) {
        Ok(_) => {
            record(ctx, user_id, "Enabled two-factor authentication");
            print_success("Two-factor authentication has been enabled for your account");
            Ok(())
        }
        Err(TwoFactorError::VerificationRequired) => Err(anyhow!(
            "The verification token is missing, expired or already used. Verify a new code first"
        )),
        Err(e) => Err(e.into()),
    }
}

/// Handle `two-factor disable`
pub fn disable(ctx: &AppContext, user_id: &str, force: bool) -> Result<()> {
    if !force {
        print_warning("This removes the two-factor setup and any pending code.");
        let answer = read_line("Are you sure you want to continue? (y/N): ")?;
        if !answer.eq_ignore_ascii_case("y") {
            print_info("Cancelled");
            return Ok(());
        }
    }

    ctx.two_factor.disable(user_id)?;
    record(ctx, user_id, "Disabled two-factor authentication");
    print_success("Two-factor authentication has been disabled");
    Ok(())
}

/// Handle `two-factor status`
pub fn status(ctx: &AppContext, user_id: &str) -> Result<()> {
    match ctx.two_factor.get_setup(user_id)? {
        Some(setup) => {
            print_info(&format!(
                "Two-factor is {} ({} to {})",
                if setup.enabled { "enabled" } else { "not enabled" },
                setup.method.as_str(),
                setup.destination
            ));
            print_info(&format!("Set up: {}", format_timestamp(&setup.created_at)));
            if let Some(verified_at) = setup.verified_at {
                print_info(&format!("Verified: {}", format_timestamp(&verified_at)));
            }
        }
        None => print_info("Two-factor has not been set up"),
    }

    match ctx.two_factor.code_status(user_id)? {
        Some(code) if code.expired => print_info("Outstanding code has expired"),
        Some(code) => print_info(&format!(
            "Outstanding code expires at {} UTC, {} attempts left",
            format_timestamp(&code.expires_at),
            code.remaining_attempts
        )),
        None => print_info("No outstanding code"),
    }

    Ok(())
}
