use anyhow::{anyhow, Result};
use chrono::Utc;
use log::{debug, error};
use std::path::PathBuf;

use crate::cli::utils::{
    format_timestamp, print_error, print_info, print_success, print_warning, read_line, truncate,
    value_or_prompt,
};
use crate::cli::{AppContext, CLI_ACTOR};
use crate::database::models::{ActivityType, User};
use crate::export::{self, ExportFormat};
use crate::storage::UserRecordStore;
use crate::user::{
    register_user, toggle_favorite, update_user_profile, RegistrationForm, UserProfileError,
    UserProfileUpdate, UserRegistrationError,
};

fn record(ctx: &AppContext, actor: &str, action: ActivityType, description: &str, target: Option<&str>) {
    if let Err(e) = ctx.activity.log_activity(actor, action, description, target) {
        error!("Failed to record {} activity: {}", action.as_str(), e);
    }
}

/// Handle `user create`
pub fn create_user(
    ctx: &AppContext,
    email: Option<&str>,
    name: Option<&str>,
    age: Option<&str>,
) -> Result<User> {
    let form = RegistrationForm {
        email: value_or_prompt(email, "Email: ")?,
        display_name: value_or_prompt(name, "Display name: ")?,
        age: value_or_prompt(age, "Age: ")?,
    };

    let user = match register_user(ctx.users.as_ref(), &form) {
        Ok(user) => user,
        Err(UserRegistrationError::ValidationFailed(messages)) => {
            for message in &messages {
                print_error(message);
            }
            return Err(anyhow!("User registration failed validation"));
        }
        Err(e) => return Err(e.into()),
    };

    record(ctx, &user.id, ActivityType::Create, &format!("Created user {}", user.email), Some(&user.id));

    print_success(&format!("User created with ID: {}", user.id));
    Ok(user)
}

fn print_user_table(users: &[User]) {
    print_info("----------------------------------------------------------------------------------");
    print_info(&format!("{:<36} | {:<28} | {:<4} | {:<3} | 2FA", "ID", "Email", "Age", "Fav"));
    print_info("----------------------------------------------------------------------------------");
    for user in users {
        print_info(&format!(
            "{:<36} | {:<28} | {:<4} | {:<3} | {}",
            user.id,
            truncate(&user.email, 28),
            user.age.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string()),
            if user.is_favorite { "*" } else { "" },
            if user.two_factor_enabled { "on" } else { "off" }
        ));
    }
    print_info("----------------------------------------------------------------------------------");
    print_info(&format!("Total: {} users", users.len()));
}

/// Handle `user list`
pub fn list_users(ctx: &AppContext, favorites_only: bool) -> Result<()> {
    let mut users = ctx.users.list_users()?;
    if favorites_only {
        users.retain(|u| u.is_favorite);
    }
    debug!("Listing {} users", users.len());

    if users.is_empty() {
        print_info("No users found");
        return Ok(());
    }

    print_user_table(&users);
    Ok(())
}

/// Handle `user search`
pub fn search_users(ctx: &AppContext, term: &str) -> Result<()> {
    let users = ctx.users.search_users(term.trim())?;

    if users.is_empty() {
        print_info(&format!("No users match '{}'", term));
        return Ok(());
    }

    print_user_table(&users);
    Ok(())
}

/// Handle `user show`
pub fn show_user(ctx: &AppContext, user_id: &str) -> Result<()> {
    let user = ctx
        .users
        .get_user(user_id)?
        .ok_or_else(|| anyhow!("User {} not found", user_id))?;

    print_info(&format!("ID:           {}", user.id));
    print_info(&format!("Email:        {}", user.email));
    print_info(&format!("Display name: {}", user.display_name));
    if let Some(age) = user.age {
        print_info(&format!("Age:          {}", age));
    }
    print_info(&format!("Favorite:     {}", if user.is_favorite { "yes" } else { "no" }));
    print_info(&format!("Created:      {}", format_timestamp(&user.created_at)));
    print_info(&format!("Updated:      {}", format_timestamp(&user.updated_at)));
    print_info(&format!(
        "Two-factor:   {}",
        if user.two_factor_enabled { "enabled" } else { "disabled" }
    ));

    if let Some(setup) = &user.two_factor_setup {
        print_info(&format!("  Method:      {}", setup.method.as_str()));
        print_info(&format!("  Destination: {}", setup.destination));
        print_info(&format!(
            "  Verified:    {}",
            setup
                .verified_at
                .map(|t| format_timestamp(&t))
                .unwrap_or_else(|| "never".to_string())
        ));
    }

    Ok(())
}

/// Handle `user update`
pub fn update_user(ctx: &AppContext, user_id: &str, update: &UserProfileUpdate) -> Result<User> {
    if update.is_empty() {
        return Err(anyhow!("Nothing to update. Pass --email, --name or --age"));
    }

    let user = match update_user_profile(ctx.users.as_ref(), user_id, update) {
        Ok(user) => user,
        Err(UserProfileError::ValidationFailed(messages)) => {
            for message in &messages {
                print_error(message);
            }
            return Err(anyhow!("Profile update failed validation"));
        }
        Err(e) => return Err(e.into()),
    };

    let mut changed = Vec::new();
    if update.email.is_some() {
        changed.push("email");
    }
    if update.display_name.is_some() {
        changed.push("name");
    }
    if update.age.is_some() {
        changed.push("age");
    }
    record(
        ctx,
        &user.id,
        ActivityType::Update,
        &format!("Updated {} for {}", changed.join(", "), user.email),
        Some(&user.id),
    );

    print_success(&format!("User {} updated", user.id));
    Ok(user)
}

/// Handle `user favorite`
pub fn favorite(ctx: &AppContext, user_id: &str) -> Result<()> {
    let favorite = toggle_favorite(ctx.users.as_ref(), user_id)?;

    let description = if favorite { "Marked user as favorite" } else { "Removed user from favorites" };
    record(ctx, CLI_ACTOR, ActivityType::Favorite, description, Some(user_id));

    print_success(description);
    Ok(())
}

/// Handle `user delete`. Two-factor records go with the user.
pub fn delete_user(ctx: &AppContext, user_id: &str, force: bool) -> Result<()> {
    let user = ctx
        .users
        .get_user(user_id)?
        .ok_or_else(|| anyhow!("User {} not found", user_id))?;

    if !force {
        print_warning(&format!("This permanently deletes {} and their two-factor records.", user.email));
        let answer = read_line("Are you sure you want to continue? (y/N): ")?;
        if !answer.eq_ignore_ascii_case("y") {
            print_info("Cancelled");
            return Ok(());
        }
    }

    ctx.two_factor.disable(user_id)?;
    if !ctx.users.delete_user(user_id)? {
        return Err(anyhow!("User {} not found", user_id));
    }

    record(ctx, CLI_ACTOR, ActivityType::Delete, &format!("Deleted user {}", user.email), Some(user_id));
    print_success(&format!("User {} deleted", user.email));
    Ok(())
}

/// Handle `user export`. Returns the path written.
pub fn export_users(
    ctx: &AppContext,
    format: &str,
    output: Option<&str>,
    query: Option<&str>,
    favorites_only: bool,
) -> Result<PathBuf> {
    let format = ExportFormat::from_str(format).map_err(|e| anyhow!(e))?;

    let mut users = match query {
        Some(term) => ctx.users.search_users(term.trim())?,
        None => ctx.users.list_users()?,
    };
    if favorites_only {
        users.retain(|u| u.is_favorite);
    }

    if users.is_empty() {
        print_info("No users found matching the criteria.");
    }

    let path = match output {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from(export::default_file_name(format, Utc::now())),
    };
    export::export_users(&users, format, &path)?;

    record(
        ctx,
        CLI_ACTOR,
        ActivityType::Export,
        &format!("Exported {} users as {}", users.len(), format.as_str()),
        None,
    );

    print_success(&format!("Exported {} users to {}", users.len(), path.display()));
    Ok(path)
}
