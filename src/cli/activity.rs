use anyhow::{anyhow, Result};

use crate::cli::utils::{format_timestamp, print_info, truncate};
use crate::cli::AppContext;
use crate::database::models::ActivityType;

/// Handle `activity list`
pub fn list(
    ctx: &AppContext,
    user_id: Option<&str>,
    action: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let action = action
        .map(ActivityType::from_str)
        .transpose()
        .map_err(|e| anyhow!(e))?;

    let activities = match (user_id, action) {
        (Some(id), None) => ctx.activity.get_user_activities(id, limit)?,
        (None, Some(action)) => ctx.activity.get_activities_by_type(action, limit)?,
        (Some(id), Some(action)) => ctx
            .activity
            .get_user_activities(id, limit)?
            .into_iter()
            .filter(|a| a.action_type == action)
            .collect(),
        (None, None) => ctx.activity.get_all_activities(limit)?,
    };

    if activities.is_empty() {
        print_info("No activity recorded");
        return Ok(());
    }

    print_info("------------------------------------------------------------------------------");
    print_info(&format!("{:<19} | {:<10} | {:<8} | {}", "Time", "Action", "User", "Description"));
    print_info("------------------------------------------------------------------------------");
    for activity in &activities {
        print_info(&format!(
            "{:<19} | {:<10} | {:<8} | {}",
            format_timestamp(&activity.timestamp),
            activity.action_type.as_str(),
            truncate(&activity.user_id, 8),
            truncate(&activity.description, 40)
        ));
    }
    print_info("------------------------------------------------------------------------------");

    Ok(())
}
