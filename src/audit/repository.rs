use anyhow::{Result, Context};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, warn};
use rusqlite::{params, Row};

use crate::database::models::{ActivityLog, ActivityType};
use crate::database::{get_connection, DbPool};

/// Repository for activity log rows
pub struct ActivityRepository {
    pool: DbPool,
}

fn row_to_activity(row: &Row<'_>) -> rusqlite::Result<ActivityLog> {
    let action: String = row.get(2)?;
    let action_type = ActivityType::from_str(&action).unwrap_or_else(|e| {
        warn!("{}, reading it as update", e);
        ActivityType::Update
    });

    let timestamp_str: String = row.get(5)?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(ActivityLog {
        id: row.get(0)?,
        user_id: row.get(1)?,
        action_type,
        target_user_id: row.get(3)?,
        description: row.get(4)?,
        timestamp,
    })
}

impl ActivityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Save an activity to the database
    pub fn save_activity(&self, activity: &ActivityLog) -> Result<()> {
        let conn = get_connection(&self.pool)?;

        conn.execute(
            "INSERT INTO activities (
                id, user_id, action_type, target_user_id, description, timestamp
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6
            )",
            params![
                activity.id,
                activity.user_id,
                activity.action_type.as_str(),
                activity.target_user_id,
                activity.description,
                // Fixed width so that text ordering is time ordering
                activity.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        ).context("Failed to insert activity")?;

        debug!("Saved activity with ID: {}", activity.id);
        Ok(())
    }

    /// Activities performed by `user_id`, newest first
    pub fn get_user_activities(&self, user_id: &str, limit: usize) -> Result<Vec<ActivityLog>> {
        let conn = get_connection(&self.pool)?;

        let mut stmt = conn.prepare(
            "SELECT id, user_id, action_type, target_user_id, description, timestamp
             FROM activities
             WHERE user_id = ?1
             ORDER BY timestamp DESC, rowid DESC
             LIMIT ?2"
        ).context("Failed to prepare statement for getting user activities")?;

        let rows = stmt
            .query_map(params![user_id, limit as i64], row_to_activity)
            .context("Failed to query user activities")?;

        let mut result = Vec::new();
        for activity in rows {
            result.push(activity.context("Failed to process activity row")?);
        }

        Ok(result)
    }

    /// Activities of one kind, newest first
    pub fn get_activities_by_type(&self, action_type: ActivityType, limit: usize) -> Result<Vec<ActivityLog>> {
        let conn = get_connection(&self.pool)?;

        let mut stmt = conn.prepare(
            "SELECT id, user_id, action_type, target_user_id, description, timestamp
             FROM activities
             WHERE action_type = ?1
             ORDER BY timestamp DESC, rowid DESC
             LIMIT ?2"
        ).context("Failed to prepare statement for getting activities by type")?;

        let rows = stmt
            .query_map(params![action_type.as_str(), limit as i64], row_to_activity)
            .context("Failed to query activities by type")?;

        let mut result = Vec::new();
        for activity in rows {
            result.push(activity.context("Failed to process activity row")?);
        }

        Ok(result)
    }

    /// Every activity, newest first
    pub fn get_all_activities(&self, limit: usize) -> Result<Vec<ActivityLog>> {
        let conn = get_connection(&self.pool)?;

        let mut stmt = conn.prepare(
            "SELECT id, user_id, action_type, target_user_id, description, timestamp
             FROM activities
             ORDER BY timestamp DESC, rowid DESC
             LIMIT ?1"
        ).context("Failed to prepare statement for getting activities")?;

        let rows = stmt
            .query_map(params![limit as i64], row_to_activity)
            .context("Failed to query activities")?;

        let mut result = Vec::new();
        for activity in rows {
            result.push(activity.context("Failed to process activity row")?);
        }

        Ok(result)
    }
}
