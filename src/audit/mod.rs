use anyhow::Result;
use log::info;

use crate::config;
use crate::database::models::{ActivityLog, ActivityType};
use crate::database::DbPool;

pub mod repository;

pub use repository::ActivityRepository;

/// Records user-visible actions in the activity log
pub struct ActivityLogger {
    repository: ActivityRepository,
}

impl ActivityLogger {
    pub fn new(pool: DbPool) -> Self {
        Self {
            repository: ActivityRepository::new(pool),
        }
    }

    /// Log an activity and return its ID
    pub fn log_activity(
        &self,
        user_id: &str,
        action_type: ActivityType,
        description: &str,
        target_user_id: Option<&str>,
    ) -> Result<String> {
        let activity = ActivityLog::new(
            user_id.to_string(),
            action_type,
            description.to_string(),
            target_user_id.map(|s| s.to_string()),
        );

        self.repository.save_activity(&activity)?;

        info!("Activity logged: {} - {}", activity.id, action_type.as_str());
        Ok(activity.id)
    }

    /// Activities of one user, newest first. `None` uses the configured limit.
    pub fn get_user_activities(&self, user_id: &str, limit: Option<usize>) -> Result<Vec<ActivityLog>> {
        let limit = limit.unwrap_or_else(|| config::get_config().activity.default_limit);
        self.repository.get_user_activities(user_id, limit)
    }

    /// Activities of one kind, newest first. `None` uses the configured limit.
    pub fn get_activities_by_type(&self, action_type: ActivityType, limit: Option<usize>) -> Result<Vec<ActivityLog>> {
        let limit = limit.unwrap_or_else(|| config::get_config().activity.default_limit);
        self.repository.get_activities_by_type(action_type, limit)
    }

    /// All activities, newest first. `None` uses the configured limit.
    pub fn get_all_activities(&self, limit: Option<usize>) -> Result<Vec<ActivityLog>> {
        let limit = limit.unwrap_or_else(|| config::get_config().activity.default_limit);
        self.repository.get_all_activities(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::open_pool;
    use tempfile::TempDir;

    fn logger() -> (ActivityLogger, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("activity.db");
        let pool = open_pool(path.to_str().unwrap(), 2).unwrap();
        (ActivityLogger::new(pool), dir)
    }

    #[test]
    fn test_log_and_list_newest_first() {
        let (logger, _dir) = logger();

        logger.log_activity("u1", ActivityType::Create, "Created user", Some("u2")).unwrap();
        logger.log_activity("u1", ActivityType::Update, "Enabled two-factor", None).unwrap();
        logger.log_activity("u3", ActivityType::Login, "Signed in", None).unwrap();

        let mine = logger.get_user_activities("u1", Some(10)).unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].action_type, ActivityType::Update);
        assert_eq!(mine[1].target_user_id.as_deref(), Some("u2"));

        let all = logger.get_all_activities(Some(10)).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].user_id, "u3");
    }

    #[test]
    fn test_filter_by_type() {
        let (logger, _dir) = logger();

        logger.log_activity("u1", ActivityType::Favorite, "Marked favorite", Some("u2")).unwrap();
        logger.log_activity("u1", ActivityType::Export, "Exported 2 users", None).unwrap();
        logger.log_activity("u2", ActivityType::Favorite, "Removed favorite", Some("u1")).unwrap();

        let favorites = logger.get_activities_by_type(ActivityType::Favorite, Some(10)).unwrap();
        assert_eq!(favorites.len(), 2);
        assert_eq!(favorites[0].description, "Removed favorite");
        assert!(favorites.iter().all(|a| a.action_type == ActivityType::Favorite));

        assert!(logger.get_activities_by_type(ActivityType::Delete, Some(10)).unwrap().is_empty());
        assert_eq!(logger.get_activities_by_type(ActivityType::Favorite, Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_limit_is_applied() {
        let (logger, _dir) = logger();
        for i in 0..5 {
            logger
                .log_activity("u1", ActivityType::Export, &format!("Export {}", i), None)
                .unwrap();
        }

        let recent = logger.get_all_activities(Some(2)).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].description, "Export 4");
    }
}
