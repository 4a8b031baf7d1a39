use account_guard::{
    audit::ActivityLogger,
    config::{Config, SecurityConfig},
    database::{self, models::{ActivityType, DeliveryMethod}, DbPool},
    delivery::LoggingDeliveryChannel,
    security::{self, CodeVerifier},
    storage::{SqliteSecureStore, SqliteUserStore, UserRecordStore},
    export::{self, ExportFormat},
    user::{
        register_user, toggle_favorite, update_user_profile, RegistrationForm, TwoFactorError,
        TwoFactorService, TwoFactorSettings, UserProfileUpdate,
    },
};
use std::sync::Arc;
use tempfile::TempDir;

fn security_config() -> SecurityConfig {
    SecurityConfig {
        master_password: "integration-master".to_string(),
        master_salt: "integration-salt".to_string(),
        // Keep key derivation quick in tests
        kdf_iterations: 1_000,
    }
}

fn open() -> (TempDir, DbPool) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("guard.db");
    let pool = database::open_pool(path.to_str().unwrap(), 4).unwrap();
    (dir, pool)
}

/// A fresh service over the same database, as a new process would build it
fn service(pool: &DbPool) -> TwoFactorService {
    let config = security_config();
    let store = SqliteSecureStore::from_config(pool.clone(), &config).unwrap();
    let verifier_key = security::derive_key_from_password(
        &config.master_password,
        b"integration-salt:verification",
        config.kdf_iterations,
    )
    .unwrap();

    TwoFactorService::new(
        Box::new(store),
        Box::new(SqliteUserStore::new(pool.clone())),
        Box::new(LoggingDeliveryChannel),
        TwoFactorSettings {
            expose_codes: true,
            ..TwoFactorSettings::from(&Config::default().two_factor)
        },
    )
    .with_verifier(CodeVerifier::new(verifier_key))
}

fn register(pool: &DbPool) -> String {
    let users = SqliteUserStore::new(pool.clone());
    let form = RegistrationForm {
        email: "maria@example.com".to_string(),
        display_name: "Maria Silva".to_string(),
        age: "34".to_string(),
    };
    register_user(&users, &form).unwrap().id
}

#[test]
fn test_enrollment_across_service_instances() {
    let (_dir, pool) = open();
    let user_id = register(&pool);

    service(&pool)
        .setup(&user_id, "+5511912345678", DeliveryMethod::Sms)
        .unwrap();
    let code = service(&pool).issue_code_for_setup(&user_id).unwrap().code.unwrap();

    // Nothing in the database reveals the code
    let conn = database::get_connection(&pool).unwrap();
    let raw: Vec<String> = conn
        .prepare("SELECT value FROM secure_store")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(raw.len(), 2);
    assert!(raw.iter().all(|v| !v.contains(&code)));

    let token = service(&pool).verify_code(&user_id, &code).unwrap();
    service(&pool).enable(&user_id, &token).unwrap();

    let user = SqliteUserStore::new(pool.clone()).get_user(&user_id).unwrap().unwrap();
    assert!(user.two_factor_enabled);
    assert!(user.two_factor_setup.unwrap().verified_at.is_some());

    assert_eq!(
        service(&pool).enable(&user_id, &token).unwrap_err(),
        TwoFactorError::VerificationRequired
    );

    service(&pool).disable(&user_id).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM secure_store", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn test_attempts_survive_restarts() {
    let (_dir, pool) = open();
    let user_id = register(&pool);

    service(&pool)
        .issue_code(&user_id, DeliveryMethod::Email, "maria@example.com")
        .unwrap();

    assert_eq!(
        service(&pool).verify_code(&user_id, "000000").unwrap_err(),
        TwoFactorError::IncorrectCode { remaining: 2 }
    );
    assert_eq!(
        service(&pool).verify_code(&user_id, "000000").unwrap_err(),
        TwoFactorError::IncorrectCode { remaining: 1 }
    );
    assert_eq!(
        service(&pool).verify_code(&user_id, "000000").unwrap_err(),
        TwoFactorError::MaxAttemptsReached
    );
}

#[test]
fn test_unknown_user_cannot_set_up() {
    let (_dir, pool) = open();
    assert_eq!(
        service(&pool)
            .setup("missing", "+5511912345678", DeliveryMethod::Sms)
            .unwrap_err(),
        TwoFactorError::UserNotFound
    );
}

#[test]
fn test_activity_log_records_flow() {
    let (_dir, pool) = open();
    let user_id = register(&pool);
    let activity = ActivityLogger::new(pool.clone());

    activity
        .log_activity(&user_id, ActivityType::Create, "Created user maria@example.com", Some(&user_id))
        .unwrap();
    activity
        .log_activity(&user_id, ActivityType::Update, "Enabled two-factor authentication", Some(&user_id))
        .unwrap();
    activity
        .log_activity("admin", ActivityType::Permission, "Granted export", Some(&user_id))
        .unwrap();

    let mine = activity.get_user_activities(&user_id, Some(10)).unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].description, "Enabled two-factor authentication");

    let all = activity.get_all_activities(Some(10)).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].action_type, ActivityType::Permission);
}

#[test]
fn test_registered_users_are_listed() {
    let (_dir, pool) = open();
    let users = Arc::new(SqliteUserStore::new(pool.clone()));
    register(&pool);

    let form = RegistrationForm {
        email: "joao@example.com".to_string(),
        display_name: "Joao".to_string(),
        age: "19".to_string(),
    };
    register_user(users.as_ref(), &form).unwrap();

    let listed = users.list_users().unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|u| !u.two_factor_enabled));
}

#[test]
fn test_edit_search_favorite_and_delete() {
    let (_dir, pool) = open();
    let users = SqliteUserStore::new(pool.clone());
    let user_id = register(&pool);

    let update = UserProfileUpdate {
        display_name: Some("Maria Souza".to_string()),
        age: Some("35".to_string()),
        ..Default::default()
    };
    let updated = update_user_profile(&users, &user_id, &update).unwrap();
    assert_eq!(updated.display_name, "Maria Souza");
    assert_eq!(updated.age, Some(35));

    assert_eq!(users.search_users("souza").unwrap().len(), 1);
    assert!(users.search_users("silva").unwrap().is_empty());

    assert!(toggle_favorite(&users, &user_id).unwrap());
    assert!(users.get_user(&user_id).unwrap().unwrap().is_favorite);

    // Deleting a user with two-factor on leaves no secrets behind
    service(&pool).setup(&user_id, "+5511912345678", DeliveryMethod::Sms).unwrap();
    service(&pool).issue_code_for_setup(&user_id).unwrap();
    service(&pool).disable(&user_id).unwrap();
    assert!(users.delete_user(&user_id).unwrap());

    let conn = database::get_connection(&pool).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM secure_store", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
    assert!(users.get_user(&user_id).unwrap().is_none());
}

#[test]
fn test_export_and_activity_by_type() {
    let (dir, pool) = open();
    let users = SqliteUserStore::new(pool.clone());
    let activity = ActivityLogger::new(pool.clone());
    register(&pool);

    let listed = users.list_users().unwrap();
    let csv_path = dir.path().join("exports").join("users.csv");
    export::export_users(&listed, ExportFormat::Csv, &csv_path).unwrap();
    activity
        .log_activity("cli", ActivityType::Export, "Exported 1 users as csv", None)
        .unwrap();
    activity
        .log_activity("cli", ActivityType::Favorite, "Marked user as favorite", Some(&listed[0].id))
        .unwrap();

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains("\"maria@example.com\""));

    let exports = activity.get_activities_by_type(ActivityType::Export, None).unwrap();
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].description, "Exported 1 users as csv");
}
