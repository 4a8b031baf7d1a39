use anyhow::{Result, Context};
use log::debug;
use rusqlite::Connection;

/// Create the database schema
pub fn create_schema(conn: &mut Connection) -> Result<()> {
    debug!("Creating database schema");

    // Use a transaction to ensure all tables are created or none
    let tx = conn.transaction().context("Failed to start transaction for schema creation")?;

    tx.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT UNIQUE NOT NULL COLLATE NOCASE,
            display_name TEXT NOT NULL,
            age INTEGER,
            is_favorite INTEGER NOT NULL DEFAULT 0,
            two_factor_enabled INTEGER NOT NULL DEFAULT 0,
            two_factor_setup TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    ).context("Failed to create users table")?;

    // Encrypted key-value pairs for setup, code and grant records
    tx.execute(
        "CREATE TABLE IF NOT EXISTS secure_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    ).context("Failed to create secure_store table")?;

    tx.execute(
        "CREATE TABLE IF NOT EXISTS activities (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            action_type TEXT NOT NULL,
            target_user_id TEXT,
            description TEXT NOT NULL,
            timestamp TEXT NOT NULL
        )",
        [],
    ).context("Failed to create activities table")?;

    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_activities_user_id ON activities(user_id)",
        [],
    ).context("Failed to create activities user index")?;

    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_activities_timestamp ON activities(timestamp)",
        [],
    ).context("Failed to create activities timestamp index")?;

    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_activities_action_type ON activities(action_type)",
        [],
    ).context("Failed to create activities action index")?;

    tx.commit().context("Failed to commit schema creation")?;

    debug!("Database schema created");
    Ok(())
}
