use anyhow::{Result, Context};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use log::{info, debug};

use crate::config;

mod schema;
pub mod models;


pub use schema::create_schema;

/// SQLite connection pool shared by the stores
pub type DbPool = Pool<SqliteConnectionManager>;

/// Connection checked out of a [`DbPool`]
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Open a pool on `db_path` and make sure the schema exists
pub fn open_pool(db_path: &str, max_connections: u32) -> Result<DbPool> {
    // Create directory if it doesn't exist
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
    }

    let db_exists = Path::new(db_path).exists();

    let manager = SqliteConnectionManager::file(db_path);
    let pool = Pool::builder()
        .max_size(max_connections)
        .build(manager)
        .context("Failed to create database connection pool")?;

    let mut conn = pool.get().context("Failed to get a database connection")?;

    if db_exists {
        debug!("Using existing database at {}", db_path);
    } else {
        debug!("Creating new database at {}", db_path);
    }
    // Tables are created with IF NOT EXISTS so this is safe on every start
    schema::create_schema(&mut conn).context("Failed to create database schema")?;

    Ok(pool)
}

/// Initialize the database described by the global configuration
pub fn initialize() -> Result<DbPool> {
    let config = config::get_config();
    let pool = open_pool(&config.database.path, config.database.max_connections)?;
    info!("Database initialized at {}", config.database.path);
    Ok(pool)
}

/// Get a connection from the pool
pub fn get_connection(pool: &DbPool) -> Result<DbConnection> {
    pool.get().context("Failed to get a database connection")
}
