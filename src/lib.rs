//! Account Guard: one-time-code two-factor authentication and password
//! strength checks over a local encrypted store.

pub mod audit;
pub mod cli;
pub mod clock;
pub mod config;
pub mod database;
pub mod delivery;
pub mod export;
pub mod security;
pub mod storage;
pub mod user;
