// User data export: CSV, JSON and a plain-text summary report.
// Two-factor destinations are never written out.

use anyhow::{Result, Context, anyhow};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

use crate::database::models::User;

/// Output format of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Text,
}

impl ExportFormat {
    pub fn as_str(&self) -> &str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Text => "text",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "text" | "txt" | "report" => Ok(ExportFormat::Text),
            _ => Err(format!("Unsupported export format: {}", s)),
        }
    }

    pub fn extension(&self) -> &str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Text => "txt",
        }
    }
}

/// The exported view of a user
#[derive(Debug, Serialize)]
struct ExportedUser<'a> {
    id: &'a str,
    email: &'a str,
    display_name: &'a str,
    age: Option<u32>,
    is_favorite: bool,
    two_factor_enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'a> From<&'a User> for ExportedUser<'a> {
    fn from(user: &'a User) -> Self {
        Self {
            id: &user.id,
            email: &user.email,
            display_name: &user.display_name,
            age: user.age,
            is_favorite: user.is_favorite,
            two_factor_enabled: user.two_factor_enabled,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Users as CSV, one row per user after a header row
pub fn users_to_csv(users: &[User]) -> String {
    let mut out = String::from("ID,Email,Name,Age,Favorite,TwoFactor,CreatedAt,UpdatedAt\n");

    for user in users {
        // Writing to a String cannot fail
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            user.id,
            quoted(&user.email),
            quoted(&user.display_name),
            user.age.map(|a| a.to_string()).unwrap_or_default(),
            user.is_favorite,
            user.two_factor_enabled,
            user.created_at.to_rfc3339(),
            user.updated_at.to_rfc3339(),
        );
    }

    out
}

/// Users as a pretty-printed JSON array
pub fn users_to_json(users: &[User]) -> Result<String> {
    let exported: Vec<ExportedUser<'_>> = users.iter().map(ExportedUser::from).collect();
    serde_json::to_string_pretty(&exported).context("Failed to serialize users to JSON")
}

/// Human-readable summary with totals, age statistics and one entry per user
pub fn generate_text_report(users: &[User], generated_at: DateTime<Utc>) -> String {
    let favorites = users.iter().filter(|u| u.is_favorite).count();
    let protected = users.iter().filter(|u| u.two_factor_enabled).count();
    let ages: Vec<u32> = users.iter().filter_map(|u| u.age).collect();

    let mut out = String::new();
    let _ = writeln!(out, "========================================");
    let _ = writeln!(out, "USER REPORT");
    let _ = writeln!(out, "========================================");
    let _ = writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out);
    let _ = writeln!(out, "TOTALS:");
    let _ = writeln!(out, "- Users: {}", users.len());
    let _ = writeln!(out, "- Favorites: {}", favorites);
    let _ = writeln!(out, "- Two-factor enabled: {}", protected);
    let _ = writeln!(out);
    let _ = writeln!(out, "AGE:");
    match (ages.iter().min(), ages.iter().max()) {
        (Some(min), Some(max)) => {
            let average = ages.iter().map(|&a| a as f64).sum::<f64>() / ages.len() as f64;
            let _ = writeln!(out, "- Youngest: {}", min);
            let _ = writeln!(out, "- Oldest: {}", max);
            let _ = writeln!(out, "- Average: {:.2}", average);
        }
        _ => {
            let _ = writeln!(out, "- No ages recorded");
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "USERS:");
    for (i, user) in users.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, user.display_name);
        let _ = writeln!(out, "   Email: {}", user.email);
        if let Some(age) = user.age {
            let _ = writeln!(out, "   Age: {}", age);
        }
        let _ = writeln!(
            out,
            "   Two-factor: {}",
            if user.two_factor_enabled { "enabled" } else { "disabled" }
        );
        let _ = writeln!(out, "   Registered: {}", user.created_at.format("%Y-%m-%d"));
    }
    let _ = writeln!(out, "========================================");

    out
}

/// Default file name, e.g. `users_20240101_120000.csv`
pub fn default_file_name(format: ExportFormat, now: DateTime<Utc>) -> String {
    let stem = match format {
        ExportFormat::Text => "users_report",
        _ => "users",
    };
    format!("{}_{}.{}", stem, now.format("%Y%m%d_%H%M%S"), format.extension())
}

/// Render `users` in `format` and write the result to `path`
pub fn export_users(users: &[User], format: ExportFormat, path: &Path) -> Result<()> {
    let content = match format {
        ExportFormat::Csv => users_to_csv(users),
        ExportFormat::Json => users_to_json(users)?,
        ExportFormat::Text => generate_text_report(users, Utc::now()),
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).context("Failed to create export directory")?;
        }
    }

    if path.is_dir() {
        return Err(anyhow!("Export path {} is a directory", path.display()));
    }

    std::fs::write(path, content).context(format!("Failed to write export to {}", path.display()))
}
