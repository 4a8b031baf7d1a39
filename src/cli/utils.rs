use anyhow::Result;
use chrono::{DateTime, Utc};
use std::io::{self, Write};

pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

pub fn print_info(message: &str) {
    println!("{}", message);
}

pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Read a line of input from the terminal
pub fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().to_string())
}

/// Read a secret from the terminal. Input is echoed.
pub fn read_password(prompt: &str) -> Result<String> {
    read_line(prompt)
}

/// Take `value` if given on the command line, otherwise prompt for it
pub fn value_or_prompt(value: Option<&str>, prompt: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v.to_string()),
        None => read_line(prompt),
    }
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Cut `text` to at most `max` characters, marking the cut with "..."
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Enabled two-factor authentication", 12), "Enabled t...");
    }

    #[test]
    fn test_format_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-03-09 07:05:00");
    }

    #[test]
    fn test_value_or_prompt_prefers_argument() {
        assert_eq!(value_or_prompt(Some("given"), "unused: ").unwrap(), "given");
    }
}
