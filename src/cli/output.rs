//! Shared CLI output helpers.
//!
//! Color scheme (respects NO_COLOR):
//! - Green: success, checkmarks
//! - Red: errors
//! - Yellow: warnings
//! - Cyan: hints, commands, identifiers
//! - Dimmed: secondary info

use std::fmt::Display;

use colored::Colorize;

/// Check if color output is disabled via the NO_COLOR env var.
fn colors_enabled() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Print a success message with checkmark (green).
pub fn success(msg: &str) {
    if colors_enabled() {
        println!("{} {}", "✓".green(), msg);
    } else {
        println!("✓ {}", msg);
    }
}

/// Print an error message to stderr (red).
pub fn error(msg: &str) {
    if colors_enabled() {
        eprintln!("{} {}", "✗".red(), msg);
    } else {
        eprintln!("✗ {}", msg);
    }
}

/// Print a warning message (yellow).
pub fn warn(msg: &str) {
    if colors_enabled() {
        println!("{} {}", "⚠".yellow(), msg);
    } else {
        println!("⚠ {}", msg);
    }
}

/// Print a hint message (cyan).
///
/// Example: `→ start the daemon with keyward serve`
pub fn hint(msg: &str) {
    if colors_enabled() {
        println!("{} {}", "→".cyan(), msg.cyan());
    } else {
        println!("→ {}", msg);
    }
}

/// Print a bold section header.
pub fn header(title: &str) {
    if colors_enabled() {
        println!("{}", title.bold());
    } else {
        println!("{}", title);
    }
}

/// Print a key-value pair (label dimmed, value plain).
pub fn kv(label: &str, value: impl Display) {
    if colors_enabled() {
        println!("  {:<14} {}", format!("{label}:").dimmed(), value);
    } else {
        println!("  {:<14} {}", format!("{label}:"), value);
    }
}

/// Print a serializable payload as pretty JSON.
pub fn json(value: &impl serde::Serialize) -> crate::error::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value)
            .map_err(|e| crate::error::Error::Other(format!("encode output: {e}")))?
    );
    Ok(())
}
