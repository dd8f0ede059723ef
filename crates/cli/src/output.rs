//! Output formatting utilities

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use desirer_lib::InstanceState;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a rounded table, or a warning if there are none
pub fn print_table<T: Tabled>(rows: Vec<T>, empty_message: &str) {
    if rows.is_empty() {
        print_warning(empty_message);
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Format megabytes the way the platform reports memory
pub fn format_memory(memory_mb: i64) -> String {
    if memory_mb >= 1000 && memory_mb % 1000 == 0 {
        format!("{}G", memory_mb / 1000)
    } else {
        format!("{}M", memory_mb)
    }
}

/// Format an instance start time given in nanoseconds since the epoch
pub fn format_since(since_nanos: i64) -> String {
    if since_nanos == 0 {
        return "-".to_string();
    }
    DateTime::<Utc>::from_timestamp(
        since_nanos.div_euclid(1_000_000_000),
        since_nanos.rem_euclid(1_000_000_000) as u32,
    )
    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
    .unwrap_or_else(|| since_nanos.to_string())
}

/// Color an instance state
pub fn color_state(state: InstanceState) -> String {
    let label = state.as_str();
    match state {
        InstanceState::Running => label.green().to_string(),
        InstanceState::Claimed => label.blue().to_string(),
        InstanceState::Unclaimed => label.yellow().to_string(),
        InstanceState::Crashed => label.red().to_string(),
        InstanceState::Unknown => label.dimmed().to_string(),
    }
}
