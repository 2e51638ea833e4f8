use anyhow::{Result, bail};
use colored::*;
use sitrep_core::{Destination, NodeTable};

pub fn print_error(message: &str) {
    eprintln!("{prefix} {message}", prefix = "Error:".red().bold());
}

pub fn print_success(message: &str) {
    eprintln!("{prefix} {message}", prefix = "✓".green().bold());
}

pub fn print_warning(message: &str) {
    eprintln!("{prefix} {message}", prefix = "⚠".yellow().bold());
}

pub fn print_info(message: &str) {
    eprintln!("{prefix} {message}", prefix = "ℹ".blue().bold());
}

/// Resolve `!a1b2c3d4`, `0xa1b2c3d4`, `a1b2c3d4` or a known short name to a destination
pub fn resolve_destination(table: &NodeTable, dest: &str) -> Result<Destination> {
    let dest = dest.trim();
    if dest.eq_ignore_ascii_case("broadcast") || dest == "^all" {
        return Ok(Destination::Broadcast);
    }
    if let Some(node) = table.find_by_short_name(dest) {
        return Ok(Destination::from_node_num(node.num));
    }

    let hex = dest
        .strip_prefix('!')
        .or_else(|| dest.strip_prefix("0x"))
        .unwrap_or(dest);
    match u32::from_str_radix(hex, 16) {
        Ok(num) => Ok(Destination::from_node_num(num)),
        Err(_) => bail!("Unknown destination '{dest}': not a node id or known short name"),
    }
}

/// Shorten a line for a progress message
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    short.push('…');
    short
}
