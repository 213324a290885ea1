//! Progress display arithmetic and terminal rendering.

use colored::*;

use crate::protocol::ProgressEvent;

/// Completion percentage, rounded half up and clamped to 0..=100.
///
/// A zero `total` renders as 0 %.
pub fn percent(current: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let current = current.min(total) as u128;
    let total = total as u128;
    let rounded = (current * 200 + total) / (total * 2);
    rounded.min(100) as u8
}

/// Text rendered next to the bar for `event`.
pub fn progress_text(event: &ProgressEvent) -> String {
    format!("Processing row {} of {}", event.current.min(event.total), event.total)
}

/// Short description of the current operation.
pub fn operation_status(event: &ProgressEvent) -> String {
    if event.current <= 1 {
        "Starting process...".to_string()
    } else {
        format!("Processing row {}", event.current.min(event.total))
    }
}

/// Fixed-width bar such as `[#####-----]  50%`.
pub fn render_bar(pct: u8, width: usize) -> String {
    let filled = (pct as usize * width + 50) / 100;
    let filled = filled.min(width);
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled).bright_green(),
        "-".repeat(width - filled).bright_black(),
        pct
    )
}
