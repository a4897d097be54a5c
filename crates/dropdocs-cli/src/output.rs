use chrono::{DateTime, Local};
use comfy_table::Table;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;

/// Create a styled table for output
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table
}

/// Format a byte size into a human-readable string
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match bytes {
        b if b >= GB => format!("{:.1}G", b as f64 / GB as f64),
        b if b >= MB => format!("{:.1}M", b as f64 / MB as f64),
        b if b >= KB => format!("{:.1}K", b as f64 / KB as f64),
        b => format!("{b}B"),
    }
}

/// Format an optional size, `-` for folders
pub fn format_optional_size(bytes: Option<i64>) -> String {
    bytes
        .and_then(|b| u64::try_from(b).ok())
        .map_or_else(|| "-".to_string(), format_size)
}

/// Format unix milliseconds as local time, `-` when unknown
pub fn format_millis(millis: Option<i64>) -> String {
    millis
        .and_then(DateTime::from_timestamp_millis)
        .map_or_else(
            || "-".to_string(),
            |t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        )
}

/// Format an entry type indicator
pub fn format_entry_type(is_dir: bool) -> &'static str {
    if is_dir { "d" } else { "-" }
}
