use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print one row of a listing: padded name, then details
pub fn row(name: &str, width: usize, details: &str) {
    println!("  {}  {}", format!("{name:<width$}").bold(), details);
}

/// Comma-separated list, or a dash when empty
pub fn list(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

/// Width of the longest name, for aligning rows
pub fn name_width<'a>(names: impl IntoIterator<Item = &'a str>) -> usize {
    names
        .into_iter()
        .map(|name| name.chars().count())
        .max()
        .unwrap_or(0)
}

/// Truncate text for display, keeping the start
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = text.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list() {
        assert_eq!(list(&[]), "-");
        assert_eq!(list(&["web".to_string(), "db".to_string()]), "web, db");
    }

    #[test]
    fn test_name_width() {
        assert_eq!(name_width(["web01", "db", "cache-primary"]), 13);
        assert_eq!(name_width(Vec::<&str>::new()), 0);
    }

    #[test]
    fn test_truncate_short() {
        assert_eq!(truncate("short", 20), "short");
        assert_eq!(truncate("exact", 5), "exact");
    }

    #[test]
    fn test_truncate_long() {
        assert_eq!(truncate("deploy the whole fleet", 12), "deploy th...");
        assert_eq!(truncate("test", 3), "...");
    }
}
