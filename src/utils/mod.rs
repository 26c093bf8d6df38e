//! Utility functions.
//!
//! Collection of helper functions used across the bot.

use once_cell::sync::Lazy;
use regex::Regex;

/// Anything that looks like a web link in a chat message.
static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+").expect("static url pattern"));

/// Whether `text` contains a link at all.
pub fn contains_url(text: &str) -> bool {
    URL_PATTERN.is_match(text)
}

/// First link in `text`, taken verbatim up to the next whitespace.
pub fn extract_url(text: &str) -> Option<&str> {
    URL_PATTERN.find(text).map(|m| m.as_str())
}

/// Format a username for display.
///
/// If the user has a username, returns @username.
/// Otherwise, returns the first name.
pub fn format_username(username: Option<&str>, first_name: &str) -> String {
    match username {
        Some(u) => format!("@{}", u),
        None => first_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_url() {
        assert_eq!(
            extract_url("look https://www.tiktok.com/@x/video/1 nice"),
            Some("https://www.tiktok.com/@x/video/1")
        );
        assert_eq!(extract_url("http://youtu.be/abc"), Some("http://youtu.be/abc"));
        assert_eq!(extract_url("a https://a.com b https://b.com"), Some("https://a.com"));
        assert_eq!(extract_url("no links here"), None);
        assert_eq!(extract_url("ftp://example.com/file"), None);
    }

    #[test]
    fn test_contains_url() {
        assert!(contains_url("https://example.com/v"));
        assert!(!contains_url("https:// nope"));
    }

    #[test]
    fn test_format_username() {
        assert_eq!(format_username(Some("alice"), "Alice"), "@alice");
        assert_eq!(format_username(None, "Alice"), "Alice");
    }
}
