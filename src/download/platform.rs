//! Platform detection for incoming links.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Video platforms the bot knows how to fetch from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    TikTok,
    Instagram,
    YouTube,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::TikTok, Platform::Instagram, Platform::YouTube];

    /// Human-readable name for user-facing text.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::TikTok => "TikTok",
            Self::Instagram => "Instagram",
            Self::YouTube => "YouTube",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TikTok => "tiktok",
            Self::Instagram => "instagram",
            Self::YouTube => "youtube",
        }
    }

    /// Platforms that only serve media to a logged-in session.
    pub fn requires_auth(self) -> bool {
        matches!(self, Self::Instagram)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered pattern table. First match wins.
static PLATFORM_PATTERNS: Lazy<Vec<(Regex, Platform)>> = Lazy::new(|| {
    [
        (r"(?i)\b(?:[a-z0-9-]+\.)*tiktok\.com\b", Platform::TikTok),
        (r"(?i)\b(?:[a-z0-9-]+\.)*(?:instagram\.com|instagr\.am)\b", Platform::Instagram),
        (r"(?i)\b(?:[a-z0-9-]+\.)*(?:youtube\.com|youtube-nocookie\.com|youtu\.be)\b", Platform::YouTube),
    ]
    .into_iter()
    .map(|(pattern, platform)| (Regex::new(pattern).expect("static platform pattern"), platform))
    .collect()
});

/// Detect which platform a URL (or text containing one) belongs to.
///
/// `None` means the platform is unsupported.
pub fn detect(text: &str) -> Option<Platform> {
    PLATFORM_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, platform)| *platform)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_tiktok() {
        assert_eq!(detect("https://www.tiktok.com/@x/video/1"), Some(Platform::TikTok));
        assert_eq!(detect("http://tiktok.com/some/video"), Some(Platform::TikTok));
        assert_eq!(detect("https://vm.tiktok.com/ZMabc/"), Some(Platform::TikTok));
    }

    #[test]
    fn test_detect_instagram() {
        assert_eq!(detect("https://instagram.com/p/abcd"), Some(Platform::Instagram));
        assert_eq!(detect("https://www.instagram.com/reel/Cxyz/"), Some(Platform::Instagram));
    }

    #[test]
    fn test_detect_youtube() {
        assert_eq!(detect("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), Some(Platform::YouTube));
        assert_eq!(detect("https://youtu.be/dQw4w9WgXcQ"), Some(Platform::YouTube));
        assert_eq!(detect("https://m.youtube.com/shorts/abc"), Some(Platform::YouTube));
    }

    #[test]
    fn test_scheme_and_www_do_not_matter() {
        for url in [
            "https://www.tiktok.com/@x/video/1",
            "http://www.tiktok.com/@x/video/1",
            "https://tiktok.com/@x/video/1",
            "tiktok.com/@x/video/1",
            "HTTPS://WWW.TIKTOK.COM/@x/video/1",
        ] {
            assert_eq!(detect(url), Some(Platform::TikTok), "{url}");
        }
    }

    #[test]
    fn test_unsupported() {
        assert_eq!(detect("https://example.com/v"), None);
        assert_eq!(detect("https://twitter.com/user/status/123"), None);
        assert_eq!(detect("https://nottiktok.com/video"), None);
        assert_eq!(detect(""), None);
    }

    #[test]
    fn test_url_inside_text() {
        assert_eq!(
            detect("Подивись: https://www.youtube.com/watch?v=12345"),
            Some(Platform::YouTube)
        );
    }

    #[test]
    fn test_table_order_resolves_ambiguity() {
        // Both hosts appear; tiktok is first in the table
        let url = "https://www.youtube.com/redirect?q=https://www.tiktok.com/@x/video/1";
        assert_eq!(detect(url), Some(Platform::TikTok));
    }

    #[test]
    fn test_requires_auth() {
        assert!(Platform::Instagram.requires_auth());
        assert!(!Platform::TikTok.requires_auth());
        assert!(!Platform::YouTube.requires_auth());
    }
}
