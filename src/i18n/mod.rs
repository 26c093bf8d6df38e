//! Internationalization (i18n) module.
//!
//! Translations are embedded JSON tables keyed by language code. Lookups
//! use dot notation (`download.failed`) and fall back to Ukrainian.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Supported interface languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Uk,
    Pl,
    En,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Uk, Language::Pl, Language::En];

    pub fn code(self) -> &'static str {
        match self {
            Self::Uk => "uk",
            Self::Pl => "pl",
            Self::En => "en",
        }
    }

    /// Label shown on the language keyboard.
    pub fn label(self) -> &'static str {
        match self {
            Self::Uk => "🇺🇦 Українська",
            Self::Pl => "🇵🇱 Polski",
            Self::En => "🇬🇧 English",
        }
    }

    /// Exact match on a stored or callback code.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|lang| lang.code() == code)
    }

    /// Map a Telegram `language_code` (e.g. `pl`, `en-US`) to a language.
    pub fn from_telegram(code: Option<&str>) -> Self {
        match code.map(str::to_ascii_lowercase) {
            Some(code) if code.starts_with("pl") => Self::Pl,
            Some(code) if code.starts_with("en") => Self::En,
            _ => Self::Uk,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Effective language: stored preference first, then the client language.
pub fn resolve(stored: Option<Language>, telegram_code: Option<&str>) -> Language {
    stored.unwrap_or_else(|| Language::from_telegram(telegram_code))
}

/// Global translation store: Language -> Key -> Text
static TRANSLATIONS: OnceLock<HashMap<Language, Value>> = OnceLock::new();

fn translations() -> &'static HashMap<Language, Value> {
    TRANSLATIONS.get_or_init(|| {
        let sources = [
            (Language::Uk, include_str!("uk.json")),
            (Language::Pl, include_str!("pl.json")),
            (Language::En, include_str!("en.json")),
        ];

        let mut map = HashMap::new();
        for (lang, source) in sources {
            match serde_json::from_str(source) {
                Ok(val) => {
                    map.insert(lang, val);
                }
                Err(e) => warn!("Invalid translation table for {}: {}", lang, e),
            }
        }
        map
    })
}

/// Get text for a key in a specific language.
///
/// Falls back to Ukrainian, then to the key itself.
pub fn get_text(lang: Language, key: &str) -> String {
    let store = translations();

    if let Some(text) = store.get(&lang).and_then(|val| resolve_key(val, key)) {
        return text;
    }

    if lang != Language::default() {
        if let Some(text) = store.get(&Language::default()).and_then(|val| resolve_key(val, key)) {
            return text;
        }
    }

    key.to_string()
}

/// Get text and substitute `{name}` placeholders.
pub fn format_text(lang: Language, key: &str, args: &[(&str, &str)]) -> String {
    args.iter().fold(get_text(lang, key), |text, (name, value)| {
        text.replace(&format!("{{{name}}}"), value)
    })
}

fn resolve_key(val: &Value, key: &str) -> Option<String> {
    let mut current = val;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    current.as_str().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: &[&str] = &[
        "start.greeting",
        "start.choose_language",
        "help.text",
        "lang.set",
        "download.unsupported",
        "download.limit",
        "download.status",
        "download.failed",
        "download.send_failed",
        "download.warning",
        "download.more_button",
        "download.more_prompt",
    ];

    #[test]
    fn test_every_language_has_every_key() {
        for lang in Language::ALL {
            for key in KEYS {
                assert_ne!(get_text(lang, key), *key, "{lang} is missing {key}");
            }
        }
    }

    #[test]
    fn test_unknown_key_returns_key() {
        assert_eq!(get_text(Language::En, "nope.missing"), "nope.missing");
    }

    #[test]
    fn test_placeholders() {
        let text = format_text(Language::En, "download.limit", &[("max", "10")]);
        assert!(text.contains("10"));
        assert!(!text.contains("{max}"));
    }

    #[test]
    fn test_from_telegram() {
        assert_eq!(Language::from_telegram(Some("pl")), Language::Pl);
        assert_eq!(Language::from_telegram(Some("en-US")), Language::En);
        assert_eq!(Language::from_telegram(Some("uk")), Language::Uk);
        assert_eq!(Language::from_telegram(Some("de")), Language::Uk);
        assert_eq!(Language::from_telegram(None), Language::Uk);
    }

    #[test]
    fn test_resolve_prefers_stored() {
        assert_eq!(resolve(Some(Language::En), Some("pl")), Language::En);
        assert_eq!(resolve(None, Some("pl")), Language::Pl);
        assert_eq!(resolve(None, None), Language::Uk);
    }

    #[test]
    fn test_codes_round_trip_through_serde() {
        assert_eq!(Language::from_code("pl"), Some(Language::Pl));
        assert_eq!(Language::from_code("id"), None);
        assert_eq!(serde_json::to_string(&Language::Uk).unwrap(), "\"uk\"");
    }
}
