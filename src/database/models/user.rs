//! Per-user record: download quota window and language preference.

use chrono::{DateTime, Utc};
use mongodb::bson;
use serde::{Deserialize, Serialize};

use crate::database::quota::QuotaWindow;
use crate::i18n::Language;

/// One document per Telegram user in the `users` collection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRecord {
    /// Telegram user ID (unique index).
    pub user_id: u64,
    /// Admitted downloads in the current window.
    #[serde(default)]
    pub download_count: i64,
    /// Start of the current 24 hour window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reset: Option<bson::DateTime>,
    /// Chosen interface language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

impl UserRecord {
    /// Quota state as seen by the admission policy.
    pub fn window(&self) -> QuotaWindow {
        QuotaWindow {
            download_count: self.download_count,
            last_reset: self.last_reset.map(to_chrono),
        }
    }
}

pub(crate) fn to_chrono(value: bson::DateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(value.timestamp_millis()).unwrap_or_default()
}

pub(crate) fn to_bson(value: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(value.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_window_from_record() {
        let reset = Utc::now() - Duration::hours(3);
        let record = UserRecord {
            user_id: 42,
            download_count: 4,
            last_reset: Some(to_bson(reset)),
            language: Some(Language::Pl),
        };

        let window = record.window();
        assert_eq!(window.download_count, 4);
        assert_eq!(window.last_reset.map(|t| t.timestamp_millis()), Some(reset.timestamp_millis()));
    }

    #[test]
    fn test_deserialize_language_only_record() {
        let doc = bson::doc! { "user_id": 7_i64, "language": "uk" };
        let record: UserRecord = bson::from_document(doc).unwrap();

        assert_eq!(record.user_id, 7);
        assert_eq!(record.download_count, 0);
        assert!(record.last_reset.is_none());
        assert_eq!(record.language, Some(Language::Uk));
    }
}
