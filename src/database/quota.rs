//! Daily download quota policy.
//!
//! The rules are evaluated in this order:
//! 1. no record: create it with count 1, admit
//! 2. window older than 24 hours: reset count to 1, admit
//! 3. count at the ceiling: deny, change nothing
//! 4. otherwise: increment, admit
//!
//! [`QuotaPolicy::decide`] is the reference implementation. The MongoDB
//! pipeline built by [`QuotaPolicy::update_pipeline`] applies the same
//! rules atomically inside the database.

use chrono::{DateTime, Duration, Utc};
use mongodb::bson::{doc, Document};

use super::models::user::to_bson;

/// Length of the rolling quota window.
pub fn window_length() -> Duration {
    Duration::hours(24)
}

/// Quota fields of a stored user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaWindow {
    pub download_count: i64,
    pub last_reset: Option<DateTime<Utc>>,
}

/// What an admission call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// First contact, record created with count 1.
    Created,
    /// Window expired, count reset to 1.
    Reset,
    /// Count incremented to the contained value.
    Incremented(i64),
    /// Ceiling reached, nothing changed.
    Denied,
}

impl QuotaDecision {
    pub fn is_admitted(self) -> bool {
        !matches!(self, Self::Denied)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QuotaPolicy {
    max_downloads: i64,
}

impl QuotaPolicy {
    pub fn new(max_downloads: u32) -> Self {
        Self {
            max_downloads: i64::from(max_downloads),
        }
    }

    pub fn max_downloads(&self) -> i64 {
        self.max_downloads
    }

    /// Decide admission for the state that existed before the call.
    pub fn decide(&self, before: Option<QuotaWindow>, now: DateTime<Utc>) -> QuotaDecision {
        let Some(window) = before else {
            return QuotaDecision::Created;
        };

        if is_expired(window.last_reset, now) {
            return QuotaDecision::Reset;
        }

        if window.download_count >= self.max_downloads {
            return QuotaDecision::Denied;
        }

        QuotaDecision::Incremented(window.download_count + 1)
    }

    /// State after applying `decision` to `before`.
    #[cfg(test)]
    pub fn apply(&self, before: Option<QuotaWindow>, now: DateTime<Utc>) -> (QuotaDecision, QuotaWindow) {
        let decision = self.decide(before, now);
        let after = match (decision, before) {
            (QuotaDecision::Created | QuotaDecision::Reset, _) => QuotaWindow {
                download_count: 1,
                last_reset: Some(now),
            },
            (QuotaDecision::Incremented(count), Some(window)) => QuotaWindow {
                download_count: count,
                ..window
            },
            (_, Some(window)) => window,
            // Denied always has a prior record
            (_, None) => QuotaWindow {
                download_count: 1,
                last_reset: Some(now),
            },
        };
        (decision, after)
    }

    /// Aggregation pipeline update performing `apply` inside MongoDB.
    ///
    /// All expressions in a single `$set` stage read the pre-update
    /// document, so the expiry check is consistent for both fields. A
    /// missing `last_reset` compares lower than any date and counts as
    /// expired, which also covers freshly upserted documents.
    pub fn update_pipeline(&self, now: DateTime<Utc>) -> Vec<Document> {
        let now_bson = to_bson(now);
        let cutoff = to_bson(now - window_length());
        let expired = doc! { "$lt": [ { "$ifNull": ["$last_reset", null] }, cutoff ] };
        let count = doc! { "$ifNull": ["$download_count", 0_i64] };

        vec![doc! {
            "$set": {
                "download_count": {
                    "$cond": [
                        expired.clone(),
                        1_i64,
                        {
                            "$cond": [
                                { "$lt": [count.clone(), self.max_downloads] },
                                { "$add": [count.clone(), 1_i64] },
                                count,
                            ]
                        },
                    ]
                },
                "last_reset": { "$cond": [expired, now_bson, "$last_reset"] },
            }
        }]
    }
}

/// Strictly more than 24 hours since the last reset. A missing timestamp
/// counts as expired.
fn is_expired(last_reset: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_reset {
        Some(reset) => now - reset > window_length(),
        None => true,
    }
}
