//! User repository: quota admission and language preference.
//!
//! Language lookups are cache-first. Quota admission never touches the
//! cache; it is a single atomic MongoDB operation per call.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use mongodb::bson::doc;
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument, UpdateOptions};
use mongodb::{Collection, IndexModel};
use tracing::{debug, info};

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};
use crate::i18n::Language;
use super::models::user::to_bson;
use super::models::UserRecord;
use super::quota::{QuotaDecision, QuotaPolicy};
use super::Database;

/// MongoDB duplicate key error code.
const DUPLICATE_KEY: i32 = 11000;

/// Repository for per-user state.
#[derive(Clone)]
pub struct UserRepo {
    collection: Collection<UserRecord>,
    /// user_id -> stored language (None = no preference stored)
    language_cache: TypedCache<u64, Option<Language>>,
    policy: QuotaPolicy,
}

impl UserRepo {
    /// Create a new UserRepo with caching.
    pub fn new(db: &Database, cache: &CacheRegistry, max_downloads: u32) -> Self {
        let language_cache = cache.get_or_create(
            "user_language",
            CacheConfig::with_capacity(10_000).ttl(Duration::from_secs(3600)), // 1 hour
        );

        Self {
            collection: db.collection("users"),
            language_cache,
            policy: QuotaPolicy::new(max_downloads),
        }
    }

    /// Create the unique index on `user_id`.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "user_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index).await?;
        info!("Ensured unique index on users.user_id");
        Ok(())
    }

    /// Configured daily ceiling.
    pub fn max_downloads(&self) -> i64 {
        self.policy.max_downloads()
    }

    /// Check the user's quota and record the download if admitted.
    ///
    /// The decision and the write happen in one `findOneAndUpdate`; two
    /// concurrent calls for the same user are serialized by the document
    /// lock and cannot both take the last slot.
    pub async fn admit(&self, user_id: u64) -> Result<QuotaDecision> {
        match self.try_admit(user_id).await {
            // Two first contacts raced on insert; the loser sees the winner's document now
            Err(e) if is_duplicate_key(&e) => {
                debug!("Retrying admission for {} after duplicate key", user_id);
                Ok(self.try_admit(user_id).await?)
            }
            other => Ok(other?),
        }
    }

    async fn try_admit(&self, user_id: u64) -> std::result::Result<QuotaDecision, MongoError> {
        let now = Utc::now();
        let filter = doc! { "user_id": user_id as i64 };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::Before)
            .build();

        let before = self
            .collection
            .find_one_and_update(filter, self.policy.update_pipeline(now))
            .with_options(options)
            .await?;

        let decision = self.policy.decide(before.as_ref().map(UserRecord::window), now);
        debug!("Quota for {}: {:?}", user_id, decision);
        Ok(decision)
    }

    /// Stored language preference, if any.
    pub async fn language(&self, user_id: u64) -> Result<Option<Language>> {
        if let Some(language) = self.language_cache.get(&user_id) {
            return Ok(language);
        }

        let filter = doc! { "user_id": user_id as i64 };
        let language = self
            .collection
            .find_one(filter)
            .await?
            .and_then(|record| record.language);

        self.language_cache.insert(user_id, language);
        Ok(language)
    }

    /// Store a language preference, creating the user on first contact.
    ///
    /// A record created here starts with an empty quota window.
    pub async fn set_language(&self, user_id: u64, language: Language) -> Result<()> {
        let filter = doc! { "user_id": user_id as i64 };
        let update = doc! {
            "$set": { "language": language.code() },
            "$setOnInsert": { "download_count": 0_i64, "last_reset": to_bson(Utc::now()) },
        };
        let options = UpdateOptions::builder().upsert(true).build();

        let result = match self.collection.update_one(filter.clone(), update.clone()).with_options(options.clone()).await {
            Err(e) if is_duplicate_key(&e) => self.collection.update_one(filter, update).with_options(options).await?,
            other => other?,
        };

        self.language_cache.insert(user_id, Some(language));
        debug!(
            "Set language {} for {} (created: {})",
            language.code(),
            user_id,
            result.upserted_id.is_some()
        );
        Ok(())
    }
}

fn is_duplicate_key(error: &MongoError) -> bool {
    match &*error.kind {
        ErrorKind::Command(command) => command.code == DUPLICATE_KEY,
        ErrorKind::Write(WriteFailure::WriteError(write)) => write.code == DUPLICATE_KEY,
        _ => false,
    }
}
