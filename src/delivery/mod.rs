//! Delivery - sends a fetched video and schedules its removal from the chat.
//!
//! The local file is always discarded once the send attempt completes,
//! whether or not Telegram accepted it. The sent message is deleted later
//! by a fire-and-forget timer that does not survive restarts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId, ParseMode};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::bot::dispatcher::ThrottledBot;
use crate::download::DownloadedMedia;
use crate::i18n::{format_text, get_text, Language};

/// Callback data of the "download again" button.
pub const DOWNLOAD_MORE: &str = "download_more";

/// Pending message deletions, keyed by chat and message.
#[derive(Clone, Default)]
pub struct CleanupScheduler {
    pending: Arc<DashMap<(ChatId, MessageId), Instant>>,
}

impl CleanupScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers that have not fired yet.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Delete `message_id` from `chat_id` after `delay`.
    pub fn schedule(&self, bot: ThrottledBot, chat_id: ChatId, message_id: MessageId, delay: Duration) {
        self.schedule_with(chat_id, message_id, delay, async move {
            bot.delete_message(chat_id, message_id).await?;
            Ok(())
        });
    }

    /// Run `action` after `delay`. Failures are logged, never returned.
    fn schedule_with<F>(&self, chat_id: ChatId, message_id: MessageId, delay: Duration, action: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let key = (chat_id, message_id);
        self.pending.insert(key, Instant::now() + delay);
        let pending = Arc::clone(&self.pending);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match action.await {
                Ok(()) => debug!("Deleted message {} in chat {}", message_id.0, chat_id.0),
                // Usually the user already deleted it
                Err(e) => warn!("Cleanup of message {} in chat {} failed: {}", message_id.0, chat_id.0, e),
            }
            pending.remove(&key);
        });
    }
}

/// Inline keyboard attached to every delivered video.
pub fn download_more_keyboard(lang: Language) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        get_text(lang, "download.more_button"),
        DOWNLOAD_MORE,
    )]])
}

/// Whole minutes shown to the user for a cleanup delay, at least one.
pub fn delay_minutes(delay: Duration) -> u64 {
    delay.as_secs().div_ceil(60).max(1)
}

/// Send `media` to `chat_id`, then discard the local file.
///
/// A delivered video is scheduled for removal before anything else is sent,
/// so a failing warning message cannot keep it in the chat. On failure the
/// user gets a generic notice.
pub async fn deliver(
    bot: &ThrottledBot,
    chat_id: ChatId,
    media: DownloadedMedia,
    lang: Language,
    cleanup: &CleanupScheduler,
    delay: Duration,
) -> anyhow::Result<()> {
    let file = InputFile::file(media.path().to_path_buf()).file_name(media.file_name());
    let sent = bot
        .send_video(chat_id, file)
        .supports_streaming(true)
        .reply_markup(download_more_keyboard(lang))
        .await;

    media.discard().await;

    match sent {
        Ok(message) => {
            info!("Delivered video to chat {}", chat_id.0);
            cleanup.schedule(bot.clone(), chat_id, message.id, delay);

            let minutes = delay_minutes(delay).to_string();
            let warning = bot
                .send_message(
                    chat_id,
                    format_text(lang, "download.warning", &[("minutes", minutes.as_str())]),
                )
                .parse_mode(ParseMode::Html)
                .await;
            if let Err(e) = warning {
                warn!("Failed to send cleanup warning to chat {}: {}", chat_id.0, e);
            }
        }
        Err(e) => {
            warn!("Failed to send video to chat {}: {}", chat_id.0, e);
            bot.send_message(chat_id, get_text(lang, "download.send_failed")).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use teloxide::adaptors::throttle::Limits;

    use super::*;
    use crate::download::WorkDir;

    const TOKEN: &str = "TEST";
    const CHAT: ChatId = ChatId(42);
    const LATER: Duration = Duration::from_secs(600);

    /// Local Bot API answering every call, failing the listed methods.
    #[derive(Clone, Default)]
    struct FakeTelegram {
        failing: Arc<Vec<&'static str>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeTelegram {
        fn failing(methods: &[&'static str]) -> Self {
            Self {
                failing: Arc::new(methods.to_vec()),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        async fn start(&self) -> ThrottledBot {
            let app = Router::new()
                .route(&format!("/bot{TOKEN}/:method"), post(answer))
                .with_state(self.clone());
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let address = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            let url = reqwest::Url::parse(&format!("http://{address}/")).unwrap();
            Bot::new(TOKEN).set_api_url(url).throttle(Limits::default())
        }
    }

    async fn answer(
        State(api): State<FakeTelegram>,
        Path(method): Path<String>,
        _body: axum::body::Bytes,
    ) -> (StatusCode, Json<Value>) {
        api.calls.lock().unwrap().push(method.clone());

        if api.failing.iter().any(|m| *m == method) {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "ok": false,
                    "error_code": 400,
                    "description": "Bad Request: message is too long"
                })),
            );
        }

        let mut message = json!({
            "message_id": 7,
            "date": 0,
            "chat": { "id": CHAT.0, "type": "private", "first_name": "Test" },
        });
        if method == "sendVideo" {
            message["video"] = json!({
                "file_id": "file",
                "file_unique_id": "unique",
                "file_size": 5,
                "mime_type": "video/mp4",
                "width": 1,
                "height": 1,
                "duration": 1
            });
        } else {
            message["text"] = json!("ok");
        }

        (StatusCode::OK, Json(json!({ "ok": true, "result": message })))
    }

    fn media_in(parent: &std::path::Path) -> (DownloadedMedia, std::path::PathBuf) {
        let work = WorkDir::create_in(parent).unwrap();
        let path = work.path().join("video.mp4");
        std::fs::write(&path, b"video").unwrap();
        let media = work.into_media(path.clone()).unwrap();
        (media, path)
    }

    #[tokio::test]
    async fn test_deliver_schedules_cleanup_and_removes_file() {
        let api = FakeTelegram::default();
        let bot = api.start().await;
        let parent = tempfile::tempdir().unwrap();
        let (media, path) = media_in(parent.path());
        let cleanup = CleanupScheduler::new();

        deliver(&bot, CHAT, media, Language::En, &cleanup, LATER).await.unwrap();

        assert!(!path.exists());
        assert_eq!(cleanup.pending(), 1);
        assert_eq!(api.calls(), ["sendVideo", "sendMessage"]);
    }

    #[tokio::test]
    async fn test_failed_video_send_notifies_and_removes_file() {
        let api = FakeTelegram::failing(&["sendVideo"]);
        let bot = api.start().await;
        let parent = tempfile::tempdir().unwrap();
        let (media, path) = media_in(parent.path());
        let cleanup = CleanupScheduler::new();

        deliver(&bot, CHAT, media, Language::En, &cleanup, LATER).await.unwrap();

        assert!(!path.exists());
        assert_eq!(cleanup.pending(), 0);
        // The send-failed notice
        assert_eq!(api.calls(), ["sendVideo", "sendMessage"]);
    }

    #[tokio::test]
    async fn test_failed_warning_still_schedules_cleanup() {
        let api = FakeTelegram::failing(&["sendMessage"]);
        let bot = api.start().await;
        let parent = tempfile::tempdir().unwrap();
        let (media, path) = media_in(parent.path());
        let cleanup = CleanupScheduler::new();

        deliver(&bot, CHAT, media, Language::En, &cleanup, LATER).await.unwrap();

        assert!(!path.exists());
        assert_eq!(cleanup.pending(), 1);
    }

    #[test]
    fn test_delay_minutes() {
        assert_eq!(delay_minutes(Duration::from_secs(300)), 5);
        assert_eq!(delay_minutes(Duration::from_secs(301)), 6);
        assert_eq!(delay_minutes(Duration::from_secs(10)), 1);
        assert_eq!(delay_minutes(Duration::ZERO), 1);
    }

    #[test]
    fn test_keyboard_carries_callback() {
        let keyboard = download_more_keyboard(Language::Pl);
        let button = &keyboard.inline_keyboard[0][0];
        assert_eq!(button.text, get_text(Language::Pl, "download.more_button"));
    }

    #[tokio::test]
    async fn test_timer_runs_and_clears_pending() {
        let scheduler = CleanupScheduler::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        scheduler.schedule_with(ChatId(1), MessageId(2), Duration::from_millis(20), async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_failed_timer_is_swallowed() {
        let scheduler = CleanupScheduler::new();
        scheduler.schedule_with(ChatId(1), MessageId(3), Duration::from_millis(10), async {
            anyhow::bail!("message to delete not found")
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(scheduler.pending(), 0);
    }
}
