//! HTTP API - direct downloads without Telegram.
//!
//! - `GET /download?url=<link>` streams back the fetched video
//! - `GET /health` liveness check
//!
//! There is no user identity here, so no quota applies.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::download::{detect, DownloadedMedia, Downloader};

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    url: String,
}

/// Error answered to HTTP clients.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    fn bad_request(message: &'static str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }

    fn internal(message: &'static str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

/// Build the API routes.
pub fn router(downloader: Arc<Downloader>) -> Router {
    Router::new()
        .route("/download", get(download))
        .route("/health", get(health))
        .with_state(downloader)
}

/// Serve the API on its own listener (polling mode).
pub async fn serve(address: SocketAddr, router: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("HTTP API listening on {}", address);
    axum::serve(listener, router).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn download(
    State(downloader): State<Arc<Downloader>>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, ApiError> {
    let url = params.url.trim();
    let Some(platform) = detect(url) else {
        return Err(ApiError::bad_request("Unsupported platform"));
    };

    let media = downloader
        .fetch(url, platform)
        .await
        .ok_or(ApiError::internal("Download failed"))?;

    let file_name = media.file_name();
    let (file, length) = match open_with_length(media.path()).await {
        Ok(opened) => opened,
        Err(e) => {
            warn!("Failed to open downloaded file for {}: {}", url, e);
            media.discard().await;
            return Err(ApiError::internal("Download failed"));
        }
    };

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", sanitize_file_name(&file_name)))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"video.mp4\""));

    info!("Serving {} bytes for {} via API", length, url);
    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static("video/mp4")),
            (CONTENT_LENGTH, HeaderValue::from(length)),
            (CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(stream_then_discard(file, media)),
    )
        .into_response())
}

async fn open_with_length(path: &std::path::Path) -> io::Result<(tokio::fs::File, u64)> {
    let file = tokio::fs::File::open(path).await?;
    let length = file.metadata().await?.len();
    Ok((file, length))
}

/// Stream `file` in chunks and discard `media` once the last chunk is out.
///
/// A client that disconnects early drops the stream, and with it the
/// media, which removes the work directory as well.
fn stream_then_discard(
    file: tokio::fs::File,
    media: DownloadedMedia,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    let cleanup = stream::once(async move { media.discard().await })
        .filter_map(|()| async { None::<io::Result<Bytes>> });

    ReaderStream::new(file).chain(cleanup)
}

/// Keep header-safe characters only.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    if cleaned.is_empty() {
        "video.mp4".to_string()
    } else {
        cleaned
    }
}
