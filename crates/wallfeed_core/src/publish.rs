/*
 * SPDX-FileCopyrightText: 2026 Wallfeed Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::graph::WallState;
use crate::session;
use crate::ui_events::UiEvent;
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, error, info};

/// Publish a status update to the user's own wall.
pub async fn post_status_update(state: &WallState, message: &str) -> Result<()> {
    let Some(token) = session::current_token(state) else {
        debug!("status post skipped: no open session");
        return Ok(());
    };
    let receipt = state.graph.post_status(&token, message).await?;
    state.net.post_published();
    info!("status published: {}", receipt.id);
    let _ = state
        .ui_events
        .send(UiEvent::new("post-published", Some(receipt.id), None));
    Ok(())
}

/// Upload a photo from the local filesystem with a caption. A missing file
/// is logged and absorbed; the operation no-ops.
pub async fn post_wall_photo(state: &WallState, photo_path: &Path, caption: &str) -> Result<()> {
    let Some(token) = session::current_token(state) else {
        debug!("photo post skipped: no open session");
        return Ok(());
    };
    let bytes = match std::fs::read(photo_path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            error!("photo not found: {}", photo_path.display());
            return Ok(());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("read photo {}", photo_path.display()));
        }
    };
    let filename = photo_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("photo.jpg");
    let receipt = state
        .graph
        .upload_photo(&token, filename, bytes, caption)
        .await?;
    state.net.post_published();
    info!("photo published: {}", receipt.id);
    let _ = state
        .ui_events
        .send(UiEvent::new("photo-published", Some(receipt.id), None));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphClient, GraphConfig, DEFAULT_PAGE_LIMIT};
    use crate::net_metrics::NetMetrics;
    use crate::session::AccessSession;
    use crate::wall_db::WallDb;
    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct PublishServer {
        hits: Arc<AtomicU64>,
    }

    async fn publish_handler(State(s): State<PublishServer>) -> Json<serde_json::Value> {
        s.hits.fetch_add(1, Ordering::Relaxed);
        Json(json!({"id": "100_200"}))
    }

    async fn spawn_publish_server() -> (PublishServer, String) {
        let server = PublishServer::default();
        let app = Router::new()
            .route("/me/feed", post(publish_handler))
            .route("/me/photos", post(publish_handler))
            .with_state(server.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        (server, format!("http://{addr}"))
    }

    fn test_state(api_base: &str, dir: &std::path::Path) -> WallState {
        let net = Arc::new(NetMetrics::new());
        let (ui_events, _) = tokio::sync::broadcast::channel(16);
        WallState {
            cfg: GraphConfig {
                api_base: api_base.to_string(),
                page_limit: DEFAULT_PAGE_LIMIT,
                sync_interval_secs: 900,
            },
            session: Arc::new(Mutex::new(Some(AccessSession {
                access_token: "test-token".to_string(),
                user_id: None,
                user_name: None,
            }))),
            wall: Arc::new(WallDb::open(dir.join("wallfeed.db")).expect("open db")),
            graph: GraphClient::new(reqwest::Client::new(), api_base, net.clone()),
            net,
            ui_events,
            data_dir: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn status_post_reaches_feed_endpoint() {
        let (server, base) = spawn_publish_server().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&base, dir.path());

        post_status_update(&state, "hello wall").await.expect("post");
        assert_eq!(server.hits.load(Ordering::Relaxed), 1);
        assert_eq!(state.net.snapshot_json()["publish"]["posts_published"], 1);
    }

    #[tokio::test]
    async fn photo_upload_sends_file_and_caption() {
        let (server, base) = spawn_publish_server().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&base, dir.path());

        let photo = dir.path().join("IMG_20140501_100000.jpg");
        std::fs::write(&photo, b"\xFF\xD8\xFF\xE0 not a real jpeg").unwrap();

        post_wall_photo(&state, &photo, "on the wall")
            .await
            .expect("upload");
        assert_eq!(server.hits.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn missing_photo_is_absorbed() {
        let (server, base) = spawn_publish_server().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&base, dir.path());

        let gone = dir.path().join("no-such-photo.jpg");
        post_wall_photo(&state, &gone, "caption").await.expect("noop");
        assert_eq!(server.hits.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn publish_without_session_noops() {
        let (server, base) = spawn_publish_server().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&base, dir.path());
        {
            let mut guard = state.session.lock().unwrap();
            *guard = None;
        }

        post_status_update(&state, "into the void").await.expect("noop");
        assert_eq!(server.hits.load(Ordering::Relaxed), 0);
    }
}
