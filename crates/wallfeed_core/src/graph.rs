/*
 * SPDX-FileCopyrightText: 2026 Wallfeed Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::net_metrics::NetMetrics;
use crate::session::AccessSession;
use crate::ui_events::UiEvent;
use crate::wall_db::WallDb;
use anyhow::{Context, Result};
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use wallfeed_protocol::{GraphErrorBody, PublishReceipt, WallFeedPage};

/// Field list requested from the wall endpoint; everything the local record
/// shape consumes and nothing more.
pub const FEED_FIELDS: &str = "id,from,message,type,created_time,place";

pub const DEFAULT_PAGE_LIMIT: u32 = 50;

#[derive(Clone, Debug)]
pub struct GraphConfig {
    pub api_base: String,
    pub page_limit: u32,
    pub sync_interval_secs: u64,
}

#[derive(Clone)]
pub struct WallState {
    pub cfg: GraphConfig,
    /// `None` while logged out; sync and publish silently no-op then.
    pub session: Arc<Mutex<Option<AccessSession>>>,
    pub wall: Arc<WallDb>,
    pub graph: GraphClient,
    pub net: Arc<NetMetrics>,
    pub ui_events: broadcast::Sender<UiEvent>,
    pub data_dir: PathBuf,
}

#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    api_base: String,
    net: Arc<NetMetrics>,
}

impl GraphClient {
    pub fn new(http: reqwest::Client, api_base: &str, net: Arc<NetMetrics>) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            net,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// GET the wall feed: newest items, one page, optionally bounded below by
    /// the `since` watermark (epoch seconds).
    pub async fn fetch_home_feed(
        &self,
        token: &str,
        since_secs: Option<i64>,
        limit: u32,
    ) -> Result<WallFeedPage> {
        let url = format!("{}/me/home", self.api_base);
        let mut query: Vec<(&str, String)> = vec![
            ("fields", FEED_FIELDS.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(since) = since_secs {
            query.push(("since", since.to_string()));
        }
        let resp = self.send(self.http.get(&url).query(&query), token).await?;
        let resp = self.check(resp, "wall feed").await?;
        resp.json::<WallFeedPage>()
            .await
            .context("parse wall feed json")
    }

    /// POST a status update to the user's own feed.
    pub async fn post_status(&self, token: &str, message: &str) -> Result<PublishReceipt> {
        let url = format!("{}/me/feed", self.api_base);
        let resp = self
            .send(self.http.post(&url).form(&[("message", message)]), token)
            .await?;
        let resp = self.check(resp, "status post").await?;
        resp.json::<PublishReceipt>()
            .await
            .context("parse status post receipt")
    }

    /// POST a photo upload: file part `source`, caption as `name` (the field
    /// the wall endpoint expects, empty captions included).
    pub async fn upload_photo(
        &self,
        token: &str,
        filename: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<PublishReceipt> {
        let media_type = mime_guess::from_path(filename)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(&media_type)
            .context("photo mime type")?;
        let form = reqwest::multipart::Form::new()
            .part("source", part)
            .text("name", caption.to_string());

        let url = format!("{}/me/photos", self.api_base);
        let resp = self
            .send(self.http.post(&url).multipart(form), token)
            .await?;
        let resp = self.check(resp, "photo upload").await?;
        resp.json::<PublishReceipt>()
            .await
            .context("parse photo upload receipt")
    }

    async fn send(&self, req: reqwest::RequestBuilder, token: &str) -> Result<reqwest::Response> {
        let res = req
            .header("Authorization", format!("Bearer {}", token))
            .header(USER_AGENT, format!("wallfeed/{}", env!("CARGO_PKG_VERSION")))
            .send()
            .await;
        match res {
            Ok(resp) => Ok(resp),
            Err(e) => {
                if e.is_timeout() {
                    self.net.http_timeout();
                } else {
                    self.net.http_error();
                }
                Err(e.into())
            }
        }
    }

    async fn check(&self, resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.net.auth_failure();
        } else {
            self.net.http_error();
        }
        let text = resp.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<GraphErrorBody>(&text)
            .map(|b| b.error.message)
            .unwrap_or(text);
        anyhow::bail!("{what} failed: {status} {detail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let net = Arc::new(NetMetrics::new());
        let client = GraphClient::new(reqwest::Client::new(), "http://127.0.0.1:1/v2/", net);
        assert_eq!(client.api_base(), "http://127.0.0.1:1/v2");
    }

    #[test]
    fn feed_fields_cover_record_shape() {
        for field in ["id", "from", "message", "type", "created_time", "place"] {
            assert!(FEED_FIELDS.split(',').any(|f| f == field), "missing {field}");
        }
    }
}
