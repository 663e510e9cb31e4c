/*
 * SPDX-FileCopyrightText: 2026 Wallfeed Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::{Deserialize, Serialize};

/// One page of the wall feed as returned by `GET /me/home`.
///
/// Elements stay raw so a single malformed entry can be skipped without
/// rejecting the whole page.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct WallFeedPage {
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WallPostDoc {
    pub id: String,
    pub from: WallAuthor,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub post_type: String,
    pub created_time: String,
    pub place: Option<WallPlace>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WallAuthor {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WallPlace {
    pub name: Option<String>,
}

/// Receipt returned by the publish endpoints (`/me/feed`, `/me/photos`).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PublishReceipt {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GraphErrorBody {
    pub error: GraphErrorDetail,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GraphErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub code: Option<i64>,
}
