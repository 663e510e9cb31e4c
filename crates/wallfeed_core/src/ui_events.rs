/*
 * SPDX-FileCopyrightText: 2026 Wallfeed Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::Serialize;

fn now_ms_u64() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Broadcast to the embedding host so it can refresh its wall view without
/// polling the store.
#[derive(Clone, Debug, Serialize)]
pub struct UiEvent {
    pub kind: String,
    pub ts_ms: u64,
    pub post_id: Option<String>,
    pub detail: Option<String>,
}

impl UiEvent {
    pub fn new(kind: &str, post_id: Option<String>, detail: Option<String>) -> Self {
        Self {
            kind: kind.to_string(),
            ts_ms: now_ms_u64(),
            post_id,
            detail,
        }
    }
}
