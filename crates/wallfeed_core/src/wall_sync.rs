/*
 * SPDX-FileCopyrightText: 2026 Wallfeed Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::graph::WallState;
use crate::publish;
use crate::session;
use crate::ui_events::UiEvent;
use crate::wall_db::WallPostRow;
use anyhow::{Context, Result};
use std::path::PathBuf;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use wallfeed_protocol::WallPostDoc;

/// The actions the host can queue, handled one at a time by the wall worker.
#[derive(Debug)]
pub enum WallAction {
    UpdateFromWall,
    PostStatus { message: String },
    PostPhoto { photo_path: PathBuf, caption: String },
    UserLogout,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOutcome {
    pub fetched: u64,
    pub stored: u64,
    pub skipped: u64,
}

/// Single worker task: a repeating sync tick plus the host's queued actions.
/// The first tick fires immediately, which doubles as the initial sync after
/// start.
pub fn start_wall_worker(
    state: WallState,
    mut shutdown: watch::Receiver<bool>,
    mut actions: mpsc::UnboundedReceiver<WallAction>,
) {
    tokio::spawn(async move {
        let interval_secs = state.cfg.sync_interval_secs.max(60);
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            let action = tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() { break; }
                    continue;
                }
                _ = tick.tick() => WallAction::UpdateFromWall,
                a = actions.recv() => match a {
                    Some(a) => a,
                    None => break,
                },
            };
            if *shutdown.borrow() {
                break;
            }
            handle_action(&state, action).await;
        }
    });
}

pub async fn handle_action(state: &WallState, action: WallAction) {
    match action {
        WallAction::UpdateFromWall => {
            if let Err(e) = sync_once(state).await {
                state.net.set_last_error(format!("{e:#}"));
                warn!("wall sync error: {e:#}");
            }
        }
        WallAction::PostStatus { message } => {
            if let Err(e) = publish::post_status_update(state, &message).await {
                state.net.set_last_error(format!("{e:#}"));
                warn!("status post error: {e:#}");
            }
        }
        WallAction::PostPhoto { photo_path, caption } => {
            if let Err(e) = publish::post_wall_photo(state, &photo_path, &caption).await {
                state.net.set_last_error(format!("{e:#}"));
                warn!("photo post error: {e:#}");
            }
        }
        WallAction::UserLogout => {
            if let Err(e) = session::logout(state) {
                warn!("logout error: {e:#}");
            }
        }
    }
}

/// One incremental sync: fetch the page of wall items newer than the stored
/// watermark, ingest item by item, advance the watermark to fetch time.
pub async fn sync_once(state: &WallState) -> Result<SyncOutcome> {
    let Some(token) = session::current_token(state) else {
        debug!("wall sync skipped: no open session");
        return Ok(SyncOutcome::default());
    };

    let since = state.wall.get_sync_since()?;
    let page = state
        .graph
        .fetch_home_feed(&token, since, state.cfg.page_limit)
        .await?;

    // Watermark moves to fetch time as soon as the fetch succeeds; the next
    // request only asks for newer items.
    state.wall.set_sync_since(now_secs())?;

    let fetched = page.data.len() as u64;
    let mut stored = 0u64;
    let mut skipped = 0u64;
    for item in page.data {
        match parse_wall_post(&item) {
            Ok(post) => match state.wall.upsert_wall_post(&post) {
                Ok(()) => stored += 1,
                Err(e) => {
                    skipped += 1;
                    warn!("store wall message {} failed: {e:#}", post.message_id);
                }
            },
            Err(e) => {
                skipped += 1;
                warn!("invalid wall message skipped: {e:#}");
            }
        }
    }

    state.net.record_sync(stored, skipped);
    debug!("wall sync stored {stored}/{fetched} item(s), skipped {skipped}");
    if stored > 0 {
        let _ = state
            .ui_events
            .send(UiEvent::new("wall-updated", None, Some(stored.to_string())));
    }
    Ok(SyncOutcome {
        fetched,
        stored,
        skipped,
    })
}

pub fn parse_wall_post(item: &serde_json::Value) -> Result<WallPostRow> {
    let doc: WallPostDoc =
        serde_json::from_value(item.clone()).context("wall message shape")?;
    let created_at_ms = parse_created_time_ms(&doc.created_time).unwrap_or_else(now_ms);
    Ok(WallPostRow {
        message_id: doc.id,
        from_id: doc.from.id,
        from_name: doc.from.name,
        message: doc.message,
        post_type: doc.post_type,
        created_time: doc.created_time,
        created_at_ms,
        place_name: doc.place.and_then(|p| p.name),
    })
}

fn parse_created_time_ms(raw: &str) -> Option<i64> {
    if let Ok(t) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some((t.unix_timestamp_nanos() / 1_000_000) as i64);
    }
    // Graph-style offsets omit the colon ("+0000"); normalize and retry.
    let fixed = normalize_offset(raw)?;
    OffsetDateTime::parse(&fixed, &Rfc3339)
        .ok()
        .map(|t| (t.unix_timestamp_nanos() / 1_000_000) as i64)
}

fn normalize_offset(raw: &str) -> Option<String> {
    if !raw.is_ascii() || raw.len() < 6 {
        return None;
    }
    let (head, tail) = raw.split_at(raw.len() - 5);
    let bytes = tail.as_bytes();
    if (bytes[0] == b'+' || bytes[0] == b'-') && tail[1..].bytes().all(|b| b.is_ascii_digit()) {
        return Some(format!("{head}{}{}:{}", &tail[..1], &tail[1..3], &tail[3..5]));
    }
    None
}

fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
