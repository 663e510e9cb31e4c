/*
 * SPDX-FileCopyrightText: 2026 Wallfeed Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::graph::WallState;
use crate::ui_events::UiEvent;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use sha2::Digest as _;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

/// The open session: an access token handed over by the host after its login
/// flow, plus whatever profile identifiers came with it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AccessSession {
    pub access_token: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

pub fn default_data_dir() -> Result<PathBuf> {
    if let Ok(v) = std::env::var("WALLFEED_DATA_DIR") {
        return Ok(PathBuf::from(v));
    }
    let proj = ProjectDirs::from("net", "wallfeed", "Wallfeed")
        .context("unable to determine platform data dir")?;
    Ok(proj.data_local_dir().to_path_buf())
}

fn session_path(dir: &Path) -> PathBuf {
    dir.join("session.json")
}

pub fn load_session(dir: impl AsRef<Path>) -> Result<Option<AccessSession>> {
    let path = session_path(dir.as_ref());
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let session: AccessSession =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(session))
}

pub fn store_session(dir: impl AsRef<Path>, session: &AccessSession) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("create data dir: {}", dir.display()))?;
    let path = session_path(dir);
    let raw = serde_json::to_string_pretty(session)?;
    fs::write(&path, raw).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn clear_session(dir: impl AsRef<Path>) -> Result<()> {
    let path = session_path(dir.as_ref());
    if path.exists() {
        fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
    }
    Ok(())
}

/// Tokens never appear in logs; a short digest prefix is enough to tell two
/// sessions apart.
pub fn token_fingerprint(token: &str) -> String {
    let mut h = sha2::Sha256::new();
    h.update(token.as_bytes());
    let hex = hex::encode(h.finalize());
    hex[..16].to_string()
}

pub fn current_token(state: &WallState) -> Option<String> {
    state
        .session
        .lock()
        .unwrap()
        .as_ref()
        .map(|s| s.access_token.clone())
}

pub fn is_logged_in(state: &WallState) -> bool {
    state.session.lock().unwrap().is_some()
}

/// Logout wipes every trace of the account: cached wall rows, the sync
/// watermark, the persisted session file, and the in-memory token. The next
/// sync after a fresh login starts unfiltered.
pub fn logout(state: &WallState) -> Result<()> {
    let removed = state.wall.clear_wall_posts()?;
    state.wall.clear_sync_since()?;
    clear_session(&state.data_dir)?;
    {
        let mut guard = state.session.lock().unwrap();
        *guard = None;
    }
    info!("logged out, {removed} cached wall post(s) removed");
    let _ = state
        .ui_events
        .send(UiEvent::new("logged-out", None, None));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_roundtrip_and_clear() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_session(dir.path()).unwrap().is_none());

        let session = AccessSession {
            access_token: "CAAC-test-token".to_string(),
            user_id: Some("100".to_string()),
            user_name: Some("Alice".to_string()),
        };
        store_session(dir.path(), &session).unwrap();
        let loaded = load_session(dir.path()).unwrap().expect("stored session");
        assert_eq!(loaded.access_token, session.access_token);
        assert_eq!(loaded.user_name.as_deref(), Some("Alice"));

        clear_session(dir.path()).unwrap();
        assert!(load_session(dir.path()).unwrap().is_none());
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = token_fingerprint("secret-token");
        let b = token_fingerprint("secret-token");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, token_fingerprint("other-token"));
        assert!(!a.contains("secret"));
    }
}
