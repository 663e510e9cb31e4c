/*
 * SPDX-FileCopyrightText: 2026 Wallfeed Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Default)]
pub struct NetMetrics {
    pub sync_runs: AtomicU64,
    pub posts_stored: AtomicU64,
    pub posts_skipped: AtomicU64,
    pub posts_published: AtomicU64,
    pub http_errors: AtomicU64,
    pub http_timeouts: AtomicU64,
    pub auth_failures: AtomicU64,
    pub last_sync_ms: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl NetMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sync(&self, stored: u64, skipped: u64) {
        self.sync_runs.fetch_add(1, Ordering::Relaxed);
        self.posts_stored.fetch_add(stored, Ordering::Relaxed);
        self.posts_skipped.fetch_add(skipped, Ordering::Relaxed);
        self.last_sync_ms.store(now_ms(), Ordering::Relaxed);
        let mut g = self.last_error.lock().unwrap();
        *g = None;
    }

    pub fn post_published(&self) {
        self.posts_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn http_error(&self) {
        self.http_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn http_timeout(&self) {
        self.http_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_last_error(&self, err: String) {
        let mut g = self.last_error.lock().unwrap();
        *g = Some(err);
    }

    pub fn snapshot_json(&self) -> serde_json::Value {
        let last_error = self.last_error.lock().unwrap().clone();
        serde_json::json!({
            "ts_ms": now_ms(),
            "sync": {
                "runs": self.sync_runs.load(Ordering::Relaxed),
                "posts_stored": self.posts_stored.load(Ordering::Relaxed),
                "posts_skipped": self.posts_skipped.load(Ordering::Relaxed),
                "last_sync_ms": self.last_sync_ms.load(Ordering::Relaxed),
                "last_error": last_error,
            },
            "publish": {
                "posts_published": self.posts_published.load(Ordering::Relaxed),
            },
            "errors": {
                "auth_failures": self.auth_failures.load(Ordering::Relaxed),
                "http_timeouts": self.http_timeouts.load(Ordering::Relaxed),
                "http_errors": self.http_errors.load(Ordering::Relaxed),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sync_clears_last_error() {
        let m = NetMetrics::new();
        m.set_last_error("boom".to_string());
        m.record_sync(3, 1);
        let snap = m.snapshot_json();
        assert_eq!(snap["sync"]["runs"], 1);
        assert_eq!(snap["sync"]["posts_stored"], 3);
        assert_eq!(snap["sync"]["posts_skipped"], 1);
        assert!(snap["sync"]["last_error"].is_null());
    }

    #[test]
    fn counters_accumulate() {
        let m = NetMetrics::new();
        m.http_error();
        m.http_error();
        m.auth_failure();
        let snap = m.snapshot_json();
        assert_eq!(snap["errors"]["http_errors"], 2);
        assert_eq!(snap["errors"]["auth_failures"], 1);
    }
}
