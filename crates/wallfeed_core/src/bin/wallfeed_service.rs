/*
 * SPDX-FileCopyrightText: 2026 Wallfeed Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
use wallfeed_core::runtime::{self, CoreStartConfig};

fn default_config_path() -> Result<PathBuf> {
    if cfg!(target_os = "windows") {
        let base = std::env::var("APPDATA")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        return Ok(PathBuf::from(base).join("Wallfeed").join("config.json"));
    }
    if cfg!(target_os = "macos") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        return Ok(PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join("Wallfeed")
            .join("config.json"));
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Ok(PathBuf::from(home)
        .join(".config")
        .join("wallfeed")
        .join("config.json"))
}

fn parse_config_path() -> Result<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return Ok(PathBuf::from(path));
            }
            return Err(anyhow::anyhow!("--config requires a path"));
        }
    }
    if let Ok(path) = std::env::var("WALLFEED_CONFIG") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    default_config_path()
}

/// Fallback when no config file exists: enough to run against a dev endpoint.
fn config_from_env() -> Option<CoreStartConfig> {
    let api_base = std::env::var("WALLFEED_API_BASE").ok()?;
    Some(CoreStartConfig {
        api_base,
        access_token: std::env::var("WALLFEED_ACCESS_TOKEN").ok(),
        data_dir: std::env::var("WALLFEED_DATA_DIR").ok(),
        ..CoreStartConfig::default()
    })
}

fn hash_of(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

struct Service {
    handle: Option<u64>,
    config_hash: Option<u64>,
    failed_hash: Option<u64>,
}

impl Service {
    fn restart_with(&mut self, cfg: CoreStartConfig, hash: Option<u64>) {
        if let Some(h) = self.handle.take() {
            if let Err(e) = runtime::stop(h) {
                warn!("failed to stop previous core: {e:#}");
            }
        }
        match runtime::start(cfg) {
            Ok(h) => {
                info!("core started (handle={h})");
                self.handle = Some(h);
                self.config_hash = hash;
                self.failed_hash = None;
            }
            Err(e) => {
                warn!("failed to start core: {e:#}");
                self.failed_hash = hash;
            }
        }
    }

    /// Restart the core when the config file appears or its content changes.
    /// A config that already failed is not retried until it changes again.
    fn reload_if_changed(&mut self, path: &Path) {
        let Ok(text) = std::fs::read_to_string(path) else {
            return;
        };
        let hash = hash_of(&text);
        if self.config_hash == Some(hash) || self.failed_hash == Some(hash) {
            return;
        }
        match serde_json::from_str::<CoreStartConfig>(&text).context("decode CoreStartConfig") {
            Ok(cfg) => self.restart_with(cfg, Some(hash)),
            Err(e) => {
                warn!("invalid config: {e:#}");
                self.failed_hash = Some(hash);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg_path = parse_config_path()?;
    info!("wallfeed core service starting");
    info!("config: {}", cfg_path.display());

    let mut service = Service {
        handle: None,
        config_hash: None,
        failed_hash: None,
    };

    if !cfg_path.exists() {
        match config_from_env() {
            Some(cfg) => service.restart_with(cfg, None),
            None => warn!(
                "no config at {} and WALLFEED_API_BASE unset, waiting for config",
                cfg_path.display()
            ),
        }
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        if cfg_path.exists() {
            service.reload_if_changed(&cfg_path);
        }
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("shutdown requested");
                break;
            }
            _ = sleep(Duration::from_secs(5)) => {}
        }
    }

    if let Some(h) = service.handle.take() {
        if let Err(e) = runtime::stop(h) {
            warn!("failed to stop core: {e:#}");
        }
    }
    Ok(())
}
