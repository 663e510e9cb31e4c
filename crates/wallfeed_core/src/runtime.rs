/*
 * SPDX-FileCopyrightText: 2026 Wallfeed Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::graph::{GraphClient, GraphConfig, WallState, DEFAULT_PAGE_LIMIT};
use crate::net_metrics::NetMetrics;
use crate::session::{
    default_data_dir, load_session, store_session, token_fingerprint, AccessSession,
};
use crate::wall_db::WallDb;
use crate::wall_sync::{self, WallAction};
use anyhow::{Context, Result};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

static HANDLE_SEQ: AtomicU64 = AtomicU64::new(1);

struct RunningCore {
    shutdown_tx: watch::Sender<bool>,
    actions: mpsc::UnboundedSender<WallAction>,
    join: Option<thread::JoinHandle<()>>,
}

static REGISTRY: Mutex<Vec<(u64, RunningCore)>> = Mutex::new(Vec::new());

#[derive(Clone, serde::Deserialize)]
pub struct CoreStartConfig {
    pub api_base: String,
    /// Access token from the host's login flow. Omitted on restart: the core
    /// reuses the persisted session if one exists.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub page_limit: Option<u32>,
    #[serde(default)]
    pub sync_interval_secs: Option<u64>,
    /// HTTP client timeout for outbound requests (seconds).
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
}

impl Default for CoreStartConfig {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:8787".to_string(),
            access_token: None,
            user_id: None,
            user_name: None,
            data_dir: None,
            page_limit: None,
            sync_interval_secs: None,
            http_timeout_secs: None,
        }
    }
}

pub fn start(cfg: CoreStartConfig) -> Result<u64> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .try_init()
        .ok();

    let handle = HANDLE_SEQ.fetch_add(1, Ordering::Relaxed);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (actions_tx, actions_rx) = mpsc::unbounded_channel();

    let join = thread::spawn(move || {
        if let Err(e) = run_core(cfg, shutdown_rx, actions_rx) {
            error!("core runtime failed: {e:#}");
        }
    });

    let mut reg = REGISTRY.lock().unwrap();
    reg.push((
        handle,
        RunningCore {
            shutdown_tx,
            actions: actions_tx,
            join: Some(join),
        },
    ));

    Ok(handle)
}

pub fn stop(handle: u64) -> Result<()> {
    let running = {
        let mut reg = REGISTRY.lock().unwrap();
        let idx = reg
            .iter()
            .position(|(h, _)| *h == handle)
            .context("invalid handle")?;
        let (_, mut running) = reg.swap_remove(idx);
        let _ = running.shutdown_tx.send(true);
        // Join in background to avoid blocking the host's UI thread.
        running.join.take()
    };

    if let Some(j) = running {
        thread::spawn(move || {
            let _ = j.join();
        });
    }
    Ok(())
}

pub fn send_action(handle: u64, action: WallAction) -> Result<()> {
    let reg = REGISTRY.lock().unwrap();
    let (_, running) = reg
        .iter()
        .find(|(h, _)| *h == handle)
        .context("invalid handle")?;
    running
        .actions
        .send(action)
        .map_err(|_| anyhow::anyhow!("core is shutting down"))
}

pub fn refresh(handle: u64) -> Result<()> {
    send_action(handle, WallAction::UpdateFromWall)
}

pub fn post_status(handle: u64, message: &str) -> Result<()> {
    send_action(
        handle,
        WallAction::PostStatus {
            message: message.to_string(),
        },
    )
}

pub fn post_photo(handle: u64, photo_path: &str, caption: &str) -> Result<()> {
    send_action(
        handle,
        WallAction::PostPhoto {
            photo_path: PathBuf::from(photo_path),
            caption: caption.to_string(),
        },
    )
}

pub fn logout(handle: u64) -> Result<()> {
    send_action(handle, WallAction::UserLogout)
}

fn run_core(
    cfg: CoreStartConfig,
    shutdown_rx: watch::Receiver<bool>,
    actions_rx: mpsc::UnboundedReceiver<WallAction>,
) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    rt.block_on(async move {
        let api_base = cfg.api_base.trim().trim_end_matches('/').to_string();
        if api_base.is_empty() {
            anyhow::bail!("api_base must not be empty");
        }

        let data_dir = if let Some(dir) = &cfg.data_dir {
            PathBuf::from(dir)
        } else {
            default_data_dir()?.join("core")
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("create data dir: {}", data_dir.display()))?;
        info!("data dir: {}", data_dir.display());

        let session = match cfg
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            Some(token) => {
                let session = AccessSession {
                    access_token: token.to_string(),
                    user_id: cfg.user_id.clone(),
                    user_name: cfg.user_name.clone(),
                };
                store_session(&data_dir, &session)?;
                Some(session)
            }
            None => load_session(&data_dir)?,
        };
        match &session {
            Some(s) => info!("session open (token {})", token_fingerprint(&s.access_token)),
            None => info!("starting logged out"),
        }

        let http_timeout_secs = cfg.http_timeout_secs.unwrap_or(30).clamp(5, 120);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(http_timeout_secs))
            .build()
            .context("build http client")?;

        let wall = Arc::new(WallDb::open(data_dir.join("wallfeed.db"))?);
        let net = Arc::new(NetMetrics::new());
        let (ui_events, _) = tokio::sync::broadcast::channel(512);

        let state = WallState {
            cfg: GraphConfig {
                api_base: api_base.clone(),
                page_limit: cfg.page_limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, 100),
                sync_interval_secs: cfg.sync_interval_secs.unwrap_or(900).clamp(60, 24 * 3600),
            },
            session: Arc::new(Mutex::new(session)),
            wall,
            graph: GraphClient::new(http, &api_base, net.clone()),
            net,
            ui_events,
            data_dir,
        };

        wall_sync::start_wall_worker(state, shutdown_rx.clone(), actions_rx);

        // Keep the runtime alive until stop() flips the watch.
        let mut shutdown_rx = shutdown_rx;
        while !*shutdown_rx.borrow() {
            if shutdown_rx.changed().await.is_err() {
                break;
            }
        }
        Ok(())
    })
}
