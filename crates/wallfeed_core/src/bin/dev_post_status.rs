/*
 * SPDX-FileCopyrightText: 2026 Wallfeed Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use reqwest::header::USER_AGENT;

#[tokio::main]
async fn main() -> Result<()> {
    let api_base = std::env::var("WALLFEED_API_BASE")
        .unwrap_or_else(|_| "http://127.0.0.1:8787".to_string());
    let token = std::env::var("WALLFEED_ACCESS_TOKEN").context("missing WALLFEED_ACCESS_TOKEN")?;
    let message =
        std::env::var("WALLFEED_MESSAGE").unwrap_or_else(|_| "Hello from wallfeed".to_string());

    let base = api_base.trim_end_matches('/');
    let url = format!("{base}/me/feed");

    let client = reqwest::Client::new();
    let resp = client
        .post(url)
        .header("Authorization", format!("Bearer {token}"))
        .header(USER_AGENT, format!("wallfeed/{}", env!("CARGO_PKG_VERSION")))
        .form(&[("message", message.as_str())])
        .send()
        .await?;

    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("status post rejected: {} {}", status, text);
    }
    println!("ok: {} {}", status, text);
    Ok(())
}
