//! Shared HTTP request helpers for CLI commands.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/api", port)
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    let resp = reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to blurd at {} (is it running?)", url))?;
    parse(resp).await
}

pub async fn post_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    let resp = reqwest::Client::new()
        .post(url)
        .send()
        .await
        .with_context(|| format!("failed to connect to blurd at {} (is it running?)", url))?;
    parse(resp).await
}

pub async fn post_json_body<T, R>(url: &str, body: &T) -> Result<R>
where
    T: Serialize,
    R: for<'de> Deserialize<'de>,
{
    let resp = reqwest::Client::new()
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("failed to connect to blurd at {} (is it running?)", url))?;
    parse(resp).await
}

// Error responses carry a plain-text reason rather than JSON.
async fn parse<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let reason = resp.text().await.unwrap_or_default();
        bail!("blurd returned {}: {}", status, reason);
    }
    resp.json::<T>().await.context("failed to parse response")
}
