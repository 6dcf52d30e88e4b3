//! Audit trail listing.

use anyhow::{Context, Result};
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct JobsResponse {
    total: u64,
    jobs: Vec<JobRow>,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct JobRow {
    id: i64,
    path: String,
    radius: u32,
    elapsed_ms: u64,
    source_digest: Option<String>,
    recorded_at: i64,
}

pub async fn cmd_jobs(port: u16, limit: Option<&str>) -> Result<()> {
    let mut url = format!("{}/jobs", base_url(port));
    if let Some(limit) = limit {
        let n: usize = limit.parse().context("limit must be a number")?;
        url.push_str(&format!("?limit={}", n));
    }
    let resp: JobsResponse = get_json(&url).await?;

    if resp.jobs.is_empty() {
        println!("No jobs recorded yet.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Recent Jobs ({} of {})", resp.jobs.len(), resp.total);
    println!("═══════════════════════════════════════");

    for j in &resp.jobs {
        let digest = j.source_digest.as_deref().unwrap_or("-");
        println!("  ┌─ #{}", j.id);
        println!("  │  path    : {}", j.path);
        println!("  │  radius  : {}", j.radius);
        println!("  │  source  : {}", &digest[..16.min(digest.len())]);
        println!("  └─ elapsed : {} ms", j.elapsed_ms);
    }

    Ok(())
}
