//! Daemon status and shutdown commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json, post_json};

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    radius: u32,
    bands: usize,
    listen_port: u16,
    work_dir: String,
    recorded_jobs: u64,
    jobs: JobCounters,
}

#[derive(Deserialize)]
struct JobCounters {
    accepted: u64,
    completed: u64,
    aborted: u64,
    audit_failures: u64,
    last_elapsed_ms: u64,
    aborts_by_stage: Vec<(String, u64)>,
}

#[derive(Deserialize)]
struct ShutdownResponse {
    message: String,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  blurd Status");
    println!("═══════════════════════════════════════");
    println!("  Image port       : {}", resp.listen_port);
    println!("  Radius           : {}", resp.radius);
    println!("  Bands            : {}", resp.bands);
    println!("  Work dir         : {}", resp.work_dir);
    println!("  Recorded jobs    : {}", resp.recorded_jobs);
    println!();
    println!("  Accepted         : {}", resp.jobs.accepted);
    println!("  Completed        : {}", resp.jobs.completed);
    println!("  Aborted          : {}", resp.jobs.aborted);
    println!("  Audit failures   : {}", resp.jobs.audit_failures);
    println!("  Last filter time : {} ms", resp.jobs.last_elapsed_ms);

    if !resp.jobs.aborts_by_stage.is_empty() {
        println!("\n  Aborts by stage:");
        for (stage, count) in &resp.jobs.aborts_by_stage {
            println!("    {:<10} {}", stage, count);
        }
    }

    Ok(())
}

pub async fn cmd_shutdown(port: u16) -> Result<()> {
    let resp: ShutdownResponse = post_json(&format!("{}/daemon/shutdown", base_url(port))).await?;
    println!("{}", resp.message);
    Ok(())
}
