//! Filter radius commands.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::http::{base_url, get_json, post_json_body};

#[derive(Deserialize)]
struct RadiusResponse {
    radius: u32,
    max_radius: u32,
}

#[derive(Serialize)]
struct RadiusRequest {
    radius: u32,
}

pub async fn cmd_radius(port: u16) -> Result<()> {
    let resp: RadiusResponse = get_json(&format!("{}/radius", base_url(port))).await?;
    println!("Radius: {} (max {})", resp.radius, resp.max_radius);
    Ok(())
}

pub async fn cmd_radius_set(port: u16, value: &str) -> Result<()> {
    let radius: u32 = value.parse().context("radius must be a non-negative integer")?;
    let resp: RadiusResponse =
        post_json_body(&format!("{}/radius", base_url(port)), &RadiusRequest { radius }).await?;

    if resp.radius != radius {
        println!("Radius set to {} (requested {}, radius must be odd).", resp.radius, radius);
    } else {
        println!("Radius set to {}.", resp.radius);
    }
    Ok(())
}
