//! Send an image straight to the image socket and save the reply.

use anyhow::{Context, Result};
use tokio::net::TcpStream;

use blur_core::wire::{read_frame, write_frame};
use blur_core::{FrameLimits, RgbaImage};

pub async fn cmd_send(addr: &str, input: &str, output: &str) -> Result<()> {
    let payload = tokio::fs::read(input)
        .await
        .with_context(|| format!("failed to read {}", input))?;

    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to blurd at {} (is it running?)", addr))?;

    write_frame(&mut stream, &payload)
        .await
        .context("failed to send image")?;
    let reply = read_frame(&mut stream, &FrameLimits::default())
        .await
        .context("no result from blurd (payload rejected or server failed)")?;

    tokio::fs::write(output, &reply)
        .await
        .with_context(|| format!("failed to write {}", output))?;

    let image = RgbaImage::decode_png(&reply).context("reply is not a valid png")?;
    println!(
        "Wrote {} ({}x{}, {} bytes)",
        output,
        image.width(),
        image.height(),
        reply.len()
    );
    Ok(())
}
