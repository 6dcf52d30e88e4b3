//! blurd integration test harness.
//!
//! Every test starts its own server on 127.0.0.1:0 inside the test process
//! and talks to it over real TCP, exactly like `blur-ctl send` does.
//!
//!   cargo test --test integration

mod failures;
mod pipeline;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use blur_core::wire::{read_frame, write_frame};
use blur_core::{FrameLimits, Radius, RadiusCell, RgbaImage};
use blur_services::{server, AuditLog, AuditSink, BoxBlur, Pipeline, Server, ServerStats, WorkDir};

// ── Harness ───────────────────────────────────────────────────────────────────

/// Frame limit used by test servers. Small enough to exercise rejection.
pub const TEST_MAX_FRAME: u64 = 1024 * 1024;

/// Bands used by test servers.
pub const TEST_BANDS: usize = 3;

/// Upper bound on any single client exchange.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

static COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct TestServer {
    pub addr: SocketAddr,
    pub radius: RadiusCell,
    pub log: Arc<AuditLog>,
    pub stats: ServerStats,
    pub work_dir: PathBuf,
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<Result<()>>,
}

impl TestServer {
    /// Server whose audit trail goes to an in-memory SQLite log.
    pub async fn start() -> Result<Self> {
        let log = Arc::new(AuditLog::open_in_memory()?);
        Self::start_with_sink(log.clone(), log).await
    }

    /// Server whose audit trail goes to `sink`. `log` is only exposed for
    /// assertions.
    pub async fn start_with_sink(sink: Arc<dyn AuditSink>, log: Arc<AuditLog>) -> Result<Self> {
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        let work_dir =
            std::env::temp_dir().join(format!("blurd-it-{}-{}", std::process::id(), id));
        let _ = std::fs::remove_dir_all(&work_dir);

        let radius = RadiusCell::new(Radius::new(3));
        let stats = ServerStats::new();
        let pipeline = Pipeline::new(
            Arc::new(radius.clone()),
            sink,
            Arc::new(BoxBlur::new(TEST_BANDS)?),
            WorkDir::new(&work_dir)?,
            FrameLimits::new(TEST_MAX_FRAME, 4096),
            stats.clone(),
        );

        let listener = server::bind("127.0.0.1:0".parse()?).await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, _) = broadcast::channel(1);
        let handle = tokio::spawn(Server::new(listener, pipeline, shutdown_tx.subscribe()).run());

        Ok(Self {
            addr,
            radius,
            log,
            stats,
            work_dir,
            shutdown_tx,
            handle,
        })
    }

    /// Signal shutdown and wait for the accept loop to return.
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        let result = tokio::time::timeout(EXCHANGE_TIMEOUT, self.handle)
            .await
            .context("server did not stop")?
            .context("server task panicked")?;
        let _ = std::fs::remove_dir_all(&self.work_dir);
        result
    }
}

/// Send one PNG and return the server's reply.
pub async fn blur_remote(addr: SocketAddr, png: &[u8]) -> Result<Vec<u8>> {
    tokio::time::timeout(EXCHANGE_TIMEOUT, async {
        let mut stream = TcpStream::connect(addr).await?;
        write_frame(&mut stream, png).await?;
        let reply = read_frame(&mut stream, &FrameLimits::default()).await?;
        Ok::<_, anyhow::Error>(reply.to_vec())
    })
    .await
    .context("exchange timed out")?
}

/// Write arbitrary bytes, close the write half, then try to read a frame.
/// Malformed requests are expected to produce an error here.
pub async fn send_raw(addr: SocketAddr, raw: &[u8]) -> Result<Vec<u8>> {
    tokio::time::timeout(EXCHANGE_TIMEOUT, async {
        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(raw).await?;
        stream.shutdown().await?;
        let reply = read_frame(&mut stream, &FrameLimits::default()).await?;
        Ok::<_, anyhow::Error>(reply.to_vec())
    })
    .await
    .context("exchange timed out")?
}

pub fn solid_png(width: usize, height: usize, pixel: [u8; 4]) -> Vec<u8> {
    RgbaImage::from_pixel(width, height, pixel)
        .and_then(|img| img.encode_png())
        .expect("encode test png")
}

/// Deterministic image with distinct values in every channel.
pub fn gradient_image(width: usize, height: usize) -> RgbaImage {
    let mut data = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[
                (x * 37 % 256) as u8,
                (y * 53 % 256) as u8,
                ((x * y + 11) % 256) as u8,
                128,
            ]);
        }
    }
    RgbaImage::new(width, height, data).expect("gradient image")
}
