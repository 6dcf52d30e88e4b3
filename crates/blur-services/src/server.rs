//! Connection server. Accepts one client at a time and runs its job to
//! completion before accepting the next.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::pipeline::Pipeline;

/// Bind the image socket. Failure here is the only fatal server error.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind image socket on {addr}"))
}

pub struct Server {
    listener: TcpListener,
    pipeline: Pipeline,
    shutdown: broadcast::Receiver<()>,
}

impl Server {
    pub fn new(
        listener: TcpListener,
        pipeline: Pipeline,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            listener,
            pipeline,
            shutdown,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("failed to read listener address")
    }

    /// Serve until shutdown is signalled. Shutdown is observed between
    /// jobs; an in-flight job always reaches a terminal stage first.
    pub async fn run(mut self) -> Result<()> {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(%addr, "image server listening");
        }

        loop {
            let (mut stream, peer) = tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("image server shutting down");
                    return Ok(());
                }

                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };

            tracing::debug!(%peer, "connection accepted");

            match self.pipeline.run(&mut stream).await {
                Ok(report) => {
                    if let Err(e) = stream.shutdown().await {
                        tracing::debug!(%peer, error = %e, "shutdown after reply failed");
                    }
                    tracing::trace!(%peer, job = report.job_id, "connection finished");
                }
                Err(abort) => {
                    tracing::debug!(%peer, job = abort.job_id, "dropping connection");
                }
            }
        }
    }
}
