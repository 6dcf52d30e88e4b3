//! Job pipeline: drives one connection from request frame to audit row.
//!
//! A job walks `Awaiting → Receiving → Decoding → Filtering → Encoding →
//! Sending → Recording → Done`. Any failure before Recording moves it to
//! `Aborted` and the caller drops the connection without a response frame.
//! An audit failure is logged and the job still completes.
//!
//! The radius is read once when the job is accepted, before any bytes are
//! received, and held until the job ends. A change made while a slow client
//! is still uploading applies to the next job.
//!
//! Storage, PNG codec work, the blur and the audit append all run on the
//! blocking pool; the async side only moves frames.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite};

use blur_core::wire::{read_frame, write_frame};
use blur_core::{FrameError, FrameLimits, ImageError, Radius, RgbaImage};

use crate::audit::AuditError;
use crate::box_blur::{BlurError, BoxBlur};
use crate::gateway::{AuditSink, RadiusSource};
use crate::job_types::{JobRecord, JobReport, JobStage};
use crate::stats::ServerStats;
use crate::storage::{StorageError, WorkDir};

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("protocol violation: {0}")]
    Protocol(#[source] FrameError),
    #[error("transfer incomplete: {0}")]
    TransferIncomplete(#[source] FrameError),
    #[error("decode failed: {0}")]
    Decode(#[source] ImageError),
    #[error("filter failed: {0}")]
    Processing(#[source] BlurError),
    #[error("encode failed: {0}")]
    Encode(#[source] ImageError),
    #[error("send failed: {0}")]
    Send(#[source] FrameError),
    #[error("storage failed: {0}")]
    Storage(#[source] StorageError),
    #[error("audit append failed: {0}")]
    Audit(#[source] AuditError),
}

impl JobError {
    fn from_receive(err: FrameError) -> Self {
        if err.is_protocol() {
            JobError::Protocol(err)
        } else {
            JobError::TransferIncomplete(err)
        }
    }
}

/// A job that ended in `Aborted`, with the stage it failed in.
#[derive(Debug, thiserror::Error)]
#[error("job {job_id} aborted while {stage}: {error}")]
pub struct JobAbort {
    pub job_id: u64,
    pub stage: JobStage,
    #[source]
    pub error: JobError,
}

/// Stage tracker for one job.
#[derive(Clone)]
struct Job {
    id: u64,
    stage: JobStage,
    radius: Radius,
}

impl Job {
    fn advance(&mut self, next: JobStage) {
        tracing::debug!(job = self.id, from = %self.stage, to = %next, "job stage");
        self.stage = next;
    }
}

/// Runs jobs against a stream. Cheap to clone; clones share the engine,
/// the sinks, and the counters.
#[derive(Clone)]
pub struct Pipeline {
    radius: Arc<dyn RadiusSource>,
    audit: Arc<dyn AuditSink>,
    engine: Arc<BoxBlur>,
    storage: WorkDir,
    limits: FrameLimits,
    stats: ServerStats,
}

impl Pipeline {
    pub fn new(
        radius: Arc<dyn RadiusSource>,
        audit: Arc<dyn AuditSink>,
        engine: Arc<BoxBlur>,
        storage: WorkDir,
        limits: FrameLimits,
        stats: ServerStats,
    ) -> Self {
        Self {
            radius,
            audit,
            engine,
            storage,
            limits,
            stats,
        }
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub fn limits(&self) -> FrameLimits {
        self.limits
    }

    /// Run one job to a terminal stage. The radius is read once, here, and
    /// held for the whole job.
    pub async fn run<S>(&self, stream: &mut S) -> Result<JobReport, JobAbort>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut job = Job {
            id: self.stats.job_accepted(),
            stage: JobStage::Awaiting,
            radius: self.radius.current_radius(),
        };

        match self.drive(&mut job, stream).await {
            Ok(report) => {
                job.advance(JobStage::Done);
                self.stats
                    .job_completed(report.record.elapsed_ms, report.recorded);
                tracing::info!(
                    job = job.id,
                    radius = %job.radius,
                    width = report.width,
                    height = report.height,
                    elapsed_ms = report.record.elapsed_ms,
                    path = %report.record.path.display(),
                    "job completed"
                );
                Ok(report)
            }
            Err(error) => {
                let stage = job.stage;
                job.advance(JobStage::Aborted);
                self.stats.job_aborted(stage);
                tracing::warn!(job = job.id, %stage, %error, "job aborted");
                Err(JobAbort {
                    job_id: job.id,
                    stage,
                    error,
                })
            }
        }
    }

    async fn drive<S>(&self, job: &mut Job, stream: &mut S) -> Result<JobReport, JobError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        job.advance(JobStage::Receiving);
        let payload = read_frame(stream, &self.limits)
            .await
            .map_err(JobError::from_receive)?;
        let source_digest = hex::encode(blake3::hash(&payload).as_bytes());
        let bytes_received = payload.len();

        let engine = Arc::clone(&self.engine);
        let storage = self.storage.clone();
        let mut worker = job.clone();
        let (worker, processed) = tokio::task::spawn_blocking(move || {
            let processed = process(&mut worker, &engine, &storage, &payload);
            (worker, processed)
        })
        .await
        .map_err(|e| {
            // The task's stage is lost with it; blame the filter.
            job.advance(JobStage::Filtering);
            JobError::Processing(BlurError::Interrupted(e.to_string()))
        })?;
        *job = worker;
        let processed = processed?;

        job.advance(JobStage::Sending);
        write_frame(stream, &processed.png)
            .await
            .map_err(JobError::Send)?;

        job.advance(JobStage::Recording);
        let record = JobRecord {
            path: processed.path,
            radius: job.radius,
            elapsed_ms: processed.elapsed_ms,
            source_digest,
        };
        let audit = Arc::clone(&self.audit);
        let row = record.clone();
        let appended = tokio::task::spawn_blocking(move || audit.append(&row)).await;
        let recorded = match appended {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                let error = JobError::Audit(e);
                tracing::warn!(job = job.id, %error, "job delivered but not recorded");
                false
            }
            Err(e) => {
                tracing::warn!(job = job.id, error = %e, "audit task failed; job not recorded");
                false
            }
        };

        Ok(JobReport {
            job_id: job.id,
            record,
            recorded,
            original_path: processed.original_path,
            width: processed.width,
            height: processed.height,
            bytes_received,
            bytes_sent: processed.png.len(),
        })
    }
}

/// Output of the blocking half of a job.
struct Processed {
    original_path: PathBuf,
    path: PathBuf,
    png: Vec<u8>,
    width: usize,
    height: usize,
    elapsed_ms: u64,
}

/// Store, decode, filter, encode and store again. Runs off the async
/// workers; `job` tracks the stage reached.
fn process(
    job: &mut Job,
    engine: &BoxBlur,
    storage: &WorkDir,
    payload: &[u8],
) -> Result<Processed, JobError> {
    let original_path = storage.store_original(payload).map_err(JobError::Storage)?;

    job.advance(JobStage::Decoding);
    let image = RgbaImage::decode_png(payload).map_err(JobError::Decode)?;
    let (width, height) = (image.width(), image.height());

    job.advance(JobStage::Filtering);
    let start = Instant::now();
    let filtered = engine.apply(&image, job.radius).map_err(JobError::Processing)?;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    job.advance(JobStage::Encoding);
    let png = filtered.encode_png().map_err(JobError::Encode)?;
    let path = storage
        .store_filtered(&original_path, &png)
        .map_err(JobError::Storage)?;

    Ok(Processed {
        original_path,
        path,
        png,
        width,
        height,
        elapsed_ms,
    })
}
