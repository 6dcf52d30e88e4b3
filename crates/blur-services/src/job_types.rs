//! Job stages, the audit record, and the completion report.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use blur_core::Radius;

/// Lifecycle stage of one job. `Done` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Awaiting,
    Receiving,
    Decoding,
    Filtering,
    Encoding,
    Sending,
    Recording,
    Done,
    Aborted,
}

impl JobStage {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStage::Awaiting => "awaiting",
            JobStage::Receiving => "receiving",
            JobStage::Decoding => "decoding",
            JobStage::Filtering => "filtering",
            JobStage::Encoding => "encoding",
            JobStage::Sending => "sending",
            JobStage::Recording => "recording",
            JobStage::Done => "done",
            JobStage::Aborted => "aborted",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStage::Done | JobStage::Aborted)
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the audit trail. Written once per completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Where the filtered image was stored.
    pub path: PathBuf,
    /// Radius snapshot the job ran with.
    pub radius: Radius,
    /// Wall-clock milliseconds spent filtering.
    pub elapsed_ms: u64,
    /// Hex BLAKE3 digest of the received payload.
    pub source_digest: String,
}

/// Everything known about a job that reached `Done`.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: u64,
    pub record: JobRecord,
    /// False when the audit append failed. The client was still served.
    pub recorded: bool,
    pub original_path: PathBuf,
    pub width: usize,
    pub height: usize,
    pub bytes_received: usize,
    pub bytes_sent: usize,
}
