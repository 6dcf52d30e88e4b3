//! blur-services — the image job path and its collaborators.

pub mod audit;
pub mod box_blur;
pub mod gateway;
pub mod job_types;
pub mod pipeline;
pub mod server;
pub mod stats;
pub mod storage;

pub use audit::{AuditError, AuditLog, StoredJob};
pub use box_blur::{BlurError, BoxBlur};
pub use gateway::{AuditSink, RadiusSource};
pub use job_types::{JobRecord, JobReport, JobStage};
pub use pipeline::{JobAbort, JobError, Pipeline};
pub use server::Server;
pub use stats::{ServerStats, StatsSnapshot};
pub use storage::{StorageError, WorkDir};
