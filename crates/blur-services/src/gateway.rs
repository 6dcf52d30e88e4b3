//! Seams between the job pipeline and the outside world.
//!
//! The pipeline reads the radius through `RadiusSource` and writes its
//! audit trail through `AuditSink`. Neither knows what sits on the other
//! side: the daemon wires in the shared `RadiusCell` and the SQLite log,
//! tests wire in fixed values and failing sinks.

use blur_core::{Radius, RadiusCell};

use crate::audit::AuditError;
use crate::job_types::JobRecord;

/// Supplies the radius for the next job. Safe to call while another task
/// is updating the value.
pub trait RadiusSource: Send + Sync {
    fn current_radius(&self) -> Radius;
}

/// Append-only destination for completed jobs.
pub trait AuditSink: Send + Sync {
    /// Persist one record. Failures are reported, never retried.
    fn append(&self, record: &JobRecord) -> Result<(), AuditError>;
}

impl RadiusSource for RadiusCell {
    fn current_radius(&self) -> Radius {
        self.current()
    }
}

/// A radius that never changes.
impl RadiusSource for Radius {
    fn current_radius(&self) -> Radius {
        *self
    }
}
