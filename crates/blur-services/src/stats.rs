use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::job_types::JobStage;

/// Running totals for the connection server. Clones share the counters.
#[derive(Clone, Default)]
pub struct ServerStats {
    inner: Arc<Counters>,
    /// stage → jobs aborted while in it
    aborts_by_stage: Arc<DashMap<JobStage, u64>>,
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    completed: AtomicU64,
    aborted: AtomicU64,
    audit_failures: AtomicU64,
    last_elapsed_ms: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub completed: u64,
    pub aborted: u64,
    pub audit_failures: u64,
    pub last_elapsed_ms: u64,
    pub aborts_by_stage: Vec<(JobStage, u64)>,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next job id. Ids start at 1.
    pub fn job_accepted(&self) -> u64 {
        self.inner.accepted.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn job_completed(&self, elapsed_ms: u64, recorded: bool) {
        self.inner.completed.fetch_add(1, Ordering::Relaxed);
        self.inner
            .last_elapsed_ms
            .store(elapsed_ms, Ordering::Relaxed);
        if !recorded {
            self.inner.audit_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn job_aborted(&self, stage: JobStage) {
        self.inner.aborted.fetch_add(1, Ordering::Relaxed);
        *self.aborts_by_stage.entry(stage).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let mut aborts_by_stage: Vec<(JobStage, u64)> = self
            .aborts_by_stage
            .iter()
            .map(|e| (*e.key(), *e.value()))
            .collect();
        aborts_by_stage.sort_by_key(|(stage, _)| stage.as_str());

        StatsSnapshot {
            accepted: self.inner.accepted.load(Ordering::Relaxed),
            completed: self.inner.completed.load(Ordering::Relaxed),
            aborted: self.inner.aborted.load(Ordering::Relaxed),
            audit_failures: self.inner.audit_failures.load(Ordering::Relaxed),
            last_elapsed_ms: self.inner.last_elapsed_ms.load(Ordering::Relaxed),
            aborts_by_stage,
        }
    }
}
