//! Job ledger: the externally-observable record of a conversion's lifecycle.
//!
//! One [`Job`] entry per conversion, keyed by [`JobId`], holding status,
//! page progress, and the terminal outcome (output location or error).
//! The orchestrator is the only writer for a given job; an API layer polls
//! [`JobLedger::get_status`] concurrently from its own tasks.
//!
//! The store is a plain `RwLock<HashMap>` behind an `Arc` — every mutation
//! takes the write lock exactly once, so updates to different jobs never
//! interleave mid-record and pollers always observe a consistent `Job`.
//! The single-writer-per-job rule is a documented contract of the caller;
//! the ledger itself only enforces what it can check cheaply: unknown ids
//! and writes to jobs that already reached a terminal state.

use crate::error::LedgerError;
use crate::progress::ConversionProgressCallback;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::warn;
use uuid::Uuid;

/// Opaque, globally unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    fn new() -> Self {
        JobId(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a conversion job.
///
/// `Pending → Processing → Completed | Failed`; the last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, not yet picked up by an orchestrator.
    Pending,
    /// An orchestrator has begun processing pages.
    Processing,
    /// Conversion finished; `output_path` is set.
    Completed,
    /// Conversion aborted on a document-level error; `error` is set.
    Failed,
}

impl JobStatus {
    /// Completed and Failed accept no further writes.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Page-level progress of a running job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Last page handed to the pipeline (1-based; 0 before any page).
    pub current_page: u32,
    /// Total pages in the document (0 until the document is opened).
    pub total_pages: u32,
    /// `current_page / total_pages` in whole percent.
    pub percentage: u8,
}

impl JobProgress {
    fn new(current_page: u32, total_pages: u32) -> Self {
        // current never exceeds total; a misbehaving caller is clamped
        // rather than corrupting the invariant pollers rely on.
        let current_page = current_page.min(total_pages);
        let percentage = if total_pages > 0 {
            (current_page as u64 * 100 / total_pages as u64) as u8
        } else {
            0
        };
        Self {
            current_page,
            total_pages,
            percentage,
        }
    }
}

/// One conversion's externally visible record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the job reaches a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Where the output document landed; only set on Completed.
    pub output_path: Option<PathBuf>,
    /// Human-readable failure description; only set on Failed.
    pub error: Option<String>,
}

/// Shared, concurrently accessible store of conversion jobs.
///
/// Cheap to clone (`Arc` inside); clones observe the same jobs.
#[derive(Clone, Default)]
pub struct JobLedger {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl JobLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new job in Pending state and return its identifier.
    ///
    /// Identifiers are v4 UUIDs; no two calls ever return the same value.
    pub fn create(&self) -> JobId {
        let id = JobId::new();
        let now = Utc::now();
        let job = Job {
            id,
            status: JobStatus::Pending,
            progress: JobProgress::default(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            output_path: None,
            error: None,
        };
        self.jobs
            .write()
            .expect("job ledger lock poisoned")
            .insert(id, job);
        id
    }

    /// Mark a job as picked up by an orchestrator.
    pub fn mark_processing(&self, id: JobId) -> Result<(), LedgerError> {
        self.update(id, |job| {
            job.status = JobStatus::Processing;
        })
    }

    /// Record page progress for a running job.
    pub fn record_progress(
        &self,
        id: JobId,
        current_page: u32,
        total_pages: u32,
    ) -> Result<(), LedgerError> {
        self.update(id, |job| {
            // Single-writer discipline means progress only moves forward;
            // assert in debug builds to catch a second writer early.
            debug_assert!(
                current_page >= job.progress.current_page || total_pages != job.progress.total_pages,
                "progress went backwards for job {id}"
            );
            job.progress = JobProgress::new(current_page, total_pages);
        })
    }

    /// Transition a job to Completed with its output location.
    ///
    /// Progress snaps to 100% so pollers never see a finished job at 97%.
    pub fn mark_completed(&self, id: JobId, output_path: PathBuf) -> Result<(), LedgerError> {
        self.update(id, |job| {
            job.status = JobStatus::Completed;
            job.output_path = Some(output_path.clone());
            job.completed_at = Some(Utc::now());
            job.progress = JobProgress::new(job.progress.total_pages, job.progress.total_pages);
        })
    }

    /// Transition a job to Failed with an error message.
    pub fn mark_failed(&self, id: JobId, error: impl Into<String>) -> Result<(), LedgerError> {
        let error = error.into();
        self.update(id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error.clone());
            job.completed_at = Some(Utc::now());
        })
    }

    /// Current snapshot of a job.
    ///
    /// Repeated calls without intervening writes return identical values.
    pub fn get_status(&self, id: JobId) -> Result<Job, LedgerError> {
        self.jobs
            .read()
            .expect("job ledger lock poisoned")
            .get(&id)
            .cloned()
            .ok_or(LedgerError::NotFound {
                job_id: id.to_string(),
            })
    }

    /// Number of jobs ever created in this ledger.
    pub fn len(&self) -> usize {
        self.jobs.read().expect("job ledger lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One atomic read-modify-write under the write lock, rejecting writes
    /// to unknown ids and to jobs in a terminal state.
    fn update(&self, id: JobId, f: impl FnOnce(&mut Job)) -> Result<(), LedgerError> {
        let mut jobs = self.jobs.write().expect("job ledger lock poisoned");
        let job = jobs.get_mut(&id).ok_or(LedgerError::NotFound {
            job_id: id.to_string(),
        })?;
        if job.status.is_terminal() {
            return Err(LedgerError::TerminalState {
                job_id: id.to_string(),
                status: job.status.to_string(),
            });
        }
        f(job);
        job.updated_at = Utc::now();
        Ok(())
    }
}

/// Progress callback that mirrors page events into a ledger entry.
///
/// This is the glue between the orchestrator's injectable progress sink and
/// the job store: the orchestrator never holds a `Job`, it only emits events.
pub struct LedgerProgress {
    ledger: JobLedger,
    job_id: JobId,
}

impl LedgerProgress {
    pub fn new(ledger: JobLedger, job_id: JobId) -> Self {
        Self { ledger, job_id }
    }
}

impl ConversionProgressCallback for LedgerProgress {
    fn on_conversion_start(&self, total_pages: u32) {
        if let Err(e) = self.ledger.record_progress(self.job_id, 0, total_pages) {
            warn!("ledger progress update dropped: {e}");
        }
    }

    fn on_page_complete(&self, page: u32, total_pages: u32, _word_count: usize) {
        if let Err(e) = self.ledger.record_progress(self.job_id, page, total_pages) {
            warn!("ledger progress update dropped: {e}");
        }
    }

    fn on_page_error(&self, page: u32, total_pages: u32, _error: String) {
        // A failed page still advances the cursor; per-page errors are
        // reported through the conversion result, not the ledger.
        if let Err(e) = self.ledger.record_progress(self.job_id, page, total_pages) {
            warn!("ledger progress update dropped: {e}");
        }
    }
}
