// Sync error taxonomy.
//
// Every external failure is recovered at the per-repository boundary in
// the scheduler loop. The variants mirror the pipeline stages so logs can
// name where a cycle stopped. Configuration errors are deliberately NOT
// part of this taxonomy: a malformed config reaching the orchestrator is a
// programming error and is surfaced fatally at startup instead.

use thiserror::Error;

/// The pipeline stage a sync attempt failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Fetch,
    Summarize,
    Notify,
    Persist,
}

impl SyncStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Summarize => "summarize",
            Self::Notify => "notify",
            Self::Persist => "persist",
        }
    }
}

/// A failed sync attempt for one repository.
///
/// All variants leave the checkpoint where it was; the same window is
/// retried next cycle. A `Persist` failure after a delivered window
/// means the digest went out but was not recorded, so it may be sent
/// again (at-least-once); the inner message names which checkpoint
/// access failed.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("commit source unavailable: {0}")]
    Source(String),

    #[error("summarization failed: {0}")]
    Summarize(String),

    #[error("delivery failed: {0}")]
    Notify(String),

    #[error("checkpoint access failed: {0}")]
    Persist(String),
}

impl SyncError {
    pub fn stage(&self) -> SyncStage {
        match self {
            Self::Source(_) => SyncStage::Fetch,
            Self::Summarize(_) => SyncStage::Summarize,
            Self::Notify(_) => SyncStage::Notify,
            Self::Persist(_) => SyncStage::Persist,
        }
    }
}
