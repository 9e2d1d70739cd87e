//! Crate-wide error taxonomy (§7).
//!
//! Subsystem-local errors (`HandlerError`, `ProviderError`, `CheckpointError`)
//! stay as distinct nested enums and convert into `CoreError` with `#[from]`,
//! matching the per-subsystem error style used throughout this crate.

use thiserror::Error;

use crate::types::EngineId;

/// A subscribed scheduler handler failed. Local to the scheduler: logged
/// with engine/step/cycle context, never propagated further.
#[derive(Debug, Error)]
#[error("handler failed at engine {engine_id} step {step_index} (cycle {cycle_count}): {reason}")]
pub struct HandlerError {
    pub engine_id: EngineId,
    pub step_index: u8,
    pub cycle_count: u64,
    pub reason: String,
}

/// LLM provider adapter failure kinds (§4.5).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider {0} unauthorized")]
    Unauthorized(String),
    #[error("provider {0} rate limited")]
    RateLimited(String),
    #[error("provider {0} network error: {1}")]
    Network(String, String),
    #[error("provider {0} rejected request: {1}")]
    InvalidRequest(String, String),
    #[error("provider {0} server error: {1}")]
    ServerError(String, String),
    #[error("provider {0} cancelled")]
    Cancelled(String),
    /// No provider in the configured chain produced a result.
    #[error("all providers in chain exhausted, last error: {0}")]
    ChainExhausted(String),
}

impl ProviderError {
    /// Whether the manager should continue to the next provider in chain
    /// (§4.5 Manager contract).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ProviderError::InvalidRequest(_, _))
    }
}

/// Checkpoint save/load failure (§4.6, §7 `CheckpointIOError`).
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("schema version mismatch: checkpoint is v{found}, runtime expects v{expected}")]
    SchemaVersionMismatch { found: u32, expected: u32 },
}

/// The crate-wide error taxonomy named in §7. Only `InvariantViolation` is
/// meant to reach `main`; everything else is handled at the subsystem that
/// detects it.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("event queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("pivotal sync timeout at step {step_index} after {timeout_ms}ms")]
    PivotSyncTimeout { step_index: u8, timeout_ms: u64 },

    #[error("checkpoint error: {0}")]
    CheckpointIoError(#[from] CheckpointError),

    #[error("schema version mismatch: checkpoint is v{found}, runtime expects v{expected}")]
    SchemaVersionMismatch { found: u32, expected: u32 },

    #[error("operation cancelled")]
    CancelledError,

    /// Internal assertion failed. This variant should never be returned to
    /// a caller that might swallow it; raise it via [`invariant`] instead,
    /// which aborts immediately.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Abort the process with a diagnostic if `cond` is false. §7:
/// `InvariantViolation` is fatal and must never be hidden, so this panics
/// rather than returning a `Result` that could be discarded.
#[track_caller]
pub fn invariant(cond: bool, msg: impl AsRef<str>) {
    if !cond {
        tracing::error!(invariant = msg.as_ref(), "invariant violation, aborting");
        panic!("invariant violation: {}", msg.as_ref());
    }
}
