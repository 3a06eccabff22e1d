//! # Sync Events
//!
//! Hooks for observers of the orchestrator: a UI status badge, a log sink,
//! a test recorder.

use tracing::{info, warn};

use crate::orchestrator::{OrchestratorState, PassStatus, SyncPassResult};

/// Receives orchestrator state changes and finished pass results.
pub trait SyncEventEmitter: Send + Sync {
    /// Emits a state machine transition.
    fn emit_state(&self, state: OrchestratorState);

    /// Emits the result of a completed pass.
    fn emit_pass_result(&self, result: &SyncPassResult);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_state(&self, _state: OrchestratorState) {}
    fn emit_pass_result(&self, _result: &SyncPassResult) {}
}

/// Writes events as structured `tracing` records.
pub struct TracingEmitter;

impl SyncEventEmitter for TracingEmitter {
    fn emit_state(&self, state: OrchestratorState) {
        info!(target: "campus_sync::events", %state, "sync://state");
    }

    fn emit_pass_result(&self, result: &SyncPassResult) {
        let summary = serde_json::to_string(result).unwrap_or_else(|e| e.to_string());

        match result.status {
            PassStatus::Success => {
                info!(target: "campus_sync::events", pass_id = %result.pass_id, %summary, "sync://result")
            }
            _ => {
                warn!(target: "campus_sync::events", pass_id = %result.pass_id, %summary, "sync://result")
            }
        }
    }
}
