//! # Sync Orchestrator
//!
//! Runs every registered sync unit for one pass and reports the aggregate.
//!
//! ## Pass State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌──────┐  run_pass   ┌─────────────────┐  unreachable  ┌───────────┐  │
//! │   │ Idle │ ──────────► │ CheckingNetwork │ ────────────► │ Network   │  │
//! │   └──────┘             └────────┬────────┘               │Unavailable│  │
//! │      ▲                          │ reachable              └───────────┘  │
//! │      │ cancelled                ▼                         status=Retry  │
//! │      │                   ┌─────────────┐                                │
//! │      └────────────────── │   Running   │  spawn one task per unit       │
//! │                          └──────┬──────┘  join ALL of them              │
//! │                                 │                                       │
//! │                                 ▼                                       │
//! │                          ┌─────────────┐  Success | PartialFailure      │
//! │                          │  Completed  │  | Failure (unit task panic)   │
//! │                          └─────────────┘                                │
//! │                                                                         │
//! │  • No unit runs when the probe says offline. Nothing is written.       │
//! │  • A slow or failing unit delays the pass, never aborts siblings.      │
//! │  • One pass at a time; overlapping triggers queue on the pass lock.    │
//! │  • Cancelling drops the JoinSet, which aborts every unit task.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use campus_core::EntityKind;

use crate::events::{NoOpEmitter, SyncEventEmitter};
use crate::network::ConnectivityProbe;
use crate::registry::UnitRegistry;
use crate::unit::{UnitContext, UnitOutcome};

// =============================================================================
// Orchestrator State
// =============================================================================

/// Where the orchestrator is in its pass state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    CheckingNetwork,
    Running,
    Completed,
    NetworkUnavailable,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorState::Idle => write!(f, "idle"),
            OrchestratorState::CheckingNetwork => write!(f, "checking_network"),
            OrchestratorState::Running => write!(f, "running"),
            OrchestratorState::Completed => write!(f, "completed"),
            OrchestratorState::NetworkUnavailable => write!(f, "network_unavailable"),
        }
    }
}

// =============================================================================
// Pass Result
// =============================================================================

/// Overall status of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    /// Every unit succeeded.
    Success,

    /// At least one unit failed.
    PartialFailure,

    /// Network was unreachable; no unit ran.
    Retry,

    /// A unit task died outside its own error handling.
    Failure,
}

impl PassStatus {
    fn aggregate(outcomes: &BTreeMap<EntityKind, UnitOutcome>, aborted: bool) -> Self {
        if aborted {
            PassStatus::Failure
        } else if outcomes.values().all(UnitOutcome::is_success) {
            PassStatus::Success
        } else {
            PassStatus::PartialFailure
        }
    }
}

impl fmt::Display for PassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassStatus::Success => write!(f, "success"),
            PassStatus::PartialFailure => write!(f, "partial_failure"),
            PassStatus::Retry => write!(f, "retry"),
            PassStatus::Failure => write!(f, "failure"),
        }
    }
}

/// Outcome of one complete pass. Built once, never mutated, not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPassResult {
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Per-entity outcomes. Empty when the network was unavailable.
    pub outcomes: BTreeMap<EntityKind, UnitOutcome>,
    pub status: PassStatus,
}

impl SyncPassResult {
    /// True for `Retry` and `Failure`. Whether `PartialFailure` is retried
    /// is the scheduler's call.
    pub fn should_retry(&self) -> bool {
        matches!(self.status, PassStatus::Retry | PassStatus::Failure)
    }

    pub fn outcome(&self, entity: EntityKind) -> Option<&UnitOutcome> {
        self.outcomes.get(&entity)
    }

    /// Entities whose unit did not succeed.
    pub fn failed_entities(&self) -> Vec<EntityKind> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .map(|(entity, _)| *entity)
            .collect()
    }

    /// Rows written across all units, including partial writes.
    pub fn records_written(&self) -> usize {
        self.outcomes.values().map(UnitOutcome::written).sum()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

// =============================================================================
// Sync Orchestrator
// =============================================================================

/// Coordinates the sync units for each pass.
///
/// Stores, probe and registry are handed in at construction; the
/// orchestrator holds no global state.
///
/// ## Usage
/// ```rust,ignore
/// let ctx = UnitContext::new(remote, Arc::new(db.clone()));
/// let orchestrator = SyncOrchestrator::new(UnitRegistry::standard(), ctx, probe)
///     .with_emitter(Arc::new(TracingEmitter));
///
/// let result = orchestrator.run_pass().await;
/// if result.should_retry() { /* schedule another attempt */ }
/// ```
pub struct SyncOrchestrator {
    registry: UnitRegistry,
    ctx: UnitContext,
    probe: Arc<dyn ConnectivityProbe>,
    emitter: Arc<dyn SyncEventEmitter>,
    permits: Option<Arc<Semaphore>>,
    state: RwLock<OrchestratorState>,
    last_result: RwLock<Option<SyncPassResult>>,
    pass_lock: Mutex<()>,
}

impl SyncOrchestrator {
    /// Creates an orchestrator. All units run at once unless
    /// [`with_max_concurrency`](Self::with_max_concurrency) is set.
    pub fn new(
        registry: UnitRegistry,
        ctx: UnitContext,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> Self {
        SyncOrchestrator {
            registry,
            ctx,
            probe,
            emitter: Arc::new(NoOpEmitter),
            permits: None,
            state: RwLock::new(OrchestratorState::Idle),
            last_result: RwLock::new(None),
            pass_lock: Mutex::new(()),
        }
    }

    /// Sets the event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Caps how many units run at the same time.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.permits = Some(Arc::new(Semaphore::new(max.max(1))));
        self
    }

    pub fn registry(&self) -> &UnitRegistry {
        &self.registry
    }

    /// Current state machine position.
    pub async fn state(&self) -> OrchestratorState {
        *self.state.read().await
    }

    /// Result of the most recent finished pass.
    pub async fn last_result(&self) -> Option<SyncPassResult> {
        self.last_result.read().await.clone()
    }

    /// Runs one pass to completion.
    ///
    /// Never fails. Network-unavailable is a `Retry` result; unit errors
    /// are per-entity `Failure` outcomes.
    pub async fn run_pass(&self) -> SyncPassResult {
        let _pass = self.pass_lock.lock().await;
        self.run_locked_pass().await
    }

    /// Runs one pass unless `token` is cancelled first.
    ///
    /// A call still queued behind another pass when cancelled leaves the
    /// state alone; only the call that owns the pass lock resets it.
    ///
    /// ## Returns
    /// * `Some(result)` - the pass finished
    /// * `None` - cancelled; in-flight unit tasks were aborted and no
    ///   result exists for this pass
    pub async fn run_pass_cancellable(&self, token: &CancellationToken) -> Option<SyncPassResult> {
        let _pass = tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("Sync pass cancelled before it started");
                return None;
            }
            guard = self.pass_lock.lock() => guard,
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("Sync pass cancelled");
                self.set_state(OrchestratorState::Idle).await;
                None
            }
            result = self.run_locked_pass() => Some(result),
        }
    }

    /// The pass itself. Callers hold `pass_lock`.
    async fn run_locked_pass(&self) -> SyncPassResult {
        let pass_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%pass_id, units = self.registry.len(), "Starting sync pass");

        self.set_state(OrchestratorState::CheckingNetwork).await;
        if !self.probe.is_reachable().await {
            warn!(%pass_id, "Network unavailable, skipping sync pass");
            self.set_state(OrchestratorState::NetworkUnavailable).await;

            let result = SyncPassResult {
                pass_id,
                started_at,
                finished_at: Utc::now(),
                outcomes: BTreeMap::new(),
                status: PassStatus::Retry,
            };
            self.publish(&result).await;
            return result;
        }

        self.set_state(OrchestratorState::Running).await;
        let (outcomes, aborted) = self.run_units().await;

        let result = SyncPassResult {
            pass_id,
            started_at,
            finished_at: Utc::now(),
            status: PassStatus::aggregate(&outcomes, aborted),
            outcomes,
        };

        info!(
            %pass_id,
            status = %result.status,
            written = result.records_written(),
            failed = ?result.failed_entities(),
            duration_ms = result.duration().num_milliseconds(),
            "Sync pass finished"
        );

        self.set_state(OrchestratorState::Completed).await;
        self.publish(&result).await;
        result
    }

    async fn run_units(&self) -> (BTreeMap<EntityKind, UnitOutcome>, bool) {
        let mut tasks = JoinSet::new();

        for unit in self.registry.units() {
            let unit = Arc::clone(unit);
            let ctx = self.ctx.clone();
            let permits = self.permits.clone();

            tasks.spawn(async move {
                let _permit = match permits {
                    Some(permits) => permits.acquire_owned().await.ok(),
                    None => None,
                };

                let entity = unit.entity();
                debug!(%entity, "Sync unit started");
                (entity, unit.sync(&ctx).await)
            });
        }

        let mut outcomes = BTreeMap::new();
        let mut aborted = false;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((entity, outcome)) => {
                    debug!(%entity, %outcome, "Sync unit finished");
                    outcomes.insert(entity, outcome);
                }
                Err(e) => {
                    error!(error = %e, "Sync unit task did not complete");
                    aborted = true;
                }
            }
        }

        for entity in self.registry.entities() {
            outcomes
                .entry(entity)
                .or_insert_with(|| UnitOutcome::failure("sync unit task did not complete", 0));
        }

        (outcomes, aborted)
    }

    async fn set_state(&self, state: OrchestratorState) {
        *self.state.write().await = state;
        self.emitter.emit_state(state);
    }

    async fn publish(&self, result: &SyncPassResult) {
        *self.last_result.write().await = Some(result.clone());
        self.emitter.emit_pass_result(result);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalStore;
    use crate::network::StaticProbe;
    use crate::remote::MemoryRemoteStore;
    use crate::unit::SyncUnit;
    use async_trait::async_trait;
    use campus_core::CachedRecord;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct NullStore;

    #[async_trait]
    impl LocalStore for NullStore {
        async fn upsert(&self, _kind: EntityKind, _record: &CachedRecord) -> crate::SyncResult<()> {
            Ok(())
        }
    }

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed(usize),
        Fail,
        Panic,
    }

    struct ScriptedUnit {
        entity: EntityKind,
        behavior: Behavior,
        delay: Duration,
        calls: Arc<AtomicUsize>,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl ScriptedUnit {
        fn new(entity: EntityKind, behavior: Behavior) -> Self {
            ScriptedUnit {
                entity,
                behavior,
                delay: Duration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
                in_flight: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn tracking(mut self, in_flight: &Arc<AtomicUsize>, peak: &Arc<AtomicUsize>) -> Self {
            self.in_flight = Arc::clone(in_flight);
            self.peak = Arc::clone(peak);
            self
        }
    }

    #[async_trait]
    impl SyncUnit for ScriptedUnit {
        fn entity(&self) -> EntityKind {
            self.entity
        }

        async fn sync(&self, _ctx: &UnitContext) -> UnitOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.behavior {
                Behavior::Succeed(count) => UnitOutcome::success(count),
                Behavior::Fail => UnitOutcome::failure("schema mismatch", 0),
                Behavior::Panic => panic!("unexpected state in {}", self.entity),
            }
        }
    }

    fn orchestrator(units: Vec<ScriptedUnit>, probe: Arc<StaticProbe>) -> SyncOrchestrator {
        let registry = units
            .into_iter()
            .fold(UnitRegistry::new(), |r, u| r.with_unit(Arc::new(u)));
        let ctx = UnitContext::new(Arc::new(MemoryRemoteStore::new()), Arc::new(NullStore));
        SyncOrchestrator::new(registry, ctx, probe)
    }

    #[tokio::test]
    async fn test_all_success() {
        let orch = orchestrator(
            vec![
                ScriptedUnit::new(EntityKind::Teachers, Behavior::Succeed(3)),
                ScriptedUnit::new(EntityKind::Students, Behavior::Succeed(0)),
            ],
            Arc::new(StaticProbe::online()),
        );

        let result = orch.run_pass().await;

        assert_eq!(result.status, PassStatus::Success);
        assert_eq!(result.outcome(EntityKind::Teachers), Some(&UnitOutcome::success(3)));
        assert_eq!(result.outcome(EntityKind::Students), Some(&UnitOutcome::success(0)));
        assert!(!result.should_retry());
        assert_eq!(orch.state().await, OrchestratorState::Completed);
    }

    #[tokio::test]
    async fn test_single_failure_is_partial() {
        let orch = orchestrator(
            vec![
                ScriptedUnit::new(EntityKind::Exams, Behavior::Fail),
                ScriptedUnit::new(EntityKind::Fees, Behavior::Succeed(4)),
            ],
            Arc::new(StaticProbe::online()),
        );

        let result = orch.run_pass().await;

        assert_eq!(result.status, PassStatus::PartialFailure);
        assert_eq!(result.failed_entities(), vec![EntityKind::Exams]);
        assert!(result.outcome(EntityKind::Fees).unwrap().is_success());
        assert!(!result.should_retry());
    }

    #[tokio::test]
    async fn test_offline_runs_no_unit() {
        let unit = ScriptedUnit::new(EntityKind::Teachers, Behavior::Succeed(1));
        let calls = Arc::clone(&unit.calls);
        let orch = orchestrator(vec![unit], Arc::new(StaticProbe::offline()));

        let result = orch.run_pass().await;

        assert_eq!(result.status, PassStatus::Retry);
        assert!(result.outcomes.is_empty());
        assert!(result.should_retry());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(orch.state().await, OrchestratorState::NetworkUnavailable);
    }

    #[tokio::test]
    async fn test_panicking_unit_fails_pass_but_siblings_finish() {
        let orch = orchestrator(
            vec![
                ScriptedUnit::new(EntityKind::Attendance, Behavior::Panic),
                ScriptedUnit::new(EntityKind::Courses, Behavior::Succeed(2)),
            ],
            Arc::new(StaticProbe::online()),
        );

        let result = orch.run_pass().await;

        assert_eq!(result.status, PassStatus::Failure);
        assert!(result.should_retry());
        assert!(!result.outcome(EntityKind::Attendance).unwrap().is_success());
        assert_eq!(result.outcome(EntityKind::Courses), Some(&UnitOutcome::success(2)));
    }

    #[tokio::test]
    async fn test_empty_registry_succeeds() {
        let orch = orchestrator(vec![], Arc::new(StaticProbe::online()));
        let result = orch.run_pass().await;
        assert_eq!(result.status, PassStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_units_run_in_parallel() {
        let orch = orchestrator(
            vec![
                ScriptedUnit::new(EntityKind::Users, Behavior::Succeed(1)).delayed(Duration::from_secs(10)),
                ScriptedUnit::new(EntityKind::Classes, Behavior::Succeed(1)).delayed(Duration::from_secs(10)),
                ScriptedUnit::new(EntityKind::Fees, Behavior::Succeed(1)).delayed(Duration::from_secs(10)),
            ],
            Arc::new(StaticProbe::online()),
        );

        let start = tokio::time::Instant::now();
        let result = orch.run_pass().await;

        assert_eq!(result.status, PassStatus::Success);
        assert!(start.elapsed() < Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_concurrency_is_respected() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let units = EntityKind::ALL
            .iter()
            .map(|kind| {
                ScriptedUnit::new(*kind, Behavior::Succeed(1))
                    .delayed(Duration::from_secs(1))
                    .tracking(&in_flight, &peak)
            })
            .collect();

        let orch = orchestrator(units, Arc::new(StaticProbe::online())).with_max_concurrency(2);
        let result = orch.run_pass().await;

        assert_eq!(result.outcomes.len(), EntityKind::ALL.len());
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_units_and_yields_nothing() {
        let unit = ScriptedUnit::new(EntityKind::Exams, Behavior::Succeed(1))
            .delayed(Duration::from_secs(60));
        let in_flight = Arc::clone(&unit.in_flight);
        let orch = Arc::new(orchestrator(vec![unit], Arc::new(StaticProbe::online())));
        let token = CancellationToken::new();

        let pass = {
            let orch = Arc::clone(&orch);
            let token = token.clone();
            tokio::spawn(async move { orch.run_pass_cancellable(&token).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(in_flight.load(Ordering::SeqCst), 1);
        token.cancel();

        assert!(pass.await.unwrap().is_none());
        assert_eq!(orch.state().await, OrchestratorState::Idle);
        assert!(orch.last_result().await.is_none());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_queued_keeps_running_state() {
        let unit = ScriptedUnit::new(EntityKind::Fees, Behavior::Succeed(1))
            .delayed(Duration::from_secs(60));
        let calls = Arc::clone(&unit.calls);
        let orch = Arc::new(orchestrator(vec![unit], Arc::new(StaticProbe::online())));

        let first = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.run_pass().await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(orch.state().await, OrchestratorState::Running);

        let token = CancellationToken::new();
        let queued = {
            let orch = Arc::clone(&orch);
            let token = token.clone();
            tokio::spawn(async move { orch.run_pass_cancellable(&token).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();

        assert!(queued.await.unwrap().is_none());
        assert_eq!(orch.state().await, OrchestratorState::Running);

        let result = first.await.unwrap();
        assert_eq!(result.status, PassStatus::Success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(orch.state().await, OrchestratorState::Completed);
    }

    #[tokio::test]
    async fn test_result_serializes_entity_names() {
        let orch = orchestrator(
            vec![ScriptedUnit::new(EntityKind::Teachers, Behavior::Succeed(3))],
            Arc::new(StaticProbe::online()),
        );

        let json = serde_json::to_value(orch.run_pass().await).unwrap();

        assert_eq!(json["status"], "success");
        assert_eq!(json["outcomes"]["teachers"]["outcome"], "success");
        assert_eq!(json["outcomes"]["teachers"]["count"], 3);
    }
}
