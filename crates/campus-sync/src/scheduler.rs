//! # Sync Scheduler
//!
//! Triggers passes periodically or on demand and retries them with backoff.
//!
//! ## Trigger Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  run_periodic(1h, {requires_network})      run_once(role?)              │
//! │       │                                         │                       │
//! │       │ already registered? → KeptExisting      │                       │
//! │       ▼                                         │                       │
//! │  ┌──────────────┐ tick (first one immediate)    │                       │
//! │  │ periodic task│────┐                          │                       │
//! │  └──────────────┘    │ offline → wait for net   │                       │
//! │                      ▼                          ▼                       │
//! │               ┌──────────────────────────────────────┐                  │
//! │               │ PassRunner                           │                  │
//! │               │   result = orchestrator.run_pass()   │                  │
//! │               │   Retry / Failure        → backoff   │                  │
//! │               │   PartialFailure         → backoff   │ (if configured)  │
//! │               │   Success / exhausted    → done      │                  │
//! │               └──────────────────────────────────────┘                  │
//! │                                                                         │
//! │  cancel_all(): drops the periodic registration and cancels every       │
//! │  in-flight pass (periodic or one-shot).                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use campus_core::Role;

use crate::network::ConnectivityProbe;
use crate::orchestrator::{PassStatus, SyncOrchestrator, SyncPassResult};
use crate::retry::RetryPolicy;

/// Shortest accepted periodic interval.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// How often a deferred tick re-checks connectivity.
const NETWORK_RECHECK: Duration = Duration::from_secs(30);

/// Conditions a periodic tick must meet before a pass starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConstraints {
    /// Hold the tick while the connectivity probe reports offline and run
    /// it once the network returns.
    pub requires_network: bool,
}

impl Default for SyncConstraints {
    fn default() -> Self {
        SyncConstraints {
            requires_network: true,
        }
    }
}

/// What `run_periodic` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A new periodic job was started.
    Registered,

    /// A periodic job already existed and was left untouched.
    KeptExisting,
}

struct PeriodicJob {
    interval: Duration,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

// =============================================================================
// Pass Runner
// =============================================================================

/// Runs one pass and its retries.
#[derive(Clone)]
struct PassRunner {
    orchestrator: Arc<SyncOrchestrator>,
    policy: RetryPolicy,
    retry_on_partial_failure: bool,
}

impl PassRunner {
    fn wants_retry(&self, result: &SyncPassResult) -> bool {
        result.should_retry()
            || (self.retry_on_partial_failure && result.status == PassStatus::PartialFailure)
    }

    /// `None` when cancelled before a final result existed.
    async fn run(&self, token: &CancellationToken) -> Option<SyncPassResult> {
        let mut backoff = self.policy.backoff();
        let mut attempt: u32 = 1;

        loop {
            let result = self.orchestrator.run_pass_cancellable(token).await?;
            if !self.wants_retry(&result) {
                return Some(result);
            }

            let Some(delay) = backoff.next_backoff() else {
                warn!(attempt, status = %result.status, "Sync retries exhausted");
                return Some(result);
            };

            warn!(
                attempt,
                status = %result.status,
                delay_secs = delay.as_secs_f64(),
                "Sync pass will be retried"
            );

            tokio::select! {
                _ = token.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

// =============================================================================
// Sync Scheduler
// =============================================================================

/// Periodic and one-shot triggers for the orchestrator.
///
/// ## Usage
/// ```rust,ignore
/// let scheduler = SyncScheduler::new(orchestrator, probe, config.retry_policy());
/// scheduler.run_periodic(config.sync_interval(), SyncConstraints::default()).await;
///
/// // Pull-to-refresh
/// let result = scheduler.run_once(Some(Role::Teacher)).await;
///
/// // Logout
/// scheduler.cancel_all().await;
/// ```
pub struct SyncScheduler {
    runner: PassRunner,
    probe: Arc<dyn ConnectivityProbe>,
    root: Mutex<CancellationToken>,
    periodic: Mutex<Option<PeriodicJob>>,
}

impl SyncScheduler {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        probe: Arc<dyn ConnectivityProbe>,
        policy: RetryPolicy,
    ) -> Self {
        SyncScheduler {
            runner: PassRunner {
                orchestrator,
                policy,
                retry_on_partial_failure: false,
            },
            probe,
            root: Mutex::new(CancellationToken::new()),
            periodic: Mutex::new(None),
        }
    }

    /// Also retry passes that ended in `PartialFailure`.
    pub fn with_retry_on_partial_failure(mut self, enabled: bool) -> Self {
        self.runner.retry_on_partial_failure = enabled;
        self
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.runner.orchestrator
    }

    /// Registers a recurring pass.
    ///
    /// Keep-existing semantics: if any periodic job is registered, this is
    /// a no-op, even when `interval` differs.
    pub async fn run_periodic(&self, interval: Duration, constraints: SyncConstraints) -> Registration {
        let mut periodic = self.periodic.lock().await;

        if let Some(job) = periodic.as_ref() {
            if !job.handle.is_finished() {
                info!(
                    existing_secs = job.interval.as_secs(),
                    requested_secs = interval.as_secs(),
                    "Periodic sync already registered, keeping existing"
                );
                return Registration::KeptExisting;
            }
        }

        let interval = interval.max(MIN_INTERVAL);
        let token = self.root.lock().await.child_token();
        let handle = tokio::spawn(periodic_loop(
            self.runner.clone(),
            Arc::clone(&self.probe),
            interval,
            constraints,
            token.clone(),
        ));

        info!(
            interval_secs = interval.as_secs(),
            requires_network = constraints.requires_network,
            "Periodic sync registered"
        );

        *periodic = Some(PeriodicJob {
            interval,
            token,
            handle,
        });
        Registration::Registered
    }

    /// Runs one pass now, retrying per the policy.
    ///
    /// The role filter is accepted and logged; every entity is synced
    /// regardless.
    ///
    /// ## Returns
    /// `None` if [`cancel_all`](Self::cancel_all) interrupted the run.
    pub async fn run_once(&self, role: Option<Role>) -> Option<SyncPassResult> {
        if let Some(role) = role {
            info!(%role, "One-shot sync requested with role filter; syncing all entities");
        } else {
            info!("One-shot sync requested");
        }

        let token = self.root.lock().await.child_token();
        self.runner.run(&token).await
    }

    /// Removes the periodic registration and cancels in-flight passes.
    pub async fn cancel_all(&self) {
        let mut periodic = self.periodic.lock().await;
        let mut root = self.root.lock().await;

        root.cancel();
        *root = CancellationToken::new();

        if let Some(job) = periodic.take() {
            job.token.cancel();
            if let Err(e) = job.handle.await {
                warn!(error = %e, "Periodic sync task ended abnormally");
            }
        }

        info!("All scheduled sync work cancelled");
    }

    /// True while a periodic job is registered.
    pub async fn is_registered(&self) -> bool {
        self.periodic
            .lock()
            .await
            .as_ref()
            .is_some_and(|job| !job.handle.is_finished())
    }
}

async fn periodic_loop(
    runner: PassRunner,
    probe: Arc<dyn ConnectivityProbe>,
    interval: Duration,
    constraints: SyncConstraints,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if constraints.requires_network && !probe.is_reachable().await {
            info!("Network unavailable, deferring periodic sync");
            if !wait_for_network(probe.as_ref(), &token).await {
                break;
            }
            info!("Network available, running deferred periodic sync");
            ticker.reset();
        }

        if runner.run(&token).await.is_none() {
            break;
        }
    }

    debug!("Periodic sync stopped");
}

/// Polls the probe until it reports online. `false` if cancelled first.
async fn wait_for_network(probe: &dyn ConnectivityProbe, token: &CancellationToken) -> bool {
    loop {
        tokio::select! {
            _ = token.cancelled() => return false,
            _ = tokio::time::sleep(NETWORK_RECHECK) => {}
        }

        if probe.is_reachable().await {
            return true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalStore;
    use crate::network::StaticProbe;
    use crate::registry::UnitRegistry;
    use crate::remote::{MemoryRemoteStore, RemoteError};
    use crate::unit::UnitContext;
    use async_trait::async_trait;
    use campus_core::{CachedRecord, EntityKind, Teacher};

    struct NullStore;

    #[async_trait]
    impl LocalStore for NullStore {
        async fn upsert(&self, _kind: EntityKind, _record: &CachedRecord) -> crate::SyncResult<()> {
            Ok(())
        }
    }

    struct Harness {
        remote: Arc<MemoryRemoteStore>,
        probe: Arc<StaticProbe>,
        scheduler: Arc<SyncScheduler>,
    }

    fn harness(online: bool, policy: RetryPolicy, retry_partial: bool) -> Harness {
        let remote = Arc::new(MemoryRemoteStore::new());
        let probe = Arc::new(StaticProbe::new(online));

        let ctx = UnitContext::new(remote.clone(), Arc::new(NullStore));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            UnitRegistry::new().register::<Teacher>(),
            ctx,
            probe.clone(),
        ));
        let scheduler = SyncScheduler::new(orchestrator, probe.clone(), policy)
            .with_retry_on_partial_failure(retry_partial);

        Harness {
            remote,
            probe,
            scheduler: Arc::new(scheduler),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_success() {
        let h = harness(true, RetryPolicy::default(), false);

        let result = h.scheduler.run_once(None).await.unwrap();

        assert_eq!(result.status, PassStatus::Success);
        assert_eq!(h.remote.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_role_filter_still_syncs_everything() {
        let h = harness(true, RetryPolicy::default(), false);

        let result = h.scheduler.run_once(Some(Role::Student)).await.unwrap();

        assert!(result.outcome(EntityKind::Teachers).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_retries_until_exhausted() {
        let h = harness(false, RetryPolicy::linear(Duration::from_secs(10), 3), false);

        let start = tokio::time::Instant::now();
        let result = h.scheduler.run_once(None).await.unwrap();

        assert_eq!(result.status, PassStatus::Retry);
        assert_eq!(h.remote.fetch_count(), 0);
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_when_network_returns() {
        let h = harness(false, RetryPolicy::linear(Duration::from_secs(30), 5), false);

        let scheduler = Arc::clone(&h.scheduler);
        let pass = tokio::spawn(async move { scheduler.run_once(None).await });

        tokio::time::sleep(Duration::from_secs(45)).await;
        h.probe.set_online(true);

        let result = pass.await.unwrap().unwrap();
        assert_eq!(result.status, PassStatus::Success);
        assert_eq!(h.remote.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_not_retried_by_default() {
        let h = harness(true, RetryPolicy::linear(Duration::from_secs(5), 3), false);
        h.remote
            .fail_collection(EntityKind::Teachers, RemoteError::Network("reset".into()))
            .await;

        let result = h.scheduler.run_once(None).await.unwrap();

        assert_eq!(result.status, PassStatus::PartialFailure);
        assert_eq!(h.remote.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_retried_when_enabled() {
        let h = harness(true, RetryPolicy::linear(Duration::from_secs(5), 3), true);
        h.remote
            .fail_collection(EntityKind::Teachers, RemoteError::Network("reset".into()))
            .await;

        let result = h.scheduler.run_once(None).await.unwrap();

        assert_eq!(result.status, PassStatus::PartialFailure);
        assert_eq!(h.remote.fetch_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_keeps_existing_registration() {
        let h = harness(true, RetryPolicy::default(), false);
        let hour = Duration::from_secs(3600);

        assert_eq!(
            h.scheduler.run_periodic(hour, SyncConstraints::default()).await,
            Registration::Registered
        );
        assert_eq!(
            h.scheduler.run_periodic(hour * 2, SyncConstraints::default()).await,
            Registration::KeptExisting
        );
        assert!(h.scheduler.is_registered().await);

        h.scheduler.cancel_all().await;
        assert!(!h.scheduler.is_registered().await);

        assert_eq!(
            h.scheduler.run_periodic(hour, SyncConstraints::default()).await,
            Registration::Registered
        );
        h.scheduler.cancel_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_runs_every_interval() {
        let h = harness(true, RetryPolicy::default(), false);
        let hour = Duration::from_secs(3600);

        h.scheduler.run_periodic(hour, SyncConstraints::default()).await;
        tokio::time::sleep(hour * 2 + hour / 2).await;
        h.scheduler.cancel_all().await;

        assert_eq!(h.remote.fetch_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_deferred_while_offline() {
        let h = harness(false, RetryPolicy::default(), false);
        let hour = Duration::from_secs(3600);

        h.scheduler.run_periodic(hour, SyncConstraints::default()).await;
        tokio::time::sleep(hour * 3).await;

        assert_eq!(h.remote.fetch_count(), 0);
        assert!(h.scheduler.orchestrator().last_result().await.is_none());
        h.scheduler.cancel_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_tick_runs_when_network_returns() {
        let h = harness(false, RetryPolicy::default(), false);
        let minute = Duration::from_secs(60);

        h.scheduler.run_periodic(minute * 60, SyncConstraints::default()).await;
        tokio::time::sleep(minute).await;
        assert_eq!(h.remote.fetch_count(), 0);

        h.probe.set_online(true);
        tokio::time::sleep(minute).await;
        assert_eq!(h.remote.fetch_count(), 1);

        // Next tick counts from the deferred pass, not the missed one.
        tokio::time::sleep(minute * 58 + minute / 2).await;
        assert_eq!(h.remote.fetch_count(), 1);
        tokio::time::sleep(minute * 2).await;
        assert_eq!(h.remote.fetch_count(), 2);

        h.scheduler.cancel_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_interrupts_one_shot() {
        let h = harness(true, RetryPolicy::default(), false);
        h.remote
            .delay_collection(EntityKind::Teachers, Duration::from_secs(600))
            .await;

        let scheduler = Arc::clone(&h.scheduler);
        let pass = tokio::spawn(async move { scheduler.run_once(None).await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        h.scheduler.cancel_all().await;

        assert!(pass.await.unwrap().is_none());

        let result = h.scheduler.run_once(None).await;
        assert!(result.is_some());
    }
}
