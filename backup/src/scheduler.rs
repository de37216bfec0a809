//! # Backup Scheduler
//!
//! Bounded signal queue drained by a single worker task.
//!
//! The worker is the only actor that exports, writes backups or reconciles,
//! so at most one cycle is ever in flight. Signals carry no payload; a burst
//! of them collapses into one cycle:
//!
//! - `Idle`: waiting on the queue
//! - `Coalescing`: a signal arrived while more were queued; sleep for the
//!   coalescing window, then look again
//! - `Exporting`: a signal arrived and the queue was empty; run one cycle
//!
//! Shutdown cancels the worker between cycles, reclaims the queue and runs
//! one flush cycle when anything was still pending.

use crate::cycle::{BackupCycle, CycleReport};
use crate::listener::ChangeListener;
use config::BackupConfig;
use doc_core::HostLifecycle;
use errors::BackupError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// "A configuration save happened." Interchangeable and countable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SchedulerState {
    Idle,
    Coalescing,
    Exporting,
    Stopped,
}

/// Scheduler counters, shared between the worker and the producer handles.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    signals_accepted: Arc<AtomicU64>,
    coalescing_rounds: Arc<AtomicU64>,
    cycles_completed: Arc<AtomicU64>,
    cycles_failed: Arc<AtomicU64>,
}

impl SchedulerStats {
    pub(crate) fn record_signal(&self) {
        self.signals_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_coalescing_round(&self) {
        self.coalescing_rounds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cycle(&self, result: &Result<CycleReport, BackupError>) {
        match result {
            Ok(_) => self.cycles_completed.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.cycles_failed.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn signals_accepted(&self) -> u64 {
        self.signals_accepted.load(Ordering::Relaxed)
    }

    pub fn coalescing_rounds(&self) -> u64 {
        self.coalescing_rounds.load(Ordering::Relaxed)
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Relaxed)
    }

    pub fn cycles_failed(&self) -> u64 {
        self.cycles_failed.load(Ordering::Relaxed)
    }
}

/// What happened during shutdown.
#[derive(Debug)]
pub struct ShutdownReport {
    /// Signals still queued when the worker stopped.
    pub pending: usize,
    /// The flush cycle, when one was needed.
    pub flush: Option<Result<CycleReport, BackupError>>,
}

impl ShutdownReport {
    pub fn flushed(&self) -> bool {
        matches!(self.flush, Some(Ok(_)))
    }
}

/// Producer side of the signal queue.
///
/// Cloneable and cheap; hand one to every thread or task that observes
/// configuration saves. A handle of a disabled scheduler accepts every
/// signal and enqueues nothing.
#[derive(Debug, Clone)]
pub struct BackupHandle {
    enabled: bool,
    sender: mpsc::Sender<BackupSignal>,
    stats: SchedulerStats,
}

impl BackupHandle {
    /// Enqueue a signal, waiting for space when the queue is full.
    ///
    /// Fails only once the scheduler has shut down.
    pub async fn signal(&self) -> Result<(), BackupError> {
        if !self.enabled {
            return Ok(());
        }
        self.sender
            .send(BackupSignal)
            .await
            .map_err(|_| BackupError::Stopped)?;
        self.stats.record_signal();
        Ok(())
    }

    /// Blocking variant of [`signal`](Self::signal) for host threads outside
    /// the async runtime. Panics when called from within the runtime.
    pub fn blocking_signal(&self) -> Result<(), BackupError> {
        if !self.enabled {
            return Ok(());
        }
        self.sender
            .blocking_send(BackupSignal)
            .map_err(|_| BackupError::Stopped)?;
        self.stats.record_signal();
        Ok(())
    }

    /// Signals currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

/// Change-coalescing backup scheduler.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Owns the bounded signal queue and the single worker. Constructed once at
/// host startup with its collaborators injected; started and stopped
/// explicitly by the host's startup and shutdown sequence.
///
/// ## Usage
/// ```rust,no_run
/// use backup::{BackupCycle, BackupScheduler, SaveKind};
/// use std::sync::Arc;
///
/// # async fn run(config: config::BackupConfig, cycle: BackupCycle) -> Result<(), errors::BackupError> {
/// let mut scheduler = BackupScheduler::new(&config, cycle, Arc::new(doc_core::AlwaysReady));
/// let listener = scheduler.listener();
/// scheduler.start()?;
///
/// listener.on_change(SaveKind::GlobalConfiguration).await;
///
/// let report = scheduler.shutdown().await;
/// println!("flushed on shutdown: {}", report.flushed());
/// # Ok(())
/// # }
/// ```
///
/// ## Guarantees
/// - At most one cycle in flight
/// - A cycle never starts while more signals are already queued
/// - A full queue blocks producers; signals are never dropped
/// - A failed cycle is logged and counted; the worker keeps running
/// - A started cycle always completes before the worker stops
pub struct BackupScheduler {
    enabled: bool,
    debounce: Duration,
    cycle: Arc<BackupCycle>,
    lifecycle: Arc<dyn HostLifecycle>,
    sender: mpsc::Sender<BackupSignal>,
    receiver: Option<mpsc::Receiver<BackupSignal>>,
    worker: Option<JoinHandle<mpsc::Receiver<BackupSignal>>>,
    cancel: CancellationToken,
    state: Arc<watch::Sender<SchedulerState>>,
    stats: SchedulerStats,
}

impl BackupScheduler {
    pub fn new(config: &BackupConfig, cycle: BackupCycle, lifecycle: Arc<dyn HostLifecycle>) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (state, _) = watch::channel(SchedulerState::Idle);

        tracing::info!(
            "Automatic configuration backup is {}",
            if config.enabled { "enabled" } else { "disabled" }
        );

        Self {
            enabled: config.enabled,
            debounce: config.debounce(),
            cycle: Arc::new(cycle),
            lifecycle,
            sender,
            receiver: Some(receiver),
            worker: None,
            cancel: CancellationToken::new(),
            state: Arc::new(state),
            stats: SchedulerStats::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn handle(&self) -> BackupHandle {
        BackupHandle {
            enabled: self.enabled,
            sender: self.sender.clone(),
            stats: self.stats.clone(),
        }
    }

    /// Gated entry point for host change notifications.
    pub fn listener(&self) -> ChangeListener {
        ChangeListener::new(self.enabled, self.lifecycle.clone(), self.handle())
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Spawn the worker on the current runtime.
    pub fn start(&mut self) -> Result<(), BackupError> {
        if !self.enabled {
            return Err(BackupError::Disabled);
        }
        let Some(receiver) = self.receiver.take() else {
            return Err(BackupError::AlreadyStarted);
        };

        let worker = Worker {
            debounce: self.debounce,
            cycle: self.cycle.clone(),
            lifecycle: self.lifecycle.clone(),
            cancel: self.cancel.clone(),
            state: self.state.clone(),
            stats: self.stats.clone(),
        };
        self.worker = Some(tokio::spawn(worker.run(receiver)));
        Ok(())
    }

    /// Stop the worker and flush pending work.
    ///
    /// Waits for an in-flight cycle to finish, then runs one cycle directly,
    /// skipping the coalescing window, when signals were still queued. A
    /// disabled scheduler never flushes.
    /// Producers blocked on a full queue are released with
    /// `BackupError::Stopped`.
    pub async fn shutdown(mut self) -> ShutdownReport {
        tracing::info!("Shutting down backup scheduler");
        self.cancel.cancel();

        let receiver = match self.worker.take() {
            Some(worker) => match worker.await {
                Ok(receiver) => Some(receiver),
                Err(e) => {
                    tracing::error!("Backup worker ended abnormally: {}", e);
                    None
                }
            },
            None => self.receiver.take(),
        };

        let mut pending = 0;
        if let Some(mut receiver) = receiver {
            receiver.close();
            while receiver.try_recv().is_ok() {
                pending += 1;
            }
        }

        let flush = if pending > 0 && self.enabled {
            tracing::info!(
                "Flushing {} pending backup signals before shutdown",
                pending
            );
            self.state.send_replace(SchedulerState::Exporting);
            let result = self.cycle.run().await;
            self.stats.record_cycle(&result);
            if let Err(e) = &result {
                tracing::warn!("Backup flush on shutdown failed: {}", e);
            }
            Some(result)
        } else {
            None
        };

        self.state.send_replace(SchedulerState::Stopped);
        ShutdownReport { pending, flush }
    }
}

impl Drop for BackupScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Worker {
    debounce: Duration,
    cycle: Arc<BackupCycle>,
    lifecycle: Arc<dyn HostLifecycle>,
    cancel: CancellationToken,
    state: Arc<watch::Sender<SchedulerState>>,
    stats: SchedulerStats,
}

impl Worker {
    /// Drain the queue until cancelled or the host terminates; hands the
    /// receiver back so shutdown can flush what is left.
    async fn run(self, mut receiver: mpsc::Receiver<BackupSignal>) -> mpsc::Receiver<BackupSignal> {
        tracing::info!("Backup worker started");

        loop {
            if self.cancel.is_cancelled() || self.lifecycle.is_terminating() {
                break;
            }

            self.state.send_replace(SchedulerState::Idle);
            let signal = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                signal = receiver.recv() => signal,
            };
            if signal.is_none() {
                break;
            }

            if !receiver.is_empty() {
                self.stats.record_coalescing_round();
                self.state.send_replace(SchedulerState::Coalescing);
                tracing::debug!(
                    "{} more saves queued, waiting {:?} before backup",
                    receiver.len(),
                    self.debounce
                );
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.debounce) => {}
                }
                continue;
            }

            self.state.send_replace(SchedulerState::Exporting);
            let result = self.cycle.run().await;
            self.stats.record_cycle(&result);
            if let Err(e) = result {
                tracing::warn!("Configuration backup aborted: {}", e);
            }
        }

        self.state.send_replace(SchedulerState::Stopped);
        tracing::info!("Backup worker stopped");
        receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::BackupLayout;
    use crate::listener::SaveKind;
    use doc_core::DocumentStore;
    use merge::DeepMerge;
    use reconcile::Reconciler;
    use std::path::Path;
    use storage::InMemoryDocumentStore;
    use testing::{ManualLifecycle, RecordingDefaultProducer, SYSTEM_DOCUMENT, ScriptedExporter};

    const TARGET: &str = "/home/casc_config_auto/jenkins.yaml";

    struct Fixture {
        store: InMemoryDocumentStore,
        exporter: Arc<ScriptedExporter>,
        lifecycle: Arc<ManualLifecycle>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_exporter(ScriptedExporter::new(SYSTEM_DOCUMENT))
        }

        fn with_exporter(exporter: ScriptedExporter) -> Self {
            testing::init_tracing();
            Self {
                store: InMemoryDocumentStore::new(),
                exporter: Arc::new(exporter),
                lifecycle: Arc::new(ManualLifecycle::new(true)),
            }
        }

        fn cycle(&self) -> BackupCycle {
            let store: Arc<dyn DocumentStore> = Arc::new(self.store.clone());
            let reconciler = Reconciler::new(
                store.clone(),
                Arc::new(RecordingDefaultProducer::new(store, "jenkins: {}\n")),
                Arc::new(DeepMerge),
            );
            BackupCycle::new(
                self.exporter.clone(),
                reconciler,
                BackupLayout::Single {
                    path: "/home/jenkins.backup.yaml".into(),
                },
                "/home/jenkins.yaml",
                TARGET,
            )
        }

        fn scheduler(&self, debounce_ms: u64, queue_capacity: usize) -> BackupScheduler {
            let config = BackupConfig {
                enabled: true,
                debounce_ms,
                queue_capacity,
                ..Default::default()
            };
            BackupScheduler::new(&config, self.cycle(), self.lifecycle.clone())
        }

        async fn target(&self) -> Option<String> {
            self.store.text(Path::new(TARGET)).await
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_burst_coalesces_into_one_cycle() {
        let f = Fixture::new();
        let mut scheduler = f.scheduler(10, 200);
        let handle = scheduler.handle();

        for _ in 0..5 {
            handle.signal().await.unwrap();
        }
        scheduler.start().unwrap();

        let stats = scheduler.stats().clone();
        wait_until(|| stats.cycles_completed() == 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(f.exporter.calls(), 1);
        assert_eq!(stats.signals_accepted(), 5);
        assert_eq!(stats.coalescing_rounds(), 4);
        assert_eq!(
            f.store.text(Path::new(TARGET)).await.as_deref(),
            Some(SYSTEM_DOCUMENT)
        );
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_burst_on_running_worker_coalesces() {
        let f = Fixture::new();
        let mut scheduler = f.scheduler(10, 200);
        scheduler.start().unwrap();
        let handle = scheduler.handle();

        for _ in 0..8 {
            handle.signal().await.unwrap();
        }

        let stats = scheduler.stats().clone();
        wait_until(|| stats.cycles_completed() == 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(f.exporter.calls(), 1);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_queue_blocks_producer() {
        let f = Fixture::new();
        let mut scheduler = f.scheduler(1, 1);
        let handle = scheduler.handle();

        handle.signal().await.unwrap();
        assert_eq!(handle.queued(), 1);

        let blocked = tokio::time::timeout(Duration::from_millis(50), handle.signal()).await;
        assert!(blocked.is_err(), "enqueue on a full queue must wait");
        assert_eq!(scheduler.stats().signals_accepted(), 1);

        scheduler.start().unwrap();
        let unblocked = tokio::time::timeout(Duration::from_secs(5), handle.signal()).await;
        assert!(matches!(unblocked, Ok(Ok(()))));

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending_signals_once() {
        let f = Fixture::new();
        let mut scheduler = f.scheduler(60_000, 200);
        scheduler.start().unwrap();
        let handle = scheduler.handle();

        for _ in 0..3 {
            handle.signal().await.unwrap();
        }
        tokio::task::yield_now().await;

        let report = scheduler.shutdown().await;

        assert!(report.pending > 0);
        assert!(report.flushed());
        assert_eq!(f.exporter.calls(), 1);
        assert!(f.store.exists(Path::new(TARGET)).await.unwrap());
    }

    #[tokio::test]
    async fn test_shutdown_before_start_flushes_queue() {
        let f = Fixture::new();
        let scheduler = f.scheduler(500, 200);
        scheduler.handle().signal().await.unwrap();

        let report = scheduler.shutdown().await;

        assert_eq!(report.pending, 1);
        assert!(report.flushed());
        assert_eq!(f.exporter.calls(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_without_pending_work_skips_flush() {
        let f = Fixture::new();
        let mut scheduler = f.scheduler(500, 200);
        scheduler.start().unwrap();
        let mut state = scheduler.subscribe();

        let report = scheduler.shutdown().await;

        assert_eq!(report.pending, 0);
        assert!(report.flush.is_none());
        assert_eq!(f.exporter.calls(), 0);
        assert_eq!(*state.borrow_and_update(), SchedulerState::Stopped);
    }

    #[tokio::test]
    async fn test_signal_after_shutdown_is_rejected() {
        let f = Fixture::new();
        let scheduler = f.scheduler(500, 200);
        let handle = scheduler.handle();

        scheduler.shutdown().await;

        assert!(matches!(handle.signal().await, Err(BackupError::Stopped)));
    }

    #[tokio::test]
    async fn test_failed_cycle_keeps_worker_alive() {
        let f = Fixture::new();
        f.exporter.fail_next("export unavailable");
        let mut scheduler = f.scheduler(1, 200);
        scheduler.start().unwrap();
        let handle = scheduler.handle();
        let stats = scheduler.stats().clone();

        handle.signal().await.unwrap();
        wait_until(|| stats.cycles_failed() == 1).await;
        assert!(!f.store.exists(Path::new(TARGET)).await.unwrap());

        handle.signal().await.unwrap();
        wait_until(|| stats.cycles_completed() == 1).await;

        assert_eq!(f.exporter.calls(), 2);
        assert!(f.store.exists(Path::new(TARGET)).await.unwrap());
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let f = Fixture::new();
        let mut scheduler = f.scheduler(500, 200);

        scheduler.start().unwrap();
        assert!(matches!(scheduler.start(), Err(BackupError::AlreadyStarted)));
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_disabled_scheduler_does_not_start() {
        let f = Fixture::new();
        let config = BackupConfig::default();
        let mut scheduler = BackupScheduler::new(&config, f.cycle(), f.lifecycle.clone());

        assert!(!scheduler.is_enabled());
        assert!(matches!(scheduler.start(), Err(BackupError::Disabled)));
        assert!(!scheduler.listener().on_change(SaveKind::GlobalConfiguration).await);
    }

    #[tokio::test]
    async fn test_disabled_handle_never_enqueues() {
        let f = Fixture::new();
        let config = BackupConfig {
            queue_capacity: 2,
            ..Default::default()
        };
        let scheduler = BackupScheduler::new(&config, f.cycle(), f.lifecycle.clone());
        let handle = scheduler.handle();

        for _ in 0..5 {
            let sent = tokio::time::timeout(Duration::from_millis(200), handle.signal()).await;
            assert!(matches!(sent, Ok(Ok(()))), "disabled producers must not wait");
        }
        assert_eq!(handle.queued(), 0);
        assert_eq!(scheduler.stats().signals_accepted(), 0);

        let report = scheduler.shutdown().await;

        assert_eq!(report.pending, 0);
        assert!(report.flush.is_none());
        assert_eq!(f.exporter.calls(), 0);
        assert_eq!(f.target().await, None);
    }

    #[test]
    fn test_disabled_blocking_signal_returns_immediately() {
        let f = Fixture::new();
        let config = BackupConfig {
            queue_capacity: 1,
            ..Default::default()
        };
        let scheduler = BackupScheduler::new(&config, f.cycle(), f.lifecycle.clone());
        let handle = scheduler.handle();

        std::thread::spawn(move || {
            for _ in 0..3 {
                handle.blocking_signal().unwrap();
            }
        })
        .join()
        .unwrap();

        assert_eq!(scheduler.handle().queued(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_cycle_in_flight() {
        let f = Fixture::with_exporter(
            ScriptedExporter::new(SYSTEM_DOCUMENT).with_delay(Duration::from_millis(200)),
        );
        let mut scheduler = f.scheduler(1, 200);
        let mut state = scheduler.subscribe();
        scheduler.start().unwrap();

        scheduler.handle().signal().await.unwrap();
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == SchedulerState::Exporting),
        )
        .await
        .unwrap()
        .unwrap();
        let stats = scheduler.stats().clone();

        let report = scheduler.shutdown().await;

        assert_eq!(stats.cycles_completed(), 1);
        assert_eq!(report.pending, 0);
        assert!(report.flush.is_none());
        assert_eq!(f.exporter.calls(), 1);
        assert_eq!(f.target().await.as_deref(), Some(SYSTEM_DOCUMENT));
    }

    #[tokio::test]
    async fn test_each_cycle_uses_latest_export() {
        let f = Fixture::new();
        let mut scheduler = f.scheduler(1, 200);
        scheduler.start().unwrap();
        let handle = scheduler.handle();
        let stats = scheduler.stats().clone();

        handle.signal().await.unwrap();
        wait_until(|| stats.cycles_completed() == 1).await;
        assert_eq!(f.target().await.as_deref(), Some(SYSTEM_DOCUMENT));

        let updated = "jenkins:\n  numExecutors: 8\n";
        f.exporter.set_document(updated);
        handle.signal().await.unwrap();
        wait_until(|| stats.cycles_completed() == 2).await;

        assert_eq!(f.target().await.as_deref(), Some(updated));
        assert_eq!(f.exporter.calls(), 2);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_worker_stops_when_host_terminates() {
        let f = Fixture::new();
        f.lifecycle.begin_terminating();
        let mut scheduler = f.scheduler(500, 200);
        let mut state = scheduler.subscribe();

        scheduler.start().unwrap();

        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == SchedulerState::Stopped),
        )
        .await
        .unwrap()
        .unwrap();
        scheduler.shutdown().await;
    }

    #[test]
    fn test_blocking_signal_from_host_thread() {
        let f = Fixture::new();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let scheduler = f.scheduler(500, 200);
        let handle = scheduler.handle();

        std::thread::spawn(move || handle.blocking_signal())
            .join()
            .unwrap()
            .unwrap();

        let report = runtime.block_on(scheduler.shutdown());
        assert_eq!(report.pending, 1);
        assert_eq!(f.exporter.calls(), 1);
    }
}
