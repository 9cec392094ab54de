// File: src/cleanup/orchestrator.rs
//
// Idle --(inactive)--> RunningCycle --(active)--> Idle
//
// While RunningCycle, a first pass runs FIRST_PASS_DELAY after the inactive
// event and then one pass per refresh interval. A pass in flight always runs
// to its last step before the loop looks at activity again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use roomkeep_common::models::{CleanupReport, Config};

use crate::activity::{ActivityTracker, ActivityTransition};
use crate::cleanup::guard::SessionGuard;
use crate::cleanup::pipeline::CleanupPipeline;
use crate::config::ConfigStore;
use crate::eventbus::{wait_for_shutdown, EventBus, LifecycleEvent};
use crate::snapshot::RoomStateSnapshot;
use crate::Error;

/// Delay between the inactive event and the first pass of a cycle.
pub const FIRST_PASS_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    RunningCycle,
}

/// Timers of one RunningCycle. Dropping it cancels both.
struct Cycle {
    first_pass_at: Option<Instant>,
    period: Duration,
    ticker: Interval,
    ticker_from: Instant,
}

impl Cycle {
    fn new(period: Duration) -> Self {
        let now = Instant::now();
        Self {
            first_pass_at: Some(now + FIRST_PASS_DELAY),
            period,
            ticker: periodic(now, period),
            ticker_from: now,
        }
    }

    /// Restarts the periodic timer from now. A pending first pass keeps its
    /// deadline.
    fn reschedule(&mut self, period: Duration) {
        let now = Instant::now();
        self.period = period;
        self.ticker = periodic(now, period);
        self.ticker_from = now;
    }

    /// Called once the first pass is due. A periodic tick falling at or
    /// before it is covered by that pass.
    fn first_pass_done(&mut self, at: Instant) {
        self.first_pass_at = None;
        if self.ticker_from + self.period <= at {
            self.ticker.reset();
        }
    }
}

fn periodic(from: Instant, period: Duration) -> Interval {
    let mut ticker = interval_at(from + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn next_tick(cycle: &mut Option<Cycle>) {
    match cycle {
        Some(c) => match c.first_pass_at {
            Some(at) => {
                sleep_until(at).await;
                c.first_pass_done(at);
            }
            None => {
                c.ticker.tick().await;
            }
        },
        None => std::future::pending::<()>().await,
    }
}

pub struct CleanupOrchestrator {
    tracker: Arc<ActivityTracker>,
    config: Arc<ConfigStore>,
    snapshot: Mutex<RoomStateSnapshot>,
    pipeline: CleanupPipeline,
    guard: SessionGuard,
    event_bus: Arc<EventBus>,
    state: Mutex<OrchestratorState>,
    pass_lock: tokio::sync::Mutex<()>,
    last_report: Mutex<Option<CleanupReport>>,
    passes: AtomicU64,
}

impl CleanupOrchestrator {
    pub fn new(
        tracker: Arc<ActivityTracker>,
        config: Arc<ConfigStore>,
        snapshot: RoomStateSnapshot,
        pipeline: CleanupPipeline,
        guard: SessionGuard,
        event_bus: Arc<EventBus>,
    ) -> Arc<Self> {
        Arc::new(Self {
            tracker,
            config,
            snapshot: Mutex::new(snapshot),
            pipeline,
            guard,
            event_bus,
            state: Mutex::new(OrchestratorState::Idle),
            pass_lock: tokio::sync::Mutex::new(()),
            last_report: Mutex::new(None),
            passes: AtomicU64::new(0),
        })
    }

    /// Spawns the state machine. It consumes the tracker's transitions and
    /// the config watch until shutdown.
    pub fn spawn(
        self: &Arc<Self>,
        transitions: mpsc::UnboundedReceiver<ActivityTransition>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let me = self.clone();
        let config_rx = self.config.subscribe();
        tokio::spawn(async move {
            me.run(transitions, config_rx, shutdown).await;
        })
    }

    pub fn state(&self) -> OrchestratorState {
        *self.state.lock()
    }

    pub fn last_report(&self) -> Option<CleanupReport> {
        self.last_report.lock().clone()
    }

    /// Number of passes run since start.
    pub fn pass_count(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    pub fn step_names(&self) -> Vec<String> {
        self.pipeline.step_names()
    }

    /// Runs one pass right away, regardless of activity.
    pub async fn run_now(&self) -> Result<CleanupReport, Error> {
        let _pass = self
            .pass_lock
            .try_lock()
            .map_err(|_| Error::CleanupInProgress)?;
        Ok(self.run_pass().await)
    }

    async fn run(
        &self,
        mut transitions: mpsc::UnboundedReceiver<ActivityTransition>,
        mut config_rx: watch::Receiver<Config>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut cycle: Option<Cycle> = None;

        // The user may already be inactive if the loop starts late.
        if !self.tracker.is_active() {
            self.begin_cycle(&mut cycle);
        }

        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => {
                    debug!("Cleanup orchestrator stopping");
                    break;
                }
                transition = transitions.recv() => match transition {
                    Some(ActivityTransition::Inactive) => self.begin_cycle(&mut cycle),
                    Some(ActivityTransition::Active) => self.end_cycle(&mut cycle),
                    None => {
                        warn!("Activity tracker gone; cleanup orchestrator stopping");
                        break;
                    }
                },
                changed = config_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let cfg = *config_rx.borrow_and_update();
                    self.apply_config(cfg, &mut cycle);
                }
                _ = next_tick(&mut cycle) => self.on_tick().await,
            }
        }

        self.end_cycle(&mut cycle);
    }

    fn begin_cycle(&self, cycle: &mut Option<Cycle>) {
        let cfg = self.config.current();
        if !cfg.enabled {
            debug!("User inactive but cleanup is disabled");
            return;
        }
        if cycle.is_some() {
            return;
        }
        *cycle = Some(Cycle::new(cfg.refresh_interval()));
        *self.state.lock() = OrchestratorState::RunningCycle;
        info!(
            "Cleanup cycle started; first pass in {}ms, then every {}ms",
            FIRST_PASS_DELAY.as_millis(),
            cfg.refresh_interval_ms
        );
    }

    fn end_cycle(&self, cycle: &mut Option<Cycle>) {
        if cycle.take().is_some() {
            *self.state.lock() = OrchestratorState::Idle;
            info!("Cleanup cycle stopped");
        }
    }

    fn apply_config(&self, cfg: Config, cycle: &mut Option<Cycle>) {
        if !cfg.enabled {
            self.end_cycle(cycle);
            return;
        }
        match cycle {
            Some(c) if c.period != cfg.refresh_interval() => {
                debug!("Refresh interval changed to {}ms; restarting timer", cfg.refresh_interval_ms);
                c.reschedule(cfg.refresh_interval());
            }
            Some(_) => {}
            None if !self.tracker.is_active() => self.begin_cycle(cycle),
            None => {}
        }
    }

    async fn on_tick(&self) {
        // Activity may have resumed after this tick was scheduled; the
        // `active` transition will cancel the cycle itself.
        if self.tracker.is_active() {
            debug!("User active; skipping cleanup tick");
            return;
        }
        let Ok(_pass) = self.pass_lock.try_lock() else {
            warn!("Cleanup pass already running; skipping tick");
            return;
        };
        self.run_pass().await;
    }

    /// One full pass. Never fails: step errors end up in the report.
    async fn run_pass(&self) -> CleanupReport {
        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        let started_at = Utc::now();
        let cfg = self.config.current();

        self.event_bus.try_publish(LifecycleEvent::RefreshStarted);
        info!("Cleanup pass #{} started", pass);

        let (open_room, captured) = {
            let mut snapshot = self.snapshot.lock();
            let open_room = snapshot.open_room();
            let captured = match (&open_room, cfg.preserve_current_room) {
                (Some(room), true) => snapshot.capture(room),
                _ => None,
            };
            (open_room, captured)
        };
        if let Some(snap) = &captured {
            self.event_bus
                .try_publish(LifecycleEvent::PreserveRoom(snap.clone()));
        }

        // The open room's live instance is protected whether or not its
        // view state is being preserved.
        let guard = self.guard.protecting_room(open_room.clone());
        let steps = self.pipeline.run(&guard).await;

        let restored = match &captured {
            Some(snap) => {
                let applied = self.snapshot.lock().restore(snap);
                if applied {
                    self.event_bus
                        .try_publish(LifecycleEvent::RestoreRoom(snap.clone()));
                }
                applied
            }
            None => {
                self.snapshot.lock().discard();
                false
            }
        };

        self.event_bus.try_publish(LifecycleEvent::RefreshCompleted);

        let report = CleanupReport {
            started_at,
            finished_at: Utc::now(),
            preserved_room: captured.map(|s| s.room_id),
            restored,
            steps,
        };
        let failed = report.failed_steps().count();
        if failed > 0 {
            warn!("Cleanup pass #{} completed with {} failed step(s)", pass, failed);
        } else {
            info!("Cleanup pass #{} completed", pass);
        }
        *self.last_report.lock() = Some(report.clone());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivitySignal;
    use crate::cleanup::step::{CleanupStep, StepKind};
    use crate::test_utils::helpers::{InMemoryViewStore, SwitchableRoom};
    use async_trait::async_trait;
    use roomkeep_common::models::{ConfigPatch, ViewState};
    use tokio::time::sleep;

    /// Counts runs and remembers which room each run was told to protect.
    struct ProbeStep {
        runs: AtomicU64,
        protected: Mutex<Vec<Option<String>>>,
        delay: Duration,
        switch_room: Option<Arc<SwitchableRoom>>,
    }

    impl ProbeStep {
        fn new() -> Self {
            Self { runs: AtomicU64::new(0), protected: Mutex::new(Vec::new()), delay: Duration::ZERO, switch_room: None }
        }

        fn runs(&self) -> u64 {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CleanupStep for ProbeStep {
        fn kind(&self) -> StepKind {
            StepKind::StaleHandles
        }

        async fn run(&self, guard: &SessionGuard) -> Result<String, Error> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.protected.lock().push(guard.protected_room().map(str::to_string));
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            if let Some(room) = &self.switch_room {
                room.open(Some("random"));
            }
            Ok("probed".into())
        }
    }

    struct Fixture {
        orchestrator: Arc<CleanupOrchestrator>,
        tracker: Arc<ActivityTracker>,
        config: Arc<ConfigStore>,
        bus: Arc<EventBus>,
        views: Arc<InMemoryViewStore>,
        probe: Arc<ProbeStep>,
    }

    fn fixture(cfg: Config, room: Arc<SwitchableRoom>, probe: ProbeStep) -> Fixture {
        let bus = Arc::new(EventBus::new());
        let config = Arc::new(ConfigStore::new(cfg).unwrap());
        let views = Arc::new(InMemoryViewStore::default());
        views.put("GENERAL", ViewState { scroll: 240.0, last_time: None, at_bottom: false });

        let (tracker, transitions, _timer) = ActivityTracker::start(cfg.inactive_time(), bus.shutdown_signal());
        let probe = Arc::new(probe);
        let mut pipeline = CleanupPipeline::new();
        pipeline.register(probe.clone()).unwrap();

        let orchestrator = CleanupOrchestrator::new(
            tracker.clone(),
            config.clone(),
            RoomStateSnapshot::new(room, views.clone()),
            pipeline,
            SessionGuard::default(),
            bus.clone(),
        );
        orchestrator.spawn(transitions, bus.shutdown_signal());
        Fixture { orchestrator, tracker, config, bus, views, probe }
    }

    fn fast_config() -> Config {
        Config { inactive_time_ms: 1000, refresh_interval_ms: 2000, ..Config::default() }
    }

    fn general() -> Arc<SwitchableRoom> {
        Arc::new(SwitchableRoom::new(Some("GENERAL")))
    }

    fn drain(rx: &mut mpsc::Receiver<LifecycleEvent>) -> Vec<&'static str> {
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event.event_type());
        }
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn first_pass_after_delay_then_every_interval() {
        let fx = fixture(fast_config(), general(), ProbeStep::new());

        sleep(Duration::from_millis(1500)).await;
        assert_eq!(fx.orchestrator.state(), OrchestratorState::RunningCycle);
        assert_eq!(fx.probe.runs(), 0);

        // inactive at 1000ms, first pass at 2000ms, ticks at 3000ms and 5000ms
        sleep(Duration::from_millis(600)).await;
        assert_eq!(fx.probe.runs(), 1);
        sleep(Duration::from_millis(1000)).await;
        assert_eq!(fx.probe.runs(), 2);
        sleep(Duration::from_millis(1800)).await;
        assert_eq!(fx.probe.runs(), 2);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(fx.probe.runs(), 3);
        assert_eq!(fx.orchestrator.pass_count(), 3);

        fx.bus.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn activity_cancels_pending_cycle() {
        let fx = fixture(fast_config(), general(), ProbeStep::new());

        sleep(Duration::from_millis(1500)).await;
        assert_eq!(fx.orchestrator.state(), OrchestratorState::RunningCycle);

        fx.tracker.record(ActivitySignal::Pointer);
        sleep(Duration::from_millis(900)).await;

        assert_eq!(fx.orchestrator.state(), OrchestratorState::Idle);
        assert_eq!(fx.probe.runs(), 0);
        fx.bus.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_stops_cycle_and_enabling_restarts_it() {
        let fx = fixture(fast_config(), general(), ProbeStep::new());
        sleep(Duration::from_millis(1500)).await;

        fx.config.update(&ConfigPatch { enabled: Some(false), ..Default::default() }).unwrap();
        sleep(Duration::from_millis(4000)).await;
        assert_eq!(fx.orchestrator.state(), OrchestratorState::Idle);
        assert_eq!(fx.probe.runs(), 0);

        fx.config.update(&ConfigPatch { enabled: Some(true), ..Default::default() }).unwrap();
        sleep(Duration::from_millis(1100)).await;
        assert_eq!(fx.orchestrator.state(), OrchestratorState::RunningCycle);
        assert_eq!(fx.probe.runs(), 1);
        fx.bus.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn pass_preserves_and_restores_open_room() {
        let fx = fixture(Config::default(), general(), ProbeStep::new());
        let mut events = fx.bus.subscribe(None).await;

        let report = fx.orchestrator.run_now().await.unwrap();

        assert_eq!(
            drain(&mut events),
            vec!["refresh/started", "preserve/room", "restore/room", "refresh/completed"]
        );
        assert_eq!(report.preserved_room.as_deref(), Some("GENERAL"));
        assert!(report.restored);
        assert_eq!(fx.views.writes(), 1);
        assert_eq!(fx.probe.protected.lock().clone(), vec![Some("GENERAL".to_string())]);
        assert_eq!(fx.orchestrator.last_report(), Some(report));
        fx.bus.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn restore_skipped_when_room_changed_mid_pass() {
        let room = general();
        let probe = ProbeStep { switch_room: Some(room.clone()), ..ProbeStep::new() };
        let fx = fixture(Config::default(), room, probe);
        let mut events = fx.bus.subscribe(None).await;

        let report = fx.orchestrator.run_now().await.unwrap();

        assert_eq!(drain(&mut events), vec!["refresh/started", "preserve/room", "refresh/completed"]);
        assert!(!report.restored);
        assert_eq!(fx.views.writes(), 0);
        fx.bus.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn open_room_is_protected_even_without_preservation() {
        let cfg = Config { preserve_current_room: false, ..Config::default() };
        let fx = fixture(cfg, general(), ProbeStep::new());
        let mut events = fx.bus.subscribe(None).await;

        let report = fx.orchestrator.run_now().await.unwrap();

        assert_eq!(drain(&mut events), vec!["refresh/started", "refresh/completed"]);
        assert_eq!(report.preserved_room, None);
        assert_eq!(fx.probe.protected.lock().clone(), vec![Some("GENERAL".to_string())]);
        fx.bus.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn manual_run_refuses_reentry() {
        let probe = ProbeStep { delay: Duration::from_secs(10), ..ProbeStep::new() };
        let fx = fixture(Config::default(), general(), probe);

        let first = {
            let orchestrator = fx.orchestrator.clone();
            tokio::spawn(async move { orchestrator.run_now().await })
        };
        sleep(Duration::from_millis(10)).await;

        assert!(matches!(fx.orchestrator.run_now().await, Err(Error::CleanupInProgress)));
        assert!(first.await.unwrap().is_ok());
        assert_eq!(fx.probe.runs(), 1);
        fx.bus.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn interval_change_restarts_periodic_timer() {
        let fx = fixture(fast_config(), general(), ProbeStep::new());

        // inactive at 1000ms, first pass at 2000ms, next tick due at 3000ms
        sleep(Duration::from_millis(2500)).await;
        assert_eq!(fx.probe.runs(), 1);

        fx.config.update(&ConfigPatch { refresh_interval_ms: Some(4000), ..Default::default() }).unwrap();
        sleep(Duration::from_millis(3900)).await;
        assert_eq!(fx.probe.runs(), 1, "old 3000ms/5000ms ticks are gone");
        sleep(Duration::from_millis(200)).await;
        assert_eq!(fx.probe.runs(), 2, "restarted timer fires at 6500ms");
        fx.bus.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn interval_change_keeps_pending_first_pass() {
        let fx = fixture(fast_config(), general(), ProbeStep::new());

        sleep(Duration::from_millis(1500)).await;
        assert_eq!(fx.orchestrator.state(), OrchestratorState::RunningCycle);
        fx.config.update(&ConfigPatch { refresh_interval_ms: Some(4000), ..Default::default() }).unwrap();

        sleep(Duration::from_millis(600)).await;
        assert_eq!(fx.probe.runs(), 1, "first pass still runs at 2000ms");
        sleep(Duration::from_millis(3300)).await;
        assert_eq!(fx.probe.runs(), 1);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(fx.probe.runs(), 2, "periodic pass at 5500ms");
        fx.bus.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn short_interval_does_not_double_the_first_pass() {
        let cfg = Config { inactive_time_ms: 1000, refresh_interval_ms: 500, ..Config::default() };
        let fx = fixture(cfg, general(), ProbeStep::new());

        // inactive at 1000ms, first pass at 2000ms, then 2500ms and 3000ms
        sleep(Duration::from_millis(2100)).await;
        assert_eq!(fx.probe.runs(), 1);
        sleep(Duration::from_millis(300)).await;
        assert_eq!(fx.probe.runs(), 1);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(fx.probe.runs(), 2);
        sleep(Duration::from_millis(500)).await;
        assert_eq!(fx.probe.runs(), 3);
        fx.bus.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_subscriber_does_not_block_passes() {
        let fx = fixture(fast_config(), general(), ProbeStep::new());
        let _stalled = fx.bus.subscribe(Some(1)).await;
        let mut events = fx.bus.subscribe(None).await;

        sleep(Duration::from_millis(2500)).await;
        assert_eq!(fx.probe.runs(), 1);
        assert!(fx.orchestrator.last_report().is_some());
        assert_eq!(
            drain(&mut events),
            vec!["refresh/started", "preserve/room", "restore/room", "refresh/completed"]
        );

        fx.tracker.record(ActivitySignal::Key);
        sleep(Duration::from_millis(10)).await;
        assert_eq!(fx.orchestrator.state(), OrchestratorState::Idle);

        let report = tokio::time::timeout(Duration::from_secs(5), fx.orchestrator.run_now())
            .await
            .expect("manual pass should not hang");
        assert!(report.is_ok());
        assert_eq!(fx.probe.runs(), 2);
        fx.bus.shutdown();
    }
}
