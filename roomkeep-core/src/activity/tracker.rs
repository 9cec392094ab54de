// File: roomkeep-core/src/activity/tracker.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::eventbus::wait_for_shutdown;

/// How long focus may be lost before the tracker treats the window as unfocused.
pub const FOCUS_LOSS_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    Active,
    Inactive,
}

/// Raw input/visibility signals fed in by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySignal {
    Pointer,
    Key,
    Scroll,
    Touch,
    FocusGained,
    FocusLost,
    Visible,
    Hidden,
}

impl ActivitySignal {
    /// Qualifying signals count as user activity. Losing focus or visibility
    /// does not; it only schedules a deferred focus check.
    pub fn is_qualifying(self) -> bool {
        !matches!(self, ActivitySignal::FocusLost | ActivitySignal::Hidden)
    }
}

/// Emitted on every Active/Inactive flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityTransition {
    Active,
    Inactive,
}

struct TrackerState {
    state: ActivityState,
    last_activity_at: Instant,
    last_activity_wall: DateTime<Utc>,
    threshold: Duration,
    has_focus: bool,
    focus_check_at: Option<Instant>,
}

impl TrackerState {
    /// When the pending activity timer should fire, if one is pending.
    fn deadline(&self) -> Option<Instant> {
        match self.state {
            ActivityState::Active => Some(self.last_activity_at + self.threshold),
            ActivityState::Inactive => None,
        }
    }

    fn next_wake(&self) -> Option<Instant> {
        match (self.deadline(), self.focus_check_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Debounces input signals into a two-state activity flag.
///
/// The state is mutated only by `record` and by the tracker's own timer task;
/// the single pending timer is rescheduled through a `Notify`.
pub struct ActivityTracker {
    state: Arc<Mutex<TrackerState>>,
    reschedule: Arc<Notify>,
    transitions: mpsc::UnboundedSender<ActivityTransition>,
}

impl ActivityTracker {
    /// Starts tracking with the user considered active as of now.
    ///
    /// Returns the tracker, the receiver of its transitions (one listener),
    /// and the timer task handle. The timer runs until `shutdown` flips.
    pub fn start(
        initial_threshold: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ActivityTransition>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let tracker = Arc::new(Self {
            state: Arc::new(Mutex::new(TrackerState {
                state: ActivityState::Active,
                last_activity_at: Instant::now(),
                last_activity_wall: Utc::now(),
                threshold: initial_threshold,
                has_focus: true,
                focus_check_at: None,
            })),
            reschedule: Arc::new(Notify::new()),
            transitions: tx,
        });

        let timer = tracker.clone();
        let handle = tokio::spawn(async move {
            timer.run_timer(shutdown).await;
        });

        info!(
            "Activity tracker started; inactivity threshold = {}ms",
            initial_threshold.as_millis()
        );
        (tracker, rx, handle)
    }

    /// Feed one input/visibility signal.
    pub fn record(&self, signal: ActivitySignal) {
        let now = Instant::now();

        if !signal.is_qualifying() {
            self.state.lock().focus_check_at = Some(now + FOCUS_LOSS_GRACE);
            debug!("{:?}: deferred focus check scheduled", signal);
            self.reschedule.notify_one();
            return;
        }

        let resumed = {
            let mut st = self.state.lock();
            if matches!(signal, ActivitySignal::FocusGained | ActivitySignal::Visible) {
                st.focus_check_at = None;
                st.has_focus = true;
            }
            st.last_activity_at = now;
            st.last_activity_wall = Utc::now();
            let resumed = st.state == ActivityState::Inactive;
            if resumed {
                st.state = ActivityState::Active;
            }
            resumed
        };

        if resumed {
            info!("User became active ({:?})", signal);
            let _ = self.transitions.send(ActivityTransition::Active);
        }
        self.reschedule.notify_one();
    }

    /// Changes the inactivity threshold. The countdown keeps running from the
    /// last recorded activity; only its length changes.
    pub fn update_threshold(&self, threshold: Duration) {
        {
            let mut st = self.state.lock();
            if st.threshold == threshold {
                return;
            }
            st.threshold = threshold;
        }
        debug!("Inactivity threshold updated to {}ms", threshold.as_millis());
        self.reschedule.notify_one();
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().state == ActivityState::Active
    }

    pub fn state(&self) -> ActivityState {
        self.state.lock().state
    }

    pub fn last_activity(&self) -> Instant {
        self.state.lock().last_activity_at
    }

    /// Wall-clock time of the last qualifying signal, for display.
    pub fn last_activity_wall(&self) -> DateTime<Utc> {
        self.state.lock().last_activity_wall
    }

    pub fn threshold(&self) -> Duration {
        self.state.lock().threshold
    }

    /// `false` once focus has been gone for longer than [`FOCUS_LOSS_GRACE`].
    pub fn has_focus(&self) -> bool {
        self.state.lock().has_focus
    }

    async fn run_timer(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let wake_at = self.state.lock().next_wake();
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => {
                    debug!("Activity tracker timer stopping");
                    break;
                }
                _ = self.reschedule.notified() => continue,
                _ = sleep_until_opt(wake_at) => self.on_timer(Instant::now()),
            }
        }
    }

    fn on_timer(&self, now: Instant) {
        let went_inactive = {
            let mut st = self.state.lock();
            if let Some(check_at) = st.focus_check_at {
                if now >= check_at {
                    st.focus_check_at = None;
                    st.has_focus = false;
                    debug!("Focus still lost after grace period");
                }
            }
            match st.deadline() {
                Some(deadline) if now >= deadline => {
                    st.state = ActivityState::Inactive;
                    true
                }
                _ => false,
            }
        };

        if went_inactive {
            info!("User became inactive");
            let _ = self.transitions.send(ActivityTransition::Inactive);
        }
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, sleep};

    fn shutdown_pair() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test(start_paused = true)]
    async fn goes_inactive_once_after_threshold() {
        let (_tx, rx) = shutdown_pair();
        let (tracker, mut transitions, _h) = ActivityTracker::start(Duration::from_millis(1000), rx);

        sleep(Duration::from_millis(999)).await;
        assert!(tracker.is_active());

        sleep(Duration::from_millis(2)).await;
        assert!(!tracker.is_active());
        assert_eq!(transitions.recv().await, Some(ActivityTransition::Inactive));

        sleep(Duration::from_millis(5000)).await;
        assert!(transitions.try_recv().is_err(), "only one inactive event expected");
    }

    #[tokio::test(start_paused = true)]
    async fn activity_after_inactive_emits_active_synchronously() {
        let (_tx, rx) = shutdown_pair();
        let (tracker, mut transitions, _h) = ActivityTracker::start(Duration::from_millis(100), rx);

        sleep(Duration::from_millis(150)).await;
        assert_eq!(transitions.recv().await, Some(ActivityTransition::Inactive));

        tracker.record(ActivitySignal::Key);
        assert!(tracker.is_active());
        assert_eq!(transitions.try_recv().ok(), Some(ActivityTransition::Active));

        tracker.record(ActivitySignal::Pointer);
        assert!(transitions.try_recv().is_err(), "already active, no second event");
    }

    #[tokio::test(start_paused = true)]
    async fn signals_postpone_inactivity() {
        let (_tx, rx) = shutdown_pair();
        let (tracker, _transitions, _h) = ActivityTracker::start(Duration::from_millis(1000), rx);

        for _ in 0..5 {
            sleep(Duration::from_millis(600)).await;
            tracker.record(ActivitySignal::Scroll);
        }
        assert!(tracker.is_active());

        sleep(Duration::from_millis(1001)).await;
        assert!(!tracker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn threshold_update_is_measured_from_last_activity() {
        let (_tx, rx) = shutdown_pair();
        let (tracker, _transitions, _h) = ActivityTracker::start(Duration::from_millis(1000), rx);

        tracker.record(ActivitySignal::Key);
        tracker.update_threshold(Duration::from_millis(3000));

        sleep(Duration::from_millis(2000)).await;
        assert!(tracker.is_active(), "larger threshold delays inactivity");

        // Shortening below the time already elapsed fires right away.
        tracker.update_threshold(Duration::from_millis(1500));
        sleep(Duration::from_millis(1)).await;
        assert!(!tracker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn threshold_update_does_not_restart_countdown() {
        let (_tx, rx) = shutdown_pair();
        let (tracker, _transitions, _h) = ActivityTracker::start(Duration::from_millis(1000), rx);

        sleep(Duration::from_millis(800)).await;
        tracker.update_threshold(Duration::from_millis(1200));

        // 1200ms after the last activity, not 1200ms after the update.
        sleep(Duration::from_millis(401)).await;
        assert!(!tracker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn momentary_focus_loss_is_tolerated() {
        let (_tx, rx) = shutdown_pair();
        let (tracker, _transitions, _h) = ActivityTracker::start(Duration::from_millis(10_000), rx);

        tracker.record(ActivitySignal::FocusLost);
        sleep(Duration::from_millis(500)).await;
        tracker.record(ActivitySignal::FocusGained);
        sleep(Duration::from_millis(1000)).await;
        assert!(tracker.has_focus());
        assert!(tracker.is_active());

        tracker.record(ActivitySignal::Hidden);
        sleep(FOCUS_LOSS_GRACE + Duration::from_millis(10)).await;
        assert!(!tracker.has_focus());
        assert!(tracker.is_active(), "focus loss alone never flips to inactive");
    }

    #[tokio::test(start_paused = true)]
    async fn focus_loss_does_not_count_as_activity() {
        let (_tx, rx) = shutdown_pair();
        let (tracker, _transitions, _h) = ActivityTracker::start(Duration::from_millis(1000), rx);

        let before = tracker.last_activity();
        advance(Duration::from_millis(300)).await;
        tracker.record(ActivitySignal::FocusLost);
        assert_eq!(tracker.last_activity(), before);

        sleep(Duration::from_millis(701)).await;
        assert!(!tracker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_stops_on_shutdown() {
        let (tx, rx) = shutdown_pair();
        let (_tracker, _transitions, handle) = ActivityTracker::start(Duration::from_millis(1000), rx);
        tx.send(true).unwrap();
        handle.await.expect("timer task should exit cleanly");
    }
}
