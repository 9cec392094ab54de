//! src/eventbus/mod.rs
//!
//! Provides an in-process event bus that supports guaranteed delivery
//! of lifecycle events to multiple subscribers via bounded MPSC queues.

use std::sync::Arc;
use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::warn;
use roomkeep_common::models::{Config, RoomSnapshot};

/// Events published by the cleanup orchestrator and the config store.
/// Consumed by logging/telemetry and by UI status displays.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// A cleanup pass is about to run its first step.
    RefreshStarted,

    /// A cleanup pass ran its last step (whether or not every step succeeded).
    RefreshCompleted,

    /// The config snapshot was replaced.
    ConfigChanged(Config),

    /// View state of the open room was captured before cleanup.
    PreserveRoom(RoomSnapshot),

    /// Captured view state was applied back to the open room.
    RestoreRoom(RoomSnapshot),
}

impl LifecycleEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            LifecycleEvent::RefreshStarted => "refresh/started",
            LifecycleEvent::RefreshCompleted => "refresh/completed",
            LifecycleEvent::ConfigChanged(_) => "config/changed",
            LifecycleEvent::PreserveRoom(_) => "preserve/room",
            LifecycleEvent::RestoreRoom(_) => "restore/room",
        }
    }
}

/// Each subscriber gets its own `mpsc::Sender<LifecycleEvent>` for guaranteed delivery.
///
/// - If the subscriber’s channel buffer fills, `publish` will await
///   until there's space (backpressure). `try_publish` drops the event for
///   that subscriber instead.
/// - If the subscriber has dropped the `Receiver`, the sender is pruned on
///   the next publish.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<LifecycleEvent>>>>,
    shutdown_tx: watch::Sender<bool>,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Default size for each subscriber’s buffer.
const DEFAULT_BUFFER_SIZE: usize = 1024;

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a new, empty event bus.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            subscribers: Arc::new(Mutex::new(vec![])),
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// A fresh receiver on the shutdown flag, for background tasks.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Returns a receiver on which events will be delivered.
    pub async fn subscribe(&self, buffer_size: Option<usize>) -> mpsc::Receiver<LifecycleEvent> {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let (tx, rx) = mpsc::channel(size);
        self.subscribers.lock().push(tx);
        rx
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn live_senders(&self) -> Vec<mpsc::Sender<LifecycleEvent>> {
        let mut subs = self.subscribers.lock();
        subs.retain(|s| !s.is_closed());
        subs.clone()
    }

    /// Publish an event to all subscribers.
    pub async fn publish(&self, event: LifecycleEvent) {
        for s in self.live_senders() {
            let _ = s.send(event.clone()).await;
        }
    }

    /// Publish without waiting on slow subscribers. A subscriber whose
    /// buffer is full misses this event. Returns how many received it.
    pub fn try_publish(&self, event: LifecycleEvent) -> usize {
        let mut delivered = 0;
        for s in self.live_senders() {
            match s.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("Event subscriber is full; dropping {}", event.event_type());
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }
}

/// Wait until `rx` reports shutdown (or the bus is gone).
pub async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        let stopped = *rx.borrow();
        if stopped || rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout, Duration};

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();

        let mut rx1 = bus.subscribe(Some(5)).await;
        let mut rx2 = bus.subscribe(Some(5)).await;

        bus.publish(LifecycleEvent::RefreshStarted).await;

        let evt1 = rx1.recv().await.expect("rx1 should get event");
        let evt2 = rx2.recv().await.expect("rx2 should get event");

        assert_eq!(evt1, LifecycleEvent::RefreshStarted);
        assert_eq!(evt2, LifecycleEvent::RefreshStarted);
    }

    #[tokio::test]
    async fn test_backpressure_blocking() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(Some(1)).await; // queue size = 1

        // Publish first message to fill the queue.
        bus.publish(LifecycleEvent::RefreshStarted).await;

        // Spawn a task that reads the two messages after a short delay.
        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            let first = rx.recv().await.expect("expected first message");
            let second = rx.recv().await.expect("expected second message");
            (first, second)
        });

        // Publish the second message (this call will wait until there's space).
        let second_publish = bus.publish(LifecycleEvent::RefreshCompleted);
        let result = timeout(Duration::from_millis(500), second_publish).await;
        assert!(result.is_ok(), "publish should eventually unblock");

        let (evt1, evt2) = handle.await.unwrap();
        assert_eq!(evt1.event_type(), "refresh/started");
        assert_eq!(evt2.event_type(), "refresh/completed");
    }

    #[tokio::test]
    async fn test_dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe(Some(1)).await;
        let mut kept = bus.subscribe(Some(4)).await;
        drop(rx);

        bus.publish(LifecycleEvent::RefreshStarted).await;
        bus.publish(LifecycleEvent::RefreshCompleted).await;

        assert_eq!(bus.subscriber_count().await, 1);
        assert_eq!(kept.recv().await, Some(LifecycleEvent::RefreshStarted));
        assert_eq!(kept.recv().await, Some(LifecycleEvent::RefreshCompleted));
    }

    #[tokio::test]
    async fn test_try_publish_skips_full_subscribers() {
        let bus = EventBus::new();
        let _stalled = bus.subscribe(Some(1)).await;
        let mut reader = bus.subscribe(Some(8)).await;

        assert_eq!(bus.try_publish(LifecycleEvent::RefreshStarted), 2);
        // `_stalled` is now full and never read.
        assert_eq!(bus.try_publish(LifecycleEvent::RefreshCompleted), 1);

        assert_eq!(reader.recv().await, Some(LifecycleEvent::RefreshStarted));
        assert_eq!(reader.recv().await, Some(LifecycleEvent::RefreshCompleted));
    }

    #[tokio::test]
    async fn test_shutdown_flag() {
        let bus = EventBus::new();
        let mut signal = bus.shutdown_signal();
        assert!(!bus.is_shutdown());

        bus.shutdown();
        timeout(Duration::from_millis(100), wait_for_shutdown(&mut signal))
            .await
            .expect("shutdown should be observed");
        assert!(bus.is_shutdown());
    }
}
