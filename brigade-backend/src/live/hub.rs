//! Viewer session registry and fan-out.
//!
//! Each open session owns a bounded outbound queue. Fan-out never waits on a
//! queue: a session whose queue is full is closed and must reconnect, which
//! gets it a fresh snapshot.

use brigade_common::LiveMessage;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{RwLock, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type SessionId = Uuid;

/// Items queued for delivery to one viewer.
#[derive(Debug, Clone)]
pub enum Outbound {
    Message(Arc<LiveMessage>),
    /// Liveness probe; the transport turns it into a ping frame
    Probe,
}

/// Why a session left the fan-out set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Disconnected,
    QueueFull,
    ProbeTimeout,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            CloseReason::Disconnected => "disconnected",
            CloseReason::QueueFull => "outbound queue full",
            CloseReason::ProbeTimeout => "missed liveness probe",
        };
        f.write_str(text)
    }
}

/// Registry-side state of one open session.
#[derive(Debug)]
struct SessionSlot {
    tx: mpsc::Sender<Outbound>,
    awaiting_probe: bool,
    opened_at: Instant,
}

/// Receiving end handed to the connection task.
///
/// The queue closes (`recv` yields `None`) as soon as the hub drops the
/// session, whatever the reason.
#[derive(Debug)]
pub struct ViewerSession {
    pub id: SessionId,
    pub rx: mpsc::Receiver<Outbound>,
}

/// Outcome of one liveness sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub probed: usize,
    pub evicted: usize,
}

pub struct SessionHub {
    sessions: Arc<RwLock<HashMap<SessionId, SessionSlot>>>,
    queue_capacity: usize,
}

impl SessionHub {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new session whose first queued message is `snapshot`.
    ///
    /// The caller must hold the cache lock that `snapshot` was taken under, so
    /// no update can be published between the snapshot and registration.
    pub async fn attach(&self, snapshot: LiveMessage) -> ViewerSession {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = Uuid::now_v7();

        // fresh queue with capacity >= 1: cannot fail
        let _ = tx.try_send(Outbound::Message(Arc::new(snapshot)));

        let mut sessions = self.sessions.write().await;
        sessions.insert(
            id,
            SessionSlot {
                tx,
                awaiting_probe: false,
                opened_at: Instant::now(),
            },
        );
        info!("Viewer session {} opened ({} open)", id, sessions.len());

        ViewerSession { id, rx }
    }

    /// Queue `message` for every open session.
    ///
    /// Returns how many sessions accepted it. Sessions whose queue is full or
    /// closed are removed.
    pub async fn publish(&self, message: LiveMessage) -> usize {
        let message = Arc::new(message);
        let mut sessions = self.sessions.write().await;
        let mut dropped = Vec::new();
        let mut delivered = 0;

        for (id, slot) in sessions.iter() {
            match slot.tx.try_send(Outbound::Message(message.clone())) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => dropped.push((*id, CloseReason::QueueFull)),
                Err(TrySendError::Closed(_)) => dropped.push((*id, CloseReason::Disconnected)),
            }
        }

        for (id, reason) in dropped {
            Self::remove_locked(&mut sessions, id, reason);
        }

        debug!("Published {} message to {} sessions", message.kind(), delivered);
        delivered
    }

    /// Remove a session. Safe to call repeatedly; returns whether it was open.
    pub async fn close(&self, id: SessionId, reason: CloseReason) -> bool {
        let mut sessions = self.sessions.write().await;
        Self::remove_locked(&mut sessions, id, reason)
    }

    /// Record a probe answer from `id`.
    pub async fn mark_alive(&self, id: SessionId) {
        if let Some(slot) = self.sessions.write().await.get_mut(&id) {
            slot.awaiting_probe = false;
        }
    }

    /// One liveness tick: evict sessions still owing an answer to the
    /// previous probe, then probe everyone left.
    pub async fn probe_sweep(&self) -> ProbeReport {
        let mut sessions = self.sessions.write().await;
        let mut report = ProbeReport::default();
        let mut dropped = Vec::new();

        for (id, slot) in sessions.iter_mut() {
            if slot.awaiting_probe {
                dropped.push((*id, CloseReason::ProbeTimeout));
                continue;
            }
            slot.awaiting_probe = true;
            match slot.tx.try_send(Outbound::Probe) {
                Ok(()) => report.probed += 1,
                Err(TrySendError::Full(_)) => dropped.push((*id, CloseReason::QueueFull)),
                Err(TrySendError::Closed(_)) => dropped.push((*id, CloseReason::Disconnected)),
            }
        }

        for (id, reason) in dropped {
            if Self::remove_locked(&mut sessions, id, reason) {
                report.evicted += 1;
            }
        }
        report
    }

    pub async fn is_open(&self, id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn remove_locked(
        sessions: &mut HashMap<SessionId, SessionSlot>,
        id: SessionId,
        reason: CloseReason,
    ) -> bool {
        match sessions.remove(&id) {
            Some(slot) => {
                let lifetime = slot.opened_at.elapsed();
                if reason == CloseReason::Disconnected {
                    info!("Viewer session {} closed after {:?}", id, lifetime);
                } else {
                    warn!("Viewer session {} dropped after {:?}: {}", id, lifetime, reason);
                }
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brigade_common::{PositionRecord, UnitMeta};

    fn point(unit: &str, lat: f64) -> LiveMessage {
        LiveMessage::point(&PositionRecord {
            unit_id: unit.to_string(),
            lat,
            lng: 0.0,
            timestamp: 1,
            meta: UnitMeta::default(),
        })
    }

    fn empty_snapshot() -> LiveMessage {
        LiveMessage::Snapshot(HashMap::new())
    }

    fn expect_message(outbound: Option<Outbound>) -> LiveMessage {
        match outbound {
            Some(Outbound::Message(msg)) => (*msg).clone(),
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_snapshot_is_first_message() {
        let hub = SessionHub::new(8);
        let mut session = hub.attach(empty_snapshot()).await;
        hub.publish(point("U1", 1.0)).await;

        let first = expect_message(session.rx.recv().await);
        let second = expect_message(session.rx.recv().await);
        assert_eq!(first.kind(), "snapshot");
        assert_eq!(second, point("U1", 1.0));
    }

    #[tokio::test]
    async fn test_publish_preserves_order_for_all_sessions() {
        let hub = SessionHub::new(8);
        let mut a = hub.attach(empty_snapshot()).await;
        let mut b = hub.attach(empty_snapshot()).await;

        for lat in [1.0, 2.0, 3.0] {
            assert_eq!(hub.publish(point("U1", lat)).await, 2);
        }

        for session in [&mut a, &mut b] {
            expect_message(session.rx.recv().await);
            for lat in [1.0, 2.0, 3.0] {
                assert_eq!(expect_message(session.rx.recv().await), point("U1", lat));
            }
        }
    }

    #[tokio::test]
    async fn test_full_queue_closes_only_that_session() {
        let hub = SessionHub::new(2);
        let mut slow = hub.attach(empty_snapshot()).await;
        let mut fast = hub.attach(empty_snapshot()).await;
        expect_message(fast.rx.recv().await);

        // slow never drains: snapshot + one update fill its queue
        assert_eq!(hub.publish(point("U1", 1.0)).await, 2);
        expect_message(fast.rx.recv().await);
        assert_eq!(hub.publish(point("U1", 2.0)).await, 1);

        assert!(!hub.is_open(slow.id).await);
        assert!(hub.is_open(fast.id).await);
        assert_eq!(expect_message(fast.rx.recv().await), point("U1", 2.0));

        // what was queued before the drop is still readable, then the queue ends
        expect_message(slow.rx.recv().await);
        expect_message(slow.rx.recv().await);
        assert!(slow.rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let hub = SessionHub::new(4);
        let session = hub.attach(empty_snapshot()).await;

        assert!(hub.close(session.id, CloseReason::Disconnected).await);
        assert!(!hub.close(session.id, CloseReason::Disconnected).await);
        assert_eq!(hub.session_count().await, 0);
        assert_eq!(hub.publish(point("U1", 1.0)).await, 0);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_pruned_on_publish() {
        let hub = SessionHub::new(4);
        let session = hub.attach(empty_snapshot()).await;
        drop(session.rx);

        assert_eq!(hub.publish(point("U1", 1.0)).await, 0);
        assert_eq!(hub.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_silent_session_evicted_on_second_sweep() {
        let hub = SessionHub::new(8);
        let mut silent = hub.attach(empty_snapshot()).await;

        let first = hub.probe_sweep().await;
        assert_eq!(first, ProbeReport { probed: 1, evicted: 0 });
        assert!(hub.is_open(silent.id).await);

        let second = hub.probe_sweep().await;
        assert_eq!(second, ProbeReport { probed: 0, evicted: 1 });
        assert!(!hub.is_open(silent.id).await);

        // no updates after eviction
        assert_eq!(hub.publish(point("U1", 1.0)).await, 0);
        expect_message(silent.rx.recv().await);
        assert!(matches!(silent.rx.recv().await, Some(Outbound::Probe)));
        assert!(silent.rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_answering_session_survives_sweeps() {
        let hub = SessionHub::new(8);
        let mut alive = hub.attach(empty_snapshot()).await;
        expect_message(alive.rx.recv().await);

        for _ in 0..5 {
            let report = hub.probe_sweep().await;
            assert_eq!(report.evicted, 0);
            assert!(matches!(alive.rx.recv().await, Some(Outbound::Probe)));
            hub.mark_alive(alive.id).await;
        }
        assert!(hub.is_open(alive.id).await);
    }
}
