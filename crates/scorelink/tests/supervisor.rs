//! Integration tests for bounded reconnection.
//!
//! All tests run on a paused clock, so reconnect deadlines are exact and
//! `advance` moves straight to them. The in-memory connector plays the
//! backend: each handshake is scripted to succeed, fail or stall.

use std::sync::Arc;
use std::time::Duration;

use scorelink::{ReconnectConfig, ReconnectSupervisor, SupervisorEvent};
use scorelink_transport::memory::{MemoryConnector, PeerFrame};
use scorelink_transport::{CloseCode, ConnectionState};
use tokio::time::{self, Instant};

const DELAY: Duration = Duration::from_secs(5);

// =========================================================================
// Helpers
// =========================================================================

fn supervisor(connector: &Arc<MemoryConnector>) -> ReconnectSupervisor<MemoryConnector> {
    ReconnectSupervisor::new(
        Arc::clone(connector),
        "memory://scores",
        Duration::from_secs(10),
        ReconnectConfig {
            delay: DELAY,
            max_attempts: 3,
        },
    )
}

/// Polls a few times, yielding in between so the reader task can deliver.
async fn poll_settled(sup: &mut ReconnectSupervisor<MemoryConnector>) -> Vec<SupervisorEvent> {
    let mut events = Vec::new();
    for _ in 0..10 {
        tokio::task::yield_now().await;
        events.extend(sup.poll().await);
    }
    events
}

fn scheduled(events: &[SupervisorEvent]) -> Vec<(u32, Instant)> {
    events
        .iter()
        .filter_map(|e| match e {
            SupervisorEvent::ReconnectScheduled { attempt, at } => Some((*attempt, *at)),
            _ => None,
        })
        .collect()
}

fn exhausted(events: &[SupervisorEvent]) -> bool {
    events
        .iter()
        .any(|e| matches!(e, SupervisorEvent::Exhausted { .. }))
}

// =========================================================================
// Opening
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_open_reports_connected() {
    let connector = Arc::new(MemoryConnector::new());
    let _peer = connector.accept_next();
    let mut sup = supervisor(&connector);

    sup.open().await;
    let events = poll_settled(&mut sup).await;

    assert_eq!(events, vec![SupervisorEvent::Connected]);
    assert_eq!(sup.state(), ConnectionState::Open);
    assert_eq!(sup.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_second_open_while_open_is_ignored() {
    let connector = Arc::new(MemoryConnector::new());
    let _peer = connector.accept_next();
    let mut sup = supervisor(&connector);

    sup.open().await;
    sup.open().await;

    assert_eq!(connector.attempts(), 1);
    assert_eq!(poll_settled(&mut sup).await, vec![SupervisorEvent::Connected]);
}

#[tokio::test(start_paused = true)]
async fn test_messages_surface_in_order() {
    let connector = Arc::new(MemoryConnector::new());
    let peer = connector.accept_next();
    let mut sup = supervisor(&connector);
    sup.open().await;

    peer.send_text("one");
    peer.send_text("two");
    let events = poll_settled(&mut sup).await;

    assert_eq!(
        events,
        vec![
            SupervisorEvent::Connected,
            SupervisorEvent::Message("one".into()),
            SupervisorEvent::Message("two".into()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_send_reaches_peer() {
    let connector = Arc::new(MemoryConnector::new());
    let mut peer = connector.accept_next();
    let mut sup = supervisor(&connector);
    sup.open().await;

    sup.send("hello");

    assert_eq!(peer.recv().await, Some(PeerFrame::Text("hello".into())));
}

// =========================================================================
// Bounded retry
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_three_abnormal_closes_then_exhaustion() {
    let connector = Arc::new(MemoryConnector::new());
    let peer = connector.accept_next();
    let mut sup = supervisor(&connector);
    sup.open().await;
    poll_settled(&mut sup).await;

    // Close #1: the live connection drops.
    drop(peer);
    let closed_at = Instant::now();
    let events = poll_settled(&mut sup).await;
    assert!(events.contains(&SupervisorEvent::Disconnected(CloseCode::Abnormal)));
    assert_eq!(scheduled(&events), vec![(1, closed_at + DELAY)]);

    // Closes #2 and #3: every retry is refused.
    for attempt in 2..=3 {
        time::advance(DELAY).await;
        let events = poll_settled(&mut sup).await;
        assert!(events.iter().any(|e| matches!(e, SupervisorEvent::Error(_))));
        assert_eq!(scheduled(&events), vec![(attempt, Instant::now() + DELAY)]);
    }

    // The third retry fails too: no fourth attempt.
    time::advance(DELAY).await;
    let events = poll_settled(&mut sup).await;
    assert!(scheduled(&events).is_empty());
    assert!(exhausted(&events));
    assert!(sup.is_exhausted());
    assert_eq!(sup.pending_reconnect(), None);
    assert_eq!(sup.state(), ConnectionState::Closed);
    assert_eq!(connector.attempts(), 4);

    // Nothing else ever fires.
    time::advance(DELAY * 10).await;
    assert!(poll_settled(&mut sup).await.is_empty());
    assert_eq!(connector.attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_retries_fire_at_five_ten_fifteen_seconds() {
    let connector = Arc::new(MemoryConnector::new());
    let mut sup = supervisor(&connector);
    let t0 = Instant::now();

    // Nothing scripted: every handshake is refused.
    sup.open().await;
    let mut all = poll_settled(&mut sup).await;
    for _ in 0..3 {
        time::advance(DELAY).await;
        all.extend(poll_settled(&mut sup).await);
    }

    assert_eq!(
        scheduled(&all),
        vec![
            (1, t0 + Duration::from_secs(5)),
            (2, t0 + Duration::from_secs(10)),
            (3, t0 + Duration::from_secs(15)),
        ]
    );
    assert!(exhausted(&all));
    assert_eq!(connector.attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_retry_waits_for_full_delay() {
    let connector = Arc::new(MemoryConnector::new());
    let mut sup = supervisor(&connector);
    sup.open().await;
    poll_settled(&mut sup).await;

    time::advance(DELAY - Duration::from_millis(1)).await;
    poll_settled(&mut sup).await;
    assert_eq!(connector.attempts(), 1);

    time::advance(Duration::from_millis(1)).await;
    poll_settled(&mut sup).await;
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_successful_open_resets_attempts() {
    let connector = Arc::new(MemoryConnector::new());
    let first = connector.accept_next();
    connector.refuse_next("backend restarting");
    connector.refuse_next("backend restarting");
    let second = connector.accept_next();

    let mut sup = supervisor(&connector);
    sup.open().await;
    poll_settled(&mut sup).await;

    // M-1 failures...
    drop(first);
    poll_settled(&mut sup).await;
    time::advance(DELAY).await;
    poll_settled(&mut sup).await;
    time::advance(DELAY).await;
    poll_settled(&mut sup).await;
    assert_eq!(sup.attempts(), 3);

    // ...then one success.
    time::advance(DELAY).await;
    let events = poll_settled(&mut sup).await;
    assert!(events.contains(&SupervisorEvent::Connected));
    assert_eq!(sup.attempts(), 0);

    // A new drop gets the full budget again.
    drop(second);
    let mut all = poll_settled(&mut sup).await;
    for _ in 0..3 {
        time::advance(DELAY).await;
        all.extend(poll_settled(&mut sup).await);
    }
    let attempts: Vec<u32> = scheduled(&all).into_iter().map(|(n, _)| n).collect();
    assert_eq!(attempts, vec![1, 2, 3]);
    assert!(exhausted(&all));
}

#[tokio::test(start_paused = true)]
async fn test_handshake_timeout_counts_as_abnormal_close() {
    let connector = Arc::new(MemoryConnector::new());
    connector.stall_next();
    let mut sup = supervisor(&connector);

    sup.open().await;
    let events = poll_settled(&mut sup).await;

    assert!(matches!(&events[0], SupervisorEvent::Error(msg) if msg.contains("timed out")));
    assert_eq!(scheduled(&events).len(), 1);
    assert!(sup.last_error().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_reconnect_handshake_still_counts() {
    let connector = Arc::new(MemoryConnector::new());
    let peer = connector.accept_next();
    connector.stall_next();
    let mut sup = supervisor(&connector);
    sup.open().await;
    poll_settled(&mut sup).await;

    drop(peer);
    let events = poll_settled(&mut sup).await;
    assert_eq!(scheduled(&events).len(), 1);

    // The retry comes due, but the caller gives up on the poll mid-handshake.
    time::advance(DELAY).await;
    let cut_short = time::timeout(Duration::from_millis(100), sup.poll()).await;
    assert!(cut_short.is_err());
    assert_eq!(connector.attempts(), 2);

    // The abandoned attempt schedules the next one instead of going quiet.
    let events = poll_settled(&mut sup).await;
    assert_eq!(scheduled(&events), vec![(2, Instant::now() + DELAY)]);

    let mut all = Vec::new();
    for _ in 0..2 {
        time::advance(DELAY).await;
        all.extend(poll_settled(&mut sup).await);
    }
    assert!(exhausted(&all));
    assert!(sup.is_exhausted());
    assert_eq!(connector.attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_reports_last_error() {
    let connector = Arc::new(MemoryConnector::new());
    let mut sup = ReconnectSupervisor::new(
        Arc::clone(&connector),
        "memory://scores",
        Duration::from_secs(10),
        ReconnectConfig {
            delay: DELAY,
            max_attempts: 0,
        },
    );
    connector.refuse_next("no route to host");

    sup.open().await;
    let events = poll_settled(&mut sup).await;

    match events.last() {
        Some(SupervisorEvent::Exhausted { last_error: Some(e) }) => {
            assert!(e.contains("no route to host"), "last error was {e}");
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_manual_open_after_exhaustion_resumes() {
    let connector = Arc::new(MemoryConnector::new());
    let mut sup = supervisor(&connector);
    sup.open().await;
    poll_settled(&mut sup).await;
    for _ in 0..3 {
        time::advance(DELAY).await;
        poll_settled(&mut sup).await;
    }
    assert!(sup.is_exhausted());

    let _peer = connector.accept_next();
    sup.open().await;
    let events = poll_settled(&mut sup).await;

    assert_eq!(events, vec![SupervisorEvent::Connected]);
    assert!(!sup.is_exhausted());
}

// =========================================================================
// Close handling
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_normal_close_from_peer_does_not_reconnect() {
    let connector = Arc::new(MemoryConnector::new());
    let peer = connector.accept_next();
    let mut sup = supervisor(&connector);
    sup.open().await;
    poll_settled(&mut sup).await;

    peer.close(CloseCode::Normal);
    let events = poll_settled(&mut sup).await;

    assert_eq!(events, vec![SupervisorEvent::Disconnected(CloseCode::Normal)]);
    assert_eq!(sup.pending_reconnect(), None);
    time::advance(DELAY * 2).await;
    poll_settled(&mut sup).await;
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_peer_going_away_reconnects() {
    let connector = Arc::new(MemoryConnector::new());
    let peer = connector.accept_next();
    let _next = connector.accept_next();
    let mut sup = supervisor(&connector);
    sup.open().await;
    poll_settled(&mut sup).await;

    peer.close(CloseCode::GoingAway);
    let events = poll_settled(&mut sup).await;
    assert_eq!(scheduled(&events).len(), 1);

    time::advance(DELAY).await;
    let events = poll_settled(&mut sup).await;
    assert_eq!(events, vec![SupervisorEvent::Connected]);
}

#[tokio::test(start_paused = true)]
async fn test_manual_close_cancels_pending_reconnect() {
    let connector = Arc::new(MemoryConnector::new());
    let peer = connector.accept_next();
    let mut sup = supervisor(&connector);
    sup.open().await;
    poll_settled(&mut sup).await;

    drop(peer);
    poll_settled(&mut sup).await;
    assert!(sup.pending_reconnect().is_some());

    sup.close(CloseCode::Normal).await;
    assert_eq!(sup.pending_reconnect(), None);

    time::advance(DELAY * 3).await;
    assert!(poll_settled(&mut sup).await.is_empty());
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_requested_close_with_abnormal_code_does_not_reconnect() {
    let connector = Arc::new(MemoryConnector::new());
    let mut peer = connector.accept_next();
    let mut sup = supervisor(&connector);
    sup.open().await;
    poll_settled(&mut sup).await;

    sup.close(CloseCode::GoingAway).await;
    let events = poll_settled(&mut sup).await;

    assert_eq!(events, vec![SupervisorEvent::Disconnected(CloseCode::GoingAway)]);
    assert_eq!(sup.pending_reconnect(), None);
    assert_eq!(peer.recv().await, Some(PeerFrame::Close(CloseCode::GoingAway)));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_normally_and_releases() {
    let connector = Arc::new(MemoryConnector::new());
    let mut peer = connector.accept_next();
    let mut sup = supervisor(&connector);
    sup.open().await;

    sup.shutdown().await;

    assert_eq!(sup.state(), ConnectionState::Closed);
    assert_eq!(peer.recv().await, Some(PeerFrame::Close(CloseCode::Normal)));
    assert!(poll_settled(&mut sup).await.is_empty());
}
