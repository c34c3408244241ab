//! Integration tests for the match actor using a recording proposal sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gridplay_match::{
    Diagnostic, MatchConfig, MatchError, MatchHandle, MatchPhase, ProposalOutcome, ProposalSink,
    Snapshot, TIMEOUT_REASON, spawn_match,
};
use gridplay_protocol::{
    ActionApproved, ActionDenied, ClientMessage, GameEnded, GameEvent, Orientation, ServerMessage,
};
use gridplay_session::{CANNOT_CONNECT, SessionError, SessionEvent, SessionState};
use gridplay_transport::CloseInfo;
use parking_lot::Mutex;
use serde_json::{Value, json};

// =========================================================================
// Recording sink: stands in for the session.
// =========================================================================

struct RecordingSink {
    sent: Mutex<Vec<ClientMessage>>,
    connected: AtomicBool,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
        })
    }

    fn sent(&self) -> Vec<ClientMessage> {
        self.sent.lock().clone()
    }
}

impl ProposalSink for RecordingSink {
    async fn submit(&self, msg: &ClientMessage) -> Result<(), SessionError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SessionError::NotConnected(CANNOT_CONNECT.into()));
        }
        self.sent.lock().push(msg.clone());
        Ok(())
    }
}

/// A sink whose writes never complete, like a socket stuck on
/// backpressure.
struct StalledSink;

impl ProposalSink for StalledSink {
    async fn submit(&self, _msg: &ClientMessage) -> Result<(), SessionError> {
        std::future::pending().await
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn setup(config: MatchConfig) -> (MatchHandle, Arc<RecordingSink>) {
    let sink = RecordingSink::new();
    let handle = spawn_match(config, Arc::clone(&sink));
    (handle, sink)
}

async fn wait_until(handle: &MatchHandle, pred: impl FnMut(&Snapshot) -> bool) -> Snapshot {
    let mut rx = handle.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
        .await
        .expect("state should be reached")
        .expect("actor should be running");
    snapshot.clone()
}

fn message(msg: ServerMessage) -> SessionEvent {
    SessionEvent::Message(msg)
}

fn approved(approved: bool, reason: &str) -> SessionEvent {
    message(ServerMessage::ActionApproved(ActionApproved {
        approved,
        reason: reason.into(),
    }))
}

fn e2e4() -> Value {
    json!({ "from": "e2", "to": "e4" })
}

/// Opens the connection and starts a match as `color`.
async fn start_match(handle: &MatchHandle, color: &str) {
    assert!(handle.deliver(SessionEvent::Opened));
    assert!(handle.deliver(message(ServerMessage::GameEvent(GameEvent::match_start(color)))));
    wait_until(handle, |s| s.phase == MatchPhase::Active).await;
}

// =========================================================================
// Proposals
// =========================================================================

#[tokio::test]
async fn test_propose_action_sends_and_records_pending() {
    let (handle, sink) = setup(MatchConfig::default());
    start_match(&handle, "white").await;

    let id = handle.propose_action(e2e4()).await.unwrap();

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.pending.map(|p| p.id), Some(id));
    assert_eq!(
        sink.sent(),
        vec![ClientMessage::ActionProposal { payload: e2e4() }]
    );
}

#[tokio::test]
async fn test_propose_action_second_fails_already_pending() {
    let (handle, sink) = setup(MatchConfig::default());
    start_match(&handle, "white").await;

    handle.propose_action(e2e4()).await.unwrap();
    let err = handle
        .propose_action(json!({ "from": "d2", "to": "d4" }))
        .await
        .unwrap_err();

    assert!(matches!(err, MatchError::ProposalAlreadyPending));
    assert_eq!(sink.sent().len(), 1, "exactly one frame should be sent");
}

#[tokio::test]
async fn test_propose_action_before_match_fails_not_active() {
    let (handle, sink) = setup(MatchConfig::default());
    handle.deliver(SessionEvent::Opened);

    let err = handle.propose_action(e2e4()).await.unwrap_err();

    assert!(matches!(err, MatchError::NotActive(MatchPhase::AwaitingMatch)));
    assert!(sink.sent().is_empty());
}

#[tokio::test]
async fn test_propose_action_when_disconnected_records_nothing() {
    let (handle, sink) = setup(MatchConfig::default());
    start_match(&handle, "white").await;
    sink.connected.store(false, Ordering::SeqCst);

    let err = handle.propose_action(e2e4()).await.unwrap_err();

    assert!(matches!(
        err,
        MatchError::Session(SessionError::NotConnected(_))
    ));
    assert_eq!(handle.snapshot().await.unwrap().pending, None);
}

#[tokio::test(start_paused = true)]
async fn test_propose_action_stalled_write_does_not_block_actor() {
    let handle = spawn_match(MatchConfig::default(), Arc::new(StalledSink));
    start_match(&handle, "white").await;

    let first = tokio::spawn({
        let handle = handle.clone();
        async move { handle.propose_action(e2e4()).await }
    });
    wait_until(&handle, |s| s.pending.is_some()).await;

    // A second proposal is refused without waiting on the stuck write.
    let second = tokio::time::timeout(
        Duration::from_secs(1),
        handle.propose_action(json!({ "from": "d2", "to": "d4" })),
    )
    .await
    .expect("second proposal should be refused at once");
    assert!(matches!(second, Err(MatchError::ProposalAlreadyPending)));

    // Snapshots and inbound events keep flowing.
    tokio::time::timeout(Duration::from_secs(1), handle.snapshot())
        .await
        .expect("snapshot should answer")
        .unwrap();
    handle.deliver(message(ServerMessage::GameEnded(GameEnded {
        status: "lose".into(),
        cause: "resignation".into(),
    })));
    let snap = wait_until(&handle, |s| s.phase == MatchPhase::Ended).await;
    assert_eq!(snap.pending, None);
    assert!(!first.is_finished(), "the stuck write is still in flight");
}

#[tokio::test(start_paused = true)]
async fn test_proposal_timeout_fires_while_write_is_stalled() {
    let config = MatchConfig::default().with_proposal_timeout(Duration::from_millis(100));
    let handle = spawn_match(config, Arc::new(StalledSink));
    start_match(&handle, "white").await;

    tokio::spawn({
        let handle = handle.clone();
        async move { handle.propose_action(e2e4()).await }
    });
    wait_until(&handle, |s| s.pending.is_some()).await;

    tokio::time::sleep(Duration::from_millis(500)).await;

    let snap = wait_until(&handle, |s| s.pending.is_none()).await;
    assert_eq!(
        snap.last_outcome.map(|r| r.outcome),
        Some(ProposalOutcome::Rejected {
            reason: TIMEOUT_REASON.into()
        })
    );
}

// =========================================================================
// Verdicts
// =========================================================================

#[tokio::test]
async fn test_approval_clears_pending_without_touching_position() {
    let (handle, _sink) = setup(MatchConfig::default());
    start_match(&handle, "white").await;
    let id = handle.propose_action(e2e4()).await.unwrap();

    handle.deliver(approved(true, ""));

    let snap = wait_until(&handle, |s| s.pending.is_none()).await;
    assert_eq!(snap.position.as_deref(), Some("start"));
    let resolution = snap.last_outcome.unwrap();
    assert_eq!(resolution.id, id);
    assert_eq!(resolution.outcome, ProposalOutcome::Committed);

    // The position moves only with the server's update.
    handle.deliver(message(ServerMessage::GameEvent(GameEvent::state_update(
        "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1",
    ))));
    let snap = wait_until(&handle, |s| s.position.as_deref() != Some("start")).await;
    assert_eq!(
        snap.position.as_deref(),
        Some("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1")
    );
}

#[tokio::test]
async fn test_denial_surfaces_reason() {
    let (handle, _sink) = setup(MatchConfig::default());
    start_match(&handle, "black").await;
    handle.propose_action(json!({ "cell": 4 })).await.unwrap();

    handle.deliver(message(ServerMessage::ActionDenied(ActionDenied {
        reason: "occupied".into(),
    })));

    let snap = wait_until(&handle, |s| s.pending.is_none()).await;
    assert_eq!(snap.last_status, "occupied");
    assert_eq!(snap.orientation, Some(Orientation::new("black")));
    assert_eq!(snap.position.as_deref(), Some("start"));
    assert_eq!(
        snap.last_outcome.map(|r| r.outcome),
        Some(ProposalOutcome::Rejected {
            reason: "occupied".into()
        })
    );
}

#[tokio::test]
async fn test_unexpected_approval_raises_one_diagnostic() {
    let (handle, _sink) = setup(MatchConfig::default());
    let mut diagnostics = handle.diagnostics();
    start_match(&handle, "white").await;

    handle.deliver(approved(true, ""));

    let diagnostic = tokio::time::timeout(Duration::from_secs(2), diagnostics.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        diagnostic,
        Diagnostic::UnexpectedApproval {
            approved: true,
            reason: String::new()
        }
    );

    // Round trip through the actor, then check nothing else was raised.
    handle.snapshot().await.unwrap();
    assert!(diagnostics.try_recv().is_err());
}

// =========================================================================
// Game end and reset
// =========================================================================

#[tokio::test]
async fn test_game_ended_blocks_proposals_until_reset() {
    let (handle, _sink) = setup(MatchConfig::default());
    start_match(&handle, "white").await;
    handle.propose_action(e2e4()).await.unwrap();

    handle.deliver(message(ServerMessage::GameEnded(GameEnded {
        status: "win".into(),
        cause: "checkmate".into(),
    })));

    let snap = wait_until(&handle, |s| s.phase == MatchPhase::Ended).await;
    assert_eq!(snap.pending, None);
    assert_eq!(snap.result.map(|r| r.cause), Some("checkmate".to_string()));

    let err = handle.propose_action(e2e4()).await.unwrap_err();
    assert!(matches!(err, MatchError::NotActive(MatchPhase::Ended)));

    handle.reset().await.unwrap();
    assert_eq!(
        handle.snapshot().await.unwrap().phase,
        MatchPhase::AwaitingMatch
    );
}

#[tokio::test]
async fn test_reset_while_active_fails() {
    let (handle, _sink) = setup(MatchConfig::default());
    start_match(&handle, "white").await;

    assert!(matches!(
        handle.reset().await,
        Err(MatchError::InvalidTransition { .. })
    ));
}

// =========================================================================
// Timeouts
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_proposal_timeout_rejects_with_timeout_reason() {
    let config = MatchConfig::default().with_proposal_timeout(Duration::from_secs(5));
    let (handle, _sink) = setup(config);
    start_match(&handle, "white").await;
    let id = handle.propose_action(e2e4()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(6)).await;

    let snap = wait_until(&handle, |s| s.pending.is_none()).await;
    let resolution = snap.last_outcome.unwrap();
    assert_eq!(resolution.id, id);
    assert_eq!(
        resolution.outcome,
        ProposalOutcome::Rejected {
            reason: TIMEOUT_REASON.into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_verdict_before_timeout_disarms_timer() {
    let config = MatchConfig::default().with_proposal_timeout(Duration::from_secs(5));
    let (handle, _sink) = setup(config);
    let mut diagnostics = handle.diagnostics();
    start_match(&handle, "white").await;
    handle.propose_action(e2e4()).await.unwrap();

    handle.deliver(approved(true, ""));
    wait_until(&handle, |s| s.pending.is_none()).await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(
        snap.last_outcome.map(|r| r.outcome),
        Some(ProposalOutcome::Committed)
    );
    assert!(diagnostics.try_recv().is_err());
}

// =========================================================================
// Connection events
// =========================================================================

#[tokio::test]
async fn test_close_leaves_pending_unresolved_and_reports_lost() {
    let (handle, _sink) = setup(MatchConfig::default());
    let mut diagnostics = handle.diagnostics();
    start_match(&handle, "white").await;
    let id = handle.propose_action(e2e4()).await.unwrap();

    handle.deliver(SessionEvent::Closed(CloseInfo::new(
        1000,
        "opponent disconnected",
    )));

    let snap = wait_until(&handle, |s| s.connection.is_terminal()).await;
    assert_eq!(snap.pending.map(|p| p.id), Some(id));
    assert_eq!(snap.last_status, "opponent disconnected");
    assert_eq!(
        diagnostics.recv().await.unwrap(),
        Diagnostic::ProposalLost { id }
    );

    let err = handle.propose_action(e2e4()).await.unwrap_err();
    assert!(matches!(
        err,
        MatchError::Session(SessionError::NotConnected(status)) if status == "opponent disconnected"
    ));
}

#[tokio::test]
async fn test_reconnect_loses_pending_and_restarts_match() {
    let (handle, _sink) = setup(MatchConfig::default());
    start_match(&handle, "white").await;
    let id = handle.propose_action(e2e4()).await.unwrap();

    handle.deliver(SessionEvent::Reconnecting {
        attempt: 1,
        delay: Duration::from_millis(500),
    });
    let snap = wait_until(&handle, |s| s.pending.is_none()).await;
    let resolution = snap.last_outcome.unwrap();
    assert_eq!(resolution.id, id);
    assert_eq!(resolution.outcome, ProposalOutcome::Lost);

    handle.deliver(SessionEvent::Opened);
    let snap = wait_until(&handle, |s| s.connection == SessionState::Open).await;
    assert_eq!(snap.phase, MatchPhase::AwaitingMatch);
    assert_eq!(snap.orientation, None);
}

#[tokio::test]
async fn test_connection_error_shows_cannot_connect() {
    let (handle, _sink) = setup(MatchConfig::default());

    handle.deliver(SessionEvent::Error("connection refused".into()));

    let snap = wait_until(&handle, |s| s.last_status == CANNOT_CONNECT).await;
    assert_eq!(snap.phase, MatchPhase::AwaitingMatch);
}

// =========================================================================
// Handle behavior
// =========================================================================

#[tokio::test]
async fn test_snapshot_sees_events_delivered_before_it() {
    let (handle, _sink) = setup(MatchConfig::default());

    handle.deliver(SessionEvent::Opened);
    handle.deliver(message(ServerMessage::GameEvent(GameEvent::match_start(
        "black",
    ))));

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, MatchPhase::Active);
    assert_eq!(snap.orientation, Some(Orientation::new("black")));
    assert_eq!(handle.current(), snap);
}

#[tokio::test]
async fn test_shutdown_makes_handle_unavailable() {
    let (handle, _sink) = setup(MatchConfig::default());

    handle.shutdown().await.unwrap();

    assert!(matches!(
        handle.propose_action(e2e4()).await,
        Err(MatchError::Unavailable)
    ));
}

#[tokio::test]
async fn test_match_start_exposes_opponent_mark() {
    let config = MatchConfig::default().with_initial_position("---------");
    let (handle, _sink) = setup(config);
    handle.deliver(SessionEvent::Opened);
    handle.deliver(message(ServerMessage::GameEvent(GameEvent {
        name: "match_start".into(),
        data: json!({ "char": 'X' as u32, "opponentChar": 'O' as u32 }),
    })));

    let snap = wait_until(&handle, |s| s.phase == MatchPhase::Active).await;
    assert_eq!(snap.orientation, Some(Orientation::new("X")));
    assert_eq!(snap.opponent, Some(Orientation::new("O")));
}

#[tokio::test]
async fn test_custom_initial_position() {
    let config = MatchConfig::default().with_initial_position("---------");
    let (handle, _sink) = setup(config);
    start_match(&handle, "X").await;

    assert_eq!(handle.current().position.as_deref(), Some("---------"));
}
