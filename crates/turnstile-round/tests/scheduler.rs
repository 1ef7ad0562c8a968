//! Scheduler actor tests with real (paused) timers.
//!
//! Every test runs with `start_paused = true`: while the test waits on a
//! session's outbox and the actor waits on a phase timer, the runtime jumps
//! the clock straight to the next deadline.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use turnstile_protocol::{ClientMessage, RoleClaim, ServerMessage, SessionId};
use turnstile_registry::SessionOutbound;
use turnstile_round::{Event, Phase, RoundConfig, SchedulerError, SchedulerHandle, spawn_scheduler};

type Outbox = mpsc::UnboundedReceiver<SessionOutbound>;

const GAME: SessionId = SessionId(100);

async fn connect(handle: &SchedulerHandle, id: SessionId) -> Outbox {
    let (tx, rx) = mpsc::unbounded_channel();
    handle
        .send(Event::Connect { session: id, outbox: tx })
        .await
        .unwrap();
    rx
}

async fn client(handle: &SchedulerHandle, id: SessionId, msg: ClientMessage) {
    handle.send(Event::from_client(id, msg)).await.unwrap();
}

async fn game(handle: &SchedulerHandle) -> Outbox {
    let mut rx = connect(handle, GAME).await;
    client(handle, GAME, ClientMessage::Register { role: RoleClaim::Resource }).await;
    assert_eq!(next(&mut rx).await, ServerMessage::WaitingForPlayers);
    rx
}

async fn player(handle: &SchedulerHandle, id: u64, name: &str) -> Outbox {
    let rx = connect(handle, SessionId(id)).await;
    client(
        handle,
        SessionId(id),
        ClientMessage::Join { display_name: name.into() },
    )
    .await;
    rx
}

/// Next message on an outbox. Fails rather than hanging forever.
async fn next(rx: &mut Outbox) -> ServerMessage {
    match tokio::time::timeout(Duration::from_secs(3600), rx.recv()).await {
        Ok(Some(SessionOutbound::Message(msg))) => msg,
        other => panic!("expected a message, got {other:?}"),
    }
}

/// Timers resolve on millisecond boundaries; allow for rounding up.
fn assert_elapsed(since: Instant, expected: Duration) {
    let elapsed = since.elapsed();
    assert!(
        elapsed >= expected && elapsed <= expected + Duration::from_millis(5),
        "expected ~{expected:?}, got {elapsed:?}"
    );
}

// =========================================================================
// Rotation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_full_rotation_with_report() {
    let handle = spawn_scheduler(RoundConfig::default());
    let mut g = game(&handle).await;
    let mut a = player(&handle, 1, "A").await;

    assert_eq!(next(&mut a).await, ServerMessage::PrepareToPlay { duration_ms: 5000 });
    let start = Instant::now();

    assert_eq!(next(&mut a).await, ServerMessage::YourTurn);
    assert_elapsed(start, Duration::from_secs(5));
    assert_eq!(next(&mut a).await, ServerMessage::TimeUpdate { remaining_ms: 60_000 });
    assert_eq!(next(&mut g).await, ServerMessage::RoundStart { player_name: "A".into() });

    let mut b = player(&handle, 2, "B").await;
    assert_eq!(next(&mut b).await, ServerMessage::QueueUpdate { position: 1, total: 1 });

    client(&handle, SessionId(1), ClientMessage::EndTurn).await;
    let user_id = match next(&mut g).await {
        ServerMessage::RequestFinalScore { user_id } => user_id,
        other => panic!("expected requestFinalScore, got {other:?}"),
    };
    client(
        &handle,
        GAME,
        ClientMessage::ReportFinalScore { value: 42, user_id: Some(user_id.clone()) },
    )
    .await;

    assert_eq!(next(&mut a).await, ServerMessage::GameOver { final_score: 42 });
    match next(&mut g).await {
        ServerMessage::RecordGameSession { user_id: recorded, player_name, total_score, .. } => {
            assert_eq!(recorded, user_id);
            assert_eq!(player_name, "A");
            assert_eq!(total_score, 42);
        }
        other => panic!("expected recordGameSession, got {other:?}"),
    }
    assert_eq!(next(&mut b).await, ServerMessage::PrepareToPlay { duration_ms: 5000 });

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, Phase::Preparing);
    assert_eq!(snap.holder, Some(SessionId(2)));
    assert!(snap.queue.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_countdown_ticks_until_round_elapses() {
    let handle = spawn_scheduler(RoundConfig {
        prepare_duration: Duration::ZERO,
        round_duration: Duration::from_secs(3),
        tick_interval: Duration::from_secs(1),
        ..Default::default()
    });
    let mut a = player(&handle, 1, "A").await;

    assert_eq!(next(&mut a).await, ServerMessage::PrepareToPlay { duration_ms: 0 });
    assert_eq!(next(&mut a).await, ServerMessage::YourTurn);
    assert_eq!(next(&mut a).await, ServerMessage::TimeUpdate { remaining_ms: 3000 });

    let mut ticks = Vec::new();
    let final_score = loop {
        match next(&mut a).await {
            ServerMessage::TimeUpdate { remaining_ms } => ticks.push(remaining_ms),
            ServerMessage::GameOver { final_score } => break final_score,
            other => panic!("unexpected {other:?}"),
        }
    };

    assert_eq!(ticks.len(), 2, "ticks: {ticks:?}");
    assert!(ticks[0] > ticks[1]);
    assert!(ticks[0] <= 2000 && ticks[1] <= 1000);
    // No resource was connected to ask, so the round closed on the spot.
    assert_eq!(final_score, 0);
    assert_eq!(next(&mut a).await, ServerMessage::GameAvailable);
}

#[tokio::test(start_paused = true)]
async fn test_report_timeout_falls_back_to_last_score() {
    let handle = spawn_scheduler(RoundConfig {
        prepare_duration: Duration::ZERO,
        report_timeout: Duration::from_secs(2),
        ..Default::default()
    });
    let mut g = game(&handle).await;
    let mut a = player(&handle, 1, "A").await;
    assert_eq!(next(&mut a).await, ServerMessage::PrepareToPlay { duration_ms: 0 });
    assert_eq!(next(&mut a).await, ServerMessage::YourTurn);
    assert_eq!(next(&mut a).await, ServerMessage::TimeUpdate { remaining_ms: 60_000 });
    assert!(matches!(next(&mut g).await, ServerMessage::RoundStart { .. }));

    client(&handle, GAME, ClientMessage::UpdateScore { value: 11 }).await;
    assert_eq!(next(&mut a).await, ServerMessage::ScoreUpdate { value: 11 });

    client(&handle, SessionId(1), ClientMessage::EndTurn).await;
    assert!(matches!(next(&mut g).await, ServerMessage::RequestFinalScore { .. }));
    let asked = Instant::now();

    // The resource stays silent.
    assert_eq!(next(&mut a).await, ServerMessage::GameOver { final_score: 11 });
    assert_elapsed(asked, Duration::from_secs(2));
    assert!(matches!(
        next(&mut g).await,
        ServerMessage::RecordGameSession { total_score: 11, .. }
    ));
}

// =========================================================================
// Disconnects
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_holder_leaving_during_preparation_cancels_its_timers() {
    let handle = spawn_scheduler(RoundConfig::default());
    let mut g = game(&handle).await;
    let mut a = player(&handle, 1, "A").await;
    assert!(matches!(next(&mut a).await, ServerMessage::PrepareToPlay { .. }));
    let first = handle.snapshot().await.unwrap().round.unwrap();

    handle.send(Event::Disconnect { session: SessionId(1) }).await.unwrap();
    // Nothing is recorded for a round that never went live.
    assert_eq!(next(&mut g).await, ServerMessage::WaitingForPlayers);

    // Long past where the old preparation window would have closed.
    tokio::time::sleep(Duration::from_secs(120)).await;
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, Phase::Idle);
    assert!(g.try_recv().is_err(), "no roundStart for a departed holder");

    let mut b = player(&handle, 2, "B").await;
    assert!(matches!(next(&mut b).await, ServerMessage::PrepareToPlay { .. }));
    assert!(handle.snapshot().await.unwrap().round.unwrap() > first);
}

#[tokio::test(start_paused = true)]
async fn test_queued_requester_leaving_renumbers_queue() {
    let handle = spawn_scheduler(RoundConfig::default());
    let _a = player(&handle, 1, "A").await;
    let mut b = player(&handle, 2, "B").await;
    let mut c = player(&handle, 3, "C").await;
    assert_eq!(next(&mut b).await, ServerMessage::QueueUpdate { position: 1, total: 1 });
    assert_eq!(next(&mut c).await, ServerMessage::QueueUpdate { position: 2, total: 2 });
    assert_eq!(next(&mut b).await, ServerMessage::QueueUpdate { position: 1, total: 2 });

    handle.send(Event::Disconnect { session: SessionId(2) }).await.unwrap();

    assert_eq!(next(&mut c).await, ServerMessage::QueueUpdate { position: 1, total: 1 });
    assert_eq!(handle.snapshot().await.unwrap().queue, vec![SessionId(3)]);
}

#[tokio::test(start_paused = true)]
async fn test_resource_leaving_mid_round_settles_and_moves_on() {
    let handle = spawn_scheduler(RoundConfig {
        prepare_duration: Duration::ZERO,
        ..Default::default()
    });
    let mut g = game(&handle).await;
    let mut a = player(&handle, 1, "A").await;
    let mut b = player(&handle, 2, "B").await;
    assert!(matches!(next(&mut g).await, ServerMessage::RoundStart { .. }));
    client(&handle, GAME, ClientMessage::UpdateScore { value: 17 }).await;

    handle.send(Event::Disconnect { session: GAME }).await.unwrap();

    let mut seen = Vec::new();
    loop {
        let msg = next(&mut a).await;
        let done = matches!(msg, ServerMessage::GameOver { .. });
        seen.push(msg);
        if done {
            break;
        }
    }
    assert_eq!(seen.last(), Some(&ServerMessage::GameOver { final_score: 17 }));
    assert_eq!(next(&mut b).await, ServerMessage::QueueUpdate { position: 1, total: 1 });
    assert_eq!(next(&mut b).await, ServerMessage::PrepareToPlay { duration_ms: 0 });
}

// =========================================================================
// Handle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_second_resource_receives_close() {
    let handle = spawn_scheduler(RoundConfig::default());
    let _g = game(&handle).await;
    let mut other = connect(&handle, SessionId(5)).await;

    client(&handle, SessionId(5), ClientMessage::Register { role: RoleClaim::Resource }).await;

    assert!(matches!(other.recv().await, Some(SessionOutbound::Close { .. })));
    assert_eq!(handle.snapshot().await.unwrap().resource, Some(GAME));
}

#[tokio::test(start_paused = true)]
async fn test_handle_after_shutdown_is_unavailable() {
    let handle = spawn_scheduler(RoundConfig::default());
    handle.shutdown().await.unwrap();

    let result = handle.snapshot().await;

    assert!(matches!(result, Err(SchedulerError::Unavailable)));
}
