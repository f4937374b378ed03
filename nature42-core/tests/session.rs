//! GameSession: one command at a time, retries, save and load.

use std::sync::Arc;
use std::time::Duration;

use nature42_core::testing::{assert_failure, assert_success, ScriptedOracle};
use nature42_core::{
    CommandProcessor, EngineConfig, FailureKind, GameSession, SavedGame, SessionError,
};

fn session_with(oracle: Arc<ScriptedOracle>) -> GameSession {
    GameSession::new(oracle, EngineConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_second_command_is_rejected_while_busy() {
    let oracle = Arc::new(ScriptedOracle::with_delay(Duration::from_secs(1)));
    let session = session_with(oracle);

    let (first, second) = tokio::join!(session.send("open door 1"), session.send("look"));

    assert_success(&first.unwrap());
    assert!(matches!(second, Err(SessionError::Busy)));
    assert_eq!(session.snapshot().await.player_location, "door_1_entrance");
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_from_a_blip() {
    let oracle = Arc::new(ScriptedOracle::new());
    oracle.fail_next(1);
    let session = session_with(oracle.clone());

    let result = session.send_with_retry("open door 1").await.unwrap();
    assert_success(&result);
    assert_eq!(oracle.calls().interpret, 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_gives_up_after_max_attempts() {
    let oracle = Arc::new(ScriptedOracle::new());
    oracle.set_unavailable(true);
    let session = session_with(oracle.clone());

    let result = session.send_with_retry("open door 1").await.unwrap();
    assert_failure(&result, FailureKind::OracleUnavailable);
    assert_eq!(oracle.calls().interpret, 3);
    assert!(session.snapshot().await.is_in_hub());
}

#[tokio::test(start_paused = true)]
async fn test_refused_requests_are_not_retried() {
    let oracle = Arc::new(ScriptedOracle::new());
    oracle.set_refusing(true);
    let session = session_with(oracle.clone());

    let result = session.send_with_retry("open door 1").await.unwrap();
    assert_failure(&result, FailureKind::OracleRejected);
    assert!(!FailureKind::OracleRejected.is_retryable());
    assert_eq!(oracle.calls().interpret, 1);
}

#[tokio::test]
async fn test_rejections_are_not_retried() {
    let oracle = Arc::new(ScriptedOracle::new());
    let session = session_with(oracle.clone());

    let result = session.send_with_retry("take key 1").await.unwrap();
    assert_failure(&result, FailureKind::NotAllowed);
    assert_eq!(oracle.calls().interpret, 1);
}

#[tokio::test]
async fn test_save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nature42.json");

    let oracle = Arc::new(ScriptedOracle::new());
    let session = session_with(oracle.clone());
    session.send("open door 2").await.unwrap();
    session.send("take glowing feather").await.unwrap();
    session.save(&path).await.unwrap();

    let metadata = SavedGame::peek_metadata(&path).await.unwrap();
    assert_eq!(metadata.location, "door_2_entrance");
    assert_eq!(metadata.decisions, 1);

    let processor = CommandProcessor::new(oracle, EngineConfig::default());
    let restored = GameSession::load(&path, processor).await.unwrap();
    assert_eq!(restored.snapshot().await, session.snapshot().await);
    assert_ne!(restored.id(), session.id());

    let inventory = restored.send("inventory").await.unwrap();
    assert!(inventory.message.contains("glowing feather"));
}

#[tokio::test]
async fn test_loading_a_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let processor = CommandProcessor::new(Arc::new(ScriptedOracle::new()), EngineConfig::default());
    let result = GameSession::load(dir.path().join("nope.json"), processor).await;
    assert!(matches!(result, Err(SessionError::Persist(_))));
}

/// Plays against the real API. Run with `cargo test -- --ignored`.
#[tokio::test]
#[ignore]
async fn test_live_door_with_claude() {
    dotenvy::dotenv().ok();
    let session = GameSession::from_env().expect("ANTHROPIC_API_KEY must be set");

    let result = session.send_with_retry("open door 1").await.unwrap();
    println!("{}", result.message);
    assert!(result.success, "{}", result.message);
    assert_eq!(session.snapshot().await.current_door.map(|d| d.get()), Some(1));
}
