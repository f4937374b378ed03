//! Behaviour when the content oracle is slow, down or partly broken.

use std::sync::Arc;
use std::time::Duration;

use nature42_core::fallback;
use nature42_core::testing::{
    assert_at, assert_failure, assert_success, OracleCall, ScriptedOracle, TestHarness,
};
use nature42_core::{EngineConfig, FailureKind, HUB_LOCATION_ID};

fn harness_failing(call: OracleCall) -> TestHarness {
    let oracle = Arc::new(ScriptedOracle::new());
    oracle.fail_call(call);
    TestHarness::with_oracle(oracle)
}

#[tokio::test(start_paused = true)]
async fn test_slow_oracle_times_out() {
    let oracle = Arc::new(ScriptedOracle::with_delay(Duration::from_secs(60)));
    let config = EngineConfig::default().with_oracle_timeout(Duration::from_secs(2));
    let mut harness = TestHarness::with_config(oracle, config);

    let result = harness.input("open door 1").await;
    assert_failure(&result, FailureKind::OracleUnavailable);
    assert_at(&harness, HUB_LOCATION_ID);
}

#[tokio::test]
async fn test_unreadable_command_fails_closed() {
    let mut harness = harness_failing(OracleCall::Interpret);
    let result = harness.input("open door 1").await;
    assert_failure(&result, FailureKind::OracleUnavailable);
    assert!(!result.suggestions.is_empty());

    // Fixed commands still work.
    assert_success(&harness.input("inventory").await);
}

#[tokio::test]
async fn test_door_stays_shut_without_a_world() {
    let mut harness = harness_failing(OracleCall::Location);
    let result = harness.input("open door 2").await;

    assert_failure(&result, FailureKind::OracleUnavailable);
    assert_eq!(result.message, fallback::DOOR_STUCK);
    assert_at(&harness, HUB_LOCATION_ID);
    assert!(harness.state.decision_history.is_empty());
}

#[tokio::test]
async fn test_missing_puzzle_leaves_key_in_view() {
    let mut harness = harness_failing(OracleCall::Puzzle);
    assert_success(&harness.input("open door 3").await);
    assert!(harness.state.puzzle_states.is_empty());

    let take = harness.input("take key 3").await;
    assert_success(&take);
    assert!(harness.has_key(3));
}

#[tokio::test]
async fn test_image_failure_uses_placeholder() {
    let mut harness = harness_failing(OracleCall::Image);
    assert_success(&harness.input("open door 1").await);
    let here = harness.state.current_location().unwrap();
    assert_eq!(here.image_ref.as_deref(), Some(fallback::PLACEHOLDER_IMAGE));
}

#[tokio::test]
async fn test_dialogue_and_hints_fall_back() {
    let oracle = Arc::new(ScriptedOracle::new());
    oracle.fail_call(OracleCall::Dialogue);
    oracle.fail_call(OracleCall::Hint);
    let mut harness = TestHarness::with_oracle(oracle);
    harness.input("open door 1").await;

    let talk = harness.input("talk to wise owl").await;
    assert_success(&talk);
    assert_eq!(talk.message, fallback::npc_dialogue("Wise Owl"));
    assert!(talk.state_changes.is_empty());

    let hint = harness.input("hint").await;
    assert_success(&hint);
    assert_eq!(hint.message, fallback::hint());
    assert_eq!(harness.state.puzzle_states["door_1_puzzle"].hints_given, 0);
}

#[tokio::test]
async fn test_puzzle_evaluation_cannot_be_faked() {
    let mut harness = harness_failing(OracleCall::Evaluate);
    harness.input("open door 1").await;

    let result = harness.input("try kindness").await;
    assert_failure(&result, FailureKind::OracleUnavailable);
    assert_eq!(result.message, fallback::TRY_AGAIN);
    assert!(!harness.state.puzzle_states["door_1_puzzle"].solved);
}

#[tokio::test]
async fn test_examine_survives_missing_judgment() {
    let mut harness = harness_failing(OracleCall::Judge);
    harness.input("open door 1").await;

    let result = harness.input("examine strange clouds").await;
    assert_success(&result);
    assert_eq!(result.message, fallback::examine("strange clouds"));
}

#[tokio::test]
async fn test_creative_action_needs_judgment() {
    let mut harness = harness_failing(OracleCall::Judge);
    harness.input("open door 1").await;
    harness.input("try kindness").await;

    // No puzzle left here, so the attempt has to be judged.
    let result = harness.input("try singing").await;
    assert_failure(&result, FailureKind::OracleUnavailable);
}
