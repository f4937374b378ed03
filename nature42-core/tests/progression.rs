//! A full playthrough: six doors, six keys, one vault.

use nature42_core::testing::{assert_at, assert_failure, assert_keys, assert_success, TestHarness};
use nature42_core::{FailureKind, HUB_LOCATION_ID};

#[tokio::test]
async fn test_full_playthrough_opens_vault_once() {
    let mut harness = TestHarness::new();

    for door in 1..=6 {
        harness.clear_door(door).await;
        assert_keys(&harness, door as usize);
        assert_at(&harness, HUB_LOCATION_ID);
    }

    let partial = harness.input("insert key 3").await;
    assert_success(&partial);
    assert!(partial.message.contains("(1 of 6 keys inserted)"));
    assert!(!partial.game_complete);
    assert!(!harness.state.is_vault_open());

    let rest = harness.input("insert key").await;
    assert_success(&rest);
    assert!(rest.game_complete);
    assert!(rest.message.contains("Congratulations"));
    assert_eq!(harness.state.keys_inserted.len(), 6);
    assert!(harness.state.inventory.iter().all(|i| !i.is_key));
    let opened_at = harness.state.vault_opened_at;
    assert!(opened_at.is_some());

    let again = harness.input("insert key").await;
    assert_failure(&again, FailureKind::NotAllowed);
    assert_eq!(again.message, "The vault is already open.");
    assert_eq!(harness.state.vault_opened_at, opened_at);

    let look = harness.input("examine vault").await;
    assert!(look.message.contains("All six keys"));

    assert!(harness.state.check_consistency().is_ok());
}

#[tokio::test]
async fn test_decision_history_tells_the_story() {
    let mut harness = TestHarness::new();
    harness.clear_door(1).await;

    let history: Vec<&str> = harness
        .state
        .decision_history
        .iter()
        .map(|d| d.description.as_str())
        .collect();
    assert_eq!(
        history,
        vec![
            "Player chose to open door 1",
            "Player chose to try kindness",
            "Player chose to take key 1",
        ]
    );
    assert_eq!(
        harness.state.decision_history[2].consequences,
        vec!["Retrieved key 1"]
    );
    assert_eq!(harness.state.decision_history[0].location_id, HUB_LOCATION_ID);
}

#[tokio::test]
async fn test_looking_and_moving_are_not_recorded() {
    let mut harness = TestHarness::new();
    harness.input("look").await;
    harness.input("examine door 2").await;
    harness.input("inventory").await;
    harness.input("hint").await;
    assert!(harness.state.decision_history.is_empty());
}

#[tokio::test]
async fn test_hints_get_counted() {
    let mut harness = TestHarness::new();
    harness.input("open door 1").await;

    let first = harness.input("hint").await;
    assert_success(&first);
    assert!(first.message.contains("Hint 1"));
    let second = harness.input("hint").await;
    assert!(second.message.contains("Hint 2"));
    assert_eq!(harness.state.puzzle_states["door_1_puzzle"].hints_given, 2);
}

#[tokio::test]
async fn test_hint_in_hub_counts_keys() {
    let mut harness = TestHarness::new();
    harness.clear_door(1).await;
    let hint = harness.input("hint").await;
    assert!(hint.message.contains("1 of 6"));
}
