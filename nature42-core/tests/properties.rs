//! Progression invariants under arbitrary command sequences.

use std::collections::HashSet;

use proptest::prelude::*;

use nature42_core::effects::apply_changes;
use nature42_core::testing::TestHarness;
use nature42_core::{DifficultyTable, GameState};

const COMMANDS: &[&str] = &[
    "look",
    "inventory",
    "help",
    "hint",
    "go back",
    "go winding path",
    "open door 1",
    "open door 2",
    "open door 6",
    "try kindness",
    "try shouting",
    "take key 1",
    "take key 2",
    "take key 6",
    "take glowing feather",
    "drop glowing feather",
    "drop key 1",
    "insert key",
    "insert key 2",
    "talk to wise owl",
    "examine vault",
    "examine strange clouds",
    "dance wildly",
];

fn command() -> impl Strategy<Value = &'static str> {
    prop::sample::select(COMMANDS)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn assert_progression(before: &GameState, after: &GameState) {
    assert!(after.keys_collected.len() <= 6);
    let collected: HashSet<_> = after.keys_collected.iter().collect();
    assert_eq!(collected.len(), after.keys_collected.len(), "duplicate key");
    assert!(after.keys_inserted.iter().all(|k| collected.contains(k)));

    // History only grows, and old entries never change.
    assert!(after.decision_history.len() >= before.decision_history.len());
    assert_eq!(
        &after.decision_history[..before.decision_history.len()],
        &before.decision_history[..]
    );

    if before.vault_opened_at.is_some() {
        assert_eq!(after.vault_opened_at, before.vault_opened_at);
    }
    assert!(after.last_updated >= before.last_updated);
    assert!(after.check_consistency().is_ok());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_invariants_hold_for_any_sequence(commands in prop::collection::vec(command(), 1..30)) {
        runtime().block_on(async {
            let mut harness = TestHarness::new();
            for text in commands {
                let before = harness.state.clone();
                let result = harness.processor.process_command(text, &before).await;

                if !result.success {
                    assert!(result.state_changes.is_empty(), "{text}: {}", result.message);
                }

                let mut once = before.clone();
                apply_changes(&mut once, &result.state_changes);
                let mut twice = once.clone();
                apply_changes(&mut twice, &result.state_changes);
                assert_eq!(once, twice, "{text} is not idempotent");

                assert_progression(&before, &once);
                harness.state = once;
            }
        });
    }

    #[test]
    fn prop_hints_tighten_with_progress(keys in 0usize..6) {
        let table = DifficultyTable::standard();
        let earlier = table.hint_style(keys);
        let later = table.hint_style(keys + 1);
        prop_assert!(later.generosity >= earlier.generosity);
    }
}
