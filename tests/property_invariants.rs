//! Property tests for the invariants the stores must hold for any input.

use proptest::prelude::*;
use tempfile::TempDir;

use quire::domain::models::constraint::Predicate;
use quire::domain::models::scorecard::{default_weights, validate_weights, ScoreHistory, ScoreRecord, Weights};
use quire::domain::models::threshold::DriftCheck;
use quire::infrastructure::persistence::WriteRetry;
use quire::services::{CheckpointStore, ConstraintStore, HookEventLedger, RecordOutcome};
use quire::{CheckpointState, Constraint, HookEvent, HookEventType, Severity};

fn severity() -> impl Strategy<Value = Severity> {
    prop_oneof![Just(Severity::Warning), Just(Severity::Critical)]
}

fn event_type() -> impl Strategy<Value = HookEventType> {
    prop_oneof![
        Just(HookEventType::Trigger),
        Just(HookEventType::Pass),
        Just(HookEventType::Fix),
        Just(HookEventType::FalsePositive),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_small_changes_stay_within_drift_cap(old in 0.1f64..1000.0, frac in -0.19f64..0.19) {
        let check = DriftCheck::evaluate(old, old * (1.0 + frac), 0.20);
        prop_assert!(check.is_within_cap());
    }

    #[test]
    fn prop_large_changes_exceed_drift_cap(old in 0.1f64..1000.0, frac in 0.21f64..10.0, down in any::<bool>()) {
        let new = if down { old * (1.0 - frac.min(0.99)) } else { old * (1.0 + frac) };
        prop_assume!(((new - old).abs() / old) > 0.2);
        prop_assert!(!DriftCheck::evaluate(old, new, 0.20).is_within_cap());
    }

    #[test]
    fn prop_zero_baseline_never_within_cap(new in -10.0f64..10.0) {
        prop_assert!(!DriftCheck::evaluate(0.0, new, 0.20).is_within_cap());
    }

    #[test]
    fn prop_aggregate_stays_on_scale(scores in prop::collection::vec(0.0f64..=10.0, 6)) {
        let weights = default_weights();
        let records = weights
            .keys()
            .zip(scores)
            .map(|(dim, score)| ScoreRecord::new(1, dim.as_str(), score).unwrap());
        let history = ScoreHistory::from_records(records);
        let total = history.aggregate(1, &weights).unwrap();
        prop_assert!((0.0..=10.0).contains(&total));
    }

    #[test]
    fn prop_out_of_range_scores_rejected(score in prop_oneof![-100.0f64..-0.001, 10.001f64..100.0]) {
        prop_assert!(ScoreRecord::new(1, "clarity", score).is_err());
    }

    #[test]
    fn prop_scaled_weights_rejected(scale in prop_oneof![0.1f64..0.9, 1.1f64..3.0]) {
        let weights: Weights = default_weights()
            .into_iter()
            .map(|(dim, w)| (dim, w * scale))
            .collect();
        prop_assert!(validate_weights(&weights).is_err());
    }

    #[test]
    fn prop_learned_severity_never_decreases(requests in prop::collection::vec(severity(), 1..8)) {
        tokio_test::block_on(async {
            let dir = TempDir::new().unwrap();
            let store = ConstraintStore::open(
                dir.path().join("constraints.json"),
                WriteRetry::from_millis(1),
                Vec::new(),
            )
            .await
            .unwrap();
            let predicate = Predicate::MetricAtLeast {
                metric: "score.clarity".to_string(),
                min: 6.0,
            };

            let mut highest: Option<Severity> = None;
            for severity in requests {
                let constraint = Constraint::learned(
                    "learned.clarity.floor",
                    "clarity",
                    severity,
                    "clarity floor",
                    predicate.clone(),
                );
                let _ = store.add_learned(constraint).await;
                let stored = store.get("learned.clarity.floor").await.unwrap().severity;
                if let Some(prev) = highest {
                    assert!(stored >= prev);
                }
                highest = Some(stored);
            }
        });
    }

    #[test]
    fn prop_duplicate_events_count_once(kind in event_type(), copies in 1usize..6) {
        tokio_test::block_on(async {
            let dir = TempDir::new().unwrap();
            let ledger = HookEventLedger::open(dir.path().join("hooks.jsonl"), WriteRetry::from_millis(1))
                .await
                .unwrap();
            let event = HookEvent::new("hedging", kind, "draft.md#p3").in_run("run-1");

            let mut recorded = 0;
            for _ in 0..copies {
                if ledger.record(event.clone()).await.unwrap() == RecordOutcome::Recorded {
                    recorded += 1;
                }
            }
            assert_eq!(recorded, 1);
            assert_eq!(ledger.len().await, 1);

            let reopened = HookEventLedger::open(dir.path().join("hooks.jsonl"), WriteRetry::from_millis(1))
                .await
                .unwrap();
            assert_eq!(reopened.record(event).await.unwrap(), RecordOutcome::Duplicate);
        });
    }

    #[test]
    fn prop_checkpoint_roundtrips(
        completed in prop::option::of(0u32..8),
        artifacts in prop::collection::vec((0u32..8, "[a-z]{1,8}\\.md"), 0..6),
    ) {
        tokio_test::block_on(async {
            let dir = TempDir::new().unwrap();
            let store = CheckpointStore::new(dir.path().join("checkpoint.json"), WriteRetry::from_millis(1));
            let mut state = CheckpointState::new("run-1");
            state.last_completed_phase = completed;
            for (phase, artifact) in artifacts {
                state.record_artifact(phase, artifact);
            }

            store.save(&state).await.unwrap();
            let loaded = store.load().await.unwrap().into_option().unwrap();
            assert_eq!(loaded, state);
        });
    }
}
