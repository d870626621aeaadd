//! Engine behaviour over real history backends

use smig::engine::{EngineError, MigrationState, Target, Verdict};
use smig::{Direction, HistoryStore, Registry};

use crate::helpers::*;

#[test]
fn builtin_up_then_down_returns_to_zero() {
    let ws = Workspace::new();
    let mut engine = ws.engine(Registry::builtin().unwrap());
    assert!(engine.init().unwrap());

    let report = engine.up(Target::All).unwrap();
    assert_eq!(report.count(), 2);
    assert_eq!(engine.current_version(), Some("002_add_index"));
    assert!(has_table(engine.schema(), "contact_messages"));
    assert_eq!(contact_index_count(engine.schema()), 3);

    let report = engine.down(Target::Count(1)).unwrap();
    assert_eq!(report.completed[0].identity, "002_add_index");
    assert_eq!(contact_index_count(engine.schema()), 0);
    assert_eq!(engine.current_version(), Some("001_init"));

    engine.down(Target::Count(1)).unwrap();
    assert_eq!(engine.current_version(), None);
    assert!(!has_table(engine.schema(), "contact_messages"));
    assert!(engine
        .status()
        .entries
        .iter()
        .all(|e| e.state == MigrationState::Pending));
}

#[test]
fn up_one_at_a_time() {
    let ws = Workspace::new();
    let mut engine = ws.engine(Registry::builtin().unwrap());
    engine.init().unwrap();

    let first = engine.up(Target::Count(1)).unwrap();
    assert_eq!(first.completed[0].identity, "001_init");
    let second = engine.up(Target::Count(1)).unwrap();
    assert_eq!(second.completed[0].identity, "002_add_index");
    let third = engine.up(Target::Count(1)).unwrap();
    assert!(third.is_noop());
    assert_eq!(third.shortfall, 1);
}

#[test]
fn second_up_applies_nothing() {
    let mut engine = memory_engine(registry_of(
        identities(3).iter().map(|id| table_migration(id)).collect(),
    ));
    assert_eq!(engine.up(Target::All).unwrap().count(), 3);
    assert!(engine.up(Target::All).unwrap().is_noop());
}

#[test]
fn history_survives_reopen() {
    let ws = Workspace::new();
    {
        let mut engine = ws.engine(Registry::builtin().unwrap());
        engine.init().unwrap();
        engine.up(Target::Count(1)).unwrap();
    }
    let engine = ws.engine(Registry::builtin().unwrap());
    assert_eq!(engine.current_version(), Some("001_init"));
    assert_eq!(engine.pending().len(), 1);
    assert!(engine.is_up_to_date("001_init"));
}

#[test]
fn forward_failure_keeps_earlier_records() {
    for k in 1..=4 {
        let ids = identities(4);
        let migrations = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                if i + 1 == k {
                    failing_migration(id)
                } else {
                    table_migration(id)
                }
            })
            .collect();
        let mut engine = memory_engine(registry_of(migrations));

        let err = engine.up(Target::All).unwrap_err();
        assert_eq!(err.completed.len(), k - 1, "failure at {k}");
        assert_eq!(err.failed_identity(), Some(ids[k - 1].as_str()));
        assert!(matches!(
            err.error,
            EngineError::ActionFailure {
                direction: Direction::Up,
                ..
            }
        ));

        let applied = engine.history().applied();
        assert_eq!(applied.len(), k - 1);
        for (record, id) in applied.iter().zip(&ids) {
            assert_eq!(&record.identity, id);
        }
        assert!(applied.windows(2).all(|w| w[0].applied_at <= w[1].applied_at));
        assert!(engine.history().intent().is_none());
    }
}

#[test]
fn down_reverts_most_recent_first() {
    let mut engine = memory_engine(registry_of(
        identities(3).iter().map(|id| table_migration(id)).collect(),
    ));
    engine.up(Target::All).unwrap();

    let report = engine.down(Target::Count(2)).unwrap();
    let reverted: Vec<_> = report.completed.iter().map(|r| r.identity.as_str()).collect();
    assert_eq!(reverted, vec!["003_m", "002_m"]);
    assert_eq!(report.shortfall, 0);
}

#[test]
fn down_past_zero_reports_shortfall() {
    let mut engine = memory_engine(registry_of(vec![table_migration("001_m")]));
    engine.up(Target::All).unwrap();

    let report = engine.down(Target::Count(3)).unwrap();
    assert_eq!(report.count(), 1);
    assert_eq!(report.shortfall, 2);
    assert_eq!(report.final_version, None);
}

#[test]
fn down_over_orphan_leaves_history_unchanged() {
    let ws = Workspace::new();
    {
        let mut history = ws.history();
        history.init().unwrap();
        history.record("001_m").unwrap();
        history.record("009_removed").unwrap();
    }
    let before = std::fs::read_to_string(ws.history_path()).unwrap();

    let mut engine = ws.engine(registry_of(vec![table_migration("001_m")]));
    let err = engine.down(Target::Count(1)).unwrap_err();
    assert!(matches!(
        err.error,
        EngineError::IrreversibleOrphan { ref identity } if identity == "009_removed"
    ));
    assert!(err.completed.is_empty());
    assert_eq!(engine.history().applied().len(), 2);
    assert_eq!(std::fs::read_to_string(ws.history_path()).unwrap(), before);

    let status = engine.status();
    assert_eq!(status.orphans.len(), 1);
    assert_eq!(status.orphans[0].identity, "009_removed");
}

#[test]
fn up_refuses_history_with_a_hole() {
    let ws = Workspace::new();
    {
        let mut history = ws.history();
        history.init().unwrap();
        history.record("002_m").unwrap();
    }
    let mut engine = ws.engine(registry_of(
        identities(3).iter().map(|id| table_migration(id)).collect(),
    ));
    let err = engine.up(Target::All).unwrap_err();
    assert!(matches!(err.error, EngineError::Inconsistent { .. }));
    assert!(!engine.status().inconsistencies.is_empty());
}

#[test]
fn crash_between_action_and_record_is_reported_after_restart() {
    let ws = Workspace::new();
    {
        let mut engine = ws.engine(Registry::builtin().unwrap());
        engine.init().unwrap();
        engine.up(Target::Count(1)).unwrap();
    }
    // A process that died after starting 002_add_index.
    {
        let mut history = ws.history();
        history.begin("002_add_index", Direction::Up).unwrap();
    }

    let mut engine = ws.engine(Registry::builtin().unwrap());
    let intent = engine.status().interrupted.expect("intent survives restart");
    assert_eq!(intent.identity, "002_add_index");
    assert_eq!(intent.direction, Direction::Up);
    assert!(matches!(
        engine.up(Target::All).unwrap_err().error,
        EngineError::Interrupted { .. }
    ));
    assert!(matches!(
        engine.down(Target::All).unwrap_err().error,
        EngineError::Interrupted { .. }
    ));

    // The index was never created, so the migration did not happen.
    let resolution = engine.resolve(Verdict::Reverted).unwrap();
    assert!(!resolution.history_changed);
    assert!(engine.status().interrupted.is_none());

    let report = engine.up(Target::All).unwrap();
    assert_eq!(report.completed[0].identity, "002_add_index");
    assert_eq!(contact_index_count(engine.schema()), 3);
}

#[test]
fn status_reports_reversibility_and_timestamps() {
    let mut engine = memory_engine(registry_of(vec![
        table_migration("001_m"),
        smig::Migration::new("002_m", "one way", smig::Action::sql("CREATE TABLE one_way (id INTEGER);")),
    ]));
    engine.up(Target::Count(1)).unwrap();

    let status = engine.status();
    assert!(status.initialized);
    assert_eq!(status.applied_count(), 1);
    assert_eq!(status.pending_count(), 1);
    assert!(status.entries[0].reversible);
    assert!(!status.entries[1].reversible);
    assert!(matches!(
        status.entries[0].state,
        MigrationState::Applied { order_index: 1, .. }
    ));
    assert!(!status.is_clean());
}
