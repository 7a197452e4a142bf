use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;

use super::*;
use crate::layout::ReorderPlan;
use crate::storage::memory::{MemoryStore, StoreCall};
use crate::types::{DealDraft, DealPatch, Priority};

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn column(id: &str, title: &str, position: i64) -> Column {
    Column {
        id: id.into(),
        title: title.into(),
        position,
    }
}

fn deal(id: &str, column_id: &str, position: i64) -> Deal {
    Deal {
        id: id.into(),
        column_id: Some(column_id.into()),
        title: format!("Deal {}", id),
        client_name: "Client".into(),
        priority: Priority::Medium,
        position,
        next_follow_up_date: None,
        reminder_at: None,
        amount: None,
        currency: Some("EUR".into()),
        tags: vec![],
    }
}

fn note(id: &str, deal_id: &str, body: &str, secs: i64) -> Note {
    Note {
        id: id.into(),
        deal_id: deal_id.into(),
        body: body.into(),
        created_at: Utc.timestamp_opt(secs, 0).unwrap(),
    }
}

fn reminder(id: &str, deal_id: &str, remind_at: NaiveDateTime) -> Reminder {
    Reminder {
        id: id.into(),
        deal_id: deal_id.into(),
        remind_at,
    }
}

fn seeded() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_data(
        vec![column("c1", "Prospect", 1), column("c2", "Won", 2)],
        vec![deal("d1", "c1", 1), deal("d2", "c1", 2)],
        vec![note("n1", "d1", "first call", 100)],
        vec![reminder("r1", "d1", at(1, 9))],
    ))
}

async fn loaded(store: &Arc<MemoryStore>) -> Session {
    let session = Session::new(store.clone(), SessionOptions::default());
    session.ensure_loaded().await.unwrap();
    session
}

fn ids(deals: &[Deal], column_id: &str) -> Vec<(String, i64)> {
    let mut rows: Vec<(String, i64)> = deals
        .iter()
        .filter(|d| d.in_column(column_id))
        .map(|d| (d.id.clone(), d.position))
        .collect();
    rows.sort_by_key(|(_, position)| *position);
    rows
}

fn ordered(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_ensure_loaded_fetches_once() {
    let store = seeded();
    let session = Session::new(store.clone(), SessionOptions::default());
    assert_eq!(session.load_state(), LoadState::Idle);

    session.ensure_loaded().await.unwrap();
    session.ensure_loaded().await.unwrap();
    assert_eq!(store.call_count(StoreCall::ListColumns), 1);
    assert_eq!(store.call_count(StoreCall::ListDeals), 1);
    assert!(session.is_hydrated());
    assert_eq!(session.load_state(), LoadState::Ready);

    session.refresh().await.unwrap();
    assert_eq!(store.call_count(StoreCall::ListColumns), 2);
}

#[tokio::test]
async fn test_load_failure_waits_for_refresh() {
    let store = seeded();
    store.fail_next(StoreCall::ListDeals, StorageError::Unavailable("offline".into()));
    let session = Session::new(store.clone(), SessionOptions::default());

    let err = session.ensure_loaded().await.unwrap_err();
    assert!(matches!(err, SessionError::Load(_)));
    assert!(matches!(session.load_state(), LoadState::Failed(_)));
    assert!(session.columns().is_empty());

    assert!(session.ensure_loaded().await.is_err());
    assert_eq!(store.call_count(StoreCall::ListDeals), 1);

    session.refresh().await.unwrap();
    assert_eq!(session.load_state(), LoadState::Ready);
    assert_eq!(session.columns().len(), 2);
}

#[tokio::test]
async fn test_activity_load_failure_yields_empty_log() {
    let store = seeded();
    store.fail_next(StoreCall::ListActivity, StorageError::Transport("reset".into()));
    let session = loaded(&store).await;
    assert!(session.activity().is_empty());
    assert_eq!(session.load_state(), LoadState::Ready);
    assert_eq!(session.deals().len(), 2);
}

// ---------------------------------------------------------------------------
// Creates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_add_deal_into_empty_column() {
    let store = Arc::new(MemoryStore::with_data(
        vec![column("c1", "Prospect", 1)],
        vec![],
        vec![],
        vec![],
    ));
    let session = loaded(&store).await;

    let draft = DealDraft {
        title: Some("Acme".into()),
        client_name: Some("Jane".into()),
        ..Default::default()
    };
    let created = session.add_deal("c1", draft).await.unwrap();

    let deals = session.deals();
    assert_eq!(deals.len(), 1);
    let view = &deals[0];
    assert_eq!(view.id(), created.id);
    assert!(!is_tentative(view.id()));
    assert_eq!(view.deal.column_id.as_deref(), Some("c1"));
    assert_eq!(view.deal.position, 1);
    assert_eq!(view.deal.priority, Priority::Medium);
    assert_eq!(view.deal.title, "Acme");
    assert_eq!(view.deal.client_name, "Jane");
    assert_eq!(view.deal.currency.as_deref(), Some("EUR"));
    assert_eq!(store.deals().len(), 1);
}

#[tokio::test]
async fn test_add_deal_defaults_blank_fields() {
    let store = seeded();
    let session = loaded(&store).await;
    let draft = DealDraft {
        title: Some("   ".into()),
        ..Default::default()
    };
    let created = session.add_deal("c1", draft).await.unwrap();
    assert_eq!(created.title, "New deal");
    assert_eq!(created.client_name, "Client");
    assert_eq!(created.position, 3);
}

#[tokio::test]
async fn test_add_deal_failure_restores_previous_state() {
    let store = seeded();
    let session = loaded(&store).await;
    let before = session.snapshot();

    store.fail_next(
        StoreCall::InsertDeal,
        StorageError::Rejected {
            status: 500,
            message: "boom".into(),
        },
    );
    let err = session
        .add_deal("c1", DealDraft::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Storage(_)));

    let after = session.snapshot();
    assert_eq!(after.columns, before.columns);
    assert_eq!(after.deals, before.deals);
    assert_eq!(after.notes, before.notes);
    assert_eq!(after.reminders, before.reminders);
    assert_eq!(after.activity, before.activity);
    assert!(after.last_error.unwrap().contains("boom"));
}

#[tokio::test]
async fn test_add_deal_stores_draft_note_and_reminder() {
    let store = seeded();
    let session = loaded(&store).await;
    let draft = DealDraft {
        title: Some("Globex".into()),
        notes: Some("intro call".into()),
        reminder_at: Some(at(3, 14)),
        ..Default::default()
    };
    let created = session.add_deal("c2", draft).await.unwrap();

    let view = session.deal(&created.id).unwrap();
    assert_eq!(view.notes.as_deref(), Some("intro call"));
    assert_eq!(view.reminder_at, Some(at(3, 14)));
    assert_eq!(session.notes_for(&created.id).len(), 1);
    assert_eq!(store.reminders().len(), 2);
}

#[tokio::test]
async fn test_add_deal_keeps_deal_when_draft_note_fails() {
    let store = seeded();
    let session = loaded(&store).await;
    store.fail_next(StoreCall::InsertNote, StorageError::Transport("reset".into()));
    let draft = DealDraft {
        title: Some("Initech".into()),
        notes: Some("lost".into()),
        ..Default::default()
    };
    assert!(session.add_deal("c1", draft).await.is_err());
    assert_eq!(session.deals().len(), 3);
    assert_eq!(store.deals().len(), 3);
    assert!(session.last_error().is_some());
}

#[tokio::test]
async fn test_add_column_appends_and_logs_activity() {
    let store = seeded();
    let session = loaded(&store).await;
    let created = session.add_column("  Negotiation ").await.unwrap();
    assert_eq!(created.title, "Negotiation");
    assert_eq!(created.position, 3);

    let activity = session.activity();
    assert_eq!(activity.len(), 1);
    assert_eq!(
        activity[0].kind,
        ActivityKind::ColumnCreated {
            title: "Negotiation".into()
        }
    );
    assert_eq!(store.activity().len(), 1);
    assert!(matches!(
        session.add_column(" ").await,
        Err(SessionError::EmptyTitle)
    ));
}

#[tokio::test]
async fn test_activity_failure_is_swallowed() {
    let store = seeded();
    let session = loaded(&store).await;
    store.fail_next(StoreCall::InsertActivity, StorageError::Unavailable("down".into()));

    session.add_column("Lost").await.unwrap();
    assert_eq!(session.columns().len(), 3);
    assert_eq!(store.columns().len(), 3);
    assert_eq!(session.last_error(), None);
    assert_eq!(session.activity().len(), 1);
    assert!(store.activity().is_empty());
}

#[tokio::test]
async fn test_finished_create_is_not_reinserted_after_reload() {
    let store = seeded();
    let session = loaded(&store).await;
    let gate = store.hold_next(StoreCall::InsertDeal);

    let (created, _) = tokio::join!(session.add_deal("c1", DealDraft::default()), async {
        assert_eq!(session.deals().len(), 3);
        session.refresh().await.unwrap();
        gate.notify_one();
    });

    assert!(created.is_ok());
    assert_eq!(session.deals().len(), 2);
    assert_eq!(store.deals().len(), 3);
}

// ---------------------------------------------------------------------------
// Edits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_concurrent_edits_roll_back_independently() {
    let store = seeded();
    let session = loaded(&store).await;

    store.fail_next(
        StoreCall::UpdateDeal,
        StorageError::Rejected {
            status: 409,
            message: "conflict".into(),
        },
    );
    let gate = store.hold_next(StoreCall::UpdateDeal);

    let failing = DealPatch {
        title: Some("Renamed d1".into()),
        ..Default::default()
    };
    let succeeding = DealPatch {
        title: Some("Renamed d2".into()),
        ..Default::default()
    };
    let (first, second) = tokio::join!(session.save_deal("d1", failing), async {
        let result = session.save_deal("d2", succeeding).await;
        assert_eq!(session.deal("d1").unwrap().deal.title, "Renamed d1");
        gate.notify_one();
        result
    });

    assert!(first.is_err());
    assert!(second.is_ok());
    assert_eq!(session.deal("d1").unwrap().deal.title, "Deal d1");
    assert_eq!(session.deal("d2").unwrap().deal.title, "Renamed d2");
}

#[tokio::test]
async fn test_save_deal_updates_latest_note_in_place() {
    let store = seeded();
    let session = loaded(&store).await;

    let patch = DealPatch {
        notes: Some("second call".into()),
        ..Default::default()
    };
    session.save_deal("d1", patch).await.unwrap();
    let notes = session.notes_for("d1");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, "n1");
    assert_eq!(session.deal("d1").unwrap().notes.as_deref(), Some("second call"));

    let patch = DealPatch {
        notes: Some("hello".into()),
        ..Default::default()
    };
    session.save_deal("d2", patch).await.unwrap();
    let notes = session.notes_for("d2");
    assert_eq!(notes.len(), 1);
    assert!(!is_tentative(&notes[0].id));
}

#[tokio::test]
async fn test_save_deal_upserts_canonical_reminder() {
    let store = seeded();
    let session = loaded(&store).await;

    let patch = DealPatch {
        reminder_at: Some(at(7, 10)),
        ..Default::default()
    };
    session.save_deal("d1", patch).await.unwrap();
    assert_eq!(session.deal("d1").unwrap().reminder_at, Some(at(7, 10)));
    assert_eq!(session.reminders().len(), 1);
    assert_eq!(store.reminders()[0].remind_at, at(7, 10));

    let patch = DealPatch {
        reminder_at: Some(at(8, 11)),
        ..Default::default()
    };
    session.save_deal("d2", patch).await.unwrap();
    let reminders = session.reminders();
    assert_eq!(reminders.len(), 2);
    assert_eq!(reminders[1].deal_id, "d2");
    assert!(!is_tentative(&reminders[1].id));
}

#[tokio::test]
async fn test_failed_reminder_keeps_deal_edit() {
    let store = seeded();
    let session = loaded(&store).await;
    store.fail_next(StoreCall::UpsertReminder, StorageError::Transport("reset".into()));

    let patch = DealPatch {
        title: Some("Acme Corp".into()),
        reminder_at: Some(at(9, 9)),
        ..Default::default()
    };
    assert!(session.save_deal("d1", patch).await.is_err());

    let view = session.deal("d1").unwrap();
    assert_eq!(view.deal.title, "Acme Corp");
    assert_eq!(view.reminder_at, Some(at(1, 9)));
    assert_eq!(store.deals()[0].title, "Acme Corp");
    assert!(session.last_error().is_some());
}

#[tokio::test]
async fn test_failed_deal_edit_undoes_note_and_reminder() {
    let store = seeded();
    let session = loaded(&store).await;
    let before = session.snapshot();
    store.fail_next(StoreCall::UpdateDeal, StorageError::Unavailable("down".into()));

    let patch = DealPatch {
        priority: Some(Priority::High),
        notes: Some("changed".into()),
        reminder_at: Some(at(2, 8)),
        ..Default::default()
    };
    assert!(session.save_deal("d1", patch).await.is_err());
    let after = session.snapshot();
    assert_eq!(after.deals, before.deals);
    assert_eq!(after.notes, before.notes);
    assert_eq!(after.reminders, before.reminders);
    assert_eq!(store.call_count(StoreCall::UpdateNote), 0);
}

#[tokio::test]
async fn test_column_change_appends_to_target_column() {
    let store = Arc::new(MemoryStore::with_data(
        vec![column("c1", "Prospect", 1), column("c2", "Won", 2)],
        vec![deal("d1", "c1", 1), deal("d2", "c1", 2), deal("d3", "c2", 1)],
        vec![],
        vec![],
    ));
    let session = loaded(&store).await;
    let patch = DealPatch {
        column_id: Some("c2".into()),
        ..Default::default()
    };
    session.save_deal("d1", patch).await.unwrap();

    let expected = vec![("d3".to_string(), 1), ("d1".to_string(), 2)];
    assert_eq!(ids(&session.snapshot().deals, "c2"), expected);
    assert_eq!(ids(&store.deals(), "c2"), expected);
    assert_eq!(ids(&store.deals(), "c1"), vec![("d2".to_string(), 2)]);
}

#[tokio::test]
async fn test_failed_column_change_restores_position() {
    let store = Arc::new(MemoryStore::with_data(
        vec![column("c1", "Prospect", 1), column("c2", "Won", 2)],
        vec![deal("d1", "c1", 1), deal("d3", "c2", 1)],
        vec![],
        vec![],
    ));
    let session = loaded(&store).await;
    store.fail_next(StoreCall::UpdateDeal, StorageError::Unavailable("down".into()));
    let patch = DealPatch {
        column_id: Some("c2".into()),
        ..Default::default()
    };
    assert!(session.save_deal("d1", patch).await.is_err());

    let deals = session.snapshot().deals;
    assert_eq!(ids(&deals, "c1"), vec![("d1".to_string(), 1)]);
    assert_eq!(ids(&deals, "c2"), vec![("d3".to_string(), 1)]);
}

#[tokio::test]
async fn test_tentative_targets_are_rejected() {
    let store = seeded();
    let session = loaded(&store).await;
    let gate = store.hold_next(StoreCall::InsertDeal);

    let (created, rejected) = tokio::join!(session.add_deal("c1", DealDraft::default()), async {
        let temp_id = session.snapshot().deals.last().unwrap().id.clone();
        assert!(is_tentative(&temp_id));
        let result = session
            .save_deal(
                &temp_id,
                DealPatch {
                    title: Some("too early".into()),
                    ..Default::default()
                },
            )
            .await;
        gate.notify_one();
        result
    });

    assert!(created.is_ok());
    assert!(matches!(rejected, Err(SessionError::Pending(_))));
    assert_eq!(store.call_count(StoreCall::UpdateDeal), 0);
}

#[tokio::test]
async fn test_edit_column_rolls_back_title() {
    let store = seeded();
    let session = loaded(&store).await;
    store.fail_next(StoreCall::UpdateColumn, StorageError::Unavailable("down".into()));
    assert!(session.edit_column("c1", "Leads").await.is_err());
    assert_eq!(session.columns()[0].title, "Prospect");

    session.edit_column("c1", "Leads").await.unwrap();
    assert_eq!(session.columns()[0].title, "Leads");
    assert_eq!(store.columns()[0].title, "Leads");
}

// ---------------------------------------------------------------------------
// Reorders
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_reorder_within_column() {
    let store = seeded();
    let session = loaded(&store).await;
    session
        .reorder_deals("c1", &ordered(&["d2", "d1"]))
        .await
        .unwrap();
    assert_eq!(
        ids(&session.snapshot().deals, "c1"),
        vec![("d2".to_string(), 1), ("d1".to_string(), 2)]
    );
    assert_eq!(
        ids(&store.deals(), "c1"),
        vec![("d2".to_string(), 1), ("d1".to_string(), 2)]
    );
}

#[tokio::test]
async fn test_board_shows_pending_deal_in_its_column() {
    let store = seeded();
    let session = loaded(&store).await;
    let gate = store.hold_next(StoreCall::InsertDeal);

    let (created, board) = tokio::join!(session.add_deal("c1", DealDraft::default()), async {
        let board = session.board();
        gate.notify_one();
        board
    });

    created.unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].column_id, "c1");
    assert_eq!(board[0].deals.len(), 3);
    assert!(is_tentative(board[0].deals[2].id()));
    assert!(board[1].deals.is_empty());

    let filter = crate::filter::DealFilter::compile(&Default::default());
    let visible = session.visible_board(&filter, false);
    assert_eq!(visible[0].deal_ids().len(), 3);
    assert!(visible[0].deal_ids().iter().all(|id| !is_tentative(id)));
}

#[tokio::test]
async fn test_partial_reorder_keeps_unlisted_deals_after_listed() {
    let store = Arc::new(MemoryStore::with_data(
        vec![column("c1", "Prospect", 1)],
        vec![deal("d1", "c1", 1), deal("d2", "c1", 2), deal("d3", "c1", 3)],
        vec![],
        vec![],
    ));
    let session = loaded(&store).await;
    session.reorder_deals("c1", &ordered(&["d3"])).await.unwrap();

    let expected = vec![
        ("d3".to_string(), 1),
        ("d1".to_string(), 2),
        ("d2".to_string(), 3),
    ];
    assert_eq!(ids(&session.snapshot().deals, "c1"), expected);
    assert_eq!(ids(&store.deals(), "c1"), expected);
}

#[tokio::test]
async fn test_reorder_empty_then_move_to_other_column() {
    let store = Arc::new(MemoryStore::with_data(
        vec![column("c1", "Prospect", 1), column("c2", "Won", 2)],
        vec![deal("d1", "c1", 1)],
        vec![],
        vec![],
    ));
    let session = loaded(&store).await;
    session.reorder_deals("c1", &[]).await.unwrap();
    session.reorder_deals("c2", &ordered(&["d1"])).await.unwrap();

    let deals = session.snapshot().deals;
    assert!(ids(&deals, "c1").is_empty());
    assert_eq!(ids(&deals, "c2"), vec![("d1".to_string(), 1)]);
}

#[tokio::test]
async fn test_cross_column_move_rolls_back_both_lists() {
    let store = seeded();
    let session = loaded(&store).await;
    let before = session.snapshot().deals;

    store.fail_next(
        StoreCall::UpdateDealPositions,
        StorageError::Rejected {
            status: 400,
            message: "bad batch".into(),
        },
    );
    let plan = ReorderPlan::Move {
        moved_id: "d1".into(),
        source_column: "c1".into(),
        source_ids: ordered(&["d2"]),
        target_column: "c2".into(),
        target_ids: ordered(&["d1"]),
    };
    assert!(session.apply_reorder(plan).await.is_err());
    assert_eq!(session.snapshot().deals, before);
    assert_eq!(store.call_count(StoreCall::UpdateDealPositions), 2);
}

#[tokio::test]
async fn test_cross_column_move_commits_both_lists() {
    let store = seeded();
    let session = loaded(&store).await;
    let plan = ReorderPlan::Move {
        moved_id: "d1".into(),
        source_column: "c1".into(),
        source_ids: ordered(&["d2"]),
        target_column: "c2".into(),
        target_ids: ordered(&["d1"]),
    };
    session.apply_reorder(plan).await.unwrap();

    let deals = session.snapshot().deals;
    assert_eq!(ids(&deals, "c1"), vec![("d2".to_string(), 1)]);
    assert_eq!(ids(&deals, "c2"), vec![("d1".to_string(), 1)]);
    let timeline = session.activity_for_deal("d1");
    assert_eq!(timeline.len(), 1);
    assert_eq!(
        timeline[0].kind,
        ActivityKind::DealMoved {
            ordered_ids: ordered(&["d1"])
        }
    );
}

#[tokio::test]
async fn test_reorder_rejects_unknown_deal() {
    let store = seeded();
    let session = loaded(&store).await;
    let err = session
        .reorder_deals("c1", &ordered(&["d2", "ghost"]))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::UnknownDeal(id) if id == "ghost"));
    assert_eq!(store.call_count(StoreCall::UpdateDealPositions), 0);
    assert_eq!(ids(&session.snapshot().deals, "c1")[0].0, "d1");
}

// ---------------------------------------------------------------------------
// Deletes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_remove_column_cascades_and_rolls_back() {
    let store = seeded();
    let session = loaded(&store).await;
    let before = session.snapshot();

    store.fail_next(StoreCall::DeleteColumn, StorageError::Unavailable("down".into()));
    assert!(session.remove_column("c1").await.is_err());
    let restored = session.snapshot();
    assert_eq!(restored.columns, before.columns);
    assert_eq!(restored.deals, before.deals);
    assert_eq!(restored.notes, before.notes);
    assert_eq!(restored.reminders, before.reminders);

    session.remove_column("c1").await.unwrap();
    let after = session.snapshot();
    assert_eq!(after.columns.len(), 1);
    assert!(after.deals.is_empty());
    assert!(after.notes.is_empty());
    assert!(after.reminders.is_empty());
}

#[tokio::test]
async fn test_remove_deal_drops_children() {
    let store = seeded();
    let session = loaded(&store).await;
    session.remove_deal("d1").await.unwrap();
    assert!(session.deal("d1").is_none());
    assert!(session.notes_for("d1").is_empty());
    assert!(session.reminders().is_empty());
    assert!(matches!(
        session.remove_deal("d1").await,
        Err(SessionError::UnknownDeal(_))
    ));
}

// ---------------------------------------------------------------------------
// Notes and reminders
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_note_lifecycle() {
    let store = seeded();
    let session = loaded(&store).await;
    let created = session.add_note("d2", "sent quote").await.unwrap();
    assert_eq!(session.deal("d2").unwrap().notes.as_deref(), Some("sent quote"));

    session.edit_note(&created.id, "sent revised quote").await.unwrap();
    assert_eq!(
        session.deal("d2").unwrap().notes.as_deref(),
        Some("sent revised quote")
    );

    store.fail_next(StoreCall::DeleteNote, StorageError::Unavailable("down".into()));
    assert!(session.remove_note(&created.id).await.is_err());
    assert_eq!(session.notes_for("d2").len(), 1);

    session.remove_note(&created.id).await.unwrap();
    assert_eq!(session.deal("d2").unwrap().notes, None);
}

#[tokio::test]
async fn test_edit_reminder_becomes_canonical_and_rolls_back() {
    let store = seeded();
    let session = loaded(&store).await;
    let second = session.add_reminder("d1", at(4, 16)).await.unwrap();
    assert_eq!(session.deal("d1").unwrap().reminder_at, Some(at(4, 16)));

    session.edit_reminder("r1", at(5, 9)).await.unwrap();
    assert_eq!(session.deal("d1").unwrap().reminder_at, Some(at(5, 9)));

    let before = session.reminders();
    store.fail_next(StoreCall::UpdateReminder, StorageError::Unavailable("down".into()));
    assert!(session.edit_reminder(&second.id, at(6, 9)).await.is_err());
    assert_eq!(session.reminders(), before);
}

#[tokio::test]
async fn test_move_reminder_keeps_time_of_day() {
    let store = seeded();
    let session = loaded(&store).await;
    let target = NaiveDate::from_ymd_opt(2024, 6, 12).unwrap();
    session.move_reminder_to_date("r1", target).await.unwrap();
    assert_eq!(
        session.reminders()[0].remind_at,
        target.and_hms_opt(9, 0, 0).unwrap()
    );
    assert!(matches!(
        session.move_reminder_to_date("nope", target).await,
        Err(SessionError::UnknownReminder(_))
    ));
}

#[tokio::test]
async fn test_deal_timeline_is_newest_first() {
    let store = seeded();
    let session = loaded(&store).await;
    session.add_note("d1", "one").await.unwrap();
    session.remove_reminder("r1").await.unwrap();
    let kinds: Vec<&'static str> = session
        .activity_for_deal("d1")
        .iter()
        .map(|e| e.kind.wire_type())
        .collect();
    assert_eq!(kinds, vec!["reminder_deleted", "note_created"]);
}
