use std::collections::HashSet;

use super::undo::{replace_by_id, take_where, Record, RecordKind, UndoLog};
use super::{Session, SessionError, SessionState};
use crate::layout::ReorderPlan;
use crate::merge::derived::latest_note_by_deal;
use crate::merge::{is_tentative, tentative_id};
use crate::storage::{NewDeal, PositionUpdate};
use crate::types::{ActivityKind, Deal, DealDraft, DealPatch, Note, Reminder};

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reminder written optimistically by `save_deal`.
struct StagedReminder {
    local_id: String,
}

/// Note written optimistically by `save_deal`: `existing` is the stored
/// id to update, `None` means a tentative note to insert.
struct StagedNote {
    local_id: String,
    existing: Option<String>,
}

impl Session {
    /// Create a deal at the bottom of a column. Draft note text and
    /// reminder are stored once the deal has its real id.
    pub async fn add_deal(&self, column_id: &str, draft: DealDraft) -> Result<Deal, SessionError> {
        Self::ensure_settled(column_id)?;

        let temp_id = tentative_id();
        let mut undo = UndoLog::new();
        let new = {
            let mut state = self.write();
            if !state.data.columns.iter().any(|c| c.id == column_id) {
                return Err(SessionError::UnknownColumn(column_id.to_string()));
            }
            let position = next_position(&state.data.deals, column_id);
            let new = NewDeal {
                column_id: column_id.to_string(),
                title: non_blank(draft.title.as_deref())
                    .unwrap_or_else(|| self.options.default_deal_title.clone()),
                client_name: non_blank(draft.client_name.as_deref())
                    .unwrap_or_else(|| self.options.default_client_name.clone()),
                priority: draft.priority.unwrap_or_default(),
                position,
                amount: draft.amount,
                currency: Some(
                    non_blank(draft.currency.as_deref())
                        .unwrap_or_else(|| self.options.default_currency.clone()),
                ),
                tags: draft.tags.clone(),
            };
            state.data.deals.push(Deal {
                id: temp_id.clone(),
                column_id: Some(new.column_id.clone()),
                title: new.title.clone(),
                client_name: new.client_name.clone(),
                priority: new.priority,
                position,
                next_follow_up_date: draft.next_follow_up_date,
                reminder_at: draft.reminder_at,
                amount: new.amount,
                currency: new.currency.clone(),
                tags: new.tags.clone(),
            });
            undo.inserted(RecordKind::Deal, &temp_id);
            new
        };

        let mut row = match self.store.insert_deal(&new).await {
            Ok(row) => row,
            Err(err) => return Err(self.rollback(undo, err, "add_deal")),
        };
        row.next_follow_up_date = row.next_follow_up_date.or(draft.next_follow_up_date);
        row.reminder_at = row.reminder_at.or(draft.reminder_at);

        let present = replace_by_id(&mut self.write().data.deals, &temp_id, row.clone());
        self.record(
            ActivityKind::DealCreated {
                title: row.title.clone(),
            },
            Some(&row.id),
            row.column_id.as_deref(),
        )
        .await;
        if !present {
            log::debug!("[dealflow.session] Deal {} vanished before insert returned", temp_id);
            return Ok(row);
        }

        let mut first_error = None;
        if let Some(body) = non_blank(draft.notes.as_deref()) {
            match self.store.insert_note(&row.id, &body).await {
                Ok(note) => self.write().data.notes.push(note),
                Err(err) => first_error = Some(self.surface(err, "add_deal note")),
            }
        }
        if let Some(remind_at) = draft.reminder_at {
            match self.store.insert_reminder(&row.id, remind_at).await {
                Ok(reminder) => self.write().data.reminders.push(reminder),
                Err(err) => {
                    let err = self.surface(err, "add_deal reminder");
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(row),
        }
    }

    /// Apply an edit. Note text goes to the latest note (or a new one),
    /// `reminder_at` is upserted as the deal's reminder. When only those
    /// follow-up writes fail, the deal edit stays and they are rolled back.
    pub async fn save_deal(&self, id: &str, mut patch: DealPatch) -> Result<(), SessionError> {
        Self::ensure_settled(id)?;
        if let Some(column_id) = &patch.column_id {
            Self::ensure_settled(column_id)?;
        }

        let mut deal_undo = UndoLog::new();
        let mut note_undo = UndoLog::new();
        let mut reminder_undo = UndoLog::new();
        let (staged_note, staged_reminder) = {
            let mut state = self.write();
            let index = state
                .data
                .deals
                .iter()
                .position(|d| d.id == id)
                .ok_or_else(|| SessionError::UnknownDeal(id.to_string()))?;
            if let Some(column_id) = &patch.column_id {
                if !state.data.columns.iter().any(|c| &c.id == column_id) {
                    return Err(SessionError::UnknownColumn(column_id.clone()));
                }
            }
            let latest_note = latest_note_by_deal(&state.data.notes)
                .get(id)
                .map(|n| n.id.clone());
            if let Some(note_id) = latest_note.as_deref().filter(|n| is_tentative(n)) {
                if patch.note_text().is_some() {
                    return Err(SessionError::Pending(note_id.to_string()));
                }
            }

            // A column change appends the deal to its new column.
            let position = match &patch.column_id {
                Some(column_id) if !state.data.deals[index].in_column(column_id) => {
                    Some(next_position(&state.data.deals, column_id))
                }
                _ => None,
            };
            patch.position = position;

            let deal = &mut state.data.deals[index];
            deal_undo.replaced(index, Record::Deal(deal.clone()));
            patch.apply_to(deal);

            let staged_note = patch
                .note_text()
                .map(|body| stage_note(&mut state, id, latest_note, body, &mut note_undo));
            let staged_reminder = patch
                .reminder_at
                .map(|at| stage_reminder(&mut state, id, at, &mut reminder_undo));
            (staged_note, staged_reminder)
        };

        if let Err(err) = self.store.update_deal(id, &patch).await {
            deal_undo.extend(note_undo);
            deal_undo.extend(reminder_undo);
            return Err(self.rollback(deal_undo, err, "save_deal"));
        }
        let title = self
            .read()
            .data
            .deals
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.title.clone())
            .unwrap_or_default();
        self.record(ActivityKind::DealUpdated { title }, Some(id), None)
            .await;

        let mut first_error = None;
        if let (Some(staged), Some(body)) = (staged_note, patch.note_text()) {
            let result = match &staged.existing {
                Some(note_id) => self.store.update_note(note_id, body).await,
                None => self.store.insert_note(id, body).await,
            };
            match result {
                Ok(note) => {
                    replace_by_id(&mut self.write().data.notes, &staged.local_id, note);
                }
                Err(err) => first_error = Some(self.rollback(note_undo, err, "save_deal note")),
            }
        }
        if let (Some(staged), Some(remind_at)) = (staged_reminder, patch.reminder_at) {
            match self.store.upsert_reminder_for_deal(id, remind_at).await {
                Ok(reminder) => {
                    let mut state = self.write();
                    let reminders = &mut state.data.reminders;
                    reminders.retain(|r| r.id != staged.local_id && r.id != reminder.id);
                    reminders.push(reminder);
                }
                Err(err) => {
                    let err = self.rollback(reminder_undo, err, "save_deal reminder");
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Delete a deal along with its notes and reminders.
    pub async fn remove_deal(&self, id: &str) -> Result<(), SessionError> {
        Self::ensure_settled(id)?;

        let mut undo = UndoLog::new();
        let column_id = {
            let mut state = self.write();
            let data = &mut state.data;
            let column_id = data
                .deals
                .iter()
                .find(|d| d.id == id)
                .ok_or_else(|| SessionError::UnknownDeal(id.to_string()))?
                .column_id
                .clone();
            take_where(&mut data.deals, &mut undo, Record::Deal, |d| d.id == id);
            take_where(&mut data.notes, &mut undo, Record::Note, |n| n.deal_id == id);
            take_where(&mut data.reminders, &mut undo, Record::Reminder, |r| {
                r.deal_id == id
            });
            column_id
        };

        if let Err(err) = self.store.delete_deal(id).await {
            return Err(self.rollback(undo, err, "remove_deal"));
        }
        self.record(ActivityKind::DealDeleted, Some(id), column_id.as_deref())
            .await;
        Ok(())
    }

    /// Put `ordered_ids` at the top of `column_id` in that order, moving
    /// each listed deal into the column. Unlisted deals of the column keep
    /// their relative order below them and positions become 1..=n.
    pub async fn reorder_deals(
        &self,
        column_id: &str,
        ordered_ids: &[String],
    ) -> Result<(), SessionError> {
        let mut undo = UndoLog::new();
        let updates = {
            let mut state = self.write();
            validate_order(&state, column_id, ordered_ids)?;
            stage_order(&mut state, column_id, ordered_ids, &mut undo)
        };

        if let Err(err) = self.store.update_deal_positions(&updates).await {
            return Err(self.rollback(undo, err, "reorder_deals"));
        }
        if !ordered_ids.is_empty() {
            self.record(
                ActivityKind::DealMoved {
                    ordered_ids: ordered_ids.to_vec(),
                },
                None,
                Some(column_id),
            )
            .await;
        }
        Ok(())
    }

    /// Commit a drag. A cross-column move writes both columns at once and
    /// rolls both back if either write fails.
    pub async fn apply_reorder(&self, plan: ReorderPlan) -> Result<(), SessionError> {
        let (moved_id, source_column, source_ids, target_column, target_ids) = match plan {
            ReorderPlan::Within {
                column_id,
                ordered_ids,
            } => return self.reorder_deals(&column_id, &ordered_ids).await,
            ReorderPlan::Move {
                moved_id,
                source_column,
                source_ids,
                target_column,
                target_ids,
            } => (moved_id, source_column, source_ids, target_column, target_ids),
        };

        let mut undo = UndoLog::new();
        let (source_updates, target_updates) = {
            let mut state = self.write();
            validate_order(&state, &source_column, &source_ids)?;
            validate_order(&state, &target_column, &target_ids)?;
            // Target first, so the moved deal has left the source column.
            let target = stage_order(&mut state, &target_column, &target_ids, &mut undo);
            let source = stage_order(&mut state, &source_column, &source_ids, &mut undo);
            (source, target)
        };

        let (source_result, target_result) = tokio::join!(
            self.store.update_deal_positions(&source_updates),
            self.store.update_deal_positions(&target_updates),
        );
        if let Err(err) = source_result.and(target_result) {
            return Err(self.rollback(undo, err, "apply_reorder"));
        }
        self.record(
            ActivityKind::DealMoved {
                ordered_ids: target_ids,
            },
            Some(&moved_id),
            Some(&target_column),
        )
        .await;
        Ok(())
    }
}

fn validate_order(
    state: &SessionState,
    column_id: &str,
    ordered_ids: &[String],
) -> Result<(), SessionError> {
    Session::ensure_settled(column_id)?;
    if !state.data.columns.iter().any(|c| c.id == column_id) {
        return Err(SessionError::UnknownColumn(column_id.to_string()));
    }
    for id in ordered_ids {
        Session::ensure_settled(id)?;
        if !state.data.deals.iter().any(|d| &d.id == id) {
            return Err(SessionError::UnknownDeal(id.clone()));
        }
    }
    Ok(())
}

/// Rewrite positions and column in place. Repeated ids keep their first
/// slot; deals already in the column but not listed follow the listed ones
/// in their current order. Returns the batch to send.
fn stage_order(
    state: &mut SessionState,
    column_id: &str,
    ordered_ids: &[String],
    undo: &mut UndoLog,
) -> Vec<PositionUpdate> {
    let mut seen = HashSet::new();
    let listed: Vec<&str> = ordered_ids
        .iter()
        .map(String::as_str)
        .filter(|id| seen.insert(*id))
        .collect();
    let mut trailing: Vec<&Deal> = state
        .data
        .deals
        .iter()
        .filter(|d| d.in_column(column_id) && !seen.contains(d.id.as_str()))
        .collect();
    trailing.sort_by_key(|d| d.position);
    let order: Vec<String> = listed
        .into_iter()
        .map(str::to_string)
        .chain(trailing.into_iter().map(|d| d.id.clone()))
        .collect();

    let mut updates = Vec::with_capacity(order.len());
    for id in order {
        let Some(index) = state.data.deals.iter().position(|d| d.id == id) else {
            continue;
        };
        let position = updates.len() as i64 + 1;
        let deal = &mut state.data.deals[index];
        undo.replaced(index, Record::Deal(deal.clone()));
        deal.column_id = Some(column_id.to_string());
        deal.position = position;
        updates.push(PositionUpdate {
            id,
            column_id: column_id.to_string(),
            position,
        });
    }
    updates
}

/// One past the highest position in the column, so gaps left by moves
/// never produce a duplicate.
fn next_position(deals: &[Deal], column_id: &str) -> i64 {
    deals
        .iter()
        .filter(|d| d.in_column(column_id))
        .map(|d| d.position)
        .max()
        .unwrap_or(0)
        + 1
}

fn stage_note(
    state: &mut SessionState,
    deal_id: &str,
    latest: Option<String>,
    body: &str,
    undo: &mut UndoLog,
) -> StagedNote {
    if let Some(note_id) = latest {
        if let Some(index) = state.data.notes.iter().position(|n| n.id == note_id) {
            let note = &mut state.data.notes[index];
            undo.replaced(index, Record::Note(note.clone()));
            note.body = body.to_string();
            return StagedNote {
                local_id: note_id.clone(),
                existing: Some(note_id),
            };
        }
    }
    let local_id = tentative_id();
    state.data.notes.push(Note {
        id: local_id.clone(),
        deal_id: deal_id.to_string(),
        body: body.to_string(),
        created_at: chrono::Utc::now(),
    });
    undo.inserted(RecordKind::Note, &local_id);
    StagedNote {
        local_id,
        existing: None,
    }
}

/// The deal's latest reminder moves to the end with the new time, or a
/// tentative one is appended.
fn stage_reminder(
    state: &mut SessionState,
    deal_id: &str,
    remind_at: chrono::NaiveDateTime,
    undo: &mut UndoLog,
) -> StagedReminder {
    let reminders = &mut state.data.reminders;
    if let Some(index) = reminders.iter().rposition(|r| r.deal_id == deal_id) {
        let mut reminder = reminders.remove(index);
        undo.replaced(index, Record::Reminder(reminder.clone()));
        reminder.remind_at = remind_at;
        let local_id = reminder.id.clone();
        reminders.push(reminder);
        return StagedReminder { local_id };
    }
    let local_id = tentative_id();
    reminders.push(Reminder {
        id: local_id.clone(),
        deal_id: deal_id.to_string(),
        remind_at,
    });
    undo.inserted(RecordKind::Reminder, &local_id);
    StagedReminder { local_id }
}

