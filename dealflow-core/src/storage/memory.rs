/// In-process row store.
///
/// Keeps the five tables in memory behind a mutex and mirrors the hosted
/// store's behavior: generated ids, position/created_at/remind_at ordering
/// on list calls, cascading deletes and the deal-keyed reminder upsert.
///
/// Tests drive it through two hooks:
/// - `fail_next(call, error)` makes the next call of that kind fail
/// - `hold_next(call)` parks the next call of that kind until the returned
///   `Notify` is signalled, so several operations can be put in flight
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use tokio::sync::Notify;

use super::{ColumnPatch, NewActivity, NewDeal, PositionUpdate, RemoteStore, StorageError};
use crate::types::{ActivityEvent, Column, Deal, DealPatch, Note, Reminder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreCall {
    ListColumns,
    InsertColumn,
    UpdateColumn,
    DeleteColumn,
    ListDeals,
    InsertDeal,
    UpdateDeal,
    DeleteDeal,
    UpdateDealPositions,
    ListNotes,
    InsertNote,
    UpdateNote,
    DeleteNote,
    ListReminders,
    InsertReminder,
    UpdateReminder,
    DeleteReminder,
    UpsertReminder,
    ListActivity,
    InsertActivity,
}

#[derive(Debug, Default, Clone)]
struct Tables {
    columns: Vec<Column>,
    deals: Vec<Deal>,
    notes: Vec<Note>,
    reminders: Vec<Reminder>,
    activity: Vec<ActivityEvent>,
    next_id: u64,
}

impl Tables {
    fn generate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn drop_deal_children(&mut self, deal_ids: &[String]) {
        self.notes.retain(|n| !deal_ids.contains(&n.deal_id));
        self.reminders.retain(|r| !deal_ids.contains(&r.deal_id));
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    faults: Mutex<HashMap<StoreCall, Vec<StorageError>>>,
    gates: Mutex<HashMap<StoreCall, Vec<Arc<Notify>>>>,
    calls: Mutex<Vec<StoreCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found(resource: &'static str, id: &str) -> StorageError {
    StorageError::NotFound {
        resource,
        id: id.to_string(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with rows (ids kept as given).
    pub fn with_data(
        columns: Vec<Column>,
        deals: Vec<Deal>,
        notes: Vec<Note>,
        reminders: Vec<Reminder>,
    ) -> Self {
        let store = Self::new();
        {
            let mut tables = lock(&store.tables);
            tables.columns = columns;
            tables.deals = deals;
            tables.notes = notes;
            tables.reminders = reminders;
        }
        store
    }

    /// Make the next call of `call` fail with `error`. Queued per kind.
    pub fn fail_next(&self, call: StoreCall, error: StorageError) {
        lock(&self.faults).entry(call).or_default().push(error);
    }

    /// Park the next call of `call` until the returned handle is notified.
    pub fn hold_next(&self, call: StoreCall) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        lock(&self.gates)
            .entry(call)
            .or_default()
            .push(Arc::clone(&gate));
        gate
    }

    /// Number of calls of the given kind received so far.
    pub fn call_count(&self, call: StoreCall) -> usize {
        lock(&self.calls).iter().filter(|c| **c == call).count()
    }

    pub fn columns(&self) -> Vec<Column> {
        lock(&self.tables).columns.clone()
    }

    pub fn deals(&self) -> Vec<Deal> {
        lock(&self.tables).deals.clone()
    }

    pub fn notes(&self) -> Vec<Note> {
        lock(&self.tables).notes.clone()
    }

    pub fn reminders(&self) -> Vec<Reminder> {
        lock(&self.tables).reminders.clone()
    }

    pub fn activity(&self) -> Vec<ActivityEvent> {
        lock(&self.tables).activity.clone()
    }

    /// Record the call, then wait on a pending gate. A queued fault is taken
    /// before waiting and returned after release.
    async fn enter(&self, call: StoreCall) -> Result<(), StorageError> {
        lock(&self.calls).push(call);
        let fault = take_first(&mut lock(&self.faults), call);
        let gate = take_first(&mut lock(&self.gates), call);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match fault {
            Some(err) => {
                log::debug!("[dealflow.storage.memory] Injected failure on {:?}: {}", call, err);
                Err(err)
            }
            None => Ok(()),
        }
    }
}

fn take_first<T>(queues: &mut HashMap<StoreCall, Vec<T>>, call: StoreCall) -> Option<T> {
    let queue = queues.get_mut(&call)?;
    if queue.is_empty() {
        None
    } else {
        Some(queue.remove(0))
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_columns(&self) -> Result<Vec<Column>, StorageError> {
        self.enter(StoreCall::ListColumns).await?;
        let mut columns = lock(&self.tables).columns.clone();
        columns.sort_by_key(|c| c.position);
        Ok(columns)
    }

    async fn insert_column(&self, title: &str, position: i64) -> Result<Column, StorageError> {
        self.enter(StoreCall::InsertColumn).await?;
        let mut tables = lock(&self.tables);
        let column = Column {
            id: tables.generate_id("col"),
            title: title.to_string(),
            position,
        };
        tables.columns.push(column.clone());
        Ok(column)
    }

    async fn update_column(&self, id: &str, patch: &ColumnPatch) -> Result<Column, StorageError> {
        self.enter(StoreCall::UpdateColumn).await?;
        let mut tables = lock(&self.tables);
        let column = tables
            .columns
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| not_found("column", id))?;
        if let Some(title) = &patch.title {
            column.title = title.clone();
        }
        if let Some(position) = patch.position {
            column.position = position;
        }
        Ok(column.clone())
    }

    async fn delete_column(&self, id: &str) -> Result<(), StorageError> {
        self.enter(StoreCall::DeleteColumn).await?;
        let mut tables = lock(&self.tables);
        let before = tables.columns.len();
        tables.columns.retain(|c| c.id != id);
        if tables.columns.len() == before {
            return Err(not_found("column", id));
        }
        let removed: Vec<String> = tables
            .deals
            .iter()
            .filter(|d| d.in_column(id))
            .map(|d| d.id.clone())
            .collect();
        tables.deals.retain(|d| !d.in_column(id));
        tables.drop_deal_children(&removed);
        Ok(())
    }

    async fn list_deals(&self) -> Result<Vec<Deal>, StorageError> {
        self.enter(StoreCall::ListDeals).await?;
        let mut deals = lock(&self.tables).deals.clone();
        deals.sort_by_key(|d| d.position);
        Ok(deals)
    }

    async fn insert_deal(&self, deal: &NewDeal) -> Result<Deal, StorageError> {
        self.enter(StoreCall::InsertDeal).await?;
        let mut tables = lock(&self.tables);
        if !tables.columns.iter().any(|c| c.id == deal.column_id) {
            return Err(StorageError::Rejected {
                status: 409,
                message: format!("column {} does not exist", deal.column_id),
            });
        }
        let row = Deal {
            id: tables.generate_id("deal"),
            column_id: Some(deal.column_id.clone()),
            title: deal.title.clone(),
            client_name: deal.client_name.clone(),
            priority: deal.priority,
            position: deal.position,
            next_follow_up_date: None,
            reminder_at: None,
            amount: deal.amount,
            currency: deal.currency.clone(),
            tags: deal.tags.clone(),
        };
        tables.deals.push(row.clone());
        Ok(row)
    }

    async fn update_deal(&self, id: &str, patch: &DealPatch) -> Result<Deal, StorageError> {
        self.enter(StoreCall::UpdateDeal).await?;
        let mut tables = lock(&self.tables);
        let deal = tables
            .deals
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| not_found("deal", id))?;
        patch.apply_to(deal);
        Ok(deal.clone())
    }

    async fn delete_deal(&self, id: &str) -> Result<(), StorageError> {
        self.enter(StoreCall::DeleteDeal).await?;
        let mut tables = lock(&self.tables);
        let before = tables.deals.len();
        tables.deals.retain(|d| d.id != id);
        if tables.deals.len() == before {
            return Err(not_found("deal", id));
        }
        tables.drop_deal_children(&[id.to_string()]);
        Ok(())
    }

    async fn update_deal_positions(&self, updates: &[PositionUpdate]) -> Result<(), StorageError> {
        self.enter(StoreCall::UpdateDealPositions).await?;
        let mut tables = lock(&self.tables);
        if let Some(missing) = updates
            .iter()
            .find(|u| !tables.deals.iter().any(|d| d.id == u.id))
        {
            return Err(not_found("deal", &missing.id));
        }
        for update in updates {
            if let Some(deal) = tables.deals.iter_mut().find(|d| d.id == update.id) {
                deal.column_id = Some(update.column_id.clone());
                deal.position = update.position;
            }
        }
        Ok(())
    }

    async fn list_notes(&self) -> Result<Vec<Note>, StorageError> {
        self.enter(StoreCall::ListNotes).await?;
        let mut notes = lock(&self.tables).notes.clone();
        notes.sort_by_key(|n| n.created_at);
        Ok(notes)
    }

    async fn insert_note(&self, deal_id: &str, body: &str) -> Result<Note, StorageError> {
        self.enter(StoreCall::InsertNote).await?;
        let mut tables = lock(&self.tables);
        if !tables.deals.iter().any(|d| d.id == deal_id) {
            return Err(not_found("deal", deal_id));
        }
        let note = Note {
            id: tables.generate_id("note"),
            deal_id: deal_id.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
        };
        tables.notes.push(note.clone());
        Ok(note)
    }

    async fn update_note(&self, id: &str, body: &str) -> Result<Note, StorageError> {
        self.enter(StoreCall::UpdateNote).await?;
        let mut tables = lock(&self.tables);
        let note = tables
            .notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| not_found("note", id))?;
        note.body = body.to_string();
        Ok(note.clone())
    }

    async fn delete_note(&self, id: &str) -> Result<(), StorageError> {
        self.enter(StoreCall::DeleteNote).await?;
        let mut tables = lock(&self.tables);
        let before = tables.notes.len();
        tables.notes.retain(|n| n.id != id);
        if tables.notes.len() == before {
            return Err(not_found("note", id));
        }
        Ok(())
    }

    async fn list_reminders(&self) -> Result<Vec<Reminder>, StorageError> {
        self.enter(StoreCall::ListReminders).await?;
        let mut reminders = lock(&self.tables).reminders.clone();
        reminders.sort_by_key(|r| r.remind_at);
        Ok(reminders)
    }

    async fn insert_reminder(
        &self,
        deal_id: &str,
        remind_at: NaiveDateTime,
    ) -> Result<Reminder, StorageError> {
        self.enter(StoreCall::InsertReminder).await?;
        let mut tables = lock(&self.tables);
        if !tables.deals.iter().any(|d| d.id == deal_id) {
            return Err(not_found("deal", deal_id));
        }
        let reminder = Reminder {
            id: tables.generate_id("rem"),
            deal_id: deal_id.to_string(),
            remind_at,
        };
        tables.reminders.push(reminder.clone());
        Ok(reminder)
    }

    async fn update_reminder(
        &self,
        id: &str,
        remind_at: NaiveDateTime,
    ) -> Result<Reminder, StorageError> {
        self.enter(StoreCall::UpdateReminder).await?;
        let mut tables = lock(&self.tables);
        let reminder = tables
            .reminders
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found("reminder", id))?;
        reminder.remind_at = remind_at;
        Ok(reminder.clone())
    }

    async fn delete_reminder(&self, id: &str) -> Result<(), StorageError> {
        self.enter(StoreCall::DeleteReminder).await?;
        let mut tables = lock(&self.tables);
        let before = tables.reminders.len();
        tables.reminders.retain(|r| r.id != id);
        if tables.reminders.len() == before {
            return Err(not_found("reminder", id));
        }
        Ok(())
    }

    async fn upsert_reminder_for_deal(
        &self,
        deal_id: &str,
        remind_at: NaiveDateTime,
    ) -> Result<Reminder, StorageError> {
        self.enter(StoreCall::UpsertReminder).await?;
        let mut tables = lock(&self.tables);
        if !tables.deals.iter().any(|d| d.id == deal_id) {
            return Err(not_found("deal", deal_id));
        }
        if let Some(existing) = tables.reminders.iter_mut().find(|r| r.deal_id == deal_id) {
            existing.remind_at = remind_at;
            return Ok(existing.clone());
        }
        let reminder = Reminder {
            id: tables.generate_id("rem"),
            deal_id: deal_id.to_string(),
            remind_at,
        };
        tables.reminders.push(reminder.clone());
        Ok(reminder)
    }

    async fn list_activity(&self) -> Result<Vec<ActivityEvent>, StorageError> {
        self.enter(StoreCall::ListActivity).await?;
        Ok(lock(&self.tables).activity.clone())
    }

    async fn insert_activity(&self, event: &NewActivity) -> Result<(), StorageError> {
        self.enter(StoreCall::InsertActivity).await?;
        let mut tables = lock(&self.tables);
        let row = ActivityEvent {
            id: tables.generate_id("act"),
            kind: event.kind.clone(),
            deal_id: event.deal_id.clone(),
            column_id: event.column_id.clone(),
            created_at: Utc::now(),
        };
        tables.activity.insert(0, row);
        Ok(())
    }
}
