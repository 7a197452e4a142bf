/// Optimistic state reconciliation.
///
/// `Session` owns the canonical columns, deals, notes, reminders and
/// activity log. Every mutation is applied locally first, then sent to the
/// row store; a failed call undoes only the rows that operation touched.
///
/// The state lock is a plain `RwLock` taken for short synchronous sections
/// and never held across an `.await`, so independent operations can be in
/// flight at the same time.
pub mod undo;

mod columns;
mod deals;
mod notes;
mod reminders;

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::config::SessionOptions;
use crate::filter::DealFilter;
use crate::layout::{self, BoardColumn};
use crate::merge::{is_tentative, merge_derived, tentative_id};
use crate::storage::{NewActivity, RemoteStore, StorageError};
use crate::types::{ActivityEvent, ActivityKind, Column, Deal, DealView, Note, Reminder};
use undo::{Collections, UndoLog};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Unknown deal: {0}")]
    UnknownDeal(String),

    #[error("Unknown note: {0}")]
    UnknownNote(String),

    #[error("Unknown reminder: {0}")]
    UnknownReminder(String),

    #[error("{0} is still being saved")]
    Pending(String),

    #[error("Column title cannot be empty")]
    EmptyTitle,

    #[error("Could not load data: {0}")]
    Load(String),
}

/// Cloned view of the whole session state.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub columns: Vec<Column>,
    pub deals: Vec<Deal>,
    pub notes: Vec<Note>,
    pub reminders: Vec<Reminder>,
    pub activity: Vec<ActivityEvent>,
    pub load: LoadState,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct SessionState {
    data: Collections,
    load: LoadState,
    hydrated: bool,
    last_error: Option<String>,
}

pub struct Session {
    store: Arc<dyn RemoteStore>,
    state: RwLock<SessionState>,
    options: SessionOptions,
}

impl Session {
    pub fn new(store: Arc<dyn RemoteStore>, options: SessionOptions) -> Self {
        Self {
            store,
            state: RwLock::new(SessionState::default()),
            options,
        }
    }

    /// Convenience for the usual process-wide handle.
    pub fn shared(store: Arc<dyn RemoteStore>, options: SessionOptions) -> Arc<Self> {
        Arc::new(Self::new(store, options))
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Fetch everything once. Later calls return immediately; a failed
    /// load is only retried by [`Session::refresh`].
    pub async fn ensure_loaded(&self) -> Result<(), SessionError> {
        {
            let state = self.read();
            if state.hydrated {
                return Ok(());
            }
            match &state.load {
                LoadState::Loading => return Ok(()),
                LoadState::Failed(message) => return Err(SessionError::Load(message.clone())),
                LoadState::Idle | LoadState::Ready => {}
            }
        }
        self.refresh().await
    }

    /// Refetch all collections. Columns, deals, notes and reminders are
    /// fetched concurrently; activity afterwards, and its failure leaves
    /// the log empty.
    pub async fn refresh(&self) -> Result<(), SessionError> {
        self.write().load = LoadState::Loading;

        let fetched = tokio::try_join!(
            self.store.list_columns(),
            self.store.list_deals(),
            self.store.list_notes(),
            self.store.list_reminders(),
        );
        let (columns, deals, notes, reminders) = match fetched {
            Ok(rows) => rows,
            Err(err) => {
                let message = err.to_string();
                log::warn!("[dealflow.session] Load failed: {}", message);
                let mut state = self.write();
                state.load = LoadState::Failed(message.clone());
                state.last_error = Some(message.clone());
                return Err(SessionError::Load(message));
            }
        };

        let activity = match self.store.list_activity().await {
            Ok(events) => events,
            Err(err) => {
                log::warn!("[dealflow.session] Activity log unavailable: {}", err);
                Vec::new()
            }
        };

        log::info!(
            "[dealflow.session] Loaded {} columns, {} deals, {} notes, {} reminders",
            columns.len(),
            deals.len(),
            notes.len(),
            reminders.len()
        );
        let mut state = self.write();
        state.data = Collections {
            columns,
            deals,
            notes,
            reminders,
            activity,
        };
        state.load = LoadState::Ready;
        state.hydrated = true;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> Snapshot {
        let state = self.read();
        Snapshot {
            columns: state.data.columns.clone(),
            deals: state.data.deals.clone(),
            notes: state.data.notes.clone(),
            reminders: state.data.reminders.clone(),
            activity: state.data.activity.clone(),
            load: state.load.clone(),
            last_error: state.last_error.clone(),
        }
    }

    /// Deals with their latest note and effective reminder attached.
    pub fn deals(&self) -> Vec<DealView> {
        let state = self.read();
        merge_derived(&state.data.deals, &state.data.notes, &state.data.reminders)
    }

    pub fn deal(&self, id: &str) -> Option<DealView> {
        self.deals().into_iter().find(|view| view.id() == id)
    }

    pub fn columns(&self) -> Vec<Column> {
        self.read().data.columns.clone()
    }

    /// Notes of a deal, newest first.
    pub fn notes_for(&self, deal_id: &str) -> Vec<Note> {
        let state = self.read();
        let mut notes: Vec<Note> = state
            .data
            .notes
            .iter()
            .filter(|n| n.deal_id == deal_id)
            .cloned()
            .collect();
        notes.reverse();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notes
    }

    pub fn reminders(&self) -> Vec<Reminder> {
        self.read().data.reminders.clone()
    }

    pub fn activity(&self) -> Vec<ActivityEvent> {
        self.read().data.activity.clone()
    }

    /// Timeline of one deal, newest first.
    pub fn activity_for_deal(&self, deal_id: &str) -> Vec<ActivityEvent> {
        self.read()
            .data
            .activity
            .iter()
            .filter(|e| e.deal_id.as_deref() == Some(deal_id))
            .cloned()
            .collect()
    }

    pub fn board(&self) -> Vec<BoardColumn> {
        let (columns, deals) = self.board_snapshot();
        layout::project(&columns, &deals)
    }

    pub fn visible_board(&self, filter: &DealFilter, compact: bool) -> Vec<BoardColumn> {
        let (columns, deals) = self.board_snapshot();
        layout::project_visible(&columns, &deals, filter, compact)
    }

    /// Columns and deals read under one guard.
    fn board_snapshot(&self) -> (Vec<Column>, Vec<DealView>) {
        let state = self.read();
        let deals = merge_derived(&state.data.deals, &state.data.notes, &state.data.reminders);
        (state.data.columns.clone(), deals)
    }

    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.write().last_error = None;
    }

    pub fn load_state(&self) -> LoadState {
        self.read().load.clone()
    }

    pub fn is_hydrated(&self) -> bool {
        self.read().hydrated
    }

    // -----------------------------------------------------------------------
    // Shared plumbing for the operation modules
    // -----------------------------------------------------------------------

    fn ensure_settled(id: &str) -> Result<(), SessionError> {
        if is_tentative(id) {
            return Err(SessionError::Pending(id.to_string()));
        }
        Ok(())
    }

    /// Undo the operation's changes and surface the error.
    fn rollback(&self, undo: UndoLog, err: StorageError, operation: &str) -> SessionError {
        let err = SessionError::from(err);
        let mut state = self.write();
        undo.apply(&mut state.data);
        state.last_error = Some(err.to_string());
        log::warn!("[dealflow.session] {} failed, rolled back: {}", operation, err);
        err
    }

    /// Surface an error without undoing anything.
    fn surface(&self, err: StorageError, operation: &str) -> SessionError {
        let err = SessionError::from(err);
        self.write().last_error = Some(err.to_string());
        log::warn!("[dealflow.session] {} failed: {}", operation, err);
        err
    }

    /// Append an activity event locally, then send it best-effort.
    async fn record(&self, kind: ActivityKind, deal_id: Option<&str>, column_id: Option<&str>) {
        let event = NewActivity {
            kind,
            deal_id: deal_id.map(str::to_string),
            column_id: column_id.map(str::to_string),
        };
        self.write().data.activity.insert(
            0,
            ActivityEvent {
                id: tentative_id(),
                kind: event.kind.clone(),
                deal_id: event.deal_id.clone(),
                column_id: event.column_id.clone(),
                created_at: Utc::now(),
            },
        );
        if let Err(err) = self.store.insert_activity(&event).await {
            log::debug!(
                "[dealflow.session] Activity {} not stored: {}",
                event.kind.wire_type(),
                err
            );
        }
    }
}

#[cfg(test)]
mod tests;
