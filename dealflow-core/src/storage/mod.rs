pub mod memory;
pub mod rows;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::types::{ActivityEvent, ActivityKind, Column, Deal, DealPatch, Note, Priority, Reminder};

/// Abstract row store holding the five CRM collections.
/// Implementations: MemoryStore (in-process), RestStore (PostgREST over HTTP).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Columns ordered by position ascending.
    async fn list_columns(&self) -> Result<Vec<Column>, StorageError>;
    async fn insert_column(&self, title: &str, position: i64) -> Result<Column, StorageError>;
    async fn update_column(&self, id: &str, patch: &ColumnPatch) -> Result<Column, StorageError>;
    async fn delete_column(&self, id: &str) -> Result<(), StorageError>;

    /// Deals ordered by position ascending.
    async fn list_deals(&self) -> Result<Vec<Deal>, StorageError>;
    async fn insert_deal(&self, deal: &NewDeal) -> Result<Deal, StorageError>;
    /// Only the stored fields of the patch are written.
    async fn update_deal(&self, id: &str, patch: &DealPatch) -> Result<Deal, StorageError>;
    async fn delete_deal(&self, id: &str) -> Result<(), StorageError>;
    /// Batch write of `(id, column_id, position)` triples.
    async fn update_deal_positions(&self, updates: &[PositionUpdate]) -> Result<(), StorageError>;

    /// Notes ordered by creation time ascending.
    async fn list_notes(&self) -> Result<Vec<Note>, StorageError>;
    async fn insert_note(&self, deal_id: &str, body: &str) -> Result<Note, StorageError>;
    async fn update_note(&self, id: &str, body: &str) -> Result<Note, StorageError>;
    async fn delete_note(&self, id: &str) -> Result<(), StorageError>;

    /// Reminders ordered by `remind_at` ascending.
    async fn list_reminders(&self) -> Result<Vec<Reminder>, StorageError>;
    async fn insert_reminder(
        &self,
        deal_id: &str,
        remind_at: NaiveDateTime,
    ) -> Result<Reminder, StorageError>;
    async fn update_reminder(
        &self,
        id: &str,
        remind_at: NaiveDateTime,
    ) -> Result<Reminder, StorageError>;
    async fn delete_reminder(&self, id: &str) -> Result<(), StorageError>;
    /// Insert or overwrite the reminder keyed by deal id.
    async fn upsert_reminder_for_deal(
        &self,
        deal_id: &str,
        remind_at: NaiveDateTime,
    ) -> Result<Reminder, StorageError>;

    /// Activity newest first.
    async fn list_activity(&self) -> Result<Vec<ActivityEvent>, StorageError>;
    async fn insert_activity(&self, event: &NewActivity) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

/// Fields sent when inserting a deal.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDeal {
    pub column_id: String,
    pub title: String,
    pub client_name: String,
    pub priority: Priority,
    pub position: i64,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub id: String,
    pub column_id: String,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub kind: ActivityKind,
    pub deal_id: Option<String>,
    pub column_id: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Could not decode store response: {0}")]
    Decode(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
