/// Row schema of the hosted store and the mapping to entity shapes.
///
/// Renames: `description` holds the client name, `content` the note body.
/// Priority is an integer (1 low, 2 medium, 3 high). Missing client names
/// read back as "Client", missing tags as empty.
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NewActivity, NewDeal, StorageError};
use crate::types::{
    parse_timestamp, ActivityEvent, ActivityKind, Column, Deal, DealPatch, Note, Priority, Reminder,
};

pub const COLUMN_SELECT: &str = "id,title,position";
pub const DEAL_SELECT: &str =
    "id,column_id,title,description,priority,position,amount,currency,tags,created_at,updated_at";
pub const NOTE_SELECT: &str = "id,deal_id,content,created_at";
pub const REMINDER_SELECT: &str = "id,deal_id,remind_at";
pub const ACTIVITY_SELECT: &str = "id,type,deal_id,column_id,payload,created_at";

const DEFAULT_CLIENT: &str = "Client";

pub fn priority_to_int(priority: Priority) -> i64 {
    match priority {
        Priority::Low => 1,
        Priority::Medium => 2,
        Priority::High => 3,
    }
}

pub fn priority_from_int(value: Option<i64>) -> Priority {
    match value {
        Some(3) => Priority::High,
        Some(2) => Priority::Medium,
        _ => Priority::Low,
    }
}

/// Timestamp format written to `remind_at`.
pub fn format_remind_at(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRow {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub position: Option<i64>,
}

impl From<ColumnRow> for Column {
    fn from(row: ColumnRow) -> Self {
        Column {
            id: row.id,
            title: row.title,
            position: row.position.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealRow {
    pub id: String,
    #[serde(default)]
    pub column_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl From<DealRow> for Deal {
    fn from(row: DealRow) -> Self {
        Deal {
            id: row.id,
            column_id: row.column_id,
            title: row.title,
            client_name: row.description.unwrap_or_else(|| DEFAULT_CLIENT.to_string()),
            priority: priority_from_int(row.priority),
            position: row.position.unwrap_or_default(),
            next_follow_up_date: None,
            reminder_at: None,
            amount: row.amount,
            currency: row.currency,
            tags: row.tags.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealInsertRow {
    pub column_id: String,
    pub title: String,
    pub description: String,
    pub priority: i64,
    pub position: i64,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub tags: Vec<String>,
}

impl From<&NewDeal> for DealInsertRow {
    fn from(deal: &NewDeal) -> Self {
        DealInsertRow {
            column_id: deal.column_id.clone(),
            title: deal.title.clone(),
            description: deal.client_name.clone(),
            priority: priority_to_int(deal.priority),
            position: deal.position,
            amount: deal.amount,
            currency: deal.currency.clone(),
            tags: deal.tags.clone(),
        }
    }
}

/// Partial deal update. Absent fields are left out of the JSON body;
/// `Some(None)` writes an explicit null.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DealUpdateRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl From<&DealPatch> for DealUpdateRow {
    fn from(patch: &DealPatch) -> Self {
        DealUpdateRow {
            column_id: patch.column_id.clone(),
            title: patch.title.clone(),
            description: patch.client_name.clone(),
            priority: patch.priority.map(priority_to_int),
            position: patch.position,
            amount: patch.amount,
            currency: patch.currency.clone(),
            tags: patch.tags.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRow {
    pub id: String,
    pub deal_id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Note {
            id: row.id,
            deal_id: row.deal_id,
            body: row.content.unwrap_or_default(),
            created_at: row.created_at.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderRow {
    pub id: String,
    pub deal_id: String,
    pub remind_at: String,
}

impl TryFrom<ReminderRow> for Reminder {
    type Error = StorageError;

    fn try_from(row: ReminderRow) -> Result<Self, Self::Error> {
        let remind_at = parse_timestamp(&row.remind_at).ok_or_else(|| {
            StorageError::Decode(format!(
                "reminder {} has unreadable remind_at {:?}",
                row.id, row.remind_at
            ))
        })?;
        Ok(Reminder {
            id: row.id,
            deal_id: row.deal_id,
            remind_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRow {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub deal_id: Option<String>,
    #[serde(default)]
    pub column_id: Option<String>,
    #[serde(default)]
    pub payload: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ActivityRow {
    /// Typed event, or `None` when the type is unknown to this client.
    pub fn into_event(self) -> Option<ActivityEvent> {
        let kind = ActivityKind::from_wire(&self.kind, self.payload.as_deref());
        if kind.is_none() {
            log::warn!(
                "[dealflow.storage.rows] Skipping activity {} with unreadable type {:?}",
                self.id,
                self.kind
            );
        }
        Some(ActivityEvent {
            id: self.id,
            kind: kind?,
            deal_id: self.deal_id,
            column_id: self.column_id,
            created_at: self.created_at.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityInsertRow {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub deal_id: Option<String>,
    pub column_id: Option<String>,
    pub payload: Option<String>,
}

impl From<&NewActivity> for ActivityInsertRow {
    fn from(event: &NewActivity) -> Self {
        ActivityInsertRow {
            kind: event.kind.wire_type(),
            deal_id: event.deal_id.clone(),
            column_id: event.column_id.clone(),
            payload: event.kind.wire_payload(),
        }
    }
}
