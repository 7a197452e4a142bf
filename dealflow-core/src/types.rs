use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// Display format for reminder timestamps (matches a datetime-local input).
pub const REMINDER_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Parse from a string value (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

/// A pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub title: String,
    pub position: i64,
}

/// A deal as stored. Note text is never stored here; see [`DealView`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: String,
    pub column_id: Option<String>,
    pub title: String,
    pub client_name: String,
    pub priority: Priority,
    pub position: i64,
    pub next_follow_up_date: Option<NaiveDate>,
    /// The deal's own reminder, used only when no Reminder row exists for it.
    pub reminder_at: Option<NaiveDateTime>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Deal {
    pub fn in_column(&self, column_id: &str) -> bool {
        self.column_id.as_deref() == Some(column_id)
    }
}

/// Read-only enriched projection of a deal: latest note body and
/// effective reminder attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealView {
    pub deal: Deal,
    pub notes: Option<String>,
    pub reminder_at: Option<NaiveDateTime>,
}

impl DealView {
    pub fn id(&self) -> &str {
        &self.deal.id
    }

    /// Date used by date filters and analytics: the reminder's day if any,
    /// otherwise the next follow-up date.
    pub fn effective_date(&self) -> Option<NaiveDate> {
        self.reminder_at
            .map(|at| at.date())
            .or(self.deal.next_follow_up_date)
    }
}

impl Borrow<Deal> for DealView {
    fn borrow(&self) -> &Deal {
        &self.deal
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub deal_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub deal_id: String,
    pub remind_at: NaiveDateTime,
}

/// What happened, with a payload typed per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityKind {
    ColumnCreated { title: String },
    ColumnUpdated { title: String },
    ColumnDeleted,
    DealCreated { title: String },
    DealUpdated { title: String },
    DealDeleted,
    DealMoved { ordered_ids: Vec<String> },
    NoteCreated { body: String },
    NoteUpdated { body: String },
    NoteDeleted,
    ReminderCreated { remind_at: NaiveDateTime },
    ReminderUpdated { remind_at: NaiveDateTime },
    ReminderDeleted,
}

impl ActivityKind {
    /// The `type` column value used by the row store.
    pub fn wire_type(&self) -> &'static str {
        match self {
            ActivityKind::ColumnCreated { .. } => "column_created",
            ActivityKind::ColumnUpdated { .. } => "column_updated",
            ActivityKind::ColumnDeleted => "column_deleted",
            ActivityKind::DealCreated { .. } => "deal_created",
            ActivityKind::DealUpdated { .. } => "deal_updated",
            ActivityKind::DealDeleted => "deal_deleted",
            ActivityKind::DealMoved { .. } => "deal_moved",
            ActivityKind::NoteCreated { .. } => "note_created",
            ActivityKind::NoteUpdated { .. } => "note_updated",
            ActivityKind::NoteDeleted => "note_deleted",
            ActivityKind::ReminderCreated { .. } => "reminder_created",
            ActivityKind::ReminderUpdated { .. } => "reminder_updated",
            ActivityKind::ReminderDeleted => "reminder_deleted",
        }
    }

    /// The free-form `payload` column value used by the row store.
    pub fn wire_payload(&self) -> Option<String> {
        match self {
            ActivityKind::ColumnCreated { title }
            | ActivityKind::ColumnUpdated { title }
            | ActivityKind::DealCreated { title }
            | ActivityKind::DealUpdated { title } => Some(title.clone()),
            ActivityKind::NoteCreated { body } | ActivityKind::NoteUpdated { body } => {
                Some(body.clone())
            }
            ActivityKind::DealMoved { ordered_ids } => Some(ordered_ids.join(",")),
            ActivityKind::ReminderCreated { remind_at }
            | ActivityKind::ReminderUpdated { remind_at } => {
                Some(remind_at.format(REMINDER_FORMAT).to_string())
            }
            ActivityKind::ColumnDeleted
            | ActivityKind::DealDeleted
            | ActivityKind::NoteDeleted
            | ActivityKind::ReminderDeleted => None,
        }
    }

    /// Rebuild a typed kind from the row store's `(type, payload)` pair.
    /// Returns `None` for unknown types or payloads that do not parse.
    pub fn from_wire(kind: &str, payload: Option<&str>) -> Option<Self> {
        let text = || payload.unwrap_or_default().to_string();
        let timestamp = || payload.and_then(parse_timestamp);
        let kind = match kind {
            "column_created" => ActivityKind::ColumnCreated { title: text() },
            "column_updated" => ActivityKind::ColumnUpdated { title: text() },
            "column_deleted" => ActivityKind::ColumnDeleted,
            "deal_created" => ActivityKind::DealCreated { title: text() },
            "deal_updated" => ActivityKind::DealUpdated { title: text() },
            "deal_deleted" => ActivityKind::DealDeleted,
            "deal_moved" => ActivityKind::DealMoved {
                ordered_ids: payload
                    .unwrap_or_default()
                    .split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(ToOwned::to_owned)
                    .collect(),
            },
            "note_created" => ActivityKind::NoteCreated { body: text() },
            "note_updated" => ActivityKind::NoteUpdated { body: text() },
            "note_deleted" => ActivityKind::NoteDeleted,
            "reminder_created" => ActivityKind::ReminderCreated {
                remind_at: timestamp()?,
            },
            "reminder_updated" => ActivityKind::ReminderUpdated {
                remind_at: timestamp()?,
            },
            "reminder_deleted" => ActivityKind::ReminderDeleted,
            _ => return None,
        };
        Some(kind)
    }
}

/// Append-only audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub id: String,
    #[serde(flatten)]
    pub kind: ActivityKind,
    pub deal_id: Option<String>,
    pub column_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new deal. Blank title/client fall back to
/// the session defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DealDraft {
    pub title: Option<String>,
    pub client_name: Option<String>,
    pub priority: Option<Priority>,
    pub next_follow_up_date: Option<NaiveDate>,
    pub reminder_at: Option<NaiveDateTime>,
    pub notes: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub tags: Vec<String>,
}

/// Partial edit of a deal. `None` leaves a field untouched; the nested
/// options on nullable fields allow clearing them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DealPatch {
    pub column_id: Option<String>,
    pub title: Option<String>,
    pub client_name: Option<String>,
    pub priority: Option<Priority>,
    pub next_follow_up_date: Option<Option<NaiveDate>>,
    pub amount: Option<Option<f64>>,
    pub currency: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    /// Assigned by the session when `column_id` moves the deal; any value
    /// passed in is replaced.
    pub position: Option<i64>,
    /// Written to the deal's latest note, not to the deal row.
    pub notes: Option<String>,
    /// Upserted as the deal's canonical reminder, not to the deal row.
    pub reminder_at: Option<NaiveDateTime>,
}

impl DealPatch {
    /// Merge the stored-field part of the patch over `deal`.
    pub fn apply_to(&self, deal: &mut Deal) {
        if let Some(column_id) = &self.column_id {
            deal.column_id = Some(column_id.clone());
        }
        if let Some(title) = &self.title {
            deal.title = title.clone();
        }
        if let Some(client_name) = &self.client_name {
            deal.client_name = client_name.clone();
        }
        if let Some(priority) = self.priority {
            deal.priority = priority;
        }
        if let Some(date) = self.next_follow_up_date {
            deal.next_follow_up_date = date;
        }
        if let Some(amount) = self.amount {
            deal.amount = amount;
        }
        if let Some(currency) = &self.currency {
            deal.currency = currency.clone();
        }
        if let Some(tags) = &self.tags {
            deal.tags = tags.clone();
        }
        if let Some(position) = self.position {
            deal.position = position;
        }
    }

    /// Note text to write, ignoring blank input.
    pub fn note_text(&self) -> Option<&str> {
        self.notes.as_deref().filter(|n| !n.trim().is_empty())
    }
}

/// Parse a timestamp as written by the row store or typed by a user.
/// Offsets are normalized to UTC wall time.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}
