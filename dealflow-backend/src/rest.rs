/// PostgREST-style HTTP row store.
///
/// Tables live at `<base>/rest/v1/<table>`. Every request carries the
/// `apikey` and bearer headers; writes ask for the stored row back with
/// `Prefer: return=representation` and take the first element.
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures_util::future::try_join_all;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;

use dealflow_core::storage::rows::{
    format_remind_at, ActivityInsertRow, ActivityRow, ColumnRow, DealInsertRow, DealRow,
    DealUpdateRow, NoteRow, ReminderRow, ACTIVITY_SELECT, COLUMN_SELECT, DEAL_SELECT, NOTE_SELECT,
    REMINDER_SELECT,
};
use dealflow_core::storage::{
    ColumnPatch, NewActivity, NewDeal, PositionUpdate, RemoteStore, StorageError,
};
use dealflow_core::types::{ActivityEvent, Column, Deal, DealPatch, Note, Reminder};

const COLUMNS: &str = "columns";
const DEALS: &str = "deals";
const NOTES: &str = "notes";
const REMINDERS: &str = "reminders";
const ACTIVITY: &str = "activity_events";

const RETURN_ROWS: &str = "return=representation";
const MERGE_AND_RETURN: &str = "resolution=merge-duplicates,return=representation";

pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Send and decode a JSON body; non-2xx becomes `Rejected`.
    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StorageError> {
        let response = request
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(rejected(status.as_u16(), &body));
        }
        serde_json::from_str(&body).map_err(|e| StorageError::Decode(e.to_string()))
    }

    /// Send a request whose response body is ignored.
    async fn execute(&self, request: RequestBuilder) -> Result<(), StorageError> {
        let response = request
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rejected(status.as_u16(), &body));
        }
        Ok(())
    }

    async fn list<R: DeserializeOwned>(
        &self,
        table: &str,
        select: &str,
        order: &str,
    ) -> Result<Vec<R>, StorageError> {
        let request = self
            .request(Method::GET, table)
            .query(&[("select", select), ("order", order)]);
        self.fetch(request).await
    }

    /// First row of a `return=representation` write, or `NotFound`.
    async fn write_one<R: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        resource: &'static str,
        id: &str,
    ) -> Result<R, StorageError> {
        let rows: Vec<R> = self.fetch(request).await?;
        rows.into_iter().next().ok_or_else(|| StorageError::NotFound {
            resource,
            id: id.to_string(),
        })
    }

    fn patch_by_id(&self, table: &str, select: &str, id: &str) -> RequestBuilder {
        self.request(Method::PATCH, table)
            .query(&[("id", format!("eq.{}", id)), ("select", select.to_string())])
            .header("Prefer", RETURN_ROWS)
    }

    fn insert(&self, table: &str, select: &str) -> RequestBuilder {
        self.request(Method::POST, table)
            .query(&[("select", select)])
            .header("Prefer", RETURN_ROWS)
    }

    async fn delete_by_id(&self, table: &str, id: &str) -> Result<(), StorageError> {
        let request = self
            .request(Method::DELETE, table)
            .query(&[("id", format!("eq.{}", id))]);
        self.execute(request).await
    }
}

fn rejected(status: u16, body: &str) -> StorageError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    StorageError::Rejected { status, message }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn list_columns(&self) -> Result<Vec<Column>, StorageError> {
        let rows: Vec<ColumnRow> = self.list(COLUMNS, COLUMN_SELECT, "position.asc").await?;
        Ok(rows.into_iter().map(Column::from).collect())
    }

    async fn insert_column(&self, title: &str, position: i64) -> Result<Column, StorageError> {
        let request = self
            .insert(COLUMNS, COLUMN_SELECT)
            .json(&json!({ "title": title, "position": position }));
        let row: ColumnRow = self.write_one(request, "column", title).await?;
        Ok(row.into())
    }

    async fn update_column(&self, id: &str, patch: &ColumnPatch) -> Result<Column, StorageError> {
        let request = self.patch_by_id(COLUMNS, COLUMN_SELECT, id).json(patch);
        let row: ColumnRow = self.write_one(request, "column", id).await?;
        Ok(row.into())
    }

    async fn delete_column(&self, id: &str) -> Result<(), StorageError> {
        self.delete_by_id(COLUMNS, id).await
    }

    async fn list_deals(&self) -> Result<Vec<Deal>, StorageError> {
        let rows: Vec<DealRow> = self.list(DEALS, DEAL_SELECT, "position.asc").await?;
        Ok(rows.into_iter().map(Deal::from).collect())
    }

    async fn insert_deal(&self, deal: &NewDeal) -> Result<Deal, StorageError> {
        let request = self
            .insert(DEALS, DEAL_SELECT)
            .json(&DealInsertRow::from(deal));
        let row: DealRow = self.write_one(request, "deal", &deal.title).await?;
        Ok(row.into())
    }

    async fn update_deal(&self, id: &str, patch: &DealPatch) -> Result<Deal, StorageError> {
        let body = DealUpdateRow::from(patch);
        if body == DealUpdateRow::default() {
            // Nothing stored on the deal row changed; read it back instead.
            let request = self.request(Method::GET, DEALS).query(&[
                ("id", format!("eq.{}", id)),
                ("select", DEAL_SELECT.to_string()),
            ]);
            let row: DealRow = self.write_one(request, "deal", id).await?;
            return Ok(row.into());
        }
        let request = self.patch_by_id(DEALS, DEAL_SELECT, id).json(&body);
        let row: DealRow = self.write_one(request, "deal", id).await?;
        Ok(row.into())
    }

    async fn delete_deal(&self, id: &str) -> Result<(), StorageError> {
        self.delete_by_id(DEALS, id).await
    }

    /// One PATCH per deal, sent concurrently; the first failure wins.
    async fn update_deal_positions(&self, updates: &[PositionUpdate]) -> Result<(), StorageError> {
        if updates.is_empty() {
            return Ok(());
        }
        let requests = updates.iter().map(|update| {
            let request = self
                .request(Method::PATCH, DEALS)
                .query(&[("id", format!("eq.{}", update.id))])
                .json(&json!({ "column_id": update.column_id, "position": update.position }));
            self.execute(request)
        });
        try_join_all(requests).await?;
        log::debug!(
            "[dealflow.rest] Wrote {} deal positions",
            updates.len()
        );
        Ok(())
    }

    async fn list_notes(&self) -> Result<Vec<Note>, StorageError> {
        let rows: Vec<NoteRow> = self.list(NOTES, NOTE_SELECT, "created_at.asc").await?;
        Ok(rows.into_iter().map(Note::from).collect())
    }

    async fn insert_note(&self, deal_id: &str, body: &str) -> Result<Note, StorageError> {
        let request = self
            .insert(NOTES, NOTE_SELECT)
            .json(&json!({ "deal_id": deal_id, "content": body }));
        let row: NoteRow = self.write_one(request, "note", deal_id).await?;
        Ok(row.into())
    }

    async fn update_note(&self, id: &str, body: &str) -> Result<Note, StorageError> {
        let request = self
            .patch_by_id(NOTES, NOTE_SELECT, id)
            .json(&json!({ "content": body }));
        let row: NoteRow = self.write_one(request, "note", id).await?;
        Ok(row.into())
    }

    async fn delete_note(&self, id: &str) -> Result<(), StorageError> {
        self.delete_by_id(NOTES, id).await
    }

    async fn list_reminders(&self) -> Result<Vec<Reminder>, StorageError> {
        let rows: Vec<ReminderRow> = self.list(REMINDERS, REMINDER_SELECT, "remind_at.asc").await?;
        rows.into_iter().map(Reminder::try_from).collect()
    }

    async fn insert_reminder(
        &self,
        deal_id: &str,
        remind_at: NaiveDateTime,
    ) -> Result<Reminder, StorageError> {
        let request = self
            .insert(REMINDERS, REMINDER_SELECT)
            .json(&json!({ "deal_id": deal_id, "remind_at": format_remind_at(remind_at) }));
        let row: ReminderRow = self.write_one(request, "reminder", deal_id).await?;
        Reminder::try_from(row)
    }

    async fn update_reminder(
        &self,
        id: &str,
        remind_at: NaiveDateTime,
    ) -> Result<Reminder, StorageError> {
        let request = self
            .patch_by_id(REMINDERS, REMINDER_SELECT, id)
            .json(&json!({ "remind_at": format_remind_at(remind_at) }));
        let row: ReminderRow = self.write_one(request, "reminder", id).await?;
        Reminder::try_from(row)
    }

    async fn delete_reminder(&self, id: &str) -> Result<(), StorageError> {
        self.delete_by_id(REMINDERS, id).await
    }

    async fn upsert_reminder_for_deal(
        &self,
        deal_id: &str,
        remind_at: NaiveDateTime,
    ) -> Result<Reminder, StorageError> {
        let request = self
            .request(Method::POST, REMINDERS)
            .query(&[("on_conflict", "deal_id"), ("select", REMINDER_SELECT)])
            .header("Prefer", MERGE_AND_RETURN)
            .json(&json!({ "deal_id": deal_id, "remind_at": format_remind_at(remind_at) }));
        let row: ReminderRow = self.write_one(request, "reminder", deal_id).await?;
        Reminder::try_from(row)
    }

    async fn list_activity(&self) -> Result<Vec<ActivityEvent>, StorageError> {
        let rows: Vec<ActivityRow> = self.list(ACTIVITY, ACTIVITY_SELECT, "created_at.desc").await?;
        Ok(rows.into_iter().filter_map(ActivityRow::into_event).collect())
    }

    async fn insert_activity(&self, event: &NewActivity) -> Result<(), StorageError> {
        let request = self
            .request(Method::POST, ACTIVITY)
            .json(&ActivityInsertRow::from(event));
        self.execute(request).await
    }
}
