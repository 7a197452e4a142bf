use chrono::{NaiveDate, NaiveDateTime};

use super::undo::{replace_by_id, take_where, Record, RecordKind, UndoLog};
use super::{Session, SessionError};
use crate::merge::tentative_id;
use crate::types::{ActivityKind, Reminder};

impl Session {
    pub async fn add_reminder(
        &self,
        deal_id: &str,
        remind_at: NaiveDateTime,
    ) -> Result<Reminder, SessionError> {
        Self::ensure_settled(deal_id)?;

        let temp_id = tentative_id();
        let mut undo = UndoLog::new();
        {
            let mut state = self.write();
            if !state.data.deals.iter().any(|d| d.id == deal_id) {
                return Err(SessionError::UnknownDeal(deal_id.to_string()));
            }
            state.data.reminders.push(Reminder {
                id: temp_id.clone(),
                deal_id: deal_id.to_string(),
                remind_at,
            });
            undo.inserted(RecordKind::Reminder, &temp_id);
        }

        let row = match self.store.insert_reminder(deal_id, remind_at).await {
            Ok(row) => row,
            Err(err) => return Err(self.rollback(undo, err, "add_reminder")),
        };
        replace_by_id(&mut self.write().data.reminders, &temp_id, row.clone());
        self.record(
            ActivityKind::ReminderCreated {
                remind_at: row.remind_at,
            },
            Some(deal_id),
            None,
        )
        .await;
        Ok(row)
    }

    /// Change a reminder's time. The reminder becomes the most recently
    /// written one, and with it the deal's canonical reminder.
    pub async fn edit_reminder(
        &self,
        id: &str,
        remind_at: NaiveDateTime,
    ) -> Result<(), SessionError> {
        Self::ensure_settled(id)?;

        let mut undo = UndoLog::new();
        let deal_id = {
            let mut state = self.write();
            let reminders = &mut state.data.reminders;
            let index = reminders
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| SessionError::UnknownReminder(id.to_string()))?;
            let mut reminder = reminders.remove(index);
            undo.replaced(index, Record::Reminder(reminder.clone()));
            reminder.remind_at = remind_at;
            let deal_id = reminder.deal_id.clone();
            reminders.push(reminder);
            deal_id
        };

        if let Err(err) = self.store.update_reminder(id, remind_at).await {
            return Err(self.rollback(undo, err, "edit_reminder"));
        }
        self.record(
            ActivityKind::ReminderUpdated { remind_at },
            Some(&deal_id),
            None,
        )
        .await;
        Ok(())
    }

    /// Calendar drop: move a reminder to another day, keeping its time.
    pub async fn move_reminder_to_date(
        &self,
        id: &str,
        date: NaiveDate,
    ) -> Result<(), SessionError> {
        let time = self
            .read()
            .data
            .reminders
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.remind_at.time())
            .ok_or_else(|| SessionError::UnknownReminder(id.to_string()))?;
        self.edit_reminder(id, date.and_time(time)).await
    }

    pub async fn remove_reminder(&self, id: &str) -> Result<(), SessionError> {
        Self::ensure_settled(id)?;

        let mut undo = UndoLog::new();
        let deal_id = {
            let mut state = self.write();
            let deal_id = state
                .data
                .reminders
                .iter()
                .find(|r| r.id == id)
                .map(|r| r.deal_id.clone())
                .ok_or_else(|| SessionError::UnknownReminder(id.to_string()))?;
            take_where(&mut state.data.reminders, &mut undo, Record::Reminder, |r| {
                r.id == id
            });
            deal_id
        };

        if let Err(err) = self.store.delete_reminder(id).await {
            return Err(self.rollback(undo, err, "remove_reminder"));
        }
        self.record(ActivityKind::ReminderDeleted, Some(&deal_id), None)
            .await;
        Ok(())
    }
}
