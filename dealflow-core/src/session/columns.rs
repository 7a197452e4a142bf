use super::undo::{replace_by_id, take_where, Record, RecordKind, UndoLog};
use super::{Session, SessionError};
use crate::merge::tentative_id;
use crate::storage::ColumnPatch;
use crate::types::{ActivityKind, Column};

impl Session {
    /// Create a column at the end of the board.
    pub async fn add_column(&self, title: &str) -> Result<Column, SessionError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SessionError::EmptyTitle);
        }

        let temp_id = tentative_id();
        let mut undo = UndoLog::new();
        let position = {
            let mut state = self.write();
            let position = state.data.columns.len() as i64 + 1;
            state.data.columns.push(Column {
                id: temp_id.clone(),
                title: title.to_string(),
                position,
            });
            undo.inserted(RecordKind::Column, &temp_id);
            position
        };

        let row = match self.store.insert_column(title, position).await {
            Ok(row) => row,
            Err(err) => return Err(self.rollback(undo, err, "add_column")),
        };
        if !replace_by_id(&mut self.write().data.columns, &temp_id, row.clone()) {
            log::debug!("[dealflow.session] Column {} vanished before insert returned", temp_id);
        }
        self.record(
            ActivityKind::ColumnCreated {
                title: row.title.clone(),
            },
            None,
            Some(&row.id),
        )
        .await;
        Ok(row)
    }

    pub async fn edit_column(&self, id: &str, title: &str) -> Result<(), SessionError> {
        Self::ensure_settled(id)?;
        let title = title.trim();
        if title.is_empty() {
            return Err(SessionError::EmptyTitle);
        }

        let mut undo = UndoLog::new();
        {
            let mut state = self.write();
            let index = state
                .data
                .columns
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| SessionError::UnknownColumn(id.to_string()))?;
            let column = &mut state.data.columns[index];
            undo.replaced(index, Record::Column(column.clone()));
            column.title = title.to_string();
        }

        let patch = ColumnPatch {
            title: Some(title.to_string()),
            position: None,
        };
        if let Err(err) = self.store.update_column(id, &patch).await {
            return Err(self.rollback(undo, err, "edit_column"));
        }
        self.record(
            ActivityKind::ColumnUpdated {
                title: title.to_string(),
            },
            None,
            Some(id),
        )
        .await;
        Ok(())
    }

    /// Delete a column together with its deals and their notes and reminders.
    pub async fn remove_column(&self, id: &str) -> Result<(), SessionError> {
        Self::ensure_settled(id)?;

        let mut undo = UndoLog::new();
        {
            let mut state = self.write();
            let data = &mut state.data;
            let taken = take_where(&mut data.columns, &mut undo, Record::Column, |c| c.id == id);
            if taken.is_empty() {
                return Err(SessionError::UnknownColumn(id.to_string()));
            }
            let deal_ids = take_where(&mut data.deals, &mut undo, Record::Deal, |d| {
                d.in_column(id)
            });
            take_where(&mut data.notes, &mut undo, Record::Note, |n| {
                deal_ids.contains(&n.deal_id)
            });
            take_where(&mut data.reminders, &mut undo, Record::Reminder, |r| {
                deal_ids.contains(&r.deal_id)
            });
        }

        if let Err(err) = self.store.delete_column(id).await {
            return Err(self.rollback(undo, err, "remove_column"));
        }
        self.record(ActivityKind::ColumnDeleted, None, Some(id)).await;
        Ok(())
    }
}
