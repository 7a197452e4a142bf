use chrono::Utc;

use super::undo::{replace_by_id, take_where, Record, RecordKind, UndoLog};
use super::{Session, SessionError};
use crate::merge::tentative_id;
use crate::types::{ActivityKind, Note};

impl Session {
    pub async fn add_note(&self, deal_id: &str, body: &str) -> Result<Note, SessionError> {
        Self::ensure_settled(deal_id)?;

        let temp_id = tentative_id();
        let mut undo = UndoLog::new();
        {
            let mut state = self.write();
            if !state.data.deals.iter().any(|d| d.id == deal_id) {
                return Err(SessionError::UnknownDeal(deal_id.to_string()));
            }
            state.data.notes.push(Note {
                id: temp_id.clone(),
                deal_id: deal_id.to_string(),
                body: body.to_string(),
                created_at: Utc::now(),
            });
            undo.inserted(RecordKind::Note, &temp_id);
        }

        let row = match self.store.insert_note(deal_id, body).await {
            Ok(row) => row,
            Err(err) => return Err(self.rollback(undo, err, "add_note")),
        };
        replace_by_id(&mut self.write().data.notes, &temp_id, row.clone());
        self.record(
            ActivityKind::NoteCreated {
                body: row.body.clone(),
            },
            Some(deal_id),
            None,
        )
        .await;
        Ok(row)
    }

    pub async fn edit_note(&self, id: &str, body: &str) -> Result<(), SessionError> {
        Self::ensure_settled(id)?;

        let mut undo = UndoLog::new();
        let deal_id = {
            let mut state = self.write();
            let index = state
                .data
                .notes
                .iter()
                .position(|n| n.id == id)
                .ok_or_else(|| SessionError::UnknownNote(id.to_string()))?;
            let note = &mut state.data.notes[index];
            undo.replaced(index, Record::Note(note.clone()));
            note.body = body.to_string();
            note.deal_id.clone()
        };

        if let Err(err) = self.store.update_note(id, body).await {
            return Err(self.rollback(undo, err, "edit_note"));
        }
        self.record(
            ActivityKind::NoteUpdated {
                body: body.to_string(),
            },
            Some(&deal_id),
            None,
        )
        .await;
        Ok(())
    }

    pub async fn remove_note(&self, id: &str) -> Result<(), SessionError> {
        Self::ensure_settled(id)?;

        let mut undo = UndoLog::new();
        let deal_id = {
            let mut state = self.write();
            let deal_id = state
                .data
                .notes
                .iter()
                .find(|n| n.id == id)
                .map(|n| n.deal_id.clone())
                .ok_or_else(|| SessionError::UnknownNote(id.to_string()))?;
            take_where(&mut state.data.notes, &mut undo, Record::Note, |n| n.id == id);
            deal_id
        };

        if let Err(err) = self.store.delete_note(id).await {
            return Err(self.rollback(undo, err, "remove_note"));
        }
        self.record(ActivityKind::NoteDeleted, Some(&deal_id), None)
            .await;
        Ok(())
    }
}
