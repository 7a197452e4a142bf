/// Per-operation undo records.
///
/// Each mutating operation captures exactly the rows it touches before
/// changing them. Rolling back applies the captured entries in reverse, so
/// concurrent operations never overwrite each other's state.
use crate::types::{ActivityEvent, Column, Deal, Note, Reminder};

/// The collections owned by a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collections {
    pub columns: Vec<Column>,
    pub deals: Vec<Deal>,
    pub notes: Vec<Note>,
    pub reminders: Vec<Reminder>,
    /// Newest first.
    pub activity: Vec<ActivityEvent>,
}

pub trait Keyed {
    fn key(&self) -> &str;
}

macro_rules! keyed {
    ($($ty:ty),*) => {
        $(impl Keyed for $ty {
            fn key(&self) -> &str {
                &self.id
            }
        })*
    };
}

keyed!(Column, Deal, Note, Reminder);

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Column(Column),
    Deal(Deal),
    Note(Note),
    Reminder(Reminder),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Column,
    Deal,
    Note,
    Reminder,
}

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    /// Created optimistically; undone by removing the id.
    Inserted(RecordKind, String),
    /// Changed in place; undone by putting the old row back at `index`.
    Replaced { index: usize, record: Record },
    /// Deleted; undone by reinserting at `index` unless already present.
    Removed { index: usize, record: Record },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UndoLog {
    entries: Vec<Entry>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn inserted(&mut self, kind: RecordKind, id: &str) {
        self.entries.push(Entry::Inserted(kind, id.to_string()));
    }

    pub fn replaced(&mut self, index: usize, record: Record) {
        self.entries.push(Entry::Replaced { index, record });
    }

    pub fn removed(&mut self, index: usize, record: Record) {
        self.entries.push(Entry::Removed { index, record });
    }

    /// Append another log; its entries are undone first.
    pub fn extend(&mut self, other: UndoLog) {
        self.entries.extend(other.entries);
    }

    pub fn apply(self, data: &mut Collections) {
        for entry in self.entries.into_iter().rev() {
            match entry {
                Entry::Inserted(kind, id) => match kind {
                    RecordKind::Column => remove_by_id(&mut data.columns, &id),
                    RecordKind::Deal => remove_by_id(&mut data.deals, &id),
                    RecordKind::Note => remove_by_id(&mut data.notes, &id),
                    RecordKind::Reminder => remove_by_id(&mut data.reminders, &id),
                },
                Entry::Replaced { index, record } => match record {
                    Record::Column(row) => put_back(&mut data.columns, index, row),
                    Record::Deal(row) => put_back(&mut data.deals, index, row),
                    Record::Note(row) => put_back(&mut data.notes, index, row),
                    Record::Reminder(row) => put_back(&mut data.reminders, index, row),
                },
                Entry::Removed { index, record } => match record {
                    Record::Column(row) => reinsert(&mut data.columns, index, row),
                    Record::Deal(row) => reinsert(&mut data.deals, index, row),
                    Record::Note(row) => reinsert(&mut data.notes, index, row),
                    Record::Reminder(row) => reinsert(&mut data.reminders, index, row),
                },
            }
        }
    }
}

fn remove_by_id<T: Keyed>(rows: &mut Vec<T>, id: &str) {
    rows.retain(|row| row.key() != id);
}

/// A row deleted meanwhile by another operation is not resurrected.
fn put_back<T: Keyed>(rows: &mut Vec<T>, index: usize, row: T) {
    let Some(current) = rows.iter().position(|r| r.key() == row.key()) else {
        return;
    };
    rows.remove(current);
    let index = index.min(rows.len());
    rows.insert(index, row);
}

fn reinsert<T: Keyed>(rows: &mut Vec<T>, index: usize, row: T) {
    if rows.iter().any(|r| r.key() == row.key()) {
        return;
    }
    let index = index.min(rows.len());
    rows.insert(index, row);
}

/// Swap a tentative row for the stored one in place. Returns false when
/// the tentative row is gone, in which case nothing is inserted.
pub fn replace_by_id<T: Keyed>(rows: &mut [T], id: &str, row: T) -> bool {
    match rows.iter_mut().find(|r| r.key() == id) {
        Some(slot) => {
            *slot = row;
            true
        }
        None => false,
    }
}

/// Remove every row matching `pred`, recording each removal. Entries are
/// pushed highest index first so the reverse replay restores the order.
pub fn take_where<T, F>(
    rows: &mut Vec<T>,
    undo: &mut UndoLog,
    wrap: fn(T) -> Record,
    mut pred: F,
) -> Vec<String>
where
    T: Keyed,
    F: FnMut(&T) -> bool,
{
    let mut taken = Vec::new();
    for index in (0..rows.len()).rev() {
        if pred(&rows[index]) {
            let row = rows.remove(index);
            taken.push(row.key().to_string());
            undo.removed(index, wrap(row));
        }
    }
    taken
}
