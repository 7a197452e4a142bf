/// Drag gesture state machine.
///
/// Pointer capture is left to the UI; it feeds `start`, `cancel` and
/// `drop_on`. Only a drop produces a [`ReorderPlan`], which the session
/// commits with `apply_reorder`.
use serde::Serialize;

use super::projector::{compute_reorder, reorder_within, BoardColumn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    Card(String),
    Column(String),
}

/// Complete orderings to commit after a drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReorderPlan {
    #[serde(rename_all = "camelCase")]
    Within {
        column_id: String,
        ordered_ids: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Move {
        moved_id: String,
        source_column: String,
        source_ids: Vec<String>,
        target_column: String,
        target_ids: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        active_id: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct DragGesture {
    state: DragState,
}

impl DragGesture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn active_id(&self) -> Option<&str> {
        match &self.state {
            DragState::Dragging { active_id } => Some(active_id),
            DragState::Idle => None,
        }
    }

    pub fn start(&mut self, deal_id: &str) {
        self.state = DragState::Dragging {
            active_id: deal_id.to_string(),
        };
    }

    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }

    /// Finish the drag. A column target appends to that column, a card
    /// target takes that card's slot. Dropping on the dragged card itself,
    /// or on anything not on the board, yields no plan.
    pub fn drop_on(&mut self, target: DropTarget, board: &[BoardColumn]) -> Option<ReorderPlan> {
        let DragState::Dragging { active_id } = std::mem::take(&mut self.state) else {
            return None;
        };

        let source = board.iter().find(|c| c.index_of(&active_id).is_some())?;
        let (destination, index) = match &target {
            DropTarget::Card(over_id) if *over_id == active_id => return None,
            DropTarget::Card(over_id) => {
                let column = board.iter().find(|c| c.index_of(over_id).is_some())?;
                (column, column.index_of(over_id)?)
            }
            DropTarget::Column(column_id) => {
                let column = board.iter().find(|c| &c.column_id == column_id)?;
                (column, column.deals.len())
            }
        };

        if destination.column_id == source.column_id {
            return Some(ReorderPlan::Within {
                column_id: source.column_id.clone(),
                ordered_ids: reorder_within(&source.deal_ids(), &active_id, index),
            });
        }

        let (source_ids, target_ids) =
            compute_reorder(&source.deal_ids(), &destination.deal_ids(), &active_id, index);
        Some(ReorderPlan::Move {
            moved_id: active_id,
            source_column: source.column_id.clone(),
            source_ids,
            target_column: destination.column_id.clone(),
            target_ids,
        })
    }
}
