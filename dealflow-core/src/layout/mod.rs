pub mod drag;
pub mod projector;

pub use drag::{DragGesture, DragState, DropTarget, ReorderPlan};
pub use projector::{compute_reorder, project, project_visible, reorder_within, BoardColumn};
