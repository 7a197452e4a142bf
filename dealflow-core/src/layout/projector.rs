/// Board projection: deals grouped into their columns, in display order.
use std::collections::HashMap;

use serde::Serialize;

use crate::filter::DealFilter;
use crate::types::{Column, DealView};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardColumn {
    pub column_id: String,
    pub title: String,
    pub deals: Vec<DealView>,
}

impl BoardColumn {
    pub fn deal_ids(&self) -> Vec<String> {
        self.deals.iter().map(|d| d.id().to_string()).collect()
    }

    pub fn index_of(&self, deal_id: &str) -> Option<usize> {
        self.deals.iter().position(|d| d.id() == deal_id)
    }
}

/// Columns by position, each holding its deals by position. Ties keep
/// input order. Deals pointing at a missing column are not shown.
pub fn project(columns: &[Column], deals: &[DealView]) -> Vec<BoardColumn> {
    let mut grouped: HashMap<&str, Vec<&DealView>> = HashMap::new();
    for view in deals {
        if let Some(column_id) = view.deal.column_id.as_deref() {
            grouped.entry(column_id).or_default().push(view);
        }
    }

    let mut ordered: Vec<&Column> = columns.iter().collect();
    ordered.sort_by_key(|c| c.position);

    ordered
        .into_iter()
        .map(|column| {
            let mut members = grouped.remove(column.id.as_str()).unwrap_or_default();
            members.sort_by_key(|v| v.deal.position);
            BoardColumn {
                column_id: column.id.clone(),
                title: column.title.clone(),
                deals: members.into_iter().cloned().collect(),
            }
        })
        .collect()
}

/// Like [`project`] with each column filtered. In compact mode columns
/// left without a visible deal are dropped.
pub fn project_visible(
    columns: &[Column],
    deals: &[DealView],
    filter: &DealFilter,
    compact: bool,
) -> Vec<BoardColumn> {
    project(columns, deals)
        .into_iter()
        .map(|mut column| {
            column.deals.retain(|view| filter.matches(view));
            column
        })
        .filter(|column| !compact || !column.deals.is_empty())
        .collect()
}

/// Take `moved_id` out of `source` and insert it into `target` at
/// `insertion_index`, clamped to the target length.
pub fn compute_reorder(
    source: &[String],
    target: &[String],
    moved_id: &str,
    insertion_index: usize,
) -> (Vec<String>, Vec<String>) {
    let next_source: Vec<String> = source.iter().filter(|id| *id != moved_id).cloned().collect();
    let mut next_target: Vec<String> = target.iter().filter(|id| *id != moved_id).cloned().collect();
    let index = insertion_index.min(next_target.len());
    next_target.insert(index, moved_id.to_string());
    (next_source, next_target)
}

/// Same-column move: remove, then insert at the clamped index.
pub fn reorder_within(list: &[String], moved_id: &str, to_index: usize) -> Vec<String> {
    let mut next: Vec<String> = list.iter().filter(|id| *id != moved_id).cloned().collect();
    let index = to_index.min(next.len());
    next.insert(index, moved_id.to_string());
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterCriteria;
    use crate::types::{Deal, Priority};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn column(id: &str, position: i64) -> Column {
        Column {
            id: id.into(),
            title: id.to_uppercase(),
            position,
        }
    }

    fn view(id: &str, column_id: &str, position: i64) -> DealView {
        DealView {
            deal: Deal {
                id: id.into(),
                column_id: Some(column_id.into()),
                title: format!("Deal {}", id),
                client_name: "Client".into(),
                priority: Priority::Medium,
                position,
                next_follow_up_date: None,
                reminder_at: None,
                amount: None,
                currency: None,
                tags: vec![],
            },
            notes: None,
            reminder_at: None,
        }
    }

    fn strings(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_project_orders_columns_and_deals() {
        let columns = vec![column("won", 5), column("lead", 1), column("call", 3)];
        let deals = vec![
            view("d3", "lead", 2),
            view("d1", "lead", 1),
            view("d9", "won", 1),
            view("orphan", "gone", 1),
        ];
        let board = project(&columns, &deals);
        let order: Vec<&str> = board.iter().map(|c| c.column_id.as_str()).collect();
        assert_eq!(order, vec!["lead", "call", "won"]);
        assert_eq!(board[0].deal_ids(), strings(&["d1", "d3"]));
        assert!(board[1].deals.is_empty());
        assert_eq!(board[2].deal_ids(), strings(&["d9"]));
        let shown: usize = board.iter().map(|c| c.deals.len()).sum();
        assert_eq!(shown, 3);
    }

    #[test]
    fn test_project_visible_compact_drops_empty_columns() {
        let columns = vec![column("lead", 1), column("won", 2)];
        let mut high = view("d2", "won", 1);
        high.deal.priority = Priority::High;
        let deals = vec![view("d1", "lead", 1), high];
        let filter = DealFilter::compile_at(
            &FilterCriteria {
                priority: crate::filter::PriorityFilter::Only(Priority::High),
                ..Default::default()
            },
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );

        let full = project_visible(&columns, &deals, &filter, false);
        assert_eq!(full.len(), 2);
        assert!(full[0].deals.is_empty());

        let compact = project_visible(&columns, &deals, &filter, true);
        assert_eq!(compact.len(), 1);
        assert_eq!(compact[0].column_id, "won");
    }

    #[test]
    fn test_compute_reorder_moves_between_lists() {
        let (source, target) =
            compute_reorder(&strings(&["a", "b", "c"]), &strings(&["x", "y"]), "b", 1);
        assert_eq!(source, strings(&["a", "c"]));
        assert_eq!(target, strings(&["x", "b", "y"]));
    }

    #[test]
    fn test_compute_reorder_clamps_and_preserves_ids() {
        let source = strings(&["a", "b"]);
        let target = strings(&["x"]);
        let (next_source, next_target) = compute_reorder(&source, &target, "a", 99);
        assert_eq!(next_target, strings(&["x", "a"]));

        let mut before: Vec<String> = source.iter().chain(target.iter()).cloned().collect();
        let mut after: Vec<String> = next_source.into_iter().chain(next_target).collect();
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn test_reorder_within() {
        let list = strings(&["a", "b", "c"]);
        assert_eq!(reorder_within(&list, "a", 2), strings(&["b", "c", "a"]));
        assert_eq!(reorder_within(&list, "c", 0), strings(&["c", "a", "b"]));
        assert_eq!(reorder_within(&list, "b", 10), strings(&["a", "c", "b"]));
    }
}
