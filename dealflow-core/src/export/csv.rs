/// CSV rendering of the visible board.
use crate::filter::DealFilter;
use crate::layout::{project_visible, BoardColumn};
use crate::types::{Column, DealView, REMINDER_FORMAT};

pub const CSV_HEADER: [&str; 9] = [
    "title",
    "clientName",
    "priority",
    "amount",
    "currency",
    "reminderAt",
    "notes",
    "tags",
    "column",
];

/// One line per deal in board order, lines joined by `\n` with no
/// trailing newline.
pub fn board_to_csv(board: &[BoardColumn]) -> String {
    let mut lines = Vec::with_capacity(1 + board.iter().map(|c| c.deals.len()).sum::<usize>());
    lines.push(CSV_HEADER.join(","));
    for column in board {
        for view in &column.deals {
            lines.push(deal_row(view, &column.title));
        }
    }
    lines.join("\n")
}

/// Filter, project and render in one step.
pub fn export_csv(columns: &[Column], deals: &[DealView], filter: &DealFilter) -> String {
    board_to_csv(&project_visible(columns, deals, filter, false))
}

fn deal_row(view: &DealView, column_title: &str) -> String {
    let deal = &view.deal;
    let cells = [
        deal.title.clone(),
        deal.client_name.clone(),
        deal.priority.as_str().to_string(),
        deal.amount.map(|a| a.to_string()).unwrap_or_default(),
        deal.currency.clone().unwrap_or_default(),
        view.reminder_at
            .map(|at| at.format(REMINDER_FORMAT).to_string())
            .unwrap_or_default(),
        view.notes.clone().unwrap_or_default(),
        deal.tags.join("|"),
        column_title.to_string(),
    ];
    cells
        .iter()
        .map(|cell| escape_cell(cell))
        .collect::<Vec<_>>()
        .join(",")
}

/// Quote cells containing a comma, quote or newline; double inner quotes.
pub fn escape_cell(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
