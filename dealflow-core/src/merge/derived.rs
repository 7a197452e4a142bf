/// Derived deal fields.
///
/// A card shows the body of the deal's most recent note and the deal's
/// canonical reminder. Neither is stored on the deal; both are recomputed
/// from the note and reminder collections on every read.
use std::borrow::Borrow;
use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::types::{Deal, DealView, Note, Reminder};

/// Attach the latest note body and effective reminder to every deal.
///
/// - note: greatest `created_at`, later position wins ties
/// - reminder: last reminder for the deal in collection order, else the
///   deal's own `reminder_at`
///
/// Accepts its own output, so applying it twice gives the same views.
pub fn merge_derived<D: Borrow<Deal>>(
    deals: &[D],
    notes: &[Note],
    reminders: &[Reminder],
) -> Vec<DealView> {
    let latest_notes = latest_note_by_deal(notes);
    let latest_reminders = latest_reminder_by_deal(reminders);

    deals
        .iter()
        .map(|deal| {
            let deal = <D as Borrow<Deal>>::borrow(deal);
            DealView {
                deal: deal.clone(),
                notes: latest_notes.get(deal.id.as_str()).map(|n| n.body.clone()),
                reminder_at: latest_reminders
                    .get(deal.id.as_str())
                    .copied()
                    .or(deal.reminder_at),
            }
        })
        .collect()
}

/// Most recent note per deal id.
pub fn latest_note_by_deal(notes: &[Note]) -> HashMap<&str, &Note> {
    let mut latest: HashMap<&str, &Note> = HashMap::new();
    for note in notes {
        match latest.get(note.deal_id.as_str()) {
            Some(current) if current.created_at > note.created_at => {}
            _ => {
                latest.insert(note.deal_id.as_str(), note);
            }
        }
    }
    latest
}

fn latest_reminder_by_deal(reminders: &[Reminder]) -> HashMap<&str, NaiveDateTime> {
    reminders
        .iter()
        .map(|r| (r.deal_id.as_str(), r.remind_at))
        .collect()
}
