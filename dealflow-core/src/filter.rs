/// Deal filtering for the board, the CSV export and the CLI.
///
/// `FilterCriteria` is the user-facing form; `DealFilter::compile` pins the
/// current local day so date buckets stay stable while a board renders.
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::types::{DealView, Priority};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PriorityFilter {
    #[default]
    All,
    Only(Priority),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateFilter {
    #[default]
    All,
    Overdue,
    Today,
    Upcoming,
    /// Only deals without a reminder or follow-up date.
    None,
}

impl DateFilter {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" | "any" => Some(DateFilter::All),
            "overdue" => Some(DateFilter::Overdue),
            "today" => Some(DateFilter::Today),
            "upcoming" | "future" => Some(DateFilter::Upcoming),
            "none" => Some(DateFilter::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    pub text_query: String,
    pub priority: PriorityFilter,
    /// Lowercase tag names; empty means no tag constraint.
    pub tags: Vec<String>,
    pub amount_min: Option<f64>,
    pub amount_max: Option<f64>,
    pub date_filter: DateFilter,
}

impl FilterCriteria {
    /// Split a comma-separated tag list: trimmed, lowercased, empties dropped.
    pub fn parse_tags(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.text_query.trim().is_empty()
            && self.priority == PriorityFilter::All
            && self.tags.is_empty()
            && self.amount_min.is_none()
            && self.amount_max.is_none()
            && self.date_filter == DateFilter::All
    }
}

/// Compiled criteria. All constraints are ANDed.
#[derive(Debug, Clone)]
pub struct DealFilter {
    query: String,
    priority: PriorityFilter,
    tags: Vec<String>,
    amount_min: Option<f64>,
    amount_max: Option<f64>,
    date_filter: DateFilter,
    today: NaiveDate,
}

impl Default for DealFilter {
    fn default() -> Self {
        Self::compile(&FilterCriteria::default())
    }
}

impl DealFilter {
    pub fn compile(criteria: &FilterCriteria) -> Self {
        Self::compile_at(criteria, Local::now().date_naive())
    }

    pub fn compile_at(criteria: &FilterCriteria, today: NaiveDate) -> Self {
        Self {
            query: normalize_for_search(criteria.text_query.trim()),
            priority: criteria.priority,
            tags: criteria
                .tags
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            amount_min: criteria.amount_min,
            amount_max: criteria.amount_max,
            date_filter: criteria.date_filter,
            today,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn matches(&self, view: &DealView) -> bool {
        self.matches_text(view)
            && self.matches_priority(view)
            && self.matches_tags(view)
            && self.matches_amount(view)
            && self.matches_date(view)
    }

    fn matches_text(&self, view: &DealView) -> bool {
        self.query.is_empty()
            || normalize_for_search(&view.deal.title).contains(&self.query)
            || normalize_for_search(&view.deal.client_name).contains(&self.query)
    }

    fn matches_priority(&self, view: &DealView) -> bool {
        match self.priority {
            PriorityFilter::All => true,
            PriorityFilter::Only(p) => view.deal.priority == p,
        }
    }

    fn matches_tags(&self, view: &DealView) -> bool {
        self.tags.is_empty()
            || view
                .deal
                .tags
                .iter()
                .map(|tag| tag.to_lowercase())
                .any(|tag| self.tags.contains(&tag))
    }

    /// A missing amount fails any bound that is set.
    fn matches_amount(&self, view: &DealView) -> bool {
        if self.amount_min.is_none() && self.amount_max.is_none() {
            return true;
        }
        let Some(amount) = view.deal.amount else {
            return false;
        };
        self.amount_min.map_or(true, |min| amount >= min)
            && self.amount_max.map_or(true, |max| amount <= max)
    }

    fn matches_date(&self, view: &DealView) -> bool {
        let date = view.effective_date();
        match self.date_filter {
            DateFilter::All => true,
            DateFilter::None => date.is_none(),
            DateFilter::Today => date == Some(self.today),
            DateFilter::Overdue => date.is_some_and(|d| d < self.today),
            DateFilter::Upcoming => date.is_some_and(|d| d > self.today),
        }
    }
}

/// Lowercases, NFD-decomposes and strips combining marks, so "Societe"
/// finds "Société".
pub(crate) fn normalize_for_search(value: &str) -> String {
    value
        .to_lowercase()
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect()
}
