/// Pipeline KPIs and the yearly won-revenue report.
///
/// Won and lost stages are plain columns recognized by title keywords
/// (see [`AnalyticsConfig`]).
use chrono::Datelike;
use serde::Serialize;

pub use crate::config::AnalyticsConfig;
use crate::filter::normalize_for_search;
use crate::types::{Column, DealView};

/// First column, in board order, whose title contains one of the keywords.
/// Both sides are lowercased and stripped of accents.
pub fn find_stage<'a>(columns: &'a [Column], keywords: &[String]) -> Option<&'a Column> {
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| normalize_for_search(k))
        .filter(|k| !k.is_empty())
        .collect();
    let mut ordered: Vec<&Column> = columns.iter().collect();
    ordered.sort_by_key(|c| c.position);
    ordered.into_iter().find(|column| {
        let title = normalize_for_search(&column.title);
        keywords.iter().any(|k| title.contains(k.as_str()))
    })
}

fn in_stage<'a>(deals: &'a [DealView], stage: Option<&Column>) -> Vec<&'a DealView> {
    match stage {
        Some(column) => deals.iter().filter(|d| d.deal.in_column(&column.id)).collect(),
        None => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub total: usize,
    pub won: usize,
    pub lost: usize,
    /// Rounded percentage of all deals that are won; 0 without deals.
    pub win_rate: u32,
    pub pipeline_amount: f64,
    pub won_amount: f64,
}

impl Kpis {
    pub fn compute(columns: &[Column], deals: &[DealView], config: &AnalyticsConfig) -> Self {
        let won = in_stage(deals, find_stage(columns, &config.won_keywords));
        let lost = in_stage(deals, find_stage(columns, &config.lost_keywords));
        let total = deals.len();
        let win_rate = if total > 0 {
            (won.len() as f64 / total as f64 * 100.0).round() as u32
        } else {
            0
        };
        Self {
            total,
            won: won.len(),
            lost: lost.len(),
            win_rate,
            pipeline_amount: deals.iter().filter_map(|d| d.deal.amount).sum(),
            won_amount: won.iter().filter_map(|d| d.deal.amount).sum(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodTotals {
    pub actual: f64,
    pub forecast: f64,
    pub target: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearReport {
    pub year: i32,
    pub actual_by_month: [f64; 12],
    pub forecast_by_month: [f64; 12],
    pub target_by_month: [f64; 12],
    pub quarters: [PeriodTotals; 4],
    pub year_total: PeriodTotals,
}

impl YearReport {
    /// Won amounts bucketed by the month of each deal's effective date.
    /// Won deals without a date or outside `year` are left out.
    pub fn compute(
        columns: &[Column],
        deals: &[DealView],
        year: i32,
        config: &AnalyticsConfig,
    ) -> Self {
        let won = in_stage(deals, find_stage(columns, &config.won_keywords));

        let mut actual_by_month = [0.0; 12];
        for view in won {
            let Some(date) = view.effective_date() else {
                continue;
            };
            if date.year() != year {
                continue;
            }
            actual_by_month[date.month0() as usize] += view.deal.amount.unwrap_or(0.0);
        }

        let factor = config.forecast_factor_percent as f64 / 100.0;
        let forecast_by_month = actual_by_month.map(|actual| (actual * factor).round());
        let target_by_month = config.monthly_targets.map(|target| target.max(0.0));

        let quarters = std::array::from_fn(|q| {
            let months = q * 3..q * 3 + 3;
            PeriodTotals {
                actual: actual_by_month[months.clone()].iter().sum(),
                forecast: forecast_by_month[months.clone()].iter().sum(),
                target: target_by_month[months].iter().sum(),
            }
        });
        let year_total = PeriodTotals {
            actual: actual_by_month.iter().sum(),
            forecast: forecast_by_month.iter().sum(),
            target: target_by_month.iter().sum(),
        };

        Self {
            year,
            actual_by_month,
            forecast_by_month,
            target_by_month,
            quarters,
            year_total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_timestamp, Deal, Priority};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn columns() -> Vec<Column> {
        vec![
            Column {
                id: "c1".into(),
                title: "Prospect".into(),
                position: 1,
            },
            Column {
                id: "c2".into(),
                title: "Gagné".into(),
                position: 2,
            },
            Column {
                id: "c3".into(),
                title: "Perdu".into(),
                position: 3,
            },
        ]
    }

    fn view(id: &str, column_id: &str, amount: Option<f64>) -> DealView {
        DealView {
            deal: Deal {
                id: id.into(),
                column_id: Some(column_id.into()),
                title: id.into(),
                client_name: "Client".into(),
                priority: Priority::Medium,
                position: 1,
                next_follow_up_date: None,
                reminder_at: None,
                amount,
                currency: None,
                tags: vec![],
            },
            notes: None,
            reminder_at: None,
        }
    }

    #[test]
    fn test_kpis() {
        let deals = vec![
            view("a", "c1", Some(100.0)),
            view("b", "c2", Some(200.0)),
            view("c", "c3", None),
        ];
        let kpis = Kpis::compute(&columns(), &deals, &AnalyticsConfig::default());
        assert_eq!(kpis.total, 3);
        assert_eq!(kpis.won, 1);
        assert_eq!(kpis.lost, 1);
        assert_eq!(kpis.win_rate, 33);
        assert_eq!(kpis.pipeline_amount, 300.0);
        assert_eq!(kpis.won_amount, 200.0);

        let empty = Kpis::compute(&columns(), &[], &AnalyticsConfig::default());
        assert_eq!(empty.win_rate, 0);
    }

    #[test]
    fn test_stage_lookup_uses_keywords() {
        let config = AnalyticsConfig::default();
        assert_eq!(
            find_stage(&columns(), &config.won_keywords).map(|c| c.id.as_str()),
            Some("c2")
        );
        let board = columns();
        assert!(find_stage(&board, &["closed".to_string()]).is_none());
        let lost = find_stage(&board, &["PERDU".to_string()]);
        assert_eq!(lost.map(|c| c.id.as_str()), Some("c3"));
    }

    #[test]
    fn test_year_report_buckets_by_effective_date() {
        let mut march = view("a", "c2", Some(1000.0));
        march.reminder_at = parse_timestamp("2024-03-15T10:00");
        let mut may = view("b", "c2", Some(500.0));
        may.deal.next_follow_up_date = NaiveDate::from_ymd_opt(2024, 5, 2);
        let mut other_year = view("c", "c2", Some(999.0));
        other_year.deal.next_follow_up_date = NaiveDate::from_ymd_opt(2023, 5, 2);
        let undated = view("d", "c2", Some(50.0));
        let not_won = {
            let mut v = view("e", "c1", Some(10_000.0));
            v.deal.next_follow_up_date = NaiveDate::from_ymd_opt(2024, 1, 1);
            v
        };

        let mut config = AnalyticsConfig::default();
        config.monthly_targets[0] = 800.0;
        config.monthly_targets[1] = -5.0;

        let report = YearReport::compute(
            &columns(),
            &[march, may, other_year, undated, not_won],
            2024,
            &config,
        );
        assert_eq!(report.actual_by_month[2], 1000.0);
        assert_eq!(report.actual_by_month[4], 500.0);
        assert_eq!(report.forecast_by_month[2], 1100.0);
        assert_eq!(report.forecast_by_month[4], 550.0);
        assert_eq!(report.target_by_month[1], 0.0);
        assert_eq!(
            report.quarters[0],
            PeriodTotals {
                actual: 1000.0,
                forecast: 1100.0,
                target: 800.0,
            }
        );
        assert_eq!(report.quarters[1].actual, 500.0);
        assert_eq!(report.year_total.actual, 1500.0);
        assert_eq!(report.year_total.forecast, 1650.0);
    }
}
