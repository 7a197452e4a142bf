/// Shared configuration types embedded in the client config file.
use serde::{Deserialize, Serialize};

/// Defaults applied when synthesizing new records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionOptions {
    pub default_currency: String,
    pub default_deal_title: String,
    pub default_client_name: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            default_currency: "EUR".to_string(),
            default_deal_title: "New deal".to_string(),
            default_client_name: "Client".to_string(),
        }
    }
}

/// How won/lost stages are recognized and how the forecast is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsConfig {
    /// Lowercase substrings identifying the won column by title.
    pub won_keywords: Vec<String>,
    pub lost_keywords: Vec<String>,
    pub forecast_factor_percent: u32,
    /// January first.
    pub monthly_targets: [f64; 12],
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            won_keywords: vec!["won".to_string(), "gagne".to_string()],
            lost_keywords: vec!["lost".to_string(), "perdu".to_string()],
            forecast_factor_percent: 110,
            monthly_targets: [0.0; 12],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options: SessionOptions =
            serde_json::from_str(r#"{ "defaultCurrency": "USD" }"#).unwrap();
        assert_eq!(options.default_currency, "USD");
        assert_eq!(options.default_deal_title, "New deal");

        let analytics: AnalyticsConfig =
            serde_json::from_str(r#"{ "forecastFactorPercent": 120 }"#).unwrap();
        assert_eq!(analytics.forecast_factor_percent, 120);
        assert_eq!(analytics.won_keywords, vec!["won", "gagne"]);
    }
}
