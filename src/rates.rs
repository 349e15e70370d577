// 🌐 Rate Provider
// Wire model of the rate service and the HTTP client that fetches it

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::currency::percent_difference;

// ============================================================================
// WIRE MODEL
// ============================================================================

/// Official BCV quotes (Bs per 1 USD / 1 EUR)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BcvRates {
    pub usd: f64,
    pub eur: f64,
    #[serde(default)]
    pub date: Option<String>,
}

/// Which market is cheaper today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BestOption {
    Bcv,
    Binance,
}

impl BestOption {
    pub fn label(&self) -> &str {
        match self {
            BestOption::Bcv => "BCV",
            BestOption::Binance => "Binance",
        }
    }
}

/// Rates - Output of `GET /rates`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rates {
    pub bcv: BcvRates,
    pub binance: f64,
    pub best_option: BestOption,
    pub last_updated: DateTime<Utc>,
}

impl Rates {
    /// BCV USD
    pub fn primary_rate(&self) -> f64 {
        self.bcv.usd
    }

    /// BCV EUR
    pub fn secondary_rate(&self) -> f64 {
        self.bcv.eur
    }

    /// Binance P2P
    pub fn alternate_rate(&self) -> f64 {
        self.binance
    }

    pub fn best_option(&self) -> BestOption {
        self.best_option
    }

    /// Rate of the market flagged as best option
    pub fn active_rate(&self) -> f64 {
        match self.best_option {
            BestOption::Bcv => self.bcv.usd,
            BestOption::Binance => self.binance,
        }
    }
}

/// One point of the history series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub bcv_usd: f64,
    pub bcv_eur: f64,
    pub binance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

/// Trend summary computed server-side for a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub direction: TrendDirection,
    pub change_percent: f64,
    #[serde(default)]
    pub min_bcv: f64,
    #[serde(default)]
    pub max_bcv: f64,
    #[serde(default)]
    pub avg_bcv: f64,
    #[serde(default)]
    pub first_value: f64,
    #[serde(default)]
    pub last_value: f64,
    #[serde(default)]
    pub data_points: usize,
}

/// HistoryResponse - Output of `GET /history?days=N`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub period: u32,
    pub trend: Trend,
    pub data: Vec<HistoryEntry>,
}

/// History window offered by the chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Period {
    #[default]
    Week,
    Month,
    Quarter,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::Week, Period::Month, Period::Quarter];

    pub fn days(&self) -> u32 {
        match self {
            Period::Week => 7,
            Period::Month => 30,
            Period::Quarter => 90,
        }
    }

    pub fn from_days(days: u32) -> Option<Self> {
        Period::ALL.into_iter().find(|p| p.days() == days)
    }
}

// ============================================================================
// BEST OPTION BADGE
// ============================================================================

/// "Pagar con BCV es 4.2% más barato hoy"
#[derive(Debug, Clone, PartialEq)]
pub struct BestOptionBadge {
    pub cheapest: BestOption,
    pub percent_cheaper: f64,
}

impl BestOptionBadge {
    /// Compare BCV and Binance. `None` when the lower rate is not positive,
    /// since the percentage would not be finite.
    pub fn from_rates(bcv_rate: f64, binance_rate: f64) -> Option<Self> {
        let (cheapest, lowest, highest) = if bcv_rate <= binance_rate {
            (BestOption::Bcv, bcv_rate, binance_rate)
        } else {
            (BestOption::Binance, binance_rate, bcv_rate)
        };

        if lowest <= 0.0 {
            return None;
        }

        let percent_cheaper = percent_difference(lowest, highest);
        percent_cheaper.is_finite().then_some(BestOptionBadge {
            cheapest,
            percent_cheaper,
        })
    }
}

// ============================================================================
// PROVIDER TRAIT
// ============================================================================

/// RateProvider - Where rates come from
///
/// The TUI and CLI only talk to this trait; tests swap in fakes.
pub trait RateProvider: Send + Sync {
    fn fetch_rates(&self) -> Result<Rates>;

    fn fetch_history(&self, days: u32) -> Result<HistoryResponse>;

    fn fetch_trend(&self, days: u32) -> Result<Trend>;

    /// Provider name (for logs)
    fn name(&self) -> &str {
        "rate-provider"
    }
}

/// HTTP client for the public rate service
pub struct HttpRateProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpRateProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(HttpRateProvider {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, days: Option<u32>) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!(%url, ?days, "requesting");

        let mut request = self.client.get(&url);
        if let Some(days) = days {
            request = request.query(&[("days", days)]);
        }

        let response = request
            .send()
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("Rate service returned an error for {}", url))?;

        response
            .json::<T>()
            .with_context(|| format!("Failed to decode response from {}", url))
    }
}

impl RateProvider for HttpRateProvider {
    fn fetch_rates(&self) -> Result<Rates> {
        self.get_json("rates", None)
    }

    fn fetch_history(&self, days: u32) -> Result<HistoryResponse> {
        self.get_json("history", Some(days))
    }

    fn fetch_trend(&self, days: u32) -> Result<Trend> {
        self.get_json("trend", Some(days))
    }

    fn name(&self) -> &str {
        "http"
    }
}
