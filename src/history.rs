// 📈 History & Trend
// Chart scaling, trend wording and CSV export for a history window

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;

use crate::rates::{HistoryEntry, Trend, TrendDirection};

/// Vertical padding below the lowest and above the highest value
const LOWER_PAD: f64 = 0.995;
const UPPER_PAD: f64 = 1.005;

/// Which series of a history entry to plot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Series {
    BcvUsd,
    BcvEur,
    Binance,
}

impl Series {
    pub fn label(&self) -> &str {
        match self {
            Series::BcvUsd => "BCV USD",
            Series::BcvEur => "BCV EUR",
            Series::Binance => "Binance",
        }
    }

    pub fn value(&self, entry: &HistoryEntry) -> f64 {
        match self {
            Series::BcvUsd => entry.bcv_usd,
            Series::BcvEur => entry.bcv_eur,
            Series::Binance => entry.binance,
        }
    }
}

/// Y-axis range for the BCV USD line, padded by half a percent.
///
/// `None` with fewer than 2 points (nothing to draw a line through).
pub fn chart_bounds(entries: &[HistoryEntry]) -> Option<[f64; 2]> {
    chart_bounds_for(entries, Series::BcvUsd)
}

pub fn chart_bounds_for(entries: &[HistoryEntry], series: Series) -> Option<[f64; 2]> {
    if entries.len() < 2 {
        return None;
    }

    let values = entries.iter().map(|e| series.value(e));
    let min = values.clone().fold(f64::INFINITY, f64::min) * LOWER_PAD;
    let max = values.fold(f64::NEG_INFINITY, f64::max) * UPPER_PAD;

    if !min.is_finite() || !max.is_finite() {
        return None;
    }

    // Flat zero series: keep a visible range
    if max - min <= 0.0 {
        return Some([min, min + 1.0]);
    }

    Some([min, max])
}

/// `(index, value)` pairs, oldest first
pub fn chart_series(entries: &[HistoryEntry], series: Series) -> Vec<(f64, f64)> {
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| (i as f64, series.value(e)))
        .collect()
}

/// One-line description under the trend card
pub fn trend_description(trend: &Trend) -> String {
    match trend.direction {
        TrendDirection::Up => format!(
            "The dollar rose from {:.2} to {:.2} Bs",
            trend.first_value, trend.last_value
        ),
        TrendDirection::Down => format!(
            "The dollar fell from {:.2} to {:.2} Bs",
            trend.first_value, trend.last_value
        ),
        TrendDirection::Stable => format!(
            "The dollar is stable around {:.2} Bs",
            trend.avg_bcv
        ),
    }
}

/// `+1.5%` / `-0.8%` / `0%`
pub fn format_change_percent(change_percent: f64) -> String {
    if change_percent > 0.0 {
        format!("+{}%", change_percent)
    } else {
        format!("{}%", change_percent)
    }
}

#[derive(Serialize)]
struct CsvRow {
    timestamp: String,
    bcv_usd: f64,
    bcv_eur: f64,
    binance: f64,
}

/// Write a history window as CSV (header + one row per entry)
pub fn write_history_csv<W: Write>(entries: &[HistoryEntry], writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for entry in entries {
        csv_writer
            .serialize(CsvRow {
                timestamp: entry.timestamp.to_rfc3339(),
                bcv_usd: entry.bcv_usd,
                bcv_eur: entry.bcv_eur,
                binance: entry.binance,
            })
            .context("Failed to write CSV row")?;
    }

    csv_writer.flush().context("Failed to flush CSV output")?;
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(day: u32, bcv_usd: f64) -> HistoryEntry {
        HistoryEntry {
            timestamp: Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap(),
            bcv_usd,
            bcv_eur: bcv_usd * 1.08,
            binance: bcv_usd + 1.5,
        }
    }

    fn trend(direction: TrendDirection) -> Trend {
        Trend {
            direction,
            change_percent: 1.5,
            min_bcv: 36.0,
            max_bcv: 36.54,
            avg_bcv: 36.27,
            first_value: 36.0,
            last_value: 36.54,
            data_points: 2,
        }
    }

    #[test]
    fn test_chart_bounds_needs_two_points() {
        assert!(chart_bounds(&[]).is_none());
        assert!(chart_bounds(&[entry(1, 36.0)]).is_none());
    }

    #[test]
    fn test_chart_bounds_padding() {
        let [low, high] = chart_bounds(&[entry(1, 36.0), entry(2, 40.0), entry(3, 38.0)]).unwrap();
        assert!((low - 36.0 * 0.995).abs() < 1e-9);
        assert!((high - 40.0 * 1.005).abs() < 1e-9);
    }

    #[test]
    fn test_chart_bounds_flat_series() {
        let [low, high] = chart_bounds(&[entry(1, 36.0), entry(2, 36.0)]).unwrap();
        assert!(high > low);

        let [low, high] = chart_bounds(&[entry(1, 0.0), entry(2, 0.0)]).unwrap();
        assert_eq!(low, 0.0);
        assert_eq!(high, 1.0);
    }

    #[test]
    fn test_chart_series() {
        let points = chart_series(&[entry(1, 36.0), entry(2, 37.0)], Series::Binance);
        assert_eq!(points, vec![(0.0, 37.5), (1.0, 38.5)]);
    }

    #[test]
    fn test_trend_description() {
        assert_eq!(
            trend_description(&trend(TrendDirection::Up)),
            "The dollar rose from 36.00 to 36.54 Bs"
        );
        assert!(trend_description(&trend(TrendDirection::Down)).starts_with("The dollar fell"));
        assert_eq!(
            trend_description(&trend(TrendDirection::Stable)),
            "The dollar is stable around 36.27 Bs"
        );
    }

    #[test]
    fn test_format_change_percent() {
        assert_eq!(format_change_percent(1.5), "+1.5%");
        assert_eq!(format_change_percent(-0.8), "-0.8%");
        assert_eq!(format_change_percent(0.0), "0%");
    }

    #[test]
    fn test_write_history_csv() {
        let mut out = Vec::new();
        let written = write_history_csv(&[entry(1, 36.0), entry(2, 36.5)], &mut out).unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,bcv_usd,bcv_eur,binance");
        assert!(lines[1].starts_with("2024-03-01T00:00:00+00:00,36.0,"));
        assert_eq!(lines.len(), 3);
    }
}
