// Kambio - Core Library
// Exposes all modules for use in the TUI, the CLI commands and tests

pub mod currency;
pub mod rates;
pub mod query;
pub mod alerts;
pub mod db;
pub mod history;
pub mod calculator;
pub mod share;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use currency::{
    CurrencyTag, ChangeBreakdown,
    parse_currency_input, sanitize_amount_input,
    format_for_display, format_for_exact_copy, format_bs, format_usd,
    convert, convert_inverse, percent_difference, change_amount,
    change_breakdown, remaining_after_cash,
};
pub use rates::{
    Rates, BcvRates, BestOption, BestOptionBadge,
    HistoryEntry, HistoryResponse, Trend, TrendDirection, Period,
    RateProvider, HttpRateProvider,
};
pub use query::{fetch_with_retry, QueryCache, QueryKey, QueryPolicy};
pub use alerts::{AlertList, AlertNotification, RateAlert, ThresholdType, ALERTS_STORAGE_KEY};
pub use db::{
    open_store, setup_database, get_item, set_item, remove_item,
    load_alerts, save_alerts, load_last_rates, save_last_rates,
};
pub use history::{chart_bounds, chart_series, trend_description, write_history_csv, Series};
pub use calculator::{conversions, format_result, Conversion, ConversionMode};
pub use share::rates_summary;
pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
