// 🧮 Calculator
// Conversion screen logic: both directions, every rate

use serde::Serialize;

use crate::currency::{convert, convert_inverse, format_for_display, CurrencyTag};
use crate::rates::Rates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConversionMode {
    /// Dollars typed, bolívares shown
    #[default]
    UsdToBs,
    /// Bolívares typed, dollars shown
    BsToUsd,
}

impl ConversionMode {
    pub fn toggled(&self) -> Self {
        match self {
            ConversionMode::UsdToBs => ConversionMode::BsToUsd,
            ConversionMode::BsToUsd => ConversionMode::UsdToBs,
        }
    }

    /// Currency of the typed amount
    pub fn input_currency(&self) -> CurrencyTag {
        match self {
            ConversionMode::UsdToBs => CurrencyTag::Usd,
            ConversionMode::BsToUsd => CurrencyTag::Ves,
        }
    }

    /// Currency of the results
    pub fn output_currency(&self) -> CurrencyTag {
        match self {
            ConversionMode::UsdToBs => CurrencyTag::Ves,
            ConversionMode::BsToUsd => CurrencyTag::Usd,
        }
    }

    pub fn placeholder(&self) -> &str {
        match self {
            ConversionMode::UsdToBs => "100.00",
            ConversionMode::BsToUsd => "37025.00",
        }
    }

    /// Preset buttons under the input
    pub fn quick_amounts(&self) -> &'static [&'static str] {
        match self {
            ConversionMode::UsdToBs => &["1", "5", "10", "20", "50", "100"],
            ConversionMode::BsToUsd => &["100", "500", "1000", "5000", "10000"],
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ConversionMode::UsdToBs => "USD → Bs",
            ConversionMode::BsToUsd => "Bs → USD",
        }
    }

    /// Apply `rate` in this direction
    pub fn apply(&self, amount: f64, rate: f64) -> f64 {
        match self {
            ConversionMode::UsdToBs => convert(amount, rate),
            ConversionMode::BsToUsd => convert_inverse(amount, rate),
        }
    }
}

/// One result row: which rate, its value and the converted amount
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversion {
    pub label: &'static str,
    pub rate: f64,
    pub result: f64,
}

/// Convert `amount` with BCV USD, BCV EUR and Binance
pub fn conversions(amount: f64, mode: ConversionMode, rates: &Rates) -> Vec<Conversion> {
    [
        ("BCV Dólar", rates.primary_rate()),
        ("BCV Euro", rates.secondary_rate()),
        ("Binance P2P", rates.alternate_rate()),
    ]
    .into_iter()
    .map(|(label, rate)| Conversion {
        label,
        rate,
        result: mode.apply(amount, rate),
    })
    .collect()
}

/// Result label; zero and non-finite results show the zero template
pub fn format_result(value: f64, mode: ConversionMode) -> String {
    let output = mode.output_currency();
    let shown = format_for_display(value, output);
    if shown.is_empty() {
        return match output {
            CurrencyTag::Ves => "Bs. 0,00".to_string(),
            CurrencyTag::Usd => "$ 0.00".to_string(),
        };
    }

    format!("{} {}", output.symbol(), shown)
}

/// Typed-amount echo ("Valor: 1,234.00"); empty when nothing was typed
pub fn format_input_echo(amount: f64, mode: ConversionMode) -> String {
    format_for_display(amount, mode.input_currency())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::{BcvRates, BestOption};
    use chrono::Utc;

    fn rates() -> Rates {
        Rates {
            bcv: BcvRates { usd: 37.5, eur: 40.0, date: None },
            binance: 39.0,
            best_option: BestOption::Bcv,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_usd_to_bs() {
        let rows = conversions(100.0, ConversionMode::UsdToBs, &rates());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].result, 3750.0);
        assert_eq!(rows[1].result, 4000.0);
        assert_eq!(rows[2].result, 3900.0);
    }

    #[test]
    fn test_bs_to_usd() {
        let rows = conversions(3750.0, ConversionMode::BsToUsd, &rates());
        assert_eq!(rows[0].result, 100.0);
        assert_eq!(rows[1].result, 93.75);
    }

    #[test]
    fn test_format_result() {
        assert_eq!(format_result(3750.0, ConversionMode::UsdToBs), "Bs. 3.750,00");
        assert_eq!(format_result(1234.5, ConversionMode::BsToUsd), "$ 1,234.50");
        assert_eq!(format_result(0.0, ConversionMode::UsdToBs), "Bs. 0,00");
        assert_eq!(format_result(f64::NAN, ConversionMode::BsToUsd), "$ 0.00");
        assert_eq!(format_result(f64::INFINITY, ConversionMode::BsToUsd), "$ 0.00");
    }

    #[test]
    fn test_mode_toggle() {
        let mode = ConversionMode::default();
        assert_eq!(mode, ConversionMode::UsdToBs);
        assert_eq!(mode.toggled(), ConversionMode::BsToUsd);
        assert_eq!(mode.toggled().placeholder(), "37025.00");
        assert_eq!(mode.input_currency(), CurrencyTag::Usd);
    }

    #[test]
    fn test_input_echo() {
        assert_eq!(format_input_echo(1234.0, ConversionMode::UsdToBs), "1,234.00");
        assert_eq!(format_input_echo(1234.0, ConversionMode::BsToUsd), "1.234,00");
        assert_eq!(format_input_echo(0.0, ConversionMode::BsToUsd), "");
    }
}
