// 💱 Currency Normalizer
// Locale-ambiguous amount parsing, VES/USD display formatting and the
// arithmetic the calculator screens are built on.

use serde::{Deserialize, Serialize};

// ============================================================================
// CORE TYPES
// ============================================================================

/// CurrencyTag - Which side of the VES/USD pair an amount belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrencyTag {
    /// Bolívar: `1.234,56`
    #[serde(rename = "VES")]
    Ves,
    /// Dollar: `1,234.56`
    #[serde(rename = "USD")]
    Usd,
}

impl CurrencyTag {
    /// ISO code
    pub fn code(&self) -> &str {
        match self {
            CurrencyTag::Ves => "VES",
            CurrencyTag::Usd => "USD",
        }
    }

    /// Symbol used in labels
    pub fn symbol(&self) -> &str {
        match self {
            CurrencyTag::Ves => "Bs.",
            CurrencyTag::Usd => "$",
        }
    }

    /// (thousands separator, decimal separator)
    pub fn separators(&self) -> (char, char) {
        match self {
            CurrencyTag::Ves => ('.', ','),
            CurrencyTag::Usd => (',', '.'),
        }
    }

    /// Lenient lookup used by the CLI ("bs", "ves", "usd", "$")
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "ves" | "bs" | "bs." | "bolivares" => Some(CurrencyTag::Ves),
            "usd" | "$" | "dolares" => Some(CurrencyTag::Usd),
            _ => None,
        }
    }
}

// ============================================================================
// PARSING
// ============================================================================

/// Parse a free-form amount typed with either `1.234,56` or `1,234.56`
/// conventions.
///
/// Never fails: empty, unreadable or non-finite input yields `0.0`.
///
/// # Rules (in order)
/// 1. One `.` and no `,` → grouping when it splits `≤3` chars from exactly 3
///    chars (`"3.500"` → 3500), decimal point otherwise (`"100.50"`).
/// 2. One `,` and no `.` → same rule, decimal comma becomes `.`.
/// 3. Several `.` or both kinds → the rightmost separator is the decimal
///    point, every other separator is grouping.
/// 4. Several `,` and no `.` → all grouping.
/// 5. No separators → keep only the digits.
pub fn parse_currency_input(text: &str) -> f64 {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return 0.0;
    }

    let dots = cleaned.matches('.').count();
    let commas = cleaned.matches(',').count();

    if dots == 1 && commas == 0 {
        return parse_single_separator(cleaned, '.');
    }

    if commas == 1 && dots == 0 {
        return parse_single_separator(cleaned, ',');
    }

    if dots > 1 || (dots >= 1 && commas >= 1) {
        return parse_mixed_separators(cleaned);
    }

    if commas > 1 {
        return or_zero(leading_float(&cleaned.replace(',', "")));
    }

    // Sin separadores: solo cuentan los dígitos
    let digits: String = cleaned.chars().filter(|c| c.is_ascii_digit()).collect();
    or_zero(leading_float(&digits))
}

/// Keep only what an amount field accepts while typing: digits, `.` and `,`
pub fn sanitize_amount_input(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect()
}

fn parse_single_separator(text: &str, separator: char) -> f64 {
    let (int_part, frac_part) = text.split_once(separator).unwrap_or((text, ""));

    if looks_like_grouping(int_part, frac_part) {
        let stripped: String = text.chars().filter(|&c| c != separator).collect();
        return or_zero(leading_float(&stripped));
    }

    or_zero(leading_float(&text.replace(separator, ".")))
}

/// `"1.234"` / `"999,000"`: a short head followed by exactly three digits
fn looks_like_grouping(int_part: &str, frac_part: &str) -> bool {
    frac_part.chars().count() == 3 && int_part.chars().count() <= 3
}

fn parse_mixed_separators(text: &str) -> f64 {
    let last_dot = text.rfind('.');
    let last_comma = text.rfind(',');

    let (decimal, grouping) = if last_comma > last_dot {
        (',', '.')
    } else {
        ('.', ',')
    };
    let decimal_at = text.rfind(decimal);

    let normalized: String = text
        .char_indices()
        .filter_map(|(i, c)| {
            if c == grouping {
                None
            } else if c == decimal {
                (Some(i) == decimal_at).then_some('.')
            } else {
                Some(c)
            }
        })
        .collect();

    or_zero(leading_float(&normalized))
}

/// Read the longest numeric prefix (sign, digits, fraction, exponent) and
/// ignore whatever trails it. `None` when the prefix has no digits.
fn leading_float(text: &str) -> Option<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let count_digits = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }

    let int_digits = count_digits(end);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(end + 1);
        if frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }

    if int_digits + frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits = count_digits(exp_end);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    s[..end].parse::<f64>().ok()
}

fn or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

// ============================================================================
// FORMATTING
// ============================================================================

/// Locale-grouped amount with exactly 2 decimals.
///
/// Returns an empty string for `0` and non-finite values so the caller can
/// show its own placeholder.
pub fn format_for_display(amount: f64, currency: CurrencyTag) -> String {
    if !amount.is_finite() || amount == 0.0 {
        return String::new();
    }

    let (grouping, decimal) = currency.separators();
    group_digits(amount, grouping, decimal)
}

/// Machine-readable form for pasting elsewhere: `1234.50`
pub fn format_for_exact_copy(amount: f64) -> String {
    if !amount.is_finite() || amount == 0.0 {
        return "0.00".to_string();
    }
    format!("{:.2}", amount)
}

/// `Bs. 1.234,56` (zero is shown as `Bs. 0,00`)
pub fn format_bs(amount: f64) -> String {
    with_symbol(amount, CurrencyTag::Ves, " ")
}

/// `$1,234.56` (zero is shown as `$0.00`)
pub fn format_usd(amount: f64) -> String {
    with_symbol(amount, CurrencyTag::Usd, "")
}

fn with_symbol(amount: f64, currency: CurrencyTag, gap: &str) -> String {
    let amount = if amount.is_finite() { amount } else { 0.0 };
    let (grouping, decimal) = currency.separators();
    let grouped = group_digits(amount.abs(), grouping, decimal);
    let sign = if amount < 0.0 && grouped.chars().any(|c| matches!(c, '1'..='9')) {
        "-"
    } else {
        ""
    };
    format!("{}{}{}{}", sign, currency.symbol(), gap, grouped)
}

fn group_digits(amount: f64, grouping: char, decimal: char) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut out = String::with_capacity(fixed.len() + int_part.len() / 3 + 1);
    if amount < 0.0 && fixed != "0.00" {
        out.push('-');
    }

    let len = int_part.len();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(grouping);
        }
        out.push(c);
    }

    out.push(decimal);
    out.push_str(frac_part);
    out
}

// ============================================================================
// CONVERSION & DERIVED METRICS
// ============================================================================

/// Multiply by a destination-per-source rate (USD → Bs)
pub fn convert(amount: f64, rate: f64) -> f64 {
    amount * rate
}

/// Divide by the rate (Bs → USD). A zero rate gives a non-finite value.
pub fn convert_inverse(amount: f64, rate: f64) -> f64 {
    amount / rate
}

/// `((higher - lower) / lower) * 100`
///
/// Not finite when `lower == 0`; callers must check before rendering.
pub fn percent_difference(lower: f64, higher: f64) -> f64 {
    ((higher - lower) / lower) * 100.0
}

/// Change owed: `max(0, amount_given - price)`
pub fn change_amount(price: f64, amount_given: f64) -> f64 {
    (amount_given - price).max(0.0)
}

/// An amount in dollars together with its value in bolívares
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ChangeBreakdown {
    pub usd: f64,
    pub bs: f64,
}

/// Vuelto: change in USD for a purchase and its Bs value at `rate`
pub fn change_breakdown(price: f64, amount_given: f64, rate: f64) -> ChangeBreakdown {
    let usd = change_amount(price, amount_given);
    if usd <= 0.0 {
        return ChangeBreakdown::default();
    }

    ChangeBreakdown {
        usd,
        bs: convert(usd, rate),
    }
}

/// Pago mixto: what is still owed after handing over `cash` dollars
pub fn remaining_after_cash(total: f64, cash: f64, rate: f64) -> ChangeBreakdown {
    let usd = total - cash;
    if usd <= 0.0 {
        return ChangeBreakdown::default();
    }

    ChangeBreakdown {
        usd,
        bs: convert(usd, rate),
    }
}
