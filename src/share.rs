// 📤 Share summary
// Multi-line rate summary for pasting into a chat

use chrono::{DateTime, TimeZone};

use crate::rates::{BestOption, Rates};

const RULE: &str = "━━━━━━━━━━━━━━━";

fn best_option_emoji(option: BestOption) -> &'static str {
    match option {
        BestOption::Bcv => "🏦",
        BestOption::Binance => "🔷",
    }
}

/// Build the summary text. `now` decides the time/date footer.
pub fn rates_summary<Tz: TimeZone>(rates: &Rates, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let best = rates.best_option();

    [
        "💰 *TASAS KAMBIO*".to_string(),
        RULE.to_string(),
        format!("🏦 BCV: Bs. {:.2}", rates.primary_rate()),
        format!("🔷 Binance: Bs. {:.2}", rates.alternate_rate()),
        RULE.to_string(),
        format!(
            "{} Mejor: {}",
            best_option_emoji(best),
            best.label().to_uppercase()
        ),
        format!("🕐 {} | 📅 {}", now.format("%H:%M"), now.format("%d/%m/%Y")),
        RULE.to_string(),
        "_Generado por Kambio_".to_string(),
    ]
    .join("\n")
}
