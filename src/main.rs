// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use rusqlite::Connection;
use std::env;
use std::io;

use kambio::logging::{init_logging, LogTarget};
use kambio::{
    change_breakdown, conversions, format_bs, format_for_exact_copy, format_result, format_usd,
    fetch_with_retry, load_alerts, load_last_rates, open_store, parse_currency_input,
    rates_summary, remaining_after_cash, save_alerts, save_last_rates, trend_description,
    write_history_csv, BestOptionBadge, Config, ConversionMode, CurrencyTag, HttpRateProvider,
    Period, QueryKey, QueryPolicy, RateProvider, Rates, Trend, ThresholdType,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let config = Config::from_env()?;

    match args.get(1).map(String::as_str) {
        None | Some("ui") => run_ui_mode(&config),
        Some(command) => {
            init_logging(LogTarget::Stderr);
            run_command(command, &args[2..], &config)
        }
    }
}

fn run_command(command: &str, rest: &[String], config: &Config) -> Result<()> {
    match command {
        "rates" => run_rates(config),
        "convert" => run_convert(rest, config),
        "change" => run_change(rest, config),
        "mixed" => run_mixed(rest, config),
        "history" => run_history(rest, config),
        "alerts" => run_alerts(rest, config),
        "share" => run_share(config),
        "config" => {
            println!("{}", serde_json::to_string_pretty(config)?);
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            print_usage();
            bail!("Unknown command: {}", other)
        }
    }
}

fn print_usage() {
    println!("kambio {}", kambio::VERSION);
    println!();
    println!("Usage:");
    println!("  kambio                          interactive UI");
    println!("  kambio rates                    current rates and best option");
    println!("  kambio convert <amount> [usd|bs]");
    println!("  kambio change <price> <given>   change for a purchase in USD");
    println!("  kambio mixed <total> <cash>     what is left to pay in Bs");
    println!("  kambio history [7|30|90] [--csv|--trend]");
    println!("  kambio alerts [list|add above|below <value>|toggle <id>|delete <id>|check]");
    println!("  kambio share                    shareable rate summary");
    println!("  kambio config                   effective settings");
}

// ============================================================================
// Shared helpers
// ============================================================================

fn provider(config: &Config) -> Result<HttpRateProvider> {
    HttpRateProvider::new(&config.api_url, config.request_timeout())
}

/// Fetch with retries; fall back to the last stored rates when offline
fn current_rates(config: &Config, conn: &Connection) -> Result<Rates> {
    let provider = provider(config)?;

    match fetch_with_retry(QueryKey::Rates, &QueryPolicy::rates(), || provider.fetch_rates()) {
        Ok(rates) => {
            save_last_rates(conn, &rates)?;
            Ok(rates)
        }
        Err(err) => match load_last_rates(conn)? {
            Some(rates) => {
                eprintln!("⚠️  Rate service unavailable ({:#})", err);
                eprintln!("   Showing rates from {}", rates.last_updated.with_timezone(&Local).format("%d/%m/%Y %H:%M"));
                Ok(rates)
            }
            None => Err(err.context("Could not fetch rates and none are cached")),
        },
    }
}

fn amount_arg(rest: &[String], index: usize, name: &str) -> Result<f64> {
    let raw = rest
        .get(index)
        .ok_or_else(|| anyhow!("Missing <{}>", name))?;
    Ok(parse_currency_input(raw))
}

// ============================================================================
// Commands
// ============================================================================

fn run_rates(config: &Config) -> Result<()> {
    let conn = open_store(&config.db_path)?;
    let rates = current_rates(config, &conn)?;

    println!("💱 Exchange rates");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("🏦 BCV Dólar   {}", format_bs(rates.primary_rate()));
    println!("🏦 BCV Euro    {}", format_bs(rates.secondary_rate()));
    println!("🔷 Binance P2P {}", format_bs(rates.alternate_rate()));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Best option: {}", rates.best_option().label());

    if let Some(badge) = BestOptionBadge::from_rates(rates.primary_rate(), rates.alternate_rate()) {
        println!(
            "💡 Paying with {} is {:.1}% cheaper today",
            badge.cheapest.label(),
            badge.percent_cheaper
        );
    }

    println!(
        "🕐 Updated {}",
        rates.last_updated.with_timezone(&Local).format("%d/%m/%Y %H:%M")
    );
    Ok(())
}

fn run_convert(rest: &[String], config: &Config) -> Result<()> {
    let amount = amount_arg(rest, 0, "amount")?;
    let mode = match rest.get(1).map(|c| CurrencyTag::from_code(c)) {
        None | Some(Some(CurrencyTag::Usd)) => ConversionMode::UsdToBs,
        Some(Some(CurrencyTag::Ves)) => ConversionMode::BsToUsd,
        Some(None) => bail!("Currency must be usd or bs"),
    };

    let conn = open_store(&config.db_path)?;
    let rates = current_rates(config, &conn)?;

    println!("🔄 {} ({})", mode.label(), format_for_exact_copy(amount));
    for row in conversions(amount, mode, &rates) {
        println!(
            "  {:<12} @ {:>10.2}  {:>20}   copy: {}",
            row.label,
            row.rate,
            format_result(row.result, mode),
            format_for_exact_copy(row.result)
        );
    }
    Ok(())
}

fn run_change(rest: &[String], config: &Config) -> Result<()> {
    let price = amount_arg(rest, 0, "price")?;
    let given = amount_arg(rest, 1, "given")?;

    let conn = open_store(&config.db_path)?;
    let rates = current_rates(config, &conn)?;
    let change = change_breakdown(price, given, rates.active_rate());

    println!("🧾 Change ({} rate)", rates.best_option().label());
    println!("  {}", format_usd(change.usd));
    println!("  {}", format_bs(change.bs));
    Ok(())
}

fn run_mixed(rest: &[String], config: &Config) -> Result<()> {
    let total = amount_arg(rest, 0, "total")?;
    let cash = amount_arg(rest, 1, "cash")?;

    let conn = open_store(&config.db_path)?;
    let rates = current_rates(config, &conn)?;
    let remaining = remaining_after_cash(total, cash, rates.active_rate());

    println!("💵 Mixed payment ({} rate)", rates.best_option().label());
    println!("  Remaining in USD: {}", format_usd(remaining.usd));
    println!("  Pay in Bs:        {}", format_bs(remaining.bs));
    Ok(())
}

fn run_history(rest: &[String], config: &Config) -> Result<()> {
    let as_csv = rest.iter().any(|a| a == "--csv");
    let trend_only = rest.iter().any(|a| a == "--trend");
    let days = match rest.iter().find(|a| !a.starts_with("--")) {
        Some(raw) => {
            let days: u32 = raw.parse().with_context(|| format!("Invalid day count: {}", raw))?;
            Period::from_days(days)
                .ok_or_else(|| anyhow!("History is available for 7, 30 or 90 days"))?
                .days()
        }
        None => Period::default().days(),
    };

    let provider = provider(config)?;

    if trend_only {
        let trend = fetch_with_retry(QueryKey::History(days), &QueryPolicy::history(), || {
            provider.fetch_trend(days)
        })?;
        println!("📈 Last {} days ({} points)", days, trend.data_points);
        print_trend(&trend);
        return Ok(());
    }

    let history = fetch_with_retry(QueryKey::History(days), &QueryPolicy::history(), || {
        provider.fetch_history(days)
    })?;

    if as_csv {
        write_history_csv(&history.data, io::stdout().lock())?;
        return Ok(());
    }

    println!("📈 Last {} days ({} points)", history.period, history.trend.data_points);
    print_trend(&history.trend);
    for entry in &history.data {
        println!(
            "  {}  BCV {:>8.2}  EUR {:>8.2}  Binance {:>8.2}",
            entry.timestamp.with_timezone(&Local).format("%d/%m %H:%M"),
            entry.bcv_usd,
            entry.bcv_eur,
            entry.binance
        );
    }
    Ok(())
}

fn print_trend(trend: &Trend) {
    println!("  {}", trend_description(trend));
    println!("  Change: {}", kambio::history::format_change_percent(trend.change_percent));
    if trend.data_points > 0 {
        println!(
            "  Min {:.2} Bs | Max {:.2} Bs | Avg {:.2} Bs",
            trend.min_bcv, trend.max_bcv, trend.avg_bcv
        );
    }
}

fn run_alerts(rest: &[String], config: &Config) -> Result<()> {
    let conn = open_store(&config.db_path)?;
    let mut alerts = load_alerts(&conn)?;

    match rest.first().map(String::as_str) {
        None | Some("list") => {
            if alerts.is_empty() {
                println!("🔕 No alerts yet");
            }
            for alert in alerts.alerts() {
                let status = match (alert.enabled, alert.triggered) {
                    (false, _) => "off",
                    (true, true) => "triggered",
                    (true, false) => "armed",
                };
                println!("  {}  {}  [{}]", alert.id, alert.describe(), status);
            }
        }
        Some("add") => {
            let kind = rest
                .get(1)
                .and_then(|k| ThresholdType::from_name(k))
                .ok_or_else(|| anyhow!("Alert type must be above or below"))?;
            let raw = rest.get(2).ok_or_else(|| anyhow!("Missing <value>"))?;
            let alert = alerts.create(kind, raw)?;
            println!("✅ Alert created: {} ({})", alert.describe(), alert.id);
            save_alerts(&conn, &alerts)?;
        }
        Some("toggle") => {
            let id = rest.get(1).ok_or_else(|| anyhow!("Missing <id>"))?;
            let enabled = alerts.toggle(id)?;
            save_alerts(&conn, &alerts)?;
            println!("✓ Alert {} {}", id, if enabled { "enabled" } else { "disabled" });
        }
        Some("delete") => {
            let id = rest.get(1).ok_or_else(|| anyhow!("Missing <id>"))?;
            let removed = alerts.delete(id)?;
            save_alerts(&conn, &alerts)?;
            println!("🗑️  Deleted {}", removed.describe());
        }
        Some("check") => {
            let rates = current_rates(config, &conn)?;
            let fired = alerts.check(rates.primary_rate());
            if fired.is_empty() {
                println!("✓ No alert crossed (BCV {:.2} Bs)", rates.primary_rate());
            } else {
                for notification in &fired {
                    println!("🔔 {}", notification.message());
                }
                save_alerts(&conn, &alerts)?;
            }
        }
        Some(other) => bail!("Unknown alerts action: {}", other),
    }

    Ok(())
}

fn run_share(config: &Config) -> Result<()> {
    let conn = open_store(&config.db_path)?;
    let rates = current_rates(config, &conn)?;
    println!("{}", rates_summary(&rates, &Local::now()));
    Ok(())
}

// ============================================================================
// Interactive mode
// ============================================================================

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create log directory {}", config.log_dir.display()))?;
    init_logging(LogTarget::File(&config.log_dir));

    let conn = open_store(&config.db_path)?;
    let provider = provider(config)?;

    tracing::info!(api = %config.api_url, db = %config.db_path.display(), "starting UI");

    let mut app = ui::App::new(Box::new(provider), conn)?;
    ui::run_ui(&mut app)?;

    println!("👋 Bye");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the commands: kambio help");
    std::process::exit(1);
}
