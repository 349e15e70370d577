use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::alerts::{AlertList, ALERTS_STORAGE_KEY};
use crate::rates::Rates;

/// Key for the last rates we managed to fetch
pub const LAST_RATES_KEY: &str = "@v_last_rates";

/// Open (or create) the local store and make sure the schema exists
pub fn open_store(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery (in-memory databases answer "memory")
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Key-value table: one JSON document per key
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

pub fn get_item(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM kv_store WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("Failed to read key {}", key))
}

pub fn set_item(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, Utc::now().to_rfc3339()],
    )
    .with_context(|| format!("Failed to write key {}", key))?;
    Ok(())
}

/// Returns whether the key existed
pub fn remove_item(conn: &Connection, key: &str) -> Result<bool> {
    let removed = conn
        .execute("DELETE FROM kv_store WHERE key = ?1", params![key])
        .with_context(|| format!("Failed to delete key {}", key))?;
    Ok(removed > 0)
}

/// Load the alert list. A corrupt stored value is logged and read as empty.
pub fn load_alerts(conn: &Connection) -> Result<AlertList> {
    let Some(stored) = get_item(conn, ALERTS_STORAGE_KEY)? else {
        return Ok(AlertList::new());
    };

    match serde_json::from_str::<AlertList>(&stored) {
        Ok(list) => Ok(list),
        Err(err) => {
            tracing::warn!(error = %err, "stored alert list is not valid JSON, starting empty");
            Ok(AlertList::new())
        }
    }
}

pub fn save_alerts(conn: &Connection, alerts: &AlertList) -> Result<()> {
    let json = serde_json::to_string(alerts)?;
    set_item(conn, ALERTS_STORAGE_KEY, &json)?;
    tracing::debug!(count = alerts.len(), "alerts saved");
    Ok(())
}

/// Last-known rates, shown while the service cannot be reached
pub fn load_last_rates(conn: &Connection) -> Result<Option<Rates>> {
    let Some(stored) = get_item(conn, LAST_RATES_KEY)? else {
        return Ok(None);
    };

    match serde_json::from_str(&stored) {
        Ok(rates) => Ok(Some(rates)),
        Err(err) => {
            tracing::warn!(error = %err, "ignoring unreadable cached rates");
            Ok(None)
        }
    }
}

pub fn save_last_rates(conn: &Connection, rates: &Rates) -> Result<()> {
    let json = serde_json::to_string(rates)?;
    set_item(conn, LAST_RATES_KEY, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::ThresholdType;
    use crate::rates::{BcvRates, BestOption};

    fn memory_store() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_setup_is_idempotent() {
        let conn = memory_store();
        setup_database(&conn).unwrap();
        set_item(&conn, "k", "v").unwrap();
        assert_eq!(get_item(&conn, "k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_set_get_remove() {
        let conn = memory_store();
        assert!(get_item(&conn, "missing").unwrap().is_none());

        set_item(&conn, "theme", "dark").unwrap();
        set_item(&conn, "theme", "light").unwrap();
        assert_eq!(get_item(&conn, "theme").unwrap().as_deref(), Some("light"));

        assert!(remove_item(&conn, "theme").unwrap());
        assert!(!remove_item(&conn, "theme").unwrap());
        assert!(get_item(&conn, "theme").unwrap().is_none());
    }

    #[test]
    fn test_alerts_round_trip_through_store() {
        let conn = memory_store();
        assert!(load_alerts(&conn).unwrap().is_empty());

        let mut alerts = AlertList::new();
        alerts.create(ThresholdType::Above, "40").unwrap();
        alerts.create(ThresholdType::Below, "35,5").unwrap();
        alerts.check(41.0);
        save_alerts(&conn, &alerts).unwrap();

        let loaded = load_alerts(&conn).unwrap();
        assert_eq!(loaded, alerts);
        assert!(loaded.alerts()[0].triggered);
    }

    #[test]
    fn test_alerts_stored_as_single_json_array() {
        let conn = memory_store();
        let mut alerts = AlertList::new();
        alerts.create(ThresholdType::Above, "40").unwrap();
        save_alerts(&conn, &alerts).unwrap();

        let raw = get_item(&conn, ALERTS_STORAGE_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["thresholdType"], "above");
    }

    #[test]
    fn test_corrupt_alerts_read_as_empty() {
        let conn = memory_store();
        set_item(&conn, ALERTS_STORAGE_KEY, "{not json").unwrap();
        assert!(load_alerts(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_last_rates_cache() {
        let conn = memory_store();
        assert!(load_last_rates(&conn).unwrap().is_none());

        let rates = Rates {
            bcv: BcvRates { usd: 36.5, eur: 39.8, date: None },
            binance: 38.0,
            best_option: BestOption::Bcv,
            last_updated: Utc::now(),
        };
        save_last_rates(&conn, &rates).unwrap();
        assert_eq!(load_last_rates(&conn).unwrap(), Some(rates));
    }
}
