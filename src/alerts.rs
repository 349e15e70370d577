// 🔔 Rate Alerts
// Threshold alerts on the official rate, persisted as one JSON list

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::currency::parse_currency_input;

/// Key the alert list lives under in the key-value store
pub const ALERTS_STORAGE_KEY: &str = "@v_rate_alerts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdType {
    Above,
    Below,
}

impl ThresholdType {
    pub fn symbol(&self) -> &str {
        match self {
            ThresholdType::Above => "≥",
            ThresholdType::Below => "≤",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            ThresholdType::Above => ThresholdType::Below,
            ThresholdType::Below => ThresholdType::Above,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "above" | "up" | ">=" => Some(ThresholdType::Above),
            "below" | "down" | "<=" => Some(ThresholdType::Below),
            _ => None,
        }
    }

    /// Whether `rate` crosses a threshold of `value`
    pub fn is_crossed(&self, rate: f64, value: f64) -> bool {
        match self {
            ThresholdType::Above => rate >= value,
            ThresholdType::Below => rate <= value,
        }
    }
}

/// RateAlert - One stored threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateAlert {
    pub id: String,
    #[serde(alias = "type")]
    pub threshold_type: ThresholdType,
    pub value: f64,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub triggered: bool,
}

impl RateAlert {
    pub fn new(threshold_type: ThresholdType, value: f64) -> Self {
        RateAlert {
            id: uuid::Uuid::new_v4().to_string(),
            threshold_type,
            value,
            enabled: true,
            created_at: Utc::now(),
            triggered: false,
        }
    }

    /// Enabled and not fired yet
    pub fn is_armed(&self) -> bool {
        self.enabled && !self.triggered
    }

    pub fn describe(&self) -> String {
        format!("BCV {} {:.2} Bs", self.threshold_type.symbol(), self.value)
    }
}

/// Produced by `AlertList::check` for each alert that fired
#[derive(Debug, Clone, PartialEq)]
pub struct AlertNotification {
    pub alert_id: String,
    pub threshold_type: ThresholdType,
    pub threshold: f64,
    pub current_rate: f64,
}

impl AlertNotification {
    pub fn message(&self) -> String {
        let verb = match self.threshold_type {
            ThresholdType::Above => "rose to",
            ThresholdType::Below => "fell to",
        };
        format!(
            "BCV dollar {} {:.2} Bs (your alert: {} {} Bs)",
            verb,
            self.current_rate,
            self.threshold_type.symbol(),
            self.threshold
        )
    }
}

/// AlertList - The full alert list, in creation order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertList {
    alerts: Vec<RateAlert>,
}

impl AlertList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_alerts(alerts: Vec<RateAlert>) -> Self {
        AlertList { alerts }
    }

    pub fn alerts(&self) -> &[RateAlert] {
        &self.alerts
    }

    pub fn get(&self, id: &str) -> Option<&RateAlert> {
        self.alerts.iter().find(|a| a.id == id)
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Add an alert from user input; the value must parse to more than 0
    pub fn create(&mut self, threshold_type: ThresholdType, raw_value: &str) -> Result<&RateAlert> {
        let value = parse_currency_input(raw_value);
        if value <= 0.0 {
            return Err(anyhow!("Enter a valid value greater than 0 (got {:?})", raw_value));
        }

        let alert = RateAlert::new(threshold_type, value);
        tracing::info!(id = %alert.id, ?threshold_type, value, "alert created");
        self.alerts.push(alert);

        let last = self.alerts.len() - 1;
        Ok(&self.alerts[last])
    }

    /// Flip `enabled`; re-arms the alert either way
    pub fn toggle(&mut self, id: &str) -> Result<bool> {
        let alert = self
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| anyhow!("Alert not found: {}", id))?;

        alert.enabled = !alert.enabled;
        alert.triggered = false;
        Ok(alert.enabled)
    }

    pub fn delete(&mut self, id: &str) -> Result<RateAlert> {
        let index = self
            .alerts
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| anyhow!("Alert not found: {}", id))?;

        Ok(self.alerts.remove(index))
    }

    /// Fire every armed alert crossed by `current_rate` and mark it triggered.
    /// An empty result means nothing changed.
    pub fn check(&mut self, current_rate: f64) -> Vec<AlertNotification> {
        if !current_rate.is_finite() {
            return Vec::new();
        }

        let mut fired = Vec::new();
        for alert in self.alerts.iter_mut().filter(|a| a.is_armed()) {
            if alert.threshold_type.is_crossed(current_rate, alert.value) {
                alert.triggered = true;
                fired.push(AlertNotification {
                    alert_id: alert.id.clone(),
                    threshold_type: alert.threshold_type,
                    threshold: alert.value,
                    current_rate,
                });
            }
        }

        if !fired.is_empty() {
            tracing::info!(count = fired.len(), current_rate, "alerts triggered");
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_parses_localized_value() {
        let mut list = AlertList::new();
        let alert = list.create(ThresholdType::Above, "40,50").unwrap();
        assert_eq!(alert.value, 40.5);
        assert!(alert.enabled);
        assert!(!alert.triggered);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_create_rejects_zero() {
        let mut list = AlertList::new();
        assert!(list.create(ThresholdType::Below, "").is_err());
        assert!(list.create(ThresholdType::Below, "0,00").is_err());
        assert!(list.is_empty());
    }

    #[test]
    fn test_check_fires_once() {
        let mut list = AlertList::new();
        list.create(ThresholdType::Above, "40").unwrap();
        list.create(ThresholdType::Below, "35").unwrap();

        assert!(list.check(38.0).is_empty());

        let fired = list.check(40.0);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].threshold_type, ThresholdType::Above);
        assert!(fired[0].message().contains("rose to 40.00"));

        // Already triggered: silent until re-armed
        assert!(list.check(41.0).is_empty());

        let fired = list.check(34.9);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].threshold_type, ThresholdType::Below);
    }

    #[test]
    fn test_disabled_alerts_do_not_fire() {
        let mut list = AlertList::new();
        let id = list.create(ThresholdType::Above, "40").unwrap().id.clone();

        assert!(!list.toggle(&id).unwrap());
        assert!(list.check(50.0).is_empty());
    }

    #[test]
    fn test_toggle_rearms() {
        let mut list = AlertList::new();
        let id = list.create(ThresholdType::Above, "40").unwrap().id.clone();
        assert_eq!(list.check(45.0).len(), 1);

        list.toggle(&id).unwrap();
        list.toggle(&id).unwrap();
        assert!(!list.get(&id).unwrap().triggered);
        assert_eq!(list.check(45.0).len(), 1);
    }

    #[test]
    fn test_delete() {
        let mut list = AlertList::new();
        let id = list.create(ThresholdType::Above, "40").unwrap().id.clone();

        let removed = list.delete(&id).unwrap();
        assert_eq!(removed.value, 40.0);
        assert!(list.is_empty());
        assert!(list.delete(&id).is_err());
        assert!(list.toggle(&id).is_err());
    }

    #[test]
    fn test_json_shape() {
        let mut list = AlertList::new();
        list.create(ThresholdType::Below, "36.5").unwrap();

        let json = serde_json::to_value(&list).unwrap();
        let first = &json[0];
        assert_eq!(first["thresholdType"], "below");
        assert_eq!(first["value"], 36.5);
        assert_eq!(first["enabled"], true);
        assert_eq!(first["triggered"], false);
        assert!(first["createdAt"].is_string());
    }

    #[test]
    fn test_reads_legacy_type_field() {
        let json = r#"[{
            "id": "1709294400000",
            "type": "above",
            "value": 40,
            "enabled": true,
            "createdAt": "2024-03-01T12:00:00.000Z"
        }]"#;
        let list: AlertList = serde_json::from_str(json).unwrap();
        let alert = &list.alerts()[0];
        assert_eq!(alert.threshold_type, ThresholdType::Above);
        assert!(!alert.triggered);
        assert_eq!(alert.describe(), "BCV ≥ 40.00 Bs");
    }

    #[test]
    fn test_threshold_type_names() {
        assert_eq!(ThresholdType::from_name("Above"), Some(ThresholdType::Above));
        assert_eq!(ThresholdType::from_name("below"), Some(ThresholdType::Below));
        assert_eq!(ThresholdType::from_name("sideways"), None);
        assert_eq!(ThresholdType::Above.toggled(), ThresholdType::Below);
    }
}
