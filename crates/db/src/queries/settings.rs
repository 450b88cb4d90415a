//! Settings store (C8, §4.8): global key→string map with a fixed
//! recognized set. Unknown keys are rejected; parse failures fall back to
//! defaults and are logged, never surfaced as an error to the caller.

use revisit_core::WeightVector;
use revisit_types::DomainError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Database;

const RECOGNIZED_KEYS: &[&str] = &[
    "w_conf",
    "w_days",
    "w_attempts",
    "w_time",
    "w_difficulty",
    "w_failed",
    "w_pattern",
    "signup_enabled",
    "invite_codes_enabled",
];

/// The scoring weights as stored/exposed through settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weights {
    pub conf: f64,
    pub days: f64,
    pub attempts: f64,
    pub time: f64,
    pub difficulty: f64,
    pub failed: f64,
    pub pattern: f64,
}

impl From<WeightVector> for Weights {
    fn from(w: WeightVector) -> Self {
        Self {
            conf: w.conf,
            days: w.days,
            attempts: w.attempts,
            time: w.time,
            difficulty: w.difficulty,
            failed: w.failed,
            pattern: w.pattern,
        }
    }
}

impl From<Weights> for WeightVector {
    fn from(w: Weights) -> Self {
        WeightVector::new(w.conf, w.days, w.attempts, w.time, w.difficulty, w.failed, w.pattern)
    }
}

fn parse_or_default(raw: Option<String>, default: f64, key: &str) -> f64 {
    match raw.and_then(|s| s.parse::<f64>().ok()) {
        Some(v) => v,
        None => {
            warn!(key, "unparseable setting value, falling back to default");
            default
        }
    }
}

impl Database {
    /// Write a single recognized setting, rejecting unknown keys.
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), DomainError> {
        if !RECOGNIZED_KEYS.contains(&key) {
            return Err(DomainError::BadRequest(format!("unknown setting key '{key}'")));
        }
        sqlx::query("INSERT INTO settings (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value")
            .bind(key)
            .bind(value)
            .execute(self.pool())
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Option<String> {
        sqlx::query_as::<_, (String,)>("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await
            .ok()
            .flatten()
            .map(|(v,)| v)
    }

    /// Read the scoring weights, falling back to defaults key-by-key.
    pub async fn get_weights(&self) -> Weights {
        let defaults: Weights = WeightVector::default().into();
        Weights {
            conf: parse_or_default(self.get_setting("w_conf").await, defaults.conf, "w_conf"),
            days: parse_or_default(self.get_setting("w_days").await, defaults.days, "w_days"),
            attempts: parse_or_default(self.get_setting("w_attempts").await, defaults.attempts, "w_attempts"),
            time: parse_or_default(self.get_setting("w_time").await, defaults.time, "w_time"),
            difficulty: parse_or_default(self.get_setting("w_difficulty").await, defaults.difficulty, "w_difficulty"),
            failed: parse_or_default(self.get_setting("w_failed").await, defaults.failed, "w_failed"),
            pattern: parse_or_default(self.get_setting("w_pattern").await, defaults.pattern, "w_pattern"),
        }
    }

    pub async fn set_weights(&self, weights: Weights) -> Result<(), DomainError> {
        self.set_setting("w_conf", &weights.conf.to_string()).await?;
        self.set_setting("w_days", &weights.days.to_string()).await?;
        self.set_setting("w_attempts", &weights.attempts.to_string()).await?;
        self.set_setting("w_time", &weights.time.to_string()).await?;
        self.set_setting("w_difficulty", &weights.difficulty.to_string()).await?;
        self.set_setting("w_failed", &weights.failed.to_string()).await?;
        self.set_setting("w_pattern", &weights.pattern.to_string()).await?;
        Ok(())
    }

    pub async fn signup_enabled(&self) -> bool {
        self.get_setting("signup_enabled").await.as_deref() == Some("true")
    }

    pub async fn invite_codes_enabled(&self) -> bool {
        self.get_setting("invite_codes_enabled").await.map(|v| v != "false").unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_key_is_rejected() {
        let db = Database::new_in_memory().await.unwrap();
        let err = db.set_setting("w_bogus", "0.5").await.unwrap_err();
        assert!(matches!(err, DomainError::BadRequest(_)));
    }

    #[tokio::test]
    async fn weights_default_when_unset() {
        let db = Database::new_in_memory().await.unwrap();
        let weights = db.get_weights().await;
        assert_eq!(weights, WeightVector::default().into());
    }

    #[tokio::test]
    async fn set_and_read_back_weights() {
        let db = Database::new_in_memory().await.unwrap();
        let custom = Weights {
            conf: 0.5,
            days: 0.1,
            attempts: 0.1,
            time: 0.1,
            difficulty: 0.1,
            failed: 0.05,
            pattern: 0.05,
        };
        db.set_weights(custom).await.unwrap();
        let read_back = db.get_weights().await;
        assert_eq!(read_back, custom);
    }

    #[tokio::test]
    async fn signup_defaults_to_disabled() {
        let db = Database::new_in_memory().await.unwrap();
        assert!(!db.signup_enabled().await);
        assert!(db.invite_codes_enabled().await);
    }
}
