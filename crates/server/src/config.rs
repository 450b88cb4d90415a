//! Environment configuration (§6 "Environment configuration"), read once at
//! startup. Unknown environment variables are ignored; `jwt_secret` is the
//! one required value — startup fails if it is unset.

use std::net::SocketAddr;
use std::path::PathBuf;

use revisit_db::Weights;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:4000";

fn get_env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn get_weight_env_or(name: &str, default: f64) -> f64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub env_tag: String,
    pub database_url: Option<PathBuf>,
    pub jwt_secret: String,
    pub default_weights: Weights,
    pub csv_bundle_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the environment. Fails if `REVISIT_JWT_SECRET`
    /// is unset, per §6 ("JWT signing secret (required; startup fails if unset)").
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("REVISIT_JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("REVISIT_JWT_SECRET must be set; refusing to start without a signing secret"))?;
        if jwt_secret.trim().is_empty() {
            anyhow::bail!("REVISIT_JWT_SECRET must not be empty");
        }

        let bind_addr: SocketAddr = get_env_or("REVISIT_BIND_ADDR", DEFAULT_BIND_ADDR)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid REVISIT_BIND_ADDR: {e}"))?;

        let default_weights = Weights {
            conf: get_weight_env_or("REVISIT_WEIGHT_CONF", revisit_core::WeightVector::default().conf),
            days: get_weight_env_or("REVISIT_WEIGHT_DAYS", revisit_core::WeightVector::default().days),
            attempts: get_weight_env_or("REVISIT_WEIGHT_ATTEMPTS", revisit_core::WeightVector::default().attempts),
            time: get_weight_env_or("REVISIT_WEIGHT_TIME", revisit_core::WeightVector::default().time),
            difficulty: get_weight_env_or("REVISIT_WEIGHT_DIFFICULTY", revisit_core::WeightVector::default().difficulty),
            failed: get_weight_env_or("REVISIT_WEIGHT_FAILED", revisit_core::WeightVector::default().failed),
            pattern: get_weight_env_or("REVISIT_WEIGHT_PATTERN", revisit_core::WeightVector::default().pattern),
        };

        Ok(Self {
            bind_addr,
            env_tag: get_env_or("REVISIT_ENV", "development"),
            database_url: std::env::var("REVISIT_DATABASE_URL").ok().map(PathBuf::from),
            jwt_secret,
            default_weights,
            csv_bundle_path: std::env::var("REVISIT_CSV_BUNDLE_PATH").ok().map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_jwt_secret_fails_startup() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("REVISIT_JWT_SECRET");
        assert!(Config::from_env().is_err());
    }

    #[test]
    fn bind_addr_defaults_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("REVISIT_JWT_SECRET", "test-secret");
        std::env::remove_var("REVISIT_BIND_ADDR");
        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_addr.port(), 4000);
        std::env::remove_var("REVISIT_JWT_SECRET");
    }
}
