//! # Configuration Management
//!
//! Configuration comes from the environment (and a `.env` file if present).
//!
//! ## Environment Variables
//! - `HOST`: Server bind address (default: 127.0.0.1)
//! - `PORT`: Server port (default: 8000)
//! - `DATABASE_URL`: SQLite database connection string
//! - `RP_ID`: WebAuthn Relying Party ID (usually your domain)
//! - `RP_ORIGIN`: Origin assertions must come from (full URL)
//! - `APP_ID`: Legacy U2F app id; empty disables the `appid` extension
//! - `CHALLENGE_TIMEOUT_MS`: Client-side timeout advertised with a challenge
//! - `ENFORCE_SIGN_COUNT`: Reject non-increasing signature counters
//! - `TOTP_TOLERANCE`: TOTP steps of clock drift accepted either way

use crate::factors::totp::DEFAULT_TOLERANCE;
use crate::webauthn::{RelyingParty, SignCountPolicy};
use anyhow::Result;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,

    /// Format: "sqlite:filename.db?mode=rwc" (read, write, create)
    pub database_url: String,

    /// WebAuthn Relying Party ID, without scheme or port.
    /// For local development: "localhost"
    pub rp_id: String,

    /// Full origin of the login page, e.g. "https://localhost:8000"
    pub rp_origin: String,

    /// App id legacy U2F keys were registered under. Usually the origin the
    /// site had when those keys were enrolled.
    pub app_id: Option<String>,

    pub challenge_timeout_ms: u32,

    pub enforce_sign_count: bool,

    pub totp_tolerance: i64,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// ## Example .env file
    /// ```text
    /// HOST=127.0.0.1
    /// PORT=8000
    /// DATABASE_URL=sqlite:second_factor.db?mode=rwc
    /// RP_ID=localhost
    /// RP_ORIGIN=https://localhost:8000
    /// APP_ID=https://localhost:8000
    /// ```
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let app_id = env::var("APP_ID").unwrap_or_else(|_| "https://localhost:8000".to_string());

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:second_factor.db?mode=rwc".to_string()),
            rp_id: env::var("RP_ID").unwrap_or_else(|_| "localhost".to_string()),
            rp_origin: env::var("RP_ORIGIN")
                .unwrap_or_else(|_| "https://localhost:8000".to_string()),
            app_id: Some(app_id).filter(|s| !s.is_empty()),
            challenge_timeout_ms: env::var("CHALLENGE_TIMEOUT_MS")
                .unwrap_or_else(|_| "60000".to_string())
                .parse()?,
            enforce_sign_count: parse_bool(&env::var("ENFORCE_SIGN_COUNT").unwrap_or_default()),
            totp_tolerance: env::var("TOTP_TOLERANCE")
                .unwrap_or_else(|_| DEFAULT_TOLERANCE.to_string())
                .parse()?,
        })
    }

    /// "127.0.0.1:8000"
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn relying_party(&self) -> RelyingParty {
        RelyingParty {
            id: self.rp_id.clone(),
            origin: self.rp_origin.clone(),
            app_id: self.app_id.clone(),
            timeout_ms: self.challenge_timeout_ms,
        }
    }

    pub fn sign_count_policy(&self) -> SignCountPolicy {
        if self.enforce_sign_count {
            SignCountPolicy::Enforce
        } else {
            SignCountPolicy::Ignore
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            host: "127.0.0.1".into(),
            port: 8000,
            database_url: "sqlite::memory:".into(),
            rp_id: "localhost".into(),
            rp_origin: "https://localhost:8000".into(),
            app_id: Some("https://localhost:8000".into()),
            challenge_timeout_ms: 60_000,
            enforce_sign_count: false,
            totp_tolerance: 1,
        }
    }

    #[test]
    fn bool_parsing() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" ON "));
        assert!(parse_bool("1"));
        assert!(!parse_bool(""));
        assert!(!parse_bool("no"));
    }

    #[test]
    fn sign_count_policy_defaults_to_ignore() {
        assert_eq!(config().sign_count_policy(), SignCountPolicy::Ignore);
        let enforcing = Config { enforce_sign_count: true, ..config() };
        assert_eq!(enforcing.sign_count_policy(), SignCountPolicy::Enforce);
    }

    #[test]
    fn relying_party_from_config() {
        let rp = config().relying_party();
        assert_eq!(rp.id, "localhost");
        assert_eq!(rp.origin, "https://localhost:8000");
        assert_eq!(rp.app_id.as_deref(), Some("https://localhost:8000"));
        assert_eq!(config().bind_address(), "127.0.0.1:8000");
    }
}
