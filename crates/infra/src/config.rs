//! Process configuration, read from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use portcullis_auth::{BreakGlassCredential, TokenTtls};

/// Upper bound on either token lifetime; longer values cannot be stamped into
/// a token's expiry.
const MAX_TOKEN_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Clone)]
pub struct GatewayConfig {
    pub http_addr: SocketAddr,
    pub log_level: String,
    pub signing_key: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Deadline applied to every policy/account store call.
    pub store_timeout: Duration,
    /// `None` selects the in-memory stores.
    pub database_url: Option<String>,
    pub policy_seed_path: Option<PathBuf>,
    /// `None` disables periodic snapshot reloads.
    pub policy_refresh: Option<Duration>,
    /// `None` disables the break-glass administrative path.
    pub break_glass: Option<BreakGlassCredential>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let http_addr: SocketAddr = parse_or(&get, "HTTP_ADDR", "0.0.0.0:4040".parse().ok())?;
        let log_level = get("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let signing_key = get("SIGN_IN_KEY").ok_or(ConfigError::Missing("SIGN_IN_KEY"))?;

        let access_minutes: u64 = parse_or(&get, "ACCESS_TOKEN_TIMEOUT", Some(1000))?;
        let refresh_hours: u64 = parse_or(&get, "REFRESH_TOKEN_TIMEOUT", Some(1000))?;
        let ctx_secs: u64 = parse_or(&get, "CTX_TIMEOUT", Some(7))?;
        let refresh_secs: u64 = parse_or(&get, "POLICY_REFRESH_SECS", Some(0))?;

        for (var, value) in [
            ("ACCESS_TOKEN_TIMEOUT", access_minutes),
            ("REFRESH_TOKEN_TIMEOUT", refresh_hours),
            ("CTX_TIMEOUT", ctx_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    var,
                    value: value.to_string(),
                });
            }
        }

        let break_glass = match (get("SUPERADMIN_USERNAME"), get("SUPERADMIN_PASSWORD")) {
            (Some(user), Some(pass)) => Some(BreakGlassCredential::new(user, pass)),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("SUPERADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("SUPERADMIN_USERNAME")),
        };

        Ok(Self {
            http_addr,
            log_level,
            signing_key,
            access_ttl: token_ttl("ACCESS_TOKEN_TIMEOUT", access_minutes, 60)?,
            refresh_ttl: token_ttl("REFRESH_TOKEN_TIMEOUT", refresh_hours, 60 * 60)?,
            store_timeout: Duration::from_secs(ctx_secs),
            database_url: get("DATABASE_URL"),
            policy_seed_path: get("POLICY_SEED_PATH").map(PathBuf::from),
            policy_refresh: (refresh_secs > 0).then(|| Duration::from_secs(refresh_secs)),
            break_glass,
        })
    }

    pub fn token_ttls(&self) -> TokenTtls {
        TokenTtls {
            access: self.access_ttl,
            refresh: self.refresh_ttl,
        }
    }
}

fn token_ttl(var: &'static str, count: u64, unit_secs: u64) -> Result<Duration, ConfigError> {
    count
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .filter(|ttl| *ttl <= MAX_TOKEN_TTL)
        .ok_or_else(|| ConfigError::Invalid {
            var,
            value: count.to_string(),
        })
}

fn parse_or<T, G>(get: &G, var: &'static str, default: Option<T>) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => default.ok_or(ConfigError::Missing(var)),
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("http_addr", &self.http_addr)
            .field("log_level", &self.log_level)
            .field("signing_key", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("store_timeout", &self.store_timeout)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("policy_seed_path", &self.policy_seed_path)
            .field("policy_refresh", &self.policy_refresh)
            .field("break_glass", &self.break_glass.is_some())
            .finish()
    }
}
