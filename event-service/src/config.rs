use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use anyhow::{anyhow, bail, Context, Result};
use common_auth::{TokenConfig, DEFAULT_TTL_SECONDS, MAX_TTL_SECONDS};

pub const MIN_SECRET_BYTES: usize = 16;
pub const DEFAULT_RECENT_ACTIVITY_LIMIT: usize = 20;
const DEFAULT_PORT: u16 = 8080;

#[derive(Clone)]
pub struct ServiceConfig {
    jwt_secret: String,
    pub token_ttl_seconds: u64,
    pub enforce_account_status: bool,
    pub database_url: Option<String>,
    pub host: IpAddr,
    pub port: u16,
    pub recent_activity_default_limit: usize,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("enforce_account_status", &self.enforce_account_status)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("recent_activity_default_limit", &self.recent_activity_default_limit)
            .finish()
    }
}

impl ServiceConfig {
    /// In-memory configuration with defaults for everything but the secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: secret.into(),
            token_ttl_seconds: DEFAULT_TTL_SECONDS,
            enforce_account_status: true,
            database_url: None,
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            recent_activity_default_limit: DEFAULT_RECENT_ACTIVITY_LIMIT,
        }
    }

    pub fn token_config(&self) -> TokenConfig {
        TokenConfig::new(self.jwt_secret.clone()).with_ttl(self.token_ttl_seconds)
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

pub fn load_service_config() -> Result<ServiceConfig> {
    load_from(|key| env::var(key).ok())
}

/// Builds the configuration from any key lookup; the process environment in
/// production, a map in tests.
pub fn load_from<F>(lookup: F) -> Result<ServiceConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let jwt_secret = lookup("APP_JWT_SECRET")
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("APP_JWT_SECRET must be set"))?;
    if jwt_secret.len() < MIN_SECRET_BYTES {
        bail!("APP_JWT_SECRET must be at least {MIN_SECRET_BYTES} bytes");
    }

    let token_ttl_seconds = match lookup("APP_JWT_TTL_SECONDS") {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("Failed to parse APP_JWT_TTL_SECONDS '{raw}'"))?,
        None => DEFAULT_TTL_SECONDS,
    };
    if token_ttl_seconds == 0 {
        bail!("APP_JWT_TTL_SECONDS must be greater than zero");
    }
    if token_ttl_seconds > MAX_TTL_SECONDS {
        bail!("APP_JWT_TTL_SECONDS must not exceed {MAX_TTL_SECONDS}");
    }

    let enforce_account_status = lookup("AUTH_ENFORCE_ACCOUNT_STATUS")
        .map(|value| is_truthy(&value))
        .unwrap_or(true);

    let database_url = lookup("DATABASE_URL").and_then(|value| normalize_optional(&value));

    let host = lookup("HOST")
        .unwrap_or_else(|| "0.0.0.0".to_string())
        .parse::<IpAddr>()
        .context("Failed to parse HOST")?;
    let port = match lookup("PORT") {
        Some(raw) => raw
            .trim()
            .parse::<u16>()
            .with_context(|| format!("Failed to parse PORT '{raw}'"))?,
        None => DEFAULT_PORT,
    };

    let recent_activity_default_limit = match lookup("AUDIT_RECENT_DEFAULT_LIMIT") {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .with_context(|| format!("Failed to parse AUDIT_RECENT_DEFAULT_LIMIT '{raw}'"))?,
        None => DEFAULT_RECENT_ACTIVITY_LIMIT,
    };

    Ok(ServiceConfig {
        jwt_secret,
        token_ttl_seconds,
        enforce_account_status,
        database_url,
        host,
        port,
        recent_activity_default_limit,
    })
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(map: HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Option<String> {
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let cfg = load_from(lookup_in(HashMap::from([(
            "APP_JWT_SECRET",
            "0123456789abcdef0123",
        )])))
        .unwrap();
        assert_eq!(cfg.token_ttl_seconds, 86_400);
        assert!(cfg.enforce_account_status);
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.bind_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(cfg.recent_activity_default_limit, 20);
    }

    #[test]
    fn missing_or_short_secret_is_rejected() {
        assert!(load_from(lookup_in(HashMap::new())).is_err());
        assert!(load_from(lookup_in(HashMap::from([("APP_JWT_SECRET", "short")]))).is_err());
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let err = load_from(lookup_in(HashMap::from([
            ("APP_JWT_SECRET", "0123456789abcdef0123"),
            ("APP_JWT_TTL_SECONDS", "0"),
        ])))
        .unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn oversized_ttl_is_rejected() {
        let err = load_from(lookup_in(HashMap::from([
            ("APP_JWT_SECRET", "0123456789abcdef0123"),
            ("APP_JWT_TTL_SECONDS", "18446744073709551615"),
        ])))
        .unwrap_err();
        assert!(err.to_string().contains("must not exceed"));

        let cfg = load_from(lookup_in(HashMap::from([
            ("APP_JWT_SECRET", "0123456789abcdef0123"),
            ("APP_JWT_TTL_SECONDS", "31536000"),
        ])))
        .unwrap();
        assert_eq!(cfg.token_ttl_seconds, MAX_TTL_SECONDS);
    }

    #[test]
    fn enforcement_flag_parses() {
        let cfg = load_from(lookup_in(HashMap::from([
            ("APP_JWT_SECRET", "0123456789abcdef0123"),
            ("AUTH_ENFORCE_ACCOUNT_STATUS", "off"),
            ("DATABASE_URL", "  "),
        ])))
        .unwrap();
        assert!(!cfg.enforce_account_status);
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn debug_redacts_secret() {
        let cfg = ServiceConfig::with_secret("super-secret-value-123");
        assert!(!format!("{cfg:?}").contains("super-secret"));
    }
}
