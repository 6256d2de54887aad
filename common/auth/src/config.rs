use std::fmt;

/// Default token lifetime: one day.
pub const DEFAULT_TTL_SECONDS: u64 = 86_400;

/// Longest accepted token lifetime: one year.
pub const MAX_TTL_SECONDS: u64 = 365 * 86_400;

/// Process-wide token settings, fixed at startup.
#[derive(Clone)]
pub struct TokenConfig {
    secret: String,
    /// Lifetime of issued tokens in seconds.
    pub ttl_seconds: u64,
}

impl TokenConfig {
    /// Construct config with the default one-day lifetime.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }

    /// Adjust the token lifetime.
    pub fn with_ttl(mut self, seconds: u64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    pub(crate) fn secret(&self) -> &[u8] {
        self.secret.as_bytes()
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}
