use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::debug;

use crate::claims::{normalize_subject, Claims, TokenClaims};
use crate::config::{TokenConfig, MAX_TTL_SECONDS};
use crate::error::{AuthError, AuthResult};
use crate::roles::Role;

type HmacSha256 = Hmac<Sha256>;

#[derive(Serialize)]
struct TokenHeader {
    alg: &'static str,
    typ: &'static str,
}

const HEADER: TokenHeader = TokenHeader {
    alg: "HS256",
    typ: "JWT",
};

/// A freshly signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Compact HS256 token codec bound to the deployment's shared secret.
///
/// The verifier never consults the incoming header: every token is checked
/// with HMAC-SHA-256 regardless of the `alg` it advertises.
#[derive(Clone, Debug)]
pub struct TokenCodec {
    config: Arc<TokenConfig>,
}

impl TokenCodec {
    pub fn new(config: TokenConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    pub fn issue(&self, subject: &str, role: Role) -> AuthResult<IssuedToken> {
        self.issue_at(subject, role, Utc::now().timestamp())
    }

    /// Issue a token as if the clock read `now` (epoch seconds).
    pub fn issue_at(&self, subject: &str, role: Role, now: i64) -> AuthResult<IssuedToken> {
        let subject = normalize_subject(subject);
        if subject.is_empty() {
            return Err(AuthError::InvalidClaims("sub", subject));
        }
        let ttl = i64::try_from(self.config.ttl_seconds)
            .ok()
            .filter(|ttl| *ttl <= MAX_TTL_SECONDS as i64)
            .ok_or_else(|| AuthError::Signing("ttl out of range".to_string()))?;

        let claims = Claims {
            subject,
            role,
            issued_at: now,
            expires_at: now
                .checked_add(ttl)
                .ok_or_else(|| AuthError::Signing("expiry out of range".to_string()))?,
        };

        let header = encode_segment(&HEADER)?;
        let payload = encode_segment(&claims.to_wire())?;
        let signing_input = format!("{header}.{payload}");
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes())?);

        Ok(IssuedToken {
            token: format!("{signing_input}.{signature}"),
            claims,
        })
    }

    pub fn verify(&self, token: &str) -> AuthResult<TokenClaims> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify a token as if the clock read `now` (epoch seconds).
    pub fn verify_at(&self, token: &str, now: i64) -> AuthResult<TokenClaims> {
        let segments: Vec<&str> = token.split('.').collect();
        let [header, payload, signature] = segments.as_slice() else {
            return Err(AuthError::MalformedToken(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        };

        // An undecodable signature segment cannot match any MAC.
        let supplied = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::BadSignature)?;

        let mut mac = self.mac()?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        // verify_slice compares in constant time.
        mac.verify_slice(&supplied)
            .map_err(|_| AuthError::BadSignature)?;

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|err| AuthError::MalformedToken(format!("payload is not base64url: {err}")))?;
        let claims: TokenClaims = serde_json::from_slice(&payload_bytes)
            .map_err(|err| AuthError::MalformedToken(format!("payload is not a claims object: {err}")))?;

        if now >= claims.exp {
            return Err(AuthError::TokenExpired);
        }

        debug!(sub = %claims.sub, exp = claims.exp, "verified token signature");
        Ok(claims)
    }

    fn mac(&self) -> AuthResult<HmacSha256> {
        HmacSha256::new_from_slice(self.config.secret())
            .map_err(|err| AuthError::Signing(err.to_string()))
    }

    fn sign(&self, input: &[u8]) -> AuthResult<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn encode_segment<T: Serialize>(value: &T) -> AuthResult<String> {
    let json = serde_json::to_vec(value).map_err(|err| AuthError::Signing(err.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}
