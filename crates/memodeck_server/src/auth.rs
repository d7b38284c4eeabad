//! Bearer token authentication.
//!
//! Tokens have the shape `user_id:expiry_ms:signature`, where the signature
//! is HMAC-SHA256 over `user_id:expiry_ms` with a shared secret, hex encoded.
//! User ids may themselves contain `:`; parsing splits from the right.

use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Resolves a bearer credential to a user id.
pub trait Authenticator: Send + Sync {
    /// Validates `token` and returns the authenticated user id.
    fn authenticate(&self, token: &str, now_ms: i64) -> ServerResult<String>;
}

/// Mints and validates HMAC-signed bearer tokens.
pub struct TokenIssuer {
    secret: Vec<u8>,
}

impl TokenIssuer {
    /// Creates an issuer with a shared secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issues a token for `user_id` expiring at `expires_at_ms`.
    pub fn issue(&self, user_id: &str, expires_at_ms: i64) -> String {
        let body = format!("{user_id}:{expires_at_ms}");
        format!("{body}:{}", hex_encode(&self.sign(&body)))
    }

    fn sign(&self, body: &str) -> Vec<u8> {
        // HMAC-SHA256 accepts keys of any length.
        #[allow(clippy::expect_used)]
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key length");
        mac.update(body.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

/// Authenticator backed by a [`TokenIssuer`] secret.
pub struct HmacAuthenticator {
    issuer: TokenIssuer,
}

impl HmacAuthenticator {
    /// Creates an authenticator sharing the issuer's secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            issuer: TokenIssuer::new(secret),
        }
    }
}

impl Authenticator for HmacAuthenticator {
    fn authenticate(&self, token: &str, now_ms: i64) -> ServerResult<String> {
        let (body, signature) = token
            .rsplit_once(':')
            .ok_or_else(|| ServerError::Auth("malformed token".into()))?;
        let (user_id, expiry) = body
            .rsplit_once(':')
            .ok_or_else(|| ServerError::Auth("malformed token".into()))?;
        let expires_at: i64 = expiry
            .parse()
            .map_err(|_| ServerError::Auth("malformed expiry".into()))?;
        let provided =
            hex_decode(signature).ok_or_else(|| ServerError::Auth("malformed signature".into()))?;
        let mut mac = HmacSha256::new_from_slice(&self.issuer.secret)
            .map_err(|_| ServerError::Auth("bad key".into()))?;
        mac.update(body.as_bytes());
        // verify_slice compares in constant time.
        if mac.verify_slice(&provided).is_err() {
            return Err(ServerError::Auth("invalid signature".into()));
        }
        if expires_at <= now_ms {
            return Err(ServerError::Auth("token expired".into()));
        }
        if user_id.is_empty() {
            return Err(ServerError::Auth("empty user id".into()));
        }
        Ok(user_id.to_string())
    }
}

/// Authenticator that maps every token to itself as the user id.
///
/// Test-only convenience for wiring a service without real credentials.
pub struct StaticAuthenticator;

impl Authenticator for StaticAuthenticator {
    fn authenticate(&self, token: &str, _now_ms: i64) -> ServerResult<String> {
        if token.is_empty() {
            return Err(ServerError::Auth("missing token".into()));
        }
        Ok(token.to_string())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(out, "{b:02x}");
    }
    out
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_authenticates() {
        let issuer = TokenIssuer::new(b"secret".to_vec());
        let auth = HmacAuthenticator::new(b"secret".to_vec());
        let token = issuer.issue("u1", 10_000);
        assert_eq!(auth.authenticate(&token, 5_000).unwrap(), "u1");
    }

    #[test]
    fn user_id_may_contain_colons() {
        let issuer = TokenIssuer::new(b"secret".to_vec());
        let auth = HmacAuthenticator::new(b"secret".to_vec());
        let token = issuer.issue("org:42:user", 10_000);
        assert_eq!(auth.authenticate(&token, 5_000).unwrap(), "org:42:user");
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = TokenIssuer::new(b"secret".to_vec());
        let auth = HmacAuthenticator::new(b"secret".to_vec());
        let token = issuer.issue("u1", 10_000);
        let err = auth.authenticate(&token, 10_000).unwrap_err();
        assert_eq!(err.http_status(), 401);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let issuer = TokenIssuer::new(b"secret".to_vec());
        let auth = HmacAuthenticator::new(b"secret".to_vec());
        let token = issuer.issue("u1", 10_000).replace("u1", "u2");
        assert!(auth.authenticate(&token, 5_000).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuer = TokenIssuer::new(b"secret-a".to_vec());
        let auth = HmacAuthenticator::new(b"secret-b".to_vec());
        let token = issuer.issue("u1", 10_000);
        assert!(auth.authenticate(&token, 5_000).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let auth = HmacAuthenticator::new(b"secret".to_vec());
        assert!(auth.authenticate("", 0).is_err());
        assert!(auth.authenticate("no-colons-here", 0).is_err());
        assert!(auth.authenticate("u1:notanumber:abcd", 0).is_err());
        assert!(auth.authenticate("u1:10000:zzzz", 0).is_err());
    }
}
