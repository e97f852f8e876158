//! Access tokens.
//!
//! Tokens bind a user id to an issue time and are signed with HMAC-SHA256.
//!
//! ## Token Format
//!
//! - 2 bytes: user id length (big-endian)
//! - N bytes: user id (UTF-8)
//! - 8 bytes: issue time (Unix millis, big-endian)
//! - 32 bytes: HMAC-SHA256 signature over everything before it
//!
//! The whole token is base64url-encoded (no padding) for transport.

use crate::error::{BackendError, BackendResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_LEN: usize = 32;

/// Issues and validates access tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenIssuer {
    /// Creates an issuer.
    pub fn new(secret: Vec<u8>, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    /// Issues a token for `user_id`, stamped now.
    pub fn issue(&self, user_id: &str) -> BackendResult<String> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issues a token stamped at `issued_at`.
    pub fn issue_at(&self, user_id: &str, issued_at: DateTime<Utc>) -> BackendResult<String> {
        let user = user_id.as_bytes();
        let user_len = u16::try_from(user.len())
            .map_err(|_| BackendError::NotAuthorized("user id too long".into()))?;

        let mut data = Vec::with_capacity(2 + user.len() + 8 + SIGNATURE_LEN);
        data.extend_from_slice(&user_len.to_be_bytes());
        data.extend_from_slice(user);
        data.extend_from_slice(&issued_at.timestamp_millis().to_be_bytes());

        let signature = self.sign(&data)?;
        data.extend_from_slice(&signature);
        Ok(URL_SAFE_NO_PAD.encode(data))
    }

    /// Validates a token and returns the user id it was issued for.
    pub fn validate(&self, token: &str) -> BackendResult<String> {
        self.validate_at(token, Utc::now())
    }

    /// Validates a token against the clock value `now`.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> BackendResult<String> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| BackendError::NotAuthorized("malformed token".into()))?;
        if bytes.len() < 2 + 8 + SIGNATURE_LEN {
            return Err(BackendError::NotAuthorized("invalid token length".into()));
        }

        let user_len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        if bytes.len() != 2 + user_len + 8 + SIGNATURE_LEN {
            return Err(BackendError::NotAuthorized("invalid token length".into()));
        }
        let signed_len = 2 + user_len + 8;
        let (data, signature) = bytes.split_at(signed_len);

        let mut mac = self.mac()?;
        mac.update(data);
        mac.verify_slice(signature)
            .map_err(|_| BackendError::NotAuthorized("invalid signature".into()))?;

        let user_id = std::str::from_utf8(&data[2..2 + user_len])
            .map_err(|_| BackendError::NotAuthorized("malformed user id".into()))?;
        let mut stamp = [0u8; 8];
        stamp.copy_from_slice(&data[2 + user_len..]);
        let issued_ms = i64::from_be_bytes(stamp);

        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        if now.timestamp_millis() > issued_ms.saturating_add(ttl_ms) {
            return Err(BackendError::NotAuthorized("token expired".into()));
        }
        Ok(user_id.to_string())
    }

    fn mac(&self) -> BackendResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| BackendError::Internal(format!("hmac key: {e}")))
    }

    fn sign(&self, data: &[u8]) -> BackendResult<[u8; SIGNATURE_LEN]> {
        let mut mac = self.mac()?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().into())
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
