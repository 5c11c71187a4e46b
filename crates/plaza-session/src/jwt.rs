//! HS256 JSON Web Token verification.
//!
//! Tokens are issued by the account service at sign-in and carry the
//! claims `userId` and `username`. An `exp` claim, when present, is
//! honoured. Only `HS256` is accepted; anything else (including `none`)
//! is rejected before the signature is checked.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use plaza_protocol::UserId;
use ring::hmac;
use serde::{Deserialize, Serialize};

use crate::{Identity, IdentityVerifier, SessionError};

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    user_id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<u64>,
}

/// Verifies tokens signed with a shared HMAC-SHA256 secret.
pub struct JwtVerifier {
    key: hmac::Key,
}

impl JwtVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_ref()),
        }
    }

    /// Checks the signature and claims of `token`.
    pub fn decode(&self, token: &str) -> Result<Identity, SessionError> {
        let mut parts = token.trim().split('.');
        let (Some(header_b64), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(auth_failed("malformed token"));
        };

        let header: Header = serde_json::from_slice(&b64(header_b64)?)
            .map_err(|_| auth_failed("malformed header"))?;
        if header.alg != "HS256" {
            return Err(auth_failed("unsupported algorithm"));
        }

        let signing_input = format!("{header_b64}.{payload}");
        hmac::verify(&self.key, signing_input.as_bytes(), &b64(signature)?)
            .map_err(|_| auth_failed("bad signature"))?;

        let claims: Claims = serde_json::from_slice(&b64(payload)?)
            .map_err(|_| auth_failed("malformed claims"))?;

        if let Some(exp) = claims.exp {
            if exp <= unix_now() {
                return Err(auth_failed("token expired"));
            }
        }

        let user_id = match claims.user_id {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            Some(serde_json::Value::Null) | None => None,
            Some(_) => return Err(auth_failed("malformed userId")),
        };
        if user_id.is_none() && claims.username.is_none() {
            return Err(auth_failed("token carries no identity"));
        }

        Ok(Identity {
            user_id: UserId(user_id.unwrap_or_default()),
            user_name: claims.username.unwrap_or_default(),
        })
    }

    /// Issues a token for `identity`, valid until `exp` (Unix seconds) if
    /// given. Used by tests and local tooling.
    pub fn issue(&self, identity: &Identity, exp: Option<u64>) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let claims = Claims {
            user_id: Some(serde_json::Value::String(identity.user_id.0.clone())),
            username: Some(identity.user_name.clone()),
            exp,
        };
        // Serializing a struct of strings and integers cannot fail.
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap_or_default());
        let signing_input = format!("{header}.{payload}");
        let tag = hmac::sign(&self.key, signing_input.as_bytes());
        format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(tag.as_ref()))
    }
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier").finish_non_exhaustive()
    }
}

impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, SessionError> {
        self.decode(token)
    }
}

fn auth_failed(reason: &str) -> SessionError {
    SessionError::AuthFailed(reason.to_owned())
}

/// Decodes base64url, tolerating trailing padding.
fn b64(segment: &str) -> Result<Vec<u8>, SessionError> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|_| auth_failed("bad encoding"))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
