//! Stateless signed session tokens and the operator login check.
//!
//! A token is `base64url(payload) "." base64url(mac)` where the payload is the
//! JSON claims `{u, iat, exp}` (Unix millis) and the MAC is HMAC-SHA256 over
//! the serialized payload bytes. The server keeps no session table: the cookie
//! is the whole session, authenticated by signature and bounded by expiry.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Signed claims carried by the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (the admin username).
    pub u: String,
    /// Issued-at, Unix millis.
    pub iat: i64,
    /// Expiry, Unix millis.
    pub exp: i64,
}

/// Issues and verifies signed session tokens, and checks operator logins,
/// against a server-held secret and admin identity.
pub struct SessionCodec {
    secret: Vec<u8>,
    admin_user: String,
    admin_pass: String,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Derive a restart-stable signing secret when none is configured:
/// hex(SHA-256("fedadmin:" + admin password)). No extra secret to manage, and
/// tokens survive restarts as long as the password is unchanged.
pub fn derive_secret(admin_pass: &str) -> String {
    let mut h = Sha256::new();
    h.update(b"fedadmin:");
    h.update(admin_pass.as_bytes());
    h.finalize().iter().map(|b| format!("{:02x}", b)).collect()
}

impl SessionCodec {
    pub fn new(
        secret: impl Into<Vec<u8>>,
        admin_user: impl Into<String>,
        admin_pass: impl Into<String>,
    ) -> Self {
        Self {
            secret: secret.into(),
            admin_user: admin_user.into(),
            admin_pass: admin_pass.into(),
        }
    }

    fn mac(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key length");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }

    /// Issue a token for `subject` valid for `ttl` from now.
    pub fn issue(&self, subject: &str, ttl: Duration) -> String {
        let now = now_ms();
        let claims = SessionClaims {
            u: subject.to_string(),
            iat: now,
            exp: now + ttl.as_millis() as i64,
        };
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let mac = self.mac(&payload);
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(&mac)
        )
    }

    /// Verify a token and return its subject. Fails closed: wrong shape,
    /// undecodable segments, missing fields, expiry, or a MAC mismatch all
    /// mean "unauthenticated", never an error. The MAC comparison is
    /// constant-time.
    pub fn verify(&self, token: &str) -> Option<String> {
        let mut parts = token.split('.');
        let (payload_b64, mac_b64) = (parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }
        let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
        let mac = URL_SAFE_NO_PAD.decode(mac_b64).ok()?;
        let claims: SessionClaims = serde_json::from_slice(&payload).ok()?;
        if claims.u.is_empty() || now_ms() > claims.exp {
            return None;
        }
        let expected = self.mac(&payload);
        if expected.ct_eq(&mac).into() {
            Some(claims.u)
        } else {
            None
        }
    }

    /// True when the token is valid and its subject is the configured admin.
    pub fn is_admin_session(&self, token: &str) -> bool {
        self.verify(token).is_some_and(|u| u == self.admin_user)
    }

    /// Login check. The password comparison is constant-time, and a mismatch
    /// in either field yields the same plain `false` (no username oracle).
    pub fn check_login(&self, user: &str, pass: &str) -> bool {
        let user_ok = user == self.admin_user;
        let pass_ok: bool = pass
            .as_bytes()
            .ct_eq(self.admin_pass.as_bytes())
            .into();
        user_ok && pass_ok
    }
}
