use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;

use crate::config::GoogleConfig;
use crate::error::{AppError, Result};

/// Lifetime of a minted service-account token. Tokens are minted per
/// upstream call and never cached, so this only needs to cover clock skew
/// plus one request.
const TOKEN_LIFETIME_SECS: i64 = 3600;

/// Service-account credentials used to authenticate server-to-server calls
/// against Firestore and Cloud Storage.
///
/// Google accepts self-signed RS256 JWTs (audience = the service root) as
/// bearer tokens directly, which avoids the OAuth2 token-exchange round trip.
#[derive(Clone)]
pub struct ServiceAccount {
    client_email: String,
    key: EncodingKey,
}

#[derive(Serialize)]
struct ServiceClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

impl ServiceAccount {
    pub fn from_config(google: &GoogleConfig) -> anyhow::Result<Self> {
        if google.client_email.is_empty() || google.private_key.is_empty() {
            anyhow::bail!(
                "google.client_email and google.private_key are required for upstream calls"
            );
        }
        let key = EncodingKey::from_rsa_pem(google.private_key.as_bytes())?;
        Ok(Self {
            client_email: google.client_email.clone(),
            key,
        })
    }

    /// Mint a bearer token for the given service audience, e.g.
    /// `https://firestore.googleapis.com/`.
    pub fn bearer_for(&self, audience: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = ServiceClaims {
            iss: &self.client_email,
            sub: &self.client_email,
            aud: audience,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };

        let token = encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| AppError::Upstream(format!("Failed to sign service token: {}", e)))?;

        Ok(token)
    }
}
