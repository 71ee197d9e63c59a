use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::identity::IdentityVerifier;
use crate::models::Principal;

/// Firebase ID token verifier.
///
/// Fetches Google's securetoken JWK set, picks the key matching the token's
/// `kid` and validates the RS256 signature with audience and issuer pinned to
/// the configured project. The JWK set is fetched per verification; a
/// bounded-TTL cache would cut a round trip but is deliberately not done here.
pub struct FirebaseVerifier {
    project_id: String,
    certs_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

/// Claims of a Firebase ID token we care about
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl FirebaseVerifier {
    pub fn new(project_id: &str, certs_url: &str, client: reqwest::Client) -> Self {
        Self {
            project_id: project_id.to_string(),
            certs_url: certs_url.to_string(),
            client,
        }
    }

    async fn fetch_keys(&self) -> Result<JwkSet> {
        let resp = self
            .client
            .get(&self.certs_url)
            .send()
            .await
            .map_err(|e| {
                AppError::ServiceUnavailable(format!("Failed to fetch identity keys: {}", e))
            })?;

        if !resp.status().is_success() {
            return Err(AppError::ServiceUnavailable(format!(
                "Identity key endpoint returned {}",
                resp.status()
            )));
        }

        resp.json::<JwkSet>().await.map_err(|e| {
            AppError::ServiceUnavailable(format!("Failed to decode identity keys: {}", e))
        })
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, bearer_token: &str) -> Result<Principal> {
        let header = decode_header(bearer_token)
            .map_err(|_| AppError::Unauthorized("Invalid token.".to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AppError::Unauthorized("Invalid token.".to_string()))?;

        let keys = self.fetch_keys().await?;
        let jwk = keys
            .keys
            .iter()
            .find(|k| k.kid == kid)
            .ok_or_else(|| AppError::Unauthorized("Invalid token.".to_string()))?;

        let decoding_key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|_| AppError::Unauthorized("Invalid token.".to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!(
            "https://securetoken.google.com/{}",
            self.project_id
        )]);

        let data = decode::<IdTokenClaims>(bearer_token, &decoding_key, &validation)
            .map_err(|e| {
                tracing::warn!("Token verification failed: {}", e);
                AppError::Unauthorized("Invalid token.".to_string())
            })?;

        let claims = data.claims;
        let email = claims.email.unwrap_or_default();
        // Display name falls back to email when the provider has none
        let name = claims.name.unwrap_or_else(|| email.clone());

        Ok(Principal {
            uid: claims.sub,
            email,
            name,
        })
    }
}
