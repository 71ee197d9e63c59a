pub mod firebase;

pub use firebase::FirebaseVerifier;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Principal;

/// Verifies a bearer credential against the external identity provider.
///
/// Every request re-verifies; there is no result cache. Implementations fail
/// with `Unauthorized` for rejected tokens and `ServiceUnavailable` when the
/// provider cannot be reached.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, bearer_token: &str) -> Result<Principal>;
}
