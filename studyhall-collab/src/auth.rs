use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// An authenticated subject, as reported by the external identity provider.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No token provided")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken,
    /// Something went wrong talking to the identity provider
    #[error("Identity provider error: {0}")]
    Provider(String),
}

/// Verifies bearer credentials with an external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError>;
}

/// The identity gate. Every connection and request passes through here before
/// it can reach any other component.
pub struct Auth {
    provider: Arc<dyn IdentityProvider>,
}

impl Auth {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Resolves a bearer token to an authenticated user.
    pub async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        self.provider.verify(token).await
    }
}

/// Identity provider backed by a hosted auth HTTP API.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    email: Option<String>,
}

impl HttpIdentityProvider {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .bearer_auth(token)
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::InvalidToken);
        }

        let user: ProviderUser = response
            .json()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        Ok(AuthUser {
            id: user.id,
            email: user.email,
        })
    }
}

/// Accepts any non-empty token and treats it as the user id.
#[cfg(test)]
pub(crate) struct MockIdentity;

#[cfg(test)]
#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        match token {
            "" => Err(AuthError::MissingToken),
            "expired" => Err(AuthError::InvalidToken),
            id => Ok(AuthUser {
                id: id.to_string(),
                email: Some(format!("{id}@example.com")),
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn empty_tokens_are_rejected_before_the_provider() {
        let auth = Auth::new(Arc::new(MockIdentity));

        assert!(matches!(
            auth.verify("").await,
            Err(AuthError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn provider_rejections_surface_as_invalid() {
        let auth = Auth::new(Arc::new(MockIdentity));

        assert!(matches!(
            auth.verify("expired").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn verified_tokens_resolve_to_a_user() {
        let auth = Auth::new(Arc::new(MockIdentity));
        let user = auth.verify("alice").await.unwrap();

        assert_eq!(user.id, "alice");
        assert_eq!(user.email.as_deref(), Some("alice@example.com"));
    }
}
