use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use studyhall_collab::AuthUser;

use crate::{context::ServerContext, errors::ServerError};

/// An authenticated request subject. Extracting this puts a route behind the
/// identity gate.
pub struct Session {
    pub user: AuthUser,
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or(ServerError::Unauthenticated)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(ServerError::Unauthenticated)?;

        let user = state.collab.auth.verify(token).await?;

        Ok(Self { user })
    }
}
