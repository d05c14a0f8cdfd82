use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use studyhall_collab::{AuthError, RoomError};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

/// Failures surfaced to clients: mapped onto status codes on the REST
/// surface, and onto acknowledgment strings on the gateway.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Missing or invalid credentials")]
    Unauthenticated,
    #[error("{resource} not found")]
    NotFound { resource: &'static str },
    #[error("Room is full")]
    RoomFull,
    #[error("Only the host can control the timer")]
    HostOnly,
    #[error("Not in a room")]
    NotInRoom,
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::NotFound { resource: _ } => StatusCode::NOT_FOUND,
            Self::RoomFull => StatusCode::CONFLICT,
            Self::HostOnly => StatusCode::FORBIDDEN,
            Self::NotInRoom => StatusCode::BAD_REQUEST,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<RoomError> for ServerError {
    fn from(value: RoomError) -> Self {
        match value {
            RoomError::RoomNotFound => Self::NotFound { resource: "Room" },
            RoomError::RoomFull => Self::RoomFull,
            RoomError::UserNotInRoom => Self::NotFound {
                resource: "Participant",
            },
        }
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::Provider(e) => Self::Unknown(e),
            _ => Self::Unauthenticated,
        }
    }
}
