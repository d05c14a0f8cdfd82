use std::sync::Arc;

use axum::extract::FromRef;
use studyhall_collab::Collab;

use crate::gateway::ConnectionRegistry;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub collab: Arc<Collab>,
    pub connections: Arc<ConnectionRegistry>,
}
