pub mod config;
pub mod logging;

mod auth;
mod context;
mod errors;
mod gateway;
mod protocol;
mod relay;
mod rooms;
mod serialized;

use std::{
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::routing::get;
use log::info;
use studyhall_collab::{Collab, EventReceiver};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::{config::Config, context::ServerContext, gateway::ConnectionRegistry};

pub type Router = axum::Router<ServerContext>;

/// Starts the studyhall server.
pub async fn run_server(collab: Arc<Collab>, events: EventReceiver, config: Config) {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, config.port).into();

    let context = ServerContext {
        collab: collab.clone(),
        connections: ConnectionRegistry::new(),
    };

    tokio::spawn(gateway::run_event_pump(context.clone(), events));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/rooms", rooms::router())
        .route("/gateway", get(gateway::gateway_handler));

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/health", get(rooms::health))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on {addr}");

    axum::serve(listener, root_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server runs");

    // The countdown schedules are the only long-lived background resource, so
    // shutting down cleanly means cancelling every one of them.
    collab.timer.clear_all();
    info!("Cleared all timers. Bye!");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("ctrl-c handler installs");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("signal handler installs")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
