use std::sync::Arc;

use log::{error, info};
use studyhall_collab::{Collab, HttpIdentityProvider, NoStore, RestRoomStore, RoomStore};
use studyhall_server::{config::Config, logging, run_server};

#[tokio::main]
async fn main() {
    logging::init_logger();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Refusing to start: {err}");
            std::process::exit(1);
        }
    };

    let identity = Arc::new(HttpIdentityProvider::new(
        &config.identity_url,
        &config.identity_key,
    ));

    let store: Arc<dyn RoomStore> = match &config.store_url {
        Some(url) => {
            let key = config.store_key.as_deref().unwrap_or(&config.identity_key);
            Arc::new(RestRoomStore::new(url, key))
        }
        None => {
            info!("No backing store configured, rooms will live in memory only");
            Arc::new(NoStore)
        }
    };

    let (collab, events) = Collab::new(identity, store);

    run_server(Arc::new(collab), events, config).await;
}
