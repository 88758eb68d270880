use log::*;
use service::{config::Config, logging::Logger, AppState};
use sse::{Heartbeat, Manager};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config);

    let sse_manager = Arc::new(Manager::new());
    let heartbeat = Heartbeat::new(sse_manager.default_channel(), config.heartbeat_interval()).spawn();

    let app_state = AppState::new(config, &sse_manager);

    if let Err(e) = web::init_server(app_state).await {
        error!("Failed to start server: {e}");
        heartbeat.abort();
        std::process::exit(1);
    }
}
