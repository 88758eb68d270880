use crate::controller::{command_controller, health_check_controller, index_controller};
use crate::sse::handler::sse_handler;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use log::*;
use service::{config::Config, AppState};
use tower_http::cors::{AllowOrigin, CorsLayer};

pub fn define_routes(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config);

    Router::new()
        .merge(index_routes())
        .merge(event_routes(app_state.clone()))
        .merge(command_routes(app_state))
        .merge(health_routes())
        .layer(cors)
}

fn index_routes() -> Router {
    Router::new()
        .route("/", get(index_controller::index))
        .route("/index.html", get(index_controller::index))
}

fn event_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/events/", get(sse_handler))
        .with_state(app_state)
}

fn command_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/commands/", post(command_controller::create))
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin:?}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("last-event-id"),
        ])
}
