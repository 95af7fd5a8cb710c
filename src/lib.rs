pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod redis;
pub mod services;
pub mod store;

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::Config, redis::RedisClient, services::realtime_service::RealtimeHub, store::PollStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PollStore>,
    pub hub: Arc<RealtimeHub>,
    /// Absent in embedded/single-instance deployments; rate limiting and
    /// cross-instance fan-out are skipped without it.
    pub redis: Option<Arc<RedisClient>>,
    pub config: Arc<Config>,
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .allowed_origins
                .iter()
                .map(|origin| origin.parse::<HeaderValue>().unwrap())
                .collect::<Vec<_>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    Router::new()
        .route("/api/polls", post(handlers::polls::create_poll))
        .route("/api/polls/{poll_id}", get(handlers::polls::get_poll))
        .route("/api/polls/{poll_id}", delete(handlers::polls::delete_poll))
        .route(
            "/api/polls/{poll_id}/close",
            post(handlers::polls::close_poll),
        )
        .route(
            "/api/polls/{poll_id}/vote",
            post(handlers::votes::submit_vote),
        )
        .route(
            "/api/polls/{poll_id}/results",
            get(handlers::votes::get_results),
        )
        .route("/api/polls/{poll_id}/live", get(handlers::live::poll_updates))
        .route(
            "/api/maintenance/sweep",
            post(handlers::polls::sweep_expired),
        )
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}
