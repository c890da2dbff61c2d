//! Axum router assembly and the shared [`AppState`] every handler reads
//! from: a `Clone`-able state struct, a `create_router`-style constructor,
//! and a `run_server` entry point the supervisor calls.

use std::sync::Arc;

use auction_broadcast::Broadcaster;
use auction_store::Store;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::auth;
use crate::boundary::BoundaryApi;
use crate::config::AppConfig;
use crate::rate_limit::RateLimiters;
use crate::rest;
use crate::ws;

#[derive(Clone)]
pub struct AppState {
    pub boundary: Arc<BoundaryApi>,
    pub broadcaster: Arc<Broadcaster>,
    pub store: Arc<Store>,
    pub rate_limiters: Arc<RateLimiters>,
    pub auth_token: Arc<String>,
}

impl AppState {
    pub fn new(
        boundary: Arc<BoundaryApi>,
        broadcaster: Arc<Broadcaster>,
        store: Arc<Store>,
        config: &AppConfig,
    ) -> Self {
        Self {
            boundary,
            broadcaster,
            store,
            rate_limiters: Arc::new(RateLimiters::new(&config.rate_limits)),
            auth_token: Arc::new(config.auth_token.clone().unwrap_or_default()),
        }
    }
}

/// Gate every route except `/health` and `/ws` behind the shared token;
/// the WebSocket surface authenticates inside its own frame protocol
/// instead, since browsers can't set custom headers on the upgrade
/// request.
async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    match auth::authenticate(auth::extract_bearer(presented), &state.auth_token) {
        Ok(()) => next.run(request).await,
        Err(_) => (StatusCode::UNAUTHORIZED, "unauthorized").into_response(),
    }
}

pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/auctions", get(rest::list_auctions))
        .route("/api/auctions/:id/monitor", post(rest::start_monitoring))
        .route("/api/auctions/:id/monitor", delete(rest::stop_monitoring))
        .route("/api/auctions/:id/config", put(rest::update_config))
        .route("/api/auctions/:id/bid", post(rest::place_bid))
        .route("/api/auctions/:id/bids", get(rest::get_bid_history))
        .route("/api/auth", post(rest::set_credentials))
        .route("/api/auth/status", get(rest::auth_status))
        .route("/api/settings", get(rest::get_settings))
        .route("/api/settings", post(rest::save_settings))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/health", get(rest::health))
        .route("/ws", get(ws::ws_handler))
        .merge(protected)
        .fallback(rest::not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
