//! REST transport: thin axum handlers that defer every decision to
//! [`BoundaryApi`] and translate [`AppError`] into the wire
//! `{success:false, error, code}` shape.

use std::net::SocketAddr;

use auction_core::{AuctionMetadata, PartialAuctionConfig, Settings};
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::server::AppState;
use crate::validation;

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    code: &'static str,
}

fn error_response(e: AppError) -> Response {
    let status = e.status();
    let code = e.code();
    (
        status,
        Json(ErrorBody {
            success: false,
            error: e.to_string(),
            code,
        }),
    )
        .into_response()
}

fn rate_limited() -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ErrorBody {
            success: false,
            error: "rate limit exceeded".into(),
            code: "RATE_LIMIT",
        }),
    )
        .into_response()
}

#[derive(Serialize)]
pub struct StoreHealth {
    connected: bool,
}

#[derive(Serialize)]
pub struct MemoryStats {
    monitored_auctions: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    store: StoreHealth,
    memory_stats: MemoryStats,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        store: StoreHealth {
            connected: state.store.is_connected(),
        },
        memory_stats: MemoryStats {
            monitored_auctions: state.boundary.get_monitored().len(),
        },
    })
}

pub async fn list_auctions(State(state): State<AppState>) -> Json<Vec<auction_core::Auction>> {
    Json(state.boundary.get_monitored())
}

#[derive(Deserialize)]
pub struct MonitorRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub config: PartialAuctionConfig,
}

#[derive(Serialize)]
pub struct SuccessBody {
    pub success: bool,
}

pub async fn start_monitoring(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(auction_id): Path<String>,
    Json(body): Json<MonitorRequest>,
) -> Response {
    if !state.rate_limiters.api.try_accept(addr.ip()) {
        return rate_limited();
    }
    if let Err(e) = validation::validate_auction_id(&auction_id) {
        return error_response(e);
    }
    if let Some(max_bid) = body.config.max_bid {
        if let Err(e) = validation::validate_bid_amount(max_bid) {
            return error_response(e);
        }
    }
    let metadata = AuctionMetadata {
        title: body.title,
        url: body.url,
        image_url: body.image_url,
    };
    match state
        .boundary
        .start_monitoring(auction_id, metadata, body.config)
        .await
    {
        Ok(_) => Json(SuccessBody { success: true }).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn stop_monitoring(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(auction_id): Path<String>,
) -> Response {
    if !state.rate_limiters.api.try_accept(addr.ip()) {
        return rate_limited();
    }
    let success = state.boundary.stop_monitoring(&auction_id).await;
    Json(SuccessBody { success }).into_response()
}

pub async fn update_config(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(auction_id): Path<String>,
    Json(partial): Json<PartialAuctionConfig>,
) -> Response {
    if !state.rate_limiters.api.try_accept(addr.ip()) {
        return rate_limited();
    }
    if let Some(max_bid) = partial.max_bid {
        if let Err(e) = validation::validate_bid_amount(max_bid) {
            return error_response(e);
        }
    }
    match state.boundary.update_config(&auction_id, partial).await {
        Ok(()) => Json(SuccessBody { success: true }).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct BidRequest {
    pub amount: i64,
}

pub async fn place_bid(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(auction_id): Path<String>,
    Json(body): Json<BidRequest>,
) -> Response {
    if !state.rate_limiters.api.try_accept(addr.ip()) {
        return rate_limited();
    }
    if !state.rate_limiters.bid.try_accept(auction_id.clone()) {
        return rate_limited();
    }
    if let Err(e) = validation::validate_bid_amount(body.amount) {
        return error_response(e);
    }
    match state.boundary.place_bid(&auction_id, body.amount).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct BidHistoryQuery {
    pub limit: Option<usize>,
}

pub async fn get_bid_history(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(auction_id): Path<String>,
    Query(query): Query<BidHistoryQuery>,
) -> Response {
    if !state.rate_limiters.api.try_accept(addr.ip()) {
        return rate_limited();
    }
    match state.boundary.get_bid_history(&auction_id, query.limit).await {
        Ok(history) => Json(history).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct AuthRequest {
    pub cookies: String,
}

pub async fn set_credentials(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<AuthRequest>,
) -> Response {
    if !state.rate_limiters.auth.try_accept(addr.ip()) {
        return rate_limited();
    }
    match state.boundary.set_credentials(body.cookies).await {
        Ok(success) => Json(SuccessBody { success }).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn auth_status(State(state): State<AppState>) -> Response {
    match state.boundary.check_auth().await {
        Ok(status) => Json(status).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_settings(State(state): State<AppState>) -> Response {
    match state.boundary.get_settings().await {
        Ok(settings) => Json(settings).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct SettingsRequest {
    pub settings: Settings,
}

pub async fn save_settings(
    State(state): State<AppState>,
    Json(body): Json<SettingsRequest>,
) -> Response {
    match state.boundary.save_settings(&body.settings).await {
        Ok(()) => Json(SuccessBody { success: true }).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn not_found() -> Response {
    error_response(AppError::Validation("no such route".into()))
}
