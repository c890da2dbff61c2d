//! WebSocket transport: split the socket, drain an outbound channel in
//! one task while folding inbound frames in the loop that owns the
//! socket's sender half.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::{IntoResponse, Response};
use axum::http::StatusCode;
use auction_broadcast::{ClientFrame, ServerFrame};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::boundary::BoundaryApi;
use crate::server::AppState;
use crate::validation;

pub async fn ws_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    if !state.rate_limiters.ws_accept.try_accept(addr.ip()) {
        warn!(ip = %addr.ip(), "WebSocket accept rate limit exceeded");
        return (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
    }
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (session_id, mut outbound_rx) = state.broadcaster.on_connect();
    let (mut sender, mut receiver) = socket.split();

    if sender
        .send(Message::Text(
            serde_json::to_string(&ServerFrame::Connected { session_id })
                .unwrap_or_default()
                .into(),
        ))
        .await
        .is_err()
    {
        state.broadcaster.on_disconnect(session_id);
        return;
    }

    let mut outbound_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let Ok(json) = serde_json::to_string(&frame) else {
                continue;
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(raw))) => {
                        handle_client_frame(&state, session_id, &raw).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
            _ = &mut outbound_task => break,
        }
    }

    state.broadcaster.on_disconnect(session_id);
    info!(session_id = %session_id, sessions = state.broadcaster.session_count(), "subscriber session closed");
}

async fn handle_client_frame(state: &AppState, session_id: uuid::Uuid, raw: &str) {
    let frame: ClientFrame = match serde_json::from_str(raw) {
        Ok(f) => f,
        Err(e) => {
            let _ = state.broadcaster.notify(
                session_id,
                ServerFrame::Error {
                    message: format!("malformed frame: {e}"),
                    code: "VALIDATION_ERROR".into(),
                },
            );
            return;
        }
    };

    if frame.requires_auth() && !state.broadcaster.is_authenticated(session_id) {
        let _ = state.broadcaster.notify(
            session_id,
            ServerFrame::Error {
                message: "authenticate first".into(),
                code: "AUTH_ERROR".into(),
            },
        );
        return;
    }

    match frame {
        ClientFrame::Authenticate { token } => {
            let ok = state
                .broadcaster
                .authenticate(session_id, &token)
                .unwrap_or(false);
            let _ = state
                .broadcaster
                .notify(session_id, ServerFrame::Authenticated { success: ok });
            if ok {
                let auctions = state.boundary.get_monitored();
                let _ = state.broadcaster.send_snapshot(session_id, auctions);
            }
        }
        ClientFrame::Subscribe { auction_ids } => {
            let _ = state.broadcaster.subscribe(session_id, auction_ids);
        }
        ClientFrame::Unsubscribe { auction_ids } => {
            let _ = state.broadcaster.unsubscribe(session_id, auction_ids);
        }
        ClientFrame::StartMonitoring {
            auction_id,
            title,
            url,
            image_url,
            config,
        } => {
            reply_with_outcome(
                &state.broadcaster,
                session_id,
                start_monitoring(&state.boundary, auction_id.clone(), title, url, image_url, config)
                    .await,
            );
        }
        ClientFrame::StopMonitoring { auction_id } => {
            let success = state.boundary.stop_monitoring(&auction_id).await;
            let _ = state.broadcaster.notify(
                session_id,
                ServerFrame::Response {
                    success,
                    error: None,
                    code: None,
                },
            );
        }
        ClientFrame::UpdateConfig { auction_id, config } => {
            let result = state.boundary.update_config(&auction_id, config).await;
            reply_with_outcome(&state.broadcaster, session_id, result);
        }
        ClientFrame::PlaceBid { auction_id, amount } => {
            if validation::validate_bid_amount(amount).is_err()
                || !state.rate_limiters.bid.try_accept(auction_id.clone())
            {
                let _ = state.broadcaster.notify(
                    session_id,
                    ServerFrame::BidResult {
                        auction_id,
                        success: false,
                        error_kind: None,
                    },
                );
                return;
            }
            match state.boundary.place_bid(&auction_id, amount).await {
                Ok(result) => {
                    let _ = state.broadcaster.notify(
                        session_id,
                        ServerFrame::BidResult {
                            auction_id,
                            success: result.success,
                            error_kind: result.outcome.and_then(|o| o.error_kind),
                        },
                    );
                }
                Err(e) => {
                    let _ = state.broadcaster.notify(
                        session_id,
                        ServerFrame::Error {
                            message: e.to_string(),
                            code: e.code().to_string(),
                        },
                    );
                }
            }
        }
        ClientFrame::GetMonitoredAuctions => {
            let auctions = state.boundary.get_monitored();
            let _ = state
                .broadcaster
                .notify(session_id, ServerFrame::AuctionState { auctions });
        }
        ClientFrame::Ping => {
            let _ = state.broadcaster.notify(session_id, ServerFrame::Pong);
        }
    }
}

async fn start_monitoring(
    boundary: &Arc<BoundaryApi>,
    auction_id: String,
    title: String,
    url: String,
    image_url: String,
    config: auction_core::PartialAuctionConfig,
) -> crate::error::AppResult<()> {
    validation::validate_auction_id(&auction_id)?;
    let metadata = auction_core::AuctionMetadata {
        title,
        url,
        image_url,
    };
    boundary.start_monitoring(auction_id, metadata, config).await?;
    Ok(())
}

fn reply_with_outcome(
    broadcaster: &auction_broadcast::Broadcaster,
    session_id: uuid::Uuid,
    result: crate::error::AppResult<()>,
) {
    let frame = match result {
        Ok(()) => ServerFrame::Response {
            success: true,
            error: None,
            code: None,
        },
        Err(e) => ServerFrame::Response {
            success: false,
            error: Some(e.to_string()),
            code: Some(e.code().to_string()),
        },
    };
    let _ = broadcaster.notify(session_id, frame);
}
