//! WebSocket realtime channel.
//!
//! Frames are JSON `{"event": ..., "data": ...}` in both directions. Every
//! connection receives all broadcast events; replies to its own malformed or
//! rejected frames go to that connection only.

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::channel::{events, ChannelEvent, InfoKind};
use crate::routes::messages::MessageRequest;
use crate::state::AppState;

/// Inbound event names.
const SOCKET_CONNECT: &str = "socket_connect";
const USER_MESSAGE: &str = "user-message";

enum Outbound {
    Event(ChannelEvent),
    Pong(Bytes),
}

/// GET /api/socket: WebSocket upgrade.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app))
}

async fn handle_socket(socket: WebSocket, app: AppState) {
    info!("websocket connected");
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(100);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let result = match msg {
                Outbound::Event(ev) => match serde_json::to_string(&ev) {
                    Ok(json) => ws_tx.send(Message::Text(json.into())).await,
                    Err(e) => {
                        warn!(error = %e, "failed to serialize event");
                        continue;
                    }
                },
                Outbound::Pong(data) => ws_tx.send(Message::Pong(data)).await,
            };
            if result.is_err() {
                debug!("websocket send failed, client disconnected");
                break;
            }
        }
    });

    let mut broadcast_rx = app.channel.subscribe();
    let forward_tx = out_tx.clone();
    let forward_task = tokio::spawn(async move {
        loop {
            match broadcast_rx.recv().await {
                Ok(ev) => {
                    if forward_tx.send(Outbound::Event(ev)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "websocket client lagging, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Ping(data)) => {
                let _ = out_tx.send(Outbound::Pong(data)).await;
                continue;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "websocket error");
                break;
            }
        };

        let inbound: ChannelEvent = match serde_json::from_str(text.as_str()) {
            Ok(ev) => ev,
            Err(e) => {
                warn!(error = %e, "unparseable websocket frame");
                reply_error(&out_tx, format!("invalid frame: {e}")).await;
                continue;
            }
        };
        handle_event(inbound, &app, &out_tx).await;
    }

    info!("websocket closed");
    forward_task.abort();
    send_task.abort();
}

async fn handle_event(ev: ChannelEvent, app: &AppState, out_tx: &mpsc::Sender<Outbound>) {
    match ev.event.as_str() {
        SOCKET_CONNECT => {
            app.channel.emit(
                events::SOCKET_RESPONSE,
                serde_json::json!({ "data": "Server Connected" }),
            );
        }
        USER_MESSAGE => {
            let body: MessageRequest = match serde_json::from_value(ev.data) {
                Ok(b) => b,
                Err(e) => {
                    reply_error(out_tx, format!("invalid user-message: {e}")).await;
                    return;
                }
            };
            let req = match app.dispatch_request(body).await {
                Ok(r) => r,
                Err(e) => {
                    reply_error(out_tx, format!("{:#}", e.0)).await;
                    return;
                }
            };
            // The run reports progress on the channel; the ticket is not awaited.
            if let Err(e) = app.runner.dispatch(req).await {
                reply_error(out_tx, format!("{e:#}")).await;
            }
        }
        other => {
            debug!(event = %other, "ignoring unknown websocket event");
        }
    }
}

async fn reply_error(out_tx: &mpsc::Sender<Outbound>, message: String) {
    let _ = out_tx
        .send(Outbound::Event(ChannelEvent::info(InfoKind::Error, message)))
        .await;
}
