pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, RoomEvent};

/// Per-connection binding to a room and a player identity. Filled in by the
/// create/join handlers; everything else reads it.
#[derive(Debug, Default, Clone)]
pub struct ConnCtx {
    pub room: Option<String>,
    pub player: Option<String>,
    pub spectator: bool,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut ctx = ConnCtx::default();
    let mut room_rx: Option<tokio::sync::broadcast::Receiver<RoomEvent>> = None;

    let welcome = ServerMessage::Welcome {
        protocol: "1.0".to_string(),
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if let Ok(msg) = serde_json::to_string(&welcome) {
        if sender.send(Message::Text(msg.into())).await.is_err() {
            tracing::error!("Failed to send welcome message");
            return;
        }
    }

    loop {
        tokio::select! {
            // Room events: re-render this connection's personalized snapshot.
            event = async {
                match &mut room_rx {
                    Some(rx) => rx.recv().await.ok(),
                    // Not in a room yet: wait forever
                    None => std::future::pending::<Option<RoomEvent>>().await,
                }
            } => {
                let Some(event) = event else { continue };
                let Some(code) = ctx.room.clone() else { continue };
                let outbound = match event {
                    RoomEvent::Changed => {
                        match state.snapshot_for(&code, ctx.player.as_deref()).await {
                            Ok(snapshot) => Some(ServerMessage::RoomState { snapshot }),
                            // Room is gone; drop the binding and go quiet.
                            Err(_) => {
                                ctx.room = None;
                                room_rx = None;
                                continue;
                            }
                        }
                    }
                    RoomEvent::VoteCounts { counts, seq } => {
                        if ctx.spectator {
                            Some(ServerMessage::SpectatorVoteCounts { counts, seq })
                        } else {
                            None
                        }
                    }
                };
                if let Some(msg) = outbound {
                    if let Ok(json) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                let was_in = ctx.room.clone();
                                let response =
                                    handlers::handle_message(client_msg, &mut ctx, &state).await;
                                if ctx.room != was_in {
                                    room_rx = match &ctx.room {
                                        Some(code) => Some(state.subscribe(code).await),
                                        None => None,
                                    };
                                }
                                if let Some(response) = response {
                                    if let Ok(json) = serde_json::to_string(&response) {
                                        if sender.send(Message::Text(json.into())).await.is_err() {
                                            tracing::error!("Failed to send response");
                                            break;
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                if let Ok(json) = serde_json::to_string(&error) {
                                    let _ = sender.send(Message::Text(json.into())).await;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // Losing the socket is not leaving: the seat stays reserved for the
    // reconnect token.
    if let (Some(code), Some(player)) = (&ctx.room, &ctx.player) {
        state.handle_disconnect(code, player).await;
    }
    tracing::info!("WebSocket connection closed");
}
