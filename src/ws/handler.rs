use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::PlayerLocation;
use crate::state::AppState;
use crate::ws::{
    msg_types, subscribe, ClientHandle, Handshake, Outbound, PresenceConnection, PresenceMessage,
    Subscription, SubscriptionOutcome,
};

/// Query parameters for WebSocket connection.
///
/// Both are optional here so that a missing credential is rejected by the
/// subscription protocol (a close frame) rather than by the HTTP layer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsQueryParams {
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl From<WsQueryParams> for Handshake {
    fn from(params: WsQueryParams) -> Self {
        Handshake {
            room_id: params.room_id,
            session_token: params.session_token,
        }
    }
}

/// WebSocket routes
pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

/// WebSocket upgrade handler
async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsQueryParams>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.into()))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState, handshake: Handshake) {
    let conn_id = Uuid::new_v4().to_string();

    tracing::debug!(
        conn_id = %conn_id,
        room_id = ?handshake.room_id,
        "WebSocket connected"
    );

    // Create message channel for sending to this client
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let client = ClientHandle::new(conn_id.clone(), tx);

    // Split socket into sender and receiver
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task for sending messages to client
    let mut send_task = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Message(msg) => {
                    if let Ok(json) = serde_json::to_string(&msg) {
                        if ws_sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
                Outbound::Close => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let subscription = match subscribe(&state.registry, &handshake, Arc::new(client.clone())) {
        SubscriptionOutcome::Accepted(subscription) => subscription,
        SubscriptionOutcome::Rejected(_) => {
            // The close frame is already queued.
            drop(client);
            let _ = send_task.await;
            return;
        }
    };

    // Process incoming messages until either side closes
    loop {
        tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = handle_message(text.as_str(), &subscription) {
                        tracing::warn!(conn_id = %conn_id, error = %e, "Error handling message");
                        client.emit(PresenceMessage::error(400, &e.to_string()));
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!(
                        conn_id = %conn_id,
                        player_id = %subscription.session().player.id,
                        "WebSocket close received"
                    );
                    break;
                }
                Some(Err(e)) => {
                    tracing::error!(conn_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
            _ = &mut send_task => {
                tracing::debug!(conn_id = %conn_id, "Connection closed by server");
                break;
            }
        }
    }

    // Cleanup on disconnect
    subscription.handle_disconnect();
    send_task.abort();
}

/// Handle incoming presence message
fn handle_message(text: &str, subscription: &Subscription) -> Result<(), AppError> {
    let msg: PresenceMessage = serde_json::from_str(text)?;

    match msg.msg_type.as_str() {
        msg_types::PLAYER_MOVEMENT => {
            let location: PlayerLocation = serde_json::from_value(msg.payload)?;
            subscription.handle_player_movement(location);
            Ok(())
        }
        other => Err(AppError::BadRequest(format!(
            "Unknown message type: {}",
            other
        ))),
    }
}
