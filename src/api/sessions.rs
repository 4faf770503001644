use axum::{extract::State, routing::post, Json, Router};

use crate::error::{AppError, Result};
use crate::models::{JoinRequest, JoinResponse};
use crate::state::AppState;

/// Session routes
pub fn session_routes() -> Router<AppState> {
    Router::new().route("/", post(join_room))
}

/// POST /api/v1/sessions - Join a room and receive a session token
///
/// The token authenticates the WebSocket connection at
/// `/ws?roomId=..&sessionToken=..`.
async fn join_room(
    State(state): State<AppState>,
    Json(request): Json<JoinRequest>,
) -> Result<Json<JoinResponse>> {
    let room = state
        .registry
        .get_room(&request.room_id)
        .ok_or_else(|| AppError::NotFound(format!("Room {} not found", request.room_id)))?;

    let session = room.add_player(&request.user_name).await?;

    Ok(Json(JoinResponse {
        user_id: session.player.id,
        session_token: session.token,
        video_token: session.video_token,
        current_players: room.players(),
        friendly_name: room.friendly_name(),
        is_publicly_listed: room.is_publicly_listed(),
    }))
}
