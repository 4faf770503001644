use axum::{
    extract::{Path, State},
    routing::{delete, get, patch},
    Json, Router,
};
use serde_json::{json, Value};

use crate::error::Result;
use crate::models::{
    CreateRoomRequest, CreateRoomResponse, DeleteRoomRequest, RoomListResponse, UpdateRoomRequest,
};
use crate::state::AppState;

/// Room routes
pub fn room_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_rooms).post(create_room))
        .route("/{room_id}", patch(update_room).delete(delete_room))
        .route("/{room_id}/{room_password}", delete(delete_room_by_path))
}

/// POST /api/v1/rooms - Create a new room
async fn create_room(
    State(state): State<AppState>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<Json<CreateRoomResponse>> {
    let room = state
        .registry
        .create_room(&request.friendly_name, request.is_publicly_listed)?;

    Ok(Json(CreateRoomResponse {
        room_id: room.id().to_string(),
        room_password: room.password().to_string(),
    }))
}

/// GET /api/v1/rooms - List publicly listed rooms
async fn list_rooms(State(state): State<AppState>) -> Json<RoomListResponse> {
    Json(RoomListResponse {
        rooms: state.registry.list_public_rooms(),
    })
}

/// PATCH /api/v1/rooms/{room_id} - Rename and/or change visibility
async fn update_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<UpdateRoomRequest>,
) -> Result<Json<Value>> {
    state.registry.update_room(
        &room_id,
        &request.room_password,
        request.friendly_name,
        request.is_publicly_listed,
    )?;

    Ok(Json(json!({})))
}

/// DELETE /api/v1/rooms/{room_id} - Close a room for everyone in it
async fn delete_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<DeleteRoomRequest>,
) -> Result<Json<Value>> {
    state
        .registry
        .delete_room(&room_id, &request.room_password)?;

    Ok(Json(json!({})))
}

/// DELETE /api/v1/rooms/{room_id}/{room_password} - Same, for clients that
/// cannot send a DELETE body
async fn delete_room_by_path(
    State(state): State<AppState>,
    Path((room_id, room_password)): Path<(String, String)>,
) -> Result<Json<Value>> {
    state.registry.delete_room(&room_id, &room_password)?;

    Ok(Json(json!({})))
}
