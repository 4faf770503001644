use serde::{Deserialize, Serialize};

use crate::models::Player;

/// Request to create a room
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub friendly_name: String,
    #[serde(default)]
    pub is_publicly_listed: bool,
}

/// Response after creating a room. The password is only ever returned here.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: String,
    pub room_password: String,
}

/// Request to update a room's name and/or visibility
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomRequest {
    pub room_password: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub is_publicly_listed: Option<bool>,
}

/// Request to delete a room
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRoomRequest {
    pub room_password: String,
}

/// Public room summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListing {
    pub room_id: String,
    pub friendly_name: String,
    pub current_occupancy: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomListing>,
}

/// Request to join a room
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub room_id: String,
    pub user_name: String,
}

/// Response after joining a room
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub user_id: String,
    pub session_token: String,
    pub video_token: Option<String>,
    pub current_players: Vec<Player>,
    pub friendly_name: String,
    pub is_publicly_listed: bool,
}
