use serde::{Deserialize, Serialize};

use crate::models::Player;

/// Wrapper for all WebSocket messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl PresenceMessage {
    pub fn new(msg_type: &str, payload: serde_json::Value) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            payload,
        }
    }

    /// A presence event carrying a player
    pub fn player_event(msg_type: &str, player: &Player) -> Self {
        let payload = serde_json::to_value(player).unwrap_or_default();
        Self::new(msg_type, payload)
    }

    pub fn room_closing() -> Self {
        Self::new(msg_types::ROOM_CLOSING, serde_json::Value::Null)
    }

    pub fn error(code: u16, message: &str) -> Self {
        Self::new(
            msg_types::ERROR,
            serde_json::json!({
                "code": code,
                "message": message
            }),
        )
    }
}

/// Message types enum for matching
pub mod msg_types {
    // Client -> Server
    pub const PLAYER_MOVEMENT: &str = "playerMovement";

    // Server -> Client
    pub const NEW_PLAYER: &str = "newPlayer";
    pub const PLAYER_MOVED: &str = "playerMoved";
    pub const PLAYER_DISCONNECT: &str = "playerDisconnect";
    pub const ROOM_CLOSING: &str = "roomClosing";
    pub const ERROR: &str = "error";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, PlayerLocation};

    #[test]
    fn test_player_event_envelope() {
        let player = Player::new("alice");
        let msg = PresenceMessage::player_event(msg_types::NEW_PLAYER, &player);

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "newPlayer");
        assert_eq!(value["payload"]["id"], player.id.as_str());
        assert_eq!(value["payload"]["userName"], "alice");
    }

    #[test]
    fn test_room_closing_has_null_payload() {
        let value = serde_json::to_value(PresenceMessage::room_closing()).unwrap();
        assert_eq!(value, serde_json::json!({"type": "roomClosing", "payload": null}));
    }

    #[test]
    fn test_parse_player_movement() {
        let text = r#"{"type":"playerMovement","payload":{"x":4,"y":9.5,"moving":false,"rotation":"right"}}"#;
        let msg: PresenceMessage = serde_json::from_str(text).unwrap();
        assert_eq!(msg.msg_type, msg_types::PLAYER_MOVEMENT);

        let location: PlayerLocation = serde_json::from_value(msg.payload).unwrap();
        assert_eq!(
            location,
            PlayerLocation {
                x: 4.0,
                y: 9.5,
                moving: false,
                rotation: Direction::Right,
            }
        );
    }
}
