use serde::{Deserialize, Serialize};

use crate::security::generate_player_id;

/// Direction a player's avatar is facing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Front,
    Back,
    Left,
    Right,
}

/// Last-known position of a player. Coordinates are not bounds-checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerLocation {
    pub x: f64,
    pub y: f64,
    pub moving: bool,
    pub rotation: Direction,
}

/// An occupant of a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub user_name: String,
    pub location: PlayerLocation,
}

impl Player {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            id: generate_player_id(),
            user_name: user_name.into(),
            location: PlayerLocation::default(),
        }
    }
}
