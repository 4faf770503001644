use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{AppError, Result};
use crate::models::RoomListing;
use crate::presence::Room;
use crate::security::generate_room_id;
use crate::video::VideoTokenIssuer;

/// Directory of live rooms, keyed by room id.
///
/// One instance is built by the composition root and shared through
/// [`AppState`](crate::state::AppState). Each room carries its own lock, so
/// operations on different rooms never serialize against each other.
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>, // room_id -> Room
    video: Arc<dyn VideoTokenIssuer>,
    video_timeout: Duration,
}

fn validate_friendly_name(friendly_name: &str) -> Result<()> {
    if friendly_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Room friendlyName must not be blank".to_string(),
        ));
    }
    Ok(())
}

impl RoomRegistry {
    pub fn new(video: Arc<dyn VideoTokenIssuer>, video_timeout: Duration) -> Self {
        Self {
            rooms: DashMap::new(),
            video,
            video_timeout,
        }
    }

    /// Create and store a room under a freshly generated id
    pub fn create_room(&self, friendly_name: &str, is_publicly_listed: bool) -> Result<Arc<Room>> {
        validate_friendly_name(friendly_name)?;

        loop {
            match self.rooms.entry(generate_room_id()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(entry) => {
                    let room = Arc::new(Room::new(
                        entry.key().clone(),
                        friendly_name.to_string(),
                        is_publicly_listed,
                        self.video.clone(),
                        self.video_timeout,
                    ));
                    entry.insert(room.clone());

                    tracing::info!(
                        room_id = %room.id(),
                        friendly_name = %friendly_name,
                        is_publicly_listed,
                        "Room created"
                    );
                    return Ok(room);
                }
            }
        }
    }

    pub fn get_room(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.get(room_id).map(|r| r.clone())
    }

    /// Remove a room and close it for every occupant.
    ///
    /// The room leaves the directory before its listeners are told, so a
    /// lookup never finds a closed room; holders of an older handle see it
    /// closed and fail to join.
    pub fn delete_room(&self, room_id: &str, password: &str) -> Result<()> {
        let room = match self.rooms.entry(room_id.to_string()) {
            Entry::Vacant(_) => {
                return Err(AppError::NotFound(format!("Room {} not found", room_id)));
            }
            Entry::Occupied(entry) => {
                if !entry.get().check_password(password) {
                    return Err(AppError::Unauthorized("Invalid password".to_string()));
                }
                entry.remove()
            }
        };

        room.disconnect_all_players();

        tracing::info!(room_id = %room_id, "Room deleted");
        Ok(())
    }

    /// Update a room's name and/or visibility. Nothing changes unless the
    /// password matches and a provided name is non-blank.
    pub fn update_room(
        &self,
        room_id: &str,
        password: &str,
        friendly_name: Option<String>,
        is_publicly_listed: Option<bool>,
    ) -> Result<()> {
        let room = self
            .get_room(room_id)
            .ok_or_else(|| AppError::NotFound(format!("Room {} not found", room_id)))?;

        if !room.check_password(password) {
            return Err(AppError::Unauthorized("Invalid password".to_string()));
        }
        if let Some(name) = &friendly_name {
            validate_friendly_name(name)?;
        }

        room.update(friendly_name, is_publicly_listed)?;

        tracing::info!(room_id = %room_id, "Room updated");
        Ok(())
    }

    /// Publicly listed rooms, ordered by name then id
    pub fn list_public_rooms(&self) -> Vec<RoomListing> {
        let rooms: Vec<Arc<Room>> = self.rooms.iter().map(|r| r.value().clone()).collect();

        let mut listings: Vec<RoomListing> = rooms.iter().filter_map(|r| r.listing()).collect();
        listings.sort_by(|a, b| {
            a.friendly_name
                .cmp(&b.friendly_name)
                .then_with(|| a.room_id.cmp(&b.room_id))
        });
        listings
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
