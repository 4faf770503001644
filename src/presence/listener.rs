use crate::models::Player;

/// Recipient of presence events for a single room.
///
/// Callbacks run while the room is locked: every listener registered when an
/// event starts receives it exactly once, and a removed listener receives
/// nothing afterwards. A callback may add or remove listeners on the room
/// that is notifying it; any other call back into that room panics.
pub trait RoomListener: Send + Sync {
    fn on_player_joined(&self, new_player: &Player);

    fn on_player_moved(&self, moved_player: &Player);

    fn on_player_disconnected(&self, removed_player: &Player);

    /// The room is gone; no further events will follow.
    fn on_room_destroyed(&self);

    /// The session this listener was subscribed under was destroyed through
    /// another connection. The listener has already been removed.
    fn on_session_ended(&self) {}
}

/// Handle returned when registering a listener, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);
