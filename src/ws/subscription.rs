//! Binds a persistent connection to a (room, session) pair.
//!
//! A new connection presents a room id and a session token. If both check out
//! against the registry, a listener forwarding presence events onto the
//! connection is installed on the room and a [`Subscription`] is handed back;
//! the caller routes the connection's inbound movement and disconnect signals
//! through it. Otherwise the connection is closed and nothing is registered.

use std::sync::Arc;

use crate::models::{Player, PlayerLocation};
use crate::presence::{ListenerId, Room, RoomListener, RoomRegistry, Session};
use crate::ws::{msg_types, PresenceConnection, PresenceMessage};

/// Credentials read from the connection handshake
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    pub room_id: Option<String>,
    pub session_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingCredentials,
    UnknownRoom,
    InvalidSession,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            RejectReason::MissingCredentials => "missing credentials",
            RejectReason::UnknownRoom => "unknown room",
            RejectReason::InvalidSession => "invalid session token",
        };
        f.write_str(reason)
    }
}

pub enum SubscriptionOutcome {
    Accepted(Subscription),
    Rejected(RejectReason),
}

/// Forwards room events onto one connection
struct ConnectionListener {
    connection: Arc<dyn PresenceConnection>,
}

impl RoomListener for ConnectionListener {
    fn on_player_joined(&self, new_player: &Player) {
        self.connection
            .emit(PresenceMessage::player_event(msg_types::NEW_PLAYER, new_player));
    }

    fn on_player_moved(&self, moved_player: &Player) {
        self.connection
            .emit(PresenceMessage::player_event(msg_types::PLAYER_MOVED, moved_player));
    }

    fn on_player_disconnected(&self, removed_player: &Player) {
        self.connection.emit(PresenceMessage::player_event(
            msg_types::PLAYER_DISCONNECT,
            removed_player,
        ));
    }

    fn on_room_destroyed(&self) {
        self.connection.emit(PresenceMessage::room_closing());
        self.connection.disconnect();
    }

    fn on_session_ended(&self) {
        self.connection.disconnect();
    }
}

/// Per-connection context of an accepted subscription. Owned by the
/// connection and consumed when it disconnects.
pub struct Subscription {
    conn_id: String,
    room: Arc<Room>,
    session: Session,
    listener_id: ListenerId,
}

/// Validate a new connection and, on success, install its listener.
///
/// Never fails loudly: a rejected connection is disconnected.
pub fn subscribe(
    registry: &RoomRegistry,
    handshake: &Handshake,
    connection: Arc<dyn PresenceConnection>,
) -> SubscriptionOutcome {
    match try_subscribe(registry, handshake, connection.clone()) {
        Ok(subscription) => {
            tracing::info!(
                conn_id = %subscription.conn_id,
                room_id = %subscription.room.id(),
                player_id = %subscription.session.player.id,
                "Connection subscribed to room"
            );
            SubscriptionOutcome::Accepted(subscription)
        }
        Err(reason) => {
            tracing::info!(
                conn_id = %connection.conn_id(),
                reason = %reason,
                "Connection rejected"
            );
            connection.disconnect();
            SubscriptionOutcome::Rejected(reason)
        }
    }
}

fn try_subscribe(
    registry: &RoomRegistry,
    handshake: &Handshake,
    connection: Arc<dyn PresenceConnection>,
) -> Result<Subscription, RejectReason> {
    let (room_id, token) = match (&handshake.room_id, &handshake.session_token) {
        (Some(room_id), Some(token)) => (room_id, token),
        _ => return Err(RejectReason::MissingCredentials),
    };

    let room = registry
        .get_room(room_id)
        .ok_or(RejectReason::UnknownRoom)?;

    let conn_id = connection.conn_id().to_string();
    let listener = Arc::new(ConnectionListener { connection });
    let (session, listener_id) = room
        .subscribe_session(token, listener)
        .ok_or(RejectReason::InvalidSession)?;

    Ok(Subscription {
        conn_id,
        room,
        session,
        listener_id,
    })
}

impl Subscription {
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Inbound `playerMovement` from this connection
    pub fn handle_player_movement(&self, location: PlayerLocation) {
        if let Err(e) = self
            .room
            .update_player_location(&self.session.player.id, location)
        {
            tracing::debug!(
                conn_id = %self.conn_id,
                error = %e,
                "Ignoring movement for ended session"
            );
        }
    }

    /// The connection went away: drop its listener and end its session.
    pub fn handle_disconnect(self) {
        self.room.remove_room_listener(self.listener_id);

        match self.room.destroy_session(&self.session.token) {
            Ok(_) => tracing::info!(
                conn_id = %self.conn_id,
                room_id = %self.room.id(),
                "Connection closed, session destroyed"
            ),
            Err(_) => tracing::debug!(
                conn_id = %self.conn_id,
                room_id = %self.room.id(),
                "Connection closed, session already ended"
            ),
        }
    }
}
