use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{Player, PlayerLocation, RoomListing};
use crate::presence::{ListenerId, RoomListener};
use crate::security::{ct_eq, generate_room_password, generate_session_token};
use crate::video::VideoTokenIssuer;

thread_local! {
    /// Rooms whose listeners are being called on this thread
    static NOTIFYING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks a room as notifying on the current thread until dropped.
struct FanOut(usize);

impl FanOut {
    fn enter(room: &Room) -> Self {
        let key = room.key();
        NOTIFYING.with(|rooms| rooms.borrow_mut().push(key));
        FanOut(key)
    }
}

impl Drop for FanOut {
    fn drop(&mut self) {
        NOTIFYING.with(|rooms| {
            let mut rooms = rooms.borrow_mut();
            if let Some(pos) = rooms.iter().rposition(|key| *key == self.0) {
                rooms.remove(pos);
            }
        });
    }
}

/// Listener-set change requested from inside a callback
enum ListenerChange {
    Add(ListenerId, Arc<dyn RoomListener>),
    Remove(ListenerId),
}

/// A token-backed binding of one player to one room
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub room_id: String,
    /// The player as admitted; the room holds the live location.
    pub player: Player,
    pub video_token: Option<String>,
}

/// Mutable room state, guarded as a unit so that the player set, the session
/// table and the listener set change together with the matching fan-out.
struct RoomState {
    friendly_name: String,
    is_publicly_listed: bool,
    players: HashMap<String, Player>, // player_id -> Player
    sessions: HashMap<String, Session>, // token -> Session
    listeners: Vec<(ListenerId, Arc<dyn RoomListener>)>,
    subscribers: HashMap<String, Vec<ListenerId>>, // token -> listeners bound to it
    closed: bool,
}

impl RoomState {
    fn find_listener(&self, listener: &Arc<dyn RoomListener>) -> Option<ListenerId> {
        self.listeners
            .iter()
            .find(|(_, l)| std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(listener)))
            .map(|(id, _)| *id)
    }

    fn detach(&mut self, id: ListenerId) -> Option<Arc<dyn RoomListener>> {
        let pos = self.listeners.iter().position(|(lid, _)| *lid == id)?;
        let (_, listener) = self.listeners.remove(pos);
        self.subscribers.retain(|_, ids| {
            ids.retain(|lid| *lid != id);
            !ids.is_empty()
        });
        Some(listener)
    }
}

/// A single room's authoritative state and the only source of presence events
pub struct Room {
    id: String,
    password: String,
    video: Arc<dyn VideoTokenIssuer>,
    video_timeout: Duration,
    next_listener_id: AtomicU64,
    state: Mutex<RoomState>,
    /// Only touched by the thread currently holding `state`.
    deferred: Mutex<Vec<ListenerChange>>,
}

impl Room {
    pub fn new(
        id: String,
        friendly_name: String,
        is_publicly_listed: bool,
        video: Arc<dyn VideoTokenIssuer>,
        video_timeout: Duration,
    ) -> Self {
        Self {
            id,
            password: generate_room_password(),
            video,
            video_timeout,
            next_listener_id: AtomicU64::new(0),
            state: Mutex::new(RoomState {
                friendly_name,
                is_publicly_listed,
                players: HashMap::new(),
                sessions: HashMap::new(),
                listeners: Vec::new(),
                subscribers: HashMap::new(),
                closed: false,
            }),
            deferred: Mutex::new(Vec::new()),
        }
    }

    fn key(&self) -> usize {
        self as *const Room as usize
    }

    fn in_fan_out(&self) -> bool {
        let key = self.key();
        NOTIFYING.with(|rooms| rooms.borrow().contains(&key))
    }

    /// Lock the room state.
    ///
    /// Panics when called from one of this room's own listener callbacks,
    /// which would otherwise deadlock.
    fn lock(&self) -> MutexGuard<'_, RoomState> {
        if self.in_fan_out() {
            tracing::error!(room_id = %self.id, "Room re-entered from a listener callback");
            panic!("room {} re-entered from a listener callback", self.id);
        }
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deferred_changes(&self) -> MutexGuard<'_, Vec<ListenerChange>> {
        self.deferred.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn removal_pending(&self, id: ListenerId) -> bool {
        self.deferred_changes()
            .iter()
            .any(|change| matches!(change, ListenerChange::Remove(r) if *r == id))
    }

    /// Deliver one event to every registered listener, then apply the
    /// listener changes the callbacks asked for.
    fn notify(&self, state: &mut RoomState, event: impl Fn(&dyn RoomListener)) {
        {
            let _fan_out = FanOut::enter(self);
            for (id, listener) in &state.listeners {
                if !self.removal_pending(*id) {
                    event(listener.as_ref());
                }
            }
        }
        self.apply_deferred(state);
    }

    fn apply_deferred(&self, state: &mut RoomState) {
        loop {
            let changes = std::mem::take(&mut *self.deferred_changes());
            if changes.is_empty() {
                return;
            }
            for change in changes {
                match change {
                    ListenerChange::Add(id, listener) => {
                        if state.find_listener(&listener).is_none() {
                            self.attach(state, id, listener);
                        }
                    }
                    ListenerChange::Remove(id) => {
                        state.detach(id);
                    }
                }
            }
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn check_password(&self, password: &str) -> bool {
        ct_eq(&self.password, password)
    }

    pub fn friendly_name(&self) -> String {
        self.lock().friendly_name.clone()
    }

    pub fn is_publicly_listed(&self) -> bool {
        self.lock().is_publicly_listed
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn occupancy(&self) -> usize {
        self.lock().players.len()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Snapshot of the current occupants
    pub fn players(&self) -> Vec<Player> {
        self.lock().players.values().cloned().collect()
    }

    /// Listing entry, if the room is publicly listed
    pub fn listing(&self) -> Option<RoomListing> {
        let state = self.lock();
        if !state.is_publicly_listed || state.closed {
            return None;
        }
        Some(RoomListing {
            room_id: self.id.clone(),
            friendly_name: state.friendly_name.clone(),
            current_occupancy: state.players.len(),
        })
    }

    /// Apply an already-validated update. `None` leaves a field untouched.
    pub(crate) fn update(
        &self,
        friendly_name: Option<String>,
        is_publicly_listed: Option<bool>,
    ) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(AppError::NotFound(format!("Room {} not found", self.id)));
        }
        if let Some(name) = friendly_name {
            state.friendly_name = name;
        }
        if let Some(listed) = is_publicly_listed {
            state.is_publicly_listed = listed;
        }
        Ok(())
    }

    /// Admit a new player and open a session for them.
    ///
    /// The video credential is requested before the room is locked; its
    /// failure only means the session carries no credential.
    pub async fn add_player(&self, user_name: &str) -> Result<Session> {
        if self.is_closed() {
            return Err(AppError::NotFound(format!("Room {} not found", self.id)));
        }

        let player = Player::new(user_name);
        let video_token = self.request_video_token(&player.id).await;

        let session = Session {
            token: generate_session_token(),
            room_id: self.id.clone(),
            player: player.clone(),
            video_token,
        };

        let mut state = self.lock();
        if state.closed {
            return Err(AppError::NotFound(format!("Room {} not found", self.id)));
        }
        state.players.insert(player.id.clone(), player.clone());
        state.sessions.insert(session.token.clone(), session.clone());
        self.notify(&mut state, |l| l.on_player_joined(&player));

        tracing::info!(
            room_id = %self.id,
            player_id = %player.id,
            user_name = %player.user_name,
            "Player joined room"
        );

        Ok(session)
    }

    async fn request_video_token(&self, player_id: &str) -> Option<String> {
        let request = self.video.issue_token(&self.id, player_id);
        match tokio::time::timeout(self.video_timeout, request).await {
            Ok(Ok(token)) => Some(token),
            Ok(Err(e)) => {
                tracing::warn!(
                    room_id = %self.id,
                    player_id = %player_id,
                    error = %e,
                    "Video token request failed"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    room_id = %self.id,
                    player_id = %player_id,
                    "Video token request timed out"
                );
                None
            }
        }
    }

    /// Overwrite a player's location and tell every listener.
    pub fn update_player_location(
        &self,
        player_id: &str,
        location: PlayerLocation,
    ) -> Result<Player> {
        let mut state = self.lock();
        let player = state
            .players
            .get_mut(player_id)
            .ok_or_else(|| AppError::NotFound(format!("Player {} not found", player_id)))?;
        player.location = location;
        let moved = player.clone();
        self.notify(&mut state, |l| l.on_player_moved(&moved));

        tracing::debug!(room_id = %self.id, player_id = %player_id, "Player moved");
        Ok(moved)
    }

    /// Look up a live session by its token
    pub fn session(&self, token: &str) -> Option<Session> {
        self.lock().sessions.get(token).cloned()
    }

    /// End a session, removing its player and notifying listeners.
    ///
    /// Listeners still subscribed under the token are detached first and
    /// told the session ended instead.
    pub fn destroy_session(&self, token: &str) -> Result<Player> {
        let mut state = self.lock();
        let session = state
            .sessions
            .remove(token)
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;
        let player = state
            .players
            .remove(&session.player.id)
            .unwrap_or(session.player);

        let bound = state.subscribers.remove(token).unwrap_or_default();
        let orphaned: Vec<_> = bound.into_iter().filter_map(|id| state.detach(id)).collect();

        self.notify(&mut state, |l| l.on_player_disconnected(&player));
        if !orphaned.is_empty() {
            {
                let _fan_out = FanOut::enter(self);
                for listener in &orphaned {
                    listener.on_session_ended();
                }
            }
            self.apply_deferred(&mut state);
        }

        tracing::info!(
            room_id = %self.id,
            player_id = %player.id,
            detached = orphaned.len(),
            "Player disconnected"
        );
        Ok(player)
    }

    /// Tell every listener the room is gone, then drop all players, sessions
    /// and listeners. The room accepts no players afterwards.
    pub fn disconnect_all_players(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.notify(&mut state, |l| l.on_room_destroyed());

        let listeners = state.listeners.len();
        state.listeners.clear();
        state.subscribers.clear();
        state.sessions.clear();
        state.players.clear();

        tracing::info!(room_id = %self.id, listeners, "Room closed");
    }

    /// Register a listener. Adding the same listener twice returns its existing id.
    ///
    /// From inside one of this room's callbacks the listener is registered
    /// once the current event has been delivered.
    pub fn add_room_listener(&self, listener: Arc<dyn RoomListener>) -> ListenerId {
        if self.in_fan_out() {
            let id = self.allocate_listener_id();
            self.deferred_changes()
                .push(ListenerChange::Add(id, listener));
            return id;
        }

        let mut state = self.lock();
        let id = self.register(&mut state, listener);
        self.apply_deferred(&mut state);
        id
    }

    fn allocate_listener_id(&self) -> ListenerId {
        ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed))
    }

    fn register(&self, state: &mut RoomState, listener: Arc<dyn RoomListener>) -> ListenerId {
        if let Some(id) = state.find_listener(&listener) {
            return id;
        }
        let id = self.allocate_listener_id();
        self.attach(state, id, listener);
        id
    }

    fn attach(&self, state: &mut RoomState, id: ListenerId, listener: Arc<dyn RoomListener>) {
        if state.closed {
            // Nothing will ever be delivered here again.
            let _fan_out = FanOut::enter(self);
            listener.on_room_destroyed();
        } else {
            state.listeners.push((id, listener));
        }
    }

    /// Unregister a listener. Returns false if it was not registered.
    ///
    /// From inside one of this room's callbacks the removal takes effect
    /// immediately for delivery, and the listener set is updated once the
    /// current event has been delivered; the call then returns true.
    pub fn remove_room_listener(&self, id: ListenerId) -> bool {
        if self.in_fan_out() {
            self.deferred_changes().push(ListenerChange::Remove(id));
            return true;
        }

        self.lock().detach(id).is_some()
    }

    /// Validate a session token and register a listener in one step, so a
    /// listener is never attached to a session that has already ended.
    /// The listener is detached when that session is destroyed.
    pub fn subscribe_session(
        &self,
        token: &str,
        listener: Arc<dyn RoomListener>,
    ) -> Option<(Session, ListenerId)> {
        let mut state = self.lock();
        let session = state.sessions.get(token)?.clone();
        let id = self.register(&mut state, listener);

        let bound = state.subscribers.entry(token.to_string()).or_default();
        if !bound.contains(&id) {
            bound.push(id);
        }
        Some((session, id))
    }
}
