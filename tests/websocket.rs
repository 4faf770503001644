//! End-to-end tests: a real server on an ephemeral port, real WebSocket clients.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};

use presence_backend::config::Config;
use presence_backend::models::{Direction, Player, PlayerLocation};
use presence_backend::presence::{Room, RoomRegistry, Session};
use presence_backend::state::AppState;
use presence_backend::video::JwtVideoTokenIssuer;
use presence_backend::ws::{msg_types, PresenceMessage};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: std::net::SocketAddr,
    registry: Arc<RoomRegistry>,
}

async fn start_server() -> TestServer {
    let config = Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        video_token_secret: "ws-test-secret".to_string(),
        video_token_issuer: "presence-test".to_string(),
        video_token_ttl_seconds: 600,
        video_token_timeout_ms: 500,
        log_json: false,
    };
    let video = Arc::new(JwtVideoTokenIssuer::new(&config));
    let state = AppState::new(RoomRegistry::new(video, config.video_token_timeout()));
    let registry = state.registry.clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, presence_backend::app(state))
            .await
            .unwrap();
    });

    TestServer { addr, registry }
}

impl TestServer {
    async fn connect(&self, room_id: &str, token: &str) -> Client {
        let url = format!(
            "ws://{}/ws?roomId={}&sessionToken={}",
            self.addr, room_id, token
        );
        let (client, _) = connect_async(url).await.expect("upgrade should succeed");
        client
    }

    /// Connect and wait until the server has installed the room listener
    async fn subscribe(&self, room: &Room, session: &Session) -> Client {
        let before = room.listener_count();
        let client = self.connect(room.id(), &session.token).await;
        wait_until(|| room.listener_count() > before).await;
        client
    }
}

async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Next presence event, skipping control frames. `None` once the socket closes.
async fn next_event(client: &mut Client) -> Option<PresenceMessage> {
    loop {
        let frame = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for a frame");
        match frame {
            Some(Ok(Message::Text(text))) => {
                return Some(serde_json::from_str(text.as_str()).unwrap());
            }
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(_)) => continue,
        }
    }
}

async fn expect_player_event(client: &mut Client, msg_type: &str) -> Player {
    let event = next_event(client).await.expect("socket closed unexpectedly");
    assert_eq!(event.msg_type, msg_type);
    serde_json::from_value(event.payload).unwrap()
}

async fn expect_closed(client: &mut Client) {
    assert!(next_event(client).await.is_none(), "socket should be closed");
}

#[tokio::test]
async fn test_rejects_unknown_room_even_with_valid_token() {
    let server = start_server().await;
    let room = server.registry.create_room("Valid", true).unwrap();
    let session = room.add_player("alice").await.unwrap();

    let mut client = server.connect("not-a-room", &session.token).await;
    expect_closed(&mut client).await;
}

#[tokio::test]
async fn test_rejects_invalid_token_for_valid_room() {
    let server = start_server().await;
    let room = server.registry.create_room("Valid", true).unwrap();
    room.add_player("alice").await.unwrap();

    let mut client = server.connect(room.id(), "invalid-stuff").await;
    expect_closed(&mut client).await;
    assert_eq!(room.listener_count(), 0);
}

#[tokio::test]
async fn test_rejects_token_issued_for_another_room() {
    let server = start_server().await;
    let room_a = server.registry.create_room("A", true).unwrap();
    let room_b = server.registry.create_room("B", true).unwrap();
    let session_a = room_a.add_player("alice").await.unwrap();

    let mut client = server.connect(room_b.id(), &session_a.token).await;
    expect_closed(&mut client).await;
}

#[tokio::test]
async fn test_rejects_missing_credentials() {
    let server = start_server().await;
    let url = format!("ws://{}/ws", server.addr);
    let (mut client, _) = connect_async(url).await.unwrap();
    expect_closed(&mut client).await;
}

#[tokio::test]
async fn test_movement_is_dispatched_to_everyone_in_the_room() {
    let server = start_server().await;
    let room = server.registry.create_room("Lobby", true).unwrap();
    let other_room = server.registry.create_room("Elsewhere", true).unwrap();
    let alice = room.add_player("alice").await.unwrap();
    let bob = room.add_player("bob").await.unwrap();
    let outsider = other_room.add_player("eve").await.unwrap();

    let mut alice_ws = server.subscribe(&room, &alice).await;
    let mut bob_ws = server.subscribe(&room, &bob).await;
    let mut outsider_ws = server.subscribe(&other_room, &outsider).await;

    let location = PlayerLocation {
        x: 12.0,
        y: 7.0,
        moving: true,
        rotation: Direction::Right,
    };
    let movement = PresenceMessage::new(
        msg_types::PLAYER_MOVEMENT,
        serde_json::to_value(location).unwrap(),
    );
    alice_ws
        .send(Message::Text(serde_json::to_string(&movement).unwrap().into()))
        .await
        .unwrap();

    for client in [&mut alice_ws, &mut bob_ws] {
        let moved = expect_player_event(client, msg_types::PLAYER_MOVED).await;
        assert_eq!(moved.id, alice.player.id);
        assert_eq!(moved.location, location);
    }

    // Nothing leaks into the other room.
    let leaked = tokio::time::timeout(Duration::from_millis(200), outsider_ws.next()).await;
    assert!(leaked.is_err());
}

#[tokio::test]
async fn test_new_players_are_announced() {
    let server = start_server().await;
    let room = server.registry.create_room("Lobby", true).unwrap();
    let alice = room.add_player("alice").await.unwrap();
    let mut alice_ws = server.subscribe(&room, &alice).await;

    let carol = room.add_player("carol").await.unwrap();

    let joined = expect_player_event(&mut alice_ws, msg_types::NEW_PLAYER).await;
    assert_eq!(joined.id, carol.player.id);
    assert_eq!(joined.user_name, "carol");
}

#[tokio::test]
async fn test_disconnect_is_announced_and_invalidates_session() {
    let server = start_server().await;
    let room = server.registry.create_room("Lobby", true).unwrap();
    let alice = room.add_player("alice").await.unwrap();
    let bob = room.add_player("bob").await.unwrap();
    let mut alice_ws = server.subscribe(&room, &alice).await;
    let mut bob_ws = server.subscribe(&room, &bob).await;

    bob_ws.close(None).await.unwrap();

    let gone = expect_player_event(&mut alice_ws, msg_types::PLAYER_DISCONNECT).await;
    assert_eq!(gone.id, bob.player.id);
    wait_until(|| room.session(&bob.token).is_none()).await;
    assert_eq!(room.occupancy(), 1);

    let mut retry = server.connect(room.id(), &bob.token).await;
    expect_closed(&mut retry).await;
}

#[tokio::test]
async fn test_room_deletion_closes_every_connection() {
    let server = start_server().await;
    let room = server.registry.create_room("Lobby", true).unwrap();
    let alice = room.add_player("alice").await.unwrap();
    let bob = room.add_player("bob").await.unwrap();
    let mut alice_ws = server.subscribe(&room, &alice).await;
    let mut bob_ws = server.subscribe(&room, &bob).await;

    server
        .registry
        .delete_room(room.id(), room.password())
        .unwrap();

    for client in [&mut alice_ws, &mut bob_ws] {
        let closing = next_event(client).await.expect("expected roomClosing");
        assert_eq!(closing.msg_type, msg_types::ROOM_CLOSING);
        expect_closed(client).await;
    }
    assert!(server.registry.get_room(room.id()).is_none());
}

#[tokio::test]
async fn test_closing_one_connection_closes_others_on_the_same_token() {
    let server = start_server().await;
    let room = server.registry.create_room("Lobby", true).unwrap();
    let alice = room.add_player("alice").await.unwrap();
    let bob = room.add_player("bob").await.unwrap();
    let mut first_ws = server.subscribe(&room, &alice).await;
    let mut second_ws = server.subscribe(&room, &alice).await;
    let mut bob_ws = server.subscribe(&room, &bob).await;

    first_ws.close(None).await.unwrap();

    expect_closed(&mut second_ws).await;
    let gone = expect_player_event(&mut bob_ws, msg_types::PLAYER_DISCONNECT).await;
    assert_eq!(gone.id, alice.player.id);
    wait_until(|| room.listener_count() == 1).await;
}
