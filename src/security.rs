//! Identifier and secret generation (room ids, session tokens, room passwords)
//! plus constant-time comparison for secrets presented by clients.

use rand::Rng;
use subtle::ConstantTimeEq;

const PASSWORD_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const PASSWORD_LEN: usize = 24;

/// Random v4 UUID (122 bits of entropy), used for room ids.
pub fn generate_room_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Random v4 UUID, used for player ids.
pub fn generate_player_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Generate a session token: 32 random bytes, hex-encoded (256 bits).
pub fn generate_session_token() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    hex::encode(bytes)
}

/// Generate a room password. Returned once to the room creator.
pub fn generate_room_password() -> String {
    let mut rng = rand::rng();

    (0..PASSWORD_LEN)
        .map(|_| {
            let idx = rng.random_range(0..PASSWORD_CHARSET.len());
            PASSWORD_CHARSET[idx] as char
        })
        .collect()
}

/// Constant-time equality for secrets.
pub fn ct_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
