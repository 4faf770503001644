use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;

/// Issues video-conferencing access credentials for a player in a room.
///
/// Joins treat this as best-effort: a failure (or a slow answer) leaves the
/// player admitted without a credential.
#[async_trait]
pub trait VideoTokenIssuer: Send + Sync {
    async fn issue_token(&self, room_id: &str, player_id: &str) -> Result<String>;
}

/// Video grant claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoClaims {
    pub sub: String, // player_id
    pub room: String,
    pub iss: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs video grants locally with an HMAC secret
#[derive(Clone)]
pub struct JwtVideoTokenIssuer {
    encoding_key: EncodingKey,
    issuer: String,
    expiry_seconds: u64,
}

impl JwtVideoTokenIssuer {
    pub fn new(config: &Config) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.video_token_secret.as_bytes()),
            issuer: config.video_token_issuer.clone(),
            expiry_seconds: config.video_token_ttl_seconds,
        }
    }

    /// Generate a signed grant for a player joining a room
    pub fn generate_token(&self, room_id: &str, player_id: &str) -> Result<String> {
        let now = Utc::now().timestamp();

        let claims = VideoClaims {
            sub: player_id.to_string(),
            room: room_id.to_string(),
            iss: self.issuer.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.expiry_seconds as i64,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }
}

#[async_trait]
impl VideoTokenIssuer for JwtVideoTokenIssuer {
    async fn issue_token(&self, room_id: &str, player_id: &str) -> Result<String> {
        self.generate_token(room_id, player_id)
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    use super::*;

    fn validate(config: &Config, token: &str) -> Result<VideoClaims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&config.video_token_issuer]);
        let key = DecodingKey::from_secret(config.video_token_secret.as_bytes());
        Ok(decode::<VideoClaims>(token, &key, &validation)?.claims)
    }

    fn test_config() -> Config {
        Config {
            server_host: "localhost".to_string(),
            server_port: 8081,
            video_token_secret: "test-secret-key".to_string(),
            video_token_issuer: "presence-test".to_string(),
            video_token_ttl_seconds: 900,
            video_token_timeout_ms: 200,
            log_json: false,
        }
    }

    #[test]
    fn test_generate_and_validate_token() {
        let config = test_config();
        let issuer = JwtVideoTokenIssuer::new(&config);

        let token = issuer
            .generate_token("room-456", "player-123")
            .expect("Should generate token");
        let claims = validate(&config, &token).expect("Should validate token");

        assert_eq!(claims.sub, "player-123");
        assert_eq!(claims.room, "room-456");
        assert_eq!(claims.iss, "presence-test");
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let config = test_config();
        let mut other_config = test_config();
        other_config.video_token_secret = "another-secret".to_string();
        let other = JwtVideoTokenIssuer::new(&other_config);

        let token = other.generate_token("room", "player").unwrap();
        assert!(validate(&config, &token).is_err());
        assert!(validate(&config, "invalid-token").is_err());
    }
}
