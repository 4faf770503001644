use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub video_token_secret: String,
    pub video_token_issuer: String,
    pub video_token_ttl_seconds: u64,
    pub video_token_timeout_ms: u64,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8081".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            video_token_secret: env::var("VIDEO_TOKEN_SECRET")
                .map_err(|_| ConfigError::MissingVideoTokenSecret)?,
            video_token_issuer: env::var("VIDEO_TOKEN_ISSUER")
                .unwrap_or_else(|_| "presence-backend".to_string()),
            video_token_ttl_seconds: env::var("VIDEO_TOKEN_TTL_SECONDS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .unwrap_or(3600),
            video_token_timeout_ms: env::var("VIDEO_TOKEN_TIMEOUT_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .unwrap_or(2000),
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// How long a join waits on the video credential service.
    pub fn video_token_timeout(&self) -> Duration {
        Duration::from_millis(self.video_token_timeout_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server port")]
    InvalidPort,
    #[error("VIDEO_TOKEN_SECRET environment variable is required")]
    MissingVideoTokenSecret,
}
