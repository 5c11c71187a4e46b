//! Configuration loading and validation.
//!
//! The server reads a TOML file such as:
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0:3001"
//! idle_timeout_secs = 0
//!
//! [auth]
//! jwt_secret = "change-me"
//!
//! [[spaces]]
//! id = "lobby"
//! dimensions = "100x200"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every section except `[[spaces]]` has defaults. Exactly one identity
//! source must be configured: `auth.jwt_secret` or a list of
//! `[[auth.tokens]]`.

use std::collections::HashSet;
use std::path::Path;

use plaza::prelude::{Identity, SpaceBounds, StaticSpaces, StaticVerifier};
use serde::{Deserialize, Serialize};

use crate::cli::CliArgs;

fn default_bind_address() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_handshake_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub spaces: Vec<SpaceSettings>,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Close connections that send nothing for this long. 0 disables.
    #[serde(default)]
    pub idle_timeout_secs: u64,
    /// Drop clients that don't finish the WebSocket upgrade in time.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            idle_timeout_secs: 0,
            handshake_timeout_secs: default_handshake_timeout(),
        }
    }
}

/// Where identities come from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Shared HS256 secret of the account service.
    #[serde(default)]
    pub jwt_secret: Option<String>,
    /// Fixed tokens, for development.
    #[serde(default)]
    pub tokens: Vec<TokenSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSettings {
    pub token: String,
    pub user_id: String,
    pub user_name: String,
}

/// One space clients may join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceSettings {
    pub id: String,
    /// `"WIDTHxHEIGHT"`, e.g. `"100x200"`.
    pub dimensions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

/// The identity source selected by the configuration.
#[derive(Debug)]
pub enum AuthSource {
    Jwt(String),
    Static(StaticVerifier),
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Applies command-line overrides on top of the file's values.
    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(bind) = &args.bind_address {
            self.server.bind_address = bind.clone();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if let Some(secs) = args.idle_timeout_secs {
            self.server.idle_timeout_secs = secs;
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
    }

    /// Checks the configuration for consistency before anything starts.
    pub fn validate(&self) -> Result<(), String> {
        if self
            .server
            .bind_address
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(format!("Invalid bind address: {}", self.server.bind_address));
        }

        let has_secret = self
            .auth
            .jwt_secret
            .as_deref()
            .is_some_and(|s| !s.is_empty());
        match (has_secret, self.auth.tokens.is_empty()) {
            (true, false) => {
                return Err("Configure either auth.jwt_secret or auth.tokens, not both".to_string());
            }
            (false, true) => {
                return Err("No identity source: set auth.jwt_secret or auth.tokens".to_string());
            }
            _ => {}
        }

        if self.spaces.is_empty() {
            return Err("At least one [[spaces]] entry is required".to_string());
        }
        let mut seen = HashSet::new();
        for space in &self.spaces {
            if space.id.is_empty() {
                return Err("Space id cannot be empty".to_string());
            }
            if !seen.insert(space.id.as_str()) {
                return Err(format!("Duplicate space id: {}", space.id));
            }
            space
                .dimensions
                .parse::<SpaceBounds>()
                .map_err(|e| format!("Space {}: {e}", space.id))?;
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                self.logging.level
            ));
        }

        Ok(())
    }

    /// Builds the in-memory space table. Call after [`validate`](Self::validate).
    pub fn space_table(&self) -> Result<StaticSpaces, String> {
        let mut table = StaticSpaces::new();
        for space in &self.spaces {
            let bounds = space
                .dimensions
                .parse::<SpaceBounds>()
                .map_err(|e| format!("Space {}: {e}", space.id))?;
            table.insert(space.id.clone().into(), bounds);
        }
        Ok(table)
    }

    /// The configured identity source. Call after [`validate`](Self::validate).
    pub fn auth_source(&self) -> AuthSource {
        match self.auth.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => AuthSource::Jwt(secret.to_string()),
            _ => AuthSource::Static(self.auth.tokens.iter().fold(
                StaticVerifier::new(),
                |verifier, t| {
                    verifier.with_token(
                        t.token.clone(),
                        Identity::new(t.user_id.clone(), t.user_name.clone()),
                    )
                },
            )),
        }
    }
}
