//! Service configuration
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional file (`config/library-auth.{toml,yaml,json}` or the path in
//! `LIBRARY_AUTH_CONFIG`), then `LIBRARY_AUTH__SECTION__KEY` environment
//! variables. Database settings live in [`common::database::DatabaseConfig`].

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Secret used when neither the configuration nor `SECRET_KEY_BASE` supply one.
/// Refused in production.
pub const FALLBACK_SECRET: &str = "fallback_key_for_development_only_not_for_production";

/// Signing secrets shorter than this are refused; the cookie key is derived
/// from the same bytes and needs at least 32 of them.
pub const MIN_SECRET_LEN: usize = 32;

const SECRET_ENV_VAR: &str = "SECRET_KEY_BASE";
const CONFIG_PATH_ENV_VAR: &str = "LIBRARY_AUTH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/library-auth";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("no signing secret configured and the development fallback is not allowed in production")]
    FallbackSecretInProduction,

    #[error("signing secret from {0} is shorter than the 32-byte minimum")]
    SecretTooShort(SecretSource),
}

/// Deployment flavour; drives the cookie `Secure` flag and the fallback check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Where storage lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Application-configured signing secret; highest precedence
    pub secret_key: Option<String>,
    pub cookie_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    pub allowed_origin: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
}

/// Complete service settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub environment: Environment,
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub cors: CorsSettings,
    pub storage: StorageSettings,
}

impl Settings {
    /// Load settings from defaults, the optional config file and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let settings = config::Config::builder()
            .set_default("environment", "development")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("auth.cookie_name", "jwt")?
            .set_default("cors.allowed_origin", "http://localhost:5173")?
            .set_default("storage.backend", "postgres")?
            .add_source(config::File::with_name(&path).required(false))
            .add_source(config::Environment::with_prefix("LIBRARY_AUTH").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    /// Resolve the signing secret for these settings
    pub fn signing_secret(&self) -> Result<Secret, ConfigError> {
        resolve_secret(
            self.auth.secret_key.as_deref(),
            std::env::var(SECRET_ENV_VAR).ok(),
            self.environment,
        )
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Which layer supplied the signing secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    Configured,
    Environment,
    Fallback,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::Configured => f.write_str("auth.secret_key"),
            SecretSource::Environment => f.write_str(SECRET_ENV_VAR),
            SecretSource::Fallback => f.write_str("the development fallback"),
        }
    }
}

/// Process-wide signing secret, resolved once at startup
#[derive(Clone)]
pub struct Secret {
    value: String,
    source: SecretSource,
}

impl Secret {
    pub fn as_bytes(&self) -> &[u8] {
        self.value.as_bytes()
    }

    pub fn source(&self) -> SecretSource {
        self.source
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Resolve the signing secret: configured key, then environment, then the
/// development fallback. Blank values are skipped.
pub fn resolve_secret(
    configured: Option<&str>,
    from_env: Option<String>,
    environment: Environment,
) -> Result<Secret, ConfigError> {
    let (value, source) = match (
        configured.filter(|v| !v.trim().is_empty()),
        from_env.filter(|v| !v.trim().is_empty()),
    ) {
        (Some(value), _) => (value.to_string(), SecretSource::Configured),
        (None, Some(value)) => (value, SecretSource::Environment),
        (None, None) if environment.is_production() => {
            return Err(ConfigError::FallbackSecretInProduction);
        }
        (None, None) => {
            warn!("No signing secret configured; using the development fallback");
            (FALLBACK_SECRET.to_string(), SecretSource::Fallback)
        }
    };

    if value.len() < MIN_SECRET_LEN {
        return Err(ConfigError::SecretTooShort(source));
    }

    Ok(Secret { value, source })
}
