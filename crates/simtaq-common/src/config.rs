//! Application configuration loaded from environment variables and config files.
//!
//! Precedence: env vars > .env file > config.toml > defaults.
//! Environment keys use the `SIMTAQ` prefix and `__` as the section separator,
//! e.g. `SIMTAQ__DATABASE__URL` or `SIMTAQ__AUTH__JWT_SECRET`.

use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use serde::Deserialize;
use std::sync::OnceLock;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Get the global application configuration.
///
/// # Panics
/// Panics if config has not been initialized via [`init`] or [`install`].
pub fn get() -> &'static AppConfig {
    CONFIG
        .get()
        .expect("Config not initialized. Call simtaq_common::config::init() first.")
}

/// Initialize the global configuration from defaults, `config.toml` and the environment.
pub fn init() -> Result<&'static AppConfig, ConfigError> {
    let _ = dotenvy::dotenv();

    let cfg = defaults()?
        .add_source(config::File::with_name("config").required(false))
        .add_source(
            config::Environment::with_prefix("SIMTAQ")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;
    Ok(install(app_config))
}

/// Install an already-built configuration as the global one.
///
/// The first installed value wins; later calls return the existing config.
pub fn install(app_config: AppConfig) -> &'static AppConfig {
    CONFIG.get_or_init(|| app_config)
}

/// Build a configuration from the defaults plus explicit `key = value` overrides.
pub fn from_overrides(overrides: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
    let mut builder = defaults()?;
    for (key, value) in overrides {
        builder = builder.set_override(*key, *value)?;
    }
    builder.build()?.try_deserialize()
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 3000)?
        .set_default("server.log_json", false)?
        .set_default("server.request_timeout_secs", 30)?
        .set_default("server.trust_proxy", false)?
        .set_default("database.url", "postgres://localhost/simtaq")?
        .set_default("database.max_connections", 20)?
        .set_default("database.min_connections", 2)?
        .set_default("auth.jwt_secret", "")?
        .set_default("auth.session_ttl_secs", 86_400)? // 1 day
        .set_default("auth.cookie_name", "simtaq_session")?
        .set_default("auth.cookie_secure", false)?
        .set_default("auth.reset_max_attempts", 5)?
        .set_default("auth.reset_lock_minutes", 15)?
        .set_default("storage.uploads_dir", "./public/uploads")?
        .set_default("storage.public_prefix", "/uploads")?
        .set_default("storage.max_upload_bytes", 5_242_880)? // 5MB
        .set_default("push.subject", "mailto:admin@tahfidz.sch.id")?
        .set_default("push.ttl_secs", 86_400)?
        .set_default("cache.ttl_secs", 300)?
        .set_default("audio.default_reciter", "Abdul_Basit_Murattal_192kbps")?
        .set_default("audio.timeout_secs", 10)?
        .set_default("school.name", "MAN 1 Bandar Lampung")?
        .set_default("school.city", "Bandar Lampung")?
        .set_default("school.default_target_juz", 3)
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub push: PushConfig,
    pub cache: CacheConfig,
    pub audio: AudioConfig,
    pub school: SchoolConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Emit JSON log lines instead of the human-readable format.
    pub log_json: bool,
    pub request_timeout_secs: u64,
    /// Take the client address from proxy headers instead of the socket.
    pub trust_proxy: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 secret used to sign session tokens. Must be set in production.
    pub jwt_secret: String,
    pub session_ttl_secs: u64,
    pub cookie_name: String,
    /// Adds the `Secure` attribute to the session cookie.
    pub cookie_secure: bool,
    /// Failed password-reset attempts allowed before the key is locked.
    pub reset_max_attempts: i32,
    pub reset_lock_minutes: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory on disk that backs the public `/uploads` path.
    pub uploads_dir: String,
    pub public_prefix: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PushConfig {
    /// VAPID public key, base64url without padding, as handed to browsers.
    pub vapid_public_key: Option<String>,
    /// Path to the VAPID private key (PKCS#8 PEM, P-256).
    pub vapid_private_key_path: Option<String>,
    pub subject: String,
    pub ttl_secs: u32,
}

impl PushConfig {
    pub fn is_configured(&self) -> bool {
        self.vapid_public_key.as_deref().is_some_and(|k| !k.is_empty())
            && self.vapid_private_key_path.as_deref().is_some_and(|p| !p.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AudioConfig {
    pub default_reciter: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchoolConfig {
    pub name: String,
    /// City printed before the date on certificates.
    pub city: String,
    /// Minimum completed juz for tasmi' when the school year has no target.
    pub default_target_juz: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deserialize() {
        let cfg = from_overrides(&[]).unwrap();
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.auth.cookie_name, "simtaq_session");
        assert_eq!(cfg.auth.reset_max_attempts, 5);
        assert!(!cfg.push.is_configured());
    }

    #[test]
    fn overrides_take_precedence() {
        let cfg = from_overrides(&[
            ("auth.jwt_secret", "s3cret"),
            ("push.vapid_public_key", "BPub"),
            ("push.vapid_private_key_path", "/etc/simtaq/vapid.pem"),
        ])
        .unwrap();
        assert_eq!(cfg.auth.jwt_secret, "s3cret");
        assert!(cfg.push.is_configured());
    }
}
