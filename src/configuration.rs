use crate::auth::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::error::ConfigError;

/// Minimum length of each signing secret, in bytes (HS256 key size)
const MIN_SECRET_LENGTH: usize = 32;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub hashing: HashingSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// Token signing settings.
///
/// The two secrets are purpose-scoped and must differ; they are never
/// compiled in and come from the configuration file or `APP__JWT__*`.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    #[serde(default = "default_access_expiry")]
    pub access_token_expiry: i64, // seconds
    #[serde(default = "default_refresh_expiry")]
    pub refresh_token_expiry: i64, // seconds
    pub issuer: String,
}

fn default_access_expiry() -> i64 {
    60 * 15
}

fn default_refresh_expiry() -> i64 {
    60 * 60 * 24 * 7
}

impl JwtSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, secret) in [
            ("jwt.access_secret", &self.access_secret),
            ("jwt.refresh_secret", &self.refresh_secret),
        ] {
            if secret.is_empty() {
                return Err(ConfigError::MissingRequired(name.to_string()));
            }
            if secret.len() < MIN_SECRET_LENGTH {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be at least {} bytes",
                    name, MIN_SECRET_LENGTH
                )));
            }
        }

        if self.access_secret == self.refresh_secret {
            return Err(ConfigError::InvalidValue(
                "jwt.access_secret and jwt.refresh_secret must differ".to_string(),
            ));
        }

        if self.access_token_expiry <= 0 || self.refresh_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "token expiry must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct HashingSettings {
    /// bcrypt work factor
    pub cost: u32,
}

impl Default for HashingSettings {
    fn default() -> Self {
        Self { cost: 10 }
    }
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(serde::Deserialize, Clone, Default)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.jwt.validate()?;

        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.hashing.cost) {
            return Err(ConfigError::InvalidValue(format!(
                "hashing.cost must be between {} and {}",
                MIN_BCRYPT_COST, MAX_BCRYPT_COST
            )));
        }

        Ok(())
    }
}

/// Load settings from an optional `configuration` file, overridden by
/// `APP__SECTION__KEY` environment variables, then validate them.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}
