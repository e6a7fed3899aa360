use config::{ConfigError, File};
use secrecy::{ExposeSecret, Secret};
use serde_aux::field_attributes::deserialize_number_from_string;

/// Publicly known signing secret, only ever used when
/// `auth.allow_insecure_default_secret` is switched on.
pub const INSECURE_DEFAULT_SIGNING_SECRET: &str = "default_secret_key";

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub auth: AuthSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct AuthSettings {
    pub signing_secret: Option<Secret<String>>,
    #[serde(default)]
    pub allow_insecure_default_secret: bool,
    #[serde(default)]
    pub password_hashing: PasswordHashingSettings,
}

#[derive(serde::Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "algorithm", rename_all = "lowercase")]
pub enum PasswordHashingSettings {
    Bcrypt {
        #[serde(deserialize_with = "deserialize_number_from_string")]
        cost: u32,
    },
    Argon2id {
        #[serde(deserialize_with = "deserialize_number_from_string")]
        memory_kib: u32,
        #[serde(deserialize_with = "deserialize_number_from_string")]
        iterations: u32,
        #[serde(deserialize_with = "deserialize_number_from_string")]
        parallelism: u32,
    },
}

impl Default for PasswordHashingSettings {
    fn default() -> Self {
        Self::Bcrypt { cost: 10 }
    }
}

#[derive(thiserror::Error, Debug)]
#[error(
    "No token signing secret configured. \
    Set APP_AUTH__SIGNING_SECRET or JWT_SECRET"
)]
pub struct MissingSigningSecret;

impl AuthSettings {
    /// Resolves the secret used to sign and verify tokens.
    ///
    /// Falls back to [`INSECURE_DEFAULT_SIGNING_SECRET`] only when the
    /// environment opted in; otherwise a missing or blank secret is an error.
    pub fn signing_secret(&self) -> Result<Secret<String>, MissingSigningSecret> {
        match &self.signing_secret {
            Some(secret) if !secret.expose_secret().trim().is_empty() => Ok(secret.clone()),
            _ if self.allow_insecure_default_secret => {
                tracing::warn!(
                    "No signing secret configured, falling back to the publicly known default. \
                    Tokens issued by this process can be forged"
                );
                Ok(Secret::new(INSECURE_DEFAULT_SIGNING_SECRET.to_string()))
            }
            _ => Err(MissingSigningSecret),
        }
    }
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| ConfigError::Foreign(Box::new(e)))?;
    let config_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(ConfigError::Message)?;

    let env_file_name = format!("{}.yaml", environment.as_str());

    // Later sources win: files, then APP_* variables, then the bare JWT_SECRET.
    let config = config::Config::builder()
        .add_source(File::from(config_directory.join("base.yaml")))
        .add_source(File::from(config_directory.join(env_file_name)))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .set_override_option("auth.signing_secret", std::env::var("JWT_SECRET").ok())?
        .build()?;

    config.try_deserialize::<Settings>()
}

#[derive(Debug)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} not a suppported environment. Use either `local` or `production`",
                other
            )),
        }
    }
}
