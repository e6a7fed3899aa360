use crate::configuration::PasswordHashingSettings;
use crate::telemetry::spawn_blocking_with_tracing;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use secrecy::{ExposeSecret, Secret};

use anyhow::Context;

#[derive(thiserror::Error, Debug)]
pub enum VaultError {
    #[error("Malformed password record")]
    MalformedRecord(#[source] anyhow::Error),
    #[error("Password is longer than the hashing algorithm accepts ({0} bytes)")]
    PasswordTooLong(usize),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Bcrypt,
    Argon2,
}

impl HashAlgorithm {
    fn detect(record: &str) -> Option<Self> {
        const BCRYPT_PREFIXES: [&str; 4] = ["$2a$", "$2b$", "$2x$", "$2y$"];
        if BCRYPT_PREFIXES.iter().any(|prefix| record.starts_with(prefix)) {
            Some(Self::Bcrypt)
        } else if record.starts_with("$argon2") {
            Some(Self::Argon2)
        } else {
            None
        }
    }
}

/// A stored, self-describing password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordRecord {
    algorithm: HashAlgorithm,
    encoded: String,
}

impl PasswordRecord {
    pub fn parse(record: String) -> Result<PasswordRecord, VaultError> {
        let algorithm = HashAlgorithm::detect(&record).ok_or_else(|| {
            VaultError::MalformedRecord(anyhow::anyhow!("Unknown password hash algorithm tag"))
        })?;
        Ok(Self {
            algorithm,
            encoded: record,
        })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

impl AsRef<str> for PasswordRecord {
    fn as_ref(&self) -> &str {
        &self.encoded
    }
}

#[derive(Debug, Clone, Default)]
pub struct PasswordVault {
    settings: PasswordHashingSettings,
}

impl PasswordVault {
    pub fn new(settings: PasswordHashingSettings) -> Self {
        Self { settings }
    }

    #[tracing::instrument(name = "Hash password", skip(self, password))]
    pub async fn hash(&self, password: Secret<String>) -> Result<PasswordRecord, VaultError> {
        let settings = self.settings.clone();
        spawn_blocking_with_tracing(move || compute_password_hash(&settings, password))
            .await
            .context("Password hashing task failed")?
    }

    /// `Ok(false)` on a mismatch; errors are reserved for records that
    /// cannot be parsed by their own algorithm.
    #[tracing::instrument(name = "Verify password", skip(self, password, record))]
    pub async fn verify(
        &self,
        password: Secret<String>,
        record: &PasswordRecord,
    ) -> Result<bool, VaultError> {
        let record = record.clone();
        spawn_blocking_with_tracing(move || verify_password_hash(&record, password))
            .await
            .context("Password verification task failed")?
    }

    pub fn hash_blocking(&self, password: Secret<String>) -> Result<PasswordRecord, VaultError> {
        compute_password_hash(&self.settings, password)
    }

    pub fn verify_blocking(
        &self,
        password: Secret<String>,
        record: &PasswordRecord,
    ) -> Result<bool, VaultError> {
        verify_password_hash(record, password)
    }
}

fn compute_password_hash(
    settings: &PasswordHashingSettings,
    password: Secret<String>,
) -> Result<PasswordRecord, VaultError> {
    let encoded = match *settings {
        PasswordHashingSettings::Bcrypt { cost } => {
            match bcrypt::non_truncating_hash(password.expose_secret(), cost) {
                Ok(encoded) => encoded,
                Err(bcrypt::BcryptError::Truncation(length)) => {
                    return Err(VaultError::PasswordTooLong(length))
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context("Failed to hash password")
                        .into())
                }
            }
        }
        PasswordHashingSettings::Argon2id {
            memory_kib,
            iterations,
            parallelism,
        } => {
            let salt = SaltString::generate(&mut rand::thread_rng());
            let params = Params::new(memory_kib, iterations, parallelism, None)
                .context("Invalid argon2 parameters")?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password(password.expose_secret().as_bytes(), &salt)
                .context("Failed to hash password")?
                .to_string()
        }
    };
    PasswordRecord::parse(encoded)
}

fn verify_password_hash(
    record: &PasswordRecord,
    password_candidate: Secret<String>,
) -> Result<bool, VaultError> {
    tracing::info_span!("Verify password hash").in_scope(|| match record.algorithm {
        // A candidate bcrypt would truncate can never match a record we produced.
        HashAlgorithm::Bcrypt => {
            let candidate = password_candidate.expose_secret();
            match bcrypt::non_truncating_verify(candidate, &record.encoded) {
                Ok(matches) => Ok(matches),
                Err(bcrypt::BcryptError::Truncation(_)) => Ok(false),
                Err(e) => Err(VaultError::MalformedRecord(
                    anyhow::Error::new(e).context("Unable to parse bcrypt record"),
                )),
            }
        }
        HashAlgorithm::Argon2 => {
            let password_hash = PasswordHash::new(&record.encoded)
                .context("Unable to parse argon2 record")
                .map_err(VaultError::MalformedRecord)?;
            match Argon2::default()
                .verify_password(password_candidate.expose_secret().as_bytes(), &password_hash)
            {
                Ok(()) => Ok(true),
                Err(argon2::password_hash::Error::Password) => Ok(false),
                Err(e) => Err(VaultError::MalformedRecord(
                    anyhow::Error::new(e).context("Unable to verify argon2 record"),
                )),
            }
        }
    })
}
