use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::configuration::{AuthSettings, MissingSigningSecret};

/// Claims carried by a token, opaque beyond being JSON.
pub type Claims = serde_json::Map<String, serde_json::Value>;

/// Lifetime of every issued token. Not configurable.
pub const TOKEN_TTL_DAYS: i64 = 30;

const RESERVED_CLAIMS: [&str; 2] = ["iat", "exp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a token was refused. Only ever logged, callers reject uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Malformed,
    BadSignature,
    Expired,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Rejection::Malformed => "malformed",
            Rejection::BadSignature => "bad_signature",
            Rejection::Expired => "expired",
        };
        f.write_str(reason)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    #[error("Invalid Credentials")]
    InvalidCredential(Rejection, #[source] anyhow::Error),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl TokenError {
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            TokenError::InvalidCredential(reason, _) => Some(*reason),
            TokenError::UnexpectedError(_) => None,
        }
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Serialize, Deserialize)]
struct SignedPayload {
    #[serde(flatten)]
    claims: Claims,
    iat: i64,
    exp: i64,
}

pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenAuthority {
    pub fn new(signing_secret: &Secret<String>) -> Self {
        Self::with_clock(signing_secret, Arc::new(SystemClock))
    }

    pub fn with_clock(signing_secret: &Secret<String>, clock: Arc<dyn Clock>) -> Self {
        let secret = signing_secret.expose_secret().as_bytes();

        // Expiry is checked against our own clock, not jsonwebtoken's.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            clock,
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Result<Self, MissingSigningSecret> {
        Ok(Self::new(&settings.signing_secret()?))
    }

    /// Signs `claims` into a token valid for [`TOKEN_TTL_DAYS`] from now.
    ///
    /// `claims` must serialize to a JSON object that does not use the
    /// reserved `iat` or `exp` names.
    #[tracing::instrument(name = "Issue token", skip(self, claims))]
    pub fn issue<C: Serialize>(&self, claims: &C) -> Result<Token, TokenError> {
        let claims = match serde_json::to_value(claims).context("Unable to serialize claims")? {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(anyhow::anyhow!("Claims must be a JSON object, got {}", other).into())
            }
        };
        if let Some(reserved) = RESERVED_CLAIMS.iter().find(|name| claims.contains_key(**name)) {
            return Err(anyhow::anyhow!("Claim name '{}' is reserved", reserved).into());
        }

        let issued_at = self.clock.now();
        let payload = SignedPayload {
            claims,
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };

        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &self.encoding_key,
        )
        .context("Failed to sign token")?;
        Ok(Token(token))
    }

    #[tracing::instrument(name = "Verify token", skip(self, token))]
    pub fn verify(&self, token: &Token) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<SignedPayload>(
            token.as_ref(),
            &self.decoding_key,
            &self.validation,
        )
        .map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::InvalidSignature => Rejection::BadSignature,
                ErrorKind::ExpiredSignature => Rejection::Expired,
                _ => Rejection::Malformed,
            };
            TokenError::InvalidCredential(reason, anyhow::Error::new(e))
        })?;

        let now = self.clock.now().timestamp();
        if now >= data.claims.exp {
            return Err(TokenError::InvalidCredential(
                Rejection::Expired,
                anyhow::anyhow!("Token expired at {}, now is {}", data.claims.exp, now),
            ));
        }

        Ok(data.claims.claims)
    }

    /// Verifies `token` and reads its claims into `T`.
    pub fn verify_as<T: DeserializeOwned>(&self, token: &Token) -> Result<T, TokenError> {
        let claims = self.verify(token)?;
        serde_json::from_value(serde_json::Value::Object(claims))
            .context("Verified claims do not match the requested shape")
            .map_err(|e| TokenError::InvalidCredential(Rejection::Malformed, e))
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn extract_bearer_token(header_value: Option<&str>) -> Option<Token> {
    let parts: Vec<&str> = header_value?.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] => Some(Token::new(*token)),
        _ => None,
    }
}
