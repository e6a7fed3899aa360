//! src/authentication/mod.rs
mod middleware;
mod password;
mod token;
pub use middleware::{reject_unauthenticated, AuthenticatedClaims};
pub use password::{HashAlgorithm, PasswordRecord, PasswordVault, VaultError};
pub use token::{
    extract_bearer_token, Claims, Clock, Rejection, SystemClock, Token, TokenAuthority,
    TokenError, TOKEN_TTL_DAYS,
};
