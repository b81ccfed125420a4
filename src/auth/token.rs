//! Bearer tokens and the credential gate.
//!
//! A [`Credential`] is the explicit object a transport layer builds from an incoming
//! request. [`TokenService::authenticate`] turns it into the [`Scope`] every core
//! operation takes; nothing here reads global state.

use crate::{
    core::scope::Scope,
    entities::{Role, user},
    errors::{Error, Result},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Claims carried by an issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    /// Role at the time of issue
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// A bearer token presented by a caller.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Extracts the token from an `Authorization: Bearer <token>` header value.
    ///
    /// # Errors
    /// [`Error::InvalidToken`] when the scheme is missing or the token is empty.
    pub fn from_bearer_header(header: &str) -> Result<Self> {
        header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(Self::new)
            .ok_or_else(|| {
                Error::InvalidToken(jsonwebtoken::errors::ErrorKind::InvalidToken.into())
            })
    }

    /// The raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(..)")
    }
}

/// Issues and validates HS256 tokens signed with a shared secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_minutes: i64,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl_minutes", &self.ttl_minutes)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Creates a token service from a secret.
    ///
    /// # Errors
    /// [`Error::Config`] if the secret is empty.
    pub fn new(secret: &str, ttl_minutes: i64) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::Config {
                message: "JWT secret must not be empty".to_string(),
            });
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_minutes,
        })
    }

    /// Issues a token for the user.
    pub fn issue(&self, user: &user::Model) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            role: user.role,
            exp: (now + Duration::minutes(self.ttl_minutes)).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(Error::InvalidToken)
    }

    /// Validates a token and returns its claims.
    ///
    /// # Errors
    /// [`Error::InvalidToken`] for a bad signature, malformed token or expired token.
    pub fn validate(&self, credential: &Credential) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(credential.as_str(), &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(Error::InvalidToken)
    }

    /// The credential gate: validates the token and yields the caller's scope.
    pub fn authenticate(&self, credential: &Credential) -> Result<Scope> {
        let claims = self.validate(credential)?;
        debug!(user_id = claims.sub, role = ?claims.role, "Authenticated");
        Ok(Scope::new(claims.sub, claims.role))
    }
}
