use std::env;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use log::warn;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::db::User;
use crate::error::AccountError;

pub const SECRET_ENV: &str = "JWT_SECRET_KEY";
const TOKEN_TTL_HOURS: i64 = 24;
const GENERATED_SECRET_LEN: usize = 32;

/// Payload of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

/// Signs and checks HS256 access tokens that stay valid for 24 hours.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            ttl: Duration::hours(TOKEN_TTL_HOURS),
        }
    }

    /// Uses `JWT_SECRET_KEY` when set. Otherwise signs with a random secret,
    /// so tokens do not outlive the process.
    pub fn from_env() -> Self {
        match env::var(SECRET_ENV) {
            Ok(secret) if !secret.is_empty() => Self::new(secret.as_bytes()),
            _ => {
                warn!("{SECRET_ENV} is not set; access tokens will not survive a restart");
                let mut secret = [0u8; GENERATED_SECRET_LEN];
                rand::thread_rng().fill_bytes(&mut secret);
                Self::new(&secret)
            }
        }
    }

    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<(String, Claims), AccountError> {
        let claims = Claims {
            user_id: user.id,
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AccountError::TokenSigning(e.to_string()))?;
        Ok((token, claims))
    }

    /// Verify the signature and expiry against the wall clock.
    pub fn decode(&self, token: &str) -> Result<Claims, AccountError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AccountError::TokenExpired,
                _ => AccountError::InvalidToken,
            })
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.decode(token).is_ok()
    }
}
