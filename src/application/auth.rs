//! Password digests and bearer token handling.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Owning user id.
    pub sub: i64,
    pub login: String,
    /// Expiry as unix seconds.
    pub exp: i64,
}

/// Authenticated caller attached to a request after token verification.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub login: String,
}

/// Issues and verifies HS256 access tokens.
#[derive(Clone)]
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenAuthority {
    pub fn new(secret: &str, token_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: token_ttl,
        }
    }

    pub fn issue(&self, user_id: i64, login: &str) -> Result<String, AuthError> {
        let expires_at = OffsetDateTime::now_utc() + self.ttl;
        let claims = Claims {
            sub: user_id,
            login: login.to_owned(),
            exp: expires_at.unix_timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| AuthError::Signing(err.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid,
            })
    }
}

/// Hex-encoded SHA-256 digest of a password.
pub fn digest_password(plain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plain.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time comparison of a password against a stored digest.
pub fn verify_password(plain: &str, stored_digest: &str) -> bool {
    let hashed_input = digest_password(plain);
    hashed_input
        .as_bytes()
        .ct_eq(stored_digest.as_bytes())
        .unwrap_u8()
        == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn authority() -> TokenAuthority {
        TokenAuthority::new(SECRET, Duration::minutes(30))
    }

    #[test]
    fn digest_matches_known_vector() {
        assert_eq!(
            digest_password("password"),
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
    }

    #[test]
    fn verify_accepts_matching_password() {
        let stored = digest_password("hunter2");
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
    }

    #[test]
    fn issued_token_round_trips() {
        let authority = authority();
        let token = authority.issue(42, "alice").expect("token should issue");
        let claims = authority.verify(&token).expect("token should verify");
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.login, "alice");
        assert!(claims.exp > OffsetDateTime::now_utc().unix_timestamp());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            sub: 42,
            login: "alice".to_owned(),
            exp: (OffsetDateTime::now_utc() - Duration::minutes(10)).unix_timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("token should encode");

        assert!(matches!(authority().verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let other = TokenAuthority::new("other-secret", Duration::minutes(30));
        let token = other.issue(42, "alice").expect("token should issue");
        assert!(matches!(authority().verify(&token), Err(AuthError::Invalid)));
    }
}
