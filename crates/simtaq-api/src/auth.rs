//! Session tokens and password hashing.
//!
//! A session is an HS256 JWT carried in the `simtaq_session` cookie (or a
//! Bearer header). Passwords and recovery codes are stored as Argon2id hashes.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use simtaq_common::{
    credentials::normalize_recovery_code,
    error::SimtaqError,
    models::user::{Role, User},
};
use uuid::Uuid;

/// JWT claims embedded in session tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub username: String,
    /// Display name, so pages can greet the user without a lookup.
    pub name: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against an Argon2id hash. Malformed hashes never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Hash on the blocking pool; Argon2 is deliberately slow.
pub async fn hash_password_async(password: String) -> Result<String, SimtaqError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(SimtaqError::internal)?
        .map_err(SimtaqError::internal)
}

pub async fn verify_password_async(password: String, hash: String) -> Result<bool, SimtaqError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(SimtaqError::internal)
}

/// Recovery codes are compared after normalisation, so `abcd-efgh-jkmn ` still matches.
pub fn hash_recovery_code(code: &str) -> Result<String, argon2::password_hash::Error> {
    hash_password(&normalize_recovery_code(code))
}

pub fn verify_recovery_code(code: &str, hash: &str) -> bool {
    verify_password(&normalize_recovery_code(code), hash)
}

/// Generate a session token for a user.
pub fn generate_session_token(
    user: &User,
    secret: &str,
    ttl_secs: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        name: user.name.clone(),
        role: user.role,
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_secs as i64)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Validate and decode a session token.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, SimtaqError> {
        self.sub.parse().map_err(|_| SimtaqError::InvalidToken)
    }
}

/// Map a JWT failure to the client-facing error.
pub fn token_error(err: jsonwebtoken::errors::Error) -> SimtaqError {
    match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => SimtaqError::TokenExpired,
        _ => SimtaqError::InvalidToken,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::now_v7(),
            username: "12345".into(),
            name: "Aisyah Putri".into(),
            email: None,
            password_hash: String::new(),
            role,
            is_active: true,
            recovery_code_hash: None,
            recovery_code_created_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("2010-05-17").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("2010-05-17", &hash));
        assert!(!verify_password("17052010", &hash));
        assert!(!verify_password("anything", "not-a-hash"));
    }

    #[test]
    fn recovery_code_is_normalised() {
        let hash = hash_recovery_code("ABCD-EFGH-JKMN").unwrap();
        assert!(verify_recovery_code(" abcd-efgh-jkmn ", &hash));
        assert!(!verify_recovery_code("ABCD-EFGH-JKMP", &hash));
    }

    #[test]
    fn session_token_roundtrip() {
        let u = user(Role::OrangTua);
        let token = generate_session_token(&u, "secret", 60).unwrap();
        let claims = validate_token(&token, "secret").unwrap();
        assert_eq!(claims.user_id().unwrap(), u.id);
        assert_eq!(claims.role, Role::OrangTua);
        assert_eq!(claims.name, "Aisyah Putri");
        assert!(validate_token(&token, "other").is_err());
    }

    #[test]
    fn expired_token_maps_to_token_expired() {
        let u = user(Role::Guru);
        let now = Utc::now();
        let claims = Claims {
            sub: u.id.to_string(),
            username: u.username.clone(),
            name: u.name.clone(),
            role: u.role,
            iat: (now - Duration::hours(3)).timestamp(),
            exp: (now - Duration::hours(2)).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"k")).unwrap();
        let err = validate_token(&token, "k").unwrap_err();
        assert!(matches!(token_error(err), SimtaqError::TokenExpired));
    }
}
