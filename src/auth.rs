//! Authentication utilities: JWT access tokens, refresh-token rotation, and
//! password hashing.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Access-token JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id).
    pub sub: String,
    pub email: String,
    /// Issued at (unix timestamp).
    pub iat: usize,
    /// Expiration (unix timestamp).
    pub exp: usize,
}

/// The user identity carried by a validated bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthInfo {
    pub user_id: Uuid,
}

/// Generate a short-lived JWT access token (`ACCESS_TOKEN_TTL_SECONDS`,
/// default 15 min).
pub fn generate_access_token(
    user_id: Uuid,
    email: &str,
    secret: &str,
    ttl_seconds: i64,
) -> Result<String> {
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        iat: now,
        exp: now + ttl_seconds as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Validate a JWT access token and return its claims.
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| anyhow!("invalid token: {e}"))?;

    Ok(token_data.claims)
}

/// Extract the caller's identity from a bearer token's claims.
pub fn auth_info_from_claims(claims: &Claims) -> Result<AuthInfo> {
    let user_id = Uuid::parse_str(&claims.sub).map_err(|e| anyhow!("invalid user id in token: {e}"))?;
    Ok(AuthInfo { user_id })
}

/// Generate an opaque refresh token: 32 random bytes, hex-encoded. The
/// caller only ever sees this raw value; the store keeps `hash_refresh_token`
/// of it.
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 hash of a raw refresh token, for storage/lookup — the raw token
/// itself is never persisted.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| anyhow!("invalid password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-key-for-jwt-at-least-32-bytes-long";

    #[test]
    fn hash_password_produces_valid_hash() {
        let hash = hash_password("my-secure-password").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(hash.len() > 50);
    }

    #[test]
    fn hash_password_differs_each_time() {
        let hash1 = hash_password("same-password").unwrap();
        let hash2 = hash_password("same-password").unwrap();
        assert_ne!(hash1, hash2, "hashes should differ due to random salt");
    }

    #[test]
    fn verify_password_correct() {
        let hash = hash_password("correct-password").unwrap();
        assert!(verify_password("correct-password", &hash).unwrap());
    }

    #[test]
    fn verify_password_incorrect() {
        let hash = hash_password("correct-password").unwrap();
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn verify_password_invalid_hash() {
        assert!(verify_password("any-password", "not-a-valid-hash").is_err());
    }

    #[test]
    fn generate_and_validate_access_token() {
        let user_id = Uuid::new_v4();
        let token = generate_access_token(user_id, "test@example.com", TEST_SECRET, 900).unwrap();

        let claims = validate_access_token(&token, TEST_SECRET).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn validate_access_token_wrong_secret() {
        let user_id = Uuid::new_v4();
        let token = generate_access_token(user_id, "test@example.com", TEST_SECRET, 900).unwrap();
        assert!(validate_access_token(&token, "wrong-secret").is_err());
    }

    #[test]
    fn validate_access_token_malformed() {
        assert!(validate_access_token("not.a.valid.token", TEST_SECRET).is_err());
    }

    #[test]
    fn auth_info_from_claims_parses_user_id() {
        let user_id = Uuid::new_v4();
        let token = generate_access_token(user_id, "test@example.com", TEST_SECRET, 900).unwrap();
        let claims = validate_access_token(&token, TEST_SECRET).unwrap();
        let auth = auth_info_from_claims(&claims).unwrap();
        assert_eq!(auth.user_id, user_id);
    }

    #[test]
    fn refresh_tokens_are_unique_and_hash_deterministically() {
        let a = generate_refresh_token();
        let b = generate_refresh_token();
        assert_ne!(a, b);
        assert_eq!(hash_refresh_token(&a), hash_refresh_token(&a));
        assert_ne!(hash_refresh_token(&a), hash_refresh_token(&b));
    }
}
