use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::env;

use crate::entities::user::UserRole;

pub const TOKEN_ISSUER: &str = "SpeakLexi API";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub correo: String,
    pub rol: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("JWT configuration error: {0}")]
    Config(String),
}

pub fn create_token(user_id: i32, correo: &str, rol: &UserRole) -> Result<String, JwtError> {
    let jwt_secret =
        env::var("JWT_SECRET").map_err(|_| JwtError::Config("JWT_SECRET not set".to_string()))?;

    let now = Utc::now();
    let expires_at = now + Duration::hours(1);

    let claims = Claims {
        sub: user_id.to_string(),
        correo: correo.to_string(),
        rol: rol.as_str().to_string(),
        iss: TOKEN_ISSUER.to_string(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(JwtError::Jwt)
}

pub fn validate_token(token: &str) -> Result<Claims, JwtError> {
    let jwt_secret =
        env::var("JWT_SECRET").map_err(|_| JwtError::Config("JWT_SECRET not set".to_string()))?;

    let mut validation = Validation::default();
    validation.set_issuer(&[TOKEN_ISSUER]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(JwtError::Jwt)?;

    Ok(token_data.claims)
}

/// 6-digit numeric code mailed out during account verification.
pub fn generate_verification_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.next_u32() % 1_000_000)
}

/// Opaque 32-byte hex token for password recovery links.
pub fn generate_recovery_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
