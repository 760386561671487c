use std::env;

use speaklexi_backend::{auth::jwt, entities::user::UserRole};

// Set up JWT_SECRET for tests
fn setup_jwt_secret() {
    env::set_var("JWT_SECRET", "test_secret_for_jwt_tests");
}

#[test]
fn test_create_and_validate_token() {
    setup_jwt_secret();

    let token = jwt::create_token(42, "ana@x.com", &UserRole::Alumno).expect("Failed to create token");

    let claims = jwt::validate_token(&token).expect("Failed to validate token");

    assert_eq!(claims.sub, "42");
    assert_eq!(claims.correo, "ana@x.com");
    assert_eq!(claims.rol, "alumno");
    assert_eq!(claims.iss, jwt::TOKEN_ISSUER);

    // Fixed 1 hour expiry
    assert!(claims.iat > 0);
    assert_eq!(claims.exp - claims.iat, 3600);
}

#[test]
fn test_token_expiration() {
    setup_jwt_secret();

    use jsonwebtoken::{encode, EncodingKey, Header};

    // Create an expired token manually
    let jwt_secret = env::var("JWT_SECRET").unwrap();

    let claims = jwt::Claims {
        sub: "7".to_string(),
        correo: "expired@example.com".to_string(),
        rol: UserRole::Alumno.as_str().to_string(),
        iss: jwt::TOKEN_ISSUER.to_string(),
        iat: (chrono::Utc::now() - chrono::Duration::hours(2)).timestamp(),
        exp: (chrono::Utc::now() - chrono::Duration::hours(1)).timestamp(), // Expired 1 hour ago
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .unwrap();

    let result = jwt::validate_token(&token);

    assert!(result.is_err());
}

#[test]
fn test_invalid_token_format() {
    setup_jwt_secret();

    let result = jwt::validate_token("invalid.token.format");

    assert!(result.is_err());
}

#[test]
fn test_token_with_different_roles() {
    setup_jwt_secret();

    let token = jwt::create_token(1, "profe@example.com", &UserRole::Profesor)
        .expect("Failed to create token");
    let claims = jwt::validate_token(&token).expect("Failed to validate token");
    assert_eq!(claims.rol, "profesor");

    let token = jwt::create_token(2, "alumno@example.com", &UserRole::Alumno)
        .expect("Failed to create token");
    let claims = jwt::validate_token(&token).expect("Failed to validate token");
    assert_eq!(claims.rol, "alumno");

    let token = jwt::create_token(3, "admin@example.com", &UserRole::Admin)
        .expect("Failed to create token");
    let claims = jwt::validate_token(&token).expect("Failed to validate token");
    assert_eq!(claims.rol, "admin");
}

#[test]
fn test_verification_code_shape() {
    // 6 numeric digits, always
    for _ in 0..50 {
        let codigo = jwt::generate_verification_code();
        assert_eq!(codigo.len(), 6);
        assert!(codigo.chars().all(|c| c.is_ascii_digit()));
    }
}

#[test]
fn test_recovery_token_shape() {
    let token = jwt::generate_recovery_token();
    // 32 random bytes, hex encoded
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));

    // Two tokens should never collide
    assert_ne!(token, jwt::generate_recovery_token());
}
