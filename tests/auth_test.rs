mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, PaginatorTrait, Set};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use speaklexi_backend::entities::user::{self, AccountState, UserRole};

fn register_body(correo: &str) -> String {
    json!({
        "nombre": "Ana",
        "primer_apellido": "Lopez",
        "correo": correo,
        "password": "secret123"
    })
    .to_string()
}

#[tokio::test]
async fn test_register_creates_pending_account() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let response = app
        .clone()
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/registro",
            register_body("ana@x.com"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = common::parse_json(response.into_body()).await;
    assert_eq!(body["verificacion_requerida"], json!(true));
    assert_eq!(body["usuario"]["rol"], json!("alumno"));

    // The stored row is pending verification with a 6-digit code
    let usuario = user::Entity::find().one(db.as_ref()).await.unwrap().unwrap();
    assert_eq!(usuario.estado_cuenta, "pendiente_verificacion");
    assert_eq!(usuario.codigo_verificacion.as_ref().unwrap().len(), 6);

    // A pending account cannot log in yet
    let response = app
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/login",
            json!({ "correo": "ana@x.com", "password": "secret123" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_duplicate_email_creates_no_row() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let response = app
        .clone()
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/registro",
            register_body("dup@x.com"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/registro",
            register_body("dup@x.com"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let total = user::Entity::find().count(db.as_ref()).await.unwrap();
    assert_eq!(total, 1);
}

#[tokio::test]
async fn test_register_rejects_weak_password() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    // Letters only, no digit
    let response = app
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/registro",
            json!({
                "nombre": "Ana",
                "primer_apellido": "Lopez",
                "correo": "ana@x.com",
                "password": "contrasena"
            })
            .to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let total = user::Entity::find().count(db.as_ref()).await.unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_verification_flow_issues_token() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    app.clone()
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/registro",
            register_body("ana@x.com"),
        ))
        .await
        .unwrap();

    let usuario = user::Entity::find().one(db.as_ref()).await.unwrap().unwrap();
    let codigo = usuario.codigo_verificacion.clone().unwrap();

    // Wrong code is rejected
    let codigo_incorrecto = if codigo == "000000" { "111111" } else { "000000" };
    let response = app
        .clone()
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/verificar",
            json!({ "correo": "ana@x.com", "codigo": codigo_incorrecto }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Correct code activates the account and returns a session token
    let response = app
        .clone()
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/verificar",
            json!({ "correo": "ana@x.com", "codigo": codigo }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = common::parse_json(response.into_body()).await;
    assert!(body["token"].as_str().unwrap().len() > 20);
    assert_eq!(body["usuario"]["rol"], json!("alumno"));

    let usuario = user::Entity::find().one(db.as_ref()).await.unwrap().unwrap();
    assert_eq!(usuario.estado_cuenta, "activo");
    assert!(usuario.correo_verificado);
    assert!(usuario.codigo_verificacion.is_none());

    // Verifying twice fails: the account is no longer pending
    let response = app
        .clone()
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/verificar",
            json!({ "correo": "ana@x.com", "codigo": codigo }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // And login now succeeds
    let response = app
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/login",
            json!({ "correo": "ana@x.com", "password": "secret123" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = common::parse_json(response.into_body()).await;
    assert_eq!(body["redirectUrl"], json!("/dashboard-estudiante.html"));
}

#[tokio::test]
async fn test_login_blocked_account_ignores_password() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let hash = common::hash_password("secret123");
    common::create_test_user(
        db.as_ref(),
        "bloqueado@x.com",
        &hash,
        UserRole::Alumno,
        AccountState::Bloqueado,
    )
    .await
    .unwrap();

    // Even the correct password must not open a blocked account
    let response = app
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/login",
            json!({ "correo": "bloqueado@x.com", "password": "secret123" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_deactivated_outside_window() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let hash = common::hash_password("secret123");
    let usuario = common::create_test_user(
        db.as_ref(),
        "baja@x.com",
        &hash,
        UserRole::Alumno,
        AccountState::Desactivado,
    )
    .await
    .unwrap();

    let mut active = usuario.into_active_model();
    active.reactivar_hasta = Set(Some(Utc::now() - Duration::days(1)));
    active.update(db.as_ref()).await.unwrap();

    let response = app
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/login",
            json!({ "correo": "baja@x.com", "password": "secret123" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_deactivated_inside_window_reactivates() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let hash = common::hash_password("secret123");
    let usuario = common::create_test_user(
        db.as_ref(),
        "vuelve@x.com",
        &hash,
        UserRole::Alumno,
        AccountState::Desactivado,
    )
    .await
    .unwrap();
    let usuario_id = usuario.id;

    let mut active = usuario.into_active_model();
    active.reactivar_hasta = Set(Some(Utc::now() + Duration::days(10)));
    active.update(db.as_ref()).await.unwrap();

    let response = app
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/login",
            json!({ "correo": "vuelve@x.com", "password": "secret123" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let usuario = user::Entity::find_by_id(usuario_id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(usuario.estado_cuenta, "activo");
    assert!(usuario.reactivar_hasta.is_none());
}

#[tokio::test]
async fn test_reset_password_with_valid_token() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let hash = common::hash_password("Antigua123");
    let usuario = common::create_test_user(
        db.as_ref(),
        "reset@x.com",
        &hash,
        UserRole::Alumno,
        AccountState::Activo,
    )
    .await
    .unwrap();

    let mut active = usuario.into_active_model();
    active.token_recuperacion = Set(Some("tokendeprueba".to_string()));
    active.expira_recuperacion = Set(Some(Utc::now() + Duration::minutes(30)));
    active.update(db.as_ref()).await.unwrap();

    let response = app
        .clone()
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/restablecer-contrasena",
            json!({ "token": "tokendeprueba", "nueva_contrasena": "Nueva1234" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The old password no longer works, the new one does
    let response = app
        .clone()
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/login",
            json!({ "correo": "reset@x.com", "password": "Antigua123" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/login",
            json!({ "correo": "reset@x.com", "password": "Nueva1234" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_reset_password_rejects_expired_or_unknown_token() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let usuario = common::create_test_user(
        db.as_ref(),
        "expirado@x.com",
        "hash",
        UserRole::Alumno,
        AccountState::Activo,
    )
    .await
    .unwrap();

    // Token valid for 1 hour, expired 1 minute ago
    let mut active = usuario.into_active_model();
    active.token_recuperacion = Set(Some("tokenviejo".to_string()));
    active.expira_recuperacion = Set(Some(Utc::now() - Duration::minutes(1)));
    active.update(db.as_ref()).await.unwrap();

    let response = app
        .clone()
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/restablecer-contrasena",
            json!({ "token": "tokenviejo", "nueva_contrasena": "Nueva1234" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(common::create_request(
            Method::POST,
            "/api/auth/restablecer-contrasena",
            json!({ "token": "nuncaexistio", "nueva_contrasena": "Nueva1234" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let response = app
        .clone()
        .oneshot(common::create_request(Method::GET, "/api/auth/perfil", ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(common::create_authorized_request(
            Method::GET,
            "/api/auth/perfil",
            "not.a.jwt",
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deactivated_user_token_is_rejected() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let usuario = common::create_test_student(db.as_ref(), "fuera@x.com", "A1", "Inglés")
        .await
        .unwrap();
    let token = common::create_test_token(&usuario);

    // Token works while the account is active
    let response = app
        .clone()
        .oneshot(common::create_authorized_request(
            Method::GET,
            "/api/auth/perfil",
            &token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Deactivate the account behind the still-valid token
    let mut active = usuario.into_active_model();
    active.estado_cuenta = Set(AccountState::Desactivado.as_str().to_string());
    active.update(db.as_ref()).await.unwrap();

    let response = app
        .oneshot(common::create_authorized_request(
            Method::GET,
            "/api/auth/perfil",
            &token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
