#![allow(dead_code)]

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHasher,
};
use axum::{
    body::{to_bytes, Body},
    extract::Extension,
    http::{self, Request},
    Router,
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, DbErr, Set};
use std::{env, sync::Arc};

use speaklexi_backend::{
    auth::jwt,
    entities::{
        lesson, student_profile, teacher_assignment,
        user::{self, AccountState, UserRole},
    },
};

// Define a constant for the body size limit (16MB)
pub const BODY_SIZE_LIMIT: usize = 16 * 1024 * 1024;

/// Sets up the JWT_SECRET environment variable for tests
pub fn setup_jwt_secret() {
    env::set_var("JWT_SECRET", "test_secret_for_tests");
}

/// Creates an in-memory SQLite database for testing
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    setup_jwt_secret();
    let db = Database::connect("sqlite::memory:").await?;
    speaklexi_backend::ensure_schema_exists(&db).await?;
    Ok(db)
}

/// Builds the full API router against the given database
pub fn create_test_app(db: Arc<DatabaseConnection>) -> Router {
    speaklexi_backend::api_router().layer(Extension(db))
}

pub fn hash_password(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .expect("Failed to hash test password")
        .to_string()
}

/// Inserts a user row in the given account state
pub async fn create_test_user(
    db: &DatabaseConnection,
    correo: &str,
    password_hash: &str,
    rol: UserRole,
    estado: AccountState,
) -> Result<user::Model, DbErr> {
    user::ActiveModel {
        nombre: Set("Test".to_string()),
        primer_apellido: Set("User".to_string()),
        segundo_apellido: Set(None),
        correo: Set(correo.to_string()),
        contrasena_hash: Set(password_hash.to_string()),
        rol: Set(rol.as_str().to_string()),
        estado_cuenta: Set(estado.as_str().to_string()),
        correo_verificado: Set(estado == AccountState::Activo),
        fecha_registro: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Active student account plus profile at the given level/language
pub async fn create_test_student(
    db: &DatabaseConnection,
    correo: &str,
    nivel: &str,
    idioma: &str,
) -> Result<user::Model, DbErr> {
    let usuario = create_test_user(db, correo, "hash", UserRole::Alumno, AccountState::Activo).await?;

    student_profile::ActiveModel {
        usuario_id: Set(usuario.id),
        nivel_actual: Set(nivel.to_string()),
        idioma_aprendizaje: Set(idioma.to_string()),
        total_xp: Set(0),
        racha_dias: Set(0),
        ultima_actividad: Set(None),
    }
    .insert(db)
    .await?;

    Ok(usuario)
}

pub async fn set_student_gamification(
    db: &DatabaseConnection,
    usuario_id: i32,
    total_xp: i32,
    racha_dias: i32,
    ultima_actividad: Option<DateTime<Utc>>,
) -> Result<(), DbErr> {
    use sea_orm::{EntityTrait, IntoActiveModel};

    let perfil = student_profile::Entity::find_by_id(usuario_id)
        .one(db)
        .await?
        .expect("student profile missing");
    let mut active = perfil.into_active_model();
    active.total_xp = Set(total_xp);
    active.racha_dias = Set(racha_dias);
    active.ultima_actividad = Set(ultima_actividad);
    active.update(db).await?;
    Ok(())
}

/// Active teacher account with an active level/language assignment
pub async fn create_test_teacher(
    db: &DatabaseConnection,
    correo: &str,
    nivel: &str,
    idioma: &str,
) -> Result<user::Model, DbErr> {
    let usuario =
        create_test_user(db, correo, "hash", UserRole::Profesor, AccountState::Activo).await?;

    teacher_assignment::ActiveModel {
        profesor_id: Set(usuario.id),
        nivel: Set(nivel.to_string()),
        idioma: Set(idioma.to_string()),
        activo: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(usuario)
}

/// Active lesson ready for progress submissions
pub async fn create_test_lesson(
    db: &DatabaseConnection,
    nivel: &str,
    idioma: &str,
    duracion_minutos: i32,
    creado_por: i32,
) -> Result<lesson::Model, DbErr> {
    lesson::ActiveModel {
        titulo: Set(format!("Lección {} de prueba", nivel)),
        descripcion: Set("Lección de prueba".to_string()),
        contenido: Set("Contenido".to_string()),
        nivel: Set(nivel.to_string()),
        idioma: Set(idioma.to_string()),
        duracion_minutos: Set(duracion_minutos),
        orden: Set(0),
        estado: Set(lesson::LESSON_STATE_ACTIVE.to_string()),
        creado_por: Set(creado_por),
        actividades: Set(None),
        creado_en: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Creates a JWT token for testing
pub fn create_test_token(usuario: &user::Model) -> String {
    setup_jwt_secret();
    jwt::create_token(
        usuario.id,
        &usuario.correo,
        &UserRole::from(usuario.rol.clone()),
    )
    .expect("Failed to create test token")
}

/// Creates a test request with authorization header
pub fn create_authorized_request<B>(
    method: http::Method,
    uri: &str,
    token: &str,
    body: B,
) -> Request<Body>
where
    B: Into<Body>,
{
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .header(http::header::AUTHORIZATION, format!("Bearer {}", token))
        .body(body.into())
        .unwrap()
}

/// Creates a test request without authorization
pub fn create_request<B>(method: http::Method, uri: &str, body: B) -> Request<Body>
where
    B: Into<Body>,
{
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .body(body.into())
        .unwrap()
}

/// Helper to parse response body as JSON
pub async fn parse_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
    let bytes = to_bytes(body, BODY_SIZE_LIMIT).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
