use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordVerifier, SaltString},
    Argon2, PasswordHasher,
};
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    api_docs::{AuthResponse, ErrorResponse, MessageResponse, RegisterResponse},
    auth::jwt,
    entities::user::{
        self, is_valid_cefr_level, AccountState, EmailRequest, LoginRequest,
        ReactivateAccountRequest, RegisterRequest, ResetPasswordRequest, UserDTO, UserRole,
        VerifyAccountRequest,
    },
    handlers::{db_error, error, validation_error},
    services::{notification_service, user_service},
};

fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn redirect_url_for(rol: &UserRole) -> &'static str {
    match rol {
        UserRole::Alumno => "/dashboard-estudiante.html",
        UserRole::Profesor => "/dashboard-profesor.html",
        UserRole::Admin => "/dashboard-admin.html",
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/registro",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Usuario registrado, pendiente de verificación", body = RegisterResponse),
        (status = 400, description = "Datos inválidos o correo duplicado", body = ErrorResponse),
        (status = 500, description = "Error del servidor", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn register(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<RegisterRequest>,
) -> Response {
    // Validate input
    if let Err(errors) = payload.validate() {
        return validation_error(errors);
    }

    if let Some(nivel) = &payload.nivel_actual {
        if !is_valid_cefr_level(nivel) {
            return error(StatusCode::BAD_REQUEST, "Nivel inválido para estudiante");
        }
    }

    // Check if email already exists
    match user_service::find_by_email(db.as_ref(), &payload.correo).await {
        Ok(Some(_)) => {
            return error(StatusCode::BAD_REQUEST, "El correo ya está registrado");
        }
        Err(e) => return db_error(e),
        _ => {}
    }

    // Hash password
    let password_hash = match hash_password(&payload.password) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("Password hashing error: {:?}", e);
            return error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error interno del servidor en el registro",
            );
        }
    };

    let codigo = jwt::generate_verification_code();

    // Insert the user plus its profile row in one transaction
    let usuario = match user_service::create_user(db.as_ref(), payload, password_hash, codigo.clone())
        .await
    {
        Ok(usuario) => usuario,
        Err(e) => return db_error(e),
    };

    // Best-effort verification email; registration succeeds even if delivery
    // fails, the code can be re-sent later
    let correo = usuario.correo.clone();
    let nombre = usuario.nombre.clone();
    tokio::spawn(async move {
        if let Err(e) = notification_service::send_verification_code(&correo, &codigo, &nombre).await
        {
            tracing::error!("Failed to send verification email to {}: {}", correo, e);
        }
    });

    (
        StatusCode::CREATED,
        Json(RegisterResponse {
            mensaje: "Usuario registrado exitosamente. Por favor verifica tu email.".to_string(),
            usuario: UserDTO::from(usuario),
            verificacion_requerida: true,
        }),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/api/auth/verificar",
    tag = "auth",
    request_body = VerifyAccountRequest,
    responses(
        (status = 200, description = "Cuenta verificada, sesión iniciada", body = AuthResponse),
        (status = 400, description = "Código incorrecto, expirado o usuario ya verificado", body = ErrorResponse),
        (status = 500, description = "Error del servidor", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn verify_account(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<VerifyAccountRequest>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation_error(errors);
    }

    let usuario = match user_service::find_by_email(db.as_ref(), &payload.correo).await {
        Ok(Some(usuario))
            if AccountState::from(usuario.estado_cuenta.clone())
                == AccountState::PendienteVerificacion =>
        {
            usuario
        }
        Ok(_) => {
            return error(
                StatusCode::BAD_REQUEST,
                "Usuario no encontrado o ya verificado",
            );
        }
        Err(e) => return db_error(e),
    };

    // Expired codes are rotated and re-sent instead of leaving the account stuck
    let expirado = usuario
        .expira_verificacion
        .map(|exp| Utc::now() > exp)
        .unwrap_or(true);
    if expirado {
        let nombre = usuario.nombre.clone();
        let correo = usuario.correo.clone();
        let (_, nuevo_codigo) = match user_service::rotate_verification_code(db.as_ref(), usuario).await
        {
            Ok(result) => result,
            Err(e) => return db_error(e),
        };

        if let Err(e) =
            notification_service::send_verification_code(&correo, &nuevo_codigo, &nombre).await
        {
            tracing::error!("Failed to re-send verification email to {}: {}", correo, e);
        }

        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Código expirado. Se ha enviado un nuevo código a tu email.",
                "nuevo_codigo_enviado": true
            })),
        )
            .into_response();
    }

    if usuario.codigo_verificacion.as_deref() != Some(payload.codigo.as_str()) {
        return error(StatusCode::BAD_REQUEST, "Código de verificación incorrecto");
    }

    let usuario = match user_service::mark_verified(db.as_ref(), usuario).await {
        Ok(usuario) => usuario,
        Err(e) => return db_error(e),
    };

    let rol = UserRole::from(usuario.rol.clone());
    let token = match jwt::create_token(usuario.id, &usuario.correo, &rol) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to generate JWT token: {:?}", e);
            return error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error al generar token de autenticación",
            );
        }
    };

    (
        StatusCode::OK,
        Json(AuthResponse {
            mensaje: "Cuenta verificada exitosamente".to_string(),
            token,
            usuario: UserDTO::from(usuario),
            redirect_url: None,
        }),
    )
        .into_response()
}

#[axum::debug_handler]
pub async fn resend_verification(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<EmailRequest>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation_error(errors);
    }

    let usuario = match user_service::find_by_email(db.as_ref(), &payload.correo).await {
        Ok(Some(usuario))
            if AccountState::from(usuario.estado_cuenta.clone())
                == AccountState::PendienteVerificacion =>
        {
            usuario
        }
        Ok(_) => {
            return error(
                StatusCode::BAD_REQUEST,
                "Usuario no encontrado o ya verificado",
            );
        }
        Err(e) => return db_error(e),
    };

    let nombre = usuario.nombre.clone();
    let correo = usuario.correo.clone();
    let (_, codigo) = match user_service::rotate_verification_code(db.as_ref(), usuario).await {
        Ok(result) => result,
        Err(e) => return db_error(e),
    };

    if let Err(e) = notification_service::send_verification_code(&correo, &codigo, &nombre).await {
        tracing::error!("Failed to send verification email to {}: {}", correo, e);
        return error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Error enviando email de verificación",
        );
    }

    Json(MessageResponse::new(
        "Se ha enviado un nuevo código de verificación a tu email",
    ))
    .into_response()
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Sesión iniciada", body = AuthResponse),
        (status = 400, description = "Datos inválidos", body = ErrorResponse),
        (status = 401, description = "Credenciales inválidas o cuenta no activa", body = ErrorResponse),
        (status = 500, description = "Error del servidor", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn login(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<LoginRequest>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation_error(errors);
    }

    let mut usuario = match user_service::find_by_email(db.as_ref(), &payload.correo).await {
        Ok(Some(usuario)) => usuario,
        Ok(None) => return error(StatusCode::UNAUTHORIZED, "Credenciales inválidas"),
        Err(e) => return db_error(e),
    };

    // Account state gates run before the password check: a blocked account
    // answers 401 no matter what the password is
    match AccountState::from(usuario.estado_cuenta.clone()) {
        AccountState::Bloqueado => {
            return error(
                StatusCode::UNAUTHORIZED,
                "Cuenta bloqueada. Contacta al administrador.",
            );
        }
        AccountState::PendienteVerificacion => {
            return error(
                StatusCode::UNAUTHORIZED,
                "Cuenta pendiente de verificación. Revisa tu email.",
            );
        }
        AccountState::Desactivado => {
            let ventana_vigente = usuario
                .reactivar_hasta
                .map(|hasta| hasta > Utc::now())
                .unwrap_or(false);

            if !ventana_vigente {
                return error(
                    StatusCode::UNAUTHORIZED,
                    "Cuenta desactivada y fuera de ventana de reactivación.",
                );
            }

            if !verify_password(&payload.password, &usuario.contrasena_hash) {
                return error(StatusCode::UNAUTHORIZED, "Credenciales inválidas");
            }

            // A login inside the window re-activates the account
            usuario = match user_service::reactivate(db.as_ref(), usuario).await {
                Ok(usuario) => usuario,
                Err(e) => return db_error(e),
            };
        }
        AccountState::Activo => {
            if !verify_password(&payload.password, &usuario.contrasena_hash) {
                return error(StatusCode::UNAUTHORIZED, "Credenciales inválidas");
            }
        }
    }

    let usuario = match user_service::touch_last_access(db.as_ref(), usuario).await {
        Ok(usuario) => usuario,
        Err(e) => return db_error(e),
    };

    let rol = UserRole::from(usuario.rol.clone());
    let token = match jwt::create_token(usuario.id, &usuario.correo, &rol) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to generate JWT token: {:?}", e);
            return error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error al generar token de autenticación",
            );
        }
    };

    (
        StatusCode::OK,
        Json(AuthResponse {
            mensaje: "Login exitoso".to_string(),
            token,
            usuario: UserDTO::from(usuario),
            redirect_url: Some(redirect_url_for(&rol).to_string()),
        }),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/api/auth/recuperar-contrasena",
    tag = "auth",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Respuesta neutral; se envía email si la cuenta existe", body = MessageResponse),
        (status = 500, description = "Error del servidor", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn request_password_recovery(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<EmailRequest>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation_error(errors);
    }

    // The response never reveals whether the address is registered
    let neutral = MessageResponse::new("Si el email existe, se enviarán instrucciones de recuperación");

    let usuario = match user_service::find_by_email(db.as_ref(), &payload.correo).await {
        Ok(Some(usuario))
            if AccountState::from(usuario.estado_cuenta.clone()) == AccountState::Activo =>
        {
            usuario
        }
        Ok(_) => return Json(neutral).into_response(),
        Err(e) => return db_error(e),
    };

    let correo = usuario.correo.clone();
    let nombre = usuario.nombre.clone();
    let token = match user_service::set_recovery_token(db.as_ref(), usuario).await {
        Ok(token) => token,
        Err(e) => return db_error(e),
    };

    if let Err(e) = notification_service::send_password_recovery(&correo, &token, &nombre).await {
        tracing::error!("Failed to send recovery email to {}: {}", correo, e);
        return error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Error enviando email de recuperación",
        );
    }

    Json(neutral).into_response()
}

#[utoipa::path(
    post,
    path = "/api/auth/restablecer-contrasena",
    tag = "auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Contraseña restablecida", body = MessageResponse),
        (status = 400, description = "Token inválido o expirado", body = ErrorResponse),
        (status = 500, description = "Error del servidor", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn reset_password(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation_error(errors);
    }

    let usuario =
        match user_service::find_by_valid_recovery_token(db.as_ref(), &payload.token).await {
            Ok(Some(usuario)) => usuario,
            Ok(None) => return error(StatusCode::BAD_REQUEST, "Token inválido o expirado"),
            Err(e) => return db_error(e),
        };

    let password_hash = match hash_password(&payload.nueva_contrasena) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("Password hashing error: {:?}", e);
            return error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error al restablecer contraseña",
            );
        }
    };

    if let Err(e) = user_service::reset_password(db.as_ref(), usuario, password_hash).await {
        return db_error(e);
    }

    Json(MessageResponse::new("Contraseña restablecida exitosamente")).into_response()
}

#[axum::debug_handler]
pub async fn get_profile(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
) -> Response {
    let mut perfil = match serde_json::to_value(&usuario) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => return error(StatusCode::INTERNAL_SERVER_ERROR, "Error del servidor"),
    };

    match UserRole::from(usuario.rol.clone()) {
        UserRole::Alumno => {
            match user_service::find_student_profile(db.as_ref(), usuario.id).await {
                Ok(Some(datos)) => {
                    perfil.insert("datos_estudiante".to_string(), json!(datos));
                }
                Ok(None) => {}
                Err(e) => return db_error(e),
            }
        }
        UserRole::Profesor | UserRole::Admin => {
            match user_service::find_teacher_profile(db.as_ref(), usuario.id).await {
                Ok(Some(datos)) => {
                    perfil.insert("datos_profesor".to_string(), json!(datos));
                }
                Ok(None) => {}
                Err(e) => return db_error(e),
            }
        }
    }

    Json(json!({ "usuario": perfil })).into_response()
}

#[axum::debug_handler]
pub async fn verify_token(Extension(usuario): Extension<user::Model>) -> Response {
    Json(json!({
        "usuario": UserDTO::from(usuario),
        "token_valido": true
    }))
    .into_response()
}

#[axum::debug_handler]
pub async fn logout(Extension(usuario): Extension<user::Model>) -> Response {
    // Stateless JWT: the client discards the token, the server only logs it
    tracing::info!("User {} ({}) logged out", usuario.id, usuario.correo);
    Json(MessageResponse::new("Sesión cerrada exitosamente")).into_response()
}

#[axum::debug_handler]
pub async fn deactivate_account(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
) -> Response {
    match user_service::deactivate(db.as_ref(), usuario, false).await {
        Ok(actualizado) => Json(json!({
            "success": true,
            "mensaje": "Cuenta desactivada. Puedes reactivarla dentro de 30 días iniciando sesión de nuevo.",
            "reactivar_hasta": actualizado.reactivar_hasta
        }))
        .into_response(),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn delete_account(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
) -> Response {
    match user_service::deactivate(db.as_ref(), usuario, true).await {
        Ok(actualizado) => Json(json!({
            "success": true,
            "mensaje": "Cuenta marcada para eliminación. Puedes reactivarla dentro de 30 días iniciando sesión.",
            "reactivar_hasta": actualizado.reactivar_hasta
        }))
        .into_response(),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn reactivate_account(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<ReactivateAccountRequest>,
) -> Response {
    if let Err(errors) = payload.validate() {
        return validation_error(errors);
    }

    let usuario = match user_service::find_by_email(db.as_ref(), &payload.correo).await {
        Ok(Some(usuario)) => usuario,
        Ok(None) => return error(StatusCode::NOT_FOUND, "Usuario no encontrado"),
        Err(e) => return db_error(e),
    };

    if AccountState::from(usuario.estado_cuenta.clone()) != AccountState::Desactivado {
        return error(StatusCode::BAD_REQUEST, "La cuenta no está desactivada");
    }

    let ventana_vigente = usuario
        .reactivar_hasta
        .map(|hasta| hasta > Utc::now())
        .unwrap_or(false);
    if !ventana_vigente {
        return error(
            StatusCode::BAD_REQUEST,
            "La ventana de reactivación ha expirado",
        );
    }

    if !verify_password(&payload.password, &usuario.contrasena_hash) {
        return error(StatusCode::UNAUTHORIZED, "Credenciales inválidas");
    }

    match user_service::reactivate(db.as_ref(), usuario).await {
        Ok(actualizado) => Json(json!({
            "success": true,
            "mensaje": "Cuenta reactivada correctamente. Ahora puedes iniciar sesión.",
            "usuario_id": actualizado.id
        }))
        .into_response(),
        Err(e) => db_error(e),
    }
}
