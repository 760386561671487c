use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::api_docs::ErrorResponse;
use crate::entities::user::{self, UserRole};

pub mod auth_handler;
pub mod gamification_handler;
pub mod lesson_handler;
pub mod progress_handler;
pub mod stats_handler;
pub mod student_handler;
pub mod teacher_handler;

pub(crate) fn error(status: StatusCode, mensaje: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(mensaje))).into_response()
}

pub(crate) fn validation_error(errors: validator::ValidationErrors) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::with_details(
            "Datos de entrada inválidos",
            errors.to_string(),
        )),
    )
        .into_response()
}

pub(crate) fn db_error(e: sea_orm::DbErr) -> Response {
    tracing::error!("Database error: {:?}", e);
    error(StatusCode::INTERNAL_SERVER_ERROR, "Error del servidor")
}

/// Role gate used by teacher-facing endpoints. `None` means the caller may
/// proceed.
pub(crate) fn require_teacher_or_admin(usuario: &user::Model) -> Option<Response> {
    match UserRole::from(usuario.rol.clone()) {
        UserRole::Profesor | UserRole::Admin => None,
        UserRole::Alumno => Some(error(
            StatusCode::FORBIDDEN,
            "Se requieren permisos de profesor o administrador",
        )),
    }
}

pub(crate) fn require_admin(usuario: &user::Model) -> Option<Response> {
    if UserRole::from(usuario.rol.clone()) == UserRole::Admin {
        None
    } else {
        Some(error(
            StatusCode::FORBIDDEN,
            "Se requieren permisos de administrador",
        ))
    }
}
