use axum::{
    extract::{Extension, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::api_docs::ErrorResponse;
use crate::auth::jwt;
use crate::entities::user::AccountState;
use crate::services::user_service;

/// Bearer-token guard. The user row is re-read on every request so revoked or
/// deactivated accounts are rejected even while their token is still valid;
/// the fresh model is stored in the request extensions for handlers.
pub async fn auth_middleware(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    mut request: Request,
    next: Next,
) -> Response {
    // Get authorization header
    let auth_header = match request.headers().get("Authorization") {
        Some(header) => header,
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Token de acceso requerido")),
            )
                .into_response();
        }
    };

    // Parse token from header
    let auth_header_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Cabecera Authorization inválida")),
            )
                .into_response();
        }
    };

    // Extract token from "Bearer {token}"
    let token = match auth_header_str.strip_prefix("Bearer ") {
        Some(token) => token,
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Formato de token inválido")),
            )
                .into_response();
        }
    };

    // Validate token
    let claims = match jwt::validate_token(token) {
        Ok(claims) => claims,
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Token inválido o expirado")),
            )
                .into_response();
        }
    };

    let user_id: i32 = match claims.sub.parse() {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Token inválido o expirado")),
            )
                .into_response();
        }
    };

    // The token may outlive the account: check the row again
    let user = match user_service::find_by_id(db.as_ref(), user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Usuario no encontrado")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Database error during authentication: {:?}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Error en autenticación")),
            )
                .into_response();
        }
    };

    if AccountState::from(user.estado_cuenta.clone()) != AccountState::Activo {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(
                "Cuenta no activa. Verifica tu email o contacta al administrador.",
            )),
        )
            .into_response();
    }

    request.extensions_mut().insert(user);
    next.run(request).await
}
