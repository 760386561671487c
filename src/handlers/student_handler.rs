use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;

use crate::{
    entities::user,
    handlers::{db_error, error},
    services::{feedback_service, plan_service},
};

#[axum::debug_handler]
pub async fn list_feedback(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
) -> Response {
    let retroalimentaciones =
        match feedback_service::list_by_student(db.as_ref(), usuario.id).await {
            Ok(rows) => rows,
            Err(e) => return db_error(e),
        };

    let no_leidas = match feedback_service::unread_count(db.as_ref(), usuario.id).await {
        Ok(count) => count,
        Err(e) => return db_error(e),
    };

    Json(json!({
        "success": true,
        "data": retroalimentaciones,
        "no_leidas": no_leidas
    }))
    .into_response()
}

#[axum::debug_handler]
pub async fn mark_feedback_read(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
    Path(id): Path<i32>,
) -> Response {
    match feedback_service::mark_read(db.as_ref(), id, usuario.id).await {
        Ok(true) => Json(json!({
            "success": true,
            "mensaje": "Retroalimentación marcada como leída"
        }))
        .into_response(),
        Ok(false) => error(StatusCode::NOT_FOUND, "Retroalimentación no encontrada"),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn list_plans(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
) -> Response {
    match plan_service::list_by_student(db.as_ref(), usuario.id).await {
        Ok(planes) => Json(json!({ "success": true, "data": planes })).into_response(),
        Err(e) => db_error(e),
    }
}
