use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::{
    entities::feedback::SendFeedbackRequest,
    entities::study_plan::CreatePlanRequest,
    entities::user,
    handlers::{db_error, error, require_teacher_or_admin},
    services::{feedback_service, plan_service, teacher_service},
};

#[derive(Debug, Deserialize)]
pub struct FeedbackListQuery {
    pub estudiante_id: Option<i32>,
    pub leido: Option<bool>,
    pub tipo: Option<String>,
}

#[axum::debug_handler]
pub async fn dashboard(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
) -> Response {
    if let Some(denied) = require_teacher_or_admin(&usuario) {
        return denied;
    }

    let profesor = match teacher_service::teacher_info(db.as_ref(), &usuario).await {
        Ok(Some(info)) => info,
        Ok(None) => {
            return error(
                StatusCode::NOT_FOUND,
                "No se encontró asignación para este profesor",
            );
        }
        Err(e) => return db_error(e),
    };

    let estadisticas = match teacher_service::class_stats(db.as_ref(), usuario.id).await {
        Ok(stats) => stats,
        Err(e) => return db_error(e),
    };

    let top_estudiantes = match teacher_service::assigned_students(db.as_ref(), usuario.id).await {
        Ok(estudiantes) => estudiantes.into_iter().take(5).collect::<Vec<_>>(),
        Err(e) => return db_error(e),
    };

    let retroalimentacion = match feedback_service::teacher_stats(db.as_ref(), usuario.id).await {
        Ok(stats) => stats,
        Err(e) => return db_error(e),
    };

    let planificacion = match plan_service::teacher_stats(db.as_ref(), usuario.id).await {
        Ok(stats) => stats,
        Err(e) => return db_error(e),
    };

    Json(json!({
        "success": true,
        "data": {
            "profesor": profesor,
            "estadisticas": estadisticas,
            "estudiantes_recientes": top_estudiantes,
            "retroalimentacion": retroalimentacion,
            "planificacion": planificacion
        }
    }))
    .into_response()
}

#[axum::debug_handler]
pub async fn students(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
) -> Response {
    if let Some(denied) = require_teacher_or_admin(&usuario) {
        return denied;
    }

    match teacher_service::assigned_students(db.as_ref(), usuario.id).await {
        Ok(estudiantes) => Json(json!({ "success": true, "data": estudiantes })).into_response(),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn send_feedback(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
    Json(payload): Json<SendFeedbackRequest>,
) -> Response {
    if let Some(denied) = require_teacher_or_admin(&usuario) {
        return denied;
    }

    if payload.asunto.trim().is_empty() || payload.mensaje.trim().is_empty() {
        return error(
            StatusCode::BAD_REQUEST,
            "Faltan campos requeridos: estudiante_id, asunto, mensaje",
        );
    }

    if let Some(tipo) = &payload.tipo {
        if !feedback_service::FEEDBACK_TYPES.contains(&tipo.as_str()) {
            return error(
                StatusCode::BAD_REQUEST,
                "Tipo inválido. Usa: general, felicitacion, mejora, alerta",
            );
        }
    }

    match teacher_service::is_student_assigned(db.as_ref(), usuario.id, payload.estudiante_id).await
    {
        Ok(true) => {}
        Ok(false) => {
            return error(
                StatusCode::FORBIDDEN,
                "No tienes permisos para enviar retroalimentación a este estudiante",
            );
        }
        Err(e) => return db_error(e),
    }

    match feedback_service::create(db.as_ref(), usuario.id, payload).await {
        Ok(retroalimentacion) => Json(json!({
            "success": true,
            "mensaje": "Retroalimentación enviada correctamente",
            "data": { "id": retroalimentacion.id }
        }))
        .into_response(),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn list_feedback(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
    Query(query): Query<FeedbackListQuery>,
) -> Response {
    if let Some(denied) = require_teacher_or_admin(&usuario) {
        return denied;
    }

    let filters = feedback_service::FeedbackFilters {
        estudiante_id: query.estudiante_id,
        leido: query.leido,
        tipo: query.tipo,
    };

    match feedback_service::list_by_teacher(db.as_ref(), usuario.id, filters).await {
        Ok(retroalimentaciones) => {
            Json(json!({ "success": true, "data": retroalimentaciones })).into_response()
        }
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn create_plan(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
    Json(payload): Json<CreatePlanRequest>,
) -> Response {
    if let Some(denied) = require_teacher_or_admin(&usuario) {
        return denied;
    }

    if payload.titulo.trim().is_empty() {
        return error(
            StatusCode::BAD_REQUEST,
            "Faltan campos requeridos: estudiante_id, titulo",
        );
    }

    match teacher_service::is_student_assigned(db.as_ref(), usuario.id, payload.estudiante_id).await
    {
        Ok(true) => {}
        Ok(false) => {
            return error(
                StatusCode::FORBIDDEN,
                "No tienes permisos para crear un plan para este estudiante",
            );
        }
        Err(e) => return db_error(e),
    }

    match plan_service::create(db.as_ref(), usuario.id, payload).await {
        Ok(plan) => Json(json!({
            "success": true,
            "mensaje": "Plan de estudio creado correctamente",
            "data": { "id": plan.id }
        }))
        .into_response(),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn list_plans(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
) -> Response {
    if let Some(denied) = require_teacher_or_admin(&usuario) {
        return denied;
    }

    match plan_service::list_by_teacher(db.as_ref(), usuario.id).await {
        Ok(planes) => Json(json!({ "success": true, "data": planes })).into_response(),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn lessons(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
) -> Response {
    if let Some(denied) = require_teacher_or_admin(&usuario) {
        return denied;
    }

    match teacher_service::assignment_lessons(db.as_ref(), usuario.id).await {
        Ok(lecciones) => Json(json!({ "success": true, "data": lecciones })).into_response(),
        Err(e) => db_error(e),
    }
}
