use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::{
    api_docs::ErrorResponse,
    entities::lesson::{CreateLessonRequest, UpdateLessonRequest},
    entities::lesson_progress::RegisterProgressRequest,
    entities::user::{self, is_valid_cefr_level, UserRole},
    handlers::{db_error, error, require_admin, require_teacher_or_admin},
    services::{
        gamification_service, lesson_service, progress_service, stats_service,
    },
};

#[derive(Debug, Deserialize)]
pub struct ListLessonsQuery {
    pub pagina: Option<u64>,
    pub limite: Option<u64>,
    pub nivel: Option<String>,
    pub idioma: Option<String>,
    pub estado: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/lecciones",
    tag = "lecciones",
    security(("bearer_auth" = [])),
    request_body = CreateLessonRequest,
    responses(
        (status = 201, description = "Lección creada como borrador"),
        (status = 400, description = "Datos inválidos", body = ErrorResponse),
        (status = 403, description = "Solo profesores y administradores", body = ErrorResponse),
        (status = 500, description = "Error del servidor", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn create_lesson(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
    Json(payload): Json<CreateLessonRequest>,
) -> Response {
    if let Some(denied) = require_teacher_or_admin(&usuario) {
        return denied;
    }

    if payload.titulo.trim().is_empty() || payload.idioma.trim().is_empty() {
        return error(
            StatusCode::BAD_REQUEST,
            "Título, nivel e idioma son requeridos",
        );
    }
    if !is_valid_cefr_level(&payload.nivel) {
        return error(
            StatusCode::BAD_REQUEST,
            "Nivel CEFR inválido. Usa: A1, A2, B1, B2, C1, C2",
        );
    }

    match lesson_service::create(db.as_ref(), payload, usuario.id).await {
        Ok(leccion) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "mensaje": "Lección creada exitosamente",
                "data": leccion
            })),
        )
            .into_response(),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn list_all_lessons(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
    Query(query): Query<ListLessonsQuery>,
) -> Response {
    if let Some(denied) = require_admin(&usuario) {
        return denied;
    }

    let filters = lesson_service::LessonFilters {
        nivel: query.nivel,
        idioma: query.idioma,
        estado: query.estado,
    };

    match lesson_service::list_all(
        db.as_ref(),
        filters,
        query.pagina.unwrap_or(1),
        query.limite.unwrap_or(50),
    )
    .await
    {
        Ok((lecciones, paginacion)) => Json(json!({
            "success": true,
            "data": lecciones,
            "paginacion": paginacion
        }))
        .into_response(),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn list_by_level(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Path(nivel): Path<String>,
    Query(query): Query<ListLessonsQuery>,
) -> Response {
    let idioma = match query.idioma {
        Some(idioma) => idioma,
        None => return error(StatusCode::BAD_REQUEST, "El parámetro idioma es requerido"),
    };

    if !is_valid_cefr_level(&nivel) {
        return error(
            StatusCode::BAD_REQUEST,
            "Nivel CEFR inválido. Usa: A1, A2, B1, B2, C1, C2",
        );
    }

    match lesson_service::list_by_level(
        db.as_ref(),
        &nivel,
        &idioma,
        query.pagina.unwrap_or(1),
        query.limite.unwrap_or(10),
    )
    .await
    {
        Ok((lecciones, paginacion)) => Json(json!({
            "success": true,
            "data": lecciones,
            "paginacion": paginacion
        }))
        .into_response(),
        Err(e) => db_error(e),
    }
}

#[utoipa::path(
    get,
    path = "/api/lecciones/{id}",
    tag = "lecciones",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Detalle de la lección"),
        (status = 404, description = "Lección no encontrada", body = ErrorResponse),
        (status = 500, description = "Error del servidor", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn get_lesson(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Path(id): Path<i32>,
) -> Response {
    match lesson_service::find_by_id(db.as_ref(), id).await {
        Ok(Some(leccion)) => Json(json!({ "success": true, "data": leccion })).into_response(),
        Ok(None) => error(StatusCode::NOT_FOUND, "Lección no encontrada"),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn update_lesson(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateLessonRequest>,
) -> Response {
    let leccion = match lesson_service::find_by_id(db.as_ref(), id).await {
        Ok(Some(leccion)) => leccion,
        Ok(None) => return error(StatusCode::NOT_FOUND, "Lección no encontrada"),
        Err(e) => return db_error(e),
    };

    // Only the creator or an admin may edit
    if leccion.creado_por != usuario.id && UserRole::from(usuario.rol.clone()) != UserRole::Admin {
        return error(
            StatusCode::FORBIDDEN,
            "No tienes permisos para editar esta lección",
        );
    }

    if let Some(nivel) = &payload.nivel {
        if !is_valid_cefr_level(nivel) {
            return error(
                StatusCode::BAD_REQUEST,
                "Nivel CEFR inválido. Usa: A1, A2, B1, B2, C1, C2",
            );
        }
    }

    match lesson_service::update(db.as_ref(), leccion, payload).await {
        Ok(_) => Json(json!({
            "success": true,
            "mensaje": "Lección actualizada exitosamente"
        }))
        .into_response(),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn delete_lesson(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
    Path(id): Path<i32>,
) -> Response {
    let leccion = match lesson_service::find_by_id(db.as_ref(), id).await {
        Ok(Some(leccion)) => leccion,
        Ok(None) => return error(StatusCode::NOT_FOUND, "Lección no encontrada"),
        Err(e) => return db_error(e),
    };

    if leccion.creado_por != usuario.id && UserRole::from(usuario.rol.clone()) != UserRole::Admin {
        return error(
            StatusCode::FORBIDDEN,
            "No tienes permisos para eliminar esta lección",
        );
    }

    match lesson_service::delete(db.as_ref(), leccion).await {
        Ok(()) => Json(json!({
            "success": true,
            "mensaje": "Lección eliminada exitosamente"
        }))
        .into_response(),
        Err(e) => db_error(e),
    }
}

#[utoipa::path(
    post,
    path = "/api/lecciones/{id}/progreso",
    tag = "lecciones",
    security(("bearer_auth" = [])),
    request_body = RegisterProgressRequest,
    responses(
        (status = 200, description = "Progreso registrado; al completar por primera vez otorga XP, logros y racha"),
        (status = 400, description = "Progreso fuera de 0..100", body = ErrorResponse),
        (status = 404, description = "Lección no encontrada", body = ErrorResponse),
        (status = 500, description = "Error del servidor", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn register_progress(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
    Path(id): Path<i32>,
    Json(payload): Json<RegisterProgressRequest>,
) -> Response {
    if payload.progreso < 0 || payload.progreso > 100 {
        return error(
            StatusCode::BAD_REQUEST,
            "El progreso debe estar entre 0 y 100",
        );
    }

    let leccion = match lesson_service::find_by_id(db.as_ref(), id).await {
        Ok(Some(leccion)) => leccion,
        Ok(None) => return error(StatusCode::NOT_FOUND, "Lección no encontrada"),
        Err(e) => return db_error(e),
    };

    let upsert = match progress_service::upsert_progress(
        db.as_ref(),
        usuario.id,
        leccion.id,
        payload.progreso,
        payload.tiempo_segundos.unwrap_or(0),
    )
    .await
    {
        Ok(upsert) => upsert,
        Err(e) => return db_error(e),
    };

    // Completing for the first time triggers the gamification chain. A row
    // that was already completada never re-awards, no matter how often the
    // client re-submits 100%.
    if payload.progreso >= 100 && !upsert.ya_completada {
        let xp_total = gamification_service::xp_for_completion(
            &leccion.nivel,
            leccion.duracion_minutos,
            upsert.es_primera_vez,
        );
        let razon = format!("Lección {} completada", leccion.id);

        // The four writes below run sequentially without a shared
        // transaction; a failure partway surfaces as a 500 and leaves the
        // earlier writes in place.
        match gamification_service::award_xp(db.as_ref(), usuario.id, xp_total, &razon).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return error(
                    StatusCode::NOT_FOUND,
                    "No se encontró el perfil del estudiante",
                );
            }
            Err(e) => return db_error(e),
        }

        if let Err(e) = progress_service::record_awarded_xp(db.as_ref(), upsert.progreso, xp_total).await
        {
            return db_error(e);
        }

        // The statistics snapshot is best-effort; a failure here must not
        // undo the XP that was already granted
        if let Err(e) = stats_service::refresh_student_stats(db.as_ref(), usuario.id).await {
            tracing::error!("Failed to refresh statistics for user {}: {:?}", usuario.id, e);
        }

        let logros = match gamification_service::check_achievements(db.as_ref(), usuario.id).await {
            Ok(logros) => logros,
            Err(e) => return db_error(e),
        };

        let racha = match gamification_service::update_streak(db.as_ref(), usuario.id).await {
            Ok(racha) => racha.unwrap_or(0),
            Err(e) => return db_error(e),
        };

        // Streak-gated achievements may have just become reachable
        let logros_racha =
            match gamification_service::check_achievements(db.as_ref(), usuario.id).await {
                Ok(nuevos) => nuevos,
                Err(e) => return db_error(e),
            };
        let logros: Vec<_> = logros.into_iter().chain(logros_racha).collect();

        return Json(json!({
            "success": true,
            "mensaje": "¡Lección completada!",
            "data": {
                "progreso": 100,
                "completada": true,
                "xp_ganado": xp_total,
                "es_primera_vez": upsert.es_primera_vez,
                "racha_dias": racha,
                "logros_desbloqueados": logros
            }
        }))
        .into_response();
    }

    Json(json!({
        "success": true,
        "mensaje": "Progreso actualizado",
        "data": {
            "progreso": payload.progreso,
            "completada": upsert.progreso.completada
        }
    }))
    .into_response()
}
