use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::{
    entities::user,
    handlers::{db_error, error, require_teacher_or_admin},
    services::stats_service,
};

#[derive(Debug, Deserialize)]
pub struct StudentListQuery {
    pub limite: Option<u64>,
    pub pagina: Option<u64>,
    pub nivel: Option<String>,
    pub idioma: Option<String>,
    pub orden: Option<String>,
}

#[axum::debug_handler]
pub async fn general_overview(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
) -> Response {
    if let Some(denied) = require_teacher_or_admin(&usuario) {
        return denied;
    }

    match stats_service::general_overview(db.as_ref()).await {
        Ok(overview) => Json(json!({
            "success": true,
            "data": {
                "resumen": {
                    "total_estudiantes": overview.total_estudiantes,
                    "estudiantes_con_progreso": overview.estudiantes_con_progreso,
                    "total_lecciones_completadas": overview.total_lecciones_completadas,
                    "promedio_xp": overview.promedio_xp,
                    "horas_totales_estudio": overview.horas_totales_estudio
                },
                "estudiantes_por_nivel": overview.estudiantes_por_nivel,
                "estudiantes_por_idioma": overview.estudiantes_por_idioma,
                "actividad_reciente": overview.actividad_reciente,
                "lecciones_populares": overview.lecciones_populares
            }
        }))
        .into_response(),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn student_list(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
    Query(query): Query<StudentListQuery>,
) -> Response {
    if let Some(denied) = require_teacher_or_admin(&usuario) {
        return denied;
    }

    if let Some(orden) = &query.orden {
        if !["nombre", "xp", "progreso", "actividad"].contains(&orden.as_str()) {
            return error(
                StatusCode::BAD_REQUEST,
                "Orden inválido. Usa: nombre, xp, progreso, actividad",
            );
        }
    }

    let filters = stats_service::StudentListFilters {
        nivel: query.nivel,
        idioma: query.idioma,
        orden: query.orden,
        pagina: query.pagina.unwrap_or(1),
        limite: query.limite.unwrap_or(20),
    };

    match stats_service::student_list(db.as_ref(), filters).await {
        Ok((estudiantes, paginacion)) => Json(json!({
            "success": true,
            "data": {
                "estudiantes": estudiantes,
                "paginacion": paginacion
            }
        }))
        .into_response(),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn student_detail(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
    Path(id): Path<i32>,
) -> Response {
    if let Some(denied) = require_teacher_or_admin(&usuario) {
        return denied;
    }

    match stats_service::student_detail(db.as_ref(), id).await {
        Ok(Some(detalle)) => Json(json!({
            "success": true,
            "data": {
                "estadisticas": {
                    "lecciones_iniciadas": detalle.estudiante.lecciones_iniciadas,
                    "lecciones_completadas": detalle.estudiante.lecciones_completadas,
                    "horas_estudio": detalle.horas_estudio,
                    "promedio_progreso": detalle.estudiante.promedio_progreso
                },
                "estudiante": detalle.estudiante,
                "progreso_por_nivel": detalle.progreso_por_nivel,
                "ultimas_lecciones": detalle.ultimas_lecciones,
                "logros": detalle.logros
            }
        }))
        .into_response(),
        Ok(None) => error(StatusCode::NOT_FOUND, "Estudiante no encontrado"),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn alert_students(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
) -> Response {
    if let Some(denied) = require_teacher_or_admin(&usuario) {
        return denied;
    }

    match stats_service::alert_students(db.as_ref()).await {
        Ok(estudiantes) => Json(json!({
            "success": true,
            "data": {
                "total_alertas": estudiantes.len(),
                "estudiantes": estudiantes
            }
        }))
        .into_response(),
        Err(e) => db_error(e),
    }
}
