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
    handlers::{db_error, error},
    services::progress_service,
};

const HISTORY_TYPES: [&str; 3] = ["todos", "completados", "en_progreso"];

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limite: Option<u64>,
    pub offset: Option<u64>,
    pub tipo: Option<String>,
}

#[axum::debug_handler]
pub async fn get_lesson_progress(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
    Path(leccion_id): Path<i32>,
) -> Response {
    match progress_service::find_progress(db.as_ref(), usuario.id, leccion_id).await {
        Ok(Some(progreso)) => {
            let mensaje = if progreso.completada {
                "Lección completada".to_string()
            } else {
                format!("Progreso: {}%", progreso.progreso)
            };
            Json(json!({ "progreso": progreso, "mensaje": mensaje })).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "No se encontró progreso para esta lección",
                "sugerencia": "Puede que aún no hayas comenzado esta lección"
            })),
        )
            .into_response(),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn get_history(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let tipo = query.tipo.unwrap_or_else(|| "todos".to_string());
    if !HISTORY_TYPES.contains(&tipo.as_str()) {
        return error(
            StatusCode::BAD_REQUEST,
            "Tipo inválido. Usa: todos, completados, en_progreso",
        );
    }

    let limite = query.limite.unwrap_or(50).clamp(1, 100);
    let offset = query.offset.unwrap_or(0);

    match progress_service::history(db.as_ref(), usuario.id, limite, offset, &tipo).await {
        Ok(historial) => {
            let total = historial.len();
            Json(json!({
                "historial": historial,
                "total": total,
                "limite": limite,
                "offset": offset,
                "tipo": tipo
            }))
            .into_response()
        }
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn get_summary(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
) -> Response {
    match progress_service::summary(db.as_ref(), usuario.id).await {
        Ok(Some(resumen)) => {
            let mensaje = format!(
                "Nivel {} - {} lecciones completadas",
                resumen.nivel_actual, resumen.lecciones_completadas
            );
            Json(json!({ "resumen": resumen, "mensaje": mensaje })).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "No se encontró el perfil del estudiante",
                "sugerencia": "Completa tu primera lección para crear tu perfil"
            })),
        )
            .into_response(),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn get_recommended(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
) -> Response {
    match progress_service::recommended(db.as_ref(), usuario.id).await {
        Ok(Some(recomendaciones)) => Json(json!({
            "nivel": recomendaciones.nivel,
            "idioma": recomendaciones.idioma,
            "lecciones_recomendadas": recomendaciones.lecciones
        }))
        .into_response(),
        Ok(None) => error(StatusCode::NOT_FOUND, "Perfil no encontrado"),
        Err(e) => db_error(e),
    }
}
