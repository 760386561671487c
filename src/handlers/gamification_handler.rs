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
    entities::user::{self, is_valid_cefr_level, UserRole},
    handlers::{db_error, error, require_teacher_or_admin},
    services::{gamification_service, user_service},
};

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limite: Option<u64>,
    pub pagina: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct GrantXpRequest {
    pub usuario_id: Option<i32>,
    pub puntos: Option<i32>,
    pub razon: Option<String>,
}

#[axum::debug_handler]
pub async fn global_leaderboard(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
    Query(query): Query<LeaderboardQuery>,
) -> Response {
    let limite = query.limite.unwrap_or(50).clamp(1, 100);
    let pagina = query.pagina.unwrap_or(1).max(1);
    let offset = (pagina - 1) * limite;

    let leaderboard = match gamification_service::leaderboard(
        db.as_ref(),
        gamification_service::LeaderboardScope::Global,
        limite,
        offset,
    )
    .await
    {
        Ok(leaderboard) => leaderboard,
        Err(e) => return db_error(e),
    };

    // Students also get their own position in the full ranking
    let mi_posicion = if UserRole::from(usuario.rol.clone()) == UserRole::Alumno {
        match gamification_service::user_position(db.as_ref(), usuario.id).await {
            Ok(posicion) => posicion.map(|(pos, _)| pos),
            Err(e) => return db_error(e),
        }
    } else {
        None
    };

    let total = leaderboard.total_participantes;
    Json(json!({
        "ranking": leaderboard.ranking,
        "mi_posicion": mi_posicion,
        "total_participantes": total,
        "paginacion": {
            "pagina": pagina,
            "limite": limite,
            "total_paginas": total.div_ceil(limite)
        }
    }))
    .into_response()
}

#[axum::debug_handler]
pub async fn level_leaderboard(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Path(nivel): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Response {
    if !is_valid_cefr_level(&nivel) {
        return error(
            StatusCode::BAD_REQUEST,
            "Nivel CEFR inválido. Usa: A1, A2, B1, B2, C1, C2",
        );
    }

    let limite = query.limite.unwrap_or(50).clamp(1, 100);
    match gamification_service::leaderboard(
        db.as_ref(),
        gamification_service::LeaderboardScope::Nivel(nivel.clone()),
        limite,
        0,
    )
    .await
    {
        Ok(leaderboard) => Json(json!({
            "nivel": nivel,
            "ranking": leaderboard.ranking,
            "total_participantes": leaderboard.total_participantes
        }))
        .into_response(),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn language_leaderboard(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Path(idioma): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Response {
    let limite = query.limite.unwrap_or(50).clamp(1, 100);
    match gamification_service::leaderboard(
        db.as_ref(),
        gamification_service::LeaderboardScope::Idioma(idioma.clone()),
        limite,
        0,
    )
    .await
    {
        Ok(leaderboard) => Json(json!({
            "idioma": idioma,
            "ranking": leaderboard.ranking,
            "total_participantes": leaderboard.total_participantes
        }))
        .into_response(),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn top10(Extension(db): Extension<Arc<DatabaseConnection>>) -> Response {
    match gamification_service::leaderboard(
        db.as_ref(),
        gamification_service::LeaderboardScope::Global,
        10,
        0,
    )
    .await
    {
        Ok(leaderboard) => Json(json!({ "top10": leaderboard.ranking })).into_response(),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn get_points(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
) -> Response {
    let perfil = match user_service::find_student_profile(db.as_ref(), usuario.id).await {
        Ok(Some(perfil)) => perfil,
        Ok(None) => {
            return error(
                StatusCode::NOT_FOUND,
                "No se encontró el perfil del estudiante",
            );
        }
        Err(e) => return db_error(e),
    };

    let nivel = gamification_service::xp_level(perfil.total_xp);
    Json(json!({
        "puntos": perfil.total_xp,
        "nivel_actual": nivel.nivel,
        "siguiente_nivel_xp": nivel.siguiente_nivel_xp,
        "progreso_nivel": nivel.progreso_nivel,
        "nivel_cefr": perfil.nivel_actual
    }))
    .into_response()
}

#[axum::debug_handler]
pub async fn get_streak(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
) -> Response {
    let perfil = match user_service::find_student_profile(db.as_ref(), usuario.id).await {
        Ok(Some(perfil)) => perfil,
        Ok(None) => {
            return error(
                StatusCode::NOT_FOUND,
                "No se encontró el perfil del estudiante",
            );
        }
        Err(e) => return db_error(e),
    };

    let racha = gamification_service::streak_status(&perfil);
    Json(json!({
        "racha": {
            "dias": racha.dias,
            "fecha_ultima": racha.fecha_ultima,
            "activa": racha.activa
        }
    }))
    .into_response()
}

#[axum::debug_handler]
pub async fn get_achievements(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
) -> Response {
    match gamification_service::achievements_for_user(db.as_ref(), usuario.id).await {
        Ok(logros) => {
            let totales = logros.len();
            let desbloqueados = logros.iter().filter(|l| l.desbloqueado).count();
            Json(json!({
                "logros": logros,
                "logros_totales": totales,
                "logros_desbloqueados": desbloqueados
            }))
            .into_response()
        }
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn weekly_progress(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
) -> Response {
    match gamification_service::weekly_progress(db.as_ref(), usuario.id).await {
        Ok(progreso) => Json(json!({ "progreso_semanal": progreso })).into_response(),
        Err(e) => db_error(e),
    }
}

#[axum::debug_handler]
pub async fn grant_points(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(usuario): Extension<user::Model>,
    Json(payload): Json<GrantXpRequest>,
) -> Response {
    if let Some(denied) = require_teacher_or_admin(&usuario) {
        return denied;
    }

    let (usuario_id, puntos, razon) = match (payload.usuario_id, payload.puntos, payload.razon) {
        (Some(usuario_id), Some(puntos), Some(razon)) if !razon.trim().is_empty() => {
            (usuario_id, puntos, razon)
        }
        _ => {
            return error(
                StatusCode::BAD_REQUEST,
                "usuario_id, puntos y razon son requeridos",
            );
        }
    };

    match gamification_service::award_xp(db.as_ref(), usuario_id, puntos, &razon).await {
        Ok(Some(total)) => Json(json!({
            "mensaje": format!("Se otorgaron {} XP al usuario", puntos),
            "resultado": { "usuario_id": usuario_id, "total_xp": total }
        }))
        .into_response(),
        Ok(None) => error(
            StatusCode::NOT_FOUND,
            "No se encontró el perfil del estudiante",
        ),
        Err(e) => db_error(e),
    }
}
