use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::lesson::{self, LESSON_STATE_ACTIVE};
use crate::entities::lesson_progress::{self, Column, Entity as LessonProgress, Model};
use crate::services::user_service;

/// Outcome of a progress submission, before any gamification side effects.
pub struct ProgressUpsert {
    pub progreso: Model,
    /// The row was already marked completada before this submission. This is
    /// the guard that keeps repeated 100% submissions from re-awarding XP.
    pub ya_completada: bool,
    /// No progress row existed for this (user, lesson) pair before.
    pub es_primera_vez: bool,
}

pub async fn find_progress(
    db: &DatabaseConnection,
    usuario_id: i32,
    leccion_id: i32,
) -> Result<Option<Model>, DbErr> {
    LessonProgress::find()
        .filter(Column::UsuarioId.eq(usuario_id))
        .filter(Column::LeccionId.eq(leccion_id))
        .one(db)
        .await
}

/// Creates or updates the (user, lesson) progress row. Accumulates study
/// time, never lowers a completed flag, and reports first-time/already-done
/// state for the gamification chain.
pub async fn upsert_progress(
    db: &DatabaseConnection,
    usuario_id: i32,
    leccion_id: i32,
    progreso: i32,
    tiempo_segundos: i32,
) -> Result<ProgressUpsert, DbErr> {
    let now = Utc::now();
    let completada = progreso >= 100;
    let existing = find_progress(db, usuario_id, leccion_id).await?;

    match existing {
        Some(row) => {
            let ya_completada = row.completada;
            let tiempo_acumulado = row.tiempo_total_segundos + tiempo_segundos;

            let mut active = row.into_active_model();
            active.progreso = Set(progreso);
            active.tiempo_total_segundos = Set(tiempo_acumulado);
            active.actualizado_en = Set(now);
            if completada && !ya_completada {
                active.completada = Set(true);
                active.fecha_completado = Set(Some(now));
            }
            let updated = active.update(db).await?;

            Ok(ProgressUpsert {
                progreso: updated,
                ya_completada,
                es_primera_vez: false,
            })
        }
        None => {
            let inserted = lesson_progress::ActiveModel {
                usuario_id: Set(usuario_id),
                leccion_id: Set(leccion_id),
                progreso: Set(progreso),
                completada: Set(completada),
                tiempo_total_segundos: Set(tiempo_segundos),
                xp_ganados: Set(0),
                fecha_completado: Set(completada.then_some(now)),
                actualizado_en: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;

            Ok(ProgressUpsert {
                progreso: inserted,
                ya_completada: false,
                es_primera_vez: true,
            })
        }
    }
}

pub async fn record_awarded_xp(
    db: &DatabaseConnection,
    progreso: Model,
    xp: i32,
) -> Result<Model, DbErr> {
    let mut active = progreso.into_active_model();
    active.xp_ganados = Set(xp);
    active.update(db).await
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    pub leccion_id: i32,
    pub titulo: String,
    pub nivel: String,
    pub idioma: String,
    pub progreso: i32,
    pub completada: bool,
    pub tiempo_total_segundos: i32,
    pub actualizado_en: chrono::DateTime<Utc>,
}

/// Progress history joined with lesson metadata, newest first.
pub async fn history(
    db: &DatabaseConnection,
    usuario_id: i32,
    limite: u64,
    offset: u64,
    tipo: &str,
) -> Result<Vec<HistoryEntry>, DbErr> {
    let mut query = LessonProgress::find().filter(Column::UsuarioId.eq(usuario_id));

    match tipo {
        "completados" => query = query.filter(Column::Completada.eq(true)),
        "en_progreso" => query = query.filter(Column::Completada.eq(false)),
        _ => {}
    }

    let rows = query
        .order_by_desc(Column::ActualizadoEn)
        .limit(limite)
        .offset(offset)
        .all(db)
        .await?;

    let leccion_ids: Vec<i32> = rows.iter().map(|r| r.leccion_id).collect();
    let lecciones: HashMap<i32, lesson::Model> = lesson::Entity::find()
        .filter(lesson::Column::Id.is_in(leccion_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|l| (l.id, l))
        .collect();

    Ok(rows
        .into_iter()
        .filter_map(|row| {
            lecciones.get(&row.leccion_id).map(|l| HistoryEntry {
                leccion_id: row.leccion_id,
                titulo: l.titulo.clone(),
                nivel: l.nivel.clone(),
                idioma: l.idioma.clone(),
                progreso: row.progreso,
                completada: row.completada,
                tiempo_total_segundos: row.tiempo_total_segundos,
                actualizado_en: row.actualizado_en,
            })
        })
        .collect())
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProgressSummary {
    pub nivel_actual: String,
    pub idioma_aprendizaje: String,
    pub total_xp: i32,
    pub racha_dias: i32,
    pub lecciones_iniciadas: i64,
    pub lecciones_completadas: i64,
    pub lecciones_incompletas: i64,
    pub promedio_progreso: i32,
    pub tiempo_total_segundos: i64,
    pub tiempo_promedio_leccion: i64,
    pub eficiencia: i32,
}

/// Aggregated view of a student's progress. `None` when the caller has no
/// student profile.
pub async fn summary(
    db: &DatabaseConnection,
    usuario_id: i32,
) -> Result<Option<ProgressSummary>, DbErr> {
    let perfil = match user_service::find_student_profile(db, usuario_id).await? {
        Some(perfil) => perfil,
        None => return Ok(None),
    };

    let rows = LessonProgress::find()
        .filter(Column::UsuarioId.eq(usuario_id))
        .all(db)
        .await?;

    let iniciadas = rows.len() as i64;
    let completadas = rows.iter().filter(|r| r.completada).count() as i64;
    let incompletas = iniciadas - completadas;
    let tiempo_total: i64 = rows.iter().map(|r| r.tiempo_total_segundos as i64).sum();
    let promedio = if iniciadas > 0 {
        (rows.iter().map(|r| r.progreso as i64).sum::<i64>() as f64 / iniciadas as f64).round()
            as i32
    } else {
        0
    };

    Ok(Some(ProgressSummary {
        nivel_actual: perfil.nivel_actual,
        idioma_aprendizaje: perfil.idioma_aprendizaje,
        total_xp: perfil.total_xp,
        racha_dias: perfil.racha_dias,
        lecciones_iniciadas: iniciadas,
        lecciones_completadas: completadas,
        lecciones_incompletas: incompletas,
        promedio_progreso: promedio,
        tiempo_total_segundos: tiempo_total,
        tiempo_promedio_leccion: if completadas > 0 {
            tiempo_total / completadas
        } else {
            0
        },
        eficiencia: if iniciadas > 0 {
            ((completadas as f64 / iniciadas as f64) * 100.0).round() as i32
        } else {
            0
        },
    }))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecommendedLesson {
    pub id: i32,
    pub titulo: String,
    pub descripcion: String,
    pub nivel: String,
    pub idioma: String,
    pub duracion_minutos: i32,
    pub progreso_actual: i32,
}

pub struct Recommendations {
    pub nivel: String,
    pub idioma: String,
    pub lecciones: Vec<RecommendedLesson>,
}

/// Up to 10 active lessons at the student's level+language that they have not
/// completed yet, in curriculum order, carrying any partial progress.
pub async fn recommended(
    db: &DatabaseConnection,
    usuario_id: i32,
) -> Result<Option<Recommendations>, DbErr> {
    let perfil = match user_service::find_student_profile(db, usuario_id).await? {
        Some(perfil) => perfil,
        None => return Ok(None),
    };

    let lecciones = lesson::Entity::find()
        .filter(lesson::Column::Nivel.eq(perfil.nivel_actual.clone()))
        .filter(lesson::Column::Idioma.eq(perfil.idioma_aprendizaje.clone()))
        .filter(lesson::Column::Estado.eq(LESSON_STATE_ACTIVE))
        .order_by_asc(lesson::Column::Orden)
        .order_by_asc(lesson::Column::CreadoEn)
        .all(db)
        .await?;

    let rows = LessonProgress::find()
        .filter(Column::UsuarioId.eq(usuario_id))
        .all(db)
        .await?;
    let progreso: HashMap<i32, &Model> = rows.iter().map(|r| (r.leccion_id, r)).collect();

    let recomendadas = lecciones
        .into_iter()
        .filter(|l| progreso.get(&l.id).map(|p| !p.completada).unwrap_or(true))
        .take(10)
        .map(|l| RecommendedLesson {
            progreso_actual: progreso.get(&l.id).map(|p| p.progreso).unwrap_or(0),
            id: l.id,
            titulo: l.titulo,
            descripcion: l.descripcion,
            nivel: l.nivel,
            idioma: l.idioma,
            duracion_minutos: l.duracion_minutos,
        })
        .collect();

    Ok(Some(Recommendations {
        nivel: perfil.nivel_actual,
        idioma: perfil.idioma_aprendizaje,
        lecciones: recomendadas,
    }))
}
