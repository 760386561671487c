use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::study_plan::{self, Column, CreatePlanRequest, Entity as StudyPlan};
use crate::entities::user;

pub const PLAN_STATE_PENDING: &str = "pendiente";

/// Stores a study plan. The list-valued fields travel as JSON text columns;
/// suggested lesson ids are not checked against `lecciones`.
pub async fn create(
    db: &DatabaseConnection,
    profesor_id: i32,
    request: CreatePlanRequest,
) -> Result<study_plan::Model, DbErr> {
    study_plan::ActiveModel {
        profesor_id: Set(profesor_id),
        estudiante_id: Set(request.estudiante_id),
        titulo: Set(request.titulo),
        descripcion: Set(request.descripcion),
        objetivos: Set(request.objetivos),
        temas_dificultad: Set(encode_json(&request.temas_dificultad)),
        lecciones_sugeridas: Set(encode_json(&request.lecciones_sugeridas)),
        ejercicios_extra: Set(encode_json(&request.ejercicios_extra)),
        estado: Set(PLAN_STATE_PENDING.to_string()),
        fecha_inicio: Set(request.fecha_inicio),
        fecha_fin_estimada: Set(request.fecha_fin_estimada),
        fecha_completado: Set(None),
        creado_en: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

fn encode_json<T: Serialize>(value: &Option<Vec<T>>) -> Option<String> {
    value
        .as_ref()
        .map(|v| serde_json::to_string(v).unwrap_or_else(|_| "[]".to_string()))
}

fn decode_json<T: serde::de::DeserializeOwned>(value: &Option<String>) -> Vec<T> {
    value
        .as_deref()
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlanDTO {
    pub id: i32,
    pub profesor_id: i32,
    pub estudiante_id: i32,
    /// Full name of the counterparty (student for teacher listings, teacher
    /// for student listings).
    pub contraparte: String,
    pub titulo: String,
    pub descripcion: Option<String>,
    pub objetivos: Option<String>,
    pub temas_dificultad: Vec<String>,
    pub lecciones_sugeridas: Vec<i32>,
    pub ejercicios_extra: Vec<String>,
    pub estado: String,
    pub fecha_inicio: Option<chrono::DateTime<Utc>>,
    pub fecha_fin_estimada: Option<chrono::DateTime<Utc>>,
    pub fecha_completado: Option<chrono::DateTime<Utc>>,
    pub creado_en: chrono::DateTime<Utc>,
}

pub async fn list_by_teacher(
    db: &DatabaseConnection,
    profesor_id: i32,
) -> Result<Vec<PlanDTO>, DbErr> {
    let rows = StudyPlan::find()
        .filter(Column::ProfesorId.eq(profesor_id))
        .order_by_desc(Column::CreadoEn)
        .all(db)
        .await?;
    to_dtos(db, rows, |row| row.estudiante_id).await
}

pub async fn list_by_student(
    db: &DatabaseConnection,
    estudiante_id: i32,
) -> Result<Vec<PlanDTO>, DbErr> {
    let rows = StudyPlan::find()
        .filter(Column::EstudianteId.eq(estudiante_id))
        .order_by_desc(Column::CreadoEn)
        .all(db)
        .await?;
    to_dtos(db, rows, |row| row.profesor_id).await
}

async fn to_dtos(
    db: &DatabaseConnection,
    rows: Vec<study_plan::Model>,
    counterparty: impl Fn(&study_plan::Model) -> i32,
) -> Result<Vec<PlanDTO>, DbErr> {
    let ids: Vec<i32> = rows.iter().map(&counterparty).collect();
    let nombres: HashMap<i32, String> = user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, format!("{} {}", u.nombre, u.primer_apellido)))
        .collect();

    Ok(rows
        .into_iter()
        .map(|row| PlanDTO {
            contraparte: nombres
                .get(&counterparty(&row))
                .cloned()
                .unwrap_or_default(),
            id: row.id,
            profesor_id: row.profesor_id,
            estudiante_id: row.estudiante_id,
            titulo: row.titulo,
            descripcion: row.descripcion,
            objetivos: row.objetivos,
            temas_dificultad: decode_json(&row.temas_dificultad),
            lecciones_sugeridas: decode_json(&row.lecciones_sugeridas),
            ejercicios_extra: decode_json(&row.ejercicios_extra),
            estado: row.estado,
            fecha_inicio: row.fecha_inicio,
            fecha_fin_estimada: row.fecha_fin_estimada,
            fecha_completado: row.fecha_completado,
            creado_en: row.creado_en,
        })
        .collect())
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlanStats {
    pub total_planes: i64,
    pub planes_pendientes: i64,
    pub planes_en_progreso: i64,
    pub planes_completados: i64,
    pub planes_cancelados: i64,
    pub estudiantes_con_plan: i64,
}

pub async fn teacher_stats(db: &DatabaseConnection, profesor_id: i32) -> Result<PlanStats, DbErr> {
    let rows = StudyPlan::find()
        .filter(Column::ProfesorId.eq(profesor_id))
        .all(db)
        .await?;

    let estudiantes: std::collections::HashSet<i32> =
        rows.iter().map(|r| r.estudiante_id).collect();

    Ok(PlanStats {
        total_planes: rows.len() as i64,
        planes_pendientes: rows.iter().filter(|r| r.estado == "pendiente").count() as i64,
        planes_en_progreso: rows.iter().filter(|r| r.estado == "en_progreso").count() as i64,
        planes_completados: rows.iter().filter(|r| r.estado == "completado").count() as i64,
        planes_cancelados: rows.iter().filter(|r| r.estado == "cancelado").count() as i64,
        estudiantes_con_plan: estudiantes.len() as i64,
    })
}
