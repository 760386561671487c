use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Per-user, per-lesson progress. One row per (usuario_id, leccion_id) pair,
/// enforced by a unique index created at startup; re-submitting progress
/// updates the row in place.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "progreso_lecciones")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub usuario_id: i32,
    pub leccion_id: i32,
    pub progreso: i32, // 0..=100
    pub completada: bool,
    pub tiempo_total_segundos: i32,
    pub xp_ganados: i32,
    pub fecha_completado: Option<DateTime<Utc>>,
    pub actualizado_en: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RegisterProgressRequest {
    pub progreso: i32,
    pub tiempo_segundos: Option<i32>,
}
