use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Denormalized per-student rollup. Recomputed from `progreso_lecciones`
/// on completion events, never incrementally maintained.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "estadisticas_estudiante")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub usuario_id: i32,
    pub lecciones_completadas: i32,
    pub lecciones_en_progreso: i32,
    pub promedio_general: f64,
    /// Total study time in minutes.
    pub tiempo_total_estudio: i32,
    pub ultima_actualizacion: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
