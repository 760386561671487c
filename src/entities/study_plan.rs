use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Teacher-authored study plan for a student. The list-valued fields
/// (`temas_dificultad`, `lecciones_sugeridas`, `ejercicios_extra`) are stored
/// as JSON text and parsed/serialized in the plan service.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "planes_estudio")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub profesor_id: i32,
    pub estudiante_id: i32,
    pub titulo: String,
    pub descripcion: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub objetivos: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub temas_dificultad: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub lecciones_sugeridas: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub ejercicios_extra: Option<String>,
    pub estado: String, // "pendiente" | "en_progreso" | "completado" | "cancelado"
    pub fecha_inicio: Option<DateTime<Utc>>,
    pub fecha_fin_estimada: Option<DateTime<Utc>>,
    pub fecha_completado: Option<DateTime<Utc>>,
    pub creado_en: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreatePlanRequest {
    pub estudiante_id: i32,
    pub titulo: String,
    pub descripcion: Option<String>,
    pub objetivos: Option<String>,
    pub temas_dificultad: Option<Vec<String>>,
    /// Lesson ids; referenced lessons are not validated to exist.
    pub lecciones_sugeridas: Option<Vec<i32>>,
    pub ejercicios_extra: Option<Vec<String>>,
    pub fecha_inicio: Option<DateTime<Utc>>,
    pub fecha_fin_estimada: Option<DateTime<Utc>>,
}
