use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "lecciones")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub titulo: String,
    pub descripcion: String,
    #[sea_orm(column_type = "Text")]
    pub contenido: String,
    pub nivel: String,
    pub idioma: String,
    pub duracion_minutos: i32,
    pub orden: i32,
    pub estado: String, // "borrador" | "activa"
    pub creado_por: i32,
    /// Activity blocks, stored as a JSON text blob and only superficially
    /// validated (must parse as JSON when present).
    #[sea_orm(column_type = "Text", nullable)]
    pub actividades: Option<String>,
    pub creado_en: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub const LESSON_STATE_DRAFT: &str = "borrador";
pub const LESSON_STATE_ACTIVE: &str = "activa";

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateLessonRequest {
    pub titulo: String,
    pub descripcion: Option<String>,
    pub contenido: Option<String>,
    pub nivel: String,
    pub idioma: String,
    pub duracion_minutos: Option<i32>,
    pub orden: Option<i32>,
    pub actividades: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Default)]
pub struct UpdateLessonRequest {
    pub titulo: Option<String>,
    pub descripcion: Option<String>,
    pub contenido: Option<String>,
    pub nivel: Option<String>,
    pub idioma: Option<String>,
    pub duracion_minutos: Option<i32>,
    pub orden: Option<i32>,
    pub estado: Option<String>,
    pub actividades: Option<serde_json::Value>,
}
