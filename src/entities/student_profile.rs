use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One-to-one extension of `usuarios` for accounts with rol = "alumno".
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "perfil_estudiantes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub usuario_id: i32,
    pub nivel_actual: String, // CEFR: A1..C2
    pub idioma_aprendizaje: String,
    pub total_xp: i32,
    pub racha_dias: i32,
    pub ultima_actividad: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
