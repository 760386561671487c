use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One-directional teacher → student message with a read flag.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "retroalimentacion")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub profesor_id: i32,
    pub estudiante_id: i32,
    pub leccion_id: Option<i32>,
    pub asunto: String,
    #[sea_orm(column_type = "Text")]
    pub mensaje: String,
    pub tipo: String, // "general" | "felicitacion" | "mejora" | "alerta"
    pub leido: bool,
    pub fecha_lectura: Option<DateTime<Utc>>,
    pub creado_en: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SendFeedbackRequest {
    pub estudiante_id: i32,
    pub asunto: String,
    pub mensaje: String,
    pub tipo: Option<String>,
    pub leccion_id: Option<i32>,
}
