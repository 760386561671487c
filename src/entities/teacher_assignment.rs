use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A teacher teaches one level+language combination; students whose profile
/// matches an active assignment are visible to that teacher.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "profesor_asignaciones")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub profesor_id: i32,
    pub nivel: String,
    pub idioma: String,
    pub activo: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
