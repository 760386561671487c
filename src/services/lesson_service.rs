use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::lesson::{
    self, Column, CreateLessonRequest, Entity as Lesson, Model, UpdateLessonRequest,
    LESSON_STATE_ACTIVE, LESSON_STATE_DRAFT,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub pagina: u64,
    pub limite: u64,
    pub total: u64,
    pub total_paginas: u64,
}

#[derive(Debug, Default, Clone)]
pub struct LessonFilters {
    pub nivel: Option<String>,
    pub idioma: Option<String>,
    pub estado: Option<String>,
}

pub async fn find_by_id(db: &DatabaseConnection, leccion_id: i32) -> Result<Option<Model>, DbErr> {
    Lesson::find_by_id(leccion_id).one(db).await
}

/// New lessons start as drafts owned by their creator.
pub async fn create(
    db: &DatabaseConnection,
    request: CreateLessonRequest,
    creado_por: i32,
) -> Result<Model, DbErr> {
    lesson::ActiveModel {
        titulo: Set(request.titulo),
        descripcion: Set(request.descripcion.unwrap_or_default()),
        contenido: Set(request.contenido.unwrap_or_default()),
        nivel: Set(request.nivel),
        idioma: Set(request.idioma),
        duracion_minutos: Set(request.duracion_minutos.unwrap_or(30)),
        orden: Set(request.orden.unwrap_or(0)),
        estado: Set(LESSON_STATE_DRAFT.to_string()),
        creado_por: Set(creado_por),
        actividades: Set(request.actividades.map(|a| a.to_string())),
        creado_en: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn update(
    db: &DatabaseConnection,
    leccion: Model,
    request: UpdateLessonRequest,
) -> Result<Model, DbErr> {
    let mut active = leccion.into_active_model();

    if let Some(titulo) = request.titulo {
        active.titulo = Set(titulo);
    }
    if let Some(descripcion) = request.descripcion {
        active.descripcion = Set(descripcion);
    }
    if let Some(contenido) = request.contenido {
        active.contenido = Set(contenido);
    }
    if let Some(nivel) = request.nivel {
        active.nivel = Set(nivel);
    }
    if let Some(idioma) = request.idioma {
        active.idioma = Set(idioma);
    }
    if let Some(duracion) = request.duracion_minutos {
        active.duracion_minutos = Set(duracion);
    }
    if let Some(orden) = request.orden {
        active.orden = Set(orden);
    }
    if let Some(estado) = request.estado {
        active.estado = Set(estado);
    }
    if let Some(actividades) = request.actividades {
        active.actividades = Set(Some(actividades.to_string()));
    }

    active.update(db).await
}

pub async fn delete(db: &DatabaseConnection, leccion: Model) -> Result<(), DbErr> {
    leccion.delete(db).await?;
    Ok(())
}

/// Admin listing across every state, with optional filters.
pub async fn list_all(
    db: &DatabaseConnection,
    filters: LessonFilters,
    pagina: u64,
    limite: u64,
) -> Result<(Vec<Model>, Pagination), DbErr> {
    let mut query = Lesson::find();

    if let Some(nivel) = &filters.nivel {
        query = query.filter(Column::Nivel.eq(nivel));
    }
    if let Some(idioma) = &filters.idioma {
        query = query.filter(Column::Idioma.eq(idioma));
    }
    if let Some(estado) = &filters.estado {
        query = query.filter(Column::Estado.eq(estado));
    }

    paginate(db, query, pagina, limite).await
}

/// Student-facing listing: only active lessons of one level+language, in
/// curriculum order.
pub async fn list_by_level(
    db: &DatabaseConnection,
    nivel: &str,
    idioma: &str,
    pagina: u64,
    limite: u64,
) -> Result<(Vec<Model>, Pagination), DbErr> {
    let query = Lesson::find()
        .filter(Column::Nivel.eq(nivel))
        .filter(Column::Idioma.eq(idioma))
        .filter(Column::Estado.eq(LESSON_STATE_ACTIVE));

    paginate(db, query, pagina, limite).await
}

async fn paginate(
    db: &DatabaseConnection,
    query: sea_orm::Select<Lesson>,
    pagina: u64,
    limite: u64,
) -> Result<(Vec<Model>, Pagination), DbErr> {
    let pagina = pagina.max(1);
    let limite = limite.clamp(1, 100);

    let total = query.clone().count(db).await?;

    let lecciones = query
        .order_by_asc(Column::Orden)
        .order_by_asc(Column::CreadoEn)
        .limit(limite)
        .offset((pagina - 1) * limite)
        .all(db)
        .await?;

    let paginacion = Pagination {
        pagina,
        limite,
        total,
        total_paginas: total.div_ceil(limite),
    };

    Ok((lecciones, paginacion))
}
