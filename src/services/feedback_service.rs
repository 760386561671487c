use std::collections::HashMap;

use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::feedback::{self, Column, Entity as Feedback, SendFeedbackRequest};
use crate::entities::user;

pub const FEEDBACK_TYPES: [&str; 4] = ["general", "felicitacion", "mejora", "alerta"];

pub async fn create(
    db: &DatabaseConnection,
    profesor_id: i32,
    request: SendFeedbackRequest,
) -> Result<feedback::Model, DbErr> {
    feedback::ActiveModel {
        profesor_id: Set(profesor_id),
        estudiante_id: Set(request.estudiante_id),
        leccion_id: Set(request.leccion_id),
        asunto: Set(request.asunto),
        mensaje: Set(request.mensaje),
        tipo: Set(request.tipo.unwrap_or_else(|| "general".to_string())),
        leido: Set(false),
        fecha_lectura: Set(None),
        creado_en: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeedbackEntry {
    pub id: i32,
    pub estudiante_id: i32,
    pub profesor_id: i32,
    /// Full name of the counterparty (the student for teacher listings, the
    /// teacher for student listings).
    pub remitente: String,
    pub asunto: String,
    pub mensaje: String,
    pub tipo: String,
    pub leido: bool,
    pub fecha_lectura: Option<chrono::DateTime<Utc>>,
    pub creado_en: chrono::DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct FeedbackFilters {
    pub estudiante_id: Option<i32>,
    pub leido: Option<bool>,
    pub tipo: Option<String>,
}

/// Feedback a teacher has sent, newest first.
pub async fn list_by_teacher(
    db: &DatabaseConnection,
    profesor_id: i32,
    filters: FeedbackFilters,
) -> Result<Vec<FeedbackEntry>, DbErr> {
    let mut query = Feedback::find().filter(Column::ProfesorId.eq(profesor_id));

    if let Some(estudiante_id) = filters.estudiante_id {
        query = query.filter(Column::EstudianteId.eq(estudiante_id));
    }
    if let Some(leido) = filters.leido {
        query = query.filter(Column::Leido.eq(leido));
    }
    if let Some(tipo) = filters.tipo {
        query = query.filter(Column::Tipo.eq(tipo));
    }

    let rows = query.order_by_desc(Column::CreadoEn).all(db).await?;
    with_names(db, rows, |row| row.estudiante_id).await
}

/// Feedback a student has received, newest first.
pub async fn list_by_student(
    db: &DatabaseConnection,
    estudiante_id: i32,
) -> Result<Vec<FeedbackEntry>, DbErr> {
    let rows = Feedback::find()
        .filter(Column::EstudianteId.eq(estudiante_id))
        .order_by_desc(Column::CreadoEn)
        .all(db)
        .await?;
    with_names(db, rows, |row| row.profesor_id).await
}

async fn with_names(
    db: &DatabaseConnection,
    rows: Vec<feedback::Model>,
    counterparty: impl Fn(&feedback::Model) -> i32,
) -> Result<Vec<FeedbackEntry>, DbErr> {
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
        .map(|row| {
            let remitente = nombres
                .get(&counterparty(&row))
                .cloned()
                .unwrap_or_default();
            FeedbackEntry {
                id: row.id,
                estudiante_id: row.estudiante_id,
                profesor_id: row.profesor_id,
                remitente,
                asunto: row.asunto,
                mensaje: row.mensaje,
                tipo: row.tipo,
                leido: row.leido,
                fecha_lectura: row.fecha_lectura,
                creado_en: row.creado_en,
            }
        })
        .collect())
}

/// Marks a message as read. Scoped to the receiving student; returns false
/// when the message is missing or belongs to someone else.
pub async fn mark_read(
    db: &DatabaseConnection,
    feedback_id: i32,
    estudiante_id: i32,
) -> Result<bool, DbErr> {
    let row = Feedback::find_by_id(feedback_id)
        .filter(Column::EstudianteId.eq(estudiante_id))
        .one(db)
        .await?;

    match row {
        Some(row) => {
            if !row.leido {
                let mut active = row.into_active_model();
                active.leido = Set(true);
                active.fecha_lectura = Set(Some(Utc::now()));
                active.update(db).await?;
            }
            Ok(true)
        }
        None => Ok(false),
    }
}

pub async fn unread_count(db: &DatabaseConnection, estudiante_id: i32) -> Result<u64, DbErr> {
    Feedback::find()
        .filter(Column::EstudianteId.eq(estudiante_id))
        .filter(Column::Leido.eq(false))
        .count(db)
        .await
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeedbackStats {
    pub total_enviados: i64,
    pub total_leidos: i64,
    pub total_no_leidos: i64,
    pub total_felicitaciones: i64,
    pub total_mejoras: i64,
    pub total_alertas: i64,
    pub enviados_ultima_semana: i64,
}

pub async fn teacher_stats(
    db: &DatabaseConnection,
    profesor_id: i32,
) -> Result<FeedbackStats, DbErr> {
    let rows = Feedback::find()
        .filter(Column::ProfesorId.eq(profesor_id))
        .all(db)
        .await?;

    let hace_una_semana = Utc::now() - Duration::days(7);

    Ok(FeedbackStats {
        total_enviados: rows.len() as i64,
        total_leidos: rows.iter().filter(|r| r.leido).count() as i64,
        total_no_leidos: rows.iter().filter(|r| !r.leido).count() as i64,
        total_felicitaciones: rows.iter().filter(|r| r.tipo == "felicitacion").count() as i64,
        total_mejoras: rows.iter().filter(|r| r.tipo == "mejora").count() as i64,
        total_alertas: rows.iter().filter(|r| r.tipo == "alerta").count() as i64,
        enviados_ultima_semana: rows
            .iter()
            .filter(|r| r.creado_en >= hace_una_semana)
            .count() as i64,
    })
}
