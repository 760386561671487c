use sea_orm::sea_query::*;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityName, Schema,
};
use std::env;
use std::time::Duration;
use tracing::log;

use crate::entities::prelude::*;
use crate::entities::{lesson_progress, user_achievement, xp_history};

/// Resolves the connection string: `DATABASE_URL` wins, otherwise the URL is
/// composed from the discrete `DB_*` variables the original deployment used.
pub fn database_url() -> String {
    if let Ok(url) = env::var("DATABASE_URL") {
        return url;
    }

    let host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = env::var("DB_PORT").unwrap_or_else(|_| "3306".to_string());
    let user = env::var("DB_USER").unwrap_or_else(|_| "root".to_string());
    let password = env::var("DB_PASSWORD").unwrap_or_default();
    let name = env::var("DB_NAME").unwrap_or_else(|_| "speaklexi".to_string());

    format!("mysql://{}:{}@{}:{}/{}", user, password, host, port, name)
}

pub async fn init_db() -> Result<DatabaseConnection, DbErr> {
    // Set up connection options
    let mut opt = ConnectOptions::new(database_url());
    opt.max_connections(10)
        .min_connections(3)
        .connect_timeout(Duration::from_secs(15))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Info);

    // Connect to the database
    Database::connect(opt).await
}

pub async fn ensure_schema_exists(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Generate schema builder
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let stmts = [
        schema.create_table_from_entity(User),
        schema.create_table_from_entity(StudentProfile),
        schema.create_table_from_entity(TeacherProfile),
        schema.create_table_from_entity(TeacherAssignment),
        schema.create_table_from_entity(Lesson),
        schema.create_table_from_entity(LessonProgress),
        schema.create_table_from_entity(StudentStats),
        schema.create_table_from_entity(XpHistory),
        schema.create_table_from_entity(UserAchievement),
        schema.create_table_from_entity(Feedback),
        schema.create_table_from_entity(StudyPlan),
    ];

    for mut stmt in stmts {
        stmt.if_not_exists();
        db.execute(builder.build(&stmt)).await?;
    }

    // One progress row per (user, lesson); repeated submissions update in place
    let progress_idx = IndexCreateStatement::new()
        .name("idx_progreso_usuario_leccion")
        .table(lesson_progress::Entity.table_ref())
        .col(lesson_progress::Column::UsuarioId)
        .col(lesson_progress::Column::LeccionId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&progress_idx)).await?;

    // Each catalog achievement unlocks at most once per user
    let achievement_idx = IndexCreateStatement::new()
        .name("idx_logros_usuario_logro")
        .table(user_achievement::Entity.table_ref())
        .col(user_achievement::Column::UsuarioId)
        .col(user_achievement::Column::LogroId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&achievement_idx)).await?;

    let xp_idx = IndexCreateStatement::new()
        .name("idx_historial_xp_usuario")
        .table(xp_history::Entity.table_ref())
        .col(xp_history::Column::UsuarioId)
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&xp_idx)).await?;

    Ok(())
}
