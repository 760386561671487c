use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, Set, TransactionTrait,
};

use crate::auth::jwt;
use crate::entities::student_profile;
use crate::entities::teacher_profile;
use crate::entities::user::{self, AccountState, Column, Entity as User, Model, RegisterRequest, UserRole};

pub async fn find_by_id(db: &DatabaseConnection, user_id: i32) -> Result<Option<Model>, DbErr> {
    User::find_by_id(user_id).one(db).await
}

pub async fn find_by_email(db: &DatabaseConnection, correo: &str) -> Result<Option<Model>, DbErr> {
    User::find().filter(Column::Correo.eq(correo)).one(db).await
}

/// Inserts the account plus its role-specific profile row in one transaction.
/// The account starts as `pendiente_verificacion` with a 6-digit code valid
/// for 24 hours. Self-registered admins are downgraded to profesor; admin
/// accounts are only created through operational tooling.
pub async fn create_user(
    db: &DatabaseConnection,
    request: RegisterRequest,
    password_hash: String,
    codigo_verificacion: String,
) -> Result<Model, DbErr> {
    let now = Utc::now();

    let rol = match request.rol.as_deref() {
        Some("profesor") => UserRole::Profesor,
        Some("admin") => UserRole::Profesor,
        _ => UserRole::Alumno,
    };

    let txn = db.begin().await?;

    let usuario = user::ActiveModel {
        nombre: Set(request.nombre.clone()),
        primer_apellido: Set(request.primer_apellido.clone()),
        segundo_apellido: Set(request.segundo_apellido.clone()),
        correo: Set(request.correo.clone()),
        contrasena_hash: Set(password_hash),
        rol: Set(rol.as_str().to_string()),
        estado_cuenta: Set(AccountState::PendienteVerificacion.as_str().to_string()),
        correo_verificado: Set(false),
        codigo_verificacion: Set(Some(codigo_verificacion)),
        expira_verificacion: Set(Some(now + Duration::hours(24))),
        fecha_registro: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    match rol {
        UserRole::Alumno => {
            student_profile::ActiveModel {
                usuario_id: Set(usuario.id),
                nivel_actual: Set(request
                    .nivel_actual
                    .clone()
                    .unwrap_or_else(|| "A1".to_string())),
                idioma_aprendizaje: Set(request
                    .idioma_aprendizaje
                    .clone()
                    .unwrap_or_else(|| "Inglés".to_string())),
                total_xp: Set(0),
                racha_dias: Set(0),
                ultima_actividad: Set(None),
            }
            .insert(&txn)
            .await?;
        }
        UserRole::Profesor | UserRole::Admin => {
            teacher_profile::ActiveModel {
                usuario_id: Set(usuario.id),
                titulo: Set(request.titulo.clone()),
                especialidad: Set(request.especialidad.clone()),
                anios_experiencia: Set(request.anios_experiencia.unwrap_or(0)),
                biografia: Set(request.biografia.clone()),
            }
            .insert(&txn)
            .await?;
        }
    }

    txn.commit().await?;

    Ok(usuario)
}

/// Replaces an expired (or lost) verification code and returns the new one.
pub async fn rotate_verification_code(
    db: &DatabaseConnection,
    usuario: Model,
) -> Result<(Model, String), DbErr> {
    let codigo = jwt::generate_verification_code();

    let mut active = usuario.into_active_model();
    active.codigo_verificacion = Set(Some(codigo.clone()));
    active.expira_verificacion = Set(Some(Utc::now() + Duration::hours(24)));
    let updated = active.update(db).await?;

    Ok((updated, codigo))
}

pub async fn mark_verified(db: &DatabaseConnection, usuario: Model) -> Result<Model, DbErr> {
    let mut active = usuario.into_active_model();
    active.estado_cuenta = Set(AccountState::Activo.as_str().to_string());
    active.correo_verificado = Set(true);
    active.codigo_verificacion = Set(None);
    active.expira_verificacion = Set(None);
    active.ultimo_acceso = Set(Some(Utc::now()));
    active.update(db).await
}

/// Stores a fresh recovery token (1 hour validity). A single token is active
/// per user; requesting again overwrites the previous one.
pub async fn set_recovery_token(db: &DatabaseConnection, usuario: Model) -> Result<String, DbErr> {
    let token = jwt::generate_recovery_token();

    let mut active = usuario.into_active_model();
    active.token_recuperacion = Set(Some(token.clone()));
    active.expira_recuperacion = Set(Some(Utc::now() + Duration::hours(1)));
    active.update(db).await?;

    Ok(token)
}

pub async fn find_by_valid_recovery_token(
    db: &DatabaseConnection,
    token: &str,
) -> Result<Option<Model>, DbErr> {
    User::find()
        .filter(Column::TokenRecuperacion.eq(token))
        .filter(Column::ExpiraRecuperacion.gt(Utc::now()))
        .one(db)
        .await
}

pub async fn reset_password(
    db: &DatabaseConnection,
    usuario: Model,
    password_hash: String,
) -> Result<Model, DbErr> {
    let mut active = usuario.into_active_model();
    active.contrasena_hash = Set(password_hash);
    active.token_recuperacion = Set(None);
    active.expira_recuperacion = Set(None);
    active.update(db).await
}

pub async fn touch_last_access(db: &DatabaseConnection, usuario: Model) -> Result<Model, DbErr> {
    let mut active = usuario.into_active_model();
    active.ultimo_acceso = Set(Some(Utc::now()));
    active.update(db).await
}

/// Soft-disables an account with a 30-day reactivation window. When
/// `schedule_deletion` is set the row is additionally marked for removal at
/// the end of that window.
pub async fn deactivate(
    db: &DatabaseConnection,
    usuario: Model,
    schedule_deletion: bool,
) -> Result<Model, DbErr> {
    let now = Utc::now();
    let reactivar_hasta = now + Duration::days(30);

    let mut active = usuario.into_active_model();
    active.estado_cuenta = Set(AccountState::Desactivado.as_str().to_string());
    active.fecha_desactivacion = Set(Some(now));
    active.reactivar_hasta = Set(Some(reactivar_hasta));
    active.eliminacion_programada = Set(if schedule_deletion {
        Some(reactivar_hasta)
    } else {
        None
    });
    active.update(db).await
}

pub async fn reactivate(db: &DatabaseConnection, usuario: Model) -> Result<Model, DbErr> {
    let mut active = usuario.into_active_model();
    active.estado_cuenta = Set(AccountState::Activo.as_str().to_string());
    active.fecha_desactivacion = Set(None);
    active.reactivar_hasta = Set(None);
    active.eliminacion_programada = Set(None);
    active.update(db).await
}

pub async fn find_student_profile(
    db: &DatabaseConnection,
    usuario_id: i32,
) -> Result<Option<student_profile::Model>, DbErr> {
    student_profile::Entity::find_by_id(usuario_id).one(db).await
}

pub async fn find_teacher_profile(
    db: &DatabaseConnection,
    usuario_id: i32,
) -> Result<Option<teacher_profile::Model>, DbErr> {
    teacher_profile::Entity::find_by_id(usuario_id).one(db).await
}
