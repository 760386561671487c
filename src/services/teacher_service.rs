use std::collections::HashMap;

use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::lesson::{self, LESSON_STATE_ACTIVE};
use crate::entities::lesson_progress;
use crate::entities::student_profile;
use crate::entities::teacher_assignment::{self, Entity as TeacherAssignment};
use crate::entities::user::{self, AccountState, UserRole};

/// The active level+language assignment for a teacher, if any. A teacher
/// without an assignment has no dashboard.
pub async fn active_assignment(
    db: &DatabaseConnection,
    profesor_id: i32,
) -> Result<Option<teacher_assignment::Model>, DbErr> {
    TeacherAssignment::find()
        .filter(teacher_assignment::Column::ProfesorId.eq(profesor_id))
        .filter(teacher_assignment::Column::Activo.eq(true))
        .one(db)
        .await
}

/// A student belongs to a teacher when the student's profile matches the
/// level+language of one of the teacher's active assignments.
pub async fn is_student_assigned(
    db: &DatabaseConnection,
    profesor_id: i32,
    estudiante_id: i32,
) -> Result<bool, DbErr> {
    let perfil = match student_profile::Entity::find_by_id(estudiante_id)
        .one(db)
        .await?
    {
        Some(perfil) => perfil,
        None => return Ok(false),
    };

    let asignado = TeacherAssignment::find()
        .filter(teacher_assignment::Column::ProfesorId.eq(profesor_id))
        .filter(teacher_assignment::Column::Activo.eq(true))
        .filter(teacher_assignment::Column::Nivel.eq(perfil.nivel_actual))
        .filter(teacher_assignment::Column::Idioma.eq(perfil.idioma_aprendizaje))
        .one(db)
        .await?;

    Ok(asignado.is_some())
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssignedStudent {
    pub id: i32,
    pub nombre: String,
    pub primer_apellido: String,
    pub nombre_completo: String,
    pub correo: String,
    pub nivel_actual: String,
    pub idioma_aprendizaje: String,
    pub total_xp: i32,
    pub lecciones_iniciadas: i64,
    pub lecciones_completadas: i64,
    pub promedio_progreso: i32,
    pub tiempo_total_estudio: i64,
}

/// Active students in the teacher's assignment, with progress aggregates,
/// best XP first.
pub async fn assigned_students(
    db: &DatabaseConnection,
    profesor_id: i32,
) -> Result<Vec<AssignedStudent>, DbErr> {
    let asignacion = match active_assignment(db, profesor_id).await? {
        Some(asignacion) => asignacion,
        None => return Ok(Vec::new()),
    };

    let perfiles = student_profile::Entity::find()
        .filter(student_profile::Column::NivelActual.eq(asignacion.nivel))
        .filter(student_profile::Column::IdiomaAprendizaje.eq(asignacion.idioma))
        .all(db)
        .await?;

    let usuario_ids: Vec<i32> = perfiles.iter().map(|p| p.usuario_id).collect();
    let alumnos: HashMap<i32, user::Model> = user::Entity::find()
        .filter(user::Column::Id.is_in(usuario_ids.clone()))
        .filter(user::Column::Rol.eq(UserRole::Alumno.as_str()))
        .filter(user::Column::EstadoCuenta.eq(AccountState::Activo.as_str()))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let mut agregados: HashMap<i32, (i64, i64, i64, i64)> = HashMap::new();
    for row in lesson_progress::Entity::find()
        .filter(lesson_progress::Column::UsuarioId.is_in(usuario_ids))
        .all(db)
        .await?
    {
        let entrada = agregados.entry(row.usuario_id).or_insert((0, 0, 0, 0));
        entrada.0 += 1;
        if row.completada {
            entrada.1 += 1;
        }
        entrada.2 += row.progreso as i64;
        entrada.3 += row.tiempo_total_segundos as i64;
    }

    let mut estudiantes: Vec<AssignedStudent> = perfiles
        .into_iter()
        .filter_map(|perfil| {
            let usuario = alumnos.get(&perfil.usuario_id)?;
            let (iniciadas, completadas, suma_progreso, tiempo) = agregados
                .get(&perfil.usuario_id)
                .copied()
                .unwrap_or((0, 0, 0, 0));
            Some(AssignedStudent {
                id: perfil.usuario_id,
                nombre: usuario.nombre.clone(),
                primer_apellido: usuario.primer_apellido.clone(),
                nombre_completo: format!("{} {}", usuario.nombre, usuario.primer_apellido),
                correo: usuario.correo.clone(),
                nivel_actual: perfil.nivel_actual,
                idioma_aprendizaje: perfil.idioma_aprendizaje,
                total_xp: perfil.total_xp,
                lecciones_iniciadas: iniciadas,
                lecciones_completadas: completadas,
                promedio_progreso: if iniciadas > 0 {
                    (suma_progreso as f64 / iniciadas as f64).round() as i32
                } else {
                    0
                },
                tiempo_total_estudio: tiempo,
            })
        })
        .collect();

    estudiantes.sort_by(|a, b| b.total_xp.cmp(&a.total_xp).then(a.id.cmp(&b.id)));

    Ok(estudiantes)
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClassStats {
    pub total_estudiantes: i64,
    pub promedio_clase: i32,
    pub total_lecciones_completadas: i64,
    pub tiempo_total_horas: i64,
    pub estudiantes_activos: i64,
    pub promedio_xp: i64,
}

/// Aggregates across the teacher's class. "Active" here means the student has
/// completed at least one lesson.
pub async fn class_stats(db: &DatabaseConnection, profesor_id: i32) -> Result<ClassStats, DbErr> {
    let estudiantes = assigned_students(db, profesor_id).await?;

    let total = estudiantes.len() as i64;
    let completadas: i64 = estudiantes.iter().map(|e| e.lecciones_completadas).sum();
    let activos = estudiantes
        .iter()
        .filter(|e| e.lecciones_completadas > 0)
        .count() as i64;
    let tiempo_horas: i64 = estudiantes.iter().map(|e| e.tiempo_total_estudio).sum::<i64>() / 3600;

    let (promedio_clase, promedio_xp) = if total > 0 {
        (
            (estudiantes
                .iter()
                .map(|e| e.promedio_progreso as f64)
                .sum::<f64>()
                / total as f64)
                .round() as i32,
            (estudiantes.iter().map(|e| e.total_xp as f64).sum::<f64>() / total as f64).round()
                as i64,
        )
    } else {
        (0, 0)
    };

    Ok(ClassStats {
        total_estudiantes: total,
        promedio_clase,
        total_lecciones_completadas: completadas,
        tiempo_total_horas: tiempo_horas,
        estudiantes_activos: activos,
        promedio_xp,
    })
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssignmentLesson {
    pub id: i32,
    pub titulo: String,
    pub descripcion: String,
    pub nivel: String,
    pub duracion_minutos: i32,
    pub orden: i32,
    pub estado: String,
    pub total_estudiantes_completado: i64,
}

/// Active lessons in the teacher's level+language with completion counts.
pub async fn assignment_lessons(
    db: &DatabaseConnection,
    profesor_id: i32,
) -> Result<Vec<AssignmentLesson>, DbErr> {
    let asignacion = match active_assignment(db, profesor_id).await? {
        Some(asignacion) => asignacion,
        None => return Ok(Vec::new()),
    };

    let lecciones = lesson::Entity::find()
        .filter(lesson::Column::Nivel.eq(asignacion.nivel))
        .filter(lesson::Column::Idioma.eq(asignacion.idioma))
        .filter(lesson::Column::Estado.eq(LESSON_STATE_ACTIVE))
        .order_by_asc(lesson::Column::Orden)
        .all(db)
        .await?;

    let leccion_ids: Vec<i32> = lecciones.iter().map(|l| l.id).collect();
    let mut completadas: HashMap<i32, i64> = HashMap::new();
    for row in lesson_progress::Entity::find()
        .filter(lesson_progress::Column::LeccionId.is_in(leccion_ids))
        .filter(lesson_progress::Column::Completada.eq(true))
        .all(db)
        .await?
    {
        *completadas.entry(row.leccion_id).or_insert(0) += 1;
    }

    Ok(lecciones
        .into_iter()
        .map(|l| AssignmentLesson {
            total_estudiantes_completado: completadas.get(&l.id).copied().unwrap_or(0),
            id: l.id,
            titulo: l.titulo,
            descripcion: l.descripcion,
            nivel: l.nivel,
            duracion_minutos: l.duracion_minutos,
            orden: l.orden,
            estado: l.estado,
        })
        .collect())
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TeacherInfo {
    pub id: i32,
    pub nombre: String,
    pub primer_apellido: String,
    pub nivel: String,
    pub idioma: String,
}

/// Teacher identity plus assignment, for the dashboard header. `None` when
/// the teacher has no active assignment.
pub async fn teacher_info(
    db: &DatabaseConnection,
    profesor: &user::Model,
) -> Result<Option<TeacherInfo>, DbErr> {
    let asignacion = match active_assignment(db, profesor.id).await? {
        Some(asignacion) => asignacion,
        None => return Ok(None),
    };

    Ok(Some(TeacherInfo {
        id: profesor.id,
        nombre: profesor.nombre.clone(),
        primer_apellido: profesor.primer_apellido.clone(),
        nivel: asignacion.nivel,
        idioma: asignacion.idioma,
    }))
}
