use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::lesson;
use crate::entities::lesson_progress;
use crate::entities::student_profile;
use crate::entities::student_stats::{self, Entity as StudentStats};
use crate::entities::user::{self, AccountState, UserRole};
use crate::entities::user_achievement;
use crate::services::lesson_service::Pagination;

/// Recomputes the denormalized `estadisticas_estudiante` row from the
/// student's progress rows. Called after each completion; failures here are
/// logged by the caller and do not abort the completion chain.
pub async fn refresh_student_stats(db: &DatabaseConnection, usuario_id: i32) -> Result<(), DbErr> {
    let rows = lesson_progress::Entity::find()
        .filter(lesson_progress::Column::UsuarioId.eq(usuario_id))
        .all(db)
        .await?;

    let iniciadas = rows.len() as i32;
    let completadas = rows.iter().filter(|r| r.completada).count() as i32;
    let promedio = if iniciadas > 0 {
        rows.iter().map(|r| r.progreso as f64).sum::<f64>() / iniciadas as f64
    } else {
        0.0
    };
    let tiempo_minutos: i32 = rows.iter().map(|r| r.tiempo_total_segundos / 60).sum();

    match StudentStats::find_by_id(usuario_id).one(db).await? {
        Some(existing) => {
            let mut active = existing.into_active_model();
            active.lecciones_completadas = Set(completadas);
            active.lecciones_en_progreso = Set(iniciadas - completadas);
            active.promedio_general = Set(promedio);
            active.tiempo_total_estudio = Set(tiempo_minutos);
            active.ultima_actualizacion = Set(Utc::now());
            active.update(db).await?;
        }
        None => {
            student_stats::ActiveModel {
                usuario_id: Set(usuario_id),
                lecciones_completadas: Set(completadas),
                lecciones_en_progreso: Set(iniciadas - completadas),
                promedio_general: Set(promedio),
                tiempo_total_estudio: Set(tiempo_minutos),
                ultima_actualizacion: Set(Utc::now()),
            }
            .insert(db)
            .await?;
        }
    }

    Ok(())
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryCount {
    pub categoria: String,
    pub cantidad: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DailyActivity {
    pub fecha: NaiveDate,
    pub estudiantes_activos: i64,
    pub lecciones_completadas: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PopularLesson {
    pub id: i32,
    pub titulo: String,
    pub nivel: String,
    pub idioma: String,
    pub veces_completada: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GeneralOverview {
    pub total_estudiantes: i64,
    pub estudiantes_con_progreso: i64,
    pub total_lecciones_completadas: i64,
    pub promedio_xp: i64,
    pub horas_totales_estudio: i64,
    pub estudiantes_por_nivel: Vec<CategoryCount>,
    pub estudiantes_por_idioma: Vec<CategoryCount>,
    pub actividad_reciente: Vec<DailyActivity>,
    pub lecciones_populares: Vec<PopularLesson>,
}

/// Read-side rollup across every active student, for the teacher dashboard.
pub async fn general_overview(db: &DatabaseConnection) -> Result<GeneralOverview, DbErr> {
    let (alumnos, perfiles) = active_students(db).await?;
    let usuario_ids: Vec<i32> = alumnos.keys().copied().collect();

    let progreso = lesson_progress::Entity::find()
        .filter(lesson_progress::Column::UsuarioId.is_in(usuario_ids))
        .all(db)
        .await?;

    let con_progreso: std::collections::HashSet<i32> =
        progreso.iter().map(|r| r.usuario_id).collect();
    let completadas: Vec<&lesson_progress::Model> =
        progreso.iter().filter(|r| r.completada).collect();

    let promedio_xp = if perfiles.is_empty() {
        0
    } else {
        (perfiles.values().map(|p| p.total_xp as f64).sum::<f64>() / perfiles.len() as f64).round()
            as i64
    };
    let horas_totales = progreso
        .iter()
        .map(|r| r.tiempo_total_segundos as i64)
        .sum::<i64>()
        / 3600;

    let mut por_nivel: BTreeMap<String, i64> = BTreeMap::new();
    let mut por_idioma: BTreeMap<String, i64> = BTreeMap::new();
    for perfil in perfiles.values() {
        *por_nivel.entry(perfil.nivel_actual.clone()).or_insert(0) += 1;
        *por_idioma
            .entry(perfil.idioma_aprendizaje.clone())
            .or_insert(0) += 1;
    }

    // Activity over the last 7 days
    let desde = Utc::now() - Duration::days(7);
    let mut actividad: BTreeMap<NaiveDate, (std::collections::HashSet<i32>, i64)> = BTreeMap::new();
    for row in completadas.iter() {
        if let Some(fecha) = row.fecha_completado {
            if fecha >= desde {
                let entrada = actividad.entry(fecha.date_naive()).or_default();
                entrada.0.insert(row.usuario_id);
                entrada.1 += 1;
            }
        }
    }

    // Top 5 most-completed lessons
    let mut completadas_por_leccion: HashMap<i32, i64> = HashMap::new();
    for row in completadas.iter() {
        *completadas_por_leccion.entry(row.leccion_id).or_insert(0) += 1;
    }
    let mut populares: Vec<(i32, i64)> = completadas_por_leccion.into_iter().collect();
    populares.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    populares.truncate(5);

    let leccion_ids: Vec<i32> = populares.iter().map(|(id, _)| *id).collect();
    let lecciones: HashMap<i32, lesson::Model> = lesson::Entity::find()
        .filter(lesson::Column::Id.is_in(leccion_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|l| (l.id, l))
        .collect();

    Ok(GeneralOverview {
        total_estudiantes: alumnos.len() as i64,
        estudiantes_con_progreso: con_progreso.len() as i64,
        total_lecciones_completadas: completadas.len() as i64,
        promedio_xp,
        horas_totales_estudio: horas_totales,
        estudiantes_por_nivel: por_nivel
            .into_iter()
            .map(|(categoria, cantidad)| CategoryCount {
                categoria,
                cantidad,
            })
            .collect(),
        estudiantes_por_idioma: por_idioma
            .into_iter()
            .map(|(categoria, cantidad)| CategoryCount {
                categoria,
                cantidad,
            })
            .collect(),
        actividad_reciente: actividad
            .into_iter()
            .map(|(fecha, (estudiantes, lecciones))| DailyActivity {
                fecha,
                estudiantes_activos: estudiantes.len() as i64,
                lecciones_completadas: lecciones,
            })
            .collect(),
        lecciones_populares: populares
            .into_iter()
            .filter_map(|(id, veces)| {
                lecciones.get(&id).map(|l| PopularLesson {
                    id,
                    titulo: l.titulo.clone(),
                    nivel: l.nivel.clone(),
                    idioma: l.idioma.clone(),
                    veces_completada: veces,
                })
            })
            .collect(),
    })
}

#[derive(Debug, Default, Clone)]
pub struct StudentListFilters {
    pub nivel: Option<String>,
    pub idioma: Option<String>,
    pub orden: Option<String>,
    pub pagina: u64,
    pub limite: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StudentOverview {
    pub id: i32,
    pub nombre: String,
    pub primer_apellido: String,
    pub correo: String,
    pub nivel_actual: String,
    pub idioma_aprendizaje: String,
    pub total_xp: i32,
    pub ultima_actividad: Option<chrono::DateTime<Utc>>,
    pub lecciones_iniciadas: i64,
    pub lecciones_completadas: i64,
    pub promedio_progreso: i32,
}

/// Filtered, ordered, paginated listing of active students with per-student
/// aggregates.
pub async fn student_list(
    db: &DatabaseConnection,
    filters: StudentListFilters,
) -> Result<(Vec<StudentOverview>, Pagination), DbErr> {
    let (alumnos, perfiles) = active_students(db).await?;

    let mut overviews = Vec::new();
    for (usuario_id, perfil) in perfiles.iter() {
        if let Some(nivel) = &filters.nivel {
            if &perfil.nivel_actual != nivel {
                continue;
            }
        }
        if let Some(idioma) = &filters.idioma {
            if &perfil.idioma_aprendizaje != idioma {
                continue;
            }
        }

        let usuario = &alumnos[usuario_id];
        overviews.push(StudentOverview {
            id: *usuario_id,
            nombre: usuario.nombre.clone(),
            primer_apellido: usuario.primer_apellido.clone(),
            correo: usuario.correo.clone(),
            nivel_actual: perfil.nivel_actual.clone(),
            idioma_aprendizaje: perfil.idioma_aprendizaje.clone(),
            total_xp: perfil.total_xp,
            ultima_actividad: perfil.ultima_actividad,
            lecciones_iniciadas: 0,
            lecciones_completadas: 0,
            promedio_progreso: 0,
        });
    }

    let ids: Vec<i32> = overviews.iter().map(|o| o.id).collect();
    let mut agregados: HashMap<i32, (i64, i64, i64, i64)> = HashMap::new();
    for row in lesson_progress::Entity::find()
        .filter(lesson_progress::Column::UsuarioId.is_in(ids))
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
    for overview in overviews.iter_mut() {
        if let Some((iniciadas, completadas, suma_progreso, _)) = agregados.get(&overview.id) {
            overview.lecciones_iniciadas = *iniciadas;
            overview.lecciones_completadas = *completadas;
            overview.promedio_progreso = if *iniciadas > 0 {
                (*suma_progreso as f64 / *iniciadas as f64).round() as i32
            } else {
                0
            };
        }
    }

    match filters.orden.as_deref() {
        Some("xp") => overviews.sort_by(|a, b| b.total_xp.cmp(&a.total_xp)),
        Some("progreso") => {
            overviews.sort_by(|a, b| b.lecciones_completadas.cmp(&a.lecciones_completadas))
        }
        Some("actividad") => overviews.sort_by(|a, b| b.ultima_actividad.cmp(&a.ultima_actividad)),
        _ => overviews.sort_by(|a, b| {
            (a.nombre.clone(), a.primer_apellido.clone())
                .cmp(&(b.nombre.clone(), b.primer_apellido.clone()))
        }),
    }

    let pagina = filters.pagina.max(1);
    let limite = filters.limite.clamp(1, 100);
    let total = overviews.len() as u64;

    let page: Vec<StudentOverview> = overviews
        .into_iter()
        .skip(((pagina - 1) * limite) as usize)
        .take(limite as usize)
        .collect();

    Ok((
        page,
        Pagination {
            pagina,
            limite,
            total,
            total_paginas: total.div_ceil(limite),
        },
    ))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LevelProgress {
    pub nivel: String,
    pub total_lecciones: i64,
    pub completadas: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompletedLesson {
    pub titulo: String,
    pub nivel: String,
    pub fecha_completada: chrono::DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StudentDetail {
    pub estudiante: StudentOverview,
    pub horas_estudio: i64,
    pub progreso_por_nivel: Vec<LevelProgress>,
    pub ultimas_lecciones: Vec<CompletedLesson>,
    pub logros: Vec<user_achievement::Model>,
}

/// Detailed read-side view of one student; `None` when the id is not an
/// alumno account.
pub async fn student_detail(
    db: &DatabaseConnection,
    estudiante_id: i32,
) -> Result<Option<StudentDetail>, DbErr> {
    let usuario = match user::Entity::find_by_id(estudiante_id).one(db).await? {
        Some(u) if UserRole::from(u.rol.clone()) == UserRole::Alumno => u,
        _ => return Ok(None),
    };
    let perfil = match student_profile::Entity::find_by_id(estudiante_id)
        .one(db)
        .await?
    {
        Some(p) => p,
        None => return Ok(None),
    };

    let progreso = lesson_progress::Entity::find()
        .filter(lesson_progress::Column::UsuarioId.eq(estudiante_id))
        .all(db)
        .await?;

    let iniciadas = progreso.len() as i64;
    let completadas = progreso.iter().filter(|r| r.completada).count() as i64;
    let promedio = if iniciadas > 0 {
        (progreso.iter().map(|r| r.progreso as f64).sum::<f64>() / iniciadas as f64).round() as i32
    } else {
        0
    };
    let horas = progreso
        .iter()
        .map(|r| r.tiempo_total_segundos as i64)
        .sum::<i64>()
        / 3600;

    // Per-level coverage within the student's language
    let lecciones_idioma = lesson::Entity::find()
        .filter(lesson::Column::Idioma.eq(perfil.idioma_aprendizaje.clone()))
        .all(db)
        .await?;
    let completadas_ids: std::collections::HashSet<i32> = progreso
        .iter()
        .filter(|r| r.completada)
        .map(|r| r.leccion_id)
        .collect();
    let mut por_nivel: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    for leccion in &lecciones_idioma {
        let entrada = por_nivel.entry(leccion.nivel.clone()).or_insert((0, 0));
        entrada.0 += 1;
        if completadas_ids.contains(&leccion.id) {
            entrada.1 += 1;
        }
    }

    // Last 10 completed lessons
    let mut completados: Vec<&lesson_progress::Model> =
        progreso.iter().filter(|r| r.completada).collect();
    completados.sort_by(|a, b| b.fecha_completado.cmp(&a.fecha_completado));
    completados.truncate(10);
    let titulos: HashMap<i32, &lesson::Model> =
        lecciones_idioma.iter().map(|l| (l.id, l)).collect();

    let logros = user_achievement::Entity::find()
        .filter(user_achievement::Column::UsuarioId.eq(estudiante_id))
        .order_by_desc(user_achievement::Column::DesbloqueadoEn)
        .all(db)
        .await?;

    Ok(Some(StudentDetail {
        estudiante: StudentOverview {
            id: usuario.id,
            nombre: usuario.nombre,
            primer_apellido: usuario.primer_apellido,
            correo: usuario.correo,
            nivel_actual: perfil.nivel_actual,
            idioma_aprendizaje: perfil.idioma_aprendizaje,
            total_xp: perfil.total_xp,
            ultima_actividad: perfil.ultima_actividad,
            lecciones_iniciadas: iniciadas,
            lecciones_completadas: completadas,
            promedio_progreso: promedio,
        },
        horas_estudio: horas,
        progreso_por_nivel: por_nivel
            .into_iter()
            .map(|(nivel, (total, hechas))| LevelProgress {
                nivel,
                total_lecciones: total,
                completadas: hechas,
            })
            .collect(),
        ultimas_lecciones: completados
            .into_iter()
            .filter_map(|r| {
                match (titulos.get(&r.leccion_id), r.fecha_completado) {
                    (Some(l), Some(fecha)) => Some(CompletedLesson {
                        titulo: l.titulo.clone(),
                        nivel: l.nivel.clone(),
                        fecha_completada: fecha,
                    }),
                    _ => None,
                }
            })
            .collect(),
        logros,
    }))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AlertStudent {
    pub id: i32,
    pub nombre: String,
    pub primer_apellido: String,
    pub correo: String,
    pub nivel_actual: String,
    pub idioma_aprendizaje: String,
    pub ultima_actividad: Option<chrono::DateTime<Utc>>,
    pub dias_sin_actividad: i64,
    pub lecciones_mes: i64,
    pub promedio_progreso: i32,
    pub motivo_alerta: String,
}

/// Students needing attention: inactive for a week AND (low average progress
/// OR fewer than 3 completions in the last 30 days). Capped at 20 rows,
/// longest-inactive first.
pub async fn alert_students(db: &DatabaseConnection) -> Result<Vec<AlertStudent>, DbErr> {
    let (alumnos, perfiles) = active_students(db).await?;
    let ahora = Utc::now();
    let hace_7_dias = ahora - Duration::days(7);
    let hace_30_dias = ahora - Duration::days(30);

    let usuario_ids: Vec<i32> = alumnos.keys().copied().collect();
    let progreso = lesson_progress::Entity::find()
        .filter(lesson_progress::Column::UsuarioId.is_in(usuario_ids))
        .all(db)
        .await?;

    let mut por_usuario: HashMap<i32, Vec<&lesson_progress::Model>> = HashMap::new();
    for row in &progreso {
        por_usuario.entry(row.usuario_id).or_default().push(row);
    }

    let mut alertas = Vec::new();
    for (usuario_id, perfil) in perfiles.iter() {
        let inactivo = perfil
            .ultima_actividad
            .map(|t| t < hace_7_dias)
            .unwrap_or(true);
        if !inactivo {
            continue;
        }

        let rows = por_usuario.get(usuario_id);
        let promedio = rows
            .map(|rows| {
                if rows.is_empty() {
                    0
                } else {
                    (rows.iter().map(|r| r.progreso as f64).sum::<f64>() / rows.len() as f64)
                        .round() as i32
                }
            })
            .unwrap_or(0);
        let lecciones_mes = rows
            .map(|rows| {
                rows.iter()
                    .filter(|r| {
                        r.completada
                            && r.fecha_completado
                                .map(|f| f >= hace_30_dias)
                                .unwrap_or(false)
                    })
                    .count() as i64
            })
            .unwrap_or(0);

        if promedio >= 30 && lecciones_mes >= 3 {
            continue;
        }

        let dias_sin_actividad = perfil
            .ultima_actividad
            .map(|t| (ahora - t).num_days())
            .unwrap_or(i64::MAX);

        let mut motivos = Vec::new();
        if dias_sin_actividad >= 7 {
            if dias_sin_actividad == i64::MAX {
                motivos.push("Sin actividad registrada".to_string());
            } else {
                motivos.push(format!("Sin actividad por {} días", dias_sin_actividad));
            }
        }
        if promedio < 30 {
            motivos.push(format!("Progreso bajo ({}%)", promedio));
        }
        if lecciones_mes < 3 {
            motivos.push(format!("Solo {} lecciones este mes", lecciones_mes));
        }

        let usuario = &alumnos[usuario_id];
        alertas.push(AlertStudent {
            id: *usuario_id,
            nombre: usuario.nombre.clone(),
            primer_apellido: usuario.primer_apellido.clone(),
            correo: usuario.correo.clone(),
            nivel_actual: perfil.nivel_actual.clone(),
            idioma_aprendizaje: perfil.idioma_aprendizaje.clone(),
            ultima_actividad: perfil.ultima_actividad,
            dias_sin_actividad,
            lecciones_mes,
            promedio_progreso: promedio,
            motivo_alerta: motivos.join(" · "),
        });
    }

    alertas.sort_by(|a, b| b.dias_sin_actividad.cmp(&a.dias_sin_actividad));
    alertas.truncate(20);

    Ok(alertas)
}

/// Active alumno accounts and their profiles, keyed by user id.
async fn active_students(
    db: &DatabaseConnection,
) -> Result<
    (
        HashMap<i32, user::Model>,
        HashMap<i32, student_profile::Model>,
    ),
    DbErr,
> {
    let alumnos: HashMap<i32, user::Model> = user::Entity::find()
        .filter(user::Column::Rol.eq(UserRole::Alumno.as_str()))
        .filter(user::Column::EstadoCuenta.eq(AccountState::Activo.as_str()))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let perfiles: HashMap<i32, student_profile::Model> = student_profile::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .filter(|p| alumnos.contains_key(&p.usuario_id))
        .map(|p| (p.usuario_id, p))
        .collect();

    Ok((alumnos, perfiles))
}
