use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Duration, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::lesson_progress;
use crate::entities::student_profile;
use crate::entities::user::{self, AccountState, UserRole};
use crate::entities::user_achievement;
use crate::entities::xp_history;
use crate::services::user_service;

/// Base XP for completing a lesson, keyed by CEFR level.
pub fn xp_base_for_level(nivel: &str) -> i32 {
    match nivel {
        "A2" => 15,
        "B1" => 25,
        "B2" => 35,
        "C1" => 45,
        "C2" => 50,
        _ => 10, // A1 and anything unknown
    }
}

/// XP earned for completing a lesson: level base plus 2 XP per 10 minutes of
/// lesson duration, doubled for a first-time completion.
pub fn xp_for_completion(nivel: &str, duracion_minutos: i32, primera_vez: bool) -> i32 {
    let base = xp_base_for_level(nivel);
    let bonus_duracion = (duracion_minutos / 10) * 2;
    let multiplicador = if primera_vez { 2 } else { 1 };
    (base + bonus_duracion) * multiplicador
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct XpLevel {
    pub nivel: i32,
    pub siguiente_nivel_xp: i32,
    pub progreso_nivel: i32,
}

/// XP levels advance every 100 XP; `progreso_nivel` is the percentage into
/// the current level.
pub fn xp_level(total_xp: i32) -> XpLevel {
    let total = total_xp.max(0);
    let nivel = total / 100 + 1;
    XpLevel {
        nivel,
        siguiente_nivel_xp: nivel * 100,
        progreso_nivel: total % 100,
    }
}

/// Appends to the XP audit trail and bumps the profile total. Returns the new
/// total, or `None` when the user has no student profile.
pub async fn award_xp(
    db: &DatabaseConnection,
    usuario_id: i32,
    cantidad: i32,
    razon: &str,
) -> Result<Option<i32>, DbErr> {
    let perfil = match user_service::find_student_profile(db, usuario_id).await? {
        Some(perfil) => perfil,
        None => return Ok(None),
    };

    xp_history::ActiveModel {
        usuario_id: Set(usuario_id),
        cantidad: Set(cantidad),
        razon: Set(razon.to_string()),
        creado_en: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let nuevo_total = perfil.total_xp + cantidad;
    let mut active = perfil.into_active_model();
    active.total_xp = Set(nuevo_total);
    active.update(db).await?;

    Ok(Some(nuevo_total))
}

/// Daily streak update: another completion the same day keeps the count, a
/// completion on the next day extends it, anything later restarts at 1.
pub async fn update_streak(db: &DatabaseConnection, usuario_id: i32) -> Result<Option<i32>, DbErr> {
    let perfil = match user_service::find_student_profile(db, usuario_id).await? {
        Some(perfil) => perfil,
        None => return Ok(None),
    };

    let hoy = Utc::now().date_naive();
    let ultima = perfil.ultima_actividad.map(|t| t.date_naive());

    let racha = match ultima {
        Some(fecha) if fecha == hoy => perfil.racha_dias,
        Some(fecha) if hoy.pred_opt() == Some(fecha) => perfil.racha_dias + 1,
        _ => 1,
    };

    let mut active = perfil.into_active_model();
    active.racha_dias = Set(racha);
    active.ultima_actividad = Set(Some(Utc::now()));
    active.update(db).await?;

    Ok(Some(racha))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StreakStatus {
    pub dias: i32,
    pub fecha_ultima: Option<chrono::DateTime<Utc>>,
    pub activa: bool,
}

/// A streak counts as active while the last recorded activity is today or
/// yesterday; otherwise it reads as zero days until the student returns.
pub fn streak_status(perfil: &student_profile::Model) -> StreakStatus {
    let hoy = Utc::now().date_naive();
    let activa = perfil
        .ultima_actividad
        .map(|t| {
            let fecha = t.date_naive();
            fecha == hoy || hoy.pred_opt() == Some(fecha)
        })
        .unwrap_or(false);

    StreakStatus {
        dias: if activa { perfil.racha_dias } else { 0 },
        fecha_ultima: perfil.ultima_actividad,
        activa,
    }
}

pub enum AchievementCondition {
    LessonsCompleted(i64),
    StreakDays(i32),
    TotalXp(i32),
}

pub struct AchievementDef {
    pub id: i32,
    pub titulo: &'static str,
    pub descripcion: &'static str,
    pub condicion: AchievementCondition,
}

/// Static achievement catalog. Unlocks are persisted in `logros_usuario`.
pub const ACHIEVEMENT_CATALOG: &[AchievementDef] = &[
    AchievementDef {
        id: 1,
        titulo: "Primeros Pasos",
        descripcion: "Completa tu primera lección",
        condicion: AchievementCondition::LessonsCompleted(1),
    },
    AchievementDef {
        id: 2,
        titulo: "Constancia",
        descripcion: "Completa 5 lecciones",
        condicion: AchievementCondition::LessonsCompleted(5),
    },
    AchievementDef {
        id: 3,
        titulo: "Dedicación",
        descripcion: "Completa 10 lecciones",
        condicion: AchievementCondition::LessonsCompleted(10),
    },
    AchievementDef {
        id: 4,
        titulo: "Maratonista",
        descripcion: "Completa 25 lecciones",
        condicion: AchievementCondition::LessonsCompleted(25),
    },
    AchievementDef {
        id: 5,
        titulo: "Racha de 7 días",
        descripcion: "Practica durante 7 días consecutivos",
        condicion: AchievementCondition::StreakDays(7),
    },
    AchievementDef {
        id: 6,
        titulo: "Primer Centenar",
        descripcion: "Acumula 100 XP",
        condicion: AchievementCondition::TotalXp(100),
    },
    AchievementDef {
        id: 7,
        titulo: "Medio Millar",
        descripcion: "Acumula 500 XP",
        condicion: AchievementCondition::TotalXp(500),
    },
];

/// Evaluates the catalog against the student's current numbers and persists
/// any achievement crossed for the first time. Returns the newly unlocked
/// rows.
pub async fn check_achievements(
    db: &DatabaseConnection,
    usuario_id: i32,
) -> Result<Vec<user_achievement::Model>, DbErr> {
    let perfil = match user_service::find_student_profile(db, usuario_id).await? {
        Some(perfil) => perfil,
        None => return Ok(Vec::new()),
    };

    let completadas = lesson_progress::Entity::find()
        .filter(lesson_progress::Column::UsuarioId.eq(usuario_id))
        .filter(lesson_progress::Column::Completada.eq(true))
        .all(db)
        .await?
        .len() as i64;

    let desbloqueados: HashSet<i32> = user_achievement::Entity::find()
        .filter(user_achievement::Column::UsuarioId.eq(usuario_id))
        .all(db)
        .await?
        .into_iter()
        .map(|l| l.logro_id)
        .collect();

    let mut nuevos = Vec::new();
    for def in ACHIEVEMENT_CATALOG {
        if desbloqueados.contains(&def.id) {
            continue;
        }

        let cumplido = match def.condicion {
            AchievementCondition::LessonsCompleted(n) => completadas >= n,
            AchievementCondition::StreakDays(n) => perfil.racha_dias >= n,
            AchievementCondition::TotalXp(n) => perfil.total_xp >= n,
        };

        if cumplido {
            let logro = user_achievement::ActiveModel {
                usuario_id: Set(usuario_id),
                logro_id: Set(def.id),
                titulo: Set(def.titulo.to_string()),
                descripcion: Set(def.descripcion.to_string()),
                desbloqueado_en: Set(Utc::now()),
                ..Default::default()
            }
            .insert(db)
            .await?;
            nuevos.push(logro);
        }
    }

    Ok(nuevos)
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AchievementStatus {
    pub id: i32,
    pub titulo: String,
    pub descripcion: String,
    pub desbloqueado: bool,
    pub fecha_desbloqueo: Option<chrono::DateTime<Utc>>,
}

/// The full catalog annotated with the student's unlock state.
pub async fn achievements_for_user(
    db: &DatabaseConnection,
    usuario_id: i32,
) -> Result<Vec<AchievementStatus>, DbErr> {
    let desbloqueados: HashMap<i32, chrono::DateTime<Utc>> = user_achievement::Entity::find()
        .filter(user_achievement::Column::UsuarioId.eq(usuario_id))
        .all(db)
        .await?
        .into_iter()
        .map(|l| (l.logro_id, l.desbloqueado_en))
        .collect();

    Ok(ACHIEVEMENT_CATALOG
        .iter()
        .map(|def| AchievementStatus {
            id: def.id,
            titulo: def.titulo.to_string(),
            descripcion: def.descripcion.to_string(),
            desbloqueado: desbloqueados.contains_key(&def.id),
            fecha_desbloqueo: desbloqueados.get(&def.id).copied(),
        })
        .collect())
}

#[derive(Debug, Clone)]
pub enum LeaderboardScope {
    Global,
    Nivel(String),
    Idioma(String),
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardEntry {
    pub id: i32,
    pub nombre: String,
    pub primer_apellido: String,
    pub nivel_actual: String,
    pub idioma_aprendizaje: String,
    pub total_xp: i32,
    pub lecciones_completadas: i64,
    pub posicion: u64,
}

pub struct Leaderboard {
    pub ranking: Vec<LeaderboardEntry>,
    pub total_participantes: u64,
}

/// Ranking over active students: XP first, completed lessons as tie-breaker.
/// Positions are assigned in the application layer over the ordered set.
pub async fn leaderboard(
    db: &DatabaseConnection,
    scope: LeaderboardScope,
    limite: u64,
    offset: u64,
) -> Result<Leaderboard, DbErr> {
    let entries = ranked_students(db, &scope).await?;
    let total = entries.len() as u64;

    let ranking = entries
        .into_iter()
        .skip(offset as usize)
        .take(limite as usize)
        .collect();

    Ok(Leaderboard {
        ranking,
        total_participantes: total,
    })
}

/// 1-based position of one student in the global ranking, with the total
/// field size.
pub async fn user_position(
    db: &DatabaseConnection,
    usuario_id: i32,
) -> Result<Option<(u64, u64)>, DbErr> {
    let entries = ranked_students(db, &LeaderboardScope::Global).await?;
    let total = entries.len() as u64;

    Ok(entries
        .iter()
        .find(|e| e.id == usuario_id)
        .map(|e| (e.posicion, total)))
}

async fn ranked_students(
    db: &DatabaseConnection,
    scope: &LeaderboardScope,
) -> Result<Vec<LeaderboardEntry>, DbErr> {
    let alumnos: HashMap<i32, user::Model> = user::Entity::find()
        .filter(user::Column::Rol.eq(UserRole::Alumno.as_str()))
        .filter(user::Column::EstadoCuenta.eq(AccountState::Activo.as_str()))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let mut perfiles = student_profile::Entity::find();
    match scope {
        LeaderboardScope::Global => {}
        LeaderboardScope::Nivel(nivel) => {
            perfiles = perfiles.filter(student_profile::Column::NivelActual.eq(nivel));
        }
        LeaderboardScope::Idioma(idioma) => {
            perfiles = perfiles.filter(student_profile::Column::IdiomaAprendizaje.eq(idioma));
        }
    }
    let perfiles: Vec<student_profile::Model> = perfiles
        .all(db)
        .await?
        .into_iter()
        .filter(|p| alumnos.contains_key(&p.usuario_id))
        .collect();

    let usuario_ids: Vec<i32> = perfiles.iter().map(|p| p.usuario_id).collect();
    let mut completadas: HashMap<i32, i64> = HashMap::new();
    for row in lesson_progress::Entity::find()
        .filter(lesson_progress::Column::UsuarioId.is_in(usuario_ids))
        .filter(lesson_progress::Column::Completada.eq(true))
        .all(db)
        .await?
    {
        *completadas.entry(row.usuario_id).or_insert(0) += 1;
    }

    let mut entries: Vec<LeaderboardEntry> = perfiles
        .into_iter()
        .map(|perfil| {
            let usuario = &alumnos[&perfil.usuario_id];
            LeaderboardEntry {
                id: perfil.usuario_id,
                nombre: usuario.nombre.clone(),
                primer_apellido: usuario.primer_apellido.clone(),
                nivel_actual: perfil.nivel_actual,
                idioma_aprendizaje: perfil.idioma_aprendizaje,
                total_xp: perfil.total_xp,
                lecciones_completadas: completadas.get(&perfil.usuario_id).copied().unwrap_or(0),
                posicion: 0,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.total_xp
            .cmp(&a.total_xp)
            .then(b.lecciones_completadas.cmp(&a.lecciones_completadas))
            .then(a.id.cmp(&b.id))
    });
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.posicion = i as u64 + 1;
    }

    Ok(entries)
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DailyProgress {
    pub fecha: NaiveDate,
    pub lecciones_completadas: i64,
    pub xp_ganado: i64,
}

/// Completions and XP per day over the last 7 days.
pub async fn weekly_progress(
    db: &DatabaseConnection,
    usuario_id: i32,
) -> Result<Vec<DailyProgress>, DbErr> {
    let desde = Utc::now() - Duration::days(7);

    let rows = lesson_progress::Entity::find()
        .filter(lesson_progress::Column::UsuarioId.eq(usuario_id))
        .filter(lesson_progress::Column::Completada.eq(true))
        .filter(lesson_progress::Column::FechaCompletado.gte(desde))
        .all(db)
        .await?;

    let mut por_dia: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
    for row in rows {
        if let Some(fecha) = row.fecha_completado {
            let entrada = por_dia.entry(fecha.date_naive()).or_insert((0, 0));
            entrada.0 += 1;
            entrada.1 += row.xp_ganados as i64;
        }
    }

    Ok(por_dia
        .into_iter()
        .map(|(fecha, (lecciones, xp))| DailyProgress {
            fecha,
            lecciones_completadas: lecciones,
            xp_ganado: xp,
        })
        .collect())
}
