mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

#[tokio::test]
async fn test_global_leaderboard_orders_by_xp() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let primero = common::create_test_student(db.as_ref(), "oro@x.com", "A1", "Inglés")
        .await
        .unwrap();
    let segundo = common::create_test_student(db.as_ref(), "plata@x.com", "B1", "Inglés")
        .await
        .unwrap();
    let tercero = common::create_test_student(db.as_ref(), "bronce@x.com", "A1", "Francés")
        .await
        .unwrap();

    common::set_student_gamification(db.as_ref(), primero.id, 300, 0, None)
        .await
        .unwrap();
    common::set_student_gamification(db.as_ref(), segundo.id, 200, 0, None)
        .await
        .unwrap();
    common::set_student_gamification(db.as_ref(), tercero.id, 100, 0, None)
        .await
        .unwrap();

    let token = common::create_test_token(&tercero);
    let response = app
        .oneshot(common::create_authorized_request(
            Method::GET,
            "/api/gamificacion/leaderboard/global",
            &token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = common::parse_json(response.into_body()).await;
    let ranking = body["ranking"].as_array().unwrap();
    assert_eq!(ranking.len(), 3);
    assert_eq!(ranking[0]["id"], json!(primero.id));
    assert_eq!(ranking[0]["posicion"], json!(1));
    assert_eq!(ranking[1]["id"], json!(segundo.id));
    assert_eq!(ranking[2]["id"], json!(tercero.id));

    // The requesting student sees their own position
    assert_eq!(body["mi_posicion"], json!(3));
    assert_eq!(body["total_participantes"], json!(3));
}

#[tokio::test]
async fn test_leaderboard_excludes_inactive_accounts() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};
    use speaklexi_backend::entities::user::AccountState;

    let activo = common::create_test_student(db.as_ref(), "activo@x.com", "A1", "Inglés")
        .await
        .unwrap();
    let bloqueado = common::create_test_student(db.as_ref(), "fuera@x.com", "A1", "Inglés")
        .await
        .unwrap();
    common::set_student_gamification(db.as_ref(), bloqueado.id, 999, 0, None)
        .await
        .unwrap();

    let mut active = bloqueado.into_active_model();
    active.estado_cuenta = Set(AccountState::Bloqueado.as_str().to_string());
    active.update(db.as_ref()).await.unwrap();

    let token = common::create_test_token(&activo);
    let response = app
        .oneshot(common::create_authorized_request(
            Method::GET,
            "/api/gamificacion/leaderboard/top10",
            &token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = common::parse_json(response.into_body()).await;
    let top10 = body["top10"].as_array().unwrap();
    assert_eq!(top10.len(), 1);
    assert_eq!(top10[0]["id"], json!(activo.id));
}

#[tokio::test]
async fn test_level_leaderboard_validates_cefr() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let alumno = common::create_test_student(db.as_ref(), "nivel@x.com", "B1", "Inglés")
        .await
        .unwrap();
    let token = common::create_test_token(&alumno);

    let response = app
        .clone()
        .oneshot(common::create_authorized_request(
            Method::GET,
            "/api/gamificacion/leaderboard/nivel/Z9",
            &token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // A valid level only ranks students at that level
    let response = app
        .oneshot(common::create_authorized_request(
            Method::GET,
            "/api/gamificacion/leaderboard/nivel/B1",
            &token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = common::parse_json(response.into_body()).await;
    assert_eq!(body["nivel"], json!("B1"));
    assert_eq!(body["total_participantes"], json!(1));
}

#[tokio::test]
async fn test_points_follow_level_curve() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let alumno = common::create_test_student(db.as_ref(), "curva@x.com", "A2", "Inglés")
        .await
        .unwrap();
    common::set_student_gamification(db.as_ref(), alumno.id, 250, 0, None)
        .await
        .unwrap();

    let token = common::create_test_token(&alumno);
    let response = app
        .oneshot(common::create_authorized_request(
            Method::GET,
            "/api/gamificacion/puntos",
            &token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 250 XP: level 3 (100 XP per level), 50 XP into it
    let body: Value = common::parse_json(response.into_body()).await;
    assert_eq!(body["puntos"], json!(250));
    assert_eq!(body["nivel_actual"], json!(3));
    assert_eq!(body["siguiente_nivel_xp"], json!(300));
    assert_eq!(body["progreso_nivel"], json!(50));
    assert_eq!(body["nivel_cefr"], json!("A2"));
}

#[tokio::test]
async fn test_stale_streak_reads_as_zero() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let alumno = common::create_test_student(db.as_ref(), "racha@x.com", "A1", "Inglés")
        .await
        .unwrap();
    // 5-day streak, but the last activity was 3 days ago
    common::set_student_gamification(
        db.as_ref(),
        alumno.id,
        0,
        5,
        Some(Utc::now() - Duration::days(3)),
    )
    .await
    .unwrap();

    let token = common::create_test_token(&alumno);
    let response = app
        .oneshot(common::create_authorized_request(
            Method::GET,
            "/api/gamificacion/racha",
            &token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = common::parse_json(response.into_body()).await;
    assert_eq!(body["racha"]["dias"], json!(0));
    assert_eq!(body["racha"]["activa"], json!(false));
}

#[tokio::test]
async fn test_active_streak_is_reported() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let alumno = common::create_test_student(db.as_ref(), "activa@x.com", "A1", "Inglés")
        .await
        .unwrap();
    common::set_student_gamification(db.as_ref(), alumno.id, 0, 4, Some(Utc::now()))
        .await
        .unwrap();

    let token = common::create_test_token(&alumno);
    let response = app
        .oneshot(common::create_authorized_request(
            Method::GET,
            "/api/gamificacion/racha",
            &token,
            "",
        ))
        .await
        .unwrap();
    let body: Value = common::parse_json(response.into_body()).await;
    assert_eq!(body["racha"]["dias"], json!(4));
    assert_eq!(body["racha"]["activa"], json!(true));
}

#[tokio::test]
async fn test_points_without_profile_is_404() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    use speaklexi_backend::entities::user::{AccountState, UserRole};
    let profesor = common::create_test_user(
        db.as_ref(),
        "profe@x.com",
        "hash",
        UserRole::Profesor,
        AccountState::Activo,
    )
    .await
    .unwrap();
    let token = common::create_test_token(&profesor);

    let response = app
        .oneshot(common::create_authorized_request(
            Method::GET,
            "/api/gamificacion/puntos",
            &token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_grant_points_requires_role_and_fields() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let alumno = common::create_test_student(db.as_ref(), "meta@x.com", "A1", "Inglés")
        .await
        .unwrap();
    let profesor = common::create_test_teacher(db.as_ref(), "otorga@x.com", "A1", "Inglés")
        .await
        .unwrap();

    // Students cannot grant points
    let token_alumno = common::create_test_token(&alumno);
    let response = app
        .clone()
        .oneshot(common::create_authorized_request(
            Method::POST,
            "/api/gamificacion/otorgar-puntos",
            &token_alumno,
            json!({ "usuario_id": alumno.id, "puntos": 10, "razon": "x" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Missing fields are a 400
    let token_profesor = common::create_test_token(&profesor);
    let response = app
        .clone()
        .oneshot(common::create_authorized_request(
            Method::POST,
            "/api/gamificacion/otorgar-puntos",
            &token_profesor,
            json!({ "usuario_id": alumno.id }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // A proper grant lands on the profile and the audit trail
    let response = app
        .oneshot(common::create_authorized_request(
            Method::POST,
            "/api/gamificacion/otorgar-puntos",
            &token_profesor,
            json!({ "usuario_id": alumno.id, "puntos": 25, "razon": "Participación en clase" })
                .to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = common::parse_json(response.into_body()).await;
    assert_eq!(body["resultado"]["total_xp"], json!(25));
}

#[tokio::test]
async fn test_achievement_catalog_reports_unlocks() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let alumno = common::create_test_student(db.as_ref(), "logros@x.com", "A1", "Inglés")
        .await
        .unwrap();
    let leccion = common::create_test_lesson(db.as_ref(), "A1", "Inglés", 30, alumno.id)
        .await
        .unwrap();
    let token = common::create_test_token(&alumno);

    app.clone()
        .oneshot(common::create_authorized_request(
            Method::POST,
            &format!("/api/lecciones/{}/progreso", leccion.id),
            &token,
            json!({ "progreso": 100 }).to_string(),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(common::create_authorized_request(
            Method::GET,
            "/api/gamificacion/logros",
            &token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = common::parse_json(response.into_body()).await;

    let logros = body["logros"].as_array().unwrap();
    let primeros_pasos = logros.iter().find(|l| l["id"] == json!(1)).unwrap();
    assert_eq!(primeros_pasos["desbloqueado"], json!(true));

    let maraton = logros.iter().find(|l| l["id"] == json!(4)).unwrap();
    assert_eq!(maraton["desbloqueado"], json!(false));

    assert_eq!(body["logros_desbloqueados"], json!(1));
}
