mod common;

use axum::http::{Method, StatusCode};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use speaklexi_backend::entities::{lesson_progress, student_profile, xp_history};

#[tokio::test]
async fn test_progress_out_of_range_is_rejected() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let alumno = common::create_test_student(db.as_ref(), "rango@x.com", "A1", "Inglés")
        .await
        .unwrap();
    let leccion = common::create_test_lesson(db.as_ref(), "A1", "Inglés", 30, alumno.id)
        .await
        .unwrap();
    let token = common::create_test_token(&alumno);

    for progreso in [-10, 101, 500] {
        let response = app
            .clone()
            .oneshot(common::create_authorized_request(
                Method::POST,
                &format!("/api/lecciones/{}/progreso", leccion.id),
                &token,
                json!({ "progreso": progreso }).to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // Nothing was written
    let total = lesson_progress::Entity::find()
        .count(db.as_ref())
        .await
        .unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_progress_unknown_lesson_is_404() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let alumno = common::create_test_student(db.as_ref(), "sin@x.com", "A1", "Inglés")
        .await
        .unwrap();
    let token = common::create_test_token(&alumno);

    let response = app
        .oneshot(common::create_authorized_request(
            Method::POST,
            "/api/lecciones/9999/progreso",
            &token,
            json!({ "progreso": 50 }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_first_completion_awards_expected_xp() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let alumno = common::create_test_student(db.as_ref(), "xp@x.com", "A1", "Inglés")
        .await
        .unwrap();
    // A1 lesson of 30 minutes: (10 base + 6 duration bonus) * 2 first-time = 32
    let leccion = common::create_test_lesson(db.as_ref(), "A1", "Inglés", 30, alumno.id)
        .await
        .unwrap();
    let token = common::create_test_token(&alumno);

    let response = app
        .oneshot(common::create_authorized_request(
            Method::POST,
            &format!("/api/lecciones/{}/progreso", leccion.id),
            &token,
            json!({ "progreso": 100, "tiempo_segundos": 1800 }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = common::parse_json(response.into_body()).await;
    assert_eq!(body["data"]["completada"], json!(true));
    assert_eq!(body["data"]["xp_ganado"], json!(32));
    assert_eq!(body["data"]["es_primera_vez"], json!(true));
    assert_eq!(body["data"]["racha_dias"], json!(1));

    // First completion unlocks the first-lesson achievement
    let logros = body["data"]["logros_desbloqueados"].as_array().unwrap();
    assert!(logros.iter().any(|l| l["logro_id"] == json!(1)));

    // Profile and audit trail agree
    let perfil = student_profile::Entity::find_by_id(alumno.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(perfil.total_xp, 32);
    assert_eq!(perfil.racha_dias, 1);

    let historial = xp_history::Entity::find()
        .filter(xp_history::Column::UsuarioId.eq(alumno.id))
        .all(db.as_ref())
        .await
        .unwrap();
    assert_eq!(historial.len(), 1);
    assert_eq!(historial[0].cantidad, 32);
}

#[tokio::test]
async fn test_repeated_completion_never_double_awards() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let alumno = common::create_test_student(db.as_ref(), "repite@x.com", "A1", "Inglés")
        .await
        .unwrap();
    let leccion = common::create_test_lesson(db.as_ref(), "A1", "Inglés", 30, alumno.id)
        .await
        .unwrap();
    let token = common::create_test_token(&alumno);

    let response = app
        .clone()
        .oneshot(common::create_authorized_request(
            Method::POST,
            &format!("/api/lecciones/{}/progreso", leccion.id),
            &token,
            json!({ "progreso": 100 }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // A client retry of the same 100% submission
    let response = app
        .oneshot(common::create_authorized_request(
            Method::POST,
            &format!("/api/lecciones/{}/progreso", leccion.id),
            &token,
            json!({ "progreso": 100 }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = common::parse_json(response.into_body()).await;
    assert_eq!(body["mensaje"], json!("Progreso actualizado"));
    assert!(body["data"]["xp_ganado"].is_null());

    // XP awarded exactly once
    let perfil = student_profile::Entity::find_by_id(alumno.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(perfil.total_xp, 32);

    let eventos = xp_history::Entity::find()
        .filter(xp_history::Column::UsuarioId.eq(alumno.id))
        .count(db.as_ref())
        .await
        .unwrap();
    assert_eq!(eventos, 1);

    // Still a single progress row for the pair
    let filas = lesson_progress::Entity::find()
        .filter(lesson_progress::Column::UsuarioId.eq(alumno.id))
        .count(db.as_ref())
        .await
        .unwrap();
    assert_eq!(filas, 1);
}

#[tokio::test]
async fn test_partial_progress_awards_nothing() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let alumno = common::create_test_student(db.as_ref(), "parcial@x.com", "A1", "Inglés")
        .await
        .unwrap();
    let leccion = common::create_test_lesson(db.as_ref(), "A1", "Inglés", 30, alumno.id)
        .await
        .unwrap();
    let token = common::create_test_token(&alumno);

    let response = app
        .oneshot(common::create_authorized_request(
            Method::POST,
            &format!("/api/lecciones/{}/progreso", leccion.id),
            &token,
            json!({ "progreso": 60, "tiempo_segundos": 300 }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = common::parse_json(response.into_body()).await;
    assert_eq!(body["data"]["completada"], json!(false));

    let perfil = student_profile::Entity::find_by_id(alumno.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(perfil.total_xp, 0);
}

#[tokio::test]
async fn test_higher_level_lesson_pays_more() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let alumno = common::create_test_student(db.as_ref(), "b2@x.com", "B2", "Francés")
        .await
        .unwrap();
    // B2 lesson of 45 minutes: (35 + 8) * 2 = 86
    let leccion = common::create_test_lesson(db.as_ref(), "B2", "Francés", 45, alumno.id)
        .await
        .unwrap();
    let token = common::create_test_token(&alumno);

    let response = app
        .oneshot(common::create_authorized_request(
            Method::POST,
            &format!("/api/lecciones/{}/progreso", leccion.id),
            &token,
            json!({ "progreso": 100 }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = common::parse_json(response.into_body()).await;
    assert_eq!(body["data"]["xp_ganado"], json!(86));
}

#[tokio::test]
async fn test_completion_refreshes_statistics_snapshot() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let alumno = common::create_test_student(db.as_ref(), "stats@x.com", "A1", "Inglés")
        .await
        .unwrap();
    let leccion_a = common::create_test_lesson(db.as_ref(), "A1", "Inglés", 30, alumno.id)
        .await
        .unwrap();
    let leccion_b = common::create_test_lesson(db.as_ref(), "A1", "Inglés", 30, alumno.id)
        .await
        .unwrap();
    let token = common::create_test_token(&alumno);

    // One completed lesson, one halfway
    app.clone()
        .oneshot(common::create_authorized_request(
            Method::POST,
            &format!("/api/lecciones/{}/progreso", leccion_a.id),
            &token,
            json!({ "progreso": 50, "tiempo_segundos": 120 }).to_string(),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(common::create_authorized_request(
            Method::POST,
            &format!("/api/lecciones/{}/progreso", leccion_b.id),
            &token,
            json!({ "progreso": 100, "tiempo_segundos": 600 }).to_string(),
        ))
        .await
        .unwrap();

    let stats = speaklexi_backend::entities::student_stats::Entity::find_by_id(alumno.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.lecciones_completadas, 1);
    assert_eq!(stats.lecciones_en_progreso, 1);
    assert_eq!(stats.promedio_general.round() as i32, 75);

    // The summary endpoint reads the same numbers
    let response = app
        .oneshot(common::create_authorized_request(
            Method::GET,
            "/api/progreso/resumen",
            &token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = common::parse_json(response.into_body()).await;
    assert_eq!(body["resumen"]["lecciones_completadas"], json!(1));
    assert_eq!(body["resumen"]["lecciones_iniciadas"], json!(2));
}

#[tokio::test]
async fn test_history_filters_by_type() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let alumno = common::create_test_student(db.as_ref(), "hist@x.com", "A1", "Inglés")
        .await
        .unwrap();
    let leccion_a = common::create_test_lesson(db.as_ref(), "A1", "Inglés", 30, alumno.id)
        .await
        .unwrap();
    let leccion_b = common::create_test_lesson(db.as_ref(), "A1", "Inglés", 30, alumno.id)
        .await
        .unwrap();
    let token = common::create_test_token(&alumno);

    app.clone()
        .oneshot(common::create_authorized_request(
            Method::POST,
            &format!("/api/lecciones/{}/progreso", leccion_a.id),
            &token,
            json!({ "progreso": 100 }).to_string(),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(common::create_authorized_request(
            Method::POST,
            &format!("/api/lecciones/{}/progreso", leccion_b.id),
            &token,
            json!({ "progreso": 30 }).to_string(),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(common::create_authorized_request(
            Method::GET,
            "/api/progreso/historial?tipo=completados",
            &token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = common::parse_json(response.into_body()).await;
    assert_eq!(body["total"], json!(1));
    assert_eq!(body["historial"][0]["completada"], json!(true));

    let response = app
        .oneshot(common::create_authorized_request(
            Method::GET,
            "/api/progreso/historial?tipo=invalido",
            &token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommended_skips_completed_lessons() {
    let db = Arc::new(common::setup_test_db().await.unwrap());
    let app = common::create_test_app(db.clone());

    let alumno = common::create_test_student(db.as_ref(), "reco@x.com", "A1", "Inglés")
        .await
        .unwrap();
    let completada = common::create_test_lesson(db.as_ref(), "A1", "Inglés", 30, alumno.id)
        .await
        .unwrap();
    let pendiente = common::create_test_lesson(db.as_ref(), "A1", "Inglés", 30, alumno.id)
        .await
        .unwrap();
    // A lesson in another language must never be recommended
    common::create_test_lesson(db.as_ref(), "A1", "Francés", 30, alumno.id)
        .await
        .unwrap();
    let token = common::create_test_token(&alumno);

    app.clone()
        .oneshot(common::create_authorized_request(
            Method::POST,
            &format!("/api/lecciones/{}/progreso", completada.id),
            &token,
            json!({ "progreso": 100 }).to_string(),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(common::create_authorized_request(
            Method::GET,
            "/api/progreso/recomendadas",
            &token,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = common::parse_json(response.into_body()).await;
    let lecciones = body["lecciones_recomendadas"].as_array().unwrap();
    assert_eq!(lecciones.len(), 1);
    assert_eq!(lecciones[0]["id"], json!(pendiente.id));
}
