use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

pub mod api_docs;
pub mod auth;
pub mod db;
pub mod entities;
pub mod handlers;
pub mod services;

// Re-export commonly used items for easier use in tests
pub use api_docs::ApiDoc;
pub use auth::middleware::auth_middleware;
pub use db::{ensure_schema_exists, init_db};

use handlers::{
    auth_handler, gamification_handler, lesson_handler, progress_handler, stats_handler,
    student_handler, teacher_handler,
};

/// All `/api` routes. The caller layers the database extension (and CORS in
/// production) on top; tests reuse this router against an in-memory database.
pub fn api_router() -> Router {
    let auth_public = Router::new()
        .route("/registro", post(auth_handler::register))
        .route("/verificar", post(auth_handler::verify_account))
        .route(
            "/reenviar-verificacion",
            post(auth_handler::resend_verification),
        )
        .route("/login", post(auth_handler::login))
        .route(
            "/recuperar-contrasena",
            post(auth_handler::request_password_recovery),
        )
        .route(
            "/restablecer-contrasena",
            post(auth_handler::reset_password),
        )
        .route("/reactivar-cuenta", post(auth_handler::reactivate_account));

    let auth_private = Router::new()
        .route("/perfil", get(auth_handler::get_profile))
        .route("/verificar-token", get(auth_handler::verify_token))
        .route("/logout", post(auth_handler::logout))
        .route("/desactivar-cuenta", post(auth_handler::deactivate_account))
        .route("/eliminar-cuenta", delete(auth_handler::delete_account))
        .route_layer(middleware::from_fn(auth_middleware));

    let lessons = Router::new()
        .route(
            "/",
            post(lesson_handler::create_lesson).get(lesson_handler::list_all_lessons),
        )
        .route("/nivel/{nivel}", get(lesson_handler::list_by_level))
        .route(
            "/{id}",
            get(lesson_handler::get_lesson)
                .put(lesson_handler::update_lesson)
                .delete(lesson_handler::delete_lesson),
        )
        .route("/{id}/progreso", post(lesson_handler::register_progress))
        .route_layer(middleware::from_fn(auth_middleware));

    let progress = Router::new()
        .route(
            "/leccion/{leccion_id}",
            get(progress_handler::get_lesson_progress),
        )
        .route("/historial", get(progress_handler::get_history))
        .route("/resumen", get(progress_handler::get_summary))
        .route("/recomendadas", get(progress_handler::get_recommended))
        .route_layer(middleware::from_fn(auth_middleware));

    let gamification = Router::new()
        .route(
            "/leaderboard/global",
            get(gamification_handler::global_leaderboard),
        )
        .route(
            "/leaderboard/nivel/{nivel}",
            get(gamification_handler::level_leaderboard),
        )
        .route(
            "/leaderboard/idioma/{idioma}",
            get(gamification_handler::language_leaderboard),
        )
        .route("/leaderboard/top10", get(gamification_handler::top10))
        .route("/puntos", get(gamification_handler::get_points))
        .route("/racha", get(gamification_handler::get_streak))
        .route("/logros", get(gamification_handler::get_achievements))
        .route(
            "/progreso-semanal",
            get(gamification_handler::weekly_progress),
        )
        .route("/otorgar-puntos", post(gamification_handler::grant_points))
        .route_layer(middleware::from_fn(auth_middleware));

    let statistics = Router::new()
        .route("/resumen-general", get(stats_handler::general_overview))
        .route("/estudiantes", get(stats_handler::student_list))
        .route("/estudiantes/{id}", get(stats_handler::student_detail))
        .route("/estudiantes-alerta", get(stats_handler::alert_students))
        .route_layer(middleware::from_fn(auth_middleware));

    let teacher = Router::new()
        .route("/dashboard", get(teacher_handler::dashboard))
        .route("/estudiantes", get(teacher_handler::students))
        .route(
            "/retroalimentacion",
            post(teacher_handler::send_feedback).get(teacher_handler::list_feedback),
        )
        .route(
            "/planes",
            post(teacher_handler::create_plan).get(teacher_handler::list_plans),
        )
        .route("/lecciones", get(teacher_handler::lessons))
        .route_layer(middleware::from_fn(auth_middleware));

    let student = Router::new()
        .route("/retroalimentacion", get(student_handler::list_feedback))
        .route(
            "/retroalimentacion/{id}/leida",
            put(student_handler::mark_feedback_read),
        )
        .route("/planes", get(student_handler::list_plans))
        .route_layer(middleware::from_fn(auth_middleware));

    Router::new()
        .nest("/api/auth", auth_public.merge(auth_private))
        .nest("/api/lecciones", lessons)
        .nest("/api/progreso", progress)
        .nest("/api/gamificacion", gamification)
        .nest("/api/estadisticas", statistics)
        .nest("/api/profesor", teacher)
        .nest("/api/alumno", student)
}
