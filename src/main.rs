use axum::{routing::get, Extension, Router};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use speaklexi_backend::{api_router, ensure_schema_exists, init_db, ApiDoc};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenv().ok();

    let db = init_db().await?;

    ensure_schema_exists(&db).await?;
    tracing::info!("Database schema initialized");

    let openapi = ApiDoc::openapi();

    let cors_layer = CorsLayer::new().allow_origin(Any); //fixme: restrict to FRONTEND_URL once stable

    let app = Router::new()
        .route("/", get(|| async { "SpeakLexi API" }))
        .merge(api_router())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .layer(cors_layer)
        .layer(Extension(Arc::new(db)));

    start_server(app).await?;

    Ok(())
}

async fn start_server(app: Router) -> Result<(), Box<dyn std::error::Error>> {
    let port: u16 = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server started on {}", addr);

    match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => {
            axum::serve(listener, app.into_make_service()).await?;
            Ok(())
        }
        Err(e) => {
            tracing::error!("Failed to bind to address: {}", e);
            Err(e.into())
        }
    }
}
