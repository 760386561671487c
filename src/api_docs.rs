use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

/// Error envelope used across the API: a human-readable Spanish message plus
/// optional validation detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detalles: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detalles: None,
        }
    }

    pub fn with_details(error: impl Into<String>, detalles: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detalles: Some(detalles.into()),
        }
    }
}

/// Response after a successful registration; the account still needs email
/// verification before it can log in.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub mensaje: String,
    pub usuario: crate::entities::user::UserDTO,
    pub verificacion_requerida: bool,
}

/// Response after account verification or login.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub mensaje: String,
    pub token: String,
    pub usuario: crate::entities::user::UserDTO,
    #[serde(rename = "redirectUrl", default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

/// Generic acknowledgement body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub mensaje: String,
}

impl MessageResponse {
    pub fn new(mensaje: impl Into<String>) -> Self {
        Self {
            mensaje: mensaje.into(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::auth_handler::register,
        crate::handlers::auth_handler::verify_account,
        crate::handlers::auth_handler::login,
        crate::handlers::auth_handler::request_password_recovery,
        crate::handlers::auth_handler::reset_password,
        crate::handlers::lesson_handler::create_lesson,
        crate::handlers::lesson_handler::get_lesson,
        crate::handlers::lesson_handler::register_progress,
    ),
    components(
        schemas(
            ErrorResponse,
            RegisterResponse,
            AuthResponse,
            MessageResponse,
            crate::entities::user::RegisterRequest,
            crate::entities::user::LoginRequest,
            crate::entities::user::VerifyAccountRequest,
            crate::entities::user::UserRole,
            crate::entities::user::UserDTO,
            crate::entities::lesson::CreateLessonRequest,
            crate::entities::lesson::Model,
            crate::entities::lesson_progress::RegisterProgressRequest,
        )
    ),
    tags(
        (name = "auth", description = "Registro, verificación y sesión"),
        (name = "lecciones", description = "Gestión de lecciones y progreso")
    ),
    info(
        title = "SpeakLexi API",
        version = "0.1.0",
        description = "Backend de la plataforma de aprendizaje de idiomas SpeakLexi",
    )
)]
pub struct ApiDoc;
