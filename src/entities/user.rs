use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Account rows keep the column names of the original `usuarios` schema:
/// the MySQL database and the JSON wire contract predate this service.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "usuarios")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub nombre: String,
    pub primer_apellido: String,
    pub segundo_apellido: Option<String>,
    #[sea_orm(unique)]
    pub correo: String,
    #[serde(skip_serializing)]
    pub contrasena_hash: String,
    pub rol: String, // "alumno" | "profesor" | "admin"
    pub estado_cuenta: String,
    pub correo_verificado: bool,
    #[serde(skip_serializing)]
    pub codigo_verificacion: Option<String>,
    pub expira_verificacion: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub token_recuperacion: Option<String>,
    pub expira_recuperacion: Option<DateTime<Utc>>,
    pub ultimo_acceso: Option<DateTime<Utc>>,
    pub fecha_desactivacion: Option<DateTime<Utc>>,
    pub reactivar_hasta: Option<DateTime<Utc>>,
    pub eliminacion_programada: Option<DateTime<Utc>>,
    pub fecha_registro: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
pub enum UserRole {
    #[serde(rename = "alumno")]
    Alumno,
    #[serde(rename = "profesor")]
    Profesor,
    #[serde(rename = "admin")]
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Alumno => "alumno",
            UserRole::Profesor => "profesor",
            UserRole::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for UserRole {
    fn from(rol: String) -> Self {
        match rol.as_str() {
            "profesor" => UserRole::Profesor,
            "admin" => UserRole::Admin,
            _ => UserRole::Alumno, // Default
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
pub enum AccountState {
    #[serde(rename = "activo")]
    Activo,
    #[serde(rename = "pendiente_verificacion")]
    PendienteVerificacion,
    #[serde(rename = "desactivado")]
    Desactivado,
    #[serde(rename = "bloqueado")]
    Bloqueado,
}

impl AccountState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountState::Activo => "activo",
            AccountState::PendienteVerificacion => "pendiente_verificacion",
            AccountState::Desactivado => "desactivado",
            AccountState::Bloqueado => "bloqueado",
        }
    }
}

impl From<String> for AccountState {
    fn from(estado: String) -> Self {
        match estado.as_str() {
            "activo" => AccountState::Activo,
            "desactivado" => AccountState::Desactivado,
            "bloqueado" => AccountState::Bloqueado,
            _ => AccountState::PendienteVerificacion,
        }
    }
}

/// CEFR proficiency levels accepted for students and lessons.
pub const CEFR_LEVELS: [&str; 6] = ["A1", "A2", "B1", "B2", "C1", "C2"];

pub fn is_valid_cefr_level(nivel: &str) -> bool {
    CEFR_LEVELS.contains(&nivel)
}

fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if has_letter && has_digit {
        Ok(())
    } else {
        Err(ValidationError::new("password_strength")
            .with_message("La contraseña debe contener letras y números".into()))
    }
}

// Registration request model with validation
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, message = "El nombre debe tener al menos 2 caracteres"))]
    pub nombre: String,
    #[validate(length(min = 2, message = "El primer apellido debe tener al menos 2 caracteres"))]
    pub primer_apellido: String,
    pub segundo_apellido: Option<String>,
    #[schema(examples("ana@x.com"))]
    #[validate(email(message = "Debe ser un email válido"))]
    pub correo: String,
    #[validate(
        length(min = 8, message = "La contraseña debe tener al menos 8 caracteres"),
        custom(function = "validate_password_strength")
    )]
    pub password: String,
    /// Defaults to "alumno" when omitted.
    pub rol: Option<String>,
    // Student fields
    pub nivel_actual: Option<String>,
    pub idioma_aprendizaje: Option<String>,
    // Teacher fields
    pub titulo: Option<String>,
    pub especialidad: Option<String>,
    pub anios_experiencia: Option<i32>,
    pub biografia: Option<String>,
}

// Login request model with validation
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[schema(examples("ana@x.com"))]
    #[validate(email(message = "Debe ser un email válido"))]
    pub correo: String,
    #[validate(length(min = 1, message = "La contraseña es requerida"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct VerifyAccountRequest {
    #[validate(email(message = "Debe ser un email válido"))]
    pub correo: String,
    #[validate(length(min = 6, max = 6, message = "El código debe tener 6 dígitos"))]
    pub codigo: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "Debe ser un email válido"))]
    pub correo: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "El token es requerido"))]
    pub token: String,
    #[validate(length(min = 8, message = "La contraseña debe tener al menos 8 caracteres"))]
    pub nueva_contrasena: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct ReactivateAccountRequest {
    #[validate(email(message = "Debe ser un email válido"))]
    pub correo: String,
    #[validate(length(min = 1, message = "La contraseña es requerida"))]
    pub password: String,
}

/// Non-sensitive user information returned by auth endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserDTO {
    pub id: i32,
    pub nombre: String,
    pub correo: String,
    pub rol: String,
    pub estado_cuenta: String,
}

impl From<Model> for UserDTO {
    fn from(model: Model) -> Self {
        let nombre = match &model.segundo_apellido {
            Some(segundo) => format!("{} {} {}", model.nombre, model.primer_apellido, segundo),
            None => format!("{} {}", model.nombre, model.primer_apellido),
        };
        Self {
            id: model.id,
            nombre,
            correo: model.correo,
            rol: model.rol,
            estado_cuenta: model.estado_cuenta,
        }
    }
}
