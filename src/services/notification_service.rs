use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
pub struct EmailNotification {
    pub to: String,
    pub subject: String,
    pub message: String,
    pub from: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Environment variable not set: {0}")]
    EnvError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

const MAX_ATTEMPTS: u32 = 3;

/// Sends the 6-digit verification code after registration.
pub async fn send_verification_code(
    correo: &str,
    codigo: &str,
    nombre: &str,
) -> Result<(), NotificationError> {
    let message = format!(
        "Hola {},\n\n\
        ¡Bienvenido a SpeakLexi!\n\n\
        Tu código de verificación es: {}\n\n\
        Este código expira en 24 horas. Si no solicitaste este código, \
        ignora este mensaje.\n\n\
        El equipo de SpeakLexi",
        nombre, codigo
    );

    let notification = EmailNotification {
        to: correo.to_string(),
        subject: "Verifica tu cuenta - SpeakLexi".to_string(),
        message,
        from: sender_address()?,
    };

    send_with_retry(&notification).await
}

/// Sends the password-recovery link. The token inside the link expires after
/// one hour.
pub async fn send_password_recovery(
    correo: &str,
    token: &str,
    nombre: &str,
) -> Result<(), NotificationError> {
    let frontend_url = env::var("FRONTEND_URL")
        .map_err(|_| NotificationError::EnvError("FRONTEND_URL".to_string()))?;

    let enlace = format!(
        "{}/pages/auth/restablecer-contrasena.html?token={}",
        frontend_url, token
    );

    let message = format!(
        "Hola {},\n\n\
        Recibimos una solicitud para restablecer tu contraseña. \
        Usa el siguiente enlace para continuar:\n\n\
        {}\n\n\
        Este enlace expira en 1 hora. Si no solicitaste este cambio, \
        ignora este mensaje.\n\n\
        El equipo de SpeakLexi",
        nombre, enlace
    );

    let notification = EmailNotification {
        to: correo.to_string(),
        subject: "Recuperación de contraseña - SpeakLexi".to_string(),
        message,
        from: sender_address()?,
    };

    send_with_retry(&notification).await
}

fn sender_address() -> Result<String, NotificationError> {
    env::var("EMAIL_FROM").map_err(|_| NotificationError::EnvError("EMAIL_FROM".to_string()))
}

/// Delivers through the email API with up to 3 attempts and 1s/2s/4s backoff.
/// The retry loop blocks the calling request; callers on best-effort paths
/// spawn this instead of awaiting it inline.
async fn send_with_retry(notification: &EmailNotification) -> Result<(), NotificationError> {
    let mut last_error = None;

    for attempt in 0..MAX_ATTEMPTS {
        if attempt > 0 {
            let backoff = Duration::from_secs(1u64 << (attempt - 1));
            tracing::info!(
                "Retrying email to {} in {}s (attempt {}/{})",
                notification.to,
                backoff.as_secs(),
                attempt + 1,
                MAX_ATTEMPTS
            );
            tokio::time::sleep(backoff).await;
        }

        match send_email_notification(notification).await {
            Ok(()) => {
                tracing::info!("Email sent to {}", notification.to);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(
                    "Email attempt {}/{} to {} failed: {}",
                    attempt + 1,
                    MAX_ATTEMPTS,
                    notification.to,
                    e
                );
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        NotificationError::ApiError("email delivery failed without a response".to_string())
    }))
}

/// Sends a single email through the notification API.
async fn send_email_notification(
    notification: &EmailNotification,
) -> Result<(), NotificationError> {
    let api_url = env::var("EMAIL_API_URL")
        .map_err(|_| NotificationError::EnvError("EMAIL_API_URL".to_string()))?;
    let api_key = env::var("EMAIL_API_KEY")
        .map_err(|_| NotificationError::EnvError("EMAIL_API_KEY".to_string()))?;

    let client = Client::new();

    let notification_data = serde_json::to_value(notification)?;

    let response = client
        .post(&api_url)
        .header("Content-Type", "application/json")
        .header("X-Api-Key", api_key)
        .json(&notification_data)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(NotificationError::ApiError(format!(
            "API returned error: {} - {}",
            status, error_text
        )));
    }

    Ok(())
}
