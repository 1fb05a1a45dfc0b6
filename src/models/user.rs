use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

pub const ADMIN_SCOPE: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Informe um e-mail válido"))]
    pub email: String,
    #[validate(length(min = 1, message = "Informe a senha"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Informe o nome completo"))]
    pub full_name: String,
    #[validate(email(message = "Informe um e-mail válido"))]
    pub email: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone_number: String,
    #[validate(length(min = 6, message = "A senha deve ter pelo menos 6 caracteres"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Informe um e-mail válido"))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Link de recuperação inválido"))]
    pub token: String,
    #[validate(length(min = 6, message = "A senha deve ter pelo menos 6 caracteres"))]
    pub new_password: String,
}

// Телефон с кодом города: 10 или 11 цифр, форматирование игнорируем
fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if (10..=11).contains(&digits) {
        Ok(())
    } else {
        Err(ValidationError::new("phone").with_message("Informe um telefone com DDD".into()))
    }
}

/// Оставляет в номере только цифры, как их ждёт API.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: AuthUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: i64,
    pub user_name: String,
    #[serde(default)]
    pub user_scopes: Vec<String>,
}

impl UserInfo {
    pub fn is_admin(&self) -> bool {
        self.user_scopes.iter().any(|scope| scope == ADMIN_SCOPE)
    }
}

/// Первое сообщение валидации, пригодное для тоста.
pub fn first_validation_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Dados inválidos".to_string())
}
