//! api.rs
//!
//! Клиент внешнего REST API бронирования. Вся бизнес-логика (доступность мест,
//! проверка оплаты, хранение) живёт там; фронт только читает и отправляет данные.
//!
//! Ключевые моменты:
//! 1.  Маршруты авторизации (`/login`, `/register`, `/forgot-password`,
//!     `/reset-password`) никогда не получают Bearer-токен.
//! 2.  Ответ `401` превращается в `ApiError::Unauthorized`: вызывающий код
//!     удаляет токен и отправляет пользователя на страницу входа.
//! 3.  Автоматических повторов нет, пользователь повторяет действие сам.

use reqwest::{multipart, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{error, info};

use crate::config::ApiConfig;
use crate::models::reservation::{MessageResponse, PreReserveItem, PreReserveResponse};
use crate::models::user::{ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest};
use crate::models::{AuthResponse, SeatCode, SeatRecord, SeatReservation, UserInfo, UserReservation};

const AUTH_ROUTES: [&str; 4] = ["/login", "/register", "/forgot-password", "/reset-password"];

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Токен истёк или недействителен.
    #[error("session expired or token invalid")]
    Unauthorized,
    #[error("api responded with {status}: {message}")]
    Status { status: u16, message: String },
    #[error("api request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid payment proof: {0}")]
    InvalidProof(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Текст для пользователя: сообщение API, если оно есть.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Status { message, .. } if !message.is_empty() => message.clone(),
            ApiError::InvalidProof(message) => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

/// Файл-подтверждение оплаты, прикладываемый к окончательной брони.
#[derive(Debug, Clone)]
pub struct ProofFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ProofFile {
    pub fn is_allowed_type(&self) -> bool {
        self.content_type.starts_with("image/") || self.content_type == "application/pdf"
    }
}

/// Асинхронный HTTP-клиент внешнего API.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl ApiClient {
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self.http_client.request(method, format!("{}{}", self.base_url, path));
        let is_auth_route = AUTH_ROUTES.iter().any(|route| path.starts_with(route));
        match token {
            Some(token) if !is_auth_route => builder.bearer_auth(token),
            _ => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, what: &str, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("API request '{}' failed: {:?}", what, e);
                return Err(e.into());
            }
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            info!("API request '{}' rejected with 401", what);
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_detail(&body);
            error!("API request '{}' failed with {}: {}", what, status, message);
            return Err(ApiError::Status { status: status.as_u16(), message });
        }

        response.json::<T>().await.map_err(|e| {
            error!("API response for '{}' could not be decoded: {:?}", what, e);
            ApiError::from(e)
        })
    }

    // --- Авторизация ---

    pub async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.send("login", self.request(Method::POST, "/login", None).json(req)).await
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.send("register", self.request(Method::POST, "/register", None).json(req)).await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse, ApiError> {
        let body = ForgotPasswordRequest { email: email.to_string() };
        self.send("forgot-password", self.request(Method::POST, "/forgot-password", None).json(&body))
            .await
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<MessageResponse, ApiError> {
        let body = ResetPasswordRequest { token: token.to_string(), new_password: new_password.to_string() };
        self.send("reset-password", self.request(Method::POST, "/reset-password", None).json(&body))
            .await
    }

    pub async fn me(&self, token: &str) -> Result<UserInfo, ApiError> {
        self.send("me", self.request(Method::GET, "/me", Some(token))).await
    }

    // --- Места ---

    pub async fn seats(&self, token: &str) -> Result<Vec<SeatRecord>, ApiError> {
        self.send("seats", self.request(Method::GET, "/seats", Some(token))).await
    }

    pub async fn user_tickets(&self, token: &str) -> Result<Vec<SeatRecord>, ApiError> {
        self.send("user tickets", self.request(Method::GET, "/seats/user", Some(token))).await
    }

    pub async fn user_pre_reserved(&self, token: &str) -> Result<Vec<SeatRecord>, ApiError> {
        self.send(
            "user pre-reserved",
            self.request(Method::GET, "/seats/user/pre-reserved", Some(token)),
        )
        .await
    }

    // --- Бронирование ---

    pub async fn pre_reserve(&self, token: &str, seats: &[SeatCode]) -> Result<PreReserveResponse, ApiError> {
        let body: Vec<PreReserveItem> = seats.iter().map(|c| PreReserveItem { seat_code: c.clone() }).collect();
        info!("Pre-reserving {} seats", body.len());
        self.send("pre-reserve", self.request(Method::POST, "/seats/pre-reserve", Some(token)).json(&body))
            .await
    }

    /// Окончательная бронь: multipart с полем `request` (JSON) и необязательным `file`.
    pub async fn reserve(
        &self,
        token: &str,
        seats: &[SeatReservation],
        proof: Option<ProofFile>,
    ) -> Result<MessageResponse, ApiError> {
        let request_json = serde_json::to_string(seats)
            .map_err(|e| ApiError::InvalidProof(format!("could not encode reservation: {e}")))?;
        let mut form = multipart::Form::new().text("request", request_json);

        if let Some(proof) = proof {
            if !proof.is_allowed_type() {
                return Err(ApiError::InvalidProof(format!(
                    "Tipo de arquivo não suportado: {}",
                    proof.content_type
                )));
            }
            let part = multipart::Part::bytes(proof.bytes)
                .file_name(proof.file_name)
                .mime_str(&proof.content_type)?;
            form = form.part("file", part);
        }

        info!("Submitting final reservation for {} seats", seats.len());
        self.send("reserve", self.request(Method::POST, "/seats/reserve", Some(token)).multipart(form))
            .await
    }

    // --- Администрирование ---

    pub async fn pending_seats(&self, token: &str) -> Result<Vec<UserReservation>, ApiError> {
        self.send("admin pending", self.request(Method::GET, "/admin/pending-seats", Some(token)))
            .await
    }

    pub async fn approve_seat(&self, token: &str, code: &SeatCode) -> Result<MessageResponse, ApiError> {
        let builder = self
            .request(Method::POST, "/admin/approve-seat", Some(token))
            .query(&[("seat_code", code.as_str())]);
        self.send("admin approve", builder).await
    }

    pub async fn reprove_seat(&self, token: &str, code: &SeatCode) -> Result<MessageResponse, ApiError> {
        let builder = self
            .request(Method::POST, "/admin/reprove-seat", Some(token))
            .query(&[("seat_code", code.as_str())]);
        self.send("admin reprove", builder).await
    }
}

/// Достаёт `detail` из ошибки API (FastAPI-формат), иначе отдаёт тело как есть.
fn error_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("detail").or_else(|| value.get("message")) {
            Some(serde_json::Value::String(s)) => return s.clone(),
            Some(other) => return other.to_string(),
            None => {}
        }
    }
    body.trim().to_string()
}
