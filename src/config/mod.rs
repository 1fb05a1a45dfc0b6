use serde::Deserialize;
use std::env;
use std::str::FromStr;
use tracing::warn;

use crate::models::TicketPrices;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub sessions: SessionConfig,
    pub payment: PaymentConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub name: String,
    pub version: String,
}

// Внешний API бронирования
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

// Настройки авторизации
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub token_key: String,
    pub token_expiry_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    File,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

// Клиентское хранилище сессий (аналог localStorage)
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub dir: String,
    pub pre_reserved_max_staleness_secs: i64,
}

// Браузерные сессии в памяти процесса
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub idle_timeout_secs: u64,
    pub max_sessions: usize,
}

// Оплата через PIX и цены билетов
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub pix_code: String,
    pub ticket_price_cents: u32,
    pub half_ticket_price_cents: u32,
    pub max_proof_bytes: usize,
}

impl PaymentConfig {
    pub fn prices(&self) -> TicketPrices {
        TicketPrices { full_cents: self.ticket_price_cents, half_cents: self.half_ticket_price_cents }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{var} has invalid value '{value}': {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            app: AppConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                environment: "development".to_string(),
                rust_log: "seat_front=debug,tower_http=debug".to_string(),
                name: "CIA App".to_string(),
                version: "1.0.0".to_string(),
            },
            api: ApiConfig { base_url: "http://localhost:8000".to_string(), timeout_ms: 10_000 },
            auth: AuthConfig { token_key: "cia-app-token".to_string(), token_expiry_ms: 86_400_000 },
            storage: StorageConfig {
                backend: StorageBackend::File,
                dir: "./data/storage".to_string(),
                pre_reserved_max_staleness_secs: 60,
            },
            sessions: SessionConfig { idle_timeout_secs: 1800, max_sessions: 10_000 },
            payment: PaymentConfig {
                pix_code: String::new(),
                ticket_price_cents: 5000,
                half_ticket_price_cents: 2500,
                max_proof_bytes: 10 * 1024 * 1024,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Config::default();

        if env::var("API_BASE_URL").is_err() {
            warn!("API_BASE_URL is not set, using default {}", d.api.base_url);
        }

        Ok(Config {
            app: AppConfig {
                host: string_var("HOST", d.app.host),
                port: parsed_var("PORT", d.app.port)?,
                environment: string_var("ENVIRONMENT", d.app.environment),
                rust_log: string_var("RUST_LOG", d.app.rust_log),
                name: string_var("APP_NAME", d.app.name),
                version: string_var("APP_VERSION", d.app.version),
            },
            api: ApiConfig {
                base_url: string_var("API_BASE_URL", d.api.base_url),
                timeout_ms: parsed_var("API_TIMEOUT_MS", d.api.timeout_ms)?,
            },
            auth: AuthConfig {
                token_key: string_var("TOKEN_KEY", d.auth.token_key),
                token_expiry_ms: parsed_var("TOKEN_EXPIRY_MS", d.auth.token_expiry_ms)?,
            },
            storage: StorageConfig {
                backend: parsed_var("STORAGE_BACKEND", d.storage.backend)?,
                dir: string_var("STORAGE_DIR", d.storage.dir),
                pre_reserved_max_staleness_secs: parsed_var(
                    "PRE_RESERVED_MAX_STALENESS_SECS",
                    d.storage.pre_reserved_max_staleness_secs,
                )?,
            },
            sessions: SessionConfig {
                idle_timeout_secs: parsed_var("SESSION_IDLE_TIMEOUT_SECS", d.sessions.idle_timeout_secs)?,
                max_sessions: parsed_var("MAX_SESSIONS", d.sessions.max_sessions)?,
            },
            payment: PaymentConfig {
                pix_code: string_var("PIX_CODE", d.payment.pix_code),
                ticket_price_cents: parsed_var("TICKET_PRICE_CENTS", d.payment.ticket_price_cents)?,
                half_ticket_price_cents: parsed_var("HALF_TICKET_PRICE_CENTS", d.payment.half_ticket_price_cents)?,
                max_proof_bytes: parsed_var("MAX_PROOF_BYTES", d.payment.max_proof_bytes)?,
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.app.environment == "production"
    }
}

fn string_var(name: &str, default: String) -> String {
    env::var(name).unwrap_or(default)
}

fn parsed_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError {
            var: name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
