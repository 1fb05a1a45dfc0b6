use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{SeatCode, SeatRecord};
use crate::services::api::{ApiClient, ApiError};
use crate::storage::{load_json, save_json, Storage, PRE_RESERVED_SEATS_KEY};

/// Насколько можно доверять кэшу предрезервов.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Подтверждён сервером в пределах допустимой давности.
    Fresh,
    /// Подтверждался, но давно.
    Stale,
    /// Поднят из хранилища и ни разу не сверялся с сервером.
    Unverified,
}

/// Локальная копия серверных предрезервов текущего пользователя.
///
/// Успешная загрузка заменяет набор целиком и сохраняет его; ошибка загрузки
/// оставляет последний известный набор и запоминает текст ошибки для показа.
pub struct PreReservedCache {
    seats: BTreeSet<SeatCode>,
    confirmed_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    max_staleness: Duration,
    storage: Arc<dyn Storage>,
}

impl PreReservedCache {
    pub fn restore(storage: Arc<dyn Storage>, max_staleness: Duration) -> Self {
        let seats: BTreeSet<SeatCode> = load_json::<Vec<SeatCode>>(storage.as_ref(), PRE_RESERVED_SEATS_KEY)
            .unwrap_or_default()
            .into_iter()
            .collect();
        Self {
            seats,
            confirmed_at: None,
            last_error: None,
            max_staleness,
            storage,
        }
    }

    /// Загружает предрезервы пользователя; без токена кэш очищается.
    pub async fn fetch(&mut self, api: &ApiClient, token: Option<&str>) -> Result<usize, ApiError> {
        let Some(token) = token else {
            self.clear();
            return Ok(0);
        };
        let result = api.user_pre_reserved(token).await;
        self.apply_fetch(result, Utc::now())
    }

    /// Применяет результат запроса к API, полученный без удержания стора.
    pub fn apply_fetch(
        &mut self,
        result: Result<Vec<SeatRecord>, ApiError>,
        now: DateTime<Utc>,
    ) -> Result<usize, ApiError> {
        match result {
            Ok(records) => {
                self.seats = records.into_iter().map(|r| r.code).collect();
                self.confirmed_at = Some(now);
                self.last_error = None;
                self.commit();
                info!("Pre-reserved seats refreshed: {}", self.seats.len());
                Ok(self.seats.len())
            }
            Err(e) => {
                warn!("Pre-reserved refresh failed, keeping {} cached seats: {}", self.seats.len(), e);
                self.last_error = Some("Erro ao carregar assentos pré-reservados".to_string());
                Err(e)
            }
        }
    }

    pub fn is_pre_reserved(&self, code: &SeatCode) -> bool {
        self.seats.contains(code)
    }

    pub fn add(&mut self, code: SeatCode) {
        if self.seats.insert(code) {
            self.commit();
        }
    }

    pub fn remove(&mut self, code: &SeatCode) {
        if self.seats.remove(code) {
            self.commit();
        }
    }

    pub fn clear(&mut self) {
        self.seats.clear();
        self.confirmed_at = None;
        self.last_error = None;
        if let Err(e) = self.storage.remove(PRE_RESERVED_SEATS_KEY) {
            warn!("Failed to drop cached pre-reserved seats: {}", e);
        }
    }

    pub fn freshness(&self, now: DateTime<Utc>) -> Freshness {
        match self.confirmed_at {
            None => Freshness::Unverified,
            Some(at) if now - at > self.max_staleness => Freshness::Stale,
            Some(_) => Freshness::Fresh,
        }
    }

    pub fn seats(&self) -> &BTreeSet<SeatCode> {
        &self.seats
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }

    fn commit(&self) {
        let codes: Vec<&SeatCode> = self.seats.iter().collect();
        if let Err(e) = save_json(self.storage.as_ref(), PRE_RESERVED_SEATS_KEY, &codes) {
            warn!("Failed to persist pre-reserved seats: {}", e);
        }
    }
}
