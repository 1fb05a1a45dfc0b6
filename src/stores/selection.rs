use std::sync::Arc;
use tracing::{debug, warn};

use super::Subscribers;
use crate::models::SeatCode;
use crate::storage::{load_json, save_json, Storage, SELECTED_SEATS_KEY};

/// Места, выбранные пользователем, но ещё не отправленные на оплату.
///
/// Порядок выбора сохраняется. Каждая мутация сразу пишется в хранилище;
/// проверку доступности места делает вызывающий код (карта мест), не стор.
pub struct SelectionStore {
    seats: Vec<SeatCode>,
    storage: Arc<dyn Storage>,
    subscribers: Subscribers<[SeatCode]>,
}

impl SelectionStore {
    /// Поднимает выбор из хранилища; при отсутствии или порче данных - пустой.
    pub fn restore(storage: Arc<dyn Storage>) -> Self {
        let mut seats: Vec<SeatCode> = load_json(storage.as_ref(), SELECTED_SEATS_KEY).unwrap_or_default();
        dedup_in_order(&mut seats);
        debug!("Restored {} selected seats", seats.len());
        Self { seats, storage, subscribers: Subscribers::default() }
    }

    /// Переключает место; возвращает `true`, если после вызова оно выбрано.
    pub fn toggle(&mut self, code: &SeatCode) -> bool {
        let selected = match self.seats.iter().position(|c| c == code) {
            Some(idx) => {
                self.seats.remove(idx);
                false
            }
            None => {
                self.seats.push(code.clone());
                true
            }
        };
        self.commit();
        selected
    }

    pub fn add(&mut self, code: &SeatCode) {
        if !self.contains(code) {
            self.seats.push(code.clone());
            self.commit();
        }
    }

    pub fn remove(&mut self, code: &SeatCode) {
        let before = self.seats.len();
        self.seats.retain(|c| c != code);
        if before != self.seats.len() {
            self.commit();
        }
    }

    pub fn replace_all(&mut self, seats: Vec<SeatCode>) {
        self.seats = seats;
        dedup_in_order(&mut self.seats);
        self.commit();
    }

    pub fn clear(&mut self) {
        self.seats.clear();
        self.commit();
    }

    pub fn contains(&self, code: &SeatCode) -> bool {
        self.seats.contains(code)
    }

    pub fn seats(&self) -> &[SeatCode] {
        &self.seats
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    /// Слушатель получает выбор целиком после каждой мутации.
    pub fn subscribe(&mut self, listener: impl Fn(&[SeatCode]) + Send + Sync + 'static) {
        self.subscribers.subscribe(listener)
    }

    fn commit(&self) {
        // Состояние в памяти остаётся верным даже если запись не удалась
        if let Err(e) = save_json(self.storage.as_ref(), SELECTED_SEATS_KEY, &self.seats) {
            warn!("Failed to persist seat selection: {}", e);
        }
        self.subscribers.notify(&self.seats);
    }
}

fn dedup_in_order(seats: &mut Vec<SeatCode>) {
    let mut seen = std::collections::HashSet::new();
    seats.retain(|c| seen.insert(c.clone()));
}
