use serde::{Deserialize, Serialize};

use super::SeatCode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreReserveItem {
    pub seat_code: SeatCode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreReserveResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reserved_seats: Vec<SeatCode>,
}

/// Строка окончательной брони: место и признак полуцены.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatReservation {
    pub seat_code: SeatCode,
    pub is_half_price: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatInfo {
    pub code: SeatCode,
    #[serde(default)]
    pub is_half_price: bool,
}

/// Ожидающие проверки брони одного пользователя (панель администратора).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReservation {
    pub user_name: String,
    pub seats: Vec<SeatInfo>,
}

impl UserReservation {
    pub fn total_cents(&self, prices: &TicketPrices) -> u32 {
        self.seats.iter().map(|s| prices.for_seat(s.is_half_price)).sum()
    }
}

/// Фиксированные цены билетов, в сентаво.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketPrices {
    pub full_cents: u32,
    pub half_cents: u32,
}

impl Default for TicketPrices {
    fn default() -> Self {
        Self { full_cents: 5000, half_cents: 2500 }
    }
}

impl TicketPrices {
    pub fn for_seat(&self, is_half_price: bool) -> u32 {
        if is_half_price { self.half_cents } else { self.full_cents }
    }

    pub fn total(&self, lines: &[SeatReservation]) -> u32 {
        lines.iter().map(|l| self.for_seat(l.is_half_price)).sum()
    }
}

/// Формат `R$ 1.234,50`.
pub fn format_brl(cents: u32) -> String {
    let reais = cents / 100;
    let rest = cents % 100;
    let digits = reais.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    format!("R$ {grouped},{rest:02}")
}
