use std::collections::BTreeSet;

use crate::models::{SeatCode, SeatReservation, TicketPrices};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub code: SeatCode,
    pub half_price: bool,
    pub price_cents: u32,
}

/// Черновик оплаты: выбранные места с ценами и признаком полуцены.
#[derive(Debug, Clone)]
pub struct CheckoutDraft {
    lines: Vec<CheckoutLine>,
}

impl CheckoutDraft {
    pub fn build(selection: &[SeatCode], half_price: &BTreeSet<SeatCode>, prices: TicketPrices) -> Self {
        let lines = selection
            .iter()
            .map(|code| {
                let half = half_price.contains(code);
                CheckoutLine { code: code.clone(), half_price: half, price_cents: prices.for_seat(half) }
            })
            .collect();
        Self { lines }
    }

    pub fn lines(&self) -> &[CheckoutLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total_cents(&self) -> u32 {
        self.lines.iter().map(|l| l.price_cents).sum()
    }

    pub fn half_price_count(&self) -> usize {
        self.lines.iter().filter(|l| l.half_price).count()
    }

    /// Тело окончательной брони для API.
    pub fn reservations(&self) -> Vec<SeatReservation> {
        self.lines
            .iter()
            .map(|l| SeatReservation { seat_code: l.code.clone(), is_half_price: l.half_price })
            .collect()
    }
}
