use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::SeatCode;

/// Места, отмеченные как льготные (meia entrada).
///
/// Набор разделяется с подписчиком стора выбора: место, ушедшее из выбора,
/// теряет и льготу.
#[derive(Debug, Clone, Default)]
pub struct HalfPriceChoices {
    codes: Arc<Mutex<BTreeSet<SeatCode>>>,
}

impl HalfPriceChoices {
    fn codes(&self) -> MutexGuard<'_, BTreeSet<SeatCode>> {
        self.codes.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Переключает льготу; возвращает `true`, если после вызова она стоит.
    pub fn toggle(&self, code: &SeatCode) -> bool {
        let mut codes = self.codes();
        if codes.remove(code) {
            false
        } else {
            codes.insert(code.clone());
            true
        }
    }

    pub fn contains(&self, code: &SeatCode) -> bool {
        self.codes().contains(code)
    }

    /// Оставляет льготы только для мест из текущего выбора.
    pub fn retain_selected(&self, selected: &[SeatCode]) {
        self.codes().retain(|code| selected.contains(code));
    }

    pub fn snapshot(&self) -> BTreeSet<SeatCode> {
        self.codes().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.codes().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> SeatCode {
        s.parse().unwrap()
    }

    #[test]
    fn clones_share_choices() {
        let choices = HalfPriceChoices::default();
        let other = choices.clone();
        assert!(choices.toggle(&code("B3")));
        assert!(other.contains(&code("B3")));
        assert!(!other.toggle(&code("B3")));
        assert!(choices.is_empty());
    }

    #[test]
    fn retain_drops_unselected() {
        let choices = HalfPriceChoices::default();
        choices.toggle(&code("A1"));
        choices.toggle(&code("A2"));
        choices.retain_selected(&[code("A2"), code("A9")]);
        assert_eq!(choices.snapshot(), BTreeSet::from([code("A2")]));
    }
}
