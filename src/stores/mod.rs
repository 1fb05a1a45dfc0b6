//! Клиентские сторы браузерной сессии: выбор мест, льготы, кэш предрезервов, тосты.
//!
//! Вместо неявной реактивности сторы уведомляют явных подписчиков после каждой мутации.

pub mod half_price;
pub mod selection;
pub mod pre_reserved;
pub mod toast;

pub use half_price::HalfPriceChoices;
pub use pre_reserved::{Freshness, PreReservedCache};
pub use selection::SelectionStore;
pub use toast::{Toast, ToastKind, ToastQueue};

type Listener<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Список подписчиков на изменения стора.
pub struct Subscribers<T: ?Sized> {
    listeners: Vec<Listener<T>>,
}

impl<T: ?Sized> Default for Subscribers<T> {
    fn default() -> Self {
        Self { listeners: Vec::new() }
    }
}

impl<T: ?Sized> Subscribers<T> {
    pub fn subscribe(&mut self, listener: impl Fn(&T) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn notify(&self, value: &T) {
        for listener in &self.listeners {
            listener(value);
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers").field("count", &self.listeners.len()).finish()
    }
}
