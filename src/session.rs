//! session.rs
//!
//! Состояние одной браузерной сессии: токен, выбор мест, кэш предрезервов,
//! тосты, трансформация карты. Сохраняемые части пишутся в хранилище с
//! префиксом сессии, поэтому после перезапуска процесса сессия поднимается
//! из хранилища по cookie.

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::models::SeatCode;
use crate::services::auth::TokenStore;
use crate::storage::{ScopedStorage, Storage};
use crate::stores::{HalfPriceChoices, PreReservedCache, SelectionStore, ToastQueue};
use crate::view::seat_map::ViewTransform;

pub struct Session {
    pub id: Uuid,
    pub tokens: TokenStore,
    pub selection: SelectionStore,
    pub pre_reserved: PreReservedCache,
    pub toasts: ToastQueue,
    pub transform: ViewTransform,
    pub half_price: HalfPriceChoices,
    in_flight: Arc<AtomicBool>,
}

impl Session {
    pub fn restore(id: Uuid, storage: Arc<dyn Storage>, config: &Config) -> Self {
        let scoped: Arc<dyn Storage> = Arc::new(ScopedStorage::new(storage, id));

        let mut selection = SelectionStore::restore(scoped.clone());
        let half_price = HalfPriceChoices::default();
        let choices = half_price.clone();
        selection.subscribe(move |seats| choices.retain_selected(seats));

        Self {
            id,
            tokens: TokenStore::new(
                scoped.clone(),
                config.auth.token_key.clone(),
                Duration::milliseconds(config.auth.token_expiry_ms),
            ),
            selection,
            pre_reserved: PreReservedCache::restore(
                scoped,
                Duration::seconds(config.storage.pre_reserved_max_staleness_secs),
            ),
            toasts: ToastQueue::default(),
            transform: ViewTransform::default(),
            half_price,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Пытается занять сессию под сетевой запрос. Пока гард жив, повторная
    /// отправка отклоняется, а кнопки рисуются неактивными.
    pub fn try_begin_request(&self) -> Option<InFlight> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight { flag: self.in_flight.clone() })
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Пока идёт запрос, выбор и льготы не меняются: показывает тост и
    /// возвращает `true`.
    pub fn refuse_while_busy(&mut self) -> bool {
        if !self.is_busy() {
            return false;
        }
        self.toasts.info("Aguarde", "Uma operação ainda está em andamento");
        true
    }

    /// Окончательная бронь принята: отправленные места уходят из выбора и из кэша предрезервов.
    pub fn complete_checkout(&mut self, reserved: &[SeatCode]) {
        for code in reserved {
            self.pre_reserved.remove(code);
            self.selection.remove(code);
        }
    }

    /// Льгота ставится только на выбранное место; возвращает `true`, если она стоит после вызова.
    pub fn toggle_half_price(&mut self, code: &SeatCode) -> bool {
        if !self.selection.contains(code) {
            return false;
        }
        self.half_price.toggle(code)
    }

    /// Выход: токен, выбор и кэш предрезервов удаляются.
    pub fn logout(&mut self) {
        self.tokens.clear();
        self.pre_reserved.clear();
        self.selection.clear();
    }

    /// В сессии нет ничего, ради чего её стоит держать в памяти.
    pub fn is_blank(&self) -> bool {
        self.tokens.token(Utc::now()).is_none()
            && self.selection.is_empty()
            && self.pre_reserved.seats().is_empty()
            && self.toasts.is_empty()
            && self.transform == ViewTransform::default()
            && !self.is_busy()
    }
}

/// Гард занятости сессии; снимает флаг при удалении.
pub struct InFlight {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

struct Entry {
    handle: SessionHandle,
    last_seen: std::sync::Mutex<Instant>,
}

impl Entry {
    fn new(handle: SessionHandle) -> Self {
        Self { handle, last_seen: std::sync::Mutex::new(Instant::now()) }
    }

    fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn idle_for(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(*self.last_seen.lock().unwrap_or_else(|e| e.into_inner()))
    }

    // захваченная сессия обслуживает запрос прямо сейчас
    fn in_use(&self) -> bool {
        match self.handle.try_lock() {
            Ok(session) => session.is_busy(),
            Err(_) => true,
        }
    }
}

/// Результат поиска сессии для запроса.
pub struct SessionLookup {
    pub id: Uuid,
    pub handle: SessionHandle,
    /// Браузер пришёл без действующей cookie, её надо выставить.
    pub is_new: bool,
    registered: bool,
}

/// Реестр живых сессий процесса.
///
/// В память попадают только сессии с состоянием; простаивающие дольше
/// `idle_timeout` вытесняются при регистрации новых, а сверх `max_sessions`
/// уходят самые давние. Сохраняемые части вытесненной сессии остаются в
/// хранилище и поднимаются по cookie.
pub struct SessionRegistry {
    storage: Arc<dyn Storage>,
    config: Config,
    idle_timeout: std::time::Duration,
    sessions: RwLock<HashMap<Uuid, Entry>>,
}

impl SessionRegistry {
    pub fn new(storage: Arc<dyn Storage>, config: Config) -> Self {
        let idle_timeout = std::time::Duration::from_secs(config.sessions.idle_timeout_secs);
        Self { storage, config, idle_timeout, sessions: RwLock::new(HashMap::new()) }
    }

    fn restore(&self, id: Uuid) -> SessionHandle {
        Arc::new(Mutex::new(Session::restore(id, self.storage.clone(), &self.config)))
    }

    /// Сессия по id из cookie; неизвестная в памяти поднимается из хранилища,
    /// без id заводится новая. В реестр она попадает только через `keep`.
    pub async fn open(&self, id: Option<Uuid>) -> SessionLookup {
        if let Some(id) = id {
            if let Some(entry) = self.sessions.read().await.get(&id) {
                entry.touch();
                return SessionLookup { id, handle: entry.handle.clone(), is_new: false, registered: true };
            }
            debug!("Restoring session {} from storage", id);
            return SessionLookup { id, handle: self.restore(id), is_new: false, registered: false };
        }

        let id = Uuid::new_v4();
        debug!("New browser session {}", id);
        SessionLookup { id, handle: self.restore(id), is_new: true, registered: false }
    }

    /// Вызывается после обработки запроса. Пустая сессия отбрасывается,
    /// сессия с состоянием остаётся в памяти.
    pub async fn keep(&self, lookup: SessionLookup) {
        if lookup.registered {
            return;
        }
        let blank = lookup.handle.lock().await.is_blank();
        if blank {
            return;
        }

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&lookup.id) {
            return;
        }
        self.evict(&mut sessions);
        info!("Session {} registered", lookup.id);
        sessions.insert(lookup.id, Entry::new(lookup.handle));
    }

    fn evict(&self, sessions: &mut HashMap<Uuid, Entry>) {
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.idle_for(now) < self.idle_timeout || entry.in_use());

        while sessions.len() >= self.config.sessions.max_sessions {
            let oldest = sessions
                .iter()
                .filter(|(_, entry)| !entry.in_use())
                .max_by_key(|(_, entry)| entry.idle_for(now))
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                }
                None => break,
            }
        }

        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!("Evicted {} idle sessions", evicted);
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn code(s: &str) -> SeatCode {
        s.parse().unwrap()
    }

    fn session() -> Session {
        Session::restore(Uuid::new_v4(), Arc::new(MemoryStorage::new()), &Config::default())
    }

    fn registry(idle_timeout_secs: u64, max_sessions: usize) -> SessionRegistry {
        let mut config = Config::default();
        config.sessions.idle_timeout_secs = idle_timeout_secs;
        config.sessions.max_sessions = max_sessions;
        SessionRegistry::new(Arc::new(MemoryStorage::new()), config)
    }

    async fn register_with_selection(registry: &SessionRegistry, seat: &str) -> Uuid {
        let lookup = registry.open(None).await;
        let id = lookup.id;
        lookup.handle.lock().await.selection.toggle(&code(seat));
        registry.keep(lookup).await;
        id
    }

    #[test]
    fn checkout_completion_empties_selection() {
        let mut session = session();
        session.selection.toggle(&code("A1"));
        session.selection.toggle(&code("A2"));
        session.pre_reserved.add(code("A1"));
        session.pre_reserved.add(code("K7"));
        session.toggle_half_price(&code("A2"));

        session.complete_checkout(&[code("A1"), code("A2")]);

        assert!(session.selection.is_empty());
        assert!(session.half_price.is_empty());
        assert!(!session.pre_reserved.is_pre_reserved(&code("A1")));
        assert!(session.pre_reserved.is_pre_reserved(&code("K7")));
    }

    #[test]
    fn checkout_completion_keeps_seats_outside_the_reservation() {
        let mut session = session();
        session.selection.toggle(&code("A1"));
        session.selection.toggle(&code("A2"));
        session.toggle_half_price(&code("A2"));

        session.complete_checkout(&[code("A1")]);

        assert_eq!(session.selection.seats(), &[code("A2")]);
        assert!(session.half_price.contains(&code("A2")));
    }

    #[test]
    fn half_price_follows_selection() {
        let mut session = session();
        assert!(!session.toggle_half_price(&code("B1")));
        assert!(session.half_price.is_empty());

        session.selection.toggle(&code("B1"));
        assert!(session.toggle_half_price(&code("B1")));
        session.selection.toggle(&code("B1"));
        assert!(session.half_price.is_empty());

        session.selection.toggle(&code("B2"));
        session.toggle_half_price(&code("B2"));
        session.logout();
        assert!(session.half_price.is_empty());
    }

    #[test]
    fn in_flight_guard_blocks_second_request() {
        let session = session();
        let guard = session.try_begin_request().expect("first request");
        assert!(session.is_busy());
        assert!(session.try_begin_request().is_none());
        drop(guard);
        assert!(!session.is_busy());
        assert!(session.try_begin_request().is_some());
    }

    #[test]
    fn busy_session_refuses_changes_with_toast() {
        let mut session = session();
        assert!(!session.refuse_while_busy());
        assert!(session.toasts.is_empty());

        let _guard = session.try_begin_request().expect("request");
        assert!(session.refuse_while_busy());
        assert_eq!(session.toasts.len(), 1);
    }

    #[tokio::test]
    async fn registry_restores_session_from_storage() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let first = SessionRegistry::new(storage.clone(), Config::default());
        let lookup = first.open(None).await;
        assert!(lookup.is_new);
        let id = lookup.id;
        {
            let mut session = lookup.handle.lock().await;
            session.tokens.login("jwt".into(), Utc::now());
            session.selection.toggle(&code("D9"));
        }
        first.keep(lookup).await;
        assert_eq!(first.len().await, 1);

        // новый процесс, та же cookie
        let second = SessionRegistry::new(storage, Config::default());
        let lookup = second.open(Some(id)).await;
        assert_eq!(lookup.id, id);
        assert!(!lookup.is_new);
        {
            let session = lookup.handle.lock().await;
            assert!(session.tokens.is_authenticated(Utc::now()));
            assert_eq!(session.selection.seats(), &[code("D9")]);
        }
        second.keep(lookup).await;
        assert_eq!(second.len().await, 1);
    }

    #[tokio::test]
    async fn blank_sessions_are_not_kept() {
        let registry = registry(1800, 10_000);
        for i in 0..500 {
            let cookie = if i % 2 == 0 { None } else { Some(Uuid::new_v4()) };
            let lookup = registry.open(cookie).await;
            registry.keep(lookup).await;
        }
        assert_eq!(registry.len().await, 0);

        register_with_selection(&registry, "C3").await;
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_on_insert() {
        let registry = registry(0, 10_000);
        let first = register_with_selection(&registry, "A1").await;
        register_with_selection(&registry, "A2").await;
        assert_eq!(registry.len().await, 1);

        // вытесненная сессия поднимается из хранилища
        let lookup = registry.open(Some(first)).await;
        assert_eq!(lookup.handle.lock().await.selection.seats(), &[code("A1")]);
    }

    #[tokio::test]
    async fn oldest_sessions_go_over_capacity() {
        let registry = registry(1800, 2);
        let first = register_with_selection(&registry, "A1").await;
        let second = register_with_selection(&registry, "A2").await;
        registry.open(Some(second)).await;
        register_with_selection(&registry, "A3").await;

        assert_eq!(registry.len().await, 2);
        assert!(!registry.sessions.read().await.contains_key(&first));
        assert!(registry.sessions.read().await.contains_key(&second));
    }

    #[tokio::test]
    async fn busy_sessions_survive_eviction() {
        let registry = registry(0, 10_000);
        let lookup = registry.open(None).await;
        let id = lookup.id;
        let handle = lookup.handle.clone();
        lookup.handle.lock().await.selection.toggle(&code("F1"));
        registry.keep(lookup).await;

        let _guard = handle.lock().await.try_begin_request().expect("request");
        register_with_selection(&registry, "F2").await;
        assert!(registry.sessions.read().await.contains_key(&id));
    }
}
