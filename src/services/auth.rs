use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::storage::{load_json, save_json, Storage};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    token: String,
    issued_at: DateTime<Utc>,
}

/// Токен доступа сессии, хранится под фиксированным ключом.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn Storage>,
    key: String,
    expiry: Duration,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>, expiry: Duration) -> Self {
        Self { storage, key: key.into(), expiry }
    }

    /// Действующий токен; просроченный удаляется и считается отсутствующим.
    pub fn token(&self, now: DateTime<Utc>) -> Option<String> {
        let stored: StoredToken = load_json(self.storage.as_ref(), &self.key)?;
        if now - stored.issued_at > self.expiry {
            info!("Stored token expired, forcing new login");
            self.clear();
            return None;
        }
        Some(stored.token)
    }

    pub fn is_authenticated(&self, now: DateTime<Utc>) -> bool {
        self.token(now).is_some()
    }

    pub fn login(&self, token: String, now: DateTime<Utc>) {
        let stored = StoredToken { token, issued_at: now };
        if let Err(e) = save_json(self.storage.as_ref(), &self.key, &stored) {
            warn!("Failed to persist auth token: {}", e);
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.storage.remove(&self.key) {
            warn!("Failed to remove auth token: {}", e);
        }
    }
}

/// Решение охранника страницы.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Render,
    RedirectToLogin,
    RedirectHome,
}

/// Защищённые страницы требуют входа, гостевые (вход, регистрация) - наоборот.
pub fn guard(requires_auth: bool, authenticated: bool) -> GuardOutcome {
    match (requires_auth, authenticated) {
        (true, false) => GuardOutcome::RedirectToLogin,
        (false, true) => GuardOutcome::RedirectHome,
        _ => GuardOutcome::Render,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn store() -> TokenStore {
        TokenStore::new(Arc::new(MemoryStorage::new()), "cia-app-token", Duration::hours(24))
    }

    #[test]
    fn login_then_logout() {
        let tokens = store();
        let now = Utc::now();
        assert!(!tokens.is_authenticated(now));
        tokens.login("jwt".into(), now);
        assert_eq!(tokens.token(now).as_deref(), Some("jwt"));
        tokens.clear();
        assert!(!tokens.is_authenticated(now));
    }

    #[test]
    fn expired_token_is_dropped() {
        let tokens = store();
        let issued = Utc::now() - Duration::hours(25);
        tokens.login("old".into(), issued);
        assert_eq!(tokens.token(Utc::now()), None);
        // удалён из хранилища, а не просто скрыт
        assert_eq!(tokens.token(issued), None);
    }

    #[test]
    fn guard_matrix() {
        assert_eq!(guard(true, false), GuardOutcome::RedirectToLogin);
        assert_eq!(guard(true, true), GuardOutcome::Render);
        assert_eq!(guard(false, true), GuardOutcome::RedirectHome);
        assert_eq!(guard(false, false), GuardOutcome::Render);
    }
}
