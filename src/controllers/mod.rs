pub mod seats;
pub mod auth;
pub mod payment;
pub mod tickets;
pub mod admin;

use axum::{
    extract::Path,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::post,
    Router,
};
use chrono::Utc;
use handlebars::RenderError;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::middleware::BrowserSession;
use crate::services::api::ApiError;
use crate::view::html::{PageContext, Views};
use crate::AppState;

pub fn routes(config: &Config) -> Router<Arc<AppState>> {
    Router::new()
        .merge(seats::routes())
        .merge(auth::routes())
        .merge(payment::routes(config))
        .merge(tickets::routes())
        .merge(admin::routes())
        .route("/toasts/{id}/dismiss", post(dismiss_toast))
}

/// Рендер страницы с тостами и признаком входа из сессии.
/// Сессия должна быть свободна: здесь она блокируется заново.
pub(crate) async fn render_page(
    state: &AppState,
    session: &BrowserSession,
    title: &str,
    body: impl FnOnce(&Views, &PageContext<'_>) -> Result<String, RenderError>,
) -> Response {
    let (toasts, authenticated) = {
        let mut s = session.handle.lock().await;
        let now = Utc::now();
        (s.toasts.visible(now), s.tokens.is_authenticated(now))
    };
    let ctx = PageContext { app_name: &state.config.app.name, title, toasts: &toasts, authenticated };
    match body(&state.views, &ctx) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Failed to render page '{}': {}", title, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Ошибка API превращается в тост и редирект. 401 сбрасывает токен и ведёт на вход.
pub(crate) async fn api_failure(
    session: &BrowserSession,
    err: &ApiError,
    title: &str,
    fallback: &str,
    back: &str,
) -> Response {
    let mut s = session.handle.lock().await;
    if err.is_unauthorized() {
        warn!("Session {} got 401 from API, logging out", session.id);
        s.tokens.clear();
        s.pre_reserved.clear();
        s.toasts.warning("Sessão expirada", "Faça login novamente para continuar");
        return Redirect::to("/login").into_response();
    }
    warn!("{}: {}", title, err);
    s.toasts.error(title, err.user_message(fallback));
    Redirect::to(back).into_response()
}

/// Путь страницы, с которой пришёл запрос. Чужие и битые Referer игнорируются.
pub(crate) fn back_path(headers: &HeaderMap) -> String {
    let referer = headers.get(header::REFERER).and_then(|v| v.to_str().ok()).unwrap_or("/");
    let path = match referer.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).unwrap_or("/"),
        None => referer,
    };
    if path.starts_with('/') && !path.starts_with("//") {
        path.to_string()
    } else {
        "/".to_string()
    }
}

// POST /toasts/{id}/dismiss
async fn dismiss_toast(session: BrowserSession, Path(id): Path<Uuid>, headers: HeaderMap) -> Redirect {
    session.handle.lock().await.toasts.dismiss(id);
    Redirect::to(&back_path(&headers))
}
