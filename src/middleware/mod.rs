use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::session::SessionHandle;
use crate::AppState;

pub const SESSION_COOKIE: &str = "cia_session";

/// Сессия браузера текущего запроса, кладётся в extensions слоем `session_layer`.
#[derive(Clone)]
pub struct BrowserSession {
    pub id: Uuid,
    pub handle: SessionHandle,
}

pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// Находит или создаёт сессию по cookie и выставляет cookie новой сессии.
pub async fn session_layer(State(state): State<Arc<AppState>>, mut request: Request, next: Next) -> Response {
    let cookie_id = session_id_from_headers(request.headers());
    let lookup = state.sessions.open(cookie_id).await;
    let (id, is_new) = (lookup.id, lookup.is_new);
    request.extensions_mut().insert(BrowserSession { id, handle: lookup.handle.clone() });

    let mut response = next.run(request).await;
    state.sessions.keep(lookup).await;

    if is_new {
        let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

impl<S> FromRequestParts<S> for BrowserSession
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<BrowserSession>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!("session layer is not installed on this route");
                axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
            })
    }
}

/// Пользователь с действующим токеном. Без токена - редирект на вход.
#[derive(Clone)]
pub struct Authenticated {
    pub session: BrowserSession,
    pub token: String,
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = BrowserSession::from_request_parts(parts, state).await?;
        let token = session.handle.lock().await.tokens.token(Utc::now());
        match token {
            Some(token) => Ok(Authenticated { session, token }),
            None => Err(Redirect::to("/login").into_response()),
        }
    }
}
