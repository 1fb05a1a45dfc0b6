use axum::{
    extract::{Form, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::controllers::render_page;
use crate::middleware::BrowserSession;
use crate::models::user::{
    first_validation_message, normalize_phone, ForgotPasswordRequest, LoginRequest, RegisterRequest,
    ResetPasswordRequest,
};
use crate::services::api::ApiError;
use crate::services::auth::{guard, GuardOutcome};
use crate::view::html::RegisterForm;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(login_form).post(login))
        .route("/register", get(register_form).post(register))
        .route("/forgot-password", get(forgot_password_form).post(forgot_password))
        .route("/reset-password", get(reset_password_form).post(reset_password))
        .route("/logout", post(logout))
}

/// Гостевые страницы для вошедшего пользователя уводят на карту.
async fn redirect_if_authenticated(session: &BrowserSession) -> Option<Response> {
    let authenticated = session.handle.lock().await.tokens.is_authenticated(Utc::now());
    match guard(false, authenticated) {
        GuardOutcome::RedirectHome => Some(Redirect::to("/").into_response()),
        GuardOutcome::RedirectToLogin => Some(Redirect::to("/login").into_response()),
        GuardOutcome::Render => None,
    }
}

async fn toast_error(session: &BrowserSession, title: &str, message: impl Into<String>) {
    session.handle.lock().await.toasts.error(title, message);
}

/// Сохраняет токен и сразу подтягивает предрезервы пользователя.
async fn start_session(state: &AppState, session: &BrowserSession, token: String, name: &str) {
    let pre_reserved = state.api.user_pre_reserved(&token).await;
    let mut s = session.handle.lock().await;
    let now = Utc::now();
    s.tokens.login(token, now);
    let _ = s.pre_reserved.apply_fetch(pre_reserved, now);
    s.toasts.success("Login realizado", format!("Bem-vindo, {name}!"));
    info!("Session {} logged in", session.id);
}

// GET /login
async fn login_form(State(state): State<Arc<AppState>>, session: BrowserSession) -> Response {
    if let Some(redirect) = redirect_if_authenticated(&session).await {
        return redirect;
    }
    render_page(&state, &session, "Entrar", |views, ctx| views.login_page(ctx, "")).await
}

// POST /login
async fn login(State(state): State<Arc<AppState>>, session: BrowserSession, Form(form): Form<LoginRequest>) -> Response {
    if let Some(redirect) = redirect_if_authenticated(&session).await {
        return redirect;
    }
    let form = LoginRequest { email: form.email.trim().to_string(), ..form };

    let failure = match form.validate() {
        Err(errors) => first_validation_message(&errors),
        Ok(()) => match state.api.login(&form).await {
            Ok(auth) => {
                start_session(&state, &session, auth.access_token, &auth.user.full_name).await;
                return Redirect::to("/").into_response();
            }
            Err(ApiError::Unauthorized) => "E-mail ou senha incorretos".to_string(),
            Err(e) => {
                warn!("Login failed: {}", e);
                e.user_message("Erro ao fazer login")
            }
        },
    };

    toast_error(&session, "Erro no login", failure).await;
    render_page(&state, &session, "Entrar", |views, ctx| views.login_page(ctx, &form.email))
        .await
}

// GET /register
async fn register_form(State(state): State<Arc<AppState>>, session: BrowserSession) -> Response {
    if let Some(redirect) = redirect_if_authenticated(&session).await {
        return redirect;
    }
    let empty = RegisterForm { full_name: "", email: "", phone_number: "" };
    render_page(&state, &session, "Cadastro", |views, ctx| views.register_page(ctx, &empty))
        .await
}

// POST /register
async fn register(
    State(state): State<Arc<AppState>>,
    session: BrowserSession,
    Form(form): Form<RegisterRequest>,
) -> Response {
    if let Some(redirect) = redirect_if_authenticated(&session).await {
        return redirect;
    }
    let request = RegisterRequest {
        full_name: form.full_name.trim().to_string(),
        email: form.email.trim().to_string(),
        phone_number: normalize_phone(&form.phone_number),
        password: form.password.clone(),
    };

    let failure = match request.validate() {
        Err(errors) => first_validation_message(&errors),
        Ok(()) => match state.api.register(&request).await {
            Ok(auth) => {
                start_session(&state, &session, auth.access_token, &auth.user.full_name).await;
                return Redirect::to("/").into_response();
            }
            Err(e) => {
                warn!("Registration failed: {}", e);
                e.user_message("Erro ao criar conta")
            }
        },
    };

    toast_error(&session, "Erro no cadastro", failure).await;
    // в форму возвращается то, что ввёл пользователь
    let filled = RegisterForm { full_name: &form.full_name, email: &form.email, phone_number: &form.phone_number };
    render_page(&state, &session, "Cadastro", |views, ctx| views.register_page(ctx, &filled))
        .await
}

// GET /forgot-password
async fn forgot_password_form(State(state): State<Arc<AppState>>, session: BrowserSession) -> Response {
    if let Some(redirect) = redirect_if_authenticated(&session).await {
        return redirect;
    }
    render_page(&state, &session, "Recuperar senha", |views, ctx| views.forgot_password_page(ctx, None))
        .await
}

// POST /forgot-password
async fn forgot_password(
    State(state): State<Arc<AppState>>,
    session: BrowserSession,
    Form(form): Form<ForgotPasswordRequest>,
) -> Response {
    let email = form.email.trim().to_string();
    let request = ForgotPasswordRequest { email: email.clone() };
    let result = match request.validate() {
        Err(errors) => Err(first_validation_message(&errors)),
        Ok(()) => state
            .api
            .forgot_password(&email)
            .await
            .map_err(|e| e.user_message("Erro ao enviar e-mail de recuperação")),
    };

    match result {
        Ok(_) => render_page(&state, &session, "Recuperar senha", |views, ctx| {
            views.forgot_password_page(ctx, Some(&email))
        })
        .await,
        Err(message) => {
            toast_error(&session, "Erro", message).await;
            Redirect::to("/forgot-password").into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResetQuery {
    token: Option<String>,
}

// GET /reset-password?token=...
async fn reset_password_form(
    State(state): State<Arc<AppState>>,
    session: BrowserSession,
    Query(query): Query<ResetQuery>,
) -> Response {
    let token = query.token.filter(|t| !t.is_empty());
    render_page(&state, &session, "Nova senha", |views, ctx| views.reset_password_page(ctx, token.as_deref()))
        .await
}

#[derive(Debug, Deserialize)]
struct ResetForm {
    token: String,
    new_password: String,
    confirm_password: String,
}

/// Ссылка на форму сброса с тем же токеном.
pub(crate) fn reset_password_href(token: &str) -> String {
    match serde_urlencoded::to_string([("token", token)]) {
        Ok(query) => format!("/reset-password?{query}"),
        Err(_) => "/reset-password".to_string(),
    }
}

// POST /reset-password
async fn reset_password(State(state): State<Arc<AppState>>, session: BrowserSession, Form(form): Form<ResetForm>) -> Response {
    let retry = reset_password_href(&form.token);
    if form.new_password != form.confirm_password {
        toast_error(&session, "Erro", "As senhas não coincidem").await;
        return Redirect::to(&retry).into_response();
    }
    let request = ResetPasswordRequest { token: form.token, new_password: form.new_password };
    if let Err(errors) = request.validate() {
        toast_error(&session, "Erro", first_validation_message(&errors)).await;
        return Redirect::to(&retry).into_response();
    }

    match state.api.reset_password(&request.token, &request.new_password).await {
        Ok(_) => {
            session
                .handle
                .lock()
                .await
                .toasts
                .success("Senha redefinida", "Faça login com a nova senha");
            Redirect::to("/login").into_response()
        }
        Err(e) => {
            warn!("Password reset failed: {}", e);
            toast_error(&session, "Erro", e.user_message("Não foi possível redefinir a senha")).await;
            Redirect::to(&retry).into_response()
        }
    }
}

// POST /logout
async fn logout(session: BrowserSession) -> Redirect {
    let mut s = session.handle.lock().await;
    s.logout();
    s.toasts.info("Até logo", "Você saiu da sua conta");
    info!("Session {} logged out", session.id);
    Redirect::to("/login")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_encodes_token() {
        assert_eq!(reset_password_href("abc123"), "/reset-password?token=abc123");
        assert_eq!(reset_password_href("a b&c=d"), "/reset-password?token=a+b%26c%3Dd");
    }
}
