use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::controllers::{api_failure, render_page};
use crate::middleware::Authenticated;
use crate::models::SeatCode;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin", get(pending_seats))
        .route("/admin/seats/{code}/approve", post(approve_seat))
        .route("/admin/seats/{code}/reprove", post(reprove_seat))
}

/// Пускает дальше только пользователей со scope `admin`.
async fn require_admin(state: &AppState, auth: &Authenticated) -> Result<(), Response> {
    match state.api.me(&auth.token).await {
        Ok(user) if user.is_admin() => Ok(()),
        Ok(user) => {
            warn!("User {} without admin scope tried the admin panel", user.user_id);
            auth.session
                .handle
                .lock()
                .await
                .toasts
                .warning("Acesso restrito", "Você não tem permissão para acessar esta página");
            Err(Redirect::to("/").into_response())
        }
        Err(e) => Err(api_failure(&auth.session, &e, "Erro", "Não foi possível verificar permissões", "/").await),
    }
}

// GET /admin
async fn pending_seats(State(state): State<Arc<AppState>>, auth: Authenticated) -> Response {
    if let Err(response) = require_admin(&state, &auth).await {
        return response;
    }
    match state.api.pending_seats(&auth.token).await {
        Ok(pending) => {
            let prices = state.config.payment.prices();
            render_page(&state, &auth.session, "Painel Administrativo", |views, ctx| {
                views.admin_page(ctx, &pending, &prices)
            })
            .await
        }
        Err(e) if e.is_unauthorized() => api_failure(&auth.session, &e, "Erro", "", "/login").await,
        Err(e) => {
            warn!("Pending seats load failed: {}", e);
            render_page(&state, &auth.session, "Painel Administrativo", |views, ctx| {
                views.load_error_page(ctx, "Erro ao carregar assentos pendentes", "/admin")
            })
            .await
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Decision {
    Approve,
    Reprove,
}

async fn decide(state: &AppState, auth: &Authenticated, code: SeatCode, decision: Decision) -> Response {
    if let Err(response) = require_admin(state, auth).await {
        return response;
    }
    let _in_flight = {
        let mut s = auth.session.handle.lock().await;
        match s.try_begin_request() {
            Some(guard) => guard,
            None => {
                s.toasts.info("Aguarde", "Outra operação está em andamento");
                return Redirect::to("/admin").into_response();
            }
        }
    };

    let result = match decision {
        Decision::Approve => state.api.approve_seat(&auth.token, &code).await,
        Decision::Reprove => state.api.reprove_seat(&auth.token, &code).await,
    };
    match (result, decision) {
        (Ok(_), Decision::Approve) => {
            info!("Seat {} approved", code);
            auth.session.handle.lock().await.toasts.success("Assento Aprovado", format!("Assento {code} aprovado com sucesso"));
            Redirect::to("/admin").into_response()
        }
        (Ok(_), Decision::Reprove) => {
            info!("Seat {} reproved", code);
            auth.session.handle.lock().await.toasts.success("Assento Reprovado", format!("Assento {code} foi reprovado"));
            Redirect::to("/admin").into_response()
        }
        (Err(e), Decision::Approve) => {
            api_failure(&auth.session, &e, "Erro", "Falha ao aprovar assento", "/admin").await
        }
        (Err(e), Decision::Reprove) => {
            api_failure(&auth.session, &e, "Erro", "Falha ao reprovar assento", "/admin").await
        }
    }
}

// POST /admin/seats/{code}/approve
async fn approve_seat(State(state): State<Arc<AppState>>, auth: Authenticated, Path(code): Path<SeatCode>) -> Response {
    decide(&state, &auth, code, Decision::Approve).await
}

// POST /admin/seats/{code}/reprove
async fn reprove_seat(State(state): State<Arc<AppState>>, auth: Authenticated, Path(code): Path<SeatCode>) -> Response {
    decide(&state, &auth, code, Decision::Reprove).await
}
