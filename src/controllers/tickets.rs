use axum::{
    extract::State,
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::warn;

use crate::controllers::{api_failure, render_page};
use crate::middleware::Authenticated;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/tickets", get(my_tickets))
}

// GET /tickets
async fn my_tickets(State(state): State<Arc<AppState>>, auth: Authenticated) -> Response {
    match state.api.user_tickets(&auth.token).await {
        Ok(mut tickets) => {
            tickets.sort_by(|a, b| a.code.cmp(&b.code));
            render_page(&state, &auth.session, "Meus Ingressos", |views, ctx| views.tickets_page(ctx, &tickets))
                .await
        }
        Err(e) if e.is_unauthorized() => api_failure(&auth.session, &e, "Erro", "", "/login").await,
        Err(e) => {
            warn!("Tickets load failed: {}", e);
            render_page(&state, &auth.session, "Meus Ingressos", |views, ctx| {
                views.load_error_page(ctx, "Erro ao carregar ingressos", "/tickets")
            })
            .await
        }
    }
}
