use axum::{
    extract::{Form, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::controllers::{api_failure, render_page};
use crate::middleware::{Authenticated, BrowserSession};
use crate::models::SeatCode;
use crate::stores::Freshness;
use crate::view::html::SeatMapPage;
use crate::view::{ClickOutcome, SeatDisplay, SeatMapView, ViewTransform};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(seat_map))
        .route("/seats/toggle", post(toggle_seat))
        .route("/selection/clear", post(clear_selection))
        .route("/view/zoom-in", post(zoom_in))
        .route("/view/zoom-out", post(zoom_out))
        .route("/view/pan", post(pan))
        .route("/view/reset", post(reset_view))
}

// GET /
async fn seat_map(State(state): State<Arc<AppState>>, auth: Authenticated) -> Response {
    let session = &auth.session;
    let (seats, pre_reserved) = tokio::join!(
        state.api.seats(&auth.token),
        state.api.user_pre_reserved(&auth.token),
    );

    if let Err(e) = &pre_reserved {
        if e.is_unauthorized() {
            return api_failure(session, e, "Erro", "", "/login").await;
        }
    }
    let records = match seats {
        Ok(records) => records,
        Err(e) if e.is_unauthorized() => return api_failure(session, &e, "Erro", "", "/login").await,
        Err(e) => {
            warn!("Seat map load failed: {}", e);
            return render_page(&state, session, "Mapa de Assentos", |views, ctx| {
                views.load_error_page(ctx, "Erro ao carregar assentos", "/")
            })
            .await;
        }
    };

    let view = SeatMapView::new(records);
    let (grid, selection, transform, busy, pre_error, stale) = {
        let mut s = session.handle.lock().await;
        let now = Utc::now();
        // ошибка уже записана в last_error кэша
        let _ = s.pre_reserved.apply_fetch(pre_reserved, now);

        let conflicts = view.conflicting_selection(&s.selection, &s.pre_reserved);
        if !conflicts.is_empty() {
            info!("Dropping {} selected seats taken by others", conflicts.len());
            for code in &conflicts {
                s.selection.remove(code);
            }
            let list: Vec<&str> = conflicts.iter().map(SeatCode::as_str).collect();
            s.toasts.warning("Assentos indisponíveis", format!("Removidos da seleção: {}", list.join(", ")));
        }

        (
            view.grid(&s.selection, &s.pre_reserved),
            s.selection.seats().to_vec(),
            s.transform,
            s.is_busy(),
            s.pre_reserved.last_error().map(str::to_string),
            s.pre_reserved.freshness(now) != Freshness::Fresh,
        )
    };

    render_page(&state, session, "Mapa de Assentos", |views, ctx| {
        views.seat_map_page(
            ctx,
            &SeatMapPage {
                grid: &grid,
                selection: &selection,
                transform: &transform,
                busy,
                pre_reserved_error: pre_error.as_deref(),
                pre_reserved_stale: stale,
            },
        )
    })
    .await
}

#[derive(Debug, Deserialize)]
struct SeatForm {
    seat: String,
}

// POST /seats/toggle
async fn toggle_seat(State(state): State<Arc<AppState>>, auth: Authenticated, Form(form): Form<SeatForm>) -> Response {
    let session = &auth.session;
    let Ok(code) = form.seat.parse::<SeatCode>() else {
        debug!("Ignoring click on malformed seat '{}'", form.seat);
        return Redirect::to("/").into_response();
    };

    if session.handle.lock().await.refuse_while_busy() {
        return Redirect::to("/").into_response();
    }

    // клик проверяется по свежему снимку, а не по тому, что видел браузер
    let records = match state.api.seats(&auth.token).await {
        Ok(records) => records,
        Err(e) => return api_failure(session, &e, "Erro ao carregar assentos", "Tente novamente", "/").await,
    };
    let view = SeatMapView::new(records);

    let mut s = session.handle.lock().await;
    let s = &mut *s;
    // запрос мог начаться, пока грузился снимок
    if s.refuse_while_busy() {
        return Redirect::to("/").into_response();
    }
    match view.click(&code, &mut s.selection, &s.pre_reserved) {
        ClickOutcome::Toggled { code, selected } => debug!("Seat {} selected={}", code, selected),
        ClickOutcome::Rejected { code, display: shown } => {
            debug!("Seat {} is not clickable ({:?})", code, shown);
            if shown == SeatDisplay::OccupiedByOther {
                s.toasts.warning("Assento indisponível", format!("O assento {code} já está ocupado"));
            }
        }
        ClickOutcome::UnknownSeat => debug!("Click on unknown seat {}", code),
    }
    Redirect::to("/").into_response()
}

// POST /selection/clear
async fn clear_selection(session: BrowserSession) -> Redirect {
    let mut s = session.handle.lock().await;
    if !s.refuse_while_busy() {
        s.selection.clear();
    }
    Redirect::to("/")
}

async fn zoom_in(session: BrowserSession) -> Redirect {
    session.handle.lock().await.transform.zoom_in();
    Redirect::to("/")
}

async fn zoom_out(session: BrowserSession) -> Redirect {
    session.handle.lock().await.transform.zoom_out();
    Redirect::to("/")
}

#[derive(Debug, Deserialize)]
struct PanForm {
    dir: String,
}

// POST /view/pan
async fn pan(session: BrowserSession, Form(form): Form<PanForm>) -> Redirect {
    let step = ViewTransform::PAN_STEP;
    let (dx, dy) = match form.dir.as_str() {
        "left" => (step, 0.0),
        "right" => (-step, 0.0),
        "up" => (0.0, step),
        "down" => (0.0, -step),
        _ => (0.0, 0.0),
    };
    session.handle.lock().await.transform.pan(dx, dy);
    Redirect::to("/")
}

async fn reset_view(session: BrowserSession) -> Redirect {
    session.handle.lock().await.transform.reset();
    Redirect::to("/")
}
