use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::controllers::{api_failure, render_page};
use crate::middleware::Authenticated;
use crate::models::SeatCode;
use crate::services::api::ProofFile;
use crate::services::checkout::CheckoutDraft;
use crate::view::html::PaymentPage;
use crate::AppState;

// запас на служебные части multipart поверх самого файла
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn routes(config: &Config) -> Router<Arc<AppState>> {
    Router::new()
        .route("/checkout", post(checkout))
        .route(
            "/payment",
            get(payment_form)
                .post(submit_payment)
                .layer(DefaultBodyLimit::max(config.payment.max_proof_bytes + MULTIPART_OVERHEAD)),
        )
        .route("/payment/half-price/{code}", post(toggle_half_price))
        .route("/payment/remove/{code}", post(remove_seat))
        .route("/payment/success", get(payment_success))
}

// POST /checkout - предрезерв выбранных мест и переход к оплате
async fn checkout(State(state): State<Arc<AppState>>, auth: Authenticated) -> Response {
    let session = &auth.session;
    let (seats, _in_flight) = {
        let mut s = session.handle.lock().await;
        if s.selection.is_empty() {
            s.toasts.warning("Nenhum assento selecionado", "Selecione ao menos um assento");
            return Redirect::to("/").into_response();
        }
        let Some(guard) = s.try_begin_request() else {
            s.toasts.info("Aguarde", "Sua solicitação já está sendo processada");
            return Redirect::to("/").into_response();
        };
        (s.selection.seats().to_vec(), guard)
    };

    match state.api.pre_reserve(&auth.token, &seats).await {
        Ok(resp) => {
            let held = if resp.reserved_seats.is_empty() { seats } else { resp.reserved_seats };
            info!("Session {} pre-reserved {} seats", session.id, held.len());
            let mut s = session.handle.lock().await;
            for code in held {
                s.pre_reserved.add(code);
            }
            Redirect::to("/payment").into_response()
        }
        Err(e) => api_failure(session, &e, "Erro na pré-reserva", "Não foi possível reservar os assentos", "/").await,
    }
}

// GET /payment
async fn payment_form(State(state): State<Arc<AppState>>, auth: Authenticated) -> Response {
    let session = &auth.session;
    let (draft, busy) = {
        let mut s = session.handle.lock().await;
        if s.selection.is_empty() {
            s.toasts.info("Nenhum assento selecionado", "Escolha seus assentos no mapa");
            return Redirect::to("/").into_response();
        }
        let draft = CheckoutDraft::build(s.selection.seats(), &s.half_price.snapshot(), state.config.payment.prices());
        (draft, s.is_busy())
    };

    render_page(&state, session, "Pagamento", |views, ctx| {
        views.payment_page(
            ctx,
            &PaymentPage {
                draft: &draft,
                pix_code: &state.config.payment.pix_code,
                busy,
                max_proof_bytes: state.config.payment.max_proof_bytes,
            },
        )
    })
    .await
}

// POST /payment/half-price/{code}
async fn toggle_half_price(auth: Authenticated, Path(code): Path<SeatCode>) -> Redirect {
    let mut s = auth.session.handle.lock().await;
    if !s.refuse_while_busy() {
        s.toggle_half_price(&code);
    }
    Redirect::to("/payment")
}

// POST /payment/remove/{code}
async fn remove_seat(auth: Authenticated, Path(code): Path<SeatCode>) -> Redirect {
    let mut s = auth.session.handle.lock().await;
    if s.refuse_while_busy() {
        return Redirect::to("/payment");
    }
    s.selection.remove(&code);
    if s.selection.is_empty() {
        Redirect::to("/")
    } else {
        Redirect::to("/payment")
    }
}

#[derive(Debug, Default)]
struct PaymentSubmission {
    proof: Option<ProofFile>,
    terms_accepted: bool,
}

async fn read_submission(mut multipart: Multipart, max_bytes: usize) -> Result<PaymentSubmission, String> {
    let mut submission = PaymentSubmission::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Falha ao ler o formulário: {e}"))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("terms") => submission.terms_accepted = true,
            Some("file") => {
                let file_name = field.file_name().unwrap_or("comprovante").to_string();
                let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
                let bytes = field.bytes().await.map_err(|e| format!("Falha ao ler o arquivo: {e}"))?;
                // браузер шлёт пустую часть, если файл не выбран
                if bytes.is_empty() {
                    continue;
                }
                if bytes.len() > max_bytes {
                    return Err(format!("Arquivo muito grande. Máximo {} MB", max_bytes / (1024 * 1024)));
                }
                submission.proof = Some(ProofFile { file_name, content_type, bytes: bytes.to_vec() });
            }
            _ => {}
        }
    }
    Ok(submission)
}

// POST /payment - окончательная бронь с подтверждением оплаты
async fn submit_payment(State(state): State<Arc<AppState>>, auth: Authenticated, multipart: Multipart) -> Response {
    let session = &auth.session;

    let submission = read_submission(multipart, state.config.payment.max_proof_bytes).await;
    let rejection = match &submission {
        Err(message) => Some(message.clone()),
        Ok(s) if !s.terms_accepted => Some("Confirme que os dados estão corretos".to_string()),
        Ok(PaymentSubmission { proof: None, .. }) => Some("Envie o comprovante de pagamento".to_string()),
        Ok(PaymentSubmission { proof: Some(p), .. }) if !p.is_allowed_type() => {
            Some("Tipo de arquivo não suportado. Use PNG, JPG ou PDF".to_string())
        }
        Ok(_) => None,
    };
    let proof = match (submission, rejection) {
        (Ok(PaymentSubmission { proof: Some(proof), .. }), None) => proof,
        (_, message) => {
            let message = message.unwrap_or_default();
            warn!("Payment form rejected: {}", message);
            session.handle.lock().await.toasts.error("Erro no pagamento", message);
            return Redirect::to("/payment").into_response();
        }
    };

    let (draft, _in_flight) = {
        let mut s = session.handle.lock().await;
        let draft = CheckoutDraft::build(s.selection.seats(), &s.half_price.snapshot(), state.config.payment.prices());
        if draft.is_empty() {
            s.toasts.warning("Nenhum assento selecionado", "Escolha seus assentos no mapa");
            return Redirect::to("/").into_response();
        }
        let Some(guard) = s.try_begin_request() else {
            s.toasts.info("Aguarde", "Seu pagamento já está sendo processado");
            return Redirect::to("/payment").into_response();
        };
        (draft, guard)
    };

    let reservations = draft.reservations();
    match state.api.reserve(&auth.token, &reservations, Some(proof)).await {
        Ok(_) => {
            let codes: Vec<SeatCode> = reservations.into_iter().map(|r| r.seat_code).collect();
            info!("Session {} reserved {} seats", session.id, codes.len());
            let mut s = session.handle.lock().await;
            s.complete_checkout(&codes);
            s.toasts.success("Pagamento enviado", "Seu comprovante será analisado em breve");
            Redirect::to("/payment/success").into_response()
        }
        Err(e) => {
            api_failure(session, &e, "Erro no pagamento", "Não foi possível concluir a reserva", "/payment").await
        }
    }
}

// GET /payment/success
async fn payment_success(State(state): State<Arc<AppState>>, auth: Authenticated) -> Response {
    render_page(&state, &auth.session, "Pagamento enviado", |views, ctx| views.payment_success_page(ctx)).await
}
