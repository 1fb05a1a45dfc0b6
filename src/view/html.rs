//! Страницы фронта на шаблонах handlebars из `templates/`.

use handlebars::{Handlebars, RenderError, TemplateError};
use serde::Serialize;

use crate::models::reservation::format_brl;
use crate::models::{SeatCode, SeatRecord, TicketPrices, UserReservation};
use crate::services::checkout::CheckoutDraft;
use crate::stores::Toast;
use crate::view::seat_map::{CellView, SeatDisplay, ViewTransform};

const TEMPLATES: &[(&str, &str)] = &[
    ("layout", include_str!("../../templates/layout.hbs")),
    ("seat_map", include_str!("../../templates/seat_map.hbs")),
    ("load_error", include_str!("../../templates/load_error.hbs")),
    ("login", include_str!("../../templates/login.hbs")),
    ("register", include_str!("../../templates/register.hbs")),
    ("forgot_password", include_str!("../../templates/forgot_password.hbs")),
    ("reset_password", include_str!("../../templates/reset_password.hbs")),
    ("payment", include_str!("../../templates/payment.hbs")),
    ("payment_success", include_str!("../../templates/payment_success.hbs")),
    ("tickets", include_str!("../../templates/tickets.hbs")),
    ("admin", include_str!("../../templates/admin.hbs")),
];

pub struct PageContext<'a> {
    pub app_name: &'a str,
    pub title: &'a str,
    pub toasts: &'a [Toast],
    pub authenticated: bool,
}

#[derive(Serialize)]
struct ToastModel<'a> {
    id: String,
    css_class: &'static str,
    title: &'a str,
    message: Option<&'a str>,
}

#[derive(Serialize)]
struct LayoutModel<'a> {
    app_name: &'a str,
    title: &'a str,
    authenticated: bool,
    toasts: Vec<ToastModel<'a>>,
    body: String,
}

pub struct SeatMapPage<'a> {
    pub grid: &'a [Vec<CellView>],
    pub selection: &'a [SeatCode],
    pub transform: &'a ViewTransform,
    pub busy: bool,
    pub pre_reserved_error: Option<&'a str>,
    pub pre_reserved_stale: bool,
}

#[derive(Serialize)]
struct SeatButton {
    code: String,
    css_class: &'static str,
    title: String,
    disabled: bool,
}

#[derive(Serialize)]
struct CellModel {
    stage: bool,
    seat: Option<SeatButton>,
}

#[derive(Serialize)]
struct RowModel {
    aisle: bool,
    cells: Vec<CellModel>,
}

#[derive(Serialize)]
struct SeatMapModel<'a> {
    pre_reserved_error: Option<&'a str>,
    pre_reserved_stale: bool,
    transform_css: String,
    rows: Vec<RowModel>,
    selection: Vec<&'a str>,
    busy: bool,
    checkout_label: String,
    checkout_disabled: bool,
}

fn cell_model(cell: &CellView, busy: bool) -> CellModel {
    match cell {
        CellView::Aisle => CellModel { stage: false, seat: None },
        CellView::Stage => CellModel { stage: true, seat: None },
        CellView::Seat { code, display, status } => {
            let title = match display {
                SeatDisplay::OccupiedByOther => format!("Assento {} - {}", code, status.label()),
                SeatDisplay::PreReservedBySelf => format!("Assento {} - pré-reservado por você", code),
                _ => format!("Assento {} disponível", code),
            };
            CellModel {
                stage: false,
                seat: Some(SeatButton {
                    code: code.to_string(),
                    css_class: display.css_class(),
                    title,
                    disabled: !display.is_clickable() || busy,
                }),
            }
        }
    }
}

fn checkout_label(selected: usize, busy: bool) -> String {
    if busy {
        return "Processando...".to_string();
    }
    match selected {
        0 => "Selecione um assento para continuar".to_string(),
        1 => "Prosseguir para Pagamento (1 assento)".to_string(),
        n => format!("Prosseguir para Pagamento ({n} assentos)"),
    }
}

#[derive(Serialize)]
struct LoadErrorModel<'a> {
    message: &'a str,
    retry_href: &'a str,
}

#[derive(Serialize)]
struct LoginModel<'a> {
    email: &'a str,
}

#[derive(Serialize)]
pub struct RegisterForm<'a> {
    pub full_name: &'a str,
    pub email: &'a str,
    pub phone_number: &'a str,
}

#[derive(Serialize)]
struct ForgotPasswordModel<'a> {
    sent_to: Option<&'a str>,
}

#[derive(Serialize)]
struct ResetPasswordModel<'a> {
    token: Option<&'a str>,
}

pub struct PaymentPage<'a> {
    pub draft: &'a CheckoutDraft,
    pub pix_code: &'a str,
    pub busy: bool,
    pub max_proof_bytes: usize,
}

#[derive(Serialize)]
struct PaymentLineModel {
    code: String,
    row: char,
    price: String,
    half_price: bool,
    toggle_label: &'static str,
}

#[derive(Serialize)]
struct PaymentModel<'a> {
    lines: Vec<PaymentLineModel>,
    total: String,
    half_count: usize,
    pix_code: &'a str,
    max_proof_mb: usize,
    busy: bool,
    submit_disabled: bool,
    submit_label: String,
}

#[derive(Serialize)]
struct TicketModel {
    code: String,
    label: &'static str,
    date: String,
}

#[derive(Serialize)]
struct TicketsModel {
    tickets: Vec<TicketModel>,
}

#[derive(Serialize)]
struct PendingSeatModel {
    code: String,
    price_label: &'static str,
}

#[derive(Serialize)]
struct ReservationModel<'a> {
    user_name: &'a str,
    seat_count: usize,
    total: String,
    seats: Vec<PendingSeatModel>,
}

#[derive(Serialize)]
struct AdminModel<'a> {
    reservations: Vec<ReservationModel<'a>>,
}

#[derive(Serialize)]
struct Empty {}

/// Реестр шаблонов страниц. Значения из `{{...}}` экранирует handlebars.
pub struct Views {
    handlebars: Handlebars<'static>,
}

impl Views {
    pub fn new() -> Result<Self, TemplateError> {
        let mut handlebars = Handlebars::new();
        for (name, source) in TEMPLATES {
            handlebars.register_template_string(name, *source)?;
        }
        Ok(Self { handlebars })
    }

    /// Рендерит тело страницы и оборачивает его в общий каркас.
    fn page<T: Serialize>(&self, ctx: &PageContext<'_>, template: &str, data: &T) -> Result<String, RenderError> {
        let body = self.handlebars.render(template, data)?;
        let toasts = ctx
            .toasts
            .iter()
            .map(|toast| ToastModel {
                id: toast.id.to_string(),
                css_class: toast.kind.css_class(),
                title: &toast.title,
                message: toast.message.as_deref(),
            })
            .collect();
        let layout = LayoutModel {
            app_name: ctx.app_name,
            title: ctx.title,
            authenticated: ctx.authenticated,
            toasts,
            body,
        };
        self.handlebars.render("layout", &layout)
    }

    pub fn seat_map_page(&self, ctx: &PageContext<'_>, page: &SeatMapPage<'_>) -> Result<String, RenderError> {
        let rows = page
            .grid
            .iter()
            .map(|row| {
                if row.iter().all(|cell| matches!(cell, CellView::Aisle)) {
                    RowModel { aisle: true, cells: Vec::new() }
                } else {
                    RowModel { aisle: false, cells: row.iter().map(|cell| cell_model(cell, page.busy)).collect() }
                }
            })
            .collect();
        let model = SeatMapModel {
            pre_reserved_error: page.pre_reserved_error,
            pre_reserved_stale: page.pre_reserved_stale,
            transform_css: page.transform.css(),
            rows,
            selection: page.selection.iter().map(SeatCode::as_str).collect(),
            busy: page.busy,
            checkout_label: checkout_label(page.selection.len(), page.busy),
            checkout_disabled: page.selection.is_empty() || page.busy,
        };
        self.page(ctx, "seat_map", &model)
    }

    /// Ошибка загрузки данных с кнопкой ручного повтора.
    pub fn load_error_page(&self, ctx: &PageContext<'_>, message: &str, retry_href: &str) -> Result<String, RenderError> {
        self.page(ctx, "load_error", &LoadErrorModel { message, retry_href })
    }

    pub fn login_page(&self, ctx: &PageContext<'_>, email: &str) -> Result<String, RenderError> {
        self.page(ctx, "login", &LoginModel { email })
    }

    pub fn register_page(&self, ctx: &PageContext<'_>, form: &RegisterForm<'_>) -> Result<String, RenderError> {
        self.page(ctx, "register", form)
    }

    pub fn forgot_password_page(&self, ctx: &PageContext<'_>, sent_to: Option<&str>) -> Result<String, RenderError> {
        self.page(ctx, "forgot_password", &ForgotPasswordModel { sent_to })
    }

    pub fn reset_password_page(&self, ctx: &PageContext<'_>, token: Option<&str>) -> Result<String, RenderError> {
        self.page(ctx, "reset_password", &ResetPasswordModel { token })
    }

    pub fn payment_page(&self, ctx: &PageContext<'_>, page: &PaymentPage<'_>) -> Result<String, RenderError> {
        let total = format_brl(page.draft.total_cents());
        let lines = page
            .draft
            .lines()
            .iter()
            .map(|line| PaymentLineModel {
                code: line.code.to_string(),
                row: line.code.row_letter(),
                price: format_brl(line.price_cents),
                half_price: line.half_price,
                toggle_label: if line.half_price { "Inteira" } else { "Meia entrada (estudante, idoso, PCD)" },
            })
            .collect();
        let model = PaymentModel {
            lines,
            half_count: page.draft.half_price_count(),
            pix_code: if page.pix_code.is_empty() { "PIX_CODE não encontrado" } else { page.pix_code },
            max_proof_mb: page.max_proof_bytes / (1024 * 1024),
            busy: page.busy,
            submit_disabled: page.draft.is_empty() || page.busy,
            submit_label: if page.busy {
                "Processando...".to_string()
            } else {
                format!("Confirmar Pagamento - {total}")
            },
            total,
        };
        self.page(ctx, "payment", &model)
    }

    pub fn payment_success_page(&self, ctx: &PageContext<'_>) -> Result<String, RenderError> {
        self.page(ctx, "payment_success", &Empty {})
    }

    pub fn tickets_page(&self, ctx: &PageContext<'_>, tickets: &[SeatRecord]) -> Result<String, RenderError> {
        let tickets = tickets
            .iter()
            .map(|ticket| TicketModel {
                code: ticket.code.to_string(),
                label: ticket.status.label(),
                date: ticket
                    .updated_at()
                    .or_else(|| ticket.created_at())
                    .map(|d| d.format("%d/%m/%Y %H:%M").to_string())
                    .unwrap_or_default(),
            })
            .collect();
        self.page(ctx, "tickets", &TicketsModel { tickets })
    }

    pub fn admin_page(
        &self,
        ctx: &PageContext<'_>,
        pending: &[UserReservation],
        prices: &TicketPrices,
    ) -> Result<String, RenderError> {
        let reservations = pending
            .iter()
            .map(|reservation| ReservationModel {
                user_name: &reservation.user_name,
                seat_count: reservation.seats.len(),
                total: format_brl(reservation.total_cents(prices)),
                seats: reservation
                    .seats
                    .iter()
                    .map(|seat| PendingSeatModel {
                        code: seat.code.to_string(),
                        price_label: if seat.is_half_price { "Meia" } else { "Inteira" },
                    })
                    .collect(),
            })
            .collect();
        self.page(ctx, "admin", &AdminModel { reservations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeatStatus;
    use crate::stores::ToastKind;
    use chrono::{Duration, Utc};

    fn ctx<'a>(toasts: &'a [Toast]) -> PageContext<'a> {
        PageContext { app_name: "CIA App", title: "Teste", toasts, authenticated: true }
    }

    fn views() -> Views {
        Views::new().expect("templates compile")
    }

    #[test]
    fn disabled_seats_render_disabled() {
        let grid = vec![vec![
            CellView::Seat { code: "A1".parse().unwrap(), display: SeatDisplay::OccupiedByOther, status: SeatStatus::Occupied },
            CellView::Seat { code: "A2".parse().unwrap(), display: SeatDisplay::Available, status: SeatStatus::Available },
        ]];
        let transform = ViewTransform::default();
        let page = SeatMapPage {
            grid: &grid,
            selection: &[],
            transform: &transform,
            busy: false,
            pre_reserved_error: None,
            pre_reserved_stale: false,
        };
        let html = views().seat_map_page(&ctx(&[]), &page).unwrap();
        assert!(html.contains("value=\"A1\" class=\"seat seat-occupied\" title=\"Assento A1 - Aprovado\" disabled>"));
        assert!(html.contains("value=\"A2\" class=\"seat seat-available\" title=\"Assento A2 disponível\">"));
        assert!(html.contains("Selecione um assento para continuar"));
        assert!(html.contains("<div class=\"stage-banner\">PALCO</div>"));
    }

    #[test]
    fn busy_map_disables_checkout() {
        let selection: Vec<SeatCode> = vec!["B2".parse().unwrap(), "B3".parse().unwrap()];
        let transform = ViewTransform::default();
        let page = SeatMapPage {
            grid: &[],
            selection: &selection,
            transform: &transform,
            busy: true,
            pre_reserved_error: Some("Erro ao carregar assentos pré-reservados"),
            pre_reserved_stale: true,
        };
        let html = views().seat_map_page(&ctx(&[]), &page).unwrap();
        assert!(html.contains("<span class=\"chip\">B2</span>"));
        assert!(html.contains("Processando..."));
        assert!(html.contains("Erro ao carregar assentos pré-reservados"));
        assert!(html.contains("podem estar desatualizadas"));
    }

    #[test]
    fn admin_page_escapes_user_names() {
        let pending = vec![UserReservation { user_name: "<script>".into(), seats: vec![] }];
        let html = views().admin_page(&ctx(&[]), &pending, &TicketPrices::default()).unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn layout_shows_toasts_and_escapes_input() {
        let toasts = vec![Toast {
            id: uuid::Uuid::new_v4(),
            kind: ToastKind::Warning,
            title: "Atenção".into(),
            message: Some("<b>cuidado</b>".into()),
            duration: Duration::seconds(5),
            created_at: Utc::now(),
        }];
        let html = views().login_page(&ctx(&toasts), "\"ana\"@x.com").unwrap();
        assert!(html.contains("toast toast-warning"));
        assert!(html.contains(&format!("/toasts/{}/dismiss", toasts[0].id)));
        assert!(html.contains("&lt;b&gt;cuidado&lt;/b&gt;"));
        assert!(html.contains("value=\"&quot;ana&quot;@x.com\""));
        assert!(html.contains("<title>Teste - CIA App</title>"));
    }

    #[test]
    fn empty_tickets_offer_seat_map() {
        let html = views().tickets_page(&ctx(&[]), &[]).unwrap();
        assert!(html.contains("Você ainda não possui ingressos."));
    }
}
