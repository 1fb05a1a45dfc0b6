use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use seat_front::{app, config::Config, models::SeatCode, storage::MemoryStorage, AppState};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    server: MockServer,
    state: Arc<AppState>,
    router: Router,
}

impl Harness {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let mut config = Config::default();
        config.api.base_url = server.uri();
        config.payment.pix_code = "00020126PIXTESTE".into();
        let state = AppState::with_storage(config, Arc::new(MemoryStorage::new())).unwrap();
        let router = app(state.clone());
        Self { server, state, router }
    }

    async fn mount_seats(&self) {
        Mock::given(method("GET"))
            .and(path("/seats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 1, "code": "A1", "status": "available" },
                { "id": 2, "code": "A2", "status": "available" },
                { "id": 3, "user_id": 8, "code": "A3", "status": "occupied" }
            ])))
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/seats/user/pre-reserved"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&self.server)
            .await;
    }

    async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Входит через форму и возвращает cookie сессии.
    async fn login(&self) -> String {
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "jwt-ana",
                "user": { "id": 5, "email": "ana@example.com", "full_name": "Ana Souza" }
            })))
            .mount(&self.server)
            .await;

        let response = self
            .send(
                Request::post("/login")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("email=ana%40example.com&password=segredo"))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        session_cookie(&response).expect("login must set session cookie")
    }

    async fn selection(&self, cookie: &str) -> Vec<SeatCode> {
        let id: Uuid = cookie.trim_start_matches("cia_session=").parse().unwrap();
        let lookup = self.state.sessions.open(Some(id)).await;
        let session = lookup.handle.lock().await;
        session.selection.seats().to_vec()
    }

    async fn post_form(&self, uri: &str, cookie: &str, body: &str) -> axum::response::Response {
        self.send(
            Request::post(uri)
                .header(header::COOKIE, cookie)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

fn location(response: &axum::response::Response) -> &str {
    response.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()).unwrap_or("")
}

fn session_cookie(response: &axum::response::Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("cia_session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

fn payment_submission(cookie: &str) -> Request<Body> {
    let boundary = "XFORMBOUNDARY";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"terms\"\r\n\r\non\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"pix.png\"\r\nContent-Type: image/png\r\n\r\nPNGDATA\r\n\
         --{b}--\r\n",
        b = boundary
    );
    Request::post("/payment")
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn code(s: &str) -> SeatCode {
    s.parse().unwrap()
}

#[tokio::test]
async fn anonymous_visitor_is_sent_to_login() {
    let h = Harness::start().await;
    let response = h.send(Request::get("/").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(session_cookie(&response).is_some());
}

#[tokio::test]
async fn health_does_not_need_session() {
    let h = Harness::start().await;
    let response = h.send(Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn seat_map_renders_after_login() {
    let h = Harness::start().await;
    h.mount_seats().await;
    let cookie = h.login().await;

    let response = h.send(Request::get("/").header(header::COOKIE, &cookie).body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Bem-vindo, Ana Souza!"));
    assert!(html.contains("value=\"A1\""));
    assert!(html.contains("seat-occupied"));
}

#[tokio::test]
async fn logged_in_user_skips_login_page() {
    let h = Harness::start().await;
    h.mount_seats().await;
    let cookie = h.login().await;
    let response = h.send(Request::get("/login").header(header::COOKIE, &cookie).body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn occupied_seat_click_keeps_selection() {
    let h = Harness::start().await;
    h.mount_seats().await;
    let cookie = h.login().await;

    h.post_form("/seats/toggle", &cookie, "seat=A1").await;
    assert_eq!(h.selection(&cookie).await, vec![code("A1")]);

    let response = h.post_form("/seats/toggle", &cookie, "seat=A3").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(h.selection(&cookie).await, vec![code("A1")]);

    // повторный клик снимает выбор
    h.post_form("/seats/toggle", &cookie, "seat=A1").await;
    assert!(h.selection(&cookie).await.is_empty());
}

#[tokio::test]
async fn expired_token_logs_out() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/seats/user/pre-reserved"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/seats"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "expired" })))
        .mount(&h.server)
        .await;
    let cookie = h.login().await;

    let response = h.send(Request::get("/").header(header::COOKIE, &cookie).body(Body::empty()).unwrap()).await;
    assert_eq!(location(&response), "/login");

    let id: Uuid = cookie.trim_start_matches("cia_session=").parse().unwrap();
    let lookup = h.state.sessions.open(Some(id)).await;
    assert!(!lookup.handle.lock().await.tokens.is_authenticated(Utc::now()));
}

#[tokio::test]
async fn successful_reservation_clears_selection() {
    let h = Harness::start().await;
    h.mount_seats().await;
    Mock::given(method("POST"))
        .and(path("/seats/pre-reserve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok", "reserved_seats": ["A1", "A2"] })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/seats/reserve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Reserva enviada" })))
        .expect(1)
        .mount(&h.server)
        .await;
    let cookie = h.login().await;

    h.post_form("/seats/toggle", &cookie, "seat=A1").await;
    h.post_form("/seats/toggle", &cookie, "seat=A2").await;

    let response = h.post_form("/checkout", &cookie, "").await;
    assert_eq!(location(&response), "/payment");

    h.post_form("/payment/half-price/A2", &cookie, "").await;
    let page = h.send(Request::get("/payment").header(header::COOKIE, &cookie).body(Body::empty()).unwrap()).await;
    let html = body_text(page).await;
    assert!(html.contains("00020126PIXTESTE"));
    assert!(html.contains("R$ 75,00"));

    let response = h.send(payment_submission(&cookie)).await;
    assert_eq!(location(&response), "/payment/success");
    assert!(h.selection(&cookie).await.is_empty());
}

#[tokio::test]
async fn selection_is_frozen_while_reservation_is_pending() {
    let h = Harness::start().await;
    h.mount_seats().await;
    Mock::given(method("POST"))
        .and(path("/seats/pre-reserve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok", "reserved_seats": ["A1"] })))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/seats/reserve"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "message": "Reserva enviada" }))
                .set_delay(Duration::from_millis(400)),
        )
        .expect(1)
        .mount(&h.server)
        .await;
    let cookie = h.login().await;

    h.post_form("/seats/toggle", &cookie, "seat=A1").await;
    h.post_form("/checkout", &cookie, "").await;

    let pending = tokio::spawn(h.router.clone().oneshot(payment_submission(&cookie)));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = h.post_form("/seats/toggle", &cookie, "seat=A2").await;
    assert_eq!(location(&response), "/");
    h.post_form("/selection/clear", &cookie, "").await;
    h.post_form("/payment/half-price/A1", &cookie, "").await;
    assert_eq!(h.selection(&cookie).await, vec![code("A1")]);

    let response = pending.await.unwrap().unwrap();
    assert_eq!(location(&response), "/payment/success");
    assert!(h.selection(&cookie).await.is_empty());

    let page = h.send(Request::get("/").header(header::COOKIE, &cookie).body(Body::empty()).unwrap()).await;
    assert!(body_text(page).await.contains("Aguarde"));
}

#[tokio::test]
async fn anonymous_traffic_does_not_pile_up_sessions() {
    let h = Harness::start().await;
    for i in 0..50 {
        let mut request = Request::get("/login");
        if i % 2 == 1 {
            request = request.header(header::COOKIE, format!("cia_session={}", Uuid::new_v4()));
        }
        let response = h.send(request.body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(h.state.sessions.len().await, 0);

    h.mount_seats().await;
    h.login().await;
    assert_eq!(h.state.sessions.len().await, 1);
}

#[tokio::test]
async fn payment_without_proof_is_rejected_locally() {
    let h = Harness::start().await;
    h.mount_seats().await;
    Mock::given(method("POST")).and(path("/seats/reserve")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&h.server).await;
    let cookie = h.login().await;
    h.post_form("/seats/toggle", &cookie, "seat=A1").await;

    let boundary = "XFORMBOUNDARY";
    let body = format!("--{boundary}\r\nContent-Disposition: form-data; name=\"terms\"\r\n\r\non\r\n--{boundary}--\r\n");
    let response = h
        .send(
            Request::post("/payment")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(location(&response), "/payment");
    assert_eq!(h.selection(&cookie).await, vec![code("A1")]);
}
