use chrono::{Duration, Utc};
use seat_front::config::ApiConfig;
use seat_front::models::SeatCode;
use seat_front::services::api::ApiClient;
use seat_front::storage::{FileStorage, Storage, PRE_RESERVED_SEATS_KEY};
use seat_front::stores::{Freshness, PreReservedCache};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn code(s: &str) -> SeatCode {
    s.parse().unwrap()
}

#[tokio::test]
async fn refresh_survives_api_failure_and_restart() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(dir.path()).unwrap());
    let server = MockServer::start().await;
    let api = ApiClient::from_config(&ApiConfig { base_url: server.uri(), timeout_ms: 2_000 }).unwrap();

    Mock::given(method("GET"))
        .and(path("/seats/user/pre-reserved"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "code": "F3", "status": "pre-reserved" },
            { "id": 2, "code": "F4", "status": "pre-reserved" }
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/seats/user/pre-reserved"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let mut cache = PreReservedCache::restore(storage.clone(), Duration::seconds(60));
    assert_eq!(cache.fetch(&api, Some("jwt")).await.unwrap(), 2);
    assert_eq!(cache.freshness(Utc::now()), Freshness::Fresh);
    assert!(storage.get(PRE_RESERVED_SEATS_KEY).unwrap().is_some());

    // второй запрос падает, кэш остаётся прежним
    assert!(cache.fetch(&api, Some("jwt")).await.is_err());
    assert!(cache.is_pre_reserved(&code("F3")));
    assert_eq!(cache.last_error(), Some("Erro ao carregar assentos pré-reservados"));

    let restored = PreReservedCache::restore(storage, Duration::seconds(60));
    assert!(restored.is_pre_reserved(&code("F4")));
    assert_eq!(restored.freshness(Utc::now()), Freshness::Unverified);
}

#[tokio::test]
async fn no_token_means_no_request_and_empty_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;
    let api = ApiClient::from_config(&ApiConfig { base_url: server.uri(), timeout_ms: 2_000 }).unwrap();

    let storage: Arc<dyn Storage> = Arc::new(seat_front::storage::MemoryStorage::new());
    let mut cache = PreReservedCache::restore(storage, Duration::seconds(60));
    cache.add(code("A1"));
    assert_eq!(cache.fetch(&api, None).await.unwrap(), 0);
    assert!(cache.seats().is_empty());
}
