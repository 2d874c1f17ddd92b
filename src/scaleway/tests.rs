//! Unit tests for Scaleway response normalisation and error mapping.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::StatusCode;
use rstest::rstest;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::error::{from_status, kind_for_status};
use super::types::{ListVolumesResponse, ScalewayVolume, next_cursor, parse_state, size_gib};
use super::*;
use crate::config::AutopruneConfig;
use crate::volume::VolumeState;

fn decode_volume(value: &serde_json::Value) -> VolumeDescriptor {
    serde_json::from_value::<ScalewayVolume>(value.clone())
        .expect("volume decodes")
        .into_descriptor("fr-par-1")
}

#[rstest]
#[case("available", VolumeState::Available)]
#[case("in_use", VolumeState::InUse)]
#[case("creating", VolumeState::Creating)]
#[case("deleting", VolumeState::Deleting)]
#[case("deleted", VolumeState::Deleting)]
#[case("error", VolumeState::Error)]
#[case("snapshotting", VolumeState::Unknown)]
#[case("", VolumeState::Unknown)]
fn provider_statuses_map_to_states(#[case] status: &str, #[case] expected: VolumeState) {
    assert_eq!(parse_state(status), expected);
}

#[rstest]
#[case(0, 0)]
#[case(1, 1)]
#[case(1 << 30, 1)]
#[case((1 << 30) + 1, 2)]
#[case(10_000_000_000, 10)]
fn sizes_round_up_to_whole_gib(#[case] bytes: u64, #[case] expected: u64) {
    assert_eq!(size_gib(bytes), expected);
}

#[test]
fn list_response_normalises_volumes() {
    let body = json!({
        "volumes": [{
            "id": "11111111-1111-1111-1111-111111111111",
            "name": "scratch",
            "type": "sbs_5k",
            "size": 20_000_000_000_u64,
            "status": "available",
            "zone": "nl-ams-1",
            "created_at": "2024-03-01T10:00:00Z",
            "references": []
        }],
        "total_count": 1
    });
    let parsed: ListVolumesResponse = serde_json::from_value(body).expect("page decodes");
    assert_eq!(parsed.total_count, 1);
    let volume = parsed
        .volumes
        .into_iter()
        .next()
        .expect("one volume")
        .into_descriptor("fr-par-1");

    assert_eq!(volume.id, "11111111-1111-1111-1111-111111111111");
    assert_eq!(volume.name.as_deref(), Some("scratch"));
    assert_eq!(volume.volume_type.as_deref(), Some("sbs_5k"));
    assert_eq!(volume.size_gib, 19);
    assert_eq!(volume.state, VolumeState::Available);
    assert_eq!(volume.region, "nl-ams-1");
    assert!(volume.created_at.is_some());
    assert!(volume.attachments.is_empty());
}

#[test]
fn detached_references_are_not_attachments() {
    let volume = decode_volume(&json!({
        "id": "vol-1",
        "status": "available",
        "size": 1,
        "references": [
            {"id": "ref-1", "product_resource_id": "srv-1", "status": "detached"},
            {"id": "ref-2", "product_resource_id": "srv-2", "status": "attached"}
        ]
    }));
    assert_eq!(volume.attachments, vec![String::from("srv-2")]);
}

#[test]
fn missing_optional_fields_use_fallbacks() {
    let volume = decode_volume(&json!({"id": "vol-1", "status": "in_use", "name": ""}));
    assert_eq!(volume.region, "fr-par-1");
    assert_eq!(volume.name, None);
    assert_eq!(volume.volume_type, None);
    assert_eq!(volume.created_at, None);
    assert_eq!(volume.size_gib, 0);
}

#[rstest]
#[case(1, 50, 50, 120, Some("2"))]
#[case(2, 50, 50, 120, Some("3"))]
#[case(3, 50, 20, 120, None)]
#[case(2, 50, 50, 100, None)]
#[case(1, 50, 0, 120, None)]
fn next_cursor_follows_total_count(
    #[case] page: u32,
    #[case] page_size: u32,
    #[case] returned: usize,
    #[case] total: u64,
    #[case] expected: Option<&str>,
) {
    let next = next_cursor(page, page_size, returned, total);
    assert_eq!(next.as_ref().map(PageCursor::as_str), expected);
}

#[rstest]
#[case(404, ProviderErrorKind::NotFound)]
#[case(409, ProviderErrorKind::InUse)]
#[case(412, ProviderErrorKind::InUse)]
#[case(401, ProviderErrorKind::Unauthorized)]
#[case(403, ProviderErrorKind::Unauthorized)]
#[case(429, ProviderErrorKind::RateLimited)]
#[case(408, ProviderErrorKind::Unavailable)]
#[case(502, ProviderErrorKind::Unavailable)]
#[case(503, ProviderErrorKind::Unavailable)]
#[case(400, ProviderErrorKind::Rejected)]
fn statuses_map_to_error_kinds(#[case] code: u16, #[case] expected: ProviderErrorKind) {
    let status = StatusCode::from_u16(code).expect("valid status");
    assert_eq!(kind_for_status(status), expected);
}

#[test]
fn api_error_message_is_preferred_over_raw_body() {
    let body = br#"{"type":"precondition_failed","message":"volume is attached"}"#;
    let err = from_status(StatusCode::PRECONDITION_FAILED, body);
    assert_eq!(err.kind, ProviderErrorKind::InUse);
    assert!(err.message.contains("precondition_failed: volume is attached"));
}

#[test]
fn non_json_error_body_is_kept_verbatim() {
    let err = from_status(StatusCode::BAD_GATEWAY, b"upstream down");
    assert_eq!(err.kind, ProviderErrorKind::Unavailable);
    assert!(err.message.contains("upstream down"));
}

#[test]
fn page_numbers_come_from_the_cursor() {
    assert_eq!(ScalewayBlockProvider::page_number(None).ok(), Some(1));
    assert_eq!(
        ScalewayBlockProvider::page_number(Some(&PageCursor::new("4"))).ok(),
        Some(4)
    );
    let err = ScalewayBlockProvider::page_number(Some(&PageCursor::new("next")))
        .expect_err("non-numeric cursor");
    assert_eq!(err.kind, ProviderErrorKind::Malformed);
}

/// Local HTTP endpoint answering one scripted response per connection.
struct StubApi {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubApi {
    async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        tokio::spawn(serve(listener, responses, Arc::clone(&requests)));
        Self { addr, requests }
    }

    fn provider(&self, page_size: u32) -> ScalewayBlockProvider {
        let config = AutopruneConfig {
            secret_key: String::from("stub-secret"),
            project_id: Some(String::from("proj-1")),
            region: String::from("fr-par-1"),
            api_url: format!("http://{}/", self.addr),
            default_rate_per_gib: String::from("0.08"),
            rates: None,
            rate_table_file: None,
            max_delete_concurrency: 1,
            delete_timeout_seconds: 5,
            list_timeout_seconds: 5,
            page_size,
            delete_retries: 0,
            list_retries: 0,
            retry_backoff_millis: 1,
            verify_before_delete: true,
        };
        ScalewayBlockProvider::new(&config).expect("provider builds")
    }

    /// Returns each request head received so far, lowercased.
    fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn serve(
    listener: TcpListener,
    responses: Vec<(u16, String)>,
    requests: Arc<Mutex<Vec<String>>>,
) {
    for (status, body) in responses {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut head = Vec::new();
        let mut chunk = [0_u8; 1024];
        while !head.windows(4).any(|window| window == b"\r\n\r\n") {
            match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(read) => head.extend_from_slice(chunk.get(..read).unwrap_or_default()),
            }
        }
        requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(String::from_utf8_lossy(&head).to_lowercase());
        let reply = format!(
            "HTTP/1.1 {status} STUB\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(reply.as_bytes()).await.ok();
        socket.shutdown().await.ok();
    }
}

fn stored_volume() -> VolumeDescriptor {
    VolumeDescriptor::new("vol-1", 10, VolumeState::Available, "fr-par-1")
}

#[tokio::test]
async fn list_sends_credentials_and_paging_query() {
    let page = json!({
        "volumes": [{"id": "vol-1", "status": "available", "size": 10_737_418_240_u64, "zone": "fr-par-1"}],
        "total_count": 3
    });
    let api = StubApi::start(vec![(200, page.to_string())]).await;
    let provider = api.provider(1);

    let listed = provider.list_page(None).await.expect("page lists");

    assert_eq!(listed.volumes.len(), 1);
    assert_eq!(listed.volumes.first().map(|volume| volume.size_gib), Some(10));
    assert_eq!(listed.next.as_ref().map(PageCursor::as_str), Some("2"));
    let requests = api.requests();
    let head = requests.first().expect("one request");
    assert!(
        head.starts_with("get /zones/fr-par-1/volumes?page=1&page_size=1&project_id=proj-1 "),
        "request: {head}"
    );
    assert!(head.contains("x-auth-token: stub-secret"), "request: {head}");
}

#[tokio::test]
async fn fetch_maps_not_found_to_absent_volume() {
    let body = json!({"type": "not_found", "message": "resource is not found"});
    let api = StubApi::start(vec![(404, body.to_string())]).await;
    let provider = api.provider(50);

    let fetched = provider
        .fetch_volume(&stored_volume())
        .await
        .expect("404 is not an error");

    assert_eq!(fetched, None);
    let requests = api.requests();
    let head = requests.first().expect("one request");
    assert!(head.starts_with("get /zones/fr-par-1/volumes/vol-1 "), "request: {head}");
}

#[tokio::test]
async fn fetch_decodes_a_volume_being_deleted() {
    let body = json!({"id": "vol-1", "status": "deleted", "size": 1, "zone": "fr-par-1"});
    let api = StubApi::start(vec![(200, body.to_string())]).await;
    let provider = api.provider(50);

    let fetched = provider
        .fetch_volume(&stored_volume())
        .await
        .expect("volume fetches")
        .expect("volume present");

    assert_eq!(fetched.state, VolumeState::Deleting);
}

#[tokio::test]
async fn delete_reports_success_and_conflicts() {
    let conflict = json!({"type": "precondition_failed", "message": "volume is attached"});
    let api = StubApi::start(vec![
        (204, String::new()),
        (412, conflict.to_string()),
    ])
    .await;
    let provider = api.provider(50);

    provider
        .delete_volume(&stored_volume())
        .await
        .expect("first delete succeeds");
    let err = provider
        .delete_volume(&stored_volume())
        .await
        .expect_err("second delete conflicts");

    assert_eq!(err.kind, ProviderErrorKind::InUse);
    assert!(err.message.contains("volume is attached"));
    let requests = api.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|head| head.starts_with("delete /zones/fr-par-1/volumes/vol-1 ")));
}

#[tokio::test]
async fn provider_zone_follows_configuration() {
    let api = StubApi::start(Vec::new()).await;
    assert_eq!(api.provider(50).zone(), "fr-par-1");
}
