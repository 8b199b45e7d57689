use std::time::Duration;

use serde_json::json;
use wellspring_maintenance::bulk::{BulkMutator, Confirmation, MutatorConfig, direct_children};
use wellspring_maintenance::collection::{
    CloudinaryCollection, CloudinaryConfig, CollectionError, PageRequest, RemoteCollection,
};
use wiremock::matchers::{basic_auth, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RESOURCES_PATH: &str = "/v1_1/demo/resources/image/upload";

fn collection(server: &MockServer) -> CloudinaryCollection {
    let config = CloudinaryConfig::new("demo", "key", "secret").with_api_base(server.uri());
    CloudinaryCollection::new(config, Duration::from_secs(5)).expect("client should build")
}

async fn mount_two_pages(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(RESOURCES_PATH))
        .and(basic_auth("key", "secret"))
        .and(query_param("prefix", "Home"))
        .and(query_param_is_missing("next_cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [
                {"public_id": "Home/a", "bytes": 100},
                {"public_id": "Home/x/b", "bytes": 200}
            ],
            "next_cursor": "c2"
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(RESOURCES_PATH))
        .and(query_param("next_cursor", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [{"public_id": "Home/c", "bytes": 50}]
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_page_follows_next_cursor() {
    let server = MockServer::start().await;
    mount_two_pages(&server).await;
    let collection = collection(&server);

    let first = collection
        .fetch_page(&PageRequest::first("Home", 2))
        .await
        .expect("first page should load");
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.items[0].size_bytes, Some(100));
    let cursor = first.next_cursor.clone().expect("first page has a cursor");

    let second = collection
        .fetch_page(&PageRequest::first("Home", 2).next(cursor))
        .await
        .expect("second page should load");
    assert_eq!(second.items[0].identifier, "Home/c");
    assert!(second.is_last());
}

#[tokio::test]
async fn test_quota_exhaustion_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RESOURCES_PATH))
        .respond_with(
            ResponseTemplate::new(420)
                .set_body_json(json!({"error": {"message": "Rate Limit Exceeded"}})),
        )
        .mount(&server)
        .await;

    let result = collection(&server)
        .fetch_page(&PageRequest::first("Home", 10))
        .await;

    assert_eq!(
        result.unwrap_err(),
        CollectionError::RateLimited("Rate Limit Exceeded".to_owned())
    );
}

#[tokio::test]
async fn test_server_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(RESOURCES_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = collection(&server).delete_batch(&["Home/a".to_owned()]).await;

    assert!(matches!(
        result,
        Err(CollectionError::Status { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_clear_direct_children_end_to_end() {
    let server = MockServer::start().await;
    mount_two_pages(&server).await;
    Mock::given(method("DELETE"))
        .and(path(RESOURCES_PATH))
        .and(basic_auth("key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deleted": {"Home/a": "deleted", "Home/c": "not_found"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = MutatorConfig {
        page_size: 2,
        ..MutatorConfig::default()
    };
    let mutator = BulkMutator::new(collection(&server), config);
    let filter = direct_children("Home/");

    let outcome = mutator
        .run("Home", Some(&filter), Confirmation::Granted, false)
        .await
        .expect("run should be allowed");

    assert!(outcome.enumeration.complete());
    assert_eq!(outcome.enumeration.len(), 2);
    assert_eq!(outcome.report.total_deleted, 2);
    assert!(outcome.success());

    let deletes: Vec<_> = server
        .received_requests()
        .await
        .expect("recording is enabled")
        .into_iter()
        .filter(|r| r.method == wiremock::http::Method::DELETE)
        .collect();
    let ids: Vec<String> = deletes[0]
        .url
        .query_pairs()
        .filter(|(k, _)| k == "public_ids[]")
        .map(|(_, v)| v.into_owned())
        .collect();
    assert_eq!(ids, vec!["Home/a".to_owned(), "Home/c".to_owned()]);
}

#[tokio::test]
async fn test_denied_confirmation_sends_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resources": []})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mutator = BulkMutator::new(collection(&server), MutatorConfig::default());

    let result = mutator.run("Home", None, Confirmation::Denied, false).await;
    assert!(result.is_err());
}
