mod common;

use common::{list_json, subdomain_json, Harness, LIST};
use serde_json::json;
use std::time::Duration;
use subreg_registry::{RegistryError, SubdomainDraft};
use subreg_session::{ClearReason, Credential};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn seed(h: &Harness, ids: &[i64]) {
    Mock::given(method("GET"))
        .and(path(LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_json(ids)))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    assert!(h.registry.refresh().await.unwrap());
    assert_eq!(h.ids(), ids);
}

#[tokio::test]
async fn refresh_without_credential_sends_nothing() {
    let h = Harness::new().await;
    Mock::given(path(LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_json(&[1])))
        .expect(0)
        .mount(&h.server)
        .await;

    assert!(!h.registry.refresh().await.unwrap());
    assert!(h.registry.list().is_empty());
}

#[tokio::test]
async fn refresh_replaces_cache_and_sends_bearer() {
    let h = Harness::new().await;
    h.sign_in();
    Mock::given(method("GET"))
        .and(path(LIST))
        .and(header("authorization", "Bearer valid-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_json(&[3, 1, 2])))
        .mount(&h.server)
        .await;

    assert!(h.registry.refresh().await.unwrap());

    assert_eq!(h.ids(), vec![3, 1, 2]);
    assert!(h.registry.last_error().is_none());
}

#[tokio::test]
async fn failed_refresh_keeps_stale_cache() {
    let h = Harness::new().await;
    h.sign_in();
    seed(&h, &[1, 2]).await;
    Mock::given(method("GET"))
        .and(path(LIST))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&h.server)
        .await;

    let err = h.registry.refresh().await.unwrap_err();

    assert!(err.is_transient());
    assert_eq!(h.ids(), vec![1, 2]);
    assert_eq!(h.registry.last_error(), Some(err));
}

#[tokio::test]
async fn create_appends_server_entry() {
    let h = Harness::new().await;
    h.sign_in();
    seed(&h, &[1]).await;
    Mock::given(method("POST"))
        .and(path(LIST))
        .and(body_json(json!({
            "subdomain": "foo",
            "target_domain": "1.2.3.4",
            "record_type": "A",
            "ttl": 3600
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(subdomain_json(57, "foo")))
        .expect(1)
        .mount(&h.server)
        .await;

    let draft = SubdomainDraft::new("foo", "1.2.3.4").with_record_type("A");
    let created = h.registry.create(&draft).await.unwrap();

    assert_eq!(created.id, 57);
    assert_eq!(h.ids(), vec![1, 57]);
    assert!(!h.registry.is_submitting());
}

#[tokio::test]
async fn create_validation_error_leaves_cache_unchanged() {
    let h = Harness::new().await;
    h.sign_in();
    seed(&h, &[1]).await;
    Mock::given(method("POST"))
        .and(path(LIST))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "detail": [{
                "loc": ["body", "record_type"],
                "msg": "unexpected value; permitted: 'A', 'CNAME', 'MX', 'TXT'",
                "type": "value_error.const"
            }]
        })))
        .mount(&h.server)
        .await;

    let draft = SubdomainDraft::new("foo", "1.2.3.4").with_record_type("BOGUS");
    let err = h.registry.create(&draft).await.unwrap_err();

    let fields = err.field_errors();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].loc, vec!["body", "record_type"]);
    assert_eq!(fields[0].field(), Some("record_type"));
    assert_eq!(h.ids(), vec![1]);
}

#[tokio::test]
async fn create_limit_error_carries_server_message() {
    let h = Harness::new().await;
    h.sign_in();
    Mock::given(method("POST"))
        .and(path(LIST))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "detail": "Maximum limit of 5 domains reached"
        })))
        .mount(&h.server)
        .await;

    let err = h
        .registry
        .create(&SubdomainDraft::new("sixth", "example.org"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RegistryError::NetworkOrServer {
            status: Some(400),
            message: "Maximum limit of 5 domains reached".into()
        }
    );
}

#[tokio::test]
async fn create_without_credential_is_not_sent() {
    let h = Harness::new().await;
    Mock::given(path(LIST))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&h.server)
        .await;

    let err = h
        .registry
        .create(&SubdomainDraft::new("foo", "example.org"))
        .await
        .unwrap_err();

    assert_eq!(err, RegistryError::NotAuthenticated);
}

#[tokio::test]
async fn is_submitting_while_create_in_flight() {
    let h = Harness::new().await;
    h.sign_in();
    Mock::given(method("POST"))
        .and(path(LIST))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(subdomain_json(9, "slow"))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&h.server)
        .await;

    let registry = h.registry.clone();
    let create = tokio::spawn(async move {
        registry
            .create(&SubdomainDraft::new("slow", "example.org"))
            .await
    });

    assert!(common::eventually(|| h.registry.is_submitting()).await);
    assert!(h.ids().is_empty());

    create.await.unwrap().unwrap();
    assert!(!h.registry.is_submitting());
    assert_eq!(h.ids(), vec![9]);
}

#[tokio::test]
async fn delete_removes_immediately_and_restores_on_failure() {
    let h = Harness::new().await;
    h.sign_in();
    seed(&h, &[41, 42, 43]).await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/subdomains/42"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"detail": "Failed to delete DNS record"}))
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&h.server)
        .await;

    let pending = h.registry.delete(42);
    assert_eq!(h.ids(), vec![41, 43]);

    let err = pending.await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(h.ids(), vec![41, 42, 43]);
}

#[tokio::test]
async fn delete_accepts_no_content_and_body() {
    let h = Harness::new().await;
    h.sign_in();
    seed(&h, &[1, 2]).await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/subdomains/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&h.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/subdomains/2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Subdomain deleted"})),
        )
        .mount(&h.server)
        .await;

    h.registry.delete(1).await.unwrap();
    h.registry.delete(2).await.unwrap();

    assert!(h.ids().is_empty());
}

#[tokio::test]
async fn delete_unknown_id_still_reaches_server() {
    let h = Harness::new().await;
    h.sign_in();
    seed(&h, &[1]).await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/subdomains/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "detail": "Subdomain not found"
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.registry.delete(99).await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(h.ids(), vec![1]);
}

#[tokio::test]
async fn dropped_delete_is_rolled_back() {
    let h = Harness::new().await;
    h.sign_in();
    seed(&h, &[1, 2, 3]).await;

    let pending = h.registry.delete(2);
    assert_eq!(h.ids(), vec![1, 3]);
    drop(pending);

    assert_eq!(h.ids(), vec![1, 2, 3]);
    assert_eq!(h.hits("DELETE", "/api/v1/subdomains/2").await, 0);
}

#[tokio::test]
async fn stale_refresh_does_not_resurrect_deleted_entry() {
    let h = Harness::new().await;
    h.sign_in();
    seed(&h, &[41, 42]).await;
    Mock::given(method("GET"))
        .and(path(LIST))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(list_json(&[41, 42]))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/subdomains/42"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&h.server)
        .await;

    let registry = h.registry.clone();
    let refresh = tokio::spawn(async move { registry.refresh().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    h.registry.delete(42).await.unwrap();
    refresh.await.unwrap().unwrap();

    assert_eq!(h.ids(), vec![41]);
}

#[tokio::test]
async fn delete_of_uncached_id_wins_over_listing_in_flight() {
    let h = Harness::new().await;
    h.sign_in();
    Mock::given(method("GET"))
        .and(path(LIST))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(list_json(&[41, 42]))
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/subdomains/42"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_millis(300)))
        .mount(&h.server)
        .await;

    let registry = h.registry.clone();
    let refresh = tokio::spawn(async move { registry.refresh().await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    h.registry.delete(42).await.unwrap();
    assert!(refresh.await.unwrap().unwrap());

    assert_eq!(h.ids(), vec![41]);
}

#[tokio::test]
async fn refresh_from_previous_user_is_dropped_after_clear() {
    let h = Harness::new().await;
    h.tokens.set(&Credential::new("user-a")).unwrap();
    Mock::given(method("GET"))
        .and(path(LIST))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(list_json(&[7]))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&h.server)
        .await;

    let registry = h.registry.clone();
    let refresh = tokio::spawn(async move { registry.refresh().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    h.tokens.clear(ClearReason::Logout).unwrap();
    h.registry.clear();
    h.tokens.set(&Credential::new("user-b")).unwrap();

    assert!(!refresh.await.unwrap().unwrap());
    assert!(h.registry.list().is_empty());
}

#[tokio::test]
async fn cache_converges_to_server_after_refresh() {
    let h = Harness::new().await;
    h.sign_in();
    seed(&h, &[1, 2]).await;
    Mock::given(method("POST"))
        .and(path(LIST))
        .respond_with(ResponseTemplate::new(201).set_body_json(subdomain_json(3, "three")))
        .mount(&h.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/subdomains/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&h.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/subdomains/2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_json(&[2, 3])))
        .mount(&h.server)
        .await;

    let draft = SubdomainDraft::new("three", "example.org");
    let (created, deleted, failed) = tokio::join!(
        h.registry.create(&draft),
        h.registry.delete(1),
        h.registry.delete(2),
    );
    created.unwrap();
    deleted.unwrap();
    assert!(failed.is_err());

    h.registry.refresh().await.unwrap();
    assert_eq!(h.ids(), vec![2, 3]);
}

#[tokio::test]
async fn get_and_update_replace_entry_in_place() {
    let h = Harness::new().await;
    h.sign_in();
    seed(&h, &[1, 2, 3]).await;

    let mut fetched = subdomain_json(2, "site2");
    fetched["ttl"] = json!(120);
    Mock::given(method("GET"))
        .and(path("/api/v1/subdomains/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fetched))
        .mount(&h.server)
        .await;

    let mut updated = subdomain_json(2, "site2");
    updated["target_domain"] = json!("new.example.org");
    Mock::given(method("PUT"))
        .and(path("/api/v1/subdomains/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(updated))
        .mount(&h.server)
        .await;

    assert_eq!(h.registry.get(2).await.unwrap().ttl, 120);
    assert_eq!(h.registry.list()[1].ttl, 120);

    let draft = SubdomainDraft::new("site2", "new.example.org");
    h.registry.update(2, &draft).await.unwrap();

    let list = h.registry.list();
    assert_eq!(h.ids(), vec![1, 2, 3]);
    assert_eq!(list[1].target_domain, "new.example.org");
}

#[tokio::test]
async fn get_missing_entry_drops_it() {
    let h = Harness::new().await;
    h.sign_in();
    seed(&h, &[1, 2]).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/subdomains/2"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "detail": "Subdomain not found"
        })))
        .mount(&h.server)
        .await;

    let err = h.registry.get(2).await.unwrap_err();

    assert_eq!(err.to_string(), "Request failed (404): Subdomain not found");
    assert_eq!(h.ids(), vec![1]);
}

#[tokio::test]
async fn unauthorized_clears_credential_and_cache() {
    let h = Harness::new().await;
    h.sign_in();
    seed(&h, &[1]).await;
    Mock::given(method("GET"))
        .and(path(LIST))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;

    let err = h.registry.refresh().await.unwrap_err();

    assert_eq!(err, RegistryError::SessionExpired);
    assert!(!h.tokens.has_credential());
    assert!(h.registry.list().is_empty());
}
