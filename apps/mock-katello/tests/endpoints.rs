use mock_katello::{base_url, spawn, MockKatello};
use reqwest::StatusCode;
use serde_json::{json, Value};

// Exercises the mock directly so flow tests can trust its validation.
// Skips if binding to localhost is not permitted in the current environment.
async fn start(mock: &MockKatello) -> Option<(String, tokio::task::JoinHandle<()>)> {
    match spawn(mock.clone()).await {
        Ok((addr, handle)) => Some((base_url(addr), handle)),
        Err(err) => {
            eprintln!("skipping mock-katello endpoint test: {err}");
            None
        }
    }
}

#[tokio::test]
async fn rejects_missing_or_wrong_credentials() {
    let mock = MockKatello::new("admin", "secret");
    let Some((base, server)) = start(&mock).await else {
        return;
    };
    let client = reqwest::Client::new();

    let anonymous = client.get(format!("{base}organizations")).send().await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let wrong = client
        .get(format!("{base}organizations"))
        .basic_auth("admin", Some("nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    assert!(mock.requests().iter().all(|req| !req.authorized));
    server.abort();
}

#[tokio::test]
async fn new_organization_gets_library() {
    let mock = MockKatello::new("admin", "secret");
    let Some((base, server)) = start(&mock).await else {
        return;
    };
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("{base}organizations"))
        .basic_auth("admin", Some("secret"))
        .json(&json!({"name": "Acme"}))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap()
        .json()
        .await
        .unwrap();
    let org_id = created["id"].as_i64().unwrap();

    let envs: Value = client
        .get(format!("{base}organizations/{org_id}/environments"))
        .basic_auth("admin", Some("secret"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(envs["results"][0]["name"], "Library");
    assert_eq!(envs["results"][0]["prior_id"], Value::Null);

    let again = client
        .post(format!("{base}organizations"))
        .basic_auth("admin", Some("secret"))
        .json(&json!({"name": "Acme"}))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::UNPROCESSABLE_ENTITY);
    server.abort();
}

#[tokio::test]
async fn environment_creation_validates_prior() {
    let mock = MockKatello::new("admin", "secret");
    let org_id = mock.seed_organization("Acme");
    let Some((base, server)) = start(&mock).await else {
        return;
    };
    let client = reqwest::Client::new();
    let url = format!("{base}organizations/{org_id}/environments");

    for body in [
        json!({"name": "Dev", "organization_id": org_id, "prior_id": null}),
        json!({"name": "Dev", "organization_id": org_id, "prior_id": 9999}),
        json!({"name": "", "organization_id": org_id, "prior_id": 2}),
    ] {
        let response = client
            .post(&url)
            .basic_auth("admin", Some("secret"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    }

    let unknown_org = client
        .get(format!("{base}organizations/4242/environments"))
        .basic_auth("admin", Some("secret"))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown_org.status(), StatusCode::NOT_FOUND);

    assert_eq!(mock.environments(org_id).len(), 1);
    server.abort();
}
