//! In-memory stand-in for the handful of Katello endpoints the lifecycle setup
//! flow talks to. Used for local runs and by integration tests.
//!
//! Behaviour mirrors the real service where the flow depends on it: requests
//! need basic auth, new organizations come with a `Library` environment, and
//! environment creation validates the name and the `prior_id`.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const API_PREFIX: &str = "/katello/api/v2";
pub const LIBRARY: &str = "Library";

pub type RecordId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MockOrganization {
    pub id: RecordId,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MockEnvironment {
    pub id: RecordId,
    pub name: String,
    pub organization_id: RecordId,
    pub prior_id: Option<RecordId>,
}

/// One request as seen by the mock, after routing.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub authorized: bool,
}

struct Inner {
    next_id: RecordId,
    organizations: Vec<MockOrganization>,
    environments: Vec<MockEnvironment>,
    requests: Vec<RecordedRequest>,
}

#[derive(Clone)]
pub struct MockKatello {
    username: Arc<str>,
    password: Arc<str>,
    inner: Arc<Mutex<Inner>>,
}

impl MockKatello {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: Arc::from(username),
            password: Arc::from(password),
            inner: Arc::new(Mutex::new(Inner {
                next_id: 0,
                organizations: Vec::new(),
                environments: Vec::new(),
                requests: Vec::new(),
            })),
        }
    }

    /// Router with every endpoint mounted under [`API_PREFIX`].
    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/organizations", get(list_organizations).post(create_organization))
            .route(
                "/organizations/{org_id}/environments",
                get(list_environments).post(create_environment),
            )
            .with_state(self.clone());
        Router::new().nest(API_PREFIX, api)
    }

    /// Adds an organization together with its `Library` environment.
    pub fn seed_organization(&self, name: &str) -> RecordId {
        let mut inner = self.lock();
        insert_organization(&mut inner, name, None).id
    }

    pub fn seed_environment(
        &self,
        organization_id: RecordId,
        name: &str,
        prior_id: Option<RecordId>,
    ) -> RecordId {
        let mut inner = self.lock();
        let id = allocate(&mut inner);
        inner.environments.push(MockEnvironment {
            id,
            name: name.to_string(),
            organization_id,
            prior_id,
        });
        id
    }

    /// Drops an environment by name; returns whether one was removed.
    pub fn remove_environment(&self, organization_id: RecordId, name: &str) -> bool {
        let mut inner = self.lock();
        let before = inner.environments.len();
        inner
            .environments
            .retain(|env| !(env.organization_id == organization_id && env.name == name));
        inner.environments.len() != before
    }

    pub fn organizations(&self) -> Vec<MockOrganization> {
        self.lock().organizations.clone()
    }

    pub fn environments(&self, organization_id: RecordId) -> Vec<MockEnvironment> {
        self.lock()
            .environments
            .iter()
            .filter(|env| env.organization_id == organization_id)
            .cloned()
            .collect()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn posts(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|req| req.method == Method::POST)
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, method: Method, path: String, headers: &HeaderMap, body: Option<Value>) -> bool {
        let authorized = self.authorized(headers);
        let header_str = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        self.lock().requests.push(RecordedRequest {
            method,
            path,
            body,
            accept: header_str(header::ACCEPT),
            content_type: header_str(header::CONTENT_TYPE),
            authorized,
        });
        authorized
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(encoded) = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Basic "))
        else {
            return false;
        };
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let expected = format!("{}:{}", self.username, self.password);
        decoded == expected.as_bytes()
    }
}

/// Binds `127.0.0.1:0` and serves the mock until the returned handle is aborted.
pub async fn spawn(mock: MockKatello) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = mock.router();
    let handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(error = %err, "mock-katello server error");
        }
    });
    Ok((addr, handle))
}

/// Base url a client should be configured with to reach a spawned mock.
pub fn base_url(addr: SocketAddr) -> String {
    format!("http://{addr}{API_PREFIX}/")
}

#[derive(Debug, Clone)]
pub struct MockError {
    status: StatusCode,
    message: String,
}

impl MockError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unable to authenticate user")
    }
}

impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        let body = json!({
            "displayMessage": self.message,
            "errors": [self.message],
        });
        (self.status, Json(body)).into_response()
    }
}

async fn list_organizations(
    State(mock): State<MockKatello>,
    headers: HeaderMap,
) -> Result<Json<Value>, MockError> {
    if !mock.record(Method::GET, "/organizations".into(), &headers, None) {
        return Err(MockError::unauthorized());
    }
    let inner = mock.lock();
    Ok(Json(listing(&inner.organizations)))
}

async fn create_organization(
    State(mock): State<MockKatello>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), MockError> {
    let payload = parse_body(&body);
    if !mock.record(
        Method::POST,
        "/organizations".into(),
        &headers,
        payload.clone().ok(),
    ) {
        return Err(MockError::unauthorized());
    }
    let payload = payload?;
    let name = required_str(&payload, "name")?;
    let description = payload
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut inner = mock.lock();
    if inner.organizations.iter().any(|org| org.name == name) {
        return Err(MockError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Validation failed: Name has already been taken",
        ));
    }
    let org = insert_organization(&mut inner, &name, description);
    tracing::info!(organization = %org.name, id = org.id, "mock organization created");
    Ok((StatusCode::CREATED, Json(json!(org))))
}

async fn list_environments(
    State(mock): State<MockKatello>,
    Path(org_id): Path<RecordId>,
    headers: HeaderMap,
) -> Result<Json<Value>, MockError> {
    let path = format!("/organizations/{org_id}/environments");
    if !mock.record(Method::GET, path, &headers, None) {
        return Err(MockError::unauthorized());
    }
    let inner = mock.lock();
    ensure_organization(&inner, org_id)?;
    let environments: Vec<_> = inner
        .environments
        .iter()
        .filter(|env| env.organization_id == org_id)
        .cloned()
        .collect();
    Ok(Json(listing(&environments)))
}

async fn create_environment(
    State(mock): State<MockKatello>,
    Path(org_id): Path<RecordId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), MockError> {
    let payload = parse_body(&body);
    let path = format!("/organizations/{org_id}/environments");
    if !mock.record(Method::POST, path, &headers, payload.clone().ok()) {
        return Err(MockError::unauthorized());
    }
    let payload = payload?;
    let name = required_str(&payload, "name")?;

    if let Some(body_org) = payload.get("organization_id").and_then(Value::as_i64) {
        if body_org != org_id {
            return Err(MockError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("organization_id {body_org} does not match path organization {org_id}"),
            ));
        }
    }
    let prior_id = payload
        .get("prior_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| {
            MockError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation failed: Prior environment can't be blank",
            )
        })?;

    let mut inner = mock.lock();
    ensure_organization(&inner, org_id)?;
    let in_org = |env: &&MockEnvironment| env.organization_id == org_id;
    if !inner.environments.iter().filter(in_org).any(|env| env.id == prior_id) {
        return Err(MockError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Validation failed: Prior environment {prior_id} not found in organization"),
        ));
    }
    if inner.environments.iter().filter(in_org).any(|env| env.name == name) {
        return Err(MockError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Validation failed: Name has already been taken for this organization",
        ));
    }

    let env = MockEnvironment {
        id: allocate(&mut inner),
        name,
        organization_id: org_id,
        prior_id: Some(prior_id),
    };
    inner.environments.push(env.clone());
    tracing::info!(environment = %env.name, id = env.id, prior_id, "mock environment created");
    Ok((StatusCode::CREATED, Json(json!(env))))
}

fn allocate(inner: &mut Inner) -> RecordId {
    inner.next_id += 1;
    inner.next_id
}

fn insert_organization(
    inner: &mut Inner,
    name: &str,
    description: Option<String>,
) -> MockOrganization {
    let org = MockOrganization {
        id: allocate(inner),
        name: name.to_string(),
        description,
    };
    let library = MockEnvironment {
        id: allocate(inner),
        name: LIBRARY.to_string(),
        organization_id: org.id,
        prior_id: None,
    };
    inner.organizations.push(org.clone());
    inner.environments.push(library);
    org
}

fn ensure_organization(inner: &Inner, org_id: RecordId) -> Result<(), MockError> {
    if inner.organizations.iter().any(|org| org.id == org_id) {
        Ok(())
    } else {
        Err(MockError::new(
            StatusCode::NOT_FOUND,
            format!("Couldn't find organization '{org_id}'"),
        ))
    }
}

fn listing<T: Serialize>(records: &[T]) -> Value {
    json!({
        "total": records.len(),
        "subtotal": records.len(),
        "page": 1,
        "results": records,
    })
}

fn parse_body(body: &Bytes) -> Result<Value, MockError> {
    serde_json::from_slice(body)
        .map_err(|err| MockError::new(StatusCode::BAD_REQUEST, format!("invalid json: {err}")))
}

fn required_str(payload: &Value, field: &str) -> Result<String, MockError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            MockError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Validation failed: {field} can't be blank"),
            )
        })
}
