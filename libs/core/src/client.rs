use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::ServerConfig;
use crate::types::{
    Environment, ListResponse, NewEnvironment, NewOrganization, Organization, RecordId,
};

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client configuration error: {0}")]
    Config(String),
    #[error("transport error calling {endpoint}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned {status}: {body}")]
    Remote {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("failed to encode request body for {endpoint}")]
    Encode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode response from {endpoint}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Remote { status, .. } => Some(*status),
            ClientError::Transport { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// Typed operations the provisioning flow needs from the remote system.
#[async_trait]
pub trait KatelloApi: Send + Sync {
    async fn list_organizations(&self) -> Result<Vec<Organization>, ClientError>;
    async fn create_organization(&self, org: &NewOrganization)
    -> Result<Organization, ClientError>;
    async fn list_environments(
        &self,
        organization_id: RecordId,
    ) -> Result<Vec<Environment>, ClientError>;
    async fn create_environment(&self, env: &NewEnvironment) -> Result<Environment, ClientError>;
}

/// Authenticated JSON client for the Katello v2 API.
#[derive(Clone)]
pub struct KatelloClient {
    http: Client,
    base_url: Url,
    username: String,
    password: String,
}

impl KatelloClient {
    pub fn new(config: ServerConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder()
            .user_agent(concat!("lifecycle-setup/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .danger_accept_invalid_certs(!config.verify_tls);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|err| ClientError::Config(err.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url,
            username: config.username,
            password: config.password,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, location: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(location.trim_start_matches('/'))
            .map_err(|err| ClientError::Config(format!("bad location {location:?}: {err}")))
    }

    /// GET `location` (relative to the base url) and return the parsed body.
    pub async fn fetch(&self, location: &str) -> Result<Value, ClientError> {
        self.call(Method::GET, location, None).await
    }

    /// POST `body` to `location` (relative to the base url) and return the parsed body.
    pub async fn submit(&self, location: &str, body: &Value) -> Result<Value, ClientError> {
        self.call(Method::POST, location, Some(body)).await
    }

    async fn call(
        &self,
        method: Method,
        location: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let url = self.endpoint(location)?;
        let endpoint = format!("{method} {location}");
        debug!(%method, url = %url, "calling remote api");

        let mut request = self
            .http
            .request(method.clone(), url)
            .basic_auth(&self.username, Some(&self.password));
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let response = request.send().await.map_err(|source| {
            counter!(
                "lcs_http_errors_total",
                "kind" => "transport",
                "method" => method.to_string()
            )
            .increment(1);
            ClientError::Transport {
                endpoint: endpoint.clone(),
                source,
            }
        })?;

        let status = response.status();
        counter!(
            "lcs_http_requests_total",
            "method" => method.to_string(),
            "status" => status.as_str().to_string()
        )
        .increment(1);
        histogram!("lcs_http_roundtrip_seconds", "method" => method.to_string())
            .record(started.elapsed().as_secs_f64());

        let text = response
            .text()
            .await
            .map_err(|source| ClientError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;

        if !status.is_success() {
            counter!(
                "lcs_http_errors_total",
                "kind" => "remote",
                "status" => status.as_str().to_string()
            )
            .increment(1);
            return Err(ClientError::Remote {
                endpoint,
                status,
                body: truncate_body(text),
            });
        }

        serde_json::from_str(&text).map_err(|source| {
            counter!("lcs_http_errors_total", "kind" => "decode").increment(1);
            ClientError::Decode { endpoint, source }
        })
    }

    async fn fetch_as<T: DeserializeOwned>(&self, location: &str) -> Result<T, ClientError> {
        let value = self.fetch(location).await?;
        decode(&format!("{} {location}", Method::GET), value)
    }

    async fn submit_as<T: DeserializeOwned>(
        &self,
        location: &str,
        body: &(impl serde::Serialize + Sync),
    ) -> Result<T, ClientError> {
        let endpoint = format!("{} {location}", Method::POST);
        let body = serde_json::to_value(body).map_err(|source| ClientError::Encode {
            endpoint: endpoint.clone(),
            source,
        })?;
        let value = self.submit(location, &body).await?;
        decode(&endpoint, value)
    }
}

#[async_trait]
impl KatelloApi for KatelloClient {
    async fn list_organizations(&self) -> Result<Vec<Organization>, ClientError> {
        let list: ListResponse<Organization> = self.fetch_as(ORGANIZATIONS).await?;
        Ok(list.results)
    }

    async fn create_organization(
        &self,
        org: &NewOrganization,
    ) -> Result<Organization, ClientError> {
        self.submit_as(ORGANIZATIONS, org).await
    }

    async fn list_environments(
        &self,
        organization_id: RecordId,
    ) -> Result<Vec<Environment>, ClientError> {
        let list: ListResponse<Environment> = self
            .fetch_as(&environments_path(organization_id))
            .await?;
        Ok(list.results)
    }

    async fn create_environment(&self, env: &NewEnvironment) -> Result<Environment, ClientError> {
        self.submit_as(&environments_path(env.organization_id), env)
            .await
    }
}

const ORGANIZATIONS: &str = "organizations";

pub fn environments_path(organization_id: RecordId) -> String {
    format!("organizations/{organization_id}/environments")
}

fn decode<T: DeserializeOwned>(endpoint: &str, value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|source| ClientError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
