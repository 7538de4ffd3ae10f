use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use url::Url;

/// Name of the environment every organization starts with.
pub const DEFAULT_BASE_ENVIRONMENT: &str = "Library";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("environment {0:?} is listed more than once")]
    RepeatedEnvironment(String),
}

/// Connection settings for the remote API, handed to the client at construction.
#[derive(Clone)]
pub struct ServerConfig {
    pub base_url: Url,
    pub username: String,
    pub password: String,
    pub verify_tls: bool,
    pub timeout: Option<Duration>,
}

impl ServerConfig {
    pub fn new(
        base_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(ConfigError::Empty("username"));
        }
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            username,
            password: password.into(),
            verify_tls: true,
            timeout: None,
        })
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

// Keeps the password out of logs and panics.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("verify_tls", &self.verify_tls)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Parses `raw` and makes sure it ends with `/`, so relative endpoint paths
/// join below it instead of replacing the last segment.
pub fn normalize_base_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty("base url"));
    }
    let mut url = Url::parse(trimmed).map_err(|err| ConfigError::InvalidBaseUrl {
        url: trimmed.to_string(),
        reason: err.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidBaseUrl {
            url: trimmed.to_string(),
            reason: "url cannot be used as a base".into(),
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// What to provision: one organization and an ordered chain of environments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionPlan {
    organization: String,
    organization_description: Option<String>,
    environments: Vec<String>,
    base_environment: String,
}

impl ProvisionPlan {
    pub fn new<I, S>(organization: impl Into<String>, environments: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let organization = organization.into();
        if organization.trim().is_empty() {
            return Err(ConfigError::Empty("organization name"));
        }

        let environments: Vec<String> = environments.into_iter().map(Into::into).collect();
        let mut seen = HashSet::new();
        for name in &environments {
            if name.trim().is_empty() {
                return Err(ConfigError::Empty("environment name"));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::RepeatedEnvironment(name.clone()));
            }
        }

        Ok(Self {
            organization,
            organization_description: None,
            environments,
            base_environment: DEFAULT_BASE_ENVIRONMENT.to_string(),
        })
    }

    pub fn with_organization_description(mut self, description: Option<String>) -> Self {
        self.organization_description = description.filter(|d| !d.trim().is_empty());
        self
    }

    pub fn with_base_environment(
        mut self,
        base_environment: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let base_environment = base_environment.into();
        if base_environment.trim().is_empty() {
            return Err(ConfigError::Empty("base environment"));
        }
        self.base_environment = base_environment;
        Ok(self)
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn organization_description(&self) -> Option<&str> {
        self.organization_description.as_deref()
    }

    /// Environment names in chain order. May be empty, in which case only the
    /// organization is ensured.
    pub fn environments(&self) -> &[String] {
        &self.environments
    }

    pub fn base_environment(&self) -> &str {
        &self.base_environment
    }
}
