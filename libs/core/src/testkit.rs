//! In-memory doubles for exercising the provisioning flow without a server.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::client::{environments_path, ClientError, KatelloApi};
use crate::provision::{ProgressReporter, ProvisionEvent};
use crate::types::{Environment, NewEnvironment, NewOrganization, Organization, RecordId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    ListOrganizations,
    CreateOrganization(NewOrganization),
    ListEnvironments(RecordId),
    CreateEnvironment(NewEnvironment),
}

#[derive(Default)]
struct State {
    next_id: RecordId,
    organizations: Vec<Organization>,
    environments: Vec<Environment>,
    failing: HashSet<String>,
    without_links: bool,
    calls: Vec<ApiCall>,
}

impl State {
    fn allocate(&mut self) -> RecordId {
        self.next_id += 1;
        self.next_id
    }

    fn bump(&mut self, id: RecordId) {
        self.next_id = self.next_id.max(id);
    }
}

/// Fake remote that behaves like the real API for the four calls the flow makes.
///
/// New organizations receive a `Library` environment, as the real system does.
#[derive(Default)]
pub struct InMemoryKatello {
    state: Mutex<State>,
}

impl InMemoryKatello {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_organization(self, id: RecordId, name: &str) -> Self {
        {
            let mut state = self.lock();
            state.bump(id);
            state.organizations.push(Organization {
                id,
                name: name.to_string(),
            });
        }
        self
    }

    pub fn with_environment(
        self,
        organization_id: RecordId,
        id: RecordId,
        name: &str,
        prior_id: Option<RecordId>,
    ) -> Self {
        {
            let mut state = self.lock();
            state.bump(id);
            state.environments.push(Environment {
                id,
                name: name.to_string(),
                organization_id: Some(organization_id),
                prior_id,
            });
        }
        self
    }

    /// Makes creation of the environment called `name` fail with a 422.
    pub fn fail_environment(self, name: &str) -> Self {
        self.lock().failing.insert(name.to_string());
        self
    }

    /// Leaves `organization_id` and `prior_id` out of created environments,
    /// like servers that report the prior as a nested object instead.
    pub fn without_links_in_responses(self) -> Self {
        self.lock().without_links = true;
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    pub fn environment_creations(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, ApiCall::CreateEnvironment(_)))
            .count()
    }

    pub fn environments_of(&self, organization_id: RecordId) -> Vec<Environment> {
        self.lock()
            .environments
            .iter()
            .filter(|env| env.organization_id == Some(organization_id))
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl KatelloApi for InMemoryKatello {
    async fn list_organizations(&self) -> Result<Vec<Organization>, ClientError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::ListOrganizations);
        Ok(state.organizations.clone())
    }

    async fn create_organization(
        &self,
        org: &NewOrganization,
    ) -> Result<Organization, ClientError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::CreateOrganization(org.clone()));
        let created = Organization {
            id: state.allocate(),
            name: org.name.clone(),
        };
        let library_id = state.allocate();
        state.organizations.push(created.clone());
        state.environments.push(Environment {
            id: library_id,
            name: "Library".into(),
            organization_id: Some(created.id),
            prior_id: None,
        });
        Ok(created)
    }

    async fn list_environments(
        &self,
        organization_id: RecordId,
    ) -> Result<Vec<Environment>, ClientError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::ListEnvironments(organization_id));
        Ok(state
            .environments
            .iter()
            .filter(|env| env.organization_id == Some(organization_id))
            .cloned()
            .collect())
    }

    async fn create_environment(&self, env: &NewEnvironment) -> Result<Environment, ClientError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::CreateEnvironment(env.clone()));
        if state.failing.contains(&env.name) {
            return Err(ClientError::Remote {
                endpoint: format!("POST {}", environments_path(env.organization_id)),
                status: StatusCode::UNPROCESSABLE_ENTITY,
                body: format!("{{\"error\":\"cannot create {}\"}}", env.name),
            });
        }
        let created = Environment {
            id: state.allocate(),
            name: env.name.clone(),
            organization_id: Some(env.organization_id),
            prior_id: env.prior_id,
        };
        state.environments.push(created.clone());
        if state.without_links {
            return Ok(Environment {
                organization_id: None,
                prior_id: None,
                ..created
            });
        }
        Ok(created)
    }
}

/// Collects every progress event for later assertions.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ProvisionEvent>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<ProvisionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events rendered the way the console shows them.
    pub fn lines(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, event: &ProvisionEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
