//! Organization resolution and lifecycle environment chain provisioning.
//!
//! The flow is strictly sequential: look up or create the organization, find
//! the base environment, refuse to continue if any requested environment
//! already exists, then create the chain one link at a time. Nothing is rolled
//! back if a creation fails halfway through.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::{ClientError, KatelloApi};
use crate::config::ProvisionPlan;
use crate::lookup::{contains_name, id_for_name, id_name_map};
use crate::types::{Environment, NewEnvironment, NewOrganization, RecordId};

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("organization {organization_id} has no {name:?} environment to chain from")]
    MissingBaseEnvironment {
        organization_id: RecordId,
        name: String,
    },
}

/// Progress notifications emitted while provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionEvent {
    CreatingOrganization { name: String },
    OrganizationExists { name: String, id: RecordId },
    CreatingEnvironment { name: String },
    DuplicateEnvironments { names: Vec<String> },
}

impl fmt::Display for ProvisionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionEvent::CreatingOrganization { name } => {
                write!(f, "Creating organization: \t{name}")
            }
            ProvisionEvent::OrganizationExists { name, .. } => {
                write!(f, "Organization \"{name}\" exists")
            }
            ProvisionEvent::CreatingEnvironment { name } => {
                write!(f, "Creating environment: \t{name}")
            }
            ProvisionEvent::DuplicateEnvironments { .. } => {
                f.write_str("ERROR: One of the Environments is not unique to organization")
            }
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProvisionEvent);
}

/// Prints each event as one line on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn report(&self, event: &ProvisionEvent) {
        println!("{event}");
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn report(&self, _event: &ProvisionEvent) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationResolution {
    pub id: RecordId,
    pub name: String,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProvisionOutcome {
    /// Every requested environment was created, in chain order. Each entry is
    /// the record as the server returned it; `organization_id` and `prior_id`
    /// stay `None` when the response did not carry them.
    Done { created: Vec<Environment> },
    /// At least one requested name already existed; nothing was created.
    AbortedDuplicate { duplicates: Vec<String> },
}

impl ProvisionOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, ProvisionOutcome::Done { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub organization: OrganizationResolution,
    pub outcome: ProvisionOutcome,
}

/// Finds the configured organization by name, creating it when absent.
pub async fn resolve_organization<A>(
    api: &A,
    plan: &ProvisionPlan,
    reporter: &dyn ProgressReporter,
) -> Result<OrganizationResolution, ProvisionError>
where
    A: KatelloApi + ?Sized,
{
    let name = plan.organization();
    let organizations = id_name_map(api.list_organizations().await?);

    if let Some(id) = id_for_name(&organizations, name) {
        info!(organization = %name, organization_id = id, "organization exists");
        reporter.report(&ProvisionEvent::OrganizationExists {
            name: name.to_string(),
            id,
        });
        return Ok(OrganizationResolution {
            id,
            name: name.to_string(),
            created: false,
        });
    }

    reporter.report(&ProvisionEvent::CreatingOrganization {
        name: name.to_string(),
    });
    let created = api
        .create_organization(&NewOrganization {
            name: name.to_string(),
            description: plan.organization_description().map(str::to_string),
        })
        .await?;
    info!(organization = %name, organization_id = created.id, "organization created");

    Ok(OrganizationResolution {
        id: created.id,
        name: name.to_string(),
        created: true,
    })
}

/// Creates the configured environments as a chain hanging off the base
/// environment of `organization_id`.
pub async fn provision_environments<A>(
    api: &A,
    organization_id: RecordId,
    plan: &ProvisionPlan,
    reporter: &dyn ProgressReporter,
) -> Result<ProvisionOutcome, ProvisionError>
where
    A: KatelloApi + ?Sized,
{
    let existing = id_name_map(api.list_environments(organization_id).await?);
    debug!(organization_id, existing = existing.len(), "loaded environments");

    let base = plan.base_environment();
    let base_id =
        id_for_name(&existing, base).ok_or_else(|| ProvisionError::MissingBaseEnvironment {
            organization_id,
            name: base.to_string(),
        })?;

    let duplicates: Vec<String> = plan
        .environments()
        .iter()
        .filter(|name| contains_name(&existing, name))
        .cloned()
        .collect();
    if !duplicates.is_empty() {
        warn!(organization_id, ?duplicates, "environments already exist, nothing created");
        reporter.report(&ProvisionEvent::DuplicateEnvironments {
            names: duplicates.clone(),
        });
        return Ok(ProvisionOutcome::AbortedDuplicate { duplicates });
    }

    let mut prior_id = base_id;
    let mut created = Vec::with_capacity(plan.environments().len());
    for name in plan.environments() {
        reporter.report(&ProvisionEvent::CreatingEnvironment { name: name.clone() });
        let environment = api
            .create_environment(&NewEnvironment {
                name: name.clone(),
                organization_id,
                prior_id: Some(prior_id),
            })
            .await?;
        info!(
            environment = %name,
            environment_id = environment.id,
            prior_id,
            "environment created"
        );
        prior_id = environment.id;
        created.push(environment);
    }

    Ok(ProvisionOutcome::Done { created })
}

/// Runs the whole flow: organization first, then the environment chain.
pub async fn run<A>(
    api: &A,
    plan: &ProvisionPlan,
    reporter: &dyn ProgressReporter,
) -> Result<ProvisionReport, ProvisionError>
where
    A: KatelloApi + ?Sized,
{
    let organization = resolve_organization(api, plan, reporter).await?;
    let outcome = provision_environments(api, organization.id, plan, reporter).await?;
    Ok(ProvisionReport {
        organization,
        outcome,
    })
}
