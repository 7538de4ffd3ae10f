//! Core of the lifecycle setup tooling.
//!
//! Resolves (or creates) an organization on a Katello-style REST API and then
//! provisions an ordered chain of lifecycle environments beneath it, anchored
//! at the organization's base environment (`Library` by default).
pub mod client;
pub mod config;
pub mod lookup;
pub mod provision;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
pub mod types;

pub use client::{environments_path, ClientError, KatelloApi, KatelloClient};
pub use config::{
    normalize_base_url, ConfigError, ProvisionPlan, ServerConfig, DEFAULT_BASE_ENVIRONMENT,
};
pub use lookup::{contains_name, id_for_name, id_name_map};
pub use provision::{
    provision_environments, resolve_organization, run, ConsoleReporter, OrganizationResolution,
    ProgressReporter, ProvisionError, ProvisionEvent, ProvisionOutcome, ProvisionReport,
    SilentReporter,
};
pub use types::*;
