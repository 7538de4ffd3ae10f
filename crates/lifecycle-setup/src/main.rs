use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lcs_core::{
    run, ConsoleReporter, KatelloClient, ProgressReporter, ProvisionPlan, ServerConfig,
    SilentReporter, DEFAULT_BASE_ENVIRONMENT,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "lifecycle-setup",
    version,
    about = "Ensure an organization exists and provision a chain of lifecycle environments"
)]
struct Cli {
    /// Base URL of the API, e.g. https://satellite.example.com/katello/api/v2/
    #[arg(long, env = "KATELLO_URL", value_name = "URL")]
    url: String,
    #[arg(long, env = "KATELLO_USERNAME")]
    username: String,
    #[arg(long, env = "KATELLO_PASSWORD", hide_env_values = true)]
    password: String,
    /// Skip TLS certificate verification.
    #[arg(long, env = "KATELLO_INSECURE")]
    insecure: bool,
    /// Per-request timeout; unset means the transport default.
    #[arg(long, env = "KATELLO_TIMEOUT_SECS", value_name = "SECS")]
    timeout_secs: Option<u64>,
    /// Organization to use, created when missing.
    #[arg(long, env = "LCS_ORGANIZATION", value_name = "NAME")]
    organization: String,
    /// Description sent when the organization has to be created.
    #[arg(long, env = "LCS_ORGANIZATION_DESCRIPTION", value_name = "TEXT")]
    organization_description: Option<String>,
    /// Environment to create; repeat or comma-separate. Order is the chain order.
    /// Without any, only the organization is ensured.
    #[arg(
        long = "environment",
        env = "LCS_ENVIRONMENTS",
        value_name = "NAME",
        value_delimiter = ','
    )]
    environments: Vec<String>,
    /// Existing environment the chain hangs from.
    #[arg(long, env = "LCS_BASE_ENVIRONMENT", value_name = "NAME", default_value = DEFAULT_BASE_ENVIRONMENT)]
    base_environment: String,
    /// Print the provisioning report as JSON instead of progress lines.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn server_config(&self) -> Result<ServerConfig> {
        let cfg = ServerConfig::new(&self.url, self.username.clone(), self.password.clone())
            .context("invalid server configuration")?
            .with_verify_tls(!self.insecure)
            .with_timeout(self.timeout_secs.map(Duration::from_secs));
        Ok(cfg)
    }

    fn plan(&self) -> Result<ProvisionPlan> {
        let environments = self
            .environments
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty());
        let plan = ProvisionPlan::new(self.organization.clone(), environments)
            .context("invalid provisioning plan")?
            .with_organization_description(self.organization_description.clone())
            .with_base_environment(self.base_environment.clone())
            .context("invalid provisioning plan")?;
        Ok(plan)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    lcs_telemetry::install("lifecycle-setup")?;

    let plan = cli.plan()?;
    let client = KatelloClient::new(cli.server_config()?).context("failed to build http client")?;
    info!(
        url = %client.base_url(),
        organization = %plan.organization(),
        environments = ?plan.environments(),
        "starting lifecycle setup"
    );

    let reporter: &dyn ProgressReporter = if cli.json {
        &SilentReporter
    } else {
        &ConsoleReporter
    };

    let report = run(&client, &plan, reporter)
        .await
        .with_context(|| format!("provisioning {:?} failed", plan.organization()))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec![
            "lifecycle-setup",
            "--url",
            "https://sat.example.com/katello/api/v2",
            "--username",
            "admin",
            "--password",
            "pw",
            "--organization",
            "Acme",
        ];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn environments_accept_repeats_and_commas() {
        let cli = parse(&["--environment", "Dev,QA", "--environment", "Prod"]);
        let plan = cli.plan().unwrap();
        assert_eq!(plan.environments(), ["Dev", "QA", "Prod"]);
        assert_eq!(plan.base_environment(), "Library");
    }

    #[test]
    fn insecure_and_timeout_reach_server_config() {
        let cli = parse(&["--environment", "Dev", "--insecure", "--timeout-secs", "30"]);
        let cfg = cli.server_config().unwrap();
        assert!(!cfg.verify_tls);
        assert_eq!(cfg.timeout, Some(Duration::from_secs(30)));
        assert_eq!(cfg.base_url.as_str(), "https://sat.example.com/katello/api/v2/");
    }

    #[test]
    fn environments_are_optional() {
        let cli = parse(&[]);
        assert!(cli.plan().unwrap().environments().is_empty());
    }

    #[test]
    fn repeated_environment_is_rejected() {
        let cli = parse(&["--environment", "Dev,Dev"]);
        let err = cli.plan().unwrap_err();
        assert!(format!("{err:#}").contains("listed more than once"), "{err:#}");
    }
}
