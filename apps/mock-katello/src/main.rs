use anyhow::{Context, Result};
use mock_katello::{MockKatello, API_PREFIX};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    lcs_telemetry::install("mock-katello")?;

    let addr = std::env::var("MOCK_KATELLO_ADDR").unwrap_or_else(|_| "127.0.0.1:9090".into());
    let username = std::env::var("MOCK_KATELLO_USERNAME").unwrap_or_else(|_| "admin".into());
    let password = std::env::var("MOCK_KATELLO_PASSWORD").unwrap_or_else(|_| "redhat".into());

    let mock = MockKatello::new(&username, &password);
    mock.seed_organization("Default Organization");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        "mock-katello listening on http://{}{API_PREFIX}/",
        listener.local_addr()?
    );
    axum::serve(listener, mock.router()).await?;
    Ok(())
}
