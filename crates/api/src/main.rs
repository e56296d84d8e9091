use anyhow::Result;
use helpdesk_api::{serve, ServiceConfig};
use helpdesk_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("helpdesk_api");

    let config = ServiceConfig::from_env()?;
    serve(config).await
}
