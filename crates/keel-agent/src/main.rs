//! Keel container instance agent.
//!
//! Registers this node with the control plane, discovers the endpoint to poll
//! for work and stays up until interrupted.

use std::sync::Arc;

use keel_core::AgentConfig;
use keel_ecs::{ApiEcsClient, EcsClient, EnvCredentialProvider, UnsignedRequests};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,keel=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting keel agent");

    let config = AgentConfig::from_env();
    config.validate()?;

    let api_url = config.api_url();
    tracing::info!(
        endpoint = %api_url,
        region = %config.region,
        cluster = ?config.cluster,
        "Loaded configuration"
    );

    // Request signing is delegated to a proxy or local endpoint.
    let client = ApiEcsClient::from_config(
        &config,
        Arc::new(EnvCredentialProvider::new()),
        Arc::new(UnsignedRequests),
    );

    let registration = match client
        .register_container_instance(config.cluster.as_ref())
        .await
    {
        Ok(registration) => registration,
        Err(e) => {
            tracing::error!(
                step = %e.step(),
                retriable = e.is_retriable(),
                error = %e,
                "Registration failed"
            );
            return Err(e.into());
        }
    };

    let config = config.with_cluster(registration.cluster.clone());
    let cluster = registration.cluster;
    let container_instance = registration.container_instance_arn;

    let endpoint = client
        .discover_poll_endpoint(&cluster, &container_instance)
        .await?;
    tracing::info!(
        cluster = %cluster,
        container_instance = %container_instance,
        endpoint = %endpoint,
        "Agent ready"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    if config.deregister_on_shutdown {
        if let Err(e) = client
            .deregister_container_instance(&cluster, &container_instance)
            .await
        {
            tracing::warn!(error = %e, "Failed to deregister container instance");
        }
    }

    tracing::info!("Agent stopped");
    Ok(())
}
