//! The control plane client used by the rest of the agent.
//!
//! [`EcsClient`] is the capability set the agent depends on. [`ApiEcsClient`]
//! implements it on top of an [`EcsChannel`], delegating registration to the
//! [`ClusterRegistrar`] and state changes to the [`StateChangeSubmitter`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use keel_core::{AgentConfig, ClusterRef, ContainerInstanceArn};
use keel_metadata::{HttpMetadataClient, MetadataProvider};

use crate::channel::{EcsChannel, HttpEcsChannel, Operation};
use crate::credentials::{CredentialProvider, RequestSigner};
use crate::error::{RegistrationError, Result, RpcError, StateChangeError};
use crate::model::{DeregisterContainerInstanceRequest, DiscoverPollEndpointRequest};
use crate::registrar::{ClusterRegistrar, Registration};
use crate::resources::{HostProbe, SystemProbe};
use crate::submitter::{ContainerStateChange, StateChangeSubmitter, Submission, TaskStateChange};

/// Control plane operations available to the agent.
///
/// Registration runs once at startup; every other call takes the cluster it
/// resolved to.
#[async_trait]
pub trait EcsClient: Send + Sync {
    /// The provider used to sign control plane requests.
    fn credential_provider(&self) -> Arc<dyn CredentialProvider>;

    /// Register this node, bootstrapping the default cluster when `cluster`
    /// is `None`.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistrationError`] naming the bootstrap step that failed.
    async fn register_container_instance(
        &self,
        cluster: Option<&ClusterRef>,
    ) -> std::result::Result<Registration, RegistrationError>;

    /// Report a task state change.
    ///
    /// # Errors
    ///
    /// Returns a [`StateChangeError`]; check `is_retriable()` before retrying.
    async fn submit_task_state_change(
        &self,
        cluster: &ClusterRef,
        change: &TaskStateChange,
    ) -> std::result::Result<Submission, StateChangeError>;

    /// Report a container state change.
    ///
    /// # Errors
    ///
    /// Returns a [`StateChangeError`]; check `is_retriable()` before retrying.
    async fn submit_container_state_change(
        &self,
        cluster: &ClusterRef,
        change: &ContainerStateChange,
    ) -> std::result::Result<Submission, StateChangeError>;

    /// Find the endpoint this instance should poll for work.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or no endpoint is returned.
    async fn discover_poll_endpoint(
        &self,
        cluster: &ClusterRef,
        container_instance: &ContainerInstanceArn,
    ) -> Result<String>;

    /// Remove this instance from its cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn deregister_container_instance(
        &self,
        cluster: &ClusterRef,
        container_instance: &ContainerInstanceArn,
    ) -> Result<()>;
}

/// [`EcsClient`] backed by an [`EcsChannel`].
pub struct ApiEcsClient {
    channel: Arc<dyn EcsChannel>,
    credentials: Arc<dyn CredentialProvider>,
    registrar: ClusterRegistrar,
    submitter: StateChangeSubmitter,
}

impl ApiEcsClient {
    /// Build a client talking HTTP to the endpoint in `config`.
    ///
    /// Identity documents come from the configured metadata endpoint and
    /// host capacity from [`SystemProbe`].
    ///
    /// # Panics
    ///
    /// Panics if an HTTP client cannot be created.
    #[must_use]
    pub fn from_config(
        config: &AgentConfig,
        credentials: Arc<dyn CredentialProvider>,
        signer: Arc<dyn RequestSigner>,
    ) -> Self {
        let channel = HttpEcsChannel::new(
            config.api_url(),
            config.region.clone(),
            config.request_timeout(),
            config.accept_invalid_certs,
            Arc::clone(&credentials),
            signer,
        );

        Self::with_parts(
            Arc::new(channel),
            credentials,
            Arc::new(HttpMetadataClient::new(config.metadata_endpoint.clone())),
            Arc::new(SystemProbe::new()),
            config.reserved_ports.clone(),
        )
    }

    /// Build a client from its collaborators.
    #[must_use]
    pub fn with_parts(
        channel: Arc<dyn EcsChannel>,
        credentials: Arc<dyn CredentialProvider>,
        metadata: Arc<dyn MetadataProvider>,
        probe: Arc<dyn HostProbe>,
        reserved_ports: Vec<u16>,
    ) -> Self {
        Self {
            registrar: ClusterRegistrar::new(Arc::clone(&channel), metadata, probe, reserved_ports),
            submitter: StateChangeSubmitter::new(Arc::clone(&channel)),
            channel,
            credentials,
        }
    }

    /// Create a cluster, returning the reference the service assigned.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_cluster(&self, name: &ClusterRef) -> Result<ClusterRef> {
        self.registrar.create_cluster(name).await
    }

    /// The registrar used for the bootstrap.
    #[must_use]
    pub const fn registrar(&self) -> &ClusterRegistrar {
        &self.registrar
    }
}

impl fmt::Debug for ApiEcsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiEcsClient")
            .field("registrar", &self.registrar)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EcsClient for ApiEcsClient {
    fn credential_provider(&self) -> Arc<dyn CredentialProvider> {
        Arc::clone(&self.credentials)
    }

    async fn register_container_instance(
        &self,
        cluster: Option<&ClusterRef>,
    ) -> std::result::Result<Registration, RegistrationError> {
        self.registrar.register(cluster).await
    }

    async fn submit_task_state_change(
        &self,
        cluster: &ClusterRef,
        change: &TaskStateChange,
    ) -> std::result::Result<Submission, StateChangeError> {
        self.submitter.submit_task(cluster, change).await
    }

    async fn submit_container_state_change(
        &self,
        cluster: &ClusterRef,
        change: &ContainerStateChange,
    ) -> std::result::Result<Submission, StateChangeError> {
        self.submitter.submit_container(cluster, change).await
    }

    async fn discover_poll_endpoint(
        &self,
        cluster: &ClusterRef,
        container_instance: &ContainerInstanceArn,
    ) -> Result<String> {
        let response = self
            .channel
            .discover_poll_endpoint(DiscoverPollEndpointRequest {
                cluster: cluster.to_string(),
                container_instance: container_instance.to_string(),
            })
            .await?;

        let endpoint = response
            .endpoint
            .filter(|e| !e.is_empty())
            .ok_or_else(|| RpcError::Decode {
                operation: Operation::DiscoverPollEndpoint,
                message: "response carries no endpoint".to_string(),
            })?;

        tracing::debug!(
            cluster = %cluster,
            container_instance = %container_instance,
            endpoint = %endpoint,
            "Discovered poll endpoint"
        );
        Ok(endpoint)
    }

    async fn deregister_container_instance(
        &self,
        cluster: &ClusterRef,
        container_instance: &ContainerInstanceArn,
    ) -> Result<()> {
        self.channel
            .deregister_container_instance(DeregisterContainerInstanceRequest {
                cluster: cluster.to_string(),
                container_instance: container_instance.to_string(),
            })
            .await?;

        tracing::info!(
            cluster = %cluster,
            container_instance = %container_instance,
            "Deregistered container instance"
        );
        Ok(())
    }
}
