//! Container instance registration.
//!
//! When the operator names a cluster, registration is a single request.
//! Otherwise the registrar bootstraps [`keel_core::DEFAULT_CLUSTER_NAME`]:
//!
//! ```text
//!   OptimisticRegister("default") ──ok──────────────────────────▶ done
//!           │ err
//!           ▼
//!   DescribeCluster("default") ──err──▶ DescribeCluster error
//!           │
//!           ├── ACTIVE ─────────────────▶ Register(described arn) ──▶ done
//!           ├── other status ───────────▶ ClusterInactive error
//!           └── absent ──▶ CreateCluster("default") ──▶ Register("default") ──▶ done
//! ```
//!
//! The resolved cluster is returned in [`Registration`]; callers thread it
//! into every later request.

use std::fmt;
use std::sync::Arc;

use keel_core::{ClusterRef, ContainerInstanceArn};
use keel_metadata::MetadataProvider;

use crate::channel::{EcsChannel, Operation};
use crate::error::{RegistrationError, Result, RpcError};
use crate::model::{
    CreateClusterRequest, DescribeClustersRequest, DescribeClustersResponse,
    RegisterContainerInstanceRequest, WireResource,
};
use crate::resources::{HostProbe, ResourceSet};

/// Status the control plane reports for a usable cluster.
const ACTIVE_STATUS: &str = "ACTIVE";

/// A named step of the registration bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrapStep {
    /// Registering against the default cluster before checking it exists.
    OptimisticRegister,
    /// Looking up the default cluster.
    DescribeCluster,
    /// Creating the default cluster.
    CreateCluster,
    /// Registering against the resolved cluster.
    Register,
}

impl BootstrapStep {
    /// The step name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OptimisticRegister => "optimistic_register",
            Self::DescribeCluster => "describe_cluster",
            Self::CreateCluster => "create_cluster",
            Self::Register => "register",
        }
    }
}

impl fmt::Display for BootstrapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a describe call says about a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterState {
    /// The cluster exists and is active; registration should target this
    /// reference (its ARN when the service reported one).
    Active(ClusterRef),
    /// The cluster does not exist.
    Absent,
    /// The cluster exists with the given non-active status.
    Inactive(String),
}

impl ClusterState {
    /// Classify a describe response for the cluster `name`.
    ///
    /// A cluster matches when its name or ARN equals `name`. A missing entry
    /// or an empty status means the cluster is absent.
    #[must_use]
    pub fn from_describe(name: &ClusterRef, response: &DescribeClustersResponse) -> Self {
        let Some(cluster) = response.clusters.iter().find(|c| {
            c.cluster_name.as_deref() == Some(name.as_str())
                || c.cluster_arn.as_deref() == Some(name.as_str())
        }) else {
            return Self::Absent;
        };

        match cluster.status.as_deref() {
            None | Some("") => Self::Absent,
            Some(ACTIVE_STATUS) => {
                let target = cluster
                    .cluster_arn
                    .as_deref()
                    .and_then(|arn| ClusterRef::new(arn).ok())
                    .unwrap_or_else(|| name.clone());
                Self::Active(target)
            }
            Some(other) => Self::Inactive(other.to_string()),
        }
    }
}

/// Everything sent in one registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRegistration {
    /// Target cluster.
    pub cluster: ClusterRef,
    /// Identity document bytes, empty if unavailable.
    pub identity_document: Vec<u8>,
    /// Signature over the document, empty if unavailable.
    pub identity_signature: Vec<u8>,
    /// Reported capacities.
    pub resources: ResourceSet,
}

impl InstanceRegistration {
    /// Build the wire request.
    #[must_use]
    pub fn to_request(&self) -> RegisterContainerInstanceRequest {
        RegisterContainerInstanceRequest {
            cluster: self.cluster.to_string(),
            instance_identity_document: String::from_utf8_lossy(&self.identity_document)
                .into_owned(),
            instance_identity_document_signature: String::from_utf8_lossy(
                &self.identity_signature,
            )
            .into_owned(),
            total_resources: self
                .resources
                .as_slice()
                .iter()
                .map(WireResource::from)
                .collect(),
        }
    }
}

/// The outcome of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// The cluster the instance was registered into.
    pub cluster: ClusterRef,
    /// Identifier assigned to this container instance.
    pub container_instance_arn: ContainerInstanceArn,
}

/// Registers this node with the control plane.
pub struct ClusterRegistrar {
    channel: Arc<dyn EcsChannel>,
    metadata: Arc<dyn MetadataProvider>,
    probe: Arc<dyn HostProbe>,
    reserved_ports: Vec<u16>,
}

impl ClusterRegistrar {
    /// Create a new registrar.
    #[must_use]
    pub fn new(
        channel: Arc<dyn EcsChannel>,
        metadata: Arc<dyn MetadataProvider>,
        probe: Arc<dyn HostProbe>,
        reserved_ports: Vec<u16>,
    ) -> Self {
        Self {
            channel,
            metadata,
            probe,
            reserved_ports,
        }
    }

    /// Register the container instance.
    ///
    /// With a configured cluster this is a single attempt. Without one the
    /// default cluster is bootstrapped as described in the module docs.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistrationError`] naming the step that failed.
    pub async fn register(
        &self,
        configured: Option<&ClusterRef>,
    ) -> std::result::Result<Registration, RegistrationError> {
        if let Some(cluster) = configured {
            let arn = self
                .register_once(cluster)
                .await
                .map_err(|source| RegistrationError::Register {
                    cluster: cluster.clone(),
                    source,
                })?;
            return Ok(registered(cluster.clone(), arn));
        }

        self.bootstrap_default().await
    }

    async fn bootstrap_default(&self) -> std::result::Result<Registration, RegistrationError> {
        let default = ClusterRef::default_cluster();

        match self.register_once(&default).await {
            Ok(arn) => return Ok(registered(default, arn)),
            Err(e) => {
                tracing::warn!(
                    cluster = %default,
                    step = %BootstrapStep::OptimisticRegister,
                    error = %e,
                    "Could not register with default cluster, checking whether it exists"
                );
            }
        }

        let state = self.describe_cluster(&default).await.map_err(|source| {
            tracing::error!(cluster = %default, error = %source, "Unable to describe default cluster");
            RegistrationError::DescribeCluster {
                cluster: default.clone(),
                source,
            }
        })?;

        let target = match state {
            ClusterState::Active(target) => target,
            ClusterState::Inactive(status) => {
                tracing::error!(
                    cluster = %default,
                    status = %status,
                    "Default cluster exists but is not active; refusing to recreate it"
                );
                return Err(RegistrationError::ClusterInactive {
                    cluster: default,
                    status,
                });
            }
            ClusterState::Absent => {
                self.create_cluster(&default).await.map_err(|source| {
                    RegistrationError::CreateCluster {
                        cluster: default.clone(),
                        source,
                    }
                })?;
                default
            }
        };

        let arn = self
            .register_once(&target)
            .await
            .map_err(|source| RegistrationError::Register {
                cluster: target.clone(),
                source,
            })?;
        Ok(registered(target, arn))
    }

    /// Look up a cluster and classify it.
    ///
    /// # Errors
    ///
    /// Returns an error if the describe call fails.
    pub async fn describe_cluster(&self, cluster: &ClusterRef) -> Result<ClusterState> {
        let response = self
            .channel
            .describe_clusters(DescribeClustersRequest {
                clusters: vec![cluster.to_string()],
            })
            .await?;

        let state = ClusterState::from_describe(cluster, &response);
        tracing::debug!(cluster = %cluster, state = ?state, "Described cluster");
        Ok(state)
    }

    /// Create a cluster and return the reference the service assigned.
    ///
    /// # Errors
    ///
    /// Returns an error if the create call fails.
    pub async fn create_cluster(&self, name: &ClusterRef) -> Result<ClusterRef> {
        tracing::info!(cluster = %name, "Creating cluster");

        let response = self
            .channel
            .create_cluster(CreateClusterRequest {
                cluster_name: name.to_string(),
            })
            .await?;

        let created = response
            .cluster
            .and_then(|c| c.cluster_arn)
            .and_then(|arn| ClusterRef::new(arn).ok())
            .unwrap_or_else(|| name.clone());

        tracing::info!(cluster = %name, arn = %created, "Created cluster");
        Ok(created)
    }

    /// Collect identity and capacity information for one attempt.
    ///
    /// Metadata failures are logged and replaced with empty values. The
    /// signature is only requested once the document has been read.
    pub async fn instance_registration(&self, cluster: &ClusterRef) -> InstanceRegistration {
        let resources = ResourceSet::from_probe(self.probe.as_ref(), &self.reserved_ports);

        let (identity_document, identity_signature) = match self.metadata.identity_document().await
        {
            Ok(document) => {
                let signature = self
                    .metadata
                    .identity_signature()
                    .await
                    .unwrap_or_else(|e| {
                        tracing::error!(error = %e, "Unable to get instance identity signature");
                        Vec::new()
                    });
                (document, signature)
            }
            Err(e) => {
                tracing::error!(error = %e, "Unable to get instance identity document");
                (Vec::new(), Vec::new())
            }
        };

        InstanceRegistration {
            cluster: cluster.clone(),
            identity_document,
            identity_signature,
            resources,
        }
    }

    async fn register_once(&self, cluster: &ClusterRef) -> Result<ContainerInstanceArn> {
        let registration = self.instance_registration(cluster).await;
        let response = self
            .channel
            .register_container_instance(registration.to_request())
            .await?;

        response
            .container_instance
            .and_then(|ci| ci.container_instance_arn)
            .and_then(|arn| ContainerInstanceArn::new(arn).ok())
            .ok_or_else(|| RpcError::Decode {
                operation: Operation::RegisterContainerInstance,
                message: "response carries no container instance ARN".to_string(),
            })
    }
}

fn registered(cluster: ClusterRef, arn: ContainerInstanceArn) -> Registration {
    tracing::info!(
        cluster = %cluster,
        container_instance = %arn,
        "Registered container instance"
    );
    Registration {
        cluster,
        container_instance_arn: arn,
    }
}

impl fmt::Debug for ClusterRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterRegistrar")
            .field("reserved_ports", &self.reserved_ports)
            .finish_non_exhaustive()
    }
}
