//! Control plane client for keel.
//!
//! This crate registers a container instance with the control plane, reports
//! task and container state changes, and exposes the remaining per-instance
//! operations (poll endpoint discovery, deregistration).
//!
//! # Architecture
//!
//! ```text
//!   ┌──────────────────────────── ApiEcsClient ───────────────────────────┐
//!   │                                                                      │
//!   │  ClusterRegistrar ──┐        StateChangeSubmitter ──┐                │
//!   │   (bootstrap)       │         (status translation)  │                │
//!   │                     ▼                               ▼                │
//!   │               ┌───────────────── EcsChannel ─────────────────┐       │
//!   │               │  HttpEcsChannel: JSON over HTTP, signed by   │       │
//!   │               │  RequestSigner with CredentialProvider creds │       │
//!   │               └──────────────────────────────────────────────┘       │
//!   └──────────────────────────────────────────────────────────────────────┘
//!            ▲                    ▲
//!   MetadataProvider          HostProbe
//!   (identity document)       (CPU, memory)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use keel_core::AgentConfig;
//! use keel_ecs::{ApiEcsClient, EcsClient, EnvCredentialProvider, UnsignedRequests};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AgentConfig::from_env();
//! let client = ApiEcsClient::from_config(
//!     &config,
//!     Arc::new(EnvCredentialProvider::new()),
//!     Arc::new(UnsignedRequests),
//! );
//!
//! let registration = client
//!     .register_container_instance(config.cluster.as_ref())
//!     .await?;
//! let config = config.with_cluster(registration.cluster.clone());
//!
//! if let Some(cluster) = &config.cluster {
//!     let endpoint = client
//!         .discover_poll_endpoint(cluster, &registration.container_instance_arn)
//!         .await?;
//!     println!("polling {endpoint}");
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod channel;
pub mod client;
pub mod credentials;
pub mod error;
pub mod model;
pub mod registrar;
pub mod resources;
pub mod status;
pub mod submitter;

pub use channel::{EcsChannel, HttpEcsChannel, Operation};
pub use client::{ApiEcsClient, EcsClient};
pub use credentials::{
    CredentialProvider, Credentials, EnvCredentialProvider, RequestSigner, SigningContext,
    StaticCredentialProvider, UnsignedRequests,
};
pub use error::{CredentialsError, RegistrationError, Result, RpcError, StateChangeError};
pub use registrar::{BootstrapStep, ClusterRegistrar, ClusterState, InstanceRegistration, Registration};
pub use resources::{FixedProbe, HostProbe, Resource, ResourceKind, ResourceSet, ResourceValue, SystemProbe};
pub use status::{ContainerStatus, RemoteStatus, TaskStatus};
pub use submitter::{
    ContainerStateChange, PortBinding, StateChangeSubmitter, Submission, TaskStateChange,
};

#[cfg(any(test, feature = "test-utils"))]
pub use channel::mock::{MockEcsChannel, RecordedCall};
