//! Error types for the control plane client.
//!
//! Failures are split by where they arise so that callers can see which ones
//! are worth retrying:
//!
//! - [`RpcError`]: anything the RPC channel reports (transport, remote service,
//!   encoding, credentials)
//! - [`RegistrationError`]: one variant per step of the registration bootstrap
//! - [`StateChangeError`]: local validation failures and wrapped submission
//!   failures for task and container state changes

use keel_core::ClusterRef;
use thiserror::Error;

use crate::channel::Operation;
use crate::registrar::BootstrapStep;

/// A result type using `RpcError`.
pub type Result<T> = std::result::Result<T, RpcError>;

/// Errors that can occur while loading credentials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    /// A required credential value is not set.
    #[error("missing credential: {0}")]
    Missing(&'static str),

    /// The credentials have expired.
    #[error("credentials expired")]
    Expired,
}

/// Errors returned by the RPC channel.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The request never produced a response (connection, TLS, timeout).
    #[error("{operation} request failed: {message}")]
    Transport {
        /// The operation being invoked.
        operation: Operation,
        /// Description of the transport failure.
        message: String,
    },

    /// The control plane rejected the request.
    #[error("{operation} rejected by control plane ({code}): {message}")]
    Service {
        /// The operation being invoked.
        operation: Operation,
        /// HTTP status of the response.
        status: u16,
        /// Service error code (e.g. `ClientException`).
        code: String,
        /// Human-readable message from the service.
        message: String,
    },

    /// The request could not be serialized.
    #[error("failed to encode {operation} request: {message}")]
    Encode {
        /// The operation being invoked.
        operation: Operation,
        /// Description of the encoding failure.
        message: String,
    },

    /// The response could not be understood.
    #[error("invalid {operation} response: {message}")]
    Decode {
        /// The operation being invoked.
        operation: Operation,
        /// Description of what was wrong with the response.
        message: String,
    },

    /// No usable credentials to sign the request with.
    #[error("credentials unavailable: {0}")]
    Credentials(#[from] CredentialsError),
}

impl RpcError {
    /// Returns true if repeating the same request might succeed.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Credentials(_) => true,
            Self::Service { status, code, .. } => {
                *status >= 500 || code == "ServerException" || code.contains("Throttl")
            }
            Self::Encode { .. } | Self::Decode { .. } => false,
        }
    }

    /// The operation that failed, if the error came from a request.
    #[must_use]
    pub const fn operation(&self) -> Option<Operation> {
        match self {
            Self::Transport { operation, .. }
            | Self::Service { operation, .. }
            | Self::Encode { operation, .. }
            | Self::Decode { operation, .. } => Some(*operation),
            Self::Credentials(_) => None,
        }
    }
}

/// Errors from the registration bootstrap.
///
/// Each variant corresponds to one step; the RPC-backed variants keep the
/// channel error as their source.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Registering the container instance failed.
    #[error("failed to register container instance in cluster {cluster}: {source}")]
    Register {
        /// The cluster registration was attempted against.
        cluster: ClusterRef,
        /// The underlying channel error.
        #[source]
        source: RpcError,
    },

    /// Looking up the default cluster failed.
    #[error("failed to describe cluster {cluster}: {source}")]
    DescribeCluster {
        /// The cluster being described.
        cluster: ClusterRef,
        /// The underlying channel error.
        #[source]
        source: RpcError,
    },

    /// The cluster exists but is not active, so it must not be recreated.
    #[error("cluster {cluster} is not available for registration (status {status})")]
    ClusterInactive {
        /// The inactive cluster.
        cluster: ClusterRef,
        /// The status the control plane reported.
        status: String,
    },

    /// Creating the default cluster failed.
    #[error("failed to create cluster {cluster}: {source}")]
    CreateCluster {
        /// The cluster being created.
        cluster: ClusterRef,
        /// The underlying channel error.
        #[source]
        source: RpcError,
    },
}

impl RegistrationError {
    /// The bootstrap step that produced this error.
    #[must_use]
    pub const fn step(&self) -> BootstrapStep {
        match self {
            Self::Register { .. } => BootstrapStep::Register,
            Self::DescribeCluster { .. } | Self::ClusterInactive { .. } => {
                BootstrapStep::DescribeCluster
            }
            Self::CreateCluster { .. } => BootstrapStep::CreateCluster,
        }
    }

    /// Returns true if running the bootstrap again might succeed.
    ///
    /// An inactive cluster is a policy decision and never retriable.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Register { source, .. }
            | Self::DescribeCluster { source, .. }
            | Self::CreateCluster { source, .. } => source.is_retriable(),
            Self::ClusterInactive { .. } => false,
        }
    }

    /// The channel error behind this failure, if any.
    #[must_use]
    pub const fn rpc_error(&self) -> Option<&RpcError> {
        match self {
            Self::Register { source, .. }
            | Self::DescribeCluster { source, .. }
            | Self::CreateCluster { source, .. } => Some(source),
            Self::ClusterInactive { .. } => None,
        }
    }
}

/// Errors from submitting a task or container state change.
#[derive(Debug, Error)]
pub enum StateChangeError {
    /// The change was rejected locally and never sent.
    #[error("invalid state change: {0}")]
    InvalidChange(String),

    /// The control plane could not be told about the change.
    #[error("state change submission failed: {0}")]
    Submission(#[source] RpcError),
}

impl StateChangeError {
    /// Returns true if the caller may submit the same change again.
    ///
    /// Every submission failure is retriable; invalid changes never are.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Submission(_))
    }
}

impl From<RpcError> for StateChangeError {
    fn from(err: RpcError) -> Self {
        Self::Submission(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    fn service_error(status: u16, code: &str) -> RpcError {
        RpcError::Service {
            operation: Operation::RegisterContainerInstance,
            status,
            code: code.to_string(),
            message: "boom".to_string(),
        }
    }

    #[test]
    fn rpc_error_retriable() {
        assert!(RpcError::Transport {
            operation: Operation::DescribeClusters,
            message: "connection reset".into()
        }
        .is_retriable());
        assert!(service_error(500, "ServerException").is_retriable());
        assert!(service_error(400, "ThrottlingException").is_retriable());
        assert!(!service_error(400, "ClientException").is_retriable());
        assert!(!RpcError::Decode {
            operation: Operation::CreateCluster,
            message: "missing arn".into()
        }
        .is_retriable());
    }

    #[test]
    fn inactive_cluster_is_not_retriable() {
        let err = RegistrationError::ClusterInactive {
            cluster: ClusterRef::new("default").unwrap(),
            status: "INACTIVE".to_string(),
        };
        assert!(!err.is_retriable());
        assert!(err.rpc_error().is_none());
        assert_eq!(err.step(), BootstrapStep::DescribeCluster);
        assert!(err.to_string().contains("not available for registration"));
    }

    #[test]
    fn registration_error_keeps_source() {
        let err = RegistrationError::CreateCluster {
            cluster: ClusterRef::new("default").unwrap(),
            source: service_error(400, "ClientException"),
        };
        assert_eq!(err.step(), BootstrapStep::CreateCluster);
        assert!(err.source().is_some());
        assert!(matches!(err.rpc_error(), Some(RpcError::Service { .. })));
    }

    #[test]
    fn state_change_retriability() {
        let invalid = StateChangeError::InvalidChange("no status".into());
        assert!(!invalid.is_retriable());

        let wrapped = StateChangeError::from(service_error(400, "ClientException"));
        assert!(wrapped.is_retriable());
        assert!(wrapped.source().is_some());
    }
}
