//! Identifier types for keel.
//!
//! The control plane hands out opaque string identifiers (usually ARNs, but a
//! cluster may also be addressed by its short name). These newtypes keep the
//! different kinds apart and guarantee they are never empty.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::DEFAULT_CLUSTER_NAME;

/// A resolved cluster identifier: either a cluster name or a cluster ARN.
///
/// An empty configured cluster means "bootstrap the default cluster"; that
/// case is represented as `Option<ClusterRef>::None`, never as an empty ref.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClusterRef(String);

impl ClusterRef {
    /// Create a cluster reference.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Empty` if the identifier is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        non_empty(value.into(), "cluster").map(Self)
    }

    /// Return the identifier as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The cluster bootstrapped when none is configured.
    #[must_use]
    pub fn default_cluster() -> Self {
        Self(DEFAULT_CLUSTER_NAME.to_string())
    }

    /// Returns true if this reference is a full ARN rather than a short name.
    #[must_use]
    pub fn is_arn(&self) -> bool {
        self.0.starts_with("arn:")
    }
}

impl fmt::Debug for ClusterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClusterRef({})", self.0)
    }
}

impl fmt::Display for ClusterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClusterRef {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ClusterRef {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClusterRef> for String {
    fn from(id: ClusterRef) -> Self {
        id.0
    }
}

/// The identifier assigned to this node when it registers into a cluster.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerInstanceArn(String);

impl ContainerInstanceArn {
    /// Create a container instance ARN.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Empty` if the identifier is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        non_empty(value.into(), "container instance").map(Self)
    }

    /// Return the ARN string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContainerInstanceArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContainerInstanceArn({})", self.0)
    }
}

impl fmt::Display for ContainerInstanceArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContainerInstanceArn {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContainerInstanceArn {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContainerInstanceArn> for String {
    fn from(id: ContainerInstanceArn) -> Self {
        id.0
    }
}

/// Identifier of a task whose lifecycle is reported back to the control plane.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskArn(String);

impl TaskArn {
    /// Create a task ARN.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Empty` if the identifier is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        non_empty(value.into(), "task").map(Self)
    }

    /// Return the ARN string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TaskArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskArn({})", self.0)
    }
}

impl fmt::Display for TaskArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TaskArn {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TaskArn {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TaskArn> for String {
    fn from(id: TaskArn) -> Self {
        id.0
    }
}

fn non_empty(value: String, kind: &'static str) -> Result<String, IdError> {
    if value.is_empty() {
        Err(IdError::Empty(kind))
    } else {
        Ok(value)
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier was empty.
    #[error("{0} identifier must not be empty")]
    Empty(&'static str),
}
