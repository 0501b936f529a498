//! Request and response types of the control plane API.
//!
//! These mirror the JSON wire format: camelCase field names, optional fields
//! omitted when unset.

use serde::{Deserialize, Serialize};

use crate::resources::{Resource, ResourceKind, ResourceValue};

/// Request to create a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClusterRequest {
    /// Name of the cluster to create.
    pub cluster_name: String,
}

/// Response to [`CreateClusterRequest`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClusterResponse {
    /// The created cluster.
    #[serde(default)]
    pub cluster: Option<Cluster>,
}

/// A cluster as described by the control plane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Full ARN of the cluster.
    #[serde(default)]
    pub cluster_arn: Option<String>,
    /// Short name of the cluster.
    #[serde(default)]
    pub cluster_name: Option<String>,
    /// Cluster status (e.g. `ACTIVE`, `INACTIVE`).
    #[serde(default)]
    pub status: Option<String>,
}

/// Request to describe clusters by name or ARN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeClustersRequest {
    /// Cluster names or ARNs.
    pub clusters: Vec<String>,
}

/// Response to [`DescribeClustersRequest`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeClustersResponse {
    /// Clusters that were found.
    #[serde(default)]
    pub clusters: Vec<Cluster>,
    /// Clusters that could not be described.
    #[serde(default)]
    pub failures: Vec<Failure>,
}

/// A per-item failure in a batch response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    /// The item that failed.
    #[serde(default)]
    pub arn: Option<String>,
    /// Why it failed (e.g. `MISSING`).
    #[serde(default)]
    pub reason: Option<String>,
}

/// A resource descriptor on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResource {
    /// Resource name.
    pub name: String,
    /// Resource type tag.
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    /// Value for `INTEGER` resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integer_value: Option<i32>,
    /// Value for `STRINGSET` resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_set_value: Option<Vec<String>>,
}

impl From<&Resource> for WireResource {
    fn from(resource: &Resource) -> Self {
        let (integer_value, string_set_value) = match &resource.value {
            ResourceValue::Integer(v) => (Some(*v), None),
            ResourceValue::StringSet(v) => (None, Some(v.clone())),
        };
        Self {
            name: resource.name.clone(),
            kind: resource.kind(),
            integer_value,
            string_set_value,
        }
    }
}

/// Request to register a container instance into a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterContainerInstanceRequest {
    /// Cluster name or ARN.
    pub cluster: String,
    /// Instance identity document, empty if unavailable.
    pub instance_identity_document: String,
    /// Signature over the identity document, empty if unavailable.
    pub instance_identity_document_signature: String,
    /// Capacities of the node.
    pub total_resources: Vec<WireResource>,
}

/// Response to [`RegisterContainerInstanceRequest`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterContainerInstanceResponse {
    /// The registered container instance.
    #[serde(default)]
    pub container_instance: Option<ContainerInstance>,
}

/// A registered container instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInstance {
    /// ARN assigned to the instance.
    #[serde(default)]
    pub container_instance_arn: Option<String>,
    /// Instance status (e.g. `ACTIVE`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Request to report a task state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTaskStateChangeRequest {
    /// Cluster name or ARN.
    pub cluster: String,
    /// Task ARN.
    pub task: String,
    /// Remote status (`RUNNING` or `STOPPED`).
    pub status: String,
}

/// Request to report a container state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitContainerStateChangeRequest {
    /// Cluster name or ARN.
    pub cluster: String,
    /// ARN of the task owning the container.
    pub task: String,
    /// Container name within the task.
    pub container_name: String,
    /// Remote status (`RUNNING` or `STOPPED`).
    pub status: String,
    /// Exit code, only when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Host port bindings of the container.
    #[serde(default)]
    pub network_bindings: Vec<NetworkBinding>,
}

/// A host port binding on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkBinding {
    /// Address the host port is bound to.
    #[serde(rename = "bindIP")]
    pub bind_ip: String,
    /// Port on the host.
    pub host_port: i32,
    /// Port inside the container.
    pub container_port: i32,
}

/// Acknowledgement returned by state change submissions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitStateChangeResponse {
    /// Acknowledgement string, if the service sent one.
    #[serde(default)]
    pub acknowledgment: Option<String>,
}

/// Request to find the endpoint the instance should poll for work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverPollEndpointRequest {
    /// Cluster name or ARN.
    pub cluster: String,
    /// Container instance ARN.
    pub container_instance: String,
}

/// Response to [`DiscoverPollEndpointRequest`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverPollEndpointResponse {
    /// Endpoint URL to poll.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Request to remove a container instance from a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeregisterContainerInstanceRequest {
    /// Cluster name or ARN.
    pub cluster: String,
    /// Container instance ARN.
    pub container_instance: String,
}

/// Response to [`DeregisterContainerInstanceRequest`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeregisterContainerInstanceResponse {
    /// The deregistered instance.
    #[serde(default)]
    pub container_instance: Option<ContainerInstance>,
}

/// Error body returned by the control plane on non-success responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ServiceErrorBody {
    #[serde(rename = "__type", default)]
    pub error_type: Option<String>,
    #[serde(alias = "Message", default)]
    pub message: Option<String>,
}

impl ServiceErrorBody {
    /// The short error code, stripping any `namespace#` prefix.
    pub(crate) fn code(&self) -> Option<&str> {
        self.error_type
            .as_deref()
            .map(|t| t.rsplit('#').next().unwrap_or(t))
    }
}
