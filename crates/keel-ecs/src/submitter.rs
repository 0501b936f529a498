//! Task and container state change reporting.
//!
//! Each transition is translated into the control plane's two-status
//! vocabulary (see [`crate::status`]) and sent as a single request.
//! Transitions into states the control plane does not track produce
//! [`Submission::Ignored`] without any network traffic.

use std::sync::Arc;

use keel_core::{ClusterRef, TaskArn};
use serde::{Deserialize, Serialize};

use crate::channel::EcsChannel;
use crate::error::StateChangeError;
use crate::model::{NetworkBinding, SubmitContainerStateChangeRequest, SubmitTaskStateChangeRequest};
use crate::status::{ContainerStatus, TaskStatus};

/// A task moved to a new lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStateChange {
    /// The task that changed.
    pub task_arn: TaskArn,
    /// The state it moved to.
    pub status: TaskStatus,
}

/// A host port published by a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// Host address the port is bound on.
    pub bind_ip: String,
    /// Port on the host.
    pub host_port: u16,
    /// Port inside the container.
    pub container_port: u16,
}

impl From<&PortBinding> for NetworkBinding {
    fn from(binding: &PortBinding) -> Self {
        Self {
            bind_ip: binding.bind_ip.clone(),
            host_port: i32::from(binding.host_port),
            container_port: i32::from(binding.container_port),
        }
    }
}

/// A container moved to a new lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStateChange {
    /// The task owning the container.
    pub task_arn: TaskArn,
    /// Container name within the task.
    pub container_name: String,
    /// The state it moved to.
    pub status: ContainerStatus,
    /// Exit code, once the container has exited.
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Published ports.
    #[serde(default)]
    pub port_bindings: Vec<PortBinding>,
}

/// Result of a state change submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The change was reported to the control plane.
    Submitted,
    /// The state is not tracked remotely; nothing was sent.
    Ignored {
        /// The local state that was skipped.
        status: &'static str,
    },
}

impl Submission {
    /// Returns true if a request was sent.
    #[must_use]
    pub const fn was_submitted(self) -> bool {
        matches!(self, Self::Submitted)
    }
}

/// Build the task state change request, or `None` if the state is not
/// reported.
///
/// # Errors
///
/// Returns `StateChangeError::InvalidChange` if the task has no status.
pub fn task_request(
    cluster: &ClusterRef,
    change: &TaskStateChange,
) -> Result<Option<SubmitTaskStateChangeRequest>, StateChangeError> {
    if !change.status.is_set() {
        return Err(StateChangeError::InvalidChange(format!(
            "task {} has no status",
            change.task_arn
        )));
    }

    Ok(change
        .status
        .remote()
        .map(|remote| SubmitTaskStateChangeRequest {
            cluster: cluster.to_string(),
            task: change.task_arn.to_string(),
            status: remote.to_string(),
        }))
}

/// Build the container state change request, or `None` if the state is not
/// reported.
#[must_use]
pub fn container_request(
    cluster: &ClusterRef,
    change: &ContainerStateChange,
) -> Option<SubmitContainerStateChangeRequest> {
    let remote = change.status.remote()?;

    Some(SubmitContainerStateChangeRequest {
        cluster: cluster.to_string(),
        task: change.task_arn.to_string(),
        container_name: change.container_name.clone(),
        status: remote.to_string(),
        exit_code: change.exit_code,
        network_bindings: change.port_bindings.iter().map(NetworkBinding::from).collect(),
    })
}

/// Reports lifecycle transitions to the control plane.
#[derive(Clone)]
pub struct StateChangeSubmitter {
    channel: Arc<dyn EcsChannel>,
}

impl StateChangeSubmitter {
    /// Create a new submitter.
    #[must_use]
    pub fn new(channel: Arc<dyn EcsChannel>) -> Self {
        Self { channel }
    }

    /// Report a task state change.
    ///
    /// # Errors
    ///
    /// Returns `StateChangeError::InvalidChange` for a task without status
    /// and `StateChangeError::Submission` if the request fails.
    pub async fn submit_task(
        &self,
        cluster: &ClusterRef,
        change: &TaskStateChange,
    ) -> Result<Submission, StateChangeError> {
        let request = task_request(cluster, change).inspect_err(|e| {
            tracing::warn!(task = %change.task_arn, error = %e, "Rejected task state change");
        })?;

        let Some(request) = request else {
            tracing::debug!(
                task = %change.task_arn,
                status = %change.status,
                "Not submitting unsupported upstream task state"
            );
            return Ok(Submission::Ignored {
                status: change.status.as_str(),
            });
        };

        self.channel
            .submit_task_state_change(request)
            .await
            .map_err(|e| {
                tracing::warn!(
                    task = %change.task_arn,
                    error = %e,
                    "Could not submit task state change"
                );
                StateChangeError::Submission(e)
            })?;

        tracing::debug!(task = %change.task_arn, status = %change.status, "Submitted task state change");
        Ok(Submission::Submitted)
    }

    /// Report a container state change.
    ///
    /// # Errors
    ///
    /// Returns `StateChangeError::Submission` if the request fails.
    pub async fn submit_container(
        &self,
        cluster: &ClusterRef,
        change: &ContainerStateChange,
    ) -> Result<Submission, StateChangeError> {
        let Some(request) = container_request(cluster, change) else {
            tracing::info!(
                task = %change.task_arn,
                container = %change.container_name,
                status = %change.status,
                "Not submitting unsupported upstream container state"
            );
            return Ok(Submission::Ignored {
                status: change.status.as_str(),
            });
        };

        self.channel
            .submit_container_state_change(request)
            .await
            .map_err(|e| {
                tracing::warn!(
                    task = %change.task_arn,
                    container = %change.container_name,
                    error = %e,
                    "Could not submit container state change"
                );
                StateChangeError::Submission(e)
            })?;

        tracing::debug!(
            task = %change.task_arn,
            container = %change.container_name,
            status = %change.status,
            "Submitted container state change"
        );
        Ok(Submission::Submitted)
    }
}

impl std::fmt::Debug for StateChangeSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateChangeSubmitter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::{MockEcsChannel, RecordedCall};
    use crate::channel::Operation;
    use crate::error::RpcError;
    use std::error::Error as _;

    const TASK: &str = "arn:aws:ecs:us-east-1:123456789012:task/abc";

    fn cluster() -> ClusterRef {
        ClusterRef::new("default").unwrap()
    }

    fn task(status: TaskStatus) -> TaskStateChange {
        TaskStateChange {
            task_arn: TaskArn::new(TASK).unwrap(),
            status,
        }
    }

    fn container(status: ContainerStatus) -> ContainerStateChange {
        ContainerStateChange {
            task_arn: TaskArn::new(TASK).unwrap(),
            container_name: "web".to_string(),
            status,
            exit_code: None,
            port_bindings: Vec::new(),
        }
    }

    fn submitter() -> (Arc<MockEcsChannel>, StateChangeSubmitter) {
        let channel = Arc::new(MockEcsChannel::new());
        (channel.clone(), StateChangeSubmitter::new(channel))
    }

    #[tokio::test]
    async fn unreported_task_states_make_no_calls() {
        let (channel, submitter) = submitter();

        for status in [TaskStatus::Pulled, TaskStatus::Created] {
            let outcome = submitter.submit_task(&cluster(), &task(status)).await.unwrap();
            assert_eq!(
                outcome,
                Submission::Ignored {
                    status: status.as_str()
                }
            );
        }
        assert!(channel.calls().is_empty());
    }

    #[tokio::test]
    async fn unreported_container_states_make_no_calls() {
        let (channel, submitter) = submitter();

        for status in [
            ContainerStatus::None,
            ContainerStatus::Pulled,
            ContainerStatus::Created,
        ] {
            let outcome = submitter
                .submit_container(&cluster(), &container(status))
                .await
                .unwrap();
            assert!(!outcome.was_submitted());
        }
        assert!(channel.calls().is_empty());
    }

    #[tokio::test]
    async fn task_without_status_is_rejected_locally() {
        let (channel, submitter) = submitter();

        let err = submitter
            .submit_task(&cluster(), &task(TaskStatus::None))
            .await
            .unwrap_err();

        assert!(matches!(err, StateChangeError::InvalidChange(_)));
        assert!(!err.is_retriable());
        assert!(channel.calls().is_empty());
    }

    #[tokio::test]
    async fn dead_task_is_reported_as_stopped() {
        let (channel, submitter) = submitter();

        let outcome = submitter
            .submit_task(&cluster(), &task(TaskStatus::Dead))
            .await
            .unwrap();

        assert_eq!(outcome, Submission::Submitted);
        assert_eq!(
            channel.calls(),
            [RecordedCall::SubmitTaskStateChange(SubmitTaskStateChangeRequest {
                cluster: "default".to_string(),
                task: TASK.to_string(),
                status: "STOPPED".to_string(),
            })]
        );
    }

    #[tokio::test]
    async fn container_change_carries_exit_code_and_bindings_in_order() {
        let (channel, submitter) = submitter();
        let mut change = container(ContainerStatus::Stopped);
        change.exit_code = Some(137);
        change.port_bindings = vec![
            PortBinding {
                bind_ip: "0.0.0.0".to_string(),
                host_port: 32768,
                container_port: 80,
            },
            PortBinding {
                bind_ip: "127.0.0.1".to_string(),
                host_port: 8443,
                container_port: 443,
            },
            PortBinding {
                bind_ip: "0.0.0.0".to_string(),
                host_port: 65535,
                container_port: 9000,
            },
        ];

        submitter.submit_container(&cluster(), &change).await.unwrap();

        let Some(RecordedCall::SubmitContainerStateChange(req)) = channel.calls().pop() else {
            panic!("expected a container state change call");
        };
        assert_eq!(req.status, "STOPPED");
        assert_eq!(req.exit_code, Some(137));
        assert_eq!(req.container_name, "web");
        assert_eq!(req.cluster, "default");
        assert_eq!(req.network_bindings.len(), change.port_bindings.len());
        for (wire, local) in req.network_bindings.iter().zip(&change.port_bindings) {
            assert_eq!(wire.bind_ip, local.bind_ip);
            assert_eq!(wire.host_port, i32::from(local.host_port));
            assert_eq!(wire.container_port, i32::from(local.container_port));
        }
    }

    #[test]
    fn running_container_without_exit_code_omits_it() {
        let req = container_request(&cluster(), &container(ContainerStatus::Running)).unwrap();
        assert_eq!(req.status, "RUNNING");
        assert_eq!(req.exit_code, None);
        assert!(req.network_bindings.is_empty());
    }

    #[tokio::test]
    async fn channel_errors_are_wrapped_as_retriable() {
        let (channel, submitter) = submitter();
        channel.push_submit(Err(RpcError::Service {
            operation: Operation::SubmitTaskStateChange,
            status: 400,
            code: "ClientException".to_string(),
            message: "task not found".to_string(),
        }));
        channel.push_submit(Err(RpcError::Transport {
            operation: Operation::SubmitContainerStateChange,
            message: "timed out".to_string(),
        }));

        let err = submitter
            .submit_task(&cluster(), &task(TaskStatus::Running))
            .await
            .unwrap_err();
        assert!(err.is_retriable());
        assert!(err.source().unwrap().to_string().contains("task not found"));

        let err = submitter
            .submit_container(&cluster(), &container(ContainerStatus::Running))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StateChangeError::Submission(RpcError::Transport { .. })
        ));
        assert_eq!(channel.calls().len(), 2);
    }
}
