//! The RPC channel to the control plane.
//!
//! [`EcsChannel`] is the seam between the client logic and the network: one
//! method per control plane operation, typed requests in, typed responses out.
//! [`HttpEcsChannel`] implements it over JSON/HTTP, building a fresh signed
//! request for every call.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::credentials::{CredentialProvider, RequestSigner, SigningContext};
use crate::error::{Result, RpcError};
use crate::model::{
    CreateClusterRequest, CreateClusterResponse, DeregisterContainerInstanceRequest,
    DeregisterContainerInstanceResponse, DescribeClustersRequest, DescribeClustersResponse,
    DiscoverPollEndpointRequest, DiscoverPollEndpointResponse, RegisterContainerInstanceRequest,
    RegisterContainerInstanceResponse, ServiceErrorBody, SubmitContainerStateChangeRequest,
    SubmitStateChangeResponse, SubmitTaskStateChangeRequest,
};

/// Service prefix of the `X-Amz-Target` header.
const TARGET_PREFIX: &str = "AmazonEC2ContainerServiceV20141113";

/// Content type of control plane requests.
const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// A control plane operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create a cluster.
    CreateCluster,
    /// Describe clusters.
    DescribeClusters,
    /// Register a container instance.
    RegisterContainerInstance,
    /// Report a task state change.
    SubmitTaskStateChange,
    /// Report a container state change.
    SubmitContainerStateChange,
    /// Discover the poll endpoint.
    DiscoverPollEndpoint,
    /// Deregister a container instance.
    DeregisterContainerInstance,
}

impl Operation {
    /// The operation name as used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateCluster => "CreateCluster",
            Self::DescribeClusters => "DescribeClusters",
            Self::RegisterContainerInstance => "RegisterContainerInstance",
            Self::SubmitTaskStateChange => "SubmitTaskStateChange",
            Self::SubmitContainerStateChange => "SubmitContainerStateChange",
            Self::DiscoverPollEndpoint => "DiscoverPollEndpoint",
            Self::DeregisterContainerInstance => "DeregisterContainerInstance",
        }
    }

    /// Value of the `X-Amz-Target` header for this operation.
    #[must_use]
    pub fn target(self) -> String {
        format!("{TARGET_PREFIX}.{}", self.as_str())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed RPC access to the control plane.
///
/// Implementations perform exactly one round trip per call and never retry.
#[async_trait]
pub trait EcsChannel: Send + Sync {
    /// Create a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service rejects it.
    async fn create_cluster(&self, request: CreateClusterRequest) -> Result<CreateClusterResponse>;

    /// Describe clusters by name or ARN.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service rejects it.
    async fn describe_clusters(
        &self,
        request: DescribeClustersRequest,
    ) -> Result<DescribeClustersResponse>;

    /// Register a container instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service rejects it.
    async fn register_container_instance(
        &self,
        request: RegisterContainerInstanceRequest,
    ) -> Result<RegisterContainerInstanceResponse>;

    /// Report a task state change.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service rejects it.
    async fn submit_task_state_change(
        &self,
        request: SubmitTaskStateChangeRequest,
    ) -> Result<SubmitStateChangeResponse>;

    /// Report a container state change.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service rejects it.
    async fn submit_container_state_change(
        &self,
        request: SubmitContainerStateChangeRequest,
    ) -> Result<SubmitStateChangeResponse>;

    /// Find the endpoint a container instance should poll.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service rejects it.
    async fn discover_poll_endpoint(
        &self,
        request: DiscoverPollEndpointRequest,
    ) -> Result<DiscoverPollEndpointResponse>;

    /// Deregister a container instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service rejects it.
    async fn deregister_container_instance(
        &self,
        request: DeregisterContainerInstanceRequest,
    ) -> Result<DeregisterContainerInstanceResponse>;
}

/// JSON-over-HTTP channel to the control plane.
#[derive(Clone)]
pub struct HttpEcsChannel {
    client: reqwest::Client,
    endpoint: String,
    region: String,
    credentials: Arc<dyn CredentialProvider>,
    signer: Arc<dyn RequestSigner>,
}

impl HttpEcsChannel {
    /// Create a new channel.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - The control plane URL (e.g., "https://ecs.us-east-1.amazonaws.com")
    /// * `region` - Region used when signing requests
    /// * `timeout` - Overall timeout of each request
    /// * `accept_invalid_certs` - Skip TLS certificate verification, for
    ///   endpoints with self-signed certificates
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        region: impl Into<String>,
        timeout: Duration,
        accept_invalid_certs: bool,
        credentials: Arc<dyn CredentialProvider>,
        signer: Arc<dyn RequestSigner>,
    ) -> Self {
        let endpoint = endpoint.into();
        if accept_invalid_certs {
            tracing::warn!(endpoint = %endpoint, "TLS certificate verification is disabled");
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .expect("Failed to create HTTP client");

        Self::with_client(client, endpoint, region, credentials, signer)
    }

    /// Create a new channel with a custom reqwest client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        region: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        signer: Arc<dyn RequestSigner>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            region: region.into(),
            credentials,
            signer,
        }
    }

    /// Get the control plane endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one request and decode the response.
    async fn call<Req, Resp>(&self, operation: Operation, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(request).map_err(|e| RpcError::Encode {
            operation,
            message: e.to_string(),
        })?;

        let credentials = self.credentials.credentials().await?;
        let context = SigningContext {
            operation,
            endpoint: &self.endpoint,
            region: &self.region,
            body: &body,
        };
        let auth_headers = self.signer.sign(&context, &credentials)?;

        let target = HeaderValue::from_str(&operation.target()).map_err(|e| RpcError::Encode {
            operation,
            message: e.to_string(),
        })?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header("X-Amz-Target", target)
            .headers(auth_headers)
            .body(body)
            .send()
            .await
            .map_err(|e| RpcError::Transport {
                operation,
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await.map_err(|e| RpcError::Transport {
                operation,
                message: e.to_string(),
            })?;
            // Some operations answer with an empty body.
            let bytes: &[u8] = if bytes.is_empty() { b"{}" } else { &bytes };
            return serde_json::from_slice(bytes).map_err(|e| RpcError::Decode {
                operation,
                message: e.to_string(),
            });
        }

        let text = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ServiceErrorBody>(&text) {
            Ok(body) => (
                body.code().unwrap_or("UnknownError").to_string(),
                body.message.clone().unwrap_or_default(),
            ),
            Err(_) => ("UnknownError".to_string(), text),
        };

        tracing::debug!(
            operation = %operation,
            status = %status,
            code = %code,
            "Control plane rejected request"
        );

        Err(RpcError::Service {
            operation,
            status: status.as_u16(),
            code,
            message,
        })
    }
}

impl fmt::Debug for HttpEcsChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpEcsChannel")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EcsChannel for HttpEcsChannel {
    async fn create_cluster(&self, request: CreateClusterRequest) -> Result<CreateClusterResponse> {
        self.call(Operation::CreateCluster, &request).await
    }

    async fn describe_clusters(
        &self,
        request: DescribeClustersRequest,
    ) -> Result<DescribeClustersResponse> {
        self.call(Operation::DescribeClusters, &request).await
    }

    async fn register_container_instance(
        &self,
        request: RegisterContainerInstanceRequest,
    ) -> Result<RegisterContainerInstanceResponse> {
        self.call(Operation::RegisterContainerInstance, &request)
            .await
    }

    async fn submit_task_state_change(
        &self,
        request: SubmitTaskStateChangeRequest,
    ) -> Result<SubmitStateChangeResponse> {
        self.call(Operation::SubmitTaskStateChange, &request).await
    }

    async fn submit_container_state_change(
        &self,
        request: SubmitContainerStateChangeRequest,
    ) -> Result<SubmitStateChangeResponse> {
        self.call(Operation::SubmitContainerStateChange, &request)
            .await
    }

    async fn discover_poll_endpoint(
        &self,
        request: DiscoverPollEndpointRequest,
    ) -> Result<DiscoverPollEndpointResponse> {
        self.call(Operation::DiscoverPollEndpoint, &request).await
    }

    async fn deregister_container_instance(
        &self,
        request: DeregisterContainerInstanceRequest,
    ) -> Result<DeregisterContainerInstanceResponse> {
        self.call(Operation::DeregisterContainerInstance, &request)
            .await
    }
}

/// Recording channel for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::model::{Cluster, ContainerInstance};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// A request seen by [`MockEcsChannel`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RecordedCall {
        /// A `CreateCluster` call.
        CreateCluster(CreateClusterRequest),
        /// A `DescribeClusters` call.
        DescribeClusters(DescribeClustersRequest),
        /// A `RegisterContainerInstance` call.
        RegisterContainerInstance(RegisterContainerInstanceRequest),
        /// A `SubmitTaskStateChange` call.
        SubmitTaskStateChange(SubmitTaskStateChangeRequest),
        /// A `SubmitContainerStateChange` call.
        SubmitContainerStateChange(SubmitContainerStateChangeRequest),
        /// A `DiscoverPollEndpoint` call.
        DiscoverPollEndpoint(DiscoverPollEndpointRequest),
        /// A `DeregisterContainerInstance` call.
        DeregisterContainerInstance(DeregisterContainerInstanceRequest),
    }

    impl RecordedCall {
        /// The operation this call invoked.
        #[must_use]
        pub const fn operation(&self) -> Operation {
            match self {
                Self::CreateCluster(_) => Operation::CreateCluster,
                Self::DescribeClusters(_) => Operation::DescribeClusters,
                Self::RegisterContainerInstance(_) => Operation::RegisterContainerInstance,
                Self::SubmitTaskStateChange(_) => Operation::SubmitTaskStateChange,
                Self::SubmitContainerStateChange(_) => Operation::SubmitContainerStateChange,
                Self::DiscoverPollEndpoint(_) => Operation::DiscoverPollEndpoint,
                Self::DeregisterContainerInstance(_) => Operation::DeregisterContainerInstance,
            }
        }
    }

    /// Scripted results, consumed in order. An empty queue yields a success.
    #[derive(Default)]
    struct Script {
        create: VecDeque<Result<CreateClusterResponse>>,
        describe: VecDeque<Result<DescribeClustersResponse>>,
        register: VecDeque<Result<RegisterContainerInstanceResponse>>,
        submit: VecDeque<Result<SubmitStateChangeResponse>>,
        discover: VecDeque<Result<DiscoverPollEndpointResponse>>,
        deregister: VecDeque<Result<DeregisterContainerInstanceResponse>>,
    }

    /// A channel that records every call and replays scripted results.
    #[derive(Default)]
    pub struct MockEcsChannel {
        script: Mutex<Script>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl MockEcsChannel {
        /// Create a new mock channel.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a registration result; `Ok` carries the instance ARN.
        pub fn push_register(&self, result: std::result::Result<&str, RpcError>) {
            let result = result.map(|arn| RegisterContainerInstanceResponse {
                container_instance: Some(ContainerInstance {
                    container_instance_arn: Some(arn.to_string()),
                    status: Some("ACTIVE".to_string()),
                }),
            });
            self.script.lock().register.push_back(result);
        }

        /// Queue a describe result.
        pub fn push_describe(&self, result: Result<DescribeClustersResponse>) {
            self.script.lock().describe.push_back(result);
        }

        /// Queue a describe result reporting one cluster.
        pub fn push_described_cluster(&self, name: &str, arn: &str, status: &str) {
            self.push_describe(Ok(DescribeClustersResponse {
                clusters: vec![Cluster {
                    cluster_arn: Some(arn.to_string()),
                    cluster_name: Some(name.to_string()),
                    status: Some(status.to_string()),
                }],
                failures: Vec::new(),
            }));
        }

        /// Queue a cluster creation result; `Ok` carries the cluster ARN.
        pub fn push_create(&self, result: std::result::Result<&str, RpcError>) {
            let result = result.map(|arn| CreateClusterResponse {
                cluster: Some(Cluster {
                    cluster_arn: Some(arn.to_string()),
                    cluster_name: None,
                    status: Some("ACTIVE".to_string()),
                }),
            });
            self.script.lock().create.push_back(result);
        }

        /// Queue a result for the next task or container submission.
        pub fn push_submit(&self, result: Result<SubmitStateChangeResponse>) {
            self.script.lock().submit.push_back(result);
        }

        /// Queue a poll endpoint discovery result.
        pub fn push_discover(&self, result: Result<DiscoverPollEndpointResponse>) {
            self.script.lock().discover.push_back(result);
        }

        /// Queue a deregistration result.
        pub fn push_deregister(&self, result: Result<DeregisterContainerInstanceResponse>) {
            self.script.lock().deregister.push_back(result);
        }

        /// All calls made so far, in order.
        #[must_use]
        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().clone()
        }

        /// Number of calls made for one operation.
        #[must_use]
        pub fn count(&self, operation: Operation) -> usize {
            self.calls
                .lock()
                .iter()
                .filter(|c| c.operation() == operation)
                .count()
        }

        /// Operations invoked so far, in order.
        #[must_use]
        pub fn operations(&self) -> Vec<Operation> {
            self.calls.lock().iter().map(RecordedCall::operation).collect()
        }

        fn record(&self, call: RecordedCall) {
            self.calls.lock().push(call);
        }
    }

    #[async_trait]
    impl EcsChannel for MockEcsChannel {
        async fn create_cluster(
            &self,
            request: CreateClusterRequest,
        ) -> Result<CreateClusterResponse> {
            let name = request.cluster_name.clone();
            self.record(RecordedCall::CreateCluster(request));
            self.script.lock().create.pop_front().unwrap_or_else(|| {
                Ok(CreateClusterResponse {
                    cluster: Some(Cluster {
                        cluster_arn: Some(format!("arn:aws:ecs:us-east-1:000000000000:cluster/{name}")),
                        cluster_name: Some(name),
                        status: Some("ACTIVE".to_string()),
                    }),
                })
            })
        }

        async fn describe_clusters(
            &self,
            request: DescribeClustersRequest,
        ) -> Result<DescribeClustersResponse> {
            self.record(RecordedCall::DescribeClusters(request));
            self.script
                .lock()
                .describe
                .pop_front()
                .unwrap_or_else(|| Ok(DescribeClustersResponse::default()))
        }

        async fn register_container_instance(
            &self,
            request: RegisterContainerInstanceRequest,
        ) -> Result<RegisterContainerInstanceResponse> {
            self.record(RecordedCall::RegisterContainerInstance(request));
            self.script.lock().register.pop_front().unwrap_or_else(|| {
                Ok(RegisterContainerInstanceResponse {
                    container_instance: Some(ContainerInstance {
                        container_instance_arn: Some(
                            "arn:aws:ecs:us-east-1:000000000000:container-instance/mock".to_string(),
                        ),
                        status: Some("ACTIVE".to_string()),
                    }),
                })
            })
        }

        async fn submit_task_state_change(
            &self,
            request: SubmitTaskStateChangeRequest,
        ) -> Result<SubmitStateChangeResponse> {
            self.record(RecordedCall::SubmitTaskStateChange(request));
            self.script
                .lock()
                .submit
                .pop_front()
                .unwrap_or_else(|| Ok(SubmitStateChangeResponse::default()))
        }

        async fn submit_container_state_change(
            &self,
            request: SubmitContainerStateChangeRequest,
        ) -> Result<SubmitStateChangeResponse> {
            self.record(RecordedCall::SubmitContainerStateChange(request));
            self.script
                .lock()
                .submit
                .pop_front()
                .unwrap_or_else(|| Ok(SubmitStateChangeResponse::default()))
        }

        async fn discover_poll_endpoint(
            &self,
            request: DiscoverPollEndpointRequest,
        ) -> Result<DiscoverPollEndpointResponse> {
            self.record(RecordedCall::DiscoverPollEndpoint(request));
            self.script.lock().discover.pop_front().unwrap_or_else(|| {
                Ok(DiscoverPollEndpointResponse {
                    endpoint: Some("https://poll.mock.local/".to_string()),
                })
            })
        }

        async fn deregister_container_instance(
            &self,
            request: DeregisterContainerInstanceRequest,
        ) -> Result<DeregisterContainerInstanceResponse> {
            self.record(RecordedCall::DeregisterContainerInstance(request));
            self.script
                .lock()
                .deregister
                .pop_front()
                .unwrap_or_else(|| Ok(DeregisterContainerInstanceResponse::default()))
        }
    }
}
