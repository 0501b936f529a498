//! End-to-end tests of `ApiEcsClient` over HTTP.

use std::sync::Arc;
use std::time::Duration;

use keel_core::{ClusterRef, ContainerInstanceArn, TaskArn};
use keel_ecs::{
    ApiEcsClient, ContainerStateChange, ContainerStatus, Credentials, EcsClient, FixedProbe,
    HttpEcsChannel, PortBinding, RegistrationError, StateChangeError, StaticCredentialProvider,
    Submission, TaskStateChange, TaskStatus, UnsignedRequests,
};
use keel_metadata::HttpMetadataClient;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEFAULT_ARN: &str = "arn:aws:ecs:us-east-1:123456789012:cluster/default";
const INSTANCE_ARN: &str = "arn:aws:ecs:us-east-1:123456789012:container-instance/0f5b";

fn target(operation: &str) -> String {
    format!("AmazonEC2ContainerServiceV20141113.{operation}")
}

fn client(server: &MockServer) -> ApiEcsClient {
    let credentials = Arc::new(StaticCredentialProvider::new(Credentials::new(
        "AKID", "secret",
    )));
    let channel = HttpEcsChannel::new(
        server.uri(),
        "us-east-1",
        Duration::from_secs(5),
        false,
        credentials.clone(),
        Arc::new(UnsignedRequests),
    );

    ApiEcsClient::with_parts(
        Arc::new(channel),
        credentials,
        Arc::new(HttpMetadataClient::new(server.uri())),
        Arc::new(FixedProbe {
            cpu_count: 4,
            memory_mb: Some(15_000),
        }),
        vec![22, 2375, 2376, 51678],
    )
}

async fn mount_identity(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/dynamic/instance-identity/document"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"instanceId":"i-0abc"}"#))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dynamic/instance-identity/signature"))
        .respond_with(ResponseTemplate::new(200).set_body_string("c2lnbmF0dXJl"))
        .mount(server)
        .await;
}

fn client_exception(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "__type": "com.amazonaws.ecs.v20141113#ClientException",
        "message": message,
    }))
}

fn registered() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "containerInstance": {
            "containerInstanceArn": INSTANCE_ARN,
            "status": "ACTIVE",
        }
    }))
}

#[tokio::test]
async fn bootstraps_missing_default_cluster() {
    let server = MockServer::start().await;
    mount_identity(&server).await;

    // First registration fails because the cluster does not exist yet.
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("RegisterContainerInstance").as_str()))
        .respond_with(client_exception("Cluster not found."))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("DescribeClusters").as_str()))
        .and(body_partial_json(json!({"clusters": ["default"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clusters": [],
            "failures": [{"arn": DEFAULT_ARN, "reason": "MISSING"}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("CreateCluster").as_str()))
        .and(body_partial_json(json!({"clusterName": "default"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cluster": {"clusterArn": DEFAULT_ARN, "clusterName": "default", "status": "ACTIVE"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("RegisterContainerInstance").as_str()))
        .and(body_partial_json(json!({
            "cluster": "default",
            "instanceIdentityDocument": r#"{"instanceId":"i-0abc"}"#,
            "instanceIdentityDocumentSignature": "c2lnbmF0dXJl",
            "totalResources": [
                {"name": "CPU", "type": "INTEGER", "integerValue": 4096},
                {"name": "MEMORY", "type": "INTEGER", "integerValue": 15000},
                {"name": "PORTS", "type": "STRINGSET", "stringSetValue": ["22", "2375", "2376", "51678"]},
            ],
        })))
        .respond_with(registered())
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    let registration = client(&server)
        .register_container_instance(None)
        .await
        .unwrap();

    assert_eq!(registration.cluster.as_str(), "default");
    assert_eq!(registration.container_instance_arn.as_str(), INSTANCE_ARN);
}

#[tokio::test]
async fn inactive_default_cluster_is_never_recreated() {
    let server = MockServer::start().await;
    mount_identity(&server).await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("RegisterContainerInstance").as_str()))
        .respond_with(client_exception("Cluster is inactive."))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("DescribeClusters").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clusters": [{"clusterArn": DEFAULT_ARN, "clusterName": "default", "status": "INACTIVE"}],
            "failures": [],
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("CreateCluster").as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server)
        .register_container_instance(None)
        .await
        .unwrap_err();

    assert!(matches!(err, RegistrationError::ClusterInactive { .. }));
    assert!(!err.is_retriable());
}

#[tokio::test]
async fn configured_cluster_registers_without_metadata() {
    let server = MockServer::start().await;
    // No metadata mocks: identity lookups get 404 and are skipped.

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("RegisterContainerInstance").as_str()))
        .and(body_partial_json(json!({
            "cluster": "prod",
            "instanceIdentityDocument": "",
            "instanceIdentityDocumentSignature": "",
        })))
        .respond_with(registered())
        .expect(1)
        .mount(&server)
        .await;

    let cluster = ClusterRef::new("prod").unwrap();
    let registration = client(&server)
        .register_container_instance(Some(&cluster))
        .await
        .unwrap();
    assert_eq!(registration.cluster, cluster);
}

#[tokio::test]
async fn state_changes_are_posted_with_translated_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("SubmitTaskStateChange").as_str()))
        .and(body_partial_json(json!({
            "cluster": "prod",
            "task": "arn:aws:ecs:us-east-1:123456789012:task/t1",
            "status": "STOPPED",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledgment": "ACK"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("SubmitContainerStateChange").as_str()))
        .and(body_partial_json(json!({
            "containerName": "web",
            "status": "RUNNING",
            "networkBindings": [{"bindIP": "0.0.0.0", "hostPort": 8080, "containerPort": 80}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledgment": "ACK"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let cluster = ClusterRef::new("prod").unwrap();
    let task_arn = TaskArn::new("arn:aws:ecs:us-east-1:123456789012:task/t1").unwrap();

    let outcome = client
        .submit_task_state_change(
            &cluster,
            &TaskStateChange {
                task_arn: task_arn.clone(),
                status: TaskStatus::Dead,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome, Submission::Submitted);

    let outcome = client
        .submit_container_state_change(
            &cluster,
            &ContainerStateChange {
                task_arn: task_arn.clone(),
                container_name: "web".to_string(),
                status: ContainerStatus::Running,
                exit_code: None,
                port_bindings: vec![PortBinding {
                    bind_ip: "0.0.0.0".to_string(),
                    host_port: 8080,
                    container_port: 80,
                }],
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome, Submission::Submitted);

    let outcome = client
        .submit_task_state_change(
            &cluster,
            &TaskStateChange {
                task_arn,
                status: TaskStatus::Pulled,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome, Submission::Ignored { status: "PULLED" });
}

#[tokio::test]
async fn throttled_submission_is_retriable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "ThrottlingException",
            "message": "Rate exceeded",
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .submit_task_state_change(
            &ClusterRef::new("prod").unwrap(),
            &TaskStateChange {
                task_arn: TaskArn::new("arn:task").unwrap(),
                status: TaskStatus::Running,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StateChangeError::Submission(_)));
    assert!(err.is_retriable());
}

#[tokio::test]
async fn discover_and_deregister() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("DiscoverPollEndpoint").as_str()))
        .and(body_partial_json(json!({"cluster": "prod", "containerInstance": INSTANCE_ARN})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "endpoint": "https://ecs-a-1.us-east-1.amazonaws.com/"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("DeregisterContainerInstance").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "containerInstance": {"containerInstanceArn": INSTANCE_ARN, "status": "INACTIVE"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let cluster = ClusterRef::new("prod").unwrap();
    let instance: ContainerInstanceArn = INSTANCE_ARN.parse().unwrap();

    let endpoint = client
        .discover_poll_endpoint(&cluster, &instance)
        .await
        .unwrap();
    assert_eq!(endpoint, "https://ecs-a-1.us-east-1.amazonaws.com/");

    client
        .deregister_container_instance(&cluster, &instance)
        .await
        .unwrap();
}
