//! Drives the provider through a real gRPC server on a loopback port.

use std::time::Duration;

use serde_json::{json, Value};
use signalfx_provider::generated::provider_client::ProviderClient;
use signalfx_provider::generated::{
    ConfigureRequest, GetMetadataRequest, GetSchemaRequest, PlanRequest, ReadRequest, StopRequest,
    ValidateResourceConfigRequest,
};
use signalfx_provider::{serve_with_shutdown, CredentialSources, ServeOptions, SignalFxProvider};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Channel;

struct Harness {
    client: ProviderClient<Channel>,
    shutdown: oneshot::Sender<()>,
    server: tokio::task::JoinHandle<()>,
}

async fn start() -> Harness {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown, signal) = oneshot::channel::<()>();

    let provider = SignalFxProvider::new().with_credential_sources(CredentialSources::none());
    let server = tokio::spawn(async move {
        let options = ServeOptions::default().with_shutdown_timeout(Duration::from_secs(5));
        serve_with_shutdown(provider, listener, options, async {
            let _ = signal.await;
        })
        .await
        .unwrap();
    });

    let client = ProviderClient::connect(format!("http://{}", addr)).await.unwrap();
    Harness { client, shutdown, server }
}

impl Harness {
    async fn stop(self) {
        let _ = self.shutdown.send(());
        self.server.await.unwrap();
    }
}

fn bytes(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

#[tokio::test]
async fn metadata_and_schema() {
    let mut h = start().await;

    let metadata = h.client.get_metadata(GetMetadataRequest {}).await.unwrap().into_inner();
    assert_eq!(metadata.resources.len(), 13);
    assert!(metadata.resources.contains(&"signalfx_dashboard_group".to_string()));
    assert_eq!(metadata.data_sources, vec!["signalfx_dimension_values".to_string()]);
    let mut sorted = metadata.resources.clone();
    sorted.sort();
    assert_eq!(metadata.resources, sorted);

    let schema = h.client.get_schema(GetSchemaRequest {}).await.unwrap().into_inner();
    assert!(schema.provider.is_some());
    let group = &schema.resources["signalfx_dashboard_group"];
    let block = group.block.as_ref().unwrap();
    assert!(block.attributes.iter().any(|a| a.name == "name" && a.required));
    assert!(block.block_types.iter().any(|b| b.type_name == "dashboard"));

    h.stop().await;
}

#[tokio::test]
async fn configure_without_credentials_reports_diagnostic() {
    let mut h = start().await;

    let response = h
        .client
        .configure(ConfigureRequest { config: bytes(json!({})) })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(response.diagnostics[0].summary, "auth_token is required");
    assert_eq!(response.diagnostics[0].attribute, "auth_token");

    let read = h
        .client
        .read(ReadRequest {
            resource_type: "signalfx_dashboard".to_string(),
            current_state: bytes(json!({"id": "D1"})),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(!read.diagnostics.is_empty());

    h.stop().await;
}

#[tokio::test]
async fn validation_errors_travel_as_diagnostics() {
    let mut h = start().await;

    let response = h
        .client
        .validate_resource_config(ValidateResourceConfigRequest {
            resource_type: "signalfx_slo".to_string(),
            config: bytes(json!({"name": "latency", "type": "RequestBased"})),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(!response.diagnostics.is_empty());

    let unknown = h
        .client
        .validate_resource_config(ValidateResourceConfigRequest {
            resource_type: "signalfx_nope".to_string(),
            config: bytes(json!({})),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(unknown.diagnostics.iter().any(|d| d.summary.contains("signalfx_nope")));

    let stop = h.client.stop(StopRequest {}).await.unwrap().into_inner();
    assert!(stop.error.is_empty());

    h.stop().await;
}

#[tokio::test]
async fn malformed_state_is_rejected_not_planned() {
    let mut h = start().await;

    let plan = h
        .client
        .plan(PlanRequest {
            resource_type: "signalfx_dashboard_group".to_string(),
            prior_state: bytes(json!({"id": "G1", "name": "Ops"})),
            proposed_state: b"{not json".to_vec(),
            config: bytes(json!({"name": "Ops"})),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(plan.changes.is_empty());
    assert!(plan.planned_state.is_empty());
    assert_eq!(plan.diagnostics.len(), 1);
    assert!(plan.diagnostics[0].summary.contains("proposed_state is not valid JSON"));

    let config = h
        .client
        .validate_resource_config(ValidateResourceConfigRequest {
            resource_type: "signalfx_dashboard_group".to_string(),
            config: b"[".to_vec(),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(config.diagnostics[0].summary.starts_with("Invalid request: config"));

    h.stop().await;
}
