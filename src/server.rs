//! gRPC plugin server.
//!
//! [`ProviderService`] is the seam between the wire protocol and the
//! provider. [`serve`] binds an ephemeral localhost port, prints the
//! handshake line on stdout and serves until SIGTERM or SIGINT.
//!
//! # Shutdown
//!
//! On a signal the server stops accepting connections and gives in-flight
//! requests up to [`ServeOptions::shutdown_timeout`] to finish. The
//! provider's `stop()` is called either way.
//!
//! # Errors
//!
//! Provider errors never become gRPC status failures. They are returned as
//! error diagnostics in the response so the host can show them next to the
//! resource that failed.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated as pb;
use crate::schema::{has_errors, BlockNestingMode, Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::{handshake_line, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities};

/// Error returned by the serve functions.
pub type ServeError = Box<dyn std::error::Error + Send + Sync>;

/// Operations a provider exposes over the plugin protocol.
///
/// Payloads are plain [`serde_json::Value`]s; the server takes care of the
/// JSON byte encoding used on the wire.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Provider, resource and data source schemas.
    fn schema(&self) -> ProviderSchema;

    /// Type names, sorted, and capabilities. Derived from [`schema`](Self::schema) by default.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.into_keys().collect(),
            data_sources: schema.data_sources.into_keys().collect(),
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    /// Check the provider block before [`configure`](Self::configure).
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Resolve credentials and build the API client.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Release resources before exit.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Check a resource configuration.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Migrate state written by an older schema version. Identity by default.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    /// Compute the planned state and changes.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create an object from the planned state.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Refresh state. `Value::Null` means the object is gone.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Update an object in place.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete an object.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Bring an existing object under management.
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let _ = id;
        Err(ProviderError::Unimplemented(format!(
            "{} does not support import",
            resource_type
        )))
    }

    /// Check a data source configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    /// Run a data source lookup.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let _ = config;
        Err(ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

/// Empty bytes decode as `null`; anything else must be JSON.
fn decode(field: &str, bytes: &[u8]) -> Result<Value, ProviderError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
        .map_err(|e| ProviderError::InvalidRequest(format!("{} is not valid JSON: {}", field, e)))
}

fn encode(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

fn diagnostic_to_proto(d: Diagnostic) -> pb::Diagnostic {
    let severity = match d.severity {
        DiagnosticSeverity::Error => pb::diagnostic::Severity::Error,
        DiagnosticSeverity::Warning => pb::diagnostic::Severity::Warning,
    };
    pb::Diagnostic {
        severity: severity as i32,
        summary: d.summary,
        detail: d.detail.unwrap_or_default(),
        attribute: d.attribute.unwrap_or_default(),
    }
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<pb::Diagnostic> {
    diagnostics.into_iter().map(diagnostic_to_proto).collect()
}

fn error_diagnostics(err: &ProviderError) -> Vec<pb::Diagnostic> {
    vec![pb::Diagnostic {
        severity: pb::diagnostic::Severity::Error as i32,
        summary: err.to_string(),
        detail: String::new(),
        attribute: String::new(),
    }]
}

/// Log the outcome of a validation-style call and convert it.
fn checked(operation: &str, result: Result<Vec<Diagnostic>, ProviderError>) -> Vec<pb::Diagnostic> {
    match result {
        Ok(diagnostics) if has_errors(&diagnostics) => {
            warn!(diagnostics = diagnostics.len(), "{} reported errors", operation);
            diagnostics_to_proto(diagnostics)
        },
        Ok(diagnostics) => {
            debug!("{} passed", operation);
            diagnostics_to_proto(diagnostics)
        },
        Err(e) => {
            error!(error = %e, "{} failed", operation);
            error_diagnostics(&e)
        },
    }
}

/// Log a failed state-changing call and convert it.
fn failed(operation: &str, resource_type: &str, err: ProviderError) -> Vec<pb::Diagnostic> {
    error!(resource_type, error = %err, "{} failed", operation);
    error_diagnostics(&err)
}

fn schema_to_proto(schema: &crate::schema::Schema) -> pb::Schema {
    pb::Schema {
        version: schema.version as i64,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &crate::schema::Block) -> pb::Block {
    let attributes = block
        .attributes
        .iter()
        .map(|(name, attr)| pb::Attribute {
            name: name.clone(),
            r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
            required: attr.flags.required,
            optional: attr.flags.optional,
            computed: attr.flags.computed,
            sensitive: attr.flags.sensitive,
            description: attr.description.clone().unwrap_or_default(),
            force_new: attr.force_new,
            default_value: attr.default.as_ref().map(encode).unwrap_or_default(),
        })
        .collect();

    let block_types = block
        .blocks
        .iter()
        .map(|(name, nested)| {
            let mode = match nested.nesting_mode {
                BlockNestingMode::Single => pb::nested_block::NestingMode::Single,
                BlockNestingMode::List => pb::nested_block::NestingMode::List,
                BlockNestingMode::Set => pb::nested_block::NestingMode::Set,
                BlockNestingMode::Map => pb::nested_block::NestingMode::Map,
            };
            pb::NestedBlock {
                type_name: name.clone(),
                block: Some(block_to_proto(&nested.block)),
                nesting_mode: mode as i32,
                min_items: nested.min_items as i32,
                max_items: nested.max_items as i32,
            }
        })
        .collect();

    pb::Block {
        attributes,
        block_types,
        description: block.description.clone().unwrap_or_default(),
    }
}

/// Adapts a [`ProviderService`] to the generated gRPC trait.
struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

#[tonic::async_trait]
impl<P: ProviderService> pb::provider_server::Provider for ProviderGrpcService<P> {
    #[instrument(skip_all, name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: Request<pb::GetMetadataRequest>,
    ) -> Result<Response<pb::GetMetadataResponse>, Status> {
        let metadata = self.provider.metadata();
        debug!(
            resources = metadata.resources.len(),
            data_sources = metadata.data_sources.len(),
            "GetMetadata"
        );
        Ok(Response::new(pb::GetMetadataResponse {
            server_capabilities: Some(pb::ServerCapabilities {
                plan_destroy: metadata.capabilities.plan_destroy,
            }),
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            diagnostics: vec![],
        }))
    }

    #[instrument(skip_all, name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: Request<pb::GetSchemaRequest>,
    ) -> Result<Response<pb::GetSchemaResponse>, Status> {
        let schema = self.provider.schema();
        debug!(
            resources = schema.resources.len(),
            data_sources = schema.data_sources.len(),
            "GetSchema"
        );
        let map = |schemas: &BTreeMap<String, crate::schema::Schema>| -> HashMap<String, pb::Schema> {
            schemas
                .iter()
                .map(|(name, s)| (name.clone(), schema_to_proto(s)))
                .collect()
        };
        Ok(Response::new(pb::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: map(&schema.resources),
            data_sources: map(&schema.data_sources),
            diagnostics: vec![],
        }))
    }

    #[instrument(skip_all, name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: Request<pb::ValidateProviderConfigRequest>,
    ) -> Result<Response<pb::ValidateProviderConfigResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let config = decode("config", &req.config)?;
            self.provider.validate_provider_config(config).await
        }
        .await;
        Ok(Response::new(pb::ValidateProviderConfigResponse {
            diagnostics: checked("ValidateProviderConfig", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.configure")]
    async fn configure(
        &self,
        request: Request<pb::ConfigureRequest>,
    ) -> Result<Response<pb::ConfigureResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let config = decode("config", &req.config)?;
            self.provider.configure(config).await
        }
        .await;
        if matches!(&result, Ok(d) if !has_errors(d)) {
            info!("Provider configured");
        }
        Ok(Response::new(pb::ConfigureResponse {
            diagnostics: checked("Configure", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.stop")]
    async fn stop(&self, _request: Request<pb::StopRequest>) -> Result<Response<pb::StopResponse>, Status> {
        info!("Stop requested");
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(e) => {
                error!(error = %e, "Stop failed");
                e.to_string()
            },
        };
        Ok(Response::new(pb::StopResponse { error }))
    }

    #[instrument(skip_all, name = "grpc.validate_resource_config", fields(resource_type))]
    async fn validate_resource_config(
        &self,
        request: Request<pb::ValidateResourceConfigRequest>,
    ) -> Result<Response<pb::ValidateResourceConfigResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let result = async {
            let config = decode("config", &req.config)?;
            self.provider.validate_resource_config(&req.resource_type, config).await
        }
        .await;
        Ok(Response::new(pb::ValidateResourceConfigResponse {
            diagnostics: checked("ValidateResourceConfig", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.upgrade_resource_state", fields(resource_type))]
    async fn upgrade_resource_state(
        &self,
        request: Request<pb::UpgradeResourceStateRequest>,
    ) -> Result<Response<pb::UpgradeResourceStateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let result = async {
            let raw_state = decode("raw_state", &req.raw_state)?;
            self.provider
                .upgrade_resource_state(&req.resource_type, req.version, raw_state)
                .await
        }
        .await;
        let response = match result {
            Ok(upgraded) => pb::UpgradeResourceStateResponse {
                upgraded_state: encode(&upgraded),
                diagnostics: vec![],
            },
            Err(e) => pb::UpgradeResourceStateResponse {
                upgraded_state: vec![],
                diagnostics: failed("UpgradeResourceState", &req.resource_type, e),
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.plan", fields(resource_type))]
    async fn plan(&self, request: Request<pb::PlanRequest>) -> Result<Response<pb::PlanResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let result = async {
            let prior = Some(decode("prior_state", &req.prior_state)?).filter(|v| !v.is_null());
            let proposed = decode("proposed_state", &req.proposed_state)?;
            let config = decode("config", &req.config)?;
            self.provider.plan(&req.resource_type, prior, proposed, config).await
        }
        .await;

        let response = match result {
            Ok(result) => {
                debug!(
                    changes = result.changes.len(),
                    requires_replace = result.requires_replace,
                    "Plan computed"
                );
                pb::PlanResponse {
                    planned_state: encode(&result.planned_state),
                    changes: result.changes.into_iter().map(Into::into).collect(),
                    requires_replace: result.requires_replace,
                    diagnostics: vec![],
                }
            },
            Err(e) => pb::PlanResponse {
                planned_state: vec![],
                changes: vec![],
                requires_replace: false,
                diagnostics: failed("Plan", &req.resource_type, e),
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.create", fields(resource_type))]
    async fn create(&self, request: Request<pb::CreateRequest>) -> Result<Response<pb::CreateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let result = async {
            let planned = decode("planned_state", &req.planned_state)?;
            self.provider.create(&req.resource_type, planned).await
        }
        .await;
        let response = match result {
            Ok(state) => {
                info!(id = %state["id"], "Created");
                pb::CreateResponse {
                    state: encode(&state),
                    diagnostics: vec![],
                }
            },
            Err(e) => pb::CreateResponse {
                state: vec![],
                diagnostics: failed("Create", &req.resource_type, e),
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.read", fields(resource_type))]
    async fn read(&self, request: Request<pb::ReadRequest>) -> Result<Response<pb::ReadResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let result = async {
            let current = decode("current_state", &req.current_state)?;
            self.provider.read(&req.resource_type, current).await
        }
        .await;
        let response = match result {
            Ok(state) => pb::ReadResponse {
                state: encode(&state),
                diagnostics: vec![],
            },
            Err(e) => pb::ReadResponse {
                state: vec![],
                diagnostics: failed("Read", &req.resource_type, e),
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.update", fields(resource_type))]
    async fn update(&self, request: Request<pb::UpdateRequest>) -> Result<Response<pb::UpdateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let result = async {
            let prior = decode("prior_state", &req.prior_state)?;
            let planned = decode("planned_state", &req.planned_state)?;
            self.provider.update(&req.resource_type, prior, planned).await
        }
        .await;
        let response = match result {
            Ok(state) => {
                info!(id = %state["id"], "Updated");
                pb::UpdateResponse {
                    state: encode(&state),
                    diagnostics: vec![],
                }
            },
            Err(e) => pb::UpdateResponse {
                state: vec![],
                diagnostics: failed("Update", &req.resource_type, e),
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.delete", fields(resource_type))]
    async fn delete(&self, request: Request<pb::DeleteRequest>) -> Result<Response<pb::DeleteResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let result = async {
            let current = decode("current_state", &req.current_state)?;
            self.provider.delete(&req.resource_type, current).await
        }
        .await;
        let diagnostics = match result {
            Ok(()) => {
                info!("Deleted");
                vec![]
            },
            Err(e) => failed("Delete", &req.resource_type, e),
        };
        Ok(Response::new(pb::DeleteResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.import_resource_state", fields(resource_type, id))]
    async fn import_resource_state(
        &self,
        request: Request<pb::ImportResourceStateRequest>,
    ) -> Result<Response<pb::ImportResourceStateResponse>, Status> {
        let req = request.into_inner();
        let span = tracing::Span::current();
        span.record("resource_type", req.resource_type.as_str());
        span.record("id", req.id.as_str());

        let response = match self.provider.import_resource(&req.resource_type, &req.id).await {
            Ok(imported) => {
                info!(count = imported.len(), "Imported");
                pb::ImportResourceStateResponse {
                    imported: imported
                        .into_iter()
                        .map(|r| pb::ImportedResource {
                            state: encode(&r.state),
                            resource_type: r.resource_type,
                        })
                        .collect(),
                    diagnostics: vec![],
                }
            },
            Err(e) => pb::ImportResourceStateResponse {
                imported: vec![],
                diagnostics: failed("ImportResourceState", &req.resource_type, e),
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.validate_data_source_config", fields(data_source_type))]
    async fn validate_data_source_config(
        &self,
        request: Request<pb::ValidateDataSourceConfigRequest>,
    ) -> Result<Response<pb::ValidateDataSourceConfigResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("data_source_type", req.data_source_type.as_str());
        let result = async {
            let config = decode("config", &req.config)?;
            self.provider.validate_data_source_config(&req.data_source_type, config).await
        }
        .await;
        Ok(Response::new(pb::ValidateDataSourceConfigResponse {
            diagnostics: checked("ValidateDataSourceConfig", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.read_data_source", fields(data_source_type))]
    async fn read_data_source(
        &self,
        request: Request<pb::ReadDataSourceRequest>,
    ) -> Result<Response<pb::ReadDataSourceResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("data_source_type", req.data_source_type.as_str());
        let result = async {
            let config = decode("config", &req.config)?;
            self.provider.read_data_source(&req.data_source_type, config).await
        }
        .await;
        let response = match result {
            Ok(state) => pb::ReadDataSourceResponse {
                state: encode(&state),
                diagnostics: vec![],
            },
            Err(e) => pb::ReadDataSourceResponse {
                state: vec![],
                diagnostics: failed("ReadDataSource", &req.data_source_type, e),
            },
        };
        Ok(Response::new(response))
    }
}

/// Options for [`serve_with_options`].
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long in-flight requests may run after a shutdown signal.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Resolve on SIGTERM or SIGINT (CTRL+C on Windows).
///
/// If the handlers cannot be installed the server keeps running without
/// signal handling.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let handlers = signal(SignalKind::terminate()).and_then(|term| Ok((term, signal(SignalKind::interrupt())?)));
        match handlers {
            Ok((mut sigterm, mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                    _ = sigint.recv() => info!("Received SIGINT, shutting down"),
                }
            },
            Err(e) => {
                error!(error = %e, "Failed to install signal handlers");
                std::future::pending::<()>().await;
            },
        }
    }

    #[cfg(windows)]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received CTRL+C, shutting down"),
            Err(e) => {
                error!(error = %e, "Failed to install CTRL+C handler");
                std::future::pending::<()>().await;
            },
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        std::future::pending::<()>().await;
    }
}

/// Serve `provider` on an ephemeral localhost port until a shutdown signal.
///
/// Prints `PROVIDER_PLUGIN|<version>|<address>` on stdout once listening.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), ServeError> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// Like [`serve`], with custom [`ServeOptions`].
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), ServeError> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    serve_with_shutdown(provider, listener, options, wait_for_shutdown_signal()).await
}

/// Serve on a fixed address until a shutdown signal.
pub async fn serve_on<P: ProviderService>(provider: P, addr: SocketAddr) -> Result<(), ServeError> {
    let listener = TcpListener::bind(addr).await?;
    serve_with_shutdown(provider, listener, ServeOptions::default(), wait_for_shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// The shutdown timeout starts when `shutdown` resolves, not before.
pub async fn serve_with_shutdown<P, F>(
    provider: P,
    listener: TcpListener,
    options: ServeOptions,
    shutdown: F,
) -> Result<(), ServeError>
where
    P: ProviderService,
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    println!("{}", handshake_line(&addr));
    info!(address = %addr, "Provider server listening");

    let provider = Arc::new(provider);
    let service = pb::provider_server::ProviderServer::new(ProviderGrpcService {
        provider: Arc::clone(&provider),
    });

    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = Server::builder().add_service(service).serve_with_incoming_shutdown(
        tokio_stream::wrappers::TcpListenerStream::new(listener),
        async move {
            shutdown.await;
            let _ = signalled_tx.send(());
        },
    );
    tokio::pin!(server);

    tokio::select! {
        biased;
        result = &mut server => result?,
        _ = signalled_rx => {
            match tokio::time::timeout(options.shutdown_timeout, &mut server).await {
                Ok(result) => result?,
                Err(_) => warn!(
                    timeout = ?options.shutdown_timeout,
                    "In-flight requests did not finish in time, forcing shutdown"
                ),
            }
        },
    }

    if let Err(e) = provider.stop().await {
        warn!(error = %e, "Provider stop failed");
    }
    info!("Provider server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Block, NestedBlock, Schema};
    use serde_json::json;

    #[test]
    fn empty_payload_decodes_as_null() {
        assert_eq!(decode("current_state", b"").unwrap(), Value::Null);
        assert_eq!(decode("current_state", br#"{"id":"A"}"#).unwrap(), json!({"id": "A"}));
        assert_eq!(encode(&Value::Null), b"null".to_vec());
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let err = decode("proposed_state", b"not json").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(err.message().starts_with("proposed_state is not valid JSON"));
    }

    #[test]
    fn blocks_convert_in_name_order() {
        let schema = Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("charts_resolution", Attribute::optional_string().with_default(json!("default")))
            .with_block(
                "chart",
                NestedBlock::list(Block::new().with_attribute("chart_id", Attribute::required_string())),
            );

        let proto = schema_to_proto(&schema);
        let block = proto.block.unwrap();
        let names: Vec<_> = block.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["charts_resolution", "id", "name"]);
        assert_eq!(block.attributes[0].default_value, b"\"default\"".to_vec());
        assert_eq!(block.block_types[0].type_name, "chart");
        assert_eq!(
            block.block_types[0].nesting_mode,
            pb::nested_block::NestingMode::List as i32
        );
    }

    #[test]
    fn errors_become_error_diagnostics() {
        let diags = error_diagnostics(&ProviderError::NotFound("dashboard D1".to_string()));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, pb::diagnostic::Severity::Error as i32);
        assert_eq!(diags[0].summary, "Resource not found: dashboard D1");

        let converted = checked(
            "Validate",
            Ok(vec![Diagnostic::warning("deprecated").with_attribute("api_url")]),
        );
        assert_eq!(converted[0].severity, pb::diagnostic::Severity::Warning as i32);
        assert_eq!(converted[0].attribute, "api_url");
    }
}
