use signalfx_provider::{init_logging, serve, SignalFxProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging();
    serve(SignalFxProvider::new()).await
}
