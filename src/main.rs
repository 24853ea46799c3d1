//! Reservation gateway binary entry point.

use reservation_gateway::admission::AdmissionGate;
use reservation_gateway::breaker::CircuitBreaker;
use reservation_gateway::config::{ConfigLoader, LogFormat, LoggingConfig};
use reservation_gateway::discovery::{ServiceResolver, StaticRegistry};
use reservation_gateway::events::{ChannelSink, EventPublisher};
use reservation_gateway::gateway::{DownstreamClient, GatewayDispatcher, GatewayServer};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber from logging configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match config.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "gateway.toml".to_string());

    let config = match ConfigLoader::new().load_or_default(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        },
    };
    init_tracing(&config.logging);
    info!(
        name = %config.gateway.name,
        config = %config_path,
        "starting reservation gateway"
    );

    let registry = Arc::new(StaticRegistry::with_instances(
        config.registry.instances.clone(),
    ));
    info!(
        service = %config.downstream.service,
        instances = registry.instance_count(&config.downstream.service),
        "registry seeded"
    );

    // The write-path hand-off. The drain task stands in for the external
    // broker bridge; payloads it receives have already left the request
    // path.
    let (sink, mut events_rx) = ChannelSink::new(config.events.buffer);
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            info!(topic = %event.topic, payload = %event.payload, "event drained");
        }
    });

    let dispatcher = Arc::new(GatewayDispatcher::new(
        AdmissionGate::new(config.admission.clone()),
        CircuitBreaker::new(config.breaker),
        ServiceResolver::new(registry),
        DownstreamClient::new(&config.downstream),
        EventPublisher::new(Box::new(sink), config.events.topic.clone()),
        config.downstream.service.clone(),
        config.downstream.fallback_message.clone(),
    ));

    let server = match GatewayServer::bind(config.gateway.socket_addr(), dispatcher).await {
        Ok(server) => server,
        Err(e) => {
            error!(addr = %config.gateway.socket_addr(), error = %e, "failed to bind");
            return ExitCode::FAILURE;
        },
    };

    server.run().await;
    ExitCode::SUCCESS
}
