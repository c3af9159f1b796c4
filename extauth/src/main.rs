mod admin;
mod cli;
mod shutdown;
mod wiring;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use extauth_config::secrets::DefaultSecretResolver;
use extauth_core::{Manager, Policy};
use extauth_grpc::proto::authorization_server::AuthorizationServer;
use extauth_grpc::AuthorizationGrpcService;
use extauth_metrics::{Instrumentation, PrometheusInstrumentation};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = cli::Cli::parse();

    let config: extauth_config::Config =
        extauth_config::loader::load_file(&cli.config, &DefaultSecretResolver)?;

    let instrumentation: Arc<dyn Instrumentation> = Arc::new(PrometheusInstrumentation::init(Some("extauth")));
    let prometheus = Arc::new(PrometheusInstrumentation::init(Some("extauth")));

    let built = wiring::build_controllers(&config, instrumentation.clone()).await?;

    let policy = Policy::compile(&config.authorization_policy, &built.match_names)?;

    let analysis_for_health = Arc::new(built.analysis.clone());
    let matchers_for_health = Arc::new(built.matchers.clone());

    let manager = Arc::new(
        Manager::new(built.analysis, built.matchers, policy, instrumentation)
            .with_policy_bypass(config.authorization_policy_bypass),
    );

    let grpc_service = AuthorizationGrpcService::new(manager);
    let grpc_addr: std::net::SocketAddr = cli.grpc_addr.parse()?;

    let admin_state = admin::AdminState {
        metrics: prometheus,
        analysis: analysis_for_health,
        matchers: matchers_for_health,
    };
    let admin_router = admin::router(admin_state);
    let admin_listener = tokio::net::TcpListener::bind(&cli.admin_addr).await?;

    tracing::info!(grpc_addr = %grpc_addr, admin_addr = %cli.admin_addr, "extauth starting");

    let grpc_server = tonic::transport::Server::builder()
        .add_service(AuthorizationServer::new(grpc_service))
        .serve_with_shutdown(grpc_addr, shutdown::signal());

    let admin_server = axum::serve(admin_listener, admin_router).with_graceful_shutdown(shutdown::signal());

    tokio::try_join!(
        async { grpc_server.await.map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>) },
        async { admin_server.await.map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>) },
    )?;

    tracing::info!("extauth stopped");
    Ok(())
}
