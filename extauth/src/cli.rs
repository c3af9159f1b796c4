use clap::Parser;

/// External authorization service for sidecar proxies.
#[derive(Parser, Debug)]
#[command(name = "extauth", version, about = "Envoy-style ext_authz Check service")]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, env = "EXTAUTH_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Address the gRPC `Authorization/Check` service listens on.
    #[arg(long, env = "EXTAUTH_GRPC_ADDR", default_value = "0.0.0.0:50051")]
    pub grpc_addr: String,

    /// Address the `/metrics` and `/health*` HTTP endpoints listen on.
    #[arg(long, env = "EXTAUTH_ADMIN_ADDR", default_value = "0.0.0.0:9000")]
    pub admin_addr: String,
}
