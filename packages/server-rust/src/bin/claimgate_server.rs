//! claimgate gateway server.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context as _;
use axum::http::StatusCode;
use clap::Parser;
use claimgate_core::LoginScope;
use claimgate_server::{AuthConfig, GatewayConfig, NetworkModule};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Extracts request context from inbound tokens and re-signs it for
/// downstream services.
#[derive(Parser, Debug)]
#[command(name = "claimgate-server", version, about, long_about = None)]
struct Args {
    /// Bind address
    #[arg(long, env = "CLAIMGATE_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Listen port (0 picks a free one)
    #[arg(long, env = "CLAIMGATE_PORT", default_value_t = 8080)]
    port: u16,

    /// Allowed CORS origins, comma separated
    #[arg(long, env = "CLAIMGATE_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    cors_origins: Vec<String>,

    /// Request timeout in seconds
    #[arg(long, env = "CLAIMGATE_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    /// RSA private key (PKCS8 PEM or bare base64) used to re-sign tokens
    #[arg(long, env = "INTERNAL_JWT_PRIVATE_KEY", hide_env_values = true)]
    signing_key: Option<String>,

    /// Status returned when a login scope is not allowed
    #[arg(long, env = "CLAIMGATE_FORBIDDEN_STATUS", default_value_t = 403)]
    forbidden_status: u16,

    /// Skip exp/iat/nbf checks on inbound tokens
    #[arg(long, env = "CLAIMGATE_SKIP_CLAIMS_VALIDATION")]
    skip_claims_validation: bool,

    /// Login scopes allowed to request an internal token, comma separated
    #[arg(
        long,
        env = "CLAIMGATE_INTERNAL_TOKEN_SCOPES",
        value_delimiter = ',',
        default_value = "pin,biometric"
    )]
    internal_token_scopes: Vec<LoginScope>,

    /// Address for the Prometheus scrape endpoint; metrics are off without it
    #[arg(long, env = "CLAIMGATE_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    /// Emit logs as JSON
    #[arg(long, env = "CLAIMGATE_LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<GatewayConfig> {
        let forbidden_status = StatusCode::from_u16(self.forbidden_status)
            .with_context(|| format!("invalid forbidden status {}", self.forbidden_status))?;

        Ok(GatewayConfig {
            host: self.host,
            port: self.port,
            cors_origins: self.cors_origins,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            auth: AuthConfig {
                signing_key: self.signing_key,
                forbidden_status,
                validate_claims: !self.skip_claims_validation,
                internal_token_scopes: self.internal_token_scopes,
            },
        })
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    if let Some(addr) = args.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(%addr, "metrics endpoint listening");
    }

    let config = args.into_config()?;
    info!(?config, "starting claimgate server");

    let mut module = NetworkModule::new(config);
    module.start().await?;
    module
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await
}
