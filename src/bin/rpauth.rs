//! rpauth command-line tool
//!
//! Registers OIDC relying-party clients with the identity provider and prints the
//! URIs a control-plane service hands to its users.
//!
//! ## Usage Examples
//!
//! ```bash
//! # Register an implicit client and print its login and logout URIs
//! rpauth register-implicit \
//!   --login-redirect-uri "https://mgmt.example.com/api/login" \
//!   --logout-redirect-uri "https://mgmt.example.com/api/logout"
//!
//! # Register (or recover) a client for a single redirect URI
//! rpauth register --redirect-uri "https://mgmt.example.com/swagger"
//!
//! # Build the login URI for an already registered client
//! rpauth login-uri --client-id "client_id_here" --redirect-uri "https://mgmt.example.com/api/login"
//!
//! # Redact the identity token from a logout URI (no identity provider needed)
//! rpauth redact-logout-uri "https://idp/openidconnect/logout/t?id_token_hint=abc&state=E"
//! ```
//!
//! ## Environment Variables
//!
//! - `IDP_BASE_URL`: Base URL of the identity provider
//! - `IDP_TENANT`: Tenant clients are registered in
//! - `IDP_ADMIN_USER` / `IDP_ADMIN_PASSWORD`: Administrative account
//! - `HTTP_CLIENT_TIMEOUT`, `CERTIFICATE_BUNDLES`, `USER_AGENT`
//! - `CORRELATION_MODE`, `LOGIN_STATE`, `LOGIN_NONCE`, `LOGOUT_STATE`
//! - `REDACTION_STRATEGY`
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error (configuration, network setup, output)
//! - 2: Client registration error
//! - 3: Request URI error

use clap::{Args, Parser, Subcommand, ValueEnum};
use rpauth::{
    config::{Config, CorrelationMode},
    errors::AuthClientError,
    idp::RestIdentityProvider,
    oauth::{
        ClientRegistrar, CorrelationSource, RandomCorrelation, RedactionStrategy,
        RequestUriBuilder, redact_id_token,
    },
};
use serde::Serialize;
use serde_json::json;
use std::error::Error as _;
use std::process;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use url::Url;

/// Main CLI application structure
#[derive(Parser)]
#[command(
    name = "rpauth",
    about = "OIDC relying-party client registration tool",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, help = "Enable debug logging")]
    verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "json", help = "Output format for results")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format options
#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// JSON formatted output
    Json,
    /// Pretty-printed JSON output
    JsonPretty,
    /// Human-readable table format
    Table,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Register (or recover) a client for a redirect URI
    Register(RegisterArgs),
    /// Register an implicit client and build its login and logout URIs
    RegisterImplicit(RegisterImplicitArgs),
    /// Build the authentication request URI for a registered client
    LoginUri(LoginUriArgs),
    /// Replace the identity token in a logout URI with the placeholder
    RedactLogoutUri(RedactArgs),
}

#[derive(Args)]
struct RegisterArgs {
    #[arg(long)]
    redirect_uri: Url,

    /// Defaults to the redirect URI
    #[arg(long)]
    logout_uri: Option<Url>,

    /// Defaults to the redirect URI
    #[arg(long)]
    post_logout_uri: Option<Url>,
}

#[derive(Args)]
struct RegisterImplicitArgs {
    #[arg(long)]
    login_redirect_uri: Url,

    #[arg(long)]
    logout_redirect_uri: Url,
}

#[derive(Args)]
struct LoginUriArgs {
    #[arg(long)]
    client_id: String,

    #[arg(long)]
    redirect_uri: Url,
}

#[derive(Args)]
struct RedactArgs {
    logout_uri: Url,

    #[arg(long, value_enum, default_value = "literal")]
    strategy: StrategyArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Literal,
    Query,
}

impl From<StrategyArg> for RedactionStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Literal => RedactionStrategy::LiteralReplace,
            StrategyArg::Query => RedactionStrategy::QueryRewrite,
        }
    }
}

/// Application errors
#[derive(Debug)]
enum AppError {
    /// Configuration, HTTP client setup or output errors
    General(anyhow::Error),
    /// Client registration errors
    Registration(AuthClientError),
    /// Request URI construction errors
    RequestUri(AuthClientError),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::General(err) => write!(f, "{:#}", err),
            AppError::Registration(err) | AppError::RequestUri(err) => {
                write!(f, "{}", err)?;
                let mut source = err.source();
                while let Some(cause) = source {
                    write!(f, ": {}", cause)?;
                    source = cause.source();
                }
                Ok(())
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::General(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::General(err.into())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::General(err.into())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::General(err.into())
    }
}

/// Main application entry point
#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "rpauth=debug,info"
    } else {
        "rpauth=info,warn"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match &cli.command {
        Commands::Register(args) => register(&cli, args).await,
        Commands::RegisterImplicit(args) => register_implicit(&cli, args).await,
        Commands::LoginUri(args) => login_uri(&cli, args),
        Commands::RedactLogoutUri(args) => redact(&cli, args),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        let code = match err {
            AppError::General(_) => 1,
            AppError::Registration(_) => 2,
            AppError::RequestUri(_) => 3,
        };
        process::exit(code);
    }
}

/// Build the registrar from the environment configuration
fn build_registrar() -> Result<ClientRegistrar, AppError> {
    let config = Config::new()?;
    tracing::debug!(version = %config.version, tenant = %config.idp_tenant, "loaded configuration");

    let mut client_builder = reqwest::Client::builder();
    for ca_certificate in config.certificate_bundles.as_ref() {
        tracing::info!("Loading CA certificate: {:?}", ca_certificate);
        let cert = std::fs::read(ca_certificate)?;
        let cert = reqwest::Certificate::from_pem(&cert)?;
        client_builder = client_builder.add_root_certificate(cert);
    }
    let http_client = client_builder
        .user_agent(config.user_agent.clone())
        .timeout(*config.http_client_timeout.as_ref())
        .build()?;

    let provider = Arc::new(RestIdentityProvider::new(
        http_client,
        config.idp_base_url.as_ref().clone(),
        config.admin_credentials.clone(),
        config.idp_tenant.clone(),
    ));

    let correlation: Arc<dyn CorrelationSource> = match config.correlation_mode {
        CorrelationMode::Fixed => Arc::new(config.fixed_correlation.clone()),
        CorrelationMode::Random => Arc::new(RandomCorrelation),
    };
    let uri_builder = RequestUriBuilder::new(provider.clone(), config.idp_tenant.clone())
        .with_correlation(correlation)
        .with_redaction(*config.redaction_strategy.as_ref());

    Ok(ClientRegistrar::new(
        provider,
        uri_builder,
        config.admin_credentials,
    ))
}

async fn register(cli: &Cli, args: &RegisterArgs) -> Result<(), AppError> {
    let registrar = build_registrar()?;
    let logout_uri = args.logout_uri.as_ref().unwrap_or(&args.redirect_uri);
    let post_logout_uri = args.post_logout_uri.as_ref().unwrap_or(&args.redirect_uri);

    let client = registrar
        .register_client_with_uris(&args.redirect_uri, logout_uri, post_logout_uri)
        .await
        .map_err(AppError::Registration)?;

    output(
        &cli.format,
        &client,
        &[
            ("client_id", client.client_id.clone()),
            ("redirect_uris", client.metadata.redirect_uris.join(" ")),
            (
                "post_logout_redirect_uris",
                client.metadata.post_logout_redirect_uris.join(" "),
            ),
            (
                "logout_uri",
                client.metadata.logout_uri.clone().unwrap_or_default(),
            ),
        ],
    )
}

async fn register_implicit(cli: &Cli, args: &RegisterImplicitArgs) -> Result<(), AppError> {
    let registrar = build_registrar()?;
    let implicit = registrar
        .register_implicit_client(&args.login_redirect_uri, &args.logout_redirect_uri)
        .await
        .map_err(AppError::Registration)?;

    output(
        &cli.format,
        &implicit,
        &[
            ("client_id", implicit.client_id.clone()),
            ("login_uri", implicit.login_uri.clone()),
            ("logout_uri", implicit.logout_uri.clone()),
        ],
    )
}

fn login_uri(cli: &Cli, args: &LoginUriArgs) -> Result<(), AppError> {
    let registrar = build_registrar()?;
    let uri = registrar
        .uri_builder()
        .build_authentication_request_uri(&args.client_id, &args.redirect_uri)
        .map_err(AppError::RequestUri)?;

    output(
        &cli.format,
        &json!({ "login_uri": uri.as_str() }),
        &[("login_uri", uri.to_string())],
    )
}

fn redact(cli: &Cli, args: &RedactArgs) -> Result<(), AppError> {
    let uri = redact_id_token(&args.logout_uri, args.strategy.into())
        .map_err(AppError::RequestUri)?;

    output(
        &cli.format,
        &json!({ "logout_uri": uri.as_str() }),
        &[("logout_uri", uri.to_string())],
    )
}

/// Output a result in the selected format
fn output<T: Serialize>(
    format: &OutputFormat,
    value: &T,
    rows: &[(&str, String)],
) -> Result<(), AppError> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Table => {
            let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
            for (name, value) in rows {
                println!("{:<width$}  {}", name, value, width = width);
            }
        }
    }
    Ok(())
}
