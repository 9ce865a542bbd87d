use anyhow::Context;
use clap::{Parser, Subcommand};
use deepdesk::{load_server_settings, router, Gateway, GatewayState, Identity, SessionRegistry};
use deepdesk_core::{telemetry, BackendSettings};

#[derive(Parser, Debug)]
#[command(name = "deepdesk", version, about = "DeepDesk API gateway")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the gateway in front of the research backend.
    Serve {
        #[arg(long, env = "DEEPDESK_HOST")]
        host: Option<String>,
        #[arg(long, env = "DEEPDESK_PORT")]
        port: Option<u16>,
        /// Create a session for this email at startup (repeatable).
        #[arg(long = "dev-user", value_name = "EMAIL")]
        dev_users: Vec<String>,
    },
    /// Validate configuration and print the resolved backend.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing(telemetry::default_filter())?;

    let cli = Cli::parse();
    match cli.command {
        Command::CheckConfig => {
            let settings = load_backend_settings()?;
            println!("{}", settings.redacted());
            Ok(())
        }
        Command::Serve {
            host,
            port,
            dev_users,
        } => serve(host, port, dev_users).await,
    }
}

fn load_backend_settings() -> anyhow::Result<BackendSettings> {
    BackendSettings::load().map_err(|err| anyhow::anyhow!(err.user_message()))
}

async fn serve(host: Option<String>, port: Option<u16>, dev_users: Vec<String>) -> anyhow::Result<()> {
    let backend = load_backend_settings()?;
    let mut server = load_server_settings().await;
    if let Some(host) = host {
        server.host = host;
    }
    if let Some(port) = port {
        server.port = port;
    }
    server.dev_users.extend(dev_users);

    let sessions = SessionRegistry::new();
    for email in &server.dev_users {
        let token = sessions.create_session(Identity::new(email.clone())).await;
        println!("{}={token}  ({email})", server.cookie_name);
    }

    tracing::info!(backend = %backend.api_url, "forwarding to backend");
    let state = GatewayState::new(Gateway::new(backend), sessions, &server.cookie_name);
    let app = router(state);

    let address = server.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("gateway shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(%err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(%err, "failed to set up SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
