//! Logging setup shared by the `deepdesk` gateway, xtask and tests.

use anyhow::Result;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Directives applied when `RUST_LOG` is unset. Connection chatter from the
/// HTTP stack stays at `warn`.
pub const DEFAULT_DIRECTIVES: &str = "info,deepdesk=debug,deepdesk_core=debug,hyper=warn,reqwest=warn";

/// Installs a stderr `fmt` subscriber with module targets, filtered by
/// `filter`. Later calls are no-ops, so every test and binary may call it.
pub fn init_tracing(filter: EnvFilter) -> Result<()> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }

    let subscriber = Registry::default().with(filter).with(
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr),
    );
    tracing::subscriber::set_global_default(subscriber)?;
    INSTALLED.set(()).ok();

    Ok(())
}

/// `RUST_LOG` if set, else [`DEFAULT_DIRECTIVES`].
pub fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}
