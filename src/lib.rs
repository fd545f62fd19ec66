pub mod analytics;
pub mod api;
pub mod audit;
pub mod authorization;
pub mod config;
pub mod core_state;
pub mod crypto;
pub mod db;
pub mod identity;
pub mod models;
pub mod orders;
pub mod seed;
pub mod sequence;
pub mod token;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core_state::{CoreError, CoreState};

/// What the binary was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Serve,
    Seed,
}

impl Command {
    /// `clinicore [serve|seed]`; no argument means serve.
    pub fn parse(arg: Option<&str>) -> Result<Self, CoreError> {
        match arg {
            None | Some("serve") => Ok(Command::Serve),
            Some("seed") => Ok(Command::Seed),
            Some(other) => Err(CoreError::Task(format!(
                "unknown command '{other}' (expected 'serve' or 'seed')"
            ))),
        }
    }
}

pub fn run() -> Result<(), CoreError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    let command = Command::parse(std::env::args().nth(1).as_deref())?;
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CoreError::Task(format!("cannot start runtime: {e}")))?;
    runtime.block_on(execute(command))
}

async fn execute(command: Command) -> Result<(), CoreError> {
    let config = AppConfig::from_env()?;
    let core = Arc::new(CoreState::open(config)?);

    match command {
        Command::Seed => {
            let report = seed::seed_demo(&core)
                .await
                .map_err(|e| CoreError::Task(format!("seed failed: {e}")))?;
            tracing::info!(
                tenant_created = report.tenant_created,
                users = report.users_created.len(),
                tests = report.tests_created.len(),
                "Seed complete"
            );
            Ok(())
        }
        Command::Serve => serve(core).await,
    }
}

async fn serve(core: Arc<CoreState>) -> Result<(), CoreError> {
    let retention = audit::spawn_retention_task(core.clone());
    let addr = core.config().bind_addr;
    let server = api::start_server(core, addr).await.map_err(CoreError::Task)?;
    tracing::info!(addr = %server.session.server_addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {e}");
    }
    tracing::info!("Shutdown requested");
    retention.abort();
    server.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_defaults_to_serve() {
        assert_eq!(Command::parse(None).unwrap(), Command::Serve);
        assert_eq!(Command::parse(Some("serve")).unwrap(), Command::Serve);
        assert_eq!(Command::parse(Some("seed")).unwrap(), Command::Seed);
        assert!(Command::parse(Some("migrate")).is_err());
    }
}
