use std::{path::PathBuf, sync::Arc};

use clap::{CommandFactory, Parser};
use shellbox::{
    cli::{ShellboxArgs, ShellboxSubcommand},
    config::{ImageCatalog, ManagerConfig},
    engine::DockerEngine,
    management::{Ledger, LifecycleManager, StatusReporter},
    server::{self, ServerState},
    utils, ShellboxResult,
};
use tracing_subscriber::{fmt, EnvFilter};

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ShellboxResult<()> {
    fmt()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = ShellboxArgs::parse();
    match args.subcommand {
        Some(ShellboxSubcommand::Serve {
            host,
            port,
            ledger,
            quota,
            admins,
            catalog,
        }) => {
            serve(host, port, ledger, quota, admins, catalog).await?;
        }
        Some(ShellboxSubcommand::Images { catalog }) => {
            let catalog = load_catalog(catalog).await?;
            for (image_key, descriptor) in catalog.iter() {
                println!(
                    "{:<16} {:<28} {:>5} {:>7}   {}",
                    image_key,
                    descriptor.get_label(),
                    descriptor.get_ram(),
                    descriptor.get_cpu(),
                    descriptor.get_description(),
                );
            }
        }
        None => {
            ShellboxArgs::command().print_help()?;
        }
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: *
//--------------------------------------------------------------------------------------------------

async fn serve(
    host: String,
    port: u16,
    ledger_path: Option<PathBuf>,
    quota: Option<usize>,
    admins: Vec<String>,
    catalog_path: Option<PathBuf>,
) -> ShellboxResult<()> {
    let ledger_path = ledger_path.unwrap_or_else(utils::default_ledger_path);

    let builder = ManagerConfig::builder()
        .ledger_path(ledger_path)
        .admins(admins);
    let config = Arc::new(match quota {
        Some(quota) => builder.quota(quota).build(),
        None => builder.build(),
    });

    let catalog = load_catalog(catalog_path).await?;

    let engine: Arc<dyn shellbox::engine::Engine> = Arc::new(DockerEngine::new(&config));
    let ledger = Arc::new(Ledger::new(config.get_ledger_path().clone()));
    let manager = Arc::new(LifecycleManager::new(
        engine.clone(),
        ledger,
        catalog,
        config.clone(),
    ));

    // Converge the ledger against whatever survived the last run before
    // taking traffic.
    if let Err(e) = manager.reconcile().await {
        tracing::warn!(error = %e, "startup reconciliation failed");
    }

    let reporter = Arc::new(StatusReporter::new(manager.clone(), engine));
    let state = ServerState::new(manager, reporter);

    server::serve(state, &host, port).await
}

async fn load_catalog(path: Option<PathBuf>) -> ShellboxResult<ImageCatalog> {
    match path {
        Some(path) => ImageCatalog::from_file(path).await,
        None => Ok(ImageCatalog::builtin()),
    }
}
