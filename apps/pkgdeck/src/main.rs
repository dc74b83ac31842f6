//! pkgdeck - software center coordination core, demo shell
//!
//! Wires the in-memory dummy backend to the transaction and updater
//! machinery and drives it from a small CLI, consuming the event channel
//! for user feedback the way a GUI shell would.

mod cli;
mod display;
mod events;

use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use console::style;
use tracing::error;
use tracing_subscriber::EnvFilter;

use pkgdeck_backends::{BackendRegistry, DummyBackend, DummyPacing, ResourcesBackend};
use pkgdeck_config::Config;
use pkgdeck_errors::{BackendError, Error, UserFacingError};
use pkgdeck_resources::Filters;
use pkgdeck_transactions::{Transaction, TransactionModel};
use pkgdeck_types::{ResourceState, TransactionStatus};

use crate::cli::{Cli, Commands};
use crate::events::EventHandler;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.debug);

    if let Err(e) = run(cli).await {
        error!("command failed: {e}");
        eprintln!("{} {}", style("Error:").red().bold(), e.user_message());
        if let Some(hint) = e.user_hint() {
            eprintln!("{hint}");
        }
        process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), Error> {
    let config = match &cli.global.config {
        Some(path) => Config::load(path).await?,
        None => Config::default(),
    };

    let (event_sender, mut event_receiver) = pkgdeck_events::channel();
    let model = TransactionModel::with_events(event_sender.clone());

    let pacing = if cli.global.step_ms == 0 {
        DummyPacing::Instant
    } else {
        DummyPacing::Paced(Duration::from_millis(cli.global.step_ms))
    };
    let backend = DummyBackend::new(&model, &config.updater, Some(event_sender), pacing);

    let mut registry = BackendRegistry::new(&config.search);
    registry.register(backend);

    let mut handler = EventHandler::new(cli.global.debug);
    let command = execute_command(cli.command, &model, &registry);
    tokio::pin!(command);

    // Render events concurrently with command execution, then drain.
    loop {
        tokio::select! {
            result = &mut command => {
                while let Ok(message) = event_receiver.try_recv() {
                    handler.handle_event(message);
                }
                return result;
            }
            message = event_receiver.recv() => {
                if let Some(message) = message {
                    handler.handle_event(message);
                }
            }
        }
    }
}

async fn execute_command(
    command: Commands,
    model: &TransactionModel,
    registry: &BackendRegistry,
) -> Result<(), Error> {
    match command {
        Commands::Search { query } => {
            let mut stream = registry.search(&Filters::search_term(&query));
            let mut total = 0usize;
            while let Some(batch) = stream.next_batch().await {
                for result in batch {
                    println!("{}", display::resource_line(&result.resource));
                    total += 1;
                }
            }
            if total == 0 {
                println!("No matches for \"{query}\"");
            }
            Ok(())
        }

        Commands::List { installed, updates } => {
            let filters = if updates {
                Filters::upgradeable()
            } else if installed {
                Filters {
                    state: Some(ResourceState::Installed),
                    filter_minimum_state: true,
                    ..Filters::default()
                }
            } else {
                Filters::default()
            };

            let mut results = registry.search(&filters).collect().await;
            results.sort_by(|a, b| {
                a.resource.display_name().cmp(b.resource.display_name())
            });
            for result in &results {
                println!("{}", display::resource_line(&result.resource));
            }
            if updates {
                println!("{} update(s) available", results.len());
            }
            Ok(())
        }

        Commands::Install { package } => {
            let resource = find(registry, &package)?;
            if resource.state().is_installed() {
                println!("{} is already installed", resource.display_name());
                return Ok(());
            }
            let backend = owner(registry, resource.backend())?;
            let transaction = backend.install_application(&resource)?;
            model.add(transaction.clone());
            wait_for(&transaction).await?;
            println!(
                "{} installed {}",
                style("✓").green(),
                resource.display_name()
            );
            Ok(())
        }

        Commands::Remove { package } => {
            let resource = find(registry, &package)?;
            let backend = owner(registry, resource.backend())?;
            let transaction = backend.remove_application(&resource)?;
            model.add(transaction.clone());
            wait_for(&transaction).await?;
            println!(
                "{} removed {}",
                style("✓").green(),
                resource.display_name()
            );
            Ok(())
        }

        Commands::Update { packages } => {
            let mut upgraded = 0usize;
            for backend in registry.backends() {
                let updater = backend.updater();
                updater.prepare();

                if !packages.is_empty() {
                    let unmark: Vec<_> = updater
                        .to_upgrade()
                        .into_iter()
                        .filter(|r| !packages.iter().any(|p| p == r.package_name()))
                        .collect();
                    updater.remove_resources(&unmark);
                }

                let targets = updater.to_upgrade();
                if targets.is_empty() {
                    continue;
                }
                upgraded += targets.len();

                updater.start();
                while updater.is_progressing() || !model.is_empty() {
                    tokio::time::sleep(Duration::from_millis(25)).await;
                }
            }

            if upgraded == 0 {
                println!("Everything is up to date");
            } else {
                println!("{} upgraded {upgraded} package(s)", style("✓").green());
            }
            Ok(())
        }
    }
}

fn find(registry: &BackendRegistry, package: &str) -> Result<pkgdeck_resources::Resource, Error> {
    registry.find_resource(package).ok_or_else(|| {
        BackendError::ResourceNotFound {
            resource: package.to_owned(),
        }
        .into()
    })
}

fn owner<'a>(
    registry: &'a BackendRegistry,
    name: &str,
) -> Result<&'a Arc<dyn ResourcesBackend>, Error> {
    registry.backend(name).ok_or_else(|| {
        BackendError::UnknownBackend {
            name: name.to_owned(),
        }
        .into()
    })
}

/// Poll a registered transaction until it reaches a terminal status.
async fn wait_for(transaction: &Transaction) -> Result<(), Error> {
    while !transaction.status().is_terminal() {
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    match transaction.status() {
        TransactionStatus::Done => Ok(()),
        TransactionStatus::Cancelled => Err(Error::Cancelled),
        _ => Err(transaction
            .error()
            .unwrap_or_else(|| Error::internal("operation failed"))),
    }
}
