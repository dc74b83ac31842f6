//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pkgdeck - software center coordination core, demo shell
#[derive(Parser)]
#[command(name = "pkgdeck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Browse, install, remove and update software")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Delay between simulated transaction steps, milliseconds
    #[arg(long, global = true, default_value_t = 150)]
    pub step_ms: u64,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Search available software
    #[command(alias = "s")]
    Search {
        /// Substring matched against names and descriptions
        query: String,
    },

    /// List known software
    #[command(alias = "ls")]
    List {
        /// Only installed entries
        #[arg(long, conflicts_with = "updates")]
        installed: bool,

        /// Only upgradeable entries
        #[arg(long)]
        updates: bool,
    },

    /// Install a package
    #[command(alias = "i")]
    Install {
        /// Package name
        package: String,
    },

    /// Remove an installed package
    #[command(alias = "rm")]
    Remove {
        /// Package name
        package: String,
    },

    /// Upgrade everything marked upgradeable
    #[command(alias = "up")]
    Update {
        /// Restrict the batch to these packages
        packages: Vec<String>,
    },
}
