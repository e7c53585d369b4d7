use std::path::PathBuf;

use clap::Parser;

use super::styles;
use crate::utils::{DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Shellbox CLI - lifecycle manager for short-lived container sandboxes
#[derive(Debug, Parser)]
#[command(name = "shellbox", author, about, version, styles=styles::styles())]
pub struct ShellboxArgs {
    /// The subcommand to run
    #[command(subcommand)]
    pub subcommand: Option<ShellboxSubcommand>,
}

/// Available subcommands
#[derive(Debug, Parser)]
pub enum ShellboxSubcommand {
    /// Run the HTTP control plane
    #[command(name = "serve")]
    Serve {
        /// Host to bind
        #[arg(long, default_value = DEFAULT_SERVER_HOST)]
        host: String,

        /// Port to bind
        #[arg(long, default_value_t = DEFAULT_SERVER_PORT)]
        port: u16,

        /// Path of the ledger file (defaults to ~/.shellbox/ledger.json)
        #[arg(long)]
        ledger: Option<PathBuf>,

        /// Per-owner instance quota
        #[arg(long)]
        quota: Option<usize>,

        /// Owner identities granted admin rights (repeatable)
        #[arg(long = "admin")]
        admins: Vec<String>,

        /// Path of a JSON image catalog (defaults to the built-in catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// List the provisionable image catalog
    #[command(name = "images")]
    Images {
        /// Path of a JSON image catalog (defaults to the built-in catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}
