//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Default location of the version state database.
pub const DEFAULT_DB_PATH: &str = "./migration-state";

/// cmsmig admin - inspect and repair recorded product versions.
#[derive(Parser, Debug)]
#[command(name = "cmsmig-admin")]
#[command(version, about = "Inspect and repair recorded product migration versions")]
pub struct Args {
    /// Path to the version state database.
    #[arg(long, default_value = DEFAULT_DB_PATH, global = true)]
    pub db: PathBuf,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Admin commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List every version recorded for a product.
    Versions {
        /// Product name.
        product: String,
    },
    /// List every product with its current version.
    Products,
    /// Record a version for a product.
    Record {
        /// Product name.
        product: String,
        /// Version reached, e.g. 1.4.0.
        version: String,
        /// Override the current version even when it is lower. The
        /// product then migrates up from the forced version.
        #[arg(long)]
        force: bool,
    },
    /// Validate a migration settings file.
    CheckConfig {
        /// Settings file.
        file: PathBuf,
    },
}

impl Args {
    /// Split into the database path and the command.
    pub fn into_parts(self) -> (PathBuf, Command) {
        (self.db, self.command)
    }
}
