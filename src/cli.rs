use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tweakctl - reversible system configuration tweaks
#[derive(Parser)]
#[command(name = "tweakctl")]
#[command(about = "Applies reversible system configuration tweaks with backup and rollback")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: show what would be applied without making changes.
    ///
    /// Guards are still evaluated so the preview is realistic; no value is
    /// written, removed or backed up.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Root directory of the configuration store
    #[arg(long, global = true, value_name = "DIR", default_value = "/var/lib/tweakctl/store")]
    pub store: PathBuf,

    /// Directory holding backup artifacts
    #[arg(long, global = true, value_name = "DIR", default_value = "/var/lib/tweakctl/backups")]
    pub backup_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a tweak plan's enabled tiers
    Apply {
        /// Path to the plan file
        plan: PathBuf,

        /// Enable exactly these tiers, overriding the plan file
        /// (repeatable)
        #[arg(long = "tier", value_name = "NAME")]
        tiers: Vec<String>,

        /// Print the session report as JSON instead of a text summary
        #[arg(long)]
        json: bool,
    },
    /// Restore a plan's keys from their latest backups and run its
    /// compensating actions
    Undo {
        /// Path to the plan file
        plan: PathBuf,

        /// Print the undo report as JSON instead of a text summary
        #[arg(long)]
        json: bool,
    },
    /// Re-check a plan's expected values without mutating anything
    Verify {
        /// Path to the plan file
        plan: PathBuf,
    },
    /// Validate a plan file
    Validate {
        /// Path to the plan file
        plan: PathBuf,
    },
    /// List backup artifacts
    Backups {
        /// Only artifacts for this key (e.g. "system\\Power")
        #[arg(long, value_name = "KEY")]
        key: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
