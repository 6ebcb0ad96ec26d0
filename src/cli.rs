use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kojitag")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative management of build-system tags", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Make the hub match the manifest
    Apply(ApplyArgs),

    /// Show what apply would change, without changing anything
    Diff(DiffArgs),

    /// Check a manifest without contacting the hub
    Validate {
        /// Path to the manifest (TOML)
        manifest: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Apply / Diff
// ============================================================================

#[derive(Parser)]
pub struct ApplyArgs {
    /// Path to the manifest (TOML)
    pub manifest: PathBuf,

    /// Check mode - report changes without making them
    #[arg(short, long)]
    pub check: bool,

    /// Hub snapshot file (overrides hub_state in the settings file)
    #[arg(short, long, env = "KOJITAG_STATE")]
    pub state: Option<PathBuf>,

    /// Print the result as JSON (implies --yes)
    #[arg(long)]
    pub json: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser)]
pub struct DiffArgs {
    /// Path to the manifest (TOML)
    pub manifest: PathBuf,

    /// Hub snapshot file (overrides hub_state in the settings file)
    #[arg(short, long, env = "KOJITAG_STATE")]
    pub state: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

impl From<DiffArgs> for ApplyArgs {
    fn from(args: DiffArgs) -> Self {
        Self {
            manifest: args.manifest,
            check: true,
            state: args.state,
            json: args.json,
            yes: true,
        }
    }
}
