use clap::{Args, Parser, Subcommand};

use crate::review::AlbumKey;
use crate::types::{AlbumSortOrder, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "swipeclean",
    version,
    about = "Review photos month by month and track keep/delete decisions"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Decision database file (default: <data-directory>/swipeclean.db)
    #[arg(long, global = true, env = "SWIPECLEAN_DB")]
    pub db: Option<String>,

    /// Directory for the decision database
    #[arg(long, global = true, default_value = "~/.swipeclean")]
    pub data_directory: String,

    /// Media store database holding the photo inventory
    #[arg(long, global = true, env = "SWIPECLEAN_MEDIA_STORE")]
    pub media_store: Option<String>,

    /// Log level
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Retries for a decision write that hits a busy database
    #[arg(long, global = true, default_value_t = 3)]
    pub max_retries: u32,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List month albums with review progress
    Albums(AlbumsArgs),

    /// List the photos of one album
    Show(ShowArgs),

    /// Mark photos for deletion
    Delete(IdsArgs),

    /// Mark photos as kept
    Keep(IdsArgs),

    /// Turn delete decisions back into keep decisions
    Undo(IdsArgs),

    /// Forget delete decisions for photos whose files were removed
    Finalize(IdsArgs),

    /// Forget every decision in an album so it can be reviewed again
    ResetAlbum(AlbumArgs),

    /// Remove decisions for photos no longer in the inventory
    Reconcile(ReconcileArgs),

    /// Show decision counts and space cleaned
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub struct AlbumsArgs {
    /// Album order (remembered for later runs)
    #[arg(long, value_enum)]
    pub sort: Option<AlbumSortOrder>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Album as YEAR-MONTH, e.g. 2025-10
    pub album: AlbumKey,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AlbumArgs {
    /// Album as YEAR-MONTH, e.g. 2025-10
    pub album: AlbumKey,
}

#[derive(Args, Debug)]
pub struct IdsArgs {
    /// Inventory ids
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<i64>,
}

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Keep running, reconciling every N seconds until interrupted
    #[arg(long)]
    pub watch_interval: Option<u64>,

    /// Print JSON stats
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Also list every recorded decision
    #[arg(long)]
    pub decisions: bool,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}
