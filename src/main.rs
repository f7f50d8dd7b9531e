//! swipeclean: month-by-month photo triage.
//!
//! Photos are read from an external media store, grouped into calendar-month
//! albums and reviewed one by one. Keep/delete decisions are stored in a local
//! SQLite ledger that is periodically reconciled against the inventory so
//! decisions for photos that disappeared don't pile up.

#![warn(clippy::all)]

mod cli;
mod config;
mod inventory;
pub mod retry;
mod review;
mod shutdown;
mod state;
mod types;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Command;
use config::Config;
use inventory::{InventoryReader, MediaStoreDb};
use retry::{classify_ledger_error, retry_with_backoff};
use review::{sort_albums, Reconciler};
use state::prefs::{
    KEY_ALBUM_SORT_ORDER, KEY_CLEANED_SIZE, KEY_GUIDANCE_SHOWN, KEY_LAST_REVIEW_TIME,
    SWIPE_CLEAN_NAMESPACE,
};
use state::{Decision, DecisionLedger, Preferences, SqliteStateDb};
use types::AlbumSortOrder;

/// Human-readable byte count, e.g. "1.5 MB".
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|| "-".to_string())
}

/// Open (or create) the decision database.
async fn open_ledger(config: &Config) -> anyhow::Result<Arc<SqliteStateDb>> {
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let db = SqliteStateDb::open(&config.db_path).await?;
    Ok(Arc::new(db))
}

async fn build_reconciler(
    config: &Config,
    ledger: Arc<SqliteStateDb>,
) -> anyhow::Result<Reconciler> {
    let media_store = config.require_media_store()?;
    if !media_store.exists() {
        tracing::warn!(
            path = %media_store.display(),
            "Media store not found, the inventory will read as empty"
        );
    }
    let inventory = InventoryReader::new(Arc::new(MediaStoreDb::new(media_store)));
    Ok(Reconciler::new(ledger, inventory))
}

fn preferences(db: &SqliteStateDb) -> Preferences {
    db.preferences(SWIPE_CLEAN_NAMESPACE)
}

/// Sort order from the flag, falling back to the remembered one. A flag value
/// is remembered for later runs.
async fn resolve_sort_order(
    prefs: &Preferences,
    requested: Option<AlbumSortOrder>,
) -> anyhow::Result<AlbumSortOrder> {
    if let Some(order) = requested {
        prefs.set_string(KEY_ALBUM_SORT_ORDER, order.as_str()).await?;
        return Ok(order);
    }
    let stored = prefs.get_string(KEY_ALBUM_SORT_ORDER).await?;
    Ok(stored
        .as_deref()
        .and_then(AlbumSortOrder::from_stored)
        .unwrap_or_default())
}

/// Run the albums command.
async fn run_albums(config: &Config, args: cli::AlbumsArgs) -> anyhow::Result<()> {
    let db = open_ledger(config).await?;
    let prefs = preferences(&db);
    let reconciler = build_reconciler(config, Arc::clone(&db)).await?;

    let order = resolve_sort_order(&prefs, args.sort).await?;
    let mut albums = reconciler.load_albums().await?;
    sort_albums(&mut albums, order);
    prefs
        .set_i64(KEY_LAST_REVIEW_TIME, chrono::Utc::now().timestamp())
        .await?;

    if args.json {
        let summaries: Vec<_> = albums.iter().map(|a| a.summary()).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if albums.is_empty() {
        println!("No photos found.");
        return Ok(());
    }

    println!(
        "{:<18} {:>7} {:>7} {:>7} {:>9}  {:>10}",
        "Album", "Photos", "Kept", "Delete", "Undecided", "Pending"
    );
    for album in &albums {
        let marker = if album.is_completed() { " ✓" } else { "" };
        println!(
            "{:<18} {:>7} {:>7} {:>7} {:>9}  {:>10}{}",
            album.label,
            album.total_count(),
            album.kept_count(),
            album.deleted_count(),
            album.undecided_count(),
            format_bytes(album.pending_delete_bytes()),
            marker
        );
    }

    if !prefs.get_bool(KEY_GUIDANCE_SHOWN, false).await? {
        println!();
        println!("Tip: `swipeclean show <YEAR-MONTH>` lists an album's photos,");
        println!("then `swipeclean keep <ID>...` / `swipeclean delete <ID>...` records decisions.");
        prefs.set_bool(KEY_GUIDANCE_SHOWN, true).await?;
    }

    Ok(())
}

/// Run the show command.
async fn run_show(config: &Config, args: cli::ShowArgs) -> anyhow::Result<()> {
    let db = open_ledger(config).await?;
    let reconciler = build_reconciler(config, db).await?;

    reconciler.load_albums().await?;
    let album = reconciler
        .find_album(&args.album)
        .ok_or_else(|| anyhow::anyhow!("No photos in {}", args.album.label()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&album)?);
        return Ok(());
    }

    println!("{} ({} photos)", album.label, album.total_count());
    println!();
    for photo in &album.photos {
        println!(
            "{:>10}  {:<9}  {}  {:>10}  {}",
            photo.id,
            photo.review_state,
            format_timestamp(photo.effective_timestamp),
            format_bytes(photo.size_bytes),
            photo.display_name
        );
    }
    if let Some(cover) = album.cover() {
        println!();
        println!("Next to review: {} ({})", cover.display_name, cover.id);
    }
    Ok(())
}

/// Run the delete and keep commands.
async fn run_decide(config: &Config, ids: Vec<i64>, decision: Decision) -> anyhow::Result<()> {
    let db = open_ledger(config).await?;
    let reconciler = build_reconciler(config, db).await?;

    let photos = reconciler.resolve_photos(&ids).await?;
    for id in ids.iter().filter(|id| !photos.iter().any(|p| p.id == **id)) {
        tracing::warn!(id, "Photo not found in the inventory");
    }

    let reconciler = &reconciler;
    let mut recorded = 0usize;
    for photo in &photos {
        retry_with_backoff(&config.retry, classify_ledger_error, move || async move {
            match decision {
                Decision::Delete => reconciler.mark_deleted(photo).await,
                Decision::Keep => reconciler.mark_kept(photo).await,
            }
        })
        .await?;
        recorded += 1;
    }

    println!("Recorded {} decision(s): {}", recorded, decision.as_str());
    if recorded < ids.len() {
        println!("{} id(s) not found", ids.len() - recorded);
    }
    Ok(())
}

/// Run the undo command.
async fn run_undo(config: &Config, args: cli::IdsArgs) -> anyhow::Result<()> {
    let db = open_ledger(config).await?;
    let reconciler = build_reconciler(config, db).await?;

    let flipped = retry_with_backoff(&config.retry, classify_ledger_error, || {
        reconciler.reverse_delete_batch(&args.ids)
    })
    .await?;
    println!("Restored {} photo(s) to kept", flipped);
    Ok(())
}

/// Run the finalize command.
async fn run_finalize(config: &Config, args: cli::IdsArgs) -> anyhow::Result<()> {
    let db = open_ledger(config).await?;
    let prefs = preferences(&db);
    let reconciler = build_reconciler(config, Arc::clone(&db)).await?;

    let freed = retry_with_backoff(&config.retry, classify_ledger_error, || {
        reconciler.finalize_deleted_batch(&args.ids)
    })
    .await?;
    let total = prefs
        .add_i64(KEY_CLEANED_SIZE, i64::try_from(freed).unwrap_or(i64::MAX))
        .await?;

    println!(
        "Freed {} ({} cleaned in total)",
        format_bytes(freed),
        format_bytes(total.max(0) as u64)
    );
    Ok(())
}

/// Run the reset-album command.
async fn run_reset_album(config: &Config, args: cli::AlbumArgs) -> anyhow::Result<()> {
    let db = open_ledger(config).await?;
    let reconciler = build_reconciler(config, db).await?;

    reconciler.load_albums().await?;
    if reconciler.find_album(&args.album).is_none() {
        anyhow::bail!("No photos in {}", args.album.label());
    }
    let removed = reconciler.reset_album(&args.album).await?;
    println!("Cleared {} decision(s) in {}", removed, args.album.label());
    Ok(())
}

fn print_reconcile_stats(stats: &review::ReconcileStats, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(stats)?);
    } else {
        println!(
            "Examined {} decision(s): {} stale, {} removed, {} failed",
            stats.examined, stats.stale, stats.removed, stats.failed
        );
    }
    Ok(())
}

/// Run the reconcile command, once or until interrupted.
async fn run_reconcile(config: &Config, args: cli::ReconcileArgs) -> anyhow::Result<()> {
    let db = open_ledger(config).await?;
    let reconciler = build_reconciler(config, db).await?;

    let Some(interval) = args.watch_interval else {
        let stats = reconciler.reconcile().await?;
        return print_reconcile_stats(&stats, args.json);
    };

    let shutdown_token = shutdown::install_signal_handler();
    let interval = Duration::from_secs(interval.max(1));
    tracing::info!(interval_secs = interval.as_secs(), "Watching for stale decisions");

    loop {
        // An unavailable inventory skips this pass; the next one retries.
        match reconciler.reconcile().await {
            Ok(stats) => print_reconcile_stats(&stats, args.json)?,
            Err(review::ReconcileError::InventoryUnavailable(e)) => {
                tracing::warn!(error = %e, "Inventory unavailable, will retry next pass");
            }
            Err(e) => return Err(e.into()),
        }

        if !shutdown::sleep_or_cancel(&shutdown_token, interval).await {
            break;
        }
    }

    tracing::info!("Reconcile loop stopped");
    Ok(())
}

/// Run the status command.
async fn run_status(config: &Config, args: cli::StatusArgs) -> anyhow::Result<()> {
    if !config.db_path.exists() {
        println!("No decision database found at {}", config.db_path.display());
        println!("Run `swipeclean albums` first to create it.");
        return Ok(());
    }

    let db = SqliteStateDb::open(&config.db_path).await?;
    let prefs = preferences(&db);
    let summary = db.get_summary().await?;
    let cleaned = prefs.get_i64(KEY_CLEANED_SIZE, 0).await?.max(0) as u64;
    let last_review = prefs.get_i64(KEY_LAST_REVIEW_TIME, 0).await?;

    let decisions = if args.decisions {
        db.get_all_decisions().await?
    } else {
        Vec::new()
    };

    if args.json {
        let mut value = serde_json::json!({
            "database": db.path().display().to_string(),
            "summary": summary,
            "cleaned_bytes": cleaned,
            "last_review_time": (last_review > 0).then_some(last_review),
        });
        if args.decisions {
            value["decisions"] = serde_json::to_value(&decisions)?;
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Decision database: {}", db.path().display());
    println!();
    println!("Decisions:");
    println!("  Total:          {}", summary.total);
    println!("  Kept:           {}", summary.kept);
    println!("  To delete:      {}", summary.deleted);
    println!("  Pending delete: {}", format_bytes(summary.pending_delete_bytes));
    println!();
    println!("Space cleaned:    {}", format_bytes(cleaned));
    if last_review > 0 {
        println!(
            "Last review:      {}",
            format_timestamp(last_review.saturating_mul(1000))
        );
    }

    if args.decisions && !decisions.is_empty() {
        println!();
        for record in &decisions {
            println!(
                "{:>10}  {:<6}  {:>10}  {}",
                record.source_id,
                record.decision().as_str(),
                format_bytes(record.size_bytes),
                record.source_path
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.global.log_level.as_str())),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_cli(&cli.global)?;
    tracing::debug!(?config, "Resolved configuration");

    match cli.command {
        Command::Albums(args) => run_albums(&config, args).await,
        Command::Show(args) => run_show(&config, args).await,
        Command::Delete(args) => run_decide(&config, args.ids, Decision::Delete).await,
        Command::Keep(args) => run_decide(&config, args.ids, Decision::Keep).await,
        Command::Undo(args) => run_undo(&config, args).await,
        Command::Finalize(args) => run_finalize(&config, args).await,
        Command::ResetAlbum(args) => run_reset_album(&config, args).await,
        Command::Reconcile(args) => run_reconcile(&config, args).await,
        Command::Status(args) => run_status(&config, args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_timestamp_out_of_range() {
        assert_eq!(format_timestamp(i64::MAX), "-");
    }

    #[tokio::test]
    async fn test_resolve_sort_order_remembers_flag() {
        let db = SqliteStateDb::open_in_memory().unwrap();
        let prefs = preferences(&db);

        assert_eq!(
            resolve_sort_order(&prefs, None).await.unwrap(),
            AlbumSortOrder::DateDesc
        );
        assert_eq!(
            resolve_sort_order(&prefs, Some(AlbumSortOrder::UnfinishedDesc))
                .await
                .unwrap(),
            AlbumSortOrder::UnfinishedDesc
        );
        assert_eq!(
            resolve_sort_order(&prefs, None).await.unwrap(),
            AlbumSortOrder::UnfinishedDesc
        );
    }

    #[tokio::test]
    async fn test_albums_and_decisions_against_media_store_file() {
        use crate::inventory::media_store::fixture;
        use crate::inventory::provider::testing::row;

        let dir = std::env::temp_dir().join("swipeclean_test_main");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let store_path = dir.join("media.db");
        let db_path = dir.join("state").join("swipeclean.db");
        fixture::create(
            &store_path,
            &[row(1, Some(0), 1_700_000_000), row(2, Some(1_700_000_100_000), 0)],
        );

        let config = Config {
            db_path: db_path.clone(),
            media_store: Some(store_path),
            retry: retry::RetryConfig::default(),
        };
        run_decide(&config, vec![1, 2, 3], Decision::Delete)
            .await
            .unwrap();
        run_finalize(&config, cli::IdsArgs { ids: vec![1] })
            .await
            .unwrap();

        let db = SqliteStateDb::open(&db_path).await.unwrap();
        assert_eq!(db.get_deleted_ids().await.unwrap(), [2].into());
        assert_eq!(
            preferences(&db).get_i64(KEY_CLEANED_SIZE, 0).await.unwrap(),
            1001
        );
    }
}
