//! DropVault CLI - queue files and upload them to the record store
//!
//! # Commands
//!
//! ```bash
//! dropvault upload a.pdf b.png     # Queue files and upload them one by one
//! dropvault list --page 2          # Paginated file listing
//! dropvault show 42                # One file record as JSON
//! dropvault delete 42              # Delete a file record
//! dropvault storage                # Storage used against the quota
//! dropvault serve --port 3000      # Start HTTP server
//! ```
//!
//! `--in-memory` swaps the hosted backend for a process-local store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dropvault::config::DEFAULT_PORT;
use dropvault::telemetry;
use dropvault::{
    api::AppState, format_bytes, EntryId, FileListing, FileService, HttpRecordClient,
    MemoryRecordStore, Notifier, QueueSnapshot, RecordClient, Session, Settings, SourceFile,
    UploadQueue, UploadStatus,
};
use tokio::sync::{oneshot, watch};

type Shown = HashMap<EntryId, (UploadStatus, u8)>;

#[derive(Parser)]
#[command(name = "dropvault")]
#[command(about = "Upload files to DropVault and browse stored records", long_about = None)]
struct Cli {
    /// Use a process-local record store instead of DROPVAULT_API_URL
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue files and upload them
    Upload {
        /// Files to upload, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List stored files, newest first
    List {
        /// Page number (1-based)
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Rows per page (default: DROPVAULT_PAGE_SIZE)
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Show one file record
    Show {
        /// Record ID
        id: u64,
    },

    /// Delete a file record
    Delete {
        /// Record ID
        id: u64,
    },

    /// Show storage usage
    Storage,

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Directory served for non-API paths
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = start(cli).await;

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn start(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // Reads .env before DROPVAULT_LOG is looked up
    let settings = Settings::from_env()?;
    telemetry::init_logging(std::env::var(telemetry::LOG_ENV).ok().as_deref());

    if cli.in_memory {
        eprintln!("🧪 Using in-memory record store (nothing is persisted)");
        run(cli.command, Arc::new(MemoryRecordStore::new()), &settings).await
    } else {
        let url = settings.require_api_url()?;
        let client = HttpRecordClient::new(url, Session::from_settings(&settings));
        run(cli.command, Arc::new(client), &settings).await
    }
}

async fn run<C: RecordClient>(
    command: Commands,
    client: Arc<C>,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = FileService::new(client).with_quota(settings.storage_quota);

    match command {
        Commands::Upload { files: paths } => cmd_upload(files, &paths).await,
        Commands::List { page, limit } => {
            cmd_list(files, page, limit.unwrap_or(settings.page_size)).await
        }
        Commands::Show { id } => cmd_show(files, id).await,
        Commands::Delete { id } => cmd_delete(files, id).await,
        Commands::Storage => cmd_storage(files).await,
        Commands::Serve { port, static_dir } => {
            let queue = UploadQueue::new(files, Notifier::new());
            let state = AppState::new(queue).with_page_size(settings.page_size);
            dropvault::server::start_server(state, port, static_dir).await?;
            Ok(())
        }
    }
}

// =============================================================================
// Upload
// =============================================================================

async fn cmd_upload<C: RecordClient>(
    files: FileService<C>,
    paths: &[PathBuf],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        sources.push(SourceFile::from_path(path).await?);
    }

    let queue = UploadQueue::new(files.clone(), Notifier::new());
    queue.enqueue(sources);

    let (finished, finished_rx) = oneshot::channel();
    let renderer = tokio::spawn(render_progress(queue.subscribe(), finished_rx));

    let interrupt = {
        let queue = queue.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n🛑 Cancelling, waiting for the current file...");
                queue.cancel_upload();
            }
        })
    };

    let summary = queue.upload_all().await;
    interrupt.abort();
    let _ = finished.send(());
    let _ = renderer.await;

    let Some(summary) = summary else {
        eprintln!("📋 Nothing to upload.");
        return Ok(());
    };

    eprintln!("\n📊 SUMMARY");
    eprintln!("   Uploaded:  {}", summary.succeeded);
    eprintln!("   Failed:    {}", summary.failed);
    if summary.cancelled {
        eprintln!("   Cancelled: {} left in queue", count_ready(&queue.snapshot()));
    }

    let usage = files.storage_usage().await?;
    eprintln!(
        "   Storage:   {} of {} ({}%)",
        format_bytes(usage.used, 2),
        format_bytes(usage.total, 2),
        usage.used_percent
    );

    if summary.failed > 0 {
        return Err(format!("{} file(s) failed to upload", summary.failed).into());
    }
    eprintln!("\n✨ Done!");
    Ok(())
}

fn count_ready(snapshot: &QueueSnapshot) -> usize {
    snapshot
        .entries
        .iter()
        .filter(|e| e.status == UploadStatus::Ready)
        .count()
}

/// Print a line per entry whenever its status or progress decile changes.
///
/// Once `finished` fires, the latest snapshot is rendered one last time so
/// the final result of every entry is shown.
async fn render_progress(
    mut rx: watch::Receiver<QueueSnapshot>,
    mut finished: oneshot::Receiver<()>,
) -> Shown {
    let mut shown = Shown::new();

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                render_snapshot(&snapshot, &mut shown);
            }
            _ = &mut finished => {
                let snapshot = rx.borrow().clone();
                render_snapshot(&snapshot, &mut shown);
                break;
            }
        }
    }
    shown
}

fn render_snapshot(snapshot: &QueueSnapshot, shown: &mut Shown) {
    for entry in &snapshot.entries {
        let percent = snapshot.progress_of(entry.id).unwrap_or(0);
        let key = (entry.status, percent / 10);
        if shown.get(&entry.id) == Some(&key) {
            continue;
        }
        shown.insert(entry.id, key);

        match entry.status {
            UploadStatus::Ready => {}
            UploadStatus::Uploading => {
                eprintln!("   ⏳ {:<40} {:>3}%", entry.name, percent)
            }
            UploadStatus::Complete => eprintln!(
                "   ✅ {:<40} {}",
                entry.name,
                format_bytes(entry.size_bytes, 2)
            ),
            UploadStatus::Error => eprintln!("   ❌ {:<40} failed", entry.name),
        }
    }
}

// =============================================================================
// Read path
// =============================================================================

async fn cmd_list<C: RecordClient>(
    files: FileService<C>,
    page: u32,
    limit: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut listing = FileListing::with_page_size(files, limit);
    listing.go_to_page(page).await?;

    let Some(range) = listing.range_label() else {
        eprintln!("📋 No files found.");
        return Ok(());
    };

    eprintln!("📋 {}\n", range);
    for file in listing.rows() {
        println!(
            "  {:>6}  {:<40} {:>10}  {:<12} {}",
            file.id,
            file.name.as_deref().unwrap_or("-"),
            file.size.map(|s| format_bytes(s, 2)).unwrap_or_else(|| "-".into()),
            file.file_type.as_deref().unwrap_or("unknown"),
            file.display_date().unwrap_or("-"),
        );
    }

    if listing.has_next() {
        eprintln!(
            "\n   More: dropvault list --page {}",
            listing.page_number() + 1
        );
    }
    Ok(())
}

async fn cmd_show<C: RecordClient>(
    files: FileService<C>,
    id: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    match files.get_file(id).await? {
        Some(file) => {
            println!("{}", serde_json::to_string_pretty(&file)?);
            Ok(())
        }
        None => Err(format!("File not found: {}", id).into()),
    }
}

async fn cmd_delete<C: RecordClient>(
    files: FileService<C>,
    id: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    files.delete_file(id).await?;
    eprintln!("🗑️  File deleted: {}", id);
    Ok(())
}

async fn cmd_storage<C: RecordClient>(
    files: FileService<C>,
) -> Result<(), Box<dyn std::error::Error>> {
    let usage = files.storage_usage().await?;
    eprintln!("💾 Storage");
    eprintln!("   Used:  {}", format_bytes(usage.used, 2));
    eprintln!("   Total: {}", format_bytes(usage.total, 2));
    eprintln!("   {}% used", usage.used_percent);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test(start_paused = true)]
    async fn test_renderer_shows_final_state_after_batch() {
        let files = FileService::new(Arc::new(MemoryRecordStore::new()));
        let queue = UploadQueue::new(files, Notifier::new());
        let file = SourceFile::new("a.pdf", 10, "application/pdf", Utc::now());
        let id = queue.enqueue(vec![file])[0];

        let (finished, finished_rx) = oneshot::channel();
        let rx = queue.subscribe();
        queue.upload_all().await.unwrap();

        // The renderer has not run yet when the batch ends.
        let renderer = tokio::spawn(render_progress(rx, finished_rx));
        finished.send(()).unwrap();
        let shown = renderer.await.unwrap();

        assert_eq!(shown.get(&id).map(|s| s.0), Some(UploadStatus::Complete));
    }
}
