//! # DropVault - upload queue and file records
//!
//! DropVault queues local files, uploads their metadata to a hosted record
//! store one at a time with a simulated progress bar, and reads the stored
//! records back as a paginated listing and a storage summary.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Local files │────▶│ UploadQueue │────▶│ FileService │────▶│ RecordClient│
//! │ (multipart) │     │ (+ tickers) │     │ (file table)│     │ (HTTP / mem)│
//! └─────────────┘     └──────┬──────┘     └─────────────┘     └─────────────┘
//!                            │ snapshots + notices
//!                            ▼
//!                     ┌─────────────┐
//!                     │  API / CLI  │
//!                     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dropvault::{FileService, MemoryRecordStore, Notifier, SourceFile, UploadQueue};
//!
//! #[tokio::main]
//! async fn main() {
//!     let files = FileService::new(Arc::new(MemoryRecordStore::new()));
//!     let queue = UploadQueue::new(files, Notifier::new());
//!     queue.enqueue(vec![SourceFile::from_path("report.pdf".as_ref()).await.unwrap()]);
//!     let summary = queue.upload_all().await.unwrap();
//!     println!("{} uploaded", summary.succeeded);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`config`] - Constants, progress timing and environment settings
//! - [`models`] - Queue entries, file records, MIME categories
//! - [`notify`] - User notices
//! - [`telemetry`] - Log output filtered by `DROPVAULT_LOG`
//! - [`backend`] - Record-store contract, HTTP client and in-memory store
//! - [`files`] - File records service and paginated listing
//! - [`queue`] - Upload queue with simulated progress
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod telemetry;

// Record store
pub mod backend;
pub mod files;

// Upload queue
pub mod queue;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    BackendError, BackendResult, ConfigError, ConfigResult, QueueError, QueueResult, ServerError,
    ServerResult,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{ProgressTiming, Settings};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    format_bytes, EntryId, FileRecord, MimeCategory, NewFileRecord, SourceFile, UploadEntry,
    UploadStatus,
};

// =============================================================================
// Re-exports - Notices
// =============================================================================

pub use notify::{Notice, NoticeLevel, Notifier};

// =============================================================================
// Re-exports - Backend
// =============================================================================

pub use backend::{CurrentUser, HttpRecordClient, MemoryRecordStore, RecordClient, Session};

// =============================================================================
// Re-exports - Files
// =============================================================================

pub use files::{FileListing, FilePage, FileService, StorageUsage};

// =============================================================================
// Re-exports - Queue
// =============================================================================

pub use queue::{
    BatchSummary, CancelOutcome, PendingBatch, ProgressPlan, QueueSnapshot, UploadQueue,
};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
