//! HTTP API module.
//!
//! Presentation layer over [`crate::queue::UploadQueue`] and
//! [`crate::files::FileService`]: JSON endpoints plus SSE streams of queue
//! snapshots and notices.

pub mod server;
pub mod types;

pub use server::{router, start_server, AppState};
pub use types::*;
