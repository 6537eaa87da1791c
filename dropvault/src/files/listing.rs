//! Paginated file listing.
//!
//! Offset paging with a fixed page size. Only the current page is held.

use crate::backend::{PagingInfo, RecordClient};
use crate::config::DEFAULT_PAGE_SIZE;
use crate::error::BackendResult;
use crate::models::FileRecord;

use super::FileService;

pub struct FileListing<C> {
    service: FileService<C>,
    limit: u32,
    offset: u32,
    total: u64,
    rows: Vec<FileRecord>,
}

impl<C: RecordClient> FileListing<C> {
    pub fn new(service: FileService<C>) -> Self {
        Self::with_page_size(service, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(service: FileService<C>, limit: u32) -> Self {
        Self {
            service,
            limit: limit.max(1),
            offset: 0,
            total: 0,
            rows: Vec::new(),
        }
    }

    /// Fetch the page at the current offset, replacing the held rows.
    pub async fn load(&mut self) -> BackendResult<&[FileRecord]> {
        let page = self
            .service
            .fetch_files(
                Vec::new(),
                PagingInfo {
                    limit: self.limit,
                    offset: self.offset,
                },
            )
            .await?;
        self.rows = page.data;
        self.total = page.total;
        Ok(&self.rows)
    }

    /// Jump to a 1-based page number and load it.
    pub async fn go_to_page(&mut self, page: u32) -> BackendResult<&[FileRecord]> {
        self.offset = page.saturating_sub(1).saturating_mul(self.limit);
        self.load().await
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.offset) + u64::from(self.limit) < self.total
    }

    pub fn has_prev(&self) -> bool {
        self.offset > 0
    }

    /// Advance one page if there is one. Returns whether it moved.
    pub async fn next_page(&mut self) -> BackendResult<bool> {
        if !self.has_next() {
            return Ok(false);
        }
        self.offset += self.limit;
        self.load().await?;
        Ok(true)
    }

    /// Go back one page if not on the first. Returns whether it moved.
    pub async fn prev_page(&mut self) -> BackendResult<bool> {
        if !self.has_prev() {
            return Ok(false);
        }
        self.offset = self.offset.saturating_sub(self.limit);
        self.load().await?;
        Ok(true)
    }

    /// Delete a record and drop it from the held page.
    pub async fn delete(&mut self, id: u64) -> BackendResult<()> {
        self.service.delete_file(id).await?;
        let before = self.rows.len();
        self.rows.retain(|r| r.id != id);
        if self.rows.len() < before {
            self.total = self.total.saturating_sub(1);
        }
        Ok(())
    }

    pub fn rows(&self) -> &[FileRecord] {
        &self.rows
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// 1-based number of the current page.
    pub fn page_number(&self) -> u32 {
        self.offset / self.limit + 1
    }

    /// `Showing a-b of n`, or `None` when there is nothing to show.
    pub fn range_label(&self) -> Option<String> {
        if self.total == 0 || self.rows.is_empty() {
            return None;
        }
        let first = u64::from(self.offset) + 1;
        let last = (u64::from(self.offset) + u64::from(self.limit)).min(self.total);
        Some(format!("Showing {}-{} of {}", first, last, self.total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryRecordStore;
    use serde_json::json;
    use std::sync::Arc;

    fn listing_with(count: usize, page_size: u32) -> FileListing<MemoryRecordStore> {
        let store = MemoryRecordStore::new();
        store.seed(
            "file",
            (0..count)
                .map(|i| json!({"Name": format!("file-{}", i), "size": 100, "CreatedOn": "2024-05-01T00:00:00Z"}))
                .collect(),
        );
        FileListing::with_page_size(FileService::new(Arc::new(store)), page_size)
    }

    #[tokio::test]
    async fn test_pages_forward_and_back() {
        let mut listing = listing_with(25, 10);
        listing.load().await.unwrap();
        assert_eq!(listing.rows().len(), 10);
        assert_eq!(listing.range_label().unwrap(), "Showing 1-10 of 25");
        assert!(!listing.has_prev());

        assert!(listing.next_page().await.unwrap());
        assert!(listing.next_page().await.unwrap());
        assert_eq!(listing.rows().len(), 5);
        assert_eq!(listing.range_label().unwrap(), "Showing 21-25 of 25");
        assert!(!listing.next_page().await.unwrap());
        assert_eq!(listing.page_number(), 3);

        assert!(listing.prev_page().await.unwrap());
        assert_eq!(listing.offset(), 10);
    }

    #[tokio::test]
    async fn test_first_page_cannot_go_back() {
        let mut listing = listing_with(3, 10);
        listing.load().await.unwrap();
        assert!(!listing.prev_page().await.unwrap());
        assert!(!listing.has_next());
        assert_eq!(listing.offset(), 0);
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let mut listing = listing_with(0, 10);
        listing.load().await.unwrap();
        assert!(listing.rows().is_empty());
        assert!(listing.range_label().is_none());
    }

    #[tokio::test]
    async fn test_go_to_page_and_delete() {
        let mut listing = listing_with(12, 5);
        listing.go_to_page(3).await.unwrap();
        assert_eq!(listing.offset(), 10);
        assert_eq!(listing.rows().len(), 2);

        let id = listing.rows()[0].id;
        listing.delete(id).await.unwrap();
        assert_eq!(listing.rows().len(), 1);
        assert_eq!(listing.total(), 11);
    }
}
