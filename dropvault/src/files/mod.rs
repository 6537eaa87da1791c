//! File records over the `file` table.
//!
//! [`FileService`] wraps a [`RecordClient`] with the table name, the
//! default field list and newest-first ordering. [`listing::FileListing`]
//! pages through it.

pub mod listing;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::backend::{
    Condition, DeleteRequest, FetchParams, OrderBy, PagingInfo, RecordClient, RecordsRequest,
    SortDirection,
};
use crate::config::{DEFAULT_FIELDS, DEFAULT_STORAGE_QUOTA, FILE_TABLE, STORAGE_SCAN_LIMIT};
use crate::error::{BackendError, BackendResult};
use crate::models::{FileRecord, NewFileRecord};

pub use listing::FileListing;

/// One page of file records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilePage {
    pub data: Vec<FileRecord>,
    pub total: u64,
}

/// Storage consumed by the account's files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    pub used: u64,
    pub total: u64,
    pub used_percent: u8,
}

impl StorageUsage {
    pub fn new(used: u64, total: u64) -> Self {
        let used_percent = if total == 0 {
            0
        } else {
            ((used as f64 / total as f64) * 100.0).round().min(255.0) as u8
        };
        Self {
            used,
            total,
            used_percent,
        }
    }
}

/// Typed access to file records.
pub struct FileService<C> {
    client: Arc<C>,
    quota: u64,
}

impl<C> Clone for FileService<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            quota: self.quota,
        }
    }
}

impl<C: RecordClient> FileService<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            quota: DEFAULT_STORAGE_QUOTA,
        }
    }

    pub fn with_quota(mut self, quota: u64) -> Self {
        self.quota = quota;
        self
    }

    fn default_fields() -> Vec<String> {
        DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect()
    }

    /// Fetch one page, newest first.
    ///
    /// A response without `data` is an empty page; a missing total falls
    /// back to the page length.
    pub async fn fetch_files(
        &self,
        conditions: Vec<Condition>,
        paging: PagingInfo,
    ) -> BackendResult<FilePage> {
        let params = FetchParams {
            fields: Self::default_fields(),
            paging_info: paging,
            order_by: vec![OrderBy {
                field: "CreatedOn".to_string(),
                direction: SortDirection::Desc,
            }],
            conditions,
        };

        let response = self
            .client
            .fetch_records(FILE_TABLE, params)
            .await
            .inspect_err(|e| log::error!("Error fetching files: {}", e))?;

        let Some(rows) = response.data else {
            return Ok(FilePage {
                data: Vec::new(),
                total: 0,
            });
        };

        let data = rows
            .into_iter()
            .map(serde_json::from_value::<FileRecord>)
            .collect::<Result<Vec<_>, _>>()?;
        let total = response
            .total_record_count
            .filter(|t| *t > 0)
            .unwrap_or(data.len() as u64);

        Ok(FilePage { data, total })
    }

    pub async fn get_file(&self, id: u64) -> BackendResult<Option<FileRecord>> {
        let response = self
            .client
            .get_record_by_id(FILE_TABLE, id, Self::default_fields())
            .await
            .inspect_err(|e| log::error!("Error fetching file with ID {}: {}", id, e))?;

        response
            .data
            .map(serde_json::from_value)
            .transpose()
            .map_err(BackendError::from)
    }

    /// Create a record; fails unless the backend reports success with data.
    pub async fn create_file(&self, record: &NewFileRecord) -> BackendResult<FileRecord> {
        let payload = serde_json::to_value(record)?;
        let response = self
            .client
            .create_record(FILE_TABLE, RecordsRequest::single(payload))
            .await
            .inspect_err(|e| log::error!("Error creating file record: {}", e))?;

        let data = response
            .first_data()
            .cloned()
            .ok_or_else(|| BackendError::Unsuccessful {
                operation: "create",
                table: FILE_TABLE.to_string(),
            })?;
        Ok(serde_json::from_value(data)?)
    }

    /// Update fields of an existing record.
    pub async fn update_file(&self, id: u64, fields: Value) -> BackendResult<FileRecord> {
        let mut record = match fields {
            Value::Object(map) => map,
            _ => {
                return Err(BackendError::InvalidResponse(
                    "update fields must be a JSON object".to_string(),
                ))
            }
        };
        record.insert("Id".to_string(), Value::from(id));

        let response = self
            .client
            .update_record(FILE_TABLE, RecordsRequest::single(Value::Object(record)))
            .await
            .inspect_err(|e| log::error!("Error updating file record with ID {}: {}", id, e))?;

        let data = response
            .first_data()
            .cloned()
            .ok_or_else(|| BackendError::Unsuccessful {
                operation: "update",
                table: FILE_TABLE.to_string(),
            })?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn delete_file(&self, id: u64) -> BackendResult<()> {
        let response = self
            .client
            .delete_record(FILE_TABLE, DeleteRequest { record_ids: vec![id] })
            .await
            .inspect_err(|e| log::error!("Error deleting file record with ID {}: {}", id, e))?;

        if response.success {
            Ok(())
        } else {
            Err(BackendError::NotFound(id))
        }
    }

    /// Sum of `size` over the most recent records, against the quota.
    pub async fn storage_usage(&self) -> BackendResult<StorageUsage> {
        let page = self
            .fetch_files(
                Vec::new(),
                PagingInfo {
                    limit: STORAGE_SCAN_LIMIT,
                    offset: 0,
                },
            )
            .await?;
        let used = page.data.iter().filter_map(|f| f.size).sum();
        Ok(StorageUsage::new(used, self.quota))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryRecordStore;
    use crate::models::{SourceFile, UploadEntry};
    use chrono::Utc;
    use serde_json::json;

    fn service() -> (FileService<MemoryRecordStore>, MemoryRecordStore) {
        let store = MemoryRecordStore::new();
        (FileService::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let (files, _) = service();
        let entry = UploadEntry::from_source(SourceFile::new("a.png", 10, "image/png", Utc::now()));
        let created = files
            .create_file(&NewFileRecord::completed(&entry, Utc::now()))
            .await
            .unwrap();
        assert_eq!(created.name.as_deref(), Some("a.png"));
        assert_eq!(created.file_type.as_deref(), Some("image"));

        let fetched = files.get_file(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert!(files.get_file(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_storage_usage_sums_sizes() {
        let (files, store) = service();
        store.seed(
            "file",
            vec![json!({"Name": "a", "size": 1024}), json!({"Name": "b", "size": 2048}), json!({"Name": "c"})],
        );
        let usage = files.with_quota(4096).storage_usage().await.unwrap();
        assert_eq!(usage.used, 3072);
        assert_eq!(usage.total, 4096);
        assert_eq!(usage.used_percent, 75);
    }

    #[tokio::test]
    async fn test_update_and_delete_file() {
        let (files, store) = service();
        store.seed("file", vec![json!({"Name": "a", "status": "uploading"})]);

        let updated = files.update_file(1, json!({"status": "complete"})).await.unwrap();
        assert_eq!(updated.status.as_deref(), Some("complete"));

        files.delete_file(1).await.unwrap();
        assert!(matches!(files.delete_file(1).await, Err(BackendError::NotFound(1))));
    }

    #[test]
    fn test_storage_percent_of_empty_quota() {
        assert_eq!(StorageUsage::new(10, 0).used_percent, 0);
        assert_eq!(StorageUsage::new(1, 3).used_percent, 33);
    }
}
