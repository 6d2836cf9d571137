//! In-memory blob store that records every call

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use fleetops::errors::StoreError;
use fleetops::storage::{BlobStore, CompletedPart, ObjectInfo};

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    last_modified: DateTime<Utc>,
}

pub struct MemoryStore {
    bucket: String,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    uploads: Mutex<HashMap<String, BTreeMap<u32, Vec<u8>>>>,
    calls: Mutex<Vec<String>>,
    unavailable: AtomicBool,
    /// Part numbers whose upload fails
    failing_part: AtomicU32,
    tick: AtomicU32,
}

impl MemoryStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: Mutex::new(BTreeMap::new()),
            uploads: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
            failing_part: AtomicU32::new(0),
            tick: AtomicU32::new(0),
        }
    }

    /// Store a key as if it had been uploaded at `last_modified`
    pub fn seed(&self, key: &str, body: &[u8], last_modified: DateTime<Utc>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body: body.to_vec(),
                last_modified,
            },
        );
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn fail_part(&self, part_number: u32) {
        self.failing_part.store(part_number, Ordering::SeqCst);
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn body(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).map(|o| o.body.clone())
    }

    pub fn open_uploads(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Keys passed to `operation` (`put`, `delete`, `exists`, ...), in call order
    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        let prefix = format!("{}:", operation);
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(String::from))
            .collect()
    }

    fn record(&self, operation: &str, key: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{}", operation, key));
    }

    fn guard(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable {
                bucket: self.bucket.clone(),
                reason: "Could not connect to the endpoint URL".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn next_timestamp(&self) -> DateTime<Utc> {
        let tick = self.tick.fetch_add(1, Ordering::SeqCst);
        Utc::now() + Duration::seconds(tick as i64)
    }

    fn not_found(&self, key: &str) -> StoreError {
        StoreError::NotFound {
            bucket: self.bucket.clone(),
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn check_connection(&self) -> Result<(), StoreError> {
        self.record("check_connection", "");
        self.guard()
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.record("exists", key);
        self.guard()?;
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectInfo>, StoreError> {
        self.record("list", prefix.unwrap_or(""));
        self.guard()?;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| prefix.map(|p| k.starts_with(p)).unwrap_or(true))
            .map(|(k, o)| ObjectInfo {
                key: k.clone(),
                last_modified: o.last_modified,
                size: o.body.len() as u64,
            })
            .collect())
    }

    async fn put_file(&self, local_path: &str, key: &str) -> Result<(), StoreError> {
        self.record("put", key);
        self.guard()?;
        let body = std::fs::read(local_path).map_err(|e| StoreError::OperationFailed {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            operation: "upload".to_string(),
            reason: e.to_string(),
        })?;
        let last_modified = self.next_timestamp();
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body,
                last_modified,
            },
        );
        Ok(())
    }

    async fn get_file(&self, key: &str, local_path: &str) -> Result<(), StoreError> {
        self.record("get", key);
        self.guard()?;
        let body = self.body(key).ok_or_else(|| self.not_found(key))?;
        std::fs::write(local_path, body).map_err(|e| StoreError::OperationFailed {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            operation: "download".to_string(),
            reason: e.to_string(),
        })
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError> {
        self.record("copy", &format!("{}->{}", src_key, dst_key));
        self.guard()?;
        let body = self.body(src_key).ok_or_else(|| self.not_found(src_key))?;
        self.seed(dst_key, &body, self.next_timestamp());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.record("delete", key);
        self.guard()?;
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn set_public_read(&self, key: &str) -> Result<(), StoreError> {
        self.record("public", key);
        self.guard()
    }

    async fn create_bucket(&self) -> Result<(), StoreError> {
        self.record("create_bucket", &self.bucket);
        self.guard()
    }

    async fn create_multipart_upload(&self, key: &str) -> Result<String, StoreError> {
        self.record("create_multipart", key);
        self.guard()?;
        let upload_id = format!("upload-{}", key);
        self.uploads
            .lock()
            .unwrap()
            .insert(upload_id.clone(), BTreeMap::new());
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        local_path: &str,
    ) -> Result<CompletedPart, StoreError> {
        self.record("upload_part", &format!("{}#{}", key, part_number));
        self.guard()?;
        if self.failing_part.load(Ordering::SeqCst) == part_number {
            return Err(StoreError::OperationFailed {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                operation: "upload-part".to_string(),
                reason: "simulated part failure".to_string(),
            });
        }
        let body = std::fs::read(local_path).map_err(|e| StoreError::OperationFailed {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            operation: "upload-part".to_string(),
            reason: e.to_string(),
        })?;
        self.uploads
            .lock()
            .unwrap()
            .get_mut(upload_id)
            .ok_or_else(|| self.not_found(upload_id))?
            .insert(part_number, body);
        Ok(CompletedPart {
            part_number,
            etag: format!("\"etag-{}\"", part_number),
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StoreError> {
        self.record("complete_multipart", key);
        self.guard()?;
        let stored = self
            .uploads
            .lock()
            .unwrap()
            .remove(upload_id)
            .ok_or_else(|| self.not_found(upload_id))?;
        let mut body = Vec::new();
        for part in parts {
            body.extend(stored.get(&part.part_number).cloned().unwrap_or_default());
        }
        self.seed(key, &body, self.next_timestamp());
        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<(), StoreError> {
        self.record("abort_multipart", key);
        self.uploads.lock().unwrap().remove(upload_id);
        Ok(())
    }
}
