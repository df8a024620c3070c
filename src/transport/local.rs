use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;
use crate::slot::{ProgressReporter, Result, SelectedFile, UploadError};
use crate::utils::percentage;
use super::Transport;

const BLOB_SCHEME: &str = "blob://";

/// In-process object URL store, `blob://<uuid>` -> bytes
#[derive(Debug, Clone, Default)]
pub struct BlobStore {
    blobs: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, data: Bytes) -> String {
        let url = format!("{}{}", BLOB_SCHEME, Uuid::new_v4());
        self.blobs.write().insert(url.clone(), data);
        url
    }

    pub fn get(&self, url: &str) -> Option<Bytes> {
        self.blobs.read().get(url).cloned()
    }

    /// 撤销 URL，返回之前是否存在
    pub fn revoke(&self, url: &str) -> bool {
        self.blobs.write().remove(url).is_some()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

/// Stores uploads in a [`BlobStore`], reporting progress in fixed steps
#[derive(Debug, Clone)]
pub struct LocalTransport {
    store: BlobStore,
    steps: u32,
    step_delay: Duration,
}

impl LocalTransport {
    pub fn new(store: BlobStore) -> Self {
        Self {
            store,
            steps: 10,
            step_delay: Duration::from_millis(100),
        }
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps.max(1);
        self
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn store(&self) -> &BlobStore {
        &self.store
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn upload(
        &self,
        file: &SelectedFile,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<String> {
        progress.report(0);

        for step in 1..=self.steps {
            tokio::select! {
                _ = tokio::time::sleep(self.step_delay) => {}
                _ = cancel.cancelled() => {
                    debug!(upload_id = %progress.upload_id(), file = %file.name, step, "local upload cancelled");
                    return Err(UploadError::Cancelled);
                }
            }

            progress.report(percentage(step as u64, self.steps as u64));
        }

        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        Ok(self.store.create(file.data.clone()))
    }

    fn release(&self, url: &str) {
        if self.store.revoke(url) {
            debug!(url, "blob revoked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> SelectedFile {
        SelectedFile::from_bytes("cat.png", "image/png", vec![9u8; 32])
    }

    #[test]
    fn test_blob_store() {
        let store = BlobStore::new();
        let url = store.create(Bytes::from_static(b"hello"));
        assert!(url.starts_with("blob://"));
        assert_eq!(store.get(&url).unwrap(), Bytes::from_static(b"hello"));
        assert!(store.revoke(&url));
        assert!(!store.revoke(&url));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_upload() {
        let transport = LocalTransport::new(BlobStore::new()).with_steps(4);
        let url = transport
            .upload(&file(), ProgressReporter::detached(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(transport.store().get(&url).unwrap().len(), 32);
        transport.release(&url);
        assert!(transport.store().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_progress_steps() {
        use crate::slot::{TaskMessage, UploadId};

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let upload_id = UploadId::new();
        let reporter = ProgressReporter::new(upload_id, CancellationToken::new(), tx);
        let transport = LocalTransport::new(BlobStore::new()).with_steps(3);
        transport.upload(&file(), reporter, CancellationToken::new()).await.unwrap();

        let mut values = Vec::new();
        while let Ok(TaskMessage::Progress { upload_id: id, progress }) = rx.try_recv() {
            assert_eq!(id, upload_id);
            values.push(progress);
        }
        assert_eq!(values, vec![0, 33, 66, 100]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_upload_cancelled() {
        let transport = LocalTransport::new(BlobStore::new()).with_steps(4);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = transport
            .upload(&file(), ProgressReporter::detached(), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Cancelled));
        assert!(transport.store().is_empty());
    }
}
