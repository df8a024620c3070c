use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use crate::transport::Transport;
use super::errors::{Result, UploadError};
use super::file::SelectedFile;
use super::progress::ProgressReporter;
use super::types::{TaskMessage, UploadId};

/// Runs one transport call and posts its result back to the slot
pub(crate) struct UploadWorker {
    pub(crate) upload_id: UploadId,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) cancellation_token: CancellationToken,
    pub(crate) message_tx: mpsc::UnboundedSender<TaskMessage>,
}

impl UploadWorker {
    pub(crate) fn spawn(self, file: SelectedFile) -> JoinHandle<()> {
        tokio::spawn(async move {
            let upload_id = self.upload_id;
            let message_tx = self.message_tx.clone();
            let result = self.run(file).await;

            trace!(%upload_id, ok = result.is_ok(), "transport returned");
            let _ = message_tx.send(TaskMessage::Finished { upload_id, result });
        })
    }

    async fn run(self, file: SelectedFile) -> Result<String> {
        let reporter = ProgressReporter::new(
            self.upload_id,
            self.cancellation_token.clone(),
            self.message_tx.clone(),
        );

        // 传输层 panic 按失败处理
        let future = self.transport.upload(&file, reporter, self.cancellation_token.clone());
        let url = match AssertUnwindSafe(future).catch_unwind().await {
            Ok(result) => result?,
            Err(_) => return Err(UploadError::internal_error("transport panicked")),
        };

        if url.trim().is_empty() {
            return Err(UploadError::EmptyUrl);
        }

        Ok(url)
    }
}
