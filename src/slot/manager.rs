use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;
use crate::config::SlotOptions;
use crate::transport::Transport;
use super::errors::{Result, UploadError};
use super::file::SelectedFile;
use super::insert::InsertContent;
use super::slot_worker::SlotWorker;
use super::task::UploadTask;
use super::types::{SlotCommand, UploadEvent, UploadId, UploadOutcome, UploadStatus};

/// Handle to a single-file upload slot
#[derive(Clone)]
pub struct UploadSlot {
    options: Arc<SlotOptions>,
    command_tx: mpsc::Sender<SlotCommand>,
    event_tx: broadcast::Sender<UploadEvent>,
}

/// 上传槽位句柄 - 包含槽位和工作协程
pub struct UploadSlotHandle {
    pub slot: UploadSlot,
    pub worker_handle: JoinHandle<()>,
}

impl UploadSlotHandle {
    /// Stop the slot once every clone of `slot` is dropped.
    ///
    /// An upload still in flight is cancelled.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.slot);
        self.worker_handle.await
            .map_err(|err| UploadError::internal_error(format!("Worker panic: {}", err)))
    }
}

/// A submission that passed validation and now owns the slot
#[derive(Debug)]
pub struct PendingUpload {
    pub upload_id: UploadId,
    outcome_rx: oneshot::Receiver<UploadOutcome>,
}

impl PendingUpload {
    /// Wait for the upload to finish, fail, or be cancelled
    pub async fn outcome(self) -> UploadOutcome {
        // 槽位关闭时发送端被丢弃，视为取消
        self.outcome_rx.await.unwrap_or(UploadOutcome::Cancelled)
    }
}

impl UploadSlot {
    pub fn new(transport: Arc<dyn Transport>, options: SlotOptions) -> UploadSlotHandle {
        let (command_tx, command_rx) = mpsc::channel(32);
        // 最大缓存 256 个事件
        let (event_tx, _) = broadcast::channel(256);

        let worker_handle = tokio::spawn(SlotWorker::run(
            transport,
            command_rx,
            event_tx.clone(),
        ));

        let slot = Self {
            options: Arc::new(options),
            command_tx,
            event_tx,
        };

        UploadSlotHandle {
            slot,
            worker_handle,
        }
    }

    pub fn options(&self) -> &SlotOptions {
        &self.options
    }

    /// Validate a selection and start uploading its first file.
    ///
    /// Rejections are returned (and broadcast once as [`UploadEvent::Rejected`])
    /// without touching the slot. Otherwise any previous task is discarded and
    /// the new one is active by the time this returns.
    pub async fn start(&self, files: Vec<SelectedFile>) -> Result<PendingUpload> {
        let file = match self.options.validate(files) {
            Ok(file) => file,
            Err(err) => {
                debug!(error = %err, "selection rejected");
                let _ = self.event_tx.send(UploadEvent::Rejected { error: err.to_string() });
                return Err(err);
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(SlotCommand::Submit { file, reply: reply_tx })
            .await
            .map_err(|_| UploadError::SlotShutdown)?;

        let (upload_id, outcome_rx) = reply_rx
            .await
            .map_err(|_| UploadError::SlotShutdown)?;

        Ok(PendingUpload {
            upload_id,
            outcome_rx,
        })
    }

    /// Submit a selection and wait for the upload.
    ///
    /// `Ok(None)` means the upload was cancelled or replaced by a newer one.
    pub async fn submit(&self, files: Vec<SelectedFile>) -> Result<Option<InsertContent>> {
        let pending = self.start(files).await?;

        match pending.outcome().await {
            UploadOutcome::Completed(content) => Ok(Some(content)),
            UploadOutcome::Failed(err) => Err(err),
            UploadOutcome::Cancelled => Ok(None),
        }
    }

    /// Cancel upload
    pub async fn cancel(&self) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(SlotCommand::Cancel { reply: reply_tx })
            .await
            .map_err(|_| UploadError::SlotShutdown)?;

        reply_rx
            .await
            .map_err(|_| UploadError::SlotShutdown)
    }

    /// Clear the slot
    pub async fn clear(&self) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(SlotCommand::Clear { reply: reply_tx })
            .await
            .map_err(|_| UploadError::SlotShutdown)?;

        reply_rx
            .await
            .map_err(|_| UploadError::SlotShutdown)
    }

    /// Give up a successful result without releasing its URL.
    ///
    /// Returns `false` unless `upload_id` is the slot's task and it succeeded.
    pub async fn detach(&self, upload_id: UploadId) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(SlotCommand::Detach { upload_id, reply: reply_tx })
            .await
            .map_err(|_| UploadError::SlotShutdown)?;

        reply_rx
            .await
            .map_err(|_| UploadError::SlotShutdown)
    }

    /// Get task
    pub async fn get_task(&self) -> Result<Option<UploadTask>> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(SlotCommand::GetTask { reply: reply_tx })
            .await
            .map_err(|_| UploadError::SlotShutdown)?;

        reply_rx
            .await
            .map_err(|_| UploadError::SlotShutdown)
    }

    /// `None` while idle
    pub async fn status(&self) -> Result<Option<UploadStatus>> {
        Ok(self.get_task().await?.map(|task| task.status))
    }

    /// 订阅事件
    ///
    /// 注意：
    /// - 如果接收速度跟不上发送速度，可能会丢失事件（lagged error）
    /// - 每个订阅者都会收到完整的事件副本
    pub fn subscribe_events(&self) -> broadcast::Receiver<UploadEvent> {
        self.event_tx.subscribe()
    }

    pub fn subscribe_filtered<F>(&self, filter: F) -> FilteredEventReceiver<F>
    where
        F: Fn(&UploadEvent) -> bool,
    {
        FilteredEventReceiver {
            receiver: self.event_tx.subscribe(),
            filter,
        }
    }
}

/// 过滤的事件接收器
pub struct FilteredEventReceiver<F> {
    receiver: broadcast::Receiver<UploadEvent>,
    filter: F,
}

impl<F> FilteredEventReceiver<F>
where
    F: Fn(&UploadEvent) -> bool,
{
    pub async fn recv(&mut self) -> Result<UploadEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if (self.filter)(&event) {
                return Ok(event);
            }
        }
    }
}
