use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use crate::transport::Transport;
use super::errors::Result;
use super::file::SelectedFile;
use super::insert::InsertContent;
use super::task::UploadTask;
use super::types::{SlotCommand, TaskMessage, UploadEvent, UploadId, UploadOutcome, UploadStatus};
use super::worker::UploadWorker;

/// 关闭时等待未结束的传输回报结果的最长时间
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

struct ActiveTask {
    task: UploadTask,
    cancellation_token: CancellationToken,
    outcome_tx: Option<oneshot::Sender<UploadOutcome>>,
}

impl ActiveTask {
    fn send_outcome(&mut self, outcome: UploadOutcome) {
        if let Some(tx) = self.outcome_tx.take() {
            let _ = tx.send(outcome);
        }
    }
}

/// Owner of the active-task slot.
///
/// Every state change happens inside [`SlotWorker::run`]; transports only
/// talk to it through [`TaskMessage`]s tagged with their task id.
pub(crate) struct SlotWorker {
    transport: Arc<dyn Transport>,
    active: Option<ActiveTask>,
    /// 还没回报结果的传输数量（包括已取消的）
    in_flight: usize,

    event_tx: broadcast::Sender<UploadEvent>,
    message_tx: mpsc::UnboundedSender<TaskMessage>,
    message_rx: mpsc::UnboundedReceiver<TaskMessage>,
}

impl SlotWorker {
    pub(crate) async fn run(
        transport: Arc<dyn Transport>,
        mut command_rx: mpsc::Receiver<SlotCommand>,
        event_tx: broadcast::Sender<UploadEvent>,
    ) {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let mut worker = Self {
            transport,
            active: None,
            in_flight: 0,
            event_tx,
            message_tx,
            message_rx,
        };

        // 主事件循环
        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(command) => worker.handle_command(command),
                    None => break,
                },
                Some(message) = worker.message_rx.recv() => {
                    worker.handle_message(message);
                }
            }
        }

        worker.shutdown().await;
    }

    fn handle_command(&mut self, command: SlotCommand) {
        match command {
            SlotCommand::Submit { file, reply } => {
                let started = self.start_upload(file);
                let _ = reply.send(started);
            }
            SlotCommand::Cancel { reply } => {
                let _ = reply.send(self.cancel_upload());
            }
            SlotCommand::Clear { reply } => {
                let _ = reply.send(self.clear());
            }
            SlotCommand::Detach { upload_id, reply } => {
                let _ = reply.send(self.detach(upload_id));
            }
            SlotCommand::GetTask { reply } => {
                let task = self.active.as_ref().map(|active| active.task.clone());
                let _ = reply.send(task);
            }
        }
    }

    fn start_upload(&mut self, file: SelectedFile) -> (UploadId, oneshot::Receiver<UploadOutcome>) {
        // 先让出槽位，旧任务的取消信号要在新任务生效前触发
        self.discard_active();

        let task = UploadTask::new(file.info());
        let upload_id = task.id;
        let cancellation_token = CancellationToken::new();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        UploadWorker {
            upload_id,
            transport: self.transport.clone(),
            cancellation_token: cancellation_token.clone(),
            message_tx: self.message_tx.clone(),
        }
        .spawn(file.clone());
        self.in_flight += 1;

        debug!(%upload_id, file = %file.name, size = file.size, "upload started");
        self.active = Some(ActiveTask {
            task,
            cancellation_token,
            outcome_tx: Some(outcome_tx),
        });
        self.emit(UploadEvent::Started { upload_id, file_name: file.name });

        (upload_id, outcome_rx)
    }

    /// Cancel the in-flight upload. Returns `false` when nothing is uploading.
    fn cancel_upload(&mut self) -> bool {
        match &self.active {
            Some(active) if active.task.is_uploading() => {}
            _ => return false,
        }

        if let Some(mut active) = self.active.take() {
            let upload_id = active.task.id;
            active.cancellation_token.cancel();
            active.send_outcome(UploadOutcome::Cancelled);
            debug!(%upload_id, progress = active.task.progress, "upload cancelled");
            self.emit(UploadEvent::Cancelled { upload_id });
        }

        true
    }

    /// Empty the slot, releasing the result URL. In-flight uploads are cancelled.
    fn clear(&mut self) -> bool {
        let uploading = match &self.active {
            Some(active) => active.task.is_uploading(),
            None => return false,
        };

        if uploading {
            return self.cancel_upload();
        }

        if let Some(mut active) = self.active.take() {
            let upload_id = active.task.id;
            if let Some(url) = active.task.result_url.take() {
                self.release(&url);
            }
            debug!(%upload_id, "slot cleared");
            self.emit(UploadEvent::Cleared { upload_id });
        }

        true
    }

    /// Hand a successful result over to its new owner. The slot goes idle
    /// without releasing the URL.
    fn detach(&mut self, upload_id: UploadId) -> bool {
        match &self.active {
            Some(active) if active.task.id == upload_id && active.task.status == UploadStatus::Success => {}
            _ => return false,
        }

        self.active = None;
        debug!(%upload_id, "result handed off");
        self.emit(UploadEvent::Detached { upload_id });
        true
    }

    fn discard_active(&mut self) {
        if !self.cancel_upload() {
            self.clear();
        }
    }

    fn handle_message(&mut self, message: TaskMessage) {
        match message {
            TaskMessage::Progress { upload_id, progress } => {
                let active = match self.active.as_mut() {
                    Some(active) if active.task.id == upload_id => active,
                    _ => {
                        trace!(%upload_id, progress, "stale progress dropped");
                        return;
                    }
                };

                if active.task.apply_progress(progress) {
                    let progress = active.task.progress;
                    self.emit(UploadEvent::Progress { upload_id, progress });
                }
            }
            TaskMessage::Finished { upload_id, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.handle_finished(upload_id, result);
            }
        }
    }

    fn handle_finished(&mut self, upload_id: UploadId, result: Result<String>) {
        let active = match self.active.as_mut() {
            Some(active) if active.task.id == upload_id && active.task.is_uploading() => active,
            _ => {
                // 已取消或被替换的任务，迟到的 URL 没人会用，直接释放
                if let Ok(url) = result {
                    debug!(%upload_id, "stale upload resolved, releasing");
                    self.release(&url);
                } else {
                    trace!(%upload_id, "stale upload result dropped");
                }
                return;
            }
        };

        match result {
            Ok(url) => {
                let content = InsertContent::image(url.clone(), &active.task.file.name);
                active.task.succeed(url);
                active.send_outcome(UploadOutcome::Completed(content.clone()));
                debug!(%upload_id, "upload completed");
                self.emit(UploadEvent::Completed { upload_id, content });
            }
            Err(err) => {
                let message = err.to_string();
                active.task.fail(message.clone());
                active.send_outcome(UploadOutcome::Failed(err));
                warn!(%upload_id, error = %message, "upload failed");
                self.emit(UploadEvent::Failed { upload_id, error: message });
            }
        }
    }

    fn release(&self, url: &str) {
        trace!(url, "releasing upload url");
        self.transport.release(url);
    }

    fn emit(&self, event: UploadEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Cancel whatever is uploading and wait briefly for outstanding
    /// transports so late URLs can still be released.
    async fn shutdown(mut self) {
        self.cancel_upload();

        if self.in_flight == 0 {
            return;
        }

        debug!(in_flight = self.in_flight, "waiting for transports before shutdown");
        let drain = async {
            while self.in_flight > 0 {
                match self.message_rx.recv().await {
                    Some(message) => self.handle_message(message),
                    None => break,
                }
            }
        };

        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!("transports still running at shutdown");
        }
    }
}
