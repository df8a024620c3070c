use std::pin::Pin;
use std::task::{Context, Poll};
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use crate::utils::percentage;
use super::types::{TaskMessage, UploadId};

/// Progress callback handed to a transport for one task.
///
/// Reports are tagged with the task id; the slot drops them once the task is
/// no longer active. Reports made after cancellation are not sent at all.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    upload_id: UploadId,
    cancel: CancellationToken,
    tx: Option<mpsc::UnboundedSender<TaskMessage>>,
}

impl ProgressReporter {
    pub(crate) fn new(
        upload_id: UploadId,
        cancel: CancellationToken,
        tx: mpsc::UnboundedSender<TaskMessage>,
    ) -> Self {
        Self {
            upload_id,
            cancel,
            tx: Some(tx),
        }
    }

    /// A reporter that goes nowhere, for driving transports outside a slot
    pub fn detached() -> Self {
        Self {
            upload_id: UploadId::new(),
            cancel: CancellationToken::new(),
            tx: None,
        }
    }

    pub fn upload_id(&self) -> UploadId {
        self.upload_id
    }

    pub fn report(&self, progress: u8) {
        if self.cancel.is_cancelled() {
            return;
        }

        if let Some(tx) = &self.tx {
            let _ = tx.send(TaskMessage::Progress {
                upload_id: self.upload_id,
                progress: progress.min(100),
            });
        }
    }

    pub fn report_bytes(&self, sent: u64, total: u64) {
        self.report(percentage(sent, total));
    }
}

pin_project! {
    /// 包装字节流，读出数据时上报进度
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        reporter: ProgressReporter,
        bytes_sent: u64,
        total_bytes: u64,
        last_reported: Option<u8>,
    }
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, reporter: ProgressReporter, total_bytes: u64) -> Self {
        Self {
            inner,
            reporter,
            bytes_sent: 0,
            total_bytes,
            last_reported: None,
        }
    }
}

impl<S, E> Stream for ProgressStream<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
{
    type Item = std::result::Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                *this.bytes_sent += chunk.len() as u64;

                // 百分比没变就不重复上报
                let pct = percentage(*this.bytes_sent, *this.total_bytes);
                if *this.last_reported != Some(pct) {
                    *this.last_reported = Some(pct);
                    this.reporter.report(pct);
                }

                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}
