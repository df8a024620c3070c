mod http;
mod local;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use crate::slot::{ProgressReporter, Result, SelectedFile};

pub use http::HttpTransport;
pub use local::{BlobStore, LocalTransport};

/// 上传传输层，所有上传实现都必须实现此接口
#[async_trait]
pub trait Transport: Send + Sync {
    /// Upload `file` and resolve to the URL of the stored resource.
    ///
    /// Implementations should stop producing progress and return soon after
    /// `cancel` fires. Anything they return afterwards is discarded by the slot.
    async fn upload(
        &self,
        file: &SelectedFile,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<String>;

    /// Release a URL produced by [`Transport::upload`] that is no longer needed
    fn release(&self, _url: &str) {}
}
