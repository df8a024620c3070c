use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;
use super::errors::{Result, UploadError};
use super::file::SelectedFile;
use super::insert::InsertContent;
use super::task::UploadTask;

/// 上传任务唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct UploadId(Uuid);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 上传状态，空闲（没有任务）用 `Option<UploadStatus>::None` 表示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// 上传中
    Uploading,
    /// 已完成
    Success,
    /// 失败
    Error,
}

/// 上传事件
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// 新任务占用了槽位
    Started {
        upload_id: UploadId,
        file_name: String,
    },

    /// 进度更新
    Progress {
        upload_id: UploadId,
        progress: u8,
    },

    /// 任务完成
    Completed {
        upload_id: UploadId,
        content: InsertContent,
    },

    /// 上传失败
    Failed {
        upload_id: UploadId,
        error: String,
    },

    /// 校验未通过，没有创建任务
    Rejected {
        error: String,
    },

    /// 任务被取消（显式取消或被新任务替换）
    Cancelled {
        upload_id: UploadId,
    },

    /// 槽位被清空
    Cleared {
        upload_id: UploadId,
    },

    /// 结果已交给文档，槽位回到空闲，URL 不再由槽位释放
    Detached {
        upload_id: UploadId,
    },
}

impl UploadEvent {
    pub fn upload_id(&self) -> Option<UploadId> {
        match self {
            UploadEvent::Started { upload_id, .. }
            | UploadEvent::Progress { upload_id, .. }
            | UploadEvent::Completed { upload_id, .. }
            | UploadEvent::Failed { upload_id, .. }
            | UploadEvent::Cancelled { upload_id }
            | UploadEvent::Cleared { upload_id }
            | UploadEvent::Detached { upload_id } => Some(*upload_id),
            UploadEvent::Rejected { .. } => None,
        }
    }
}

/// 单次上传的最终结果
#[derive(Debug)]
pub enum UploadOutcome {
    Completed(InsertContent),
    Failed(UploadError),
    Cancelled,
}

/// 槽位命令
pub(crate) enum SlotCommand {
    /// 提交已校验的文件
    Submit {
        file: SelectedFile,
        reply: oneshot::Sender<(UploadId, oneshot::Receiver<UploadOutcome>)>,
    },

    /// 取消
    Cancel {
        reply: oneshot::Sender<bool>,
    },

    /// 清空
    Clear {
        reply: oneshot::Sender<bool>,
    },

    /// 交出已成功任务的结果
    Detach {
        upload_id: UploadId,
        reply: oneshot::Sender<bool>,
    },

    /// 获取任务信息
    GetTask {
        reply: oneshot::Sender<Option<UploadTask>>,
    },
}

/// 上传协程回报给槽位的消息，都带着任务 id
#[derive(Debug)]
pub(crate) enum TaskMessage {
    Progress {
        upload_id: UploadId,
        progress: u8,
    },

    Finished {
        upload_id: UploadId,
        result: Result<String>,
    },
}

// 静态断言确保类型是 Send 的
const _: () = {
    fn assert_send<T: Send>() {}
    fn assert_types() {
        assert_send::<UploadTask>();
        assert_send::<UploadEvent>();
        assert_send::<TaskMessage>();
        assert_send::<SlotCommand>();
    }
};
