use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::file::FileInfo;
use super::types::{UploadId, UploadStatus};

/// 槽位中的上传任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTask {
    pub id: UploadId,
    pub file: FileInfo,
    /// 0..=100, 上传中单调不减
    pub progress: u8,
    pub status: UploadStatus,
    /// 仅在 `Success` 时存在
    pub result_url: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadTask {
    pub fn new(file: FileInfo) -> Self {
        Self {
            id: UploadId::new(),
            file,
            progress: 0,
            status: UploadStatus::Uploading,
            result_url: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_valid_transition(from: UploadStatus, to: UploadStatus) -> bool {
        use UploadStatus::*;

        matches!((from, to), (Uploading, Uploading) | (Uploading, Success) | (Uploading, Error))
    }

    /// Apply a progress report. Returns `true` when the stored value moved.
    ///
    /// Values only move forward and are capped at 100; terminal tasks ignore reports.
    pub fn apply_progress(&mut self, progress: u8) -> bool {
        if self.status != UploadStatus::Uploading {
            return false;
        }

        let progress = progress.min(100);
        if progress <= self.progress {
            return false;
        }

        self.progress = progress;
        true
    }

    pub fn succeed(&mut self, url: String) -> bool {
        if !Self::is_valid_transition(self.status, UploadStatus::Success) {
            return false;
        }

        self.status = UploadStatus::Success;
        self.progress = 100;
        self.result_url = Some(url);
        self.completed_at = Some(Utc::now());
        true
    }

    pub fn fail(&mut self, error: String) -> bool {
        if !Self::is_valid_transition(self.status, UploadStatus::Error) {
            return false;
        }

        self.status = UploadStatus::Error;
        self.progress = 0;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
        true
    }

    pub fn is_uploading(&self) -> bool {
        self.status == UploadStatus::Uploading
    }
}
