use tracing::{debug, warn};
use super::errors::{Result, UploadError};
use super::file::SelectedFile;
use super::insert::{InsertContent, Placeholder};
use super::manager::UploadSlot;
use super::types::UploadOutcome;

/// Drag-and-drop area and file input of the image upload node.
///
/// The zone only takes files while its slot is idle. Once an image is
/// inserted the slot hands the URL to the document, so `remove` and later
/// drops never revoke it.
pub struct DropZone<P> {
    slot: UploadSlot,
    placeholder: P,
    dragover: bool,
}

impl<P: Placeholder> DropZone<P> {
    pub fn new(slot: UploadSlot, placeholder: P) -> Self {
        Self {
            slot,
            placeholder,
            dragover: false,
        }
    }

    pub fn is_dragover(&self) -> bool {
        self.dragover
    }

    pub fn drag_over(&mut self) {
        self.dragover = true;
    }

    pub fn drag_leave(&mut self) {
        self.dragover = false;
    }

    /// Files dropped onto the zone
    pub async fn drop_files(&mut self, files: Vec<SelectedFile>) -> Result<Option<InsertContent>> {
        self.dragover = false;
        self.upload(files).await
    }

    /// Files picked through the file input
    pub async fn select_files(&mut self, files: Vec<SelectedFile>) -> Result<Option<InsertContent>> {
        self.upload(files).await
    }

    /// Clicking the zone opens the file picker only while the slot is empty
    pub async fn can_browse(&self) -> Result<bool> {
        Ok(self.slot.get_task().await?.is_none())
    }

    /// The remove button on the preview. No-op after the image was inserted.
    pub async fn remove(&self) -> Result<bool> {
        self.slot.clear().await
    }

    pub fn slot(&self) -> &UploadSlot {
        &self.slot
    }

    pub fn placeholder(&self) -> &P {
        &self.placeholder
    }

    async fn upload(&mut self, files: Vec<SelectedFile>) -> Result<Option<InsertContent>> {
        // 有预览（上传中、成功未插入或失败）时拖放区不接收文件
        if !self.can_browse().await? {
            debug!(files = files.len(), "slot occupied, selection ignored");
            return Err(UploadError::SlotOccupied);
        }

        let pending = self.slot.start(files).await?;
        let upload_id = pending.upload_id;
        let content = match pending.outcome().await {
            UploadOutcome::Completed(content) => content,
            UploadOutcome::Failed(err) => return Err(err),
            UploadOutcome::Cancelled => return Ok(None),
        };

        if let Err(err) = self.placeholder.resolve(content.clone()) {
            warn!(error = %err, src = %content.src, "failed to replace upload placeholder");
            return Err(err);
        }

        // URL 归文档所有
        self.slot.detach(upload_id).await?;
        Ok(Some(content))
    }
}
