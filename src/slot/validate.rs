use crate::config::SlotOptions;
use super::errors::{Result, UploadError};
use super::file::{AcceptList, SelectedFile};

impl SlotOptions {
    /// Pick the file to upload out of a selection, or reject the selection.
    ///
    /// Runs before any task exists; a rejection never touches the slot.
    pub fn validate(&self, files: Vec<SelectedFile>) -> Result<SelectedFile> {
        if files.is_empty() {
            return Err(UploadError::NoFileSelected);
        }

        if self.limit > 0 && files.len() > self.limit {
            return Err(UploadError::TooManyFiles {
                count: files.len(),
                limit: self.limit,
            });
        }

        // 只上传第一个文件
        let file = files.into_iter().next().ok_or(UploadError::NoFileSelected)?;

        if file.size > self.max_size {
            return Err(UploadError::SizeExceeded {
                size: file.size,
                max: self.max_size,
            });
        }

        let accept = AcceptList::parse(&self.accept);
        if !accept.accepts(&file) {
            return Err(UploadError::UnsupportedType {
                mime: file.mime.clone(),
                accept: accept.as_str().to_string(),
            });
        }

        Ok(file)
    }
}
