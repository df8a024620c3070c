mod dropzone;
mod errors;
mod file;
mod insert;
mod manager;
mod progress;
mod slot_worker;
mod task;
mod types;
mod validate;
mod worker;

pub use dropzone::DropZone;
pub use errors::{Result, UploadError};
pub use file::{AcceptList, FileInfo, SelectedFile};
pub use insert::{InsertContent, Placeholder};
pub use manager::{FilteredEventReceiver, PendingUpload, UploadSlot, UploadSlotHandle};
pub use progress::{ProgressReporter, ProgressStream};
pub use task::UploadTask;
pub use types::{UploadEvent, UploadId, UploadOutcome, UploadStatus};
#[cfg(test)]
pub(crate) use types::TaskMessage;
