pub mod config;
pub mod logging;
pub mod slot;
pub mod transport;
pub mod utils;

pub use config::{Config, SlotOptions, TransportConfig};
pub use slot::{
    DropZone,
    InsertContent,
    PendingUpload,
    Placeholder,
    ProgressReporter,
    Result,
    SelectedFile,
    UploadError,
    UploadEvent,
    UploadId,
    UploadOutcome,
    UploadSlot,
    UploadSlotHandle,
    UploadStatus,
    UploadTask,
};
pub use transport::{BlobStore, HttpTransport, LocalTransport, Transport};
