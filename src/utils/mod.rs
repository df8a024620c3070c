pub mod format;

pub use format::{format_bytes, percentage};
