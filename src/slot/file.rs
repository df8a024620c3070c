use std::fmt;
use std::path::Path;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use super::errors::{Result, UploadError};

/// 用户选择（或拖入）的文件
#[derive(Clone)]
pub struct SelectedFile {
    pub name: String,
    pub size: u64,
    pub mime: String,
    pub data: Bytes,
}

impl SelectedFile {
    pub fn from_bytes(name: impl Into<String>, mime: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            mime: mime.into(),
            data,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(UploadError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            )));
        }

        let name = path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        let mime = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let data = tokio::fs::read(path).await?;

        Ok(Self::from_bytes(name, mime, data))
    }

    /// File name without its last extension, used as the image alt/title
    pub fn display_name(&self) -> String {
        display_name(&self.name)
    }

    pub fn info(&self) -> FileInfo {
        FileInfo {
            name: self.name.clone(),
            size: self.size,
            mime: self.mime.clone(),
        }
    }
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("mime", &self.mime)
            .finish()
    }
}

/// 任务里只保留文件的元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub mime: String,
}

pub(crate) fn display_name(file_name: &str) -> String {
    // 扩展名至少一个字符且不跨路径分隔符，`"file."` 保持原样
    let stem = match file_name.rfind('.') {
        Some(index) if index + 1 < file_name.len() && !file_name[index + 1..].contains('/') => {
            &file_name[..index]
        }
        _ => file_name,
    };

    if stem.is_empty() {
        "unknown".to_string()
    } else {
        stem.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AcceptRule {
    /// `.png`
    Extension(String),
    /// `image/*`
    Wildcard(String),
    /// `application/pdf`
    Exact(String),
}

/// HTML `accept` attribute, e.g. `"image/*, .pdf"`
#[derive(Debug, Clone, Default)]
pub struct AcceptList {
    raw: String,
    rules: Vec<AcceptRule>,
}

impl AcceptList {
    pub fn parse(raw: &str) -> Self {
        let rules = raw
            .split(',')
            .map(|rule| rule.trim().to_ascii_lowercase())
            .filter(|rule| !rule.is_empty())
            .map(|rule| {
                if rule.starts_with('.') {
                    AcceptRule::Extension(rule)
                } else if let Some(prefix) = rule.strip_suffix("/*") {
                    AcceptRule::Wildcard(format!("{}/", prefix))
                } else {
                    AcceptRule::Exact(rule)
                }
            })
            .collect();

        Self {
            raw: raw.to_string(),
            rules,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn accepts(&self, file: &SelectedFile) -> bool {
        if self.rules.is_empty() {
            return true;
        }

        let mime = file.mime.to_ascii_lowercase();
        let name = file.name.to_ascii_lowercase();

        self.rules.iter().any(|rule| match rule {
            AcceptRule::Extension(ext) => name.ends_with(ext.as_str()),
            AcceptRule::Wildcard(prefix) => prefix == "*/" || mime.starts_with(prefix.as_str()),
            AcceptRule::Exact(exact) => mime == *exact,
        })
    }
}
