use serde::{Deserialize, Serialize};
use super::errors::Result;
use super::file::display_name;

/// 上传成功后交给文档模型的内容节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertContent {
    pub src: String,
    pub alt: String,
    pub title: String,
}

impl InsertContent {
    /// Build the image node for `url`, labelled from the original file name
    pub fn image(url: impl Into<String>, file_name: &str) -> Self {
        let label = display_name(file_name);
        Self {
            src: url.into(),
            alt: label.clone(),
            title: label,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.title
    }
}

/// The document-model side of the upload node.
///
/// Implementors swap their placeholder for the finished content. The URL in
/// `content` is final when this is called.
pub trait Placeholder: Send {
    fn resolve(&mut self, content: InsertContent) -> Result<()>;
}

impl Placeholder for Vec<InsertContent> {
    fn resolve(&mut self, content: InsertContent) -> Result<()> {
        self.push(content);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_labels() {
        let content = InsertContent::image("blob://abc", "holiday.jpeg");
        assert_eq!(content.src, "blob://abc");
        assert_eq!(content.alt, "holiday");
        assert_eq!(content.display_name(), "holiday");

        let content = InsertContent::image("blob://abc", "");
        assert_eq!(content.title, "unknown");
    }

    #[test]
    fn test_json_shape() {
        let content = InsertContent::image("https://cdn/x.png", "x.png");
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["src"], "https://cdn/x.png");
        assert_eq!(json["alt"], "x");
    }
}
