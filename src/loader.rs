//! Loading input documents from disk.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Extensions read as plain text when a file input declares no formats.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv", "json", "yaml", "yml", "xml", "html", "log"];

/// A loaded input document, exposed to templates as an object so prompts
/// can reference `{{ doc.content }}`, `{{ doc.name }}`, and so on.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub name: String,
    pub basename: String,
    pub extension: String,
    pub size_bytes: u64,
    pub content: String,
    pub absolute_path: String,
}

impl Document {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Reads a file input into a [`Document`].
pub trait DocumentLoader: Send + Sync {
    /// Load the file at `path`, checking its extension against
    /// `accepted_formats` when that list is non-empty.
    fn load(&self, path: &Path, accepted_formats: &[String]) -> Result<Document>;
}

/// Loader for text-based formats. Content is read as UTF-8.
#[derive(Debug, Default)]
pub struct TextDocumentLoader;

impl DocumentLoader for TextDocumentLoader {
    fn load(&self, path: &Path, accepted_formats: &[String]) -> Result<Document> {
        if !path.exists() {
            return Err(Error::Input(format!(
                "file not found: {}",
                path.display()
            )));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        if accepted_formats.is_empty() {
            if !TEXT_EXTENSIONS.contains(&extension.as_str()) {
                return Err(Error::UnsupportedFormat(format!(
                    ".{} is not a supported text format",
                    extension
                )));
            }
        } else if !accepted_formats
            .iter()
            .any(|f| f.trim_start_matches('.').eq_ignore_ascii_case(&extension))
        {
            return Err(Error::UnsupportedFormat(format!(
                ".{} is not among the accepted formats: {}",
                extension,
                accepted_formats.join(", ")
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Input(format!("cannot read {}: {}", path.display(), e))
        })?;
        let size_bytes = content.len() as u64;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let basename = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let absolute_path = path
            .canonicalize()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| path.display().to_string());

        debug!(file = %name, size_bytes, "loaded document");

        Ok(Document {
            name,
            basename,
            extension,
            size_bytes,
            content,
            absolute_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_text_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "spec.txt", "meter datasheet");

        let doc = TextDocumentLoader.load(&path, &[]).unwrap();
        assert_eq!(doc.name, "spec.txt");
        assert_eq!(doc.basename, "spec");
        assert_eq!(doc.extension, "txt");
        assert_eq!(doc.content, "meter datasheet");
        assert_eq!(doc.size_bytes, 15);
    }

    #[test]
    fn test_missing_file() {
        let err = TextDocumentLoader
            .load(Path::new("/nonexistent/file.txt"), &[])
            .unwrap_err();
        assert_eq!(err.code(), "INPUT_ERROR");
    }

    #[test]
    fn test_declared_formats_enforced() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "data.bin", "x");

        let formats = vec!["txt".to_string(), "md".to_string()];
        let err = TextDocumentLoader.load(&path, &formats).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_declared_formats_accept_dotted_and_mixed_case() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "notes.MD", "# notes");

        let formats = vec![".md".to_string()];
        let doc = TextDocumentLoader.load(&path, &formats).unwrap();
        assert_eq!(doc.extension, "md");
    }

    #[test]
    fn test_unknown_extension_without_declared_formats() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "image.png", "not really");

        let err = TextDocumentLoader.load(&path, &[]).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_document_value_exposes_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "doc.md", "body");

        let value = TextDocumentLoader.load(&path, &[]).unwrap().to_value();
        assert_eq!(value["content"], "body");
        assert_eq!(value["extension"], "md");
    }
}
