//! Markdown document access.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Check that `path` exists and has a `.md` extension.
pub fn validate_markdown(path: &Path) -> Result<(), DocumentError> {
    if !path.exists() {
        return Err(DocumentError::NotFound(path.to_path_buf()));
    }
    let is_markdown = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
    if !is_markdown {
        return Err(DocumentError::NotMarkdown(path.to_path_buf()));
    }
    Ok(())
}

/// Read a document as UTF-8 text.
pub fn load_document(path: &Path) -> Result<String, DocumentError> {
    Ok(std::fs::read_to_string(path)?)
}

/// Path next to `input` named `<stem><suffix>.md`.
pub fn output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}{suffix}.md"))
}

/// Appends text to the end of an existing document.
#[derive(Debug)]
pub struct AppendWriter {
    file: std::fs::File,
}

impl AppendWriter {
    /// Open `path` for appending. The file must already exist.
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self { file })
    }

    /// Append `text` and flush it to disk.
    pub fn write_str(&mut self, text: &str) -> std::io::Result<()> {
        self.file.write_all(text.as_bytes())?;
        self.file.flush()
    }
}

/// Append a complete answer as its own paragraph.
pub fn append_answer(path: &Path, answer: &str) -> Result<(), DocumentError> {
    let mut writer = AppendWriter::open(path)?;
    writer.write_str(&format!("\n\n{answer}\n"))?;
    Ok(())
}

/// Errors from document access.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("file must have .md extension: {}", .0.display())]
    NotMarkdown(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
