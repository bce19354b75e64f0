use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::{InputError, ResumeError};

/// Resume formats the extraction service understands.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "docx", "txt"];

/// A resume chosen by the user, held in memory until upload.
#[derive(Clone, PartialEq, Eq)]
pub struct ResumeFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ResumeFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeFile")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl ResumeFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Reads a resume from disk. Does not check the extension; see `validate_type`.
    pub async fn load(path: &Path) -> Result<Self, ResumeError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ResumeError::MissingFileName(path.to_path_buf()))?
            .to_string();

        let bytes = tokio::fs::read(path).await.map_err(|source| ResumeError::Io {
            path: PathBuf::from(path),
            source,
        })?;

        Ok(Self { file_name, bytes })
    }

    /// Lowercased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    pub fn validate_type(&self) -> Result<(), InputError> {
        match self.extension() {
            Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
            _ => Err(InputError::UnsupportedFileType(self.file_name.clone())),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("pdf") => "application/pdf",
            Some("docx") => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Some("txt") => "text/plain",
            _ => "application/octet-stream",
        }
    }
}
