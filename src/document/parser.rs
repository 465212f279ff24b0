//! File import for plain text formats and PDF

use super::pdf::{join_pages, PageTextExtractor, PdfExtractError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Largest file accepted for import (5 MiB)
pub const MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("File is too large ({size} bytes). Maximum size is 5 MB")]
    FileTooLarge { size: u64 },
    #[error("Unsupported file type: {0}. Accepted types: .txt, .md, .json, .html, .csv, .pdf")]
    UnsupportedFormat(String),
    #[error("Failed to read file: {0}")]
    FileError(String),
    #[error("Failed to extract text from PDF: {0}")]
    Pdf(#[from] PdfExtractError),
}

/// Plain text formats that are read verbatim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Markdown,
    Json,
    Html,
    Csv,
}

/// How an imported file is turned into text, decided once per import
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Text(TextFormat),
    Rejected(String),
}

#[derive(Debug, Clone)]
enum FileBody {
    Memory(Vec<u8>),
    Disk(PathBuf),
}

/// A file chosen by the user. Contents are only read after validation.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    name: String,
    media_type: Option<String>,
    size: u64,
    body: FileBody,
}

impl UploadedFile {
    pub fn from_bytes(name: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: None,
            size: contents.len() as u64,
            body: FileBody::Memory(contents),
        }
    }

    /// Reference a file on disk. Only its metadata is read here.
    pub fn from_path(path: &Path) -> Result<Self, InputError> {
        let metadata = fs::metadata(path).map_err(|e| InputError::FileError(e.to_string()))?;
        if !metadata.is_file() {
            return Err(InputError::FileError(format!("{} is not a file", path.display())));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("Unknown")
            .to_string();

        Ok(Self {
            name,
            media_type: None,
            size: metadata.len(),
            body: FileBody::Disk(path.to_path_buf()),
        })
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default()
    }

    fn read(&self) -> Result<Vec<u8>, InputError> {
        match &self.body {
            FileBody::Memory(bytes) => Ok(bytes.clone()),
            FileBody::Disk(path) => fs::read(path).map_err(|e| InputError::FileError(e.to_string())),
        }
    }
}

/// Turns uploaded files into document text
#[derive(Clone)]
pub struct FileParser {
    extractor: Arc<dyn PageTextExtractor>,
}

impl FileParser {
    pub fn new(extractor: Arc<dyn PageTextExtractor>) -> Self {
        Self { extractor }
    }

    /// Resolve the file kind from its media type, falling back to the extension
    pub fn classify(file: &UploadedFile) -> FileKind {
        let by_media_type = file.media_type.as_deref().and_then(|mt| {
            let essence = mt.split(';').next().unwrap_or_default().trim().to_lowercase();
            match essence.as_str() {
                "application/pdf" => Some(FileKind::Pdf),
                "text/plain" => Some(FileKind::Text(TextFormat::Plain)),
                "text/markdown" => Some(FileKind::Text(TextFormat::Markdown)),
                "application/json" => Some(FileKind::Text(TextFormat::Json)),
                "text/html" => Some(FileKind::Text(TextFormat::Html)),
                "text/csv" => Some(FileKind::Text(TextFormat::Csv)),
                _ => None,
            }
        });
        if let Some(kind) = by_media_type {
            return kind;
        }

        let extension = file.extension();
        match extension.as_str() {
            "pdf" => FileKind::Pdf,
            "txt" => FileKind::Text(TextFormat::Plain),
            "md" => FileKind::Text(TextFormat::Markdown),
            "json" => FileKind::Text(TextFormat::Json),
            "html" => FileKind::Text(TextFormat::Html),
            "csv" => FileKind::Text(TextFormat::Csv),
            "" => FileKind::Rejected(file.name.clone()),
            other => FileKind::Rejected(format!(".{}", other)),
        }
    }

    /// Size and type checks. Nothing is read from disk.
    pub fn validate(file: &UploadedFile) -> Result<FileKind, InputError> {
        if file.size > MAX_FILE_BYTES {
            return Err(InputError::FileTooLarge { size: file.size });
        }
        match Self::classify(file) {
            FileKind::Rejected(what) => Err(InputError::UnsupportedFormat(what)),
            kind => Ok(kind),
        }
    }

    /// Read the file and produce its text. Blocking; PDF extraction can be slow.
    pub fn parse(&self, file: &UploadedFile, kind: &FileKind) -> Result<String, InputError> {
        let bytes = file.read()?;
        // The size on disk may have changed since validation
        if bytes.len() as u64 > MAX_FILE_BYTES {
            return Err(InputError::FileTooLarge { size: bytes.len() as u64 });
        }

        match kind {
            FileKind::Pdf => {
                let pages = self.extractor.extract_pages(&bytes)?;
                Ok(join_pages(&pages))
            }
            FileKind::Text(_) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            FileKind::Rejected(what) => Err(InputError::UnsupportedFormat(what.clone())),
        }
    }
}
