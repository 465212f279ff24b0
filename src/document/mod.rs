//! Text input: the document buffer and file import

mod parser;
mod pdf;

pub use parser::{FileKind, FileParser, InputError, TextFormat, UploadedFile, MAX_FILE_BYTES};
pub use pdf::{join_pages, PageTextExtractor, PdfExtractError, PdfTextExtractor};

/// The text that will be spoken, plus the file it came from (if any)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    text: String,
    source_file_name: Option<String>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_file_name(&self) -> Option<&str> {
        self.source_file_name.as_deref()
    }

    /// Number of characters, as shown under the text box
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Replace the text with typed input. The source file name is kept.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn push_str(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Replace the text with the contents of an imported file
    pub fn load(&mut self, text: String, file_name: impl Into<String>) {
        self.text = text;
        self.source_file_name = Some(file_name.into());
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.source_file_name = None;
    }
}
