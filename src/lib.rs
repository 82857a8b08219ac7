//! # pdf2md
//!
//! PDF to Markdown conversion for Rust.
//!
//! The library reads a PDF container, interprets each page's content stream
//! into positioned text fragments, reconstructs lines and blocks from their
//! geometry and font sizes, and renders headings, list items and paragraphs
//! as Markdown.
//!
//! ## Quick Start
//!
//! ```no_run
//! fn main() -> pdf2md::Result<()> {
//!     let markdown = pdf2md::convert_file("document.pdf")?;
//!     println!("{}", markdown);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Tolerant parsing**: xref streams, object streams, incremental updates,
//!   and linear-scan recovery of damaged cross-reference data
//! - **Structure inference**: headings ranked by font size, bullet and
//!   numbered list items, paragraphs split on vertical gaps
//! - **Parallel processing**: pages are interpreted on the Rayon pool
//! - **Diagnostics**: recovered problems are reported as warnings, never
//!   silently dropped
//! - **Bounded work**: per-page fragment cap, time budget and cancellation

pub mod convert;
pub mod detect;
pub mod error;
pub mod model;
pub mod parser;
pub mod render;

// Re-export commonly used types
pub use convert::{CancellationToken, ConvertOptions, ConvertResult, PdfConverter};
pub use detect::{detect_format_from_bytes, detect_format_from_path, is_pdf, PdfFormat};
pub use error::{Error, Result};
pub use model::{
    Block, BlockKind, Document, ListMarker, Metadata, Page, TextFragment, TextLine, Warning, WarningKind,
};
pub use parser::{ErrorMode, LayoutConfig, ParseOptions};
pub use render::{CleanupOptions, CleanupPreset, MarkdownRenderer, PageSelection, RenderOptions};

use std::io::Read;
use std::path::Path;

/// Convert a PDF file to Markdown with default options.
///
/// # Example
///
/// ```no_run
/// let markdown = pdf2md::convert_file("document.pdf").unwrap();
/// std::fs::write("output.md", markdown).unwrap();
/// ```
pub fn convert_file<P: AsRef<Path>>(path: P) -> Result<String> {
    Ok(convert_file_with_options(path, &ConvertOptions::default())?.markdown)
}

/// Convert a PDF file with custom options, keeping warnings and metadata.
pub fn convert_file_with_options<P: AsRef<Path>>(path: P, options: &ConvertOptions) -> Result<ConvertResult> {
    let data = std::fs::read(path)?;
    convert(data, options)
}

/// Convert PDF bytes to Markdown with default options.
///
/// # Example
///
/// ```no_run
/// let data = std::fs::read("document.pdf").unwrap();
/// let markdown = pdf2md::convert_bytes(&data).unwrap();
/// ```
pub fn convert_bytes(data: &[u8]) -> Result<String> {
    Ok(convert_bytes_with_options(data, &ConvertOptions::default())?.markdown)
}

/// Convert PDF bytes with custom options.
pub fn convert_bytes_with_options(data: &[u8], options: &ConvertOptions) -> Result<ConvertResult> {
    convert(data.to_vec(), options)
}

/// Convert an owned PDF buffer with custom options.
pub fn convert(data: Vec<u8>, options: &ConvertOptions) -> Result<ConvertResult> {
    PdfConverter::new(options.clone()).convert(data)
}

/// Convert a PDF read from any reader.
///
/// # Example
///
/// ```no_run
/// use std::fs::File;
///
/// let file = File::open("document.pdf").unwrap();
/// let markdown = pdf2md::convert_reader(file).unwrap();
/// ```
pub fn convert_reader<R: Read>(reader: R) -> Result<String> {
    Ok(convert_reader_with_options(reader, &ConvertOptions::default())?.markdown)
}

/// Convert a PDF read from any reader with custom options.
pub fn convert_reader_with_options<R: Read>(mut reader: R, options: &ConvertOptions) -> Result<ConvertResult> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    convert(data, options)
}

/// Extract plain text (blocks separated by blank lines, no Markdown markers).
pub fn extract_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let data = std::fs::read(path)?;
    let (document, _) = PdfConverter::default().extract(data)?;
    Ok(document.plain_text())
}

/// Builder for configuring and running conversions.
///
/// # Example
///
/// ```no_run
/// use pdf2md::{CleanupPreset, Pdf2Md};
///
/// let result = Pdf2Md::new()
///     .with_frontmatter()
///     .with_cleanup(CleanupPreset::Aggressive)
///     .with_fragment_cap(10_000)
///     .convert_file("document.pdf")?;
/// println!("{}", result.markdown);
/// # Ok::<(), pdf2md::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Pdf2Md {
    options: ConvertOptions,
    cancel: Option<CancellationToken>,
}

impl Pdf2Md {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse degraded recovery of damaged files.
    pub fn strict(mut self) -> Self {
        self.options.parse = self.options.parse.strict();
        self
    }

    /// Allow degraded recovery of damaged files (the default).
    pub fn lenient(mut self) -> Self {
        self.options.parse = self.options.parse.lenient();
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.options.parse = self.options.parse.sequential();
        self
    }

    /// Run pages on a dedicated pool of `threads` workers.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.options.parse = self.options.parse.with_threads(threads);
        self
    }

    /// Set the per-page fragment cap.
    pub fn with_fragment_cap(mut self, cap: usize) -> Self {
        self.options.parse = self.options.parse.with_fragment_cap(cap);
        self
    }

    /// Set the heading size ratio.
    pub fn with_heading_ratio(mut self, ratio: f32) -> Self {
        self.options.layout = self.options.layout.with_heading_ratio(ratio);
        self
    }

    /// Enable frontmatter in output.
    pub fn with_frontmatter(mut self) -> Self {
        self.options.render = self.options.render.with_frontmatter(true);
        self
    }

    /// Rejoin words hyphenated across line breaks.
    pub fn with_dehyphenation(mut self) -> Self {
        self.options.render = self.options.render.with_dehyphenation(true);
        self
    }

    /// Set cleanup preset.
    pub fn with_cleanup(mut self, preset: CleanupPreset) -> Self {
        self.options.render = self.options.render.with_cleanup_preset(preset);
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.options.parse = self.options.parse.with_pages(pages);
        self
    }

    /// Abort conversions when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    fn converter(&self) -> PdfConverter {
        let converter = PdfConverter::new(self.options.clone());
        match &self.cancel {
            Some(token) => converter.with_cancellation(token.clone()),
            None => converter,
        }
    }

    /// Convert a PDF file.
    pub fn convert_file<P: AsRef<Path>>(&self, path: P) -> Result<ConvertResult> {
        let data = std::fs::read(path)?;
        self.converter().convert(data)
    }

    /// Convert PDF bytes.
    pub fn convert_bytes(&self, data: &[u8]) -> Result<ConvertResult> {
        self.converter().convert_bytes(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_options() {
        let builder = Pdf2Md::new()
            .strict()
            .with_frontmatter()
            .with_cleanup(CleanupPreset::Aggressive)
            .with_fragment_cap(100)
            .with_heading_ratio(1.4)
            .sequential();

        let options = builder.options();
        assert_eq!(options.parse.error_mode, ErrorMode::Strict);
        assert!(!options.parse.parallel);
        assert_eq!(options.parse.fragment_cap, 100);
        assert_eq!(options.layout.heading_size_ratio, 1.4);
        assert!(options.render.include_frontmatter);
        assert_eq!(options.render.cleanup, Some(CleanupOptions::aggressive()));
    }

    #[test]
    fn test_builder_default() {
        let builder = Pdf2Md::default();
        assert!(!builder.options().render.include_frontmatter);
        assert_eq!(builder.options().parse.error_mode, ErrorMode::Lenient);
    }

    #[test]
    fn test_builder_with_pages() {
        let builder = Pdf2Md::new().with_pages(PageSelection::Range(1..=5));
        assert_eq!(builder.options().parse.pages, PageSelection::Range(1..=5));
    }

    #[test]
    fn test_convert_bytes_empty_data() {
        let result = convert_bytes(&[]);
        assert!(matches!(result, Err(Error::Input(_))));
    }

    #[test]
    fn test_convert_bytes_not_pdf() {
        let result = convert_bytes(b"<!DOCTYPE html><html></html>");
        assert!(matches!(result, Err(Error::Input(_))));
    }

    #[test]
    fn test_convert_bytes_truncated_header() {
        let result = convert_bytes(b"%PDF");
        assert!(result.is_err());
    }

    #[test]
    fn test_convert_reader_propagates_input_error() {
        let result = convert_reader(std::io::Cursor::new(Vec::<u8>::new()));
        assert!(matches!(result, Err(Error::Input(_))));
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let result = Pdf2Md::new().with_cancellation(token).convert_bytes(b"%PDF-1.4\n");
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_missing_file() {
        let result = convert_file("/nonexistent/input.pdf");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
