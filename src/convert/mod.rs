//! End-to-end conversion from PDF bytes to Markdown.
//!
//! The object table is built once, then every selected page is interpreted
//! and laid out independently (on the rayon pool by default). Pages are
//! reassembled in document order and rendered only after all of them have
//! finished, so a failed or cancelled conversion never yields partial text.
//!
//! # Example
//!
//! ```no_run
//! use pdf2md::convert::{ConvertOptions, PdfConverter};
//!
//! fn main() -> pdf2md::Result<()> {
//!     let data = std::fs::read("document.pdf")?;
//!     let result = PdfConverter::new(ConvertOptions::default()).convert(data)?;
//!     println!("{}", result.markdown);
//!     for warning in &result.warnings {
//!         eprintln!("{warning}");
//!     }
//!     Ok(())
//! }
//! ```

mod pdf;

pub use pdf::PdfConverter;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{Document, Metadata, Warning, WarningKind};
use crate::parser::{LayoutConfig, ParseOptions};
use crate::render::RenderOptions;

/// Options for document conversion.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Container parsing and content interpretation
    pub parse: ParseOptions,

    /// Line, block and heading reconstruction
    pub layout: LayoutConfig,

    /// Markdown rendering
    pub render: RenderOptions,
}

impl ConvertOptions {
    /// Create new conversion options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set parsing options.
    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.parse = options;
        self
    }

    /// Set layout configuration.
    pub fn with_layout(mut self, config: LayoutConfig) -> Self {
        self.layout = config;
        self
    }

    /// Set rendering options.
    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render = options;
        self
    }
}

/// Result of document conversion.
#[derive(Debug, Clone)]
pub struct ConvertResult {
    /// Rendered Markdown
    pub markdown: String,

    /// Recovered problems, ordered by page then kind
    pub warnings: Vec<Warning>,

    /// Source document metadata
    pub metadata: Metadata,

    /// Reconstructed pages the Markdown was rendered from
    pub document: Document,
}

impl ConvertResult {
    /// Get content length in bytes.
    pub fn content_len(&self) -> usize {
        self.markdown.len()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Warnings of one kind.
    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }

    /// Warnings as a pretty-printed JSON array.
    pub fn warnings_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.warnings)
            .map_err(|e| Error::Other(format!("JSON serialization failed: {e}")))
    }
}

/// Shared flag used to abort a running conversion.
///
/// Clones observe the same flag. Once cancelled, no new page is started,
/// running pages stop at their next check, and the conversion returns
/// [`crate::Error::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_options_builder() {
        let options = ConvertOptions::new()
            .with_parse_options(ParseOptions::new().with_fragment_cap(10))
            .with_layout(LayoutConfig::new().with_heading_ratio(1.5))
            .with_render_options(RenderOptions::new().with_frontmatter(true));

        assert_eq!(options.parse.fragment_cap, 10);
        assert_eq!(options.layout.heading_size_ratio, 1.5);
        assert!(options.render.include_frontmatter);
    }

    #[test]
    fn test_warnings_json() {
        let result = ConvertResult {
            markdown: String::new(),
            warnings: vec![
                Warning::document(WarningKind::DegradedObjectRecovery, 2),
                Warning::page(4, WarningKind::TruncatedPage, 1),
            ],
            metadata: Metadata::default(),
            document: Document::new(),
        };

        let json = result.warnings_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(2));
        assert_eq!(parsed[1]["page"], 4);
        assert_eq!(result.warnings_of(WarningKind::TruncatedPage).count(), 1);
    }

    #[test]
    fn test_cancellation_token_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
