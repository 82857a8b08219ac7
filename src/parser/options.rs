//! Parsing options and configuration.

use std::time::Duration;

use crate::render::PageSelection;

/// Default cap on text fragments produced per page.
pub const DEFAULT_FRAGMENT_CAP: usize = 50_000;

/// Default wall-clock budget for interpreting one page.
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for parsing PDF documents and interpreting page content.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Error handling mode
    pub error_mode: ErrorMode,

    /// Maximum number of text fragments per page; excess content is
    /// truncated and reported.
    pub fragment_cap: usize,

    /// Per-page interpretation budget (None = unlimited)
    pub page_timeout: Option<Duration>,

    /// Whether to use parallel processing
    pub parallel: bool,

    /// Worker threads for page processing (None = rayon default)
    pub threads: Option<usize>,

    /// Page selection (which pages to interpret)
    pub pages: PageSelection,

    /// Character emitted for glyphs with no Unicode mapping
    pub placeholder: char,

    /// Negative TJ adjustment, in thousandths of an em, above which a space is inserted
    pub tj_space_threshold: f32,

    /// Maximum nesting of Form XObjects
    pub max_form_depth: usize,
}

impl ParseOptions {
    /// Create new parse options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Refuse degraded recovery; structural damage becomes an error.
    pub fn strict(mut self) -> Self {
        self.error_mode = ErrorMode::Strict;
        self
    }

    /// Allow degraded recovery (the default).
    pub fn lenient(mut self) -> Self {
        self.error_mode = ErrorMode::Lenient;
        self
    }

    /// Whether linear-scan recovery may be used.
    pub fn allow_degraded(&self) -> bool {
        self.error_mode == ErrorMode::Lenient
    }

    /// Set the per-page fragment cap.
    pub fn with_fragment_cap(mut self, cap: usize) -> Self {
        self.fragment_cap = cap.max(1);
        self
    }

    /// Set the per-page timeout.
    pub fn with_page_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.page_timeout = timeout;
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set the number of worker threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads.max(1));
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    /// Set the placeholder for unmapped glyphs.
    pub fn with_placeholder(mut self, placeholder: char) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Set the maximum Form XObject nesting depth.
    pub fn with_max_form_depth(mut self, depth: usize) -> Self {
        self.max_form_depth = depth;
        self
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            error_mode: ErrorMode::Lenient,
            fragment_cap: DEFAULT_FRAGMENT_CAP,
            page_timeout: Some(DEFAULT_PAGE_TIMEOUT),
            parallel: true,
            threads: None,
            pages: PageSelection::All,
            placeholder: char::REPLACEMENT_CHARACTER,
            tj_space_threshold: 200.0,
            max_form_depth: 8,
        }
    }
}

/// Error handling mode during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Structural damage is fatal
    Strict,
    /// Fall back to degraded linear-scan recovery
    #[default]
    Lenient,
}
