//! Document model types for converted PDF content.
//!
//! Fragments come out of content-stream interpretation, lines and blocks out
//! of layout reconstruction; pages of blocks are what the Markdown renderer
//! consumes.

mod document;
mod fragment;
mod page;
mod warning;

pub use document::{Document, Metadata};
pub use fragment::{BoundingBox, TextFragment, TextLine};
pub use page::{Block, BlockKind, ListMarker, Page};
pub use warning::{normalize_warnings, Warning, WarningKind};
