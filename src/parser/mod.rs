//! PDF parsing: container structure, content streams and layout.
//!
//! [`PdfDocument`] owns the object table; [`TextExtractor`] interprets one
//! page's content stream into positioned fragments; [`LayoutAnalyzer`]
//! groups fragments into lines and classified blocks.

mod cmap;
mod content;
mod document;
mod encoding;
mod filters;
mod font;
mod interpreter;
mod layout;
mod lexer;
mod object;
mod options;
mod page_tree;
mod reader;
mod xref;

pub use content::{ContentParser, Operation, Operator};
pub use document::{PdfDocument, Resolved};
pub use filters::decode_stream;
pub use font::{Font, Glyph};
pub use interpreter::{Matrix, PageDiagnostics, TextExtractor};
pub use layout::{analyze, FontStatistics, LayoutAnalyzer, LayoutConfig};
pub(crate) use layout::is_bullet;
pub use object::{Dictionary, ObjectId, PdfObject, PdfStream};
pub use options::{ErrorMode, ParseOptions, DEFAULT_FRAGMENT_CAP, DEFAULT_PAGE_TIMEOUT};
pub use page_tree::{collect_pages, PageNode};
