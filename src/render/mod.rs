//! Rendering of reconstructed documents to Markdown.

mod cleanup;
mod markdown;
mod options;

pub use cleanup::{CleanupOptions, CleanupPipeline, CleanupPreset};
pub use markdown::{to_markdown, MarkdownRenderer};
pub use options::{PageSelection, RenderOptions};
