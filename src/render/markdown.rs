//! Markdown rendering for converted documents.

use crate::model::{Block, BlockKind, Document, ListMarker, Page};
use crate::parser::is_bullet;

use super::{CleanupPipeline, RenderOptions};

/// Separator between consecutive blocks and between pages.
const BLOCK_SEPARATOR: &str = "\n\n";

/// Convert a document to Markdown.
pub fn to_markdown(doc: &Document, options: &RenderOptions) -> String {
    MarkdownRenderer::new(options.clone()).render(doc)
}

/// Markdown renderer.
///
/// Every emitted block is separated from the next by exactly one blank line,
/// whether or not a page boundary lies between them. Blank blocks, empty
/// pages and blocks removed by cleanup contribute nothing.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: RenderOptions,
    cleanup: Option<CleanupPipeline>,
}

impl MarkdownRenderer {
    /// Create a new Markdown renderer.
    pub fn new(options: RenderOptions) -> Self {
        let cleanup = options.cleanup.clone().map(CleanupPipeline::new);
        Self { options, cleanup }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render a document to Markdown.
    pub fn render(&self, doc: &Document) -> String {
        let body = self.render_pages(&doc.pages);
        if !self.options.include_frontmatter {
            return body;
        }

        let mut output = doc.metadata.to_yaml_frontmatter();
        if !body.is_empty() {
            output.push('\n');
            output.push_str(&body);
        }
        output
    }

    /// Render the selected pages, skipping those with no visible content.
    pub fn render_pages<'a>(&self, pages: impl IntoIterator<Item = &'a Page>) -> String {
        pages
            .into_iter()
            .filter(|page| self.options.page_selection.includes(page.number))
            .map(|page| self.render_page(page))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(BLOCK_SEPARATOR)
    }

    /// Render one page; empty when nothing on it is emitted.
    pub fn render_page(&self, page: &Page) -> String {
        page.blocks
            .iter()
            .filter_map(|block| self.render_block(block))
            .collect::<Vec<_>>()
            .join(BLOCK_SEPARATOR)
    }

    /// Render a single block, or `None` if it emits nothing.
    pub fn render_block(&self, block: &Block) -> Option<String> {
        if block.is_blank() {
            return None;
        }

        let raw = self.block_text(block);
        let cleaned = match &self.cleanup {
            Some(pipeline) if pipeline.drops_block(&raw) => return None,
            Some(pipeline) => pipeline.process(&raw),
            None => raw,
        };
        let text = collapse_whitespace(&cleaned);
        if text.is_empty() {
            return None;
        }

        let rendered = match &block.kind {
            BlockKind::Heading { level } => {
                let title = strip_heading_marker(&text);
                if title.is_empty() {
                    return None;
                }
                let level = (*level).clamp(1, self.options.max_heading_level.max(1));
                format!("{} {}", "#".repeat(level as usize), title)
            }
            BlockKind::ListItem { marker } => {
                let item = text.trim_start_matches(is_bullet).trim_start();
                if item.is_empty() {
                    return None;
                }
                match marker {
                    ListMarker::Bullet => format!("- {item}"),
                    ListMarker::Numbered(label) => format!("{label} {item}"),
                }
            }
            BlockKind::Paragraph => normalize_bullets(&text),
            BlockKind::Blank => return None,
        };
        Some(rendered)
    }

    /// Join the lines of a block with single spaces. With dehyphenation on,
    /// a line-end hyphen before a lowercase continuation is dropped.
    fn block_text(&self, block: &Block) -> String {
        let mut output = String::new();
        for line in block.lines.iter().map(|l| l.text.trim()).filter(|t| !t.is_empty()) {
            if output.is_empty() {
                output.push_str(line);
                continue;
            }
            if self.options.dehyphenate && ends_with_break_hyphen(&output) && line.starts_with(char::is_lowercase) {
                output.pop();
            } else {
                output.push(' ');
            }
            output.push_str(line);
        }
        output
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn ends_with_break_hyphen(text: &str) -> bool {
    let mut rev = text.chars().rev();
    rev.next() == Some('-') && rev.next().is_some_and(char::is_alphabetic)
}

/// Drop a leading `#`..`######` marker so re-rendered headings keep one.
fn strip_heading_marker(text: &str) -> &str {
    let hashes = text.len() - text.trim_start_matches('#').len();
    let rest = &text[hashes..];
    if (1..=6).contains(&hashes) && (rest.is_empty() || rest.starts_with(char::is_whitespace)) {
        rest.trim_start()
    } else {
        text
    }
}

/// Replace bullet glyphs in running text with `-`. The middle dot is
/// punctuation here, not a bullet.
fn normalize_bullets(text: &str) -> String {
    text.chars()
        .map(|c| if c != '·' && is_bullet(c) { '-' } else { c })
        .collect()
}
