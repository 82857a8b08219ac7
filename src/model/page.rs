//! Page-level types.

use serde::{Deserialize, Serialize};

use super::{BoundingBox, TextLine};

/// A single page in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Page number (1-indexed)
    pub number: u32,

    /// Page width in points (1 point = 1/72 inch)
    pub width: f32,

    /// Page height in points
    pub height: f32,

    /// Reconstructed blocks in reading order
    pub blocks: Vec<Block>,
}

impl Page {
    /// Create a new page with the given dimensions.
    pub fn new(number: u32, width: f32, height: f32) -> Self {
        Self {
            number,
            width,
            height,
            blocks: Vec::new(),
        }
    }

    /// Create a new page with standard Letter size (8.5 x 11 inches).
    pub fn letter(number: u32) -> Self {
        Self::new(number, 612.0, 792.0)
    }

    /// Add a block to the page.
    pub fn add_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Get plain text content of the page.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .filter(|b| !b.is_blank())
            .map(|b| b.text())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Check if the page has no visible content.
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(Block::is_blank)
    }

    /// Get the number of blocks on the page.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::letter(1)
    }
}

/// Marker that introduced a list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "marker", rename_all = "snake_case")]
pub enum ListMarker {
    /// A bullet glyph or `-`/`*` dash
    Bullet,
    /// An enumerator, normalised to end with `.` (e.g. `"3."`, `"b."`)
    Numbered(String),
}

/// Inferred structural role of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    /// Heading with level 1-6
    Heading { level: u8 },
    /// A list item; its text excludes the marker
    ListItem { marker: ListMarker },
    /// Running text
    Paragraph,
    /// Whitespace only; separates but is never emitted
    Blank,
}

impl BlockKind {
    pub fn heading_level(&self) -> Option<u8> {
        match self {
            BlockKind::Heading { level } => Some(*level),
            _ => None,
        }
    }
}

/// A reconstructed group of lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub lines: Vec<TextLine>,
    pub bbox: BoundingBox,
}

impl Block {
    pub fn new(kind: BlockKind, lines: Vec<TextLine>) -> Self {
        let bbox = lines
            .iter()
            .map(|l| l.bbox)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();
        Self { kind, lines, bbox }
    }

    /// Line texts joined by single spaces.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Character-weighted font size across the block's lines.
    pub fn font_size(&self) -> f32 {
        let (weighted, chars) = self.lines.iter().fold((0.0f32, 0usize), |(w, n), l| {
            let c = l.text.chars().filter(|c| !c.is_whitespace()).count();
            (w + l.font_size * c as f32, n + c)
        });
        if chars > 0 {
            weighted / chars as f32
        } else {
            self.lines.first().map_or(0.0, |l| l.font_size)
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self.kind, BlockKind::Heading { .. })
    }

    pub fn is_list_item(&self) -> bool {
        matches!(self.kind, BlockKind::ListItem { .. })
    }

    pub fn is_blank(&self) -> bool {
        self.kind == BlockKind::Blank || self.lines.iter().all(TextLine::is_blank)
    }
}
