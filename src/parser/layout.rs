//! Layout reconstruction for extracted page text.
//!
//! This module turns a page's fragments (in content-stream order) into
//! reading-order lines and blocks, and classifies each block as a heading,
//! list item, paragraph or blank separator using font-size and weight
//! statistics gathered from the page itself.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Block, BlockKind, ListMarker, TextFragment, TextLine};

/// Body size assumed for pages without measurable text.
const DEFAULT_BODY_SIZE: f32 = 12.0;

/// Tolerance when comparing rounded font sizes.
const SIZE_EPSILON: f32 = 0.05;

/// Thresholds for line grouping, paragraph breaks and heading detection.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    /// Minimum ratio of block size to body size for a heading
    pub heading_size_ratio: f32,

    /// Baselines closer than this fraction of the font size share a line
    pub same_line_tolerance: f32,

    /// Vertical gap, in line heights, that starts a new block
    pub paragraph_gap_threshold: f32,

    /// Line height as a multiple of the body font size
    pub line_height_factor: f32,

    /// Horizontal gap, as a fraction of font size, that becomes a space
    pub word_gap_ratio: f32,

    /// Bold blocks with at most this many lines are headings
    pub bold_heading_max_lines: usize,

    /// Deepest heading level emitted (1-6)
    pub max_heading_level: u8,
}

impl LayoutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the heading size ratio.
    pub fn with_heading_ratio(mut self, ratio: f32) -> Self {
        self.heading_size_ratio = ratio.max(1.0);
        self
    }

    /// Set the same-line baseline tolerance.
    pub fn with_same_line_tolerance(mut self, tolerance: f32) -> Self {
        self.same_line_tolerance = tolerance.max(0.0);
        self
    }

    /// Set the paragraph gap threshold in line heights.
    pub fn with_paragraph_gap(mut self, threshold: f32) -> Self {
        self.paragraph_gap_threshold = threshold.max(0.0);
        self
    }

    /// Set the word gap ratio.
    pub fn with_word_gap_ratio(mut self, ratio: f32) -> Self {
        self.word_gap_ratio = ratio.max(0.0);
        self
    }

    /// Set the maximum heading level.
    pub fn with_max_heading(mut self, level: u8) -> Self {
        self.max_heading_level = level.clamp(1, 6);
        self
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            heading_size_ratio: 1.2,
            same_line_tolerance: 0.3,
            paragraph_gap_threshold: 1.5,
            line_height_factor: 1.2,
            word_gap_ratio: 0.15,
            bold_heading_max_lines: 2,
            max_heading_level: 6,
        }
    }
}

/// Font statistics for heading detection.
#[derive(Debug, Clone, Default)]
pub struct FontStatistics {
    /// Body text font size (most characters)
    pub body_size: f32,
    /// Whether most body-size characters are bold
    pub body_bold: bool,
    /// Heading-sized fonts, largest first
    pub heading_sizes: Vec<f32>,
    /// Size key (tenths of a point) → (characters, bold characters)
    size_histogram: BTreeMap<i32, (usize, usize)>,
}

impl FontStatistics {
    /// Collect statistics from fragments, weighting each size by character count.
    pub fn from_fragments<'a>(fragments: impl IntoIterator<Item = &'a TextFragment>, heading_ratio: f32) -> Self {
        let mut stats = Self::default();
        for f in fragments {
            let chars = f.text.chars().filter(|c| !c.is_whitespace()).count();
            stats.add(f.font_size, chars, f.bold);
        }
        stats.analyze(heading_ratio);
        stats
    }

    /// Add an observation of `chars` characters at `size`.
    pub fn add(&mut self, size: f32, chars: usize, bold: bool) {
        if chars == 0 || !size.is_finite() || size <= 0.0 {
            return;
        }
        let entry = self.size_histogram.entry(size_key(size)).or_insert((0, 0));
        entry.0 += chars;
        if bold {
            entry.1 += chars;
        }
    }

    /// Calculate body size and heading sizes.
    pub fn analyze(&mut self, heading_ratio: f32) {
        // Ties resolve to the smaller size.
        let mut body: Option<(i32, usize, usize)> = None;
        for (&key, &(chars, bold)) in &self.size_histogram {
            if body.map_or(true, |(_, best, _)| chars > best) {
                body = Some((key, chars, bold));
            }
        }
        let Some((body_key, chars, bold)) = body else {
            self.body_size = DEFAULT_BODY_SIZE;
            self.body_bold = false;
            self.heading_sizes.clear();
            return;
        };
        self.body_size = key_size(body_key);
        self.body_bold = bold * 2 > chars;

        let threshold = self.body_size * heading_ratio - SIZE_EPSILON;
        self.heading_sizes = self
            .size_histogram
            .keys()
            .rev()
            .map(|&k| key_size(k))
            .filter(|&s| s >= threshold)
            .collect();
    }

    /// Heading level for a font size, by rank among the page's heading sizes.
    pub fn heading_level(&self, font_size: f32, max_level: u8) -> Option<u8> {
        let size = key_size(size_key(font_size));
        let smallest = self.heading_sizes.last()?;
        if size < smallest - SIZE_EPSILON {
            return None;
        }
        let rank = self
            .heading_sizes
            .iter()
            .position(|&h| size >= h - SIZE_EPSILON)
            .unwrap_or(self.heading_sizes.len() - 1);
        Some((rank as u8 + 1).min(max_level))
    }

    /// Body line height under the given factor.
    pub fn line_height(&self, factor: f32) -> f32 {
        self.body_size * factor
    }
}

fn size_key(size: f32) -> i32 {
    (size * 10.0).round() as i32
}

fn key_size(key: i32) -> f32 {
    key as f32 / 10.0
}

/// Reconstructs lines and classified blocks from a page's fragments.
#[derive(Debug, Clone, Default)]
pub struct LayoutAnalyzer {
    config: LayoutConfig,
}

/// Per-line facts used while grouping.
struct LineInfo {
    line: TextLine,
    heading: Option<u8>,
    marker: Option<(ListMarker, usize)>,
}

impl LayoutAnalyzer {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Run the full reconstruction for one page.
    pub fn analyze(&self, fragments: Vec<TextFragment>) -> Vec<Block> {
        let fragments: Vec<TextFragment> = fragments
            .into_iter()
            .filter(|f| !f.text.is_empty() && f.x.is_finite() && f.y.is_finite() && f.font_size.is_finite())
            .collect();
        if fragments.is_empty() {
            return Vec::new();
        }

        let stats = FontStatistics::from_fragments(&fragments, self.config.heading_size_ratio);
        log::debug!(
            "Layout: body size {:.1}{}, heading sizes {:?}",
            stats.body_size,
            if stats.body_bold { " (bold)" } else { "" },
            stats.heading_sizes
        );

        let lines = self.group_into_lines(fragments);
        let blocks = self.group_into_blocks(lines, &stats);
        log::debug!("Layout: {} blocks", blocks.len());
        blocks
    }

    /// Sort fragments top-to-bottom and merge those sharing a baseline.
    pub fn group_into_lines(&self, mut fragments: Vec<TextFragment>) -> Vec<TextLine> {
        fragments.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

        let mut lines = Vec::new();
        let mut current: Vec<TextFragment> = Vec::new();
        let mut baseline = 0.0f32;
        let mut line_size = 0.0f32;

        for fragment in fragments {
            if !current.is_empty() {
                let tolerance = self.config.same_line_tolerance * fragment.font_size.max(line_size);
                if (fragment.y - baseline).abs() <= tolerance {
                    line_size = line_size.max(fragment.font_size);
                    current.push(fragment);
                    continue;
                }
                lines.push(TextLine::from_fragments(
                    std::mem::take(&mut current),
                    self.config.word_gap_ratio,
                ));
            }
            baseline = fragment.y;
            line_size = fragment.font_size;
            current.push(fragment);
        }
        if !current.is_empty() {
            lines.push(TextLine::from_fragments(current, self.config.word_gap_ratio));
        }
        lines
    }

    fn group_into_blocks(&self, lines: Vec<TextLine>, stats: &FontStatistics) -> Vec<Block> {
        let gap_threshold = self.config.paragraph_gap_threshold * stats.line_height(self.config.line_height_factor);

        let mut blocks = Vec::new();
        let mut current: Vec<LineInfo> = Vec::new();

        for line in lines {
            if line.is_blank() {
                self.flush(&mut current, stats, &mut blocks);
                if !matches!(blocks.last(), Some(Block { kind: BlockKind::Blank, .. })) {
                    blocks.push(Block::new(BlockKind::Blank, vec![line]));
                }
                continue;
            }

            let info = LineInfo {
                heading: stats.heading_level(line.font_size, self.config.max_heading_level),
                marker: detect_list_marker(&line.text),
                line,
            };

            if let Some(prev) = current.last() {
                if self.should_break(prev, &info, gap_threshold, stats) {
                    self.flush(&mut current, stats, &mut blocks);
                }
            }
            current.push(info);
        }
        self.flush(&mut current, stats, &mut blocks);
        blocks
    }

    fn should_break(&self, prev: &LineInfo, curr: &LineInfo, gap_threshold: f32, stats: &FontStatistics) -> bool {
        let gap = prev.line.y - curr.line.y;
        // Moving up the page means a new column or a displaced run.
        if gap <= 0.0 || gap > gap_threshold {
            return true;
        }
        if prev.heading != curr.heading {
            return true;
        }
        if curr.marker.is_some() {
            return true;
        }
        // A change of weight against a regular body ends a bold run.
        !stats.body_bold && prev.line.bold != curr.line.bold
    }

    fn flush(&self, lines: &mut Vec<LineInfo>, stats: &FontStatistics, blocks: &mut Vec<Block>) {
        if lines.is_empty() {
            return;
        }
        let mut infos = std::mem::take(lines);
        let kind = self.classify(&infos, stats);

        if let BlockKind::ListItem { .. } = kind {
            if let Some((_, len)) = infos[0].marker {
                let first = &mut infos[0].line;
                first.text = first.text[len..].trim_start().to_string();
            }
        }

        let lines: Vec<TextLine> = infos.into_iter().map(|i| i.line).collect();
        blocks.push(Block::new(kind, lines));
    }

    fn classify(&self, lines: &[LineInfo], stats: &FontStatistics) -> BlockKind {
        if lines.iter().all(|l| l.line.is_blank()) {
            return BlockKind::Blank;
        }

        let size = {
            let (weighted, chars) = lines.iter().fold((0.0f32, 0usize), |(w, n), l| {
                let c = l.line.text.chars().filter(|c| !c.is_whitespace()).count();
                (w + l.line.font_size * c as f32, n + c)
            });
            if chars > 0 {
                weighted / chars as f32
            } else {
                lines[0].line.font_size
            }
        };
        if let Some(level) = stats.heading_level(size, self.config.max_heading_level) {
            return BlockKind::Heading { level };
        }

        if let Some((marker, _)) = &lines[0].marker {
            return BlockKind::ListItem {
                marker: marker.clone(),
            };
        }

        let bold = lines.iter().all(|l| l.line.bold);
        if bold && !stats.body_bold && lines.len() <= self.config.bold_heading_max_lines {
            let level = (stats.heading_sizes.len() as u8 + 1).min(self.config.max_heading_level);
            return BlockKind::Heading { level };
        }

        BlockKind::Paragraph
    }
}

/// Reconstruct the blocks of one page with the given configuration.
pub fn analyze(fragments: Vec<TextFragment>, config: &LayoutConfig) -> Vec<Block> {
    LayoutAnalyzer::new(config.clone()).analyze(fragments)
}

const BULLETS: &[char] = &[
    '•', '◦', '▪', '▫', '■', '□', '●', '○', '‣', '⁃', '∙', '·', '➢', '►', '▶', '✓', '✔', '\u{F0A7}', '\u{F0B7}',
];

pub(crate) fn is_bullet(c: char) -> bool {
    BULLETS.contains(&c)
}

fn numbered_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(?P<marker>(\d{1,3})[.)]|\((\d{1,3})\)|([a-z])\)|\(([a-z])\))\s+\S").ok())
        .as_ref()
}

/// List marker at the start of `text`, with its byte length.
pub(crate) fn detect_list_marker(text: &str) -> Option<(ListMarker, usize)> {
    let text_start = text.len() - text.trim_start().len();
    let trimmed = &text[text_start..];
    let mut chars = trimmed.chars();
    let first = chars.next()?;

    if BULLETS.contains(&first) || first == '-' || first == '*' || first == '–' {
        let rest = chars.as_str();
        let needs_space = !BULLETS.contains(&first);
        let spaced = rest.starts_with(char::is_whitespace);
        if (spaced || !needs_space) && !rest.trim().is_empty() {
            return Some((ListMarker::Bullet, text_start + first.len_utf8()));
        }
        return None;
    }

    let caps = numbered_pattern()?.captures(trimmed)?;
    let label = (2..=5).find_map(|i| caps.get(i))?.as_str();
    let marker = caps.name("marker")?;
    Some((ListMarker::Numbered(format!("{label}.")), text_start + marker.end()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str, x: f32, y: f32, size: f32) -> TextFragment {
        let width = text.chars().count() as f32 * size * 0.5;
        TextFragment::new(text, x, y, size, "Helvetica").with_width(width)
    }

    fn bold(text: &str, x: f32, y: f32, size: f32) -> TextFragment {
        let width = text.chars().count() as f32 * size * 0.5;
        TextFragment::new(text, x, y, size, "Helvetica-Bold").with_width(width)
    }

    #[test]
    fn test_font_statistics() {
        let mut stats = FontStatistics::default();
        stats.add(12.0, 500, false);
        stats.add(18.0, 20, false);
        stats.add(24.0, 10, true);
        stats.add(13.0, 30, false);
        stats.analyze(1.2);

        assert_eq!(stats.body_size, 12.0);
        assert!(!stats.body_bold);
        assert_eq!(stats.heading_sizes, vec![24.0, 18.0]);
        assert_eq!(stats.heading_level(24.0, 6), Some(1));
        assert_eq!(stats.heading_level(18.0, 6), Some(2));
        assert_eq!(stats.heading_level(20.0, 6), Some(2));
        assert_eq!(stats.heading_level(13.0, 6), None);
        assert_eq!(stats.heading_level(24.0, 1), Some(1));
    }

    #[test]
    fn test_empty_statistics_default_body() {
        let mut stats = FontStatistics::default();
        stats.analyze(1.2);
        assert_eq!(stats.body_size, DEFAULT_BODY_SIZE);
        assert_eq!(stats.heading_level(40.0, 6), None);
    }

    #[test]
    fn test_lines_sorted_top_to_bottom_left_to_right() {
        let analyzer = LayoutAnalyzer::default();
        let lines = analyzer.group_into_lines(vec![
            frag("second", 10.0, 686.0, 10.0),
            frag("world", 50.0, 700.5, 10.0),
            frag("hello", 10.0, 700.0, 10.0),
        ]);
        let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["hello world", "second"]);
    }

    #[test]
    fn test_uniform_paragraph() {
        let blocks = analyze(
            vec![
                frag("The quick brown fox", 72.0, 700.0, 10.0),
                frag("jumps over the lazy dog.", 72.0, 688.0, 10.0),
            ],
            &LayoutConfig::default(),
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Paragraph);
        assert_eq!(blocks[0].text(), "The quick brown fox jumps over the lazy dog.");
    }

    #[test]
    fn test_large_line_becomes_heading() {
        let blocks = analyze(
            vec![
                frag("Introduction", 72.0, 720.0, 20.0),
                frag("Body text line one", 72.0, 700.0, 10.0),
                frag("and line two.", 72.0, 688.0, 10.0),
            ],
            &LayoutConfig::default(),
        );
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kind, BlockKind::Heading { level: 1 });
        assert_eq!(blocks[1].kind, BlockKind::Paragraph);
    }

    #[test]
    fn test_heading_levels_by_rank() {
        let blocks = analyze(
            vec![
                frag("Title", 72.0, 760.0, 24.0),
                frag("Section", 72.0, 720.0, 16.0),
                frag("Body body body body body", 72.0, 700.0, 10.0),
            ],
            &LayoutConfig::default(),
        );
        let kinds: Vec<_> = blocks.iter().map(|b| b.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                BlockKind::Heading { level: 1 },
                BlockKind::Heading { level: 2 },
                BlockKind::Paragraph
            ]
        );
    }

    #[test]
    fn test_paragraph_gap_splits_blocks() {
        let blocks = analyze(
            vec![
                frag("First paragraph.", 72.0, 700.0, 10.0),
                frag("Second paragraph.", 72.0, 670.0, 10.0),
            ],
            &LayoutConfig::default(),
        );
        assert_eq!(blocks.len(), 2);

        let merged = analyze(
            vec![
                frag("First paragraph.", 72.0, 700.0, 10.0),
                frag("Second paragraph.", 72.0, 670.0, 10.0),
            ],
            &LayoutConfig::default().with_paragraph_gap(3.0),
        );
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_bullets_become_list_items() {
        let blocks = analyze(
            vec![
                frag("• apples", 72.0, 700.0, 10.0),
                frag("• pears", 72.0, 688.0, 10.0),
                frag("3) plums", 72.0, 676.0, 10.0),
            ],
            &LayoutConfig::default(),
        );
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[0].kind,
            BlockKind::ListItem {
                marker: ListMarker::Bullet
            }
        );
        assert_eq!(blocks[0].text(), "apples");
        assert_eq!(blocks[1].text(), "pears");
        assert_eq!(
            blocks[2].kind,
            BlockKind::ListItem {
                marker: ListMarker::Numbered("3.".into())
            }
        );
        assert_eq!(blocks[2].text(), "plums");
    }

    #[test]
    fn test_bold_short_block_is_heading() {
        let blocks = analyze(
            vec![
                bold("Summary", 72.0, 720.0, 10.0),
                frag("Regular body text follows here.", 72.0, 708.0, 10.0),
            ],
            &LayoutConfig::default(),
        );
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kind, BlockKind::Heading { level: 1 });
        assert_eq!(blocks[1].kind, BlockKind::Paragraph);
    }

    #[test]
    fn test_all_bold_page_has_no_bold_headings() {
        let blocks = analyze(
            vec![bold("Everything", 72.0, 720.0, 10.0), bold("is bold", 72.0, 708.0, 10.0)],
            &LayoutConfig::default(),
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Paragraph);
    }

    #[test]
    fn test_whitespace_lines_collapse_to_one_blank() {
        let blocks = analyze(
            vec![
                frag("Above", 72.0, 700.0, 10.0),
                frag("   ", 72.0, 690.0, 10.0),
                frag(" ", 72.0, 680.0, 10.0),
                frag("Below", 72.0, 670.0, 10.0),
            ],
            &LayoutConfig::default(),
        );
        let kinds: Vec<_> = blocks.iter().map(|b| b.kind.clone()).collect();
        assert_eq!(kinds, vec![BlockKind::Paragraph, BlockKind::Blank, BlockKind::Paragraph]);
    }

    #[test]
    fn test_detect_list_marker() {
        assert_eq!(detect_list_marker("• item"), Some((ListMarker::Bullet, 3)));
        assert_eq!(detect_list_marker("•item"), Some((ListMarker::Bullet, 3)));
        assert_eq!(detect_list_marker("- item"), Some((ListMarker::Bullet, 1)));
        assert_eq!(detect_list_marker("-item"), None);
        assert_eq!(detect_list_marker("-5 degrees"), None);
        assert_eq!(
            detect_list_marker("12. twelve"),
            Some((ListMarker::Numbered("12.".into()), 3))
        );
        assert_eq!(
            detect_list_marker("(4) four"),
            Some((ListMarker::Numbered("4.".into()), 3))
        );
        assert_eq!(
            detect_list_marker("b) bee"),
            Some((ListMarker::Numbered("b.".into()), 2))
        );
        assert_eq!(detect_list_marker("3.14 is pi"), None);
        assert_eq!(detect_list_marker("A. Smith"), None);
    }

    #[test]
    fn test_empty_page() {
        assert!(analyze(Vec::new(), &LayoutConfig::default()).is_empty());
    }
}
