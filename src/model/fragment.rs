//! Positioned text produced by content-stream interpretation.

use serde::{Deserialize, Serialize};

/// One positioned run of decoded text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    /// The decoded text
    pub text: String,
    /// X position of the run start (page units)
    pub x: f32,
    /// Y position of the baseline (page units, bottom-up)
    pub y: f32,
    /// Advance width of the run
    pub width: f32,
    /// Effective font size after text and page transforms
    pub font_size: f32,
    /// Font name without subset prefix
    pub font_name: String,
    /// Whether the font appears to be bold
    pub bold: bool,
    /// Whether the font appears to be italic
    pub italic: bool,
    /// Offset of the showing operator in the decoded content stream
    pub offset: usize,
}

impl TextFragment {
    /// Create a fragment with style flags derived from the font name.
    pub fn new(text: impl Into<String>, x: f32, y: f32, font_size: f32, font_name: impl Into<String>) -> Self {
        let font_name = font_name.into();
        let lower = font_name.to_lowercase();
        Self {
            text: text.into(),
            x,
            y,
            width: 0.0,
            font_size,
            bold: lower.contains("bold") || lower.contains("black") || lower.contains("heavy"),
            italic: lower.contains("italic") || lower.contains("oblique"),
            font_name,
            offset: 0,
        }
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }

    /// Right edge of the run. Falls back to an estimate when no width is known.
    pub fn right(&self) -> f32 {
        if self.width > 0.0 {
            self.x + self.width
        } else {
            self.x + self.text.chars().count() as f32 * self.font_size * 0.5
        }
    }

    /// Approximate descender line.
    pub fn bottom(&self) -> f32 {
        self.y - self.font_size * 0.2
    }

    /// Approximate ascender line.
    pub fn top(&self) -> f32 {
        self.y + self.font_size * 0.8
    }

    pub fn is_whitespace(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Axis-aligned box in page units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub fn of_fragment(fragment: &TextFragment) -> Self {
        Self {
            x0: fragment.x,
            y0: fragment.bottom(),
            x1: fragment.right(),
            y1: fragment.top(),
        }
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BoundingBox) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// Fragments sharing a baseline, joined left to right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    /// Fragments sorted by X position
    pub fragments: Vec<TextFragment>,
    /// Joined text with word-gap spaces inserted
    pub text: String,
    /// Leftmost X position
    pub x: f32,
    /// Baseline of the first fragment
    pub y: f32,
    /// Character-weighted font size
    pub font_size: f32,
    /// Whether most characters are bold
    pub bold: bool,
    pub bbox: BoundingBox,
}

impl TextLine {
    /// Build a line, inserting a space wherever the horizontal gap between
    /// neighbours exceeds `word_gap_ratio` of the font size.
    pub fn from_fragments(mut fragments: Vec<TextFragment>, word_gap_ratio: f32) -> Self {
        fragments.sort_by(|a, b| a.x.total_cmp(&b.x));

        let Some(first) = fragments.first() else {
            return Self {
                fragments,
                text: String::new(),
                x: 0.0,
                y: 0.0,
                font_size: 0.0,
                bold: false,
                bbox: BoundingBox::default(),
            };
        };
        let (x, y) = (first.x, first.y);
        let mut bbox = BoundingBox::of_fragment(first);

        let mut total_chars = 0usize;
        let mut bold_chars = 0usize;
        let mut weighted_size = 0.0f32;
        for f in &fragments {
            let n = f.text.chars().filter(|c| !c.is_whitespace()).count();
            total_chars += n;
            weighted_size += f.font_size * n as f32;
            if f.bold {
                bold_chars += n;
            }
            bbox = bbox.union(&BoundingBox::of_fragment(f));
        }
        let font_size = if total_chars > 0 {
            weighted_size / total_chars as f32
        } else {
            first.font_size
        };

        let text = join_fragments(&fragments, word_gap_ratio);

        Self {
            text,
            x,
            y,
            font_size,
            bold: total_chars > 0 && bold_chars * 2 > total_chars,
            bbox,
            fragments,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

fn join_fragments(fragments: &[TextFragment], word_gap_ratio: f32) -> String {
    let mut result = String::new();
    for (i, fragment) in fragments.iter().enumerate() {
        if i > 0 {
            let prev = &fragments[i - 1];
            let gap = fragment.x - prev.right();
            let threshold = fragment.font_size.max(prev.font_size) * word_gap_ratio;

            let prev_spaced = result.ends_with(' ') || result.ends_with('\u{A0}');
            let curr_spaced = fragment.text.starts_with(' ') || fragment.text.starts_with('\u{A0}');
            let spaceless = result.chars().last().is_some_and(is_spaceless_script_char)
                && fragment.text.chars().next().is_some_and(is_spaceless_script_char);

            if gap > threshold && !prev_spaced && !curr_spaced && !spaceless {
                result.push(' ');
            }
        }
        result.push_str(&fragment.text);
    }
    result
}

/// Scripts written without spaces between words (Chinese, Japanese).
/// Hangul is not included; Korean uses word spaces.
fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;
    (0x4E00..=0x9FFF).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        || (0x20000..=0x2EBEF).contains(&code)
        || (0x3040..=0x309F).contains(&code)
        || (0x30A0..=0x30FF).contains(&code)
        || (0x3000..=0x303F).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_style_from_name() {
        let f = TextFragment::new("x", 0.0, 0.0, 12.0, "Helvetica-BoldOblique");
        assert!(f.bold);
        assert!(f.italic);
    }

    #[test]
    fn test_line_inserts_word_gaps() {
        let line = TextLine::from_fragments(
            vec![
                TextFragment::new("World", 40.0, 100.0, 10.0, "F").with_width(25.0),
                TextFragment::new("Hello", 10.0, 100.0, 10.0, "F").with_width(25.0),
            ],
            0.15,
        );
        assert_eq!(line.text, "Hello World");
        assert_eq!(line.x, 10.0);
    }

    #[test]
    fn test_line_ignores_kerning_gaps() {
        let line = TextLine::from_fragments(
            vec![
                TextFragment::new("Hel", 10.0, 100.0, 10.0, "F").with_width(15.0),
                TextFragment::new("lo", 25.5, 100.0, 10.0, "F").with_width(10.0),
            ],
            0.15,
        );
        assert_eq!(line.text, "Hello");
    }

    #[test]
    fn test_line_no_space_between_cjk() {
        let line = TextLine::from_fragments(
            vec![
                TextFragment::new("日本", 10.0, 100.0, 10.0, "F").with_width(20.0),
                TextFragment::new("語", 35.0, 100.0, 10.0, "F").with_width(10.0),
            ],
            0.15,
        );
        assert_eq!(line.text, "日本語");
    }

    #[test]
    fn test_line_bold_majority() {
        let line = TextLine::from_fragments(
            vec![
                TextFragment::new("Bold words", 0.0, 0.0, 10.0, "Arial-Bold").with_width(50.0),
                TextFragment::new("x", 60.0, 0.0, 10.0, "Arial").with_width(5.0),
            ],
            0.15,
        );
        assert!(line.bold);
    }

    #[test]
    fn test_bounding_box_union() {
        let a = BoundingBox { x0: 0.0, y0: 0.0, x1: 10.0, y1: 10.0 };
        let b = BoundingBox { x0: 5.0, y0: -5.0, x1: 20.0, y1: 5.0 };
        let u = a.union(&b);
        assert_eq!((u.x0, u.y0, u.x1, u.y1), (0.0, -5.0, 20.0, 10.0));
        assert_eq!(u.width(), 20.0);
    }
}
