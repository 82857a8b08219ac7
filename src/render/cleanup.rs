//! Text cleanup applied to each block before it is emitted.
//!
//! Cleanup never touches block boundaries: it rewrites the text inside a
//! block, or drops a block entirely (page numbers), so the one-blank-line
//! structure of the output is preserved.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Cleanup preset levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupPreset {
    /// Minimal cleanup: Unicode NFC normalization only
    Minimal,
    /// Standard cleanup: NFC + ligatures + control characters
    #[default]
    Standard,
    /// Aggressive cleanup: also drops placeholders, private-use glyphs and page numbers
    Aggressive,
}

impl CleanupPreset {
    /// Parse a preset name (`minimal`, `standard`, `aggressive`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Some(CleanupPreset::Minimal),
            "standard" => Some(CleanupPreset::Standard),
            "aggressive" => Some(CleanupPreset::Aggressive),
            _ => None,
        }
    }
}

/// Options for text cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupOptions {
    /// Normalize Unicode to NFC form
    pub normalize_unicode: bool,

    /// Fix ligatures (fi, fl, etc.)
    pub fix_ligatures: bool,

    /// Remove C0/C1 control characters
    pub remove_control_chars: bool,

    /// Remove Private Use Area (PUA) characters
    pub remove_pua: bool,

    /// Remove Unicode replacement character (U+FFFD)
    pub remove_replacement_char: bool,

    /// Drop blocks that consist of a page number only
    pub remove_page_numbers: bool,
}

impl CleanupOptions {
    /// Create options from a preset.
    pub fn from_preset(preset: CleanupPreset) -> Self {
        match preset {
            CleanupPreset::Minimal => Self::minimal(),
            CleanupPreset::Standard => Self::standard(),
            CleanupPreset::Aggressive => Self::aggressive(),
        }
    }

    /// Minimal cleanup options.
    pub fn minimal() -> Self {
        Self {
            normalize_unicode: true,
            fix_ligatures: false,
            remove_control_chars: false,
            remove_pua: false,
            remove_replacement_char: false,
            remove_page_numbers: false,
        }
    }

    /// Standard cleanup options.
    pub fn standard() -> Self {
        Self {
            normalize_unicode: true,
            fix_ligatures: true,
            remove_control_chars: true,
            remove_pua: false,
            remove_replacement_char: false,
            remove_page_numbers: false,
        }
    }

    /// Aggressive cleanup options.
    pub fn aggressive() -> Self {
        Self {
            normalize_unicode: true,
            fix_ligatures: true,
            remove_control_chars: true,
            remove_pua: true,
            remove_replacement_char: true,
            remove_page_numbers: true,
        }
    }
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self::standard()
    }
}

const LIGATURES: &[(char, &str)] = &[
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
    ('\u{FB05}', "st"),
    ('\u{FB06}', "st"),
];

fn page_number_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?i)^\s*(?:[-–—]\s*)?(?:page\s+)?\d{1,4}(?:\s*(?:/|of)\s*\d{1,4})?(?:\s*[-–—])?\s*$").ok()
        })
        .as_ref()
}

/// Text cleanup pipeline.
#[derive(Debug, Clone, Default)]
pub struct CleanupPipeline {
    options: CleanupOptions,
}

impl CleanupPipeline {
    /// Create a new cleanup pipeline with the given options.
    pub fn new(options: CleanupOptions) -> Self {
        Self { options }
    }

    /// Create a pipeline from a preset.
    pub fn from_preset(preset: CleanupPreset) -> Self {
        Self::new(CleanupOptions::from_preset(preset))
    }

    pub fn options(&self) -> &CleanupOptions {
        &self.options
    }

    /// Process the text of one block.
    pub fn process(&self, text: &str) -> String {
        let mut result: String = if self.options.normalize_unicode {
            text.nfc().collect()
        } else {
            text.to_string()
        };

        if self.options.fix_ligatures && result.contains(|c| ('\u{FB00}'..='\u{FB06}').contains(&c)) {
            let mut out = String::with_capacity(result.len());
            for c in result.chars() {
                match LIGATURES.iter().find(|(l, _)| *l == c) {
                    Some((_, replacement)) => out.push_str(replacement),
                    None => out.push(c),
                }
            }
            result = out;
        }

        let opts = &self.options;
        if opts.remove_control_chars || opts.remove_pua || opts.remove_replacement_char {
            result.retain(|c| {
                !(opts.remove_control_chars && c.is_control() && !c.is_whitespace())
                    && !(opts.remove_pua && is_private_use(c))
                    && !(opts.remove_replacement_char && c == '\u{FFFD}')
            });
        }

        result
    }

    /// Whether a whole block should be dropped.
    pub fn drops_block(&self, text: &str) -> bool {
        self.options.remove_page_numbers && page_number_pattern().is_some_and(|re| re.is_match(text))
    }
}

fn is_private_use(c: char) -> bool {
    let code = c as u32;
    (0xE000..=0xF8FF).contains(&code) || (0xF0000..=0xFFFFD).contains(&code) || (0x100000..=0x10FFFD).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicode_normalization() {
        let pipeline = CleanupPipeline::from_preset(CleanupPreset::Minimal);
        let result = pipeline.process("cafe\u{301}");
        assert_eq!(result, "café");
    }

    #[test]
    fn test_ligature_fix() {
        let pipeline = CleanupPipeline::from_preset(CleanupPreset::Standard);
        assert_eq!(pipeline.process("ﬁnding ﬂowers"), "finding flowers");
    }

    #[test]
    fn test_minimal_keeps_ligatures() {
        let pipeline = CleanupPipeline::from_preset(CleanupPreset::Minimal);
        assert_eq!(pipeline.process("ﬁ"), "ﬁ");
    }

    #[test]
    fn test_control_chars_removed() {
        let pipeline = CleanupPipeline::from_preset(CleanupPreset::Standard);
        assert_eq!(pipeline.process("a\u{0}b\u{7}c\td"), "abc\td");
    }

    #[test]
    fn test_replacement_char_kept_unless_aggressive() {
        let standard = CleanupPipeline::from_preset(CleanupPreset::Standard);
        assert_eq!(standard.process("Hello\u{FFFD}World"), "Hello\u{FFFD}World");

        let aggressive = CleanupPipeline::from_preset(CleanupPreset::Aggressive);
        assert_eq!(aggressive.process("Hello\u{FFFD}World\u{E000}"), "HelloWorld");
    }

    #[test]
    fn test_page_number_blocks() {
        let aggressive = CleanupPipeline::from_preset(CleanupPreset::Aggressive);
        assert!(aggressive.drops_block("12"));
        assert!(aggressive.drops_block("- 3 -"));
        assert!(aggressive.drops_block("Page 4 of 10"));
        assert!(!aggressive.drops_block("12 apples"));

        let standard = CleanupPipeline::from_preset(CleanupPreset::Standard);
        assert!(!standard.drops_block("12"));
    }

    #[test]
    fn test_preset_parse() {
        assert_eq!(CleanupPreset::parse("Aggressive"), Some(CleanupPreset::Aggressive));
        assert_eq!(CleanupPreset::parse("none"), None);
    }
}
