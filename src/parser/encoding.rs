//! Single-byte base encodings and glyph-name resolution.

use unicode_normalization::UnicodeNormalization;

/// The predefined single-byte encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    Standard,
    WinAnsi,
    MacRoman,
    PdfDoc,
}

impl BaseEncoding {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "StandardEncoding" => Some(BaseEncoding::Standard),
            "WinAnsiEncoding" => Some(BaseEncoding::WinAnsi),
            "MacRomanEncoding" | "MacExpertEncoding" => Some(BaseEncoding::MacRoman),
            "PDFDocEncoding" => Some(BaseEncoding::PdfDoc),
            _ => None,
        }
    }

    /// Unicode character for `code`, or `None` when the code is undefined.
    pub fn decode(self, code: u8) -> Option<char> {
        match self {
            BaseEncoding::Standard => standard_char(code),
            BaseEncoding::WinAnsi => win_ansi_char(code),
            BaseEncoding::MacRoman => mac_roman_char(code),
            BaseEncoding::PdfDoc => pdf_doc_char(code),
        }
    }
}

fn printable_ascii(code: u8) -> Option<char> {
    (0x20..=0x7E).contains(&code).then_some(code as char)
}

fn latin1(code: u8) -> Option<char> {
    (0xA0..=0xFF).contains(&code).then_some(code as char)
}

fn win_ansi_char(code: u8) -> Option<char> {
    const HIGH: [Option<char>; 32] = [
        Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
        Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
        Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
        Some('\u{0152}'), None, Some('\u{017D}'), None,
        None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
        Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
        Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
        Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
    ];
    match code {
        0x80..=0x9F => HIGH[usize::from(code - 0x80)],
        _ => printable_ascii(code).or_else(|| latin1(code)),
    }
}

fn mac_roman_char(code: u8) -> Option<char> {
    const HIGH: [char; 128] = [
        'Ä', 'Å', 'Ç', 'É', 'Ñ', 'Ö', 'Ü', 'á', 'à', 'â', 'ä', 'ã', 'å', 'ç', 'é', 'è',
        'ê', 'ë', 'í', 'ì', 'î', 'ï', 'ñ', 'ó', 'ò', 'ô', 'ö', 'õ', 'ú', 'ù', 'û', 'ü',
        '†', '°', '¢', '£', '§', '•', '¶', 'ß', '®', '©', '™', '´', '¨', '≠', 'Æ', 'Ø',
        '∞', '±', '≤', '≥', '¥', 'µ', '∂', '∑', '∏', 'π', '∫', 'ª', 'º', 'Ω', 'æ', 'ø',
        '¿', '¡', '¬', '√', 'ƒ', '≈', '∆', '«', '»', '…', '\u{A0}', 'À', 'Ã', 'Õ', 'Œ', 'œ',
        '–', '—', '“', '”', '‘', '’', '÷', '◊', 'ÿ', 'Ÿ', '⁄', '¤', '‹', '›', 'ﬁ', 'ﬂ',
        '‡', '·', '‚', '„', '‰', 'Â', 'Ê', 'Á', 'Ë', 'È', 'Í', 'Î', 'Ï', 'Ì', 'Ó', 'Ô',
        '\u{F8FF}', 'Ò', 'Ú', 'Û', 'Ù', 'ı', 'ˆ', '˜', '¯', '˘', '˙', '˚', '¸', '˝', '˛', 'ˇ',
    ];
    match code {
        0x80..=0xFF if code != 0xF0 => Some(HIGH[usize::from(code - 0x80)]),
        _ => printable_ascii(code),
    }
}

fn standard_char(code: u8) -> Option<char> {
    let c = match code {
        0x27 => '\u{2019}',
        0x60 => '\u{2018}',
        0x20..=0x7E => code as char,
        0xA1 => '¡',
        0xA2 => '¢',
        0xA3 => '£',
        0xA4 => '⁄',
        0xA5 => '¥',
        0xA6 => 'ƒ',
        0xA7 => '§',
        0xA8 => '¤',
        0xA9 => '\'',
        0xAA => '“',
        0xAB => '«',
        0xAC => '‹',
        0xAD => '›',
        0xAE => 'ﬁ',
        0xAF => 'ﬂ',
        0xB1 => '–',
        0xB2 => '†',
        0xB3 => '‡',
        0xB4 => '·',
        0xB6 => '¶',
        0xB7 => '•',
        0xB8 => '‚',
        0xB9 => '„',
        0xBA => '”',
        0xBB => '»',
        0xBC => '…',
        0xBD => '‰',
        0xBF => '¿',
        0xC1 => '`',
        0xC2 => '´',
        0xC3 => 'ˆ',
        0xC4 => '˜',
        0xC5 => '¯',
        0xC6 => '˘',
        0xC7 => '˙',
        0xC8 => '¨',
        0xCA => '˚',
        0xCB => '¸',
        0xCD => '˝',
        0xCE => '˛',
        0xCF => 'ˇ',
        0xD0 => '—',
        0xE1 => 'Æ',
        0xE3 => 'ª',
        0xE8 => 'Ł',
        0xE9 => 'Ø',
        0xEA => 'Œ',
        0xEB => 'º',
        0xF1 => 'æ',
        0xF5 => 'ı',
        0xF8 => 'ł',
        0xF9 => 'ø',
        0xFA => 'œ',
        0xFB => 'ß',
        _ => return None,
    };
    Some(c)
}

/// PDFDocEncoding, used for text strings outside content streams.
pub fn pdf_doc_char(code: u8) -> Option<char> {
    const ACCENTS: [char; 8] = ['˘', 'ˇ', 'ˆ', '˙', '˝', '˛', '˚', '˜'];
    const HIGH: [Option<char>; 32] = [
        Some('•'), Some('†'), Some('‡'), Some('…'), Some('—'), Some('–'), Some('ƒ'), Some('⁄'),
        Some('‹'), Some('›'), Some('−'), Some('‰'), Some('„'), Some('“'), Some('”'), Some('‘'),
        Some('’'), Some('‚'), Some('™'), Some('ﬁ'), Some('ﬂ'), Some('Ł'), Some('Œ'), Some('Š'),
        Some('Ÿ'), Some('Ž'), Some('ı'), Some('ł'), Some('œ'), Some('š'), Some('ž'), None,
    ];
    match code {
        b'\t' | b'\n' | b'\r' => Some(code as char),
        0x18..=0x1F => Some(ACCENTS[usize::from(code - 0x18)]),
        0x80..=0x9F => HIGH[usize::from(code - 0x80)],
        0xA0 => Some('€'),
        0xAD => None,
        _ => printable_ascii(code).or_else(|| latin1(code)),
    }
}

/// Resolve an Adobe glyph name to Unicode text.
///
/// Handles `.suffix` variants, `_` ligature composites, `uniXXXX[XXXX...]`,
/// `uXXXX[XX]`, the common Latin glyph names and accented letters formed
/// from a base letter plus an accent name (`eacute`, `Ccedilla`, ...).
pub fn glyph_name_to_unicode(name: &str) -> Option<String> {
    let name = name.split('.').next().unwrap_or(name);
    if name.is_empty() || name == "notdef" {
        return None;
    }

    let mut out = String::new();
    for part in name.split('_') {
        out.push_str(&component_to_unicode(part)?);
    }
    Some(out)
}

fn component_to_unicode(name: &str) -> Option<String> {
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() >= 4 && hex.len() % 4 == 0 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            let units: Vec<u16> = hex
                .as_bytes()
                .chunks(4)
                .filter_map(|c| u16::from_str_radix(std::str::from_utf8(c).ok()?, 16).ok())
                .collect();
            return String::from_utf16(&units).ok();
        }
    }
    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            let cp = u32::from_str_radix(hex, 16).ok()?;
            return char::from_u32(cp).map(String::from);
        }
    }
    if let Some(c) = named_glyph(name) {
        return Some(c.to_string());
    }
    if name.len() == 1 && name.as_bytes()[0].is_ascii_alphabetic() {
        return Some(name.to_string());
    }
    composed_glyph(name)
}

/// `eacute` → `é`: a single base letter followed by an accent name.
fn composed_glyph(name: &str) -> Option<String> {
    const ACCENTS: [(&str, char); 9] = [
        ("acute", '\u{0301}'),
        ("grave", '\u{0300}'),
        ("circumflex", '\u{0302}'),
        ("tilde", '\u{0303}'),
        ("dieresis", '\u{0308}'),
        ("ring", '\u{030A}'),
        ("cedilla", '\u{0327}'),
        ("caron", '\u{030C}'),
        ("macron", '\u{0304}'),
    ];
    let mut chars = name.chars();
    let base = chars.next().filter(|c| c.is_ascii_alphabetic())?;
    let accent = chars.as_str();
    let (_, mark) = ACCENTS.iter().find(|(n, _)| *n == accent)?;
    let composed: String = [base, *mark].into_iter().nfc().collect();
    (composed.chars().count() == 1).then_some(composed)
}

fn named_glyph(name: &str) -> Option<char> {
    let c = match name {
        "space" | "nbspace" | "nonbreakingspace" => ' ',
        "exclam" => '!',
        "quotedbl" => '"',
        "numbersign" => '#',
        "dollar" => '$',
        "percent" => '%',
        "ampersand" => '&',
        "quotesingle" => '\'',
        "quoteright" => '’',
        "quoteleft" => '‘',
        "parenleft" => '(',
        "parenright" => ')',
        "asterisk" => '*',
        "plus" => '+',
        "comma" => ',',
        "hyphen" | "sfthyphen" => '-',
        "period" => '.',
        "slash" => '/',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "colon" => ':',
        "semicolon" => ';',
        "less" => '<',
        "equal" => '=',
        "greater" => '>',
        "question" => '?',
        "at" => '@',
        "bracketleft" => '[',
        "backslash" => '\\',
        "bracketright" => ']',
        "asciicircum" => '^',
        "underscore" => '_',
        "grave" => '`',
        "braceleft" => '{',
        "bar" => '|',
        "braceright" => '}',
        "asciitilde" => '~',
        "exclamdown" => '¡',
        "cent" => '¢',
        "sterling" => '£',
        "fraction" => '⁄',
        "yen" => '¥',
        "florin" => 'ƒ',
        "section" => '§',
        "currency" => '¤',
        "quotedblleft" => '“',
        "quotedblright" => '”',
        "quotesinglbase" => '‚',
        "quotedblbase" => '„',
        "guillemotleft" => '«',
        "guillemotright" => '»',
        "guilsinglleft" => '‹',
        "guilsinglright" => '›',
        "endash" => '–',
        "emdash" => '—',
        "dagger" => '†',
        "daggerdbl" => '‡',
        "periodcentered" => '·',
        "paragraph" => '¶',
        "bullet" => '•',
        "ellipsis" => '…',
        "perthousand" => '‰',
        "questiondown" => '¿',
        "acute" => '´',
        "circumflex" => 'ˆ',
        "tilde" => '˜',
        "macron" => '¯',
        "breve" => '˘',
        "dotaccent" => '˙',
        "dieresis" => '¨',
        "ring" => '˚',
        "cedilla" => '¸',
        "hungarumlaut" => '˝',
        "ogonek" => '˛',
        "caron" => 'ˇ',
        "AE" => 'Æ',
        "ae" => 'æ',
        "OE" => 'Œ',
        "oe" => 'œ',
        "Oslash" => 'Ø',
        "oslash" => 'ø',
        "Lslash" => 'Ł',
        "lslash" => 'ł',
        "ordfeminine" => 'ª',
        "ordmasculine" => 'º',
        "dotlessi" => 'ı',
        "germandbls" => 'ß',
        "Eth" => 'Ð',
        "eth" => 'ð',
        "Thorn" => 'Þ',
        "thorn" => 'þ',
        "Euro" => '€',
        "trademark" => '™',
        "copyright" => '©',
        "registered" => '®',
        "degree" => '°',
        "plusminus" => '±',
        "mu" => 'µ',
        "multiply" => '×',
        "divide" => '÷',
        "minus" => '−',
        "logicalnot" => '¬',
        "brokenbar" => '¦',
        "onehalf" => '½',
        "onequarter" => '¼',
        "threequarters" => '¾',
        "onesuperior" => '¹',
        "twosuperior" => '²',
        "threesuperior" => '³',
        "fi" => 'ﬁ',
        "fl" => 'ﬂ',
        "ff" => 'ﬀ',
        "ffi" => 'ﬃ',
        "ffl" => 'ﬄ',
        "arrowright" => '→',
        "arrowleft" => '←',
        "checkmark" => '✓',
        "lozenge" => '◊',
        "notequal" => '≠',
        "lessequal" => '≤',
        "greaterequal" => '≥',
        "infinity" => '∞',
        _ => return None,
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_ansi() {
        assert_eq!(BaseEncoding::WinAnsi.decode(b'A'), Some('A'));
        assert_eq!(BaseEncoding::WinAnsi.decode(0x93), Some('“'));
        assert_eq!(BaseEncoding::WinAnsi.decode(0xE9), Some('é'));
        assert_eq!(BaseEncoding::WinAnsi.decode(0x81), None);
    }

    #[test]
    fn test_mac_roman() {
        assert_eq!(BaseEncoding::MacRoman.decode(0x8E), Some('é'));
        assert_eq!(BaseEncoding::MacRoman.decode(0xD0), Some('–'));
    }

    #[test]
    fn test_standard_quotes() {
        assert_eq!(BaseEncoding::Standard.decode(0x27), Some('’'));
        assert_eq!(BaseEncoding::Standard.decode(0xAE), Some('ﬁ'));
        assert_eq!(BaseEncoding::Standard.decode(0x80), None);
    }

    #[test]
    fn test_pdf_doc() {
        assert_eq!(pdf_doc_char(0x84), Some('—'));
        assert_eq!(pdf_doc_char(b'z'), Some('z'));
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_name_to_unicode("A").as_deref(), Some("A"));
        assert_eq!(glyph_name_to_unicode("eacute").as_deref(), Some("é"));
        assert_eq!(glyph_name_to_unicode("Ccedilla").as_deref(), Some("Ç"));
        assert_eq!(glyph_name_to_unicode("uni20AC").as_deref(), Some("€"));
        assert_eq!(glyph_name_to_unicode("u1F600").as_deref(), Some("😀"));
        assert_eq!(glyph_name_to_unicode("f_i").as_deref(), Some("fi"));
        assert_eq!(glyph_name_to_unicode("a.sc").as_deref(), Some("a"));
        assert_eq!(glyph_name_to_unicode(".notdef"), None);
        assert_eq!(glyph_name_to_unicode("g123"), None);
    }
}
