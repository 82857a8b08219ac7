//! Font loading: code-to-Unicode mapping, glyph widths and style.

use std::collections::HashMap;

use super::cmap::{code_value, ToUnicodeCMap};
use super::document::PdfDocument;
use super::encoding::{glyph_name_to_unicode, BaseEncoding};
use super::object::{Dictionary, PdfObject};

/// FontDescriptor flag bits.
const FLAG_ITALIC: i64 = 1 << 6;
const FLAG_FORCE_BOLD: i64 = 1 << 18;

/// One decoded character code.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub code: u32,
    /// Unicode text, or `None` when the code has no mapping.
    pub text: Option<String>,
    /// Horizontal advance in thousandths of text space units.
    pub width: f32,
    /// Single-byte code 32, which receives word spacing.
    pub is_word_space: bool,
}

#[derive(Debug, Clone)]
enum Widths {
    Simple {
        first_char: u32,
        widths: Vec<f32>,
        missing: f32,
    },
    Cid {
        widths: HashMap<u32, f32>,
        default: f32,
    },
}

impl Widths {
    fn get(&self, code: u32) -> f32 {
        match self {
            Widths::Simple {
                first_char,
                widths,
                missing,
            } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize))
                .copied()
                .filter(|w| *w > 0.0)
                .unwrap_or(*missing),
            Widths::Cid { widths, default } => widths.get(&code).copied().unwrap_or(*default),
        }
    }
}

/// A font resource prepared for text decoding.
#[derive(Debug, Clone)]
pub struct Font {
    /// Base font name without the subset prefix.
    pub name: String,
    pub bold: bool,
    pub italic: bool,
    composite: bool,
    /// Code → text table for simple fonts.
    simple_map: Vec<Option<String>>,
    to_unicode: Option<ToUnicodeCMap>,
    /// Composite fonts whose codes are UTF-16 (`Uni*-UCS2-*`, `Uni*-UTF16-*`).
    unicode_codes: bool,
    widths: Widths,
    /// Name of an encoding this decoder does not implement.
    pub unsupported_encoding: Option<String>,
}

impl Font {
    /// Build a font from its dictionary. Unreadable parts degrade to defaults.
    pub fn load(doc: &PdfDocument, dict: &Dictionary) -> Self {
        let base_name = dict
            .get_name("BaseFont")
            .map(strip_subset_prefix)
            .unwrap_or("Unknown")
            .to_string();
        let subtype = dict.get_name("Subtype").unwrap_or("Type1");

        let to_unicode = doc
            .resolve_key(dict, "ToUnicode")
            .and_then(|obj| obj.as_stream().ok().map(|s| s.decode()))
            .and_then(|decoded| match decoded {
                Ok(data) => Some(ToUnicodeCMap::parse(&data)),
                Err(e) => {
                    log::debug!("ToUnicode for {base_name} unreadable: {e}");
                    None
                }
            })
            .filter(|cmap| !cmap.is_empty());

        if subtype == "Type0" {
            Self::load_composite(doc, dict, base_name, to_unicode)
        } else {
            Self::load_simple(doc, dict, base_name, subtype, to_unicode)
        }
    }

    /// Stand-in for a font resource that could not be resolved.
    pub fn fallback(name: &str) -> Self {
        let (bold, italic) = style_from_name(name);
        Self {
            name: name.to_string(),
            bold,
            italic,
            composite: false,
            simple_map: build_simple_map(BaseEncoding::WinAnsi, None),
            to_unicode: None,
            unicode_codes: false,
            widths: Widths::Simple {
                first_char: 0,
                widths: Vec::new(),
                missing: 500.0,
            },
            unsupported_encoding: None,
        }
    }

    fn load_simple(
        doc: &PdfDocument,
        dict: &Dictionary,
        name: String,
        subtype: &str,
        to_unicode: Option<ToUnicodeCMap>,
    ) -> Self {
        let default_base = if subtype == "TrueType" {
            BaseEncoding::WinAnsi
        } else {
            BaseEncoding::Standard
        };

        let mut unsupported_encoding = None;
        let (base, differences) = match doc.resolve_key(dict, "Encoding") {
            Some(enc) => match &*enc {
                PdfObject::Name(n) => match BaseEncoding::from_name(n) {
                    Some(base) => (base, None),
                    None => {
                        unsupported_encoding = Some(n.clone());
                        (default_base, None)
                    }
                },
                PdfObject::Dictionary(d) => {
                    let base = d
                        .get_name("BaseEncoding")
                        .and_then(BaseEncoding::from_name)
                        .unwrap_or(default_base);
                    let diffs = doc
                        .resolve_key(d, "Differences")
                        .and_then(|a| a.as_array().ok().map(|items| parse_differences(doc, items)));
                    (base, diffs)
                }
                _ => (default_base, None),
            },
            None => (default_base, None),
        };

        // Type3 glyph widths are in glyph space, scaled by the font matrix.
        let scale = if subtype == "Type3" {
            doc.resolve_key(dict, "FontMatrix")
                .and_then(|m| m.as_array().ok().and_then(|a| a.first()?.as_f32().ok()))
                .map(|sx| sx * 1000.0)
                .unwrap_or(1.0)
        } else {
            1.0
        };

        let descriptor = doc
            .resolve_key(dict, "FontDescriptor")
            .and_then(|d| d.as_dict().ok().cloned());
        let missing = descriptor
            .as_ref()
            .and_then(|d| d.get("MissingWidth").and_then(|w| w.as_f32().ok()))
            .filter(|w| *w > 0.0)
            .unwrap_or(if name.contains("Courier") { 600.0 } else { 500.0 });

        let widths = Widths::Simple {
            first_char: dict.get_i64("FirstChar").unwrap_or(0).max(0) as u32,
            widths: doc
                .resolve_key(dict, "Widths")
                .and_then(|w| {
                    w.as_array().ok().map(|items| {
                        items
                            .iter()
                            .map(|i| doc.resolve(i).ok().and_then(|v| v.as_f32().ok()).unwrap_or(0.0) * scale)
                            .collect()
                    })
                })
                .unwrap_or_default(),
            missing,
        };

        let (bold, italic) = style(&name, descriptor.as_ref());

        Self {
            name,
            bold,
            italic,
            composite: false,
            simple_map: build_simple_map(base, differences.as_deref()),
            to_unicode,
            unicode_codes: false,
            widths,
            unsupported_encoding,
        }
    }

    fn load_composite(
        doc: &PdfDocument,
        dict: &Dictionary,
        name: String,
        to_unicode: Option<ToUnicodeCMap>,
    ) -> Self {
        let mut unsupported_encoding = None;
        let mut unicode_codes = false;
        match dict.get("Encoding") {
            Some(PdfObject::Name(enc)) => {
                if enc.contains("UCS2") || enc.contains("UTF16") {
                    unicode_codes = true;
                } else if !enc.starts_with("Identity") && to_unicode.is_none() {
                    unsupported_encoding = Some(enc.clone());
                }
            }
            Some(_) if to_unicode.is_none() => {
                unsupported_encoding = Some("embedded CMap".to_string());
            }
            _ => {}
        }

        let descendant = doc
            .resolve_key(dict, "DescendantFonts")
            .and_then(|d| {
                let first = d.as_array().ok()?.first()?.clone();
                let resolved = doc.resolve(&first).ok()?;
                resolved.as_dict().ok().cloned()
            })
            .unwrap_or_default();

        let default = descendant
            .get("DW")
            .and_then(|w| w.as_f32().ok())
            .unwrap_or(1000.0);
        let widths = doc
            .resolve_key(&descendant, "W")
            .and_then(|w| w.as_array().ok().map(|items| parse_cid_widths(doc, items)))
            .unwrap_or_default();

        let descriptor = doc
            .resolve_key(&descendant, "FontDescriptor")
            .and_then(|d| d.as_dict().ok().cloned());
        let (bold, italic) = style(&name, descriptor.as_ref());

        Self {
            name,
            bold,
            italic,
            composite: true,
            simple_map: Vec::new(),
            to_unicode,
            unicode_codes,
            widths: Widths::Cid { widths, default },
            unsupported_encoding,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.composite
    }

    /// Split a string operand into character codes and map each to Unicode.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        if self.composite {
            self.decode_composite(bytes)
        } else {
            bytes.iter().map(|&b| self.decode_simple(b)).collect()
        }
    }

    fn decode_simple(&self, byte: u8) -> Glyph {
        let code = u32::from(byte);
        let text = self
            .to_unicode
            .as_ref()
            .and_then(|cmap| cmap.lookup(code, 1).or_else(|| cmap.lookup(code, 2)))
            .or_else(|| self.simple_map.get(usize::from(byte)).cloned().flatten());
        Glyph {
            code,
            text,
            width: self.widths.get(code),
            is_word_space: byte == b' ',
        }
    }

    fn decode_composite(&self, bytes: &[u8]) -> Vec<Glyph> {
        let mut glyphs = Vec::with_capacity(bytes.len() / 2);
        let mut i = 0;

        while i < bytes.len() {
            let rest = &bytes[i..];
            let len = self
                .to_unicode
                .as_ref()
                .filter(|cmap| cmap.has_codespaces())
                .and_then(|cmap| cmap.code_length(rest))
                .unwrap_or(2)
                .min(rest.len());
            let code = code_value(&rest[..len]);

            let text = self
                .to_unicode
                .as_ref()
                .and_then(|cmap| cmap.lookup(code, len))
                .or_else(|| {
                    self.unicode_codes
                        .then(|| char::from_u32(code).map(String::from))
                        .flatten()
                });

            glyphs.push(Glyph {
                code,
                text,
                width: self.widths.get(code),
                is_word_space: len == 1 && code == 32,
            });
            i += len;
        }

        glyphs
    }
}

fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((prefix, rest)) if prefix.len() == 6 && prefix.bytes().all(|b| b.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

fn style_from_name(name: &str) -> (bool, bool) {
    let lower = name.to_lowercase();
    let bold = lower.contains("bold")
        || lower.contains("black")
        || lower.contains("heavy")
        || lower.contains("demi");
    let italic = lower.contains("italic") || lower.contains("oblique");
    (bold, italic)
}

fn style(name: &str, descriptor: Option<&Dictionary>) -> (bool, bool) {
    let (mut bold, mut italic) = style_from_name(name);
    if let Some(desc) = descriptor {
        let flags = desc.get_i64("Flags").unwrap_or(0);
        bold |= flags & FLAG_FORCE_BOLD != 0;
        bold |= desc.get_i64("FontWeight").is_some_and(|w| w >= 600);
        italic |= flags & FLAG_ITALIC != 0;
        italic |= desc
            .get("ItalicAngle")
            .and_then(|a| a.as_f32().ok())
            .is_some_and(|a| a.abs() > 5.0);
    }
    (bold, italic)
}

/// `/Differences` as (code, glyph name) pairs.
fn parse_differences(doc: &PdfDocument, items: &[PdfObject]) -> Vec<(u8, String)> {
    let mut out = Vec::new();
    let mut code: Option<u32> = None;
    for item in items {
        let Ok(item) = doc.resolve(item) else {
            continue;
        };
        match &*item {
            PdfObject::Integer(n) => code = u32::try_from(*n).ok(),
            PdfObject::Name(glyph) => {
                if let Some(c) = code.filter(|c| *c <= 255) {
                    out.push((c as u8, glyph.clone()));
                    code = Some(c + 1);
                }
            }
            _ => {}
        }
    }
    out
}

fn build_simple_map(base: BaseEncoding, differences: Option<&[(u8, String)]>) -> Vec<Option<String>> {
    let mut map: Vec<Option<String>> = (0..=255u8)
        .map(|b| base.decode(b).map(String::from))
        .collect();
    for (code, glyph) in differences.unwrap_or_default() {
        map[usize::from(*code)] = glyph_name_to_unicode(glyph);
    }
    map
}

/// `/W` array: `c [w1 w2 ...]` or `c_first c_last w`.
fn parse_cid_widths(doc: &PdfDocument, items: &[PdfObject]) -> HashMap<u32, f32> {
    let values: Vec<PdfObject> = items
        .iter()
        .filter_map(|i| doc.resolve(i).ok().map(|r| (*r).clone()))
        .collect();

    let mut widths = HashMap::new();
    let mut i = 0;
    while i < values.len() {
        let Ok(first) = values[i].as_i64() else {
            i += 1;
            continue;
        };
        let first = first.max(0) as u32;
        match values.get(i + 1) {
            Some(PdfObject::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    if let Ok(w) = w.as_f32() {
                        widths.insert(first + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Ok(last), Some(Ok(w))) = (last.as_i64(), values.get(i + 2).map(|w| w.as_f32())) else {
                    i += 1;
                    continue;
                };
                for cid in first..=(last.max(0) as u32).min(first.saturating_add(0xFFFF)) {
                    widths.insert(cid, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}
