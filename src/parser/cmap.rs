//! ToUnicode CMap parsing.

use std::collections::HashMap;

use super::encoding::glyph_name_to_unicode;
use super::lexer::{Lexer, Token};

#[derive(Debug, Clone)]
struct CodespaceRange {
    low: Vec<u8>,
    high: Vec<u8>,
}

impl CodespaceRange {
    fn contains(&self, code: &[u8]) -> bool {
        code.len() == self.low.len()
            && code
                .iter()
                .zip(self.low.iter().zip(&self.high))
                .all(|(b, (lo, hi))| lo <= b && b <= hi)
    }
}

#[derive(Debug, Clone)]
struct BfRange {
    low: u32,
    high: u32,
    len: usize,
    /// UTF-16BE bytes of the first destination; later codes increment the last unit.
    start: Vec<u8>,
}

/// Mapping from character codes to Unicode text.
#[derive(Debug, Clone, Default)]
pub struct ToUnicodeCMap {
    codespaces: Vec<CodespaceRange>,
    chars: HashMap<(usize, u32), String>,
    ranges: Vec<BfRange>,
}

impl ToUnicodeCMap {
    /// Parse a ToUnicode CMap program. Malformed entries are skipped.
    pub fn parse(data: &[u8]) -> Self {
        let mut cmap = Self::default();
        let mut lexer = Lexer::new(data);

        loop {
            let token = match lexer.next_token() {
                Ok(Some(token)) => token,
                Ok(None) => break,
                // Stray delimiters in hand-written CMaps.
                Err(_) => continue,
            };
            let Token::Keyword(keyword) = token else {
                continue;
            };
            match keyword.as_str() {
                "begincodespacerange" => cmap.read_codespaces(&mut lexer),
                "beginbfchar" => cmap.read_bfchar(&mut lexer),
                "beginbfrange" => cmap.read_bfrange(&mut lexer),
                _ => {}
            }
        }

        cmap
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty() && self.ranges.is_empty()
    }

    /// Whether a codespace was declared; without one, code lengths come from the font type.
    pub fn has_codespaces(&self) -> bool {
        !self.codespaces.is_empty()
    }

    /// Length of the code starting at `bytes[0]` according to the codespace ranges.
    pub fn code_length(&self, bytes: &[u8]) -> Option<usize> {
        (1..=4.min(bytes.len())).find(|&len| {
            let code = &bytes[..len];
            self.codespaces.iter().any(|r| r.contains(code))
        })
    }

    /// Unicode text for a code of `len` bytes.
    pub fn lookup(&self, code: u32, len: usize) -> Option<String> {
        if let Some(text) = self.chars.get(&(len, code)) {
            return Some(text.clone());
        }
        let range = self
            .ranges
            .iter()
            .find(|r| r.len == len && r.low <= code && code <= r.high)?;
        let mut bytes = range.start.clone();
        let offset = code - range.low;
        // Increment the trailing UTF-16 code unit.
        let n = bytes.len();
        if n >= 2 {
            let last = u16::from_be_bytes([bytes[n - 2], bytes[n - 1]]);
            let [hi, lo] = last.wrapping_add(offset as u16).to_be_bytes();
            bytes[n - 2] = hi;
            bytes[n - 1] = lo;
        } else if n == 1 {
            bytes[0] = bytes[0].wrapping_add(offset as u8);
        }
        Some(decode_utf16be(&bytes))
    }

    fn read_codespaces(&mut self, lexer: &mut Lexer<'_>) {
        while let Some((low, high)) = read_pair(lexer, "endcodespacerange") {
            if low.len() == high.len() && !low.is_empty() {
                self.codespaces.push(CodespaceRange { low, high });
            }
        }
    }

    fn read_bfchar(&mut self, lexer: &mut Lexer<'_>) {
        loop {
            let src = match lexer.next_token() {
                Ok(Some(Token::String(src))) => src,
                Ok(Some(Token::Keyword(k))) if k == "endbfchar" => return,
                Ok(None) => return,
                _ => continue,
            };
            let dst = match lexer.next_token() {
                Ok(Some(Token::String(bytes))) => decode_utf16be(&bytes),
                Ok(Some(Token::Name(name))) => match glyph_name_to_unicode(&name) {
                    Some(text) => text,
                    None => continue,
                },
                Ok(Some(Token::Keyword(k))) if k == "endbfchar" => return,
                _ => continue,
            };
            self.insert_char(&src, dst);
        }
    }

    fn read_bfrange(&mut self, lexer: &mut Lexer<'_>) {
        while let Some((low, high)) = read_pair(lexer, "endbfrange") {
            let len = low.len();
            let (lo, hi) = (code_value(&low), code_value(&high));
            if len == 0 || len != high.len() || hi < lo {
                continue;
            }
            match lexer.next_token() {
                Ok(Some(Token::String(start))) => self.ranges.push(BfRange {
                    low: lo,
                    high: hi,
                    len,
                    start,
                }),
                Ok(Some(Token::ArrayStart)) => {
                    let mut code = lo;
                    loop {
                        match lexer.next_token() {
                            Ok(Some(Token::String(bytes))) => {
                                if code <= hi {
                                    self.chars.insert((len, code), decode_utf16be(&bytes));
                                }
                                code = code.saturating_add(1);
                            }
                            Ok(Some(Token::ArrayEnd)) | Ok(None) => break,
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn insert_char(&mut self, src: &[u8], dst: String) {
        let key = (src.len(), code_value(src));
        // A non-breaking space must not shadow an existing space mapping.
        if dst == "\u{A0}" && self.chars.get(&key).is_some_and(|s| s == " ") {
            return;
        }
        self.chars.insert(key, dst);
    }
}

/// Read two string operands, stopping at `end`.
fn read_pair(lexer: &mut Lexer<'_>, end: &str) -> Option<(Vec<u8>, Vec<u8>)> {
    loop {
        let first = match lexer.next_token() {
            Ok(Some(Token::String(s))) => s,
            Ok(Some(Token::Keyword(k))) if k == end => return None,
            Ok(None) => return None,
            _ => continue,
        };
        match lexer.next_token() {
            Ok(Some(Token::String(second))) => return Some((first, second)),
            Ok(Some(Token::Keyword(k))) if k == end => return None,
            Ok(None) => return None,
            _ => continue,
        }
    }
}

pub(crate) fn code_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

fn decode_utf16be(bytes: &[u8]) -> String {
    if bytes.len() == 1 {
        return char::from(bytes[0]).to_string();
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}
