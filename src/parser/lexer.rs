//! Byte-level tokenizer for PDF syntax.
//!
//! The same lexer drives both the object parser (file bodies, object streams,
//! xref streams) and the content-stream parser; it works on a borrowed slice
//! and never copies the input.

use std::collections::VecDeque;

use crate::error::{Error, Result};

/// PDF token types.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Integer(i64),
    Real(f64),
    /// Literal `( )` or hexadecimal `< >` string, already unescaped.
    String(Vec<u8>),
    /// Name without the leading slash, `#xx` escapes resolved.
    Name(String),
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
    /// Any bare word: `obj`, `R`, `true`, `null`, content operators, ...
    Keyword(String),
}

pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

pub(crate) fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

/// Tokenizer over a byte slice.
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
    peeked: VecDeque<(Token, usize)>,
}

impl<'a> Lexer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    /// Create a lexer positioned at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos: pos.min(data.len()),
            peeked: VecDeque::new(),
        }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Offset of the next unread token.
    pub fn position(&self) -> usize {
        self.peeked.front().map(|(_, start)| *start).unwrap_or(self.pos)
    }

    /// Jump to an absolute offset, discarding any peeked tokens.
    pub fn set_position(&mut self, pos: usize) {
        self.peeked.clear();
        self.pos = pos.min(self.data.len());
    }

    /// Consume and return the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        if let Some((token, _)) = self.peeked.pop_front() {
            return Ok(Some(token));
        }
        self.read_token().map(|t| t.map(|(token, _)| token))
    }

    /// Look at the `n`-th upcoming token (0-based) without consuming it.
    pub fn peek_nth(&mut self, n: usize) -> Result<Option<&Token>> {
        while self.peeked.len() <= n {
            match self.read_token()? {
                Some(entry) => self.peeked.push_back(entry),
                None => return Ok(None),
            }
        }
        Ok(self.peeked.get(n).map(|(token, _)| token))
    }

    pub fn peek(&mut self) -> Result<Option<&Token>> {
        self.peek_nth(0)
    }

    pub(crate) fn skip_whitespace_and_comments(&mut self) {
        while self.pos < self.data.len() {
            let b = self.data[self.pos];
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while self.pos < self.data.len()
                    && self.data[self.pos] != b'\n'
                    && self.data[self.pos] != b'\r'
                {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn read_token(&mut self) -> Result<Option<(Token, usize)>> {
        self.skip_whitespace_and_comments();
        let start = self.pos;
        let Some(&b) = self.data.get(self.pos) else {
            return Ok(None);
        };

        let token = match b {
            b'/' => {
                self.pos += 1;
                self.read_name()
            }
            b'(' => {
                self.pos += 1;
                self.read_literal_string(start)?
            }
            b'<' => {
                if self.data.get(self.pos + 1) == Some(&b'<') {
                    self.pos += 2;
                    Token::DictStart
                } else {
                    self.pos += 1;
                    self.read_hex_string()
                }
            }
            b'>' => {
                if self.data.get(self.pos + 1) == Some(&b'>') {
                    self.pos += 2;
                    Token::DictEnd
                } else {
                    self.pos += 1;
                    return Err(Error::syntax(start, "unexpected '>'"));
                }
            }
            b'[' => {
                self.pos += 1;
                Token::ArrayStart
            }
            b']' => {
                self.pos += 1;
                Token::ArrayEnd
            }
            b'{' | b'}' => {
                self.pos += 1;
                Token::Keyword((b as char).to_string())
            }
            b')' => {
                self.pos += 1;
                return Err(Error::syntax(start, "unbalanced ')'"));
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number(),
            _ => {
                let word = self.read_regular_run();
                Token::Keyword(String::from_utf8_lossy(word).into_owned())
            }
        };

        Ok(Some((token, start)))
    }

    fn read_regular_run(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self.pos < self.data.len() && is_regular(self.data[self.pos]) {
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    fn read_number(&mut self) -> Token {
        let run = self.read_regular_run();
        let text = String::from_utf8_lossy(run);

        if !text.contains('.') {
            if let Ok(i) = text.parse::<i64>() {
                return Token::Integer(i);
            }
        }
        if let Ok(r) = text.parse::<f64>() {
            return Token::Real(r);
        }

        // Malformed numbers such as "--5" or "1.2.3" appear in the wild;
        // keep the longest parseable prefix after collapsing repeated signs.
        let negative = text.starts_with('-');
        let digits: String = text
            .trim_start_matches(['+', '-'])
            .chars()
            .scan(false, |seen_dot, c| match c {
                '0'..='9' => Some(c),
                '.' if !*seen_dot => {
                    *seen_dot = true;
                    Some(c)
                }
                _ => None,
            })
            .collect();
        let value = digits.parse::<f64>().unwrap_or(0.0);
        if !digits.is_empty() && !digits.contains('.') {
            let i = value as i64;
            return Token::Integer(if negative { -i } else { i });
        }
        Token::Real(if negative { -value } else { value })
    }

    fn read_name(&mut self) -> Token {
        let run = self.read_regular_run();
        let mut name = Vec::with_capacity(run.len());
        let mut i = 0;
        while i < run.len() {
            if run[i] == b'#' {
                let hi = run.get(i + 1).copied().and_then(hex_value);
                let lo = run.get(i + 2).copied().and_then(hex_value);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    name.push(hi << 4 | lo);
                    i += 3;
                    continue;
                }
            }
            name.push(run[i]);
            i += 1;
        }
        Token::Name(String::from_utf8_lossy(&name).into_owned())
    }

    fn read_literal_string(&mut self, start: usize) -> Result<Token> {
        let mut out = Vec::new();
        let mut depth = 1usize;

        while self.pos < self.data.len() {
            let b = self.data[self.pos];
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    out.push(b);
                }
                b'\\' => {
                    let Some(&esc) = self.data.get(self.pos) else {
                        break;
                    };
                    self.pos += 1;
                    match esc {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0C),
                        b'0'..=b'7' => {
                            let mut value = u32::from(esc - b'0');
                            for _ in 0..2 {
                                match self.data.get(self.pos) {
                                    Some(&d @ b'0'..=b'7') => {
                                        value = value * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push((value & 0xFF) as u8);
                        }
                        b'\r' => {
                            // Line continuation
                            if self.data.get(self.pos) == Some(&b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        other => out.push(other),
                    }
                }
                b'\r' => {
                    if self.data.get(self.pos) == Some(&b'\n') {
                        self.pos += 1;
                    }
                    out.push(b'\n');
                }
                _ => out.push(b),
            }
        }

        if depth > 0 {
            return Err(Error::syntax(start, "unterminated string"));
        }
        Ok(Token::String(out))
    }

    fn read_hex_string(&mut self) -> Token {
        let mut out = Vec::new();
        let mut high: Option<u8> = None;

        while self.pos < self.data.len() {
            let b = self.data[self.pos];
            self.pos += 1;
            if b == b'>' {
                break;
            }
            let Some(v) = hex_value(b) else {
                continue;
            };
            match high.take() {
                Some(h) => out.push(h << 4 | v),
                None => high = Some(v),
            }
        }
        if let Some(h) = high {
            out.push(h << 4);
        }

        Token::String(out)
    }
}

pub(crate) fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
