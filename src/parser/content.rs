//! Content stream tokenization into operations.

use super::lexer::{is_delimiter, is_whitespace, Lexer, Token};
use super::object::PdfObject;
use super::reader::parse_value;

/// Operands kept before an operator arrives; older ones are discarded.
const MAX_OPERANDS: usize = 64;

/// The content-stream operators that matter for text extraction.
///
/// Everything else (paths, colours, images, shading) maps to
/// [`Operator::Other`] and is ignored by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    BeginText,
    EndText,
    SetFont,
    SetCharSpacing,
    SetWordSpacing,
    SetHorizontalScaling,
    SetLeading,
    SetTextRise,
    MoveText,
    MoveTextSetLeading,
    SetTextMatrix,
    NextLine,
    ShowText,
    ShowTextArray,
    NextLineShowText,
    NextLineShowTextSpaced,
    SaveState,
    RestoreState,
    ConcatMatrix,
    InvokeXObject,
    BeginMarkedContent,
    EndMarkedContent,
    InlineImage,
    Other,
}

impl Operator {
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "BT" => Operator::BeginText,
            "ET" => Operator::EndText,
            "Tf" => Operator::SetFont,
            "Tc" => Operator::SetCharSpacing,
            "Tw" => Operator::SetWordSpacing,
            "Tz" => Operator::SetHorizontalScaling,
            "TL" => Operator::SetLeading,
            "Ts" => Operator::SetTextRise,
            "Td" => Operator::MoveText,
            "TD" => Operator::MoveTextSetLeading,
            "Tm" => Operator::SetTextMatrix,
            "T*" => Operator::NextLine,
            "Tj" => Operator::ShowText,
            "TJ" => Operator::ShowTextArray,
            "'" => Operator::NextLineShowText,
            "\"" => Operator::NextLineShowTextSpaced,
            "q" => Operator::SaveState,
            "Q" => Operator::RestoreState,
            "cm" => Operator::ConcatMatrix,
            "Do" => Operator::InvokeXObject,
            "BMC" | "BDC" => Operator::BeginMarkedContent,
            "EMC" => Operator::EndMarkedContent,
            "BI" => Operator::InlineImage,
            _ => Operator::Other,
        }
    }
}

/// An operator with its operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operator: Operator,
    pub operands: Vec<PdfObject>,
    /// Byte offset of the operator keyword in the decoded content.
    pub offset: usize,
}

impl Operation {
    pub fn number(&self, index: usize) -> Option<f32> {
        self.operands.get(index).and_then(|o| o.as_f32().ok())
    }

    /// All six numbers of a matrix operand list.
    pub fn matrix(&self) -> Option<[f32; 6]> {
        if self.operands.len() < 6 {
            return None;
        }
        let base = self.operands.len() - 6;
        let mut m = [0.0f32; 6];
        for (i, slot) in m.iter_mut().enumerate() {
            *slot = self.number(base + i)?;
        }
        Some(m)
    }
}

/// Lazy parser producing one [`Operation`] at a time.
///
/// Syntax errors discard the pending operands and parsing resumes at the
/// next token, so a damaged stream still yields what can be read.
pub struct ContentParser<'a> {
    lexer: Lexer<'a>,
    operands: Vec<PdfObject>,
    syntax_errors: usize,
}

impl<'a> ContentParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            operands: Vec::new(),
            syntax_errors: 0,
        }
    }

    /// Resume parsing at `pos`, e.g. after a previous parser stopped there.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            lexer: Lexer::at(data, pos),
            operands: Vec::new(),
            syntax_errors: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.lexer.position()
    }

    /// Number of syntax errors skipped so far.
    pub fn syntax_errors(&self) -> usize {
        self.syntax_errors
    }

    /// Skip inline image data after `BI`, leaving the lexer after `EI`.
    fn skip_inline_image(&mut self) {
        // Dictionary entries up to ID
        loop {
            match self.lexer.next_token() {
                Ok(Some(Token::Keyword(k))) if k == "ID" => break,
                Ok(None) => return,
                _ => {}
            }
        }

        let data = self.lexer.data();
        let start = self.lexer.position() + 1;
        let mut i = start;
        while i + 1 < data.len() {
            if data[i] == b'E'
                && data[i + 1] == b'I'
                && (i == start || is_whitespace(data[i - 1]))
                && data
                    .get(i + 2)
                    .map_or(true, |&b| is_whitespace(b) || is_delimiter(b))
            {
                self.lexer.set_position(i + 2);
                return;
            }
            i += 1;
        }
        self.lexer.set_position(data.len());
    }
}

impl Iterator for ContentParser<'_> {
    type Item = Operation;

    fn next(&mut self) -> Option<Operation> {
        loop {
            let offset = self.lexer.position();
            let token = match self.lexer.next_token() {
                Ok(Some(token)) => token,
                Ok(None) => {
                    // Operands with no operator: the stream was cut short.
                    if !self.operands.is_empty() {
                        self.syntax_errors += 1;
                        self.operands.clear();
                    }
                    return None;
                }
                Err(e) => {
                    log::trace!("Content syntax error: {e}");
                    self.syntax_errors += 1;
                    self.operands.clear();
                    continue;
                }
            };

            match token {
                Token::Keyword(k) if !matches!(k.as_str(), "true" | "false" | "null") => {
                    let operator = Operator::from_keyword(&k);
                    if operator == Operator::InlineImage {
                        self.skip_inline_image();
                    }
                    return Some(Operation {
                        operator,
                        operands: std::mem::take(&mut self.operands),
                        offset,
                    });
                }
                token => match parse_value(&mut self.lexer, token, false) {
                    Ok(value) => {
                        if self.operands.len() >= MAX_OPERANDS {
                            self.operands.remove(0);
                        }
                        self.operands.push(value);
                    }
                    Err(e) => {
                        log::trace!("Content syntax error: {e}");
                        self.syntax_errors += 1;
                        self.operands.clear();
                    }
                },
            }
        }
    }
}
