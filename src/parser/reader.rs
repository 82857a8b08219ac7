//! Object-level parsing on top of the lexer.

use crate::detect::find_subslice;
use crate::error::{Error, Result};

use super::lexer::{is_whitespace, Lexer, Token};
use super::object::{Dictionary, ObjectId, PdfObject, PdfStream};

/// Nesting limit for arrays and dictionaries.
const MAX_NESTING: usize = 256;

/// Parse a direct object whose first token has already been read.
///
/// `allow_references` turns `n g R` sequences into [`PdfObject::Reference`];
/// content streams have no references and pass `false`.
pub(crate) fn parse_value(
    lexer: &mut Lexer<'_>,
    first: Token,
    allow_references: bool,
) -> Result<PdfObject> {
    parse_nested(lexer, first, allow_references, 0)
}

fn parse_nested(
    lexer: &mut Lexer<'_>,
    first: Token,
    allow_references: bool,
    depth: usize,
) -> Result<PdfObject> {
    if depth > MAX_NESTING {
        return Err(Error::syntax(lexer.position(), "objects nested too deeply"));
    }

    match first {
        Token::Integer(num) => {
            if allow_references && is_reference_ahead(lexer)? {
                let gen = match lexer.next_token()? {
                    Some(Token::Integer(g)) => g,
                    _ => 0,
                };
                lexer.next_token()?; // R
                return Ok(PdfObject::Reference(ObjectId::new(
                    num as u32,
                    gen as u16,
                )));
            }
            Ok(PdfObject::Integer(num))
        }
        Token::Real(r) => Ok(PdfObject::Real(r)),
        Token::String(s) => Ok(PdfObject::String(s)),
        Token::Name(n) => Ok(PdfObject::Name(n)),
        Token::ArrayStart => {
            let mut items = Vec::new();
            loop {
                let start = lexer.position();
                match lexer.next_token()? {
                    Some(Token::ArrayEnd) => break,
                    Some(token) => {
                        items.push(parse_nested(lexer, token, allow_references, depth + 1)?)
                    }
                    None => return Err(Error::syntax(start, "unterminated array")),
                }
            }
            Ok(PdfObject::Array(items))
        }
        Token::DictStart => {
            let dict = parse_dict_body(lexer, allow_references, depth)?;
            Ok(PdfObject::Dictionary(dict))
        }
        Token::Keyword(word) => match word.as_str() {
            "true" => Ok(PdfObject::Boolean(true)),
            "false" => Ok(PdfObject::Boolean(false)),
            "null" => Ok(PdfObject::Null),
            _ => Err(Error::syntax(
                lexer.position(),
                format!("unexpected keyword '{word}'"),
            )),
        },
        Token::ArrayEnd | Token::DictEnd => {
            Err(Error::syntax(lexer.position(), "unexpected closing delimiter"))
        }
    }
}

fn is_reference_ahead(lexer: &mut Lexer<'_>) -> Result<bool> {
    let gen_ok = matches!(lexer.peek_nth(0)?, Some(Token::Integer(g)) if (0..=65535).contains(g));
    if !gen_ok {
        return Ok(false);
    }
    Ok(matches!(lexer.peek_nth(1)?, Some(Token::Keyword(k)) if k == "R"))
}

fn parse_dict_body(
    lexer: &mut Lexer<'_>,
    allow_references: bool,
    depth: usize,
) -> Result<Dictionary> {
    let mut dict = Dictionary::new();
    loop {
        let start = lexer.position();
        let key = match lexer.next_token()? {
            Some(Token::DictEnd) => break,
            Some(Token::Name(key)) => key,
            Some(_) => {
                // Skip garbage keys rather than failing the whole dictionary.
                log::debug!("Skipping non-name dictionary key at byte {start}");
                continue;
            }
            None => return Err(Error::syntax(start, "unterminated dictionary")),
        };

        let value_start = lexer.position();
        let value = match lexer.next_token()? {
            Some(Token::DictEnd) => {
                dict.insert(key, PdfObject::Null);
                break;
            }
            Some(token) => parse_nested(lexer, token, allow_references, depth + 1)?,
            None => return Err(Error::syntax(value_start, "unterminated dictionary")),
        };
        // A null value is equivalent to an absent key.
        if !value.is_null() {
            dict.insert(key, value);
        }
    }
    Ok(dict)
}

/// Reader for objects stored in a PDF file body.
pub struct ObjectReader<'a> {
    lexer: Lexer<'a>,
}

impl<'a> ObjectReader<'a> {
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        Self {
            lexer: Lexer::at(data, offset),
        }
    }

    pub fn lexer_mut(&mut self) -> &mut Lexer<'a> {
        &mut self.lexer
    }

    /// Parse one direct object (references allowed).
    pub fn parse_object(&mut self) -> Result<PdfObject> {
        let start = self.lexer.position();
        match self.lexer.next_token()? {
            Some(token) => parse_value(&mut self.lexer, token, true),
            None => Err(Error::syntax(start, "unexpected end of data")),
        }
    }

    /// Parse `num gen obj <object> [stream ... endstream] endobj` at the current position.
    pub fn parse_indirect_object(&mut self) -> Result<(ObjectId, PdfObject)> {
        let start = self.lexer.position();

        let num = match self.lexer.next_token()? {
            Some(Token::Integer(n)) if n >= 0 => n as u32,
            _ => return Err(Error::malformed(start, "expected object number")),
        };
        let gen = match self.lexer.next_token()? {
            Some(Token::Integer(g)) if (0..=65535).contains(&g) => g as u16,
            _ => return Err(Error::malformed(start, "expected generation number")),
        };
        match self.lexer.next_token()? {
            Some(Token::Keyword(k)) if k == "obj" => {}
            _ => return Err(Error::malformed(start, "expected 'obj' keyword")),
        }

        let id = ObjectId::new(num, gen);
        let value_start = self.lexer.position();
        let object = match self.lexer.next_token()? {
            // `n g obj endobj` is a null object.
            Some(Token::Keyword(k)) if k == "endobj" => return Ok((id, PdfObject::Null)),
            Some(token) => parse_value(&mut self.lexer, token, true)?,
            None => return Err(Error::malformed(value_start, "object body missing")),
        };

        let object = match object {
            PdfObject::Dictionary(dict)
                if matches!(self.lexer.peek()?, Some(Token::Keyword(k)) if k == "stream") =>
            {
                self.lexer.next_token()?;
                PdfObject::Stream(self.read_stream_body(dict)?)
            }
            other => other,
        };

        if matches!(self.lexer.peek()?, Some(Token::Keyword(k)) if k == "endobj") {
            self.lexer.next_token()?;
        } else {
            log::trace!("Object {id} missing endobj");
        }

        Ok((id, object))
    }

    /// Read raw stream bytes following the `stream` keyword.
    ///
    /// A direct `/Length` is trusted when `endstream` follows it; otherwise
    /// the data runs up to the next `endstream` marker, so an indirect or
    /// wrong length never requires resolving other objects.
    fn read_stream_body(&mut self, dict: Dictionary) -> Result<PdfStream> {
        let data = self.lexer.data();
        let mut start = self.lexer.position();

        if data.get(start) == Some(&b'\r') {
            start += 1;
        }
        if data.get(start) == Some(&b'\n') {
            start += 1;
        }

        let declared = match dict.get("Length") {
            Some(PdfObject::Integer(n)) if *n >= 0 => Some(*n as usize),
            _ => None,
        };

        let end = declared
            .and_then(|len| start.checked_add(len))
            .filter(|&end| end <= data.len() && endstream_follows(data, end))
            .or_else(|| {
                find_subslice(&data[start..], b"endstream").map(|rel| trim_eol(data, start, start + rel))
            })
            .ok_or_else(|| Error::malformed(start, "stream without endstream"))?;

        let bytes = data[start..end].to_vec();

        let after = find_subslice(&data[end..], b"endstream")
            .map(|rel| end + rel + b"endstream".len())
            .unwrap_or(data.len());
        self.lexer.set_position(after);

        Ok(PdfStream {
            dict,
            data: bytes,
            offset: start,
        })
    }
}

fn endstream_follows(data: &[u8], mut pos: usize) -> bool {
    while pos < data.len() && is_whitespace(data[pos]) {
        pos += 1;
    }
    data[pos..].starts_with(b"endstream")
}

fn trim_eol(data: &[u8], start: usize, mut end: usize) -> usize {
    if end > start && data[end - 1] == b'\n' {
        end -= 1;
    }
    if end > start && data[end - 1] == b'\r' {
        end -= 1;
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dictionary_with_reference() {
        let mut reader = ObjectReader::at(b"<< /Type /Catalog /Pages 2 0 R /Count 3 >>", 0);
        let obj = reader.parse_object().unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.type_name(), Some("Catalog"));
        assert_eq!(
            dict.get("Pages").unwrap().as_reference().unwrap(),
            ObjectId::new(2, 0)
        );
        assert_eq!(dict.get_i64("Count"), Some(3));
    }

    #[test]
    fn test_integers_without_r_stay_integers() {
        let mut reader = ObjectReader::at(b"[1 0 2 0 R 5]", 0);
        let obj = reader.parse_object().unwrap();
        assert_eq!(
            obj.as_array().unwrap(),
            &[
                PdfObject::Integer(1),
                PdfObject::Integer(0),
                PdfObject::Reference(ObjectId::new(2, 0)),
                PdfObject::Integer(5),
            ]
        );
    }

    #[test]
    fn test_indirect_object() {
        let mut reader = ObjectReader::at(b"7 0 obj\n(text)\nendobj\n", 0);
        let (id, obj) = reader.parse_indirect_object().unwrap();
        assert_eq!(id, ObjectId::new(7, 0));
        assert_eq!(obj.as_bytes().unwrap(), b"text");
    }

    #[test]
    fn test_stream_with_direct_length() {
        let mut reader = ObjectReader::at(b"4 0 obj\n<< /Length 5 >>\nstream\r\nhello\nendstream\nendobj", 0);
        let (_, obj) = reader.parse_indirect_object().unwrap();
        assert_eq!(obj.as_stream().unwrap().data, b"hello");
    }

    #[test]
    fn test_stream_with_wrong_length_scans_for_endstream() {
        let mut reader =
            ObjectReader::at(b"4 0 obj\n<< /Length 99 >>\nstream\nhello world\nendstream\nendobj", 0);
        let (_, obj) = reader.parse_indirect_object().unwrap();
        assert_eq!(obj.as_stream().unwrap().data, b"hello world");
    }

    #[test]
    fn test_stream_with_indirect_length() {
        let mut reader =
            ObjectReader::at(b"4 0 obj\n<< /Length 9 0 R >>\nstream\nabc\nendstream\nendobj", 0);
        let (_, obj) = reader.parse_indirect_object().unwrap();
        assert_eq!(obj.as_stream().unwrap().data, b"abc");
    }

    #[test]
    fn test_missing_obj_keyword_is_malformed() {
        let mut reader = ObjectReader::at(b"7 0 (x)", 0);
        assert!(matches!(
            reader.parse_indirect_object(),
            Err(Error::MalformedContainer { .. })
        ));
    }

    #[test]
    fn test_null_values_dropped_from_dict() {
        let mut reader = ObjectReader::at(b"<< /A null /B true >>", 0);
        let obj = reader.parse_object().unwrap();
        let dict = obj.as_dict().unwrap();
        assert!(!dict.contains_key("A"));
        assert_eq!(dict.get("B"), Some(&PdfObject::Boolean(true)));
    }
}
