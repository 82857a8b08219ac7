//! The PDF object model.
//!
//! Objects form a closed tagged union. Indirect references are kept as
//! [`ObjectId`]s and resolved through the document's object arena, never by
//! owning pointers, so cyclic object graphs are representable without
//! reference cycles in memory.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::filters;

/// Identifier of an indirect object: (object number, generation number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    pub num: u32,
    pub gen: u16,
}

impl ObjectId {
    pub fn new(num: u32, gen: u16) -> Self {
        Self { num, gen }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.num, self.gen)
    }
}

/// A PDF object.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(Vec<u8>),
    Name(String),
    Array(Vec<PdfObject>),
    Dictionary(Dictionary),
    Stream(PdfStream),
    Reference(ObjectId),
}

impl PdfObject {
    /// Human-readable variant name, used in type-mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            PdfObject::Null => "null",
            PdfObject::Boolean(_) => "boolean",
            PdfObject::Integer(_) => "integer",
            PdfObject::Real(_) => "real",
            PdfObject::String(_) => "string",
            PdfObject::Name(_) => "name",
            PdfObject::Array(_) => "array",
            PdfObject::Dictionary(_) => "dictionary",
            PdfObject::Stream(_) => "stream",
            PdfObject::Reference(_) => "reference",
        }
    }

    fn mismatch<T>(&self, expected: &'static str) -> Result<T> {
        Err(Error::TypeMismatch {
            expected,
            found: self.type_name(),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PdfObject::Null)
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            PdfObject::Boolean(b) => Ok(*b),
            _ => self.mismatch("boolean"),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            PdfObject::Integer(i) => Ok(*i),
            // Some producers write integral values as reals.
            PdfObject::Real(r) if r.fract() == 0.0 => Ok(*r as i64),
            _ => self.mismatch("integer"),
        }
    }

    /// Numeric value of an integer or real object.
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            PdfObject::Integer(i) => Ok(*i as f64),
            PdfObject::Real(r) => Ok(*r),
            _ => self.mismatch("number"),
        }
    }

    pub fn as_f32(&self) -> Result<f32> {
        self.as_f64().map(|v| v as f32)
    }

    pub fn as_name(&self) -> Result<&str> {
        match self {
            PdfObject::Name(n) => Ok(n),
            _ => self.mismatch("name"),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            PdfObject::String(s) => Ok(s),
            _ => self.mismatch("string"),
        }
    }

    /// Decode a text string (UTF-16BE with BOM, UTF-8 with BOM, else PDFDocEncoding).
    pub fn as_text_string(&self) -> Result<String> {
        self.as_bytes().map(decode_text_string)
    }

    pub fn as_array(&self) -> Result<&[PdfObject]> {
        match self {
            PdfObject::Array(a) => Ok(a),
            _ => self.mismatch("array"),
        }
    }

    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            PdfObject::Dictionary(d) => Ok(d),
            _ => self.mismatch("dictionary"),
        }
    }

    /// The dictionary of a dictionary object or of a stream object.
    pub fn as_dict_or_stream_dict(&self) -> Result<&Dictionary> {
        match self {
            PdfObject::Dictionary(d) => Ok(d),
            PdfObject::Stream(s) => Ok(&s.dict),
            _ => self.mismatch("dictionary"),
        }
    }

    pub fn as_stream(&self) -> Result<&PdfStream> {
        match self {
            PdfObject::Stream(s) => Ok(s),
            _ => self.mismatch("stream"),
        }
    }

    pub fn as_reference(&self) -> Result<ObjectId> {
        match self {
            PdfObject::Reference(id) => Ok(*id),
            _ => self.mismatch("reference"),
        }
    }
}

/// A PDF dictionary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary(HashMap<String, PdfObject>);

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PdfObject) {
        self.0.insert(key.into(), value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PdfObject)> {
        self.0.iter()
    }

    /// Name value stored under `key`, if present and a name.
    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|o| o.as_name().ok())
    }

    /// Integer value stored under `key`, if present and numeric.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|o| o.as_i64().ok())
    }

    /// The `/Type` entry.
    pub fn type_name(&self) -> Option<&str> {
        self.get_name("Type")
    }
}

impl FromIterator<(String, PdfObject)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (String, PdfObject)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A stream object: dictionary plus raw (still filtered) bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    pub dict: Dictionary,
    pub data: Vec<u8>,
    /// Byte offset of the stream data within its container, for diagnostics.
    pub offset: usize,
}

impl PdfStream {
    /// Apply the stream's filters and return the decoded bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        filters::decode_stream(&self.data, &self.dict)
    }
}

/// Decode a PDF text string into Unicode.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes
        .iter()
        .map(|&b| super::encoding::pdf_doc_char(b).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let obj = PdfObject::Integer(42);
        assert_eq!(obj.as_i64().unwrap(), 42);
        assert_eq!(obj.as_f64().unwrap(), 42.0);
        assert!(matches!(
            obj.as_name(),
            Err(Error::TypeMismatch {
                expected: "name",
                found: "integer"
            })
        ));
    }

    #[test]
    fn test_stream_dict_access() {
        let mut dict = Dictionary::new();
        dict.insert("Type", PdfObject::Name("XObject".into()));
        let stream = PdfObject::Stream(PdfStream {
            dict,
            data: Vec::new(),
            offset: 0,
        });
        assert!(stream.as_dict().is_err());
        assert_eq!(
            stream.as_dict_or_stream_dict().unwrap().type_name(),
            Some("XObject")
        );
    }

    #[test]
    fn test_decode_text_string() {
        assert_eq!(decode_text_string(b"Title"), "Title");
        assert_eq!(
            decode_text_string(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]),
            "Hi"
        );
    }

    #[test]
    fn test_object_id_display() {
        assert_eq!(ObjectId::new(7, 2).to_string(), "7 2 R");
    }
}
