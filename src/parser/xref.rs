//! Cross-reference tables, cross-reference streams and linear-scan recovery.

use std::collections::{BTreeMap, HashSet};

use regex::bytes::Regex;

use crate::detect::find_subslice;
use crate::error::{Error, Result};

use super::lexer::Token;
use super::object::{Dictionary, PdfObject};
use super::reader::ObjectReader;

/// How far from the end of the file `startxref` may appear.
const STARTXREF_SEARCH_WINDOW: usize = 1024;

/// Upper bound on `/Prev` chain length.
const MAX_XREF_SECTIONS: usize = 512;

/// Location of an object as recorded by a cross-reference section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    Free,
    InUse { offset: usize, gen: u16 },
    /// Stored at position `index` inside object stream `stream`.
    Compressed { stream: u32, index: u32 },
}

/// The merged cross-reference data of a document.
#[derive(Debug, Clone, Default)]
pub struct XrefTable {
    pub entries: BTreeMap<u32, XrefEntry>,
    pub trailer: Dictionary,
}

impl XrefTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge an older section: existing (newer) entries win, except that a
    /// free slot may be filled.
    fn merge_older(&mut self, entries: Vec<(u32, XrefEntry)>, trailer: &Dictionary) {
        for (num, entry) in entries {
            match self.entries.get(&num) {
                None | Some(XrefEntry::Free) if entry != XrefEntry::Free => {
                    self.entries.insert(num, entry);
                }
                None => {
                    self.entries.insert(num, entry);
                }
                _ => {}
            }
        }
        for (key, value) in trailer.iter() {
            if !self.trailer.contains_key(key) {
                self.trailer.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Locate the offset recorded after the last `startxref` keyword.
pub fn find_startxref(data: &[u8]) -> Result<usize> {
    let window_start = data.len().saturating_sub(STARTXREF_SEARCH_WINDOW);
    let window = &data[window_start..];

    let rel = window
        .windows(b"startxref".len())
        .rposition(|w| w == b"startxref")
        .ok_or_else(|| Error::malformed(data.len(), "startxref not found"))?;
    let pos = window_start + rel + b"startxref".len();

    let mut reader = ObjectReader::at(data, pos);
    match reader.lexer_mut().next_token()? {
        Some(Token::Integer(offset)) if offset >= 0 => Ok(offset as usize),
        _ => Err(Error::malformed(pos, "startxref is not followed by an offset")),
    }
}

/// Load every cross-reference section reachable from `startxref`.
///
/// `header_offset` is the position of `%PDF-`; files with leading junk
/// sometimes record offsets relative to it.
pub fn load_xref(data: &[u8], header_offset: usize) -> Result<XrefTable> {
    let start = find_startxref(data)?;
    let mut table = XrefTable::default();
    let mut visited = HashSet::new();
    let mut next = Some(start);

    while let Some(offset) = next.take() {
        if visited.len() >= MAX_XREF_SECTIONS || !visited.insert(offset) {
            log::warn!("Cross-reference chain loops back to byte {offset}, stopping");
            break;
        }

        let (entries, trailer) = match parse_section(data, offset) {
            Ok(section) => section,
            Err(e) if header_offset > 0 => {
                log::debug!("Retrying xref section at {offset} relative to header: {e}");
                parse_section(data, offset + header_offset)?
            }
            Err(e) => return Err(e),
        };

        table.merge_older(entries, &trailer);

        // Hybrid files: the /XRefStm stream belongs to the same revision.
        if let Some(stm) = trailer.get_i64("XRefStm") {
            let stm = stm as usize;
            if visited.insert(stm) {
                match parse_section(data, stm) {
                    Ok((stm_entries, _)) => table.merge_older(stm_entries, &Dictionary::new()),
                    Err(e) => log::warn!("Ignoring unreadable /XRefStm at byte {stm}: {e}"),
                }
            }
        }

        next = trailer.get_i64("Prev").filter(|p| *p >= 0).map(|p| p as usize);
    }

    if table.is_empty() {
        return Err(Error::xref(start, "cross-reference data has no entries"));
    }
    if !table.trailer.contains_key("Root") {
        return Err(Error::xref(start, "trailer has no /Root"));
    }

    log::debug!("Loaded {} cross-reference entries", table.len());
    Ok(table)
}

type Section = (Vec<(u32, XrefEntry)>, Dictionary);

fn parse_section(data: &[u8], offset: usize) -> Result<Section> {
    if offset >= data.len() {
        return Err(Error::xref(offset, "offset beyond end of file"));
    }

    let mut reader = ObjectReader::at(data, offset);
    match reader.lexer_mut().peek()? {
        Some(Token::Keyword(k)) if k == "xref" => {
            reader.lexer_mut().next_token()?;
            parse_classic_table(&mut reader, offset)
        }
        Some(Token::Integer(_)) => parse_xref_stream(&mut reader, offset),
        _ => Err(Error::xref(offset, "expected 'xref' or an xref stream")),
    }
}

fn parse_classic_table(reader: &mut ObjectReader<'_>, offset: usize) -> Result<Section> {
    let mut entries = Vec::new();

    loop {
        let lexer = reader.lexer_mut();
        let first = match lexer.next_token()? {
            Some(Token::Keyword(k)) if k == "trailer" => break,
            Some(Token::Integer(n)) if n >= 0 => n as u32,
            _ => return Err(Error::xref(lexer.position(), "bad subsection header")),
        };
        let count = match lexer.next_token()? {
            Some(Token::Integer(n)) if n >= 0 => n as u32,
            _ => return Err(Error::xref(lexer.position(), "bad subsection count")),
        };

        for i in 0..count {
            let pos = lexer.position();
            let field1 = lexer.next_token()?;
            let field2 = lexer.next_token()?;
            let kind = lexer.next_token()?;
            let entry = match (field1, field2, kind) {
                (Some(Token::Integer(off)), Some(Token::Integer(gen)), Some(Token::Keyword(k))) => {
                    match k.as_str() {
                        "n" if off > 0 => XrefEntry::InUse {
                            offset: off as usize,
                            gen: gen.clamp(0, 65535) as u16,
                        },
                        // In-use entries pointing at offset 0 are unusable.
                        "n" | "f" => XrefEntry::Free,
                        _ => return Err(Error::xref(pos, format!("bad entry type '{k}'"))),
                    }
                }
                _ => return Err(Error::xref(pos, "truncated xref entry")),
            };
            entries.push((first + i, entry));
        }
    }

    let trailer = match reader.parse_object() {
        Ok(PdfObject::Dictionary(d)) => d,
        Ok(other) => {
            return Err(Error::xref(
                offset,
                format!("trailer is a {}", other.type_name()),
            ))
        }
        Err(e) => return Err(Error::xref(offset, format!("unreadable trailer: {e}"))),
    };

    Ok((entries, trailer))
}

fn parse_xref_stream(reader: &mut ObjectReader<'_>, offset: usize) -> Result<Section> {
    let (_, object) = reader
        .parse_indirect_object()
        .map_err(|e| Error::xref(offset, format!("unreadable xref stream: {e}")))?;
    let stream = object
        .as_stream()
        .map_err(|_| Error::xref(offset, "xref object is not a stream"))?;
    if stream.dict.type_name() != Some("XRef") {
        return Err(Error::xref(offset, "stream is not of /Type /XRef"));
    }

    let widths: Vec<usize> = stream
        .dict
        .get("W")
        .and_then(|w| w.as_array().ok())
        .map(|w| w.iter().filter_map(|o| o.as_i64().ok()).map(|v| v.max(0) as usize).collect())
        .unwrap_or_default();
    if widths.len() != 3 || widths.iter().any(|&w| w > 8) {
        return Err(Error::xref(offset, "invalid /W array"));
    }

    let size = stream.dict.get_i64("Size").unwrap_or(0).max(0) as u32;
    let index: Vec<(u32, u32)> = match stream.dict.get("Index").and_then(|i| i.as_array().ok()) {
        Some(items) => items
            .chunks_exact(2)
            .filter_map(|pair| Some((pair[0].as_i64().ok()? as u32, pair[1].as_i64().ok()? as u32)))
            .collect(),
        None => vec![(0, size)],
    };

    let data = stream
        .decode()
        .map_err(|e| Error::xref(offset, format!("xref stream decode failed: {e}")))?;

    let row = widths[0] + widths[1] + widths[2];
    let mut entries = Vec::new();
    let mut pos = 0usize;

    'sections: for (first, count) in index {
        for i in 0..count {
            if pos + row > data.len() {
                log::debug!("Xref stream at {offset} truncated after {} entries", entries.len());
                break 'sections;
            }
            let kind = if widths[0] == 0 {
                1
            } else {
                read_field(&data[pos..], widths[0])
            };
            let field2 = read_field(&data[pos + widths[0]..], widths[1]);
            let field3 = read_field(&data[pos + widths[0] + widths[1]..], widths[2]);
            pos += row;

            let entry = match kind {
                0 => XrefEntry::Free,
                1 if field2 > 0 => XrefEntry::InUse {
                    offset: field2 as usize,
                    gen: field3 as u16,
                },
                1 => XrefEntry::Free,
                2 => XrefEntry::Compressed {
                    stream: field2 as u32,
                    index: field3 as u32,
                },
                // Unknown types are treated as null references.
                _ => XrefEntry::Free,
            };
            entries.push((first + i, entry));
        }
    }

    Ok((entries, stream.dict.clone()))
}

fn read_field(data: &[u8], width: usize) -> u64 {
    data.iter()
        .take(width)
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Offsets of every `n g obj` header in the file. Later definitions win.
pub fn scan_object_offsets(data: &[u8]) -> BTreeMap<u32, (usize, u16)> {
    let mut found = BTreeMap::new();
    for (num, gen, offset) in object_headers(data) {
        found.insert(num, (offset, gen));
    }
    found
}

fn object_headers(data: &[u8]) -> impl Iterator<Item = (u32, u16, usize)> + '_ {
    static PATTERN: std::sync::OnceLock<Option<Regex>> = std::sync::OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(?-u)(?:^|[^0-9])([0-9]{1,10})[\x00\t\n\x0C\r ]+([0-9]{1,5})[\x00\t\n\x0C\r ]+obj").ok()
    });

    pattern
        .iter()
        .flat_map(move |re| re.captures_iter(data))
        .filter_map(|caps| {
            let num_match = caps.get(1)?;
            let num = std::str::from_utf8(num_match.as_bytes()).ok()?.parse::<u32>().ok()?;
            let gen = std::str::from_utf8(caps.get(2)?.as_bytes()).ok()?.parse::<u16>().ok()?;
            Some((num, gen, num_match.start()))
        })
}

/// Rebuild cross-reference data by scanning the whole file.
///
/// The trailer is merged from every `trailer` dictionary in the file, newest
/// first. The caller is responsible for locating a catalog when the result
/// has no usable `/Root`.
pub fn rebuild_by_scanning(data: &[u8]) -> XrefTable {
    let mut table = XrefTable::default();

    for (num, (offset, gen)) in scan_object_offsets(data) {
        table.entries.insert(num, XrefEntry::InUse { offset, gen });
    }

    let mut search_end = data.len();
    while let Some(pos) = data[..search_end]
        .windows(b"trailer".len())
        .rposition(|w| w == b"trailer")
    {
        let mut reader = ObjectReader::at(data, pos + b"trailer".len());
        if let Ok(PdfObject::Dictionary(dict)) = reader.parse_object() {
            table.merge_older(Vec::new(), &dict);
        }
        search_end = pos;
    }

    // Xref stream dictionaries carry trailer keys too.
    if !table.trailer.contains_key("Root") {
        let mut cursor = 0;
        while let Some(rel) = find_subslice(&data[cursor..], b"/XRef") {
            let at = cursor + rel;
            cursor = at + 1;
            if let Some(dict_start) = data[..at].windows(2).rposition(|w| w == b"<<") {
                let mut reader = ObjectReader::at(data, dict_start);
                if let Ok(PdfObject::Dictionary(dict)) = reader.parse_object() {
                    if dict.type_name() == Some("XRef") {
                        table.merge_older(Vec::new(), &dict);
                    }
                }
            }
        }
    }

    // Prev/XRefStm/Size describe the broken structure and are meaningless now.
    let trailer: Dictionary = table
        .trailer
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "Prev" | "XRefStm" | "Size" | "W" | "Index" | "Length" | "Filter" | "DecodeParms" | "Type"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    table.trailer = trailer;

    log::debug!("Linear scan found {} objects", table.len());
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_classic(objects: &[&str]) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for off in offsets {
            out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!("trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n", objects.len() + 1)
                .as_bytes(),
        );
        out
    }

    #[test]
    fn test_find_startxref() {
        let data = b"%PDF-1.4\n...\nstartxref\n1234\n%%EOF\n";
        assert_eq!(find_startxref(data).unwrap(), 1234);
        assert!(find_startxref(b"%PDF-1.4\nno marker").is_err());
    }

    #[test]
    fn test_load_classic_table() {
        let data = build_classic(&["<< /Type /Catalog /Pages 2 0 R >>", "<< /Type /Pages /Kids [] /Count 0 >>"]);
        let table = load_xref(&data, 0).unwrap();
        assert_eq!(table.entries.get(&0).copied(), Some(XrefEntry::Free));
        assert!(matches!(table.entries.get(&1).copied(), Some(XrefEntry::InUse { offset: 9, gen: 0 })));
        assert!(table.trailer.contains_key("Root"));
    }

    #[test]
    fn test_corrupt_offset_is_error() {
        let mut data = build_classic(&["<< /Type /Catalog >>"]);
        // Point startxref into the middle of an object.
        let marker = find_subslice(&data, b"startxref").unwrap();
        data.truncate(marker);
        data.extend_from_slice(b"startxref\n12\n%%EOF\n");
        assert!(load_xref(&data, 0).is_err());
    }

    #[test]
    fn test_prev_cycle_terminates() {
        let mut data = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n".to_vec();
        let xref = data.len();
        data.extend_from_slice(
            format!(
                "xref\n0 2\n0000000000 65535 f \n0000000009 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R /Prev {xref} >>\nstartxref\n{xref}\n%%EOF\n"
            )
            .as_bytes(),
        );
        let table = load_xref(&data, 0).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_rebuild_by_scanning() {
        let data = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n2 0 obj\n(old)\nendobj\n2 0 obj\n(new)\nendobj\ntrailer\n<< /Root 1 0 R /Prev 99 >>\n";
        let table = rebuild_by_scanning(data);
        assert_eq!(table.len(), 2);
        let Some(XrefEntry::InUse { offset, .. }) = table.entries.get(&2).copied() else {
            panic!("object 2 not found");
        };
        assert!(data[offset..].starts_with(b"2 0 obj\n(new)"));
        assert!(table.trailer.contains_key("Root"));
        assert!(!table.trailer.contains_key("Prev"));
    }

    #[test]
    fn test_read_field() {
        assert_eq!(read_field(&[0x01, 0x02], 2), 0x0102);
        assert_eq!(read_field(&[0xFF], 0), 0);
    }
}
