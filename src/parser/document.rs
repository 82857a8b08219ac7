//! The parsed document: an immutable object arena with lazy resolution.
//!
//! Every object slot is filled at most once, on first access, through a
//! `OnceLock`. After [`PdfDocument::open`] returns, the document is only
//! read, so worker threads can share `&PdfDocument` without further locking.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crate::detect::detect_format_from_bytes;
use crate::error::{Error, Result};
use crate::model::Metadata;

use super::lexer::{Lexer, Token};
use super::object::{Dictionary, ObjectId, PdfObject, PdfStream};
use super::options::ParseOptions;
use super::reader::ObjectReader;
use super::xref::{self, XrefEntry, XrefTable};

struct Slot {
    entry: XrefEntry,
    value: OnceLock<Option<Arc<PdfObject>>>,
}

impl Slot {
    fn new(entry: XrefEntry) -> Self {
        Self {
            entry,
            value: OnceLock::new(),
        }
    }

    /// Generation a reference must carry to reach this slot. Objects inside
    /// object streams always have generation 0.
    fn generation(&self) -> u16 {
        match self.entry {
            XrefEntry::InUse { gen, .. } => gen,
            _ => 0,
        }
    }
}

/// A decoded object stream (`/Type /ObjStm`).
struct ObjectStream {
    data: Vec<u8>,
    /// (object number, absolute offset in `data`)
    entries: Vec<(u32, usize)>,
}

impl ObjectStream {
    fn parse(stream: &PdfStream) -> Result<Self> {
        let n = stream.dict.get_i64("N").unwrap_or(0).max(0) as usize;
        let first = stream
            .dict
            .get_i64("First")
            .filter(|f| *f >= 0)
            .ok_or_else(|| Error::malformed(stream.offset, "object stream without /First"))?
            as usize;
        let data = stream.decode()?;

        let mut lexer = Lexer::new(&data);
        let mut entries = Vec::with_capacity(n);
        for _ in 0..n {
            let num = lexer.next_token()?;
            let off = lexer.next_token()?;
            match (num, off) {
                (Some(Token::Integer(num)), Some(Token::Integer(off))) if num >= 0 && off >= 0 => {
                    entries.push((num as u32, first + off as usize));
                }
                _ => break,
            }
        }

        Ok(Self { data, entries })
    }

    fn get(&self, index: u32, num: u32) -> Result<PdfObject> {
        let offset = match self.entries.get(index as usize) {
            Some(&(n, off)) if n == num => off,
            // Index disagrees with the header; fall back to a search by number.
            _ => self
                .entries
                .iter()
                .find(|(n, _)| *n == num)
                .map(|&(_, off)| off)
                .ok_or(Error::UnresolvedReference(ObjectId::new(num, 0)))?,
        };
        ObjectReader::at(&self.data, offset).parse_object()
    }
}

/// A resolved object: borrowed when it was direct, shared when it came from the arena.
#[derive(Debug, Clone)]
pub enum Resolved<'a> {
    Borrowed(&'a PdfObject),
    Shared(Arc<PdfObject>),
}

impl Deref for Resolved<'_> {
    type Target = PdfObject;

    fn deref(&self) -> &PdfObject {
        match self {
            Resolved::Borrowed(obj) => obj,
            Resolved::Shared(obj) => obj,
        }
    }
}

/// A parsed PDF file.
pub struct PdfDocument {
    data: Vec<u8>,
    version: String,
    header_offset: usize,
    trailer: Dictionary,
    slots: HashMap<u32, Slot>,
    object_streams: HashMap<u32, OnceLock<Option<Arc<ObjectStream>>>>,
    allow_degraded: bool,
    scan_index: OnceLock<BTreeMap<u32, (usize, u16)>>,
    /// Objects located by scanning during a full rebuild.
    rebuilt_objects: usize,
    /// Objects located by the per-object scan fallback.
    recovered_objects: AtomicUsize,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("objects", &self.slots.len())
            .field("degraded", &self.is_degraded())
            .finish()
    }
}

impl PdfDocument {
    /// Parse the container structure of a PDF held in memory.
    ///
    /// Only the cross-reference data and the catalog are read here; all other
    /// objects are parsed on first access.
    pub fn open(data: Vec<u8>, options: &ParseOptions) -> Result<Self> {
        let format = detect_format_from_bytes(&data)?;
        let allow_degraded = options.allow_degraded();

        let data = match xref::load_xref(&data, format.header_offset) {
            Ok(table) => {
                let doc = Self::from_table(data, &format.version, format.header_offset, table, allow_degraded, 0);
                doc.check_encryption()?;
                match doc.catalog().err() {
                    None => {
                        log::debug!("Opened {:?}", doc);
                        return Ok(doc);
                    }
                    Some(e) if allow_degraded && e.is_recoverable_container_error() => {
                        log::warn!("Document catalog unreadable ({e}), rebuilding by linear scan");
                        doc.data
                    }
                    Some(e) => return Err(e),
                }
            }
            Err(e) if allow_degraded && e.is_recoverable_container_error() => {
                log::warn!("Cross-reference data unusable ({e}), rebuilding by linear scan");
                data
            }
            Err(e) => return Err(e),
        };

        let table = recover_table(&data)?;
        let rebuilt = table.len();
        let doc = Self::from_table(data, &format.version, format.header_offset, table, allow_degraded, rebuilt);
        doc.check_encryption()?;
        doc.catalog()?;
        log::debug!("Opened {:?} after recovery", doc);
        Ok(doc)
    }

    fn from_table(
        data: Vec<u8>,
        version: &str,
        header_offset: usize,
        table: XrefTable,
        allow_degraded: bool,
        rebuilt_objects: usize,
    ) -> Self {
        let object_streams = table
            .entries
            .values()
            .filter_map(|e| match e {
                XrefEntry::Compressed { stream, .. } => Some(*stream),
                _ => None,
            })
            .collect::<HashSet<_>>()
            .into_iter()
            .map(|num| (num, OnceLock::new()))
            .collect();

        let slots = table
            .entries
            .into_iter()
            .filter(|(_, e)| *e != XrefEntry::Free)
            .map(|(num, e)| (num, Slot::new(e)))
            .collect();

        Self {
            data,
            version: version.to_string(),
            header_offset,
            trailer: table.trailer,
            slots,
            object_streams,
            allow_degraded,
            scan_index: OnceLock::new(),
            rebuilt_objects,
            recovered_objects: AtomicUsize::new(0),
        }
    }

    fn check_encryption(&self) -> Result<()> {
        if self.trailer.contains_key("Encrypt") {
            return Err(Error::Encrypted);
        }
        Ok(())
    }

    /// PDF version from the header.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Number of live object slots.
    pub fn object_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether any object was located by linear scanning.
    pub fn is_degraded(&self) -> bool {
        self.recovered_object_count() > 0
    }

    /// Number of objects located by linear scanning so far.
    pub fn recovered_object_count(&self) -> usize {
        self.rebuilt_objects + self.recovered_objects.load(Ordering::Relaxed)
    }

    /// The document catalog dictionary.
    pub fn catalog(&self) -> Result<Resolved<'_>> {
        let root = self
            .trailer
            .get("Root")
            .ok_or_else(|| Error::malformed(self.data.len(), "trailer has no /Root"))?;
        let catalog = self.resolve(root)?;
        let dict = catalog.as_dict()?;
        if dict.type_name() != Some("Catalog") && !dict.contains_key("Pages") {
            return Err(Error::malformed(0, "/Root is not a document catalog"));
        }
        Ok(catalog)
    }

    /// Fetch an indirect object, parsing it on first access.
    pub fn get_object(&self, id: ObjectId) -> Result<Arc<PdfObject>> {
        let slot = self
            .slots
            .get(&id.num)
            .filter(|slot| slot.generation() == id.gen)
            .ok_or(Error::UnresolvedReference(id))?;

        let value = slot.value.get_or_init(|| match self.load(id.num, slot.entry) {
            Ok(obj) => Some(Arc::new(obj)),
            Err(e) => {
                log::debug!("Failed to load object {id}: {e}");
                None
            }
        });

        value.clone().ok_or(Error::UnresolvedReference(id))
    }

    /// Follow references until a direct object is reached.
    pub fn resolve<'a>(&self, obj: &'a PdfObject) -> Result<Resolved<'a>> {
        let PdfObject::Reference(mut id) = obj else {
            return Ok(Resolved::Borrowed(obj));
        };

        let mut seen = HashSet::new();
        loop {
            if !seen.insert(id) {
                return Err(Error::CircularReference(id));
            }
            let target = self.get_object(id)?;
            match *target {
                PdfObject::Reference(next) => id = next,
                _ => return Ok(Resolved::Shared(target)),
            }
        }
    }

    /// Resolve `dict[key]`, treating missing and unresolvable entries alike.
    pub fn resolve_key<'a>(&self, dict: &'a Dictionary, key: &str) -> Option<Resolved<'a>> {
        let value = dict.get(key)?;
        match self.resolve(value) {
            Ok(resolved) if !resolved.is_null() => Some(resolved),
            Ok(_) => None,
            Err(e) => {
                log::debug!("Ignoring unresolvable /{key}: {e}");
                None
            }
        }
    }

    fn load(&self, num: u32, entry: XrefEntry) -> Result<PdfObject> {
        match entry {
            XrefEntry::Free => Err(Error::UnresolvedReference(ObjectId::new(num, 0))),
            XrefEntry::InUse { offset, .. } => self.load_uncompressed(num, offset),
            XrefEntry::Compressed { stream, index } => {
                if stream == num {
                    return Err(Error::CircularReference(ObjectId::new(num, 0)));
                }
                self.object_stream(stream)?.get(index, num)
            }
        }
    }

    fn load_uncompressed(&self, num: u32, offset: usize) -> Result<PdfObject> {
        let err = match self.parse_at(offset, num) {
            Ok(obj) => return Ok(obj),
            Err(e) => e,
        };

        if self.header_offset > 0 {
            if let Ok(obj) = self.parse_at(offset + self.header_offset, num) {
                return Ok(obj);
            }
        }

        if self.allow_degraded {
            let index = self
                .scan_index
                .get_or_init(|| xref::scan_object_offsets(&self.data));
            if let Some(&(found, _)) = index.get(&num) {
                if found != offset {
                    let obj = self.parse_at(found, num)?;
                    self.recovered_objects.fetch_add(1, Ordering::Relaxed);
                    log::warn!("Object {num} recovered by linear scan at byte {found} (xref said {offset})");
                    return Ok(obj);
                }
            }
        }

        Err(err)
    }

    fn parse_at(&self, offset: usize, num: u32) -> Result<PdfObject> {
        if offset >= self.data.len() {
            return Err(Error::malformed(offset, "object offset beyond end of file"));
        }
        let (id, obj) = ObjectReader::at(&self.data, offset).parse_indirect_object()?;
        if id.num != num {
            return Err(Error::malformed(
                offset,
                format!("expected object {num}, found {}", id.num),
            ));
        }
        Ok(obj)
    }

    fn object_stream(&self, num: u32) -> Result<Arc<ObjectStream>> {
        let id = ObjectId::new(num, 0);
        let cell = self
            .object_streams
            .get(&num)
            .ok_or(Error::UnresolvedReference(id))?;

        let value = cell.get_or_init(|| {
            // Object streams must be stored uncompressed.
            match self.slots.get(&num).map(|s| s.entry) {
                Some(XrefEntry::InUse { .. }) => {}
                _ => {
                    log::debug!("Object stream {num} is not an uncompressed object");
                    return None;
                }
            }
            let parsed = self
                .get_object(id)
                .and_then(|obj| ObjectStream::parse(obj.as_stream()?));
            match parsed {
                Ok(stream) => Some(Arc::new(stream)),
                Err(e) => {
                    log::warn!("Object stream {num} unreadable: {e}");
                    None
                }
            }
        });

        value.clone().ok_or(Error::UnresolvedReference(id))
    }

    /// Document metadata from the Info dictionary.
    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::with_version(self.version.clone());

        if let Some(info) = self.resolve_key(&self.trailer, "Info") {
            if let Ok(dict) = info.as_dict() {
                let text = |key: &str| {
                    self.resolve_key(dict, key)
                        .and_then(|v| v.as_text_string().ok())
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                };
                metadata.title = text("Title");
                metadata.author = text("Author");
                metadata.subject = text("Subject");
                metadata.keywords = text("Keywords");
                metadata.creator = text("Creator");
                metadata.producer = text("Producer");
                metadata.created = text("CreationDate").and_then(|d| parse_pdf_date(&d));
                metadata.modified = text("ModDate").and_then(|d| parse_pdf_date(&d));
            }
        }

        metadata.degraded = self.is_degraded();
        metadata
    }
}

/// Build cross-reference data for a damaged file by scanning it end to end.
fn recover_table(data: &[u8]) -> Result<XrefTable> {
    let mut table = xref::rebuild_by_scanning(data);
    if table.is_empty() {
        return Err(Error::malformed(0, "no objects found by linear scan"));
    }

    let mut catalogs = Vec::new();
    let mut compressed = Vec::new();

    let note_catalog = |num: u32, obj: &PdfObject, catalogs: &mut Vec<u32>| {
        if let PdfObject::Dictionary(d) = obj {
            if d.type_name() == Some("Catalog") {
                catalogs.push(num);
            }
        }
    };

    for (&num, &entry) in &table.entries {
        let XrefEntry::InUse { offset, .. } = entry else {
            continue;
        };
        let Ok((_, obj)) = ObjectReader::at(data, offset).parse_indirect_object() else {
            continue;
        };
        note_catalog(num, &obj, &mut catalogs);

        if let PdfObject::Stream(stream) = &obj {
            if stream.dict.type_name() != Some("ObjStm") {
                continue;
            }
            let Ok(objstm) = ObjectStream::parse(stream) else {
                continue;
            };
            for (index, &(inner, _)) in objstm.entries.iter().enumerate() {
                compressed.push((
                    inner,
                    XrefEntry::Compressed {
                        stream: num,
                        index: index as u32,
                    },
                ));
                if let Ok(inner_obj) = objstm.get(index as u32, inner) {
                    note_catalog(inner, &inner_obj, &mut catalogs);
                }
            }
        }
    }

    for (num, entry) in compressed {
        table.entries.entry(num).or_insert(entry);
    }

    let root_ok = table
        .trailer
        .get("Root")
        .and_then(|r| r.as_reference().ok())
        .is_some_and(|id| catalogs.contains(&id.num));
    if !root_ok {
        match catalogs.last() {
            Some(&num) => {
                log::debug!("Using object {num} as document catalog");
                table
                    .trailer
                    .insert("Root", PdfObject::Reference(ObjectId::new(num, 0)));
            }
            None => return Err(Error::malformed(0, "no document catalog found")),
        }
    }

    Ok(table)
}

/// Parse a PDF date string (`D:YYYYMMDDHHmmSS...`).
pub(crate) fn parse_pdf_date(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let s = s.strip_prefix("D:").unwrap_or(s);

    // At minimum we need YYYY
    if s.len() < 4 {
        return None;
    }

    let year: i32 = s.get(0..4)?.parse().ok()?;
    let month: u32 = s.get(4..6).and_then(|m| m.parse().ok()).unwrap_or(1);
    let day: u32 = s.get(6..8).and_then(|d| d.parse().ok()).unwrap_or(1);
    let hour: u32 = s.get(8..10).and_then(|h| h.parse().ok()).unwrap_or(0);
    let minute: u32 = s.get(10..12).and_then(|m| m.parse().ok()).unwrap_or(0);
    let second: u32 = s.get(12..14).and_then(|s| s.parse().ok()).unwrap_or(0);

    chrono::NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .map(|dt| chrono::DateTime::from_naive_utc_and_offset(dt, chrono::Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn build(objects: &[&str], trailer_extra: &str) -> Vec<u8> {
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
            format!(
                "trailer\n<< /Size {} /Root 1 0 R {trailer_extra} >>\nstartxref\n{xref}\n%%EOF\n",
                objects.len() + 1
            )
            .as_bytes(),
        );
        out
    }

    const CATALOG: &str = "<< /Type /Catalog /Pages 2 0 R >>";
    const PAGES: &str = "<< /Type /Pages /Kids [] /Count 0 >>";

    #[test]
    fn test_open_and_resolve() {
        let data = build(&[CATALOG, PAGES, "3 0 R", "(chained)"], "");
        let doc = PdfDocument::open(data, &ParseOptions::default()).unwrap();
        assert_eq!(doc.version(), "1.4");
        assert!(!doc.is_degraded());

        let reference = PdfObject::Reference(ObjectId::new(3, 0));
        let chained = doc.resolve(&reference).unwrap();
        assert_eq!(chained.as_bytes().unwrap(), b"chained");
    }

    #[test]
    fn test_reference_cycle_is_detected() {
        let data = build(&[CATALOG, PAGES, "4 0 R", "3 0 R"], "");
        let doc = PdfDocument::open(data, &ParseOptions::default()).unwrap();
        let reference = PdfObject::Reference(ObjectId::new(3, 0));
        let result = doc.resolve(&reference);
        assert!(matches!(result, Err(Error::CircularReference(_))));
    }

    #[test]
    fn test_missing_object_is_unresolved() {
        let data = build(&[CATALOG, PAGES], "");
        let doc = PdfDocument::open(data, &ParseOptions::default()).unwrap();
        let result = doc.get_object(ObjectId::new(42, 0));
        assert!(matches!(result, Err(Error::UnresolvedReference(id)) if id.num == 42));
    }

    #[test]
    fn test_stale_generation_is_unresolved() {
        let data = build(&[CATALOG, PAGES, "(current)"], "");
        let doc = PdfDocument::open(data, &ParseOptions::default()).unwrap();
        assert!(doc.get_object(ObjectId::new(3, 0)).is_ok());

        let result = doc.get_object(ObjectId::new(3, 1));
        assert!(matches!(result, Err(Error::UnresolvedReference(id)) if id == ObjectId::new(3, 1)));

        let mut dict = Dictionary::new();
        dict.insert("Ref", PdfObject::Reference(ObjectId::new(3, 1)));
        assert!(doc.resolve_key(&dict, "Ref").is_none());
    }

    #[test]
    fn test_encrypted_document_is_refused() {
        let data = build(&[CATALOG, PAGES], "/Encrypt << /Filter /Standard >>");
        let result = PdfDocument::open(data, &ParseOptions::default());
        assert!(matches!(result, Err(Error::Encrypted)));
    }

    #[test]
    fn test_broken_xref_recovers_in_lenient_mode() {
        let mut data = build(&[CATALOG, PAGES], "");
        let pos = crate::detect::find_subslice(&data, b"startxref").unwrap();
        data.truncate(pos);
        data.extend_from_slice(b"startxref\n999999\n%%EOF\n");

        let doc = PdfDocument::open(data.clone(), &ParseOptions::default()).unwrap();
        assert!(doc.is_degraded());
        assert!(doc.catalog().is_ok());

        let strict = PdfDocument::open(data, &ParseOptions::default().strict());
        assert!(matches!(strict, Err(Error::CorruptCrossReference { .. })));
    }

    #[test]
    fn test_shifted_offset_recovered_per_object() {
        let mut data = build(&[CATALOG, PAGES, "(payload)"], "");
        // Corrupt the xref offset of object 3 so it points at object 2.
        let xref_pos = crate::detect::find_subslice(&data, b"xref\n").unwrap();
        let table = String::from_utf8_lossy(&data[xref_pos..]).to_string();
        let lines: Vec<&str> = table.lines().collect();
        let obj2_offset = &lines[4][..10];
        let obj3_line = lines[5];
        let patched = table.replacen(obj3_line, &format!("{obj2_offset} 00000 n "), 1);
        data.truncate(xref_pos);
        data.extend_from_slice(patched.as_bytes());

        let doc = PdfDocument::open(data, &ParseOptions::default()).unwrap();
        let obj = doc.get_object(ObjectId::new(3, 0)).unwrap();
        assert_eq!(obj.as_bytes().unwrap(), b"payload");
        assert_eq!(doc.recovered_object_count(), 1);
    }

    #[test]
    fn test_metadata_from_info() {
        let data = build(
            &[CATALOG, PAGES, "<< /Title (Report) /CreationDate (D:20240115103045Z) >>"],
            "/Info 3 0 R",
        );
        let doc = PdfDocument::open(data, &ParseOptions::default()).unwrap();
        let meta = doc.metadata();
        assert_eq!(meta.title.as_deref(), Some("Report"));
        assert_eq!(meta.created.unwrap().year(), 2024);
        assert_eq!(meta.pdf_version, "1.4");
    }

    #[test]
    fn test_parse_pdf_date_minimal() {
        let date = parse_pdf_date("D:2024").unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.month(), 1);
        assert_eq!(date.day(), 1);
    }
}
