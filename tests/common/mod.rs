//! Synthetic PDF construction for integration tests.
//!
//! Every document has the same fixed objects: catalog (1), page tree (2),
//! regular font `/F1` (3) and bold font `/F2` (4). Each page adds a page
//! dictionary and one content stream.

#![allow(dead_code)]

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

/// How the cross-reference data of a built file is damaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefDamage {
    None,
    /// `startxref` points into the middle of an object
    BadStartxref,
    /// Every offset in the table is off by a few bytes
    ShiftedOffsets,
}

#[derive(Debug, Clone)]
pub struct PdfBuilder {
    pages: Vec<String>,
    /// Pages whose content stream claims an image codec filter
    undecodable: Vec<usize>,
    compress: bool,
    xref_stream: bool,
    damage: XrefDamage,
    title: Option<String>,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            undecodable: Vec::new(),
            compress: false,
            xref_stream: false,
            damage: XrefDamage::None,
            title: None,
        }
    }

    /// Add a page with a raw content stream.
    pub fn page(mut self, content: impl Into<String>) -> Self {
        self.pages.push(content.into());
        self
    }

    /// Add a page whose content stream cannot be decoded.
    pub fn undecodable_page(mut self) -> Self {
        self.undecodable.push(self.pages.len());
        self.pages.push("BT /F1 12 Tf 72 700 Td (lost) Tj ET".to_string());
        self
    }

    /// Flate-compress content streams.
    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }

    /// Store dictionaries in an object stream indexed by an xref stream.
    pub fn with_xref_stream(mut self) -> Self {
        self.xref_stream = true;
        self.compress = true;
        self
    }

    pub fn damaged(mut self, damage: XrefDamage) -> Self {
        self.damage = damage;
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let page_count = self.pages.len();
        let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", page_obj(i))).collect();
        let info_num = 5 + 2 * page_count as u32;

        let mut dicts: Vec<(u32, String)> = vec![
            (1, "<< /Type /Catalog /Pages 2 0 R >>".to_string()),
            (
                2,
                format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), page_count),
            ),
            (
                3,
                "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_string(),
            ),
            (
                4,
                "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
                    .to_string(),
            ),
        ];
        for i in 0..page_count {
            dicts.push((
                page_obj(i),
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                    page_obj(i) + 1
                ),
            ));
        }
        if let Some(title) = &self.title {
            dicts.push((info_num, format!("<< /Title ({}) >>", escape_literal(title))));
        }

        let streams: Vec<(u32, Vec<u8>)> = self
            .pages
            .iter()
            .enumerate()
            .map(|(i, content)| {
                let body = if self.undecodable.contains(&i) {
                    raw_stream(content.as_bytes(), " /Filter /DCTDecode")
                } else {
                    self.stream_object(content.as_bytes())
                };
                (page_obj(i) + 1, body)
            })
            .collect();

        let info = self.title.as_ref().map(|_| info_num);
        if self.xref_stream {
            build_with_xref_stream(dicts, streams, info)
        } else {
            let mut objects: Vec<(u32, Vec<u8>)> =
                dicts.into_iter().map(|(n, d)| (n, d.into_bytes())).collect();
            objects.extend(streams);
            objects.sort_by_key(|(n, _)| *n);
            build_classic(objects, info, self.damage)
        }
    }

    fn stream_object(&self, data: &[u8]) -> Vec<u8> {
        if self.compress {
            raw_stream(&deflate(data), " /Filter /FlateDecode")
        } else {
            raw_stream(data, "")
        }
    }
}

fn raw_stream(data: &[u8], extra: &str) -> Vec<u8> {
    let mut out = format!("<< /Length {}{extra} >>\nstream\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\nendstream");
    out
}

fn page_obj(index: usize) -> u32 {
    5 + 2 * index as u32
}

fn trailer_info(info: Option<u32>) -> String {
    info.map(|n| format!(" /Info {n} 0 R")).unwrap_or_default()
}

fn build_classic(objects: Vec<(u32, Vec<u8>)>, info: Option<u32>, damage: XrefDamage) -> Vec<u8> {
    let mut out = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n".to_vec();
    let mut offsets = Vec::new();
    for (num, body) in &objects {
        offsets.push(out.len());
        out.extend_from_slice(format!("{num} 0 obj\n").as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let size = objects.len() + 1;
    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
    for off in &offsets {
        let off = match damage {
            XrefDamage::ShiftedOffsets => off + 3,
            _ => *off,
        };
        out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    let startxref = match damage {
        XrefDamage::BadStartxref => offsets.get(1).copied().unwrap_or(0) + 5,
        _ => xref,
    };
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {size} /Root 1 0 R{} >>\nstartxref\n{startxref}\n%%EOF\n",
            trailer_info(info)
        )
        .as_bytes(),
    );
    out
}

fn build_with_xref_stream(dicts: Vec<(u32, String)>, streams: Vec<(u32, Vec<u8>)>, info: Option<u32>) -> Vec<u8> {
    let objstm_num = streams.iter().map(|(n, _)| *n).chain(dicts.iter().map(|(n, _)| *n)).max().unwrap_or(0) + 1;
    let xref_num = objstm_num + 1;
    let size = xref_num + 1;

    // Object stream holding every dictionary.
    let mut header = String::new();
    let mut bodies = String::new();
    for (num, body) in &dicts {
        header.push_str(&format!("{} {} ", num, bodies.len()));
        bodies.push_str(body);
        bodies.push('\n');
    }
    let payload = format!("{header}\n{bodies}");
    let packed = deflate(payload.as_bytes());
    let mut objstm = format!(
        "<< /Type /ObjStm /N {} /First {} /Length {} /Filter /FlateDecode >>\nstream\n",
        dicts.len(),
        header.len() + 1,
        packed.len()
    )
    .into_bytes();
    objstm.extend_from_slice(&packed);
    objstm.extend_from_slice(b"\nendstream");

    let mut out = b"%PDF-1.5\n%\xe2\xe3\xcf\xd3\n".to_vec();
    let mut entries: Vec<(u8, u32, u16)> = vec![(0, 0, 65535); size as usize];

    let mut written = streams;
    written.push((objstm_num, objstm));
    for (num, body) in &written {
        entries[*num as usize] = (1, out.len() as u32, 0);
        out.extend_from_slice(format!("{num} 0 obj\n").as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }
    for (index, (num, _)) in dicts.iter().enumerate() {
        entries[*num as usize] = (2, objstm_num, index as u16);
    }

    let xref_offset = out.len();
    entries[xref_num as usize] = (1, xref_offset as u32, 0);
    let mut rows = Vec::with_capacity(entries.len() * 7);
    for (kind, field2, field3) in &entries {
        rows.push(*kind);
        rows.extend_from_slice(&field2.to_be_bytes());
        rows.extend_from_slice(&field3.to_be_bytes());
    }
    let packed = deflate(&rows);
    out.extend_from_slice(
        format!(
            "{xref_num} 0 obj\n<< /Type /XRef /Size {size} /W [1 4 2] /Root 1 0 R{} /Length {} /Filter /FlateDecode >>\nstream\n",
            trailer_info(info),
            packed.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&packed);
    out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes());
    out
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn escape_literal(text: &str) -> String {
    text.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)")
}

/// Encode text as a WinAnsi hex string operand.
pub fn hex_text(text: &str) -> String {
    let mut out = String::from("<");
    for c in text.chars() {
        let code = match c {
            '•' => 0x95,
            '–' => 0x96,
            c if (c as u32) < 0x80 => c as u8,
            _ => b'?',
        };
        out.push_str(&format!("{code:02X}"));
    }
    out.push('>');
    out
}

/// One line of text at (`x`, `y`) in font `font` (`F1` regular, `F2` bold).
pub fn text_at(font: &str, size: f32, x: f32, y: f32, text: &str) -> String {
    format!("BT /{font} {size} Tf {x} {y} Td {} Tj ET\n", hex_text(text))
}

/// Lines of body text starting at `y`, stepping down by `leading`.
pub fn paragraph(size: f32, y: f32, leading: f32, lines: &[&str]) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| text_at("F1", size, 72.0, y - i as f32 * leading, line))
        .collect()
}
