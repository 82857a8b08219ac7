//! PDF header detection and version validation.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Information read from the `%PDF-x.y` header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFormat {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
    /// Byte offset of the `%PDF-` marker. Some producers prepend junk bytes,
    /// in which case every xref offset is relative to this position.
    pub header_offset: usize,
}

impl std::fmt::Display for PdfFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
const VERSION_LEN: usize = 3; // e.g., "1.7"

/// How far into the file the header may appear.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Detect PDF format from a file path.
///
/// # Example
/// ```no_run
/// use pdf2md::detect::detect_format_from_path;
///
/// let format = detect_format_from_path("document.pdf").unwrap();
/// println!("PDF version: {}", format.version);
/// ```
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<PdfFormat> {
    let file = File::open(path)?;
    let mut header = Vec::with_capacity(HEADER_SEARCH_WINDOW);
    file.take(HEADER_SEARCH_WINDOW as u64)
        .read_to_end(&mut header)?;
    detect_format_from_bytes(&header)
}

/// Detect PDF format from bytes.
///
/// # Returns
/// * `Ok(PdfFormat)` if the data carries a supported PDF header
/// * `Err(Error::Input)` if the data is empty or not a PDF
/// * `Err(Error::UnsupportedVersion)` for versions other than 1.x and 2.0
pub fn detect_format_from_bytes(data: &[u8]) -> Result<PdfFormat> {
    if data.is_empty() {
        return Err(Error::Input("empty byte stream".to_string()));
    }

    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let header_offset = find_subslice(window, PDF_MAGIC)
        .ok_or_else(|| Error::Input("missing %PDF- header".to_string()))?;

    let version_start = header_offset + PDF_MAGIC.len();
    let version_bytes = data
        .get(version_start..version_start + VERSION_LEN)
        .ok_or_else(|| Error::Input("truncated %PDF- header".to_string()))?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return Err(Error::UnsupportedVersion(version));
    }

    Ok(PdfFormat {
        version,
        header_offset,
    })
}

/// Check if a version string is one this crate understands (1.0-1.7, 2.0).
fn is_valid_version(version: &str) -> bool {
    let bytes = version.as_bytes();
    if bytes.len() != 3 || bytes[1] != b'.' {
        return false;
    }
    match (bytes[0], bytes[2]) {
        (b'1', minor) => (b'0'..=b'7').contains(&minor),
        (b'2', b'0') => true,
        _ => false,
    }
}

/// Check if a file is a valid PDF.
pub fn is_pdf<P: AsRef<Path>>(path: P) -> bool {
    detect_format_from_path(path).is_ok()
}

/// Check if bytes represent a valid PDF header.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    detect_format_from_bytes(data).is_ok()
}

pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
