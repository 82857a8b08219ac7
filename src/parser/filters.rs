//! Stream filters.
//!
//! Text extraction only ever needs the general-purpose filters; image codecs
//! (DCT, JPX, JBIG2, CCITT) are reported as unsupported and the stream is
//! skipped by the caller.

use std::io::Read;

use flate2::read::{DeflateDecoder, ZlibDecoder};

use crate::error::{Error, Result};

use super::lexer::hex_value;
use super::object::{Dictionary, PdfObject};

/// Filters understood by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    FlateDecode,
    ASCIIHexDecode,
    ASCII85Decode,
    RunLengthDecode,
}

impl Filter {
    /// Parse a filter from its name, including the abbreviations allowed in inline images.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "FlateDecode" | "Fl" => Some(Filter::FlateDecode),
            "ASCIIHexDecode" | "AHx" => Some(Filter::ASCIIHexDecode),
            "ASCII85Decode" | "A85" => Some(Filter::ASCII85Decode),
            "RunLengthDecode" | "RL" => Some(Filter::RunLengthDecode),
            _ => None,
        }
    }
}

/// Decode stream data according to the `/Filter` and `/DecodeParms` entries.
pub fn decode_stream(data: &[u8], dict: &Dictionary) -> Result<Vec<u8>> {
    let names: Vec<&str> = match dict.get("Filter") {
        None | Some(PdfObject::Null) => return Ok(data.to_vec()),
        Some(PdfObject::Name(name)) => vec![name.as_str()],
        Some(PdfObject::Array(items)) => items
            .iter()
            .map(|o| o.as_name())
            .collect::<Result<Vec<_>>>()
            .map_err(|_| Error::StreamDecode("invalid entry in /Filter array".to_string()))?,
        Some(other) => {
            return Err(Error::StreamDecode(format!(
                "invalid /Filter type: {}",
                other.type_name()
            )))
        }
    };

    let params: Vec<Option<&Dictionary>> = match dict.get("DecodeParms").or_else(|| dict.get("DP")) {
        Some(PdfObject::Dictionary(d)) => vec![Some(d)],
        Some(PdfObject::Array(items)) => items.iter().map(|o| o.as_dict().ok()).collect(),
        _ => Vec::new(),
    };

    let mut result = data.to_vec();
    for (i, name) in names.iter().enumerate() {
        let filter = Filter::from_name(name)
            .ok_or_else(|| Error::StreamDecode(format!("unsupported filter: {name}")))?;
        result = apply_filter(&result, filter)?;
        if let Some(Some(parms)) = params.get(i) {
            result = apply_predictor(result, parms)?;
        }
    }

    Ok(result)
}

fn apply_filter(data: &[u8], filter: Filter) -> Result<Vec<u8>> {
    match filter {
        Filter::FlateDecode => decode_flate(data),
        Filter::ASCIIHexDecode => decode_ascii_hex(data),
        Filter::ASCII85Decode => decode_ascii85(data),
        Filter::RunLengthDecode => Ok(decode_run_length(data)),
    }
}

/// Decode FlateDecode (zlib) data.
///
/// Truncated or slightly corrupt streams are common; whatever decompressed
/// before the error is kept. Streams missing the zlib header are retried as
/// raw deflate.
fn decode_flate(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    match ZlibDecoder::new(data).read_to_end(&mut result) {
        Ok(_) => return Ok(result),
        Err(e) if !result.is_empty() => {
            log::debug!("Flate stream ended early ({e}), keeping {} bytes", result.len());
            return Ok(result);
        }
        Err(_) => {}
    }

    let mut raw = Vec::new();
    match DeflateDecoder::new(data).read_to_end(&mut raw) {
        Ok(_) => Ok(raw),
        Err(_) if !raw.is_empty() => Ok(raw),
        Err(e) => Err(Error::StreamDecode(format!("Flate decode error: {e}"))),
    }
}

fn decode_ascii_hex(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;

    for &b in data {
        if b == b'>' {
            break;
        }
        if b.is_ascii_whitespace() {
            continue;
        }
        let v = hex_value(b).ok_or_else(|| {
            Error::StreamDecode(format!("invalid hex digit: {}", b as char))
        })?;
        match high.take() {
            Some(h) => result.push(h << 4 | v),
            None => high = Some(v),
        }
    }
    if let Some(h) = high {
        result.push(h << 4);
    }

    Ok(result)
}

fn decode_ascii85(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut len = 0usize;

    let body = data
        .iter()
        .position(|&b| !b.is_ascii_whitespace())
        .map(|start| &data[start..])
        .unwrap_or(&[]);
    let body = body.strip_prefix(b"<~").unwrap_or(body);

    let mut iter = body.iter().copied().filter(|b| !b.is_ascii_whitespace());
    while let Some(c) = iter.next() {
        match c {
            b'~' => break,
            b'z' if len == 0 => result.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[len] = c - b'!';
                len += 1;
                if len == 5 {
                    result.extend_from_slice(&ascii85_group(&group));
                    len = 0;
                }
            }
            _ => {
                return Err(Error::StreamDecode(format!(
                    "invalid ASCII85 character: {}",
                    c as char
                )))
            }
        }
    }

    if len > 1 {
        for slot in group.iter_mut().skip(len) {
            *slot = 84;
        }
        let bytes = ascii85_group(&group);
        result.extend_from_slice(&bytes[..len - 1]);
    }

    Ok(result)
}

fn ascii85_group(group: &[u8; 5]) -> [u8; 4] {
    let value = group
        .iter()
        .fold(0u64, |acc, &d| acc * 85 + u64::from(d)) as u32;
    value.to_be_bytes()
}

fn decode_run_length(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len() * 2);
    let mut i = 0;

    while i < data.len() {
        let len = data[i];
        i += 1;
        match len {
            128 => break,
            0..=127 => {
                let count = usize::from(len) + 1;
                let end = (i + count).min(data.len());
                result.extend_from_slice(&data[i..end]);
                i = end;
            }
            _ => {
                if let Some(&b) = data.get(i) {
                    result.extend(std::iter::repeat(b).take(257 - usize::from(len)));
                }
                i += 1;
            }
        }
    }

    result
}

/// Undo a PNG (10..15) or TIFF (2) predictor.
fn apply_predictor(data: Vec<u8>, parms: &Dictionary) -> Result<Vec<u8>> {
    let predictor = parms.get_i64("Predictor").unwrap_or(1);
    if predictor <= 1 {
        return Ok(data);
    }

    let colors = parms.get_i64("Colors").unwrap_or(1).max(1) as usize;
    let bpc = parms.get_i64("BitsPerComponent").unwrap_or(8).max(1) as usize;
    let columns = parms.get_i64("Columns").unwrap_or(1).max(1) as usize;

    let bpp = (colors * bpc).div_ceil(8);
    let row_len = (colors * bpc * columns).div_ceil(8);

    match predictor {
        2 => Ok(undo_tiff_predictor(data, bpp, row_len, bpc)),
        10..=15 => undo_png_predictor(&data, bpp, row_len),
        other => Err(Error::StreamDecode(format!("unsupported predictor {other}"))),
    }
}

fn undo_tiff_predictor(mut data: Vec<u8>, bpp: usize, row_len: usize, bpc: usize) -> Vec<u8> {
    if bpc != 8 {
        log::debug!("TIFF predictor with {bpc} bits per component left as-is");
        return data;
    }
    for row in data.chunks_mut(row_len) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    data
}

fn undo_png_predictor(data: &[u8], bpp: usize, row_len: usize) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_len];

    for chunk in data.chunks(row_len + 1) {
        let Some((&filter_type, encoded)) = chunk.split_first() else {
            continue;
        };
        let mut row = encoded.to_vec();
        row.resize(row_len, 0);

        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            row[i] = match filter_type {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add(((u16::from(left) + u16::from(up)) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, up_left)),
                other => {
                    return Err(Error::StreamDecode(format!(
                        "invalid PNG filter type {other}"
                    )))
                }
            };
        }

        result.extend_from_slice(&row[..encoded.len().min(row_len)]);
        prev = row;
    }

    Ok(result)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
