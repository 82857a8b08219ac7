//! Content stream interpretation into positioned text fragments.
//!
//! [`TextExtractor`] executes a page's content stream one operation at a time
//! and yields a [`TextFragment`] for every text-showing operator. Graphics
//! state lives in an explicit stack owned by the extractor, so pages can be
//! interpreted on independent threads against the shared document.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::convert::CancellationToken;
use crate::error::{Error, Result};
use crate::model::{TextFragment, Warning, WarningKind};

use super::content::{ContentParser, Operation, Operator};
use super::document::PdfDocument;
use super::font::Font;
use super::object::{Dictionary, ObjectId, PdfObject};
use super::options::ParseOptions;
use super::page_tree::PageNode;

/// Operations between deadline and cancellation checks.
const CHECK_INTERVAL: usize = 256;

/// Unbalanced `q` operators beyond this depth are not saved.
const MAX_STATE_DEPTH: usize = 256;

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn from_array(m: [f32; 6]) -> Self {
        Self {
            a: m[0],
            b: m[1],
            c: m[2],
            d: m[3],
            e: m[4],
            f: m[5],
        }
    }

    pub fn translation(tx: f32, ty: f32) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn transform(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    /// Length of the transformed unit vertical vector.
    pub fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

#[derive(Debug, Clone)]
struct TextState {
    char_spacing: f32,
    word_spacing: f32,
    /// `Tz / 100`
    horizontal_scaling: f32,
    leading: f32,
    rise: f32,
    font: Option<Arc<Font>>,
    font_size: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
            font: None,
            font_size: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            text: TextState::default(),
        }
    }
}

/// State restored when a Form XObject finishes.
struct Saved {
    state: GraphicsState,
    text_matrix: Matrix,
    line_matrix: Matrix,
    stack_depth: usize,
}

/// A content stream being executed: the page itself or a Form XObject.
struct Frame {
    data: Vec<u8>,
    pos: usize,
    resources: Arc<Dictionary>,
    form_id: Option<ObjectId>,
    fonts: HashMap<String, Arc<Font>>,
    saved: Option<Saved>,
}

/// Per-page counters reported once interpretation ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageDiagnostics {
    pub fragments: usize,
    pub unmapped_glyphs: usize,
    pub unresolved_resources: usize,
    pub unsupported_encodings: usize,
    pub syntax_errors: usize,
    /// Fragment cap reached
    pub truncated: bool,
    /// Time budget exhausted
    pub timed_out: bool,
    pub cancelled: bool,
}

impl PageDiagnostics {
    /// Content that failed to parse and yielded no text at all.
    pub fn is_unparseable(&self) -> bool {
        self.syntax_errors > 0 && self.fragments == 0
    }

    /// Warnings for `page`, one per non-zero counter.
    pub fn warnings(&self, page: u32) -> Vec<Warning> {
        let mut warnings = Vec::new();
        if self.is_unparseable() {
            warnings.push(Warning::page(page, WarningKind::PageDecodeFailure, 1));
        }
        if self.unmapped_glyphs > 0 {
            warnings.push(Warning::page(page, WarningKind::UnmappedGlyph, self.unmapped_glyphs));
        }
        if self.truncated || self.timed_out {
            warnings.push(Warning::page(page, WarningKind::TruncatedPage, 1));
        }
        if self.unresolved_resources > 0 {
            warnings.push(Warning::page(
                page,
                WarningKind::UnresolvedResource,
                self.unresolved_resources,
            ));
        }
        if self.unsupported_encodings > 0 {
            warnings.push(Warning::page(
                page,
                WarningKind::UnsupportedEncoding,
                self.unsupported_encodings,
            ));
        }
        warnings
    }
}

/// Lazy, finite iterator over the text fragments of one page.
pub struct TextExtractor<'d> {
    doc: &'d PdfDocument,
    page: u32,
    frames: Vec<Frame>,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    /// `q` operators that were not saved because the stack was full.
    overflow: usize,
    text_matrix: Matrix,
    line_matrix: Matrix,
    font_cache: HashMap<ObjectId, Arc<Font>>,
    unresolved: HashSet<String>,
    unsupported: HashSet<String>,
    fragment_cap: usize,
    placeholder: char,
    tj_space_threshold: f32,
    max_form_depth: usize,
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
    operations: usize,
    finished: bool,
    diagnostics: PageDiagnostics,
}

impl<'d> TextExtractor<'d> {
    /// Prepare a page for interpretation.
    ///
    /// Fails with [`Error::PageDecode`] when the content streams cannot be
    /// decoded; the caller turns that into a warning and an empty page.
    pub fn new(doc: &'d PdfDocument, page: &PageNode, options: &ParseOptions) -> Result<Self> {
        let data = page_content(doc, page).map_err(|e| Error::PageDecode {
            page: page.number,
            message: e.to_string(),
        })?;

        Ok(Self {
            doc,
            page: page.number,
            frames: vec![Frame {
                data,
                pos: 0,
                resources: Arc::new(page.resources.clone()),
                form_id: None,
                fonts: HashMap::new(),
                saved: None,
            }],
            state: GraphicsState::default(),
            stack: Vec::new(),
            overflow: 0,
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            font_cache: HashMap::new(),
            unresolved: HashSet::new(),
            unsupported: HashSet::new(),
            fragment_cap: options.fragment_cap,
            placeholder: options.placeholder,
            tj_space_threshold: options.tj_space_threshold,
            max_form_depth: options.max_form_depth,
            deadline: options.page_timeout.map(|t| Instant::now() + t),
            cancel: None,
            operations: 0,
            finished: false,
            diagnostics: PageDiagnostics::default(),
        })
    }

    /// Stop early once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn diagnostics(&self) -> &PageDiagnostics {
        &self.diagnostics
    }

    /// Consume the extractor and return its final counters.
    pub fn finish(mut self) -> PageDiagnostics {
        self.diagnostics.unresolved_resources = self.unresolved.len();
        self.diagnostics.unsupported_encodings = self.unsupported.len();
        log::debug!(
            "Page {}: {} fragments, {} operations",
            self.page,
            self.diagnostics.fragments,
            self.operations
        );
        if self.diagnostics.is_unparseable() {
            log::warn!(
                "Page {}: content stream could not be parsed ({} syntax errors)",
                self.page,
                self.diagnostics.syntax_errors
            );
        }
        self.diagnostics
    }

    fn should_stop(&mut self) -> bool {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            self.diagnostics.cancelled = true;
            return true;
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            log::warn!("Page {}: time budget exhausted, truncating", self.page);
            self.diagnostics.timed_out = true;
            return true;
        }
        false
    }

    fn next_operation(&mut self) -> Option<Operation> {
        loop {
            let frame = self.frames.last_mut()?;
            let (op, pos, errors) = {
                let mut parser = ContentParser::at(&frame.data, frame.pos);
                let op = parser.next();
                (op, parser.position(), parser.syntax_errors())
            };
            frame.pos = pos;
            self.diagnostics.syntax_errors += errors;

            if op.is_some() {
                return op;
            }
            if let Some(frame) = self.frames.pop() {
                self.end_frame(frame);
            }
        }
    }

    fn end_frame(&mut self, frame: Frame) {
        if let Some(saved) = frame.saved {
            self.state = saved.state;
            self.text_matrix = saved.text_matrix;
            self.line_matrix = saved.line_matrix;
            self.stack.truncate(saved.stack_depth);
        }
    }

    /// Lowest stack depth the current frame may pop to.
    fn stack_floor(&self) -> usize {
        self.frames
            .last()
            .and_then(|f| f.saved.as_ref())
            .map_or(0, |s| s.stack_depth)
    }

    fn execute(&mut self, op: Operation) -> Option<TextFragment> {
        match op.operator {
            Operator::BeginText => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            Operator::EndText => {}
            Operator::SetFont => {
                if let Some(PdfObject::Name(name)) = op.operands.first() {
                    let font = self.font(name);
                    self.state.text.font = Some(font);
                }
                if let Some(size) = op.number(1) {
                    self.state.text.font_size = size;
                }
            }
            Operator::SetCharSpacing => {
                if let Some(v) = op.number(0) {
                    self.state.text.char_spacing = v;
                }
            }
            Operator::SetWordSpacing => {
                if let Some(v) = op.number(0) {
                    self.state.text.word_spacing = v;
                }
            }
            Operator::SetHorizontalScaling => {
                if let Some(v) = op.number(0) {
                    self.state.text.horizontal_scaling = v / 100.0;
                }
            }
            Operator::SetLeading => {
                if let Some(v) = op.number(0) {
                    self.state.text.leading = v;
                }
            }
            Operator::SetTextRise => {
                if let Some(v) = op.number(0) {
                    self.state.text.rise = v;
                }
            }
            Operator::MoveText => {
                if let (Some(tx), Some(ty)) = (op.number(0), op.number(1)) {
                    self.move_text(tx, ty);
                }
            }
            Operator::MoveTextSetLeading => {
                if let (Some(tx), Some(ty)) = (op.number(0), op.number(1)) {
                    self.state.text.leading = -ty;
                    self.move_text(tx, ty);
                }
            }
            Operator::SetTextMatrix => {
                if let Some(m) = op.matrix() {
                    self.text_matrix = Matrix::from_array(m);
                    self.line_matrix = self.text_matrix;
                }
            }
            Operator::NextLine => self.next_line(),
            Operator::ShowText => {
                if let Some(item) = op.operands.last() {
                    return self.show(std::slice::from_ref(item), op.offset);
                }
            }
            Operator::ShowTextArray => {
                if let Some(PdfObject::Array(items)) = op.operands.last() {
                    return self.show(items, op.offset);
                }
            }
            Operator::NextLineShowText => {
                self.next_line();
                if let Some(item) = op.operands.last() {
                    return self.show(std::slice::from_ref(item), op.offset);
                }
            }
            Operator::NextLineShowTextSpaced => {
                if op.operands.len() >= 3 {
                    if let (Some(aw), Some(ac)) = (op.number(0), op.number(1)) {
                        self.state.text.word_spacing = aw;
                        self.state.text.char_spacing = ac;
                    }
                }
                self.next_line();
                if let Some(item) = op.operands.last() {
                    return self.show(std::slice::from_ref(item), op.offset);
                }
            }
            Operator::SaveState => {
                if self.stack.len() < MAX_STATE_DEPTH {
                    self.stack.push(self.state.clone());
                } else {
                    self.overflow += 1;
                }
            }
            Operator::RestoreState => {
                if self.overflow > 0 {
                    self.overflow -= 1;
                } else if self.stack.len() > self.stack_floor() {
                    if let Some(state) = self.stack.pop() {
                        self.state = state;
                    }
                }
            }
            Operator::ConcatMatrix => {
                if let Some(m) = op.matrix() {
                    self.state.ctm = Matrix::from_array(m).multiply(&self.state.ctm);
                }
            }
            Operator::InvokeXObject => {
                if let Some(PdfObject::Name(name)) = op.operands.first() {
                    self.invoke_xobject(name);
                }
            }
            Operator::BeginMarkedContent
            | Operator::EndMarkedContent
            | Operator::InlineImage
            | Operator::Other => {}
        }
        None
    }

    fn move_text(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.state.text.leading;
        self.move_text(0.0, -leading);
    }

    /// Text-space origin (including rise) in page coordinates.
    fn text_origin(&self) -> (f32, f32) {
        self.text_matrix
            .multiply(&self.state.ctm)
            .transform(0.0, self.state.text.rise)
    }

    /// Decode and advance over string and kerning items of one showing operator.
    fn show(&mut self, items: &[PdfObject], offset: usize) -> Option<TextFragment> {
        let font = match self.state.text.font.clone() {
            Some(font) => font,
            None => {
                let font = Arc::new(Font::fallback("Helvetica"));
                self.state.text.font = Some(Arc::clone(&font));
                font
            }
        };
        let ts = self.state.text.clone();
        let start = self.text_origin();
        let font_size = (ts.font_size * self.text_matrix.multiply(&self.state.ctm).vertical_scale()).abs();

        let mut text = String::new();
        for item in items {
            match item {
                PdfObject::String(bytes) => {
                    for glyph in font.decode(bytes) {
                        match glyph.text {
                            Some(t) => text.push_str(&t),
                            None => {
                                self.diagnostics.unmapped_glyphs += 1;
                                text.push(self.placeholder);
                            }
                        }
                        let spacing = if glyph.is_word_space {
                            ts.char_spacing + ts.word_spacing
                        } else {
                            ts.char_spacing
                        };
                        let tx = (glyph.width / 1000.0 * ts.font_size + spacing) * ts.horizontal_scaling;
                        self.text_matrix = Matrix::translation(tx, 0.0).multiply(&self.text_matrix);
                    }
                }
                PdfObject::Integer(_) | PdfObject::Real(_) => {
                    let adjustment = item.as_f32().unwrap_or(0.0);
                    let tx = -adjustment / 1000.0 * ts.font_size * ts.horizontal_scaling;
                    self.text_matrix = Matrix::translation(tx, 0.0).multiply(&self.text_matrix);
                    if -adjustment > self.tj_space_threshold && !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                }
                _ => {}
            }
        }

        if text.is_empty() {
            return None;
        }

        let end = self.text_origin();
        let width = ((end.0 - start.0).powi(2) + (end.1 - start.1).powi(2)).sqrt();

        Some(TextFragment {
            text,
            x: start.0,
            y: start.1,
            width,
            font_size,
            font_name: font.name.clone(),
            bold: font.bold,
            italic: font.italic,
            offset,
        })
    }

    /// Font for a resource name in the current frame, loading it on first use.
    fn font(&mut self, name: &str) -> Arc<Font> {
        let Some(frame) = self.frames.last() else {
            return Arc::new(Font::fallback(name));
        };
        if let Some(font) = frame.fonts.get(name) {
            return Arc::clone(font);
        }
        let resources = Arc::clone(&frame.resources);

        let entry = self
            .doc
            .resolve_key(&resources, "Font")
            .and_then(|fonts| fonts.as_dict().ok().and_then(|d| d.get(name)).cloned());
        let font = entry
            .and_then(|entry| self.load_font(&entry, name))
            .unwrap_or_else(|| self.unresolved_font(name));

        if let Some(encoding) = &font.unsupported_encoding {
            if self.unsupported.insert(font.name.clone()) {
                log::warn!(
                    "Page {}: font {} uses unsupported encoding {encoding}",
                    self.page,
                    font.name
                );
            }
        }

        if let Some(frame) = self.frames.last_mut() {
            frame.fonts.insert(name.to_string(), Arc::clone(&font));
        }
        font
    }

    fn load_font(&mut self, entry: &PdfObject, name: &str) -> Option<Arc<Font>> {
        let id = entry.as_reference().ok();
        if let Some(font) = id.and_then(|id| self.font_cache.get(&id)) {
            return Some(Arc::clone(font));
        }
        let doc = self.doc;
        let resolved = match doc.resolve(entry) {
            Ok(resolved) => resolved,
            Err(e) => {
                log::debug!("Font /{name} unresolved: {e}");
                return None;
            }
        };
        let font = Arc::new(Font::load(doc, resolved.as_dict().ok()?));
        if let Some(id) = id {
            self.font_cache.insert(id, Arc::clone(&font));
        }
        Some(font)
    }

    fn unresolved_font(&mut self, name: &str) -> Arc<Font> {
        if self.unresolved.insert(format!("Font/{name}")) {
            log::warn!("Page {}: font /{name} not found in resources", self.page);
        }
        Arc::new(Font::fallback(name))
    }

    /// Execute a Form XObject; images and other XObjects are ignored.
    fn invoke_xobject(&mut self, name: &str) {
        let Some(frame) = self.frames.last() else {
            return;
        };
        let resources = Arc::clone(&frame.resources);
        let doc = self.doc;

        let entry = doc
            .resolve_key(&resources, "XObject")
            .and_then(|x| x.as_dict().ok().and_then(|d| d.get(name)).cloned());
        let Some(entry) = entry else {
            if self.unresolved.insert(format!("XObject/{name}")) {
                log::warn!("Page {}: XObject /{name} not found in resources", self.page);
            }
            return;
        };

        let form_id = entry.as_reference().ok();
        if let Some(id) = form_id {
            if self.frames.iter().any(|f| f.form_id == Some(id)) {
                log::debug!("Form XObject {id} invokes itself, skipping");
                return;
            }
        }
        if self.frames.len() > self.max_form_depth {
            log::debug!("Form XObject nesting deeper than {}, skipping", self.max_form_depth);
            return;
        }

        let resolved = match doc.resolve(&entry) {
            Ok(resolved) => resolved,
            Err(e) => {
                log::debug!("XObject /{name} unresolved: {e}");
                self.unresolved.insert(format!("XObject/{name}"));
                return;
            }
        };
        let Ok(stream) = resolved.as_stream() else {
            return;
        };
        if stream.dict.get_name("Subtype") != Some("Form") {
            return;
        }
        let data = match stream.decode() {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Page {}: Form XObject /{name} undecodable: {e}", self.page);
                return;
            }
        };

        let form_resources = doc
            .resolve_key(&stream.dict, "Resources")
            .and_then(|r| r.as_dict().ok().cloned())
            .map(Arc::new)
            .unwrap_or(resources);
        let matrix = doc
            .resolve_key(&stream.dict, "Matrix")
            .and_then(|m| {
                let items = m.as_array().ok()?;
                let values: Vec<f32> = items.iter().filter_map(|v| v.as_f32().ok()).collect();
                <[f32; 6]>::try_from(values.as_slice()).ok()
            })
            .map(Matrix::from_array)
            .unwrap_or(Matrix::IDENTITY);

        let saved = Saved {
            state: self.state.clone(),
            text_matrix: self.text_matrix,
            line_matrix: self.line_matrix,
            stack_depth: self.stack.len(),
        };
        self.state.ctm = matrix.multiply(&self.state.ctm);
        self.frames.push(Frame {
            data,
            pos: 0,
            resources: form_resources,
            form_id,
            fonts: HashMap::new(),
            saved: Some(saved),
        });
    }
}

impl Iterator for TextExtractor<'_> {
    type Item = TextFragment;

    fn next(&mut self) -> Option<TextFragment> {
        if self.finished {
            return None;
        }
        loop {
            if self.operations % CHECK_INTERVAL == 0 && self.should_stop() {
                self.finished = true;
                return None;
            }
            self.operations += 1;

            let Some(op) = self.next_operation() else {
                self.finished = true;
                return None;
            };
            if let Some(fragment) = self.execute(op) {
                if self.diagnostics.fragments >= self.fragment_cap {
                    log::warn!(
                        "Page {}: more than {} fragments, truncating",
                        self.page,
                        self.fragment_cap
                    );
                    self.diagnostics.truncated = true;
                    self.finished = true;
                    return None;
                }
                self.diagnostics.fragments += 1;
                return Some(fragment);
            }
        }
    }
}

/// Decoded page content; multiple streams are joined with a newline.
fn page_content(doc: &PdfDocument, page: &PageNode) -> Result<Vec<u8>> {
    let Some(contents) = page.dict.get("Contents") else {
        return Ok(Vec::new());
    };
    let resolved = doc.resolve(contents)?;
    match &*resolved {
        PdfObject::Null => Ok(Vec::new()),
        PdfObject::Stream(stream) => stream.decode(),
        PdfObject::Array(parts) => {
            let mut data = Vec::new();
            for part in parts {
                let part = doc.resolve(part)?;
                data.extend_from_slice(&part.as_stream()?.decode()?);
                data.push(b'\n');
            }
            Ok(data)
        }
        other => Err(Error::TypeMismatch {
            expected: "stream",
            found: other.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::page_tree::collect_pages;

    const HELVETICA: &str = "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>";

    /// A one-page document: catalog 1, pages 2, page 3, content 4, then `extra`.
    fn page_doc(content: &str, resources: &str, extra: &[&str]) -> PdfDocument {
        let page = format!("<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Resources {resources} >>");
        let stream = format!("<< >>\nstream\n{content}\nendstream");
        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            page,
            stream,
        ];
        objects.extend(extra.iter().map(|s| s.to_string()));

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
        PdfDocument::open(out, &ParseOptions::default()).unwrap()
    }

    fn extract(doc: &PdfDocument, options: &ParseOptions) -> (Vec<TextFragment>, PageDiagnostics) {
        let pages = collect_pages(doc).unwrap();
        let mut extractor = TextExtractor::new(doc, &pages[0], options).unwrap();
        let fragments: Vec<_> = extractor.by_ref().collect();
        (fragments, extractor.finish())
    }

    #[test]
    fn test_matrix_multiply_order() {
        let scale = Matrix::from_array([2.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        let shift = Matrix::translation(10.0, 5.0);
        assert_eq!(shift.multiply(&scale).transform(0.0, 0.0), (20.0, 10.0));
        assert_eq!(scale.multiply(&shift).transform(0.0, 0.0), (10.0, 5.0));
    }

    #[test]
    fn test_simple_text_position_and_width() {
        let doc = page_doc(
            "BT /F1 12 Tf 72 700 Td (Hello) Tj ET",
            "<< /Font << /F1 5 0 R >> >>",
            &[HELVETICA],
        );
        let (fragments, diag) = extract(&doc, &ParseOptions::default());
        assert_eq!(fragments.len(), 1);
        let f = &fragments[0];
        assert_eq!(f.text, "Hello");
        assert_eq!((f.x, f.y), (72.0, 700.0));
        assert_eq!(f.font_size, 12.0);
        assert!((f.width - 30.0).abs() < 1e-3);
        assert_eq!(f.font_name, "Helvetica");
        assert_eq!(diag.fragments, 1);
        assert!(diag.warnings(1).is_empty());
    }

    #[test]
    fn test_tj_kerning_inserts_space_only_for_large_gaps() {
        let doc = page_doc(
            "BT /F1 10 Tf 0 100 Td [(Hello) -300 (World)] TJ 0 -20 Td [(Ker) -40 (ning)] TJ ET",
            "<< /Font << /F1 5 0 R >> >>",
            &[HELVETICA],
        );
        let (fragments, _) = extract(&doc, &ParseOptions::default());
        let texts: Vec<_> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello World", "Kerning"]);
        assert_eq!(fragments[1].y, 80.0);
    }

    #[test]
    fn test_ctm_scales_position_and_size() {
        let doc = page_doc(
            "q 2 0 0 2 0 0 cm BT /F1 10 Tf 10 10 Td (A) Tj ET Q BT /F1 10 Tf 10 10 Td (B) Tj ET",
            "<< /Font << /F1 5 0 R >> >>",
            &[HELVETICA],
        );
        let (fragments, _) = extract(&doc, &ParseOptions::default());
        assert_eq!((fragments[0].x, fragments[0].y, fragments[0].font_size), (20.0, 20.0, 20.0));
        assert_eq!((fragments[1].x, fragments[1].y, fragments[1].font_size), (10.0, 10.0, 10.0));
    }

    #[test]
    fn test_leading_and_quote_operators() {
        let doc = page_doc(
            "BT /F1 10 Tf 14 TL 50 500 Td (one) Tj T* (two) Tj (three) ' 5 1 (four) \" ET",
            "<< /Font << /F1 5 0 R >> >>",
            &[HELVETICA],
        );
        let (fragments, _) = extract(&doc, &ParseOptions::default());
        let ys: Vec<_> = fragments.iter().map(|f| f.y).collect();
        assert_eq!(ys, vec![500.0, 486.0, 472.0, 458.0]);
        assert!(fragments.iter().all(|f| f.x == 50.0));
    }

    #[test]
    fn test_fragment_cap_truncates() {
        let content = "BT /F1 10 Tf 0 0 Td (x) Tj ET ".repeat(100);
        let doc = page_doc(&content, "<< /Font << /F1 5 0 R >> >>", &[HELVETICA]);
        let options = ParseOptions::default().with_fragment_cap(10);
        let (fragments, diag) = extract(&doc, &options);
        assert_eq!(fragments.len(), 10);
        assert!(diag.truncated);
        assert_eq!(
            diag.warnings(1),
            vec![Warning::page(1, WarningKind::TruncatedPage, 1)]
        );
    }

    #[test]
    fn test_missing_font_uses_fallback_and_warns() {
        let doc = page_doc("BT /F9 10 Tf (Hi) Tj ET", "<< >>", &[]);
        let (fragments, diag) = extract(&doc, &ParseOptions::default());
        assert_eq!(fragments[0].text, "Hi");
        assert_eq!(diag.unresolved_resources, 1);
        assert_eq!(
            diag.warnings(1),
            vec![Warning::page(1, WarningKind::UnresolvedResource, 1)]
        );
    }

    #[test]
    fn test_unmapped_glyphs_become_placeholders() {
        let doc = page_doc(
            "BT /F1 10 Tf <00410042> Tj ET",
            "<< /Font << /F1 5 0 R >> >>",
            &[
                "<< /Type /Font /Subtype /Type0 /BaseFont /Foo /Encoding /Identity-H /DescendantFonts [6 0 R] >>",
                "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /Foo >>",
            ],
        );
        let options = ParseOptions::default().with_placeholder('?');
        let (fragments, diag) = extract(&doc, &options);
        assert_eq!(fragments[0].text, "??");
        assert_eq!(diag.unmapped_glyphs, 2);
        assert_eq!(
            diag.warnings(1),
            vec![Warning::page(1, WarningKind::UnmappedGlyph, 2)]
        );
    }

    #[test]
    fn test_form_xobject_runs_with_own_resources() {
        let doc = page_doc(
            "q 1 0 0 1 100 0 cm /Fm1 Do Q BT /F1 10 Tf 0 0 Td (page) Tj ET",
            "<< /Font << /F1 5 0 R >> /XObject << /Fm1 6 0 R >> >>",
            &[
                HELVETICA,
                "<< /Type /XObject /Subtype /Form /Resources << /Font << /G1 5 0 R >> /XObject << /Me 6 0 R >> >> /Matrix [1 0 0 1 0 50] >>\nstream\nBT /G1 10 Tf 5 5 Td (form) Tj ET /Me Do\nendstream",
            ],
        );
        let (fragments, diag) = extract(&doc, &ParseOptions::default());
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].text, "form");
        assert_eq!((fragments[0].x, fragments[0].y), (105.0, 55.0));
        assert_eq!(fragments[1].text, "page");
        assert_eq!((fragments[1].x, fragments[1].y), (0.0, 0.0));
        assert_eq!(diag.unresolved_resources, 0);
    }

    #[test]
    fn test_undecodable_content_is_page_error() {
        let doc = page_doc(
            "ignored",
            "<< >>",
            &["<< /Filter /DCTDecode >>\nstream\n\u{1}\u{2}\nendstream"],
        );
        let mut pages = collect_pages(&doc).unwrap();
        let mut dict = Dictionary::new();
        dict.insert("Contents", PdfObject::Reference(ObjectId::new(5, 0)));
        pages[0].dict = dict;
        let err = TextExtractor::new(&doc, &pages[0], &ParseOptions::default()).err();
        assert!(matches!(err, Some(Error::PageDecode { page: 1, .. })));
    }

    #[test]
    fn test_unparseable_content_reports_decode_failure() {
        for content in [")))) >>> ] ] )", "BT /F1 12 Tf 72 700 Td (Hello"] {
            let doc = page_doc(content, "<< /Font << /F1 5 0 R >> >>", &[HELVETICA]);
            let (fragments, diag) = extract(&doc, &ParseOptions::default());
            assert!(fragments.is_empty(), "{content}");
            assert!(diag.is_unparseable(), "{content}");
            assert_eq!(
                diag.warnings(1),
                vec![Warning::page(1, WarningKind::PageDecodeFailure, 1)]
            );
        }
    }

    #[test]
    fn test_partial_text_is_not_decode_failure() {
        let doc = page_doc(
            "BT /F1 12 Tf 72 700 Td (Kept) Tj ) ET",
            "<< /Font << /F1 5 0 R >> >>",
            &[HELVETICA],
        );
        let (fragments, diag) = extract(&doc, &ParseOptions::default());
        assert_eq!(fragments.len(), 1);
        assert_eq!(diag.syntax_errors, 1);
        assert!(diag.warnings(1).is_empty());
    }

    #[test]
    fn test_cancelled_extractor_stops() {
        let doc = page_doc("BT /F1 10 Tf (a) Tj ET", "<< /Font << /F1 5 0 R >> >>", &[HELVETICA]);
        let pages = collect_pages(&doc).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let mut extractor = TextExtractor::new(&doc, &pages[0], &ParseOptions::default())
            .unwrap()
            .with_cancellation(token);
        assert!(extractor.next().is_none());
        assert!(extractor.finish().cancelled);
    }
}
