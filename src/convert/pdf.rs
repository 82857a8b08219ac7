//! PDF to Markdown conversion pipeline.

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::error::{Error, Result};
use crate::model::{normalize_warnings, Document, Page, TextFragment, Warning, WarningKind};
use crate::parser::{collect_pages, LayoutAnalyzer, PageNode, PdfDocument, TextExtractor};
use crate::render::MarkdownRenderer;

use super::{CancellationToken, ConvertOptions, ConvertResult};

/// Converts PDF bytes to Markdown.
#[derive(Debug, Clone, Default)]
pub struct PdfConverter {
    options: ConvertOptions,
    cancel: CancellationToken,
}

/// One page after interpretation and layout.
struct PageOutcome {
    page: Page,
    warnings: Vec<Warning>,
}

impl PdfConverter {
    /// Create a new PDF converter.
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort the conversion when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels conversions run by this converter.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Convert a PDF held in memory.
    pub fn convert(&self, data: Vec<u8>) -> Result<ConvertResult> {
        let (document, warnings) = self.extract(data)?;
        let markdown = MarkdownRenderer::new(self.options.render.clone()).render(&document);

        Ok(ConvertResult {
            markdown,
            warnings,
            metadata: document.metadata.clone(),
            document,
        })
    }

    /// Convert a borrowed byte slice.
    pub fn convert_bytes(&self, data: &[u8]) -> Result<ConvertResult> {
        self.convert(data.to_vec())
    }

    /// Reconstruct the selected pages without rendering them.
    pub fn extract(&self, data: Vec<u8>) -> Result<(Document, Vec<Warning>)> {
        self.check_cancelled()?;

        let pdf = PdfDocument::open(data, &self.options.parse)?;
        let nodes = collect_pages(&pdf)?;
        let total = nodes.len() as u32;
        let selected: Vec<PageNode> = nodes
            .into_iter()
            .filter(|node| self.options.parse.pages.includes(node.number))
            .collect();
        log::debug!("Converting {} of {} pages", selected.len(), total);

        let outcomes = self.process_pages(&pdf, &selected)?;
        self.check_cancelled()?;

        let mut document = Document::new();
        let mut warnings = Vec::new();
        for outcome in outcomes {
            warnings.extend(outcome.warnings);
            document.add_page(outcome.page);
        }

        // Recovery can also happen lazily while pages resolve their objects.
        document.metadata = pdf.metadata();
        document.metadata.page_count = total;
        let recovered = pdf.recovered_object_count();
        if recovered > 0 {
            log::warn!("{recovered} objects recovered by linear scan");
            warnings.push(Warning::document(WarningKind::DegradedObjectRecovery, recovered));
        }

        Ok((document, normalize_warnings(warnings)))
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn process_pages(&self, pdf: &PdfDocument, nodes: &[PageNode]) -> Result<Vec<PageOutcome>> {
        let parse = &self.options.parse;
        if !parse.parallel || nodes.len() < 2 {
            return nodes.iter().map(|node| self.process_page(pdf, node)).collect();
        }

        // Indexed collection keeps document order regardless of completion order.
        let run = || {
            nodes
                .par_iter()
                .map(|node| self.process_page(pdf, node))
                .collect::<Result<Vec<_>>>()
        };

        match parse.threads {
            Some(threads) => {
                let pool = ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| Error::Other(format!("Failed to build thread pool: {e}")))?;
                pool.install(run)
            }
            None => run(),
        }
    }

    fn process_page(&self, pdf: &PdfDocument, node: &PageNode) -> Result<PageOutcome> {
        self.check_cancelled()?;

        let mut page = Page::new(node.number, node.width(), node.height());
        let mut extractor = match TextExtractor::new(pdf, node, &self.options.parse) {
            Ok(extractor) => extractor.with_cancellation(self.cancel.clone()),
            Err(Error::PageDecode { page: number, message }) => {
                log::warn!("Page {number}: {message}; emitting an empty page");
                return Ok(PageOutcome {
                    page,
                    warnings: vec![Warning::page(number, WarningKind::PageDecodeFailure, 1)],
                });
            }
            Err(e) => return Err(e),
        };

        let fragments: Vec<TextFragment> = extractor.by_ref().collect();
        let diagnostics = extractor.finish();
        if diagnostics.cancelled {
            return Err(Error::Cancelled);
        }

        page.blocks = LayoutAnalyzer::new(self.options.layout.clone()).analyze(fragments);
        log::debug!("Page {}: {} blocks", node.number, page.block_count());

        Ok(PageOutcome {
            page,
            warnings: diagnostics.warnings(node.number),
        })
    }
}
