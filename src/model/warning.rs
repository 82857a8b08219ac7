//! Non-fatal diagnostics collected during conversion.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a recovered problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WarningKind {
    /// Glyphs without a Unicode mapping were replaced by the placeholder
    UnmappedGlyph,
    /// Fragment cap or time budget was exhausted; the page is incomplete
    TruncatedPage,
    /// Objects were located by scanning instead of through the cross-reference index
    DegradedObjectRecovery,
    /// A font or XObject named by the content stream could not be resolved
    UnresolvedResource,
    /// The page content could not be decoded; the page is empty
    PageDecodeFailure,
    /// A font uses an encoding without a decoder
    UnsupportedEncoding,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WarningKind::UnmappedGlyph => "unmapped glyphs",
            WarningKind::TruncatedPage => "truncated page",
            WarningKind::DegradedObjectRecovery => "degraded object recovery",
            WarningKind::UnresolvedResource => "unresolved resources",
            WarningKind::PageDecodeFailure => "page decode failure",
            WarningKind::UnsupportedEncoding => "unsupported font encodings",
        };
        f.write_str(s)
    }
}

/// One diagnostic entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// 1-based page number, or `None` for document-level problems
    pub page: Option<u32>,
    pub kind: WarningKind,
    /// Number of occurrences (glyphs, resources, objects)
    pub count: usize,
}

impl Warning {
    pub fn page(page: u32, kind: WarningKind, count: usize) -> Self {
        Self {
            page: Some(page),
            kind,
            count,
        }
    }

    pub fn document(kind: WarningKind, count: usize) -> Self {
        Self {
            page: None,
            kind,
            count,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(f, "page {page}: {} ({})", self.kind, self.count),
            None => write!(f, "document: {} ({})", self.kind, self.count),
        }
    }
}

/// Order warnings by page (document-level first) then kind, merging duplicates.
pub fn normalize_warnings(mut warnings: Vec<Warning>) -> Vec<Warning> {
    warnings.sort_by_key(|w| (w.page, w.kind));
    let mut merged: Vec<Warning> = Vec::with_capacity(warnings.len());
    for w in warnings {
        match merged.last_mut() {
            Some(last) if last.page == w.page && last.kind == w.kind => last.count += w.count,
            _ => merged.push(w),
        }
    }
    merged.retain(|w| w.count > 0);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_orders_and_merges() {
        let warnings = normalize_warnings(vec![
            Warning::page(2, WarningKind::UnmappedGlyph, 3),
            Warning::page(1, WarningKind::TruncatedPage, 1),
            Warning::document(WarningKind::DegradedObjectRecovery, 4),
            Warning::page(2, WarningKind::UnmappedGlyph, 2),
            Warning::page(1, WarningKind::UnresolvedResource, 0),
        ]);
        assert_eq!(
            warnings,
            vec![
                Warning::document(WarningKind::DegradedObjectRecovery, 4),
                Warning::page(1, WarningKind::TruncatedPage, 1),
                Warning::page(2, WarningKind::UnmappedGlyph, 5),
            ]
        );
    }

    #[test]
    fn test_warning_json_shape() {
        let json = serde_json::to_string(&Warning::page(3, WarningKind::UnmappedGlyph, 7)).unwrap();
        assert_eq!(json, r#"{"page":3,"kind":"UnmappedGlyph","count":7}"#);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Warning::page(1, WarningKind::TruncatedPage, 1).to_string(),
            "page 1: truncated page (1)"
        );
    }
}
