//! Reconstructed documents and their Info-dictionary metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Page;

/// Pages reconstructed from one PDF, in document order.
///
/// With a page selection only the selected pages are present, so pages are
/// looked up by their original number rather than by position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub metadata: Metadata,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reconstructed pages (not the page count of the source file).
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Page with the 1-based source page number `number`.
    pub fn get_page(&self, number: u32) -> Option<&Page> {
        self.pages.iter().find(|page| page.number == number)
    }

    pub fn add_page(&mut self, page: Page) {
        self.pages.push(page);
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Pages that carry at least one block.
    pub fn text_pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter().filter(|page| !page.is_empty())
    }

    /// Block text without Markdown markers, pages and blocks separated by a
    /// blank line.
    pub fn plain_text(&self) -> String {
        self.text_pages()
            .map(Page::plain_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Info dictionary entries plus container facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    /// Application that authored the original document
    pub creator: Option<String>,
    /// Application that wrote the PDF
    pub producer: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,

    /// Header version, e.g. "1.7"
    pub pdf_version: String,

    /// Pages in the source file, selected or not
    pub page_count: u32,

    /// Objects had to be recovered by scanning the file
    pub degraded: bool,
}

impl Metadata {
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            pdf_version: version.into(),
            ..Default::default()
        }
    }

    /// YAML frontmatter block, `---` delimited and newline terminated.
    ///
    /// Absent Info entries are omitted; version and page count are always
    /// written.
    pub fn to_yaml_frontmatter(&self) -> String {
        let strings = [
            ("title", &self.title),
            ("author", &self.author),
            ("subject", &self.subject),
            ("keywords", &self.keywords),
            ("creator", &self.creator),
            ("producer", &self.producer),
        ];
        let dates = [("created", &self.created), ("modified", &self.modified)];

        let mut out = String::from("---\n");
        for (key, value) in strings {
            if let Some(value) = value {
                out.push_str(&format!("{key}: \"{}\"\n", yaml_escape(value)));
            }
        }
        for (key, value) in dates {
            if let Some(value) = value {
                out.push_str(&format!("{key}: {}\n", value.to_rfc3339()));
            }
        }
        out.push_str(&format!("pdf_version: \"{}\"\n", self.pdf_version));
        out.push_str(&format!("pages: {}\n", self.page_count));
        if self.degraded {
            out.push_str("degraded: true\n");
        }
        out.push_str("---\n");
        out
    }
}

/// Double-quoted YAML scalar body.
fn yaml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_frontmatter_fields() {
        let mut metadata = Metadata::with_version("1.7");
        metadata.title = Some("Annual Report".to_string());
        metadata.producer = Some("Writer".to_string());
        metadata.created = Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).single();
        metadata.page_count = 10;

        assert_eq!(
            metadata.to_yaml_frontmatter(),
            "---\ntitle: \"Annual Report\"\nproducer: \"Writer\"\ncreated: 2023-05-01T12:00:00+00:00\npdf_version: \"1.7\"\npages: 10\n---\n"
        );
    }

    #[test]
    fn test_frontmatter_escapes_and_flags() {
        let mut metadata = Metadata::with_version("1.4");
        metadata.title = Some("Say \"hi\"\nagain\u{7}".to_string());
        metadata.degraded = true;

        let yaml = metadata.to_yaml_frontmatter();
        assert!(yaml.contains(r#"title: "Say \"hi\"\nagain\u0007""#));
        assert!(yaml.contains("degraded: true\n"));
        assert!(yaml.ends_with("---\n"));
    }

    #[test]
    fn test_pages_found_by_number() {
        let mut doc = Document::new();
        assert!(doc.is_empty());
        doc.add_page(Page::letter(3));
        doc.add_page(Page::letter(5));

        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.get_page(5).map(|p| p.number), Some(5));
        assert!(doc.get_page(1).is_none());
        assert_eq!(doc.text_pages().count(), 0);
        assert_eq!(doc.plain_text(), "");
    }
}
