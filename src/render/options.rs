//! Markdown rendering options and page selection.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use super::{CleanupOptions, CleanupPreset};
use crate::error::{Error, Result};

/// How reconstructed blocks are written out.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Deepest `#` level emitted; deeper headings are capped (1-6)
    pub max_heading_level: u8,

    /// Prefix the output with a YAML block of document metadata
    pub include_frontmatter: bool,

    /// Rejoin words hyphenated across line breaks inside a block (off by
    /// default)
    pub dehyphenate: bool,

    /// Per-block text cleanup; `None` writes text as extracted
    pub cleanup: Option<CleanupOptions>,

    /// Pages to emit. Pages outside the selection are still reconstructed
    /// when the parse options select them.
    pub page_selection: PageSelection,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_heading(mut self, level: u8) -> Self {
        self.max_heading_level = level.clamp(1, 6);
        self
    }

    pub fn with_frontmatter(mut self, include: bool) -> Self {
        self.include_frontmatter = include;
        self
    }

    pub fn with_dehyphenation(mut self, enabled: bool) -> Self {
        self.dehyphenate = enabled;
        self
    }

    pub fn with_cleanup(mut self, cleanup: CleanupOptions) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    pub fn with_cleanup_preset(self, preset: CleanupPreset) -> Self {
        self.with_cleanup(CleanupOptions::from_preset(preset))
    }

    pub fn without_cleanup(mut self) -> Self {
        self.cleanup = None;
        self
    }

    pub fn with_pages(mut self, selection: PageSelection) -> Self {
        self.page_selection = selection;
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_heading_level: 6,
            include_frontmatter: false,
            dehyphenate: false,
            cleanup: Some(CleanupOptions::standard()),
            page_selection: PageSelection::All,
        }
    }
}

/// 1-based page numbers to process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelection {
    #[default]
    All,
    Range(RangeInclusive<u32>),
    /// Sorted and deduplicated when parsed
    Pages(Vec<u32>),
}

impl PageSelection {
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
        }
    }

    /// Parse `"all"`, `"3-7"` or a comma list such as `"1,4,9-12"`.
    ///
    /// A single range stays a [`PageSelection::Range`]; lists are expanded,
    /// sorted and deduplicated.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(PageSelection::All);
        }

        let parts = s.split(',').map(parse_part).collect::<Result<Vec<_>>>()?;
        if let [single] = parts.as_slice() {
            if single.start() != single.end() {
                return Ok(PageSelection::Range(single.clone()));
            }
        }

        let mut pages: Vec<u32> = parts.into_iter().flatten().collect();
        pages.sort_unstable();
        pages.dedup();
        Ok(PageSelection::Pages(pages))
    }
}

fn parse_part(part: &str) -> Result<RangeInclusive<u32>> {
    let number = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|_| Error::Input(format!("invalid page number '{}'", s.trim())))
    };

    let (start, end) = match part.split_once('-') {
        Some((start, end)) => (number(start)?, number(end)?),
        None => {
            let page = number(part)?;
            (page, page)
        }
    };
    if start == 0 {
        return Err(Error::Input("page numbers start at 1".to_string()));
    }
    if end < start {
        return Err(Error::Input(format!("page range {start}-{end} is reversed")));
    }
    Ok(start..=end)
}

impl FromStr for PageSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSelection::All => f.write_str("all"),
            PageSelection::Range(range) => write!(f, "{}-{}", range.start(), range.end()),
            PageSelection::Pages(pages) => {
                let list: Vec<String> = pages.iter().map(u32::to_string).collect();
                f.write_str(&list.join(","))
            }
        }
    }
}
