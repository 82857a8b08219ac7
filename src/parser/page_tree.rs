//! Page tree traversal with attribute inheritance.

use std::collections::HashSet;

use crate::error::{Error, Result};

use super::document::PdfDocument;
use super::object::{Dictionary, ObjectId, PdfObject};

/// US Letter, used when no `/MediaBox` is found anywhere in the tree.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Page trees deeper than this are treated as malformed.
const MAX_TREE_DEPTH: usize = 64;

/// A leaf of the page tree with its inherited attributes applied.
#[derive(Debug, Clone)]
pub struct PageNode {
    /// 1-based page number in document order.
    pub number: u32,
    pub id: Option<ObjectId>,
    pub dict: Dictionary,
    pub resources: Dictionary,
    pub media_box: [f32; 4],
}

impl PageNode {
    pub fn width(&self) -> f32 {
        (self.media_box[2] - self.media_box[0]).abs()
    }

    pub fn height(&self) -> f32 {
        (self.media_box[3] - self.media_box[1]).abs()
    }
}

#[derive(Clone, Default)]
struct Inherited {
    resources: Option<Dictionary>,
    media_box: Option<[f32; 4]>,
}

/// Collect every page in document order.
///
/// Kids that cannot be resolved or that loop back into the tree are skipped
/// with a warning; an unreadable root is an error.
pub fn collect_pages(doc: &PdfDocument) -> Result<Vec<PageNode>> {
    let catalog = doc.catalog()?;
    let catalog = catalog.as_dict()?;
    let root_ref = catalog
        .get("Pages")
        .ok_or_else(|| Error::malformed(0, "catalog has no /Pages"))?;

    let mut walker = Walker {
        doc,
        visited: HashSet::new(),
        pages: Vec::new(),
    };
    if let PdfObject::Reference(id) = root_ref {
        walker.visited.insert(*id);
    }
    let root = doc.resolve(root_ref)?;
    let root_dict = root.as_dict()?;
    walker.visit(root_dict, root_ref.as_reference().ok(), Inherited::default(), 0);

    log::debug!("Page tree has {} pages", walker.pages.len());
    Ok(walker.pages)
}

struct Walker<'d> {
    doc: &'d PdfDocument,
    visited: HashSet<ObjectId>,
    pages: Vec<PageNode>,
}

impl Walker<'_> {
    fn visit(&mut self, node: &Dictionary, id: Option<ObjectId>, inherited: Inherited, depth: usize) {
        let mut inherited = inherited;
        if let Some(resources) = self.doc.resolve_key(node, "Resources") {
            if let Ok(dict) = resources.as_dict() {
                inherited.resources = Some(dict.clone());
            }
        }
        if let Some(media_box) = self.doc.resolve_key(node, "MediaBox") {
            if let Some(rect) = self.rectangle(&media_box) {
                inherited.media_box = Some(rect);
            }
        }

        let is_leaf = match node.type_name() {
            Some("Page") => true,
            Some("Pages") => false,
            _ => !node.contains_key("Kids"),
        };

        if is_leaf {
            self.pages.push(PageNode {
                number: self.pages.len() as u32 + 1,
                id,
                dict: node.clone(),
                resources: inherited.resources.unwrap_or_default(),
                media_box: inherited.media_box.unwrap_or(DEFAULT_MEDIA_BOX),
            });
            return;
        }

        if depth >= MAX_TREE_DEPTH {
            log::warn!("Page tree deeper than {MAX_TREE_DEPTH} levels, skipping subtree");
            return;
        }

        let Some(kids) = self.doc.resolve_key(node, "Kids") else {
            log::warn!("Page tree node without /Kids");
            return;
        };
        let Ok(kids) = kids.as_array() else {
            log::warn!("Page tree /Kids is not an array");
            return;
        };

        for kid in kids {
            let kid_id = kid.as_reference().ok();
            if let Some(kid_id) = kid_id {
                if !self.visited.insert(kid_id) {
                    log::warn!("Page tree cycle at {kid_id}, skipping");
                    continue;
                }
            }
            let resolved = match self.doc.resolve(kid) {
                Ok(resolved) => resolved,
                Err(e) => {
                    log::warn!("Skipping unreadable page tree node: {e}");
                    continue;
                }
            };
            match resolved.as_dict() {
                Ok(dict) => self.visit(dict, kid_id, inherited.clone(), depth + 1),
                Err(e) => log::warn!("Skipping page tree node: {e}"),
            }
        }
    }

    fn rectangle(&self, obj: &PdfObject) -> Option<[f32; 4]> {
        let items = obj.as_array().ok()?;
        if items.len() != 4 {
            return None;
        }
        let mut rect = [0.0f32; 4];
        for (slot, item) in rect.iter_mut().zip(items) {
            *slot = self.doc.resolve(item).ok()?.as_f32().ok()?;
        }
        Some(rect)
    }
}
