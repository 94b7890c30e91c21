use crate::{ConvertError, Result};
use lopdf::{Document, Object, ObjectId};
use std::path::Path;

// ── PdfValidator ──────────────────────────────────────────────────────────────
//
// Internal type. CommandPdfRenderer runs it on every file the external
// renderer claims to have written.

pub(crate) struct PdfValidator<'a> {
    document: &'a Document,
}

impl<'a> PdfValidator<'a> {
    pub(crate) fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Load `path` and check its structure.
    pub(crate) fn validate_file<P: AsRef<Path>>(path: P) -> Result<()> {
        let document = Document::load(path)?;
        PdfValidator::new(&document).validate_pdf_structure()
    }

    /// lopdf has already parsed the cross-reference table and object graph;
    /// here we assert the mandatory elements are present and every page has
    /// printable geometry.
    pub(crate) fn validate_pdf_structure(&self) -> Result<()> {
        self.document
            .catalog()
            .map_err(|e| ConvertError::InvalidPdf(format!("missing or invalid catalog: {e}")))?;

        // A browser print always produces at least one page.
        if self.document.get_pages().is_empty() {
            return Err(ConvertError::InvalidPdf("document has no pages".into()));
        }

        if self.document.trailer.is_empty() {
            return Err(ConvertError::InvalidPdf("missing trailer dictionary".into()));
        }

        self.validate_page_geometry()
    }

    /// Every printed page must carry a `/MediaBox` with a positive area,
    /// either its own or inherited from the page tree.
    pub(crate) fn validate_page_geometry(&self) -> Result<()> {
        for (number, id) in self.document.get_pages() {
            let media_box = self
                .inherited_media_box(id)
                .ok_or_else(|| ConvertError::InvalidPdf(format!("page {number} has no MediaBox")))?;

            let [llx, lly, urx, ury] = media_box;
            if urx - llx <= 0.0 || ury - lly <= 0.0 {
                return Err(ConvertError::InvalidPdf(format!("page {number} is empty")));
            }
        }

        Ok(())
    }

    fn inherited_media_box(&self, page: ObjectId) -> Option<[f32; 4]> {
        let mut node = self.document.get_dictionary(page).ok()?;

        // Page trees from browser prints are shallow; the bound stops cycles.
        for _ in 0..32 {
            if let Ok(value) = node.get(b"MediaBox") {
                return self.rectangle(value);
            }
            let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
            node = self.document.get_dictionary(parent).ok()?;
        }

        None
    }

    fn rectangle(&self, value: &Object) -> Option<[f32; 4]> {
        let value = match value.as_reference() {
            Ok(id) => self.document.get_object(id).ok()?,
            Err(_) => value,
        };

        let numbers: Vec<f32> = value
            .as_array()
            .ok()?
            .iter()
            .filter_map(|n| match n {
                Object::Integer(i) => Some(*i as f32),
                Object::Real(r) => Some(*r as f32),
                _ => None,
            })
            .collect();

        numbers.try_into().ok()
    }
}
