// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Combine per-image PDFs into one document with `lopdf`.
//
// The first document is the base; every page of each following document is
// deep-cloned into it and appended to its page tree, so page order is input
// order and, within each input, that input's page order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use sokbar_core::error::{Result, SokbarError};
use tracing::{debug, info, instrument, warn};

/// Page attributes a page may inherit from its /Pages ancestors.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Concatenates PDFs page by page.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfMerger;

impl PdfMerger {
    pub fn new() -> Self {
        Self
    }

    /// Merge in-memory PDFs in the given order.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub fn merge_bytes(&self, documents: &[Vec<u8>]) -> Result<Vec<u8>> {
        let (first, rest) = documents.split_first().ok_or(SokbarError::NoInputs)?;
        let mut merged = load(first, 0)?;

        for (index, bytes) in rest.iter().enumerate() {
            let other = load(bytes, index + 1)?;
            let pages = other.get_pages();
            let mut numbers: Vec<u32> = pages.keys().copied().collect();
            numbers.sort_unstable();
            for number in numbers {
                clone_page_into(&other, &mut merged, pages[&number])?;
            }
        }

        let page_count = merged.get_pages().len();
        let mut output = Vec::new();
        merged.save_to(&mut output).map_err(|err| {
            SokbarError::PdfError(format!("failed to serialise merged PDF: {}", err))
        })?;

        info!(pages = page_count, bytes = output.len(), "PDFs merged");
        Ok(output)
    }

    /// Merge PDF files in the given order and write the result to `output`.
    ///
    /// Returns the page count of the merged document.
    pub fn merge_files(&self, inputs: &[PathBuf], output: &Path) -> Result<usize> {
        let documents = inputs
            .iter()
            .map(|path| {
                std::fs::read(path).map_err(|err| {
                    SokbarError::PdfError(format!("cannot read {}: {}", path.display(), err))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let merged = self.merge_bytes(&documents)?;
        std::fs::write(output, &merged)?;

        let pages = Document::load_mem(&merged)
            .map(|doc| doc.get_pages().len())
            .unwrap_or_default();
        info!(path = %output.display(), pages, "Combined PDF saved");
        Ok(pages)
    }
}

fn load(bytes: &[u8], index: usize) -> Result<Document> {
    Document::load_mem(bytes).map_err(|err| {
        SokbarError::PdfError(format!("failed to load PDF #{}: {}", index + 1, err))
    })
}

/// Append `page_id` from `source` as the last page of `target`.
fn clone_page_into(source: &Document, target: &mut Document, page_id: ObjectId) -> Result<()> {
    let page = source.get_dictionary(page_id).map_err(|err| {
        SokbarError::PdfError(format!("cannot read page object {:?}: {}", page_id, err))
    })?;

    let mut page = page.clone();
    for key in INHERITABLE {
        if !page.has(key)
            && let Some(value) = inherited(source, page_id, key)
        {
            page.set(key, value);
        }
    }

    let mut cloned = HashMap::new();
    let page_object = deep_clone(source, target, &Object::Dictionary(page), &mut cloned)?;
    let new_page_id = target.add_object(page_object);

    let pages_id = target
        .catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|err| SokbarError::PdfError(format!("target has no page tree: {}", err)))?;

    let pages = target
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(|err| SokbarError::PdfError(format!("page tree is not a dictionary: {}", err)))?;
    if let Ok(Object::Array(kids)) = pages.get_mut(b"Kids") {
        kids.push(Object::Reference(new_page_id));
    }
    if let Ok(Object::Integer(count)) = pages.get_mut(b"Count") {
        *count += 1;
    }

    if let Ok(Object::Dictionary(page)) = target.get_object_mut(new_page_id) {
        page.set("Parent", Object::Reference(pages_id));
    }

    debug!(?page_id, ?new_page_id, "Page cloned");
    Ok(())
}

/// Walk /Parent links looking for an inheritable attribute.
fn inherited(source: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = source.get_dictionary(page_id).ok()?;
    // Page trees are shallow; the bound guards against a /Parent cycle.
    for _ in 0..32 {
        let parent_id = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = source.get_dictionary(parent_id).ok()?;
        if let Ok(value) = current.get(key) {
            return Some(value.clone());
        }
    }
    None
}

/// Deep-clone `object`, copying every referenced object into `target` once.
///
/// /Parent entries are dropped; the caller re-links the page.
fn deep_clone(
    source: &Document,
    target: &mut Document,
    object: &Object,
    cloned: &mut HashMap<ObjectId, ObjectId>,
) -> Result<Object> {
    match object {
        Object::Dictionary(dict) => Ok(Object::Dictionary(clone_dict(source, target, dict, cloned)?)),
        Object::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(deep_clone(source, target, item, cloned)?);
            }
            Ok(Object::Array(out))
        }
        Object::Reference(id) => {
            if let Some(existing) = cloned.get(id) {
                return Ok(Object::Reference(*existing));
            }
            match source.get_object(*id) {
                Ok(referenced) => {
                    // Reserve the id first so self-references resolve to it.
                    let new_id = target.new_object_id();
                    cloned.insert(*id, new_id);
                    let copy = deep_clone(source, target, referenced, cloned)?;
                    target.objects.insert(new_id, copy);
                    Ok(Object::Reference(new_id))
                }
                Err(err) => {
                    warn!(?id, %err, "Cannot resolve reference, using Null");
                    Ok(Object::Null)
                }
            }
        }
        Object::Stream(stream) => {
            let dict = clone_dict(source, target, &stream.dict, cloned)?;
            Ok(Object::Stream(Stream::new(dict, stream.content.clone())))
        }
        other => Ok(other.clone()),
    }
}

fn clone_dict(
    source: &Document,
    target: &mut Document,
    dict: &Dictionary,
    cloned: &mut HashMap<ObjectId, ObjectId>,
) -> Result<Dictionary> {
    let mut out = Dictionary::new();
    for (key, value) in dict.iter() {
        if key == b"Parent" {
            continue;
        }
        out.set(key.clone(), deep_clone(source, target, value, cloned)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::writer::{FontChoice, SearchablePdfWriter, TextLayout};
    use image::{Rgb, RgbImage};
    use sokbar_core::types::{Detection, Page, Quad};

    fn page_pdf(width: u32, height: u32, text: &str) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([250, 250, 250]));
        let page = Page::new(
            width,
            height,
            vec![Detection::new(Quad::from_rect(2.0, 2.0, 20.0, 12.0), text, 1.0)],
        );
        SearchablePdfWriter::new(FontChoice::fallback(), TextLayout::default())
            .compose(&image, &page)
            .unwrap()
    }

    fn page_widths(bytes: &[u8]) -> Vec<f32> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|&id| {
                let page = doc.get_dictionary(id).unwrap();
                let media = match page.get(b"MediaBox") {
                    Ok(obj) => obj.clone(),
                    Err(_) => inherited(&doc, id, b"MediaBox").unwrap(),
                };
                let media = match media {
                    Object::Reference(r) => doc.get_object(r).unwrap().clone(),
                    other => other,
                };
                media.as_array().unwrap()[2].as_float().unwrap()
            })
            .collect()
    }

    #[test]
    fn merges_in_input_order() {
        let merged = PdfMerger::new()
            .merge_bytes(&[page_pdf(100, 50, "Ett"), page_pdf(60, 50, "Två")])
            .unwrap();
        let widths = page_widths(&merged);
        assert_eq!(widths.len(), 2);
        assert!((widths[0] - 100.0).abs() < 0.05);
        assert!((widths[1] - 60.0).abs() < 0.05);
    }

    #[test]
    fn single_document_passes_through() {
        let merged = PdfMerger::new().merge_bytes(&[page_pdf(40, 40, "Ensam")]).unwrap();
        assert_eq!(Document::load_mem(&merged).unwrap().get_pages().len(), 1);
    }

    #[test]
    fn no_documents_is_error() {
        assert!(matches!(PdfMerger::new().merge_bytes(&[]), Err(SokbarError::NoInputs)));
    }

    #[test]
    fn garbage_input_is_pdf_error() {
        let result = PdfMerger::new().merge_bytes(&[page_pdf(10, 10, "a"), b"nope".to_vec()]);
        assert!(matches!(result, Err(SokbarError::PdfError(_))));
    }

    #[test]
    fn merge_files_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        std::fs::write(&a, page_pdf(30, 30, "A")).unwrap();
        std::fs::write(&b, page_pdf(30, 30, "B")).unwrap();

        let out = dir.path().join("combined.pdf");
        let pages = PdfMerger::new().merge_files(&[a, b], &out).unwrap();
        assert_eq!(pages, 2);
        assert!(out.exists());
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = PdfMerger::new()
            .merge_files(&[dir.path().join("gone.pdf")], &dir.path().join("out.pdf"));
        assert!(matches!(result, Err(SokbarError::PdfError(_))));
    }
}
