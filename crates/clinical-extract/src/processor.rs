//! Document normalization.
//!
//! Converts one file on disk into exactly one of {structured text,
//! normalized pixel buffer} plus the metadata the rule table could
//! resolve. Stateless; each call is independent.
//!
//! Text-bearing formats are concatenated in document order with repeated
//! page headers/footers stripped where detectable. Images are decoded to
//! RGB8 and bounded to a maximum dimension. A text-bearing file with no
//! extractable text is an error, never an empty payload; an unreadable
//! image is an error, never a zero vector.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use tracing::{debug, warn};

use clinical_types::{Modality, PixelBuffer, RecordMetadata};

use crate::error::ExtractError;
use crate::metadata;

/// Supported text-bearing extensions.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "pdf", "docx", "json"];

/// Supported raster image extensions.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

/// Characters retained for the display excerpt.
const EXCERPT_CHARS: usize = 500;

/// Processing bounds.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum input file size in bytes
    pub max_file_bytes: u64,
    /// Maximum extracted text length in characters
    pub max_text_chars: usize,
    /// Maximum PDF pages processed
    pub max_pdf_pages: usize,
    /// Maximum image width/height after normalization
    pub max_image_dimension: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_bytes: 100 * 1024 * 1024,
            max_text_chars: 1_000_000,
            max_pdf_pages: 100,
            max_image_dimension: 2048,
        }
    }
}

/// The normalized content of a processed file.
#[derive(Debug, Clone)]
pub enum DocumentPayload {
    /// Extracted text plus a short display excerpt
    Text { text: String, excerpt: String },
    /// Decoded, bounded RGB8 pixels
    Image(PixelBuffer),
}

/// Result of processing one file.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    /// Normalized payload
    pub payload: DocumentPayload,
    /// Metadata resolved from filename and content
    pub metadata: RecordMetadata,
}

impl ProcessedDocument {
    /// Which modality this document embeds as.
    pub fn modality(&self) -> Modality {
        match self.payload {
            DocumentPayload::Text { .. } => Modality::Text,
            DocumentPayload::Image(_) => Modality::Image,
        }
    }
}

/// Stateless file normalizer.
#[derive(Debug, Clone, Default)]
pub struct DocumentProcessor {
    limits: Limits,
}

impl DocumentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self { limits }
    }

    /// Modality a path would process as, by extension; `None` if unsupported.
    pub fn classify(path: &Path) -> Option<Modality> {
        let ext = extension(path)?;
        if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            Some(Modality::Text)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Modality::Image)
        } else {
            None
        }
    }

    /// Whether the path has a supported extension.
    pub fn is_supported(path: &Path) -> bool {
        Self::classify(path).is_some()
    }

    /// Normalize one file.
    pub fn process(&self, path: &Path) -> Result<ProcessedDocument, ExtractError> {
        let ext = extension(path).ok_or_else(|| ExtractError::UnsupportedFormat {
            extension: String::new(),
        })?;

        let size = std::fs::metadata(path)?.len();
        if size > self.limits.max_file_bytes {
            return Err(ExtractError::TooLarge {
                path: path.display().to_string(),
                bytes: size,
                limit: self.limits.max_file_bytes,
            });
        }

        match ext.as_str() {
            "txt" | "md" => self.finish_text(path, self.extract_plain(path)?),
            "pdf" => self.finish_text(path, self.extract_pdf(path)?),
            "docx" => self.finish_text(path, self.extract_docx(path)?),
            "json" => self.finish_text(path, self.extract_json(path)?),
            _ if IMAGE_EXTENSIONS.contains(&ext.as_str()) => self.process_image(path),
            _ => Err(ExtractError::UnsupportedFormat { extension: ext }),
        }
    }

    fn finish_text(&self, path: &Path, text: String) -> Result<ProcessedDocument, ExtractError> {
        let text = truncate_chars(text, self.limits.max_text_chars);
        if text.trim().is_empty() {
            return Err(ExtractError::NoText {
                path: path.display().to_string(),
            });
        }
        let excerpt = truncate_chars(text.clone(), EXCERPT_CHARS);
        let meta = metadata::extract(path, Some(&text));
        debug!(path = %path.display(), chars = text.len(), "Extracted text");
        Ok(ProcessedDocument {
            payload: DocumentPayload::Text { text, excerpt },
            metadata: meta,
        })
    }

    fn extract_plain(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// PDF extraction, page by page.
    ///
    /// pdf-extract handles font encodings better but panics on some
    /// malformed files; lopdf is more tolerant, so it serves as fallback
    /// for both error and panic paths.
    fn extract_pdf(&self, path: &Path) -> Result<String, ExtractError> {
        let pages = match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_by_pages(path)))
        {
            Ok(Ok(pages)) => pages,
            Ok(Err(e)) => {
                warn!(path = %path.display(), error = %e, "pdf-extract failed, trying lopdf");
                return self.extract_pdf_lopdf(path);
            }
            Err(_) => {
                warn!(path = %path.display(), "pdf-extract panicked, trying lopdf");
                return self.extract_pdf_lopdf(path);
            }
        };

        let kept: Vec<String> = pages.into_iter().take(self.limits.max_pdf_pages).collect();
        Ok(strip_repeated_page_lines(&kept))
    }

    fn extract_pdf_lopdf(&self, path: &Path) -> Result<String, ExtractError> {
        use lopdf::{Document, Object};

        let doc = Document::load(path).map_err(|e| ExtractError::Malformed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut text = String::new();
        for (_page_num, page_id) in doc.get_pages().into_iter().take(self.limits.max_pdf_pages) {
            let Ok(content) = doc.get_page_content(page_id) else {
                continue;
            };
            let operations = lopdf::content::Content::decode(&content)
                .map(|c| c.operations)
                .unwrap_or_default();

            for op in operations {
                match op.operator.as_str() {
                    "Tj" => {
                        if let Some(Object::String(bytes, _)) = op.operands.first() {
                            push_pdf_string(&mut text, bytes);
                        }
                    }
                    "TJ" => {
                        if let Some(Object::Array(arr)) = op.operands.first() {
                            for item in arr {
                                if let Object::String(bytes, _) = item {
                                    push_pdf_string(&mut text, bytes);
                                }
                            }
                        }
                    }
                    "Td" | "TD" | "T*" | "'" | "\"" => {
                        if !text.ends_with('\n') && !text.ends_with(' ') {
                            text.push(' ');
                        }
                    }
                    "ET" => {
                        if !text.ends_with('\n') {
                            text.push('\n');
                        }
                    }
                    _ => {}
                }
            }
            text.push('\n');
        }
        Ok(text)
    }

    /// DOCX is a ZIP archive; the document body lives in word/document.xml
    /// and the visible text sits inside <w:t> runs.
    fn extract_docx(&self, path: &Path) -> Result<String, ExtractError> {
        use std::io::Read;

        let malformed = |reason: String| ExtractError::Malformed {
            path: path.display().to_string(),
            reason,
        };

        let file = std::fs::File::open(path)?;
        let mut archive =
            zip::ZipArchive::new(file).map_err(|e| malformed(format!("bad archive: {}", e)))?;
        let mut doc_xml = archive
            .by_name("word/document.xml")
            .map_err(|_| malformed("no word/document.xml in archive".to_string()))?;

        let mut xml = String::new();
        doc_xml
            .read_to_string(&mut xml)
            .map_err(|e| malformed(format!("unreadable document.xml: {}", e)))?;

        Ok(docx_xml_to_plaintext(&xml))
    }

    fn extract_json(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| ExtractError::Malformed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        // A {"text": ...} document embeds its own body; anything else is
        // embedded as pretty-printed structure.
        match value.get("text").and_then(|t| t.as_str()) {
            Some(text) => Ok(text.to_string()),
            None => Ok(serde_json::to_string_pretty(&value).unwrap_or_default()),
        }
    }

    fn process_image(&self, path: &Path) -> Result<ProcessedDocument, ExtractError> {
        let decoded = image::open(path).map_err(|e| ExtractError::ImageDecode {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let max = self.limits.max_image_dimension;
        let bounded = if decoded.width() > max || decoded.height() > max {
            decoded.thumbnail(max, max)
        } else {
            decoded
        };

        let rgb = bounded.to_rgb8();
        let (width, height) = (rgb.width(), rgb.height());
        let pixels = PixelBuffer::new(width, height, rgb.into_raw()).map_err(|e| {
            ExtractError::ImageDecode {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        debug!(path = %path.display(), width, height, "Decoded image");
        Ok(ProcessedDocument {
            metadata: metadata::extract(path, None),
            payload: DocumentPayload::Image(pixels),
        })
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

fn truncate_chars(s: String, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s,
    }
}

fn push_pdf_string(text: &mut String, bytes: &[u8]) {
    match std::str::from_utf8(bytes) {
        Ok(s) => text.push_str(s),
        // Latin-1 fallback for legacy font encodings
        Err(_) => text.extend(bytes.iter().map(|&b| b as char)),
    }
}

/// Join pages, dropping boilerplate lines repeated at the top or bottom of
/// most pages (letterheads, page footers).
fn strip_repeated_page_lines(pages: &[String]) -> String {
    if pages.len() < 3 {
        return pages.join("\n\n");
    }

    let edge_lines: Vec<(Option<&str>, Option<&str>)> = pages
        .iter()
        .map(|p| {
            let mut lines = p.lines().filter(|l| !l.trim().is_empty());
            let first = lines.next().map(str::trim);
            let last = lines.last().map(str::trim);
            (first, last)
        })
        .collect();

    let mut first_counts: HashMap<&str, usize> = HashMap::new();
    let mut last_counts: HashMap<&str, usize> = HashMap::new();
    for (first, last) in &edge_lines {
        if let Some(line) = first {
            *first_counts.entry(line).or_default() += 1;
        }
        if let Some(line) = last {
            *last_counts.entry(line).or_default() += 1;
        }
    }

    let majority = pages.len() / 2 + 1;
    let mut out = Vec::with_capacity(pages.len());
    for (page, (first, last)) in pages.iter().zip(&edge_lines) {
        let page_text: Vec<&str> = page
            .lines()
            .filter(|l| {
                let trimmed = l.trim();
                if trimmed.is_empty() {
                    return true;
                }
                let is_header = *first == Some(trimmed)
                    && first_counts.get(trimmed).copied().unwrap_or(0) >= majority;
                let is_footer = *last == Some(trimmed)
                    && last_counts.get(trimmed).copied().unwrap_or(0) >= majority;
                !(is_header || is_footer)
            })
            .collect();
        out.push(page_text.join("\n"));
    }
    out.join("\n\n")
}

/// Pull visible text out of DOCX XML: runs live in <w:t> elements and
/// paragraphs map to line breaks.
fn docx_xml_to_plaintext(xml: &str) -> String {
    let mut result = String::new();
    let mut in_text = false;
    let mut chars = xml.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '<' {
            let mut tag = String::new();
            for tc in chars.by_ref() {
                if tc == '>' {
                    break;
                }
                tag.push(tc);
            }

            if tag.starts_with("w:t") && !tag.starts_with("w:t/") && !tag.ends_with('/') {
                in_text = true;
            } else if tag == "/w:t" {
                in_text = false;
            } else if tag.starts_with("w:p") && !tag.starts_with("w:p/") && !tag.ends_with('/') {
                if !result.is_empty() && !result.ends_with('\n') {
                    result.push('\n');
                }
            }
        } else if in_text {
            result.push(c);
        }
    }

    result
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(
            DocumentProcessor::classify(Path::new("a.pdf")),
            Some(Modality::Text)
        );
        assert_eq!(
            DocumentProcessor::classify(Path::new("a.PNG")),
            Some(Modality::Image)
        );
        assert_eq!(DocumentProcessor::classify(Path::new("a.exe")), None);
        assert_eq!(DocumentProcessor::classify(Path::new("noext")), None);
    }

    #[test]
    fn test_process_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "P001_cardiac_2023-06-01.txt",
            b"Cardiac consultation for patient P001. Normal sinus rhythm.",
        );

        let doc = DocumentProcessor::new().process(&path).unwrap();
        assert_eq!(doc.modality(), Modality::Text);
        match &doc.payload {
            DocumentPayload::Text { text, excerpt } => {
                assert!(text.contains("sinus rhythm"));
                assert!(excerpt.starts_with("Cardiac consultation"));
            }
            _ => panic!("expected text payload"),
        }
        assert_eq!(doc.metadata.patient_id.as_deref(), Some("P001"));
        assert_eq!(doc.metadata.category.as_deref(), Some("cardiac"));
    }

    #[test]
    fn test_empty_text_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "empty.txt", b"   \n\t  ");

        let err = DocumentProcessor::new().process(&path).unwrap_err();
        assert!(matches!(err, ExtractError::NoText { .. }));
    }

    #[test]
    fn test_unsupported_extension_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "report.xyz", b"whatever");

        let err = DocumentProcessor::new().process(&path).unwrap_err();
        match err {
            ExtractError::UnsupportedFormat { extension } => assert_eq!(extension, "xyz"),
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_oversized_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "big.txt", b"0123456789");

        let processor = DocumentProcessor::with_limits(Limits {
            max_file_bytes: 5,
            ..Limits::default()
        });
        assert!(matches!(
            processor.process(&path),
            Err(ExtractError::TooLarge { bytes: 10, .. })
        ));
    }

    #[test]
    fn test_json_with_text_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "note.json",
            br#"{"text": "Lab results for P007", "format": "json"}"#,
        );

        let doc = DocumentProcessor::new().process(&path).unwrap();
        match &doc.payload {
            DocumentPayload::Text { text, .. } => assert_eq!(text, "Lab results for P007"),
            _ => panic!("expected text payload"),
        }
        assert_eq!(doc.metadata.patient_id.as_deref(), Some("P007"));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "broken.json", b"{not json");

        assert!(matches!(
            DocumentProcessor::new().process(&path),
            Err(ExtractError::Malformed { .. })
        ));
    }

    #[test]
    fn test_corrupt_image_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "scan.png", b"definitely not a png");

        assert!(matches!(
            DocumentProcessor::new().process(&path),
            Err(ExtractError::ImageDecode { .. })
        ));
    }

    #[test]
    fn test_image_decodes_and_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("P010_xray.png");
        let img = image::RgbImage::from_pixel(64, 32, image::Rgb([10, 20, 30]));
        img.save(&path).unwrap();

        let processor = DocumentProcessor::with_limits(Limits {
            max_image_dimension: 16,
            ..Limits::default()
        });
        let doc = processor.process(&path).unwrap();
        match &doc.payload {
            DocumentPayload::Image(pixels) => {
                assert!(pixels.width <= 16 && pixels.height <= 16);
                assert_eq!(
                    pixels.data.len(),
                    pixels.width as usize * pixels.height as usize * 3
                );
            }
            _ => panic!("expected image payload"),
        }
        assert_eq!(doc.metadata.patient_id.as_deref(), Some("P010"));
        assert_eq!(doc.metadata.category.as_deref(), Some("radiology"));
    }

    #[test]
    fn test_docx_plaintext_walk() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Discharge summary</w:t></w:r></w:p>
            <w:p><w:r><w:t>Patient ID: P003</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = docx_xml_to_plaintext(xml);
        assert!(text.contains("Discharge summary"));
        assert!(text.contains("Patient ID: P003"));
    }

    #[test]
    fn test_strip_repeated_page_lines() {
        let pages = vec![
            "City Hospital\nFindings on page one\nPage 1".to_string(),
            "City Hospital\nFindings on page two\nPage 2".to_string(),
            "City Hospital\nFindings on page three\nPage 3".to_string(),
        ];
        let text = strip_repeated_page_lines(&pages);
        assert!(!text.contains("City Hospital"));
        assert!(text.contains("Findings on page two"));
        // Footers differ per page, so they survive.
        assert!(text.contains("Page 2"));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo".to_string(), 3), "hél");
        assert_eq!(truncate_chars("ab".to_string(), 10), "ab");
    }
}

