//! Document tools: `.docx` text extraction and `.docx` → PDF conversion.
//!
//! A `.docx` file is a ZIP package; the body lives in `word/document.xml`.
//! Extraction walks that part once with `quick-xml` and collects:
//!
//! - body paragraphs (`w:p` outside any table), blank ones skipped
//! - table rows, each as its non-blank cell texts joined with `" | "`
//!
//! Rows follow the paragraphs under a `--- Tables ---` marker.
//!
//! PDF conversion shells out to LibreOffice in headless mode. The converter
//! writes into a private temporary directory and the result is moved to the
//! requested path afterwards, so a failed run never leaves a partial PDF at
//! the destination.

use crate::config::DeckConfig;
use crate::error::DeckError;
use crate::output::{ExtractionResult, PdfConversionResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Package part holding the document body.
const MAIN_PART: &str = "word/document.xml";

/// Separator between body paragraphs and table rows.
pub const TABLES_MARKER: &str = "--- Tables ---";

// ── Extraction ───────────────────────────────────────────────────────────

/// Extract the text of a `.docx` file.
///
/// Never fails: every problem is reported through the result's `error`.
pub fn extract_text(path: impl AsRef<Path>) -> ExtractionResult {
    let path = path.as_ref();
    let result = read_document_text(path);
    if let Err(ref e) = result {
        warn!("Text extraction failed: {}", e);
    }
    ExtractionResult::from_result(result)
}

/// Extract the text of a `.docx` file, propagating errors.
pub fn read_document_text(path: impl AsRef<Path>) -> Result<String, DeckError> {
    let path = path.as_ref();
    let file = open_input(path)?;

    let mut archive = zip::ZipArchive::new(file).map_err(|e| DeckError::InvalidDocument {
        path: path.to_path_buf(),
        detail: format!("not a ZIP package ({e})"),
    })?;
    let mut part = archive
        .by_name(MAIN_PART)
        .map_err(|_| DeckError::InvalidDocument {
            path: path.to_path_buf(),
            detail: format!("missing {MAIN_PART}"),
        })?;

    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| DeckError::InvalidDocument {
            path: path.to_path_buf(),
            detail: format!("unreadable {MAIN_PART}: {e}"),
        })?;

    let body = parse_body(&xml).map_err(|detail| DeckError::InvalidDocument {
        path: path.to_path_buf(),
        detail,
    })?;
    let text = body.render();

    info!(
        "Extracted {} paragraphs and {} table rows ({} chars) from {}",
        body.paragraphs.len(),
        body.rows.len(),
        text.len(),
        path.display()
    );
    Ok(text)
}

/// Read a plain-text offer (`.txt`, `.md`) verbatim.
pub fn read_plain_text(path: impl AsRef<Path>) -> Result<String, DeckError> {
    let path = path.as_ref();
    let mut file = open_input(path)?;
    let mut text = String::new();
    file.read_to_string(&mut text).map_err(|e| DeckError::InvalidDocument {
        path: path.to_path_buf(),
        detail: format!("not valid UTF-8 text ({e})"),
    })?;
    debug!("Read {} chars from {}", text.len(), path.display());
    Ok(text)
}

fn open_input(path: &Path) -> Result<std::fs::File, DeckError> {
    match std::fs::File::open(path) {
        Ok(f) => Ok(f),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DeckError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(DeckError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(e) => Err(DeckError::Io(e)),
    }
}

/// Paragraphs and table rows of one document body.
#[derive(Debug, Default)]
struct DocumentBody {
    paragraphs: Vec<String>,
    rows: Vec<String>,
}

impl DocumentBody {
    fn render(&self) -> String {
        let mut text = self.paragraphs.join("\n\n");
        if !self.rows.is_empty() {
            text.push_str("\n\n");
            text.push_str(TABLES_MARKER);
            text.push('\n');
            text.push_str(&self.rows.join("\n"));
        }
        text
    }
}

/// Walk state for [`parse_body`].
#[derive(Default)]
struct BodyWalker {
    body: DocumentBody,
    table_depth: usize,
    run_depth: usize,
    /// Depth inside `w:txbxContent`; text boxes are not paragraph text.
    skip_depth: usize,
    in_text: bool,
    paragraph: Option<String>,
    row: Option<Vec<String>>,
    cell: Option<String>,
}

impl BodyWalker {
    /// Buffer that receives run text at the current position.
    ///
    /// Inside tables, text from nested tables folds into the outermost cell.
    fn sink(&mut self) -> Option<&mut String> {
        if self.table_depth > 0 {
            self.cell.as_mut()
        } else {
            self.paragraph.as_mut()
        }
    }

    fn push_str(&mut self, s: &str) {
        if let Some(buf) = self.sink() {
            buf.push_str(s);
        }
    }

    fn push(&mut self, c: char) {
        if let Some(buf) = self.sink() {
            buf.push(c);
        }
    }

    fn open(&mut self, name: &[u8]) {
        if self.skip_depth > 0 {
            if name == b"txbxContent" {
                self.skip_depth += 1;
            }
            return;
        }
        match name {
            b"txbxContent" => self.skip_depth = 1,
            b"tbl" => self.table_depth += 1,
            b"r" => self.run_depth += 1,
            b"tr" if self.table_depth == 1 => self.row = Some(Vec::new()),
            b"tc" if self.table_depth == 1 => self.cell = Some(String::new()),
            b"p" if self.table_depth == 0 => self.paragraph = Some(String::new()),
            b"p" => {
                // Paragraphs inside a cell are separated by a newline
                if let Some(cell) = self.cell.as_mut() {
                    if !cell.is_empty() {
                        cell.push('\n');
                    }
                }
            }
            b"t" => self.in_text = true,
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        if self.skip_depth > 0 {
            if name == b"txbxContent" {
                self.skip_depth -= 1;
            }
            return;
        }
        match name {
            b"t" => self.in_text = false,
            b"r" => self.run_depth = self.run_depth.saturating_sub(1),
            b"p" if self.table_depth == 0 => {
                if let Some(p) = self.paragraph.take() {
                    if !p.trim().is_empty() {
                        self.body.paragraphs.push(p);
                    }
                }
            }
            b"tc" if self.table_depth == 1 => {
                if let (Some(cell), Some(row)) = (self.cell.take(), self.row.as_mut()) {
                    row.push(cell);
                }
            }
            b"tr" if self.table_depth == 1 => {
                if let Some(cells) = self.row.take() {
                    let line = cells
                        .iter()
                        .map(|c| c.trim())
                        .filter(|c| !c.is_empty())
                        .collect::<Vec<_>>()
                        .join(" | ");
                    if !line.is_empty() {
                        self.body.rows.push(line);
                    }
                }
            }
            b"tbl" => self.table_depth = self.table_depth.saturating_sub(1),
            _ => {}
        }
    }

    /// Self-closing run content: tabs and breaks.
    ///
    /// Outside a run, `w:tab` is a tab-stop definition and carries no text.
    fn empty(&mut self, name: &[u8]) {
        if self.skip_depth > 0 || self.run_depth == 0 {
            return;
        }
        match name {
            b"tab" => self.push('\t'),
            b"br" | b"cr" => self.push('\n'),
            _ => {}
        }
    }
}

/// Parse `word/document.xml` into paragraphs and table rows.
fn parse_body(xml: &str) -> Result<DocumentBody, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut walker = BodyWalker::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => walker.open(e.local_name().as_ref()),
            Ok(Event::End(e)) => walker.close(e.local_name().as_ref()),
            Ok(Event::Empty(e)) => walker.empty(e.local_name().as_ref()),
            Ok(Event::Text(e)) if walker.in_text => {
                let text = e.decode().map_err(|e| format!("bad text encoding: {e}"))?;
                walker.push_str(&text);
            }
            Ok(Event::GeneralRef(r)) if walker.in_text => {
                if let Some(c) = r.resolve_char_ref().map_err(|e| e.to_string())? {
                    walker.push(c);
                } else {
                    let name = r.decode().map_err(|e| e.to_string())?;
                    match quick_xml::escape::resolve_predefined_entity(&name) {
                        Some(s) => walker.push_str(s),
                        None => return Err(format!("unknown entity '&{name};'")),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "malformed XML at byte {}: {e}",
                    reader.buffer_position()
                ))
            }
            _ => {}
        }
    }

    Ok(walker.body)
}

// ── PDF conversion ───────────────────────────────────────────────────────

/// Convert a `.docx` file to PDF with the default LibreOffice binary.
///
/// `output_path` defaults to the input path with a `.pdf` extension.
pub async fn convert_to_pdf(
    path: impl AsRef<Path>,
    output_path: Option<&Path>,
) -> PdfConversionResult {
    let soffice = DeckConfig::default().soffice_path;
    convert_to_pdf_with(path, output_path, &soffice).await
}

/// Same as [`convert_to_pdf`] with an explicit converter binary.
pub async fn convert_to_pdf_with(
    path: impl AsRef<Path>,
    output_path: Option<&Path>,
    soffice: &Path,
) -> PdfConversionResult {
    let result = run_conversion(path.as_ref(), output_path, soffice).await;
    if let Err(ref e) = result {
        warn!("PDF conversion failed: {}", e);
    }
    PdfConversionResult::from_result(result)
}

/// Check that `path` names an existing `.docx` file.
///
/// Runs before the converter is looked up.
fn validate_docx_input(path: &Path) -> Result<(), DeckError> {
    if !path.is_file() {
        return Err(DeckError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let is_docx = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("docx"));
    if !is_docx {
        return Err(DeckError::UnsupportedFormat {
            path: path.to_path_buf(),
            expected: ".docx".to_string(),
        });
    }
    Ok(())
}

async fn run_conversion(
    input: &Path,
    output_path: Option<&Path>,
    soffice: &Path,
) -> Result<PathBuf, DeckError> {
    validate_docx_input(input)?;

    let target = match output_path {
        Some(p) => p.to_path_buf(),
        None => input.with_extension("pdf"),
    };

    let work_dir = TempDir::new().map_err(|e| DeckError::Internal(format!("tempdir: {e}")))?;
    info!(
        "Converting {} to PDF with {}",
        input.display(),
        soffice.display()
    );

    let output = tokio::process::Command::new(soffice)
        .arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg("--outdir")
        .arg(work_dir.path())
        .arg(input)
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DeckError::ConverterUnavailable {
                program: soffice.display().to_string(),
                hint: "Install LibreOffice (e.g. `apt install libreoffice-writer` or \
                       `brew install --cask libreoffice`) or set PITCHDECK_SOFFICE \
                       to the soffice binary."
                    .to_string(),
            },
            _ => DeckError::ConversionFailed {
                path: input.to_path_buf(),
                detail: format!("could not start converter: {e}"),
            },
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DeckError::ConversionFailed {
            path: input.to_path_buf(),
            detail: format!("converter exited with {}: {}", output.status, stderr.trim()),
        });
    }

    let produced = converted_file_name(input)
        .map(|name| work_dir.path().join(name))
        .filter(|p| p.is_file())
        .ok_or_else(|| DeckError::ConversionFailed {
            path: input.to_path_buf(),
            detail: "converter finished but produced no PDF".to_string(),
        })?;

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| DeckError::OutputWriteFailed {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    move_file(&produced, &target).await?;

    info!("PDF written to {}", target.display());
    Ok(target)
}

/// Name LibreOffice gives the converted file: input stem + `.pdf`.
fn converted_file_name(input: &Path) -> Option<PathBuf> {
    input
        .file_stem()
        .map(|stem| PathBuf::from(stem).with_extension("pdf"))
}

/// Rename, falling back to copy + remove across filesystems.
async fn move_file(from: &Path, to: &Path) -> Result<(), DeckError> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to)
        .await
        .map_err(|source| DeckError::OutputWriteFailed {
            path: to.to_path_buf(),
            source,
        })?;
    let _ = tokio::fs::remove_file(from).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    fn document_xml(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}"><w:body>{body}</w:body></w:document>"#
        )
    }

    fn write_docx(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("[Content_Types].xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<Types/>").unwrap();
        zip.start_file(MAIN_PART, SimpleFileOptions::default())
            .unwrap();
        zip.write_all(document_xml(body).as_bytes()).unwrap();
        zip.finish().unwrap();
        path
    }

    fn para(text: &str) -> String {
        format!("<w:p><w:r><w:t xml:space=\"preserve\">{text}</w:t></w:r></w:p>")
    }

    #[test]
    fn paragraphs_in_order_blank_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "{}{}<w:p/>{}{}",
            para("Acme Analytics"),
            para("   "),
            para("Cuts reporting time by 80%."),
            "<w:sectPr/>"
        );
        let path = write_docx(dir.path(), "offer.docx", &body);
        let text = read_document_text(&path).unwrap();
        assert_eq!(text, "Acme Analytics\n\nCuts reporting time by 80%.");
    }

    #[test]
    fn runs_tabs_breaks_and_entities() {
        let dir = tempfile::tempdir().unwrap();
        let body = "<w:p><w:r><w:t>Price</w:t><w:tab/><w:t>R&amp;D &#8364;10</w:t></w:r>\
                    <w:r><w:br/><w:t>line two</w:t></w:r></w:p>";
        let path = write_docx(dir.path(), "offer.docx", body);
        let text = read_document_text(&path).unwrap();
        assert_eq!(text, "Price\tR&D \u{20ac}10\nline two");
    }

    #[test]
    fn tab_stop_definitions_add_no_text() {
        let body = "<w:p><w:pPr><w:tabs><w:tab w:val=\"left\" w:pos=\"720\"/></w:tabs></w:pPr>\
                    <w:r><w:t>Hello</w:t></w:r></w:p>";
        let parsed = parse_body(&document_xml(body)).unwrap();
        assert_eq!(parsed.paragraphs, vec!["Hello"]);
    }

    #[test]
    fn text_box_keeps_host_paragraph() {
        let body = "<w:p><w:r><w:t xml:space=\"preserve\">Before </w:t></w:r>\
                    <w:r><w:pict><v:shape xmlns:v=\"urn:schemas-microsoft-com:vml\"><v:textbox>\
                    <w:txbxContent><w:p><w:r><w:t>Box</w:t></w:r></w:p></w:txbxContent>\
                    </v:textbox></v:shape></w:pict></w:r>\
                    <w:r><w:t>After</w:t></w:r></w:p>";
        let parsed = parse_body(&document_xml(body)).unwrap();
        assert_eq!(parsed.paragraphs, vec!["Before After"]);
    }

    #[test]
    fn tables_follow_marker() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "{}<w:tbl><w:tr><w:tc>{}</w:tc><w:tc>{}</w:tc></w:tr>\
             <w:tr><w:tc>{}</w:tc><w:tc>{}</w:tc></w:tr>\
             <w:tr><w:tc>{}</w:tc><w:tc>{}</w:tc></w:tr></w:tbl>",
            para("Pricing"),
            para("Plan"),
            para("Price"),
            para(" Starter "),
            para(""),
            para(" "),
            para("  "),
        );
        let path = write_docx(dir.path(), "offer.docx", &body);
        let text = read_document_text(&path).unwrap();
        assert_eq!(text, "Pricing\n\n--- Tables ---\nPlan | Price\nStarter");
    }

    #[test]
    fn table_paragraphs_do_not_leak_into_body() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "<w:tbl><w:tr><w:tc>{}</w:tc></w:tr></w:tbl>{}",
            para("cell"),
            para("after")
        );
        let path = write_docx(dir.path(), "offer.docx", &body);
        let text = read_document_text(&path).unwrap();
        assert_eq!(text, "after\n\n--- Tables ---\ncell");
    }

    #[test]
    fn missing_file_reports_not_found() {
        let r = extract_text("/nonexistent/offer.docx");
        assert!(!r.success);
        assert!(r.text.is_none());
        let err = r.error.unwrap();
        assert!(err.to_lowercase().contains("not found"), "got: {err}");
    }

    #[test]
    fn non_zip_file_is_invalid_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.docx");
        std::fs::write(&path, b"plain text, not a package").unwrap();
        let err = read_document_text(&path).unwrap_err();
        assert!(matches!(err, DeckError::InvalidDocument { .. }), "got: {err}");
    }

    #[test]
    fn missing_main_part_is_invalid_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.docx");
        let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        zip.start_file("other.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<x/>").unwrap();
        zip.finish().unwrap();

        let r = extract_text(&path);
        assert!(!r.success);
        assert!(r.error.unwrap().contains("word/document.xml"));
    }

    #[test]
    fn malformed_xml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_docx(dir.path(), "bad.docx", "<w:p><w:r><w:t>oops</w:r></w:p>");
        let r = extract_text(&path);
        assert!(!r.success);
        assert!(r.error.is_some());
    }

    #[test]
    fn plain_text_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offer.md");
        std::fs::write(&path, "# Offer\n\nWe sell widgets.\n").unwrap();
        assert_eq!(read_plain_text(&path).unwrap(), "# Offer\n\nWe sell widgets.\n");
    }

    #[tokio::test]
    async fn conversion_rejects_missing_input() {
        let r = convert_to_pdf_with(
            "/nonexistent/offer.docx",
            None,
            Path::new("/nonexistent/soffice"),
        )
        .await;
        assert!(!r.success);
        assert!(r.pdf_path.is_none());
        assert!(r.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn conversion_rejects_wrong_extension_before_running_converter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offer.txt");
        std::fs::write(&path, "text").unwrap();
        let r = convert_to_pdf_with(&path, None, Path::new("/nonexistent/soffice")).await;
        assert!(!r.success);
        assert!(r.error.unwrap().contains("must be a .docx file"));
    }

    #[tokio::test]
    async fn conversion_accepts_uppercase_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_docx(dir.path(), "OFFER.DOCX", &para("x"));
        let r = convert_to_pdf_with(&path, None, Path::new("/nonexistent/soffice")).await;
        assert!(!r.success);
        let err = r.error.unwrap();
        assert!(err.contains("not available"), "got: {err}");
    }

    #[test]
    fn converted_name_uses_stem() {
        assert_eq!(
            converted_file_name(Path::new("/a/b/Offer v2.docx")),
            Some(PathBuf::from("Offer v2.pdf"))
        );
    }
}
