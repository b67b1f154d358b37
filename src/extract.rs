//! Multi-format text extraction for ingested documents.
//!
//! Session creation supplies file name + bytes; this module returns plain
//! UTF-8 text. Dispatch is by file extension: PDF via `pdf-extract`, DOCX by
//! pulling `w:t` runs out of `word/document.xml`, and `.txt`/`.md` as UTF-8.
//! Anything else is [`ExtractError::Unsupported`] so the caller can skip the
//! file and keep going.

use std::io::Read;

use thiserror::Error;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extraction failure. Never panics on malformed input; the ingestion
/// pipeline skips the offending file.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file format: {0}")]
    Unsupported(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("file is not valid UTF-8: {0}")]
    Encoding(String),
}

/// Extracts plain text from a document, dispatching on the file extension.
pub fn extract_text(name: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    match extension(name).as_deref() {
        Some("pdf") => extract_pdf(bytes),
        Some("docx") => extract_docx(bytes),
        Some("txt") | Some("md") => extract_plain(name, bytes),
        _ => Err(ExtractError::Unsupported(name.to_string())),
    }
}

fn extension(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_plain(name: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| ExtractError::Encoding(name.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    extract_w_t_elements(&doc_xml)
}

fn extract_w_t_elements(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        if !out.is_empty() {
                            out.push(' ');
                        }
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
