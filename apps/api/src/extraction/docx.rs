//! DOCX decoding: unzip the package and walk `word/document.xml`.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::extraction::{DocumentFormat, ExtractionError};

const DOCUMENT_PART: &str = "word/document.xml";

fn corrupt(reason: impl Into<String>) -> ExtractionError {
    ExtractionError::CorruptInput {
        format: DocumentFormat::Docx,
        reason: reason.into(),
    }
}

/// Pulls the body text out of a DOCX package.
///
/// Text runs (`w:t`) are concatenated, `w:tab` becomes a tab, `w:br`/`w:cr`
/// a line break, and every closed paragraph (`w:p`) ends a line.
pub fn extract_docx(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| corrupt(format!("not a DOCX package: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| corrupt(format!("missing {DOCUMENT_PART}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| corrupt(format!("unreadable {DOCUMENT_PART}: {e}")))?;

    document_xml_to_text(&xml)
}

fn document_xml_to_text(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut out = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text_run = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" | b"w:cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                let text = t
                    .unescape()
                    .map_err(|e| corrupt(format!("bad text run: {e}")))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(corrupt(format!(
                    "malformed XML at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }

    Ok(out)
}
