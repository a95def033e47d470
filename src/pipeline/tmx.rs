//! Serialization: extracted pairs → TMX 1.4 exchange document.
//!
//! Shape of the document:
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <tmx version="1.4">
//!   <header segtype="sentence" adminlang="en-us" srclang="{lang}" datatype="plaintext">
//!     <note>Manga Chapter: {id}</note>
//!   </header>
//!   <body>
//!     <tu>
//!       <tuv xml:lang="{lang}">
//!         <seg>{text, verbatim}</seg>
//!       </tuv>
//!       <note>Imagen fuente: page_001.webp</note>
//!     </tu>
//!     …
//!   </body>
//! </tmx>
//! ```
//!
//! Segment text is written as-is (only XML-escaped); line breaks inside a
//! page's text are kept. Characters XML 1.0 cannot carry at all (C0 controls
//! other than tab, CR and LF, and U+FFFE/U+FFFF) are dropped. The file is always a complete rewrite, done through
//! a temp file and a rename so an interrupted run never leaves half a
//! document behind.

use crate::confirm::{self, ConfirmHandle};
use crate::error::MangaTmxError;
use crate::output::{ExtractedPair, WriteOutcome};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::borrow::Cow;
use std::fmt::Display;
use std::path::Path;
use tracing::{info, warn};

pub const TMX_VERSION: &str = "1.4";

/// Render the exchange document to bytes.
///
/// Pairs whose text is blank after trimming are skipped.
pub fn render_exchange_document(
    chapter_id: &str,
    language: &str,
    pairs: &[ExtractedPair],
) -> Result<Vec<u8>, MangaTmxError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    let mut tmx = BytesStart::new("tmx");
    tmx.push_attribute(("version", TMX_VERSION));
    writer.write_event(Event::Start(tmx)).map_err(xml_err)?;

    let mut header = BytesStart::new("header");
    header.push_attribute(("segtype", "sentence"));
    header.push_attribute(("adminlang", "en-us"));
    header.push_attribute(("srclang", language));
    header.push_attribute(("datatype", "plaintext"));
    writer.write_event(Event::Start(header)).map_err(xml_err)?;
    write_text_element(&mut writer, "note", &format!("Manga Chapter: {chapter_id}"))?;
    writer
        .write_event(Event::End(BytesEnd::new("header")))
        .map_err(xml_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("body")))
        .map_err(xml_err)?;

    for (pair, text) in pairs.iter().filter_map(|p| segment_text(p).map(|t| (p, t))) {
        if let Cow::Owned(_) = text {
            warn!(
                "Dropped characters not allowed in XML from {}",
                pair.image_name()
            );
        }
        writer
            .write_event(Event::Start(BytesStart::new("tu")))
            .map_err(xml_err)?;

        let mut tuv = BytesStart::new("tuv");
        tuv.push_attribute(("xml:lang", language));
        writer.write_event(Event::Start(tuv)).map_err(xml_err)?;
        write_text_element(&mut writer, "seg", &text)?;
        writer
            .write_event(Event::End(BytesEnd::new("tuv")))
            .map_err(xml_err)?;

        write_text_element(
            &mut writer,
            "note",
            &format!("Imagen fuente: {}", pair.image_name()),
        )?;
        writer
            .write_event(Event::End(BytesEnd::new("tu")))
            .map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("body")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("tmx")))
        .map_err(xml_err)?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write the exchange document to `destination`.
///
/// If the file already exists the operator is asked first; a refusal leaves
/// the old file untouched and returns [`WriteOutcome::Declined`].
pub async fn write_exchange_document(
    chapter_id: &str,
    language: &str,
    pairs: &[ExtractedPair],
    destination: &Path,
    confirm: &ConfirmHandle,
) -> Result<WriteOutcome, MangaTmxError> {
    let exists = tokio::fs::try_exists(destination)
        .await
        .map_err(|source| MangaTmxError::OutputWriteFailed {
            path: destination.to_path_buf(),
            source,
        })?;
    if exists {
        let prompt = format!(
            "The file {} already exists. Overwrite it?",
            destination.display()
        );
        if !confirm::ask(confirm, prompt).await {
            info!("Keeping existing {}; nothing written", destination.display());
            return Ok(WriteOutcome::Declined {
                path: destination.to_path_buf(),
            });
        }
    }

    let bytes = render_exchange_document(chapter_id, language, pairs)?;
    let write_err = |source| MangaTmxError::OutputWriteFailed {
        path: destination.to_path_buf(),
        source,
    };

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = destination.with_extension("tmx.tmp");
    tokio::fs::write(&tmp_path, &bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, destination)
        .await
        .map_err(write_err)?;

    let units = pairs.iter().filter(|p| segment_text(p).is_some()).count();
    info!("Translations saved to {} ({} units)", destination.display(), units);
    Ok(WriteOutcome::Written {
        path: destination.to_path_buf(),
        units,
    })
}

/// The text a pair contributes to its `<seg>`, or `None` if nothing is left
/// once characters XML cannot represent are removed.
fn segment_text(pair: &ExtractedPair) -> Option<Cow<'_, str>> {
    let text = if pair.text.chars().all(is_xml_char) {
        Cow::Borrowed(pair.text.as_str())
    } else {
        Cow::Owned(pair.text.chars().filter(|&c| is_xml_char(c)).collect())
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// XML 1.0 `Char` production. Surrogates cannot occur in a Rust `char`.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
) -> Result<(), MangaTmxError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)?;
    Ok(())
}

fn xml_err(e: impl Display) -> MangaTmxError {
    MangaTmxError::Serialization(e.to_string())
}
