//! RTL layout fix-up for generated DOCX artifacts.
//!
//! Conversion engines tend to emit Arabic documents as left-aligned
//! paragraphs of disconnected base letters. This post-processor rewrites
//! `word/document.xml` inside the DOCX container so that
//!
//! 1. every paragraph carries `<w:jc w:val="right"/>` in its properties
//!    (synthesized when the paragraph has none, replacing any existing
//!    alignment), and
//! 2. Arabic text runs are reshaped into presentation forms
//!    (see [`reshape`]).
//!
//! The whole step is cosmetic and best-effort: a run that cannot be decoded
//! is skipped, and if the container cannot be processed at all the
//! conversion stands — callers log the failure and keep the unprocessed
//! artifact. The one guarantee on success is right alignment on every
//! paragraph, whether or not reshaping succeeded for its runs.

pub mod reshape;

use std::io::{Cursor, Read, Write};
use std::path::Path;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;

use crate::error::{Result, TahweelError};

const DOCUMENT_XML: &str = "word/document.xml";

/// What to do when reshaping an individual text run fails.
///
/// The source behavior is `PerRun` (skip the run, keep going), but whether
/// partially-reshaped output is acceptable is a product question, so it is a
/// policy rather than a constant: `WholeDocument` drops reshaping entirely
/// on the first failure and keeps alignment only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReshapePolicy {
    #[default]
    PerRun,
    WholeDocument,
    Off,
}

/// Engine-agnostic DOCX normalization step.
pub struct RtlPostProcessor {
    policy: ReshapePolicy,
}

impl RtlPostProcessor {
    pub fn new(policy: ReshapePolicy) -> Self {
        Self { policy }
    }

    /// Rewrite the DOCX at `path` in place.
    pub async fn apply(&self, path: &Path) -> Result<()> {
        let bytes = tokio::fs::read(path).await?;
        let rewritten = self.rewrite_container(&bytes)?;
        tokio::fs::write(path, rewritten).await?;
        Ok(())
    }

    /// Rewrite the container bytes: `word/document.xml` is transformed, all
    /// other entries are copied through untouched.
    pub fn rewrite_container(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| TahweelError::post_process(format!("not a DOCX container: {}", e)))?;

        let mut document_xml = None;
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| TahweelError::post_process(format!("unreadable entry: {}", e)))?;
            if entry.name() == DOCUMENT_XML {
                let mut xml = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut xml)?;
                document_xml = Some(xml);
                break;
            }
        }
        let document_xml = document_xml
            .ok_or_else(|| TahweelError::post_process("container has no word/document.xml"))?;

        let transformed = self.transform_document(&document_xml)?;

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for i in 0..archive.len() {
            let entry_name = archive
                .by_index_raw(i)
                .map_err(|e| TahweelError::post_process(format!("unreadable entry: {}", e)))?
                .name()
                .to_string();

            if entry_name == DOCUMENT_XML {
                writer
                    .start_file(DOCUMENT_XML, SimpleFileOptions::default())
                    .map_err(|e| TahweelError::post_process(format!("zip write failed: {}", e)))?;
                writer.write_all(&transformed)?;
            } else {
                let entry = archive
                    .by_index_raw(i)
                    .map_err(|e| TahweelError::post_process(format!("unreadable entry: {}", e)))?;
                writer
                    .raw_copy_file(entry)
                    .map_err(|e| TahweelError::post_process(format!("zip copy failed: {}", e)))?;
            }
        }

        let cursor = writer
            .finish()
            .map_err(|e| TahweelError::post_process(format!("zip finish failed: {}", e)))?;
        Ok(cursor.into_inner())
    }

    fn transform_document(&self, xml: &[u8]) -> Result<Vec<u8>> {
        match self.policy {
            ReshapePolicy::Off => rewrite_xml(xml, false, false),
            ReshapePolicy::PerRun => rewrite_xml(xml, true, false),
            ReshapePolicy::WholeDocument => match rewrite_xml(xml, true, true) {
                Ok(out) => Ok(out),
                Err(e) => {
                    tracing::warn!("reshaping failed, keeping alignment only: {}", e);
                    rewrite_xml(xml, false, false)
                }
            },
        }
    }
}

fn xml_error<E: std::fmt::Display>(e: E) -> TahweelError {
    TahweelError::post_process(format!("document.xml rewrite failed: {}", e))
}

/// Stream `document.xml`, forcing right alignment on every paragraph and
/// optionally reshaping run text.
///
/// With `strict` set, a run that fails to decode aborts the rewrite (used by
/// the whole-document policy to fall back to alignment only); otherwise the
/// run is carried through unshaped.
fn rewrite_xml(xml: &[u8], reshape_runs: bool, strict: bool) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();

    // Just wrote a <w:p> start and still owe the paragraph its properties.
    let mut pending_paragraph = false;
    // Inside <w:pPr>: existing <w:jc> elements are dropped here and ours is
    // emitted right before the close tag.
    let mut in_ppr = false;
    let mut skipping_jc = false;
    // Inside <w:t>: text events are candidates for reshaping.
    let mut in_text_run = false;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(xml_error)?;

        if pending_paragraph {
            match &event {
                Event::Start(e) if e.name().as_ref() == b"w:pPr" => {
                    writer.write_event(event.borrow()).map_err(xml_error)?;
                    in_ppr = true;
                    pending_paragraph = false;
                    buf.clear();
                    continue;
                }
                Event::Text(t) if t.iter().all(u8::is_ascii_whitespace) => {
                    // Formatting whitespace; the real first child is next.
                    writer.write_event(event.borrow()).map_err(xml_error)?;
                    buf.clear();
                    continue;
                }
                _ => {
                    write_ppr_block(&mut writer)?;
                    pending_paragraph = false;
                }
            }
        }

        if skipping_jc {
            if let Event::End(e) = &event {
                if e.name().as_ref() == b"w:jc" {
                    skipping_jc = false;
                }
            }
            buf.clear();
            continue;
        }

        if in_ppr {
            match &event {
                Event::Empty(e) if e.name().as_ref() == b"w:jc" => {
                    buf.clear();
                    continue;
                }
                Event::Start(e) if e.name().as_ref() == b"w:jc" => {
                    skipping_jc = true;
                    buf.clear();
                    continue;
                }
                Event::End(e) if e.name().as_ref() == b"w:pPr" => {
                    writer
                        .write_event(Event::Empty(jc_right()))
                        .map_err(xml_error)?;
                    writer.write_event(event.borrow()).map_err(xml_error)?;
                    in_ppr = false;
                    buf.clear();
                    continue;
                }
                _ => {}
            }
        }

        match event {
            Event::Eof => break,
            Event::Start(ref e) if e.name().as_ref() == b"w:p" => {
                writer.write_event(event.borrow()).map_err(xml_error)?;
                pending_paragraph = true;
            }
            Event::Empty(ref e) if e.name().as_ref() == b"w:p" => {
                // An empty paragraph still gets right alignment.
                let start = e.clone().into_owned();
                writer
                    .write_event(Event::Start(start))
                    .map_err(xml_error)?;
                write_ppr_block(&mut writer)?;
                writer
                    .write_event(Event::End(BytesEnd::new("w:p")))
                    .map_err(xml_error)?;
            }
            Event::Start(ref e) if e.name().as_ref() == b"w:t" => {
                writer.write_event(event.borrow()).map_err(xml_error)?;
                in_text_run = true;
            }
            Event::End(ref e) if e.name().as_ref() == b"w:t" => {
                writer.write_event(event.borrow()).map_err(xml_error)?;
                in_text_run = false;
            }
            Event::Text(ref t) if in_text_run && reshape_runs => {
                match t.decode() {
                    Ok(text) => {
                        if reshape::contains_arabic(&text) {
                            let shaped = reshape::reshape_text(&text);
                            writer
                                .write_event(Event::Text(BytesText::new(&shaped)))
                                .map_err(xml_error)?;
                        } else {
                            writer.write_event(event.borrow()).map_err(xml_error)?;
                        }
                    }
                    Err(e) if strict => {
                        return Err(TahweelError::post_process(format!(
                            "undecodable text run: {}",
                            e
                        )));
                    }
                    Err(e) => {
                        // Skip this run's reshaping, keep the original bytes.
                        tracing::debug!("skipping undecodable text run: {}", e);
                        writer.write_event(event.borrow()).map_err(xml_error)?;
                    }
                }
            }
            ref other => {
                writer.write_event(other.borrow()).map_err(xml_error)?;
            }
        }

        buf.clear();
    }

    Ok(writer.into_inner().into_inner())
}

fn write_ppr_block(writer: &mut Writer<Cursor<Vec<u8>>>) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("w:pPr")))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Empty(jc_right()))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("w:pPr")))
        .map_err(xml_error)?;
    Ok(())
}

fn jc_right() -> BytesStart<'static> {
    let mut jc = BytesStart::new("w:jc");
    jc.push_attribute(("w:val", "right"));
    jc
}
