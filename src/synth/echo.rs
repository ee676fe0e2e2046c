//! Lexical echo strategy
//!
//! Re-emits the tag skeleton of any well-formed XML text: every element keeps its
//! bare local name, attributes are dropped, character data passes through verbatim.
//! No schema semantics are involved, so the input does not have to be a schema.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use super::writer::DocumentWriter;
use super::SyntheticDocument;
use crate::error::{Result, XsdError};

/// Echo the tag structure of `raw_text` as a new document
pub fn synthesize_from_tags(raw_text: &str) -> Result<SyntheticDocument> {
    let mut reader = Reader::from_str(raw_text);
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = true;

    // Layout comes from the echoed text itself
    let mut out = DocumentWriter::new(0);
    let mut stack: Vec<String> = Vec::new();
    let mut seen_root = false;

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader.read_event().map_err(|e| XsdError::MalformedXml {
            position: reader.error_position() as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(e) => {
                if stack.is_empty() && seen_root {
                    return Err(malformed(position, "content after the root element"));
                }
                let name = local_name(e.local_name().as_ref());
                out.open(BytesStart::new(name.clone()))?;
                stack.push(name);
                seen_root = true;
            }
            Event::Empty(e) => {
                if stack.is_empty() && seen_root {
                    return Err(malformed(position, "content after the root element"));
                }
                let name = local_name(e.local_name().as_ref());
                out.open(BytesStart::new(name.clone()))?;
                out.close(&name)?;
                seen_root = true;
            }
            Event::End(e) => {
                let name = local_name(e.local_name().as_ref());
                match stack.pop() {
                    Some(open) if open == name => out.close(&name)?,
                    Some(open) => {
                        return Err(malformed(
                            position,
                            format!("expected </{}>, found </{}>", open, name),
                        ))
                    }
                    None => return Err(malformed(position, format!("unexpected </{}>", name))),
                }
            }
            Event::Text(e) => {
                if !stack.is_empty() {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    out.escaped_text(&text)?;
                }
            }
            Event::CData(e) => {
                if !stack.is_empty() {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    out.cdata(&text)?;
                }
            }
            Event::Eof => break,
            // comments, processing instructions, declarations, doctypes
            _ => {}
        }
    }

    let end = reader.buffer_position() as u64;
    if let Some(open) = stack.last() {
        return Err(malformed(end, format!("unclosed element <{}>", open)));
    }
    if !seen_root {
        return Err(malformed(end, "no root element"));
    }

    let document = out.finish()?;
    debug!(
        events = document.events.len(),
        bytes = document.xml.len(),
        "lexical echo complete"
    );
    Ok(document)
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn malformed(position: u64, message: impl Into<String>) -> XsdError {
    XsdError::MalformedXml {
        position,
        message: message.into(),
    }
}
