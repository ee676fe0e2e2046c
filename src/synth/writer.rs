//! Event-recording XML writer shared by both synthesis strategies

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use super::{SyntheticDocument, TagEvent};
use crate::error::{Result, XsdError};

pub(crate) struct DocumentWriter {
    writer: Writer<Cursor<Vec<u8>>>,
    events: Vec<TagEvent>,
}

impl DocumentWriter {
    /// `indent` spaces per level; 0 writes events back to back
    pub(crate) fn new(indent: usize) -> Self {
        let sink = Cursor::new(Vec::new());
        let writer = if indent == 0 {
            Writer::new(sink)
        } else {
            Writer::new_with_indent(sink, b' ', indent)
        };
        Self {
            writer,
            events: Vec::new(),
        }
    }

    pub(crate) fn declaration(&mut self) -> Result<()> {
        self.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    pub(crate) fn open(&mut self, start: BytesStart<'_>) -> Result<()> {
        let name = tag_name(&start);
        self.write(Event::Start(start))?;
        self.events.push(TagEvent::Open(name));
        Ok(())
    }

    /// Self-closing element, recorded as an open immediately followed by a close
    pub(crate) fn empty(&mut self, start: BytesStart<'_>) -> Result<()> {
        let name = tag_name(&start);
        self.write(Event::Empty(start))?;
        self.events.push(TagEvent::Open(name.clone()));
        self.events.push(TagEvent::Close(name));
        Ok(())
    }

    /// Unescaped text, escaped on write
    pub(crate) fn text(&mut self, content: &str) -> Result<()> {
        self.write(Event::Text(BytesText::new(content)))?;
        self.events.push(TagEvent::Text(content.to_string()));
        Ok(())
    }

    /// Text already in escaped form, written as-is
    pub(crate) fn escaped_text(&mut self, content: &str) -> Result<()> {
        self.write(Event::Text(BytesText::from_escaped(content)))?;
        self.events.push(TagEvent::Text(content.to_string()));
        Ok(())
    }

    pub(crate) fn cdata(&mut self, content: &str) -> Result<()> {
        self.write(Event::CData(BytesCData::new(content)))?;
        self.events.push(TagEvent::Text(content.to_string()));
        Ok(())
    }

    pub(crate) fn close(&mut self, name: &str) -> Result<()> {
        self.write(Event::End(BytesEnd::new(name)))?;
        self.events.push(TagEvent::Close(name.to_string()));
        Ok(())
    }

    pub(crate) fn finish(self) -> Result<SyntheticDocument> {
        let bytes = self.writer.into_inner().into_inner();
        let xml = String::from_utf8(bytes)
            .map_err(|e| XsdError::synthesis(format!("generated document is not UTF-8: {}", e)))?;
        Ok(SyntheticDocument {
            xml,
            events: self.events,
        })
    }

    fn write(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| XsdError::synthesis(e.to_string()))
    }
}

fn tag_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}
