//! XML parsing into the document arena.
//!
//! Events from `quick-xml` are folded into a [`Document`]: start and empty
//! tags become elements, text and CDATA segments are concatenated into the
//! text of the enclosing element (trimmed), and the doctype body is kept.
//! Comments, processing instructions, and the XML declaration are dropped.
//!
//! Byte input is decoded before parsing: a byte-order mark wins, then the
//! `encoding` of the XML declaration, then UTF-8.

use std::borrow::Cow;
use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{MergeError, MergeResult};
use crate::types::{Document, NodeId};

/// Parse XML text. `source_name` identifies the input in error messages.
pub fn parse_str(source_name: &str, text: &str) -> MergeResult<Document> {
    let mut reader = Reader::from_str(text);
    let mut builder = TreeBuilder::default();

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|e| parse_error(source_name, format!("at byte {position}: {e}")))?;

        match event {
            Event::Start(start) => {
                let id = builder.open(source_name, &start)?;
                builder.stack.push((id, String::new()));
            }
            Event::Empty(start) => {
                builder.open(source_name, &start)?;
            }
            Event::End(_) => builder.close(source_name)?,
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| parse_error(source_name, e.to_string()))?;
                builder.push_text(source_name, &text)?;
            }
            Event::CData(data) => {
                let text = std::str::from_utf8(&data)
                    .map_err(|e| parse_error(source_name, e.to_string()))?;
                builder.push_text(source_name, text)?;
            }
            Event::DocType(doctype) => {
                builder.doctype = Some(String::from_utf8_lossy(&doctype).trim().to_string());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    builder.finish(source_name)
}

/// Parse raw XML bytes in whatever encoding they declare.
pub fn parse_bytes(source_name: &str, bytes: &[u8]) -> MergeResult<Document> {
    let text = decode(source_name, bytes)?;
    parse_str(source_name, &text)
}

/// Read and parse a file. The path names the input in errors.
pub fn parse_file(path: &Path) -> MergeResult<Document> {
    let bytes = std::fs::read(path).map_err(|source| MergeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_bytes(&path.display().to_string(), &bytes)
}

fn decode<'b>(source_name: &str, bytes: &'b [u8]) -> MergeResult<Cow<'b, str>> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom)) => (encoding, &bytes[bom..]),
        None => (declared_encoding(source_name, bytes)?, bytes),
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| parse_error(source_name, format!("content is not valid {}", encoding.name())))
}

fn declared_encoding(source_name: &str, bytes: &[u8]) -> MergeResult<&'static Encoding> {
    let mut reader = Reader::from_reader(bytes);
    let Ok(Event::Decl(decl)) = reader.read_event() else {
        return Ok(UTF_8);
    };
    match decl.encoding() {
        Some(Ok(label)) => Encoding::for_label(&label).ok_or_else(|| {
            parse_error(
                source_name,
                format!("unsupported encoding \"{}\"", String::from_utf8_lossy(&label)),
            )
        }),
        Some(Err(e)) => Err(parse_error(source_name, e.to_string())),
        None => Ok(UTF_8),
    }
}

#[derive(Default)]
struct TreeBuilder {
    doc: Option<Document>,
    doctype: Option<String>,
    /// Open elements with the text collected for each so far.
    stack: Vec<(NodeId, String)>,
}

impl TreeBuilder {
    fn open(&mut self, source_name: &str, start: &BytesStart<'_>) -> MergeResult<NodeId> {
        let tag = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| parse_error(source_name, e.to_string()))?
            .to_string();
        let parent = self.stack.last().map(|(id, _)| *id);

        let (doc, id) = match self.doc {
            None => {
                let doc = self.doc.insert(Document::new(tag));
                let id = doc.root_id();
                (doc, id)
            }
            Some(ref mut doc) => {
                let parent = parent.ok_or_else(|| {
                    parse_error(source_name, format!("second root element <{tag}>"))
                })?;
                let id = doc.append_element(parent, tag);
                (doc, id)
            }
        };

        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| parse_error(source_name, e.to_string()))?;
            let name = std::str::from_utf8(attribute.key.as_ref())
                .map_err(|e| parse_error(source_name, e.to_string()))?;
            let value = attribute
                .unescape_value()
                .map_err(|e| parse_error(source_name, e.to_string()))?;
            doc.set_attribute(id, name, value.into_owned());
        }

        Ok(id)
    }

    fn close(&mut self, source_name: &str) -> MergeResult<()> {
        let (id, text) = self
            .stack
            .pop()
            .ok_or_else(|| parse_error(source_name, "unexpected closing tag"))?;
        if let Some(doc) = self.doc.as_mut() {
            doc.set_text(id, Some(text.trim().to_string()));
        }
        Ok(())
    }

    fn push_text(&mut self, source_name: &str, text: &str) -> MergeResult<()> {
        match self.stack.last_mut() {
            Some((_, buffer)) => {
                buffer.push_str(text);
                Ok(())
            }
            None if text.trim().is_empty() => Ok(()),
            None => Err(parse_error(source_name, "text outside of the root element")),
        }
    }

    fn finish(self, source_name: &str) -> MergeResult<Document> {
        if let Some((id, _)) = self.stack.last() {
            let tag = self
                .doc
                .as_ref()
                .map(|doc| doc.node(*id).tag().to_string())
                .unwrap_or_default();
            return Err(parse_error(source_name, format!("unclosed element <{tag}>")));
        }
        let mut doc = self
            .doc
            .ok_or_else(|| parse_error(source_name, "no root element"))?;
        doc.set_doctype(self.doctype);
        Ok(doc)
    }
}

fn parse_error(source_name: &str, message: impl Into<String>) -> MergeError {
    MergeError::Parse {
        source_name: source_name.to_string(),
        message: message.into(),
    }
}
