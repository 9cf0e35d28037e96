//! Stable XML serialization.
//!
//! Output always starts with an XML declaration, followed by the doctype when
//! the document carries one. Elements are indented, attributes are written in
//! construction order, and childless elements without text are self-closed.
//! The output re-parses to a structurally equal document.

use std::io::Write;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{MergeResult, document_error};
use crate::types::{Document, NodeRef};

pub const DEFAULT_INDENT: usize = 2;

/// Serialize into a `String`.
pub fn to_xml_string(doc: &Document, indent: usize) -> MergeResult<String> {
    let mut buffer = Vec::new();
    write_document(doc, &mut buffer, indent)?;
    String::from_utf8(buffer).map_err(document_error)
}

/// Serialize into any writer. An `indent` of zero disables pretty-printing.
pub fn write_document<W: Write>(doc: &Document, out: W, indent: usize) -> MergeResult<()> {
    let mut writer = if indent > 0 {
        Writer::new_with_indent(out, b' ', indent)
    } else {
        Writer::new(out)
    };

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(document_error)?;
    if let Some(doctype) = doc.doctype() {
        writer
            .write_event(Event::DocType(BytesText::from_escaped(doctype)))
            .map_err(document_error)?;
    }
    write_element(&mut writer, doc.root())?;
    writer.get_mut().write_all(b"\n").map_err(document_error)?;
    writer.get_mut().flush().map_err(document_error)
}

fn write_element<W: Write>(writer: &mut Writer<W>, node: NodeRef<'_>) -> MergeResult<()> {
    let mut start = BytesStart::new(node.tag());
    for (name, value) in node.attributes() {
        start.push_attribute((name, value));
    }

    if node.child_count() == 0 && node.text().is_none() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(document_error);
    }

    writer
        .write_event(Event::Start(start))
        .map_err(document_error)?;
    if let Some(text) = node.text() {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(document_error)?;
    }
    for child in node.children() {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(node.tag())))
        .map_err(document_error)
}
