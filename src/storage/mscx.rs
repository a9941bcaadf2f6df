//! MuseScore (`.mscx`) file format
//!
//! Files are read with `roxmltree` into an owned [`Element`] tree and written
//! back with `quick-xml`. Comments, processing instructions and
//! whitespace-only text are not kept; everything else round-trips.

use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use crate::domain::{Element, Node, ScoreDocument, ScoreError};

#[derive(Debug, Error)]
pub enum MscxError {
    #[error("Malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Not a score document: {0}")]
    Score(#[from] ScoreError),

    #[error("Failed to write XML: {0}")]
    Write(#[from] quick_xml::Error),

    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parses an XML string into an element tree
pub fn parse_element(xml: &str) -> Result<Element, MscxError> {
    let doc = roxmltree::Document::parse(xml)?;
    Ok(convert(doc.root_element()))
}

/// Parses a score document from a string
pub fn parse_str(xml: &str) -> Result<ScoreDocument, MscxError> {
    Ok(ScoreDocument::new(parse_element(xml)?)?)
}

/// Reads and parses a score file
pub fn read_file(path: &Path) -> Result<ScoreDocument, MscxError> {
    Ok(ScoreDocument::new(read_element(path)?)?)
}

/// Reads any well-formed XML file into an element tree, score or not
pub fn read_element(path: &Path) -> Result<Element, MscxError> {
    let xml = fs::read_to_string(path).map_err(|source| MscxError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_element(&xml)
}

/// Serializes a score document, with an XML declaration and two-space indent
pub fn to_string(doc: &ScoreDocument) -> Result<String, MscxError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_element(&mut writer, doc.root())?;

    let mut xml = String::from_utf8_lossy(&writer.into_inner()).into_owned();
    xml.push('\n');
    Ok(xml)
}

/// Writes a score document to a file
pub fn write_file(path: &Path, doc: &ScoreDocument) -> Result<(), MscxError> {
    let xml = to_string(doc)?;
    fs::write(path, xml).map_err(|source| MscxError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn convert(node: roxmltree::Node<'_, '_>) -> Element {
    let mut element = Element::new(node.tag_name().name());
    for attr in node.attributes() {
        element
            .attributes
            .push((attr.name().to_string(), attr.value().to_string()));
    }

    for child in node.children() {
        if child.is_element() {
            element.children.push(Node::Element(convert(child)));
        } else if child.is_text() {
            let text = child.text().unwrap_or_default();
            if !text.trim().is_empty() {
                element.children.push(Node::Text(text.to_string()));
            }
        }
    }
    element
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), MscxError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}
