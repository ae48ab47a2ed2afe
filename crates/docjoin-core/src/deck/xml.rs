//! Owned XML element tree
//!
//! Slide parts are parsed into plain owned values, so cloning a tree yields a
//! copy that shares nothing with its source. Names are kept as written
//! (`p:sp`, `a:t`); namespace handling is limited to prefix lookup.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::DocJoinError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Parse a complete document and return its root element.
    pub fn parse(bytes: &[u8]) -> Result<Self, DocJoinError> {
        let text = std::str::from_utf8(bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes))
            .map_err(|e| DocJoinError::ParseError(format!("XML is not UTF-8: {}", e)))?;

        let mut reader = Reader::from_str(text);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                DocJoinError::ParseError(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            })?;

            match event {
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| DocJoinError::ParseError("Unbalanced XML end tag".into()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = text
                            .unescape()
                            .map_err(|e| DocJoinError::ParseError(format!("XML text: {}", e)))?;
                        parent.children.push(XmlNode::Text(text.into_owned()));
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let data = String::from_utf8_lossy(&data.into_inner()).into_owned();
                        parent.children.push(XmlNode::CData(data));
                    }
                }
                Event::Eof => break,
                // Declarations, comments and processing instructions are not kept.
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(DocJoinError::ParseError("Unclosed XML element".into()));
        }
        root.ok_or_else(|| DocJoinError::ParseError("XML document has no root element".into()))
    }

    /// Serialize as a standalone document with an XML declaration.
    pub fn to_document_bytes(&self) -> Vec<u8> {
        let mut out =
            String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n");
        self.write_into(&mut out);
        out.into_bytes()
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlNode::Element(element) => element.write_into(out),
                XmlNode::Text(text) => out.push_str(&escape(text.as_str())),
                XmlNode::CData(data) => {
                    out.push_str("<![CDATA[");
                    out.push_str(data);
                    out.push_str("]]>");
                }
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Local part of the element name (`sp` for `p:sp`).
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    /// First direct child with the given qualified name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|e| e.name == name)
    }

    /// Follow a path of qualified names through direct children.
    pub fn find_path(&self, path: &[&str]) -> Option<&XmlElement> {
        path.iter().try_fold(self, |node, name| node.child(name))
    }

    pub fn find_path_mut(&mut self, path: &[&str]) -> Option<&mut XmlElement> {
        let mut node = self;
        for name in path {
            node = node.child_mut(name)?;
        }
        Some(node)
    }

    /// Depth-first search over this element and its descendants.
    pub fn find_descendant(&self, name: &str) -> Option<&XmlElement> {
        if self.name == name {
            return Some(self);
        }
        self.elements().find_map(|e| e.find_descendant(name))
    }

    /// Visit this element and every descendant element, pre-order.
    pub fn walk_mut<E>(
        &mut self,
        visit: &mut impl FnMut(&mut XmlElement) -> Result<(), E>,
    ) -> Result<(), E> {
        visit(self)?;
        for child in self.elements_mut() {
            child.walk_mut(visit)?;
        }
        Ok(())
    }

    pub fn walk(&self, visit: &mut impl FnMut(&XmlElement)) {
        visit(self);
        for child in self.elements() {
            child.walk(visit);
        }
    }

    /// Concatenated character data of this element and its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Element(element) => element.collect_text(out),
                XmlNode::Text(text) | XmlNode::CData(text) => out.push_str(text),
            }
        }
    }

    /// Replace the character data of this element with `text`.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.retain(|c| matches!(c, XmlNode::Element(_)));
        self.children.push(XmlNode::Text(text.into()));
    }

    /// Prefixes bound to `namespace` anywhere in this tree.
    pub fn prefixes_for(&self, namespace: &str) -> Vec<String> {
        let mut prefixes = Vec::new();
        self.walk(&mut |element| {
            for (key, value) in &element.attributes {
                if let Some(prefix) = key.strip_prefix("xmlns:") {
                    if value == namespace && !prefixes.iter().any(|p| p == prefix) {
                        prefixes.push(prefix.to_string());
                    }
                }
            }
        });
        prefixes
    }
}

pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, DocJoinError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = XmlElement::new(name);

    for attr in start.attributes() {
        let attr = attr.map_err(|e| DocJoinError::ParseError(format!("XML attribute: {}", e)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| DocJoinError::ParseError(format!("XML attribute '{}': {}", key, e)))?
            .into_owned();
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), DocJoinError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(DocJoinError::ParseError(
                "XML document has more than one root element".into(),
            ))
        }
    }
    Ok(())
}
