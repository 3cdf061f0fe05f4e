//! XML document tree
//!
//! A small namespace-aware element tree built with quick-xml. Schema
//! documents are parsed into this tree before the schema parser maps them
//! to components. Every element carries the full namespace context in scope
//! at that element, so QName-valued attributes can be resolved later.

use crate::error::{Error, Result};
use crate::namespaces::{NamespaceContext, QName};
use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// XML Element in the document tree
#[derive(Debug, Clone)]
pub struct Element {
    /// Element qualified name (namespace resolved)
    pub qname: QName,
    /// Element attributes, namespace declarations excluded
    pub attributes: IndexMap<QName, String>,
    /// Text content (if any)
    pub text: Option<String>,
    /// Child elements
    pub children: Vec<Element>,
    /// Namespace context in scope at this element
    pub namespaces: NamespaceContext,
}

impl Element {
    /// Create a new element
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            attributes: IndexMap::new(),
            text: None,
            children: Vec::new(),
            namespaces: NamespaceContext::new(),
        }
    }

    /// Get the local name of the element
    pub fn local_name(&self) -> &str {
        &self.qname.local_name
    }

    /// Get the namespace of the element
    pub fn namespace(&self) -> &str {
        &self.qname.namespace
    }

    /// Check the element's expanded name
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.qname.namespace == namespace && self.qname.local_name == local_name
    }

    /// Get an unqualified attribute value by local name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(&QName::local(name)).map(|s| s.as_str())
    }

    /// Get an attribute value by qualified name
    pub fn attribute_qname(&self, qname: &QName) -> Option<&str> {
        self.attributes.get(qname).map(|s| s.as_str())
    }

    /// Add a child element
    pub fn add_child(&mut self, child: Element) {
        self.children.push(child);
    }
}

/// XML Document representation
#[derive(Debug, Default)]
pub struct Document {
    /// Root element of the document
    pub root: Option<Element>,
}

impl Document {
    /// Create a new empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an XML document from a string
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes())
    }

    /// Parse an XML document from bytes
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut doc = Document::new();
        let mut element_stack: Vec<Element> = Vec::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let element = Self::parse_element(&e, element_stack.last())?;
                    element_stack.push(element);
                }
                Ok(Event::End(_)) => {
                    if let Some(current) = element_stack.pop() {
                        Self::attach(&mut doc, &mut element_stack, current)?;
                    }
                }
                Ok(Event::Empty(e)) => {
                    let element = Self::parse_element(&e, element_stack.last())?;
                    Self::attach(&mut doc, &mut element_stack, element)?;
                }
                Ok(Event::Text(e)) => {
                    if let Some(current) = element_stack.last_mut() {
                        let text = e
                            .unescape()
                            .map_err(|e| Error::Xml(format!("failed to unescape text: {}", e)))?;
                        if !text.trim().is_empty() {
                            current.text.get_or_insert_with(String::new).push_str(&text);
                        }
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(current) = element_stack.last_mut() {
                        let bytes = e.into_inner();
                        let text = String::from_utf8_lossy(&bytes);
                        current.text.get_or_insert_with(String::new).push_str(&text);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "error parsing XML at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {} // Comments, processing instructions, doctype
            }
            buf.clear();
        }

        if !element_stack.is_empty() {
            return Err(Error::Xml("unexpected end of document".to_string()));
        }

        Ok(doc)
    }

    fn attach(doc: &mut Document, stack: &mut [Element], element: Element) -> Result<()> {
        if let Some(parent) = stack.last_mut() {
            parent.add_child(element);
        } else if doc.root.is_some() {
            return Err(Error::Xml("document has more than one root element".to_string()));
        } else {
            doc.root = Some(element);
        }
        Ok(())
    }

    /// Parse element from BytesStart event, resolving names against the
    /// parent's namespace context
    fn parse_element(start: &BytesStart, parent: Option<&Element>) -> Result<Element> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| Error::Xml(format!("invalid element name: {}", e)))?
            .to_string();

        let mut namespaces = parent.map(|p| p.namespaces.clone()).unwrap_or_default();
        let mut raw_attributes = Vec::new();

        for attr_result in start.attributes() {
            let attr = attr_result
                .map_err(|e| Error::Xml(format!("failed to parse attribute: {}", e)))?;

            let attr_name = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| Error::Xml(format!("invalid attribute name: {}", e)))?
                .to_string();

            let attr_value = attr
                .unescape_value()
                .map_err(|e| Error::Xml(format!("failed to unescape attribute value: {}", e)))?
                .to_string();

            if attr_name == "xmlns" {
                namespaces.set_default_namespace(attr_value);
            } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
                namespaces.add_prefix(prefix, attr_value);
            } else {
                raw_attributes.push((attr_name, attr_value));
            }
        }

        let qname = namespaces
            .resolve(&name)
            .map_err(|e| Error::Xml(format!("element '{}': {}", name, e)))?;

        let mut element = Element::new(qname);
        for (attr_name, value) in raw_attributes {
            let attr_qname = if attr_name.contains(':') {
                namespaces
                    .resolve(&attr_name)
                    .map_err(|e| Error::Xml(format!("attribute '{}': {}", attr_name, e)))?
            } else {
                QName::local(attr_name)
            };
            element.attributes.insert(attr_qname, value);
        }
        element.namespaces = namespaces;

        Ok(element)
    }

    /// Get the root element
    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_xml() {
        let xml = r#"<root><child>text</child></root>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(root.local_name(), "root");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].local_name(), "child");
        assert_eq!(root.children[0].text.as_deref(), Some("text"));
    }

    #[test]
    fn test_parse_with_attributes() {
        let xml = r#"<root attr1="value1" attr2="value2"><child/></root>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(root.attribute("attr1"), Some("value1"));
        assert_eq!(root.attribute("attr2"), Some("value2"));
    }

    #[test]
    fn test_namespaces_are_resolved_and_inherited() {
        let xml = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns="urn:d">
            <xs:element name="a"><inner/></xs:element>
        </xs:schema>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert!(root.is(crate::namespaces::XSD_NAMESPACE, "schema"));
        let element = &root.children[0];
        assert_eq!(element.namespaces.get_namespace("xs"), Some(crate::namespaces::XSD_NAMESPACE));
        assert_eq!(element.children[0].qname, QName::new("urn:d", "inner"));
    }

    #[test]
    fn test_prefixed_attribute() {
        let xml = r#"<root xmlns:p="urn:p" p:flag="1"/>"#;
        let doc = Document::from_string(xml).unwrap();
        let root = doc.root.unwrap();
        assert_eq!(root.attribute_qname(&QName::new("urn:p", "flag")), Some("1"));
        assert_eq!(root.attribute("flag"), None);
    }

    #[test]
    fn test_unknown_prefix_fails() {
        assert!(Document::from_string("<p:root/>").is_err());
    }

    #[test]
    fn test_malformed_document_fails() {
        assert!(Document::from_string("<root><child></root>").is_err());
    }
}
