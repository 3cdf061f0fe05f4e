//! XML namespace handling
//!
//! This module provides qualified names (QNames) and the in-scope namespace
//! context used to resolve prefixed names found in schema documents.
//!
//! The empty string stands for "no namespace". It is a distinct value that
//! never compares equal to a non-empty URI.

use crate::error::{Error, Result};
use crate::XML_NAMESPACE;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// XSD 1.0 namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XML Schema Instance namespace
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Qualified name (QName) - combination of namespace and local name
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QName {
    /// Namespace URI (empty for no namespace)
    pub namespace: NamespaceUri,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self::new("", local_name)
    }

    /// Create a QName in the XSD namespace
    pub fn xsd(local_name: impl Into<String>) -> Self {
        Self::new(XSD_NAMESPACE, local_name)
    }

    /// The zero QName used for anonymous components
    pub fn zero() -> Self {
        Self::default()
    }

    /// Check if this is the zero QName
    pub fn is_zero(&self) -> bool {
        self.namespace.is_empty() && self.local_name.is_empty()
    }

    /// Check if the name has a namespace
    pub fn has_namespace(&self) -> bool {
        !self.namespace.is_empty()
    }

    /// Check if the name is in the XSD namespace
    pub fn is_xsd(&self) -> bool {
        self.namespace == XSD_NAMESPACE
    }

    /// Copy of this name moved into another namespace
    pub fn with_namespace(&self, namespace: &str) -> Self {
        Self::new(namespace, self.local_name.clone())
    }

    /// Rewrite an empty namespace to `namespace` (chameleon remapping)
    pub fn remap_empty(&mut self, namespace: &str) {
        if self.namespace.is_empty() && !self.local_name.is_empty() {
            self.namespace = namespace.to_string();
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local_name)
        }
    }
}

/// Namespace context for resolving prefixes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceContext {
    /// Mapping from prefix to namespace URI
    prefixes: HashMap<Prefix, NamespaceUri>,
    /// Default namespace (no prefix)
    default_namespace: Option<NamespaceUri>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Set the default namespace; an empty URI undeclares it
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        let namespace = namespace.into();
        self.default_namespace = if namespace.is_empty() {
            None
        } else {
            Some(namespace)
        };
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Check if a prefix is declared
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.get_namespace(prefix).is_some()
    }

    /// Resolve a prefixed name to a QName; unprefixed names take the
    /// default namespace
    pub fn resolve(&self, prefixed_name: &str) -> Result<QName> {
        let prefixed_name = prefixed_name.trim();
        if let Some((prefix, local)) = prefixed_name.split_once(':') {
            let namespace = self
                .get_namespace(prefix)
                .ok_or_else(|| Error::Namespace(format!("unknown prefix '{}'", prefix)))?;
            Ok(QName::new(namespace, local))
        } else {
            Ok(QName::new(
                self.default_namespace.clone().unwrap_or_default(),
                prefixed_name,
            ))
        }
    }

    /// Resolve a prefixed name where unprefixed names are in no namespace
    /// (XPath 1.0 name tests)
    pub fn resolve_unprefixed_as_local(&self, prefixed_name: &str) -> Result<QName> {
        if prefixed_name.contains(':') {
            self.resolve(prefixed_name)
        } else {
            Ok(QName::local(prefixed_name.trim()))
        }
    }
}
