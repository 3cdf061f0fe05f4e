//! XSD Identity Constraints
//!
//! This module implements identity constraint definitions for XML Schema:
//! - xs:unique - Ensures values are unique within scope
//! - xs:key - Like unique, but all field values must be present
//! - xs:keyref - References a key/unique constraint (foreign key)
//!
//! Selector and field expressions are kept as written together with the
//! namespace context of their declaration; the restricted XPath module
//! parses them.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#cIdentity-constraint_Definitions

use std::fmt;

use crate::namespaces::{NamespaceContext, QName};

use super::globals::NamespaceRemap;

/// Identity constraint category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum IdentityKind {
    /// xs:unique
    Unique,
    /// xs:key
    Key,
    /// xs:keyref
    Keyref,
}

impl IdentityKind {
    /// Parse from an XSD element local name
    pub fn from_local_name(name: &str) -> Option<Self> {
        match name {
            "unique" => Some(Self::Unique),
            "key" => Some(Self::Key),
            "keyref" => Some(Self::Keyref),
            _ => None,
        }
    }

    /// Printable name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unique => "unique",
            Self::Key => "key",
            Self::Keyref => "keyref",
        }
    }
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// XSD identity constraint definition
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityConstraint {
    /// Constraint name, in the target namespace of its schema document
    pub name: QName,
    /// Category
    pub kind: IdentityKind,
    /// Selector XPath as written
    pub selector: String,
    /// Field XPaths as written
    pub fields: Vec<String>,
    /// Referenced key or unique constraint (keyref)
    pub refer: Option<QName>,
    /// Namespace declarations in scope of the definition
    pub namespaces: NamespaceContext,
    /// System id of the declaring document and the constraint's position
    /// in it; copies of one declaration share it
    pub declared_at: Option<(String, usize)>,
}

impl IdentityConstraint {
    /// Create a constraint without fields
    pub fn new(name: QName, kind: IdentityKind, selector: impl Into<String>) -> Self {
        Self {
            name,
            kind,
            selector: selector.into(),
            fields: Vec::new(),
            refer: None,
            namespaces: NamespaceContext::new(),
            declared_at: None,
        }
    }

    /// Add a field
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Set the referenced constraint
    pub fn with_refer(mut self, refer: QName) -> Self {
        self.refer = Some(refer);
        self
    }

    /// Set the namespace context
    pub fn with_namespaces(mut self, namespaces: NamespaceContext) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Set where the constraint was declared
    pub fn declared_at(mut self, system_id: impl Into<String>, position: usize) -> Self {
        self.declared_at = Some((system_id.into(), position));
        self
    }

    /// Check if both are copies of one declaration
    ///
    /// Constraints without a declaration site compare by content.
    pub fn same_declaration(&self, other: &Self) -> bool {
        match (&self.declared_at, &other.declared_at) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self == other,
            _ => false,
        }
    }
}

impl NamespaceRemap for IdentityConstraint {
    fn remap_namespace(&mut self, namespace: &str) {
        self.name.remap_namespace(namespace);
        self.refer.remap_namespace(namespace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_declaration() {
        let key = IdentityConstraint::new(QName::local("k"), IdentityKind::Key, "item")
            .with_field("@id");
        let first = key.clone().declared_at("mem:/a.xsd", 0);
        let second = key.clone().declared_at("mem:/a.xsd", 1);

        assert!(first.same_declaration(&first.clone()));
        assert!(!first.same_declaration(&second));
        assert!(key.same_declaration(&key.clone()));
        assert!(!key.same_declaration(&first));
    }

    #[test]
    fn test_identity_kind() {
        assert_eq!(IdentityKind::from_local_name("keyref"), Some(IdentityKind::Keyref));
        assert_eq!(IdentityKind::from_local_name("selector"), None);
        assert_eq!(IdentityKind::Unique.to_string(), "unique");
    }

    #[test]
    fn test_constraint_builder() {
        let c = IdentityConstraint::new(QName::local("partRef"), IdentityKind::Keyref, "part")
            .with_field("@ref")
            .with_refer(QName::local("partKey"));
        assert_eq!(c.fields, vec!["@ref"]);
        assert_eq!(c.refer, Some(QName::local("partKey")));
    }

    #[test]
    fn test_remap() {
        let mut c = IdentityConstraint::new(QName::local("k"), IdentityKind::Keyref, ".")
            .with_refer(QName::local("other"));
        c.remap_namespace("urn:z");
        assert_eq!(c.name.namespace, "urn:z");
        assert_eq!(c.refer, Some(QName::new("urn:z", "other")));
    }
}
