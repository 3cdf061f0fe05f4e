//! XSD Attribute declarations and attribute groups
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#cAttribute_Declarations

use std::fmt;

use crate::namespaces::QName;

use super::elements::Scope;
use super::globals::{NamespaceRemap, TypeId, TypeRef};
use super::schemas::Form;
use super::wildcards::Wildcard;

/// Attribute use mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttributeUse {
    /// Attribute is optional (default)
    #[default]
    Optional,
    /// Attribute is required
    Required,
    /// Attribute is prohibited
    Prohibited,
}

impl AttributeUse {
    /// Parse from string attribute value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "optional" => Some(Self::Optional),
            "required" => Some(Self::Required),
            "prohibited" => Some(Self::Prohibited),
            _ => None,
        }
    }

    /// Printable name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optional => "optional",
            Self::Required => "required",
            Self::Prohibited => "prohibited",
        }
    }
}

impl fmt::Display for AttributeUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// XSD Attribute declaration or attribute use
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDecl {
    /// Attribute name, in the target namespace of its schema document
    pub name: QName,
    /// Attribute type (`xs:anySimpleType` when not given)
    pub type_ref: TypeRef,
    /// Use mode
    pub use_mode: AttributeUse,
    /// Default value
    pub default: Option<String>,
    /// Fixed value
    pub fixed: Option<String>,
    /// Explicit or merge-bound form
    pub form: Option<Form>,
    /// Global or local
    pub scope: Scope,
    /// Whether this use was written as `<attribute ref="..."/>`
    pub reference: bool,
    /// Target namespace of the schema the declaration was imported from
    pub source_namespace: Option<String>,
}

impl AttributeDecl {
    /// Create a declaration of type `xs:anySimpleType`
    pub fn new(name: QName, scope: Scope) -> Self {
        Self {
            name,
            type_ref: TypeRef::any_simple_type(),
            use_mode: AttributeUse::Optional,
            default: None,
            fixed: None,
            form: None,
            scope,
            reference: false,
            source_namespace: None,
        }
    }

    /// Create a reference to a global attribute
    pub fn reference(name: QName) -> Self {
        let mut decl = Self::new(name, Scope::Local);
        decl.reference = true;
        decl
    }

    /// Set the type
    pub fn with_type(mut self, type_ref: TypeRef) -> Self {
        self.type_ref = type_ref;
        self
    }

    /// Set the use mode
    pub fn with_use(mut self, use_mode: AttributeUse) -> Self {
        self.use_mode = use_mode;
        self
    }

    /// Resolved type handle
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_ref.id()
    }

    /// Check for `use="prohibited"`
    pub fn is_prohibited(&self) -> bool {
        self.use_mode == AttributeUse::Prohibited
    }

    /// Name an instance attribute must carry to match this declaration
    pub fn effective_name(&self, attribute_form_default: Form) -> QName {
        if self.scope == Scope::Global || self.reference {
            return self.name.clone();
        }
        match self.form.unwrap_or(attribute_form_default) {
            Form::Qualified => self.name.clone(),
            Form::Unqualified => QName::local(self.name.local_name.clone()),
        }
    }
}

impl NamespaceRemap for AttributeDecl {
    fn remap_namespace(&mut self, namespace: &str) {
        self.name.remap_namespace(namespace);
        self.type_ref.remap_namespace(namespace);
    }
}

/// XSD Attribute group definition
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeGroupDef {
    /// Group name
    pub name: QName,
    /// Attribute uses declared directly in the group
    pub attributes: Vec<AttributeDecl>,
    /// Referenced attribute groups, expanded by reference resolution
    pub group_refs: Vec<QName>,
    /// Attribute wildcard
    pub any_attribute: Option<Wildcard>,
}

impl AttributeGroupDef {
    /// Create an empty attribute group
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            group_refs: Vec::new(),
            any_attribute: None,
        }
    }

    /// Add an attribute use
    pub fn with_attribute(mut self, attribute: AttributeDecl) -> Self {
        self.attributes.push(attribute);
        self
    }
}

impl NamespaceRemap for AttributeGroupDef {
    fn remap_namespace(&mut self, namespace: &str) {
        self.name.remap_namespace(namespace);
        self.attributes.remap_namespace(namespace);
        self.group_refs.remap_namespace(namespace);
        self.any_attribute.remap_namespace(namespace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_use() {
        assert_eq!(AttributeUse::from_str("required"), Some(AttributeUse::Required));
        assert_eq!(AttributeUse::from_str("sometimes"), None);
        assert_eq!(AttributeUse::Prohibited.to_string(), "prohibited");
    }

    #[test]
    fn test_effective_name() {
        let local = AttributeDecl::new(QName::new("urn:a", "lang"), Scope::Local);
        assert_eq!(local.effective_name(Form::Unqualified), QName::local("lang"));
        assert_eq!(local.effective_name(Form::Qualified), QName::new("urn:a", "lang"));

        let global = AttributeDecl::new(QName::new("urn:a", "lang"), Scope::Global);
        assert_eq!(global.effective_name(Form::Unqualified), QName::new("urn:a", "lang"));
    }

    #[test]
    fn test_attribute_group_remap() {
        let mut group = AttributeGroupDef::new(QName::local("common"))
            .with_attribute(AttributeDecl::new(QName::local("id"), Scope::Local));
        group.group_refs.push(QName::xsd("ignored"));
        group.remap_namespace("urn:b");
        assert_eq!(group.name, QName::new("urn:b", "common"));
        assert_eq!(group.attributes[0].name, QName::new("urn:b", "id"));
        assert_eq!(group.group_refs[0], QName::xsd("ignored"));
        assert!(group.attributes[0].type_ref.name().map(|n| n.is_xsd()).unwrap_or(false));
    }
}
