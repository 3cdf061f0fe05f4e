//! XSD Complex Type definitions
//!
//! This module implements complex type definitions for XSD schemas.
//! Complex types can have element content (model groups), simple content,
//! or be empty, and carry attribute uses and an attribute wildcard.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#Complex_Type_Definitions

use std::fmt;

use crate::namespaces::QName;

use super::attributes::AttributeDecl;
use super::facets::{DeferredFacet, Facet};
use super::globals::{NamespaceRemap, TypeRef};
use super::groups::ModelGroup;
use super::schemas::DerivationSet;
use super::wildcards::Wildcard;

/// Derivation method of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
pub enum DerivationMethod {
    /// Derivation by restriction
    #[default]
    Restriction,
    /// Derivation by extension
    Extension,
    /// Simple type derived by list
    List,
    /// Simple type derived by union
    Union,
}

impl DerivationMethod {
    /// Parse from an XSD element local name
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "restriction" => Some(Self::Restriction),
            "extension" => Some(Self::Extension),
            "list" => Some(Self::List),
            "union" => Some(Self::Union),
            _ => None,
        }
    }

    /// Printable name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restriction => "restriction",
            Self::Extension => "extension",
            Self::List => "list",
            Self::Union => "union",
        }
    }
}

impl fmt::Display for DerivationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which content child the definition was written with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentForm {
    /// No `simpleContent`/`complexContent` wrapper
    #[default]
    Implicit,
    /// `<xs:simpleContent>`
    SimpleContent,
    /// `<xs:complexContent>`
    ComplexContent,
}

/// Character content of a complex type with simple content
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimpleContent {
    /// Restriction facets as written
    pub deferred: Vec<DeferredFacet>,
    /// Materialized facets of this derivation step
    pub facets: Vec<Facet>,
    /// Inline `simpleType` of a restriction
    pub inline_type: Option<TypeRef>,
}

/// The content of a complex type
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ContentType {
    /// No content particle
    #[default]
    Empty,
    /// Element content described by a model group
    Elements(ModelGroup),
    /// Character content of a simple type
    Simple(SimpleContent),
}

impl ContentType {
    /// Check for empty content
    pub fn is_empty(&self) -> bool {
        matches!(self, ContentType::Empty)
    }

    /// Check for simple content
    pub fn is_simple(&self) -> bool {
        matches!(self, ContentType::Simple(_))
    }

    /// The content model group
    pub fn model_group(&self) -> Option<&ModelGroup> {
        match self {
            ContentType::Elements(group) => Some(group),
            _ => None,
        }
    }

    /// Mutable content model group
    pub fn model_group_mut(&mut self) -> Option<&mut ModelGroup> {
        match self {
            ContentType::Elements(group) => Some(group),
            _ => None,
        }
    }
}

/// XSD Complex Type definition
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexType {
    /// Type name (zero for anonymous types)
    pub name: QName,

    /// Base type (`xs:anyType` for implicit restrictions)
    pub base: TypeRef,

    /// Derivation method
    pub derivation: DerivationMethod,

    /// Content wrapper used in the source
    pub content_form: ContentForm,

    /// Content of this definition's own step
    pub content: ContentType,

    /// Whether this is a mixed content type
    pub mixed: bool,

    /// Whether this type is abstract
    pub abstract_type: bool,

    /// The `block` attribute
    pub block: DerivationSet,

    /// The `final` attribute
    pub final_deriv: DerivationSet,

    /// Attribute uses declared on this step
    pub attributes: Vec<AttributeDecl>,

    /// Referenced attribute groups, expanded by reference resolution
    pub attribute_group_refs: Vec<QName>,

    /// Attribute wildcard declared on this step
    pub any_attribute: Option<Wildcard>,
}

impl ComplexType {
    /// Create an empty restriction of `xs:anyType`
    pub fn new(name: QName) -> Self {
        Self {
            name,
            base: TypeRef::any_type(),
            derivation: DerivationMethod::Restriction,
            content_form: ContentForm::Implicit,
            content: ContentType::Empty,
            mixed: false,
            abstract_type: false,
            block: DerivationSet::default(),
            final_deriv: DerivationSet::default(),
            attributes: Vec::new(),
            attribute_group_refs: Vec::new(),
            any_attribute: None,
        }
    }

    /// Set the base type and derivation
    pub fn with_base(mut self, base: TypeRef, derivation: DerivationMethod) -> Self {
        self.base = base;
        self.derivation = derivation;
        self
    }

    /// Set element content
    pub fn with_content(mut self, group: ModelGroup) -> Self {
        self.content = ContentType::Elements(group);
        self
    }

    /// Set the mixed flag
    pub fn with_mixed(mut self, mixed: bool) -> Self {
        self.mixed = mixed;
        self
    }

    /// Add an attribute use
    pub fn with_attribute(mut self, attribute: AttributeDecl) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Check if the type is anonymous
    pub fn is_anonymous(&self) -> bool {
        self.name.is_zero()
    }

    /// Content model group of this step
    pub fn model_group(&self) -> Option<&ModelGroup> {
        self.content.model_group()
    }

    /// Check for element-only content
    pub fn is_element_only(&self) -> bool {
        !self.mixed && self.model_group().is_some()
    }
}

impl NamespaceRemap for ComplexType {
    fn remap_namespace(&mut self, namespace: &str) {
        self.name.remap_namespace(namespace);
        self.base.remap_namespace(namespace);
        match &mut self.content {
            ContentType::Elements(group) => group.remap_namespace(namespace),
            ContentType::Simple(sc) => {
                sc.inline_type.remap_namespace(namespace);
                sc.deferred.remap_namespace(namespace);
            }
            ContentType::Empty => {}
        }
        self.attributes.remap_namespace(namespace);
        self.attribute_group_refs.remap_namespace(namespace);
        self.any_attribute.remap_namespace(namespace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::elements::{ElementDecl, Scope};
    use crate::validators::groups::Particle;

    #[test]
    fn test_derivation_method() {
        assert_eq!(DerivationMethod::from_str("extension"), Some(DerivationMethod::Extension));
        assert_eq!(DerivationMethod::from_str("substitution"), None);
        assert_eq!(DerivationMethod::default(), DerivationMethod::Restriction);
    }

    #[test]
    fn test_complex_type_content() {
        let ct = ComplexType::new(QName::local("t"));
        assert!(ct.content.is_empty());
        assert!(!ct.is_element_only());
        assert_eq!(ct.base, TypeRef::any_type());

        let ct = ct.with_content(ModelGroup::sequence());
        assert!(ct.is_element_only());
        assert!(ct.clone().with_mixed(true).model_group().is_some());
        assert!(!ct.with_mixed(true).is_element_only());
    }

    #[test]
    fn test_remap_namespace() {
        let group = ModelGroup::sequence().with_particle(Particle::Element(Box::new(
            ElementDecl::new(QName::local("e"), Scope::Local)
                .with_type(TypeRef::named(QName::local("eType"))),
        )));
        let mut ct = ComplexType::new(QName::local("t"))
            .with_base(TypeRef::named(QName::local("base")), DerivationMethod::Extension)
            .with_content(group);
        ct.remap_namespace("urn:c");
        assert_eq!(ct.name, QName::new("urn:c", "t"));
        assert_eq!(ct.base.name(), Some(&QName::new("urn:c", "base")));
        let elements = ct.model_group().unwrap().element_particles();
        assert_eq!(elements[0].type_ref.name(), Some(&QName::new("urn:c", "eType")));
    }
}
