//! XSD Element declarations
//!
//! This module implements element declarations for XSD schemas, both the
//! global ones and those local to a content model.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#cElement_Declarations

use std::fmt;

use crate::namespaces::QName;

use super::globals::{NamespaceRemap, TypeId, TypeRef};
use super::identities::IdentityConstraint;
use super::particles::Occurs;
use super::schemas::{DerivationSet, Form};

/// The scope of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Scope {
    /// Top-level declaration
    #[default]
    Global,
    /// Declaration inside a complex type, group or attribute group
    Local,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// XSD Element declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDecl {
    /// Element name, in the target namespace of its schema document
    pub name: QName,

    /// Element type
    pub type_ref: TypeRef,

    /// Whether the type came from a `type` attribute or inline definition
    pub explicit_type: bool,

    /// Occurrence constraints (always 1..1 for global declarations)
    pub occurs: Occurs,

    /// Global or local
    pub scope: Scope,

    /// Whether this particle was written as `<element ref="..."/>`
    pub reference: bool,

    /// Whether the element is nillable
    pub nillable: bool,

    /// Whether the element is abstract
    pub abstract_element: bool,

    /// Default value
    pub default: Option<String>,

    /// Fixed value
    pub fixed: Option<String>,

    /// The `block` attribute
    pub block: DerivationSet,

    /// The `final` attribute
    pub final_deriv: DerivationSet,

    /// Explicit or merge-bound form
    pub form: Option<Form>,

    /// Head of the substitution group this element belongs to
    pub substitution_group: Option<QName>,

    /// Identity constraints
    pub constraints: Vec<IdentityConstraint>,
}

impl ElementDecl {
    /// Create a declaration of type `xs:anyType`
    pub fn new(name: QName, scope: Scope) -> Self {
        Self {
            name,
            type_ref: TypeRef::any_type(),
            explicit_type: false,
            occurs: Occurs::once(),
            scope,
            reference: false,
            nillable: false,
            abstract_element: false,
            default: None,
            fixed: None,
            block: DerivationSet::default(),
            final_deriv: DerivationSet::default(),
            form: None,
            substitution_group: None,
            constraints: Vec::new(),
        }
    }

    /// Create a reference to a global declaration
    pub fn reference(name: QName, occurs: Occurs) -> Self {
        let mut decl = Self::new(name, Scope::Local);
        decl.reference = true;
        decl.occurs = occurs;
        decl
    }

    /// Set the type
    pub fn with_type(mut self, type_ref: TypeRef) -> Self {
        self.type_ref = type_ref;
        self.explicit_type = true;
        self
    }

    /// Set the occurrence bounds
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    /// Resolved type handle
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_ref.id()
    }

    /// Whether a fixed value is present
    pub fn has_fixed(&self) -> bool {
        self.fixed.is_some()
    }

    /// Check if this is a global declaration
    pub fn is_global(&self) -> bool {
        self.scope == Scope::Global
    }

    /// Name an instance element must carry to match this declaration
    pub fn effective_name(&self, element_form_default: Form) -> QName {
        if self.scope == Scope::Global || self.reference {
            return self.name.clone();
        }
        match self.form.unwrap_or(element_form_default) {
            Form::Qualified => self.name.clone(),
            Form::Unqualified => QName::local(self.name.local_name.clone()),
        }
    }

    /// Equivalence used when two documents declare the same global element
    pub fn is_equivalent(&self, other: &ElementDecl) -> bool {
        self.name == other.name
            && self.nillable == other.nillable
            && self.abstract_element == other.abstract_element
            && self.substitution_group == other.substitution_group
            && self.block == other.block
            && self.final_deriv == other.final_deriv
            && self.fixed == other.fixed
            && self.default == other.default
            && self.form == other.form
            && self.constraints == other.constraints
            && self.type_ref == other.type_ref
    }
}

impl NamespaceRemap for ElementDecl {
    fn remap_namespace(&mut self, namespace: &str) {
        self.name.remap_namespace(namespace);
        self.type_ref.remap_namespace(namespace);
        self.substitution_group.remap_namespace(namespace);
        self.constraints.remap_namespace(namespace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::identities::IdentityKind;

    #[test]
    fn test_element_defaults() {
        let decl = ElementDecl::new(QName::new("urn:a", "root"), Scope::Global);
        assert_eq!(decl.type_ref, TypeRef::any_type());
        assert!(!decl.explicit_type);
        assert!(decl.is_global());
        assert_eq!(decl.occurs, Occurs::once());
    }

    #[test]
    fn test_effective_name() {
        let mut local = ElementDecl::new(QName::new("urn:a", "item"), Scope::Local);
        assert_eq!(local.effective_name(Form::Unqualified), QName::local("item"));
        assert_eq!(
            local.effective_name(Form::Qualified),
            QName::new("urn:a", "item")
        );
        local.form = Some(Form::Unqualified);
        assert_eq!(local.effective_name(Form::Qualified), QName::local("item"));

        let reference = ElementDecl::reference(QName::new("urn:a", "root"), Occurs::optional());
        assert_eq!(
            reference.effective_name(Form::Unqualified),
            QName::new("urn:a", "root")
        );
    }

    #[test]
    fn test_equivalence() {
        let a = ElementDecl::new(QName::local("e"), Scope::Global)
            .with_type(TypeRef::named(QName::xsd("string")));
        let mut b = a.clone();
        assert!(a.is_equivalent(&b));
        b.nillable = true;
        assert!(!a.is_equivalent(&b));
    }

    #[test]
    fn test_remap() {
        let mut decl = ElementDecl::new(QName::local("child"), Scope::Global)
            .with_type(TypeRef::named(QName::local("childType")));
        decl.constraints.push(IdentityConstraint::new(
            QName::local("k"),
            IdentityKind::Key,
            "item",
        ));
        decl.remap_namespace("urn:a");
        assert_eq!(decl.name, QName::new("urn:a", "child"));
        assert_eq!(decl.type_ref.name(), Some(&QName::new("urn:a", "childType")));
        assert_eq!(decl.constraints[0].name, QName::new("urn:a", "k"));
    }
}
