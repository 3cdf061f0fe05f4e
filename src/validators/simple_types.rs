//! XSD Simple Type definitions
//!
//! Simple types are atomic restrictions, lists or unions. Restriction
//! facets are carried as [`DeferredFacet`] values until the base type is
//! resolved, then materialized into [`Facet`] values on the same node.
//!
//! Reference: https://www.w3.org/TR/xmlschema-2/#rf-defn

use std::fmt;

use crate::namespaces::QName;

use super::facets::{DeferredFacet, Facet};
use super::globals::{NamespaceRemap, TypeRef};
use super::schemas::DerivationSet;

/// Variety of a simple type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimpleVariety {
    /// Atomic value
    Atomic,
    /// Whitespace-separated list of items
    List,
    /// Value of any member type
    Union,
}

impl SimpleVariety {
    /// Printable name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Atomic => "atomic",
            Self::List => "list",
            Self::Union => "union",
        }
    }
}

impl fmt::Display for SimpleVariety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a simple type is derived
#[derive(Debug, Clone, PartialEq)]
pub enum SimpleDerivation {
    /// `xs:restriction` of a base type
    Restriction {
        /// Base type
        base: TypeRef,
        /// Facets as written, before materialization
        facets: Vec<DeferredFacet>,
    },
    /// `xs:list`
    List {
        /// Item type
        item: TypeRef,
        /// Both `itemType` and an inline `simpleType` were given
        conflicting_item: bool,
    },
    /// `xs:union`
    Union {
        /// Member types, `memberTypes` first, then inline definitions
        members: Vec<TypeRef>,
    },
}

impl SimpleDerivation {
    /// Printable name of the derivation method
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::Restriction { .. } => "restriction",
            Self::List { .. } => "list",
            Self::Union { .. } => "union",
        }
    }
}

/// A user-defined simple type
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleType {
    /// Type name (zero for anonymous types)
    pub name: QName,
    /// Derivation
    pub derivation: SimpleDerivation,
    /// The `final` attribute
    pub final_deriv: DerivationSet,
    /// Materialized facets of this derivation step
    pub facets: Vec<Facet>,
}

impl SimpleType {
    /// Restriction of `base` without facets
    pub fn restriction(name: QName, base: TypeRef) -> Self {
        Self::with_derivation(
            name,
            SimpleDerivation::Restriction {
                base,
                facets: Vec::new(),
            },
        )
    }

    /// List of `item`
    pub fn list(name: QName, item: TypeRef) -> Self {
        Self::with_derivation(
            name,
            SimpleDerivation::List {
                item,
                conflicting_item: false,
            },
        )
    }

    /// Union of `members`
    pub fn union(name: QName, members: Vec<TypeRef>) -> Self {
        Self::with_derivation(name, SimpleDerivation::Union { members })
    }

    fn with_derivation(name: QName, derivation: SimpleDerivation) -> Self {
        Self {
            name,
            derivation,
            final_deriv: DerivationSet::default(),
            facets: Vec::new(),
        }
    }

    /// Add a facet to a restriction
    pub fn with_facet(mut self, facet: DeferredFacet) -> Self {
        if let SimpleDerivation::Restriction { facets, .. } = &mut self.derivation {
            facets.push(facet);
        }
        self
    }

    /// Set the `final` attribute
    pub fn with_final(mut self, final_deriv: DerivationSet) -> Self {
        self.final_deriv = final_deriv;
        self
    }

    /// Check if the type is anonymous
    pub fn is_anonymous(&self) -> bool {
        self.name.is_zero()
    }

    /// Facets as written on a restriction
    pub fn deferred_facets(&self) -> &[DeferredFacet] {
        match &self.derivation {
            SimpleDerivation::Restriction { facets, .. } => facets,
            _ => &[],
        }
    }

    /// Every type reference of the derivation
    pub fn type_refs_mut(&mut self) -> Vec<&mut TypeRef> {
        match &mut self.derivation {
            SimpleDerivation::Restriction { base, .. } => vec![base],
            SimpleDerivation::List { item, .. } => vec![item],
            SimpleDerivation::Union { members } => members.iter_mut().collect(),
        }
    }
}

impl NamespaceRemap for SimpleType {
    fn remap_namespace(&mut self, namespace: &str) {
        self.name.remap_namespace(namespace);
        if let SimpleDerivation::Restriction { facets, .. } = &mut self.derivation {
            facets.remap_namespace(namespace);
        }
        for type_ref in self.type_refs_mut() {
            type_ref.remap_namespace(namespace);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::facets::FacetKind;

    #[test]
    fn test_simple_type_builders() {
        let st = SimpleType::restriction(QName::local("code"), TypeRef::named(QName::xsd("token")))
            .with_facet(DeferredFacet::new(FacetKind::MaxLength, "4"))
            .with_final(DerivationSet::all());
        assert!(!st.is_anonymous());
        assert_eq!(st.deferred_facets().len(), 1);
        assert_eq!(st.derivation.method_name(), "restriction");
        assert!(st.final_deriv.list);
    }

    #[test]
    fn test_remap_namespace() {
        let mut st = SimpleType::union(
            QName::local("u"),
            vec![
                TypeRef::named(QName::local("a")),
                TypeRef::named(QName::xsd("int")),
            ],
        );
        st.remap_namespace("urn:x");
        assert_eq!(st.name, QName::new("urn:x", "u"));
        match &st.derivation {
            SimpleDerivation::Union { members } => {
                assert_eq!(members[0].name(), Some(&QName::new("urn:x", "a")));
                assert_eq!(members[1].name(), Some(&QName::xsd("int")));
            }
            other => panic!("unexpected derivation {:?}", other),
        }
    }

    #[test]
    fn test_list_facets_empty() {
        let st = SimpleType::list(QName::zero(), TypeRef::named(QName::xsd("int")));
        assert!(st.is_anonymous());
        assert!(st.deferred_facets().is_empty());
        assert_eq!(SimpleVariety::List.to_string(), "list");
    }
}
