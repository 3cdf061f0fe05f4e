//! Compiled grammar components

use indexmap::IndexSet;

use crate::namespaces::QName;
use crate::validators::attributes::AttributeDecl;
use crate::validators::complex_types::DerivationMethod;
use crate::validators::facets::Facet;
use crate::validators::globals::TypeId;
use crate::validators::groups::ModelGroupKind;
use crate::validators::identities::IdentityConstraint;
use crate::validators::particles::Occurs;
use crate::validators::schemas::{DerivationSet, Form};
use crate::validators::wildcards::Wildcard;

/// Category of a compiled type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Built-in type
    Builtin,
    /// User-defined simple type
    Simple,
    /// User-defined complex type
    Complex,
}

/// A type ready for instance validation
///
/// Types refer to each other through [`TypeId`] handles into the owning
/// [`CompiledSchema`](super::CompiledSchema).
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledType {
    /// Handle of the type
    pub id: TypeId,
    /// Qualified name, zero for anonymous types
    pub name: QName,
    /// Category
    pub kind: TypeKind,
    /// Direct base, `None` only for `xs:anyType`
    pub base: Option<TypeId>,
    /// How the type derives from its base
    pub derivation: Option<DerivationMethod>,
    /// Derivation chain, self first
    pub chain: Vec<TypeId>,
    /// Name of the primitive builtin ancestor
    pub primitive: Option<&'static str>,
    /// Derived from `xs:NOTATION`
    pub is_notation: bool,
    /// `ID`, `IDREF` or `IDREFS`
    pub id_type_name: Option<&'static str>,
    /// Item type of a list
    pub item_type: Option<TypeId>,
    /// Member types of a union
    pub member_types: Vec<TypeId>,
    /// Facets in force, inherited first
    pub facets: Vec<Facet>,
    /// Attribute uses merged along the chain
    pub attributes: Vec<AttributeDecl>,
    /// Attribute wildcard in force
    pub any_attribute: Option<Wildcard>,
    /// Element content, for complex types with complex content
    pub content: Option<CompiledContentModel>,
    /// Type of the text content, for complex types with simple content
    pub simple_content_type: Option<TypeId>,
    /// Abstract complex type
    pub abstract_type: bool,
    /// Blocked derivations
    pub block: DerivationSet,
}

impl CompiledType {
    pub(crate) fn placeholder(id: TypeId, name: QName, kind: TypeKind) -> Self {
        Self {
            id,
            name,
            kind,
            base: None,
            derivation: None,
            chain: vec![id],
            primitive: None,
            is_notation: false,
            id_type_name: None,
            item_type: None,
            member_types: Vec::new(),
            facets: Vec::new(),
            attributes: Vec::new(),
            any_attribute: None,
            content: None,
            simple_content_type: None,
            abstract_type: false,
            block: DerivationSet::default(),
        }
    }

    /// Check for a simple or builtin simple type
    pub fn is_simple(&self) -> bool {
        self.kind == TypeKind::Simple
            || (self.kind == TypeKind::Builtin && self.id != TypeId::ANY_TYPE)
    }

    /// Check if the type is `ancestor` or derives from it
    pub fn derives_from(&self, ancestor: TypeId) -> bool {
        self.chain.contains(&ancestor)
    }

    /// Attribute use by the name instances carry
    pub fn attribute(&self, name: &QName) -> Option<&AttributeDecl> {
        self.attributes
            .iter()
            .find(|a| &a.effective_name(Form::Unqualified) == name)
    }
}

/// Compositor of a compiled content model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// Ordered content
    Sequence,
    /// One of the particles
    Choice,
    /// Every particle, in any order
    All,
    /// No element content
    Empty,
}

impl From<ModelGroupKind> for ContentKind {
    fn from(kind: ModelGroupKind) -> Self {
        match kind {
            ModelGroupKind::Sequence => ContentKind::Sequence,
            ModelGroupKind::Choice => ContentKind::Choice,
            ModelGroupKind::All => ContentKind::All,
        }
    }
}

/// Element content of a complex type with every group reference expanded
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledContentModel {
    /// Compositor of the outermost group
    pub kind: ContentKind,
    /// Occurrence bounds of the outermost group
    pub occurs: Occurs,
    /// Particles of the outermost group
    pub particles: Vec<CompiledParticle>,
    /// Character data allowed between elements
    pub mixed: bool,
    /// Every element particle in document order
    pub all_elements: Vec<QName>,
    element_names: IndexSet<QName>,
}

impl CompiledContentModel {
    pub(crate) fn new(
        kind: ContentKind,
        occurs: Occurs,
        particles: Vec<CompiledParticle>,
        mixed: bool,
    ) -> Self {
        let mut all_elements = Vec::new();
        for particle in &particles {
            particle.collect_elements(&mut all_elements);
        }
        let element_names = all_elements.iter().cloned().collect();
        Self {
            kind,
            occurs,
            particles,
            mixed,
            all_elements,
            element_names,
        }
    }

    /// Check if some element particle carries `name`
    pub fn has_element(&self, name: &QName) -> bool {
        self.element_names.contains(name)
    }

    /// Distinct element names, in order of first occurrence
    pub fn element_names(&self) -> impl Iterator<Item = &QName> {
        self.element_names.iter()
    }

    /// Check if the content can be empty
    pub fn is_emptiable(&self) -> bool {
        self.occurs.is_emptiable()
            || match self.kind {
                ContentKind::Empty => true,
                ContentKind::Choice => self.particles.iter().any(|p| p.is_emptiable()),
                ContentKind::Sequence | ContentKind::All => {
                    self.particles.iter().all(|p| p.is_emptiable())
                }
            }
    }
}

/// Element particle of a compiled content model
#[derive(Debug, Clone, PartialEq)]
pub struct ElementParticle {
    /// Name instance elements must carry
    pub name: QName,
    /// Type of the element
    pub type_id: TypeId,
    /// Occurrence bounds
    pub occurs: Occurs,
    /// Reference to a global declaration
    pub global: bool,
    /// Nillable
    pub nillable: bool,
    /// Abstract declaration
    pub abstract_element: bool,
    /// Default value
    pub default: Option<String>,
    /// Fixed value
    pub fixed: Option<String>,
}

/// Particle of a compiled content model
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledParticle {
    /// Element
    Element(ElementParticle),
    /// Element wildcard
    Wildcard(Wildcard),
    /// Nested group
    Group {
        /// Compositor
        kind: ModelGroupKind,
        /// Occurrence bounds
        occurs: Occurs,
        /// Particles
        particles: Vec<CompiledParticle>,
    },
}

impl CompiledParticle {
    /// Occurrence bounds
    pub fn occurs(&self) -> Occurs {
        match self {
            CompiledParticle::Element(e) => e.occurs,
            CompiledParticle::Wildcard(w) => w.occurs,
            CompiledParticle::Group { occurs, .. } => *occurs,
        }
    }

    /// Check if the particle can match nothing
    pub fn is_emptiable(&self) -> bool {
        match self {
            CompiledParticle::Group {
                kind,
                occurs,
                particles,
            } => {
                occurs.is_emptiable()
                    || match kind {
                        ModelGroupKind::Choice => {
                            particles.is_empty() || particles.iter().any(|p| p.is_emptiable())
                        }
                        _ => particles.iter().all(|p| p.is_emptiable()),
                    }
            }
            other => other.occurs().is_emptiable(),
        }
    }

    fn collect_elements(&self, out: &mut Vec<QName>) {
        match self {
            CompiledParticle::Element(e) => out.push(e.name.clone()),
            CompiledParticle::Wildcard(_) => {}
            CompiledParticle::Group { particles, .. } => {
                for particle in particles {
                    particle.collect_elements(out);
                }
            }
        }
    }
}

/// A global element declaration ready for instance validation
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledElement {
    /// Qualified name
    pub name: QName,
    /// Type of the element
    pub type_id: TypeId,
    /// Nillable
    pub nillable: bool,
    /// Abstract
    pub abstract_element: bool,
    /// Default value
    pub default: Option<String>,
    /// Fixed value
    pub fixed: Option<String>,
    /// Blocked substitutions and derivations
    pub block: DerivationSet,
    /// Derivations the element's substitutes may not use
    pub final_deriv: DerivationSet,
    /// Head of the element's substitution group
    pub substitution_group: Option<QName>,
    /// Identity constraints
    pub constraints: Vec<IdentityConstraint>,
}

/// An element declaration holding identity constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ConstrainedElement {
    /// Name instance elements carry
    pub name: QName,
    /// Type of the element
    pub type_id: TypeId,
    /// Identity constraints
    pub constraints: Vec<IdentityConstraint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::wildcards::Wildcard;

    fn element(name: &str, occurs: Occurs) -> CompiledParticle {
        CompiledParticle::Element(ElementParticle {
            name: QName::local(name),
            type_id: TypeId::ANY_TYPE,
            occurs,
            global: false,
            nillable: false,
            abstract_element: false,
            default: None,
            fixed: None,
        })
    }

    #[test]
    fn test_all_elements_in_document_order() {
        let model = CompiledContentModel::new(
            ContentKind::Sequence,
            Occurs::once(),
            vec![
                element("a", Occurs::once()),
                CompiledParticle::Group {
                    kind: ModelGroupKind::Choice,
                    occurs: Occurs::optional(),
                    particles: vec![
                        element("b", Occurs::once()),
                        CompiledParticle::Wildcard(Wildcard::any()),
                        element("a", Occurs::once()),
                    ],
                },
            ],
            false,
        );
        let names: Vec<&str> = model.all_elements.iter().map(|n| n.local_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "a"]);
        assert_eq!(model.element_names().count(), 2);
        assert!(model.has_element(&QName::local("b")));
        assert!(!model.is_emptiable());
    }

    #[test]
    fn test_emptiable_content() {
        let model = CompiledContentModel::new(
            ContentKind::Choice,
            Occurs::once(),
            vec![
                element("a", Occurs::once()),
                element("b", Occurs::zero_or_more()),
            ],
            true,
        );
        assert!(model.is_emptiable());
    }
}
