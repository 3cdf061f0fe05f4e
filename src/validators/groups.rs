//! XSD Model groups and particles
//!
//! A content model is a tree of [`Particle`]s rooted in a [`ModelGroup`].
//! [`Particle::GroupRef`] only exists between parsing and group flattening;
//! afterwards every reference has been replaced by a copy of the group body.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#cModel_Group_Definitions

use std::fmt;

use crate::namespaces::QName;

use super::elements::ElementDecl;
use super::globals::NamespaceRemap;
use super::particles::Occurs;
use super::wildcards::Wildcard;

/// Model group compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelGroupKind {
    /// Ordered sequence
    Sequence,
    /// Exactly one of the particles
    Choice,
    /// Every particle at most once, in any order
    All,
}

impl ModelGroupKind {
    /// Parse from an XSD element local name
    pub fn from_local_name(name: &str) -> Option<Self> {
        match name {
            "sequence" => Some(Self::Sequence),
            "choice" => Some(Self::Choice),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    /// Printable name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequence => "sequence",
            Self::Choice => "choice",
            Self::All => "all",
        }
    }
}

impl fmt::Display for ModelGroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference to a named model group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRef {
    /// Referenced group name
    pub name: QName,
    /// Occurrence bounds of the reference
    pub occurs: Occurs,
}

/// A particle of a content model
#[derive(Debug, Clone, PartialEq)]
pub enum Particle {
    /// Element declaration or reference
    Element(Box<ElementDecl>),
    /// Nested model group
    Group(ModelGroup),
    /// Element wildcard
    Any(Wildcard),
    /// Unexpanded group reference
    GroupRef(GroupRef),
}

impl Particle {
    /// Occurrence bounds
    pub fn occurs(&self) -> Occurs {
        match self {
            Particle::Element(e) => e.occurs,
            Particle::Group(g) => g.occurs,
            Particle::Any(w) => w.occurs,
            Particle::GroupRef(r) => r.occurs,
        }
    }

    /// Replace the occurrence bounds
    pub fn set_occurs(&mut self, occurs: Occurs) {
        match self {
            Particle::Element(e) => e.occurs = occurs,
            Particle::Group(g) => g.occurs = occurs,
            Particle::Any(w) => w.occurs = occurs,
            Particle::GroupRef(r) => r.occurs = occurs,
        }
    }

    /// Check if the particle can match an empty sequence
    pub fn is_emptiable(&self) -> bool {
        match self {
            Particle::Group(g) => g.is_emptiable(),
            other => other.occurs().is_emptiable(),
        }
    }

    /// The element declaration, for element particles
    pub fn as_element(&self) -> Option<&ElementDecl> {
        match self {
            Particle::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Short description for diagnostics
    pub fn describe(&self) -> String {
        match self {
            Particle::Element(e) => format!("element '{}'", e.name),
            Particle::Group(g) => format!("{} group", g.kind),
            Particle::Any(w) => format!("wildcard {}", w),
            Particle::GroupRef(r) => format!("group reference '{}'", r.name),
        }
    }
}

impl NamespaceRemap for Particle {
    fn remap_namespace(&mut self, namespace: &str) {
        match self {
            Particle::Element(e) => e.remap_namespace(namespace),
            Particle::Group(g) => g.remap_namespace(namespace),
            Particle::Any(w) => w.remap_namespace(namespace),
            Particle::GroupRef(r) => r.name.remap_namespace(namespace),
        }
    }
}

/// XSD Model group
#[derive(Debug, Clone, PartialEq)]
pub struct ModelGroup {
    /// Compositor
    pub kind: ModelGroupKind,
    /// Occurrence bounds
    pub occurs: Occurs,
    /// Child particles in document order
    pub particles: Vec<Particle>,
}

impl ModelGroup {
    /// Create an empty group
    pub fn new(kind: ModelGroupKind) -> Self {
        Self {
            kind,
            occurs: Occurs::once(),
            particles: Vec::new(),
        }
    }

    /// Empty sequence
    pub fn sequence() -> Self {
        Self::new(ModelGroupKind::Sequence)
    }

    /// Empty choice
    pub fn choice() -> Self {
        Self::new(ModelGroupKind::Choice)
    }

    /// Empty all group
    pub fn all() -> Self {
        Self::new(ModelGroupKind::All)
    }

    /// Set the occurrence bounds
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    /// Append a particle
    pub fn with_particle(mut self, particle: Particle) -> Self {
        self.particles.push(particle);
        self
    }

    /// Check if the group has no particles
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Check if the group can match an empty sequence
    pub fn is_emptiable(&self) -> bool {
        if self.occurs.is_emptiable() || self.particles.is_empty() {
            return true;
        }
        match self.kind {
            ModelGroupKind::Choice => self.particles.iter().any(|p| p.is_emptiable()),
            ModelGroupKind::Sequence | ModelGroupKind::All => {
                self.particles.iter().all(|p| p.is_emptiable())
            }
        }
    }

    /// Every element particle in document order, at any depth
    pub fn element_particles(&self) -> Vec<&ElementDecl> {
        let mut result = Vec::new();
        collect_elements(self, &mut result);
        result
    }

    /// Check if any group reference is left at any depth
    pub fn has_group_refs(&self) -> bool {
        self.particles.iter().any(|p| match p {
            Particle::GroupRef(_) => true,
            Particle::Group(g) => g.has_group_refs(),
            _ => false,
        })
    }

    /// Visit every element declaration at any depth
    pub fn for_each_element_mut(&mut self, f: &mut dyn FnMut(&mut ElementDecl)) {
        for particle in &mut self.particles {
            match particle {
                Particle::Element(e) => f(e),
                Particle::Group(g) => g.for_each_element_mut(f),
                _ => {}
            }
        }
    }
}

fn collect_elements<'a>(group: &'a ModelGroup, out: &mut Vec<&'a ElementDecl>) {
    for particle in &group.particles {
        match particle {
            Particle::Element(e) => out.push(e),
            Particle::Group(g) => collect_elements(g, out),
            _ => {}
        }
    }
}

impl NamespaceRemap for ModelGroup {
    fn remap_namespace(&mut self, namespace: &str) {
        self.particles.remap_namespace(namespace);
    }
}

/// XSD Model group definition (`<xs:group name="...">`)
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDef {
    /// Group name
    pub name: QName,
    /// Group body
    pub group: ModelGroup,
}

impl GroupDef {
    /// Create a new group definition
    pub fn new(name: QName, group: ModelGroup) -> Self {
        Self { name, group }
    }
}

impl NamespaceRemap for GroupDef {
    fn remap_namespace(&mut self, namespace: &str) {
        self.name.remap_namespace(namespace);
        self.group.remap_namespace(namespace);
    }
}
