//! Assembled XSD schemas
//!
//! A [`Schema`] holds the top-level components of one schema document and,
//! after directive processing, of every document merged into it. Reference
//! resolution then moves its type definitions into the [`TypeArena`].
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#Schemas

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::namespaces::{NamespaceContext, QName};

use super::attributes::{AttributeDecl, AttributeGroupDef};
use super::complex_types::DerivationMethod;
use super::elements::{ElementDecl, Scope};
use super::globals::{ComponentKind, NotationDecl, TypeArena, TypeDef, TypeId, TypeRef};
use super::groups::{GroupDef, ModelGroup, Particle};

/// Form of local element and attribute names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Form {
    /// Unqualified (default)
    #[default]
    Unqualified,
    /// Qualified
    Qualified,
}

impl Form {
    /// Parse from string value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "qualified" => Some(Self::Qualified),
            "unqualified" => Some(Self::Unqualified),
            _ => None,
        }
    }

    /// Check if qualified
    pub fn is_qualified(&self) -> bool {
        matches!(self, Self::Qualified)
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Qualified => write!(f, "qualified"),
            Self::Unqualified => write!(f, "unqualified"),
        }
    }
}

/// Set of derivation methods named by `block`, `final` and their defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct DerivationSet {
    /// extension
    pub extension: bool,
    /// restriction
    pub restriction: bool,
    /// substitution (element `block`)
    pub substitution: bool,
    /// list (simple type `final`)
    pub list: bool,
    /// union (simple type `final`)
    pub union: bool,
}

impl DerivationSet {
    /// Every derivation method
    pub fn all() -> Self {
        Self {
            extension: true,
            restriction: true,
            substitution: true,
            list: true,
            union: true,
        }
    }

    /// Parse an attribute value; `#all` must stand alone
    pub fn parse(value: &str) -> Result<Self, String> {
        let value = value.trim();
        if value == "#all" {
            return Ok(Self::all());
        }
        let mut set = Self::default();
        for token in value.split_whitespace() {
            match token {
                "extension" => set.extension = true,
                "restriction" => set.restriction = true,
                "substitution" => set.substitution = true,
                "list" => set.list = true,
                "union" => set.union = true,
                other => return Err(format!("invalid derivation method '{}'", other)),
            }
        }
        Ok(set)
    }

    /// Check if the set names a derivation method
    pub fn contains(&self, method: DerivationMethod) -> bool {
        match method {
            DerivationMethod::Extension => self.extension,
            DerivationMethod::Restriction => self.restriction,
            DerivationMethod::List => self.list,
            DerivationMethod::Union => self.union,
        }
    }

    /// Check if nothing is named
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check if every method named by `other` is also named here
    pub fn is_superset_of(&self, other: &DerivationSet) -> bool {
        (self.extension || !other.extension)
            && (self.restriction || !other.restriction)
            && (self.substitution || !other.substitution)
            && (self.list || !other.list)
            && (self.union || !other.union)
    }
}

impl fmt::Display for DerivationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (self.extension, "extension"),
            (self.restriction, "restriction"),
            (self.substitution, "substitution"),
            (self.list, "list"),
            (self.union, "union"),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| *name)
        .collect();
        f.write_str(&names.join(" "))
    }
}

/// An assembled schema
#[derive(Debug, Clone)]
pub struct Schema {
    /// Target namespace (empty for no namespace)
    pub target_namespace: String,
    /// System id of the document the schema was parsed from
    pub system_id: String,
    /// `elementFormDefault`
    pub element_form_default: Form,
    /// `attributeFormDefault`
    pub attribute_form_default: Form,
    /// `blockDefault`
    pub block_default: DerivationSet,
    /// `finalDefault`
    pub final_default: DerivationSet,
    /// Namespace declarations on the schema element
    pub namespaces: NamespaceContext,

    /// Global element declarations
    pub elements: IndexMap<QName, ElementDecl>,
    /// Global type definitions, drained into the arena by resolution
    pub types: IndexMap<QName, TypeDef>,
    /// Global attribute declarations
    pub attributes: IndexMap<QName, AttributeDecl>,
    /// Attribute group definitions
    pub attribute_groups: IndexMap<QName, AttributeGroupDef>,
    /// Model group definitions
    pub groups: IndexMap<QName, GroupDef>,
    /// Notation declarations
    pub notations: IndexMap<QName, NotationDecl>,
    /// Direct members of each substitution group head
    pub substitution_groups: IndexMap<QName, Vec<QName>>,

    /// System id of the document that first introduced each component
    pub origins: HashMap<(ComponentKind, QName), String>,
    /// Namespaces each namespace imports
    pub imported_namespaces: BTreeMap<String, BTreeSet<String>>,
    /// Global declarations in author-visible order
    pub global_decl_order: Vec<(ComponentKind, QName)>,
    /// Documents already merged into this schema
    pub merged_documents: BTreeSet<String>,

    /// Original definitions replaced by `xs:redefine`
    pub redefined_types: IndexMap<QName, TypeDef>,
    /// Original groups replaced by `xs:redefine`
    pub redefined_groups: IndexMap<QName, GroupDef>,
    /// Original attribute groups replaced by `xs:redefine`
    pub redefined_attribute_groups: IndexMap<QName, AttributeGroupDef>,

    /// Anonymous complex types of elements declared in model group
    /// definitions, parked in reserved arena slots until type resolution
    pub group_types: IndexMap<TypeId, TypeDef>,
    /// Type storage, filled by reference resolution
    pub arena: TypeArena,
    /// Handles of the global types
    pub type_ids: IndexMap<QName, TypeId>,
    /// Set once Unique Particle Attribution has been checked
    pub upa_validated: bool,
}

impl Schema {
    /// Create an empty schema
    pub fn new(target_namespace: impl Into<String>, system_id: impl Into<String>) -> Self {
        Self {
            target_namespace: target_namespace.into(),
            system_id: system_id.into(),
            element_form_default: Form::Unqualified,
            attribute_form_default: Form::Unqualified,
            block_default: DerivationSet::default(),
            final_default: DerivationSet::default(),
            namespaces: NamespaceContext::new(),
            elements: IndexMap::new(),
            types: IndexMap::new(),
            attributes: IndexMap::new(),
            attribute_groups: IndexMap::new(),
            groups: IndexMap::new(),
            notations: IndexMap::new(),
            substitution_groups: IndexMap::new(),
            origins: HashMap::new(),
            imported_namespaces: BTreeMap::new(),
            global_decl_order: Vec::new(),
            merged_documents: BTreeSet::new(),
            redefined_types: IndexMap::new(),
            redefined_groups: IndexMap::new(),
            redefined_attribute_groups: IndexMap::new(),
            group_types: IndexMap::new(),
            arena: TypeArena::new(),
            type_ids: IndexMap::new(),
            upa_validated: false,
        }
    }

    /// Number of top-level components
    pub fn component_count(&self) -> usize {
        self.elements.len()
            + self.types.len()
            + self.type_ids.len()
            + self.attributes.len()
            + self.attribute_groups.len()
            + self.groups.len()
            + self.notations.len()
    }

    /// Check if a top-level component exists
    pub fn contains(&self, kind: ComponentKind, name: &QName) -> bool {
        match kind {
            ComponentKind::Element => self.elements.contains_key(name),
            ComponentKind::Type => {
                self.types.contains_key(name) || self.type_ids.contains_key(name)
            }
            ComponentKind::Attribute => self.attributes.contains_key(name),
            ComponentKind::AttributeGroup => self.attribute_groups.contains_key(name),
            ComponentKind::Group => self.groups.contains_key(name),
            ComponentKind::Notation => self.notations.contains_key(name),
        }
    }

    /// Record a newly added global in the origin map and declaration order
    pub fn record_global(&mut self, kind: ComponentKind, name: QName, origin: &str) {
        self.origins
            .entry((kind, name.clone()))
            .or_insert_with(|| origin.to_string());
        self.global_decl_order.push((kind, name));
    }

    /// System id of the document that introduced a component
    pub fn origin_of(&self, kind: ComponentKind, name: &QName) -> Option<&str> {
        self.origins.get(&(kind, name.clone())).map(|s| s.as_str())
    }

    /// Record that `namespace` imports `imported`
    pub fn add_import(&mut self, namespace: &str, imported: &str) {
        self.imported_namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(imported.to_string());
    }

    /// Handle of a global or built-in type, after resolution
    pub fn type_id(&self, name: &QName) -> Option<TypeId> {
        self.type_ids
            .get(name)
            .copied()
            .or_else(|| self.arena.builtin_qname(name))
    }

    /// Register `member` in the substitution group of `head`
    pub fn add_substitution_member(&mut self, head: QName, member: QName) {
        let members = self.substitution_groups.entry(head).or_default();
        if !members.contains(&member) {
            members.push(member);
        }
    }

    /// Effective name of a global element given its qualified name
    pub fn qualify(&self, local_name: &str) -> QName {
        QName::new(self.target_namespace.clone(), local_name)
    }

    /// Visit every local element and attribute declaration, at any depth,
    /// including those of redefined originals
    pub fn for_each_local_mut(
        &mut self,
        elements: &mut dyn FnMut(&mut ElementDecl),
        attributes: &mut dyn FnMut(&mut AttributeDecl),
    ) {
        let mut visitor = LocalVisitor {
            elements,
            attributes,
        };
        for decl in self.elements.values_mut() {
            visitor.type_ref(&mut decl.type_ref);
        }
        for def in self
            .types
            .values_mut()
            .chain(self.redefined_types.values_mut())
            .chain(self.group_types.values_mut())
        {
            visitor.type_def(def);
        }
        for group in self.groups.values_mut().chain(self.redefined_groups.values_mut()) {
            visitor.model_group(&mut group.group);
        }
        for group in self
            .attribute_groups
            .values_mut()
            .chain(self.redefined_attribute_groups.values_mut())
        {
            for attribute in &mut group.attributes {
                visitor.attribute(attribute);
            }
        }
    }
}

struct LocalVisitor<'e, 'a> {
    elements: &'e mut dyn FnMut(&mut ElementDecl),
    attributes: &'a mut dyn FnMut(&mut AttributeDecl),
}

impl LocalVisitor<'_, '_> {
    fn type_ref(&mut self, type_ref: &mut TypeRef) {
        if let TypeRef::Inline(def) = type_ref {
            self.type_def(def);
        }
    }

    fn type_def(&mut self, def: &mut TypeDef) {
        if let TypeDef::Complex(ct) = def {
            for attribute in &mut ct.attributes {
                self.attribute(attribute);
            }
            if let Some(group) = ct.content.model_group_mut() {
                self.model_group(group);
            }
        }
    }

    fn attribute(&mut self, attribute: &mut AttributeDecl) {
        if attribute.scope == Scope::Local && !attribute.reference {
            (self.attributes)(attribute);
        }
    }

    fn model_group(&mut self, group: &mut ModelGroup) {
        for particle in &mut group.particles {
            match particle {
                Particle::Element(decl) => {
                    if !decl.reference {
                        (self.elements)(decl);
                    }
                    self.type_ref(&mut decl.type_ref);
                }
                Particle::Group(inner) => self.model_group(inner),
                Particle::Any(_) | Particle::GroupRef(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::complex_types::ComplexType;

    #[test]
    fn test_form() {
        assert_eq!(Form::from_str("qualified"), Some(Form::Qualified));
        assert_eq!(Form::from_str("q"), None);
        assert!(!Form::default().is_qualified());
    }

    #[test]
    fn test_derivation_set() {
        let set = DerivationSet::parse("extension restriction").unwrap();
        assert!(set.contains(DerivationMethod::Extension));
        assert!(!set.contains(DerivationMethod::List));
        assert_eq!(set.to_string(), "extension restriction");
        assert_eq!(DerivationSet::parse("#all").unwrap(), DerivationSet::all());
        assert!(DerivationSet::parse("#all extension").is_err());
        assert!(DerivationSet::parse("").unwrap().is_empty());
        assert!(DerivationSet::all().is_superset_of(&set));
        assert!(!set.is_superset_of(&DerivationSet::all()));
    }

    #[test]
    fn test_schema_registry() {
        let mut schema = Schema::new("urn:a", "mem:/a.xsd");
        let name = schema.qualify("root");
        schema
            .elements
            .insert(name.clone(), ElementDecl::new(name.clone(), Scope::Global));
        schema.record_global(ComponentKind::Element, name.clone(), "mem:/a.xsd");
        schema.record_global(ComponentKind::Element, name.clone(), "mem:/b.xsd");

        assert!(schema.contains(ComponentKind::Element, &name));
        assert_eq!(schema.origin_of(ComponentKind::Element, &name), Some("mem:/a.xsd"));
        assert_eq!(schema.component_count(), 1);
        assert_eq!(schema.type_id(&QName::xsd("anyType")), Some(TypeId::ANY_TYPE));

        schema.add_substitution_member(name.clone(), QName::new("urn:a", "alt"));
        schema.add_substitution_member(name.clone(), QName::new("urn:a", "alt"));
        assert_eq!(schema.substitution_groups[&name].len(), 1);
    }

    #[test]
    fn test_for_each_local_mut() {
        let mut schema = Schema::new("urn:a", "mem:/a.xsd");
        let inner = ComplexType::new(QName::zero())
            .with_content(ModelGroup::sequence().with_particle(Particle::Element(Box::new(
                ElementDecl::new(schema.qualify("leaf"), Scope::Local),
            ))))
            .with_attribute(AttributeDecl::new(schema.qualify("at"), Scope::Local));
        let outer = ComplexType::new(schema.qualify("t")).with_content(
            ModelGroup::sequence()
                .with_particle(Particle::Element(Box::new(
                    ElementDecl::new(schema.qualify("mid"), Scope::Local)
                        .with_type(TypeRef::inline(TypeDef::Complex(inner))),
                )))
                .with_particle(Particle::Element(Box::new(ElementDecl::reference(
                    schema.qualify("root"),
                    Default::default(),
                )))),
        );
        schema.types.insert(schema.qualify("t"), TypeDef::Complex(outer));

        let mut elements = Vec::new();
        let mut attributes = Vec::new();
        schema.for_each_local_mut(
            &mut |e| {
                e.form = Some(Form::Qualified);
                elements.push(e.name.local_name.clone());
            },
            &mut |a| attributes.push(a.name.local_name.clone()),
        );
        assert_eq!(elements, vec!["mid", "leaf"]);
        assert_eq!(attributes, vec!["at"]);
    }
}
