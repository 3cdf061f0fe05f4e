//! Type handles, the type arena and global component bookkeeping
//!
//! Once references are resolved every named and anonymous type lives in a
//! [`TypeArena`]. Declarations, content models and compiled types refer to
//! them through copyable [`TypeId`] handles, so recursive and mutually
//! recursive type graphs never need shared ownership. All chain walks in
//! this module carry a visited set and stop on the first repeated node.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::namespaces::QName;

use super::builtins::{builtin_index, BuiltinType, BUILTIN_TYPES};
use super::attributes::AttributeDecl;
use super::complex_types::{ComplexType, ContentType, DerivationMethod};
use super::facets::{inherit_facets, Facet, WhiteSpace};
use super::groups::ModelGroup;
use super::schemas::Form;
use super::simple_types::{SimpleDerivation, SimpleType, SimpleVariety};
use super::wildcards::Wildcard;

// =============================================================================
// Handles and references
// =============================================================================

/// Handle of a type in a [`TypeArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeId(pub usize);

impl TypeId {
    /// The `xs:anyType` ur-type
    pub const ANY_TYPE: TypeId = TypeId(0);
    /// The `xs:anySimpleType` ur-type
    pub const ANY_SIMPLE_TYPE: TypeId = TypeId(1);

    /// Position in the arena
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A user-defined type definition as parsed
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDef {
    /// Simple type definition
    Simple(SimpleType),
    /// Complex type definition
    Complex(ComplexType),
}

impl TypeDef {
    /// Name of the definition (zero for anonymous types)
    pub fn name(&self) -> &QName {
        match self {
            TypeDef::Simple(st) => &st.name,
            TypeDef::Complex(ct) => &ct.name,
        }
    }

    /// Mutable access to the name
    pub fn name_mut(&mut self) -> &mut QName {
        match self {
            TypeDef::Simple(st) => &mut st.name,
            TypeDef::Complex(ct) => &mut ct.name,
        }
    }

    /// Check if this is a simple type definition
    pub fn is_simple(&self) -> bool {
        matches!(self, TypeDef::Simple(_))
    }

    /// Check if this is a complex type definition
    pub fn is_complex(&self) -> bool {
        matches!(self, TypeDef::Complex(_))
    }
}

/// A reference to a type from a declaration or a derivation
///
/// The parser produces `Named` and `Inline` references; reference
/// resolution replaces both with `Resolved`.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    /// Reference by qualified name
    Named(QName),
    /// Anonymous type defined in place
    Inline(Box<TypeDef>),
    /// Resolved arena handle
    Resolved(TypeId),
}

impl TypeRef {
    /// Reference by name
    pub fn named(name: QName) -> Self {
        TypeRef::Named(name)
    }

    /// Inline anonymous definition
    pub fn inline(def: TypeDef) -> Self {
        TypeRef::Inline(Box::new(def))
    }

    /// Reference to `xs:anyType`
    pub fn any_type() -> Self {
        TypeRef::Named(QName::xsd("anyType"))
    }

    /// Reference to `xs:anySimpleType`
    pub fn any_simple_type() -> Self {
        TypeRef::Named(QName::xsd("anySimpleType"))
    }

    /// The resolved handle, if resolution has run
    pub fn id(&self) -> Option<TypeId> {
        match self {
            TypeRef::Resolved(id) => Some(*id),
            _ => None,
        }
    }

    /// The referenced name for by-name references
    pub fn name(&self) -> Option<&QName> {
        match self {
            TypeRef::Named(name) => Some(name),
            _ => None,
        }
    }

    /// Check if resolution has run on this reference
    pub fn is_resolved(&self) -> bool {
        matches!(self, TypeRef::Resolved(_))
    }
}

// =============================================================================
// Namespace remapping
// =============================================================================

/// Rewrites names in the empty namespace, as a chameleon include requires
pub trait NamespaceRemap {
    /// Move every empty-namespace name under `namespace`
    fn remap_namespace(&mut self, namespace: &str);
}

impl NamespaceRemap for QName {
    fn remap_namespace(&mut self, namespace: &str) {
        self.remap_empty(namespace);
    }
}

impl<T: NamespaceRemap> NamespaceRemap for Vec<T> {
    fn remap_namespace(&mut self, namespace: &str) {
        for item in self.iter_mut() {
            item.remap_namespace(namespace);
        }
    }
}

impl<T: NamespaceRemap> NamespaceRemap for Option<T> {
    fn remap_namespace(&mut self, namespace: &str) {
        if let Some(item) = self {
            item.remap_namespace(namespace);
        }
    }
}

impl NamespaceRemap for TypeRef {
    fn remap_namespace(&mut self, namespace: &str) {
        match self {
            TypeRef::Named(name) => name.remap_namespace(namespace),
            TypeRef::Inline(def) => def.remap_namespace(namespace),
            TypeRef::Resolved(_) => {}
        }
    }
}

impl NamespaceRemap for TypeDef {
    fn remap_namespace(&mut self, namespace: &str) {
        match self {
            TypeDef::Simple(st) => st.remap_namespace(namespace),
            TypeDef::Complex(ct) => ct.remap_namespace(namespace),
        }
    }
}

// =============================================================================
// Global components
// =============================================================================

/// Kinds of top-level schema components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ComponentKind {
    /// Element declaration
    Element,
    /// Simple or complex type definition
    Type,
    /// Attribute declaration
    Attribute,
    /// Attribute group definition
    AttributeGroup,
    /// Model group definition
    Group,
    /// Notation declaration
    Notation,
}

impl ComponentKind {
    /// Printable name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Element => "element",
            Self::Type => "type",
            Self::Attribute => "attribute",
            Self::AttributeGroup => "attributeGroup",
            Self::Group => "group",
            Self::Notation => "notation",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// XSD Notation declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotationDecl {
    /// Notation name
    pub name: QName,
    /// Public identifier
    pub public: Option<String>,
    /// System identifier
    pub system: Option<String>,
}

impl NotationDecl {
    /// Create a new notation
    pub fn new(name: QName) -> Self {
        Self {
            name,
            public: None,
            system: None,
        }
    }

    /// Set the public identifier
    pub fn with_public(mut self, public: impl Into<String>) -> Self {
        self.public = Some(public.into());
        self
    }

    /// Set the system identifier
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

impl NamespaceRemap for NotationDecl {
    fn remap_namespace(&mut self, namespace: &str) {
        self.name.remap_namespace(namespace);
    }
}

// =============================================================================
// Type arena
// =============================================================================

/// A type definition stored in the arena
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    /// Built-in type from the static table
    Builtin(&'static BuiltinType),
    /// User-defined simple type
    Simple(SimpleType),
    /// User-defined complex type
    Complex(ComplexType),
}

impl TypeDefinition {
    /// Qualified name (zero for anonymous types)
    pub fn qname(&self) -> QName {
        match self {
            TypeDefinition::Builtin(b) => b.qname(),
            TypeDefinition::Simple(st) => st.name.clone(),
            TypeDefinition::Complex(ct) => ct.name.clone(),
        }
    }

    /// Check for a simple type (anyType is complex)
    pub fn is_simple(&self) -> bool {
        match self {
            TypeDefinition::Builtin(b) => b.name != "anyType",
            TypeDefinition::Simple(_) => true,
            TypeDefinition::Complex(_) => false,
        }
    }

    /// Check for a complex type
    pub fn is_complex(&self) -> bool {
        !self.is_simple()
    }

    /// The builtin table entry
    pub fn as_builtin(&self) -> Option<&'static BuiltinType> {
        match self {
            TypeDefinition::Builtin(b) => Some(b),
            _ => None,
        }
    }

    /// The simple type definition
    pub fn as_simple(&self) -> Option<&SimpleType> {
        match self {
            TypeDefinition::Simple(st) => Some(st),
            _ => None,
        }
    }

    /// The complex type definition
    pub fn as_complex(&self) -> Option<&ComplexType> {
        match self {
            TypeDefinition::Complex(ct) => Some(ct),
            _ => None,
        }
    }
}

impl From<TypeDef> for TypeDefinition {
    fn from(def: TypeDef) -> Self {
        match def {
            TypeDef::Simple(st) => TypeDefinition::Simple(st),
            TypeDef::Complex(ct) => TypeDefinition::Complex(ct),
        }
    }
}

/// Owner of every type definition of an assembled schema
///
/// The built-in types occupy the first slots in table order, so
/// [`TypeId::ANY_TYPE`] and [`TypeId::ANY_SIMPLE_TYPE`] are always valid.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeArena {
    types: Vec<TypeDefinition>,
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeArena {
    /// Create an arena holding the built-in types
    pub fn new() -> Self {
        Self {
            types: BUILTIN_TYPES.iter().map(TypeDefinition::Builtin).collect(),
        }
    }

    /// Number of stored types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Always false: the builtins are present
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Look up a type
    pub fn get(&self, id: TypeId) -> Option<&TypeDefinition> {
        self.types.get(id.0)
    }

    /// Mutable lookup
    pub fn get_mut(&mut self, id: TypeId) -> Option<&mut TypeDefinition> {
        self.types.get_mut(id.0)
    }

    /// Iterate over all types with their handles
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeDefinition)> {
        self.types.iter().enumerate().map(|(i, t)| (TypeId(i), t))
    }

    /// Handle of a built-in type by local name
    pub fn builtin(&self, name: &str) -> Option<TypeId> {
        builtin_index(name).map(TypeId)
    }

    /// Handle of a built-in type by qualified name
    pub fn builtin_qname(&self, name: &QName) -> Option<TypeId> {
        if name.is_xsd() {
            self.builtin(&name.local_name)
        } else {
            None
        }
    }

    /// Store a new definition
    pub fn push(&mut self, def: TypeDefinition) -> TypeId {
        self.types.push(def);
        TypeId(self.types.len() - 1)
    }

    /// Reserve a slot to be filled with [`TypeArena::set`]
    pub(crate) fn reserve(&mut self) -> TypeId {
        self.push(TypeDefinition::Builtin(&BUILTIN_TYPES[0]))
    }

    /// Fill a reserved slot
    pub(crate) fn set(&mut self, id: TypeId, def: TypeDefinition) {
        if let Some(slot) = self.types.get_mut(id.0) {
            *slot = def;
        }
    }

    /// Qualified name of a type (zero for anonymous types)
    pub fn qname(&self, id: TypeId) -> QName {
        self.get(id).map(|t| t.qname()).unwrap_or_default()
    }

    /// Name for diagnostics
    pub fn display_name(&self, id: TypeId) -> String {
        let name = self.qname(id);
        if name.is_zero() {
            format!("anonymous type {}", id)
        } else {
            name.to_string()
        }
    }

    /// Check for a simple type
    pub fn is_simple(&self, id: TypeId) -> bool {
        self.get(id).map(|t| t.is_simple()).unwrap_or(false)
    }

    /// Check for a complex type
    pub fn is_complex(&self, id: TypeId) -> bool {
        self.get(id).map(|t| t.is_complex()).unwrap_or(false)
    }

    /// Direct base of a type (None for anyType and unresolved bases)
    pub fn base_of(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id)? {
            TypeDefinition::Builtin(b) => b.base_type.and_then(|name| self.builtin(name)),
            TypeDefinition::Simple(st) => match &st.derivation {
                SimpleDerivation::Restriction { base, .. } => base.id(),
                SimpleDerivation::List { .. } | SimpleDerivation::Union { .. } => {
                    Some(TypeId::ANY_SIMPLE_TYPE)
                }
            },
            TypeDefinition::Complex(ct) => ct.base.id(),
        }
    }

    /// Derivation chain, self first, up to the ur-type or the first repeat
    pub fn chain(&self, id: TypeId) -> Vec<TypeId> {
        let mut chain = vec![id];
        let mut seen = HashSet::from([id]);
        let mut current = id;
        while let Some(base) = self.base_of(current) {
            if !seen.insert(base) {
                break;
            }
            chain.push(base);
            current = base;
        }
        chain
    }

    /// Check if following base links from `id` revisits a type
    pub fn has_cycle(&self, id: TypeId) -> bool {
        let mut seen = HashSet::from([id]);
        let mut current = id;
        while let Some(base) = self.base_of(current) {
            if !seen.insert(base) {
                return true;
            }
            current = base;
        }
        false
    }

    /// Check if `id` is `ancestor` or derives from it
    pub fn is_derived_from(&self, id: TypeId, ancestor: TypeId) -> bool {
        self.chain(id).contains(&ancestor)
    }

    /// Variety of a simple type (None for complex types and the ur-types)
    pub fn variety(&self, id: TypeId) -> Option<SimpleVariety> {
        for t in self.chain(id) {
            match self.get(t)? {
                TypeDefinition::Builtin(b) => {
                    return if b.is_ur_type() {
                        None
                    } else if b.is_list() {
                        Some(SimpleVariety::List)
                    } else {
                        Some(SimpleVariety::Atomic)
                    };
                }
                TypeDefinition::Simple(st) => match st.derivation {
                    SimpleDerivation::List { .. } => return Some(SimpleVariety::List),
                    SimpleDerivation::Union { .. } => return Some(SimpleVariety::Union),
                    SimpleDerivation::Restriction { .. } => {}
                },
                TypeDefinition::Complex(_) => return None,
            }
        }
        None
    }

    /// Nearest built-in ancestor
    pub fn builtin_ancestor(&self, id: TypeId) -> Option<&'static BuiltinType> {
        self.chain(id)
            .into_iter()
            .find_map(|t| self.get(t).and_then(|d| d.as_builtin()))
    }

    /// Primitive type of an atomic simple type
    pub fn primitive_of(&self, id: TypeId) -> Option<&'static BuiltinType> {
        match self.variety(id) {
            Some(SimpleVariety::Atomic) => self.builtin_ancestor(id)?.primitive_type(),
            _ => None,
        }
    }

    /// Facets declared on the type's own derivation step
    pub fn local_facets(&self, id: TypeId) -> &[Facet] {
        match self.get(id) {
            Some(TypeDefinition::Simple(st)) => &st.facets,
            Some(TypeDefinition::Complex(ct)) => match &ct.content {
                ContentType::Simple(sc) => &sc.facets,
                _ => &[],
            },
            _ => &[],
        }
    }

    /// Facets of every step from the root of the chain down to `id`
    pub fn effective_facets(&self, id: TypeId) -> Vec<Facet> {
        let mut result = Vec::new();
        for t in self.chain(id).into_iter().rev() {
            result = inherit_facets(&result, self.local_facets(t));
        }
        result
    }

    /// White space discipline applied to values of a type
    pub fn whitespace_of(&self, id: TypeId) -> WhiteSpace {
        for t in self.chain(id) {
            if let Some(ws) = self.local_facets(t).iter().rev().find_map(|f| match f {
                Facet::WhiteSpace { value, .. } => Some(*value),
                _ => None,
            }) {
                return ws;
            }
            match self.get(t) {
                Some(TypeDefinition::Builtin(b)) => return b.white_space,
                Some(TypeDefinition::Simple(st)) => match st.derivation {
                    SimpleDerivation::List { .. } => return WhiteSpace::Collapse,
                    SimpleDerivation::Union { .. } => return WhiteSpace::Preserve,
                    SimpleDerivation::Restriction { .. } => {}
                },
                _ => {}
            }
        }
        WhiteSpace::Preserve
    }

    /// Item type of a list type
    pub fn item_type_of(&self, id: TypeId) -> Option<TypeId> {
        for t in self.chain(id) {
            match self.get(t)? {
                TypeDefinition::Builtin(b) => return b.item_type.and_then(|n| self.builtin(n)),
                TypeDefinition::Simple(st) => match &st.derivation {
                    SimpleDerivation::List { item, .. } => return item.id(),
                    SimpleDerivation::Union { .. } => return None,
                    SimpleDerivation::Restriction { .. } => {}
                },
                TypeDefinition::Complex(_) => {}
            }
        }
        None
    }

    /// Member types of a union type
    pub fn member_types_of(&self, id: TypeId) -> Vec<TypeId> {
        for t in self.chain(id) {
            if let Some(TypeDefinition::Simple(st)) = self.get(t) {
                match &st.derivation {
                    SimpleDerivation::Union { members } => {
                        return members.iter().filter_map(|m| m.id()).collect();
                    }
                    SimpleDerivation::List { .. } => return Vec::new(),
                    SimpleDerivation::Restriction { .. } => {}
                }
            }
        }
        Vec::new()
    }

    /// `ID`, `IDREF` or `IDREFS` when the type derives from one of them
    pub fn id_type_name(&self, id: TypeId) -> Option<&'static str> {
        let builtin = self.builtin_ancestor(id)?;
        match builtin.name {
            "ID" | "IDREF" | "IDREFS" => Some(builtin.name),
            _ => None,
        }
    }

    /// Check if the type derives from `xs:ID`
    pub fn is_id_type(&self, id: TypeId) -> bool {
        self.id_type_name(id) == Some("ID")
    }

    /// Check if the type derives from `xs:NOTATION`
    pub fn is_notation(&self, id: TypeId) -> bool {
        self.builtin_ancestor(id)
            .map(|b| b.name == "NOTATION")
            .unwrap_or(false)
    }

    /// Simple type of the content of a complex type with simple content
    pub fn simple_content_type(&self, id: TypeId) -> Option<TypeId> {
        let mut current = id;
        for _ in 0..self.types.len() {
            let TypeDefinition::Complex(ct) = self.get(current)? else {
                return None;
            };
            let ContentType::Simple(sc) = &ct.content else {
                return None;
            };
            if let Some(inline) = sc.inline_type.as_ref().and_then(|t| t.id()) {
                return Some(inline);
            }
            let base = ct.base.id()?;
            if self.is_simple(base) {
                return Some(base);
            }
            current = base;
        }
        None
    }
    /// Model groups making up the content of a complex type, base first
    ///
    /// Extension puts the base's content in front of the type's own;
    /// restriction replaces it.
    pub fn content_groups(&self, id: TypeId) -> Vec<&ModelGroup> {
        let mut groups = Vec::new();
        for t in self.chain(id) {
            let Some(TypeDefinition::Complex(ct)) = self.get(t) else {
                break;
            };
            if let Some(group) = ct.model_group().filter(|g| !g.is_empty()) {
                groups.push(group);
            }
            if ct.derivation != DerivationMethod::Extension {
                break;
            }
        }
        groups.reverse();
        groups
    }

    /// Attribute uses of a complex type merged along its derivation chain
    ///
    /// Extension appends to the base's uses; restriction overrides uses of
    /// the same name and drops the prohibited ones.
    pub fn attribute_uses(&self, id: TypeId) -> Vec<AttributeDecl> {
        let mut uses: Vec<AttributeDecl> = Vec::new();
        for t in self.chain(id).into_iter().rev() {
            let Some(TypeDefinition::Complex(ct)) = self.get(t) else {
                continue;
            };
            for attribute in &ct.attributes {
                let name = attribute.effective_name(Form::Unqualified);
                let existing = uses
                    .iter()
                    .position(|u| u.effective_name(Form::Unqualified) == name);
                match (existing, attribute.is_prohibited()) {
                    (Some(i), true) => {
                        uses.remove(i);
                    }
                    (Some(i), false) => uses[i] = attribute.clone(),
                    (None, true) => {}
                    (None, false) => uses.push(attribute.clone()),
                }
            }
        }
        uses
    }

    /// Attribute wildcard of a complex type: the union with the base's for
    /// an extension, the type's own for a restriction
    pub fn attribute_wildcard(&self, id: TypeId) -> Option<Wildcard> {
        let mut wildcard: Option<Wildcard> = None;
        for t in self.chain(id).into_iter().rev() {
            let Some(TypeDefinition::Complex(ct)) = self.get(t) else {
                continue;
            };
            wildcard = match (ct.derivation, wildcard, &ct.any_attribute) {
                (DerivationMethod::Extension, Some(base), Some(own)) => {
                    own.union(&base).or(Some(own.clone()))
                }
                (DerivationMethod::Extension, base, own) => own.clone().or(base),
                (_, _, own) => own.clone(),
            };
        }
        wildcard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::facets::FacetKind;
    use crate::validators::simple_types::SimpleType;

    fn restriction(arena: &mut TypeArena, name: &str, base: TypeId, facets: Vec<Facet>) -> TypeId {
        let mut st = SimpleType::restriction(QName::local(name), TypeRef::Resolved(base));
        st.facets = facets;
        arena.push(TypeDefinition::Simple(st))
    }

    #[test]
    fn test_arena_builtins() {
        let arena = TypeArena::new();
        assert_eq!(arena.qname(TypeId::ANY_TYPE), QName::xsd("anyType"));
        assert_eq!(arena.qname(TypeId::ANY_SIMPLE_TYPE), QName::xsd("anySimpleType"));
        assert!(arena.is_complex(TypeId::ANY_TYPE));
        assert!(arena.is_simple(TypeId::ANY_SIMPLE_TYPE));

        let int = arena.builtin("int").unwrap();
        let decimal = arena.builtin("decimal").unwrap();
        assert!(arena.is_derived_from(int, decimal));
        assert_eq!(arena.chain(int).last(), Some(&TypeId::ANY_TYPE));
        assert_eq!(arena.primitive_of(int).map(|b| b.name), Some("decimal"));
        assert_eq!(arena.variety(int), Some(SimpleVariety::Atomic));
        assert_eq!(arena.variety(TypeId::ANY_SIMPLE_TYPE), None);
    }

    #[test]
    fn test_user_restriction_chain() {
        let mut arena = TypeArena::new();
        let token = arena.builtin("token").unwrap();
        let code = restriction(
            &mut arena,
            "code",
            token,
            vec![Facet::MaxLength { value: 8, fixed: false }],
        );
        let short = restriction(
            &mut arena,
            "short",
            code,
            vec![Facet::MaxLength { value: 4, fixed: false }],
        );

        assert_eq!(arena.base_of(short), Some(code));
        assert_eq!(arena.whitespace_of(short), WhiteSpace::Collapse);
        assert_eq!(arena.primitive_of(short).map(|b| b.name), Some("string"));
        let facets = arena.effective_facets(short);
        assert_eq!(facets.len(), 2);
        assert_eq!(facets[0].count(), Some(8));
        assert_eq!(facets[1].count(), Some(4));
        assert_eq!(facets[1].kind(), FacetKind::MaxLength);
    }

    #[test]
    fn test_cycle_safe_walks() {
        let mut arena = TypeArena::new();
        let a = arena.reserve();
        let b = restriction(&mut arena, "b", a, Vec::new());
        arena.set(
            a,
            TypeDefinition::Simple(SimpleType::restriction(
                QName::local("a"),
                TypeRef::Resolved(b),
            )),
        );
        assert!(arena.has_cycle(a));
        assert_eq!(arena.chain(a), vec![a, b]);
        assert_eq!(arena.variety(a), None);
        assert!(!arena.is_derived_from(a, TypeId::ANY_TYPE));
    }

    #[test]
    fn test_special_builtins() {
        let arena = TypeArena::new();
        let idrefs = arena.builtin("IDREFS").unwrap();
        assert_eq!(arena.variety(idrefs), Some(SimpleVariety::List));
        assert_eq!(arena.item_type_of(idrefs), arena.builtin("IDREF"));
        assert_eq!(arena.id_type_name(idrefs), Some("IDREFS"));
        assert!(arena.is_notation(arena.builtin("NOTATION").unwrap()));
    }

    #[test]
    fn test_attribute_uses_along_chain() {
        use crate::validators::attributes::AttributeUse;
        use crate::validators::complex_types::DerivationMethod;
        use crate::validators::elements::Scope;

        let mut arena = TypeArena::new();
        let attribute = |name: &str| AttributeDecl::new(QName::local(name), Scope::Local);
        let mut base = ComplexType::new(QName::local("base"));
        base.attributes = vec![attribute("a"), attribute("b")];
        let base = arena.push(TypeDefinition::Complex(base));

        let mut extended = ComplexType::new(QName::local("extended"))
            .with_base(TypeRef::Resolved(base), DerivationMethod::Extension);
        extended.attributes = vec![attribute("c")];
        let extended = arena.push(TypeDefinition::Complex(extended));

        let mut restricted = ComplexType::new(QName::local("restricted"))
            .with_base(TypeRef::Resolved(extended), DerivationMethod::Restriction);
        restricted.attributes = vec![
            attribute("a").with_use(AttributeUse::Prohibited),
            attribute("c").with_use(AttributeUse::Required),
        ];
        let restricted = arena.push(TypeDefinition::Complex(restricted));

        let names = |id| -> Vec<String> {
            arena
                .attribute_uses(id)
                .iter()
                .map(|a| a.name.local_name.clone())
                .collect()
        };
        assert_eq!(names(extended), vec!["a", "b", "c"]);
        assert_eq!(names(restricted), vec!["b", "c"]);
        assert_eq!(
            arena.attribute_uses(restricted)[1].use_mode,
            AttributeUse::Required
        );
        assert!(arena.attribute_wildcard(restricted).is_none());
    }
}
