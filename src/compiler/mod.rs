//! Content-model compilation
//!
//! [`compile_schema`] turns a checked schema into a [`CompiledSchema`]. Every
//! type of the arena gets a [`CompiledType`] with its derivation chain,
//! merged attribute uses and a content model in which group references are
//! gone and the content of an extension follows its base's. Global elements,
//! substitution groups, local elements and constraint-bearing elements are
//! indexed afterwards.
//!
//! Types are compiled depth first through their bases, item and member types
//! and the types of their elements. A placeholder goes into the table before
//! any of these is visited, so a type reached again through its own content
//! is not compiled twice.

pub mod index;
pub mod model;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use crate::error::{Error, ErrorKind, Result};
use crate::namespaces::QName;
use crate::validators::attributes::AttributeDecl;
use crate::validators::builtins::BuiltinType;
use crate::validators::complex_types::{ComplexType, ContentType, DerivationMethod};
use crate::validators::elements::ElementDecl;
use crate::validators::globals::{NotationDecl, TypeArena, TypeDefinition, TypeId};
use crate::validators::groups::{ModelGroup, ModelGroupKind, Particle};
use crate::validators::particles::Occurs;
use crate::validators::schemas::{Form, Schema};
use crate::validators::simple_types::{SimpleDerivation, SimpleType};
use crate::validators::wildcards::{ProcessContents, Wildcard};

pub use model::{
    CompiledContentModel, CompiledElement, CompiledParticle, CompiledType, ConstrainedElement,
    ContentKind, ElementParticle, TypeKind,
};

/// A schema ready for instance validation
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSchema {
    /// Target namespace of the root document
    pub target_namespace: String,
    /// System id of the root document
    pub system_id: String,
    /// Named types
    pub types: IndexMap<QName, TypeId>,
    /// Global elements
    pub elements: IndexMap<QName, CompiledElement>,
    /// Global attributes
    pub attributes: IndexMap<QName, AttributeDecl>,
    /// Notations
    pub notations: IndexMap<QName, NotationDecl>,
    /// Transitive members of every substitution group head
    pub substitution_groups: IndexMap<QName, IndexSet<QName>>,
    /// Types of local element declarations by the name instances carry
    pub local_elements: IndexMap<QName, Vec<TypeId>>,
    /// Elements holding identity constraints
    pub constrained_elements: Vec<ConstrainedElement>,
    table: Vec<CompiledType>,
    arena: TypeArena,
}

impl CompiledSchema {
    /// Compiled type by handle
    pub fn get_type(&self, id: TypeId) -> Option<&CompiledType> {
        self.table.get(id.index())
    }

    /// Compiled named type
    pub fn type_by_name(&self, name: &QName) -> Option<&CompiledType> {
        self.types
            .get(name)
            .copied()
            .or_else(|| self.arena.builtin_qname(name))
            .and_then(|id| self.get_type(id))
    }

    /// Global element by name
    pub fn element(&self, name: &QName) -> Option<&CompiledElement> {
        self.elements.get(name)
    }

    /// Type of a global element
    pub fn element_type(&self, name: &QName) -> Option<&CompiledType> {
        self.element(name).and_then(|e| self.get_type(e.type_id))
    }

    /// Every compiled type, builtins first
    pub fn iter_types(&self) -> impl Iterator<Item = &CompiledType> {
        self.table.iter()
    }

    /// Elements that may stand for `head`
    pub fn substitutes(&self, head: &QName) -> impl Iterator<Item = &QName> {
        self.substitution_groups.get(head).into_iter().flatten()
    }

    /// Check if `member` may stand for `head`
    pub fn can_substitute(&self, member: &QName, head: &QName) -> bool {
        member == head
            || self
                .substitution_groups
                .get(head)
                .map(|members| members.contains(member))
                .unwrap_or(false)
    }

    /// Types of the local elements instances may name `name`
    pub fn local_element_types(&self, name: &QName) -> &[TypeId] {
        self.local_elements
            .get(name)
            .map(|types| types.as_slice())
            .unwrap_or(&[])
    }

    /// Type definitions the compiled types were built from
    pub fn arena(&self) -> &TypeArena {
        &self.arena
    }
}

/// Compile a resolved and checked schema
pub fn compile_schema(schema: Schema) -> Result<CompiledSchema> {
    let mut compiler = Compiler::new(&schema);
    for (id, _) in schema.arena.iter() {
        compiler.compile(id)?;
    }
    let mut elements = IndexMap::new();
    for (name, decl) in &schema.elements {
        elements.insert(name.clone(), compiler.global_element(decl)?);
    }
    let table = compiler.finish()?;

    let substitution_groups = index::substitution_closure(&schema.substitution_groups);
    let local_elements = index::local_elements(&schema);
    let constrained_elements = index::constrained_elements(&schema);
    debug!(
        types = table.len(),
        elements = elements.len(),
        heads = substitution_groups.len(),
        "content models compiled"
    );

    Ok(CompiledSchema {
        target_namespace: schema.target_namespace,
        system_id: schema.system_id,
        types: schema.type_ids,
        elements,
        attributes: schema.attributes,
        notations: schema.notations,
        substitution_groups,
        local_elements,
        constrained_elements,
        table,
        arena: schema.arena,
    })
}

struct Compiler<'s> {
    schema: &'s Schema,
    arena: &'s TypeArena,
    table: Vec<Option<CompiledType>>,
}

impl<'s> Compiler<'s> {
    fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            arena: &schema.arena,
            table: vec![None; schema.arena.len()],
        }
    }

    fn finish(self) -> Result<Vec<CompiledType>> {
        self.table
            .into_iter()
            .enumerate()
            .map(|(i, t)| t.ok_or_else(|| unknown_type(&format!("type {}", TypeId(i)))))
            .collect()
    }

    fn compile(&mut self, id: TypeId) -> Result<()> {
        let arena = self.arena;
        let slot = self
            .table
            .get_mut(id.index())
            .ok_or_else(|| unknown_type(&format!("type {}", id)))?;
        if slot.is_some() {
            return Ok(());
        }
        let def = arena
            .get(id)
            .ok_or_else(|| unknown_type(&format!("type {}", id)))?;
        let kind = match def {
            TypeDefinition::Builtin(_) => TypeKind::Builtin,
            TypeDefinition::Simple(_) => TypeKind::Simple,
            TypeDefinition::Complex(_) => TypeKind::Complex,
        };
        *slot = Some(CompiledType::placeholder(id, def.qname(), kind));
        trace!(type_name = %arena.display_name(id), "compiling type");

        let compiled = match def {
            TypeDefinition::Builtin(builtin) => self.builtin(id, builtin)?,
            TypeDefinition::Simple(st) => self.simple(id, st)?,
            TypeDefinition::Complex(ct) => self.complex(id, ct)?,
        };
        self.table[id.index()] = Some(compiled);
        Ok(())
    }

    fn builtin(&mut self, id: TypeId, builtin: &BuiltinType) -> Result<CompiledType> {
        let arena = self.arena;
        let base = arena.base_of(id);
        if let Some(base) = base {
            self.compile(base)?;
        }
        let item_type = arena.item_type_of(id);
        if let Some(item) = item_type {
            self.compile(item)?;
        }

        let mut compiled = CompiledType::placeholder(id, builtin.qname(), TypeKind::Builtin);
        compiled.base = base;
        compiled.derivation = base.map(|_| {
            if builtin.is_list() {
                DerivationMethod::List
            } else {
                DerivationMethod::Restriction
            }
        });
        compiled.chain = arena.chain(id);
        compiled.primitive = builtin.primitive;
        compiled.is_notation = builtin.name == "NOTATION";
        compiled.id_type_name = arena.id_type_name(id);
        compiled.item_type = item_type;
        compiled.facets = arena.effective_facets(id);
        if id == TypeId::ANY_TYPE {
            let wildcard = Wildcard {
                process_contents: ProcessContents::Lax,
                ..Wildcard::any()
            };
            compiled.any_attribute = Some(wildcard.clone());
            compiled.content = Some(CompiledContentModel::new(
                ContentKind::Sequence,
                Occurs::once(),
                vec![CompiledParticle::Wildcard(
                    wildcard.with_occurs(Occurs::zero_or_more()),
                )],
                true,
            ));
        }
        Ok(compiled)
    }

    fn simple(&mut self, id: TypeId, st: &SimpleType) -> Result<CompiledType> {
        let arena = self.arena;
        let base = arena.base_of(id).unwrap_or(TypeId::ANY_SIMPLE_TYPE);
        self.compile(base)?;
        let item_type = arena.item_type_of(id);
        if let Some(item) = item_type {
            self.compile(item)?;
        }
        let member_types = arena.member_types_of(id);
        for member in &member_types {
            self.compile(*member)?;
        }

        let mut compiled = CompiledType::placeholder(id, st.name.clone(), TypeKind::Simple);
        compiled.base = Some(base);
        compiled.derivation = Some(match st.derivation {
            SimpleDerivation::Restriction { .. } => DerivationMethod::Restriction,
            SimpleDerivation::List { .. } => DerivationMethod::List,
            SimpleDerivation::Union { .. } => DerivationMethod::Union,
        });
        compiled.chain = arena.chain(id);
        compiled.primitive = arena.primitive_of(id).map(|b| b.name);
        compiled.is_notation = arena.is_notation(id);
        compiled.id_type_name = arena.id_type_name(id);
        compiled.item_type = item_type;
        compiled.member_types = member_types;
        compiled.facets = arena.effective_facets(id);
        Ok(compiled)
    }

    fn complex(&mut self, id: TypeId, ct: &ComplexType) -> Result<CompiledType> {
        let arena = self.arena;
        let base = ct.base.id().unwrap_or(TypeId::ANY_TYPE);
        self.compile(base)?;

        let mut compiled = CompiledType::placeholder(id, ct.name.clone(), TypeKind::Complex);
        compiled.base = Some(base);
        compiled.derivation = Some(ct.derivation);
        compiled.chain = arena.chain(id);
        compiled.attributes = arena.attribute_uses(id);
        compiled.any_attribute = arena.attribute_wildcard(id);
        compiled.abstract_type = ct.abstract_type;
        compiled.block = ct.block;
        for attribute in &compiled.attributes {
            if let Some(type_id) = attribute.type_id() {
                self.compile(type_id)?;
            }
        }

        if let ContentType::Simple(_) = ct.content {
            let content_type = arena.simple_content_type(id).ok_or_else(|| {
                unknown_type(&format!("simple content of '{}'", arena.display_name(id)))
            })?;
            self.compile(content_type)?;
            compiled.simple_content_type = Some(content_type);
            compiled.primitive = arena.primitive_of(content_type).map(|b| b.name);
            compiled.facets = arena.effective_facets(content_type);
        } else {
            let groups = arena.content_groups(id);
            compiled.content = Some(self.content(&groups, ct.mixed)?);
        }
        Ok(compiled)
    }

    /// Content model of a type; the groups of an extension chain become one
    /// sequence, base first
    fn content(&mut self, groups: &[&ModelGroup], mixed: bool) -> Result<CompiledContentModel> {
        match groups {
            [] => Ok(CompiledContentModel::new(
                ContentKind::Empty,
                Occurs::once(),
                Vec::new(),
                mixed,
            )),
            [only] => Ok(CompiledContentModel::new(
                only.kind.into(),
                only.occurs,
                self.particles(only)?,
                mixed,
            )),
            groups => {
                let mut particles = Vec::new();
                for group in groups {
                    if group.kind == ModelGroupKind::Sequence && group.occurs == Occurs::once() {
                        particles.extend(self.particles(group)?);
                    } else {
                        particles.push(self.group(group)?);
                    }
                }
                Ok(CompiledContentModel::new(
                    ContentKind::Sequence,
                    Occurs::once(),
                    particles,
                    mixed,
                ))
            }
        }
    }

    fn particles(&mut self, group: &ModelGroup) -> Result<Vec<CompiledParticle>> {
        group.particles.iter().map(|p| self.particle(p)).collect()
    }

    fn group(&mut self, group: &ModelGroup) -> Result<CompiledParticle> {
        Ok(CompiledParticle::Group {
            kind: group.kind,
            occurs: group.occurs,
            particles: self.particles(group)?,
        })
    }

    fn particle(&mut self, particle: &Particle) -> Result<CompiledParticle> {
        match particle {
            Particle::Element(decl) => {
                let type_id = self.element_type(decl)?;
                self.compile(type_id)?;
                Ok(CompiledParticle::Element(ElementParticle {
                    name: decl.effective_name(Form::Unqualified),
                    type_id,
                    occurs: decl.occurs,
                    global: decl.reference,
                    nillable: decl.nillable,
                    abstract_element: decl.abstract_element,
                    default: decl.default.clone(),
                    fixed: decl.fixed.clone(),
                }))
            }
            Particle::Any(wildcard) => Ok(CompiledParticle::Wildcard(wildcard.clone())),
            Particle::Group(group) => self.group(group),
            Particle::GroupRef(reference) => Err(Error::schema(
                ErrorKind::UnknownGroup,
                format!("group reference '{}' was not expanded", reference.name),
            )),
        }
    }

    /// Type of an element particle, looking through references
    fn element_type(&self, decl: &ElementDecl) -> Result<TypeId> {
        decl.type_id()
            .or_else(|| {
                decl.reference
                    .then(|| self.schema.elements.get(&decl.name))
                    .flatten()
                    .and_then(|global| global.type_id())
            })
            .ok_or_else(|| unknown_type(&format!("type of element '{}'", decl.name)))
    }

    fn global_element(&mut self, decl: &ElementDecl) -> Result<CompiledElement> {
        let type_id = self.element_type(decl)?;
        self.compile(type_id)?;
        Ok(CompiledElement {
            name: decl.name.clone(),
            type_id,
            nillable: decl.nillable,
            abstract_element: decl.abstract_element,
            default: decl.default.clone(),
            fixed: decl.fixed.clone(),
            block: decl.block,
            final_deriv: decl.final_deriv,
            substitution_group: decl.substitution_group.clone(),
            constraints: decl.constraints.clone(),
        })
    }
}

fn unknown_type(what: &str) -> Error {
    Error::schema(ErrorKind::UnknownType, format!("{} is not resolved", what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::SchemaLoader;
    use crate::loaders::MemoryResolver;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const NS: &str = "urn:t";

    fn compile(body: &str) -> Arc<CompiledSchema> {
        let text = format!(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t" xmlns:t="urn:t" elementFormDefault="qualified">{}</xs:schema>"#,
            body
        );
        let mut loader = SchemaLoader::new(MemoryResolver::new().with_document("t.xsd", text));
        loader.load("t.xsd").unwrap()
    }

    fn names(model: &CompiledContentModel) -> Vec<&str> {
        model
            .all_elements
            .iter()
            .map(|n| n.local_name.as_str())
            .collect()
    }

    #[test]
    fn test_extension_follows_base_content() {
        let compiled = compile(
            r#"<xs:complexType name="base">
                 <xs:sequence>
                   <xs:element name="a"/>
                   <xs:element name="b"/>
                 </xs:sequence>
                 <xs:attribute name="x" type="xs:string"/>
               </xs:complexType>
               <xs:complexType name="derived">
                 <xs:complexContent>
                   <xs:extension base="t:base">
                     <xs:choice>
                       <xs:element name="c"/>
                       <xs:element name="d"/>
                     </xs:choice>
                     <xs:attribute name="y" type="xs:int"/>
                   </xs:extension>
                 </xs:complexContent>
               </xs:complexType>"#,
        );
        let derived = compiled.type_by_name(&QName::new(NS, "derived")).unwrap();
        let content = derived.content.as_ref().unwrap();
        assert_eq!(content.kind, ContentKind::Sequence);
        assert_eq!(names(content), vec!["a", "b", "c", "d"]);
        assert_eq!(content.particles.len(), 3);
        assert!(matches!(
            content.particles[2],
            CompiledParticle::Group {
                kind: ModelGroupKind::Choice,
                ..
            }
        ));
        let attributes: Vec<&str> = derived
            .attributes
            .iter()
            .map(|a| a.name.local_name.as_str())
            .collect();
        assert_eq!(attributes, vec!["x", "y"]);
        let base = compiled.types[&QName::new(NS, "base")];
        assert_eq!(derived.chain, vec![derived.id, base, TypeId::ANY_TYPE]);
    }

    #[test]
    fn test_group_references_are_flattened() {
        let compiled = compile(
            r#"<xs:group name="g">
                 <xs:sequence>
                   <xs:element name="a"/>
                   <xs:element name="b" minOccurs="0"/>
                 </xs:sequence>
               </xs:group>
               <xs:complexType name="t">
                 <xs:sequence>
                   <xs:group ref="t:g"/>
                   <xs:element name="c"/>
                 </xs:sequence>
               </xs:complexType>"#,
        );
        let t = compiled.type_by_name(&QName::new(NS, "t")).unwrap();
        let content = t.content.as_ref().unwrap();
        assert_eq!(names(content), vec!["a", "b", "c"]);
        assert!(content.has_element(&QName::new(NS, "b")));
    }

    #[test]
    fn test_recursive_type() {
        let compiled = compile(
            r#"<xs:complexType name="node">
                 <xs:sequence>
                   <xs:element name="node" type="t:node" minOccurs="0" maxOccurs="unbounded"/>
                 </xs:sequence>
               </xs:complexType>
               <xs:element name="tree" type="t:node"/>"#,
        );
        let node = compiled.types[&QName::new(NS, "node")];
        let tree = compiled.element(&QName::new(NS, "tree")).unwrap();
        assert_eq!(tree.type_id, node);
        let content = compiled.get_type(node).unwrap().content.as_ref().unwrap();
        match &content.particles[0] {
            CompiledParticle::Element(e) => assert_eq!(e.type_id, node),
            other => panic!("unexpected particle {:?}", other),
        }
        assert_eq!(compiled.local_element_types(&QName::new(NS, "node")), &[node]);
    }

    #[test]
    fn test_simple_types_and_content() {
        let compiled = compile(
            r#"<xs:simpleType name="code">
                 <xs:restriction base="xs:ID">
                   <xs:maxLength value="8"/>
                 </xs:restriction>
               </xs:simpleType>
               <xs:simpleType name="codes">
                 <xs:list itemType="t:code"/>
               </xs:simpleType>
               <xs:complexType name="price">
                 <xs:simpleContent>
                   <xs:extension base="xs:decimal">
                     <xs:attribute name="currency" type="xs:string"/>
                   </xs:extension>
                 </xs:simpleContent>
               </xs:complexType>
               <xs:complexType name="discount">
                 <xs:simpleContent>
                   <xs:extension base="t:price"/>
                 </xs:simpleContent>
               </xs:complexType>"#,
        );
        let code = compiled.type_by_name(&QName::new(NS, "code")).unwrap();
        assert_eq!(code.id_type_name, Some("ID"));
        assert_eq!(code.primitive, Some("string"));
        assert_eq!(code.derivation, Some(DerivationMethod::Restriction));
        let codes = compiled.type_by_name(&QName::new(NS, "codes")).unwrap();
        assert_eq!(codes.item_type, Some(code.id));
        assert_eq!(codes.derivation, Some(DerivationMethod::List));

        let decimal = compiled.arena().builtin("decimal").unwrap();
        let discount = compiled.type_by_name(&QName::new(NS, "discount")).unwrap();
        assert_eq!(discount.simple_content_type, Some(decimal));
        assert!(discount.content.is_none());
        assert_eq!(discount.attributes.len(), 1);
    }

    #[test]
    fn test_builtins() {
        let compiled = compile("");
        let any = compiled.get_type(TypeId::ANY_TYPE).unwrap();
        assert!(any.content.as_ref().unwrap().is_emptiable());
        assert!(any.any_attribute.is_some());
        let notation = compiled.type_by_name(&QName::xsd("NOTATION")).unwrap();
        assert!(notation.is_notation);
        let idrefs = compiled.type_by_name(&QName::xsd("IDREFS")).unwrap();
        assert_eq!(idrefs.derivation, Some(DerivationMethod::List));
        assert_eq!(idrefs.id_type_name, Some("IDREFS"));
    }

    #[test]
    fn test_indexes() {
        let compiled = compile(
            r#"<xs:element name="head" type="xs:string"/>
               <xs:element name="m1" substitutionGroup="t:head"/>
               <xs:element name="m2" substitutionGroup="t:m1"/>
               <xs:element name="root">
                 <xs:complexType>
                   <xs:sequence>
                     <xs:element name="item" maxOccurs="unbounded">
                       <xs:complexType>
                         <xs:attribute name="id" type="xs:string"/>
                       </xs:complexType>
                     </xs:element>
                   </xs:sequence>
                 </xs:complexType>
                 <xs:unique name="ids">
                   <xs:selector xpath="t:item"/>
                   <xs:field xpath="@id"/>
                 </xs:unique>
               </xs:element>"#,
        );
        let head = QName::new(NS, "head");
        let members: Vec<&str> = compiled
            .substitutes(&head)
            .map(|n| n.local_name.as_str())
            .collect();
        assert_eq!(members, vec!["m1", "m2"]);
        assert!(compiled.can_substitute(&QName::new(NS, "m2"), &head));
        assert!(!compiled.can_substitute(&head, &QName::new(NS, "m1")));
        assert_eq!(compiled.constrained_elements.len(), 1);
        assert_eq!(compiled.constrained_elements[0].name, QName::new(NS, "root"));
        assert_eq!(compiled.local_element_types(&QName::new(NS, "item")).len(), 1);
    }
}
