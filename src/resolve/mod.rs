//! Group and reference resolution
//!
//! Turns an assembled [`Schema`] into one where nothing refers to another
//! component by name any more:
//!
//! 1. model group references are replaced by copies of the group bodies
//! 2. attribute group references are replaced by the uses they contribute
//! 3. type definitions move into the arena and type references become handles
//! 4. element and attribute references take the global declaration's properties
//! 5. local declarations without a `form` get the schema default
//! 6. restriction facets are materialized against their resolved base
//!
//! Facets that cannot be materialized are left out here; the structural
//! checks materialize them again and report the failures.

mod attributes;
mod groups;
mod references;
mod types;

use std::collections::HashSet;

use tracing::trace;

use crate::error::Result;
use crate::validators::complex_types::{ComplexType, ContentType, DerivationMethod};
use crate::validators::facets::materialize_facets;
use crate::validators::globals::{TypeArena, TypeDef, TypeDefinition, TypeId, TypeRef};
use crate::validators::groups::{ModelGroup, Particle};
use crate::validators::schemas::{Form, Schema};
use crate::validators::simple_types::SimpleDerivation;

pub use attributes::expand_attribute_groups;
pub use groups::flatten_groups;
pub use references::resolve_references;
pub use types::resolve_types;

/// Resolve every reference of an assembled schema
pub fn resolve_schema(schema: &mut Schema) -> Result<()> {
    flatten_groups(schema)?;
    trace!(groups = schema.groups.len(), "model groups flattened");
    expand_attribute_groups(schema)?;
    resolve_types(schema)?;
    trace!(types = schema.type_ids.len(), arena = schema.arena.len(), "types resolved");
    resolve_references(schema)?;
    bind_forms(schema);
    materialize_all_facets(&mut schema.arena);
    Ok(())
}

/// Visit every complex type definition still held by the schema maps,
/// including anonymous ones at any depth
pub(crate) fn visit_complex_types(
    schema: &mut Schema,
    f: &mut dyn FnMut(&mut ComplexType) -> Result<()>,
) -> Result<()> {
    for def in schema
        .types
        .values_mut()
        .chain(schema.redefined_types.values_mut())
        .chain(schema.group_types.values_mut())
    {
        visit_type_def(def, f)?;
    }
    for decl in schema.elements.values_mut() {
        visit_type_ref(&mut decl.type_ref, f)?;
    }
    for def in schema
        .groups
        .values_mut()
        .chain(schema.redefined_groups.values_mut())
    {
        visit_group(&mut def.group, f)?;
    }
    Ok(())
}

fn visit_type_ref(
    type_ref: &mut TypeRef,
    f: &mut dyn FnMut(&mut ComplexType) -> Result<()>,
) -> Result<()> {
    match type_ref {
        TypeRef::Inline(def) => visit_type_def(def, f),
        _ => Ok(()),
    }
}

fn visit_type_def(def: &mut TypeDef, f: &mut dyn FnMut(&mut ComplexType) -> Result<()>) -> Result<()> {
    if let TypeDef::Complex(ct) = def {
        f(ct)?;
        if let ContentType::Elements(group) = &mut ct.content {
            visit_group(group, f)?;
        }
    }
    Ok(())
}

fn visit_group(
    group: &mut ModelGroup,
    f: &mut dyn FnMut(&mut ComplexType) -> Result<()>,
) -> Result<()> {
    for particle in &mut group.particles {
        match particle {
            Particle::Element(decl) => visit_type_ref(&mut decl.type_ref, f)?,
            Particle::Group(inner) => visit_group(inner, f)?,
            Particle::Any(_) | Particle::GroupRef(_) => {}
        }
    }
    Ok(())
}

/// Give local declarations without a `form` the root schema's default
fn bind_forms(schema: &mut Schema) {
    let element_form = schema.element_form_default;
    let attribute_form = schema.attribute_form_default;
    for index in 0..schema.arena.len() {
        let Some(TypeDefinition::Complex(ct)) = schema.arena.get_mut(TypeId(index)) else {
            continue;
        };
        bind_attribute_forms(ct, attribute_form);
        if let ContentType::Elements(group) = &mut ct.content {
            group.for_each_element_mut(&mut |decl| {
                if !decl.reference && decl.form.is_none() {
                    decl.form = Some(element_form);
                }
            });
        }
    }
    for def in schema.attribute_groups.values_mut() {
        for attribute in &mut def.attributes {
            if !attribute.reference && attribute.form.is_none() {
                attribute.form = Some(attribute_form);
            }
        }
    }
}

fn bind_attribute_forms(ct: &mut ComplexType, form: Form) {
    for attribute in &mut ct.attributes {
        if !attribute.reference && attribute.form.is_none() {
            attribute.form = Some(form);
        }
    }
}

/// Materialize the restriction facets of every type, bases first
fn materialize_all_facets(arena: &mut TypeArena) {
    let mut done = HashSet::new();
    for index in 0..arena.len() {
        materialize_type(arena, TypeId(index), &mut done);
    }
}

fn materialize_type(arena: &mut TypeArena, id: TypeId, done: &mut HashSet<TypeId>) {
    if !done.insert(id) {
        return;
    }
    if let Some(base) = arena.base_of(id) {
        materialize_type(arena, base, done);
    }

    let facets = match arena.get(id) {
        Some(TypeDefinition::Simple(st)) => match &st.derivation {
            SimpleDerivation::Restriction { base, facets } if !facets.is_empty() => {
                base.id().map(|base| {
                    materialize_facets(facets, arena.primitive_of(base), arena.whitespace_of(base))
                        .0
                })
            }
            _ => None,
        },
        Some(TypeDefinition::Complex(ct)) => match &ct.content {
            ContentType::Simple(sc)
                if ct.derivation == DerivationMethod::Restriction && !sc.deferred.is_empty() =>
            {
                let content_base = sc
                    .inline_type
                    .as_ref()
                    .and_then(|t| t.id())
                    .or_else(|| ct.base.id().and_then(|b| content_type_of(arena, b)));
                if let Some(content_base) = content_base {
                    materialize_type(arena, content_base, done);
                }
                let Some(TypeDefinition::Complex(ct)) = arena.get(id) else {
                    return;
                };
                let ContentType::Simple(sc) = &ct.content else {
                    return;
                };
                content_base.map(|base| {
                    materialize_facets(
                        &sc.deferred,
                        arena.primitive_of(base),
                        arena.whitespace_of(base),
                    )
                    .0
                })
            }
            _ => None,
        },
        _ => None,
    };

    let Some(facets) = facets else {
        return;
    };
    match arena.get_mut(id) {
        Some(TypeDefinition::Simple(st)) => st.facets = facets,
        Some(TypeDefinition::Complex(ct)) => {
            if let ContentType::Simple(sc) = &mut ct.content {
                sc.facets = facets;
            }
        }
        _ => {}
    }
}

/// Simple type constraining the character content of `id`
pub(crate) fn content_type_of(arena: &TypeArena, id: TypeId) -> Option<TypeId> {
    if arena.is_simple(id) {
        Some(id)
    } else {
        arena.simple_content_type(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::MemoryResolver;
    use crate::loader::SchemaLoader;
    use crate::namespaces::QName;
    use crate::validators::facets::Facet;

    const XS: &str = r#"xmlns:xs="http://www.w3.org/2001/XMLSchema""#;

    fn resolved(body: &str) -> Schema {
        let text = format!(
            r#"<xs:schema {} targetNamespace="urn:t" xmlns:t="urn:t" elementFormDefault="qualified">{}</xs:schema>"#,
            XS, body
        );
        let loader = SchemaLoader::new(MemoryResolver::new().with_document("t.xsd", text));
        let mut schema = loader.assemble("t.xsd").unwrap();
        resolve_schema(&mut schema).unwrap();
        schema
    }

    #[test]
    fn test_resolve_binds_forms_and_groups() {
        let schema = resolved(
            r#"<xs:group name="g"><xs:sequence><xs:element name="a" type="xs:int"/></xs:sequence></xs:group>
               <xs:attributeGroup name="ag"><xs:attribute name="x" type="xs:string"/></xs:attributeGroup>
               <xs:complexType name="t">
                 <xs:sequence><xs:group ref="t:g"/><xs:element ref="t:top"/></xs:sequence>
                 <xs:attributeGroup ref="t:ag"/>
               </xs:complexType>
               <xs:element name="top" type="xs:string"/>"#,
        );
        let id = schema.type_id(&QName::new("urn:t", "t")).unwrap();
        let ct = schema.arena.get(id).and_then(|t| t.as_complex()).unwrap();
        let group = ct.model_group().unwrap();
        assert!(!group.has_group_refs());
        let elements = group.element_particles();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].form, Some(Form::Qualified));
        assert_eq!(elements[0].type_id(), schema.arena.builtin("int"));
        assert_eq!(elements[1].type_id(), schema.arena.builtin("string"));
        assert_eq!(ct.attributes.len(), 1);
        assert_eq!(ct.attributes[0].form, Some(Form::Unqualified));
    }

    #[test]
    fn test_resolve_materializes_facets() {
        let schema = resolved(
            r#"<xs:simpleType name="small">
                 <xs:restriction base="xs:int"><xs:maxInclusive value="100"/></xs:restriction>
               </xs:simpleType>
               <xs:complexType name="price">
                 <xs:simpleContent>
                   <xs:extension base="t:small"><xs:attribute name="cur" type="xs:string"/></xs:extension>
                 </xs:simpleContent>
               </xs:complexType>
               <xs:complexType name="cheap">
                 <xs:simpleContent>
                   <xs:restriction base="t:price"><xs:maxInclusive value="10"/></xs:restriction>
                 </xs:simpleContent>
               </xs:complexType>"#,
        );
        let small = schema.type_id(&QName::new("urn:t", "small")).unwrap();
        assert!(matches!(
            schema.arena.local_facets(small),
            [Facet::MaxInclusive(b)] if b.lexical == "100"
        ));
        let cheap = schema.type_id(&QName::new("urn:t", "cheap")).unwrap();
        assert_eq!(schema.arena.local_facets(cheap).len(), 1);
        let price = schema.type_id(&QName::new("urn:t", "price")).unwrap();
        assert_eq!(content_type_of(&schema.arena, price), Some(small));
    }
}
