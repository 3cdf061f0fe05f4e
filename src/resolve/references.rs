//! Element and attribute references
//!
//! A reference particle or attribute use takes the properties of the
//! global declaration it names. Global elements without a type of their own
//! take the type of their substitution group head.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind, Result, SchemaError};
use crate::namespaces::QName;
use crate::validators::attributes::AttributeDecl;
use crate::validators::complex_types::ContentType;
use crate::validators::elements::{ElementDecl, Scope};
use crate::validators::globals::{TypeDefinition, TypeId, TypeRef};
use crate::validators::schemas::Schema;
use crate::XML_NAMESPACE;

/// Resolve every element and attribute reference of the schema
pub fn resolve_references(schema: &mut Schema) -> Result<()> {
    substitution_head_types(schema)?;

    let attributes = global_attributes(schema);
    let elements = &schema.elements;
    for index in 0..schema.arena.len() {
        let Some(TypeDefinition::Complex(ct)) = schema.arena.get_mut(TypeId(index)) else {
            continue;
        };
        for attribute in ct.attributes.iter_mut().filter(|a| a.reference) {
            attribute_reference(attribute, &attributes)?;
        }
        if let ContentType::Elements(group) = &mut ct.content {
            let mut failure = None;
            group.for_each_element_mut(&mut |decl| {
                if decl.reference && failure.is_none() {
                    if let Err(e) = element_reference(decl, elements) {
                        failure = Some(e);
                    }
                }
            });
            if let Some(e) = failure {
                return Err(e);
            }
        }
    }

    for def in schema
        .attribute_groups
        .values_mut()
        .chain(schema.redefined_attribute_groups.values_mut())
    {
        for attribute in def.attributes.iter_mut().filter(|a| a.reference) {
            attribute_reference(attribute, &attributes)?;
        }
    }
    Ok(())
}

/// Global attributes by name, with the `xml:` attributes available even
/// when the XML namespace schema is not imported
fn global_attributes(schema: &Schema) -> HashMap<QName, AttributeDecl> {
    let mut result: HashMap<QName, AttributeDecl> = schema
        .attributes
        .iter()
        .map(|(name, decl)| (name.clone(), decl.clone()))
        .collect();
    for (local, type_name) in [
        ("lang", "language"),
        ("space", "NCName"),
        ("base", "anyURI"),
        ("id", "ID"),
    ] {
        let name = QName::new(XML_NAMESPACE, local);
        if result.contains_key(&name) {
            continue;
        }
        if let Some(id) = schema.arena.builtin(type_name) {
            let decl =
                AttributeDecl::new(name.clone(), Scope::Global).with_type(TypeRef::Resolved(id));
            result.insert(name, decl);
        }
    }
    result
}

fn attribute_reference(
    attribute: &mut AttributeDecl,
    globals: &HashMap<QName, AttributeDecl>,
) -> Result<()> {
    let global = globals.get(&attribute.name).ok_or_else(|| {
        Error::Schema(
            SchemaError::new(
                ErrorKind::UnknownAttribute,
                format!("unknown attribute '{}'", attribute.name),
            )
            .with_component(attribute.name.to_string()),
        )
    })?;
    attribute.type_ref = global.type_ref.clone();
    if attribute.default.is_none() && attribute.fixed.is_none() {
        attribute.fixed = global.fixed.clone();
        attribute.default = global.default.clone();
    }
    attribute.source_namespace = global.source_namespace.clone();
    Ok(())
}

fn element_reference(decl: &mut ElementDecl, globals: &IndexMap<QName, ElementDecl>) -> Result<()> {
    let global = globals.get(&decl.name).ok_or_else(|| unknown_element(&decl.name))?;
    decl.type_ref = global.type_ref.clone();
    decl.explicit_type = global.explicit_type;
    decl.nillable = global.nillable;
    decl.abstract_element = global.abstract_element;
    decl.default = global.default.clone();
    decl.fixed = global.fixed.clone();
    decl.block = global.block;
    decl.final_deriv = global.final_deriv;
    decl.substitution_group = global.substitution_group.clone();
    Ok(())
}

fn unknown_element(name: &QName) -> Error {
    Error::Schema(
        SchemaError::new(ErrorKind::UnknownElement, format!("unknown element '{}'", name))
            .with_component(name.to_string()),
    )
}

/// Give substitution group members without a declared type the type of
/// their head, following chains of heads
fn substitution_head_types(schema: &mut Schema) -> Result<()> {
    for decl in schema.elements.values() {
        if let Some(head) = &decl.substitution_group {
            if !schema.elements.contains_key(head) {
                return Err(unknown_element(head));
            }
        }
    }

    for _ in 0..schema.elements.len() {
        let updates: Vec<(QName, TypeRef)> = schema
            .elements
            .values()
            .filter(|decl| !decl.explicit_type)
            .filter_map(|decl| {
                let head = schema.elements.get(decl.substitution_group.as_ref()?)?;
                (head.type_ref != decl.type_ref).then(|| (decl.name.clone(), head.type_ref.clone()))
            })
            .collect();
        if updates.is_empty() {
            break;
        }
        for (name, type_ref) in updates {
            if let Some(decl) = schema.elements.get_mut(&name) {
                decl.type_ref = type_ref;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::complex_types::ComplexType;
    use crate::validators::groups::{ModelGroup, Particle};
    use crate::validators::particles::Occurs;

    fn global(schema: &mut Schema, name: &str, type_name: Option<&str>) {
        let mut decl = ElementDecl::new(QName::new("urn:t", name), Scope::Global);
        if let Some(t) = type_name {
            let id = schema.arena.builtin(t).unwrap();
            decl = decl.with_type(TypeRef::Resolved(id));
        } else {
            decl.type_ref = TypeRef::Resolved(TypeId::ANY_TYPE);
        }
        schema.elements.insert(decl.name.clone(), decl);
    }

    #[test]
    fn test_substitution_chain_takes_head_type() {
        let mut schema = Schema::new("urn:t", "mem:/a.xsd");
        global(&mut schema, "head", Some("int"));
        global(&mut schema, "middle", None);
        global(&mut schema, "leaf", None);
        schema.elements[1].substitution_group = Some(QName::new("urn:t", "head"));
        schema.elements[2].substitution_group = Some(QName::new("urn:t", "middle"));

        resolve_references(&mut schema).unwrap();
        let int = schema.arena.builtin("int");
        assert_eq!(schema.elements[2].type_id(), int);
        assert_eq!(schema.elements[1].type_id(), int);

        schema.elements[0].substitution_group = Some(QName::new("urn:t", "nowhere"));
        let err = resolve_references(&mut schema).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::UnknownElement));
    }

    #[test]
    fn test_reference_copies_global_properties() {
        let mut schema = Schema::new("urn:t", "mem:/a.xsd");
        global(&mut schema, "item", Some("string"));
        schema.elements[0].nillable = true;
        schema.elements[0].fixed = Some("x".into());

        let mut ct = ComplexType::new(QName::new("urn:t", "list")).with_content(
            ModelGroup::sequence().with_particle(Particle::Element(Box::new(
                ElementDecl::reference(QName::new("urn:t", "item"), Occurs::zero_or_more()),
            ))),
        );
        ct.attributes
            .push(AttributeDecl::reference(QName::new(XML_NAMESPACE, "lang")));
        let id = schema.arena.push(TypeDefinition::Complex(ct));

        resolve_references(&mut schema).unwrap();
        let ct = schema.arena.get(id).and_then(|t| t.as_complex()).unwrap();
        let item = ct.model_group().unwrap().element_particles()[0];
        assert_eq!(item.type_id(), schema.arena.builtin("string"));
        assert!(item.nillable);
        assert_eq!(item.fixed.as_deref(), Some("x"));
        assert_eq!(item.occurs, Occurs::zero_or_more());
        assert_eq!(ct.attributes[0].type_id(), schema.arena.builtin("language"));
    }

    #[test]
    fn test_unknown_attribute_reference() {
        let mut schema = Schema::new("urn:t", "mem:/a.xsd");
        let mut ct = ComplexType::new(QName::new("urn:t", "t"));
        ct.attributes
            .push(AttributeDecl::reference(QName::new("urn:t", "missing")));
        schema.arena.push(TypeDefinition::Complex(ct));
        let err = resolve_references(&mut schema).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::UnknownAttribute));
    }
}
