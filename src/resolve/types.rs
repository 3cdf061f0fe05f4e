//! Type reference resolution
//!
//! Moves every type definition of the assembled schema into the
//! [`TypeArena`] and replaces each `Named` and `Inline` [`TypeRef`] by the
//! handle of its definition. Named types get their slots reserved before
//! anything is built, so forward and mutually recursive references resolve
//! to the right handle.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind, Result, SchemaError};
use crate::namespaces::QName;
use crate::validators::builtins::is_xsd11_type;
use crate::validators::complex_types::ContentType;
use crate::validators::globals::{TypeArena, TypeDef, TypeDefinition, TypeId, TypeRef};
use crate::validators::groups::{ModelGroup, Particle};
use crate::validators::schemas::Schema;

/// Resolves references against the reserved named types
pub(crate) struct TypeResolver<'a> {
    arena: &'a mut TypeArena,
    names: &'a IndexMap<QName, TypeId>,
    originals: &'a HashMap<QName, TypeId>,
}

/// Move the schema's type definitions into its arena and resolve every
/// type reference of types, global declarations, model group definitions
/// and attribute groups
pub fn resolve_types(schema: &mut Schema) -> Result<()> {
    let types = std::mem::take(&mut schema.types);
    let redefined = std::mem::take(&mut schema.redefined_types);
    let group_types = std::mem::take(&mut schema.group_types);

    for name in types.keys() {
        let id = schema.arena.reserve();
        schema.type_ids.insert(name.clone(), id);
    }
    let mut originals = HashMap::new();
    for name in redefined.keys() {
        originals.insert(name.clone(), schema.arena.reserve());
    }

    let mut resolver = TypeResolver {
        arena: &mut schema.arena,
        names: &schema.type_ids,
        originals: &originals,
    };
    for (name, def) in types {
        let id = resolver.names[&name];
        let built = resolver.build(def)?;
        resolver.arena.set(id, built);
    }
    for (name, def) in redefined {
        let id = originals[&name];
        // Originals resolve their own name to the redefinition
        let built = TypeResolver {
            arena: &mut *resolver.arena,
            names: resolver.names,
            originals: &HashMap::new(),
        }
        .build(def)?;
        resolver.arena.set(id, built);
    }
    for (id, def) in group_types {
        let built = resolver.build(def)?;
        resolver.arena.set(id, built);
    }

    for decl in schema.elements.values_mut() {
        resolver.type_ref(&mut decl.type_ref)?;
    }
    for decl in schema.attributes.values_mut() {
        resolver.type_ref(&mut decl.type_ref)?;
    }
    for def in schema
        .groups
        .values_mut()
        .chain(schema.redefined_groups.values_mut())
    {
        resolver.model_group(&mut def.group)?;
    }
    for def in schema
        .attribute_groups
        .values_mut()
        .chain(schema.redefined_attribute_groups.values_mut())
    {
        for attribute in &mut def.attributes {
            resolver.type_ref(&mut attribute.type_ref)?;
        }
    }
    Ok(())
}

impl TypeResolver<'_> {
    /// Resolve a reference that is not the base of a definition
    pub(crate) fn type_ref(&mut self, type_ref: &mut TypeRef) -> Result<()> {
        self.resolve(type_ref, None)
    }

    fn resolve(&mut self, type_ref: &mut TypeRef, owner: Option<&QName>) -> Result<()> {
        let id = match std::mem::replace(type_ref, TypeRef::Resolved(TypeId::ANY_TYPE)) {
            TypeRef::Resolved(id) => id,
            TypeRef::Named(name) => self.lookup(&name, owner)?,
            TypeRef::Inline(def) => self.define(*def)?,
        };
        *type_ref = TypeRef::Resolved(id);
        Ok(())
    }

    fn lookup(&self, name: &QName, owner: Option<&QName>) -> Result<TypeId> {
        // The redefine idiom: a type deriving from its own name derives
        // from the definition it replaces
        if owner == Some(name) {
            if let Some(id) = self.originals.get(name) {
                return Ok(*id);
            }
        }
        if let Some(id) = self.arena.builtin_qname(name) {
            return Ok(id);
        }
        if let Some(id) = self.names.get(name) {
            return Ok(*id);
        }
        let message = if name.is_xsd() && is_xsd11_type(&name.local_name) {
            format!("type '{}' is an XSD 1.1 type and is not supported", name)
        } else {
            format!("unknown type '{}'", name)
        };
        Err(Error::Schema(
            SchemaError::new(ErrorKind::UnknownType, message).with_component(name.to_string()),
        ))
    }

    fn define(&mut self, def: TypeDef) -> Result<TypeId> {
        let id = self.arena.reserve();
        let built = self.build(def)?;
        self.arena.set(id, built);
        Ok(id)
    }

    fn build(&mut self, def: TypeDef) -> Result<TypeDefinition> {
        match def {
            TypeDef::Simple(mut st) => {
                let owner = st.name.clone();
                for type_ref in st.type_refs_mut() {
                    self.resolve(type_ref, Some(&owner))?;
                }
                Ok(TypeDefinition::Simple(st))
            }
            TypeDef::Complex(mut ct) => {
                let owner = ct.name.clone();
                self.resolve(&mut ct.base, Some(&owner))?;
                for attribute in &mut ct.attributes {
                    self.type_ref(&mut attribute.type_ref)?;
                }
                match &mut ct.content {
                    ContentType::Elements(group) => self.model_group(group)?,
                    ContentType::Simple(sc) => {
                        if let Some(inline) = &mut sc.inline_type {
                            self.type_ref(inline)?;
                        }
                    }
                    ContentType::Empty => {}
                }
                Ok(TypeDefinition::Complex(ct))
            }
        }
    }

    fn model_group(&mut self, group: &mut ModelGroup) -> Result<()> {
        for particle in &mut group.particles {
            match particle {
                Particle::Element(decl) => self.type_ref(&mut decl.type_ref)?,
                Particle::Group(inner) => self.model_group(inner)?,
                Particle::Any(_) | Particle::GroupRef(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::complex_types::{ComplexType, DerivationMethod};
    use crate::validators::elements::{ElementDecl, Scope};
    use crate::validators::simple_types::SimpleType;

    fn named(name: &str) -> TypeRef {
        TypeRef::named(QName::new("urn:t", name))
    }

    #[test]
    fn test_forward_and_recursive_references() {
        let mut schema = Schema::new("urn:t", "mem:/a.xsd");
        let node = ComplexType::new(QName::new("urn:t", "node")).with_content(
            ModelGroup::sequence()
                .with_particle(Particle::Element(Box::new(
                    ElementDecl::new(QName::local("child"), Scope::Local).with_type(named("node")),
                )))
                .with_particle(Particle::Element(Box::new(
                    ElementDecl::new(QName::local("code"), Scope::Local).with_type(named("code")),
                ))),
        );
        schema
            .types
            .insert(node.name.clone(), TypeDef::Complex(node));
        let code = SimpleType::restriction(
            QName::new("urn:t", "code"),
            TypeRef::named(QName::xsd("token")),
        );
        schema.types.insert(code.name.clone(), TypeDef::Simple(code));

        resolve_types(&mut schema).unwrap();
        assert!(schema.types.is_empty());
        let node_id = schema.type_id(&QName::new("urn:t", "node")).unwrap();
        let code_id = schema.type_id(&QName::new("urn:t", "code")).unwrap();
        let ct = schema.arena.get(node_id).and_then(|t| t.as_complex()).unwrap();
        let children = ct.model_group().unwrap().element_particles();
        assert_eq!(children[0].type_id(), Some(node_id));
        assert_eq!(children[1].type_id(), Some(code_id));
        assert_eq!(schema.arena.base_of(code_id), schema.arena.builtin("token"));
    }

    #[test]
    fn test_inline_types_and_unknown() {
        let mut schema = Schema::new("urn:t", "mem:/a.xsd");
        let mut decl = ElementDecl::new(QName::new("urn:t", "e"), Scope::Global);
        decl.type_ref = TypeRef::inline(TypeDef::Complex(
            ComplexType::new(QName::zero())
                .with_base(named("missing"), DerivationMethod::Extension),
        ));
        schema.elements.insert(decl.name.clone(), decl);
        let err = resolve_types(&mut schema).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::UnknownType));
        assert!(err.to_string().contains("missing"));

        let mut schema = Schema::new("", "mem:/a.xsd");
        let mut decl = ElementDecl::new(QName::local("stamp"), Scope::Global);
        decl.type_ref = TypeRef::named(QName::xsd("dateTimeStamp"));
        schema.elements.insert(decl.name.clone(), decl);
        let err = resolve_types(&mut schema).unwrap_err();
        assert!(err.to_string().contains("XSD 1.1"));
    }

    #[test]
    fn test_redefined_base_points_to_original() {
        let mut schema = Schema::new("urn:t", "mem:/a.xsd");
        let name = QName::new("urn:t", "code");
        schema.types.insert(
            name.clone(),
            TypeDef::Simple(SimpleType::restriction(name.clone(), TypeRef::Named(name.clone()))),
        );
        schema.redefined_types.insert(
            name.clone(),
            TypeDef::Simple(SimpleType::restriction(
                name.clone(),
                TypeRef::named(QName::xsd("string")),
            )),
        );
        resolve_types(&mut schema).unwrap();
        let id = schema.type_id(&name).unwrap();
        let original = schema.arena.base_of(id).unwrap();
        assert_ne!(original, id);
        assert_eq!(schema.arena.qname(original), name);
        assert!(!schema.arena.has_cycle(id));
        assert_eq!(schema.arena.base_of(original), schema.arena.builtin("string"));
    }
}
