//! Model group flattening
//!
//! Every [`Particle::GroupRef`] is replaced by a copy of the referenced
//! group's body carrying the reference's occurrence bounds. Expansion keeps
//! the chain of groups being expanded; a group re-entered while still on the
//! chain is circular, except for the self-reference inside a redefinition,
//! which expands to the original group once.
//!
//! The chain stops at element boundaries: anonymous complex types of
//! elements in group bodies get one arena slot first, so every copy of the
//! group shares that type and a group may recur through an element.

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind, Result, SchemaError};
use crate::namespaces::QName;
use crate::validators::complex_types::{ComplexType, ContentType};
use crate::validators::globals::{TypeArena, TypeDef, TypeId, TypeRef};
use crate::validators::groups::{GroupDef, ModelGroup, ModelGroupKind, Particle};
use crate::validators::schemas::Schema;

/// A group on the expansion chain; `original` marks the pre-redefine body
#[derive(Debug, Clone, PartialEq, Eq)]
struct Frame {
    name: QName,
    original: bool,
}

struct GroupFlattener {
    groups: IndexMap<QName, GroupDef>,
    redefined: IndexMap<QName, GroupDef>,
    stack: Vec<Frame>,
}

/// Replace every group reference in the schema by a copy of the group body
pub fn flatten_groups(schema: &mut Schema) -> Result<()> {
    park_group_types(schema);
    let mut flattener = GroupFlattener {
        groups: schema.groups.clone(),
        redefined: schema.redefined_groups.clone(),
        stack: Vec::new(),
    };

    for (name, def) in schema.groups.iter_mut() {
        flattener.stack.push(Frame {
            name: name.clone(),
            original: false,
        });
        let result = flattener.model_group(&mut def.group);
        flattener.stack.clear();
        result?;
    }
    for (name, def) in schema.redefined_groups.iter_mut() {
        flattener.stack.push(Frame {
            name: name.clone(),
            original: true,
        });
        let result = flattener.model_group(&mut def.group);
        flattener.stack.clear();
        result?;
    }
    for def in schema
        .types
        .values_mut()
        .chain(schema.redefined_types.values_mut())
    {
        flattener.type_def(def)?;
    }
    for decl in schema.elements.values_mut() {
        flattener.type_ref(&mut decl.type_ref)?;
    }
    for def in schema.group_types.values_mut() {
        flattener.type_def(def)?;
    }
    Ok(())
}

/// Move the anonymous complex types of elements in group bodies into
/// reserved arena slots
fn park_group_types(schema: &mut Schema) {
    let Schema {
        groups,
        redefined_groups,
        group_types,
        arena,
        ..
    } = schema;
    for def in groups.values_mut().chain(redefined_groups.values_mut()) {
        park_in_group(&mut def.group, arena, group_types);
    }
}

fn park_in_group(
    group: &mut ModelGroup,
    arena: &mut TypeArena,
    parked: &mut IndexMap<TypeId, TypeDef>,
) {
    for particle in &mut group.particles {
        match particle {
            Particle::Element(decl) => {
                if !matches!(&decl.type_ref, TypeRef::Inline(def) if matches!(**def, TypeDef::Complex(_)))
                {
                    continue;
                }
                let id = arena.reserve();
                if let TypeRef::Inline(def) =
                    std::mem::replace(&mut decl.type_ref, TypeRef::Resolved(id))
                {
                    parked.insert(id, *def);
                }
            }
            Particle::Group(inner) => park_in_group(inner, arena, parked),
            Particle::Any(_) | Particle::GroupRef(_) => {}
        }
    }
}

impl GroupFlattener {
    fn type_ref(&mut self, type_ref: &mut TypeRef) -> Result<()> {
        match type_ref {
            TypeRef::Inline(def) => self.type_def(def),
            _ => Ok(()),
        }
    }

    fn type_def(&mut self, def: &mut TypeDef) -> Result<()> {
        match def {
            TypeDef::Complex(ct) => self.complex_type(ct),
            TypeDef::Simple(_) => Ok(()),
        }
    }

    fn complex_type(&mut self, ct: &mut ComplexType) -> Result<()> {
        let ContentType::Elements(group) = &mut ct.content else {
            return Ok(());
        };
        // A content model written as a bare group reference is the group itself
        let is_bare_reference = group.kind == ModelGroupKind::Sequence
            && group.occurs.is_single()
            && matches!(group.particles.as_slice(), [Particle::GroupRef(_)]);
        self.model_group(group)?;
        if is_bare_reference {
            if let Some(Particle::Group(inner)) = group.particles.pop() {
                *group = inner;
            }
        }
        Ok(())
    }

    fn model_group(&mut self, group: &mut ModelGroup) -> Result<()> {
        for particle in &mut group.particles {
            match particle {
                Particle::GroupRef(reference) => {
                    let (body, frame) = self.lookup(&reference.name)?;
                    let mut copy = body;
                    copy.occurs = reference.occurs;
                    self.stack.push(frame);
                    let result = self.model_group(&mut copy);
                    self.stack.pop();
                    result?;
                    *particle = Particle::Group(copy);
                }
                Particle::Group(inner) => self.model_group(inner)?,
                Particle::Element(decl) => self.type_ref(&mut decl.type_ref)?,
                Particle::Any(_) => {}
            }
        }
        Ok(())
    }

    /// Body to expand for a reference, and the frame it pushes
    fn lookup(&self, name: &QName) -> Result<(ModelGroup, Frame)> {
        let on_stack = |original: bool| {
            self.stack
                .iter()
                .any(|f| &f.name == name && f.original == original)
        };

        if on_stack(false) {
            // Inside a redefinition a self-reference names the original
            if !on_stack(true) {
                if let Some(def) = self.redefined.get(name) {
                    return Ok((
                        def.group.clone(),
                        Frame {
                            name: name.clone(),
                            original: true,
                        },
                    ));
                }
            }
            return Err(self.circular(name));
        }

        let def = self.groups.get(name).ok_or_else(|| {
            Error::Schema(
                SchemaError::new(
                    ErrorKind::UnknownGroup,
                    format!("unknown model group '{}'", name),
                )
                .with_component(name.to_string()),
            )
        })?;
        Ok((
            def.group.clone(),
            Frame {
                name: name.clone(),
                original: false,
            },
        ))
    }

    fn circular(&self, name: &QName) -> Error {
        let chain: Vec<String> = self
            .stack
            .iter()
            .map(|f| f.name.local_name.clone())
            .chain(std::iter::once(name.local_name.clone()))
            .collect();
        Error::Schema(
            SchemaError::new(
                ErrorKind::CircularGroupReference,
                format!(
                    "model group '{}' references itself: {}",
                    name,
                    chain.join(" -> ")
                ),
            )
            .with_component(name.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::elements::{ElementDecl, Scope};
    use crate::validators::groups::GroupRef;
    use crate::validators::particles::Occurs;

    fn element(name: &str) -> Particle {
        Particle::Element(Box::new(ElementDecl::new(QName::local(name), Scope::Local)))
    }

    fn reference(name: &str, occurs: Occurs) -> Particle {
        Particle::GroupRef(GroupRef {
            name: QName::local(name),
            occurs,
        })
    }

    fn schema_with(groups: Vec<(&str, ModelGroup)>) -> Schema {
        let mut schema = Schema::new("", "mem:/a.xsd");
        for (name, group) in groups {
            schema
                .groups
                .insert(QName::local(name), GroupDef::new(QName::local(name), group));
        }
        schema
    }

    #[test]
    fn test_flatten_nested_references() {
        let mut schema = schema_with(vec![
            ("inner", ModelGroup::choice().with_particle(element("x")).with_particle(element("y"))),
            (
                "outer",
                ModelGroup::sequence()
                    .with_particle(element("a"))
                    .with_particle(reference("inner", Occurs::zero_or_more())),
            ),
        ]);
        let ct = ComplexType::new(QName::local("t")).with_content(
            ModelGroup::sequence().with_particle(reference("outer", Occurs::once())),
        );
        schema.types.insert(QName::local("t"), TypeDef::Complex(ct));

        flatten_groups(&mut schema).unwrap();
        let TypeDef::Complex(ct) = &schema.types[&QName::local("t")] else {
            unreachable!()
        };
        let group = ct.model_group().unwrap();
        assert!(!group.has_group_refs());
        assert_eq!(group.kind, ModelGroupKind::Sequence);
        match &group.particles[1] {
            Particle::Group(inner) => {
                assert_eq!(inner.kind, ModelGroupKind::Choice);
                assert_eq!(inner.occurs, Occurs::zero_or_more());
            }
            other => panic!("unexpected particle {:?}", other),
        }
        assert!(!schema.groups[&QName::local("outer")].group.has_group_refs());
    }

    #[test]
    fn test_circular_and_unknown() {
        let mut schema = schema_with(vec![
            ("a", ModelGroup::sequence().with_particle(reference("b", Occurs::once()))),
            ("b", ModelGroup::sequence().with_particle(reference("a", Occurs::once()))),
        ]);
        let err = flatten_groups(&mut schema).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::CircularGroupReference));

        let mut schema = schema_with(vec![(
            "a",
            ModelGroup::sequence().with_particle(reference("missing", Occurs::once())),
        )]);
        let err = flatten_groups(&mut schema).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::UnknownGroup));
    }

    #[test]
    fn test_redefine_self_reference() {
        let mut schema = schema_with(vec![(
            "g",
            ModelGroup::sequence()
                .with_particle(reference("g", Occurs::once()))
                .with_particle(element("extra")),
        )]);
        schema.redefined_groups.insert(
            QName::local("g"),
            GroupDef::new(QName::local("g"), ModelGroup::sequence().with_particle(element("base"))),
        );
        flatten_groups(&mut schema).unwrap();
        let names: Vec<_> = schema.groups[&QName::local("g")]
            .group
            .element_particles()
            .iter()
            .map(|e| e.name.local_name.clone())
            .collect();
        assert_eq!(names, vec!["base", "extra"]);
    }
}
