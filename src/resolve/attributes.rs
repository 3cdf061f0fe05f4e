//! Attribute group expansion
//!
//! Attribute group references on complex types and on other attribute
//! groups are replaced by the attribute uses they contribute, transitively.
//! The attribute wildcards met on the way are intersected with the local
//! one.

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind, Result, SchemaError};
use crate::namespaces::QName;
use crate::validators::attributes::{AttributeDecl, AttributeGroupDef};
use crate::validators::complex_types::ComplexType;
use crate::validators::schemas::Schema;
use crate::validators::wildcards::Wildcard;

use super::visit_complex_types;

/// Attribute uses and wildcard collected from a list of group references
#[derive(Debug, Default)]
struct Expansion {
    attributes: Vec<AttributeDecl>,
    wildcard: Option<Wildcard>,
}

impl Expansion {
    fn add_attribute(&mut self, attribute: &AttributeDecl) {
        // Diamond references contribute the same use twice
        if !self.attributes.contains(attribute) {
            self.attributes.push(attribute.clone());
        }
    }

    fn add_wildcard(&mut self, wildcard: &Wildcard, owner: &QName) -> Result<()> {
        self.wildcard = match self.wildcard.take() {
            None => Some(wildcard.clone()),
            Some(current) => Some(intersect(&current, wildcard, owner)?),
        };
        Ok(())
    }
}

fn intersect(a: &Wildcard, b: &Wildcard, owner: &QName) -> Result<Wildcard> {
    a.intersection(b).ok_or_else(|| {
        Error::Schema(
            SchemaError::new(
                ErrorKind::InvalidAttribute,
                format!(
                    "intersection of attribute wildcards {} and {} is not expressible",
                    a, b
                ),
            )
            .with_component(owner.to_string()),
        )
    })
}

struct AttributeGroupExpander {
    groups: IndexMap<QName, AttributeGroupDef>,
    redefined: IndexMap<QName, AttributeGroupDef>,
    stack: Vec<(QName, bool)>,
}

/// Expand every attribute group reference of the schema
pub fn expand_attribute_groups(schema: &mut Schema) -> Result<()> {
    let mut expander = AttributeGroupExpander {
        groups: schema.attribute_groups.clone(),
        redefined: schema.redefined_attribute_groups.clone(),
        stack: Vec::new(),
    };

    for (name, def) in schema.attribute_groups.iter_mut() {
        expander.stack.push((name.clone(), false));
        let result = expander.group(def);
        expander.stack.clear();
        result?;
    }
    for (name, def) in schema.redefined_attribute_groups.iter_mut() {
        expander.stack.push((name.clone(), true));
        let result = expander.group(def);
        expander.stack.clear();
        result?;
    }
    visit_complex_types(schema, &mut |ct| expander.complex_type(ct))
}

impl AttributeGroupExpander {
    fn group(&mut self, def: &mut AttributeGroupDef) -> Result<()> {
        let refs = std::mem::take(&mut def.group_refs);
        let mut expansion = Expansion::default();
        self.expand(&refs, &def.name, &mut expansion)?;
        for attribute in expansion.attributes {
            if !def.attributes.contains(&attribute) {
                def.attributes.push(attribute);
            }
        }
        def.any_attribute = combine(def.any_attribute.take(), expansion.wildcard, &def.name)?;
        Ok(())
    }

    fn complex_type(&mut self, ct: &mut ComplexType) -> Result<()> {
        if ct.attribute_group_refs.is_empty() {
            return Ok(());
        }
        let refs = std::mem::take(&mut ct.attribute_group_refs);
        let mut expansion = Expansion::default();
        self.expand(&refs, &ct.name, &mut expansion)?;
        ct.attributes.extend(expansion.attributes);
        ct.any_attribute = combine(ct.any_attribute.take(), expansion.wildcard, &ct.name)?;
        Ok(())
    }

    fn expand(&mut self, refs: &[QName], owner: &QName, into: &mut Expansion) -> Result<()> {
        for name in refs {
            let (def, original) = self.lookup(name)?;
            self.stack.push((name.clone(), original));
            let result = self.collect(&def, owner, into);
            self.stack.pop();
            result?;
        }
        Ok(())
    }

    fn collect(&mut self, def: &AttributeGroupDef, owner: &QName, into: &mut Expansion) -> Result<()> {
        for attribute in &def.attributes {
            into.add_attribute(attribute);
        }
        self.expand(&def.group_refs, owner, into)?;
        if let Some(wildcard) = &def.any_attribute {
            into.add_wildcard(wildcard, owner)?;
        }
        Ok(())
    }

    fn lookup(&self, name: &QName) -> Result<(AttributeGroupDef, bool)> {
        let on_stack = |original: bool| self.stack.iter().any(|(n, o)| n == name && *o == original);

        if on_stack(false) {
            if !on_stack(true) {
                if let Some(def) = self.redefined.get(name) {
                    return Ok((def.clone(), true));
                }
            }
            let chain: Vec<&str> = self
                .stack
                .iter()
                .map(|(n, _)| n.local_name.as_str())
                .chain(std::iter::once(name.local_name.as_str()))
                .collect();
            return Err(Error::Schema(
                SchemaError::new(
                    ErrorKind::CircularGroupReference,
                    format!(
                        "attribute group '{}' references itself: {}",
                        name,
                        chain.join(" -> ")
                    ),
                )
                .with_component(name.to_string()),
            ));
        }

        match self.groups.get(name) {
            Some(def) => Ok((def.clone(), false)),
            None => Err(Error::Schema(
                SchemaError::new(
                    ErrorKind::UnknownAttributeGroup,
                    format!("unknown attribute group '{}'", name),
                )
                .with_component(name.to_string()),
            )),
        }
    }
}

/// The complete wildcard: the local one, intersected with the groups' one
fn combine(
    local: Option<Wildcard>,
    from_groups: Option<Wildcard>,
    owner: &QName,
) -> Result<Option<Wildcard>> {
    match (local, from_groups) {
        (Some(local), Some(groups)) => intersect(&local, &groups, owner).map(Some),
        (local, groups) => Ok(local.or(groups)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::elements::Scope;
    use crate::validators::globals::TypeDef;
    use crate::validators::wildcards::ProcessContents;

    fn attribute(name: &str) -> AttributeDecl {
        AttributeDecl::new(QName::local(name), Scope::Local)
    }

    fn group(name: &str, attributes: &[&str], refs: &[&str]) -> AttributeGroupDef {
        let mut def = AttributeGroupDef::new(QName::local(name));
        def.attributes = attributes.iter().map(|a| attribute(a)).collect();
        def.group_refs = refs.iter().map(|r| QName::local(*r)).collect();
        def
    }

    fn names(attributes: &[AttributeDecl]) -> Vec<&str> {
        attributes.iter().map(|a| a.name.local_name.as_str()).collect()
    }

    #[test]
    fn test_expand_into_complex_type() {
        let mut schema = Schema::new("", "mem:/a.xsd");
        for def in [group("inner", &["b"], &[]), group("outer", &["a"], &["inner"])] {
            schema.attribute_groups.insert(def.name.clone(), def);
        }
        let mut ct = ComplexType::new(QName::local("t"));
        ct.attributes.push(attribute("own"));
        ct.attribute_group_refs = vec![QName::local("outer"), QName::local("inner")];
        schema.types.insert(QName::local("t"), TypeDef::Complex(ct));

        expand_attribute_groups(&mut schema).unwrap();
        let TypeDef::Complex(ct) = &schema.types[&QName::local("t")] else {
            unreachable!()
        };
        assert_eq!(names(&ct.attributes), vec!["own", "a", "b"]);
        assert!(ct.attribute_group_refs.is_empty());
        assert_eq!(
            names(&schema.attribute_groups[&QName::local("outer")].attributes),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_circular_and_unknown_attribute_groups() {
        let mut schema = Schema::new("", "mem:/a.xsd");
        for def in [group("x", &[], &["y"]), group("y", &[], &["x"])] {
            schema.attribute_groups.insert(def.name.clone(), def);
        }
        let err = expand_attribute_groups(&mut schema).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::CircularGroupReference));

        let mut schema = Schema::new("", "mem:/a.xsd");
        let def = group("x", &[], &["nope"]);
        schema.attribute_groups.insert(def.name.clone(), def);
        let err = expand_attribute_groups(&mut schema).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::UnknownAttributeGroup));
    }

    #[test]
    fn test_redefined_self_reference_and_wildcards() {
        let mut schema = Schema::new("urn:t", "mem:/a.xsd");
        let mut current = group("g", &["added"], &["g"]);
        current.any_attribute =
            Some(Wildcard::new(Some("urn:x urn:y"), "urn:t", ProcessContents::Lax).unwrap());
        schema.attribute_groups.insert(current.name.clone(), current);
        let mut original = group("g", &["base"], &[]);
        original.any_attribute =
            Some(Wildcard::new(Some("##other"), "urn:t", ProcessContents::Strict).unwrap());
        schema
            .redefined_attribute_groups
            .insert(original.name.clone(), original);

        expand_attribute_groups(&mut schema).unwrap();
        let def = &schema.attribute_groups[&QName::local("g")];
        assert_eq!(names(&def.attributes), vec!["added", "base"]);
        let wildcard = def.any_attribute.as_ref().unwrap();
        assert_eq!(wildcard.process_contents, ProcessContents::Lax);
        assert!(wildcard.allows("urn:x"));
    }
}
