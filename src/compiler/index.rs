//! Lookup tables built once every type is compiled

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};

use crate::namespaces::QName;
use crate::validators::elements::ElementDecl;
use crate::validators::globals::TypeId;
use crate::validators::groups::{ModelGroup, Particle};
use crate::validators::schemas::{Form, Schema};

use super::model::ConstrainedElement;

/// Transitive members of every substitution group head, nearest first
pub(crate) fn substitution_closure(
    groups: &IndexMap<QName, Vec<QName>>,
) -> IndexMap<QName, IndexSet<QName>> {
    let mut closure = IndexMap::new();
    for (head, direct) in groups {
        let mut members = IndexSet::new();
        let mut queue: VecDeque<&QName> = direct.iter().collect();
        while let Some(member) = queue.pop_front() {
            if member == head || !members.insert(member.clone()) {
                continue;
            }
            if let Some(next) = groups.get(member) {
                queue.extend(next.iter());
            }
        }
        closure.insert(head.clone(), members);
    }
    closure
}

/// Element declarations holding identity constraints, each once
pub(crate) fn constrained_elements(schema: &Schema) -> Vec<ConstrainedElement> {
    let mut found: Vec<ConstrainedElement> = Vec::new();
    let mut add = |decl: &ElementDecl| {
        if decl.constraints.is_empty() {
            return;
        }
        let entry = ConstrainedElement {
            name: decl.effective_name(Form::Unqualified),
            type_id: decl.type_id().unwrap_or(TypeId::ANY_TYPE),
            constraints: decl.constraints.clone(),
        };
        if !found.contains(&entry) {
            found.push(entry);
        }
    };
    for decl in schema.elements.values() {
        add(decl);
    }
    for (_, def) in schema.arena.iter() {
        if let Some(group) = def.as_complex().and_then(|ct| ct.model_group()) {
            walk_elements(group, &mut add);
        }
    }
    found
}

/// Types of the local element declarations by the name instances carry
pub(crate) fn local_elements(schema: &Schema) -> IndexMap<QName, Vec<TypeId>> {
    let mut index: IndexMap<QName, Vec<TypeId>> = IndexMap::new();
    let mut add = |decl: &ElementDecl| {
        if decl.is_global() || decl.reference {
            return;
        }
        let type_id = decl.type_id().unwrap_or(TypeId::ANY_TYPE);
        let types = index.entry(decl.effective_name(Form::Unqualified)).or_default();
        if !types.contains(&type_id) {
            types.push(type_id);
        }
    };
    for (_, def) in schema.arena.iter() {
        if let Some(group) = def.as_complex().and_then(|ct| ct.model_group()) {
            walk_elements(group, &mut add);
        }
    }
    index
}

fn walk_elements(group: &ModelGroup, f: &mut dyn FnMut(&ElementDecl)) {
    for particle in &group.particles {
        match particle {
            Particle::Element(decl) => f(&**decl),
            Particle::Group(inner) => walk_elements(inner, f),
            Particle::Any(_) | Particle::GroupRef(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitution_closure_is_transitive() {
        let mut groups = IndexMap::new();
        groups.insert(QName::local("a"), vec![QName::local("b")]);
        groups.insert(QName::local("b"), vec![QName::local("c"), QName::local("a")]);
        let closure = substitution_closure(&groups);
        let members: Vec<&str> = closure[&QName::local("a")]
            .iter()
            .map(|n| n.local_name.as_str())
            .collect();
        assert_eq!(members, vec!["b", "c"]);
        assert_eq!(closure[&QName::local("b")].len(), 2);
    }
}
