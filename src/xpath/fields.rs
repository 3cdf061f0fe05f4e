//! Field value-type resolution
//!
//! Given the element that carries an identity constraint, the selector picks
//! the context elements and each field walks on from there to an attribute
//! or element whose simple type is the type of the field value.

use std::collections::HashSet;

use crate::error::{ErrorKind, SchemaError};
use crate::namespaces::NamespaceContext;
use crate::validators::attributes::AttributeDecl;
use crate::validators::complex_types::{ContentType, DerivationMethod};
use crate::validators::elements::ElementDecl;
use crate::validators::globals::{TypeArena, TypeDefinition, TypeId};
use crate::validators::schemas::Form;

use super::parsers::{NodeTest, PathBranch, RestrictedXPath, XPathAxis};

/// Walks restricted paths over resolved content models
#[derive(Debug, Clone, Copy)]
pub struct FieldResolver<'a> {
    arena: &'a TypeArena,
    namespaces: &'a NamespaceContext,
}

impl<'a> FieldResolver<'a> {
    /// Create a resolver over an arena, with the constraint's namespaces
    pub fn new(arena: &'a TypeArena, namespaces: &'a NamespaceContext) -> Self {
        Self { arena, namespaces }
    }

    /// Types of the elements a selector picks, starting at `context`
    pub fn select(&self, context: TypeId, selector: &RestrictedXPath) -> Vec<TypeId> {
        let mut result = Vec::new();
        for branch in &selector.branches {
            for id in self.walk(context, branch) {
                if !result.contains(&id) {
                    result.push(id);
                }
            }
        }
        result
    }

    /// Resolve the value type of `field` for the element declaration that
    /// carries the constraint
    ///
    /// `Ok(None)` means the path could not be followed through the schema;
    /// selecting element-only content is an error.
    pub fn field_type(
        &self,
        element: &ElementDecl,
        selector: &RestrictedXPath,
        field: &RestrictedXPath,
    ) -> Result<Option<TypeId>, SchemaError> {
        let Some(context) = element.type_id() else {
            return Ok(None);
        };
        for selected in self.select(context, selector) {
            for branch in &field.branches {
                if let Some(attribute) = branch.attribute() {
                    let mut element_branch = branch.clone();
                    element_branch.steps.pop();
                    for owner in self.walk(selected, &element_branch) {
                        if let Some(decl) = self.find_attribute(owner, attribute) {
                            return Ok(decl.type_id());
                        }
                    }
                    continue;
                }
                for target in self.walk(selected, branch) {
                    if let Some(id) = self.value_type(target, &field.expression)? {
                        return Ok(Some(id));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Simple type of an element's character content
    fn value_type(&self, id: TypeId, expression: &str) -> Result<Option<TypeId>, SchemaError> {
        let Some(TypeDefinition::Complex(ct)) = self.arena.get(id) else {
            if id == TypeId::ANY_TYPE {
                return Ok(None);
            }
            return Ok(Some(id));
        };
        if let Some(simple) = self.arena.simple_content_type(id) {
            return Ok(Some(simple));
        }
        if ct.mixed {
            return Ok(self.arena.builtin("string"));
        }
        if self.has_element_content(id) {
            return Err(SchemaError::new(
                ErrorKind::FieldSelectsComplexContent,
                format!(
                    "field '{}' selects an element of type {} with element-only content",
                    expression,
                    self.arena.display_name(id)
                ),
            ));
        }
        Ok(None)
    }

    fn has_element_content(&self, id: TypeId) -> bool {
        self.content_chain(id).into_iter().any(|t| {
            matches!(self.arena.get(t), Some(TypeDefinition::Complex(ct))
                if matches!(&ct.content, ContentType::Elements(g) if !g.is_empty()))
        })
    }

    fn walk(&self, start: TypeId, branch: &PathBranch) -> Vec<TypeId> {
        let mut current = vec![start];
        if branch.descendant {
            current = self.descendants_or_self(start);
        }
        for step in &branch.steps {
            match (step.axis, &step.node_test) {
                (XPathAxis::Child, Some(test)) => {
                    let mut next = Vec::new();
                    for id in &current {
                        for child in self.child_elements(*id) {
                            let name = child.effective_name(Form::Unqualified);
                            if test.matches(&name, self.namespaces) {
                                if let Some(child_type) = child.type_id() {
                                    if !next.contains(&child_type) {
                                        next.push(child_type);
                                    }
                                }
                            }
                        }
                    }
                    current = next;
                }
                (XPathAxis::Self_, _) => {}
                _ => return Vec::new(),
            }
        }
        current
    }

    fn descendants_or_self(&self, start: TypeId) -> Vec<TypeId> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            for child in self.child_elements(id) {
                if let Some(child_type) = child.type_id() {
                    stack.push(child_type);
                }
            }
        }
        order
    }

    /// Types whose content contributes to `id`'s content: the type itself,
    /// then its bases while the derivation is an extension
    fn content_chain(&self, id: TypeId) -> Vec<TypeId> {
        let mut chain = Vec::new();
        let mut current = id;
        while !chain.contains(&current) {
            chain.push(current);
            match self.arena.get(current) {
                Some(TypeDefinition::Complex(ct)) if ct.derivation == DerivationMethod::Extension => {
                    match ct.base.id() {
                        Some(base) => current = base,
                        None => break,
                    }
                }
                _ => break,
            }
        }
        chain
    }

    fn child_elements(&self, id: TypeId) -> Vec<&'a ElementDecl> {
        let arena = self.arena;
        let mut result = Vec::new();
        for t in self.content_chain(id) {
            if let Some(TypeDefinition::Complex(ct)) = arena.get(t) {
                if let Some(group) = ct.model_group() {
                    result.extend(group.element_particles());
                }
            }
        }
        result
    }

    fn find_attribute(&self, id: TypeId, test: &NodeTest) -> Option<&'a AttributeDecl> {
        let arena = self.arena;
        for t in arena.chain(id) {
            if let Some(TypeDefinition::Complex(ct)) = arena.get(t) {
                let found = ct.attributes.iter().find(|a| {
                    !a.is_prohibited()
                        && test.matches(&a.effective_name(Form::Unqualified), self.namespaces)
                });
                if found.is_some() {
                    return found;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::QName;
    use crate::validators::complex_types::ComplexType;
    use crate::validators::elements::Scope;
    use crate::validators::globals::TypeRef;
    use crate::validators::groups::{ModelGroup, Particle};

    fn local(name: &str, type_id: TypeId) -> Particle {
        Particle::Element(Box::new(
            ElementDecl::new(QName::local(name), Scope::Local).with_type(TypeRef::Resolved(type_id)),
        ))
    }

    fn build() -> (TypeArena, TypeId) {
        let mut arena = TypeArena::new();
        let string = arena.builtin("string").unwrap();
        let int = arena.builtin("int").unwrap();
        let part = arena.push(TypeDefinition::Complex(
            ComplexType::new(QName::zero())
                .with_content(ModelGroup::sequence().with_particle(local("name", string)))
                .with_attribute(
                    AttributeDecl::new(QName::local("id"), Scope::Local)
                        .with_type(TypeRef::Resolved(int)),
                ),
        ));
        let parts = arena.push(TypeDefinition::Complex(
            ComplexType::new(QName::zero())
                .with_content(ModelGroup::sequence().with_particle(local("part", part))),
        ));
        (arena, parts)
    }

    #[test]
    fn test_field_types() {
        let (arena, parts) = build();
        let ns = NamespaceContext::new();
        let resolver = FieldResolver::new(&arena, &ns);
        let element = ElementDecl::new(QName::local("parts"), Scope::Global)
            .with_type(TypeRef::Resolved(parts));
        let selector = RestrictedXPath::parse_selector("part", &ns).unwrap();

        let id = RestrictedXPath::parse_field("@id", &ns).unwrap();
        assert_eq!(
            resolver.field_type(&element, &selector, &id).unwrap(),
            arena.builtin("int")
        );
        let name = RestrictedXPath::parse_field("name", &ns).unwrap();
        assert_eq!(
            resolver.field_type(&element, &selector, &name).unwrap(),
            arena.builtin("string")
        );
        let missing = RestrictedXPath::parse_field("@nope", &ns).unwrap();
        assert_eq!(resolver.field_type(&element, &selector, &missing).unwrap(), None);

        let dot = RestrictedXPath::parse_field(".", &ns).unwrap();
        let err = resolver.field_type(&element, &selector, &dot).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FieldSelectsComplexContent);
    }

    #[test]
    fn test_descendant_selector() {
        let (arena, parts) = build();
        let ns = NamespaceContext::new();
        let resolver = FieldResolver::new(&arena, &ns);
        let selector = RestrictedXPath::parse_selector(".//name", &ns).unwrap();
        assert_eq!(resolver.select(parts, &selector), vec![arena.builtin("string").unwrap()]);
    }
}
