//! Element, attribute and identity constraint checks

use std::collections::HashSet;

use crate::error::ErrorKind;
use crate::names::is_valid_ncname;
use crate::namespaces::{QName, XSI_NAMESPACE};
use crate::resolve::content_type_of;
use crate::validators::attributes::{AttributeDecl, AttributeUse};
use crate::validators::complex_types::DerivationMethod;
use crate::validators::elements::ElementDecl;
use crate::validators::globals::{TypeArena, TypeDefinition, TypeId};
use crate::validators::identities::{IdentityConstraint, IdentityKind};
use crate::validators::schemas::Form;
use crate::validators::values::{validate_value, values_equal};
use crate::xpath::{parse_constraint_paths, FieldResolver};

use super::Checker;

impl<'a> Checker<'a> {
    pub(super) fn name(&mut self, local_name: &str, component: &QName, what: &str) {
        if !is_valid_ncname(local_name) {
            self.report(
                ErrorKind::InvalidName,
                format!("'{}' is not a valid {} name", local_name, what),
                component,
            );
        }
    }

    pub(super) fn global_element(&mut self, decl: &'a ElementDecl) {
        self.element(decl);
        self.substitution_group(decl);
    }

    /// Checks shared by global and local element declarations
    pub(super) fn element(&mut self, decl: &'a ElementDecl) {
        if decl.reference {
            return;
        }
        let name = &decl.name;
        self.name(&name.local_name, name, "element");
        if name.local_name == "xmlns" {
            self.report(
                ErrorKind::InvalidName,
                "an element cannot be named 'xmlns'".to_string(),
                name,
            );
        }
        if name.namespace == XSI_NAMESPACE {
            self.report(
                ErrorKind::InvalidName,
                format!("element '{}' cannot be declared in the xsi namespace", name.local_name),
                name,
            );
        }

        let Some(type_id) = decl.type_id().filter(|id| self.arena.get(*id).is_some()) else {
            self.report(
                ErrorKind::UnknownType,
                format!("element '{}' has no type", name.local_name),
                name,
            );
            return;
        };
        if decl.default.is_some() && decl.fixed.is_some() {
            self.report(
                ErrorKind::InvalidValue,
                format!(
                    "element '{}' cannot have both default and fixed values",
                    name.local_name
                ),
                name,
            );
        }
        self.element_value(decl, type_id);
        self.identity_constraints(decl);
        self.nested_type(type_id);
    }

    fn element_value(&mut self, decl: &ElementDecl, type_id: TypeId) {
        let Some((which, value)) = value_constraint(&decl.default, &decl.fixed) else {
            return;
        };
        let name = &decl.name;
        let Some(content) = content_type_of(self.arena, type_id) else {
            if let Some(TypeDefinition::Complex(ct)) = self.arena.get(type_id) {
                let emptiable = ct.model_group().map_or(true, |g| g.is_emptiable());
                if !(ct.mixed && emptiable) {
                    self.report(
                        ErrorKind::InvalidValue,
                        format!(
                            "element '{}' with element-only content cannot have a {} value",
                            name.local_name, which
                        ),
                        name,
                    );
                }
            }
            return;
        };
        if self.arena.is_id_type(content) {
            self.report(
                ErrorKind::InvalidValue,
                format!(
                    "element '{}' of an ID type cannot have default or fixed values",
                    name.local_name
                ),
                name,
            );
            return;
        }
        if let Err(reason) = validate_value(self.arena, content, value) {
            self.report(
                ErrorKind::InvalidValue,
                format!(
                    "invalid {} value '{}' for element '{}': {}",
                    which, value, name.local_name, reason
                ),
                name,
            );
        }
    }

    fn substitution_group(&mut self, decl: &'a ElementDecl) {
        let Some(head_name) = &decl.substitution_group else {
            return;
        };
        let elements = &self.schema.elements;
        let mut seen = HashSet::from([&decl.name]);
        let mut current = head_name;
        loop {
            if !seen.insert(current) {
                self.report(
                    ErrorKind::InvalidDerivation,
                    format!("substitution group of element '{}' is circular", decl.name),
                    &decl.name,
                );
                return;
            }
            match elements.get(current).and_then(|h| h.substitution_group.as_ref()) {
                Some(next) => current = next,
                None => break,
            }
        }

        let Some(head) = elements.get(head_name) else {
            return;
        };
        let (Some(member_type), Some(head_type)) = (decl.type_id(), head.type_id()) else {
            return;
        };
        if head_type == TypeId::ANY_TYPE || member_type == head_type {
            return;
        }
        if !self.arena.is_derived_from(member_type, head_type) {
            self.report(
                ErrorKind::InvalidDerivation,
                format!(
                    "type of element '{}' is not derived from the type of its substitution group head '{}'",
                    decl.name, head_name
                ),
                &decl.name,
            );
            return;
        }
        if let Some(method) = derivation_methods(self.arena, member_type, head_type)
            .into_iter()
            .find(|m| head.final_deriv.contains(*m))
        {
            self.report(
                ErrorKind::InvalidDerivation,
                format!(
                    "element '{}' cannot substitute for '{}': its final attribute blocks {}",
                    decl.name, head_name, method
                ),
                &decl.name,
            );
        }
    }

    fn identity_constraints(&mut self, decl: &'a ElementDecl) {
        let mut seen: HashSet<&str> = HashSet::new();
        for constraint in &decl.constraints {
            let local = constraint.name.local_name.as_str();
            self.name(local, &constraint.name, "identity constraint");
            let distinct = self
                .constraints
                .get(&constraint.name)
                .map_or(0, |found| found.len());
            if !seen.insert(local) || distinct > 1 {
                self.report(
                    ErrorKind::DuplicateIdentityConstraint,
                    format!("duplicate identity constraint name '{}'", local),
                    &constraint.name,
                );
            }

            match (constraint.kind, &constraint.refer) {
                (IdentityKind::Keyref, None) => self.report(
                    ErrorKind::InvalidIdentityConstraint,
                    format!("keyref '{}' requires a 'refer' attribute", local),
                    &constraint.name,
                ),
                (IdentityKind::Keyref, Some(refer)) => self.keyref_target(constraint, refer),
                (kind, Some(_)) => self.report(
                    ErrorKind::InvalidIdentityConstraint,
                    format!("{} '{}' cannot have a 'refer' attribute", kind, local),
                    &constraint.name,
                ),
                (_, None) => {}
            }

            match parse_constraint_paths(constraint) {
                Err(error) => self.push(error),
                Ok(paths) => {
                    let resolver = FieldResolver::new(self.arena, &constraint.namespaces);
                    for field in &paths.fields {
                        if let Err(error) = resolver.field_type(decl, &paths.selector, field) {
                            self.push(error.with_component(constraint.name.to_string()));
                        }
                    }
                }
            }
        }
    }

    fn keyref_target(&mut self, keyref: &IdentityConstraint, refer: &QName) {
        let target = self
            .constraints
            .get(refer)
            .and_then(|found| found.first().copied());
        let Some(target) = target else {
            self.report(
                ErrorKind::UnknownIdentityConstraint,
                format!(
                    "keyref '{}' refers to unknown key '{}'",
                    keyref.name.local_name, refer
                ),
                &keyref.name,
            );
            return;
        };
        if target.kind == IdentityKind::Keyref {
            self.report(
                ErrorKind::InvalidIdentityConstraint,
                format!(
                    "keyref '{}' must refer to a key or unique constraint, not '{}'",
                    keyref.name.local_name, refer.local_name
                ),
                &keyref.name,
            );
        } else if target.fields.len() != keyref.fields.len() {
            self.report(
                ErrorKind::InvalidIdentityConstraint,
                format!(
                    "keyref '{}' has {} fields but '{}' has {}",
                    keyref.name.local_name,
                    keyref.fields.len(),
                    refer.local_name,
                    target.fields.len()
                ),
                &keyref.name,
            );
        }
    }

    /// Checks of an attribute declaration or attribute use
    pub(super) fn attribute(&mut self, decl: &'a AttributeDecl, owner: &QName) {
        let name = &decl.name;
        if !decl.reference {
            self.name(&name.local_name, name, "attribute");
            if name.local_name == "xmlns" {
                self.report(
                    ErrorKind::InvalidName,
                    "an attribute cannot be named 'xmlns'".to_string(),
                    name,
                );
            }
            if decl.effective_name(Form::Unqualified).namespace == XSI_NAMESPACE {
                self.report(
                    ErrorKind::InvalidName,
                    format!(
                        "attribute '{}' cannot be declared in the xsi namespace",
                        name.local_name
                    ),
                    name,
                );
            }
        }

        if decl.default.is_some() && decl.fixed.is_some() {
            self.report(
                ErrorKind::InvalidAttribute,
                format!(
                    "attribute '{}' cannot have both default and fixed values",
                    name.local_name
                ),
                name,
            );
        } else if decl.default.is_some() && decl.use_mode == AttributeUse::Required {
            self.report(
                ErrorKind::InvalidAttribute,
                format!(
                    "required attribute '{}' in '{}' cannot have a default value",
                    name.local_name, owner.local_name
                ),
                name,
            );
        }

        let Some(type_id) = decl.type_id().filter(|id| self.arena.get(*id).is_some()) else {
            return;
        };
        if !self.arena.is_simple(type_id) {
            self.report(
                ErrorKind::InvalidAttribute,
                format!("type of attribute '{}' is not a simple type", name.local_name),
                name,
            );
            return;
        }

        if decl.reference {
            let global_fixed = self
                .schema
                .attributes
                .get(name)
                .and_then(|g| g.fixed.as_deref());
            if let (Some(global), Some(local)) = (global_fixed, decl.fixed.as_deref()) {
                if !values_equal(self.arena, type_id, global, local) {
                    self.report(
                        ErrorKind::InvalidAttribute,
                        format!(
                            "fixed value '{}' of the reference to attribute '{}' differs from the declared '{}'",
                            local, name.local_name, global
                        ),
                        name,
                    );
                }
            }
        }

        if let Some((which, value)) = value_constraint(&decl.default, &decl.fixed) {
            if self.arena.is_id_type(type_id) {
                self.report(
                    ErrorKind::InvalidValue,
                    format!(
                        "attribute '{}' of an ID type cannot have default or fixed values",
                        name.local_name
                    ),
                    name,
                );
            } else if let Err(reason) = validate_value(self.arena, type_id, value) {
                self.report(
                    ErrorKind::InvalidValue,
                    format!(
                        "invalid {} value '{}' for attribute '{}': {}",
                        which, value, name.local_name, reason
                    ),
                    name,
                );
            }
        }
        self.nested_type(type_id);
    }

    /// Attribute uses of one definition sharing an instance name
    pub(super) fn duplicate_attributes(&mut self, attributes: &[AttributeDecl], owner: &QName) {
        let mut seen = HashSet::new();
        for attribute in attributes {
            let name = attribute.effective_name(Form::Unqualified);
            if !seen.insert(name.clone()) {
                self.report(
                    ErrorKind::InvalidAttribute,
                    format!(
                        "attribute '{}' is declared more than once in '{}'",
                        name.local_name, owner.local_name
                    ),
                    owner,
                );
            }
        }
    }
}

fn value_constraint<'v>(
    default: &'v Option<String>,
    fixed: &'v Option<String>,
) -> Option<(&'static str, &'v str)> {
    default
        .as_deref()
        .map(|v| ("default", v))
        .or_else(|| fixed.as_deref().map(|v| ("fixed", v)))
}

/// Derivation methods of the steps leading from `derived` up to `ancestor`
pub(super) fn derivation_methods(
    arena: &TypeArena,
    derived: TypeId,
    ancestor: TypeId,
) -> Vec<DerivationMethod> {
    let mut methods = Vec::new();
    for step in arena.chain(derived) {
        if step == ancestor {
            break;
        }
        methods.push(match arena.get(step) {
            Some(TypeDefinition::Complex(ct)) => ct.derivation,
            _ => DerivationMethod::Restriction,
        });
    }
    methods
}
