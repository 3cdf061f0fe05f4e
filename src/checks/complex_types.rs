//! Complex type checks: derivation, attribute uses and element consistency

use std::collections::HashMap;

use crate::error::ErrorKind;
use crate::namespaces::QName;
use crate::resolve::content_type_of;
use crate::validators::attributes::{AttributeDecl, AttributeUse};
use crate::validators::complex_types::{ComplexType, ContentForm, ContentType, DerivationMethod};
use crate::validators::globals::{TypeArena, TypeDefinition, TypeId};
use crate::validators::groups::ModelGroupKind;
use crate::validators::schemas::Form;
use crate::validators::values::values_equal;

use super::simple_types::RestrictionBase;
use super::Checker;

impl<'a> Checker<'a> {
    pub(super) fn complex_type(&mut self, id: TypeId) {
        let arena = self.arena;
        let Some(TypeDefinition::Complex(ct)) = arena.get(id) else {
            return;
        };
        let name = &ct.name;
        if arena.has_cycle(id) {
            self.report(
                ErrorKind::CircularDerivation,
                format!("type '{}' is derived from itself", arena.display_name(id)),
                name,
            );
            return;
        }
        let base = ct.base.id();
        if let Some(base) = base {
            self.complex_derivation(id, ct, base);
        }
        self.attribute_uses(id, ct, base);

        if let Some(group) = ct.model_group() {
            self.content_group(group, name);
            self.element_consistency(id, ct);
            for decl in group.element_particles() {
                self.element(decl);
            }
        }
        if let Some(base) = base {
            self.nested_type(base);
        }
    }

    fn complex_derivation(&mut self, id: TypeId, ct: &ComplexType, base: TypeId) {
        let arena = self.arena;
        let name = &ct.name;
        if base == TypeId::ANY_TYPE {
            return;
        }
        self.final_allows(base, ct.derivation, id, name);
        let derived_name = arena.display_name(id);
        let base_name = arena.display_name(base);

        if ct.content_form == ContentForm::SimpleContent {
            match ct.derivation {
                DerivationMethod::Restriction => {
                    if arena.simple_content_type(base).is_none() {
                        self.report(
                            ErrorKind::InvalidDerivation,
                            format!(
                                "simpleContent restriction '{}' requires a complex base type with simple content, not '{}'",
                                derived_name, base_name
                            ),
                            name,
                        );
                        return;
                    }
                    if let ContentType::Simple(sc) = &ct.content {
                        let inline = sc.inline_type.as_ref().and_then(|t| t.id());
                        let content = inline.or_else(|| content_type_of(arena, base));
                        if let Some(content) = content {
                            let base_types = RestrictionBase {
                                facets: inline.unwrap_or(base),
                                content,
                            };
                            self.restriction_facets(id, name, base_types, &sc.deferred);
                        }
                        if let Some(inline) = inline {
                            self.nested_type(inline);
                        }
                    }
                }
                _ => {
                    if content_type_of(arena, base).is_none() {
                        self.report(
                            ErrorKind::InvalidDerivation,
                            format!(
                                "simpleContent extension '{}' requires a simple type or simple content base, not '{}'",
                                derived_name, base_name
                            ),
                            name,
                        );
                    }
                }
            }
            return;
        }

        if arena.is_simple(base) {
            self.report(
                ErrorKind::InvalidDerivation,
                format!(
                    "complex content type '{}' cannot derive from simple type '{}'",
                    derived_name, base_name
                ),
                name,
            );
            return;
        }
        if ct.derivation == DerivationMethod::Extension && arena.simple_content_type(base).is_some() {
            self.report(
                ErrorKind::InvalidDerivation,
                format!(
                    "complexContent extension '{}' cannot extend simple content type '{}'",
                    derived_name, base_name
                ),
                name,
            );
            return;
        }

        let Some(TypeDefinition::Complex(base_ct)) = arena.get(base) else {
            return;
        };
        let own_particles = ct.model_group().map_or(false, |g| !g.is_empty());
        let base_elements = has_element_content(arena, base);
        match ct.derivation {
            DerivationMethod::Extension => {
                if own_particles && base_elements && ct.mixed != base_ct.mixed {
                    self.report(
                        ErrorKind::InvalidDerivation,
                        format!(
                            "extension '{}' must have the same mixed value as base type '{}'",
                            derived_name, base_name
                        ),
                        name,
                    );
                }
                let adds_all = ct
                    .model_group()
                    .map_or(false, |g| g.kind == ModelGroupKind::All && !g.is_empty());
                if adds_all && base_elements && !base_content_emptiable(arena, base) {
                    self.report(
                        ErrorKind::InvalidContentModel,
                        format!(
                            "all group of extension '{}' requires the content of base type '{}' to be emptiable",
                            derived_name, base_name
                        ),
                        name,
                    );
                }
            }
            _ => {
                if ct.mixed && !base_ct.mixed && base_elements {
                    self.report(
                        ErrorKind::InvalidDerivation,
                        format!(
                            "restriction '{}' cannot be mixed: base type '{}' is element-only",
                            derived_name, base_name
                        ),
                        name,
                    );
                }
            }
        }
    }

    fn attribute_uses(&mut self, id: TypeId, ct: &'a ComplexType, base: Option<TypeId>) {
        let arena = self.arena;
        let name = &ct.name;
        for attribute in &ct.attributes {
            self.attribute(attribute, name);
        }
        self.duplicate_attributes(&ct.attributes, name);

        let id_uses = arena
            .attribute_uses(id)
            .iter()
            .filter(|u| u.type_id().map_or(false, |t| arena.is_id_type(t)))
            .count();
        if id_uses > 1 {
            self.report(
                ErrorKind::InvalidAttribute,
                format!(
                    "type '{}' has more than one attribute of type ID",
                    arena.display_name(id)
                ),
                name,
            );
        }

        let Some(base) = base.filter(|b| *b != TypeId::ANY_TYPE && arena.is_complex(*b)) else {
            return;
        };
        let base_uses = arena.attribute_uses(base);
        match ct.derivation {
            DerivationMethod::Extension => {
                for attribute in ct.attributes.iter().filter(|a| !a.is_prohibited()) {
                    if find_use(&base_uses, attribute).is_some() {
                        self.report(
                            ErrorKind::InvalidAttribute,
                            format!(
                                "extension '{}' redeclares attribute '{}' of base type '{}'",
                                arena.display_name(id),
                                attribute.name.local_name,
                                arena.display_name(base)
                            ),
                            name,
                        );
                    }
                }
            }
            _ => self.attribute_restriction(id, ct, base, &base_uses),
        }
    }

    fn attribute_restriction(
        &mut self,
        id: TypeId,
        ct: &ComplexType,
        base: TypeId,
        base_uses: &[AttributeDecl],
    ) {
        let arena = self.arena;
        let name = &ct.name;
        let derived_name = arena.display_name(id);
        let base_name = arena.display_name(base);
        let base_wildcard = arena.attribute_wildcard(base);

        for attribute in &ct.attributes {
            let local = &attribute.name.local_name;
            let Some(base_use) = find_use(base_uses, attribute) else {
                let namespace = attribute.effective_name(Form::Unqualified).namespace;
                let allowed = base_wildcard.as_ref().map_or(false, |w| w.allows(&namespace));
                if !attribute.is_prohibited() && !allowed {
                    self.report(
                        ErrorKind::InvalidDerivation,
                        format!(
                            "attribute '{}' of restriction '{}' is not allowed by base type '{}'",
                            local, derived_name, base_name
                        ),
                        name,
                    );
                }
                continue;
            };
            if base_use.use_mode == AttributeUse::Required
                && attribute.use_mode != AttributeUse::Required
            {
                self.report(
                    ErrorKind::InvalidDerivation,
                    format!(
                        "attribute '{}' is required in base type '{}' and must stay required in '{}'",
                        local, base_name, derived_name
                    ),
                    name,
                );
                continue;
            }
            if attribute.is_prohibited() {
                continue;
            }
            if let (Some(derived_type), Some(base_type)) = (attribute.type_id(), base_use.type_id()) {
                if !arena.is_derived_from(derived_type, base_type) {
                    self.report(
                        ErrorKind::InvalidDerivation,
                        format!(
                            "type of attribute '{}' in '{}' does not derive from its type in base type '{}'",
                            local, derived_name, base_name
                        ),
                        name,
                    );
                    continue;
                }
                if let Some(base_fixed) = &base_use.fixed {
                    let keeps = attribute
                        .fixed
                        .as_deref()
                        .map_or(false, |fixed| values_equal(arena, base_type, fixed, base_fixed));
                    if !keeps {
                        self.report(
                            ErrorKind::InvalidDerivation,
                            format!(
                                "attribute '{}' in '{}' must keep the fixed value '{}' of base type '{}'",
                                local, derived_name, base_fixed, base_name
                            ),
                            name,
                        );
                    }
                }
            }
        }

        if let Some(wildcard) = &ct.any_attribute {
            let subset = base_wildcard
                .as_ref()
                .map_or(false, |b| wildcard.is_restriction_of(b));
            if !subset {
                self.report(
                    ErrorKind::InvalidDerivation,
                    format!(
                        "attribute wildcard of restriction '{}' is not a subset of the wildcard of base type '{}'",
                        derived_name, base_name
                    ),
                    name,
                );
            }
        }
    }

    /// Element particles sharing a name must share a type
    fn element_consistency(&mut self, id: TypeId, ct: &ComplexType) {
        let arena = self.arena;
        let mut groups = Vec::new();
        for step in arena.chain(id) {
            let Some(TypeDefinition::Complex(step_ct)) = arena.get(step) else {
                break;
            };
            if let Some(group) = step_ct.model_group() {
                groups.push(group);
            }
            if step_ct.derivation != DerivationMethod::Extension {
                break;
            }
        }

        let mut seen: HashMap<QName, TypeId> = HashMap::new();
        for decl in groups.iter().rev().flat_map(|g| g.element_particles()) {
            let Some(type_id) = decl.type_id() else {
                continue;
            };
            let key = decl.effective_name(Form::Unqualified);
            match seen.get(&key) {
                Some(&other) if other != type_id => {
                    if other == TypeId::ANY_TYPE || type_id == TypeId::ANY_TYPE {
                        continue;
                    }
                    self.report(
                        ErrorKind::InconsistentElementDeclarations,
                        format!(
                            "element '{}' is declared with different types ('{}' and '{}') in '{}'",
                            key,
                            arena.display_name(other),
                            arena.display_name(type_id),
                            arena.display_name(id)
                        ),
                        &ct.name,
                    );
                }
                Some(_) => {}
                None => {
                    seen.insert(key, type_id);
                }
            }
        }
    }
}

fn find_use<'u>(uses: &'u [AttributeDecl], attribute: &AttributeDecl) -> Option<&'u AttributeDecl> {
    let wanted = attribute.effective_name(Form::Unqualified);
    uses.iter()
        .find(|u| u.effective_name(Form::Unqualified) == wanted)
}

/// Check if a type's effective content has element particles
fn has_element_content(arena: &TypeArena, id: TypeId) -> bool {
    for step in arena.chain(id) {
        let Some(TypeDefinition::Complex(ct)) = arena.get(step) else {
            return false;
        };
        if ct.model_group().map_or(false, |g| !g.is_empty()) {
            return true;
        }
        if ct.derivation != DerivationMethod::Extension {
            return false;
        }
    }
    false
}

fn base_content_emptiable(arena: &TypeArena, id: TypeId) -> bool {
    for step in arena.chain(id) {
        let Some(TypeDefinition::Complex(ct)) = arena.get(step) else {
            return true;
        };
        if !ct.model_group().map_or(true, |g| g.is_emptiable()) {
            return false;
        }
        if ct.derivation != DerivationMethod::Extension {
            return true;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::super::tests::{check, kinds};
    use crate::error::ErrorKind;

    #[test]
    fn test_element_declarations_consistent() {
        let errors = check(
            r#"<xs:complexType name="base">
                 <xs:sequence><xs:element name="a" type="xs:string"/></xs:sequence>
               </xs:complexType>
               <xs:complexType name="derived">
                 <xs:complexContent>
                   <xs:extension base="t:base">
                     <xs:sequence><xs:element name="a" type="xs:int"/></xs:sequence>
                   </xs:extension>
                 </xs:complexContent>
               </xs:complexType>"#,
        );
        assert_eq!(kinds(&errors), vec![ErrorKind::InconsistentElementDeclarations]);
        assert!(errors[0].message.contains("'a'"));
    }

    #[test]
    fn test_derivation_rules() {
        let errors = check(
            r#"<xs:complexType name="sealed" final="extension">
                 <xs:sequence><xs:element name="a"/></xs:sequence>
               </xs:complexType>
               <xs:complexType name="ext">
                 <xs:complexContent><xs:extension base="t:sealed"/></xs:complexContent>
               </xs:complexType>
               <xs:complexType name="fromSimple">
                 <xs:complexContent><xs:restriction base="xs:string"/></xs:complexContent>
               </xs:complexType>
               <xs:complexType name="badContent">
                 <xs:simpleContent><xs:restriction base="t:sealed"/></xs:simpleContent>
               </xs:complexType>"#,
        );
        assert_eq!(kinds(&errors), vec![ErrorKind::InvalidDerivation; 3]);
        assert!(errors[0].message.contains("simpleContent restriction"));
        assert!(errors[1].message.contains("derivation by extension"));
        assert!(errors[2].message.contains("simple type"));
    }

    #[test]
    fn test_attribute_restriction_rules() {
        let errors = check(
            r#"<xs:complexType name="base">
                 <xs:attribute name="a" type="xs:int" use="required"/>
                 <xs:attribute name="b" type="xs:string"/>
               </xs:complexType>
               <xs:complexType name="loose">
                 <xs:complexContent>
                   <xs:restriction base="t:base">
                     <xs:attribute name="a" type="xs:int"/>
                     <xs:attribute name="c" type="xs:string"/>
                   </xs:restriction>
                 </xs:complexContent>
               </xs:complexType>
               <xs:complexType name="tight">
                 <xs:complexContent>
                   <xs:restriction base="t:base">
                     <xs:attribute name="a" type="xs:short" use="required"/>
                     <xs:attribute name="b" use="prohibited"/>
                   </xs:restriction>
                 </xs:complexContent>
               </xs:complexType>"#,
        );
        assert_eq!(kinds(&errors), vec![ErrorKind::InvalidDerivation; 2]);
        assert!(errors[0].message.contains("must stay required"));
        assert!(errors[1].message.contains("'c'"));
    }

    #[test]
    fn test_two_id_attributes() {
        let errors = check(
            r#"<xs:complexType name="base"><xs:attribute name="a" type="xs:ID"/></xs:complexType>
               <xs:complexType name="derived">
                 <xs:complexContent>
                   <xs:extension base="t:base"><xs:attribute name="b" type="xs:ID"/></xs:extension>
                 </xs:complexContent>
               </xs:complexType>"#,
        );
        assert_eq!(kinds(&errors), vec![ErrorKind::InvalidAttribute]);
        assert!(errors[0].message.contains("more than one attribute of type ID"));
    }

    #[test]
    fn test_extension_with_all_over_content() {
        let errors = check(
            r#"<xs:complexType name="base">
                 <xs:sequence><xs:element name="a"/></xs:sequence>
               </xs:complexType>
               <xs:complexType name="derived">
                 <xs:complexContent>
                   <xs:extension base="t:base"><xs:all><xs:element name="b"/></xs:all></xs:extension>
                 </xs:complexContent>
               </xs:complexType>"#,
        );
        assert_eq!(kinds(&errors), vec![ErrorKind::InvalidContentModel]);
    }
}
