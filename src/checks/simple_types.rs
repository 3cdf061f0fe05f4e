//! Simple type checks: derivation rules and facet consistency

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::ErrorKind;
use crate::namespaces::QName;
use crate::validators::complex_types::DerivationMethod;
use crate::validators::facets::{materialize_facets, Bound, DeferredFacet, Facet, FacetKind};
use crate::validators::globals::{TypeArena, TypeDefinition, TypeId, TypeRef};
use crate::validators::schemas::DerivationSet;
use crate::validators::simple_types::{SimpleDerivation, SimpleType, SimpleVariety};
use crate::validators::values::validate_value;

use super::Checker;

const LIST_FACETS: &[FacetKind] = &[
    FacetKind::Length,
    FacetKind::MinLength,
    FacetKind::MaxLength,
    FacetKind::Pattern,
    FacetKind::Enumeration,
    FacetKind::WhiteSpace,
];

const UNION_FACETS: &[FacetKind] = &[FacetKind::Pattern, FacetKind::Enumeration];

/// Types a restriction step is checked against
#[derive(Debug, Clone, Copy)]
pub(super) struct RestrictionBase {
    /// Type whose effective facets the step narrows
    pub facets: TypeId,
    /// Simple type giving the value space
    pub content: TypeId,
}

impl<'a> Checker<'a> {
    pub(super) fn simple_type(&mut self, id: TypeId) {
        let arena = self.arena;
        let Some(TypeDefinition::Simple(st)) = arena.get(id) else {
            return;
        };
        if arena.has_cycle(id) {
            self.report(
                ErrorKind::CircularDerivation,
                format!("type '{}' is derived from itself", arena.display_name(id)),
                &st.name,
            );
            return;
        }
        match &st.derivation {
            SimpleDerivation::Restriction { base, facets } => {
                let Some(base) = base.id() else {
                    return;
                };
                if !arena.is_simple(base) {
                    self.report(
                        ErrorKind::InvalidDerivation,
                        format!(
                            "base type '{}' of simple type '{}' is not a simple type",
                            arena.display_name(base),
                            arena.display_name(id)
                        ),
                        &st.name,
                    );
                    return;
                }
                self.final_allows(base, DerivationMethod::Restriction, id, &st.name);
                let base_types = RestrictionBase {
                    facets: base,
                    content: base,
                };
                self.restriction_facets(id, &st.name, base_types, facets);
                self.nested_type(base);
            }
            SimpleDerivation::List {
                item,
                conflicting_item,
            } => self.list_type(id, st, item, *conflicting_item),
            SimpleDerivation::Union { members } => self.union_type(id, st, members),
        }
    }

    fn list_type(&mut self, id: TypeId, st: &SimpleType, item: &TypeRef, conflicting: bool) {
        let arena = self.arena;
        if conflicting {
            self.report(
                ErrorKind::InvalidDerivation,
                format!(
                    "list type '{}' cannot have both an itemType attribute and a simpleType child",
                    arena.display_name(id)
                ),
                &st.name,
            );
        }
        let Some(item) = item.id() else {
            return;
        };
        if !arena.is_simple(item) {
            self.report(
                ErrorKind::InvalidDerivation,
                format!(
                    "item type '{}' of list '{}' is not a simple type",
                    arena.display_name(item),
                    arena.display_name(id)
                ),
                &st.name,
            );
            return;
        }
        if arena.variety(item) == Some(SimpleVariety::List) {
            self.report(
                ErrorKind::InvalidDerivation,
                format!(
                    "item type '{}' of list '{}' is itself a list type",
                    arena.display_name(item),
                    arena.display_name(id)
                ),
                &st.name,
            );
        }
        self.final_allows(item, DerivationMethod::List, id, &st.name);
        self.nested_type(item);
    }

    fn union_type(&mut self, id: TypeId, st: &SimpleType, members: &[TypeRef]) {
        let arena = self.arena;
        if members.is_empty() {
            self.report(
                ErrorKind::InvalidDerivation,
                format!("union '{}' has no member types", arena.display_name(id)),
                &st.name,
            );
            return;
        }
        for member in members.iter().filter_map(|m| m.id()) {
            if !arena.is_simple(member) {
                self.report(
                    ErrorKind::InvalidDerivation,
                    format!(
                        "member type '{}' of union '{}' is not a simple type",
                        arena.display_name(member),
                        arena.display_name(id)
                    ),
                    &st.name,
                );
                continue;
            }
            self.final_allows(member, DerivationMethod::Union, id, &st.name);
            self.nested_type(member);
        }
    }

    /// Report a derivation the base's `final` forbids
    pub(super) fn final_allows(
        &mut self,
        base: TypeId,
        method: DerivationMethod,
        derived: TypeId,
        component: &QName,
    ) {
        if final_of(self.arena, base).contains(method) {
            self.report(
                ErrorKind::InvalidDerivation,
                format!(
                    "type '{}' does not allow derivation by {} ('{}')",
                    self.arena.display_name(base),
                    method,
                    self.arena.display_name(derived)
                ),
                component,
            );
        }
    }

    /// Check the facets of one restriction step
    pub(super) fn restriction_facets(
        &mut self,
        id: TypeId,
        component: &QName,
        base: RestrictionBase,
        deferred: &[DeferredFacet],
    ) {
        let arena = self.arena;
        if !deferred.is_empty() {
            let variety = arena.variety(base.content);
            let admitted = |kind: FacetKind| match variety {
                Some(SimpleVariety::List) => LIST_FACETS.contains(&kind),
                Some(SimpleVariety::Union) => UNION_FACETS.contains(&kind),
                _ => arena
                    .builtin_ancestor(base.content)
                    .map_or(false, |b| b.admits(kind)),
            };
            let (_, mut errors) = materialize_facets(
                deferred,
                arena.primitive_of(base.content),
                arena.whitespace_of(base.facets),
            );
            let mut counts: HashMap<FacetKind, usize> = HashMap::new();
            for facet in deferred {
                *counts.entry(facet.kind).or_default() += 1;
            }
            let mut kinds: Vec<FacetKind> = counts.keys().copied().collect();
            kinds.sort();
            for kind in kinds {
                if !admitted(kind) {
                    errors.retain(|e| e.component.as_deref() != Some(kind.as_str()));
                    self.report(
                        ErrorKind::InvalidFacet,
                        format!(
                            "facet '{}' is not applicable to base type '{}'",
                            kind,
                            arena.display_name(base.content)
                        ),
                        component,
                    );
                } else if counts[&kind] > 1
                    && !matches!(kind, FacetKind::Pattern | FacetKind::Enumeration)
                {
                    self.report(
                        ErrorKind::InvalidFacet,
                        format!("facet '{}' is specified more than once", kind),
                        component,
                    );
                }
            }
            let origin = self.origin(component);
            for mut error in errors {
                if let Some(origin) = &origin {
                    error = error.with_system_id(origin.clone());
                }
                self.push(error);
            }

            let written = |kind: FacetKind| counts.contains_key(&kind);
            for (a, b) in [
                (FacetKind::Length, FacetKind::MinLength),
                (FacetKind::Length, FacetKind::MaxLength),
                (FacetKind::MinInclusive, FacetKind::MinExclusive),
                (FacetKind::MaxInclusive, FacetKind::MaxExclusive),
            ] {
                if written(a) && written(b) {
                    self.report(
                        ErrorKind::InvalidFacet,
                        format!("facets '{}' and '{}' cannot both be specified", a, b),
                        component,
                    );
                }
            }
        }

        let local = arena.local_facets(id);
        let inherited = arena.effective_facets(base.facets);
        self.facet_consistency(component, &inherited, local);
        self.facet_narrowing(component, base, &inherited, local);
        self.notation_enumeration(id, component, base, deferred);
    }

    /// The combined facets of the base and this step must agree
    fn facet_consistency(&mut self, component: &QName, inherited: &[Facet], local: &[Facet]) {
        let mut effective: Vec<&Facet> = inherited.iter().collect();
        effective.extend(local.iter());
        let latest = |kind: FacetKind| effective.iter().rev().find(|f| f.kind() == kind).copied();
        let count = |kind: FacetKind| latest(kind).and_then(|f| f.count());

        // length excludes minLength and maxLength anywhere on the chain
        let local_has = |kind: FacetKind| local.iter().any(|f| f.kind() == kind);
        let inherited_has = |kind: FacetKind| inherited.iter().any(|f| f.kind() == kind);
        let mut exclusive = false;
        for bound in [FacetKind::MinLength, FacetKind::MaxLength] {
            for (here, there) in [(FacetKind::Length, bound), (bound, FacetKind::Length)] {
                if local_has(here) && inherited_has(there) {
                    self.report(
                        ErrorKind::InvalidFacet,
                        format!(
                            "facet '{}' cannot be used when the base type has '{}'",
                            here, there
                        ),
                        component,
                    );
                    exclusive = true;
                }
            }
        }

        if let Some(length) = count(FacetKind::Length).filter(|_| !exclusive) {
            if let Some(min) = count(FacetKind::MinLength).filter(|min| *min > length) {
                self.report(
                    ErrorKind::InvalidFacet,
                    format!("length {} is less than minLength {}", length, min),
                    component,
                );
            }
            if let Some(max) = count(FacetKind::MaxLength).filter(|max| *max < length) {
                self.report(
                    ErrorKind::InvalidFacet,
                    format!("length {} is greater than maxLength {}", length, max),
                    component,
                );
            }
        }
        if let (Some(min), Some(max)) = (count(FacetKind::MinLength), count(FacetKind::MaxLength)) {
            if min > max {
                self.report(
                    ErrorKind::InvalidFacet,
                    format!("minLength {} is greater than maxLength {}", min, max),
                    component,
                );
            }
        }
        if let (Some(fraction), Some(total)) = (
            count(FacetKind::FractionDigits),
            count(FacetKind::TotalDigits),
        ) {
            if fraction > total {
                self.report(
                    ErrorKind::InvalidFacet,
                    format!(
                        "fractionDigits {} is greater than totalDigits {}",
                        fraction, total
                    ),
                    component,
                );
            }
        }

        let lower = effective
            .iter()
            .rev()
            .find(|f| matches!(f.kind(), FacetKind::MinInclusive | FacetKind::MinExclusive));
        let upper = effective
            .iter()
            .rev()
            .find(|f| matches!(f.kind(), FacetKind::MaxInclusive | FacetKind::MaxExclusive));
        if let (Some(lower), Some(upper)) = (lower, upper) {
            let (Some(low), Some(high)) = (lower.bound(), upper.bound()) else {
                return;
            };
            let both_inclusive =
                lower.kind() == FacetKind::MinInclusive && upper.kind() == FacetKind::MaxInclusive;
            let empty = match low.value.partial_cmp(&high.value) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => !both_inclusive,
                _ => false,
            };
            if empty {
                self.report(
                    ErrorKind::InvalidFacet,
                    format!(
                        "{} value '{}' is not below {} value '{}'",
                        lower.kind(),
                        low.lexical,
                        upper.kind(),
                        high.lexical
                    ),
                    component,
                );
            }
        }
    }

    /// Every facet of this step must narrow the base's value space
    fn facet_narrowing(
        &mut self,
        component: &QName,
        base: RestrictionBase,
        inherited: &[Facet],
        local: &[Facet],
    ) {
        let arena = self.arena;
        let base_name = arena.display_name(base.facets);
        let latest = |kind: FacetKind| inherited.iter().rev().find(|f| f.kind() == kind);

        for facet in local {
            let kind = facet.kind();
            if let Some(fixed) = latest(kind).filter(|f| f.is_fixed()) {
                if fixed.value_text() != facet.value_text() {
                    self.report(
                        ErrorKind::InvalidFacet,
                        format!(
                            "{} is fixed to '{}' in base type '{}' and cannot be changed",
                            kind,
                            fixed.value_text(),
                            base_name
                        ),
                        component,
                    );
                    continue;
                }
            }

            match facet {
                Facet::Length { value, .. } => {
                    if let Some(base_length) = latest(kind).and_then(|f| f.count()) {
                        if base_length != *value {
                            self.report(
                                ErrorKind::InvalidFacet,
                                format!(
                                    "length {} differs from length {} of base type '{}'",
                                    value, base_length, base_name
                                ),
                                component,
                            );
                        }
                    }
                }
                Facet::MinLength { value, .. } => {
                    if let Some(base_min) = latest(kind).and_then(|f| f.count()) {
                        if *value < base_min {
                            self.report(
                                ErrorKind::InvalidFacet,
                                format!(
                                    "minLength {} is less than minLength {} of base type '{}'",
                                    value, base_min, base_name
                                ),
                                component,
                            );
                        }
                    }
                }
                Facet::MaxLength { value, .. } => {
                    if let Some(base_max) = latest(kind).and_then(|f| f.count()) {
                        if *value > base_max {
                            self.report(
                                ErrorKind::InvalidFacet,
                                format!(
                                    "maxLength {} is greater than maxLength {} of base type '{}'",
                                    value, base_max, base_name
                                ),
                                component,
                            );
                        }
                    }
                }
                Facet::TotalDigits { value, .. } | Facet::FractionDigits { value, .. } => {
                    if let Some(base_digits) = latest(kind).and_then(|f| f.count()) {
                        if u64::from(*value) > base_digits {
                            self.report(
                                ErrorKind::InvalidFacet,
                                format!(
                                    "{} {} is greater than {} {} of base type '{}'",
                                    kind, value, kind, base_digits, base_name
                                ),
                                component,
                            );
                        }
                    }
                }
                Facet::WhiteSpace { value, .. } => {
                    let base_ws = arena.whitespace_of(base.facets);
                    if *value < base_ws {
                        self.report(
                            ErrorKind::InvalidFacet,
                            format!(
                                "whiteSpace '{}' is weaker than '{}' of base type '{}'",
                                value, base_ws, base_name
                            ),
                            component,
                        );
                    }
                }
                Facet::MinInclusive(bound)
                | Facet::MaxInclusive(bound)
                | Facet::MinExclusive(bound)
                | Facet::MaxExclusive(bound) => {
                    for base_kind in [
                        FacetKind::MinInclusive,
                        FacetKind::MinExclusive,
                        FacetKind::MaxInclusive,
                        FacetKind::MaxExclusive,
                    ] {
                        let Some(base_bound) = latest(base_kind).and_then(|f| f.bound()) else {
                            continue;
                        };
                        if range_widens(kind, bound, base_kind, base_bound) {
                            self.report(
                                ErrorKind::InvalidFacet,
                                format!(
                                    "{} value '{}' is outside the {} value '{}' of base type '{}'",
                                    kind, bound.lexical, base_kind, base_bound.lexical, base_name
                                ),
                                component,
                            );
                        }
                    }
                }
                Facet::Enumeration(values) => {
                    for value in values {
                        if let Err(reason) = validate_value(arena, base.facets, value) {
                            self.report(
                                ErrorKind::InvalidFacet,
                                format!(
                                    "enumeration value '{}' is not valid for base type '{}': {}",
                                    value, base_name, reason
                                ),
                                component,
                            );
                        }
                    }
                }
                Facet::Pattern(_) | Facet::PatternSet(_) => {}
            }
        }
    }

    /// Restrictions of NOTATION enumerate declared notations
    fn notation_enumeration(
        &mut self,
        id: TypeId,
        component: &QName,
        base: RestrictionBase,
        deferred: &[DeferredFacet],
    ) {
        if !self.arena.is_notation(base.content) {
            return;
        }
        let enumerated = self
            .arena
            .effective_facets(id)
            .iter()
            .any(|f| matches!(f, Facet::Enumeration(values) if !values.is_empty()));
        if !enumerated {
            self.report(
                ErrorKind::InvalidFacet,
                format!(
                    "restriction '{}' of NOTATION must have an enumeration facet",
                    self.arena.display_name(id)
                ),
                component,
            );
            return;
        }
        let notations = &self.schema.notations;
        for facet in deferred.iter().filter(|f| f.kind == FacetKind::Enumeration) {
            let declared = facet
                .qname
                .as_ref()
                .map_or(false, |name| notations.contains_key(name));
            if !declared {
                self.report(
                    ErrorKind::UnknownNotation,
                    format!(
                        "enumeration value '{}' does not name a declared notation",
                        facet.value
                    ),
                    component,
                );
            }
        }
    }
}

/// `final` of a type definition
pub(super) fn final_of(arena: &TypeArena, id: TypeId) -> DerivationSet {
    match arena.get(id) {
        Some(TypeDefinition::Simple(st)) => st.final_deriv,
        Some(TypeDefinition::Complex(ct)) => ct.final_deriv,
        _ => DerivationSet::default(),
    }
}

/// Check if a derived range bound reaches outside a base bound
fn range_widens(kind: FacetKind, bound: &Bound, base_kind: FacetKind, base: &Bound) -> bool {
    use FacetKind::*;
    let Some(order) = bound.value.partial_cmp(&base.value) else {
        return false;
    };
    match (kind, base_kind) {
        (MinInclusive, MinInclusive) | (MinExclusive, MinExclusive) | (MinExclusive, MinInclusive) => {
            order == Ordering::Less
        }
        (MinInclusive, MinExclusive) => order != Ordering::Greater,
        (MaxInclusive, MaxInclusive) | (MaxExclusive, MaxExclusive) | (MaxExclusive, MaxInclusive) => {
            order == Ordering::Greater
        }
        (MaxInclusive, MaxExclusive) => order != Ordering::Less,
        (MinInclusive, MaxInclusive) => order == Ordering::Greater,
        (MinInclusive, MaxExclusive) | (MinExclusive, MaxInclusive) | (MinExclusive, MaxExclusive) => {
            order != Ordering::Less
        }
        (MaxInclusive, MinInclusive) => order == Ordering::Less,
        (MaxInclusive, MinExclusive) | (MaxExclusive, MinInclusive) | (MaxExclusive, MinExclusive) => {
            order != Ordering::Greater
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{check, kinds};
    use crate::error::ErrorKind;

    #[test]
    fn test_widening_max_inclusive() {
        let errors = check(
            r#"<xs:simpleType name="small">
                 <xs:restriction base="xs:int"><xs:maxInclusive value="100"/></xs:restriction>
               </xs:simpleType>
               <xs:simpleType name="wide">
                 <xs:restriction base="t:small"><xs:maxInclusive value="200"/></xs:restriction>
               </xs:simpleType>
               <xs:simpleType name="narrow">
                 <xs:restriction base="t:small"><xs:maxInclusive value="50"/></xs:restriction>
               </xs:simpleType>"#,
        );
        assert_eq!(kinds(&errors), vec![ErrorKind::InvalidFacet]);
        assert!(errors[0].message.contains("maxInclusive"));
        assert!(errors[0].message.contains("'200'"));
    }

    #[test]
    fn test_length_rules() {
        let errors = check(
            r#"<xs:simpleType name="a">
                 <xs:restriction base="xs:string">
                   <xs:length value="3"/><xs:maxLength value="5"/>
                 </xs:restriction>
               </xs:simpleType>
               <xs:simpleType name="b">
                 <xs:restriction base="xs:string"><xs:length value="3"/></xs:restriction>
               </xs:simpleType>
               <xs:simpleType name="c">
                 <xs:restriction base="t:b"><xs:maxLength value="5"/></xs:restriction>
               </xs:simpleType>
               <xs:simpleType name="d">
                 <xs:restriction base="t:b"><xs:maxLength value="2"/></xs:restriction>
               </xs:simpleType>"#,
        );
        assert_eq!(kinds(&errors), vec![ErrorKind::InvalidFacet; 3]);
        assert!(errors[0].message.contains("cannot both be specified"));
        assert!(errors[1].message.contains("'maxLength' cannot be used"));
        assert_eq!(errors[1].component.as_deref(), Some("{urn:t}c"));
        assert!(errors[2].message.contains("'maxLength' cannot be used"));
        assert_eq!(errors[2].component.as_deref(), Some("{urn:t}d"));
    }

    #[test]
    fn test_length_after_inherited_bounds() {
        let errors = check(
            r#"<xs:simpleType name="bounded">
                 <xs:restriction base="xs:string">
                   <xs:minLength value="1"/><xs:maxLength value="8"/>
                 </xs:restriction>
               </xs:simpleType>
               <xs:simpleType name="fixed">
                 <xs:restriction base="t:bounded"><xs:length value="4"/></xs:restriction>
               </xs:simpleType>
               <xs:simpleType name="codes">
                 <xs:restriction base="xs:NMTOKENS"><xs:length value="2"/></xs:restriction>
               </xs:simpleType>"#,
        );
        assert_eq!(kinds(&errors), vec![ErrorKind::InvalidFacet; 2]);
        assert!(errors[0].message.contains("'length' cannot be used when the base type has 'minLength'"));
        assert!(errors[1].message.contains("'length' cannot be used when the base type has 'maxLength'"));
    }

    #[test]
    fn test_inapplicable_and_inconsistent_facets() {
        let errors = check(
            r#"<xs:simpleType name="a">
                 <xs:restriction base="xs:boolean"><xs:maxLength value="1"/></xs:restriction>
               </xs:simpleType>
               <xs:simpleType name="b">
                 <xs:restriction base="xs:decimal">
                   <xs:totalDigits value="2"/><xs:fractionDigits value="3"/>
                 </xs:restriction>
               </xs:simpleType>
               <xs:simpleType name="c">
                 <xs:restriction base="xs:int">
                   <xs:minInclusive value="10"/><xs:maxExclusive value="10"/>
                 </xs:restriction>
               </xs:simpleType>"#,
        );
        assert_eq!(kinds(&errors), vec![ErrorKind::InvalidFacet; 3]);
        assert!(errors[0].message.contains("not applicable"));
        assert!(errors[1].message.contains("fractionDigits 3"));
        assert!(errors[2].message.contains("minInclusive"));
    }

    #[test]
    fn test_fixed_facet_and_enumeration() {
        let errors = check(
            r#"<xs:simpleType name="code">
                 <xs:restriction base="xs:string"><xs:maxLength value="4" fixed="true"/></xs:restriction>
               </xs:simpleType>
               <xs:simpleType name="short">
                 <xs:restriction base="t:code"><xs:maxLength value="2"/></xs:restriction>
               </xs:simpleType>
               <xs:simpleType name="color">
                 <xs:restriction base="t:code">
                   <xs:enumeration value="red"/><xs:enumeration value="orange"/>
                 </xs:restriction>
               </xs:simpleType>"#,
        );
        assert_eq!(kinds(&errors), vec![ErrorKind::InvalidFacet; 2]);
        assert!(errors[0].message.contains("'orange'"));
        assert!(errors[1].message.contains("fixed"));
    }

    #[test]
    fn test_list_and_union_rules() {
        let errors = check(
            r#"<xs:simpleType name="ints"><xs:list itemType="xs:int"/></xs:simpleType>
               <xs:simpleType name="nested"><xs:list itemType="t:ints"/></xs:simpleType>
               <xs:simpleType name="sealed" final="union">
                 <xs:restriction base="xs:string"/>
               </xs:simpleType>
               <xs:simpleType name="either"><xs:union memberTypes="t:sealed xs:int"/></xs:simpleType>"#,
        );
        assert_eq!(
            kinds(&errors),
            vec![ErrorKind::InvalidDerivation, ErrorKind::InvalidDerivation]
        );
        assert!(errors[0].message.contains("union"));
        assert!(errors[1].message.contains("itself a list"));
    }

    #[test]
    fn test_notation_restriction() {
        let errors = check(
            r#"<xs:notation name="gif" public="image/gif"/>
               <xs:simpleType name="format">
                 <xs:restriction base="xs:NOTATION">
                   <xs:enumeration value="t:gif"/><xs:enumeration value="t:png"/>
                 </xs:restriction>
               </xs:simpleType>
               <xs:simpleType name="bare"><xs:restriction base="xs:NOTATION"/></xs:simpleType>"#,
        );
        assert_eq!(
            kinds(&errors),
            vec![ErrorKind::InvalidFacet, ErrorKind::UnknownNotation]
        );
        assert!(errors[0].message.contains("enumeration facet"));
        assert!(errors[1].message.contains("t:png"));
    }

    #[test]
    fn test_notation_value_resolves_its_prefix() {
        let errors = check(
            r#"<xs:notation name="gif" public="image/gif"/>
               <xs:simpleType name="format" xmlns:o="urn:other">
                 <xs:restriction base="xs:NOTATION">
                   <xs:enumeration value="o:gif"/>
                   <xs:enumeration value="t:gif"/>
                   <xs:enumeration value="gif" xmlns="urn:t"/>
                 </xs:restriction>
               </xs:simpleType>"#,
        );
        assert_eq!(kinds(&errors), vec![ErrorKind::UnknownNotation]);
        assert!(errors[0].message.contains("'o:gif'"));
    }
}
