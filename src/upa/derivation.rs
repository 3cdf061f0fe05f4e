//! Particle restriction
//!
//! A complex content restriction must accept nothing its base rejects:
//! every particle of the derived content maps onto a base particle that it
//! restricts, and the base particles left without a counterpart must be
//! emptiable. Groups of one particle and groups nested in a group of the
//! same compositor are looked through before comparing.

use std::borrow::Cow;

use crate::error::{Error, ErrorKind, Result, SchemaError};
use crate::validators::complex_types::ComplexType;
use crate::validators::elements::ElementDecl;
use crate::validators::globals::TypeId;
use crate::validators::groups::{ModelGroup, ModelGroupKind, Particle};
use crate::validators::particles::Occurs;
use crate::validators::schemas::Form;
use crate::validators::values::values_equal;
use crate::validators::wildcards::Wildcard;

use super::{Analyzer, Term};

type Outcome = std::result::Result<(), String>;

/// Check the content of a complex content restriction against its base
pub(super) fn check_restriction(
    analyzer: &Analyzer<'_>,
    id: TypeId,
    ct: &ComplexType,
    base: TypeId,
) -> Result<()> {
    let arena = analyzer.arena();
    let base_groups = arena.content_groups(base);
    let base_content: Option<Cow<'_, ModelGroup>> = match base_groups.as_slice() {
        [] => None,
        [only] => Some(Cow::Borrowed(*only)),
        groups => Some(Cow::Owned(groups.iter().fold(
            ModelGroup::sequence(),
            |seq, group| seq.with_particle(Particle::Group((*group).clone())),
        ))),
    };
    let derived = ct.model_group().filter(|g| !g.is_empty());

    let restriction = Restriction { analyzer };
    let outcome = match (derived, base_content.as_deref()) {
        (None, None) => Ok(()),
        (None, Some(base)) if base.is_emptiable() => Ok(()),
        (None, Some(_)) => {
            Err("the content is empty but the base content is not emptiable".to_string())
        }
        (Some(_), None) => Err("the base type has no element content".to_string()),
        (Some(derived), Some(base)) => restriction.particle(Term::Group(derived), Term::Group(base)),
    };

    outcome.map_err(|reason| {
        let name = arena.display_name(id);
        Error::Schema(
            SchemaError::new(
                ErrorKind::InvalidDerivation,
                format!(
                    "content of '{}' is not a valid restriction of the content of '{}': {}",
                    name,
                    arena.display_name(base),
                    reason
                ),
            )
            .with_component(name),
        )
    })
}

struct Restriction<'r, 'a> {
    analyzer: &'r Analyzer<'a>,
}

impl Restriction<'_, '_> {
    fn particle<'p>(&self, derived: Term<'p>, base: Term<'p>) -> Outcome {
        match (simplify(derived), simplify(base)) {
            (Term::Element(d), Term::Element(b)) => self.element(d, b),
            (Term::Element(d), Term::Wildcard(w)) => {
                occurs_within(d.occurs, w.occurs, &format!("element '{}'", d.name))?;
                let name = d.effective_name(Form::Unqualified);
                if w.allows(&name.namespace) {
                    Ok(())
                } else {
                    Err(format!("element '{}' is not allowed by base {}", name, w))
                }
            }
            (Term::Element(d), Term::Group(b)) => {
                let wrapper =
                    ModelGroup::new(b.kind).with_particle(Particle::Element(Box::new(d.clone())));
                self.groups(&wrapper, b)
            }
            (Term::Wildcard(d), Term::Wildcard(b)) => {
                occurs_within(d.occurs, b.occurs, &format!("wildcard {}", d))?;
                if d.is_restriction_of(b) {
                    Ok(())
                } else {
                    Err(format!("wildcard {} is not a subset of base wildcard {}", d, b))
                }
            }
            (Term::Wildcard(d), other) => Err(format!(
                "wildcard {} cannot restrict {}",
                d,
                other.describe()
            )),
            (Term::Group(d), Term::Wildcard(w)) => self.group_in_wildcard(Term::Group(d), w),
            (Term::Group(d), Term::Element(b)) => Err(format!(
                "{} group cannot restrict element '{}'",
                d.kind, b.name
            )),
            (Term::Group(d), Term::Group(b)) => self.groups(d, b),
        }
    }

    fn element(&self, derived: &ElementDecl, base: &ElementDecl) -> Outcome {
        let name = derived.effective_name(Form::Unqualified);
        if !self.analyzer.names(base).contains(&name) {
            return Err(format!(
                "element '{}' does not match base element '{}'",
                name, base.name
            ));
        }
        occurs_within(derived.occurs, base.occurs, &format!("element '{}'", name))?;
        if derived.nillable && !base.nillable {
            return Err(format!(
                "element '{}' is nillable but the base element is not",
                name
            ));
        }
        if let Some(fixed) = &base.fixed {
            let type_id = base.type_id().unwrap_or(TypeId::ANY_SIMPLE_TYPE);
            let kept = derived
                .fixed
                .as_deref()
                .map(|value| values_equal(self.analyzer.arena(), type_id, value, fixed))
                .unwrap_or(false);
            if !kept {
                return Err(format!(
                    "element '{}' must keep the fixed value '{}' of the base element",
                    name, fixed
                ));
            }
        }
        if !derived.block.is_superset_of(&base.block) {
            return Err(format!(
                "element '{}' blocks less than the base element",
                name
            ));
        }
        if let (Some(d), Some(b)) = (derived.type_id(), base.type_id()) {
            let arena = self.analyzer.arena();
            if b != TypeId::ANY_TYPE && !arena.is_derived_from(d, b) {
                return Err(format!(
                    "type '{}' of element '{}' is not derived from base type '{}'",
                    arena.display_name(d),
                    name,
                    arena.display_name(b)
                ));
            }
        }
        Ok(())
    }

    fn groups<'p>(&self, derived: &'p ModelGroup, base: &'p ModelGroup) -> Outcome {
        let what = format!("{} group", derived.kind);
        let dc = members(Term::Group(derived), derived.kind);
        let bc = members(Term::Group(base), base.kind);
        match (derived.kind, base.kind) {
            (ModelGroupKind::Sequence, ModelGroupKind::Sequence)
            | (ModelGroupKind::All, ModelGroupKind::All) => {
                occurs_within(derived.occurs, base.occurs, &what)?;
                self.ordered(&dc, &bc)
            }
            (ModelGroupKind::Choice, ModelGroupKind::Choice) => {
                occurs_within(derived.occurs, base.occurs, &what)?;
                self.each_matches(&dc, &bc, base.kind)
            }
            (ModelGroupKind::Sequence, ModelGroupKind::Choice) => {
                let count = dc.len() as u32;
                let total = Occurs::new(
                    derived.occurs.min.saturating_mul(count),
                    derived.occurs.max.map(|max| max.saturating_mul(count)),
                );
                occurs_within(total, base.occurs, &what)?;
                self.each_matches(&dc, &bc, base.kind)
            }
            (_, ModelGroupKind::All) if dc.len() == 1 => {
                occurs_within(derived.occurs, base.occurs, &what)?;
                self.unordered(&dc, &bc)
            }
            (d, b) => Err(format!("a {} group cannot restrict a {} group", d, b)),
        }
    }

    /// In-order mapping; skipped base particles must be emptiable
    fn ordered<'p>(&self, derived: &[Term<'p>], base: &[Term<'p>]) -> Outcome {
        let mut next = 0;
        for b in base {
            match derived.get(next) {
                Some(d) => match self.particle(*d, *b) {
                    Ok(()) => next += 1,
                    Err(reason) if !b.is_emptiable() => return Err(reason),
                    Err(_) => {}
                },
                None if !b.is_emptiable() => {
                    return Err(format!("required base {} is missing", b.describe()));
                }
                None => {}
            }
        }
        match derived.get(next) {
            Some(d) => Err(format!(
                "{} has no counterpart in the base content",
                d.describe()
            )),
            None => Ok(()),
        }
    }

    /// Every derived particle restricts some base particle
    fn each_matches<'p>(
        &self,
        derived: &[Term<'p>],
        base: &[Term<'p>],
        kind: ModelGroupKind,
    ) -> Outcome {
        for d in derived {
            if !base.iter().any(|b| self.particle(*d, *b).is_ok()) {
                return Err(format!(
                    "{} matches no particle of the base {} group",
                    d.describe(),
                    kind
                ));
            }
        }
        Ok(())
    }

    /// One base particle per derived particle, in any order
    fn unordered<'p>(&self, derived: &[Term<'p>], base: &[Term<'p>]) -> Outcome {
        let mut used = vec![false; base.len()];
        for d in derived {
            let found = (0..base.len()).find(|&j| !used[j] && self.particle(*d, base[j]).is_ok());
            match found {
                Some(j) => used[j] = true,
                None => {
                    return Err(format!(
                        "{} has no counterpart in the base content",
                        d.describe()
                    ))
                }
            }
        }
        for (b, used) in base.iter().zip(used) {
            if !used && !b.is_emptiable() {
                return Err(format!("required base {} is missing", b.describe()));
            }
        }
        Ok(())
    }

    /// A group under a base wildcard: every leaf must be admitted and the
    /// total occurrence range must fit the wildcard's
    fn group_in_wildcard(&self, derived: Term<'_>, wildcard: &Wildcard) -> Outcome {
        let mut leaves = Vec::new();
        all_leaves(derived, &mut leaves);
        for leaf in leaves {
            let admitted = match leaf {
                Term::Element(decl) => {
                    wildcard.allows(&decl.effective_name(Form::Unqualified).namespace)
                }
                Term::Wildcard(inner) => inner.is_restriction_of(wildcard),
                Term::Group(_) => true,
            };
            if !admitted {
                return Err(format!(
                    "{} is not allowed by base wildcard {}",
                    leaf.describe(),
                    wildcard
                ));
            }
        }
        occurs_within(
            effective_range(derived),
            wildcard.occurs,
            &derived.describe(),
        )
    }
}

fn occurs_within(derived: Occurs, base: Occurs, what: &str) -> Outcome {
    if derived.has_occurs_restriction(&base) {
        Ok(())
    } else {
        Err(format!(
            "occurrence range {} of {} is not within the base range {}",
            derived, what, base
        ))
    }
}

/// Look through groups that occur once and hold a single particle
fn simplify(term: Term<'_>) -> Term<'_> {
    let mut term = term;
    while let Term::Group(group) = term {
        let children = term.children();
        if group.occurs != Occurs::once() || children.len() != 1 {
            break;
        }
        term = children[0];
    }
    term
}

/// Particles of a group, splicing in nested groups of the same compositor
/// and dropping particles that cannot occur
fn members(term: Term<'_>, kind: ModelGroupKind) -> Vec<Term<'_>> {
    let mut out = Vec::new();
    for child in term.children() {
        if child.occurs().is_empty() {
            continue;
        }
        match simplify(child) {
            Term::Group(inner) if inner.kind == kind && inner.occurs == Occurs::once() => {
                out.extend(members(Term::Group(inner), kind));
            }
            other => out.push(other),
        }
    }
    out
}

fn all_leaves<'p>(term: Term<'p>, out: &mut Vec<Term<'p>>) {
    match term {
        Term::Group(_) => {
            for child in term.children() {
                all_leaves(child, out);
            }
        }
        leaf => out.push(leaf),
    }
}

/// Range of elements a particle can match in total
fn effective_range(term: Term<'_>) -> Occurs {
    let Term::Group(group) = term else {
        return term.occurs();
    };
    let children: Vec<Occurs> = term.children().into_iter().map(effective_range).collect();
    let inner = match group.kind {
        ModelGroupKind::Sequence | ModelGroupKind::All => children
            .iter()
            .fold(Occurs::new(0, Some(0)), |acc, c| acc.add(c)),
        ModelGroupKind::Choice => {
            if children.is_empty() {
                Occurs::new(0, Some(0))
            } else {
                let min = children.iter().map(|c| c.min).min().unwrap_or(0);
                let max = children
                    .iter()
                    .try_fold(0u32, |acc, c| c.max.map(|m| acc.max(m)));
                Occurs::new(min, max)
            }
        }
    };
    inner.multiply(&group.occurs)
}

#[cfg(test)]
mod tests {
    use super::super::tests::analyze;
    use super::*;

    fn restrict(base: &str, derived: &str) -> Option<ErrorKind> {
        let body = format!(
            r#"<xs:complexType name="base">{}</xs:complexType>
               <xs:complexType name="derived">
                 <xs:complexContent>
                   <xs:restriction base="t:base">{}</xs:restriction>
                 </xs:complexContent>
               </xs:complexType>"#,
            base, derived
        );
        analyze(&body).err().and_then(|e| e.kind())
    }

    #[test]
    fn test_sequence_restriction() {
        let base = r#"<xs:sequence>
                        <xs:element name="a"/>
                        <xs:element name="b" minOccurs="0"/>
                        <xs:element name="c" maxOccurs="unbounded"/>
                      </xs:sequence>"#;
        let kind = restrict(
            base,
            r#"<xs:sequence>
                 <xs:element name="a"/>
                 <xs:element name="c" maxOccurs="2"/>
               </xs:sequence>"#,
        );
        assert_eq!(kind, None);

        let kind = restrict(
            base,
            r#"<xs:sequence>
                 <xs:element name="c"/>
               </xs:sequence>"#,
        );
        assert_eq!(kind, Some(ErrorKind::InvalidDerivation));
    }

    #[test]
    fn test_occurs_cannot_widen() {
        let kind = restrict(
            r#"<xs:sequence><xs:element name="a" minOccurs="0"/></xs:sequence>"#,
            r#"<xs:sequence><xs:element name="a" minOccurs="0" maxOccurs="unbounded"/></xs:sequence>"#,
        );
        assert_eq!(kind, Some(ErrorKind::InvalidDerivation));
    }

    #[test]
    fn test_base_wildcard_licenses_groups() {
        let kind = restrict(
            r###"<xs:sequence>
                 <xs:any namespace="##any" processContents="lax" minOccurs="0" maxOccurs="unbounded"/>
               </xs:sequence>"###,
            r#"<xs:sequence>
                 <xs:choice>
                   <xs:element name="x"/>
                   <xs:element name="y"/>
                 </xs:choice>
               </xs:sequence>"#,
        );
        assert_eq!(kind, None);
    }

    #[test]
    fn test_compositor_changes() {
        let choice = r#"<xs:choice>
                          <xs:element name="a"/>
                          <xs:element name="b"/>
                        </xs:choice>"#;
        let kind = restrict(
            r#"<xs:choice maxOccurs="2">
                 <xs:element name="a"/>
                 <xs:element name="b"/>
               </xs:choice>"#,
            r#"<xs:sequence>
                 <xs:element name="a"/>
                 <xs:element name="b"/>
               </xs:sequence>"#,
        );
        assert_eq!(kind, None);

        let kind = restrict(
            r#"<xs:sequence>
                 <xs:element name="a"/>
                 <xs:element name="b"/>
               </xs:sequence>"#,
            choice,
        );
        assert_eq!(kind, Some(ErrorKind::InvalidDerivation));
    }

    #[test]
    fn test_element_restriction_rules() {
        let kind = restrict(
            r#"<xs:sequence><xs:element name="a" type="xs:decimal"/></xs:sequence>"#,
            r#"<xs:sequence><xs:element name="a" type="xs:string"/></xs:sequence>"#,
        );
        assert_eq!(kind, Some(ErrorKind::InvalidDerivation));

        let kind = restrict(
            r#"<xs:sequence><xs:element name="a" type="xs:decimal"/></xs:sequence>"#,
            r#"<xs:sequence><xs:element name="a" type="xs:int" nillable="true"/></xs:sequence>"#,
        );
        assert_eq!(kind, Some(ErrorKind::InvalidDerivation));

        let kind = restrict(
            r#"<xs:sequence><xs:element name="a" type="xs:decimal" fixed="1.0"/></xs:sequence>"#,
            r#"<xs:sequence><xs:element name="a" type="xs:decimal" fixed="1"/></xs:sequence>"#,
        );
        assert_eq!(kind, None);
    }

    #[test]
    fn test_effective_range() {
        let group = ModelGroup::choice()
            .with_occurs(Occurs::new(1, Some(3)))
            .with_particle(Particle::Any(Wildcard::any().with_occurs(Occurs::new(0, Some(2)))))
            .with_particle(Particle::Any(Wildcard::any()));
        assert_eq!(effective_range(Term::Group(&group)), Occurs::new(0, Some(6)));
    }
}
