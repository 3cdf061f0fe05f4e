//! Unique Particle Attribution
//!
//! A content model satisfies UPA when every element of an instance can be
//! attributed to a single particle without looking ahead. [`check_upa`]
//! looks for two particles that could both match the next element: the
//! branches of a choice or all group, and a particle of a sequence that may
//! be skipped or repeated against the siblings that follow it. The content
//! added by an extension is treated as a sequence after the base content.
//!
//! Restrictions of complex content are checked here too, since both walks
//! need the same leaf sets (see [`derivation`]).

mod derivation;

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};

use tracing::debug;

use crate::compiler::index::substitution_closure;
use crate::error::{Error, ErrorKind, Result, SchemaError};
use crate::namespaces::QName;
use crate::validators::complex_types::{ComplexType, ContentForm, DerivationMethod};
use crate::validators::elements::ElementDecl;
use crate::validators::globals::{TypeArena, TypeId};
use crate::validators::groups::{ModelGroup, ModelGroupKind, Particle};
use crate::validators::particles::Occurs;
use crate::validators::schemas::{Form, Schema};
use crate::validators::wildcards::Wildcard;

/// Check every complex type of a resolved schema for ambiguous content
/// models and invalid content restrictions
///
/// Stops at the first violation. On success the schema is marked as
/// UPA-validated.
pub fn check_upa(schema: &mut Schema) -> Result<()> {
    let analyzer = Analyzer::new(schema);
    let mut checked = 0usize;
    for (id, def) in schema.arena.iter() {
        let Some(ct) = def.as_complex() else {
            continue;
        };
        analyzer.complex_type(id, ct)?;
        checked += 1;
    }
    for def in schema.groups.values() {
        analyzer
            .term(Term::Group(&def.group))
            .map_err(|c| c.into_error(&def.name.to_string()))?;
    }
    debug!(types = checked, "unique particle attribution checked");
    schema.upa_validated = true;
    Ok(())
}

/// A particle seen through its term
#[derive(Debug, Clone, Copy)]
pub(crate) enum Term<'a> {
    Element(&'a ElementDecl),
    Wildcard(&'a Wildcard),
    Group(&'a ModelGroup),
}

impl<'a> Term<'a> {
    /// Term of a particle; unexpanded group references have none
    pub(crate) fn of(particle: &'a Particle) -> Option<Self> {
        match particle {
            Particle::Element(decl) => Some(Term::Element(&**decl)),
            Particle::Any(wildcard) => Some(Term::Wildcard(wildcard)),
            Particle::Group(group) => Some(Term::Group(group)),
            Particle::GroupRef(_) => None,
        }
    }

    pub(crate) fn occurs(&self) -> Occurs {
        match self {
            Term::Element(decl) => decl.occurs,
            Term::Wildcard(wildcard) => wildcard.occurs,
            Term::Group(group) => group.occurs,
        }
    }

    pub(crate) fn is_emptiable(&self) -> bool {
        match self {
            Term::Group(group) => group.is_emptiable(),
            other => other.occurs().is_emptiable(),
        }
    }

    pub(crate) fn children(&self) -> Vec<Term<'a>> {
        match self {
            Term::Group(group) => group.particles.iter().filter_map(Term::of).collect(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Term::Element(decl) => format!("element '{}'", decl.name),
            Term::Wildcard(wildcard) => format!("wildcard {}", wildcard),
            Term::Group(group) => format!("{} group", group.kind),
        }
    }

    /// Identity of the underlying particle
    fn address(&self) -> usize {
        match self {
            Term::Element(decl) => *decl as *const ElementDecl as usize,
            Term::Wildcard(wildcard) => *wildcard as *const Wildcard as usize,
            Term::Group(group) => *group as *const ModelGroup as usize,
        }
    }
}

/// Check whether a particle can occur more times than it must
fn repeats(occurs: Occurs) -> bool {
    occurs.max.map_or(true, |max| max > occurs.min.max(1))
}

/// Leaves that can match the first element of `term`
pub(crate) fn first_leaves<'a>(term: Term<'a>, out: &mut Vec<Term<'a>>) {
    if term.occurs().is_empty() {
        return;
    }
    let Term::Group(group) = term else {
        out.push(term);
        return;
    };
    for child in term.children() {
        first_leaves(child, out);
        if group.kind == ModelGroupKind::Sequence && !child.is_emptiable() {
            break;
        }
    }
}

/// Leaves that can still match at a point where `term` may already be
/// complete
fn continuations<'a>(term: Term<'a>, out: &mut Vec<Term<'a>>) {
    if term.occurs().is_empty() {
        return;
    }
    inner_continuations(term, out);
    if repeats(term.occurs()) {
        first_leaves(term, out);
    }
}

fn inner_continuations<'a>(term: Term<'a>, out: &mut Vec<Term<'a>>) {
    let Term::Group(group) = term else {
        return;
    };
    let children = term.children();
    match group.kind {
        ModelGroupKind::Sequence => {
            for child in children.into_iter().rev() {
                continuations(child, out);
                if !child.is_emptiable() {
                    break;
                }
                first_leaves(child, out);
            }
        }
        ModelGroupKind::Choice => {
            for child in children {
                continuations(child, out);
            }
        }
        ModelGroupKind::All => {
            for child in children {
                continuations(child, out);
                if child.is_emptiable() {
                    first_leaves(child, out);
                }
            }
        }
    }
}

fn leaves<'a>(term: Term<'a>) -> Vec<Term<'a>> {
    let mut out = Vec::new();
    first_leaves(term, &mut out);
    out
}

/// Two particles that can both match one element
#[derive(Debug)]
struct Conflict {
    first: String,
    second: String,
}

impl Conflict {
    fn into_error(self, owner: &str) -> Error {
        Error::Schema(
            SchemaError::new(
                ErrorKind::UPAViolation,
                format!(
                    "content model of '{}' is ambiguous: {} and {} can both match the same element",
                    owner, self.first, self.second
                ),
            )
            .with_component(owner),
        )
    }
}

pub(crate) struct Analyzer<'a> {
    schema: &'a Schema,
    arena: &'a TypeArena,
    /// Every element that may stand for a head, transitively
    substitutes: IndexMap<QName, IndexSet<QName>>,
}

impl<'a> Analyzer<'a> {
    pub(crate) fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            arena: &schema.arena,
            substitutes: substitution_closure(&schema.substitution_groups),
        }
    }

    fn complex_type(&self, id: TypeId, ct: &'a ComplexType) -> Result<()> {
        let owner = self.arena.display_name(id);
        let conflict = |c: Conflict| c.into_error(&owner);

        if ct.derivation == DerivationMethod::Extension {
            let groups: Vec<Term<'a>> = self
                .arena
                .content_groups(id)
                .into_iter()
                .map(Term::Group)
                .collect();
            if groups.len() > 1 {
                self.sequence(&groups).map_err(conflict)?;
            }
        }
        if let Some(group) = ct.model_group() {
            self.term(Term::Group(group)).map_err(conflict)?;
        }

        let base = ct.base.id().unwrap_or(TypeId::ANY_TYPE);
        if ct.derivation == DerivationMethod::Restriction
            && ct.content_form == ContentForm::ComplexContent
            && base != TypeId::ANY_TYPE
            && self.arena.is_complex(base)
        {
            derivation::check_restriction(self, id, ct, base)?;
        }
        Ok(())
    }

    /// Check a particle and every group nested in it
    fn term(&self, term: Term<'a>) -> std::result::Result<(), Conflict> {
        let Term::Group(group) = term else {
            return Ok(());
        };
        let children = term.children();
        match group.kind {
            ModelGroupKind::Choice | ModelGroupKind::All => {
                let firsts: Vec<Vec<Term<'a>>> = children.iter().map(|c| leaves(*c)).collect();
                for (i, left) in firsts.iter().enumerate() {
                    for right in &firsts[i + 1..] {
                        self.disjoint(left, right)?;
                    }
                }
            }
            ModelGroupKind::Sequence => self.sequence(&children)?,
        }
        if repeats(group.occurs) {
            // the end of one iteration against the start of the next
            let mut tail = Vec::new();
            inner_continuations(term, &mut tail);
            self.disjoint(&tail, &leaves(term))?;
        }
        for child in children {
            self.term(child)?;
        }
        Ok(())
    }

    /// Check sibling particles of a sequence
    ///
    /// `open` holds the leaves that may still match while the sequence
    /// could already move on; a required particle closes them.
    fn sequence(&self, children: &[Term<'a>]) -> std::result::Result<(), Conflict> {
        let mut open: Vec<Term<'a>> = Vec::new();
        for child in children {
            let starts = leaves(*child);
            self.disjoint(&open, &starts)?;
            if child.is_emptiable() {
                open.extend(starts);
            } else {
                open.clear();
            }
            continuations(*child, &mut open);
        }
        Ok(())
    }

    fn disjoint(&self, left: &[Term<'a>], right: &[Term<'a>]) -> std::result::Result<(), Conflict> {
        for x in left {
            for y in right {
                if x.address() != y.address() && self.overlaps(*x, *y) {
                    return Err(Conflict {
                        first: x.describe(),
                        second: y.describe(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Check whether two leaves can match the same element
    pub(crate) fn overlaps(&self, x: Term<'a>, y: Term<'a>) -> bool {
        match (x, y) {
            (Term::Element(a), Term::Element(b)) => {
                let names = self.names(a);
                self.names(b).iter().any(|n| names.contains(n))
            }
            (Term::Element(decl), Term::Wildcard(wildcard))
            | (Term::Wildcard(wildcard), Term::Element(decl)) => self
                .names(decl)
                .iter()
                .any(|n| wildcard.allows(&n.namespace)),
            (Term::Wildcard(a), Term::Wildcard(b)) => a.constraint.intersects(&b.constraint),
            _ => false,
        }
    }

    /// Names an element particle matches, substitutes included
    pub(crate) fn names(&self, decl: &ElementDecl) -> HashSet<QName> {
        let name = decl.effective_name(Form::Unqualified);
        let mut names = HashSet::from([name.clone()]);
        if decl.is_global() || decl.reference {
            if let Some(members) = self.substitutes.get(&name) {
                names.extend(members.iter().cloned());
            }
        }
        names
    }

    pub(crate) fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub(crate) fn arena(&self) -> &'a TypeArena {
        self.arena
    }
}
