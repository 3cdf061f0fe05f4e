//! Particle and model group checks

use std::collections::HashSet;

use crate::error::ErrorKind;
use crate::namespaces::QName;
use crate::validators::groups::{ModelGroup, ModelGroupKind, Particle};
use crate::validators::particles::Occurs;
use crate::validators::schemas::Form;

use super::Checker;

impl<'a> Checker<'a> {
    /// Check the content model of a complex type
    pub(super) fn content_group(&mut self, group: &ModelGroup, owner: &QName) {
        self.model_group(group, owner, true);
    }

    /// Check the body of a named model group definition
    pub(super) fn named_group(&mut self, group: &'a ModelGroup, name: &QName) {
        if group.occurs != Occurs::once() {
            self.report(
                ErrorKind::InvalidParticle,
                format!(
                    "the model group of group definition '{}' must occur exactly once",
                    name.local_name
                ),
                name,
            );
        }
        self.model_group(group, name, true);
        for decl in group.element_particles() {
            self.element(decl);
        }
    }

    fn model_group(&mut self, group: &ModelGroup, owner: &QName, top: bool) {
        self.occurs(group.occurs, &format!("{} group", group.kind), owner);
        if group.kind == ModelGroupKind::All {
            self.all_group(group, owner, top);
        }
        for particle in &group.particles {
            match particle {
                Particle::Group(inner) => self.model_group(inner, owner, false),
                Particle::GroupRef(_) => {}
                other => self.occurs(other.occurs(), &other.describe(), owner),
            }
        }
    }

    fn all_group(&mut self, group: &ModelGroup, owner: &QName, top: bool) {
        if !top {
            self.report(
                ErrorKind::InvalidContentModel,
                format!(
                    "all group in '{}' cannot be nested inside another model group",
                    owner.local_name
                ),
                owner,
            );
        }
        if group.occurs.min > 1 || group.occurs.max != Some(1) {
            self.report(
                ErrorKind::InvalidParticle,
                format!(
                    "all group in '{}' must have minOccurs 0 or 1 and maxOccurs 1, not {}",
                    owner.local_name, group.occurs
                ),
                owner,
            );
        }

        let mut names = HashSet::new();
        for particle in &group.particles {
            let Particle::Element(decl) = particle else {
                self.report(
                    ErrorKind::InvalidContentModel,
                    format!(
                        "all group in '{}' can only contain element particles, found {}",
                        owner.local_name,
                        particle.describe()
                    ),
                    owner,
                );
                continue;
            };
            if decl.occurs.max.map_or(true, |max| max > 1) {
                self.report(
                    ErrorKind::InvalidParticle,
                    format!(
                        "element '{}' in an all group cannot have maxOccurs greater than 1",
                        decl.name.local_name
                    ),
                    owner,
                );
            }
            let name = decl.effective_name(Form::Unqualified);
            if !names.insert(name) {
                self.report(
                    ErrorKind::InvalidContentModel,
                    format!(
                        "element '{}' appears more than once in an all group",
                        decl.name.local_name
                    ),
                    owner,
                );
            }
        }
    }

    fn occurs(&mut self, occurs: Occurs, what: &str, owner: &QName) {
        if !occurs.is_consistent() {
            self.report(
                ErrorKind::InvalidParticle,
                format!(
                    "maxOccurs of {} in '{}' is less than minOccurs ({})",
                    what, owner.local_name, occurs
                ),
                owner,
            );
        }
    }
}
