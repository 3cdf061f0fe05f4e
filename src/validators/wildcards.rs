//! XSD Wildcards
//!
//! This module implements wildcards for XSD element and attribute content:
//! - xs:any - allows any element from specified namespaces
//! - xs:anyAttribute - allows any attribute from specified namespaces
//!
//! It also carries the namespace-set algebra (subset, intersection, union)
//! used by particle derivation, attribute wildcard merging and UPA.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#Wildcards

use crate::error::{ErrorKind, SchemaError};
use std::collections::BTreeSet;
use std::fmt;

use super::globals::NamespaceRemap;
use super::particles::Occurs;

/// Process contents mode for wildcards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessContents {
    /// Validate strictly - element/attribute must be declared
    #[default]
    Strict,
    /// Validate if declaration found, otherwise accept
    Lax,
    /// Skip validation entirely
    Skip,
}

impl ProcessContents {
    /// Parse from string value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "strict" => Some(Self::Strict),
            "lax" => Some(Self::Lax),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }

    fn strength(&self) -> u8 {
        match self {
            Self::Skip => 0,
            Self::Lax => 1,
            Self::Strict => 2,
        }
    }

    /// Check if this is a valid restriction of another process contents
    /// (`skip < lax < strict`, the restriction may only get stricter)
    pub fn is_restriction_of(&self, other: &Self) -> bool {
        self.strength() >= other.strength()
    }
}

impl fmt::Display for ProcessContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Lax => write!(f, "lax"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Namespace constraint for wildcards
///
/// The empty string stands for "no namespace" inside a list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum NamespaceConstraint {
    /// Any namespace is allowed (##any)
    #[default]
    Any,
    /// Any namespace except the given one and no namespace (##other)
    Other(String),
    /// Specific set of allowed namespaces
    List(BTreeSet<String>),
}

impl NamespaceConstraint {
    /// Create from a `namespace` attribute value
    pub fn from_namespace_attr(
        value: &str,
        target_namespace: &str,
    ) -> Result<Self, SchemaError> {
        match value.trim() {
            "##any" => Ok(Self::Any),
            "##other" => Ok(Self::Other(target_namespace.to_string())),
            value => {
                let mut namespaces = BTreeSet::new();
                for ns in value.split_whitespace() {
                    match ns {
                        "##local" => {
                            namespaces.insert(String::new());
                        }
                        "##targetNamespace" => {
                            namespaces.insert(target_namespace.to_string());
                        }
                        s if s.starts_with("##") => {
                            return Err(SchemaError::new(
                                ErrorKind::Parse,
                                format!("wrong value '{}' in 'namespace' attribute", s),
                            ));
                        }
                        uri => {
                            namespaces.insert(uri.to_string());
                        }
                    }
                }
                Ok(Self::List(namespaces))
            }
        }
    }

    /// Check if a namespace is allowed by this constraint
    pub fn allows(&self, namespace: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Other(excluded) => !namespace.is_empty() && namespace != excluded,
            Self::List(set) => set.contains(namespace),
        }
    }

    /// Check whether the allowed set is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::List(set) if set.is_empty())
    }

    /// Namespace subset: every namespace allowed here is allowed by `other`
    pub fn is_subset_of(&self, other: &Self) -> bool {
        match (self, other) {
            (_, Self::Any) => true,
            (Self::Any, _) => false,
            (Self::Other(a), Self::Other(b)) => a == b || b.is_empty(),
            (Self::Other(_), Self::List(_)) => false,
            (Self::List(set), _) => set.iter().all(|ns| other.allows(ns)),
        }
    }

    /// Check whether the two constraints share at least one namespace
    ///
    /// Two `##other` constraints always intersect: both admit the namespaces
    /// outside their two exclusions.
    pub fn intersects(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::List(set), o) | (o, Self::List(set)) => set.iter().any(|ns| o.allows(ns)),
            _ => true,
        }
    }

    /// Set intersection, `None` when not expressible in XSD 1.0
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (a, b) if a == b => Some(a.clone()),
            (Self::Any, o) | (o, Self::Any) => Some(o.clone()),
            (Self::List(set), o) | (o, Self::List(set)) => Some(Self::List(
                set.iter().filter(|ns| o.allows(ns)).cloned().collect(),
            )),
            (Self::Other(a), Self::Other(b)) => {
                if a.is_empty() {
                    Some(Self::Other(b.clone()))
                } else if b.is_empty() {
                    Some(Self::Other(a.clone()))
                } else {
                    None
                }
            }
        }
    }

    /// Set union, `None` when not expressible in XSD 1.0
    pub fn union(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (a, b) if a == b => Some(a.clone()),
            (Self::Any, _) | (_, Self::Any) => Some(Self::Any),
            (Self::List(a), Self::List(b)) => Some(Self::List(a.union(b).cloned().collect())),
            (Self::Other(_), Self::Other(_)) => Some(Self::Other(String::new())),
            (Self::Other(excluded), Self::List(set)) | (Self::List(set), Self::Other(excluded)) => {
                let has_absent = set.contains("");
                let has_excluded = set.contains(excluded.as_str());
                match (has_absent, has_excluded || excluded.is_empty()) {
                    (true, true) => Some(Self::Any),
                    (false, true) => Some(Self::Other(String::new())),
                    (false, false) => Some(Self::Other(excluded.clone())),
                    (true, false) => None,
                }
            }
        }
    }
}

impl fmt::Display for NamespaceConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "##any"),
            Self::Other(ns) => write!(f, "##other({})", ns),
            Self::List(set) => {
                let items: Vec<&str> = set
                    .iter()
                    .map(|ns| if ns.is_empty() { "##local" } else { ns.as_str() })
                    .collect();
                write!(f, "{}", items.join(" "))
            }
        }
    }
}

/// An element (`xs:any`) or attribute (`xs:anyAttribute`) wildcard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wildcard {
    /// Allowed namespaces
    pub constraint: NamespaceConstraint,
    /// The `namespace` attribute as written, kept for chameleon remapping
    pub namespace_attr: Option<String>,
    /// Target namespace of the declaring schema
    pub target_namespace: String,
    /// Process contents mode
    pub process_contents: ProcessContents,
    /// Occurrence bounds (element wildcards only)
    pub occurs: Occurs,
}

impl Wildcard {
    /// Create a wildcard from its attribute values
    pub fn new(
        namespace_attr: Option<&str>,
        target_namespace: &str,
        process_contents: ProcessContents,
    ) -> Result<Self, SchemaError> {
        let constraint = NamespaceConstraint::from_namespace_attr(
            namespace_attr.unwrap_or("##any"),
            target_namespace,
        )?;
        Ok(Self {
            constraint,
            namespace_attr: namespace_attr.map(String::from),
            target_namespace: target_namespace.to_string(),
            process_contents,
            occurs: Occurs::once(),
        })
    }

    /// `##any` wildcard with strict processing
    pub fn any() -> Self {
        Self {
            constraint: NamespaceConstraint::Any,
            namespace_attr: None,
            target_namespace: String::new(),
            process_contents: ProcessContents::Strict,
            occurs: Occurs::once(),
        }
    }

    /// Set occurrence bounds
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    /// Check if a namespace is allowed
    pub fn allows(&self, namespace: &str) -> bool {
        self.constraint.allows(namespace)
    }

    /// Wildcard subset: namespace subset and process contents no weaker
    pub fn is_restriction_of(&self, base: &Wildcard) -> bool {
        self.process_contents.is_restriction_of(&base.process_contents)
            && self.constraint.is_subset_of(&base.constraint)
    }

    /// Wildcard admitting the namespaces both admit, with this wildcard's
    /// process contents; `None` when the intersection is not expressible
    pub fn intersection(&self, other: &Wildcard) -> Option<Wildcard> {
        let constraint = self.constraint.intersection(&other.constraint)?;
        Some(Wildcard {
            constraint,
            namespace_attr: None,
            ..self.clone()
        })
    }

    /// Wildcard admitting the namespaces either admits, with this wildcard's
    /// process contents; `None` when the union is not expressible
    pub fn union(&self, other: &Wildcard) -> Option<Wildcard> {
        let constraint = self.constraint.union(&other.constraint)?;
        Some(Wildcard {
            constraint,
            namespace_attr: None,
            ..self.clone()
        })
    }

    /// Move a no-namespace wildcard into `namespace`, recomputing the
    /// `##targetNamespace`/`##other` forms
    pub fn remap_target_namespace(&mut self, namespace: &str) {
        if !self.target_namespace.is_empty() {
            return;
        }
        self.target_namespace = namespace.to_string();
        let attr = self.namespace_attr.as_deref().unwrap_or("##any");
        if let Ok(constraint) = NamespaceConstraint::from_namespace_attr(attr, namespace) {
            self.constraint = constraint;
        }
    }
}

impl NamespaceRemap for Wildcard {
    fn remap_namespace(&mut self, namespace: &str) {
        self.remap_target_namespace(namespace);
    }
}

impl fmt::Display for Wildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "any[{}]", self.constraint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> NamespaceConstraint {
        NamespaceConstraint::List(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_process_contents() {
        assert_eq!(ProcessContents::from_str("lax"), Some(ProcessContents::Lax));
        assert!(ProcessContents::Strict.is_restriction_of(&ProcessContents::Skip));
        assert!(ProcessContents::Lax.is_restriction_of(&ProcessContents::Lax));
        assert!(!ProcessContents::Skip.is_restriction_of(&ProcessContents::Lax));
    }

    #[test]
    fn test_from_namespace_attr() {
        let c = NamespaceConstraint::from_namespace_attr("##targetNamespace ##local urn:x", "urn:t")
            .unwrap();
        assert_eq!(c, list(&["urn:t", "", "urn:x"]));
        assert!(NamespaceConstraint::from_namespace_attr("##bogus", "").is_err());
        assert_eq!(
            NamespaceConstraint::from_namespace_attr("##other", "urn:t").unwrap(),
            NamespaceConstraint::Other("urn:t".into())
        );
    }

    #[test]
    fn test_allows() {
        let other = NamespaceConstraint::Other("urn:t".into());
        assert!(other.allows("urn:x"));
        assert!(!other.allows("urn:t"));
        assert!(!other.allows(""));
        assert!(list(&[""]).allows(""));
    }

    #[test]
    fn test_subset() {
        let other = NamespaceConstraint::Other("urn:t".into());
        assert!(list(&["urn:a"]).is_subset_of(&other));
        assert!(!list(&["urn:t"]).is_subset_of(&other));
        assert!(!list(&[""]).is_subset_of(&other));
        assert!(other.is_subset_of(&NamespaceConstraint::Any));
        assert!(!NamespaceConstraint::Any.is_subset_of(&other));
        assert!(!other.is_subset_of(&list(&["urn:a"])));
    }

    #[test]
    fn test_intersects() {
        let a = NamespaceConstraint::Other("urn:a".into());
        let b = NamespaceConstraint::Other("urn:b".into());
        assert!(a.intersects(&b));
        assert!(!list(&["urn:a"]).intersects(&a));
        assert!(list(&["urn:a"]).intersects(&NamespaceConstraint::Any));
        assert!(!list(&[]).intersects(&NamespaceConstraint::Any));
    }

    #[test]
    fn test_intersection_and_union() {
        let other = NamespaceConstraint::Other("urn:t".into());
        assert_eq!(
            other.intersection(&list(&["urn:t", "urn:x", ""])),
            Some(list(&["urn:x"]))
        );
        assert_eq!(
            NamespaceConstraint::Any.intersection(&other),
            Some(other.clone())
        );
        assert_eq!(other.union(&list(&["urn:t", ""])), Some(NamespaceConstraint::Any));
        assert_eq!(other.union(&list(&["urn:x"])), Some(other.clone()));
        assert_eq!(other.union(&list(&[""])), None);
    }

    #[test]
    fn test_wildcard_restriction() {
        let base = Wildcard::new(Some("##any"), "urn:t", ProcessContents::Lax).unwrap();
        let derived = Wildcard::new(Some("##other"), "urn:t", ProcessContents::Strict).unwrap();
        assert!(derived.is_restriction_of(&base));
        assert!(!base.is_restriction_of(&derived));
    }

    #[test]
    fn test_chameleon_remap() {
        let mut wildcard =
            Wildcard::new(Some("##targetNamespace"), "", ProcessContents::Strict).unwrap();
        assert!(wildcard.allows(""));
        wildcard.remap_target_namespace("urn:a");
        assert!(wildcard.allows("urn:a"));
        assert!(!wildcard.allows(""));
    }

    #[test]
    fn test_wildcard_intersection_keeps_process_contents() {
        let lax = Wildcard::new(Some("##other"), "urn:t", ProcessContents::Lax).unwrap();
        let list = Wildcard::new(Some("urn:x urn:t"), "urn:t", ProcessContents::Strict).unwrap();
        let both = lax.intersection(&list).unwrap();
        assert_eq!(both.process_contents, ProcessContents::Lax);
        assert!(both.allows("urn:x"));
        assert!(!both.allows("urn:t"));

        let either = list.union(&lax).unwrap();
        assert_eq!(either.process_contents, ProcessContents::Strict);
        assert!(either.allows("urn:t"));
        assert!(!either.allows(""));
    }
}
