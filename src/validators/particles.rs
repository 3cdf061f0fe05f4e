//! XSD Particle occurrence bounds
//!
//! Particles define occurrence constraints (minOccurs, maxOccurs) for
//! elements, model groups and wildcards.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#cParticles

use crate::error::{ErrorKind, SchemaError};
use serde::Serialize;
use std::fmt;

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
/// None for max_occurs means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self { min: 0, max: None }
    }

    /// One or more (1, unbounded)
    pub fn one_or_more() -> Self {
        Self { min: 1, max: None }
    }

    /// Check if this particle can be empty (minOccurs == 0)
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Check if this particle is empty (maxOccurs == 0)
    pub fn is_empty(&self) -> bool {
        self.max == Some(0)
    }

    /// Check if particle has maxOccurs == 1
    pub fn is_single(&self) -> bool {
        self.max == Some(1)
    }

    /// Check if particle can have multiple occurrences
    pub fn is_multiple(&self) -> bool {
        !self.is_empty() && !self.is_single()
    }

    /// Check if minOccurs != maxOccurs
    pub fn is_ambiguous(&self) -> bool {
        match self.max {
            Some(max) => self.min != max,
            None => true,
        }
    }

    /// Check if minOccurs == maxOccurs
    pub fn is_univocal(&self) -> bool {
        !self.is_ambiguous()
    }

    /// Check `maxOccurs >= max(minOccurs, 1)`, accepting `0..0`
    pub fn is_consistent(&self) -> bool {
        match self.max {
            None => true,
            Some(0) => self.min == 0,
            Some(max) => max >= self.min,
        }
    }

    /// Check if this particle has valid occurs restriction compared to another
    pub fn has_occurs_restriction(&self, other: &Occurs) -> bool {
        if self.min < other.min {
            return false;
        }

        // An emptied particle restricts anything
        if self.max == Some(0) {
            return true;
        }

        match (self.max, other.max) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(max), Some(other_max)) => max <= other_max,
        }
    }

    /// Product of two bounds, as for a particle nested in a group
    pub fn multiply(&self, other: &Occurs) -> Occurs {
        let max = match (self.max, other.max) {
            (Some(0), _) | (_, Some(0)) => Some(0),
            (Some(a), Some(b)) => Some(a.saturating_mul(b)),
            _ => None,
        };
        Occurs::new(self.min.saturating_mul(other.min), max)
    }

    /// Sum of two bounds, as for sibling particles of a sequence
    pub fn add(&self, other: &Occurs) -> Occurs {
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.saturating_add(b)),
            _ => None,
        };
        Occurs::new(self.min.saturating_add(other.min), max)
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

impl fmt::Display for Occurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}..{}", self.min, max),
            None => write!(f, "{}..unbounded", self.min),
        }
    }
}

/// Parse minOccurs/maxOccurs from XML attribute values
///
/// Only the lexical forms are checked here; `maxOccurs < minOccurs` is a
/// structural error reported later together with the other particle rules.
pub fn parse_occurs(
    min_occurs: Option<&str>,
    max_occurs: Option<&str>,
) -> Result<Occurs, SchemaError> {
    let mut occurs = Occurs::once();

    if let Some(min_str) = min_occurs {
        occurs.min = min_str.trim().parse::<u32>().map_err(|_| {
            SchemaError::new(
                ErrorKind::Parse,
                format!("minOccurs value '{}' is not a valid non-negative integer", min_str),
            )
        })?;
    }

    if let Some(max_str) = max_occurs {
        let max_str = max_str.trim();
        occurs.max = if max_str == "unbounded" {
            None
        } else {
            Some(max_str.parse::<u32>().map_err(|_| {
                SchemaError::new(
                    ErrorKind::Parse,
                    format!(
                        "maxOccurs value '{}' must be a non-negative integer or 'unbounded'",
                        max_str
                    ),
                )
            })?)
        };
    }

    Ok(occurs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occurs_presets() {
        assert_eq!(Occurs::default(), Occurs::new(1, Some(1)));
        assert!(Occurs::optional().is_emptiable());
        assert!(Occurs::zero_or_more().is_multiple());
        assert!(Occurs::one_or_more().is_ambiguous());
        assert!(Occurs::once().is_univocal());
    }

    #[test]
    fn test_occurs_consistency() {
        assert!(Occurs::new(0, Some(0)).is_consistent());
        assert!(Occurs::new(2, None).is_consistent());
        assert!(!Occurs::new(3, Some(2)).is_consistent());
        assert!(!Occurs::new(1, Some(0)).is_consistent());
    }

    #[test]
    fn test_occurs_restriction() {
        let base = Occurs::new(0, None);
        assert!(Occurs::new(1, Some(5)).has_occurs_restriction(&base));
        assert!(!Occurs::new(0, None).has_occurs_restriction(&Occurs::new(0, Some(3))));
        assert!(!Occurs::new(0, Some(1)).has_occurs_restriction(&Occurs::once()));
        assert!(Occurs::new(1, Some(0)).has_occurs_restriction(&Occurs::once()));
    }

    #[test]
    fn test_occurs_arithmetic() {
        let a = Occurs::new(1, Some(2));
        let b = Occurs::new(0, None);
        assert_eq!(a.multiply(&Occurs::new(2, Some(3))), Occurs::new(2, Some(6)));
        assert_eq!(a.multiply(&b), Occurs::new(0, None));
        assert_eq!(a.add(&a), Occurs::new(2, Some(4)));
        assert_eq!(a.add(&b), Occurs::new(1, None));
    }

    #[test]
    fn test_parse_occurs() {
        assert_eq!(parse_occurs(None, None).unwrap(), Occurs::once());
        assert_eq!(parse_occurs(Some("0"), Some("unbounded")).unwrap(), Occurs::zero_or_more());
        // Inconsistent bounds parse; they are rejected structurally
        assert_eq!(parse_occurs(Some("3"), Some("2")).unwrap(), Occurs::new(3, Some(2)));
        assert!(parse_occurs(Some("-1"), None).is_err());
        assert!(parse_occurs(None, Some("many")).is_err());
    }

    #[test]
    fn test_occurs_display() {
        assert_eq!(Occurs::zero_or_more().to_string(), "0..unbounded");
        assert_eq!(Occurs::once().to_string(), "1..1");
    }
}
