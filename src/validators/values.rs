//! Value-space checks for simple types
//!
//! Validates lexical values against resolved simple types, or complex types
//! with simple content. Used for default and fixed values, facet values
//! given in a derived type, NOTATION enumerations and the fixed-value
//! equality rule of element restriction.
//!
//! Reference: https://www.w3.org/TR/xmlschema-2/#rf-facets

use std::cmp::Ordering;

use rust_decimal::Decimal;

use super::builtins::BuiltinType;
use super::complex_types::ContentType;
use super::facets::Facet;
use super::globals::{TypeArena, TypeDefinition, TypeId};
use super::helpers::{
    base64_binary_validator, decimal_digits, hex_binary_validator, parse_boolean,
    parse_calendar, parse_decimal, parse_duration, parse_float, CalendarKind, CalendarValue,
    DurationValue, LexicalResult,
};
use super::simple_types::{SimpleDerivation, SimpleVariety};

/// Derivations deeper than this are treated as circular
const MAX_DERIVATION_DEPTH: usize = 64;

// =============================================================================
// Ordered values
// =============================================================================

/// A value of one of the ordered primitive types
#[derive(Debug, Clone, PartialEq)]
pub enum OrderedValue {
    /// decimal and the integer types
    Decimal(Decimal),
    /// float and double
    Float(f64),
    /// duration (partially ordered)
    Duration(DurationValue),
    /// the date and time types (partially ordered)
    Calendar(CalendarKind, CalendarValue),
}

impl PartialOrd for OrderedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (OrderedValue::Decimal(a), OrderedValue::Decimal(b)) => a.partial_cmp(b),
            (OrderedValue::Float(a), OrderedValue::Float(b)) => a.partial_cmp(b),
            (OrderedValue::Duration(a), OrderedValue::Duration(b)) => a.partial_cmp(b),
            (OrderedValue::Calendar(ka, a), OrderedValue::Calendar(kb, b)) if ka == kb => {
                a.partial_cmp(b)
            }
            _ => None,
        }
    }
}

impl OrderedValue {
    /// Parse a lexical of the given primitive type
    ///
    /// Returns None when the primitive has no order relation.
    pub fn parse(primitive: &str, lexical: &str) -> Option<LexicalResult<Self>> {
        let calendar = |kind: CalendarKind| {
            Some(parse_calendar(kind, lexical).map(|v| OrderedValue::Calendar(kind, v)))
        };
        match primitive {
            "decimal" => Some(parse_decimal(lexical).map(OrderedValue::Decimal)),
            "float" | "double" => Some(parse_float(lexical).map(OrderedValue::Float)),
            "duration" => Some(parse_duration(lexical).map(OrderedValue::Duration)),
            "dateTime" => calendar(CalendarKind::DateTime),
            "date" => calendar(CalendarKind::Date),
            "time" => calendar(CalendarKind::Time),
            "gYearMonth" => calendar(CalendarKind::GYearMonth),
            "gYear" => calendar(CalendarKind::GYear),
            "gMonthDay" => calendar(CalendarKind::GMonthDay),
            "gDay" => calendar(CalendarKind::GDay),
            "gMonth" => calendar(CalendarKind::GMonth),
            _ => None,
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Validate a lexical value against a type
pub fn validate_value(arena: &TypeArena, type_id: TypeId, value: &str) -> LexicalResult {
    let normalized = arena.whitespace_of(type_id).normalize(value);
    check_value(arena, type_id, &normalized, 0)
}

/// Compare two lexical values in the value space of a type
///
/// Values that cannot be parsed compare by their normalized text.
pub fn values_equal(arena: &TypeArena, type_id: TypeId, a: &str, b: &str) -> bool {
    let ws = arena.whitespace_of(type_id);
    let (a, b) = (ws.normalize(a), ws.normalize(b));
    lexical_equal(arena.primitive_of(type_id), &a, &b)
}

fn lexical_equal(primitive: Option<&BuiltinType>, a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let Some(primitive) = primitive else {
        return false;
    };
    if let (Some(Ok(x)), Some(Ok(y))) = (
        OrderedValue::parse(primitive.name, a),
        OrderedValue::parse(primitive.name, b),
    ) {
        return x.partial_cmp(&y) == Some(Ordering::Equal);
    }
    if primitive.name == "boolean" {
        if let (Ok(x), Ok(y)) = (parse_boolean(a), parse_boolean(b)) {
            return x == y;
        }
    }
    false
}

fn check_value(arena: &TypeArena, type_id: TypeId, value: &str, depth: usize) -> LexicalResult {
    if depth > MAX_DERIVATION_DEPTH {
        return Err(format!(
            "derivation of {} is circular",
            arena.display_name(type_id)
        ));
    }
    let definition = arena
        .get(type_id)
        .ok_or_else(|| format!("unknown type {}", type_id))?;

    match definition {
        TypeDefinition::Builtin(b) => {
            if b.name == "anyType" {
                Ok(())
            } else {
                b.validate(value)
            }
        }
        TypeDefinition::Simple(st) => match &st.derivation {
            SimpleDerivation::Restriction { base, .. } => {
                let base = resolved(base.id(), type_id, arena)?;
                check_value(arena, base, value, depth + 1)?;
                check_facets(arena, type_id, &st.facets, value)
            }
            SimpleDerivation::List { item, .. } => {
                let item = resolved(item.id(), type_id, arena)?;
                let item_ws = arena.whitespace_of(item);
                for token in value.split_whitespace() {
                    check_value(arena, item, &item_ws.normalize(token), depth + 1)?;
                }
                Ok(())
            }
            SimpleDerivation::Union { members } => {
                for member in members.iter().filter_map(|m| m.id()) {
                    let normalized = arena.whitespace_of(member).normalize(value);
                    if check_value(arena, member, &normalized, depth + 1).is_ok() {
                        return Ok(());
                    }
                }
                Err(format!(
                    "'{}' is not valid for any member type of {}",
                    value,
                    arena.display_name(type_id)
                ))
            }
        },
        TypeDefinition::Complex(ct) => match &ct.content {
            ContentType::Simple(sc) => {
                let base = resolved(ct.base.id(), type_id, arena)?;
                check_value(arena, base, value, depth + 1)?;
                check_facets(arena, type_id, &sc.facets, value)
            }
            _ if ct.mixed => Ok(()),
            _ => Err(format!(
                "{} does not allow character content",
                arena.display_name(type_id)
            )),
        },
    }
}

fn resolved(id: Option<TypeId>, owner: TypeId, arena: &TypeArena) -> LexicalResult<TypeId> {
    id.ok_or_else(|| format!("{} has an unresolved base", arena.display_name(owner)))
}

/// Length of a value as the length facets measure it
fn value_length(
    variety: Option<SimpleVariety>,
    primitive: Option<&BuiltinType>,
    value: &str,
) -> LexicalResult<Option<u64>> {
    if variety == Some(SimpleVariety::List) {
        return Ok(Some(value.split_whitespace().count() as u64));
    }
    let length = match primitive.map(|p| p.name) {
        Some("hexBinary") => hex_binary_validator(value)?,
        Some("base64Binary") => base64_binary_validator(value)?,
        Some("QName") | Some("NOTATION") => return Ok(None),
        _ => value.chars().count(),
    };
    Ok(Some(length as u64))
}

fn check_facets(arena: &TypeArena, type_id: TypeId, facets: &[Facet], value: &str) -> LexicalResult {
    let value_type = arena.simple_content_type(type_id).unwrap_or(type_id);
    let variety = arena.variety(value_type);
    let primitive = arena.primitive_of(value_type);

    for facet in facets {
        match facet {
            Facet::Length { value: n, .. } => {
                if let Some(len) = value_length(variety, primitive, value)? {
                    if len != *n {
                        return Err(format!("length of '{}' is {}, expected {}", value, len, n));
                    }
                }
            }
            Facet::MinLength { value: n, .. } => {
                if let Some(len) = value_length(variety, primitive, value)? {
                    if len < *n {
                        return Err(format!("length of '{}' is less than {}", value, n));
                    }
                }
            }
            Facet::MaxLength { value: n, .. } => {
                if let Some(len) = value_length(variety, primitive, value)? {
                    if len > *n {
                        return Err(format!("length of '{}' is greater than {}", value, n));
                    }
                }
            }
            Facet::Pattern(pattern) => {
                if !pattern.is_match(value) {
                    return Err(format!(
                        "'{}' does not match pattern '{}'",
                        value, pattern.source
                    ));
                }
            }
            Facet::PatternSet(patterns) => {
                if !patterns.iter().any(|p| p.is_match(value)) {
                    return Err(format!(
                        "'{}' does not match any of the patterns {}",
                        value,
                        facet.value_text()
                    ));
                }
            }
            Facet::Enumeration(values) => {
                if !values.iter().any(|e| lexical_equal(primitive, e, value)) {
                    return Err(format!(
                        "'{}' is not one of the enumerated values [{}]",
                        value,
                        values.join(", ")
                    ));
                }
            }
            Facet::MinInclusive(bound)
            | Facet::MaxInclusive(bound)
            | Facet::MinExclusive(bound)
            | Facet::MaxExclusive(bound) => {
                let Some(parsed) = primitive.and_then(|p| OrderedValue::parse(p.name, value))
                else {
                    continue;
                };
                let ordering = parsed?.partial_cmp(&bound.value);
                let ok = match facet {
                    Facet::MinInclusive(_) => {
                        matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                    }
                    Facet::MaxInclusive(_) => {
                        matches!(ordering, Some(Ordering::Less | Ordering::Equal))
                    }
                    Facet::MinExclusive(_) => ordering == Some(Ordering::Greater),
                    _ => ordering == Some(Ordering::Less),
                };
                if !ok {
                    return Err(format!(
                        "'{}' violates {} '{}'",
                        value,
                        facet.kind(),
                        bound.lexical
                    ));
                }
            }
            Facet::TotalDigits { value: n, .. } => {
                let (total, _) = decimal_digits(value);
                if total > *n as usize {
                    return Err(format!("'{}' has more than {} total digits", value, n));
                }
            }
            Facet::FractionDigits { value: n, .. } => {
                let (_, fraction) = decimal_digits(value);
                if fraction > *n as usize {
                    return Err(format!("'{}' has more than {} fraction digits", value, n));
                }
            }
            Facet::WhiteSpace { .. } => {}
        }
    }
    Ok(())
}
