//! XSD built-in types
//!
//! This module defines the built-in primitive and derived types for XML
//! Schema 1.0. Every entry records its base, white space discipline,
//! `ordered` property, primitive ancestor, admitted facets and a lexical
//! validator. The table is the single source for whitespace normalization
//! during value comparison.
//!
//! Reference: https://www.w3.org/TR/xmlschema-2/#built-in-datatypes

use crate::names::{is_valid_name, is_valid_ncname, is_valid_nmtoken, is_valid_qname};
use crate::namespaces::QName;
use crate::validators::facets::{FacetKind, WhiteSpace};
use crate::validators::helpers::{
    any_uri_validator, base64_binary_validator, hex_binary_validator, integer_in_range,
    language_validator, parse_boolean, parse_calendar, parse_decimal, parse_duration,
    parse_float, parse_integer, CalendarKind, LexicalResult,
};
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Type Names
// =============================================================================

/// XSD anyType type name
pub const XSD_ANY_TYPE: &str = "anyType";
/// XSD anySimpleType type name
pub const XSD_ANY_SIMPLE_TYPE: &str = "anySimpleType";
/// XSD string type name
pub const XSD_STRING: &str = "string";
/// XSD decimal type name
pub const XSD_DECIMAL: &str = "decimal";
/// XSD ID type name
pub const XSD_ID: &str = "ID";
/// XSD IDREF type name
pub const XSD_IDREF: &str = "IDREF";
/// XSD IDREFS type name
pub const XSD_IDREFS: &str = "IDREFS";
/// XSD NOTATION type name
pub const XSD_NOTATION: &str = "NOTATION";
/// XSD QName type name
pub const XSD_QNAME: &str = "QName";
/// XSD duration type name
pub const XSD_DURATION: &str = "duration";

/// Types introduced by XSD 1.1, rejected by this processor
pub const XSD11_TYPES: &[&str] = &[
    "anyAtomicType",
    "dateTimeStamp",
    "dayTimeDuration",
    "yearMonthDuration",
    "error",
];

/// Check whether a local name in the XSD namespace is an XSD 1.1 type
pub fn is_xsd11_type(name: &str) -> bool {
    XSD11_TYPES.contains(&name)
}

// =============================================================================
// Admitted Facets Sets
// =============================================================================

const NO_FACETS: &[FacetKind] = &[];

const STRING_FACETS: &[FacetKind] = &[
    FacetKind::Length,
    FacetKind::MinLength,
    FacetKind::MaxLength,
    FacetKind::Pattern,
    FacetKind::Enumeration,
    FacetKind::WhiteSpace,
];

const BOOLEAN_FACETS: &[FacetKind] = &[FacetKind::Pattern, FacetKind::WhiteSpace];

const ORDERED_FACETS: &[FacetKind] = &[
    FacetKind::Pattern,
    FacetKind::Enumeration,
    FacetKind::WhiteSpace,
    FacetKind::MaxInclusive,
    FacetKind::MaxExclusive,
    FacetKind::MinInclusive,
    FacetKind::MinExclusive,
];

const DECIMAL_FACETS: &[FacetKind] = &[
    FacetKind::TotalDigits,
    FacetKind::FractionDigits,
    FacetKind::Pattern,
    FacetKind::Enumeration,
    FacetKind::WhiteSpace,
    FacetKind::MaxInclusive,
    FacetKind::MaxExclusive,
    FacetKind::MinInclusive,
    FacetKind::MinExclusive,
];

// =============================================================================
// Built-in Type Definition
// =============================================================================

/// Category of XSD type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    /// Primitive type (defined directly by XML Schema Part 2)
    Primitive,
    /// Derived type (derived from another type)
    Derived,
    /// Special type (anyType, anySimpleType)
    Special,
}

/// The `ordered` fundamental facet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ordered {
    /// No order relation
    None,
    /// Partially ordered value space
    Partial,
    /// Totally ordered value space
    Total,
}

/// Definition of a built-in XSD type
#[derive(Debug, Clone)]
pub struct BuiltinType {
    /// Type name (local name without namespace)
    pub name: &'static str,
    /// Type category
    pub category: TypeCategory,
    /// Base type name (None for anyType)
    pub base_type: Option<&'static str>,
    /// White space handling
    pub white_space: WhiteSpace,
    /// The ordered property
    pub ordered: Ordered,
    /// Primitive ancestor (self for primitives, None for ur-types and lists)
    pub primitive: Option<&'static str>,
    /// Item type of the builtin list types
    pub item_type: Option<&'static str>,
    /// Admitted facets for this type
    pub admitted_facets: &'static [FacetKind],
    /// Lexical validator, applied to the normalized value
    validator: fn(&str) -> LexicalResult,
}

// Builtins are unique by name in the static table
impl PartialEq for BuiltinType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for BuiltinType {}

impl BuiltinType {
    /// Qualified name in the XSD namespace
    pub fn qname(&self) -> QName {
        QName::xsd(self.name)
    }

    /// Validate a string value against this type
    pub fn validate(&self, value: &str) -> LexicalResult {
        let normalized = self.white_space.normalize(value);
        (self.validator)(&normalized)
    }

    /// Check if this is one of the list types (IDREFS, ENTITIES, NMTOKENS)
    pub fn is_list(&self) -> bool {
        self.item_type.is_some()
    }

    /// Check if this is anyType or anySimpleType
    pub fn is_ur_type(&self) -> bool {
        self.category == TypeCategory::Special
    }

    /// Check if a facet is admitted on restrictions of this type
    pub fn admits(&self, kind: FacetKind) -> bool {
        self.admitted_facets.contains(&kind)
    }

    /// The primitive ancestor's table entry
    pub fn primitive_type(&self) -> Option<&'static BuiltinType> {
        self.primitive.and_then(get_builtin_type)
    }
}

impl fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xs:{}", self.name)
    }
}

// =============================================================================
// Validator Functions
// =============================================================================

fn accept_any(_value: &str) -> LexicalResult {
    Ok(())
}

fn validate_normalized_string(value: &str) -> LexicalResult {
    if value.contains(['\r', '\n', '\t']) {
        Err("normalizedString cannot contain CR, LF, or TAB characters".to_string())
    } else {
        Ok(())
    }
}

fn validate_token(value: &str) -> LexicalResult {
    validate_normalized_string(value)?;
    if value.starts_with(' ') || value.ends_with(' ') || value.contains("  ") {
        Err("token cannot have leading, trailing or repeated spaces".to_string())
    } else {
        Ok(())
    }
}

fn validate_name(value: &str) -> LexicalResult {
    if is_valid_name(value) {
        Ok(())
    } else {
        Err(format!("'{}' is not a valid Name", value))
    }
}

fn validate_ncname(value: &str) -> LexicalResult {
    if is_valid_ncname(value) {
        Ok(())
    } else {
        Err(format!("'{}' is not a valid NCName", value))
    }
}

fn validate_nmtoken(value: &str) -> LexicalResult {
    if is_valid_nmtoken(value) {
        Ok(())
    } else {
        Err(format!("'{}' is not a valid NMTOKEN", value))
    }
}

fn validate_qname(value: &str) -> LexicalResult {
    if is_valid_qname(value) {
        Ok(())
    } else {
        Err(format!("'{}' is not a valid QName", value))
    }
}

fn validate_list(value: &str, item: fn(&str) -> LexicalResult) -> LexicalResult {
    let mut count = 0;
    for token in value.split_whitespace() {
        item(token)?;
        count += 1;
    }
    if count == 0 {
        Err("list value must contain at least one item".to_string())
    } else {
        Ok(())
    }
}

fn validate_ncname_list(value: &str) -> LexicalResult {
    validate_list(value, validate_ncname)
}

fn validate_nmtoken_list(value: &str) -> LexicalResult {
    validate_list(value, validate_nmtoken)
}

// =============================================================================
// Built-in Type Registry
// =============================================================================

macro_rules! builtin {
    ($name:expr, $category:ident, $base:expr, $ws:ident, $ordered:ident, $primitive:expr,
     $facets:expr, $validator:expr) => {
        BuiltinType {
            name: $name,
            category: TypeCategory::$category,
            base_type: $base,
            white_space: WhiteSpace::$ws,
            ordered: Ordered::$ordered,
            primitive: $primitive,
            item_type: None,
            admitted_facets: $facets,
            validator: $validator,
        }
    };
}

macro_rules! builtin_list {
    ($name:expr, $item:expr, $validator:expr) => {
        BuiltinType {
            name: $name,
            category: TypeCategory::Derived,
            base_type: Some(XSD_ANY_SIMPLE_TYPE),
            white_space: WhiteSpace::Collapse,
            ordered: Ordered::None,
            primitive: None,
            item_type: Some($item),
            admitted_facets: STRING_FACETS,
            validator: $validator,
        }
    };
}

lazy_static::lazy_static! {
    /// Registry of all built-in XSD 1.0 types; anyType and anySimpleType
    /// come first
    pub static ref BUILTIN_TYPES: Vec<BuiltinType> = vec![
        // Special types
        builtin!(XSD_ANY_TYPE, Special, None, Preserve, None, None, NO_FACETS, accept_any),
        builtin!(XSD_ANY_SIMPLE_TYPE, Special, Some(XSD_ANY_TYPE), Preserve, None, None,
            NO_FACETS, accept_any),

        // String family
        builtin!("string", Primitive, Some(XSD_ANY_SIMPLE_TYPE), Preserve, None,
            Some("string"), STRING_FACETS, accept_any),
        builtin!("normalizedString", Derived, Some("string"), Replace, None,
            Some("string"), STRING_FACETS, validate_normalized_string),
        builtin!("token", Derived, Some("normalizedString"), Collapse, None,
            Some("string"), STRING_FACETS, validate_token),
        builtin!("language", Derived, Some("token"), Collapse, None,
            Some("string"), STRING_FACETS, language_validator),
        builtin!("Name", Derived, Some("token"), Collapse, None,
            Some("string"), STRING_FACETS, validate_name),
        builtin!("NCName", Derived, Some("Name"), Collapse, None,
            Some("string"), STRING_FACETS, validate_ncname),
        builtin!(XSD_ID, Derived, Some("NCName"), Collapse, None,
            Some("string"), STRING_FACETS, validate_ncname),
        builtin!(XSD_IDREF, Derived, Some("NCName"), Collapse, None,
            Some("string"), STRING_FACETS, validate_ncname),
        builtin!("ENTITY", Derived, Some("NCName"), Collapse, None,
            Some("string"), STRING_FACETS, validate_ncname),
        builtin!("NMTOKEN", Derived, Some("token"), Collapse, None,
            Some("string"), STRING_FACETS, validate_nmtoken),
        builtin_list!(XSD_IDREFS, XSD_IDREF, validate_ncname_list),
        builtin_list!("ENTITIES", "ENTITY", validate_ncname_list),
        builtin_list!("NMTOKENS", "NMTOKEN", validate_nmtoken_list),

        builtin!("boolean", Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, None,
            Some("boolean"), BOOLEAN_FACETS, |v| parse_boolean(v).map(|_| ())),

        // Decimal family
        builtin!(XSD_DECIMAL, Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, Total,
            Some(XSD_DECIMAL), DECIMAL_FACETS, |v| parse_decimal(v).map(|_| ())),
        builtin!("integer", Derived, Some(XSD_DECIMAL), Collapse, Total,
            Some(XSD_DECIMAL), DECIMAL_FACETS, |v| parse_integer(v).map(|_| ())),
        builtin!("nonPositiveInteger", Derived, Some("integer"), Collapse, Total,
            Some(XSD_DECIMAL), DECIMAL_FACETS, |v| integer_in_range(v, None, Some(0))),
        builtin!("negativeInteger", Derived, Some("nonPositiveInteger"), Collapse, Total,
            Some(XSD_DECIMAL), DECIMAL_FACETS, |v| integer_in_range(v, None, Some(-1))),
        builtin!("long", Derived, Some("integer"), Collapse, Total,
            Some(XSD_DECIMAL), DECIMAL_FACETS,
            |v| integer_in_range(v, Some(i64::MIN as i128), Some(i64::MAX as i128))),
        builtin!("int", Derived, Some("long"), Collapse, Total,
            Some(XSD_DECIMAL), DECIMAL_FACETS,
            |v| integer_in_range(v, Some(i32::MIN as i128), Some(i32::MAX as i128))),
        builtin!("short", Derived, Some("int"), Collapse, Total,
            Some(XSD_DECIMAL), DECIMAL_FACETS,
            |v| integer_in_range(v, Some(i16::MIN as i128), Some(i16::MAX as i128))),
        builtin!("byte", Derived, Some("short"), Collapse, Total,
            Some(XSD_DECIMAL), DECIMAL_FACETS,
            |v| integer_in_range(v, Some(i8::MIN as i128), Some(i8::MAX as i128))),
        builtin!("nonNegativeInteger", Derived, Some("integer"), Collapse, Total,
            Some(XSD_DECIMAL), DECIMAL_FACETS, |v| integer_in_range(v, Some(0), None)),
        builtin!("unsignedLong", Derived, Some("nonNegativeInteger"), Collapse, Total,
            Some(XSD_DECIMAL), DECIMAL_FACETS,
            |v| integer_in_range(v, Some(0), Some(u64::MAX as i128))),
        builtin!("unsignedInt", Derived, Some("unsignedLong"), Collapse, Total,
            Some(XSD_DECIMAL), DECIMAL_FACETS,
            |v| integer_in_range(v, Some(0), Some(u32::MAX as i128))),
        builtin!("unsignedShort", Derived, Some("unsignedInt"), Collapse, Total,
            Some(XSD_DECIMAL), DECIMAL_FACETS,
            |v| integer_in_range(v, Some(0), Some(u16::MAX as i128))),
        builtin!("unsignedByte", Derived, Some("unsignedShort"), Collapse, Total,
            Some(XSD_DECIMAL), DECIMAL_FACETS,
            |v| integer_in_range(v, Some(0), Some(u8::MAX as i128))),
        builtin!("positiveInteger", Derived, Some("nonNegativeInteger"), Collapse, Total,
            Some(XSD_DECIMAL), DECIMAL_FACETS, |v| integer_in_range(v, Some(1), None)),

        // Floating point
        builtin!("float", Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, Total,
            Some("float"), ORDERED_FACETS, |v| parse_float(v).map(|_| ())),
        builtin!("double", Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, Total,
            Some("double"), ORDERED_FACETS, |v| parse_float(v).map(|_| ())),

        // Date/time
        builtin!(XSD_DURATION, Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, Partial,
            Some(XSD_DURATION), ORDERED_FACETS, |v| parse_duration(v).map(|_| ())),
        builtin!("dateTime", Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, Partial,
            Some("dateTime"), ORDERED_FACETS,
            |v| parse_calendar(CalendarKind::DateTime, v).map(|_| ())),
        builtin!("time", Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, Partial,
            Some("time"), ORDERED_FACETS,
            |v| parse_calendar(CalendarKind::Time, v).map(|_| ())),
        builtin!("date", Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, Partial,
            Some("date"), ORDERED_FACETS,
            |v| parse_calendar(CalendarKind::Date, v).map(|_| ())),
        builtin!("gYearMonth", Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, Partial,
            Some("gYearMonth"), ORDERED_FACETS,
            |v| parse_calendar(CalendarKind::GYearMonth, v).map(|_| ())),
        builtin!("gYear", Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, Partial,
            Some("gYear"), ORDERED_FACETS,
            |v| parse_calendar(CalendarKind::GYear, v).map(|_| ())),
        builtin!("gMonthDay", Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, Partial,
            Some("gMonthDay"), ORDERED_FACETS,
            |v| parse_calendar(CalendarKind::GMonthDay, v).map(|_| ())),
        builtin!("gDay", Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, Partial,
            Some("gDay"), ORDERED_FACETS,
            |v| parse_calendar(CalendarKind::GDay, v).map(|_| ())),
        builtin!("gMonth", Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, Partial,
            Some("gMonth"), ORDERED_FACETS,
            |v| parse_calendar(CalendarKind::GMonth, v).map(|_| ())),

        // Binary
        builtin!("hexBinary", Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, None,
            Some("hexBinary"), STRING_FACETS, |v| hex_binary_validator(v).map(|_| ())),
        builtin!("base64Binary", Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, None,
            Some("base64Binary"), STRING_FACETS, |v| base64_binary_validator(v).map(|_| ())),

        // Other primitives
        builtin!("anyURI", Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, None,
            Some("anyURI"), STRING_FACETS, any_uri_validator),
        builtin!(XSD_QNAME, Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, None,
            Some(XSD_QNAME), STRING_FACETS, validate_qname),
        builtin!(XSD_NOTATION, Primitive, Some(XSD_ANY_SIMPLE_TYPE), Collapse, None,
            Some(XSD_NOTATION), STRING_FACETS, validate_qname),
    ];

    static ref BUILTIN_INDEX: HashMap<&'static str, usize> = BUILTIN_TYPES
        .iter()
        .enumerate()
        .map(|(i, t)| (t.name, i))
        .collect();
}

/// Get a built-in type by local name
pub fn get_builtin_type(name: &str) -> Option<&'static BuiltinType> {
    BUILTIN_INDEX.get(name).map(|&i| &BUILTIN_TYPES[i])
}

/// Position of a built-in type in [`BUILTIN_TYPES`]
pub fn builtin_index(name: &str) -> Option<usize> {
    BUILTIN_INDEX.get(name).copied()
}

/// Get a built-in type by qualified name
pub fn lookup_builtin(qname: &QName) -> Option<&'static BuiltinType> {
    if qname.is_xsd() {
        get_builtin_type(&qname.local_name)
    } else {
        None
    }
}

/// Validate a value against a built-in type by name
pub fn validate_builtin(type_name: &str, value: &str) -> LexicalResult {
    match get_builtin_type(type_name) {
        Some(t) => t.validate(value),
        None => Err(format!("unknown built-in type '{}'", type_name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order() {
        assert_eq!(BUILTIN_TYPES[0].name, XSD_ANY_TYPE);
        assert_eq!(BUILTIN_TYPES[1].name, XSD_ANY_SIMPLE_TYPE);
        assert!(get_builtin_type("anyAtomicType").is_none());
        assert!(is_xsd11_type("dateTimeStamp"));
        assert_eq!(get_builtin_type("int"), get_builtin_type("int"));
        assert_ne!(get_builtin_type("int"), get_builtin_type("long"));
    }

    #[test]
    fn test_string_types() {
        assert!(validate_builtin("string", " any  text ").is_ok());
        assert!(validate_builtin("token", "  collapsed   text ").is_ok());
        assert!(validate_builtin("NCName", "a:b").is_err());
        assert!(validate_builtin("ID", " id1 ").is_ok());
        assert!(validate_builtin("language", "en-GB").is_ok());
    }

    #[test]
    fn test_numeric_types() {
        assert!(validate_builtin("byte", "127").is_ok());
        assert!(validate_builtin("byte", "128").is_err());
        assert!(validate_builtin("unsignedLong", "18446744073709551615").is_ok());
        assert!(validate_builtin("positiveInteger", "0").is_err());
        assert!(validate_builtin("decimal", "-1.25").is_ok());
        assert!(validate_builtin("integer", "1.5").is_err());
        assert!(validate_builtin("double", "-INF").is_ok());
    }

    #[test]
    fn test_list_types() {
        let idrefs = get_builtin_type(XSD_IDREFS).unwrap();
        assert!(idrefs.is_list());
        assert_eq!(idrefs.item_type, Some(XSD_IDREF));
        assert!(idrefs.validate("a b  c").is_ok());
        assert!(idrefs.validate("   ").is_err());
        assert!(validate_builtin("NMTOKENS", "1 2 -x").is_ok());
    }

    #[test]
    fn test_properties() {
        let duration = get_builtin_type(XSD_DURATION).unwrap();
        assert_eq!(duration.ordered, Ordered::Partial);
        assert!(duration.admits(FacetKind::MaxInclusive));
        assert!(!duration.admits(FacetKind::TotalDigits));

        let short = get_builtin_type("short").unwrap();
        assert_eq!(short.primitive, Some(XSD_DECIMAL));
        assert_eq!(short.primitive_type().map(|p| p.name), Some(XSD_DECIMAL));

        let boolean = get_builtin_type("boolean").unwrap();
        assert_eq!(boolean.ordered, Ordered::None);
        assert!(!boolean.admits(FacetKind::Enumeration));
    }

    #[test]
    fn test_datetime_types() {
        assert!(validate_builtin("dateTime", "2024-06-01T12:30:00Z").is_ok());
        assert!(validate_builtin("date", "2024-06-31").is_err());
        assert!(validate_builtin("duration", "P1Y2M3DT4H5M6.7S").is_ok());
        assert!(validate_builtin("gYear", "2024").is_ok());
    }

    #[test]
    fn test_other_types() {
        assert!(validate_builtin("QName", "xs:string").is_ok());
        assert!(validate_builtin("QName", "a:b:c").is_err());
        assert!(validate_builtin("hexBinary", "0a1B").is_ok());
        assert!(validate_builtin("anyURI", "http://example.com/a b").is_ok());
        assert_eq!(lookup_builtin(&QName::xsd("int")).map(|t| t.name), Some("int"));
        assert!(lookup_builtin(&QName::local("int")).is_none());
    }
}
