//! XSD constraining facets
//!
//! The parser records facets as [`DeferredFacet`]s because their values can
//! only be interpreted once the base type is known. After reference
//! resolution they are materialized into [`Facet`] values.
//!
//! Patterns of one derivation step are grouped into a single
//! [`Facet::PatternSet`] (OR semantics); steps are combined by keeping one
//! entry per step (AND semantics).

use crate::error::{ErrorKind, SchemaError};
use crate::namespaces::QName;
use crate::validators::builtins::BuiltinType;
use crate::validators::globals::NamespaceRemap;
use crate::validators::values::OrderedValue;
use regex::Regex;
use std::fmt;

/// White space handling modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WhiteSpace {
    /// Preserve all white space
    Preserve,
    /// Replace tabs and newlines with spaces
    Replace,
    /// Replace and collapse multiple spaces
    Collapse,
}

impl WhiteSpace {
    /// Parse from string value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "preserve" => Some(WhiteSpace::Preserve),
            "replace" => Some(WhiteSpace::Replace),
            "collapse" => Some(WhiteSpace::Collapse),
            _ => None,
        }
    }

    /// Get the attribute value form
    pub fn as_str(&self) -> &'static str {
        match self {
            WhiteSpace::Preserve => "preserve",
            WhiteSpace::Replace => "replace",
            WhiteSpace::Collapse => "collapse",
        }
    }

    /// Normalize a string according to this white space mode
    pub fn normalize(&self, s: &str) -> String {
        match self {
            WhiteSpace::Preserve => s.to_string(),
            WhiteSpace::Replace => s.replace(['\t', '\n', '\r'], " "),
            WhiteSpace::Collapse => s.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

impl fmt::Display for WhiteSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a constraining facet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FacetKind {
    /// length
    Length,
    /// minLength
    MinLength,
    /// maxLength
    MaxLength,
    /// pattern
    Pattern,
    /// enumeration
    Enumeration,
    /// whiteSpace
    WhiteSpace,
    /// maxInclusive
    MaxInclusive,
    /// maxExclusive
    MaxExclusive,
    /// minInclusive
    MinInclusive,
    /// minExclusive
    MinExclusive,
    /// totalDigits
    TotalDigits,
    /// fractionDigits
    FractionDigits,
}

impl FacetKind {
    /// Map an element local name to a facet kind
    pub fn from_local_name(name: &str) -> Option<Self> {
        Some(match name {
            "length" => Self::Length,
            "minLength" => Self::MinLength,
            "maxLength" => Self::MaxLength,
            "pattern" => Self::Pattern,
            "enumeration" => Self::Enumeration,
            "whiteSpace" => Self::WhiteSpace,
            "maxInclusive" => Self::MaxInclusive,
            "maxExclusive" => Self::MaxExclusive,
            "minInclusive" => Self::MinInclusive,
            "minExclusive" => Self::MinExclusive,
            "totalDigits" => Self::TotalDigits,
            "fractionDigits" => Self::FractionDigits,
            _ => return None,
        })
    }

    /// Get the facet element name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Length => "length",
            Self::MinLength => "minLength",
            Self::MaxLength => "maxLength",
            Self::Pattern => "pattern",
            Self::Enumeration => "enumeration",
            Self::WhiteSpace => "whiteSpace",
            Self::MaxInclusive => "maxInclusive",
            Self::MaxExclusive => "maxExclusive",
            Self::MinInclusive => "minInclusive",
            Self::MinExclusive => "minExclusive",
            Self::TotalDigits => "totalDigits",
            Self::FractionDigits => "fractionDigits",
        }
    }

    /// Check if this is one of the four range facets
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Self::MaxInclusive | Self::MaxExclusive | Self::MinInclusive | Self::MinExclusive
        )
    }

    /// Check if this is one of the length facets
    pub fn is_length(&self) -> bool {
        matches!(self, Self::Length | Self::MinLength | Self::MaxLength)
    }
}

impl fmt::Display for FacetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A facet as written, awaiting its base type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredFacet {
    /// Facet kind
    pub kind: FacetKind,
    /// Value attribute as written
    pub value: String,
    /// The `fixed` attribute
    pub fixed: bool,
    /// Enumeration value read as a qualified name in the facet's namespace
    /// scope, for QName and NOTATION restrictions
    pub qname: Option<QName>,
}

impl DeferredFacet {
    /// Create a new deferred facet
    pub fn new(kind: FacetKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            fixed: false,
            qname: None,
        }
    }

    /// Set the fixed flag
    pub fn with_fixed(mut self, fixed: bool) -> Self {
        self.fixed = fixed;
        self
    }

    /// Set the value's qualified name
    pub fn with_qname(mut self, qname: Option<QName>) -> Self {
        self.qname = qname;
        self
    }
}

impl NamespaceRemap for DeferredFacet {
    fn remap_namespace(&mut self, namespace: &str) {
        self.qname.remap_namespace(namespace);
    }
}

// =============================================================================
// Patterns
// =============================================================================

/// A compiled XSD pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    /// Pattern as written in the schema
    pub source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile an XSD regular expression
    pub fn new(source: &str) -> Result<Self, String> {
        let translated = translate_pattern(source)?;
        let regex = Regex::new(&format!("^(?:{})$", translated))
            .map_err(|e| format!("invalid pattern '{}': {}", source, e))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// Check a value against the whole pattern
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

const NAME_START_CLASS: &str = r"_:A-Za-z\x{C0}-\x{D6}\x{D8}-\x{F6}\x{F8}-\x{2FF}\x{370}-\x{37D}\x{37F}-\x{1FFF}\x{200C}-\x{200D}\x{2070}-\x{218F}\x{2C00}-\x{2FEF}\x{3001}-\x{D7FF}\x{F900}-\x{FDCF}\x{FDF0}-\x{FFFD}";
const NAME_EXTRA_CLASS: &str = r"\-.0-9\x{B7}\x{300}-\x{36F}\x{203F}-\x{2040}";

fn block_range(name: &str) -> Option<&'static str> {
    Some(match name {
        "BasicLatin" => r"\x00-\x7F",
        "Latin-1Supplement" => r"\x80-\xFF",
        "LatinExtended-A" => r"\x{100}-\x{17F}",
        "LatinExtended-B" => r"\x{180}-\x{24F}",
        "IPAExtensions" => r"\x{250}-\x{2AF}",
        "Greek" => r"\x{370}-\x{3FF}",
        "Cyrillic" => r"\x{400}-\x{4FF}",
        "Armenian" => r"\x{530}-\x{58F}",
        "Hebrew" => r"\x{590}-\x{5FF}",
        "Arabic" => r"\x{600}-\x{6FF}",
        "Devanagari" => r"\x{900}-\x{97F}",
        "Thai" => r"\x{E00}-\x{E7F}",
        "GeneralPunctuation" => r"\x{2000}-\x{206F}",
        "CJKSymbolsandPunctuation" => r"\x{3000}-\x{303F}",
        "Hiragana" => r"\x{3040}-\x{309F}",
        "Katakana" => r"\x{30A0}-\x{30FF}",
        "CJKUnifiedIdeographs" => r"\x{4E00}-\x{9FFF}",
        "HangulSyllables" => r"\x{AC00}-\x{D7A3}",
        "HalfwidthandFullwidthForms" => r"\x{FF00}-\x{FFEF}",
        _ => return None,
    })
}

/// Translate XSD regular expression syntax to `regex` crate syntax
///
/// XSD patterns are implicitly anchored, treat `^`/`$` as literals, add the
/// `\i`/`\c` name classes and `-[...]` class subtraction, and let `.` exclude
/// both CR and LF.
pub fn translate_pattern(source: &str) -> Result<String, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() + 8);
    let mut class_depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                let next = *chars
                    .get(i + 1)
                    .ok_or_else(|| format!("pattern '{}' ends with a backslash", source))?;
                i += 1;
                match next {
                    'i' => push_class(&mut out, NAME_START_CLASS, false),
                    'I' => push_class(&mut out, NAME_START_CLASS, true),
                    'c' => push_class(
                        &mut out,
                        &format!("{}{}", NAME_START_CLASS, NAME_EXTRA_CLASS),
                        false,
                    ),
                    'C' => push_class(
                        &mut out,
                        &format!("{}{}", NAME_START_CLASS, NAME_EXTRA_CLASS),
                        true,
                    ),
                    'p' | 'P' => {
                        if chars.get(i + 1) != Some(&'{') {
                            return Err(format!("expected '{{' after \\{} in '{}'", next, source));
                        }
                        let close = chars[i..]
                            .iter()
                            .position(|&ch| ch == '}')
                            .ok_or_else(|| format!("unterminated \\{} in '{}'", next, source))?;
                        let body: String = chars[i + 2..i + close].iter().collect();
                        i += close;
                        if let Some(block) = body.strip_prefix("Is") {
                            let range = block_range(block).ok_or_else(|| {
                                format!("unsupported Unicode block '{}' in '{}'", block, source)
                            })?;
                            push_class(&mut out, range, next == 'P');
                        } else {
                            out.push('\\');
                            out.push(next);
                            out.push('{');
                            out.push_str(&body);
                            out.push('}');
                        }
                    }
                    'n' | 'r' | 't' | 'd' | 'D' | 's' | 'S' | 'w' | 'W' => {
                        out.push('\\');
                        out.push(next);
                    }
                    '\\' | '|' | '.' | '-' | '^' | '?' | '*' | '+' | '{' | '}' | '(' | ')'
                    | '[' | ']' => {
                        out.push('\\');
                        out.push(next);
                    }
                    other => {
                        return Err(format!("invalid escape '\\{}' in '{}'", other, source));
                    }
                }
            }
            '[' => {
                class_depth += 1;
                out.push('[');
                if chars.get(i + 1) == Some(&'^') {
                    out.push('^');
                    i += 1;
                }
            }
            ']' if class_depth > 0 => {
                class_depth -= 1;
                out.push(']');
            }
            '-' if class_depth > 0 && chars.get(i + 1) == Some(&'[') => {
                // Class subtraction
                out.push_str("--");
            }
            '&' | '~' if class_depth > 0 => {
                out.push('\\');
                out.push(c);
            }
            '.' if class_depth == 0 => out.push_str(r"[^\n\r]"),
            '^' | '$' if class_depth == 0 => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
        i += 1;
    }

    if class_depth != 0 {
        return Err(format!("unbalanced character class in '{}'", source));
    }
    Ok(out)
}

fn push_class(out: &mut String, ranges: &str, negated: bool) {
    out.push('[');
    if negated {
        out.push('^');
    }
    out.push_str(ranges);
    out.push(']');
}

// =============================================================================
// Materialized facets
// =============================================================================

/// A range facet bound
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    /// Normalized lexical form
    pub lexical: String,
    /// Comparable value
    pub value: OrderedValue,
    /// The `fixed` attribute
    pub fixed: bool,
}

/// A constraining facet
#[derive(Debug, Clone, PartialEq)]
pub enum Facet {
    /// Exact length
    Length {
        /// Required length
        value: u64,
        /// The `fixed` attribute
        fixed: bool,
    },
    /// Minimum length
    MinLength {
        /// Minimum length
        value: u64,
        /// The `fixed` attribute
        fixed: bool,
    },
    /// Maximum length
    MaxLength {
        /// Maximum length
        value: u64,
        /// The `fixed` attribute
        fixed: bool,
    },
    /// A single pattern
    Pattern(Pattern),
    /// Patterns of one derivation step, any of which may match
    PatternSet(Vec<Pattern>),
    /// Allowed lexical values
    Enumeration(Vec<String>),
    /// Inclusive lower bound
    MinInclusive(Bound),
    /// Inclusive upper bound
    MaxInclusive(Bound),
    /// Exclusive lower bound
    MinExclusive(Bound),
    /// Exclusive upper bound
    MaxExclusive(Bound),
    /// Maximum total digits
    TotalDigits {
        /// Digit count
        value: u32,
        /// The `fixed` attribute
        fixed: bool,
    },
    /// Maximum fraction digits
    FractionDigits {
        /// Digit count
        value: u32,
        /// The `fixed` attribute
        fixed: bool,
    },
    /// White space normalization
    WhiteSpace {
        /// Mode
        value: WhiteSpace,
        /// The `fixed` attribute
        fixed: bool,
    },
}

impl Facet {
    /// Facet kind (pattern sets report as patterns)
    pub fn kind(&self) -> FacetKind {
        match self {
            Facet::Length { .. } => FacetKind::Length,
            Facet::MinLength { .. } => FacetKind::MinLength,
            Facet::MaxLength { .. } => FacetKind::MaxLength,
            Facet::Pattern(_) | Facet::PatternSet(_) => FacetKind::Pattern,
            Facet::Enumeration(_) => FacetKind::Enumeration,
            Facet::MinInclusive(_) => FacetKind::MinInclusive,
            Facet::MaxInclusive(_) => FacetKind::MaxInclusive,
            Facet::MinExclusive(_) => FacetKind::MinExclusive,
            Facet::MaxExclusive(_) => FacetKind::MaxExclusive,
            Facet::TotalDigits { .. } => FacetKind::TotalDigits,
            Facet::FractionDigits { .. } => FacetKind::FractionDigits,
            Facet::WhiteSpace { .. } => FacetKind::WhiteSpace,
        }
    }

    /// Check the `fixed` attribute
    pub fn is_fixed(&self) -> bool {
        match self {
            Facet::Length { fixed, .. }
            | Facet::MinLength { fixed, .. }
            | Facet::MaxLength { fixed, .. }
            | Facet::TotalDigits { fixed, .. }
            | Facet::FractionDigits { fixed, .. }
            | Facet::WhiteSpace { fixed, .. } => *fixed,
            Facet::MinInclusive(b)
            | Facet::MaxInclusive(b)
            | Facet::MinExclusive(b)
            | Facet::MaxExclusive(b) => b.fixed,
            Facet::Pattern(_) | Facet::PatternSet(_) | Facet::Enumeration(_) => false,
        }
    }

    /// The range bound carried by a range facet
    pub fn bound(&self) -> Option<&Bound> {
        match self {
            Facet::MinInclusive(b)
            | Facet::MaxInclusive(b)
            | Facet::MinExclusive(b)
            | Facet::MaxExclusive(b) => Some(b),
            _ => None,
        }
    }

    /// The numeric value of a length or digits facet
    pub fn count(&self) -> Option<u64> {
        match self {
            Facet::Length { value, .. }
            | Facet::MinLength { value, .. }
            | Facet::MaxLength { value, .. } => Some(*value),
            Facet::TotalDigits { value, .. } | Facet::FractionDigits { value, .. } => {
                Some(u64::from(*value))
            }
            _ => None,
        }
    }

    /// Printable value for diagnostics
    pub fn value_text(&self) -> String {
        match self {
            Facet::Pattern(p) => p.source.clone(),
            Facet::PatternSet(ps) => ps
                .iter()
                .map(|p| p.source.as_str())
                .collect::<Vec<_>>()
                .join(" | "),
            Facet::Enumeration(values) => values.join(", "),
            Facet::WhiteSpace { value, .. } => value.to_string(),
            other => match (other.bound(), other.count()) {
                (Some(b), _) => b.lexical.clone(),
                (None, Some(n)) => n.to_string(),
                (None, None) => String::new(),
            },
        }
    }
}

/// Materialize the facets of one derivation step
///
/// `primitive` is the primitive of the base type (None for list and union
/// bases) and `base_whitespace` the base's normalization, applied to range
/// and enumeration values. Facets that cannot be interpreted are returned
/// as errors alongside the ones that could.
pub fn materialize_facets(
    deferred: &[DeferredFacet],
    primitive: Option<&BuiltinType>,
    base_whitespace: WhiteSpace,
) -> (Vec<Facet>, Vec<SchemaError>) {
    let mut facets: Vec<Facet> = Vec::new();
    let mut errors = Vec::new();
    let mut patterns: Vec<Pattern> = Vec::new();
    let mut pattern_slot: Option<usize> = None;
    let mut enumeration: Vec<String> = Vec::new();
    let mut enumeration_slot: Option<usize> = None;

    for facet in deferred {
        let fail = |message: String| {
            SchemaError::new(ErrorKind::InvalidFacet, message)
                .with_component(facet.kind.as_str().to_string())
        };
        let count = |text: &str| -> Result<u64, SchemaError> {
            text.trim().parse::<u64>().map_err(|_| {
                fail(format!(
                    "{} value '{}' is not a non-negative integer",
                    facet.kind, facet.value
                ))
            })
        };

        let built = match facet.kind {
            FacetKind::Length => count(&facet.value).map(|value| Facet::Length {
                value,
                fixed: facet.fixed,
            }),
            FacetKind::MinLength => count(&facet.value).map(|value| Facet::MinLength {
                value,
                fixed: facet.fixed,
            }),
            FacetKind::MaxLength => count(&facet.value).map(|value| Facet::MaxLength {
                value,
                fixed: facet.fixed,
            }),
            FacetKind::TotalDigits => match count(&facet.value) {
                Ok(0) => Err(fail("totalDigits value must be a positive integer".to_string())),
                Ok(value) => u32::try_from(value)
                    .map(|value| Facet::TotalDigits {
                        value,
                        fixed: facet.fixed,
                    })
                    .map_err(|_| fail(format!("totalDigits value {} is too large", value))),
                Err(e) => Err(e),
            },
            FacetKind::FractionDigits => count(&facet.value).and_then(|value| {
                u32::try_from(value)
                    .map(|value| Facet::FractionDigits {
                        value,
                        fixed: facet.fixed,
                    })
                    .map_err(|_| fail(format!("fractionDigits value {} is too large", value)))
            }),
            FacetKind::WhiteSpace => WhiteSpace::from_str(facet.value.trim())
                .map(|value| Facet::WhiteSpace {
                    value,
                    fixed: facet.fixed,
                })
                .ok_or_else(|| fail(format!("invalid whiteSpace value '{}'", facet.value))),
            FacetKind::Pattern => {
                match Pattern::new(&facet.value) {
                    Ok(pattern) => {
                        if pattern_slot.is_none() {
                            pattern_slot = Some(facets.len());
                            facets.push(Facet::PatternSet(Vec::new()));
                        }
                        patterns.push(pattern);
                    }
                    Err(message) => errors.push(fail(message)),
                }
                continue;
            }
            FacetKind::Enumeration => {
                if enumeration_slot.is_none() {
                    enumeration_slot = Some(facets.len());
                    facets.push(Facet::Enumeration(Vec::new()));
                }
                enumeration.push(base_whitespace.normalize(&facet.value));
                continue;
            }
            kind => {
                let lexical = base_whitespace.normalize(&facet.value);
                match primitive.and_then(|p| OrderedValue::parse(p.name, &lexical)) {
                    Some(Ok(value)) => {
                        let bound = Bound {
                            lexical,
                            value,
                            fixed: facet.fixed,
                        };
                        Ok(match kind {
                            FacetKind::MinInclusive => Facet::MinInclusive(bound),
                            FacetKind::MaxInclusive => Facet::MaxInclusive(bound),
                            FacetKind::MinExclusive => Facet::MinExclusive(bound),
                            _ => Facet::MaxExclusive(bound),
                        })
                    }
                    Some(Err(reason)) => Err(fail(format!(
                        "{} value '{}' is not valid for the base type: {}",
                        kind, facet.value, reason
                    ))),
                    None => Err(fail(format!(
                        "{} is not applicable to an unordered base type",
                        kind
                    ))),
                }
            }
        };

        match built {
            Ok(f) => facets.push(f),
            Err(e) => errors.push(e),
        }
    }

    if let Some(slot) = pattern_slot {
        facets[slot] = if patterns.len() == 1 {
            Facet::Pattern(patterns.remove(0))
        } else {
            Facet::PatternSet(patterns)
        };
    }
    if let Some(slot) = enumeration_slot {
        facets[slot] = Facet::Enumeration(enumeration);
    }

    (facets, errors)
}

/// Effective facet list of a derived type: the base's facets first, then
/// the current step's
pub fn inherit_facets(base: &[Facet], local: &[Facet]) -> Vec<Facet> {
    let mut result = Vec::with_capacity(base.len() + local.len());
    result.extend(base.iter().cloned());
    result.extend(local.iter().cloned());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::builtins::get_builtin_type;

    #[test]
    fn test_whitespace_normalize() {
        assert_eq!(WhiteSpace::Preserve.normalize(" a\tb "), " a\tb ");
        assert_eq!(WhiteSpace::Replace.normalize(" a\tb\n"), " a b ");
        assert_eq!(WhiteSpace::Collapse.normalize("  a \t b\n"), "a b");
        assert!(WhiteSpace::Collapse > WhiteSpace::Preserve);
    }

    #[test]
    fn test_facet_kind_names() {
        assert_eq!(FacetKind::from_local_name("maxInclusive"), Some(FacetKind::MaxInclusive));
        assert_eq!(FacetKind::from_local_name("assertion"), None);
        assert!(FacetKind::MinExclusive.is_range());
        assert!(FacetKind::Length.is_length());
    }

    #[test]
    fn test_translate_pattern() {
        let p = Pattern::new(r"\d{3}-[A-Z]{2}").unwrap();
        assert!(p.is_match("123-AB"));
        assert!(!p.is_match("x123-AB"));

        let dollar = Pattern::new(r"a$").unwrap();
        assert!(dollar.is_match("a$"));

        let name = Pattern::new(r"\i\c*").unwrap();
        assert!(name.is_match("_abc-1"));
        assert!(!name.is_match("1abc"));

        let subtraction = Pattern::new(r"[a-z-[aeiou]]+").unwrap();
        assert!(subtraction.is_match("xyz"));
        assert!(!subtraction.is_match("xaz"));

        let dot = Pattern::new(r"a.b").unwrap();
        assert!(!dot.is_match("a\rb"));

        let block = Pattern::new(r"\p{IsBasicLatin}+").unwrap();
        assert!(block.is_match("abc"));

        assert!(Pattern::new(r"[abc").is_err());
        assert!(Pattern::new(r"\q").is_err());
    }

    #[test]
    fn test_materialize_groups_patterns() {
        let string = get_builtin_type("string");
        let deferred = vec![
            DeferredFacet::new(FacetKind::Pattern, "a+"),
            DeferredFacet::new(FacetKind::MaxLength, "5"),
            DeferredFacet::new(FacetKind::Pattern, "b+"),
            DeferredFacet::new(FacetKind::Enumeration, "aa"),
            DeferredFacet::new(FacetKind::Enumeration, "bb"),
        ];
        let (facets, errors) = materialize_facets(&deferred, string, WhiteSpace::Preserve);
        assert!(errors.is_empty());
        assert_eq!(facets.len(), 3);
        assert!(matches!(&facets[0], Facet::PatternSet(ps) if ps.len() == 2));
        assert_eq!(facets[1], Facet::MaxLength { value: 5, fixed: false });
        assert_eq!(facets[2], Facet::Enumeration(vec!["aa".into(), "bb".into()]));
    }

    #[test]
    fn test_materialize_range_and_errors() {
        let int = get_builtin_type("decimal");
        let deferred = vec![
            DeferredFacet::new(FacetKind::MaxInclusive, " 100 "),
            DeferredFacet::new(FacetKind::MinInclusive, "abc"),
            DeferredFacet::new(FacetKind::TotalDigits, "0"),
        ];
        let (facets, errors) = materialize_facets(&deferred, int, WhiteSpace::Collapse);
        assert_eq!(facets.len(), 1);
        assert_eq!(facets[0].value_text(), "100");
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind == ErrorKind::InvalidFacet));
    }

    #[test]
    fn test_inherit_facets_order() {
        let base = vec![Facet::MaxLength { value: 10, fixed: false }];
        let local = vec![Facet::MaxLength { value: 5, fixed: false }];
        let merged = inherit_facets(&base, &local);
        assert_eq!(merged[0].count(), Some(10));
        assert_eq!(merged[1].count(), Some(5));
    }
}
