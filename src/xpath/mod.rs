//! XPath Support for identity constraints
//!
//! ## Overview
//!
//! XSD 1.0 identity constraints (`xs:key`, `xs:keyref`, `xs:unique`) locate
//! their values with a restricted XPath subset:
//! - `xs:selector` picks the elements a constraint applies to
//! - `xs:field` picks the attribute or element holding each key value
//!
//! This module parses both grammars and resolves the simple type a field
//! yields by walking the resolved content models of the schema.

mod fields;
mod parsers;

pub use fields::FieldResolver;
pub use parsers::{
    IdentityXPathParser, NodeTest, PathBranch, RestrictedXPath, Step, XPathAxis, XPathKind,
    XPathParseError,
};

use crate::error::{ErrorKind, SchemaError};
use crate::validators::identities::IdentityConstraint;

/// Parsed selector and fields of an identity constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintPaths {
    /// The selector
    pub selector: RestrictedXPath,
    /// The fields, in declaration order
    pub fields: Vec<RestrictedXPath>,
}

/// Parse and check the selector and fields of a constraint
pub fn parse_constraint_paths(
    constraint: &IdentityConstraint,
) -> Result<ConstraintPaths, SchemaError> {
    let invalid = |expression: &str, err: XPathParseError| {
        SchemaError::new(
            ErrorKind::InvalidXPath,
            format!(
                "invalid XPath '{}' in {} '{}': {}",
                expression, constraint.kind, constraint.name.local_name, err
            ),
        )
        .with_component(constraint.name.to_string())
    };

    let selector = RestrictedXPath::parse_selector(&constraint.selector, &constraint.namespaces)
        .map_err(|e| invalid(&constraint.selector, e))?;
    let fields = constraint
        .fields
        .iter()
        .map(|field| {
            RestrictedXPath::parse_field(field, &constraint.namespaces)
                .map_err(|e| invalid(field, e))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ConstraintPaths { selector, fields })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::QName;
    use crate::validators::identities::IdentityKind;

    #[test]
    fn test_parse_constraint_paths() {
        let c = IdentityConstraint::new(QName::local("k"), IdentityKind::Key, ".//part")
            .with_field("@id")
            .with_field("name");
        let paths = parse_constraint_paths(&c).unwrap();
        assert!(paths.selector.branches[0].descendant);
        assert_eq!(paths.fields.len(), 2);

        let bad = IdentityConstraint::new(QName::local("k"), IdentityKind::Key, "@id");
        let err = parse_constraint_paths(&bad).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidXPath);
        assert!(err.message.contains("'@id'"));
    }
}
