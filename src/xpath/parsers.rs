//! XPath Parsers for identity constraints
//!
//! `xs:selector` and `xs:field` use a restricted XPath subset:
//!
//! ```text
//! Selector ::= Path ( '|' Path )*
//! Path     ::= ('.//')? Step ( '/' Step )*
//! Step     ::= '.' | NameTest | 'child::' NameTest
//! NameTest ::= QName | '*' | NCName ':' '*'
//!
//! Field    ::= Path ( '|' Path )*
//! Path     ::= ('.//')? ( Step '/' )* ( Step | '@' NameTest | 'attribute::' NameTest )
//! ```
//!
//! The parser is hand written and character driven. The parsed form keeps
//! enough of the source spelling to print it back.

use std::fmt;

use crate::names::is_valid_ncname;
use crate::namespaces::{NamespaceContext, QName};

/// XPath axis of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XPathAxis {
    /// child:: axis (default)
    Child,
    /// attribute:: axis, field terminals only
    Attribute,
    /// self::node(), written as `.`
    Self_,
}

impl XPathAxis {
    /// Parse an axis name, rejecting the axes outside the subset
    pub fn parse(s: &str) -> Result<Self, XPathParseError> {
        match s {
            "child" => Ok(Self::Child),
            "attribute" => Ok(Self::Attribute),
            "parent" | "ancestor" | "ancestor-or-self" | "descendant" | "descendant-or-self"
            | "following" | "following-sibling" | "preceding" | "preceding-sibling"
            | "namespace" | "self" => Err(XPathParseError::ForbiddenAxis(s.to_string())),
            _ => Err(XPathParseError::UnknownAxis(s.to_string())),
        }
    }
}

impl fmt::Display for XPathAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Child => "child",
            Self::Attribute => "attribute",
            Self::Self_ => "self",
        };
        write!(f, "{}", s)
    }
}

/// Node test in an XPath step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// Name test
    Name {
        /// Namespace prefix
        prefix: Option<String>,
        /// Local name
        local: String,
    },
    /// Wildcard test (*)
    Wildcard,
    /// Namespace wildcard (prefix:*)
    NamespaceWildcard(String),
}

impl NodeTest {
    /// Check if the test matches an expanded name
    ///
    /// Unprefixed names denote no namespace.
    pub fn matches(&self, name: &QName, namespaces: &NamespaceContext) -> bool {
        match self {
            Self::Wildcard => true,
            Self::NamespaceWildcard(prefix) => {
                namespaces.get_namespace(prefix) == Some(name.namespace.as_str())
            }
            Self::Name { prefix, local } => {
                let namespace = match prefix {
                    Some(p) => namespaces.get_namespace(p).unwrap_or_default(),
                    None => "",
                };
                local == &name.local_name && namespace == name.namespace
            }
        }
    }

    /// The prefix used by the test, if any
    pub fn prefix(&self) -> Option<&str> {
        match self {
            Self::Name { prefix, .. } => prefix.as_deref(),
            Self::NamespaceWildcard(prefix) => Some(prefix),
            Self::Wildcard => None,
        }
    }

    /// Get the local name if this is a name test
    pub fn local_name(&self) -> Option<&str> {
        match self {
            Self::Name { local, .. } => Some(local),
            _ => None,
        }
    }
}

impl fmt::Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => write!(f, "*"),
            Self::NamespaceWildcard(prefix) => write!(f, "{}:*", prefix),
            Self::Name {
                prefix: Some(prefix),
                local,
            } => write!(f, "{}:{}", prefix, local),
            Self::Name { prefix: None, local } => write!(f, "{}", local),
        }
    }
}

/// A step of a restricted path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// The axis
    pub axis: XPathAxis,
    /// The node test (`None` for `.`)
    pub node_test: Option<NodeTest>,
    /// Whether the axis was spelled out (`child::`, `attribute::`)
    pub explicit_axis: bool,
}

impl Step {
    /// The `.` step
    pub fn self_node() -> Self {
        Self {
            axis: XPathAxis::Self_,
            node_test: None,
            explicit_axis: false,
        }
    }

    /// Check for an attribute step
    pub fn is_attribute(&self) -> bool {
        self.axis == XPathAxis::Attribute
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.axis, &self.node_test) {
            (XPathAxis::Self_, _) | (_, None) => write!(f, "."),
            (XPathAxis::Attribute, Some(test)) if !self.explicit_axis => write!(f, "@{}", test),
            (axis, Some(test)) if self.explicit_axis => write!(f, "{}::{}", axis, test),
            (_, Some(test)) => write!(f, "{}", test),
        }
    }
}

/// One `|`-separated branch of a path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathBranch {
    /// Whether the branch starts with `.//`
    pub descendant: bool,
    /// Steps in order
    pub steps: Vec<Step>,
}

impl PathBranch {
    /// The final attribute step, if any
    pub fn attribute(&self) -> Option<&NodeTest> {
        self.steps
            .last()
            .filter(|s| s.is_attribute())
            .and_then(|s| s.node_test.as_ref())
    }

    /// Steps that navigate to child elements
    pub fn element_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| s.axis == XPathAxis::Child)
    }
}

impl fmt::Display for PathBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descendant {
            write!(f, ".//")?;
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

/// Which grammar an expression is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XPathKind {
    /// `xs:selector`
    Selector,
    /// `xs:field`
    Field,
}

/// A parsed selector or field expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictedXPath {
    /// Original expression
    pub expression: String,
    /// Grammar the expression was parsed with
    pub kind: XPathKind,
    /// Union branches
    pub branches: Vec<PathBranch>,
}

impl RestrictedXPath {
    /// Parse a selector expression
    pub fn parse_selector(
        expression: &str,
        namespaces: &NamespaceContext,
    ) -> Result<Self, XPathParseError> {
        IdentityXPathParser::new(XPathKind::Selector).parse(expression, namespaces)
    }

    /// Parse a field expression
    pub fn parse_field(
        expression: &str,
        namespaces: &NamespaceContext,
    ) -> Result<Self, XPathParseError> {
        IdentityXPathParser::new(XPathKind::Field).parse(expression, namespaces)
    }

    /// Check if any branch ends with an attribute step
    pub fn selects_attribute(&self) -> bool {
        self.branches.iter().any(|b| b.attribute().is_some())
    }
}

impl fmt::Display for RestrictedXPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, branch) in self.branches.iter().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            write!(f, "{}", branch)?;
        }
        Ok(())
    }
}

/// XPath parse error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XPathParseError {
    /// Empty expression or branch
    Empty,
    /// Unknown axis name
    UnknownAxis(String),
    /// Axis outside the identity-constraint subset
    ForbiddenAxis(String),
    /// Construct outside the identity-constraint subset
    Forbidden(String),
    /// Invalid syntax at a character offset
    InvalidSyntax(usize, String),
    /// Undeclared namespace prefix
    UnknownPrefix(String),
}

impl fmt::Display for XPathParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty path expression"),
            Self::UnknownAxis(axis) => write!(f, "unknown XPath axis '{}'", axis),
            Self::ForbiddenAxis(axis) => {
                write!(f, "axis '{}::' is not allowed in identity constraints", axis)
            }
            Self::Forbidden(what) => write!(f, "{} not allowed in identity constraints", what),
            Self::InvalidSyntax(pos, msg) => write!(f, "invalid XPath at offset {}: {}", pos, msg),
            Self::UnknownPrefix(prefix) => write!(f, "namespace prefix '{}' is not declared", prefix),
        }
    }
}

impl std::error::Error for XPathParseError {}

/// Parser for identity constraint XPath (xs:selector, xs:field)
#[derive(Debug, Clone)]
pub struct IdentityXPathParser {
    kind: XPathKind,
}

impl IdentityXPathParser {
    /// Create a parser for the given grammar
    pub fn new(kind: XPathKind) -> Self {
        Self { kind }
    }

    /// Parse and check an expression
    pub fn parse(
        &self,
        expression: &str,
        namespaces: &NamespaceContext,
    ) -> Result<RestrictedXPath, XPathParseError> {
        let mut cursor = Cursor::new(expression);
        let mut branches = Vec::new();
        loop {
            branches.push(self.branch(&mut cursor)?);
            cursor.skip_ws();
            match cursor.peek() {
                None => break,
                Some('|') => cursor.bump(),
                Some(c) => {
                    return Err(cursor.error(format!("unexpected character '{}'", c)));
                }
            }
        }

        for step in branches.iter().flat_map(|b| b.steps.iter()) {
            if let Some(prefix) = step.node_test.as_ref().and_then(|t| t.prefix()) {
                if !namespaces.has_prefix(prefix) {
                    return Err(XPathParseError::UnknownPrefix(prefix.to_string()));
                }
            }
        }

        Ok(RestrictedXPath {
            expression: expression.to_string(),
            kind: self.kind,
            branches,
        })
    }

    fn branch(&self, cursor: &mut Cursor) -> Result<PathBranch, XPathParseError> {
        cursor.skip_ws();
        if cursor.at_end() || cursor.peek() == Some('|') {
            return Err(XPathParseError::Empty);
        }
        if cursor.peek() == Some('/') {
            return Err(XPathParseError::Forbidden("absolute paths are".to_string()));
        }

        let descendant = cursor.eat(".//");
        let mut steps = Vec::new();
        loop {
            cursor.skip_ws();
            let step = self.step(cursor)?;
            let is_attribute = step.is_attribute();
            steps.push(step);
            cursor.skip_ws();
            if cursor.peek() != Some('/') {
                break;
            }
            if cursor.eat("//") {
                return Err(XPathParseError::Forbidden(
                    "'//' after the start of a path is".to_string(),
                ));
            }
            if is_attribute {
                return Err(cursor.error("an attribute step must be the last step"));
            }
            cursor.bump();
        }
        Ok(PathBranch { descendant, steps })
    }

    fn step(&self, cursor: &mut Cursor) -> Result<Step, XPathParseError> {
        match cursor.peek() {
            Some('.') => {
                if cursor.eat("..") {
                    return Err(XPathParseError::Forbidden("parent navigation is".to_string()));
                }
                cursor.bump();
                Ok(Step::self_node())
            }
            Some('@') => {
                cursor.bump();
                self.attribute_step(cursor, false)
            }
            Some(c) if c == '*' || is_name_start(c) => {
                let start = cursor.pos;
                let name = cursor.ncname_or_star();
                cursor.skip_ws();
                if cursor.eat("::") {
                    cursor.skip_ws();
                    return match XPathAxis::parse(&name)? {
                        XPathAxis::Attribute => self.attribute_step(cursor, true),
                        _ => Ok(Step {
                            axis: XPathAxis::Child,
                            node_test: Some(self.name_test(cursor)?),
                            explicit_axis: true,
                        }),
                    };
                }
                cursor.pos = start;
                Ok(Step {
                    axis: XPathAxis::Child,
                    node_test: Some(self.name_test(cursor)?),
                    explicit_axis: false,
                })
            }
            Some(c) => Err(cursor.error(format!("unexpected character '{}'", c))),
            None => Err(cursor.error("missing step")),
        }
    }

    fn attribute_step(&self, cursor: &mut Cursor, explicit_axis: bool) -> Result<Step, XPathParseError> {
        if self.kind == XPathKind::Selector {
            return Err(XPathParseError::Forbidden(
                "attribute steps in a selector are".to_string(),
            ));
        }
        Ok(Step {
            axis: XPathAxis::Attribute,
            node_test: Some(self.name_test(cursor)?),
            explicit_axis,
        })
    }

    fn name_test(&self, cursor: &mut Cursor) -> Result<NodeTest, XPathParseError> {
        let first = cursor.ncname_or_star();
        if first.is_empty() {
            return Err(cursor.error("expected a name test"));
        }
        let test = if first == "*" {
            NodeTest::Wildcard
        } else if cursor.peek() == Some(':') && cursor.peek_at(1) != Some(':') {
            cursor.bump();
            let second = cursor.ncname_or_star();
            if second == "*" {
                NodeTest::NamespaceWildcard(first)
            } else if is_valid_ncname(&second) {
                NodeTest::Name {
                    prefix: Some(first),
                    local: second,
                }
            } else {
                return Err(cursor.error("invalid qualified name"));
            }
        } else {
            NodeTest::Name {
                prefix: None,
                local: first,
            }
        };

        cursor.skip_ws();
        match cursor.peek() {
            Some('(') => Err(XPathParseError::Forbidden(
                "functions and node type tests are".to_string(),
            )),
            Some('[') => Err(XPathParseError::Forbidden("predicates are".to_string())),
            _ => Ok(test),
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}')
}

/// Character cursor over an expression
struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, literal: &str) -> bool {
        let matched = literal
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c));
        if matched {
            self.pos += literal.chars().count();
        }
        matched
    }

    /// An NCName or a single `*`
    fn ncname_or_star(&mut self) -> String {
        if self.peek() == Some('*') {
            self.bump();
            return "*".to_string();
        }
        let mut name = String::new();
        if let Some(c) = self.peek().filter(|c| is_name_start(*c)) {
            name.push(c);
            self.bump();
            while let Some(c) = self.peek().filter(|c| is_name_char(*c)) {
                name.push(c);
                self.bump();
            }
        }
        name
    }

    fn error(&self, message: impl Into<String>) -> XPathParseError {
        XPathParseError::InvalidSyntax(self.pos, message.into())
    }
}
