//! Error types for xsd-grammar
//!
//! Every phase of the pipeline reports failures as [`SchemaError`] values
//! tagged with an [`ErrorKind`]. Structural validation collects many of them
//! and returns them together as [`Error::Invalid`]; the other phases stop at
//! the first one.

use std::fmt;
use thiserror::Error;

/// Result type alias using the crate [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for schema loading and compilation
#[derive(Error, Debug)]
pub enum Error {
    /// A single schema error
    #[error("{0}")]
    Schema(#[from] SchemaError),

    /// Structural validation found one or more errors
    #[error("{0}")]
    Invalid(SchemaErrors),

    /// Namespace error (unknown prefix, bad declaration)
    #[error("namespace error: {0}")]
    Namespace(String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a single schema error of the given kind
    pub fn schema(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error::Schema(SchemaError::new(kind, message))
    }

    /// The kind of the first error carried by this value, if it has one
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Schema(e) => Some(e.kind),
            Error::Invalid(list) => list.0.first().map(|e| e.kind),
            Error::Namespace(_) | Error::Xml(_) => Some(ErrorKind::Parse),
            Error::Name(_) => Some(ErrorKind::InvalidName),
            Error::Io(_) | Error::Url(_) | Error::Json(_) => None,
        }
    }

    /// All schema errors carried by this value
    pub fn errors(&self) -> &[SchemaError] {
        match self {
            Error::Schema(e) => std::slice::from_ref(e),
            Error::Invalid(list) => &list.0,
            _ => &[],
        }
    }

    /// Check whether any carried error has the given kind
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.kind() == Some(kind) || self.errors().iter().any(|e| e.kind == kind)
    }
}

/// Classification of schema errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// A root document or a required import could not be found
    DocumentNotFound,
    /// Directive cycle that deferral cannot resolve
    CircularDependency,
    /// A model group or attribute group references itself
    CircularGroupReference,
    /// A type derives from itself
    CircularDerivation,
    /// Reference to an undeclared type
    UnknownType,
    /// Reference to an undeclared model group
    UnknownGroup,
    /// Reference to an undeclared attribute
    UnknownAttribute,
    /// Reference to an undeclared attribute group
    UnknownAttributeGroup,
    /// Reference to an undeclared element
    UnknownElement,
    /// Reference to an undeclared notation
    UnknownNotation,
    /// Keyref naming an undeclared key or unique constraint
    UnknownIdentityConstraint,
    /// Two different components share one qualified name
    DuplicateDeclaration,
    /// Two identity constraints share one qualified name
    DuplicateIdentityConstraint,
    /// Final/block violation or invalid restriction
    InvalidDerivation,
    /// Unique Particle Attribution violation
    UPAViolation,
    /// Facet constraint violation
    InvalidFacet,
    /// Selector or field outside the restricted XPath subset
    InvalidXPath,
    /// Field selects an element with element-only content
    FieldSelectsComplexContent,
    /// Include/import namespace compatibility failure
    NamespaceMismatch,
    /// Default or fixed value not valid for its type
    InvalidValue,
    /// Component name is not a valid NCName or is reserved
    InvalidName,
    /// Occurrence bounds violation
    InvalidParticle,
    /// Invalid attribute declaration or attribute use
    InvalidAttribute,
    /// Invalid content model structure
    InvalidContentModel,
    /// Malformed identity constraint
    InvalidIdentityConstraint,
    /// Element Declarations Consistent violation
    InconsistentElementDeclarations,
    /// Malformed schema document
    Parse,
    /// A configured resource limit was exceeded
    LimitExceeded,
}

impl ErrorKind {
    /// Stable printable name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentNotFound => "DocumentNotFound",
            Self::CircularDependency => "CircularDependency",
            Self::CircularGroupReference => "CircularGroupReference",
            Self::CircularDerivation => "CircularDerivation",
            Self::UnknownType => "UnknownType",
            Self::UnknownGroup => "UnknownGroup",
            Self::UnknownAttribute => "UnknownAttribute",
            Self::UnknownAttributeGroup => "UnknownAttributeGroup",
            Self::UnknownElement => "UnknownElement",
            Self::UnknownNotation => "UnknownNotation",
            Self::UnknownIdentityConstraint => "UnknownIdentityConstraint",
            Self::DuplicateDeclaration => "DuplicateDeclaration",
            Self::DuplicateIdentityConstraint => "DuplicateIdentityConstraint",
            Self::InvalidDerivation => "InvalidDerivation",
            Self::UPAViolation => "UPAViolation",
            Self::InvalidFacet => "InvalidFacet",
            Self::InvalidXPath => "InvalidXPath",
            Self::FieldSelectsComplexContent => "FieldSelectsComplexContent",
            Self::NamespaceMismatch => "NamespaceMismatch",
            Self::InvalidValue => "InvalidValue",
            Self::InvalidName => "InvalidName",
            Self::InvalidParticle => "InvalidParticle",
            Self::InvalidAttribute => "InvalidAttribute",
            Self::InvalidContentModel => "InvalidContentModel",
            Self::InvalidIdentityConstraint => "InvalidIdentityConstraint",
            Self::InconsistentElementDeclarations => "InconsistentElementDeclarations",
            Self::Parse => "Parse",
            Self::LimitExceeded => "LimitExceeded",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A schema error with context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// Error classification
    pub kind: ErrorKind,
    /// Human readable message
    pub message: String,
    /// Schema component that caused the error
    pub component: Option<String>,
    /// System id of the document involved
    pub system_id: Option<String>,
}

impl SchemaError {
    /// Create a new schema error
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            component: None,
            system_id: None,
        }
    }

    /// Set the schema component
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Set the document system id
    pub fn with_system_id(mut self, system_id: impl Into<String>) -> Self {
        self.system_id = Some(system_id.into());
        self
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;

        if let Some(ref component) = self.component {
            write!(f, " (component: {})", component)?;
        }

        if let Some(ref system_id) = self.system_id {
            write!(f, " in {}", system_id)?;
        }

        Ok(())
    }
}

impl std::error::Error for SchemaError {}

/// An ordered, non-deduplicated list of schema errors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaErrors(pub Vec<SchemaError>);

impl SchemaErrors {
    /// Create an empty list
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append an error
    pub fn push(&mut self, error: SchemaError) {
        self.0.push(error);
    }

    /// Number of errors
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the errors
    pub fn iter(&self) -> std::slice::Iter<'_, SchemaError> {
        self.0.iter()
    }

    /// Turn a non-empty list into a failure
    pub fn into_result(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(Error::Invalid(self))
        }
    }
}

impl fmt::Display for SchemaErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}
