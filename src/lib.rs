//! # xsd-grammar
//!
//! Loading and compilation pipeline for XML Schema 1.0.
//!
//! A load starts from one schema document and follows its `include`,
//! `import` and `redefine` directives through a pluggable resolver. The
//! documents are merged into a single schema, every QName reference is
//! bound to its component, the schema component constraints and Unique
//! Particle Attribution are checked, and the result is compiled into a
//! grammar an instance validator can use directly.
//!
//! ## Features
//!
//! - Multi-document assembly with chameleon includes and redefinitions
//! - Built-in datatypes with facet inheritance and restriction checks
//! - Content-model derivation checks for extension and restriction
//! - Unique Particle Attribution over substitution groups and wildcards
//! - Identity-constraint XPath subset parsing
//! - JSON export of the compiled grammar
//! - Resource limits against hostile documents
//!
//! ## Example
//!
//! ```rust,ignore
//! use xsd_grammar::loader::SchemaLoader;
//! use xsd_grammar::loaders::FileResolver;
//! use xsd_grammar::QName;
//!
//! let mut loader = SchemaLoader::new(FileResolver::new("schemas")?);
//! let schema = loader.load("order.xsd")?;
//! let order = schema.element_type(&QName::new("urn:orders", "order"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Names and documents
pub mod documents;
pub mod names;
pub mod namespaces;

// Document resolution
pub mod loaders;

// Schema components
pub mod validators;
pub mod xpath;

// Pipeline
pub mod checks;
pub mod compiler;
pub mod loader;
pub mod resolve;
pub mod upa;

// Export
pub mod exports;

// Re-exports for convenience
pub use compiler::{CompiledSchema, CompiledType};
pub use error::{Error, ErrorKind, Result, SchemaError};
pub use loader::{LoaderOptions, SchemaLoader};
pub use loaders::{FileResolver, MemoryResolver, SchemaResolver};
pub use namespaces::QName;

/// Version of the xsd-grammar library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XSD 1.0 namespace
pub const XSD_1_0_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XML Schema instance namespace
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// XMLNS namespace
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";
