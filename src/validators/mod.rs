//! XML Schema components
//!
//! This module contains the schema component model: built-in types, facets,
//! simple and complex types, declarations, particles and wildcards, together
//! with the surface parser that builds them from schema documents.

// Foundation
pub mod helpers;
pub mod particles;

// Type system
pub mod builtins;
pub mod facets;
pub mod simple_types;
pub mod values;

// Declarations and structures
pub mod attributes;
pub mod complex_types;
pub mod elements;
pub mod groups;
pub mod identities;
pub mod wildcards;

// Assembly
pub mod globals;
pub mod parsing;
pub mod schemas;

pub use attributes::{AttributeDecl, AttributeGroupDef, AttributeUse};
pub use builtins::{get_builtin_type, BuiltinType};
pub use complex_types::{ComplexType, ContentForm, ContentType, DerivationMethod, SimpleContent};
pub use elements::{ElementDecl, Scope};
pub use facets::{DeferredFacet, Facet, FacetKind, WhiteSpace};
pub use globals::{
    ComponentKind, NamespaceRemap, NotationDecl, TypeArena, TypeDef, TypeDefinition, TypeId,
    TypeRef,
};
pub use groups::{GroupDef, GroupRef, ModelGroup, ModelGroupKind, Particle};
pub use identities::{IdentityConstraint, IdentityKind};
pub use parsing::{parse_schema_document, Directive, ParsedDocument, Redefinitions};
pub use particles::Occurs;
pub use schemas::{DerivationSet, Form, Schema};
pub use simple_types::{SimpleDerivation, SimpleType, SimpleVariety};
pub use wildcards::{NamespaceConstraint, ProcessContents, Wildcard};
