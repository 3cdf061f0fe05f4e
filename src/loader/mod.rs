//! Schema loading
//!
//! [`SchemaLoader`] drives a load end to end: the root document and every
//! document it reaches through `include`, `import` and `redefine` are
//! assembled into one [`Schema`], references are resolved, the component
//! constraints and Unique Particle Attribution are checked, and the result is
//! compiled. A load is all-or-nothing; nothing from a failed load is kept.

mod directives;
pub mod merge;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::checks::check_schema;
use crate::compiler::{compile_schema, CompiledSchema};
use crate::error::{Error, Result, SchemaErrors};
use crate::limits::Limits;
use crate::loaders::SchemaResolver;
use crate::resolve::resolve_schema;
use crate::upa::check_upa;
use crate::validators::schemas::Schema;

pub use directives::apply_redefinitions;
pub use merge::{include_compatible, merge_schema, MergeMode};

use directives::LoadSession;

/// Loader configuration
#[derive(Clone, Default)]
pub struct LoaderOptions {
    /// Skip imports whose document cannot be found instead of failing
    pub allow_missing_import_locations: bool,
    /// Resource limits
    pub limits: Limits,
    /// Resolvers used instead of the default one for given import namespaces
    pub namespace_resolvers: HashMap<String, Arc<dyn SchemaResolver>>,
}

impl fmt::Debug for LoaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut namespaces: Vec<&String> = self.namespace_resolvers.keys().collect();
        namespaces.sort();
        f.debug_struct("LoaderOptions")
            .field(
                "allow_missing_import_locations",
                &self.allow_missing_import_locations,
            )
            .field("limits", &self.limits)
            .field("namespace_resolvers", &namespaces)
            .finish()
    }
}

impl LoaderOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Tolerate imports that cannot be resolved
    pub fn with_allow_missing_import_locations(mut self, allow: bool) -> Self {
        self.allow_missing_import_locations = allow;
        self
    }

    /// Set the resource limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Resolve imports of `namespace` through `resolver`
    pub fn with_namespace_resolver(
        mut self,
        namespace: impl Into<String>,
        resolver: Arc<dyn SchemaResolver>,
    ) -> Self {
        self.namespace_resolvers.insert(namespace.into(), resolver);
        self
    }
}

/// Loads, checks and compiles schemas
///
/// Compiled schemas are cached by location: loading the same location
/// again returns the same [`Arc`].
#[derive(Debug)]
pub struct SchemaLoader {
    resolver: Arc<dyn SchemaResolver>,
    options: LoaderOptions,
    cache: HashMap<String, Arc<CompiledSchema>>,
}

impl SchemaLoader {
    /// Create a loader over a resolver
    pub fn new(resolver: impl SchemaResolver + 'static) -> Self {
        Self::from_arc(Arc::new(resolver))
    }

    /// Create a loader over a shared resolver
    pub fn from_arc(resolver: Arc<dyn SchemaResolver>) -> Self {
        Self {
            resolver,
            options: LoaderOptions::default(),
            cache: HashMap::new(),
        }
    }

    /// Replace the options
    pub fn with_options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    /// Current options
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Load and compile the schema at `location`
    pub fn load(&mut self, location: &str) -> Result<Arc<CompiledSchema>> {
        if let Some(compiled) = self.cache.get(location) {
            debug!(location, "schema cache hit");
            return Ok(Arc::clone(compiled));
        }
        let schema = self.prepare(location)?;
        let compiled = Arc::new(compile_schema(schema)?);
        debug!(
            location,
            types = compiled.types.len(),
            elements = compiled.elements.len(),
            "schema compiled"
        );
        self.cache.insert(location.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Assemble the documents reachable from `location` into one schema,
    /// without resolving or checking it
    pub fn assemble(&self, location: &str) -> Result<Schema> {
        LoadSession::new(self.resolver.as_ref(), &self.options).run(location)
    }

    /// Assemble, resolve and check the schema at `location`
    pub fn prepare(&self, location: &str) -> Result<Schema> {
        let mut schema = self.assemble(location)?;

        debug!(location, "resolving references");
        resolve_schema(&mut schema)?;

        let errors = check_schema(&schema);
        if !errors.is_empty() {
            warn!(location, errors = errors.len(), "schema is invalid");
            return Err(Error::Invalid(SchemaErrors(errors)));
        }

        check_upa(&mut schema)?;
        Ok(schema)
    }

    /// Drop every cached schema
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::loaders::MemoryResolver;
    use crate::namespaces::QName;
    use crate::validators::globals::ComponentKind;

    const XS: &str = r#"xmlns:xs="http://www.w3.org/2001/XMLSchema""#;

    fn doc(attrs: &str, body: &str) -> String {
        format!("<xs:schema {} {}>{}</xs:schema>", XS, attrs, body)
    }

    #[test]
    fn test_include_order_is_preserved() {
        let resolver = MemoryResolver::new()
            .with_document(
                "main.xsd",
                doc(
                    r#"targetNamespace="urn:a" xmlns="urn:a""#,
                    r#"<xs:element name="first"/>
                       <xs:include schemaLocation="inc1.xsd"/>
                       <xs:element name="second"/>
                       <xs:include schemaLocation="inc2.xsd"/>
                       <xs:element name="third"/>"#,
                ),
            )
            .with_document(
                "inc1.xsd",
                doc("", r#"<xs:element name="i1a"/><xs:element name="i1b"/>"#),
            )
            .with_document("inc2.xsd", doc("", r#"<xs:element name="i2"/>"#));
        let loader = SchemaLoader::new(resolver);
        let schema = loader.assemble("main.xsd").unwrap();
        let order: Vec<&str> = schema
            .global_decl_order
            .iter()
            .map(|(_, name)| name.local_name.as_str())
            .collect();
        assert_eq!(order, vec!["first", "i1a", "i1b", "second", "i2", "third"]);
        assert!(schema
            .global_decl_order
            .iter()
            .all(|(kind, name)| *kind == ComponentKind::Element && name.namespace == "urn:a"));
    }

    #[test]
    fn test_missing_documents() {
        let resolver = MemoryResolver::new().with_document(
            "main.xsd",
            doc(
                r#"targetNamespace="urn:a""#,
                r#"<xs:include schemaLocation="gone.xsd"/>
                   <xs:import namespace="urn:b" schemaLocation="b.xsd"/>"#,
            ),
        );
        let loader = SchemaLoader::new(resolver.clone());
        let err = loader.assemble("main.xsd").unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::DocumentNotFound));

        let loader = SchemaLoader::new(resolver)
            .with_options(LoaderOptions::new().with_allow_missing_import_locations(true));
        let schema = loader.assemble("main.xsd").unwrap();
        assert!(schema.imported_namespaces["urn:a"].contains("urn:b"));

        let err = SchemaLoader::new(MemoryResolver::new())
            .assemble("nothing.xsd")
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::DocumentNotFound));
    }

    #[test]
    fn test_namespace_checks() {
        let resolver = MemoryResolver::new()
            .with_document(
                "main.xsd",
                doc(
                    r#"targetNamespace="urn:a""#,
                    r#"<xs:include schemaLocation="other.xsd"/>"#,
                ),
            )
            .with_document("other.xsd", doc(r#"targetNamespace="urn:b""#, ""))
            .with_document(
                "self.xsd",
                doc(
                    r#"targetNamespace="urn:a""#,
                    r#"<xs:import namespace="urn:a"/>"#,
                ),
            )
            .with_document(
                "wrong.xsd",
                doc(
                    r#"targetNamespace="urn:a""#,
                    r#"<xs:import namespace="urn:c" schemaLocation="other.xsd"/>"#,
                ),
            );
        let loader = SchemaLoader::new(resolver);
        for location in ["main.xsd", "self.xsd", "wrong.xsd"] {
            let err = loader.assemble(location).unwrap_err();
            assert_eq!(err.kind(), Some(ErrorKind::NamespaceMismatch), "{}", location);
        }
    }

    #[test]
    fn test_mutual_import_settles() {
        let resolver = MemoryResolver::new()
            .with_document(
                "a.xsd",
                doc(
                    r#"targetNamespace="urn:A" xmlns:b="urn:B""#,
                    r#"<xs:import namespace="urn:B" schemaLocation="b.xsd"/>
                       <xs:complexType name="TypeA"/>
                       <xs:element name="a" type="b:TypeB"/>"#,
                ),
            )
            .with_document(
                "b.xsd",
                doc(
                    r#"targetNamespace="urn:B" xmlns:a="urn:A""#,
                    r#"<xs:import namespace="urn:A" schemaLocation="a.xsd"/>
                       <xs:complexType name="TypeB"/>
                       <xs:element name="b" type="a:TypeA"/>"#,
                ),
            );
        let schema = SchemaLoader::new(resolver).assemble("a.xsd").unwrap();
        assert!(schema.types.contains_key(&QName::new("urn:A", "TypeA")));
        assert!(schema.types.contains_key(&QName::new("urn:B", "TypeB")));
        assert!(schema.elements.contains_key(&QName::new("urn:B", "b")));
    }

    #[test]
    fn test_redefine_keeps_original() {
        let resolver = MemoryResolver::new()
            .with_document(
                "main.xsd",
                doc(
                    r#"targetNamespace="urn:a" xmlns:a="urn:a""#,
                    r#"<xs:redefine schemaLocation="base.xsd">
                         <xs:simpleType name="code">
                           <xs:restriction base="a:code"><xs:maxLength value="4"/></xs:restriction>
                         </xs:simpleType>
                       </xs:redefine>"#,
                ),
            )
            .with_document(
                "base.xsd",
                doc(
                    r#"targetNamespace="urn:a""#,
                    r#"<xs:simpleType name="code">
                         <xs:restriction base="xs:string"><xs:maxLength value="8"/></xs:restriction>
                       </xs:simpleType>"#,
                ),
            );
        let schema = SchemaLoader::new(resolver).assemble("main.xsd").unwrap();
        let name = QName::new("urn:a", "code");
        assert!(schema.types.contains_key(&name));
        assert!(schema.redefined_types.contains_key(&name));
        assert_ne!(schema.types[&name], schema.redefined_types[&name]);
        assert_eq!(schema.origin_of(ComponentKind::Type, &name), Some("main.xsd"));
    }

    #[test]
    fn test_depth_limit() {
        let resolver = MemoryResolver::new()
            .with_document("a.xsd", doc("", r#"<xs:include schemaLocation="b.xsd"/>"#))
            .with_document("b.xsd", doc("", r#"<xs:include schemaLocation="c.xsd"/>"#))
            .with_document("c.xsd", doc("", ""));
        let limits = Limits {
            max_directive_depth: 1,
            ..Limits::default()
        };
        let err = SchemaLoader::new(resolver)
            .with_options(LoaderOptions::new().with_limits(limits))
            .assemble("a.xsd")
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::LimitExceeded));
    }
}
