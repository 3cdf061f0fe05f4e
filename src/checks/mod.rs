//! Structural validation
//!
//! Checks the XSD 1.0 schema component constraints on a resolved schema.
//! Unlike the other phases this one does not stop at the first problem:
//! [`check_schema`] walks the whole schema and returns every error it finds,
//! in a stable order (elements, types, attributes, attribute groups, model
//! groups, notations; each kind by qualified name; anonymous types where
//! they are first met).

mod complex_types;
mod declarations;
mod particles;
mod simple_types;

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{ErrorKind, SchemaError};
use crate::namespaces::QName;
use crate::validators::globals::{TypeArena, TypeDefinition, TypeId};
use crate::validators::identities::IdentityConstraint;
use crate::validators::schemas::Schema;

/// Check every component of a resolved schema
///
/// An empty list means the schema is valid.
pub fn check_schema(schema: &Schema) -> Vec<SchemaError> {
    let mut checker = Checker::new(schema);
    checker.run();
    let errors = checker.finish();
    debug!(errors = errors.len(), "structural checks done");
    errors
}

pub(crate) struct Checker<'a> {
    schema: &'a Schema,
    arena: &'a TypeArena,
    errors: Vec<SchemaError>,
    checked: HashSet<TypeId>,
    named: HashSet<TypeId>,
    /// Distinct identity constraints by name
    constraints: HashMap<QName, Vec<&'a IdentityConstraint>>,
}

impl<'a> Checker<'a> {
    fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            arena: &schema.arena,
            errors: Vec::new(),
            checked: HashSet::new(),
            named: schema.type_ids.values().copied().collect(),
            constraints: HashMap::new(),
        }
    }

    fn run(&mut self) {
        self.collect_constraints();

        let schema = self.schema;
        for name in sorted(schema.elements.keys()) {
            self.global_element(&schema.elements[name]);
        }
        let mut types: Vec<(&QName, &TypeId)> = schema.type_ids.iter().collect();
        types.sort();
        for (_, id) in types {
            self.type_definition(*id);
        }
        for name in sorted(schema.attributes.keys()) {
            self.attribute(&schema.attributes[name], name);
        }
        for name in sorted(schema.attribute_groups.keys()) {
            let def = &schema.attribute_groups[name];
            for attribute in &def.attributes {
                self.attribute(attribute, name);
            }
            self.duplicate_attributes(&def.attributes, name);
        }
        for name in sorted(schema.groups.keys()) {
            self.named_group(&schema.groups[name].group, name);
        }
        for name in sorted(schema.notations.keys()) {
            self.name(&name.local_name, name, "notation");
        }
        let arena = self.arena;
        for (id, _) in arena.iter() {
            self.type_definition(id);
        }
    }

    /// The collected errors, without repeats
    fn finish(self) -> Vec<SchemaError> {
        let mut seen = HashSet::new();
        self.errors
            .into_iter()
            .filter(|e| seen.insert((e.kind, e.message.clone(), e.component.clone())))
            .collect()
    }

    fn report(&mut self, kind: ErrorKind, message: String, component: &QName) {
        let mut error = SchemaError::new(kind, message);
        if !component.is_zero() {
            error = error.with_component(component.to_string());
        }
        if let Some(origin) = self.origin(component) {
            error = error.with_system_id(origin);
        }
        self.errors.push(error);
    }

    fn push(&mut self, error: SchemaError) {
        self.errors.push(error);
    }

    fn origin(&self, name: &QName) -> Option<String> {
        self.schema
            .origins
            .iter()
            .find(|((_, n), _)| n == name)
            .map(|(_, origin)| origin.clone())
    }

    /// Check a type once, whichever path reaches it first
    fn type_definition(&mut self, id: TypeId) {
        if !self.checked.insert(id) {
            return;
        }
        match self.arena.get(id) {
            Some(TypeDefinition::Simple(_)) => self.simple_type(id),
            Some(TypeDefinition::Complex(_)) => self.complex_type(id),
            Some(TypeDefinition::Builtin(_)) | None => {}
        }
    }

    /// Check a type met through a declaration unless it has its own turn
    fn nested_type(&mut self, id: TypeId) {
        if !self.named.contains(&id) {
            self.type_definition(id);
        }
    }

    /// Gather the identity constraints of every element declaration
    fn collect_constraints(&mut self) {
        let schema = self.schema;
        let mut add = |constraint: &'a IdentityConstraint| {
            let entry = self.constraints.entry(constraint.name.clone()).or_default();
            if !entry.iter().any(|c| c.same_declaration(constraint)) {
                entry.push(constraint);
            }
        };
        for decl in schema.elements.values() {
            for constraint in &decl.constraints {
                add(constraint);
            }
        }
        for (_, def) in schema.arena.iter() {
            if let Some(group) = def.as_complex().and_then(|ct| ct.model_group()) {
                for decl in group.element_particles() {
                    for constraint in &decl.constraints {
                        add(constraint);
                    }
                }
            }
        }
    }
}

fn sorted<'k>(keys: impl Iterator<Item = &'k QName>) -> Vec<&'k QName> {
    let mut keys: Vec<&QName> = keys.collect();
    keys.sort();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::MemoryResolver;
    use crate::loader::SchemaLoader;
    use crate::resolve::resolve_schema;

    pub(super) fn check(body: &str) -> Vec<SchemaError> {
        let text = format!(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t" xmlns:t="urn:t">{}</xs:schema>"#,
            body
        );
        let loader = SchemaLoader::new(MemoryResolver::new().with_document("t.xsd", text));
        let mut schema = loader.assemble("t.xsd").unwrap();
        resolve_schema(&mut schema).unwrap();
        check_schema(&schema)
    }

    pub(super) fn kinds(errors: &[SchemaError]) -> Vec<ErrorKind> {
        errors.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_valid_schema_has_no_errors() {
        let errors = check(
            r#"<xs:element name="order">
                 <xs:complexType>
                   <xs:sequence>
                     <xs:element name="item" maxOccurs="unbounded" type="t:item"/>
                   </xs:sequence>
                   <xs:attribute name="id" type="xs:ID"/>
                 </xs:complexType>
                 <xs:key name="itemKey">
                   <xs:selector xpath="item"/>
                   <xs:field xpath="@sku"/>
                 </xs:key>
               </xs:element>
               <xs:complexType name="item">
                 <xs:simpleContent>
                   <xs:extension base="xs:decimal">
                     <xs:attribute name="sku" type="xs:token" use="required"/>
                   </xs:extension>
                 </xs:simpleContent>
               </xs:complexType>"#,
        );
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_errors_are_collected_in_order() {
        let errors = check(
            r#"<xs:element name="b" type="xs:int" default="x"/>
               <xs:element name="a" type="xs:int" fixed="y"/>
               <xs:attribute name="c" type="xs:int" default="1" fixed="1"/>"#,
        );
        assert_eq!(
            kinds(&errors),
            vec![ErrorKind::InvalidValue, ErrorKind::InvalidValue, ErrorKind::InvalidAttribute]
        );
        assert!(errors[0].message.contains("'y'"));
        assert!(errors[1].message.contains("'x'"));
        assert_eq!(errors[0].system_id.as_deref(), Some("t.xsd"));
    }
}
