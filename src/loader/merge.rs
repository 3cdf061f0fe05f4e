//! Schema merging
//!
//! Folds one assembled schema into another. Every top-level component is
//! keyed by its qualified name; a name that is already present is accepted
//! only when both copies come from the same document or are equivalent.

use std::collections::HashSet;
use std::mem;

use indexmap::IndexMap;
use tracing::trace;

use crate::error::{Error, ErrorKind, Result, SchemaError};
use crate::loaders::DirectiveKind;
use crate::namespaces::QName;
use crate::validators::globals::{ComponentKind, NamespaceRemap};
use crate::validators::schemas::Schema;

/// How a source schema is folded into a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeMode {
    /// The directive the merge comes from
    pub kind: DirectiveKind,
    /// Where the source's globals are spliced into the target's declaration
    /// order (`None` appends)
    pub position: Option<usize>,
}

impl MergeMode {
    /// Merge mode of a directive
    pub fn new(kind: DirectiveKind, position: Option<usize>) -> Self {
        Self { kind, position }
    }

    /// Check if the source must be moved into the target's namespace
    pub fn remaps(&self, target: &Schema, source: &Schema) -> bool {
        self.kind != DirectiveKind::Import
            && source.target_namespace.is_empty()
            && !target.target_namespace.is_empty()
    }
}

/// Namespace compatibility of an include: the included document must share
/// the including namespace or have none
pub fn include_compatible(including: &str, included: &str) -> bool {
    including == included || included.is_empty()
}

/// Rewrite every empty-namespace name of a schema into `namespace`
pub fn remap_schema(schema: &mut Schema, namespace: &str) {
    remap_map(&mut schema.elements, namespace);
    remap_map(&mut schema.types, namespace);
    remap_map(&mut schema.attributes, namespace);
    remap_map(&mut schema.attribute_groups, namespace);
    remap_map(&mut schema.groups, namespace);
    remap_map(&mut schema.notations, namespace);
    remap_map(&mut schema.substitution_groups, namespace);
    remap_map(&mut schema.redefined_types, namespace);
    remap_map(&mut schema.redefined_groups, namespace);
    remap_map(&mut schema.redefined_attribute_groups, namespace);

    schema.origins = mem::take(&mut schema.origins)
        .into_iter()
        .map(|((kind, mut name), origin)| {
            name.remap_namespace(namespace);
            ((kind, name), origin)
        })
        .collect();
    for (_, name) in &mut schema.global_decl_order {
        name.remap_namespace(namespace);
    }
    if let Some(imports) = schema.imported_namespaces.remove("") {
        schema
            .imported_namespaces
            .entry(namespace.to_string())
            .or_default()
            .extend(imports);
    }
    schema.target_namespace = namespace.to_string();
}

fn remap_map<V: NamespaceRemap>(map: &mut IndexMap<QName, V>, namespace: &str) {
    for (mut name, mut value) in mem::take(map) {
        name.remap_namespace(namespace);
        value.remap_namespace(namespace);
        map.insert(name, value);
    }
}

/// Bind the form of unqualified-by-default local declarations to the
/// source's defaults when they differ from the target's
fn bind_forms(target: &Schema, source: &mut Schema) {
    let element_form = source.element_form_default;
    let attribute_form = source.attribute_form_default;
    let bind_elements = element_form != target.element_form_default;
    let bind_attributes = attribute_form != target.attribute_form_default;
    if !bind_elements && !bind_attributes {
        return;
    }
    source.for_each_local_mut(
        &mut |e| {
            if bind_elements && e.form.is_none() {
                e.form = Some(element_form);
            }
        },
        &mut |a| {
            if bind_attributes && a.form.is_none() {
                a.form = Some(attribute_form);
            }
        },
    );
}

/// Fold `source` into `target`, returning the number of components added
pub fn merge_schema(target: &mut Schema, mut source: Schema, mode: MergeMode) -> Result<usize> {
    if mode.remaps(target, &source) {
        trace!(
            source = %source.system_id,
            namespace = %target.target_namespace,
            "chameleon remap"
        );
        let namespace = target.target_namespace.clone();
        remap_schema(&mut source, &namespace);
    }
    bind_forms(target, &mut source);
    if mode.kind == DirectiveKind::Import {
        let namespace = source.target_namespace.clone();
        for attribute in source.attributes.values_mut() {
            attribute.source_namespace.get_or_insert_with(|| namespace.clone());
        }
    }

    let mut merger = Merger {
        target,
        source_origins: mem::take(&mut source.origins),
        source_system_id: source.system_id.clone(),
        inserted: HashSet::new(),
    };
    merger.merge_map(ComponentKind::Element, mem::take(&mut source.elements), |t| {
        &mut t.elements
    })?;
    merger.merge_map(ComponentKind::Type, mem::take(&mut source.types), |t| &mut t.types)?;
    merger.merge_map(ComponentKind::Attribute, mem::take(&mut source.attributes), |t| {
        &mut t.attributes
    })?;
    merger.merge_map(
        ComponentKind::AttributeGroup,
        mem::take(&mut source.attribute_groups),
        |t| &mut t.attribute_groups,
    )?;
    merger.merge_map(ComponentKind::Group, mem::take(&mut source.groups), |t| &mut t.groups)?;
    merger.merge_map(ComponentKind::Notation, mem::take(&mut source.notations), |t| {
        &mut t.notations
    })?;
    let Merger { target, inserted, .. } = merger;

    // Declaration order: splice the source's new globals at the directive
    let added: Vec<(ComponentKind, QName)> = source
        .global_decl_order
        .into_iter()
        .filter(|key| inserted.contains(key))
        .collect();
    let count = added.len();
    let at = mode
        .position
        .unwrap_or(target.global_decl_order.len())
        .min(target.global_decl_order.len());
    target.global_decl_order.splice(at..at, added);

    for (head, members) in source.substitution_groups {
        for member in members {
            target.add_substitution_member(head.clone(), member);
        }
    }
    for (namespace, imports) in source.imported_namespaces {
        target
            .imported_namespaces
            .entry(namespace)
            .or_default()
            .extend(imports);
    }
    for (name, def) in source.redefined_types {
        target.redefined_types.entry(name).or_insert(def);
    }
    for (name, def) in source.redefined_groups {
        target.redefined_groups.entry(name).or_insert(def);
    }
    for (name, def) in source.redefined_attribute_groups {
        target.redefined_attribute_groups.entry(name).or_insert(def);
    }
    target.merged_documents.extend(source.merged_documents);
    target.merged_documents.insert(source.system_id);

    Ok(count)
}

struct Merger<'a> {
    target: &'a mut Schema,
    source_origins: std::collections::HashMap<(ComponentKind, QName), String>,
    source_system_id: String,
    inserted: HashSet<(ComponentKind, QName)>,
}

impl Merger<'_> {
    fn merge_map<V, F>(
        &mut self,
        kind: ComponentKind,
        source: IndexMap<QName, V>,
        select: F,
    ) -> Result<()>
    where
        V: PartialEq + Equivalent,
        F: Fn(&mut Schema) -> &mut IndexMap<QName, V>,
    {
        for (name, component) in source {
            let origin = self
                .source_origins
                .get(&(kind, name.clone()))
                .cloned()
                .unwrap_or_else(|| self.source_system_id.clone());

            let previous = self.target.origin_of(kind, &name).map(str::to_string);
            if let Some(existing) = select(self.target).get(&name) {
                if previous.as_deref() == Some(origin.as_str()) {
                    continue;
                }
                if existing.is_equivalent_to(&component) {
                    trace!(component = %name, "equivalent duplicate skipped");
                    continue;
                }
                return Err(Error::Schema(
                    SchemaError::new(
                        ErrorKind::DuplicateDeclaration,
                        format!(
                            "{} '{}' is declared in both {} and {}",
                            kind,
                            name,
                            previous.as_deref().unwrap_or("?"),
                            origin
                        ),
                    )
                    .with_component(name.to_string())
                    .with_system_id(origin),
                ));
            }

            select(self.target).insert(name.clone(), component);
            self.target.origins.insert((kind, name.clone()), origin);
            self.inserted.insert((kind, name));
        }
        Ok(())
    }
}

/// Equivalence of two same-named components from different documents
trait Equivalent {
    fn is_equivalent_to(&self, other: &Self) -> bool;
}

impl Equivalent for crate::validators::elements::ElementDecl {
    fn is_equivalent_to(&self, other: &Self) -> bool {
        self.is_equivalent(other)
    }
}

macro_rules! structural_equivalence {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Equivalent for $ty {
                fn is_equivalent_to(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

structural_equivalence!(
    crate::validators::globals::TypeDef,
    crate::validators::attributes::AttributeDecl,
    crate::validators::attributes::AttributeGroupDef,
    crate::validators::groups::GroupDef,
    crate::validators::globals::NotationDecl,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::parsing::parse_schema_document;
    use pretty_assertions::assert_eq;

    fn parse(text: &str, system_id: &str) -> Schema {
        parse_schema_document(text, system_id).unwrap().schema
    }

    const XS: &str = "http://www.w3.org/2001/XMLSchema";

    #[test]
    fn test_chameleon_remap() {
        let mut target = parse(
            &format!(r#"<xs:schema xmlns:xs="{XS}" targetNamespace="urn:a"><xs:element name="root"/></xs:schema>"#),
            "a.xsd",
        );
        let source = parse(
            &format!(
                r#"<xs:schema xmlns:xs="{XS}">
                     <xs:element name="child" type="childType"/>
                     <xs:complexType name="childType">
                       <xs:sequence><xs:element name="x" type="xs:int"/></xs:sequence>
                     </xs:complexType>
                   </xs:schema>"#
            ),
            "b.xsd",
        );
        let added = merge_schema(
            &mut target,
            source,
            MergeMode::new(DirectiveKind::Include, Some(0)),
        )
        .unwrap();
        assert_eq!(added, 2);

        let child = &target.elements[&QName::new("urn:a", "child")];
        assert_eq!(child.type_ref.name(), Some(&QName::new("urn:a", "childType")));
        assert!(target.types.contains_key(&QName::new("urn:a", "childType")));
        assert_eq!(
            target.origin_of(ComponentKind::Element, &QName::new("urn:a", "child")),
            Some("b.xsd")
        );
        // Built-in references keep their namespace
        let ct = match &target.types[&QName::new("urn:a", "childType")] {
            crate::validators::globals::TypeDef::Complex(ct) => ct.clone(),
            _ => unreachable!(),
        };
        let inner = ct.model_group().unwrap().element_particles()[0];
        assert_eq!(inner.type_ref.name(), Some(&QName::xsd("int")));
        assert_eq!(target.global_decl_order[0].1, QName::new("urn:a", "child"));
        assert!(target.merged_documents.contains("b.xsd"));
    }

    #[test]
    fn test_duplicate_detection() {
        let text = format!(
            r#"<xs:schema xmlns:xs="{XS}"><xs:element name="e" type="xs:int"/></xs:schema>"#
        );
        let mut target = parse(&text, "a.xsd");
        // Same origin is idempotent
        let again = parse(&text, "a.xsd");
        assert_eq!(
            merge_schema(&mut target, again, MergeMode::new(DirectiveKind::Include, None)).unwrap(),
            0
        );
        // Equivalent declaration from another document is accepted
        let same = parse(&text, "b.xsd");
        assert!(merge_schema(&mut target, same, MergeMode::new(DirectiveKind::Include, None)).is_ok());
        // A conflicting one is not
        let other = parse(
            &format!(r#"<xs:schema xmlns:xs="{XS}"><xs:element name="e" type="xs:string"/></xs:schema>"#),
            "c.xsd",
        );
        let err = merge_schema(&mut target, other, MergeMode::new(DirectiveKind::Include, None))
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::DuplicateDeclaration));
    }

    #[test]
    fn test_import_keeps_namespace_and_binds_forms() {
        let mut target = parse(
            &format!(r#"<xs:schema xmlns:xs="{XS}" targetNamespace="urn:a"/>"#),
            "a.xsd",
        );
        let source = parse(
            &format!(
                r#"<xs:schema xmlns:xs="{XS}" targetNamespace="urn:b" attributeFormDefault="qualified">
                     <xs:attribute name="g" type="xs:string"/>
                     <xs:attributeGroup name="ag"><xs:attribute name="l"/></xs:attributeGroup>
                   </xs:schema>"#
            ),
            "b.xsd",
        );
        merge_schema(&mut target, source, MergeMode::new(DirectiveKind::Import, None)).unwrap();
        let global = &target.attributes[&QName::new("urn:b", "g")];
        assert_eq!(global.source_namespace.as_deref(), Some("urn:b"));
        let group = &target.attribute_groups[&QName::new("urn:b", "ag")];
        assert_eq!(group.attributes[0].form, Some(crate::validators::schemas::Form::Qualified));
    }

    #[test]
    fn test_include_compatible() {
        assert!(include_compatible("urn:a", "urn:a"));
        assert!(include_compatible("urn:a", ""));
        assert!(include_compatible("", ""));
        assert!(!include_compatible("urn:a", "urn:b"));
        assert!(!include_compatible("", "urn:b"));
    }
}
