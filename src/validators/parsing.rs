//! XSD Document Parsing
//!
//! This module maps the element tree of one schema document to the schema
//! component AST. It does not follow directives: `include`, `import` and
//! `redefine` are returned as [`Directive`]s for the loader, each with its
//! position in the document's global declaration order.

use std::cell::Cell;

use crate::documents::{Document, Element};
use crate::error::{Error, ErrorKind, Result, SchemaError};
use crate::loaders::DirectiveKind;
use crate::namespaces::{QName, XSD_NAMESPACE};

use super::attributes::{AttributeDecl, AttributeGroupDef, AttributeUse};
use super::complex_types::{
    ComplexType, ContentForm, ContentType, DerivationMethod, SimpleContent,
};
use super::elements::{ElementDecl, Scope};
use super::facets::{DeferredFacet, FacetKind};
use super::globals::{ComponentKind, NotationDecl, TypeDef, TypeRef};
use super::groups::{GroupDef, GroupRef, ModelGroup, ModelGroupKind, Particle};
use super::identities::{IdentityConstraint, IdentityKind};
use super::particles::{parse_occurs, Occurs};
use super::schemas::{DerivationSet, Form, Schema};
use super::simple_types::{SimpleDerivation, SimpleType};
use super::wildcards::{ProcessContents, Wildcard};

/// XSD element local names
mod xsd_elements {
    pub const SCHEMA: &str = "schema";
    pub const ELEMENT: &str = "element";
    pub const COMPLEX_TYPE: &str = "complexType";
    pub const SIMPLE_TYPE: &str = "simpleType";
    pub const ATTRIBUTE: &str = "attribute";
    pub const ATTRIBUTE_GROUP: &str = "attributeGroup";
    pub const GROUP: &str = "group";
    pub const ANNOTATION: &str = "annotation";
    pub const IMPORT: &str = "import";
    pub const INCLUDE: &str = "include";
    pub const REDEFINE: &str = "redefine";
    pub const RESTRICTION: &str = "restriction";
    pub const EXTENSION: &str = "extension";
    pub const LIST: &str = "list";
    pub const UNION: &str = "union";
    pub const COMPLEX_CONTENT: &str = "complexContent";
    pub const SIMPLE_CONTENT: &str = "simpleContent";
    pub const ANY: &str = "any";
    pub const ANY_ATTRIBUTE: &str = "anyAttribute";
    pub const NOTATION: &str = "notation";
    pub const SELECTOR: &str = "selector";
    pub const FIELD: &str = "field";
}

/// XSD attribute names
mod xsd_attrs {
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
    pub const REF: &str = "ref";
    pub const TARGET_NAMESPACE: &str = "targetNamespace";
    pub const ELEMENT_FORM_DEFAULT: &str = "elementFormDefault";
    pub const ATTRIBUTE_FORM_DEFAULT: &str = "attributeFormDefault";
    pub const BLOCK_DEFAULT: &str = "blockDefault";
    pub const FINAL_DEFAULT: &str = "finalDefault";
    pub const BLOCK: &str = "block";
    pub const FINAL: &str = "final";
    pub const FORM: &str = "form";
    pub const NILLABLE: &str = "nillable";
    pub const DEFAULT: &str = "default";
    pub const FIXED: &str = "fixed";
    pub const BASE: &str = "base";
    pub const VALUE: &str = "value";
    pub const MIXED: &str = "mixed";
    pub const ABSTRACT: &str = "abstract";
    pub const SUBSTITUTION_GROUP: &str = "substitutionGroup";
    pub const NAMESPACE: &str = "namespace";
    pub const SCHEMA_LOCATION: &str = "schemaLocation";
    pub const ITEM_TYPE: &str = "itemType";
    pub const MEMBER_TYPES: &str = "memberTypes";
    pub const PUBLIC: &str = "public";
    pub const SYSTEM: &str = "system";
    pub const MIN_OCCURS: &str = "minOccurs";
    pub const MAX_OCCURS: &str = "maxOccurs";
    pub const USE: &str = "use";
    pub const PROCESS_CONTENTS: &str = "processContents";
    pub const REFER: &str = "refer";
    pub const XPATH: &str = "xpath";
}

/// XSD 1.1 elements rejected by this processor
const XSD11_ELEMENTS: &[&str] = &[
    "assert",
    "assertion",
    "alternative",
    "openContent",
    "defaultOpenContent",
    "override",
    "explicitTimezone",
];

use xsd_attrs as attrs;
use xsd_elements as tags;

/// Components given inside an `xs:redefine`
#[derive(Debug, Clone, Default)]
pub struct Redefinitions {
    /// Redefined simple and complex types
    pub types: Vec<TypeDef>,
    /// Redefined model groups
    pub groups: Vec<GroupDef>,
    /// Redefined attribute groups
    pub attribute_groups: Vec<AttributeGroupDef>,
}

impl Redefinitions {
    /// Check if nothing is redefined
    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.groups.is_empty() && self.attribute_groups.is_empty()
    }
}

/// An include, import or redefine directive
#[derive(Debug, Clone)]
pub struct Directive {
    /// Directive kind
    pub kind: DirectiveKind,
    /// The `schemaLocation` attribute
    pub location: Option<String>,
    /// The `namespace` attribute of an import
    pub namespace: Option<String>,
    /// Number of global declarations preceding the directive
    pub position: usize,
    /// Components overridden by a redefine
    pub redefinitions: Redefinitions,
}

/// Result of parsing one schema document
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Components of the document
    pub schema: Schema,
    /// Directives in document order
    pub directives: Vec<Directive>,
}

/// Parse the text of a schema document
pub fn parse_schema_document(text: &str, system_id: &str) -> Result<ParsedDocument> {
    let document = Document::from_string(text).map_err(|e| {
        Error::Schema(
            SchemaError::new(ErrorKind::Parse, e.to_string()).with_system_id(system_id),
        )
    })?;
    let root = document.root().ok_or_else(|| {
        Error::Schema(
            SchemaError::new(ErrorKind::Parse, "empty document").with_system_id(system_id),
        )
    })?;
    SchemaParser::new(system_id).parse(root)
}

/// Document parser state
struct SchemaParser<'a> {
    system_id: &'a str,
    target_namespace: String,
    block_default: DerivationSet,
    final_default: DerivationSet,
    /// Identity constraints parsed so far
    constraint_count: Cell<usize>,
}

impl<'a> SchemaParser<'a> {
    fn new(system_id: &'a str) -> Self {
        Self {
            system_id,
            target_namespace: String::new(),
            block_default: DerivationSet::default(),
            final_default: DerivationSet::default(),
            constraint_count: Cell::new(0),
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        self.error_of(ErrorKind::Parse, message)
    }

    fn error_of(&self, kind: ErrorKind, message: impl Into<String>) -> Error {
        Error::Schema(SchemaError::new(kind, message).with_system_id(self.system_id))
    }

    // =========================================================================
    // Schema element
    // =========================================================================

    fn parse(mut self, root: &Element) -> Result<ParsedDocument> {
        if !root.is(XSD_NAMESPACE, tags::SCHEMA) {
            return Err(self.error(format!(
                "root element {} is not xs:schema",
                root.qname
            )));
        }

        if let Some(tns) = root.attribute(attrs::TARGET_NAMESPACE) {
            if tns.is_empty() {
                return Err(self.error("targetNamespace must not be an empty string"));
            }
            self.target_namespace = tns.to_string();
        }
        let mut schema = Schema::new(self.target_namespace.clone(), self.system_id);
        schema.namespaces = root.namespaces.clone();
        schema.element_form_default = self.form_attr(root, attrs::ELEMENT_FORM_DEFAULT)?
            .unwrap_or_default();
        schema.attribute_form_default = self.form_attr(root, attrs::ATTRIBUTE_FORM_DEFAULT)?
            .unwrap_or_default();
        self.block_default = self.derivation_attr(root, attrs::BLOCK_DEFAULT)?.unwrap_or_default();
        self.final_default = self.derivation_attr(root, attrs::FINAL_DEFAULT)?.unwrap_or_default();
        schema.block_default = self.block_default;
        schema.final_default = self.final_default;

        let mut directives = Vec::new();
        for child in self.xsd_children(root)? {
            let position = schema.global_decl_order.len();
            match child.local_name() {
                tags::INCLUDE | tags::IMPORT | tags::REDEFINE => {
                    directives.push(self.directive(child, position)?);
                }
                tags::ELEMENT => {
                    let decl = self.element(child, Scope::Global)?;
                    if let Some(head) = decl.substitution_group.clone() {
                        schema.add_substitution_member(head, decl.name.clone());
                    }
                    self.add_global(&mut schema, ComponentKind::Element, decl.name.clone())?;
                    schema.elements.insert(decl.name.clone(), decl);
                }
                tags::SIMPLE_TYPE | tags::COMPLEX_TYPE => {
                    let def = self.named_type(child)?;
                    self.add_global(&mut schema, ComponentKind::Type, def.name().clone())?;
                    schema.types.insert(def.name().clone(), def);
                }
                tags::ATTRIBUTE => {
                    let decl = self.attribute(child, Scope::Global)?;
                    self.add_global(&mut schema, ComponentKind::Attribute, decl.name.clone())?;
                    schema.attributes.insert(decl.name.clone(), decl);
                }
                tags::ATTRIBUTE_GROUP => {
                    let group = self.attribute_group(child)?;
                    self.add_global(&mut schema, ComponentKind::AttributeGroup, group.name.clone())?;
                    schema.attribute_groups.insert(group.name.clone(), group);
                }
                tags::GROUP => {
                    let group = self.group_def(child)?;
                    self.add_global(&mut schema, ComponentKind::Group, group.name.clone())?;
                    schema.groups.insert(group.name.clone(), group);
                }
                tags::NOTATION => {
                    let notation = self.notation(child)?;
                    self.add_global(&mut schema, ComponentKind::Notation, notation.name.clone())?;
                    schema.notations.insert(notation.name.clone(), notation);
                }
                other => {
                    return Err(self.error(format!("unexpected xs:{} in xs:schema", other)));
                }
            }
        }

        Ok(ParsedDocument { schema, directives })
    }

    fn add_global(&self, schema: &mut Schema, kind: ComponentKind, name: QName) -> Result<()> {
        if schema.contains(kind, &name) {
            return Err(self.error_of(
                ErrorKind::DuplicateDeclaration,
                format!("duplicate global {} '{}'", kind, name),
            ));
        }
        schema.record_global(kind, name, self.system_id);
        Ok(())
    }

    fn directive(&self, elem: &Element, position: usize) -> Result<Directive> {
        let kind = match elem.local_name() {
            tags::INCLUDE => DirectiveKind::Include,
            tags::IMPORT => DirectiveKind::Import,
            _ => DirectiveKind::Redefine,
        };
        let location = elem.attribute(attrs::SCHEMA_LOCATION).map(|s| s.trim().to_string());
        if kind != DirectiveKind::Import && location.is_none() {
            return Err(self.error(format!("xs:{} requires a schemaLocation", kind)));
        }

        let mut redefinitions = Redefinitions::default();
        if kind == DirectiveKind::Redefine {
            for child in self.xsd_children(elem)? {
                match child.local_name() {
                    tags::SIMPLE_TYPE | tags::COMPLEX_TYPE => {
                        redefinitions.types.push(self.named_type(child)?)
                    }
                    tags::GROUP => redefinitions.groups.push(self.group_def(child)?),
                    tags::ATTRIBUTE_GROUP => redefinitions
                        .attribute_groups
                        .push(self.attribute_group(child)?),
                    other => {
                        return Err(self.error(format!("unexpected xs:{} in xs:redefine", other)))
                    }
                }
            }
        }

        Ok(Directive {
            kind,
            location,
            namespace: elem.attribute(attrs::NAMESPACE).map(|s| s.to_string()),
            position,
            redefinitions,
        })
    }

    // =========================================================================
    // Attribute helpers
    // =========================================================================

    /// Children in the XSD namespace, without annotations
    fn xsd_children<'e>(&self, elem: &'e Element) -> Result<Vec<&'e Element>> {
        let mut result = Vec::new();
        for child in &elem.children {
            if child.namespace() != XSD_NAMESPACE {
                continue;
            }
            let name = child.local_name();
            if name == tags::ANNOTATION {
                continue;
            }
            if XSD11_ELEMENTS.contains(&name) {
                return Err(self.error(format!("xs:{} is an XSD 1.1 feature", name)));
            }
            result.push(child);
        }
        Ok(result)
    }

    fn required<'e>(&self, elem: &'e Element, name: &str) -> Result<&'e str> {
        elem.attribute(name).ok_or_else(|| {
            self.error(format!("xs:{} requires a '{}' attribute", elem.local_name(), name))
        })
    }

    fn qname_attr(&self, elem: &Element, name: &str) -> Result<Option<QName>> {
        match elem.attribute(name) {
            Some(value) => self.resolve_qname(elem, value).map(Some),
            None => Ok(None),
        }
    }

    fn resolve_qname(&self, elem: &Element, value: &str) -> Result<QName> {
        elem.namespaces
            .resolve(value)
            .map_err(|e| self.error(format!("cannot resolve '{}': {}", value, e)))
    }

    fn bool_attr(&self, elem: &Element, name: &str) -> Result<bool> {
        match elem.attribute(name).map(str::trim) {
            None | Some("false") | Some("0") => Ok(false),
            Some("true") | Some("1") => Ok(true),
            Some(other) => Err(self.error(format!(
                "attribute '{}' has invalid boolean value '{}'",
                name, other
            ))),
        }
    }

    fn form_attr(&self, elem: &Element, name: &str) -> Result<Option<Form>> {
        match elem.attribute(name) {
            Some(value) => Form::from_str(value.trim())
                .map(Some)
                .ok_or_else(|| self.error(format!("invalid {} value '{}'", name, value))),
            None => Ok(None),
        }
    }

    fn derivation_attr(&self, elem: &Element, name: &str) -> Result<Option<DerivationSet>> {
        match elem.attribute(name) {
            Some(value) => DerivationSet::parse(value)
                .map(Some)
                .map_err(|e| self.error(format!("invalid {} value: {}", name, e))),
            None => Ok(None),
        }
    }

    fn occurs(&self, elem: &Element) -> Result<Occurs> {
        parse_occurs(elem.attribute(attrs::MIN_OCCURS), elem.attribute(attrs::MAX_OCCURS))
            .map_err(|e| Error::Schema(e.with_system_id(self.system_id)))
    }

    fn qualify(&self, local_name: &str) -> QName {
        QName::new(self.target_namespace.clone(), local_name.trim())
    }

    // =========================================================================
    // Elements
    // =========================================================================

    fn element(&self, elem: &Element, scope: Scope) -> Result<ElementDecl> {
        let name = self.required(elem, attrs::NAME)?;
        let mut decl = ElementDecl::new(self.qualify(name), scope);

        if scope == Scope::Local {
            decl.occurs = self.occurs(elem)?;
        }
        decl.nillable = self.bool_attr(elem, attrs::NILLABLE)?;
        decl.abstract_element = self.bool_attr(elem, attrs::ABSTRACT)?;
        decl.default = elem.attribute(attrs::DEFAULT).map(|s| s.to_string());
        decl.fixed = elem.attribute(attrs::FIXED).map(|s| s.to_string());
        decl.form = self.form_attr(elem, attrs::FORM)?;
        decl.block = self.derivation_attr(elem, attrs::BLOCK)?.unwrap_or(DerivationSet {
            list: false,
            union: false,
            ..self.block_default
        });
        decl.final_deriv = self.derivation_attr(elem, attrs::FINAL)?.unwrap_or(DerivationSet {
            extension: self.final_default.extension,
            restriction: self.final_default.restriction,
            ..DerivationSet::default()
        });
        decl.substitution_group = self.qname_attr(elem, attrs::SUBSTITUTION_GROUP)?;

        let mut inline: Option<TypeRef> = None;
        for child in self.xsd_children(elem)? {
            match child.local_name() {
                tags::SIMPLE_TYPE => {
                    inline = Some(TypeRef::inline(TypeDef::Simple(
                        self.simple_type(child, QName::zero())?,
                    )))
                }
                tags::COMPLEX_TYPE => {
                    inline = Some(TypeRef::inline(TypeDef::Complex(
                        self.complex_type(child, QName::zero())?,
                    )))
                }
                "key" | "keyref" | "unique" => decl.constraints.push(self.identity(child)?),
                other => {
                    return Err(self.error(format!("unexpected xs:{} in xs:element", other)))
                }
            }
        }

        match (self.qname_attr(elem, attrs::TYPE)?, inline) {
            (Some(_), Some(_)) => {
                return Err(self.error(format!(
                    "element '{}' has both a type attribute and an anonymous type",
                    name
                )))
            }
            (Some(type_name), None) => decl = decl.with_type(TypeRef::named(type_name)),
            (None, Some(type_ref)) => decl = decl.with_type(type_ref),
            (None, None) => {}
        }
        Ok(decl)
    }

    fn local_element(&self, elem: &Element) -> Result<Particle> {
        if let Some(reference) = self.qname_attr(elem, attrs::REF)? {
            if elem.attribute(attrs::NAME).is_some() {
                return Err(self.error(format!(
                    "element reference '{}' cannot also have a name",
                    reference
                )));
            }
            let decl = ElementDecl::reference(reference, self.occurs(elem)?);
            return Ok(Particle::Element(Box::new(decl)));
        }
        Ok(Particle::Element(Box::new(self.element(elem, Scope::Local)?)))
    }

    fn identity(&self, elem: &Element) -> Result<IdentityConstraint> {
        let kind = IdentityKind::from_local_name(elem.local_name())
            .ok_or_else(|| self.error(format!("unknown constraint xs:{}", elem.local_name())))?;
        let name = self.required(elem, attrs::NAME)?;
        let mut selector = None;
        let mut fields = Vec::new();
        for child in self.xsd_children(elem)? {
            let xpath = self.required(child, attrs::XPATH)?.to_string();
            match child.local_name() {
                tags::SELECTOR if selector.is_none() => selector = Some(xpath),
                tags::FIELD => fields.push(xpath),
                other => {
                    return Err(self.error(format!("unexpected xs:{} in xs:{}", other, kind)))
                }
            }
        }
        let selector = selector
            .ok_or_else(|| self.error(format!("xs:{} '{}' has no selector", kind, name)))?;

        let position = self.constraint_count.get();
        self.constraint_count.set(position + 1);
        let mut constraint = IdentityConstraint::new(self.qualify(name), kind, selector)
            .with_namespaces(elem.namespaces.clone())
            .declared_at(self.system_id, position);
        constraint.fields = fields;
        constraint.refer = self.qname_attr(elem, attrs::REFER)?;
        Ok(constraint)
    }

    // =========================================================================
    // Types
    // =========================================================================

    fn named_type(&self, elem: &Element) -> Result<TypeDef> {
        let name = self.qualify(self.required(elem, attrs::NAME)?);
        if elem.local_name() == tags::SIMPLE_TYPE {
            Ok(TypeDef::Simple(self.simple_type(elem, name)?))
        } else {
            Ok(TypeDef::Complex(self.complex_type(elem, name)?))
        }
    }

    fn inline_simple_types(&self, elem: &Element) -> Result<Vec<TypeRef>> {
        let mut result = Vec::new();
        for child in self.xsd_children(elem)? {
            if child.local_name() == tags::SIMPLE_TYPE {
                result.push(TypeRef::inline(TypeDef::Simple(
                    self.simple_type(child, QName::zero())?,
                )));
            }
        }
        Ok(result)
    }

    fn simple_type(&self, elem: &Element, name: QName) -> Result<SimpleType> {
        let children = self.xsd_children(elem)?;
        let body = match children.as_slice() {
            [single] => *single,
            _ => {
                return Err(self.error(
                    "xs:simpleType must contain exactly one of restriction, list or union",
                ))
            }
        };

        let derivation = match body.local_name() {
            tags::RESTRICTION => {
                let mut inline = self.inline_simple_types(body)?;
                let base = match (self.qname_attr(body, attrs::BASE)?, inline.pop()) {
                    (Some(_), Some(_)) => {
                        return Err(self.error(
                            "restriction has both a base attribute and an anonymous base type",
                        ))
                    }
                    (Some(base), None) => TypeRef::named(base),
                    (None, Some(type_ref)) => type_ref,
                    (None, None) => {
                        return Err(self.error("restriction requires a base type"));
                    }
                };
                SimpleDerivation::Restriction {
                    base,
                    facets: self.facets(body, &[])?,
                }
            }
            tags::LIST => {
                let mut inline = self.inline_simple_types(body)?;
                let named = self.qname_attr(body, attrs::ITEM_TYPE)?;
                let conflicting_item = named.is_some() && !inline.is_empty();
                let item = match (named, inline.pop()) {
                    (Some(item), _) => TypeRef::named(item),
                    (None, Some(type_ref)) => type_ref,
                    (None, None) => return Err(self.error("list requires an item type")),
                };
                SimpleDerivation::List {
                    item,
                    conflicting_item,
                }
            }
            tags::UNION => {
                let mut members = Vec::new();
                if let Some(value) = body.attribute(attrs::MEMBER_TYPES) {
                    for token in value.split_whitespace() {
                        members.push(TypeRef::named(self.resolve_qname(body, token)?));
                    }
                }
                members.extend(self.inline_simple_types(body)?);
                SimpleDerivation::Union { members }
            }
            other => {
                return Err(self.error(format!("unexpected xs:{} in xs:simpleType", other)))
            }
        };

        let mut st = SimpleType::restriction(name, TypeRef::any_simple_type());
        st.derivation = derivation;
        st.final_deriv = self.derivation_attr(elem, attrs::FINAL)?.unwrap_or(DerivationSet {
            restriction: self.final_default.restriction,
            list: self.final_default.list,
            union: self.final_default.union,
            ..DerivationSet::default()
        });
        Ok(st)
    }

    /// Facet children of a restriction; `skip` names the other children
    /// allowed in this position
    fn facets(&self, elem: &Element, skip: &[&str]) -> Result<Vec<DeferredFacet>> {
        let mut facets = Vec::new();
        for child in self.xsd_children(elem)? {
            let name = child.local_name();
            if name == tags::SIMPLE_TYPE || skip.contains(&name) {
                continue;
            }
            let kind = FacetKind::from_local_name(name).ok_or_else(|| {
                self.error(format!("unexpected xs:{} in xs:restriction", name))
            })?;
            let value = self.required(child, attrs::VALUE)?;
            let qname = match kind {
                FacetKind::Enumeration => child.namespaces.resolve(value).ok(),
                _ => None,
            };
            facets.push(
                DeferredFacet::new(kind, value)
                    .with_fixed(self.bool_attr(child, attrs::FIXED)?)
                    .with_qname(qname),
            );
        }
        Ok(facets)
    }

    fn complex_type(&self, elem: &Element, name: QName) -> Result<ComplexType> {
        let mut ct = ComplexType::new(name);
        ct.abstract_type = self.bool_attr(elem, attrs::ABSTRACT)?;
        ct.mixed = self.bool_attr(elem, attrs::MIXED)?;
        ct.block = self.derivation_attr(elem, attrs::BLOCK)?.unwrap_or(DerivationSet {
            extension: self.block_default.extension,
            restriction: self.block_default.restriction,
            ..DerivationSet::default()
        });
        ct.final_deriv = self.derivation_attr(elem, attrs::FINAL)?.unwrap_or(DerivationSet {
            extension: self.final_default.extension,
            restriction: self.final_default.restriction,
            ..DerivationSet::default()
        });

        let children = self.xsd_children(elem)?;
        let wrapper = children
            .iter()
            .find(|c| matches!(c.local_name(), tags::SIMPLE_CONTENT | tags::COMPLEX_CONTENT));

        match wrapper {
            Some(wrapper) => {
                if children.len() > 1 {
                    return Err(self.error(format!(
                        "xs:{} must be the only child of xs:complexType",
                        wrapper.local_name()
                    )));
                }
                let body = match self.xsd_children(wrapper)?.as_slice() {
                    [single] => *single,
                    _ => {
                        return Err(self.error(format!(
                            "xs:{} must contain exactly one restriction or extension",
                            wrapper.local_name()
                        )))
                    }
                };
                let derivation = DerivationMethod::from_str(body.local_name())
                    .filter(|m| {
                        matches!(m, DerivationMethod::Restriction | DerivationMethod::Extension)
                    })
                    .ok_or_else(|| {
                        self.error(format!(
                            "unexpected xs:{} in xs:{}",
                            body.local_name(),
                            wrapper.local_name()
                        ))
                    })?;
                let base = self
                    .qname_attr(body, attrs::BASE)?
                    .ok_or_else(|| self.error(format!("xs:{} requires a base", derivation)))?;
                ct.base = TypeRef::named(base);
                ct.derivation = derivation;

                if wrapper.local_name() == tags::SIMPLE_CONTENT {
                    ct.content_form = ContentForm::SimpleContent;
                    let mut content = SimpleContent::default();
                    if derivation == DerivationMethod::Restriction {
                        content.inline_type = self.inline_simple_types(body)?.pop();
                        content.deferred = self.facets(
                            body,
                            &[tags::ATTRIBUTE, tags::ATTRIBUTE_GROUP, tags::ANY_ATTRIBUTE],
                        )?;
                    }
                    ct.content = ContentType::Simple(content);
                } else {
                    ct.content_form = ContentForm::ComplexContent;
                    if wrapper.attribute(attrs::MIXED).is_some() {
                        ct.mixed = self.bool_attr(wrapper, attrs::MIXED)?;
                    }
                    ct.content = self.content_model(body)?;
                }
                self.attribute_uses(
                    body,
                    &mut ct.attributes,
                    &mut ct.attribute_group_refs,
                    &mut ct.any_attribute,
                )?;
            }
            None => {
                ct.content = self.content_model(elem)?;
                self.attribute_uses(
                    elem,
                    &mut ct.attributes,
                    &mut ct.attribute_group_refs,
                    &mut ct.any_attribute,
                )?;
            }
        }
        Ok(ct)
    }

    /// The model group child of a type or derivation, if any
    fn content_model(&self, elem: &Element) -> Result<ContentType> {
        for child in self.xsd_children(elem)? {
            match child.local_name() {
                tags::GROUP => {
                    let reference = self.group_reference(child)?;
                    let mut group = ModelGroup::sequence();
                    group.particles.push(reference);
                    return Ok(ContentType::Elements(group));
                }
                name if ModelGroupKind::from_local_name(name).is_some() => {
                    return Ok(ContentType::Elements(self.model_group(child)?));
                }
                _ => {}
            }
        }
        Ok(ContentType::Empty)
    }

    // =========================================================================
    // Model groups
    // =========================================================================

    fn group_reference(&self, elem: &Element) -> Result<Particle> {
        let name = self
            .qname_attr(elem, attrs::REF)?
            .ok_or_else(|| self.error("group reference requires a 'ref' attribute"))?;
        Ok(Particle::GroupRef(GroupRef {
            name,
            occurs: self.occurs(elem)?,
        }))
    }

    fn model_group(&self, elem: &Element) -> Result<ModelGroup> {
        let kind = ModelGroupKind::from_local_name(elem.local_name())
            .ok_or_else(|| self.error(format!("xs:{} is not a model group", elem.local_name())))?;
        let mut group = ModelGroup::new(kind).with_occurs(self.occurs(elem)?);

        for child in self.xsd_children(elem)? {
            let particle = match child.local_name() {
                tags::ELEMENT => self.local_element(child)?,
                tags::GROUP if kind != ModelGroupKind::All => self.group_reference(child)?,
                tags::ANY if kind != ModelGroupKind::All => Particle::Any(self.wildcard(child)?),
                name if ModelGroupKind::from_local_name(name).is_some() => {
                    Particle::Group(self.model_group(child)?)
                }
                other => {
                    return Err(self.error(format!("unexpected xs:{} in xs:{}", other, kind)))
                }
            };
            group.particles.push(particle);
        }
        Ok(group)
    }

    fn group_def(&self, elem: &Element) -> Result<GroupDef> {
        let name = self.qualify(self.required(elem, attrs::NAME)?);
        let children = self.xsd_children(elem)?;
        let body = match children.as_slice() {
            [single] if ModelGroupKind::from_local_name(single.local_name()).is_some() => *single,
            _ => {
                return Err(self.error(format!(
                    "group '{}' must contain exactly one sequence, choice or all",
                    name
                )))
            }
        };
        Ok(GroupDef::new(name, self.model_group(body)?))
    }

    fn wildcard(&self, elem: &Element) -> Result<Wildcard> {
        let process_contents = match elem.attribute(attrs::PROCESS_CONTENTS) {
            Some(value) => ProcessContents::from_str(value.trim())
                .ok_or_else(|| self.error(format!("invalid processContents '{}'", value)))?,
            None => ProcessContents::Strict,
        };
        let wildcard = Wildcard::new(
            elem.attribute(attrs::NAMESPACE),
            &self.target_namespace,
            process_contents,
        )
        .map_err(|e| Error::Schema(e.with_system_id(self.system_id)))?;
        if elem.local_name() == tags::ANY {
            Ok(wildcard.with_occurs(self.occurs(elem)?))
        } else {
            Ok(wildcard)
        }
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    fn attribute(&self, elem: &Element, scope: Scope) -> Result<AttributeDecl> {
        let mut decl = match (scope, self.qname_attr(elem, attrs::REF)?) {
            (Scope::Local, Some(reference)) => AttributeDecl::reference(reference),
            _ => AttributeDecl::new(self.qualify(self.required(elem, attrs::NAME)?), scope),
        };

        if let Some(value) = elem.attribute(attrs::USE) {
            decl.use_mode = AttributeUse::from_str(value.trim())
                .ok_or_else(|| self.error(format!("invalid attribute use '{}'", value)))?;
        }
        decl.default = elem.attribute(attrs::DEFAULT).map(|s| s.to_string());
        decl.fixed = elem.attribute(attrs::FIXED).map(|s| s.to_string());
        decl.form = self.form_attr(elem, attrs::FORM)?;

        let mut inline = self.inline_simple_types(elem)?;
        match (self.qname_attr(elem, attrs::TYPE)?, inline.pop()) {
            (Some(_), Some(_)) => {
                return Err(self.error(format!(
                    "attribute '{}' has both a type attribute and an anonymous type",
                    decl.name
                )))
            }
            (Some(type_name), None) => decl.type_ref = TypeRef::named(type_name),
            (None, Some(type_ref)) => decl.type_ref = type_ref,
            (None, None) => {}
        }
        Ok(decl)
    }

    fn attribute_uses(
        &self,
        elem: &Element,
        attributes: &mut Vec<AttributeDecl>,
        group_refs: &mut Vec<QName>,
        any_attribute: &mut Option<Wildcard>,
    ) -> Result<()> {
        for child in self.xsd_children(elem)? {
            match child.local_name() {
                tags::ATTRIBUTE => attributes.push(self.attribute(child, Scope::Local)?),
                tags::ATTRIBUTE_GROUP => {
                    let reference = self.qname_attr(child, attrs::REF)?.ok_or_else(|| {
                        self.error("attribute group reference requires a 'ref' attribute")
                    })?;
                    group_refs.push(reference);
                }
                tags::ANY_ATTRIBUTE => *any_attribute = Some(self.wildcard(child)?),
                _ => {}
            }
        }
        Ok(())
    }

    fn attribute_group(&self, elem: &Element) -> Result<AttributeGroupDef> {
        let mut group = AttributeGroupDef::new(self.qualify(self.required(elem, attrs::NAME)?));
        self.attribute_uses(
            elem,
            &mut group.attributes,
            &mut group.group_refs,
            &mut group.any_attribute,
        )?;
        Ok(group)
    }

    fn notation(&self, elem: &Element) -> Result<NotationDecl> {
        let mut notation = NotationDecl::new(self.qualify(self.required(elem, attrs::NAME)?));
        notation.public = elem.attribute(attrs::PUBLIC).map(|s| s.to_string());
        notation.system = elem.attribute(attrs::SYSTEM).map(|s| s.to_string());
        if notation.public.is_none() && notation.system.is_none() {
            return Err(self.error(format!(
                "notation '{}' must have 'public' or 'system' attribute",
                notation.name
            )));
        }
        Ok(notation)
    }
}
