//! Compiled grammar export
//!
//! [`GrammarSummary`] is a serializable digest of a [`CompiledSchema`]:
//! global elements with their types, named types with their derivation
//! chains and content models, substitution groups and notations. Names are
//! written in `{namespace}local` form. Content models are rendered as
//! compact expressions such as `(a, b?, (c | d)+)`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::compiler::{
    CompiledContentModel, CompiledParticle, CompiledSchema, CompiledType, ContentKind, TypeKind,
};
use crate::error::Result;
use crate::validators::groups::ModelGroupKind;
use crate::validators::particles::Occurs;

/// Summary of a compiled schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrammarSummary {
    /// Target namespace of the root document
    pub target_namespace: String,

    /// System id of the root document
    pub system_id: String,

    /// Global elements, in declaration order
    pub elements: Vec<ElementSummary>,

    /// Named types, in declaration order
    pub types: Vec<TypeSummary>,

    /// Transitive members of each substitution group head
    pub substitution_groups: BTreeMap<String, Vec<String>>,

    /// Notation names
    pub notations: Vec<String>,
}

/// Global element entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementSummary {
    /// Element name
    pub name: String,

    /// Type name, or `anonymous type #N`
    #[serde(rename = "type")]
    pub type_name: String,

    /// Whether the element is nillable
    pub nillable: bool,

    /// Whether the element is abstract
    #[serde(rename = "abstract")]
    pub abstract_element: bool,

    /// Head of the element's substitution group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub substitution_group: Option<String>,

    /// Identity constraints as `kind name`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
}

/// Named type entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeSummary {
    /// Type name
    pub name: String,

    /// `simple` or `complex`
    pub kind: &'static str,

    /// Derivation method from the base
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivation: Option<String>,

    /// Ancestors, nearest first
    pub chain: Vec<String>,

    /// Element content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentSummary>,

    /// Type of the text content of a complex type with simple content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simple_content: Option<String>,

    /// Attribute names
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,

    /// Facets in force
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<String>,
}

/// Content model entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentSummary {
    /// `sequence`, `choice`, `all` or `empty`
    pub kind: &'static str,

    /// Whether character data is allowed
    pub mixed: bool,

    /// Rendered model
    pub model: String,

    /// Distinct element names
    pub elements: Vec<String>,
}

impl GrammarSummary {
    /// Build the summary of a compiled schema
    pub fn from_schema(schema: &CompiledSchema) -> Self {
        let type_name = |id| {
            schema
                .get_type(id)
                .map(name_of)
                .unwrap_or_else(|| format!("type {}", id))
        };

        let elements = schema
            .elements
            .values()
            .map(|element| ElementSummary {
                name: element.name.to_string(),
                type_name: type_name(element.type_id),
                nillable: element.nillable,
                abstract_element: element.abstract_element,
                substitution_group: element.substitution_group.as_ref().map(|n| n.to_string()),
                constraints: element
                    .constraints
                    .iter()
                    .map(|c| format!("{} {}", c.kind, c.name))
                    .collect(),
            })
            .collect();

        let types = schema
            .types
            .values()
            .filter_map(|id| schema.get_type(*id))
            .map(|t| TypeSummary {
                name: name_of(t),
                kind: match t.kind {
                    TypeKind::Complex => "complex",
                    _ => "simple",
                },
                derivation: t.derivation.map(|d| d.to_string()),
                chain: t.chain.iter().skip(1).map(|id| type_name(*id)).collect(),
                content: t.content.as_ref().map(content_summary),
                simple_content: t.simple_content_type.map(type_name),
                attributes: t
                    .attributes
                    .iter()
                    .map(|a| a.name.to_string())
                    .collect(),
                facets: t
                    .facets
                    .iter()
                    .map(|f| format!("{}={}", f.kind().as_str(), f.value_text()))
                    .collect(),
            })
            .collect();

        let substitution_groups = schema
            .substitution_groups
            .iter()
            .filter(|(_, members)| !members.is_empty())
            .map(|(head, members)| {
                (
                    head.to_string(),
                    members.iter().map(|m| m.to_string()).collect(),
                )
            })
            .collect();

        Self {
            target_namespace: schema.target_namespace.clone(),
            system_id: schema.system_id.clone(),
            elements,
            types,
            substitution_groups,
            notations: schema.notations.keys().map(|n| n.to_string()).collect(),
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn name_of(t: &CompiledType) -> String {
    if t.name.is_zero() {
        format!("anonymous type {}", t.id)
    } else {
        t.name.to_string()
    }
}

fn content_summary(model: &CompiledContentModel) -> ContentSummary {
    let kind = match model.kind {
        ContentKind::Sequence => "sequence",
        ContentKind::Choice => "choice",
        ContentKind::All => "all",
        ContentKind::Empty => "empty",
    };
    let group = match model.kind {
        ContentKind::Empty => None,
        ContentKind::Sequence => Some(ModelGroupKind::Sequence),
        ContentKind::Choice => Some(ModelGroupKind::Choice),
        ContentKind::All => Some(ModelGroupKind::All),
    };
    let rendered = match group {
        Some(kind) => render_group(kind, model.occurs, &model.particles),
        None => "()".to_string(),
    };
    ContentSummary {
        kind,
        mixed: model.mixed,
        model: rendered,
        elements: model.element_names().map(|n| n.local_name.clone()).collect(),
    }
}

fn render(particle: &CompiledParticle) -> String {
    match particle {
        CompiledParticle::Element(e) => format!("{}{}", e.name.local_name, suffix(e.occurs)),
        CompiledParticle::Wildcard(w) => format!("{}{}", w, suffix(w.occurs)),
        CompiledParticle::Group {
            kind,
            occurs,
            particles,
        } => render_group(*kind, *occurs, particles),
    }
}

fn render_group(kind: ModelGroupKind, occurs: Occurs, particles: &[CompiledParticle]) -> String {
    let separator = match kind {
        ModelGroupKind::Sequence => ", ",
        ModelGroupKind::Choice => " | ",
        ModelGroupKind::All => " & ",
    };
    let inner: Vec<String> = particles.iter().map(render).collect();
    format!("({}){}", inner.join(separator), suffix(occurs))
}

fn suffix(occurs: Occurs) -> String {
    match (occurs.min, occurs.max) {
        (1, Some(1)) => String::new(),
        (0, Some(1)) => "?".to_string(),
        (0, None) => "*".to_string(),
        (1, None) => "+".to_string(),
        (min, Some(max)) => format!("{{{},{}}}", min, max),
        (min, None) => format!("{{{},}}", min),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::SchemaLoader;
    use crate::loaders::MemoryResolver;
    use pretty_assertions::assert_eq;

    fn summary(body: &str) -> GrammarSummary {
        let text = format!(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t" xmlns:t="urn:t">{}</xs:schema>"#,
            body
        );
        let mut loader = SchemaLoader::new(MemoryResolver::new().with_document("t.xsd", text));
        GrammarSummary::from_schema(&loader.load("t.xsd").unwrap())
    }

    #[test]
    fn test_content_model_rendering() {
        let summary = summary(
            r#"<xs:complexType name="t">
                 <xs:sequence>
                   <xs:element name="a"/>
                   <xs:element name="b" minOccurs="0"/>
                   <xs:choice maxOccurs="unbounded">
                     <xs:element name="c"/>
                     <xs:element name="d" minOccurs="2" maxOccurs="3"/>
                   </xs:choice>
                 </xs:sequence>
               </xs:complexType>"#,
        );
        let content = summary.types[0].content.as_ref().unwrap();
        assert_eq!(content.model, "(a, b?, (c | d{2,3})+)");
        assert_eq!(content.elements, vec!["a", "b", "c", "d"]);
        assert_eq!(summary.types[0].chain, vec!["{http://www.w3.org/2001/XMLSchema}anyType"]);
    }

    #[test]
    fn test_json_export() {
        let summary = summary(
            r#"<xs:element name="price" type="t:money"/>
               <xs:simpleType name="money">
                 <xs:restriction base="xs:decimal">
                   <xs:fractionDigits value="2"/>
                 </xs:restriction>
               </xs:simpleType>"#,
        );
        assert_eq!(summary.elements[0].type_name, "{urn:t}money");
        assert_eq!(summary.types[0].derivation.as_deref(), Some("restriction"));
        assert!(summary.types[0].facets.contains(&"fractionDigits=2".to_string()));

        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["elements"][0]["type"], "{urn:t}money");
        assert_eq!(json["types"][0]["kind"], "simple");
        assert!(json["elements"][0].get("constraints").is_none());
    }
}
