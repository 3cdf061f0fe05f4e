//! Invariants of the loading pipeline

use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use xsd_grammar::compiler::{CompiledParticle, CompiledSchema};
use xsd_grammar::error::ErrorKind;
use xsd_grammar::loader::SchemaLoader;
use xsd_grammar::loaders::MemoryResolver;
use xsd_grammar::namespaces::{NamespaceContext, QName};
use xsd_grammar::validators::globals::{ComponentKind, TypeId};
use xsd_grammar::xpath::RestrictedXPath;

const XS: &str = r#"xmlns:xs="http://www.w3.org/2001/XMLSchema""#;

fn doc(attrs: &str, body: &str) -> String {
    format!("<xs:schema {} {}>{}</xs:schema>", XS, attrs, body)
}

fn load(body: &str) -> xsd_grammar::Result<Arc<CompiledSchema>> {
    let text = doc(
        r#"targetNamespace="urn:t" xmlns:t="urn:t" elementFormDefault="qualified""#,
        body,
    );
    SchemaLoader::new(MemoryResolver::new().with_document("t.xsd", text)).load("t.xsd")
}

#[test]
fn test_repeated_load_is_cached() {
    let resolver = MemoryResolver::new().with_document(
        "t.xsd",
        doc(
            r#"targetNamespace="urn:t""#,
            r#"<xs:element name="root" type="xs:string"/>"#,
        ),
    );
    let mut loader = SchemaLoader::new(resolver.clone());
    let first = loader.load("t.xsd").unwrap();
    let second = loader.load("t.xsd").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let fresh = SchemaLoader::new(resolver).load("t.xsd").unwrap();
    assert!(!Arc::ptr_eq(&first, &fresh));
    assert_eq!(*first, *fresh);

    loader.clear_cache();
    let reloaded = loader.load("t.xsd").unwrap();
    assert!(!Arc::ptr_eq(&first, &reloaded));
}

#[test]
fn test_nested_include_order() {
    let resolver = MemoryResolver::new()
        .with_document(
            "main.xsd",
            doc(
                r#"targetNamespace="urn:a""#,
                r#"<xs:simpleType name="t1"><xs:restriction base="xs:string"/></xs:simpleType>
                   <xs:include schemaLocation="one.xsd"/>
                   <xs:element name="e1" type="xs:string"/>
                   <xs:include schemaLocation="two.xsd"/>"#,
            ),
        )
        .with_document(
            "one.xsd",
            doc(
                "",
                r#"<xs:element name="one"/>
                   <xs:include schemaLocation="deep.xsd"/>
                   <xs:attribute name="oneAttr"/>"#,
            ),
        )
        .with_document("deep.xsd", doc("", r#"<xs:element name="deep"/>"#))
        .with_document("two.xsd", doc("", r#"<xs:notation name="two" public="x"/>"#));
    let schema = SchemaLoader::new(resolver).assemble("main.xsd").unwrap();

    let order: Vec<(ComponentKind, &str)> = schema
        .global_decl_order
        .iter()
        .map(|(kind, name)| (*kind, name.local_name.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            (ComponentKind::Type, "t1"),
            (ComponentKind::Element, "one"),
            (ComponentKind::Element, "deep"),
            (ComponentKind::Attribute, "oneAttr"),
            (ComponentKind::Element, "e1"),
            (ComponentKind::Notation, "two"),
        ]
    );
}

#[test]
fn test_chameleon_remaps_nested_names_only() {
    let resolver = MemoryResolver::new()
        .with_document(
            "main.xsd",
            doc(
                r#"targetNamespace="urn:a" xmlns:o="urn:other""#,
                r#"<xs:import namespace="urn:other" schemaLocation="other.xsd"/>
                   <xs:include schemaLocation="cham.xsd"/>"#,
            ),
        )
        .with_document(
            "cham.xsd",
            doc(
                r#"xmlns:o="urn:other""#,
                r#"<xs:complexType name="item">
                     <xs:sequence>
                       <xs:element name="code" type="codeType"/>
                       <xs:element ref="o:note" minOccurs="0"/>
                     </xs:sequence>
                   </xs:complexType>
                   <xs:simpleType name="codeType">
                     <xs:restriction base="xs:token"/>
                   </xs:simpleType>
                   <xs:element name="item" type="item"/>"#,
            ),
        )
        .with_document(
            "other.xsd",
            doc(
                r#"targetNamespace="urn:other""#,
                r#"<xs:element name="note" type="xs:string"/>"#,
            ),
        );
    let schema = SchemaLoader::new(resolver).load("main.xsd").unwrap();

    let item = schema.element_type(&QName::new("urn:a", "item")).unwrap();
    assert_eq!(item.name, QName::new("urn:a", "item"));
    let content = item.content.as_ref().unwrap();
    let names: Vec<&QName> = content.element_names().collect();
    // Local elements stay unqualified under the default element form
    assert_eq!(
        names,
        vec![&QName::local("code"), &QName::new("urn:other", "note")]
    );
    match &content.particles[0] {
        CompiledParticle::Element(code) => {
            let code_type = schema.get_type(code.type_id).unwrap();
            assert_eq!(code_type.name, QName::new("urn:a", "codeType"));
        }
        other => panic!("unexpected particle {:?}", other),
    }
    let code_type = schema
        .type_by_name(&QName::new("urn:a", "codeType"))
        .unwrap();
    let base = schema.get_type(code_type.base.unwrap()).unwrap();
    assert_eq!(base.name, QName::xsd("token"));
}

#[test]
fn test_every_chain_ends_at_any_type() {
    let schema = load(
        r#"<xs:simpleType name="codes">
             <xs:list itemType="xs:token"/>
           </xs:simpleType>
           <xs:simpleType name="either">
             <xs:union memberTypes="xs:int t:codes"/>
           </xs:simpleType>
           <xs:complexType name="base">
             <xs:sequence><xs:element name="a" type="t:either"/></xs:sequence>
           </xs:complexType>
           <xs:complexType name="derived">
             <xs:complexContent>
               <xs:extension base="t:base">
                 <xs:sequence><xs:element name="b" type="t:derived" minOccurs="0"/></xs:sequence>
               </xs:extension>
             </xs:complexContent>
           </xs:complexType>
           <xs:complexType name="priced">
             <xs:simpleContent>
               <xs:extension base="xs:decimal">
                 <xs:attribute name="currency" type="xs:string"/>
               </xs:extension>
             </xs:simpleContent>
           </xs:complexType>"#,
    )
    .unwrap();

    for compiled in schema.iter_types() {
        assert_eq!(compiled.chain.first(), Some(&compiled.id));
        assert_eq!(
            compiled.chain.last(),
            Some(&TypeId::ANY_TYPE),
            "{:?}",
            compiled.name
        );
        let mut seen = std::collections::HashSet::new();
        assert!(compiled.chain.iter().all(|id| seen.insert(*id)));
    }
}

#[test]
fn test_group_references_do_not_survive_compilation() {
    let schema = load(
        r#"<xs:group name="inner">
             <xs:sequence><xs:element name="x"/><xs:element name="y"/></xs:sequence>
           </xs:group>
           <xs:group name="outer">
             <xs:choice>
               <xs:group ref="t:inner"/>
               <xs:element name="z"/>
             </xs:choice>
           </xs:group>
           <xs:complexType name="holder">
             <xs:sequence>
               <xs:group ref="t:outer" maxOccurs="3"/>
             </xs:sequence>
           </xs:complexType>"#,
    )
    .unwrap();

    let holder = schema.type_by_name(&QName::new("urn:t", "holder")).unwrap();
    let content = holder.content.as_ref().unwrap();
    let names: Vec<&str> = content
        .all_elements
        .iter()
        .map(|n| n.local_name.as_str())
        .collect();
    assert_eq!(names, vec!["x", "y", "z"]);
    match &content.particles[0] {
        CompiledParticle::Group { occurs, .. } => assert_eq!(occurs.max, Some(3)),
        other => panic!("unexpected particle {:?}", other),
    }
}

fn restricted_pair(base_facet: &str, base: u32, derived_facet: &str, derived: u32) -> String {
    format!(
        r#"<xs:simpleType name="base">
             <xs:restriction base="xs:string"><xs:{} value="{}"/></xs:restriction>
           </xs:simpleType>
           <xs:simpleType name="derived">
             <xs:restriction base="t:base"><xs:{} value="{}"/></xs:restriction>
           </xs:simpleType>"#,
        base_facet, base, derived_facet, derived
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_range_facets_only_tighten(base in 0i64..500, derived in 0i64..500) {
        let body = format!(
            r#"<xs:simpleType name="base">
                 <xs:restriction base="xs:integer"><xs:maxInclusive value="{}"/></xs:restriction>
               </xs:simpleType>
               <xs:simpleType name="derived">
                 <xs:restriction base="t:base"><xs:maxInclusive value="{}"/></xs:restriction>
               </xs:simpleType>"#,
            base, derived
        );
        match load(&body) {
            Ok(_) => prop_assert!(derived <= base),
            Err(e) => {
                prop_assert!(derived > base);
                prop_assert!(e.has_kind(ErrorKind::InvalidFacet));
            }
        }
    }

    #[test]
    fn prop_length_facets_only_tighten(base in 1u32..50, derived in 1u32..50) {
        match load(&restricted_pair("maxLength", base, "maxLength", derived)) {
            Ok(_) => prop_assert!(derived <= base),
            Err(e) => {
                prop_assert!(derived > base);
                prop_assert!(e.has_kind(ErrorKind::InvalidFacet));
            }
        }
    }

    #[test]
    fn prop_choice_upa_ignores_order(
        (original, shuffled) in prop::collection::vec(
            prop::sample::select(vec![
                r#"<xs:element name="a"/>"#,
                r#"<xs:element name="b"/>"#,
                r#"<xs:element name="c" minOccurs="0"/>"#,
                r###"<xs:any namespace="##other"/>"###,
                r###"<xs:any namespace="##targetNamespace"/>"###,
                r###"<xs:any namespace="##local"/>"###,
                r#"<xs:sequence><xs:element name="a"/><xs:element name="d"/></xs:sequence>"#,
            ]),
            1..6,
        )
        .prop_flat_map(|particles| (Just(particles.clone()), Just(particles).prop_shuffle()))
    ) {
        let model = |particles: &[&str]| {
            format!(
                r#"<xs:complexType name="m"><xs:choice>{}</xs:choice></xs:complexType>"#,
                particles.concat()
            )
        };
        let first = load(&model(&original)).err().map(|e| e.kind());
        let second = load(&model(&shuffled)).err().map(|e| e.kind());
        prop_assert_eq!(first, second);
        if let Some(kind) = first {
            prop_assert_eq!(kind, Some(ErrorKind::UPAViolation));
        }
    }

    #[test]
    fn prop_xpath_round_trip(
        descendant in any::<bool>(),
        branches in prop::collection::vec(
            prop::collection::vec(
                prop_oneof![
                    Just("*".to_string()),
                    Just("p:*".to_string()),
                    "[a-z][a-z0-9]{0,4}",
                    "[a-z][a-z0-9]{0,4}".prop_map(|n| format!("p:{}", n)),
                    "[a-z][a-z0-9]{0,4}".prop_map(|n| format!("child::{}", n)),
                ],
                1..4,
            ),
            1..3,
        ),
        attribute in prop::option::of("[a-z][a-z0-9]{0,4}"),
    ) {
        let mut ns = NamespaceContext::new();
        ns.add_prefix("p", "urn:p");

        let branch_text = |steps: &Vec<String>| {
            let path = steps.join("/");
            if descendant { format!(".//{}", path) } else { path }
        };
        let selector: Vec<String> = branches.iter().map(branch_text).collect();
        let selector = selector.join("|");
        let parsed = RestrictedXPath::parse_selector(&selector, &ns).unwrap();
        prop_assert_eq!(parsed.to_string(), selector.clone());
        prop_assert_eq!(parsed.branches.len(), branches.len());

        let field = match &attribute {
            Some(name) => format!("{}/@{}", branch_text(&branches[0]), name),
            None => branch_text(&branches[0]),
        };
        let parsed = RestrictedXPath::parse_field(&field, &ns).unwrap();
        prop_assert_eq!(parsed.to_string(), field.clone());
        prop_assert_eq!(parsed.selects_attribute(), attribute.is_some());

        let spaced: Vec<String> = branches
            .iter()
            .map(|steps| {
                let path = steps.join(" / ");
                if descendant { format!(".// {}", path) } else { path }
            })
            .collect();
        let spaced = spaced.join(" | ");
        let parsed = RestrictedXPath::parse_selector(&spaced, &ns).unwrap();
        prop_assert_eq!(parsed.to_string(), selector);
    }
}
