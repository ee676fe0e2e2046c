//! Minimal instance generation
//!
//! Walks the particle tree of a root element and writes the smallest document the
//! structure allows: `min_occurs` copies of every particle, the first alternative of
//! every choice that has a finite instance, required attributes only. Leaf content is
//! either empty or the element's own name, with fixed and default values taking
//! precedence over the name.

use quick_xml::events::BytesStart;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, XsdError};
use crate::graph::{required_cycle, FiniteRanks, TypeGraph};
use crate::model::{
    AttributeDecl, AttributeUsage, Compositor, ElementDecl, ModelGroup, Particle, SchemaModel,
    TypeDecl, TypeId, TypeVariety,
};
use crate::synth::writer::DocumentWriter;
use crate::synth::SyntheticDocument;

/// Text written inside leaf elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LeafContent {
    #[default]
    Empty,
    /// The element's own local name
    TagName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceOptions {
    pub leaf_content: LeafContent,
    pub indent: usize,
    pub xml_declaration: bool,
    pub max_depth: usize,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            leaf_content: LeafContent::Empty,
            indent: 2,
            xml_declaration: true,
            max_depth: 32,
        }
    }
}

/// Generate a minimal instance rooted at the global element `root`
pub fn generate(model: &SchemaModel, root: &str, options: &InstanceOptions) -> Result<SyntheticDocument> {
    let element = model
        .element(root)
        .ok_or_else(|| XsdError::UnknownRoot(root.to_string()))?;

    let mut finite = FiniteRanks::default();
    if let Some(start) = element.type_ref.declared() {
        let graph = TypeGraph::build(model);
        if !graph.finite().is_finite(start) {
            let cycle = required_cycle(&graph, start).unwrap_or_else(|| vec![start]);
            let names: Vec<&str> = cycle
                .iter()
                .filter_map(|id| model.type_decl(*id))
                .map(TypeDecl::label)
                .collect();
            return Err(XsdError::synthesis(format!(
                "element '{}' has no finite instance: required content cycles through {}",
                root,
                names.join(", ")
            )));
        }
        finite = graph.finite().clone();
    }

    let mut generator = InstanceGenerator {
        model,
        options,
        finite,
        out: DocumentWriter::new(options.indent),
    };
    if options.xml_declaration {
        generator.out.declaration()?;
    }
    generator.element(element, 0, None)?;

    let document = generator.out.finish()?;
    debug!(root, elements = document.open_count(), "instance generated");
    Ok(document)
}

struct InstanceGenerator<'m> {
    model: &'m SchemaModel,
    options: &'m InstanceOptions,
    finite: FiniteRanks,
    out: DocumentWriter,
}

impl<'m> InstanceGenerator<'m> {
    fn element(&mut self, decl: &ElementDecl, depth: usize, inherited_ns: Option<&str>) -> Result<()> {
        if depth > self.options.max_depth {
            return Err(XsdError::synthesis(format!(
                "element '{}' is nested deeper than {} levels",
                decl.name, self.options.max_depth
            )));
        }

        let model = self.model;
        let namespace = if decl.qualified {
            model.target_namespace()
        } else {
            None
        };
        let ty = model.resolve_type(decl);

        let mut start = BytesStart::new(decl.name.as_str());
        if namespace != inherited_ns {
            start.push_attribute(("xmlns", namespace.unwrap_or("")));
        }
        if let Some(ty) = ty {
            for attr in ty.attributes.iter().filter(|a| a.usage == AttributeUsage::Required) {
                let value = attribute_value(model, attr);
                start.push_attribute((attr.name.as_str(), value.as_str()));
            }
        }

        match ty.filter(|t| t.has_element_content()) {
            Some(ty) => {
                self.out.open(start)?;
                if let Some(content) = &ty.content {
                    self.group(content, ty.id, depth, namespace)?;
                }
                self.out.close(&decl.name)
            }
            None => {
                let text_allowed = match ty {
                    Some(ty) => accepts_text(model, ty),
                    None => true,
                };
                match leaf_text(decl, self.options.leaf_content) {
                    Some(text) if text_allowed => {
                        self.out.open(start)?;
                        self.out.text(text)?;
                        self.out.close(&decl.name)
                    }
                    _ => self.out.empty(start),
                }
            }
        }
    }

    fn group(
        &mut self,
        group: &ModelGroup,
        owner: TypeId,
        depth: usize,
        namespace: Option<&str>,
    ) -> Result<()> {
        let taken: &[Particle] = match group.compositor {
            Compositor::Choice => {
                let chosen = self.finite.choice_alternative(group, owner);
                group.particles.get(chosen..=chosen).unwrap_or(&[])
            }
            Compositor::Sequence | Compositor::All => &group.particles,
        };
        for particle in taken {
            for _ in 0..particle.min_occurs() {
                match particle {
                    Particle::Element(p) => self.element(&p.element, depth + 1, namespace)?,
                    Particle::Group(g) => self.group(g, owner, depth, namespace)?,
                }
            }
        }
        Ok(())
    }
}

/// Tag-name leaf text: the element's fixed value, then its default, then its name
fn leaf_text(decl: &ElementDecl, leaf_content: LeafContent) -> Option<&str> {
    if leaf_content != LeafContent::TagName {
        return None;
    }
    decl.fixed
        .as_deref()
        .or(decl.default.as_deref())
        .or(Some(decl.name.as_str()))
}

/// Whether a type admits character content
fn accepts_text(model: &SchemaModel, ty: &TypeDecl) -> bool {
    match ty.variety {
        TypeVariety::Simple => true,
        TypeVariety::Complex if ty.mixed => true,
        TypeVariety::Complex => {
            ty.content.is_none()
                && builtin_base(model, ty).is_some_and(|base| base != "anyType")
        }
    }
}

/// Built-in type at the bottom of a derivation chain
fn builtin_base<'m>(model: &'m SchemaModel, ty: &'m TypeDecl) -> Option<&'m str> {
    let mut current = ty;
    for _ in 0..model.all_types().len() {
        let base = current.base_type_name.as_deref()?;
        match model.type_by_name(base) {
            Some(next) => current = next,
            None => return Some(base),
        }
    }
    None
}

/// Placeholder for a required attribute: fixed, default, first enumeration, then a
/// value of the built-in base type, else the attribute's own name
fn attribute_value(model: &SchemaModel, attr: &AttributeDecl) -> String {
    if let Some(fixed) = &attr.fixed {
        return fixed.clone();
    }
    if let Some(default) = &attr.default {
        return default.clone();
    }
    if let Some(first) = attr.enumerations.first() {
        return first.clone();
    }
    let builtin = match attr.type_id.and_then(|id| model.type_decl(id)) {
        Some(ty) => builtin_base(model, ty),
        None => Some(attr.type_name.as_str()),
    };
    builtin
        .and_then(builtin_placeholder)
        .map(str::to_string)
        .unwrap_or_else(|| attr.name.clone())
}

fn builtin_placeholder(type_name: &str) -> Option<&'static str> {
    let value = match type_name {
        "decimal" | "integer" | "nonNegativeInteger" | "nonPositiveInteger" | "long" | "int"
        | "short" | "byte" | "unsignedLong" | "unsignedInt" | "unsignedShort"
        | "unsignedByte" | "float" | "double" => "0",
        "positiveInteger" => "1",
        "negativeInteger" => "-1",
        "boolean" => "false",
        "date" => "1970-01-01",
        "dateTime" => "1970-01-01T00:00:00",
        "dateTimeStamp" => "1970-01-01T00:00:00Z",
        "time" => "00:00:00",
        "gYear" => "1970",
        "gYearMonth" => "1970-01",
        "gMonth" => "--01",
        "gMonthDay" => "--01-01",
        "gDay" => "---01",
        "duration" | "dayTimeDuration" => "P0D",
        "yearMonthDuration" => "P0M",
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load;
    use crate::synth::TagEvent;

    fn compact() -> InstanceOptions {
        InstanceOptions {
            indent: 0,
            xml_declaration: false,
            ..InstanceOptions::default()
        }
    }

    const INVOICE: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Invoice" type="InvoiceType"/>
  <xs:complexType name="InvoiceType">
    <xs:sequence><xs:element name="Total" type="xs:decimal"/></xs:sequence>
  </xs:complexType>
</xs:schema>"#;

    #[test]
    fn test_invoice_instance() {
        let model = load(INVOICE).unwrap();
        let doc = generate(&model, "Invoice", &compact()).unwrap();
        assert_eq!(doc.xml, "<Invoice><Total/></Invoice>");
        assert_eq!(doc.open_count(), 2);
        assert_eq!(doc.close_count(), 2);
    }

    #[test]
    fn test_tag_name_leaf_content() {
        let model = load(INVOICE).unwrap();
        let options = InstanceOptions {
            leaf_content: LeafContent::TagName,
            ..compact()
        };
        let doc = generate(&model, "Invoice", &options).unwrap();
        assert_eq!(doc.xml, "<Invoice><Total>Total</Total></Invoice>");
        assert!(doc.events.contains(&TagEvent::Text("Total".into())));
    }

    #[test]
    fn test_declaration_and_indent() {
        let model = load(INVOICE).unwrap();
        let doc = generate(&model, "Invoice", &InstanceOptions::default()).unwrap();
        assert!(doc.xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(doc.xml.contains("\n  <Total/>"));
    }

    #[test]
    fn test_occurrences_and_choices() {
        let model = load(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Batch">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Entry" type="xs:string" minOccurs="2" maxOccurs="5"/>
        <xs:element name="Note" type="xs:string" minOccurs="0"/>
        <xs:choice>
          <xs:element name="Card" type="xs:string"/>
          <xs:element name="Cash" type="xs:string"/>
        </xs:choice>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
        )
        .unwrap();
        let doc = generate(&model, "Batch", &compact()).unwrap();
        assert_eq!(doc.xml, "<Batch><Entry/><Entry/><Card/></Batch>");
    }

    #[test]
    fn test_required_attribute_placeholders() {
        let model = load(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="Currency">
    <xs:restriction base="xs:string">
      <xs:enumeration value="EUR"/>
      <xs:enumeration value="USD"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:element name="Amount">
    <xs:complexType>
      <xs:simpleContent>
        <xs:extension base="xs:decimal">
          <xs:attribute name="currency" type="Currency" use="required"/>
          <xs:attribute name="scale" type="xs:int" use="required"/>
          <xs:attribute name="version" type="xs:string" fixed="2.01" use="required"/>
          <xs:attribute name="label" type="xs:string" use="required"/>
          <xs:attribute name="note" type="xs:string"/>
        </xs:extension>
      </xs:simpleContent>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
        )
        .unwrap();
        let options = InstanceOptions {
            leaf_content: LeafContent::TagName,
            ..compact()
        };
        let doc = generate(&model, "Amount", &options).unwrap();
        assert_eq!(
            doc.xml,
            r#"<Amount currency="EUR" scale="0" version="2.01" label="label">Amount</Amount>"#
        );
    }

    #[test]
    fn test_target_namespace_declared_once() {
        let model = load(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:t="urn:test" targetNamespace="urn:test" elementFormDefault="qualified">
  <xs:element name="Root">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Child" type="xs:string"/>
        <xs:element name="Local" type="xs:string" form="unqualified"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
        )
        .unwrap();
        let doc = generate(&model, "Root", &compact()).unwrap();
        assert_eq!(
            doc.xml,
            r#"<Root xmlns="urn:test"><Child/><Local xmlns=""/></Root>"#
        );
    }

    #[test]
    fn test_required_cycle_rejected() {
        let model = load(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="A" type="AType"/>
  <xs:complexType name="AType">
    <xs:sequence><xs:element name="A" type="AType"/></xs:sequence>
  </xs:complexType>
</xs:schema>"#,
        )
        .unwrap();
        let err = generate(&model, "A", &compact()).unwrap_err();
        assert!(err.to_string().contains("no finite instance"));
    }

    #[test]
    fn test_optional_recursion_stops_at_minimum() {
        let model = load(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Comment" type="CommentType"/>
  <xs:complexType name="CommentType">
    <xs:sequence>
      <xs:element name="Text" type="xs:string"/>
      <xs:element name="Comment" type="CommentType" minOccurs="0"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#,
        )
        .unwrap();
        let doc = generate(&model, "Comment", &compact()).unwrap();
        assert_eq!(doc.xml, "<Comment><Text/></Comment>");
    }

    #[test]
    fn test_recursive_first_choice_alternative_skipped() {
        let model = load(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Expr" type="ExprType"/>
  <xs:complexType name="ExprType">
    <xs:choice>
      <xs:element name="Expr" type="ExprType"/>
      <xs:element name="Literal" type="xs:string"/>
    </xs:choice>
  </xs:complexType>
</xs:schema>"#,
        )
        .unwrap();
        let doc = generate(&model, "Expr", &compact()).unwrap();
        assert_eq!(doc.xml, "<Expr><Literal/></Expr>");
    }

    #[test]
    fn test_choice_through_finite_wrapper_terminates() {
        let model = load(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Node" type="NodeType"/>
  <xs:complexType name="NodeType">
    <xs:choice>
      <xs:element name="Wrap" type="WrapType"/>
      <xs:element name="Leaf" type="xs:string"/>
    </xs:choice>
  </xs:complexType>
  <xs:complexType name="WrapType">
    <xs:sequence><xs:element name="Node" type="NodeType"/></xs:sequence>
  </xs:complexType>
</xs:schema>"#,
        )
        .unwrap();
        let doc = generate(&model, "Node", &compact()).unwrap();
        assert_eq!(doc.xml, "<Node><Leaf/></Node>");
    }

    #[test]
    fn test_fixed_and_default_leaf_values() {
        let model = load(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Header">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Version" type="xs:string" fixed="2.01"/>
        <xs:element name="Currency" type="xs:string" default="EUR"/>
        <xs:element name="Name" type="xs:string"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
        )
        .unwrap();
        let options = InstanceOptions {
            leaf_content: LeafContent::TagName,
            ..compact()
        };
        let doc = generate(&model, "Header", &options).unwrap();
        assert_eq!(
            doc.xml,
            "<Header><Version>2.01</Version><Currency>EUR</Currency><Name>Name</Name></Header>"
        );

        let doc = generate(&model, "Header", &compact()).unwrap();
        assert_eq!(doc.xml, "<Header><Version/><Currency/><Name/></Header>");
    }

    #[test]
    fn test_depth_limit() {
        let model = load(INVOICE).unwrap();
        let options = InstanceOptions {
            max_depth: 0,
            ..compact()
        };
        let err = generate(&model, "Invoice", &options).unwrap_err();
        assert!(matches!(err, XsdError::Synthesis(_)));
    }

    #[test]
    fn test_unknown_root() {
        let model = load(INVOICE).unwrap();
        assert!(matches!(
            generate(&model, "Nope", &compact()),
            Err(XsdError::UnknownRoot(_))
        ));
    }
}
