//! Document Synthesizer
//!
//! Two interchangeable ways to produce an XML document from a schema:
//!
//! - [`Strategy::Semantic`] asks the schema facility for a minimal instance of a
//!   root element, conforming to the schema's structure.
//! - [`Strategy::LexicalEcho`] ignores the model and re-emits the schema text's
//!   own tag skeleton.
//!
//! Given the same schema the two outputs are unrelated documents; neither is a
//! fallback for the other inside [`synthesize`].

mod echo;
pub(crate) mod writer;

pub use echo::synthesize_from_tags;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::config::SynthesisConfig;
use crate::error::{Result, XsdError};
use crate::facility::SchemaFacility;
use crate::instance::InstanceOptions;

/// Synthesis strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Minimal schema-conformant instance
    #[default]
    Semantic,
    /// Echo of the schema document's tag structure
    LexicalEcho,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Semantic => write!(f, "semantic"),
            Strategy::LexicalEcho => write!(f, "lexical-echo"),
        }
    }
}

/// One step of document construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "value", rename_all = "lowercase")]
pub enum TagEvent {
    Open(String),
    Text(String),
    Close(String),
}

/// Generated XML plus the tag events that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticDocument {
    pub xml: String,
    pub events: Vec<TagEvent>,
}

impl SyntheticDocument {
    pub fn open_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, TagEvent::Open(_)))
            .count()
    }

    pub fn close_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, TagEvent::Close(_)))
            .count()
    }

    /// Name of the first element opened
    pub fn root_name(&self) -> Option<&str> {
        self.events.iter().find_map(|e| match e {
            TagEvent::Open(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// What a synthesis call may draw on
///
/// The semantic strategy needs `model`; the lexical echo needs `raw_text`.
#[derive(Clone, Copy, Default)]
pub struct SynthesisInput<'a> {
    pub model: Option<&'a dyn SchemaFacility>,
    pub raw_text: Option<&'a str>,
}

impl<'a> SynthesisInput<'a> {
    pub fn new(model: &'a dyn SchemaFacility, raw_text: &'a str) -> Self {
        Self {
            model: Some(model),
            raw_text: Some(raw_text),
        }
    }
}

/// Produce a document with the chosen strategy
pub fn synthesize(
    input: SynthesisInput<'_>,
    strategy: Strategy,
    config: &SynthesisConfig,
) -> Result<SyntheticDocument> {
    let document = match strategy {
        Strategy::Semantic => {
            let model = input.model.ok_or_else(|| {
                XsdError::synthesis("semantic synthesis needs a loaded schema model")
            })?;
            synthesize_from_model(model, config.root.as_deref(), &config.instance_options())?
        }
        Strategy::LexicalEcho => {
            let text = input.raw_text.ok_or_else(|| {
                XsdError::synthesis("lexical echo needs the raw schema text")
            })?;
            synthesize_from_tags(text)?
        }
    };
    info!(
        strategy = %strategy,
        bytes = document.xml.len(),
        elements = document.open_count(),
        "document synthesized"
    );
    Ok(document)
}

/// Minimal instance of `root`, or of the first declared root element
pub fn synthesize_from_model<F: SchemaFacility + ?Sized>(
    facility: &F,
    root: Option<&str>,
    options: &InstanceOptions,
) -> Result<SyntheticDocument> {
    let root_name = match root {
        Some(name) => facility
            .resolve_element(name)
            .map(|e| e.name.clone())
            .ok_or_else(|| XsdError::UnknownRoot(name.to_string()))?,
        None => facility
            .resolve_root_elements()
            .first()
            .map(|e| e.name.clone())
            .ok_or_else(|| XsdError::synthesis("schema declares no root element"))?,
    };
    facility.generate_instance(&root_name, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load;

    const INVOICE: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Invoice" type="InvoiceType"/>
  <xs:complexType name="InvoiceType">
    <xs:sequence><xs:element name="Total" type="xs:decimal"/></xs:sequence>
  </xs:complexType>
</xs:schema>"#;

    #[test]
    fn test_strategies_produce_different_documents() {
        let model = load(INVOICE).unwrap();
        let config = SynthesisConfig::default();
        let input = SynthesisInput::new(&model, INVOICE);

        let semantic = synthesize(input, Strategy::Semantic, &config).unwrap();
        let echo = synthesize(input, Strategy::LexicalEcho, &config).unwrap();

        assert_eq!(semantic.root_name(), Some("Invoice"));
        assert_eq!(echo.root_name(), Some("schema"));
        assert_ne!(semantic.xml, echo.xml);
    }

    #[test]
    fn test_semantic_without_model_fails() {
        let input = SynthesisInput {
            model: None,
            raw_text: Some(INVOICE),
        };
        let err = synthesize(input, Strategy::Semantic, &SynthesisConfig::default()).unwrap_err();
        assert!(matches!(err, XsdError::Synthesis(_)));
    }

    #[test]
    fn test_echo_works_without_model() {
        let input = SynthesisInput {
            model: None,
            raw_text: Some("<a><b/></a>"),
        };
        let doc = synthesize(input, Strategy::LexicalEcho, &SynthesisConfig::default()).unwrap();
        assert_eq!(doc.open_count(), 2);
        assert_eq!(doc.close_count(), 2);
    }

    #[test]
    fn test_unknown_root_rejected() {
        let model = load(INVOICE).unwrap();
        let err = synthesize_from_model(&model, Some("Receipt"), &InstanceOptions::default())
            .unwrap_err();
        assert!(matches!(err, XsdError::UnknownRoot(name) if name == "Receipt"));
    }

    #[test]
    fn test_strategy_parses_from_config_text() {
        let config: SynthesisConfig = toml::from_str("strategy = \"lexical-echo\"").unwrap();
        assert_eq!(config.strategy, Strategy::LexicalEcho);
    }
}
