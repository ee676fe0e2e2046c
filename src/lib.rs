//! XSD Synth
//!
//! Reads an XML Schema (XSD) document and derives two artifacts from it: a
//! human-readable description of its element/type structure, and a synthesized
//! XML document.
//!
//! ## Features
//!
//! - **Schema Model**: XSD text normalized into elements, types, attributes and keyrefs
//! - **Element Trees**: indented descriptions that stay finite on recursive schemas
//! - **Keyref Listing**: every key-reference constraint, by declaring element
//! - **Semantic Synthesis**: minimal instance documents that follow the content model
//! - **Lexical Echo**: the schema document's own tag skeleton, re-emitted as a document
//!
//! ## Pipeline
//!
//! ```text
//! schema text ──> loader::load ──> SchemaModel ──┬──> render   ──> Description
//!      │                                         └──> synth (semantic)
//!      └──────────────────────────────────────────────> synth (lexical echo)
//! ```
//!
//! ## Example
//!
//! ```
//! use xsd_synth::{load, render_element_tree, RenderConfig};
//!
//! let model = load(r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
//!   <xs:element name="Invoice" type="InvoiceType"/>
//!   <xs:complexType name="InvoiceType">
//!     <xs:sequence><xs:element name="Total" type="xs:decimal"/></xs:sequence>
//!   </xs:complexType>
//! </xs:schema>"#).unwrap();
//!
//! let tree = render_element_tree(&model, "Invoice", &RenderConfig::default()).unwrap();
//! assert_eq!(tree, "- Invoice (Type: InvoiceType)\n  - Total (Type: decimal)");
//! ```

pub mod checksum;
pub mod config;
pub mod error;
pub mod facility;
pub mod graph;
pub mod instance;
pub mod loader;
pub mod model;
pub mod render;
pub mod source;
pub mod synth;

pub use checksum::Checksum;
pub use config::{Preset, RenderConfig, SynthConfig, SynthesisConfig};
pub use error::{Result, XsdError};
pub use facility::SchemaFacility;
pub use instance::{InstanceOptions, LeafContent};
pub use loader::load;
pub use model::{AttributeDecl, ElementDecl, KeyrefDecl, SchemaModel, TypeDecl, TypeId, TypeRef};
pub use render::{render_description, render_element_tree, render_keyrefs, Description};
pub use source::SchemaSource;
pub use synth::{
    synthesize, synthesize_from_model, synthesize_from_tags, Strategy, SynthesisInput,
    SyntheticDocument, TagEvent,
};
