//! Schema facility capability
//!
//! The renderer and the semantic synthesizer only ever talk to a schema through
//! this trait, so the concrete parsing backend can change without touching them.
//! [`SchemaModel`] is the implementation the crate ships.

use crate::error::Result;
use crate::instance::{self, InstanceOptions};
use crate::model::{ElementDecl, KeyrefDecl, SchemaModel, TypeDecl};
use crate::synth::SyntheticDocument;

/// Read access to a loaded schema plus instance generation
pub trait SchemaFacility {
    /// Root element declarations, in declaration order
    fn resolve_root_elements(&self) -> Vec<&ElementDecl>;

    /// Global element by name
    fn resolve_element(&self, name: &str) -> Option<&ElementDecl>;

    /// Declared type of an element; `None` when it is a built-in
    fn resolve_element_type(&self, element: &ElementDecl) -> Option<&TypeDecl>;

    /// Child element declarations of a type, in document order
    fn resolve_content_elements<'a>(&'a self, ty: &'a TypeDecl) -> Vec<&'a ElementDecl>;

    /// Every (element, keyref) binding, elements in declaration order
    fn resolve_keyrefs(&self) -> Vec<(&ElementDecl, &KeyrefDecl)>;

    /// Build a minimal document instance rooted at `root`
    fn generate_instance(&self, root: &str, options: &InstanceOptions) -> Result<SyntheticDocument>;
}

impl SchemaFacility for SchemaModel {
    fn resolve_root_elements(&self) -> Vec<&ElementDecl> {
        self.root_element_names()
            .iter()
            .filter_map(|name| self.element(name))
            .collect()
    }

    fn resolve_element(&self, name: &str) -> Option<&ElementDecl> {
        self.element(name)
    }

    fn resolve_element_type(&self, element: &ElementDecl) -> Option<&TypeDecl> {
        self.resolve_type(element)
    }

    fn resolve_content_elements<'a>(&'a self, ty: &'a TypeDecl) -> Vec<&'a ElementDecl> {
        ty.content_elements()
    }

    fn resolve_keyrefs(&self) -> Vec<(&ElementDecl, &KeyrefDecl)> {
        self.elements()
            .flat_map(|element| element.keyrefs.iter().map(move |keyref| (element, keyref)))
            .collect()
    }

    fn generate_instance(&self, root: &str, options: &InstanceOptions) -> Result<SyntheticDocument> {
        instance::generate(self, root, options)
    }
}
