//! Schema Model
//!
//! The normalized, immutable view of one XSD document. Everything downstream
//! (renderer, instance generator, type graph) reads this shape and never the
//! parser's own node tree.
//!
//! Types live in an arena addressed by [`TypeId`] so anonymous types, which have
//! no name to key on, can be referenced the same way named ones are.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;

/// Label used for types that have no name
pub const ANONYMOUS_TYPE_LABEL: &str = "anonymous";

/// Index into the model's type arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub(crate) usize);

/// What an element's type resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "lowercase")]
pub enum TypeRef {
    /// XSD built-in type, by local name (`decimal`, `string`, `anyType`, ...)
    Builtin(String),
    /// Named or anonymous type declared in the schema
    Declared(TypeId),
}

impl TypeRef {
    pub fn declared(&self) -> Option<TypeId> {
        match self {
            TypeRef::Declared(id) => Some(*id),
            TypeRef::Builtin(_) => None,
        }
    }
}

/// Key-reference constraint declared on an element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyrefDecl {
    pub name: String,
    pub referenced_key_name: String,
}

/// One element declaration (global, local, or a resolved `ref`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementDecl {
    pub name: String,
    /// Local type name, `None` for anonymous types
    pub type_name: Option<String>,
    pub type_ref: TypeRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyrefs: Vec<KeyrefDecl>,
    /// Whether the element name is namespace-qualified in instances
    pub qualified: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nillable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed: Option<String>,
}

impl ElementDecl {
    /// Type name as shown in descriptions
    pub fn type_label(&self) -> &str {
        self.type_name.as_deref().unwrap_or(ANONYMOUS_TYPE_LABEL)
    }
}

/// Upper occurrence bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

impl Default for MaxOccurs {
    fn default() -> Self {
        MaxOccurs::Bounded(1)
    }
}

/// Element occurrence inside a content model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementParticle {
    pub element: ElementDecl,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
}

/// Content model node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Particle {
    Element(ElementParticle),
    Group(ModelGroup),
}

impl Particle {
    pub fn min_occurs(&self) -> u32 {
        match self {
            Particle::Element(e) => e.min_occurs,
            Particle::Group(g) => g.min_occurs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compositor {
    Sequence,
    Choice,
    All,
}

/// `sequence`, `choice` or `all` group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelGroup {
    pub compositor: Compositor,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    pub particles: Vec<Particle>,
}

impl ModelGroup {
    pub(crate) fn sequence(particles: Vec<Particle>) -> Self {
        Self {
            compositor: Compositor::Sequence,
            min_occurs: 1,
            max_occurs: MaxOccurs::Bounded(1),
            particles,
        }
    }

    /// All element particles in document order, descending into nested groups
    pub fn element_particles(&self) -> Vec<&ElementParticle> {
        let mut out = Vec::new();
        collect_element_particles(self, &mut out);
        out
    }
}

fn collect_element_particles<'a>(group: &'a ModelGroup, out: &mut Vec<&'a ElementParticle>) {
    for particle in &group.particles {
        match particle {
            Particle::Element(e) => out.push(e),
            Particle::Group(g) => collect_element_particles(g, out),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeVariety {
    Simple,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Derivation {
    Extension,
    Restriction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeUsage {
    #[default]
    Optional,
    Required,
    Prohibited,
}

/// Attribute declaration (global) or attribute use (inside a type)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDecl {
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub usage: AttributeUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed: Option<String>,
    /// Enumeration facet of an inline or named simple type, if any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enumerations: Vec<String>,
    #[serde(skip)]
    pub(crate) type_id: Option<TypeId>,
}

/// Named or anonymous type definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDecl {
    pub id: TypeId,
    /// `None` for anonymous types
    pub name: Option<String>,
    pub variety: TypeVariety,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivation: Option<Derivation>,
    /// Element content; `None` for simple types and empty/simple content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ModelGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeDecl>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub mixed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enumerations: Vec<String>,
}

impl TypeDecl {
    pub(crate) fn placeholder(id: TypeId, name: Option<String>, variety: TypeVariety) -> Self {
        Self {
            id,
            name,
            variety,
            base_type_name: None,
            derivation: None,
            content: None,
            attributes: Vec::new(),
            mixed: false,
            enumerations: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(ANONYMOUS_TYPE_LABEL)
    }

    /// Child element declarations in document order, nested groups flattened
    pub fn content_elements(&self) -> Vec<&ElementDecl> {
        self.content
            .as_ref()
            .map(|g| g.element_particles().into_iter().map(|p| &p.element).collect())
            .unwrap_or_default()
    }

    pub fn has_element_content(&self) -> bool {
        self.content
            .as_ref()
            .map(|g| !g.element_particles().is_empty())
            .unwrap_or(false)
    }
}

/// Parsed representation of one XSD document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaModel {
    pub(crate) target_namespace: Option<String>,
    pub(crate) element_form_qualified: bool,
    pub(crate) source_checksum: Checksum,
    pub(crate) root_element_names: Vec<String>,
    pub(crate) elements_by_name: IndexMap<String, ElementDecl>,
    pub(crate) types: Vec<TypeDecl>,
    pub(crate) types_by_name: IndexMap<String, TypeId>,
    pub(crate) attributes_by_name: IndexMap<String, AttributeDecl>,
}

impl SchemaModel {
    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    /// SHA-256 of the schema text this model was loaded from
    pub fn source_checksum(&self) -> &Checksum {
        &self.source_checksum
    }

    /// Global elements not referenced from any content model, in declaration order
    pub fn root_element_names(&self) -> &[String] {
        &self.root_element_names
    }

    pub fn element(&self, name: &str) -> Option<&ElementDecl> {
        self.elements_by_name.get(name)
    }

    /// Global elements in declaration order
    pub fn elements(&self) -> impl Iterator<Item = &ElementDecl> {
        self.elements_by_name.values()
    }

    pub fn element_count(&self) -> usize {
        self.elements_by_name.len()
    }

    pub fn type_decl(&self, id: TypeId) -> Option<&TypeDecl> {
        self.types.get(id.0)
    }

    pub fn type_by_name(&self, name: &str) -> Option<&TypeDecl> {
        self.types_by_name.get(name).and_then(|id| self.type_decl(*id))
    }

    /// Every type, anonymous ones included
    pub fn all_types(&self) -> &[TypeDecl] {
        &self.types
    }

    /// Declared type behind an element, `None` for built-ins
    pub fn resolve_type(&self, element: &ElementDecl) -> Option<&TypeDecl> {
        element.type_ref.declared().and_then(|id| self.type_decl(id))
    }
}
