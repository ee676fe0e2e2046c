//! Schema Model Loader
//!
//! Parses XSD text with roxmltree and normalizes the document into a
//! [`SchemaModel`]. Loading runs in passes:
//!
//! 1. register every global component by name (types get arena slots up front)
//! 2. declare global attributes and global elements
//! 3. build type bodies (content models, attributes, facets)
//! 4. apply derivations (extension content/attributes, inherited facets)
//! 5. check identity constraints and pick root elements
//!
//! Any structural problem aborts the whole load; no partial model escapes.

use indexmap::IndexMap;
use roxmltree::{Document, Node, NodeId, ParsingOptions};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::checksum::Checksum;
use crate::error::{Result, XsdError};
use crate::model::{
    AttributeDecl, AttributeUsage, Compositor, Derivation, ElementDecl, ElementParticle,
    KeyrefDecl, MaxOccurs, ModelGroup, Particle, SchemaModel, TypeDecl, TypeId, TypeRef,
    TypeVariety, ANONYMOUS_TYPE_LABEL,
};

/// XML Schema namespace
pub const XS_NS: &str = "http://www.w3.org/2001/XMLSchema";

/// Namespace bound to the reserved `xml` prefix
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Built-in datatypes of XML Schema 1.0/1.1, by local name
const BUILTIN_TYPES: &[&str] = &[
    "anyType", "anySimpleType", "anyAtomicType",
    "string", "normalizedString", "token", "language", "Name", "NCName", "NMTOKEN",
    "NMTOKENS", "ID", "IDREF", "IDREFS", "ENTITY", "ENTITIES", "QName", "NOTATION",
    "anyURI", "boolean", "base64Binary", "hexBinary",
    "decimal", "integer", "nonPositiveInteger", "negativeInteger", "long", "int", "short",
    "byte", "nonNegativeInteger", "positiveInteger", "unsignedLong", "unsignedInt",
    "unsignedShort", "unsignedByte", "float", "double",
    "duration", "dayTimeDuration", "yearMonthDuration", "dateTime", "dateTimeStamp", "time",
    "date", "gYearMonth", "gYear", "gMonthDay", "gDay", "gMonth",
];

/// Returns true if `local_name` names an XSD built-in datatype
pub fn is_builtin_type(local_name: &str) -> bool {
    BUILTIN_TYPES.contains(&local_name)
}

/// Parse schema text into a [`SchemaModel`]
pub fn load(schema_text: &str) -> Result<SchemaModel> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(schema_text, options)?;
    let root = doc.root_element();

    if root.tag_name().name() != "schema" || root.tag_name().namespace() != Some(XS_NS) {
        return Err(XsdError::parse(format!(
            "root element must be xs:schema, found '{}'",
            root.tag_name().name()
        )));
    }

    let mut loader = Loader::new(root);
    loader.register_globals()?;
    loader.declare_global_attributes()?;
    loader.declare_global_elements()?;
    loader.build_pending_bodies()?;
    loader.apply_derivations()?;
    loader.check_keyrefs()?;

    let model = loader.finish(Checksum::from_text(schema_text));
    info!(
        roots = model.root_element_names.len(),
        elements = model.elements_by_name.len(),
        types = model.types.len(),
        attributes = model.attributes_by_name.len(),
        checksum = model.source_checksum.short(),
        "schema loaded"
    );
    Ok(model)
}

// =============================================================================
// Node helpers
// =============================================================================

/// XSD children of a node, annotations skipped
fn xs_children<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|c| {
        c.is_element()
            && c.tag_name().namespace() == Some(XS_NS)
            && c.tag_name().name() != "annotation"
    })
}

fn position(node: Node) -> String {
    let pos = node.document().text_pos_at(node.range().start);
    format!("{}:{}", pos.row, pos.col)
}

fn is_true(value: Option<&str>) -> bool {
    matches!(value, Some("true") | Some("1"))
}

fn required_name(node: Node) -> Result<String> {
    node.attribute("name").map(str::to_string).ok_or_else(|| {
        XsdError::parse(format!(
            "xs:{} at {} is missing a name",
            node.tag_name().name(),
            position(node)
        ))
    })
}

fn occurs(node: Node) -> Result<(u32, MaxOccurs)> {
    let min = match node.attribute("minOccurs") {
        Some(v) => v.trim().parse::<u32>().map_err(|_| {
            XsdError::parse(format!("invalid minOccurs '{}' at {}", v, position(node)))
        })?,
        None => 1,
    };
    let max = match node.attribute("maxOccurs").map(str::trim) {
        Some("unbounded") => MaxOccurs::Unbounded,
        Some(v) => MaxOccurs::Bounded(v.parse::<u32>().map_err(|_| {
            XsdError::parse(format!("invalid maxOccurs '{}' at {}", v, position(node)))
        })?),
        None => MaxOccurs::Bounded(1),
    };
    if let MaxOccurs::Bounded(max) = max {
        if max < min {
            return Err(XsdError::parse(format!(
                "maxOccurs {} is below minOccurs {} at {}",
                max,
                min,
                position(node)
            )));
        }
    }
    Ok((min, max))
}

// =============================================================================
// Loader
// =============================================================================

struct Loader<'a, 'input> {
    schema: Node<'a, 'input>,
    target_namespace: Option<String>,
    element_form_qualified: bool,

    element_nodes: IndexMap<String, Node<'a, 'input>>,
    attribute_nodes: IndexMap<String, Node<'a, 'input>>,
    group_nodes: HashMap<String, Node<'a, 'input>>,
    attribute_group_nodes: HashMap<String, Node<'a, 'input>>,

    types: Vec<TypeDecl>,
    types_by_name: IndexMap<String, TypeId>,
    anonymous_types: HashMap<NodeId, TypeId>,
    pending_bodies: Vec<(TypeId, Node<'a, 'input>)>,
    bases: HashMap<TypeId, TypeId>,

    elements_by_name: IndexMap<String, ElementDecl>,
    attributes_by_name: IndexMap<String, AttributeDecl>,

    referenced_elements: HashSet<String>,
    identity_keys: HashSet<String>,
    keyref_checks: Vec<(String, KeyrefDecl)>,
    group_stack: Vec<String>,
    attribute_group_stack: Vec<String>,
}

impl<'a, 'input> Loader<'a, 'input> {
    fn new(schema: Node<'a, 'input>) -> Self {
        Self {
            schema,
            target_namespace: schema.attribute("targetNamespace").map(str::to_string),
            element_form_qualified: schema.attribute("elementFormDefault") == Some("qualified"),
            element_nodes: IndexMap::new(),
            attribute_nodes: IndexMap::new(),
            group_nodes: HashMap::new(),
            attribute_group_nodes: HashMap::new(),
            types: Vec::new(),
            types_by_name: IndexMap::new(),
            anonymous_types: HashMap::new(),
            pending_bodies: Vec::new(),
            bases: HashMap::new(),
            elements_by_name: IndexMap::new(),
            attributes_by_name: IndexMap::new(),
            referenced_elements: HashSet::new(),
            identity_keys: HashSet::new(),
            keyref_checks: Vec::new(),
            group_stack: Vec::new(),
            attribute_group_stack: Vec::new(),
        }
    }

    fn alloc_type(&mut self, name: Option<String>, variety: TypeVariety) -> TypeId {
        let id = TypeId(self.types.len());
        self.types.push(TypeDecl::placeholder(id, name, variety));
        id
    }

    // ---------------------------------------------------------------------
    // Pass 1: registration
    // ---------------------------------------------------------------------

    fn register_globals(&mut self) -> Result<()> {
        for child in xs_children(self.schema) {
            let kind = child.tag_name().name();
            match kind {
                "element" => {
                    let name = required_name(child)?;
                    if self.element_nodes.insert(name.clone(), child).is_some() {
                        return Err(duplicate("element", &name, child));
                    }
                }
                "complexType" | "simpleType" => {
                    let name = required_name(child)?;
                    if self.types_by_name.contains_key(&name) {
                        return Err(duplicate("type", &name, child));
                    }
                    let variety = if kind == "complexType" {
                        TypeVariety::Complex
                    } else {
                        TypeVariety::Simple
                    };
                    let id = self.alloc_type(Some(name.clone()), variety);
                    self.types_by_name.insert(name, id);
                    self.pending_bodies.push((id, child));
                }
                "attribute" => {
                    let name = required_name(child)?;
                    if self.attribute_nodes.insert(name.clone(), child).is_some() {
                        return Err(duplicate("attribute", &name, child));
                    }
                }
                "group" => {
                    let name = required_name(child)?;
                    if self.group_nodes.insert(name.clone(), child).is_some() {
                        return Err(duplicate("group", &name, child));
                    }
                }
                "attributeGroup" => {
                    let name = required_name(child)?;
                    if self.attribute_group_nodes.insert(name.clone(), child).is_some() {
                        return Err(duplicate("attributeGroup", &name, child));
                    }
                }
                "include" | "import" | "redefine" | "override" => {
                    warn!(
                        directive = kind,
                        location = child.attribute("schemaLocation").unwrap_or(""),
                        "schema composition is not followed"
                    );
                }
                _ => {}
            }
        }
        debug!(
            elements = self.element_nodes.len(),
            types = self.types_by_name.len(),
            groups = self.group_nodes.len(),
            "registered global components"
        );
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Pass 2: global declarations
    // ---------------------------------------------------------------------

    fn declare_global_attributes(&mut self) -> Result<()> {
        let nodes: Vec<_> = self.attribute_nodes.iter().map(|(n, node)| (n.clone(), *node)).collect();
        for (name, node) in nodes {
            let decl = self.attribute_decl(node)?;
            self.attributes_by_name.insert(name, decl);
        }
        Ok(())
    }

    fn declare_global_elements(&mut self) -> Result<()> {
        let nodes: Vec<_> = self.element_nodes.iter().map(|(n, node)| (n.clone(), *node)).collect();
        for (name, node) in nodes {
            let (type_name, type_ref) = match node.attribute("type") {
                Some(qname) => self.resolve_element_type(node, qname, &name)?,
                None => match xs_children(node)
                    .find(|c| matches!(c.tag_name().name(), "complexType" | "simpleType"))
                {
                    // Bodies of global inline types wait until every global element is declared
                    Some(inline) => {
                        let variety = if inline.tag_name().name() == "complexType" {
                            TypeVariety::Complex
                        } else {
                            TypeVariety::Simple
                        };
                        let id = self.alloc_type(None, variety);
                        self.anonymous_types.insert(inline.id(), id);
                        self.pending_bodies.push((id, inline));
                        (None, TypeRef::Declared(id))
                    }
                    None => any_type(),
                },
            };
            let keyrefs = self.identity_constraints(node, &name)?;
            let decl = ElementDecl {
                name: name.clone(),
                type_name,
                type_ref,
                keyrefs,
                qualified: true,
                nillable: is_true(node.attribute("nillable")),
                default: node.attribute("default").map(str::to_string),
                fixed: node.attribute("fixed").map(str::to_string),
            };
            self.elements_by_name.insert(name, decl);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Pass 3: type bodies
    // ---------------------------------------------------------------------

    fn build_pending_bodies(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending_bodies);
        for (id, node) in pending {
            self.build_type(id, node)?;
        }
        Ok(())
    }

    fn build_type(&mut self, id: TypeId, node: Node<'a, 'input>) -> Result<()> {
        // An element boundary breaks group recursion
        let saved_groups = std::mem::take(&mut self.group_stack);
        let mut decl = self.types[id.0].clone();
        match node.tag_name().name() {
            "complexType" => self.build_complex(&mut decl, node)?,
            _ => self.build_simple(&mut decl, node)?,
        }
        self.types[id.0] = decl;
        self.group_stack = saved_groups;
        Ok(())
    }

    /// Arena slot for an inline type definition, built on first sight
    fn anonymous_type(&mut self, node: Node<'a, 'input>) -> Result<TypeId> {
        if let Some(id) = self.anonymous_types.get(&node.id()) {
            return Ok(*id);
        }
        let variety = if node.tag_name().name() == "complexType" {
            TypeVariety::Complex
        } else {
            TypeVariety::Simple
        };
        let id = self.alloc_type(None, variety);
        self.anonymous_types.insert(node.id(), id);
        self.build_type(id, node)?;
        Ok(id)
    }

    fn build_complex(&mut self, decl: &mut TypeDecl, node: Node<'a, 'input>) -> Result<()> {
        decl.mixed = is_true(node.attribute("mixed"));
        let owner = decl.label().to_string();

        for child in xs_children(node) {
            let kind = child.tag_name().name();
            if kind != "complexContent" && kind != "simpleContent" {
                continue;
            }
            if is_true(child.attribute("mixed")) {
                decl.mixed = true;
            }
            let derived = xs_children(child)
                .find(|c| matches!(c.tag_name().name(), "extension" | "restriction"))
                .ok_or_else(|| {
                    XsdError::parse(format!(
                        "xs:{} at {} has neither extension nor restriction",
                        kind,
                        position(child)
                    ))
                })?;
            decl.derivation = Some(if derived.tag_name().name() == "extension" {
                Derivation::Extension
            } else {
                Derivation::Restriction
            });
            if let Some(base) = derived.attribute("base") {
                let (base_name, base_ref) = self.resolve_type_qname(derived, base, &owner)?;
                decl.base_type_name = Some(base_name);
                if let TypeRef::Declared(base_id) = base_ref {
                    self.bases.insert(decl.id, base_id);
                }
            }
            self.read_content(decl, derived)?;
        }

        self.read_content(decl, node)
    }

    fn read_content(&mut self, decl: &mut TypeDecl, node: Node<'a, 'input>) -> Result<()> {
        for child in xs_children(node) {
            match child.tag_name().name() {
                "sequence" | "choice" | "all" => decl.content = Some(self.model_group(child)?),
                "group" => decl.content = Some(self.group_ref(child)?),
                "attribute" => {
                    let attr = self.attribute_decl(child)?;
                    decl.attributes.push(attr);
                }
                "attributeGroup" => {
                    let attrs = self.attribute_group_ref(child)?;
                    decl.attributes.extend(attrs);
                }
                "enumeration" => {
                    if let Some(value) = child.attribute("value") {
                        decl.enumerations.push(value.to_string());
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn build_simple(&mut self, decl: &mut TypeDecl, node: Node<'a, 'input>) -> Result<()> {
        let owner = decl.label().to_string();
        for child in xs_children(node) {
            match child.tag_name().name() {
                "restriction" => {
                    decl.derivation = Some(Derivation::Restriction);
                    if let Some(base) = child.attribute("base") {
                        let (base_name, base_ref) = self.resolve_type_qname(child, base, &owner)?;
                        decl.base_type_name = Some(base_name);
                        if let TypeRef::Declared(base_id) = base_ref {
                            self.bases.insert(decl.id, base_id);
                        }
                    } else if let Some(inline) =
                        xs_children(child).find(|c| c.tag_name().name() == "simpleType")
                    {
                        let base_id = self.anonymous_type(inline)?;
                        self.bases.insert(decl.id, base_id);
                    }
                    decl.enumerations.extend(
                        xs_children(child)
                            .filter(|c| c.tag_name().name() == "enumeration")
                            .filter_map(|c| c.attribute("value"))
                            .map(str::to_string),
                    );
                }
                "list" => {
                    if let Some(item) = child.attribute("itemType") {
                        let (item_name, _) = self.resolve_type_qname(child, item, &owner)?;
                        decl.base_type_name = Some(item_name);
                    } else if let Some(inline) =
                        xs_children(child).find(|c| c.tag_name().name() == "simpleType")
                    {
                        self.anonymous_type(inline)?;
                    }
                }
                "union" => {
                    if let Some(members) = child.attribute("memberTypes") {
                        for member in members.split_whitespace() {
                            self.resolve_type_qname(child, member, &owner)?;
                        }
                    }
                    for inline in xs_children(child).filter(|c| c.tag_name().name() == "simpleType") {
                        self.anonymous_type(inline)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Content models
    // ---------------------------------------------------------------------

    fn model_group(&mut self, node: Node<'a, 'input>) -> Result<ModelGroup> {
        let compositor = match node.tag_name().name() {
            "choice" => Compositor::Choice,
            "all" => Compositor::All,
            _ => Compositor::Sequence,
        };
        let (min_occurs, max_occurs) = occurs(node)?;
        let mut particles = Vec::new();

        for child in xs_children(node) {
            match child.tag_name().name() {
                "element" => particles.push(Particle::Element(self.element_particle(child)?)),
                "sequence" | "choice" | "all" => {
                    particles.push(Particle::Group(self.model_group(child)?))
                }
                "group" => particles.push(Particle::Group(self.group_ref(child)?)),
                "any" => debug!(at = %position(child), "wildcard particle skipped"),
                _ => {}
            }
        }

        Ok(ModelGroup {
            compositor,
            min_occurs,
            max_occurs,
            particles,
        })
    }

    fn group_ref(&mut self, node: Node<'a, 'input>) -> Result<ModelGroup> {
        let qname = node.attribute("ref").ok_or_else(|| {
            XsdError::parse(format!("local xs:group at {} has no ref", position(node)))
        })?;
        let name = self.resolve_component_name(node, qname, "group")?;
        let definition = *self.group_nodes.get(&name).ok_or_else(|| {
            XsdError::parse(format!("undefined group '{}' at {}", qname, position(node)))
        })?;
        if self.group_stack.contains(&name) {
            return Err(XsdError::parse(format!(
                "group '{}' references itself at {}",
                name,
                position(node)
            )));
        }
        let body = xs_children(definition)
            .find(|c| matches!(c.tag_name().name(), "sequence" | "choice" | "all"))
            .ok_or_else(|| {
                XsdError::parse(format!("group '{}' has no model group", name))
            })?;

        self.group_stack.push(name);
        let group = self.model_group(body);
        self.group_stack.pop();

        let mut group = group?;
        let (min_occurs, max_occurs) = occurs(node)?;
        group.min_occurs = min_occurs;
        group.max_occurs = max_occurs;
        Ok(group)
    }

    fn element_particle(&mut self, node: Node<'a, 'input>) -> Result<ElementParticle> {
        let (min_occurs, max_occurs) = occurs(node)?;

        if let Some(qname) = node.attribute("ref") {
            let name = self.resolve_component_name(node, qname, "element")?;
            let element = self.elements_by_name.get(&name).cloned().ok_or_else(|| {
                XsdError::parse(format!(
                    "undefined element '{}' referenced at {}",
                    qname,
                    position(node)
                ))
            })?;
            self.referenced_elements.insert(name);
            return Ok(ElementParticle {
                element,
                min_occurs,
                max_occurs,
            });
        }

        let name = required_name(node)?;
        let (type_name, type_ref) = match node.attribute("type") {
            Some(qname) => self.resolve_element_type(node, qname, &name)?,
            None => match xs_children(node)
                .find(|c| matches!(c.tag_name().name(), "complexType" | "simpleType"))
            {
                Some(inline) => (None, TypeRef::Declared(self.anonymous_type(inline)?)),
                None => any_type(),
            },
        };
        let qualified = match node.attribute("form") {
            Some(form) => form == "qualified",
            None => self.element_form_qualified,
        };
        let keyrefs = self.identity_constraints(node, &name)?;

        Ok(ElementParticle {
            element: ElementDecl {
                name,
                type_name,
                type_ref,
                keyrefs,
                qualified,
                nillable: is_true(node.attribute("nillable")),
                default: node.attribute("default").map(str::to_string),
                fixed: node.attribute("fixed").map(str::to_string),
            },
            min_occurs,
            max_occurs,
        })
    }

    // ---------------------------------------------------------------------
    // Attributes
    // ---------------------------------------------------------------------

    fn attribute_decl(&mut self, node: Node<'a, 'input>) -> Result<AttributeDecl> {
        let usage = match node.attribute("use") {
            Some("required") => AttributeUsage::Required,
            Some("prohibited") => AttributeUsage::Prohibited,
            Some("optional") | None => AttributeUsage::Optional,
            Some(other) => {
                return Err(XsdError::parse(format!(
                    "invalid attribute use '{}' at {}",
                    other,
                    position(node)
                )))
            }
        };

        if let Some(qname) = node.attribute("ref") {
            let mut decl = self.attribute_ref(node, qname)?;
            decl.usage = usage;
            if let Some(default) = node.attribute("default") {
                decl.default = Some(default.to_string());
            }
            if let Some(fixed) = node.attribute("fixed") {
                decl.fixed = Some(fixed.to_string());
            }
            return Ok(decl);
        }

        let name = required_name(node)?;
        let (type_name, type_id) = match node.attribute("type") {
            Some(qname) => {
                let (type_name, type_ref) = self.resolve_type_qname(node, qname, &name)?;
                (type_name, type_ref.declared())
            }
            None => match xs_children(node).find(|c| c.tag_name().name() == "simpleType") {
                Some(inline) => (
                    ANONYMOUS_TYPE_LABEL.to_string(),
                    Some(self.anonymous_type(inline)?),
                ),
                None => ("anySimpleType".to_string(), None),
            },
        };

        Ok(AttributeDecl {
            name,
            type_name,
            usage,
            default: node.attribute("default").map(str::to_string),
            fixed: node.attribute("fixed").map(str::to_string),
            enumerations: Vec::new(),
            type_id,
        })
    }

    fn attribute_ref(&self, node: Node<'a, 'input>, qname: &str) -> Result<AttributeDecl> {
        let (ns, local) = split_qname(node, qname)?;
        if ns.as_deref() == Some(XML_NS) {
            return Ok(AttributeDecl {
                name: format!("xml:{}", local),
                type_name: "string".to_string(),
                usage: AttributeUsage::Optional,
                default: None,
                fixed: None,
                enumerations: Vec::new(),
                type_id: None,
            });
        }
        let name = self.resolve_component_name(node, qname, "attribute")?;
        self.attributes_by_name.get(&name).cloned().ok_or_else(|| {
            XsdError::parse(format!(
                "undefined attribute '{}' referenced at {}",
                qname,
                position(node)
            ))
        })
    }

    fn attribute_group_ref(&mut self, node: Node<'a, 'input>) -> Result<Vec<AttributeDecl>> {
        let qname = node.attribute("ref").ok_or_else(|| {
            XsdError::parse(format!("local xs:attributeGroup at {} has no ref", position(node)))
        })?;
        let name = self.resolve_component_name(node, qname, "attributeGroup")?;
        let definition = *self.attribute_group_nodes.get(&name).ok_or_else(|| {
            XsdError::parse(format!(
                "undefined attributeGroup '{}' at {}",
                qname,
                position(node)
            ))
        })?;
        if self.attribute_group_stack.contains(&name) {
            return Err(XsdError::parse(format!(
                "attributeGroup '{}' references itself",
                name
            )));
        }

        self.attribute_group_stack.push(name);
        let mut attrs = Vec::new();
        let mut outcome = Ok(());
        for child in xs_children(definition) {
            let step = match child.tag_name().name() {
                "attribute" => self.attribute_decl(child).map(|a| attrs.push(a)),
                "attributeGroup" => self.attribute_group_ref(child).map(|a| attrs.extend(a)),
                _ => Ok(()),
            };
            if step.is_err() {
                outcome = step;
                break;
            }
        }
        self.attribute_group_stack.pop();
        outcome.map(|_| attrs)
    }

    // ---------------------------------------------------------------------
    // Identity constraints
    // ---------------------------------------------------------------------

    fn identity_constraints(&mut self, node: Node<'a, 'input>, element: &str) -> Result<Vec<KeyrefDecl>> {
        let mut keyrefs = Vec::new();
        for child in xs_children(node) {
            match child.tag_name().name() {
                "key" | "unique" => {
                    self.identity_keys.insert(required_name(child)?);
                }
                "keyref" => {
                    let name = required_name(child)?;
                    let refer = child.attribute("refer").ok_or_else(|| {
                        XsdError::parse(format!(
                            "keyref '{}' at {} has no refer attribute",
                            name,
                            position(child)
                        ))
                    })?;
                    let (_, referenced) = split_qname(child, refer)?;
                    let keyref = KeyrefDecl {
                        name,
                        referenced_key_name: referenced,
                    };
                    self.keyref_checks.push((element.to_string(), keyref.clone()));
                    keyrefs.push(keyref);
                }
                _ => {}
            }
        }
        Ok(keyrefs)
    }

    // ---------------------------------------------------------------------
    // Name resolution
    // ---------------------------------------------------------------------

    fn in_schema_namespace(&self, ns: Option<&str>) -> bool {
        ns.is_none() || ns == self.target_namespace.as_deref()
    }

    fn resolve_element_type(
        &self,
        node: Node<'a, 'input>,
        qname: &str,
        owner: &str,
    ) -> Result<(Option<String>, TypeRef)> {
        let (name, type_ref) = self.resolve_type_qname(node, qname, owner)?;
        Ok((Some(name), type_ref))
    }

    fn resolve_type_qname(
        &self,
        node: Node<'a, 'input>,
        qname: &str,
        owner: &str,
    ) -> Result<(String, TypeRef)> {
        let (ns, local) = split_qname(node, qname)?;
        if ns.as_deref() == Some(XS_NS) {
            if is_builtin_type(&local) {
                return Ok((local.clone(), TypeRef::Builtin(local)));
            }
            return Err(XsdError::parse(format!(
                "unknown built-in type '{}' used by '{}' at {}",
                qname,
                owner,
                position(node)
            )));
        }
        if !self.in_schema_namespace(ns.as_deref()) {
            return Err(XsdError::parse(format!(
                "type '{}' used by '{}' belongs to namespace '{}' which is not loaded",
                qname,
                owner,
                ns.unwrap_or_default()
            )));
        }
        match self.types_by_name.get(&local) {
            Some(id) => Ok((local, TypeRef::Declared(*id))),
            None => Err(XsdError::parse(format!(
                "undefined type '{}' used by '{}' at {}",
                qname,
                owner,
                position(node)
            ))),
        }
    }

    fn resolve_component_name(&self, node: Node<'a, 'input>, qname: &str, kind: &str) -> Result<String> {
        let (ns, local) = split_qname(node, qname)?;
        if !self.in_schema_namespace(ns.as_deref()) {
            return Err(XsdError::parse(format!(
                "{} '{}' at {} belongs to namespace '{}' which is not loaded",
                kind,
                qname,
                position(node),
                ns.unwrap_or_default()
            )));
        }
        Ok(local)
    }

    // ---------------------------------------------------------------------
    // Pass 4: derivations
    // ---------------------------------------------------------------------

    fn apply_derivations(&mut self) -> Result<()> {
        let mut done = HashSet::new();
        let mut visiting = HashSet::new();
        for index in 0..self.types.len() {
            self.derive(TypeId(index), &mut done, &mut visiting)?;
        }

        // Attribute enumerations come from their (now final) simple types
        let enumerations: Vec<Vec<String>> =
            self.types.iter().map(|t| t.enumerations.clone()).collect();
        let fill = |attr: &mut AttributeDecl| {
            if attr.enumerations.is_empty() {
                if let Some(id) = attr.type_id {
                    attr.enumerations = enumerations[id.0].clone();
                }
            }
        };
        for ty in &mut self.types {
            ty.attributes.retain(|a| a.usage != AttributeUsage::Prohibited);
            ty.attributes.iter_mut().for_each(fill);
        }
        self.attributes_by_name.values_mut().for_each(fill);
        Ok(())
    }

    fn derive(&mut self, id: TypeId, done: &mut HashSet<TypeId>, visiting: &mut HashSet<TypeId>) -> Result<()> {
        if done.contains(&id) {
            return Ok(());
        }
        let Some(base_id) = self.bases.get(&id).copied() else {
            done.insert(id);
            return Ok(());
        };
        if !visiting.insert(id) {
            return Err(XsdError::parse(format!(
                "circular derivation involving type '{}'",
                self.types[id.0].label()
            )));
        }
        self.derive(base_id, done, visiting)?;
        visiting.remove(&id);

        let base = self.types[base_id.0].clone();
        let derived = &mut self.types[id.0];

        if derived.enumerations.is_empty() {
            derived.enumerations = base.enumerations.clone();
        }
        if derived.derivation == Some(Derivation::Extension) {
            derived.content = match (base.content, derived.content.take()) {
                (Some(b), Some(d)) => Some(ModelGroup::sequence(vec![Particle::Group(b), Particle::Group(d)])),
                (b, d) => d.or(b),
            };
        }
        if derived.variety == TypeVariety::Complex {
            // Base attributes first; redeclared ones win
            let mut merged: Vec<AttributeDecl> = base.attributes;
            for attr in derived.attributes.drain(..) {
                match merged.iter().position(|a| a.name == attr.name) {
                    Some(pos) => merged[pos] = attr,
                    None => merged.push(attr),
                }
            }
            derived.attributes = merged;
        }

        done.insert(id);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Pass 5: constraints and roots
    // ---------------------------------------------------------------------

    fn check_keyrefs(&self) -> Result<()> {
        for (element, keyref) in &self.keyref_checks {
            if !self.identity_keys.contains(&keyref.referenced_key_name) {
                return Err(XsdError::parse(format!(
                    "keyref '{}' on element '{}' refers to undefined key '{}'",
                    keyref.name, element, keyref.referenced_key_name
                )));
            }
        }
        Ok(())
    }

    fn finish(self, source_checksum: Checksum) -> SchemaModel {
        let mut root_element_names: Vec<String> = self
            .elements_by_name
            .keys()
            .filter(|name| !self.referenced_elements.contains(*name))
            .cloned()
            .collect();
        if root_element_names.is_empty() {
            root_element_names = self.elements_by_name.keys().cloned().collect();
        }

        SchemaModel {
            target_namespace: self.target_namespace,
            element_form_qualified: self.element_form_qualified,
            source_checksum,
            root_element_names,
            elements_by_name: self.elements_by_name,
            types: self.types,
            types_by_name: self.types_by_name,
            attributes_by_name: self.attributes_by_name,
        }
    }
}

fn any_type() -> (Option<String>, TypeRef) {
    (Some("anyType".to_string()), TypeRef::Builtin("anyType".to_string()))
}

fn duplicate(kind: &str, name: &str, node: Node) -> XsdError {
    XsdError::parse(format!(
        "duplicate global {} '{}' at {}",
        kind,
        name,
        position(node)
    ))
}

/// Split a QName into (namespace URI, local name) using the node's in-scope prefixes
fn split_qname(node: Node, qname: &str) -> Result<(Option<String>, String)> {
    let qname = qname.trim();
    match qname.split_once(':') {
        Some((prefix, local)) => {
            let ns = node.lookup_namespace_uri(Some(prefix)).ok_or_else(|| {
                XsdError::parse(format!(
                    "unknown namespace prefix '{}' in '{}' at {}",
                    prefix,
                    qname,
                    position(node)
                ))
            })?;
            Ok((Some(ns.to_string()), local.to_string()))
        }
        None => Ok((
            node.lookup_namespace_uri(None).map(str::to_string),
            qname.to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVOICE: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Invoice" type="InvoiceType"/>
  <xs:complexType name="InvoiceType">
    <xs:sequence>
      <xs:element name="Total" type="xs:decimal"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;

    #[test]
    fn test_load_simple_invoice() {
        let model = load(INVOICE).unwrap();
        assert_eq!(model.root_element_names(), ["Invoice"]);

        let invoice = model.element("Invoice").unwrap();
        assert_eq!(invoice.type_name.as_deref(), Some("InvoiceType"));

        let ty = model.resolve_type(invoice).unwrap();
        let children = ty.content_elements();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "Total");
        assert_eq!(children[0].type_ref, TypeRef::Builtin("decimal".to_string()));
    }

    #[test]
    fn test_type_attribute_names_global_and_local_elements() {
        let text = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Order" type="OrderType"/>
  <xs:complexType name="OrderType">
    <xs:sequence>
      <xs:element name="Line" type="LineType"/>
      <xs:element name="Note"/>
    </xs:sequence>
  </xs:complexType>
  <xs:complexType name="LineType">
    <xs:sequence><xs:element name="Qty" type="xs:int"/></xs:sequence>
  </xs:complexType>
</xs:schema>"#;
        let model = load(text).unwrap();
        let order = model.element("Order").unwrap();
        assert_eq!(order.type_name.as_deref(), Some("OrderType"));

        let children = model.resolve_type(order).unwrap().content_elements();
        assert_eq!(children[0].type_name.as_deref(), Some("LineType"));
        assert!(children[0].type_ref.declared().is_some());
        assert_eq!(children[1].type_name.as_deref(), Some("anyType"));
    }

    #[test]
    fn test_unclosed_tag_is_parse_error() {
        let err = load("<xs:schema xmlns:xs=\"http://www.w3.org/2001/XMLSchema\"><xs:element name=\"a\">")
            .unwrap_err();
        assert!(matches!(err, XsdError::SchemaParse(_)));
    }

    #[test]
    fn test_non_schema_root_rejected() {
        let err = load("<root/>").unwrap_err();
        assert!(err.to_string().contains("xs:schema"));
    }

    #[test]
    fn test_undefined_type_rejected() {
        let text = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="A" type="Missing"/>
</xs:schema>"#;
        let err = load(text).unwrap_err();
        assert!(err.to_string().contains("undefined type 'Missing'"));
    }

    #[test]
    fn test_unknown_builtin_rejected() {
        let text = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="A" type="xs:strng"/>
</xs:schema>"#;
        assert!(load(text).is_err());
    }

    #[test]
    fn test_referenced_globals_are_not_roots() {
        let text = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Book">
    <xs:complexType>
      <xs:sequence><xs:element ref="Title"/></xs:sequence>
    </xs:complexType>
  </xs:element>
  <xs:element name="Title" type="xs:string"/>
</xs:schema>"#;
        let model = load(text).unwrap();
        assert_eq!(model.root_element_names(), ["Book"]);
        assert_eq!(model.element_count(), 2);
        assert!(model.element("Book").unwrap().type_name.is_none());
    }

    #[test]
    fn test_occurs_validation() {
        let text = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:complexType name="T">
    <xs:sequence><xs:element name="a" type="xs:string" minOccurs="3" maxOccurs="2"/></xs:sequence>
  </xs:complexType>
</xs:schema>"#;
        assert!(load(text).unwrap_err().to_string().contains("maxOccurs"));
    }

    #[test]
    fn test_duplicate_global_rejected() {
        let text = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="A" type="xs:string"/>
  <xs:element name="A" type="xs:int"/>
</xs:schema>"#;
        assert!(load(text).unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_group_recursion_through_element_terminates() {
        let text = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:group name="Items">
    <xs:sequence>
      <xs:element name="Item" minOccurs="0">
        <xs:complexType><xs:group ref="Items"/></xs:complexType>
      </xs:element>
    </xs:sequence>
  </xs:group>
  <xs:element name="List"><xs:complexType><xs:group ref="Items"/></xs:complexType></xs:element>
</xs:schema>"#;
        let model = load(text).unwrap();
        let list = model.element("List").unwrap();
        let item = model.resolve_type(list).unwrap().content_elements()[0].clone();
        assert_eq!(item.name, "Item");
        let item_type = model.resolve_type(&item).unwrap();
        assert_eq!(item_type.content_elements()[0].type_ref, item.type_ref);
    }

    #[test]
    fn test_circular_derivation_rejected() {
        let text = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:complexType name="A"><xs:complexContent><xs:extension base="B"/></xs:complexContent></xs:complexType>
  <xs:complexType name="B"><xs:complexContent><xs:extension base="A"/></xs:complexContent></xs:complexType>
</xs:schema>"#;
        assert!(load(text).unwrap_err().to_string().contains("circular derivation"));
    }
}
