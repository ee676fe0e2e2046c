//! Descriptor Renderer
//!
//! Turns a schema into indented text: one line per element node reachable from a
//! root, two spaces per level, `- <name> (Type: <type>)`. Types that recur on the
//! current path, and nodes at the depth bound, are cut with the truncation marker
//! instead of being expanded, so rendering always terminates.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::config::RenderConfig;
use crate::error::{Result, XsdError};
use crate::facility::SchemaFacility;
use crate::graph::{recursive_types, TypeGraph};
use crate::model::{ElementDecl, SchemaModel, TypeId};

/// Shown by front ends when a schema has no keyrefs
pub const NO_KEYREFS: &str = "no keyref section";

// =============================================================================
// Element tree
// =============================================================================

/// Indented element tree below the global element `root`
pub fn render_element_tree<F: SchemaFacility + ?Sized>(
    facility: &F,
    root: &str,
    config: &RenderConfig,
) -> Result<String> {
    Ok(tree_lines(facility, root, config)?.join("\n"))
}

fn tree_lines<F: SchemaFacility + ?Sized>(
    facility: &F,
    root: &str,
    config: &RenderConfig,
) -> Result<Vec<String>> {
    let element = facility
        .resolve_element(root)
        .ok_or_else(|| XsdError::UnknownRoot(root.to_string()))?;

    let mut walk = TreeWalk {
        facility,
        config,
        path: Vec::new(),
        lines: Vec::new(),
        truncated: 0,
    };
    walk.visit(element, 0);

    if walk.truncated > 0 {
        debug!(root, truncated = walk.truncated, "element tree truncated");
    }
    Ok(walk.lines)
}

struct TreeWalk<'f, F: ?Sized> {
    facility: &'f F,
    config: &'f RenderConfig,
    /// Types being expanded on the way down to the current node
    path: Vec<TypeId>,
    lines: Vec<String>,
    truncated: usize,
}

impl<'f, F: SchemaFacility + ?Sized> TreeWalk<'f, F> {
    fn visit(&mut self, element: &'f ElementDecl, depth: usize) {
        let line = format!(
            "{}- {} (Type: {})",
            "  ".repeat(depth),
            element.name,
            element.type_label()
        );

        let facility = self.facility;
        let Some(ty) = facility.resolve_element_type(element) else {
            self.lines.push(line);
            return;
        };
        let children = facility.resolve_content_elements(ty);
        if children.is_empty() {
            self.lines.push(line);
            return;
        }

        if self.path.contains(&ty.id) || depth >= self.config.max_depth {
            self.lines.push(format!("{} {}", line, self.config.truncation_marker));
            self.truncated += 1;
            return;
        }

        self.lines.push(line);
        self.path.push(ty.id);
        for child in children {
            self.visit(child, depth + 1);
        }
        self.path.pop();
    }
}

// =============================================================================
// Keyrefs
// =============================================================================

/// One `Element: <name>, Keyref: <keyref>` line per keyref, global elements in
/// declaration order
pub fn render_keyrefs<F: SchemaFacility + ?Sized>(facility: &F) -> Vec<String> {
    facility
        .resolve_keyrefs()
        .into_iter()
        .map(|(element, keyref)| format!("Element: {}, Keyref: {}", element.name, keyref.name))
        .collect()
}

// =============================================================================
// Full description
// =============================================================================

/// Tree of one root element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootDescription {
    pub name: String,
    pub type_name: String,
    pub tree: Vec<String>,
}

/// Everything the renderer reports about a schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Description {
    pub roots: Vec<RootDescription>,
    pub keyrefs: Vec<String>,
    /// Types that contain themselves; their trees are truncated
    pub recursive_types: Vec<String>,
    pub checksum: String,
}

impl Description {
    /// Header, tree and keyref lines in output order
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for root in &self.roots {
            lines.push(format!("Root Element: {} (Type: {})", root.name, root.type_name));
            lines.extend(root.tree.iter().cloned());
        }
        if !self.keyrefs.is_empty() {
            lines.push("Keyref Elements:".to_string());
            lines.extend(self.keyrefs.iter().cloned());
        }
        lines
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}

/// Describe every root element, or only `root` when given
pub fn render_description(
    model: &SchemaModel,
    root: Option<&str>,
    config: &RenderConfig,
) -> Result<Description> {
    let root_elements: Vec<&ElementDecl> = match root {
        Some(name) => vec![model
            .resolve_element(name)
            .ok_or_else(|| XsdError::UnknownRoot(name.to_string()))?],
        None => model.resolve_root_elements(),
    };

    let mut roots = Vec::with_capacity(root_elements.len());
    for element in root_elements {
        roots.push(RootDescription {
            name: element.name.clone(),
            type_name: element.type_label().to_string(),
            tree: tree_lines(model, &element.name, config)?,
        });
    }

    let graph = TypeGraph::build(model);
    let mut recursive: Vec<String> = recursive_types(&graph)
        .into_iter()
        .filter_map(|id| model.type_decl(id))
        .map(|t| t.label().to_string())
        .collect();
    recursive.dedup();
    debug!(
        types = graph.type_count(),
        edges = graph.edge_count(),
        recursive = recursive.len(),
        "type graph analysed"
    );

    Ok(Description {
        roots,
        keyrefs: render_keyrefs(model),
        recursive_types: recursive,
        checksum: model.source_checksum().to_string(),
    })
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

    const COMMENTS: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Entry" type="EntryType"/>
  <xs:complexType name="EntryType">
    <xs:sequence><xs:element name="Comment" type="CommentType"/></xs:sequence>
  </xs:complexType>
  <xs:complexType name="CommentType">
    <xs:sequence>
      <xs:element name="Text" type="xs:string"/>
      <xs:element name="Comment" type="CommentType" minOccurs="0" maxOccurs="unbounded"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;

    #[test]
    fn test_invoice_tree() {
        let model = load(INVOICE).unwrap();
        let tree = render_element_tree(&model, "Invoice", &RenderConfig::default()).unwrap();
        assert_eq!(tree, "- Invoice (Type: InvoiceType)\n  - Total (Type: decimal)");
        assert!(render_keyrefs(&model).is_empty());
    }

    #[test]
    fn test_recursive_type_truncated() {
        let model = load(COMMENTS).unwrap();
        let tree = render_element_tree(&model, "Entry", &RenderConfig::default()).unwrap();
        assert_eq!(
            tree,
            "- Entry (Type: EntryType)\n  - Comment (Type: CommentType)\n    - Text (Type: string)\n    - Comment (Type: CommentType) …"
        );
    }

    #[test]
    fn test_depth_bound() {
        let model = load(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="A" type="AType"/>
  <xs:complexType name="AType"><xs:sequence><xs:element name="B" type="BType"/></xs:sequence></xs:complexType>
  <xs:complexType name="BType"><xs:sequence><xs:element name="C" type="xs:string"/></xs:sequence></xs:complexType>
</xs:schema>"#,
        )
        .unwrap();
        let config = RenderConfig {
            max_depth: 1,
            truncation_marker: "[...]".to_string(),
        };
        let tree = render_element_tree(&model, "A", &config).unwrap();
        assert_eq!(tree, "- A (Type: AType)\n  - B (Type: BType) [...]");
    }

    #[test]
    fn test_reused_type_renders_per_occurrence() {
        let model = load(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Order" type="OrderType"/>
  <xs:complexType name="OrderType">
    <xs:sequence>
      <xs:element name="Billing" type="AddressType"/>
      <xs:element name="Shipping" type="AddressType"/>
    </xs:sequence>
  </xs:complexType>
  <xs:complexType name="AddressType">
    <xs:sequence>
      <xs:element name="Street" type="xs:string"/>
      <xs:element name="City" type="xs:string"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#,
        )
        .unwrap();
        let tree = render_element_tree(&model, "Order", &RenderConfig::default()).unwrap();
        assert_eq!(tree.lines().count(), 7);
        assert!(!tree.contains('…'));
    }

    #[test]
    fn test_anonymous_type_label() {
        let model = load(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Note">
    <xs:complexType><xs:sequence><xs:element name="Body" type="xs:string"/></xs:sequence></xs:complexType>
  </xs:element>
</xs:schema>"#,
        )
        .unwrap();
        let tree = render_element_tree(&model, "Note", &RenderConfig::default()).unwrap();
        assert_eq!(tree, "- Note (Type: anonymous)\n  - Body (Type: string)");
    }

    #[test]
    fn test_keyref_lines() {
        let model = load(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Library">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Author" type="xs:string" maxOccurs="unbounded"/>
        <xs:element name="Book" type="xs:string" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
    <xs:key name="AuthorKey"><xs:selector xpath="Author"/><xs:field xpath="."/></xs:key>
    <xs:keyref name="BookAuthorRef" refer="AuthorKey"><xs:selector xpath="Book"/><xs:field xpath="."/></xs:keyref>
  </xs:element>
</xs:schema>"#,
        )
        .unwrap();
        assert_eq!(
            render_keyrefs(&model),
            vec!["Element: Library, Keyref: BookAuthorRef".to_string()]
        );

        let description = render_description(&model, None, &RenderConfig::default()).unwrap();
        let text = description.to_string();
        assert!(text.starts_with("Root Element: Library (Type: anonymous)\n- Library (Type: anonymous)"));
        assert!(text.ends_with("Keyref Elements:\nElement: Library, Keyref: BookAuthorRef"));
    }

    #[test]
    fn test_description_reports_recursion() {
        let model = load(COMMENTS).unwrap();
        let description = render_description(&model, None, &RenderConfig::default()).unwrap();
        assert_eq!(description.recursive_types, vec!["CommentType".to_string()]);
        assert_eq!(description.roots.len(), 1);
        assert!(!description.to_string().contains("Keyref Elements:"));
    }

    #[test]
    fn test_unknown_root() {
        let model = load(INVOICE).unwrap();
        assert!(matches!(
            render_element_tree(&model, "Receipt", &RenderConfig::default()),
            Err(XsdError::UnknownRoot(_))
        ));
    }
}
