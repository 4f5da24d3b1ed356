use roxmltree::{Document, Node};

use crate::error::ScanError;

pub fn parse_xml<'a>(tool: &str, text: &'a str) -> Result<Document<'a>, ScanError> {
    Document::parse(text).map_err(|e| ScanError::parse(tool, format!("invalid XML: {}", e)))
}

/// First element child with the given tag name
pub fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

/// All element children with the given tag name
pub fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

/// Attribute as an owned string, empty when absent
pub fn attr(node: Node<'_, '_>, name: &str) -> String {
    node.attribute(name).unwrap_or_default().to_string()
}
