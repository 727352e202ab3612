use serde::{Deserialize, Serialize};

use crate::html::{FragmentParser, HtmlNode};

/// Inline content of an email body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InlineNode {
    String { value: String },
    LineBreak,
    Italic { content: Vec<InlineNode> },
    Bold { content: Vec<InlineNode> },
}

/// Classifies the nodes of a fragment. Bold and italic containers recurse
/// into their re-parsed text content; any other element is skipped.
pub fn html_to_inline_nodes(nodes: &[HtmlNode], parser: &dyn FragmentParser) -> Vec<InlineNode> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let name = node.node_name.to_ascii_uppercase();
        match name.as_str() {
            "#TEXT" => out.push(InlineNode::String {
                value: node.node_value.clone().unwrap_or_default(),
            }),
            "BR" => out.push(InlineNode::LineBreak),
            "I" => out.push(InlineNode::Italic {
                content: convert_text_content(node, parser),
            }),
            "B" => out.push(InlineNode::Bold {
                content: convert_text_content(node, parser),
            }),
            _ => tracing::trace!(node = %node.node_name, "skipping html node"),
        }
    }
    out
}

/// Parses `html` with `parser` and classifies the result.
pub fn html_fragment_to_inline_nodes(html: &str, parser: &dyn FragmentParser) -> Vec<InlineNode> {
    html_to_inline_nodes(&parser.parse_fragment(html), parser)
}

fn convert_text_content(node: &HtmlNode, parser: &dyn FragmentParser) -> Vec<InlineNode> {
    html_fragment_to_inline_nodes(node.text_content.as_deref().unwrap_or_default(), parser)
}
