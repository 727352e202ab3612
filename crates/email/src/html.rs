use serde::{Deserialize, Serialize};

/// One child of a parsed HTML fragment, as a DOM would report it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlNode {
    pub node_name: String,
    #[serde(default)]
    pub node_value: Option<String>,
    #[serde(default)]
    pub text_content: Option<String>,
}

impl HtmlNode {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            node_name: "#text".to_string(),
            node_value: Some(value.clone()),
            text_content: Some(value),
        }
    }

    pub fn element(name: impl Into<String>, text_content: impl Into<String>) -> Self {
        Self {
            node_name: name.into().to_ascii_uppercase(),
            node_value: None,
            text_content: Some(text_content.into()),
        }
    }

    pub fn line_break() -> Self {
        Self {
            node_name: "BR".to_string(),
            node_value: None,
            text_content: Some(String::new()),
        }
    }
}

/// Splits an HTML fragment into its top-level nodes.
pub trait FragmentParser: Send + Sync {
    fn parse_fragment(&self, html: &str) -> Vec<HtmlNode>;
}

/// Reads the whole fragment as one text node. Enough when the text content
/// of a container carries no further markup, which is what a DOM's
/// `textContent` returns.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextFragmentParser;

impl FragmentParser for TextFragmentParser {
    fn parse_fragment(&self, html: &str) -> Vec<HtmlNode> {
        if html.is_empty() {
            return Vec::new();
        }
        vec![HtmlNode::text(html)]
    }
}
