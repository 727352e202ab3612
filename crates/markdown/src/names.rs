use std::collections::BTreeMap;

/// Engine kinds renamed to document kinds after parsing.
pub const PARSE_RENAMES: [(&str, &str); 6] = [
    ("list_item", "list-item"),
    ("ul_list", "bulleted-list"),
    ("ol_list", "numbered-list"),
    ("heading_one", "heading-one"),
    ("heading_two", "heading-two"),
    ("block_quote", "block-quote"),
];

/// Prop holding a link target in the engine's dialect.
pub const ENGINE_LINK_PROP: &str = "link";
/// Prop holding a link target in the document dialect.
pub const DOCUMENT_URL_PROP: &str = "url";
/// Strikethrough flag as the engine's writer reads it.
pub const ENGINE_STRIKE_PROP: &str = "strikeThrough";
/// Strikethrough flag in the document dialect.
pub const DOCUMENT_STRIKE_PROP: &str = "strikethrough";

/// Kind names the writer recognizes, keyed by the construct they stand for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTypes {
    pub paragraph: String,
    pub block_quote: String,
    pub heading: BTreeMap<u8, String>,
    pub list_item: String,
    pub ol_list: String,
    pub ul_list: String,
    pub link: String,
    pub bold_mark: String,
    pub italic_mark: String,
    pub strike_mark: String,
}

impl Default for NodeTypes {
    fn default() -> Self {
        Self {
            paragraph: "paragraph".to_string(),
            block_quote: "block-quote".to_string(),
            heading: BTreeMap::from([
                (1, "heading-one".to_string()),
                (2, "heading-two".to_string()),
            ]),
            list_item: "list-item".to_string(),
            ol_list: "numbered-list".to_string(),
            ul_list: "bulleted-list".to_string(),
            link: "link".to_string(),
            bold_mark: "bold".to_string(),
            italic_mark: "italic".to_string(),
            strike_mark: ENGINE_STRIKE_PROP.to_string(),
        }
    }
}

impl NodeTypes {
    pub fn heading_level(&self, kind: &str) -> Option<u8> {
        self.heading
            .iter()
            .find(|(_, name)| name.as_str() == kind)
            .map(|(level, _)| *level)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    pub node_types: NodeTypes,
}
