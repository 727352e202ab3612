use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type Props = BTreeMap<String, Value>;

/// The loosely typed tree exchanged with a grammar engine. Kinds and prop
/// keys are plain strings so each direction can use its own vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum MdNode {
    Element {
        kind: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        props: Props,
        #[serde(default)]
        children: Vec<MdNode>,
    },
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        props: Props,
    },
}

impl MdNode {
    pub fn element(kind: impl Into<String>, children: Vec<MdNode>) -> Self {
        MdNode::Element {
            kind: kind.into(),
            props: Props::new(),
            children,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        MdNode::Text {
            text: text.into(),
            props: Props::new(),
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props_mut().insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> Option<&str> {
        match self {
            MdNode::Element { kind, .. } => Some(kind),
            MdNode::Text { .. } => None,
        }
    }

    pub fn props(&self) -> &Props {
        match self {
            MdNode::Element { props, .. } | MdNode::Text { props, .. } => props,
        }
    }

    pub fn props_mut(&mut self) -> &mut Props {
        match self {
            MdNode::Element { props, .. } | MdNode::Text { props, .. } => props,
        }
    }

    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props().get(key).and_then(Value::as_str)
    }

    /// True when the prop is present and truthy.
    pub fn flag(&self, key: &str) -> bool {
        self.props().get(key).is_some_and(|v| match v {
            Value::Bool(b) => *b,
            Value::Null => false,
            _ => true,
        })
    }

    pub fn children(&self) -> &[MdNode] {
        match self {
            MdNode::Element { children, .. } => children,
            MdNode::Text { .. } => &[],
        }
    }

    /// Concatenated text of every descendant.
    pub fn plain_text(&self) -> String {
        match self {
            MdNode::Text { text, .. } => text.clone(),
            MdNode::Element { children, .. } => children.iter().map(MdNode::plain_text).collect(),
        }
    }
}

/// Renames element kinds through `table`, visiting the children of every
/// element whatever its kind.
pub fn rename_kinds(nodes: &mut [MdNode], table: &[(&str, &str)]) {
    for node in nodes {
        if let MdNode::Element { kind, children, .. } = node {
            if let Some((_, to)) = table.iter().find(|(from, _)| *from == kind.as_str()) {
                *kind = (*to).to_string();
            }
            rename_kinds(children, table);
        }
    }
}

/// Copies prop `from` into prop `to` on every node that has it.
pub fn copy_prop(nodes: &mut [MdNode], from: &str, to: &str) {
    for node in nodes {
        if let Some(value) = node.props().get(from).cloned() {
            node.props_mut().insert(to.to_string(), value);
        }
        if let MdNode::Element { children, .. } = node {
            copy_prop(children, from, to);
        }
    }
}
