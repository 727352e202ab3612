use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::core::{Align, BlockKind, Node, Selection};

pub type Path = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    InsertText {
        #[serde(default)]
        path: Path,
        offset: usize,
        text: String,
    },
    RemoveText {
        #[serde(default)]
        path: Path,
        range: Range<usize>,
    },
    InsertNode {
        #[serde(default)]
        path: Path,
        node: Node,
    },
    RemoveNode {
        #[serde(default)]
        path: Path,
    },
    SetBlock {
        #[serde(default)]
        path: Path,
        patch: BlockPatch,
    },
}

/// Partial update of a block's attributes. `align: Some(None)` clears the
/// alignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<BlockKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<Option<Align>>,
}

impl BlockPatch {
    pub fn kind(kind: BlockKind) -> Self {
        Self {
            kind: Some(kind),
            align: None,
        }
    }

    pub fn align(align: Option<Align>) -> Self {
        Self {
            kind: None,
            align: Some(align),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Raw text typed or pasted by the user, when the transaction came from input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub ops: Vec<Op>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_after: Option<Selection>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl Transaction {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            selection_after: None,
            meta: TransactionMeta::default(),
        }
    }

    pub fn selection_after(mut self, selection_after: Selection) -> Self {
        self.selection_after = Some(selection_after);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }

    pub fn input_text(mut self, text: impl Into<String>) -> Self {
        self.meta.input_text = Some(text.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.selection_after.is_none()
    }
}
