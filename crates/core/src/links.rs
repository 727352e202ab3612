use std::sync::LazyLock;

use regex::Regex;

use crate::core::{Document, Editor, Node, Selection};
use crate::editing::{INSERT_DATA_SOURCE, INSERT_TEXT_SOURCE};
use crate::location::{
    Affinity, BlockPoint, block_mut, block_point, map_inline_range, nodes_in_range, point_at,
    replace_document_ops, selection_at, siblings_mut, text_blocks,
};
use crate::ops::{Path, Transaction};
use crate::plugin::{CommandError, TransactionTransform};

static PROTOCOL_AND_DOMAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[A-Za-z0-9_]+:)?//(\S+)$").expect("valid url pattern"));
static LOCALHOST_DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^localhost[:?0-9]*(?:[^:?0-9]\S*)?$").expect("valid localhost pattern")
});
static NON_LOCALHOST_DOMAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s.]+\.\S{2,}$").expect("valid domain pattern"));

/// Syntactic url check: optional `scheme:`, then `//` and either a localhost
/// authority or a dotted host with a suffix of two or more characters.
pub fn is_url(text: &str) -> bool {
    let Some(captures) = PROTOCOL_AND_DOMAIN.captures(text) else {
        return false;
    };
    let Some(rest) = captures.get(1).map(|m| m.as_str()) else {
        return false;
    };
    LOCALHOST_DOMAIN.is_match(rest) || NON_LOCALHOST_DOMAIN.is_match(rest)
}

pub fn is_link_active(editor: &Editor) -> bool {
    editor
        .selection()
        .is_some_and(|selection| link_active_in(editor.doc(), selection))
}

pub(crate) fn link_active_in(doc: &Document, selection: &Selection) -> bool {
    !link_paths_in(doc, selection).is_empty()
}

fn link_paths_in(doc: &Document, selection: &Selection) -> Vec<Path> {
    let (start, end) = selection.edges();
    nodes_in_range(doc, &start, &end)
        .into_iter()
        .filter(|(_, node)| matches!(node, Node::Link(_)))
        .map(|(path, _)| path)
        .collect()
}

/// Replaces every link touched by the selection with its children. Text
/// blocks and their text are left intact.
fn unwrap_links_in(doc: &mut Document, selection: &Selection) -> bool {
    let paths = link_paths_in(doc, selection);
    for path in paths.iter().rev() {
        let Some((&ix, parent)) = path.split_last() else {
            continue;
        };
        let Some(Node::Link(link)) = doc.node(path).cloned() else {
            continue;
        };
        let Some(siblings) = siblings_mut(doc, parent) else {
            continue;
        };
        siblings.splice(ix..=ix, link.children);
    }
    !paths.is_empty()
}

fn flatten_links(nodes: Vec<Node>) -> Vec<Node> {
    nodes
        .into_iter()
        .flat_map(|node| match node {
            Node::Link(link) => flatten_links(link.children),
            other => vec![other],
        })
        .collect()
}

pub fn unwrap_link(editor: &mut Editor) -> Result<(), CommandError> {
    let Some(selection) = editor.selection() else {
        return Ok(());
    };
    let Some(tx) = unwrap_link_transaction(editor.doc(), selection) else {
        return Ok(());
    };
    editor
        .apply(tx)
        .map_err(|e| CommandError::new(format!("Failed to unwrap link: {e}")))
}

pub fn unwrap_link_transaction(doc: &Document, selection: &Selection) -> Option<Transaction> {
    let anchor = block_point(doc, &selection.anchor)?;
    let focus = block_point(doc, &selection.focus)?;

    let mut next = doc.clone();
    if !unwrap_links_in(&mut next, selection) {
        return None;
    }

    let selection_after = selection_at(&next, anchor, focus)?;
    Some(
        Transaction::new(replace_document_ops(doc, &next))
            .selection_after(selection_after)
            .source("command:link.unwrap"),
    )
}

pub fn wrap_link(editor: &mut Editor, url: &str) -> Result<(), CommandError> {
    let Some(selection) = editor.selection() else {
        return Ok(());
    };
    let Some(tx) = wrap_link_transaction(editor.doc(), selection, url) else {
        return Ok(());
    };
    editor
        .apply(tx)
        .map_err(|e| CommandError::new(format!("Failed to wrap link: {e}")))
}

pub fn insert_link(editor: &mut Editor, url: &str) -> Result<(), CommandError> {
    if editor.selection().is_none() {
        return Ok(());
    }
    wrap_link(editor, url)
}

/// Unwraps any active link, then either inserts a link showing `url` at the
/// cursor or wraps the selected inline content of each text block. The cursor
/// ends up at the end of the link text.
pub fn wrap_link_transaction(doc: &Document, selection: &Selection, url: &str) -> Option<Transaction> {
    let anchor = block_point(doc, &selection.anchor)?;
    let focus = block_point(doc, &selection.focus)?;

    let mut next = doc.clone();
    unwrap_links_in(&mut next, selection);

    let paths: Vec<Path> = text_blocks(&next).into_iter().map(|tb| tb.path).collect();

    let cursor = if selection.is_collapsed() {
        let block = block_mut(&mut next, paths.get(anchor.block)?)?;
        block.children = map_inline_range(&block.children, anchor.offset, anchor.offset, |_| {
            vec![Node::link(url, vec![Node::text(url)])]
        });
        BlockPoint {
            block: anchor.block,
            offset: anchor.offset + url.len(),
        }
    } else {
        let (start, end) = if (focus.block, focus.offset) < (anchor.block, anchor.offset) {
            (focus, anchor)
        } else {
            (anchor, focus)
        };
        for ordinal in start.block..=end.block {
            let from = if ordinal == start.block { start.offset } else { 0 };
            let to = if ordinal == end.block {
                end.offset
            } else {
                usize::MAX
            };
            if from >= to {
                continue;
            }
            let Some(block) = paths.get(ordinal).and_then(|p| block_mut(&mut next, p)) else {
                continue;
            };
            let len: usize = block.children.iter().map(Node::text_len).sum();
            if from >= len {
                continue;
            }
            block.children = map_inline_range(&block.children, from, to, |middle| {
                vec![Node::link(url, flatten_links(middle))]
            });
        }
        end
    };

    let point = point_at(&next, cursor, Affinity::Backward)?;
    Some(
        Transaction::new(replace_document_ops(doc, &next))
            .selection_after(Selection::collapsed(point))
            .source("command:link.wrap"),
    )
}

/// Turns typed or pasted urls into links instead of plain text.
pub struct AutoLink;

impl TransactionTransform for AutoLink {
    fn id(&self) -> &'static str {
        "link.auto_link"
    }

    fn transform(&self, editor: &Editor, tx: &Transaction) -> Option<Transaction> {
        let source = tx.meta.source.as_deref()?;
        if source != INSERT_TEXT_SOURCE && source != INSERT_DATA_SOURCE {
            return None;
        }
        let text = tx.meta.input_text.as_deref()?;
        if !is_url(text) {
            return None;
        }
        let selection = editor.selection()?;
        tracing::debug!(url = text, "auto-linking inserted url");
        wrap_link_transaction(editor.doc(), selection, text).map(|tx| tx.source("input:auto_link"))
    }
}
