use crate::core::{BlockFormat, BlockKind, BlockNode, Document, Editor, Node, Selection};
use crate::location::{
    BlockPoint, block_mut, block_point, child_path, is_ancestor, nodes_in_range, parent_path,
    replace_document_ops, selection_at, selection_range, siblings_mut, text_blocks,
};
use crate::ops::{BlockPatch, Op, Path, Transaction};
use crate::plugin::CommandError;

pub fn is_block_active(editor: &Editor, format: BlockFormat) -> bool {
    editor
        .selection()
        .is_some_and(|selection| block_active_in(editor.doc(), selection, format))
}

pub(crate) fn block_active_in(doc: &Document, selection: &Selection, format: BlockFormat) -> bool {
    let (start, end) = selection_range(doc, selection);
    nodes_in_range(doc, &start, &end)
        .into_iter()
        .any(|(_, node)| matches!(node, Node::Block(block) if format.matches(block)))
}

pub fn toggle_block(editor: &mut Editor, format: BlockFormat) -> Result<(), CommandError> {
    let Some(selection) = editor.selection() else {
        return Ok(());
    };
    let Some(tx) = toggle_block_transaction(editor.doc(), selection, format) else {
        return Ok(());
    };
    editor
        .apply(tx)
        .map_err(|e| CommandError::new(format!("Failed to toggle {format}: {e}")))
}

/// Ordinals of the first and last text block the (unhung) selection touches.
pub(crate) fn selected_block_span(doc: &Document, selection: &Selection) -> Option<(BlockPoint, BlockPoint)> {
    let (start, end) = selection_range(doc, selection);
    Some((block_point(doc, &start)?, block_point(doc, &end)?))
}

fn selected_paths(doc: &Document, first: usize, last: usize) -> Vec<Path> {
    text_blocks(doc)
        .into_iter()
        .enumerate()
        .filter(|(ordinal, _)| (first..=last).contains(ordinal))
        .map(|(_, tb)| tb.path)
        .collect()
}

pub fn toggle_block_transaction(
    doc: &Document,
    selection: &Selection,
    format: BlockFormat,
) -> Option<Transaction> {
    let active = block_active_in(doc, selection, format);
    let anchor = block_point(doc, &selection.anchor)?;
    let focus = block_point(doc, &selection.focus)?;
    let (start, end) = selected_block_span(doc, selection)?;
    let (first, last) = (start.block, end.block);

    let mut next = doc.clone();
    match format {
        BlockFormat::Align(align) => {
            // Alignment never restructures the tree, so it is patched in place.
            let value = if active { None } else { Some(align) };
            let ops: Vec<Op> = selected_paths(doc, first, last)
                .into_iter()
                .filter(|path| matches!(doc.node(path), Some(Node::Block(b)) if b.align != value))
                .map(|path| Op::SetBlock {
                    path,
                    patch: BlockPatch::align(value),
                })
                .collect();
            if ops.is_empty() {
                return None;
            }
            tracing::trace!(%format, active, first, last, "toggle alignment");
            return Some(
                Transaction::new(ops)
                    .selection_after(selection.clone())
                    .source(format!("command:block.toggle:{format}")),
            );
        }
        BlockFormat::Kind(kind) => {
            lift_out_of_lists(&mut next, first, last);

            let new_kind = if active {
                BlockKind::Paragraph
            } else if kind.is_list() {
                BlockKind::ListItem
            } else {
                kind
            };
            for path in selected_paths(&next, first, last) {
                if let Some(block) = block_mut(&mut next, &path) {
                    block.kind = new_kind;
                }
            }

            if !active && kind.is_list() {
                wrap_in_list(&mut next, first, last, kind);
            }
        }
    }

    if next == *doc {
        return None;
    }

    tracing::trace!(%format, active, first, last, "toggle block");
    let selection_after = selection_at(&next, anchor, focus)?;
    Some(
        Transaction::new(replace_document_ops(doc, &next))
            .selection_after(selection_after)
            .source(format!("command:block.toggle:{format}")),
    )
}

/// Moves the selected items out of their lowest enclosing list. Items before
/// and after the selection stay behind in lists of the same kind.
fn lift_out_of_lists(doc: &mut Document, first: usize, last: usize) {
    let selected = selected_paths(doc, first, last);

    let mut lists: Vec<Path> = Vec::new();
    for path in &selected {
        for depth in 1..path.len() {
            let prefix = &path[..depth];
            if matches!(doc.node(prefix), Some(Node::Block(b)) if b.kind.is_list())
                && !lists.iter().any(|l| l.as_slice() == prefix)
            {
                lists.push(prefix.to_vec());
            }
        }
    }

    let mut lowest: Vec<Path> = lists
        .iter()
        .filter(|list| !lists.iter().any(|other| is_ancestor(list, other)))
        .cloned()
        .collect();
    lowest.sort();

    for list_path in lowest.into_iter().rev() {
        let Some(Node::Block(list)) = doc.node(&list_path).cloned() else {
            continue;
        };
        let touched: Vec<usize> = (0..list.children.len())
            .filter(|&ix| {
                let item = child_path(&list_path, ix);
                selected.iter().any(|p| p.starts_with(&item))
            })
            .collect();
        let (Some(&a), Some(&b)) = (touched.first(), touched.last()) else {
            continue;
        };

        let remnant = |children: &[Node]| {
            Node::Block(BlockNode {
                kind: list.kind,
                align: list.align,
                children: children.to_vec(),
            })
        };

        let mut replacement = Vec::new();
        if a > 0 {
            replacement.push(remnant(&list.children[..a]));
        }
        replacement.extend(list.children[a..=b].iter().cloned());
        if b + 1 < list.children.len() {
            replacement.push(remnant(&list.children[b + 1..]));
        }

        let Some((&ix, parent)) = list_path.split_last() else {
            continue;
        };
        if let Some(siblings) = siblings_mut(doc, parent) {
            siblings.splice(ix..=ix, replacement);
        }
    }
}

/// Wraps the span of blocks under the selected blocks' common parent in a new
/// list.
fn wrap_in_list(doc: &mut Document, first: usize, last: usize, kind: BlockKind) {
    let selected = selected_paths(doc, first, last);
    let (Some(first_path), Some(last_path)) = (selected.first(), selected.last()) else {
        return;
    };

    let common: Path = if first_path == last_path {
        parent_path(first_path).to_vec()
    } else {
        first_path
            .iter()
            .zip(last_path)
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| *a)
            .collect()
    };
    let depth = common.len();
    let (a, b) = (first_path[depth], last_path[depth]);

    if let Some(siblings) = siblings_mut(doc, &common) {
        let wrapped: Vec<Node> = siblings.drain(a..=b).collect();
        siblings.insert(a, Node::block(kind, wrapped));
    }
}
