use crate::blocks::selected_block_span;
use crate::core::{Document, Editor, Mark, Marks, Node, Selection};
use crate::location::{
    block_mut, block_point, is_ancestor, map_inline_range, map_leaves, nodes_in_range,
    replace_document_ops, selection_at, text_blocks, text_leaves,
};
use crate::ops::Transaction;
use crate::plugin::CommandError;

/// Marks the next typed text would carry. `None` without a selection.
pub fn active_marks(editor: &Editor) -> Option<Marks> {
    let selection = editor.selection()?;
    if let Some(pending) = editor.pending_marks() {
        return Some(pending);
    }
    Some(marks_at(editor.doc(), selection))
}

pub fn is_mark_active(editor: &Editor, mark: Mark) -> bool {
    active_marks(editor).is_some_and(|marks| marks.contains(mark))
}

pub(crate) fn marks_at(doc: &Document, selection: &Selection) -> Marks {
    if !selection.is_collapsed() {
        let (start, end) = selection.edges();
        let leaves: Vec<_> = nodes_in_range(doc, &start, &end)
            .into_iter()
            .filter_map(|(path, node)| match node {
                Node::Text(t) => Some((path, t)),
                _ => None,
            })
            .collect();
        // A leaf the range only touches at its end (or at its start, for the
        // last one) contributes no selected text.
        let covered = leaves.iter().find(|(path, leaf)| {
            let touches_end = *path == start.path && start.offset >= leaf.text.len();
            let touches_start = *path == end.path && *path != start.path && end.offset == 0;
            !touches_end && !touches_start
        });
        return covered
            .or(leaves.first())
            .map(|(_, leaf)| leaf.marks)
            .unwrap_or_default();
    }

    let anchor = &selection.anchor;
    let Some(Node::Text(leaf)) = doc.node(&anchor.path) else {
        return Marks::default();
    };

    // At the start of a leaf, typing continues the previous leaf of the block.
    if anchor.offset == 0 {
        let leaves = text_leaves(doc);
        let block = text_blocks(doc)
            .into_iter()
            .find(|tb| is_ancestor(&tb.path, &anchor.path));
        let position = leaves.iter().position(|(path, _)| *path == anchor.path);
        if let (Some(block), Some(pos)) = (block, position) {
            if let Some((prev_path, prev)) = pos.checked_sub(1).and_then(|ix| leaves.get(ix)) {
                if is_ancestor(&block.path, prev_path) {
                    return prev.marks;
                }
            }
        }
    }

    leaf.marks
}

pub fn toggle_mark(editor: &mut Editor, mark: Mark) -> Result<(), CommandError> {
    let Some(selection) = editor.selection().cloned() else {
        return Ok(());
    };
    let active = is_mark_active(editor, mark);

    if selection.is_collapsed() {
        let marks = active_marks(editor).unwrap_or_default().with(mark, !active);
        tracing::trace!(%mark, on = !active, "pending marks updated");
        editor.set_pending_marks(Some(marks));
        return Ok(());
    }

    let Some(tx) = set_mark_transaction(editor.doc(), &selection, mark, !active) else {
        return Ok(());
    };
    editor
        .apply(tx)
        .map_err(|e| CommandError::new(format!("Failed to toggle {mark}: {e}")))
}

/// Adds or removes `mark` on every text range the selection covers,
/// splitting leaves at the edges.
pub fn set_mark_transaction(
    doc: &Document,
    selection: &Selection,
    mark: Mark,
    on: bool,
) -> Option<Transaction> {
    let anchor = block_point(doc, &selection.anchor)?;
    let focus = block_point(doc, &selection.focus)?;
    let (start, end) = selected_block_span(doc, selection)?;

    let paths: Vec<_> = text_blocks(doc)
        .into_iter()
        .map(|tb| tb.path)
        .enumerate()
        .filter(|(ordinal, _)| (start.block..=end.block).contains(ordinal))
        .collect();

    let mut next = doc.clone();
    for (ordinal, path) in paths {
        let from = if ordinal == start.block { start.offset } else { 0 };
        let to = if ordinal == end.block {
            end.offset
        } else {
            usize::MAX
        };
        if from >= to {
            continue;
        }
        let Some(block) = block_mut(&mut next, &path) else {
            continue;
        };
        block.children = map_inline_range(&block.children, from, to, |mut middle| {
            map_leaves(&mut middle, &mut |leaf| leaf.marks.set(mark, on));
            middle
        });
    }

    if next == *doc {
        return None;
    }

    let selection_after = selection_at(&next, anchor, focus)?;
    Some(
        Transaction::new(replace_document_ops(doc, &next))
            .selection_after(selection_after)
            .source(format!("command:marks.toggle:{mark}")),
    )
}
