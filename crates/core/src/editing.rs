use crate::core::{BlockNode, Document, Editor, Marks, Node, Point, Selection, clamp_to_char_boundary};
use crate::location::{
    Affinity, BlockPoint, block_mut, map_inline_range, point_at, remove_pruning,
    replace_document_ops, siblings_mut, split_inline, text_blocks, text_leaves,
};
use crate::blocks::selected_block_span;
use crate::marks::marks_at;
use crate::ops::{Op, Path, Transaction};
use crate::plugin::CommandError;

pub const INSERT_TEXT_SOURCE: &str = "input:insert_text";
pub const INSERT_DATA_SOURCE: &str = "input:insert_data";

pub fn insert_text(editor: &mut Editor, text: &str) -> Result<(), CommandError> {
    insert_with_source(editor, text, INSERT_TEXT_SOURCE)
}

/// Pasted plain text. Goes through the same path as typing.
pub fn insert_data(editor: &mut Editor, text: &str) -> Result<(), CommandError> {
    insert_with_source(editor, text, INSERT_DATA_SOURCE)
}

fn insert_with_source(editor: &mut Editor, text: &str, source: &str) -> Result<(), CommandError> {
    if text.is_empty() {
        return Ok(());
    }
    let Some(selection) = editor.selection() else {
        return Ok(());
    };
    let Some(tx) = insert_text_transaction(editor.doc(), selection, editor.pending_marks(), text)
    else {
        return Ok(());
    };
    editor
        .apply(tx.source(source).input_text(text))
        .map_err(|e| CommandError::new(format!("Failed to insert text: {e}")))
}

pub fn insert_text_transaction(
    doc: &Document,
    selection: &Selection,
    pending: Option<Marks>,
    text: &str,
) -> Option<Transaction> {
    if selection.is_collapsed() {
        let point = &selection.anchor;
        let Some(Node::Text(leaf)) = doc.node(&point.path) else {
            return None;
        };
        if pending.is_none_or(|marks| marks == leaf.marks) {
            let offset = clamp_to_char_boundary(&leaf.text, point.offset);
            let cursor = Point::new(point.path.clone(), offset + text.len());
            return Some(
                Transaction::new(vec![Op::InsertText {
                    path: point.path.clone(),
                    offset,
                    text: text.to_string(),
                }])
                .selection_after(Selection::collapsed(cursor)),
            );
        }
    }

    let marks = pending.unwrap_or_else(|| marks_at(doc, selection));
    let (start, end) = selected_block_span(doc, selection)?;

    let mut next = doc.clone();
    delete_between(&mut next, start, end);

    let path = text_blocks(&next).get(start.block)?.path.clone();
    let block = block_mut(&mut next, &path)?;
    block.children = map_inline_range(&block.children, start.offset, start.offset, |_| {
        vec![Node::marked(text, marks)]
    });

    let cursor = point_at(
        &next,
        BlockPoint {
            block: start.block,
            offset: start.offset + text.len(),
        },
        Affinity::Backward,
    )?;
    Some(Transaction::new(replace_document_ops(doc, &next)).selection_after(Selection::collapsed(cursor)))
}

/// Removes the content between two block points, merging the tail of the last
/// block into the first.
fn delete_between(doc: &mut Document, start: BlockPoint, end: BlockPoint) {
    if start == end {
        return;
    }
    let paths: Vec<Path> = text_blocks(doc).into_iter().map(|tb| tb.path).collect();
    let (Some(first), Some(last)) = (paths.get(start.block), paths.get(end.block)) else {
        return;
    };

    if start.block == end.block {
        if let Some(block) = block_mut(doc, first) {
            block.children = non_empty(map_inline_range(
                &block.children,
                start.offset,
                end.offset,
                |_| Vec::new(),
            ));
        }
        return;
    }

    let tail = match doc.node(last) {
        Some(Node::Block(block)) => split_inline(&block.children, end.offset).1,
        _ => Vec::new(),
    };
    if let Some(block) = block_mut(doc, first) {
        let (mut head, _) = split_inline(&block.children, start.offset);
        head.extend(tail);
        block.children = non_empty(head);
    }
    for path in paths[start.block + 1..=end.block].iter().rev() {
        remove_pruning(doc, path);
    }
}

fn non_empty(mut children: Vec<Node>) -> Vec<Node> {
    if children.is_empty() {
        children.push(Node::text(""));
    }
    children
}

/// Splits the current text block at the cursor; the new block keeps the kind
/// and alignment of the old one.
pub fn insert_break(editor: &mut Editor) -> Result<(), CommandError> {
    let Some(selection) = editor.selection() else {
        return Ok(());
    };
    let Some(tx) = insert_break_transaction(editor.doc(), selection) else {
        return Ok(());
    };
    editor
        .apply(tx)
        .map_err(|e| CommandError::new(format!("Failed to insert break: {e}")))
}

pub fn insert_break_transaction(doc: &Document, selection: &Selection) -> Option<Transaction> {
    let (start, end) = selected_block_span(doc, selection)?;

    let mut next = doc.clone();
    delete_between(&mut next, start, end);

    let path = text_blocks(&next).get(start.block)?.path.clone();
    let Some(Node::Block(block)) = next.node(&path).cloned() else {
        return None;
    };
    let (left, right) = split_inline(&block.children, start.offset);
    let (&ix, parent) = path.split_last()?;
    let siblings = siblings_mut(&mut next, parent)?;
    siblings[ix] = Node::Block(BlockNode {
        children: non_empty(left),
        ..block.clone()
    });
    siblings.insert(
        ix + 1,
        Node::Block(BlockNode {
            children: non_empty(right),
            ..block
        }),
    );

    let cursor = point_at(
        &next,
        BlockPoint {
            block: start.block + 1,
            offset: 0,
        },
        Affinity::Forward,
    )?;
    Some(
        Transaction::new(replace_document_ops(doc, &next))
            .selection_after(Selection::collapsed(cursor))
            .source("command:core.insert_break"),
    )
}

/// Moves the cursor one offset, stepping between adjacent leaves as a
/// separate position so the caret can enter and leave links.
pub fn move_by_offset(editor: &mut Editor, reverse: bool) {
    let Some(selection) = editor.selection() else {
        return;
    };
    let anchor = step(editor.doc(), &selection.anchor, reverse);
    let focus = step(editor.doc(), &selection.focus, reverse);
    editor.set_selection(Selection::new(anchor, focus));
}

fn step(doc: &Document, point: &Point, reverse: bool) -> Point {
    let leaves = text_leaves(doc);
    let Some(pos) = leaves.iter().position(|(path, _)| *path == point.path) else {
        return point.clone();
    };
    let text = &leaves[pos].1.text;
    let offset = clamp_to_char_boundary(text, point.offset);

    if reverse {
        if let Some(ch) = text[..offset].chars().next_back() {
            return Point::new(point.path.clone(), offset - ch.len_utf8());
        }
        match pos.checked_sub(1).and_then(|ix| leaves.get(ix)) {
            Some((path, leaf)) => Point::new(path.clone(), leaf.text.len()),
            None => point.clone(),
        }
    } else {
        if let Some(ch) = text[offset..].chars().next() {
            return Point::new(point.path.clone(), offset + ch.len_utf8());
        }
        match leaves.get(pos + 1) {
            Some((path, _)) => Point::new(path.clone(), 0),
            None => point.clone(),
        }
    }
}
