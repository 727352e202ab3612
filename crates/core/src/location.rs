use std::cmp::Ordering;

use crate::core::{
    BlockNode, Document, Node, Point, Selection, TextNode, clamp_to_char_boundary, node_mut,
};
use crate::ops::{Op, Path};

/// Orders two paths, treating a path and any of its ancestors as equal.
pub fn compare_paths(a: &[usize], b: &[usize]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

pub fn is_ancestor(ancestor: &[usize], path: &[usize]) -> bool {
    ancestor.len() < path.len() && path.starts_with(ancestor)
}

pub fn parent_path(path: &[usize]) -> &[usize] {
    path.split_last().map(|(_, parent)| parent).unwrap_or(&[])
}

pub fn child_path(parent: &[usize], ix: usize) -> Path {
    let mut path = parent.to_vec();
    path.push(ix);
    path
}

/// Every text leaf of the document with its path, in document order.
pub fn text_leaves(doc: &Document) -> Vec<(Path, &TextNode)> {
    let mut out = Vec::new();
    collect_leaves(&doc.children, &mut Vec::new(), &mut out);
    out
}

fn collect_leaves<'a>(nodes: &'a [Node], path: &mut Vec<usize>, out: &mut Vec<(Path, &'a TextNode)>) {
    for (ix, node) in nodes.iter().enumerate() {
        path.push(ix);
        match node {
            Node::Text(t) => out.push((path.clone(), t)),
            Node::Block(block) => collect_leaves(&block.children, path, out),
            Node::Link(link) => collect_leaves(&link.children, path, out),
        }
        path.pop();
    }
}

/// Leaves of a block's inline content, descending into links.
pub fn inline_leaves<'a>(block_path: &[usize], children: &'a [Node]) -> Vec<(Path, &'a TextNode)> {
    let mut out = Vec::new();
    collect_leaves(children, &mut block_path.to_vec(), &mut out);
    out
}

pub struct TextBlock<'a> {
    pub path: Path,
    pub block: &'a BlockNode,
}

/// Blocks holding inline content, in document order. Their position in this
/// list is the block ordinal used by [`BlockPoint`].
pub fn text_blocks(doc: &Document) -> Vec<TextBlock<'_>> {
    fn walk<'a>(nodes: &'a [Node], path: &mut Vec<usize>, out: &mut Vec<TextBlock<'a>>) {
        for (ix, node) in nodes.iter().enumerate() {
            let Node::Block(block) = node else {
                continue;
            };
            path.push(ix);
            if block.is_text_block() {
                out.push(TextBlock {
                    path: path.clone(),
                    block,
                });
            } else {
                walk(&block.children, path, out);
            }
            path.pop();
        }
    }

    let mut out = Vec::new();
    walk(&doc.children, &mut Vec::new(), &mut out);
    out
}

/// Every node whose path falls between two points, ancestors included.
pub fn nodes_in_range<'a>(doc: &'a Document, start: &Point, end: &Point) -> Vec<(Path, &'a Node)> {
    fn walk<'a>(
        nodes: &'a [Node],
        path: &mut Vec<usize>,
        start: &[usize],
        end: &[usize],
        out: &mut Vec<(Path, &'a Node)>,
    ) {
        for (ix, node) in nodes.iter().enumerate() {
            path.push(ix);
            let after_start = compare_paths(path, start) != Ordering::Less;
            let before_end = compare_paths(path, end) != Ordering::Greater;
            if after_start && before_end {
                out.push((path.clone(), node));
                if let Some(children) = node.children() {
                    walk(children, path, start, end, out);
                }
            }
            path.pop();
        }
    }

    let mut out = Vec::new();
    walk(&doc.children, &mut Vec::new(), &start.path, &end.path, &mut out);
    out
}

/// Pulls back a range that ends at offset 0 of a later block so it stops at
/// the end of the previous text leaf.
pub fn unhang_range(doc: &Document, start: Point, end: Point) -> (Point, Point) {
    if start.offset != 0 || end.offset != 0 || start == end {
        return (start, end);
    }
    if end.path.last().is_some_and(|&ix| ix > 0) {
        return (start, end);
    }

    let block_path = text_blocks(doc)
        .into_iter()
        .find(|tb| is_ancestor(&tb.path, &end.path))
        .map(|tb| tb.path)
        .unwrap_or_default();

    let leaves = text_leaves(doc);
    let candidates = leaves
        .iter()
        .rev()
        .filter(|(path, _)| path.cmp(&end.path).is_lt() && path.cmp(&start.path).is_ge());
    for (path, leaf) in candidates {
        if !leaf.text.is_empty() || !is_ancestor(&block_path, path) {
            let end = Point::new(path.clone(), leaf.text.len());
            return (start, end);
        }
    }

    (start, end)
}

/// Selection edges in document order, unhung.
pub fn selection_range(doc: &Document, selection: &Selection) -> (Point, Point) {
    let (start, end) = selection.edges();
    unhang_range(doc, start, end)
}

/// Position measured in text-block ordinal and byte offset into the block's
/// inline content. Survives restructuring that keeps the text blocks and their
/// text intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPoint {
    pub block: usize,
    pub offset: usize,
}

/// Which leaf wins when an offset sits on a leaf boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Backward,
    Forward,
}

pub fn block_point(doc: &Document, point: &Point) -> Option<BlockPoint> {
    let blocks = text_blocks(doc);
    let (ordinal, tb) = blocks
        .iter()
        .enumerate()
        .find(|(_, tb)| is_ancestor(&tb.path, &point.path))?;

    let mut offset = 0usize;
    for (path, leaf) in inline_leaves(&tb.path, &tb.block.children) {
        if path == point.path {
            return Some(BlockPoint {
                block: ordinal,
                offset: offset + point.offset.min(leaf.text.len()),
            });
        }
        offset += leaf.text.len();
    }
    None
}

pub fn point_at(doc: &Document, at: BlockPoint, affinity: Affinity) -> Option<Point> {
    let blocks = text_blocks(doc);
    let tb = blocks.get(at.block).or_else(|| blocks.last())?;
    let leaves = inline_leaves(&tb.path, &tb.block.children);

    let mut remaining = at.offset;
    for (ix, (path, leaf)) in leaves.iter().enumerate() {
        let len = leaf.text.len();
        let fits = match affinity {
            Affinity::Backward => remaining <= len,
            Affinity::Forward => remaining < len || (remaining == len && ix + 1 == leaves.len()),
        };
        if fits {
            return Some(Point::new(
                path.clone(),
                clamp_to_char_boundary(&leaf.text, remaining),
            ));
        }
        remaining -= len;
    }

    leaves
        .last()
        .map(|(path, leaf)| Point::new(path.clone(), leaf.text.len()))
}

/// Maps a selection recorded as block points onto a restructured document,
/// keeping its direction.
pub fn selection_at(doc: &Document, anchor: BlockPoint, focus: BlockPoint) -> Option<Selection> {
    if anchor == focus {
        return point_at(doc, anchor, Affinity::Backward).map(Selection::collapsed);
    }
    let backward = (focus.block, focus.offset) < (anchor.block, anchor.offset);
    let (anchor_aff, focus_aff) = if backward {
        (Affinity::Backward, Affinity::Forward)
    } else {
        (Affinity::Forward, Affinity::Backward)
    };
    Some(Selection::new(
        point_at(doc, anchor, anchor_aff)?,
        point_at(doc, focus, focus_aff)?,
    ))
}

/// Splits inline content at a byte offset. Links straddling the offset are
/// split into two links with the same url.
pub fn split_inline(children: &[Node], at: usize) -> (Vec<Node>, Vec<Node>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        let len = node.text_len();
        if cursor + len <= at {
            left.push(node.clone());
        } else if cursor >= at {
            right.push(node.clone());
        } else {
            let local = at - cursor;
            match node {
                Node::Text(t) => {
                    let ix = clamp_to_char_boundary(&t.text, local);
                    left.push(Node::marked(&t.text[..ix], t.marks));
                    right.push(Node::marked(&t.text[ix..], t.marks));
                }
                Node::Link(link) => {
                    let (a, b) = split_inline(&link.children, local);
                    left.push(Node::link(link.url.clone(), a));
                    right.push(Node::link(link.url.clone(), b));
                }
                Node::Block(_) => left.push(node.clone()),
            }
        }
        cursor += len;
    }

    (left, right)
}

/// Rebuilds inline content with `f` applied to the slice between two offsets.
pub fn map_inline_range(
    children: &[Node],
    start: usize,
    end: usize,
    f: impl FnOnce(Vec<Node>) -> Vec<Node>,
) -> Vec<Node> {
    let (mut out, rest) = split_inline(children, start);
    let (middle, after) = split_inline(&rest, end.saturating_sub(start));
    out.extend(f(middle));
    out.extend(after);
    out
}

pub fn map_leaves(nodes: &mut [Node], f: &mut impl FnMut(&mut TextNode)) {
    for node in nodes {
        match node {
            Node::Text(t) => f(t),
            Node::Block(block) => map_leaves(&mut block.children, f),
            Node::Link(link) => map_leaves(&mut link.children, f),
        }
    }
}

pub fn block_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Option<&'a mut BlockNode> {
    match node_mut(doc, path).ok()? {
        Node::Block(block) => Some(block),
        _ => None,
    }
}

pub fn siblings_mut<'a>(doc: &'a mut Document, parent: &[usize]) -> Option<&'a mut Vec<Node>> {
    if parent.is_empty() {
        return Some(&mut doc.children);
    }
    Some(&mut block_mut(doc, parent)?.children)
}

/// Removes the node at `path`, then any ancestor block left without children.
pub fn remove_pruning(doc: &mut Document, path: &[usize]) {
    let mut path = path.to_vec();
    while let Some((&ix, parent)) = path.split_last() {
        let parent = parent.to_vec();
        let Some(siblings) = siblings_mut(doc, &parent) else {
            return;
        };
        if ix < siblings.len() {
            siblings.remove(ix);
        }
        if !siblings.is_empty() || parent.is_empty() {
            return;
        }
        path = parent;
    }
}

/// Ops turning `old` into `new`, replacing the differing run of top-level
/// blocks.
pub fn replace_document_ops(old: &Document, new: &Document) -> Vec<Op> {
    let prefix = old
        .children
        .iter()
        .zip(&new.children)
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = old.children.len().min(new.children.len()) - prefix;
    let suffix = old
        .children
        .iter()
        .rev()
        .zip(new.children.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let mut ops = Vec::new();
    for ix in (prefix..old.children.len() - suffix).rev() {
        ops.push(Op::RemoveNode { path: vec![ix] });
    }
    for (k, node) in new.children[prefix..new.children.len() - suffix]
        .iter()
        .enumerate()
    {
        ops.push(Op::InsertNode {
            path: vec![prefix + k],
            node: node.clone(),
        });
    }
    ops
}
