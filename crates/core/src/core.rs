use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ops::{BlockPatch, Op, Path, Transaction};
use crate::plugin::{CommandError, PluginRegistry, QueryError, TransactionPreview};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    pub fn node(&self, path: &[usize]) -> Option<&Node> {
        node_at_path(self, path)
    }

    /// Concatenated text of every block, one line per top-level block.
    pub fn plain_text(&self) -> String {
        self.children
            .iter()
            .map(Node::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Block(BlockNode),
    Link(LinkNode),
    Text(TextNode),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks: Marks::default(),
        })
    }

    pub fn marked(text: impl Into<String>, marks: Marks) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks,
        })
    }

    pub fn block(kind: BlockKind, children: Vec<Node>) -> Self {
        Node::Block(BlockNode {
            kind,
            align: None,
            children,
        })
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::block(BlockKind::Paragraph, vec![Node::text(text)])
    }

    pub fn list_item(text: impl Into<String>) -> Self {
        Node::block(BlockKind::ListItem, vec![Node::text(text)])
    }

    pub fn list(kind: BlockKind, items: Vec<Node>) -> Self {
        Node::block(kind, items)
    }

    pub fn link(url: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Link(LinkNode {
            url: url.into(),
            children,
        })
    }

    pub fn is_inline(&self) -> bool {
        !matches!(self, Node::Block(_))
    }

    pub fn children(&self) -> Option<&[Node]> {
        match self {
            Node::Block(block) => Some(&block.children),
            Node::Link(link) => Some(&link.children),
            Node::Text(_) => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Block(block) => Some(&mut block.children),
            Node::Link(link) => Some(&mut link.children),
            Node::Text(_) => None,
        }
    }

    /// Length in bytes of all text leaves below this node.
    pub fn text_len(&self) -> usize {
        match self {
            Node::Text(t) => t.text.len(),
            Node::Block(block) => block.children.iter().map(Node::text_len).sum(),
            Node::Link(link) => link.children.iter().map(Node::text_len).sum(),
        }
    }

    pub fn plain_text(&self) -> String {
        match self {
            Node::Text(t) => t.text.clone(),
            Node::Link(link) => link.children.iter().map(Node::plain_text).collect(),
            Node::Block(block) => {
                if block.is_text_block() {
                    block.children.iter().map(Node::plain_text).collect()
                } else {
                    block
                        .children
                        .iter()
                        .map(Node::plain_text)
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockNode {
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<Align>,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl BlockNode {
    /// A block that holds inline content only (no nested blocks).
    pub fn is_text_block(&self) -> bool {
        !self.children.iter().any(|n| matches!(n, Node::Block(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkNode {
    pub url: String,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown format: {0}")]
pub struct UnknownFormat(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    Paragraph,
    HeadingOne,
    HeadingTwo,
    BlockQuote,
    BulletedList,
    NumberedList,
    ListItem,
}

impl BlockKind {
    pub const ALL: [BlockKind; 7] = [
        BlockKind::Paragraph,
        BlockKind::HeadingOne,
        BlockKind::HeadingTwo,
        BlockKind::BlockQuote,
        BlockKind::BulletedList,
        BlockKind::NumberedList,
        BlockKind::ListItem,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::Paragraph => "paragraph",
            BlockKind::HeadingOne => "heading-one",
            BlockKind::HeadingTwo => "heading-two",
            BlockKind::BlockQuote => "block-quote",
            BlockKind::BulletedList => "bulleted-list",
            BlockKind::NumberedList => "numbered-list",
            BlockKind::ListItem => "list-item",
        }
    }

    pub fn is_list(self) -> bool {
        matches!(self, BlockKind::BulletedList | BlockKind::NumberedList)
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockKind {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownFormat(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
    Justify,
}

impl Align {
    pub const ALL: [Align; 4] = [Align::Left, Align::Center, Align::Right, Align::Justify];

    pub fn as_str(self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
            Align::Justify => "justify",
        }
    }
}

impl fmt::Display for Align {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Align {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Align::ALL
            .into_iter()
            .find(|align| align.as_str() == s)
            .ok_or_else(|| UnknownFormat(s.to_string()))
    }
}

/// Argument of the block toggle: either a block kind or an alignment value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockFormat {
    Kind(BlockKind),
    Align(Align),
}

impl BlockFormat {
    pub fn is_list(self) -> bool {
        matches!(self, BlockFormat::Kind(kind) if kind.is_list())
    }

    pub fn is_align(self) -> bool {
        matches!(self, BlockFormat::Align(_))
    }

    pub(crate) fn matches(self, block: &BlockNode) -> bool {
        match self {
            BlockFormat::Kind(kind) => block.kind == kind,
            BlockFormat::Align(align) => block.align == Some(align),
        }
    }
}

impl From<BlockKind> for BlockFormat {
    fn from(kind: BlockKind) -> Self {
        BlockFormat::Kind(kind)
    }
}

impl From<Align> for BlockFormat {
    fn from(align: Align) -> Self {
        BlockFormat::Align(align)
    }
}

impl fmt::Display for BlockFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockFormat::Kind(kind) => kind.fmt(f),
            BlockFormat::Align(align) => align.fmt(f),
        }
    }
}

impl FromStr for BlockFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(align) = s.parse::<Align>() {
            return Ok(BlockFormat::Align(align));
        }
        s.parse::<BlockKind>().map(BlockFormat::Kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    Bold,
    Italic,
    Strikethrough,
}

impl Mark {
    pub const ALL: [Mark; 3] = [Mark::Bold, Mark::Italic, Mark::Strikethrough];

    pub fn as_str(self) -> &'static str {
        match self {
            Mark::Bold => "bold",
            Mark::Italic => "italic",
            Mark::Strikethrough => "strikethrough",
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mark {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mark::ALL
            .into_iter()
            .find(|mark| mark.as_str() == s)
            .ok_or_else(|| UnknownFormat(s.to_string()))
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub strikethrough: bool,
}

impl Marks {
    pub fn contains(&self, mark: Mark) -> bool {
        match mark {
            Mark::Bold => self.bold,
            Mark::Italic => self.italic,
            Mark::Strikethrough => self.strikethrough,
        }
    }

    pub fn set(&mut self, mark: Mark, on: bool) {
        match mark {
            Mark::Bold => self.bold = on,
            Mark::Italic => self.italic = on,
            Mark::Strikethrough => self.strikethrough = on,
        }
    }

    pub fn with(mut self, mark: Mark, on: bool) -> Self {
        self.set(mark, on);
        self
    }

    pub fn is_empty(&self) -> bool {
        !(self.bold || self.italic || self.strikethrough)
    }

    pub fn iter(&self) -> impl Iterator<Item = Mark> + '_ {
        Mark::ALL.into_iter().filter(|mark| self.contains(*mark))
    }
}

impl FromIterator<Mark> for Marks {
    fn from_iter<I: IntoIterator<Item = Mark>>(iter: I) -> Self {
        let mut marks = Marks::default();
        for mark in iter {
            marks.set(mark, true);
        }
        marks
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }

    /// Document order of two leaf points.
    pub fn cmp_position(&self, other: &Point) -> std::cmp::Ordering {
        self.path
            .cmp(&other.path)
            .then(self.offset.cmp(&other.offset))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn is_backward(&self) -> bool {
        self.focus.cmp_position(&self.anchor).is_lt()
    }

    /// `(start, end)` in document order.
    pub fn edges(&self) -> (Point, Point) {
        if self.is_backward() {
            (self.focus.clone(), self.anchor.clone())
        } else {
            (self.anchor.clone(), self.focus.clone())
        }
    }
}

#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub inverse_ops: Vec<Op>,
    pub selection_before: Option<Selection>,
    pub selection_after: Option<Selection>,
}

#[derive(Debug, Clone, Default)]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
}

impl EditorConfig {
    fn with_defaults(mut self) -> Self {
        if self.max_undo == 0 {
            self.max_undo = 200;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = 100;
        }
        self
    }
}

pub struct Editor {
    doc: Document,
    selection: Option<Selection>,
    pending_marks: Option<Marks>,
    registry: PluginRegistry,
    config: EditorConfig,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
}

impl Editor {
    pub fn new(
        doc: Document,
        selection: impl Into<Option<Selection>>,
        registry: PluginRegistry,
    ) -> Self {
        Self::with_config(doc, selection, registry, EditorConfig::default())
    }

    pub fn with_config(
        doc: Document,
        selection: impl Into<Option<Selection>>,
        registry: PluginRegistry,
        config: EditorConfig,
    ) -> Self {
        let mut editor = Self {
            doc,
            selection: selection.into(),
            pending_marks: None,
            registry,
            config: config.with_defaults(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        };
        editor.normalize_in_place();
        editor
    }

    pub fn with_core_plugins() -> Self {
        let doc = Document {
            children: vec![Node::paragraph("")],
        };
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        Self::new(doc, selection, PluginRegistry::core())
    }

    pub fn with_richtext_plugins() -> Self {
        let doc = Document {
            children: vec![Node::paragraph("")],
        };
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        Self::new(doc, selection, PluginRegistry::richtext())
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn set_selection(&mut self, selection: impl Into<Option<Selection>>) {
        self.selection = selection.into();
        self.pending_marks = None;
        self.normalize_selection_in_place();
    }

    pub fn deselect(&mut self) {
        self.set_selection(None);
    }

    /// Marks the next inserted text will carry, when they differ from the
    /// marks at the cursor.
    pub fn pending_marks(&self) -> Option<Marks> {
        self.pending_marks
    }

    pub(crate) fn set_pending_marks(&mut self, marks: Option<Marks>) {
        self.pending_marks = marks;
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let Some(redo_ops) = self.replay(inverse_ops, selection_before.clone()) else {
            return false;
        };

        self.redo_stack.push(UndoRecord {
            selection_before,
            selection_after,
            inverse_ops: redo_ops,
        });
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let Some(undo_ops) = self.replay(inverse_ops, selection_after.clone()) else {
            return false;
        };

        self.undo_stack.push(UndoRecord {
            selection_before,
            selection_after,
            inverse_ops: undo_ops,
        });
        true
    }

    fn replay(&mut self, ops: Vec<Op>, selection: Option<Selection>) -> Option<Vec<Op>> {
        let mut doc = self.doc.clone();
        let mut scratch = self.selection.clone();

        let mut inverse: Vec<Op> = Vec::with_capacity(ops.len());
        for op in ops {
            match apply_op_to(&mut doc, &mut scratch, op) {
                Ok(inv) => inverse.push(inv),
                Err(err) => {
                    tracing::warn!(%err, "history replay failed, keeping current document");
                    return None;
                }
            }
        }
        inverse.reverse();

        self.doc = doc;
        self.selection = selection;
        self.pending_marks = None;
        self.normalize_in_place();
        Some(inverse)
    }

    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        let tx = self.transform_transaction(tx);
        let source = tx.meta.source.clone().unwrap_or_default();
        let selection_before = self.selection.clone();

        let mut doc = self.doc.clone();
        let mut selection = self.selection.clone();

        let mut inverse_ops: Vec<Op> = Vec::with_capacity(tx.ops.len());
        for op in tx.ops.iter().cloned() {
            let inv = apply_op_to(&mut doc, &mut selection, op)?;
            inverse_ops.push(inv);
        }

        if let Some(sel) = tx.selection_after {
            selection = Some(sel);
        }

        let mut inverse_normalize =
            normalize_with_inverse_ops(&self.registry, &self.config, &mut doc, &mut selection)?;
        inverse_ops.append(&mut inverse_normalize);
        inverse_ops.reverse();

        if let Err(err) = validate_document(&doc) {
            tracing::warn!(%source, %err, "rejecting transaction");
            return Err(err);
        }

        self.doc = doc;
        self.selection = selection;
        self.pending_marks = None;
        self.normalize_selection_in_place();

        tracing::debug!(%source, ops = tx.ops.len(), "applied transaction");

        if inverse_ops.is_empty() {
            return Ok(());
        }

        let selection_after = self.selection.clone();
        self.undo_stack.push(UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        });
        self.redo_stack.clear();
        if self.undo_stack.len() > self.config.max_undo {
            self.undo_stack.remove(0);
        }

        Ok(())
    }

    fn transform_transaction(&self, mut tx: Transaction) -> Transaction {
        for transform in self.registry.transaction_transforms() {
            if let Some(next) = transform.transform(self, &tx) {
                tracing::trace!(transform = transform.id(), "transaction rewritten");
                tx = next;
            }
        }
        tx
    }

    pub fn preview_transaction(&self, tx: &Transaction) -> Result<TransactionPreview, ApplyError> {
        let mut doc = self.doc.clone();
        let mut selection = self.selection.clone();

        for op in tx.ops.iter().cloned() {
            let _ = apply_op_to(&mut doc, &mut selection, op)?;
        }

        if let Some(sel) = &tx.selection_after {
            selection = Some(sel.clone());
        }

        normalize_with_inverse_ops(&self.registry, &self.config, &mut doc, &mut selection)?;
        validate_document(&doc)?;

        let selection = selection.map(|sel| self.registry.normalize_selection(&doc, &sel));

        Ok(TransactionPreview { doc, selection })
    }

    pub fn run_command(&mut self, id: &str, args: Option<Value>) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::new(format!("Unknown command: {id}")));
        };
        (command.handler)(self, args)
    }

    pub fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, QueryError> {
        let Some(query) = self.registry.query(id) else {
            return Err(QueryError::new(format!("Unknown query: {id}")));
        };
        (query.handler)(self, args)
    }

    pub fn run_query<T>(&self, id: &str, args: Option<Value>) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let value = self.run_query_json(id, args)?;
        serde_json::from_value(value)
            .map_err(|err| QueryError::new(format!("Failed to decode query result: {err}")))
    }

    fn normalize_in_place(&mut self) {
        let mut doc = self.doc.clone();
        let mut selection = self.selection.clone();
        match normalize_with_inverse_ops(&self.registry, &self.config, &mut doc, &mut selection)
            .and_then(|_| validate_document(&doc))
        {
            Ok(()) => {
                self.doc = doc;
                self.selection = selection;
            }
            Err(err) => tracing::warn!(%err, "document left unnormalized"),
        }
        self.normalize_selection_in_place();
    }

    fn normalize_selection_in_place(&mut self) {
        if let Some(selection) = &self.selection {
            self.selection = Some(self.registry.normalize_selection(&self.doc, selection));
        }
    }
}

fn normalize_with_inverse_ops(
    registry: &PluginRegistry,
    config: &EditorConfig,
    doc: &mut Document,
    selection: &mut Option<Selection>,
) -> Result<Vec<Op>, ApplyError> {
    let mut inverse_ops: Vec<Op> = Vec::new();
    for _ in 0..config.max_normalize_iterations {
        let ops = registry.normalize(doc);
        if ops.is_empty() {
            return Ok(inverse_ops);
        }
        tracing::trace!(ops = ops.len(), "normalize pass");
        for op in ops {
            let inv = apply_op_to(doc, selection, op)?;
            inverse_ops.push(inv);
        }
    }
    tracing::warn!(
        iterations = config.max_normalize_iterations,
        "normalization did not converge"
    );
    Err(ApplyError::NormalizeDidNotConverge)
}

/// Checks the structural invariants normalization is expected to establish.
pub fn validate_document(doc: &Document) -> Result<(), ApplyError> {
    fn walk(nodes: &[Node], path: &mut Vec<usize>) -> Result<(), String> {
        for (ix, node) in nodes.iter().enumerate() {
            path.push(ix);
            match node {
                Node::Text(_) => {}
                Node::Block(block) => {
                    if block.children.is_empty() {
                        return Err(format!("{} at {path:?} has no children", block.kind));
                    }
                    if block.kind.is_list() {
                        let stray = block.children.iter().any(|child| {
                            !matches!(child, Node::Block(b) if b.kind == BlockKind::ListItem)
                        });
                        if stray {
                            return Err(format!("{} at {path:?} holds a non list-item", block.kind));
                        }
                    }
                    walk(&block.children, path)?;
                }
                Node::Link(link) => {
                    if link.children.is_empty() {
                        return Err(format!("link at {path:?} has no children"));
                    }
                    if link.children.iter().any(|n| matches!(n, Node::Block(_))) {
                        return Err(format!("link at {path:?} contains a block"));
                    }
                    walk(&link.children, path)?;
                }
            }
            path.pop();
        }
        Ok(())
    }

    if let Some(ix) = doc
        .children
        .iter()
        .position(|n| !matches!(n, Node::Block(_)))
    {
        return Err(ApplyError::MalformedDocument(format!(
            "top-level node {ix} is not a block"
        )));
    }

    walk(&doc.children, &mut Vec::new()).map_err(ApplyError::MalformedDocument)
}

pub(crate) fn apply_op_to(
    doc: &mut Document,
    selection: &mut Option<Selection>,
    op: Op,
) -> Result<Op, ApplyError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let text_node = node_text_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&text_node.text, offset);
            text_node.text.insert_str(offset, &text);
            if let Some(selection) = selection {
                transform_selection_insert_text(selection, &path, offset, text.len());
            }
            Ok(Op::RemoveText {
                path,
                range: offset..offset + text.len(),
            })
        }
        Op::RemoveText { path, range } => {
            let text_node = node_text_mut(doc, &path)?;
            let start =
                clamp_to_char_boundary(&text_node.text, range.start.min(text_node.text.len()));
            let end = clamp_to_char_boundary(&text_node.text, range.end.min(text_node.text.len()));
            if start >= end {
                return Ok(Op::InsertText {
                    path,
                    offset: start,
                    text: String::new(),
                });
            }
            let removed = text_node.text[start..end].to_string();
            text_node.text.replace_range(start..end, "");
            if let Some(selection) = selection {
                transform_selection_remove_text(selection, &path, start..end);
            }
            Ok(Op::InsertText {
                path,
                offset: start,
                text: removed,
            })
        }
        Op::InsertNode { path, node } => {
            insert_node(doc, &path, node)?;
            if let Some(selection) = selection {
                transform_selection_insert_node(selection, &path);
            }
            Ok(Op::RemoveNode { path })
        }
        Op::RemoveNode { path } => {
            let removed = remove_node(doc, &path)?;
            if let Some(selection) = selection {
                transform_selection_remove_node(selection, &path, &removed, doc);
            }
            Ok(Op::InsertNode {
                path,
                node: removed,
            })
        }
        Op::SetBlock { path, patch } => {
            let Node::Block(block) = node_mut(doc, &path)? else {
                return Err(ApplyError::InvalidPath("Expected Block node".into()));
            };
            let old = patch_apply(block, &patch);
            Ok(Op::SetBlock { path, patch: old })
        }
    }
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("normalization did not converge")]
    NormalizeDidNotConverge,
    #[error("malformed document: {0}")]
    MalformedDocument(String),
}

impl From<PathError> for ApplyError {
    fn from(value: PathError) -> Self {
        ApplyError::InvalidPath(value.0)
    }
}

#[derive(Debug)]
pub struct PathError(pub String);

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

fn transform_selection_insert_text(
    selection: &mut Selection,
    path: &[usize],
    offset: usize,
    len: usize,
) {
    // A point sitting exactly at the insertion offset stays put; callers that
    // want the caret after the text say so with `selection_after`.
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path == path && point.offset > offset {
            point.offset = point.offset.saturating_add(len);
        }
    }
}

fn transform_selection_remove_text(
    selection: &mut Selection,
    path: &[usize],
    range: std::ops::Range<usize>,
) {
    let removed_len = range.end.saturating_sub(range.start);
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path != path {
            continue;
        }
        if point.offset <= range.start {
            continue;
        }
        if point.offset >= range.end {
            point.offset = point.offset.saturating_sub(removed_len);
        } else {
            point.offset = range.start;
        }
    }
}

fn transform_selection_insert_node(selection: &mut Selection, path: &[usize]) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() {
            continue;
        }
        if !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        if point.path[depth] >= index {
            point.path[depth] += 1;
        }
    }
}

fn transform_selection_remove_node(
    selection: &mut Selection,
    path: &[usize],
    removed: &Node,
    doc_after_remove: &Document,
) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };

    let merge_prefix_len = match (removed, index.checked_sub(1)) {
        (Node::Text(removed_text), Some(left_index)) => {
            let mut left_path = parent_path.to_vec();
            left_path.push(left_index);
            match node_at_path(doc_after_remove, &left_path) {
                Some(Node::Text(left_text))
                    if left_text.marks == removed_text.marks
                        && left_text.text.ends_with(&removed_text.text) =>
                {
                    Some(left_text.text.len().saturating_sub(removed_text.text.len()))
                }
                _ => None,
            }
        }
        _ => None,
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() {
            continue;
        }
        if !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        let ix = point.path[depth];
        if ix > index {
            point.path[depth] = ix - 1;
            continue;
        }
        if ix < index {
            continue;
        }

        // Point was inside the removed subtree. Map it to a nearby point.
        if let (Some(prefix), Node::Text(removed_text), Some(left_index)) =
            (merge_prefix_len, removed, index.checked_sub(1))
        {
            point.path.truncate(depth + 1);
            point.path[depth] = left_index;
            point.offset = (prefix + point.offset).min(prefix + removed_text.text.len());
        } else {
            point.path.truncate(depth + 1);
            point.path[depth] = index.saturating_sub(1);
            point.offset = 0;
            if index > 0 {
                if let Some(Node::Text(left)) = node_at_path(doc_after_remove, &point.path) {
                    point.offset = left.text.len();
                }
            }
        }
    }
}

pub fn node_at_path<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
    let (first, rest) = path.split_first()?;
    let mut node = doc.children.get(*first)?;
    for &ix in rest {
        node = node.children()?.get(ix)?;
    }
    Some(node)
}

pub(crate) fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, PathError> {
    fn descend<'a>(
        children: &'a mut Vec<Node>,
        path: &[usize],
        depth: usize,
    ) -> Result<&'a mut Node, PathError> {
        let Some((&ix, rest)) = path.split_first() else {
            return Err(PathError("Empty path".into()));
        };
        let len = children.len();
        let Some(node) = children.get_mut(ix) else {
            return Err(PathError(format!(
                "Path out of bounds at depth {depth}: {ix} >= {len}"
            )));
        };
        if rest.is_empty() {
            return Ok(node);
        }
        match node.children_mut() {
            Some(children) => descend(children, rest, depth + 1),
            None => Err(PathError(format!("Non-container node at depth {depth}"))),
        }
    }

    descend(&mut doc.children, path, 0)
}

fn node_text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, PathError> {
    match node_mut(doc, path)? {
        Node::Text(t) => Ok(t),
        _ => Err(PathError("Expected Text node".into())),
    }
}

pub(crate) fn children_mut<'a>(
    doc: &'a mut Document,
    parent_path: &[usize],
) -> Result<&'a mut Vec<Node>, PathError> {
    if parent_path.is_empty() {
        return Ok(&mut doc.children);
    }
    node_mut(doc, parent_path)?
        .children_mut()
        .ok_or_else(|| PathError("Parent is not a container".into()))
}

fn insert_node(doc: &mut Document, path: &[usize], node: Node) -> Result<(), PathError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty insert path".into()));
    };

    let children = children_mut(doc, parent_path)?;
    if index > children.len() {
        return Err(PathError(format!(
            "Insert index out of bounds: {index} > {}",
            children.len()
        )));
    }
    children.insert(index, node);
    Ok(())
}

fn remove_node(doc: &mut Document, path: &[usize]) -> Result<Node, PathError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty remove path".into()));
    };

    let children = children_mut(doc, parent_path)?;
    if index >= children.len() {
        return Err(PathError(format!(
            "Remove index out of bounds: {index} >= {}",
            children.len()
        )));
    }
    Ok(children.remove(index))
}

fn patch_apply(block: &mut BlockNode, patch: &BlockPatch) -> BlockPatch {
    let mut old = BlockPatch::default();
    if let Some(kind) = patch.kind {
        old.kind = Some(std::mem::replace(&mut block.kind, kind));
    }
    if let Some(align) = patch.align {
        old.align = Some(std::mem::replace(&mut block.align, align));
    }
    old
}
