use std::collections::HashMap;
use std::str::FromStr;

use serde_json::Value;

use crate::blocks::{is_block_active, toggle_block};
use crate::core::{BlockFormat, BlockKind, Document, Editor, Mark, Node, Point, Selection};
use crate::editing::{insert_break, insert_data, insert_text, move_by_offset};
use crate::links::{AutoLink, insert_link, is_link_active, unwrap_link, wrap_link};
use crate::location::child_path;
use crate::marks::{active_marks, is_mark_active, toggle_mark};
use crate::ops::{BlockPatch, Op, Transaction};

#[derive(Debug, Clone)]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CommandError {}

#[derive(Debug, Clone)]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for QueryError {}

type CommandHandler =
    dyn Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync;
type QueryHandler = dyn Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub args_example: Option<Value>,
    pub handler: std::sync::Arc<CommandHandler>,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            args_example: None,
            handler: std::sync::Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn args_example(mut self, args_example: Value) -> Self {
        self.args_example = Some(args_example);
        self
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: std::sync::Arc<QueryHandler>,
}

impl QuerySpec {
    pub fn new(
        id: impl Into<String>,
        handler: impl Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            handler: std::sync::Arc::new(handler),
        }
    }
}

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document) -> Vec<Op>;
}

#[derive(Debug, Clone)]
pub struct TransactionPreview {
    pub doc: Document,
    pub selection: Option<Selection>,
}

pub trait TransactionTransform: Send + Sync {
    fn id(&self) -> &'static str;
    fn transform(&self, editor: &Editor, tx: &Transaction) -> Option<Transaction>;
}

pub trait EditorPlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn transaction_transforms(&self) -> Vec<Box<dyn TransactionTransform>> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    transaction_transforms: Vec<Box<dyn TransactionTransform>>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
}

impl PluginRegistry {
    pub fn new(plugins: impl IntoIterator<Item = Box<dyn EditorPlugin>>) -> Result<Self, String> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    /// Normalization and text input only.
    pub fn core() -> Self {
        let plugins: Vec<Box<dyn EditorPlugin>> =
            vec![Box::new(CoreNormalizePlugin), Box::new(CoreEditingPlugin)];
        Self::new(plugins).expect("core registry must be valid")
    }

    pub fn richtext() -> Self {
        let plugins: Vec<Box<dyn EditorPlugin>> = vec![
            Box::new(CoreNormalizePlugin),
            Box::new(CoreEditingPlugin),
            Box::new(BlockPlugin),
            Box::new(MarksPlugin),
            Box::new(LinkPlugin),
        ];
        Self::new(plugins).expect("richtext registry must be valid")
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn EditorPlugin>) -> Result<(), String> {
        self.transaction_transforms
            .extend(plugin.transaction_transforms());

        self.normalize_passes.extend(plugin.normalize_passes());

        for cmd in plugin.commands() {
            if self.commands.contains_key(&cmd.id) {
                return Err(format!("Duplicate command id: {}", cmd.id));
            }
            self.commands.insert(cmd.id.clone(), cmd);
        }

        for query in plugin.queries() {
            if self.queries.contains_key(&query.id) {
                return Err(format!("Duplicate query id: {}", query.id));
            }
            self.queries.insert(query.id.clone(), query);
        }

        tracing::trace!(plugin = plugin.id(), "registered plugin");
        Ok(())
    }

    pub fn transaction_transforms(&self) -> &[Box<dyn TransactionTransform>] {
        &self.transaction_transforms
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn queries(&self) -> &HashMap<String, QuerySpec> {
        &self.queries
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }

    /// Ops of the first pass that finds something to fix. The editor applies
    /// them and asks again until no pass reports work.
    pub fn normalize(&self, doc: &Document) -> Vec<Op> {
        for pass in &self.normalize_passes {
            let ops = pass.run(doc);
            if !ops.is_empty() {
                tracing::trace!(pass = pass.id(), ops = ops.len(), "normalize");
                return ops;
            }
        }
        Vec::new()
    }

    pub fn normalize_selection(&self, doc: &Document, selection: &Selection) -> Selection {
        let fallback = first_text_point(doc).unwrap_or(Point {
            path: vec![0],
            offset: 0,
        });

        let anchor =
            normalize_point_to_existing_text(doc, &selection.anchor).unwrap_or_else(|| {
                normalize_point_to_existing_text(doc, &selection.focus)
                    .unwrap_or_else(|| fallback.clone())
            });
        let focus = normalize_point_to_existing_text(doc, &selection.focus)
            .unwrap_or_else(|| anchor.clone());

        Selection { anchor, focus }
    }
}

fn first_text_descendant(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
    for (ix, node) in children.iter().enumerate() {
        path.push(ix);
        let found = match node {
            Node::Text(_) => Some(Point {
                path: path.clone(),
                offset: 0,
            }),
            Node::Block(_) | Node::Link(_) => node
                .children()
                .and_then(|children| first_text_descendant(children, path)),
        };
        path.pop();
        if found.is_some() {
            return found;
        }
    }
    None
}

fn first_text_point(doc: &Document) -> Option<Point> {
    first_text_descendant(&doc.children, &mut Vec::new())
}

fn normalize_point_to_existing_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() || doc.children.is_empty() {
        return None;
    }

    let mut resolved_path: Vec<usize> = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved_path.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                return Some(Point {
                    path: resolved_path,
                    offset: point.offset.min(t.text.len()),
                });
            }
            Node::Block(block) => children = &block.children,
            Node::Link(link) => children = &link.children,
        }
    }

    first_text_descendant(children, &mut resolved_path)
}

struct CoreNormalizePlugin;

impl EditorPlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(WrapTopLevelInlines),
            Box::new(EnsureContainerHasChildren),
            Box::new(NormalizeListChildren),
            Box::new(MergeAdjacentTextLeaves),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        if doc.children.is_empty() {
            return vec![Op::InsertNode {
                path: vec![0],
                node: Node::paragraph(""),
            }];
        }
        Vec::new()
    }
}

struct WrapTopLevelInlines;

impl NormalizePass for WrapTopLevelInlines {
    fn id(&self) -> &'static str {
        "core.wrap_top_level_inlines"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        let mut runs: Vec<(usize, usize)> = Vec::new();
        let mut ix = 0usize;
        while ix < doc.children.len() {
            if !doc.children[ix].is_inline() {
                ix += 1;
                continue;
            }
            let start = ix;
            while ix < doc.children.len() && doc.children[ix].is_inline() {
                ix += 1;
            }
            runs.push((start, ix));
        }

        let mut ops = Vec::new();
        for (start, end) in runs.into_iter().rev() {
            for remove_ix in (start..end).rev() {
                ops.push(Op::RemoveNode {
                    path: vec![remove_ix],
                });
            }
            ops.push(Op::InsertNode {
                path: vec![start],
                node: Node::block(BlockKind::Paragraph, doc.children[start..end].to_vec()),
            });
        }
        ops
    }
}

struct EnsureContainerHasChildren;

impl NormalizePass for EnsureContainerHasChildren {
    fn id(&self) -> &'static str {
        "core.ensure_container_has_children"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        fn walk(children: &[Node], path: &mut Vec<usize>, ops: &mut Vec<Op>) {
            for (ix, node) in children.iter().enumerate() {
                let Some(grandchildren) = node.children() else {
                    continue;
                };
                path.push(ix);
                if grandchildren.is_empty() {
                    ops.push(Op::InsertNode {
                        path: child_path(path, 0),
                        node: Node::text(""),
                    });
                } else {
                    walk(grandchildren, path, ops);
                }
                path.pop();
            }
        }

        let mut ops = Vec::new();
        walk(&doc.children, &mut Vec::new(), &mut ops);
        ops
    }
}

struct NormalizeListChildren;

impl NormalizePass for NormalizeListChildren {
    fn id(&self) -> &'static str {
        "core.normalize_list_children"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        fn walk(children: &[Node], path: &mut Vec<usize>, ops: &mut Vec<Op>) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Block(block) = node else {
                    continue;
                };
                path.push(ix);
                if block.kind.is_list() {
                    for (item_ix, child) in block.children.iter().enumerate() {
                        let item_path = child_path(path, item_ix);
                        match child {
                            Node::Block(b) if b.kind == BlockKind::ListItem => {}
                            Node::Block(b) if b.is_text_block() => ops.push(Op::SetBlock {
                                path: item_path,
                                patch: BlockPatch::kind(BlockKind::ListItem),
                            }),
                            other => {
                                ops.push(Op::RemoveNode {
                                    path: item_path.clone(),
                                });
                                ops.push(Op::InsertNode {
                                    path: item_path,
                                    node: Node::block(BlockKind::ListItem, vec![other.clone()]),
                                });
                            }
                        }
                    }
                }
                walk(&block.children, path, ops);
                path.pop();
            }
        }

        let mut ops = Vec::new();
        walk(&doc.children, &mut Vec::new(), &mut ops);
        ops
    }
}

struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document) -> Vec<Op> {
        fn merge_children(children: &[Node], path: &[usize], ops: &mut Vec<Op>) {
            if children.len() < 2 {
                return;
            }

            // Empty leaves go first; merging waits for the next round.
            let empty: Vec<usize> = children
                .iter()
                .enumerate()
                .filter(|(_, n)| matches!(n, Node::Text(t) if t.text.is_empty()))
                .map(|(ix, _)| ix)
                .collect();
            if !empty.is_empty() {
                let keep_one = empty.len() == children.len();
                for &ix in empty.iter().skip(usize::from(keep_one)).rev() {
                    ops.push(Op::RemoveNode {
                        path: child_path(path, ix),
                    });
                }
                return;
            }

            let mut ix = children.len();
            while ix > 0 {
                ix -= 1;
                let Node::Text(right) = &children[ix] else {
                    continue;
                };

                let mut start = ix;
                while start > 0 {
                    let Some(Node::Text(left)) = children.get(start - 1) else {
                        break;
                    };
                    if left.marks != right.marks {
                        break;
                    }
                    start -= 1;
                }

                if start == ix {
                    continue;
                }

                let Some(Node::Text(first)) = children.get(start) else {
                    continue;
                };

                // Fold leaves in one at a time so a caret in a removed leaf
                // lands at the matching offset of the merged one.
                let mut len = first.text.len();
                for node in children.iter().take(ix + 1).skip(start + 1) {
                    let Node::Text(t) = node else {
                        continue;
                    };
                    ops.push(Op::InsertText {
                        path: child_path(path, start),
                        offset: len,
                        text: t.text.clone(),
                    });
                    ops.push(Op::RemoveNode {
                        path: child_path(path, start + 1),
                    });
                    len += t.text.len();
                }

                ix = start;
            }
        }

        fn walk(children: &[Node], path: &mut Vec<usize>, ops: &mut Vec<Op>) {
            for (ix, node) in children.iter().enumerate() {
                let Some(grandchildren) = node.children() else {
                    continue;
                };
                path.push(ix);
                walk(grandchildren, path, ops);
                merge_children(grandchildren, path, ops);
                path.pop();
            }
        }

        let mut ops = Vec::new();
        walk(&doc.children, &mut Vec::new(), &mut ops);
        ops
    }
}

fn arg_str<'a>(args: &'a Option<Value>, key: &str) -> Option<&'a str> {
    args.as_ref()
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
}

fn parse_arg<T: FromStr>(args: &Option<Value>, key: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    let raw = arg_str(args, key).ok_or_else(|| format!("Missing args.{key}"))?;
    raw.parse::<T>().map_err(|err| err.to_string())
}

struct CoreEditingPlugin;

impl EditorPlugin for CoreEditingPlugin {
    fn id(&self) -> &'static str {
        "core.editing"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("core.insert_text", "Insert text", |editor, args| {
                let text = arg_str(&args, "text")
                    .ok_or_else(|| CommandError::new("Missing args.text"))?
                    .to_string();
                insert_text(editor, &text)
            })
            .description("Insert text at the cursor, replacing any selected content.")
            .keywords(["type", "text", "input"])
            .args_example(serde_json::json!({ "text": "hello" })),
            CommandSpec::new("core.insert_data", "Paste text", |editor, args| {
                let text = arg_str(&args, "text")
                    .ok_or_else(|| CommandError::new("Missing args.text"))?
                    .to_string();
                insert_data(editor, &text)
            })
            .description("Paste plain text at the cursor.")
            .keywords(["paste", "clipboard"])
            .args_example(serde_json::json!({ "text": "https://example.com" })),
            CommandSpec::new("core.insert_break", "Split block", |editor, _args| {
                insert_break(editor)
            })
            .description("Split the current block at the cursor.")
            .keywords(["enter", "newline", "split"]),
            CommandSpec::new("core.move_by_offset", "Move caret", |editor, args| {
                let reverse = args
                    .as_ref()
                    .and_then(|v| v.get("reverse"))
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                move_by_offset(editor, reverse);
                Ok(())
            })
            .description("Move the caret one offset, stepping in and out of links.")
            .keywords(["left", "right", "caret"])
            .args_example(serde_json::json!({ "reverse": true })),
        ]
    }
}

struct BlockPlugin;

impl EditorPlugin for BlockPlugin {
    fn id(&self) -> &'static str {
        "block"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("block.toggle", "Toggle block", |editor, args| {
                let format = parse_arg::<BlockFormat>(&args, "format").map_err(CommandError::new)?;
                toggle_block(editor, format)
            })
            .description("Toggle a block kind or alignment on the selected blocks.")
            .keywords(["heading", "quote", "list", "align"])
            .args_example(serde_json::json!({ "format": "bulleted-list" })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("block.is_active", |editor, args| {
            let format = parse_arg::<BlockFormat>(&args, "format").map_err(QueryError::new)?;
            Ok(Value::Bool(is_block_active(editor, format)))
        })]
    }
}

struct MarksPlugin;

impl EditorPlugin for MarksPlugin {
    fn id(&self) -> &'static str {
        "marks"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("marks.toggle", "Toggle mark", |editor, args| {
                let mark = parse_arg::<Mark>(&args, "mark").map_err(CommandError::new)?;
                toggle_mark(editor, mark)
            })
            .description("Toggle a mark on the selection, or on the next typed text at the caret.")
            .keywords(["bold", "italic", "strikethrough", "mark"])
            .args_example(serde_json::json!({ "mark": "bold" })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("marks.is_active", |editor, args| {
                let mark = parse_arg::<Mark>(&args, "mark").map_err(QueryError::new)?;
                Ok(Value::Bool(is_mark_active(editor, mark)))
            }),
            QuerySpec::new("marks.get_active", |editor, _args| {
                serde_json::to_value(active_marks(editor).unwrap_or_default())
                    .map_err(|err| QueryError::new(format!("Failed to encode marks: {err}")))
            }),
        ]
    }
}

struct LinkPlugin;

impl EditorPlugin for LinkPlugin {
    fn id(&self) -> &'static str {
        "link"
    }

    fn transaction_transforms(&self) -> Vec<Box<dyn TransactionTransform>> {
        vec![Box::new(AutoLink)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("link.wrap", "Wrap link", |editor, args| {
                let url = arg_str(&args, "url")
                    .ok_or_else(|| CommandError::new("Missing args.url"))?
                    .to_string();
                wrap_link(editor, &url)
            })
            .description("Wrap the selection in a link, or insert one at the caret.")
            .keywords(["link", "url", "hyperlink"])
            .args_example(serde_json::json!({ "url": "https://example.com" })),
            CommandSpec::new("link.insert", "Insert link", |editor, args| {
                let url = arg_str(&args, "url")
                    .ok_or_else(|| CommandError::new("Missing args.url"))?
                    .to_string();
                insert_link(editor, &url)
            })
            .description("Insert a link when the editor has a selection.")
            .keywords(["link", "url", "hyperlink"])
            .args_example(serde_json::json!({ "url": "https://example.com" })),
            CommandSpec::new("link.unwrap", "Remove link", |editor, _args| {
                unwrap_link(editor)
            })
            .description("Replace every link in the selection with its text.")
            .keywords(["link", "unlink", "url"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("link.is_active", |editor, _args| {
            Ok(Value::Bool(is_link_active(editor)))
        })]
    }
}
