use richmark_core::{BlockKind, Document, Mark, Marks, Node};
use serde_json::Value;

use crate::ast::{MdNode, copy_prop, rename_kinds};
use crate::engine::{GrammarEngine, MarkdownOptions, ParseError, PulldownEngine};
use crate::names::{
    DOCUMENT_STRIKE_PROP, DOCUMENT_URL_PROP, ENGINE_LINK_PROP, ENGINE_STRIKE_PROP, PARSE_RENAMES,
    SerializeOptions,
};

/// Converts between markdown text and documents through a grammar engine.
pub struct Converter<E = PulldownEngine> {
    engine: E,
    options: SerializeOptions,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(MarkdownOptions::default())
    }
}

impl Converter {
    pub fn new(options: MarkdownOptions) -> Self {
        Self::with_engine(PulldownEngine::new(options))
    }
}

impl<E: GrammarEngine> Converter<E> {
    pub fn with_engine(engine: E) -> Self {
        Self {
            engine,
            options: SerializeOptions::default(),
        }
    }

    pub fn serialize_options(mut self, options: SerializeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn parse(&self, text: &str) -> Result<Document, ParseError> {
        let mut nodes = self.engine.parse(text)?;
        rename_kinds(&mut nodes, &PARSE_RENAMES);
        copy_prop(&mut nodes, ENGINE_LINK_PROP, DOCUMENT_URL_PROP);

        let doc = Document::new(heal_blocks(nodes));
        tracing::debug!(blocks = doc.children.len(), "parsed markdown");
        Ok(doc)
    }

    /// Never fails; the document is only read.
    pub fn serialize(&self, doc: &Document) -> String {
        let mut out: String = doc
            .children
            .iter()
            .map(|node| self.engine.serialize(&engine_node(node, false), &self.options))
            .collect();
        out.truncate(out.trim_end_matches('\n').len());
        out.push('\n');
        out
    }
}

pub fn markdown_to_document(text: &str) -> Result<Document, ParseError> {
    Converter::default().parse(text)
}

pub fn document_to_markdown(doc: &Document) -> String {
    Converter::default().serialize(doc)
}

/// The writer's view of a node. Inline children of a paragraph also carry
/// the engine's names for the link target and strikethrough.
fn engine_node(node: &Node, in_paragraph: bool) -> MdNode {
    match node {
        Node::Block(block) => {
            let paragraph = block.kind == BlockKind::Paragraph;
            let children = block
                .children
                .iter()
                .map(|child| engine_node(child, paragraph))
                .collect();
            let mut el = MdNode::element(block.kind.as_str(), children);
            if let Some(align) = block.align {
                el = el.with_prop("align", align.as_str());
            }
            el
        }
        Node::Link(link) => {
            let children = link
                .children
                .iter()
                .map(|child| engine_node(child, false))
                .collect();
            let mut el =
                MdNode::element("link", children).with_prop(DOCUMENT_URL_PROP, link.url.clone());
            if in_paragraph {
                el = el.with_prop(ENGINE_LINK_PROP, link.url.clone());
            }
            el
        }
        Node::Text(text) => {
            let mut md = MdNode::text(text.text.clone());
            for mark in text.marks.iter() {
                md = md.with_prop(mark.as_str(), true);
            }
            if in_paragraph && text.marks.contains(Mark::Strikethrough) {
                md = md.with_prop(ENGINE_STRIKE_PROP, true);
            }
            md
        }
    }
}

fn is_inline(node: &MdNode) -> bool {
    matches!(node.kind(), None | Some("link") | Some("image"))
}

fn into_children(node: MdNode) -> Vec<MdNode> {
    match node {
        MdNode::Element { children, .. } => children,
        MdNode::Text { .. } => Vec::new(),
    }
}

/// Turns a sequence that should hold blocks into typed blocks; runs of inline
/// nodes between them become paragraphs.
fn heal_blocks(nodes: Vec<MdNode>) -> Vec<Node> {
    let mut out = Vec::new();
    let mut run: Vec<MdNode> = Vec::new();
    for node in nodes {
        if is_inline(&node) {
            run.push(node);
            continue;
        }
        if !run.is_empty() {
            out.push(text_block(BlockKind::Paragraph, std::mem::take(&mut run)));
        }
        heal_block(node, &mut out);
    }
    if !run.is_empty() {
        out.push(text_block(BlockKind::Paragraph, run));
    }
    out
}

fn heal_block(node: MdNode, out: &mut Vec<Node>) {
    let (kind, children) = match node {
        MdNode::Element { kind, children, .. } => (kind, children),
        text => {
            out.push(text_block(BlockKind::Paragraph, vec![text]));
            return;
        }
    };

    match kind.as_str() {
        "paragraph" => out.push(text_block(BlockKind::Paragraph, children)),
        "heading-one" => out.push(text_block(BlockKind::HeadingOne, children)),
        "heading-two" => out.push(text_block(BlockKind::HeadingTwo, children)),
        k if k.starts_with("heading_") => {
            tracing::trace!(kind = k, "heading level clamped to two");
            out.push(text_block(BlockKind::HeadingTwo, children));
        }
        "block-quote" => out.push(container_block(BlockKind::BlockQuote, children)),
        "bulleted-list" => out.push(list_block(BlockKind::BulletedList, children)),
        "numbered-list" => out.push(list_block(BlockKind::NumberedList, children)),
        "list-item" => {
            tracing::trace!("list item outside a list");
            out.push(container_block(BlockKind::Paragraph, children));
        }
        "thematic_break" => tracing::trace!("thematic break dropped"),
        "code_block" | "html" => {
            out.push(text_block(BlockKind::Paragraph, trim_trailing_newlines(children)));
        }
        other => {
            if children.iter().any(|c| !is_inline(c)) {
                tracing::trace!(kind = other, "container unwrapped");
                out.extend(heal_blocks(children));
            } else {
                tracing::trace!(kind = other, "kept as paragraph");
                out.push(text_block(BlockKind::Paragraph, children));
            }
        }
    }
}

fn text_block(kind: BlockKind, children: Vec<MdNode>) -> Node {
    Node::block(kind, non_empty(heal_inlines(children, false)))
}

/// Block quotes and list items whose blocks are all paragraphs hold the
/// paragraphs' inline content, one line per paragraph.
fn container_block(kind: BlockKind, children: Vec<MdNode>) -> Node {
    if children.iter().all(is_inline) {
        return text_block(kind, children);
    }

    if children.iter().all(|c| c.kind() == Some("paragraph")) {
        let mut inlines = Vec::new();
        for (ix, paragraph) in children.into_iter().enumerate() {
            if ix > 0 {
                inlines.push(MdNode::text("\n"));
            }
            inlines.extend(into_children(paragraph));
        }
        return text_block(kind, inlines);
    }

    Node::block(kind, non_empty(heal_blocks(children)))
}

fn list_block(kind: BlockKind, children: Vec<MdNode>) -> Node {
    let mut items: Vec<Node> = children
        .into_iter()
        .map(|child| {
            if child.kind() == Some("list-item") {
                return container_block(BlockKind::ListItem, into_children(child));
            }
            tracing::trace!(kind = ?child.kind(), "wrapped in list item");
            container_block(BlockKind::ListItem, vec![child])
        })
        .collect();
    if items.is_empty() {
        items.push(Node::list_item(""));
    }
    Node::list(kind, items)
}

fn heal_inlines(nodes: Vec<MdNode>, in_link: bool) -> Vec<Node> {
    let mut out = Vec::new();
    for node in nodes {
        match node {
            leaf @ MdNode::Text { .. } => out.push(Node::marked(leaf.plain_text(), marks_from(&leaf))),
            MdNode::Element {
                kind,
                props,
                children,
            } => {
                let url = props.get(DOCUMENT_URL_PROP).and_then(Value::as_str);
                match (kind.as_str(), url) {
                    ("link", Some(url)) if !in_link => {
                        let url = url.to_string();
                        out.push(Node::link(url, non_empty(heal_inlines(children, true))));
                    }
                    ("link", _) => {
                        tracing::trace!(nested = in_link, "link unwrapped");
                        out.extend(heal_inlines(children, in_link));
                    }
                    // Images keep their alt text.
                    _ => out.extend(heal_inlines(children, in_link)),
                }
            }
        }
    }
    merge_leaves(out)
}

fn marks_from(leaf: &MdNode) -> Marks {
    Marks::default()
        .with(Mark::Bold, leaf.flag("bold"))
        .with(Mark::Italic, leaf.flag("italic"))
        .with(
            Mark::Strikethrough,
            leaf.flag(DOCUMENT_STRIKE_PROP) || leaf.flag(ENGINE_STRIKE_PROP),
        )
}

/// Joins neighbouring leaves with equal marks and drops empty ones.
fn merge_leaves(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let (Some(Node::Text(prev)), Node::Text(next)) = (out.last_mut(), &node) {
            if prev.marks == next.marks {
                prev.text.push_str(&next.text);
                continue;
            }
        }
        out.push(node);
    }
    if out.len() > 1 {
        out.retain(|n| !matches!(n, Node::Text(t) if t.text.is_empty()));
    }
    out
}

fn non_empty(mut children: Vec<Node>) -> Vec<Node> {
    if children.is_empty() {
        children.push(Node::text(""));
    }
    children
}

fn trim_trailing_newlines(mut children: Vec<MdNode>) -> Vec<MdNode> {
    if let Some(MdNode::Text { text, .. }) = children.last_mut() {
        text.truncate(text.trim_end_matches('\n').len());
    }
    children
}
