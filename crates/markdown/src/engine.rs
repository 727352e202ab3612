use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use thiserror::Error;

use crate::ast::{MdNode, Props};
use crate::names::{ENGINE_LINK_PROP, ENGINE_STRIKE_PROP, SerializeOptions};
use crate::writer;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unbalanced end of {0}")]
    UnbalancedEnd(String),
    #[error("unterminated {0}")]
    Unterminated(String),
    #[error("nesting deeper than {max_depth} levels")]
    TooDeep { max_depth: usize },
    #[error("grammar engine failed: {0}")]
    Engine(String),
}

/// A markdown grammar: text to the intermediate tree and back, one top-level
/// node at a time.
pub trait GrammarEngine: Send + Sync {
    fn parse(&self, text: &str) -> Result<Vec<MdNode>, ParseError>;
    fn serialize(&self, node: &MdNode, options: &SerializeOptions) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownOptions {
    /// Strikethrough, tables and task lists.
    pub gfm: bool,
    pub max_depth: usize,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            gfm: true,
            max_depth: 128,
        }
    }
}

impl MarkdownOptions {
    fn parser_options(&self) -> Options {
        if self.gfm {
            Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES | Options::ENABLE_TASKLISTS
        } else {
            Options::empty()
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct PulldownEngine {
    options: MarkdownOptions,
}

impl PulldownEngine {
    pub fn new(options: MarkdownOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MarkdownOptions {
        &self.options
    }
}

impl GrammarEngine for PulldownEngine {
    fn parse(&self, text: &str) -> Result<Vec<MdNode>, ParseError> {
        let mut builder = TreeBuilder::new(self.options.max_depth);
        for event in Parser::new_ext(text, self.options.parser_options()) {
            builder.event(event)?;
        }
        builder.finish()
    }

    fn serialize(&self, node: &MdNode, options: &SerializeOptions) -> String {
        let mut out = writer::block_lines(node, &options.node_types).join("\n");
        out.push_str("\n\n");
        out
    }
}

struct Frame {
    kind: String,
    props: Props,
    children: Vec<MdNode>,
}

impl Frame {
    fn into_node(self, end: &TagEnd) -> MdNode {
        if matches!(end, TagEnd::HtmlBlock) {
            let html: String = self.children.iter().map(MdNode::plain_text).collect();
            if is_br_tag(&html) {
                return MdNode::element("paragraph", vec![MdNode::text("")]);
            }
        }
        MdNode::Element {
            kind: self.kind,
            props: self.props,
            children: self.children,
        }
    }
}

/// Folds the flat event stream into a tree, keeping the inline marks that
/// are open as a stack of prop names. Marks opened by inline HTML tags are
/// kept apart: nothing guarantees they are closed, so they end with their
/// block.
struct TreeBuilder {
    max_depth: usize,
    root: Vec<MdNode>,
    frames: Vec<Frame>,
    marks: Vec<&'static str>,
    html_marks: Vec<&'static str>,
}

impl TreeBuilder {
    fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            root: Vec::new(),
            frames: Vec::new(),
            marks: Vec::new(),
            html_marks: Vec::new(),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), ParseError> {
        match event {
            Event::Start(tag) => return self.start(tag),
            Event::End(end) => return self.end(end),
            Event::Text(text) | Event::Html(text) => self.text(&text, None),
            Event::Code(code) => self.text(&code, Some("code")),
            Event::InlineHtml(html) => {
                if is_br_tag(&html) {
                    self.text("\n", None);
                } else if let Some((mark, closing)) = html_mark(&html) {
                    if closing {
                        if let Some(ix) = self.html_marks.iter().rposition(|m| *m == mark) {
                            self.html_marks.remove(ix);
                        }
                    } else {
                        self.html_marks.push(mark);
                    }
                } else {
                    self.text(&html, None);
                }
            }
            Event::SoftBreak | Event::HardBreak => self.text("\n", None),
            Event::Rule => self.push(MdNode::element("thematic_break", Vec::new())),
            Event::TaskListMarker(checked) => {
                if let Some(frame) = self.frames.last_mut() {
                    frame.props.insert("checked".to_string(), checked.into());
                }
            }
            Event::FootnoteReference(label) => self.text(&format!("[^{label}]"), None),
            other => tracing::trace!(?other, "skipping markdown event"),
        }
        Ok(())
    }

    fn start(&mut self, tag: Tag<'_>) -> Result<(), ParseError> {
        if self.frames.len() + self.marks.len() >= self.max_depth {
            return Err(ParseError::TooDeep {
                max_depth: self.max_depth,
            });
        }

        let mut props = Props::new();
        let kind = match tag {
            Tag::Emphasis => {
                self.marks.push("italic");
                return Ok(());
            }
            Tag::Strong => {
                self.marks.push("bold");
                return Ok(());
            }
            Tag::Strikethrough => {
                self.marks.push(ENGINE_STRIKE_PROP);
                return Ok(());
            }
            Tag::Paragraph => "paragraph",
            Tag::Heading { level, .. } => heading_kind(level),
            Tag::BlockQuote(_) => "block_quote",
            Tag::CodeBlock(kind) => {
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        props.insert("lang".to_string(), lang.to_string().into());
                    }
                }
                "code_block"
            }
            Tag::HtmlBlock => "html",
            Tag::List(Some(start)) => {
                props.insert("start".to_string(), start.into());
                "ol_list"
            }
            Tag::List(None) => "ul_list",
            Tag::Item => "list_item",
            Tag::Table(_) => "table",
            Tag::TableHead => "table_head",
            Tag::TableRow => "table_row",
            Tag::TableCell => "table_cell",
            Tag::Link {
                dest_url, title, ..
            } => {
                props.insert(ENGINE_LINK_PROP.to_string(), dest_url.to_string().into());
                if !title.is_empty() {
                    props.insert("title".to_string(), title.to_string().into());
                }
                "link"
            }
            Tag::Image { dest_url, .. } => {
                props.insert(ENGINE_LINK_PROP.to_string(), dest_url.to_string().into());
                "image"
            }
            other => {
                tracing::trace!(?other, "unsupported markdown container");
                "unsupported"
            }
        };

        self.frames.push(Frame {
            kind: kind.to_string(),
            props,
            children: Vec::new(),
        });
        Ok(())
    }

    fn end(&mut self, end: TagEnd) -> Result<(), ParseError> {
        if matches!(
            end,
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough
        ) {
            return match self.marks.pop() {
                Some(_) => Ok(()),
                None => Err(ParseError::UnbalancedEnd(format!("{end:?}"))),
            };
        }

        let Some(frame) = self.frames.pop() else {
            return Err(ParseError::UnbalancedEnd(format!("{end:?}")));
        };
        if !matches!(end, TagEnd::Link | TagEnd::Image) {
            self.html_marks.clear();
        }
        let node = frame.into_node(&end);
        self.push(node);
        Ok(())
    }

    fn text(&mut self, text: &str, extra: Option<&'static str>) {
        let mut node = MdNode::text(text);
        let open = self.marks.iter().chain(&self.html_marks).copied();
        for mark in open.chain(extra) {
            node = node.with_prop(mark, true);
        }
        self.push(node);
    }

    fn push(&mut self, node: MdNode) {
        match self.frames.last_mut() {
            Some(frame) => frame.children.push(node),
            None => self.root.push(node),
        }
    }

    fn finish(self) -> Result<Vec<MdNode>, ParseError> {
        if let Some(frame) = self.frames.last() {
            return Err(ParseError::Unterminated(frame.kind.clone()));
        }
        if let Some(mark) = self.marks.last() {
            return Err(ParseError::Unterminated((*mark).to_string()));
        }
        Ok(self.root)
    }
}

fn heading_kind(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "heading_one",
        HeadingLevel::H2 => "heading_two",
        HeadingLevel::H3 => "heading_three",
        HeadingLevel::H4 => "heading_four",
        HeadingLevel::H5 => "heading_five",
        HeadingLevel::H6 => "heading_six",
    }
}

fn is_br_tag(html: &str) -> bool {
    matches!(
        html.trim().to_ascii_lowercase().as_str(),
        "<br>" | "<br/>" | "<br />"
    )
}

/// The mark an inline HTML tag opens or closes, as `(mark, closing)`.
fn html_mark(html: &str) -> Option<(&'static str, bool)> {
    let tag = html.trim().strip_prefix('<')?.strip_suffix('>')?;
    let (closing, tag) = match tag.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, tag),
    };
    let name = tag
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()?
        .to_ascii_lowercase();
    let mark = match name.as_str() {
        "strong" | "b" => "bold",
        "em" | "i" => "italic",
        "del" | "s" | "strike" => ENGINE_STRIKE_PROP,
        _ => return None,
    };
    Some((mark, closing))
}
