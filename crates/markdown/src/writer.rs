use std::fmt::Write as _;

use crate::ast::MdNode;
use crate::names::{DOCUMENT_STRIKE_PROP, DOCUMENT_URL_PROP, ENGINE_LINK_PROP, NodeTypes};

/// Markdown lines for one block, without the blank line that separates it
/// from the next one.
pub(crate) fn block_lines(node: &MdNode, types: &NodeTypes) -> Vec<String> {
    let MdNode::Element { kind, children, .. } = node else {
        return paragraph_lines(std::slice::from_ref(node), types);
    };
    let kind = kind.as_str();

    if let Some(level) = types.heading_level(kind) {
        let text = render_inlines(children, types).replace('\n', " ");
        let line = format!("{} {}", "#".repeat(usize::from(level)), text);
        return vec![line.trim_end().to_string()];
    }

    if kind == types.ul_list || kind == types.ol_list {
        let ordered = kind == types.ol_list;
        let mut lines = Vec::new();
        for (ix, item) in children.iter().enumerate() {
            let marker = if ordered {
                format!("{}. ", ix + 1)
            } else {
                "- ".to_string()
            };
            let indent = " ".repeat(marker.len());
            for (line_ix, line) in item_lines(item, types).into_iter().enumerate() {
                let prefix = if line_ix == 0 { &marker } else { &indent };
                if line.is_empty() {
                    lines.push(prefix.trim_end().to_string());
                } else {
                    lines.push(format!("{prefix}{line}"));
                }
            }
        }
        return lines;
    }

    if kind == types.block_quote {
        return content_lines(children, types, true)
            .into_iter()
            .map(|line| {
                if line.is_empty() {
                    ">".to_string()
                } else {
                    format!("> {line}")
                }
            })
            .collect();
    }

    let lines = content_lines(children, types, true);
    if kind == types.paragraph && lines.iter().all(String::is_empty) {
        return vec!["<br>".to_string()];
    }
    lines
}

fn item_lines(item: &MdNode, types: &NodeTypes) -> Vec<String> {
    match item {
        MdNode::Element { kind, children, .. } if *kind == types.list_item => {
            content_lines(children, types, false)
        }
        other => block_lines(other, types),
    }
}

/// Lines for a container's children: inline runs become paragraphs, nested
/// blocks are written in place.
fn content_lines(children: &[MdNode], types: &NodeTypes, loose: bool) -> Vec<String> {
    if !children.iter().any(|c| is_block(c, types)) {
        return paragraph_lines(children, types);
    }

    let mut lines: Vec<String> = Vec::new();
    let mut run: Vec<MdNode> = Vec::new();
    let push_section = |lines: &mut Vec<String>, section: Vec<String>| {
        if loose && !lines.is_empty() {
            lines.push(String::new());
        }
        lines.extend(section);
    };

    for child in children {
        if !is_block(child, types) {
            run.push(child.clone());
            continue;
        }
        if !run.is_empty() {
            push_section(&mut lines, paragraph_lines(&std::mem::take(&mut run), types));
        }
        push_section(&mut lines, block_lines(child, types));
    }
    if !run.is_empty() {
        push_section(&mut lines, paragraph_lines(&run, types));
    }
    lines
}

fn is_block(node: &MdNode, types: &NodeTypes) -> bool {
    match node {
        MdNode::Text { .. } => false,
        MdNode::Element { kind, .. } => *kind != types.link && kind != "image",
    }
}

/// Inline content split into lines; every line but the last ends in a hard
/// break. A trailing line break has nothing after it to break towards, so it is
/// written as a `<br>` tag instead.
fn paragraph_lines(nodes: &[MdNode], types: &NodeTypes) -> Vec<String> {
    let text = render_inlines(nodes, types);
    let mut lines: Vec<String> = text.split('\n').map(escape_line_start).collect();
    let trailing_break = lines.len() > 1 && lines.last().is_some_and(String::is_empty);
    if trailing_break {
        lines.pop();
    }

    let last = lines.len().saturating_sub(1);
    for line in lines.iter_mut().take(last) {
        line.push('\\');
    }
    if trailing_break {
        if let Some(line) = lines.last_mut() {
            // A lone `<br>` line would read as an HTML block.
            if line.is_empty() && last == 0 {
                line.push_str("&#10;");
            } else {
                line.push_str("<br>");
            }
        }
    }
    lines
}

/// One inline node as it will be written. Marked text keeps its parts apart
/// until the neighbouring characters are known.
enum Piece {
    Plain(String),
    Marked {
        lead: String,
        core: String,
        trail: String,
        marks: Vec<InlineMark>,
    },
}

impl Piece {
    fn first_char(&self) -> Option<char> {
        match self {
            Piece::Plain(text) => text.chars().next(),
            Piece::Marked { lead, .. } => lead.chars().next().or(Some('*')),
        }
    }

    fn last_char(&self) -> Option<char> {
        match self {
            Piece::Plain(text) => text.chars().next_back(),
            Piece::Marked { trail, .. } => trail.chars().next_back().or(Some('*')),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum InlineMark {
    Strike,
    Bold,
    Italic,
}

impl InlineMark {
    fn delimiter(self) -> &'static str {
        match self {
            InlineMark::Strike => "~~",
            InlineMark::Bold => "**",
            InlineMark::Italic => "*",
        }
    }

    fn tag(self) -> &'static str {
        match self {
            InlineMark::Strike => "del",
            InlineMark::Bold => "strong",
            InlineMark::Italic => "em",
        }
    }
}

fn render_inlines(nodes: &[MdNode], types: &NodeTypes) -> String {
    let pieces: Vec<Piece> = nodes.iter().map(|node| piece(node, types)).collect();

    let mut out = String::new();
    for (ix, current) in pieces.iter().enumerate() {
        match current {
            Piece::Plain(text) => out.push_str(text),
            Piece::Marked {
                lead,
                core,
                trail,
                marks,
            } => {
                let before = lead
                    .chars()
                    .next_back()
                    .or_else(|| pieces[..ix].iter().rev().find_map(Piece::last_char));
                let after = trail
                    .chars()
                    .next()
                    .or_else(|| pieces[ix + 1..].iter().find_map(Piece::first_char));
                out.push_str(lead);
                out.push_str(&wrap_marks(core, marks, before, after));
                out.push_str(trail);
            }
        }
    }
    out
}

fn piece(node: &MdNode, types: &NodeTypes) -> Piece {
    match node {
        MdNode::Text { text, .. } => text_piece(node, text, types),
        MdNode::Element { kind, children, .. } if *kind == types.link => {
            let inner = render_inlines(children, types);
            let url = node
                .prop_str(ENGINE_LINK_PROP)
                .or_else(|| node.prop_str(DOCUMENT_URL_PROP));
            match url {
                Some(url) => Piece::Plain(format!("[{inner}]({})", link_destination(url))),
                None => Piece::Plain(inner),
            }
        }
        MdNode::Element { children, .. } => Piece::Plain(render_inlines(children, types)),
    }
}

/// Escaped text with its marks. Surrounding whitespace stays outside the
/// delimiters so they keep flanking the text.
fn text_piece(node: &MdNode, text: &str, types: &NodeTypes) -> Piece {
    let mut marks = Vec::new();
    if node.flag(&types.strike_mark) || node.flag(DOCUMENT_STRIKE_PROP) {
        marks.push(InlineMark::Strike);
    }
    if node.flag(&types.bold_mark) {
        marks.push(InlineMark::Bold);
    }
    if node.flag(&types.italic_mark) {
        marks.push(InlineMark::Italic);
    }

    let core = text.trim();
    if core.is_empty() || marks.is_empty() {
        return Piece::Plain(escape_text(text));
    }
    Piece::Marked {
        lead: text[..text.len() - text.trim_start().len()].to_string(),
        core: escape_text(core),
        trail: text[text.trim_end().len()..].to_string(),
        marks,
    }
}

/// Wraps `core` in markdown delimiters when every delimiter run would still
/// open and close where it stands, and in inline HTML tags otherwise.
fn wrap_marks(core: &str, marks: &[InlineMark], before: Option<char>, after: Option<char>) -> String {
    let open: String = marks.iter().map(|m| m.delimiter()).collect();
    let close: String = marks.iter().rev().map(|m| m.delimiter()).collect();

    let first = core.chars().next();
    let last = core.chars().next_back();
    if runs_flank(before, &open, first, true) && runs_flank(last, &close, after, false) {
        return format!("{open}{core}{close}");
    }

    let mut out = String::new();
    for mark in marks {
        let _ = write!(out, "<{}>", mark.tag());
    }
    out.push_str(core);
    for mark in marks.iter().rev() {
        let _ = write!(out, "</{}>", mark.tag());
    }
    out
}

/// Whether each run of identical delimiter characters in `delimiters`,
/// placed between `before` and `after`, is left-flanking (`opening`) or
/// right-flanking. `None` stands for the edge of the line.
fn runs_flank(before: Option<char>, delimiters: &str, after: Option<char>, opening: bool) -> bool {
    let chars: Vec<char> = delimiters.chars().collect();
    let mut start = 0;
    while start < chars.len() {
        let mut end = start + 1;
        while end < chars.len() && chars[end] == chars[start] {
            end += 1;
        }
        let prev = if start == 0 { before } else { Some(chars[start - 1]) };
        let next = if end == chars.len() { after } else { Some(chars[end]) };
        let flanks = if opening {
            left_flanking(prev, next)
        } else {
            left_flanking(next, prev)
        };
        if !flanks {
            return false;
        }
        start = end;
    }
    true
}

/// CommonMark left-flanking test for a delimiter run between `prev` and
/// `next`. Swapping the arguments gives the right-flanking test.
fn left_flanking(prev: Option<char>, next: Option<char>) -> bool {
    let Some(next) = next.filter(|c| !c.is_whitespace()) else {
        return false;
    };
    !is_punctuation(next) || prev.is_none_or(|c| c.is_whitespace() || is_punctuation(c))
}

fn is_punctuation(ch: char) -> bool {
    ch.is_ascii_punctuation()
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(
            ch,
            '\\' | '*' | '_' | '`' | '[' | ']' | '~' | '<' | '>' | '#' | '&'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Keeps a line from reading as a list item or a setext underline.
fn escape_line_start(line: &str) -> String {
    if line.starts_with(['-', '+', '=']) {
        return format!("\\{line}");
    }
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 && line[digits..].starts_with(['.', ')']) {
        return format!("{}\\{}", &line[..digits], &line[digits..]);
    }
    line.to_string()
}

fn link_destination(url: &str) -> String {
    if url.is_empty() || url.contains(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '<' | '>')) {
        format!("<{}>", url.replace('<', "%3C").replace('>', "%3E"))
    } else {
        url.to_string()
    }
}
