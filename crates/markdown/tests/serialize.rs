use std::sync::Mutex;

use pretty_assertions::assert_eq;
use richmark_core::{
    BlockKind, Document, Editor, KeyCombo, Mark, Marks, Node, PluginRegistry, Point, Selection,
    handle_key,
};
use richmark_markdown::{
    Converter, GrammarEngine, MdNode, ParseError, SerializeOptions, document_to_markdown,
    markdown_to_document,
};
use rstest::rstest;

fn marks(list: &[Mark]) -> Marks {
    list.iter().copied().collect()
}

fn paragraph(children: Vec<Node>) -> Node {
    Node::block(BlockKind::Paragraph, children)
}

#[test]
fn writes_each_block_kind() {
    let doc = Document::new(vec![
        Node::block(BlockKind::HeadingOne, vec![Node::text("Title")]),
        Node::block(BlockKind::HeadingTwo, vec![Node::text("Sub")]),
        paragraph(vec![
            Node::text("a "),
            Node::marked("b", marks(&[Mark::Bold])),
            Node::text(" "),
            Node::link("https://x.io", vec![Node::text("c")]),
        ]),
        Node::list(
            BlockKind::BulletedList,
            vec![Node::list_item("one"), Node::list_item("two")],
        ),
        Node::list(BlockKind::NumberedList, vec![Node::list_item("x")]),
        Node::block(BlockKind::BlockQuote, vec![Node::text("q1\nq2")]),
    ]);

    assert_eq!(
        document_to_markdown(&doc),
        "# Title\n\n## Sub\n\na **b** [c](https://x.io)\n\n- one\n- two\n\n1. x\n\n> q1\\\n> q2\n"
    );
}

#[test]
fn empty_paragraph_is_a_br_tag() {
    let doc = Document::new(vec![Node::paragraph("a"), Node::paragraph(""), Node::paragraph("b")]);
    let markdown = document_to_markdown(&doc);
    assert_eq!(markdown, "a\n\n<br>\n\nb\n");
    assert_eq!(markdown_to_document(&markdown).unwrap(), doc);
}

#[test]
fn markup_characters_are_escaped() {
    let doc = Document::new(vec![
        Node::paragraph("1. not a list *star* [x]"),
        Node::paragraph("- nor this # one"),
    ]);
    let markdown = document_to_markdown(&doc);
    assert_eq!(
        markdown,
        "1\\. not a list \\*star\\* \\[x\\]\n\n\\- nor this \\# one\n"
    );
    assert_eq!(markdown_to_document(&markdown).unwrap(), doc);
}

#[test]
fn whitespace_stays_outside_mark_delimiters() {
    let doc = Document::new(vec![paragraph(vec![
        Node::text("a"),
        Node::marked(" b ", marks(&[Mark::Bold])),
        Node::text("c"),
    ])]);
    assert_eq!(document_to_markdown(&doc), "a **b** c\n");
}

#[test]
fn trailing_line_break_is_a_br_tag() {
    let doc = Document::new(vec![Node::paragraph("ab\n"), Node::paragraph("next")]);
    let markdown = document_to_markdown(&doc);
    assert_eq!(markdown, "ab<br>\n\nnext\n");
    assert_eq!(markdown_to_document(&markdown).unwrap(), doc);
}

#[test]
fn line_break_typed_at_the_end_survives_saving() {
    let mut editor = Editor::new(
        Document::new(vec![Node::paragraph("ab")]),
        Selection::collapsed(Point::new(vec![0, 0], 2)),
        PluginRegistry::richtext(),
    );
    let shift_enter: KeyCombo = "shift+enter".parse().unwrap();
    handle_key(&mut editor, &shift_enter).unwrap();
    assert_eq!(editor.doc().children, vec![Node::paragraph("ab\n")]);

    let markdown = document_to_markdown(editor.doc());
    assert_eq!(markdown_to_document(&markdown).unwrap(), *editor.doc());
}

#[test]
fn delimiters_that_would_not_close_fall_back_to_tags() {
    let doc = Document::new(vec![paragraph(vec![
        Node::marked("foo.", marks(&[Mark::Bold])),
        Node::text("bar"),
    ])]);
    let markdown = document_to_markdown(&doc);
    assert_eq!(markdown, "<strong>foo.</strong>bar\n");
    assert_eq!(markdown_to_document(&markdown).unwrap(), doc);
}

#[rstest]
#[case::marks(vec![paragraph(vec![
    Node::text("plain "),
    Node::marked("bold", marks(&[Mark::Bold])),
    Node::text(" and "),
    Node::marked("all", marks(&[Mark::Bold, Mark::Italic, Mark::Strikethrough])),
    Node::text(" then "),
    Node::marked("italic", marks(&[Mark::Italic])),
])])]
#[case::intraword_italic(vec![paragraph(vec![
    Node::text("snake"),
    Node::marked("case", marks(&[Mark::Italic])),
])])]
#[case::line_break(vec![Node::paragraph("a\nb")])]
#[case::link_in_list_item(vec![Node::list(
    BlockKind::BulletedList,
    vec![Node::block(
        BlockKind::ListItem,
        vec![
            Node::text("see "),
            Node::link("https://example.com/a_b", vec![Node::text("docs")]),
        ],
    )],
)])]
#[case::link_in_heading(vec![Node::block(
    BlockKind::HeadingTwo,
    vec![Node::link("https://example.com", vec![Node::text("Title")])],
)])]
#[case::struck_link_text(vec![paragraph(vec![Node::link(
    "https://example.com/path?q=1",
    vec![Node::marked("old", marks(&[Mark::Strikethrough]))],
)])])]
#[case::numbered_multiline_item(vec![Node::list(
    BlockKind::NumberedList,
    vec![Node::list_item("first\nsecond"), Node::list_item("third")],
)])]
#[case::trailing_break_in_list_item(vec![Node::list(
    BlockKind::BulletedList,
    vec![Node::list_item("one\n"), Node::list_item("two")],
)])]
#[case::trailing_break_in_quote(vec![Node::block(
    BlockKind::BlockQuote,
    vec![Node::text("quoted\n")],
)])]
#[case::double_trailing_break(vec![Node::paragraph("a\n\n")])]
#[case::only_a_line_break(vec![Node::paragraph("\n"), Node::paragraph("after")])]
#[case::italic_punctuation_between_letters(vec![paragraph(vec![
    Node::text("a"),
    Node::marked("(x)", marks(&[Mark::Italic])),
    Node::text("b"),
])])]
#[case::struck_bold_before_a_word(vec![paragraph(vec![
    Node::marked("done!", marks(&[Mark::Bold, Mark::Strikethrough])),
    Node::text("next"),
])])]
#[case::quote_then_paragraph(vec![
    Node::block(BlockKind::BlockQuote, vec![Node::text("quoted")]),
    Node::paragraph("after"),
])]
fn round_trip_preserves_structure(#[case] children: Vec<Node>) {
    let doc = Document::new(children);
    let markdown = document_to_markdown(&doc);
    assert_eq!(markdown_to_document(&markdown).unwrap(), doc, "{markdown}");
}

#[test]
fn markdown_round_trip_is_stable() {
    let source = "# Notes\n\nSome **bold** and *italic* text with a [link](https://example.com).\n\n- one\n- two\n\n> quoted\n";
    let once = document_to_markdown(&markdown_to_document(source).unwrap());
    let twice = document_to_markdown(&markdown_to_document(&once).unwrap());
    assert_eq!(once, twice);
    assert_eq!(
        markdown_to_document(&once).unwrap(),
        markdown_to_document(source).unwrap()
    );
}

/// Records what the converter hands to the engine.
#[derive(Default)]
struct RecordingEngine {
    seen: Mutex<Vec<MdNode>>,
}

impl GrammarEngine for RecordingEngine {
    fn parse(&self, _text: &str) -> Result<Vec<MdNode>, ParseError> {
        Ok(Vec::new())
    }

    fn serialize(&self, node: &MdNode, _options: &SerializeOptions) -> String {
        self.seen.lock().unwrap().push(node.clone());
        String::new()
    }
}

#[test]
fn paragraph_children_expose_engine_names() {
    let struck = marks(&[Mark::Strikethrough]);
    let doc = Document::new(vec![
        paragraph(vec![
            Node::marked("x", struck),
            Node::link("https://p.io", vec![Node::text("p")]),
        ]),
        Node::list(
            BlockKind::BulletedList,
            vec![Node::block(
                BlockKind::ListItem,
                vec![
                    Node::marked("y", struck),
                    Node::link("https://l.io", vec![Node::text("l")]),
                ],
            )],
        ),
    ]);

    let converter = Converter::with_engine(RecordingEngine::default());
    converter.serialize(&doc);
    let seen = converter.engine().seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);

    let para = seen[0].children();
    assert!(para[0].flag("strikethrough") && para[0].flag("strikeThrough"));
    assert_eq!(para[1].prop_str("url"), Some("https://p.io"));
    assert_eq!(para[1].prop_str("link"), Some("https://p.io"));

    let item = seen[1].children()[0].children();
    assert!(item[0].flag("strikethrough"));
    assert!(!item[0].flag("strikeThrough"));
    assert_eq!(item[1].prop_str("url"), Some("https://l.io"));
    assert_eq!(item[1].prop_str("link"), None);
}
