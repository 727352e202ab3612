use pretty_assertions::assert_eq;
use richmark_core::{BlockKind, Mark, Marks, Node};
use richmark_markdown::{
    Converter, GrammarEngine, MarkdownOptions, MdNode, ParseError, SerializeOptions,
    markdown_to_document,
};

fn parse(text: &str) -> Vec<Node> {
    markdown_to_document(text).unwrap().children
}

fn marks(list: &[Mark]) -> Marks {
    list.iter().copied().collect()
}

#[test]
fn heading_and_list() {
    assert_eq!(
        parse("# Heading\n\n- item one\n- item two\n"),
        vec![
            Node::block(BlockKind::HeadingOne, vec![Node::text("Heading")]),
            Node::list(
                BlockKind::BulletedList,
                vec![Node::list_item("item one"), Node::list_item("item two")],
            ),
        ]
    );
}

#[test]
fn inline_marks() {
    assert_eq!(
        parse("**bold** _it_ ~~gone~~ plain"),
        vec![Node::block(
            BlockKind::Paragraph,
            vec![
                Node::marked("bold", marks(&[Mark::Bold])),
                Node::text(" "),
                Node::marked("it", marks(&[Mark::Italic])),
                Node::text(" "),
                Node::marked("gone", marks(&[Mark::Strikethrough])),
                Node::text(" plain"),
            ],
        )]
    );
}

#[test]
fn links_carry_their_url() {
    assert_eq!(
        parse("see [docs](https://example.com)"),
        vec![Node::block(
            BlockKind::Paragraph,
            vec![
                Node::text("see "),
                Node::link("https://example.com", vec![Node::text("docs")]),
            ],
        )]
    );
}

#[test]
fn numbered_list_and_quote() {
    assert_eq!(
        parse("1. first\n2. second\n\n> one\n> two\n"),
        vec![
            Node::list(
                BlockKind::NumberedList,
                vec![Node::list_item("first"), Node::list_item("second")],
            ),
            Node::block(BlockKind::BlockQuote, vec![Node::text("one\ntwo")]),
        ]
    );
}

#[test]
fn deep_headings_become_heading_two() {
    assert_eq!(
        parse("### Deep\n\n###### Deeper\n"),
        vec![
            Node::block(BlockKind::HeadingTwo, vec![Node::text("Deep")]),
            Node::block(BlockKind::HeadingTwo, vec![Node::text("Deeper")]),
        ]
    );
}

#[test]
fn loose_list_item_paragraphs_are_joined() {
    assert_eq!(
        parse("- a\n\n  b\n"),
        vec![Node::list(
            BlockKind::BulletedList,
            vec![Node::list_item("a\nb")],
        )]
    );
}

#[test]
fn unsupported_blocks_are_healed() {
    assert_eq!(
        parse("a\n\n---\n\n```rust\nfn main() {}\n```\n\n<br>\n\n-\n"),
        vec![
            Node::paragraph("a"),
            Node::paragraph("fn main() {}"),
            Node::paragraph(""),
            Node::list(BlockKind::BulletedList, vec![Node::list_item("")]),
        ]
    );
}

#[test]
fn images_keep_alt_text() {
    assert_eq!(
        parse("![a cat](cat.png) here"),
        vec![Node::paragraph("a cat here")]
    );
}

#[test]
fn strikethrough_needs_gfm() {
    let converter = Converter::new(MarkdownOptions {
        gfm: false,
        ..MarkdownOptions::default()
    });
    assert_eq!(
        converter.parse("~~x~~").unwrap().children,
        vec![Node::paragraph("~~x~~")]
    );
}

#[test]
fn nesting_limit_is_a_parse_error() {
    let converter = Converter::new(MarkdownOptions {
        max_depth: 3,
        ..MarkdownOptions::default()
    });
    assert_eq!(
        converter.parse("> > > > deep\n"),
        Err(ParseError::TooDeep { max_depth: 3 })
    );
    assert!(converter.parse("> > deep\n").is_ok());
}

/// Hands back a fixed tree, the way an external engine might.
struct StaticEngine(Result<Vec<MdNode>, ParseError>);

impl GrammarEngine for StaticEngine {
    fn parse(&self, _text: &str) -> Result<Vec<MdNode>, ParseError> {
        self.0.clone()
    }

    fn serialize(&self, node: &MdNode, _options: &SerializeOptions) -> String {
        node.plain_text()
    }
}

#[test]
fn engine_trees_are_renamed_and_healed() {
    let tree = vec![
        MdNode::text("loose"),
        MdNode::element(
            "ul_list",
            vec![MdNode::element("paragraph", vec![MdNode::text("x")])],
        ),
        MdNode::element(
            "paragraph",
            vec![
                MdNode::element(
                    "link",
                    vec![
                        MdNode::text("a"),
                        MdNode::element("link", vec![MdNode::text("b")])
                            .with_prop("link", "https://b.io"),
                    ],
                )
                .with_prop("link", "https://a.io"),
                MdNode::element("link", vec![MdNode::text("c")]),
            ],
        ),
        MdNode::element(
            "custom",
            vec![MdNode::element(
                "ol_list",
                vec![MdNode::element("list_item", vec![MdNode::text("y").with_prop("bold", true)])],
            )],
        ),
    ];

    let doc = Converter::with_engine(StaticEngine(Ok(tree)))
        .parse("ignored")
        .unwrap();
    assert_eq!(
        doc.children,
        vec![
            Node::paragraph("loose"),
            Node::list(BlockKind::BulletedList, vec![Node::list_item("x")]),
            Node::block(
                BlockKind::Paragraph,
                vec![
                    Node::link("https://a.io", vec![Node::text("ab")]),
                    Node::text("c"),
                ],
            ),
            Node::list(
                BlockKind::NumberedList,
                vec![Node::block(
                    BlockKind::ListItem,
                    vec![Node::marked("y", marks(&[Mark::Bold]))],
                )],
            ),
        ]
    );
}

#[test]
fn engine_failures_surface_unchanged() {
    let converter =
        Converter::with_engine(StaticEngine(Err(ParseError::Engine("boom".to_string()))));
    assert_eq!(
        converter.parse("x"),
        Err(ParseError::Engine("boom".to_string()))
    );
}

#[test]
fn mark_props_follow_their_truthiness() {
    let tree = vec![MdNode::element(
        "paragraph",
        vec![
            MdNode::text("a").with_prop("italic", "yes"),
            MdNode::text("b")
                .with_prop("bold", false)
                .with_prop("strikeThrough", serde_json::Value::Null),
            MdNode::text("c").with_prop("strikethrough", 1),
        ],
    )];

    let doc = Converter::with_engine(StaticEngine(Ok(tree)))
        .parse("ignored")
        .unwrap();
    assert_eq!(
        doc.children,
        vec![Node::block(
            BlockKind::Paragraph,
            vec![
                Node::marked("a", marks(&[Mark::Italic])),
                Node::text("b"),
                Node::marked("c", marks(&[Mark::Strikethrough])),
            ],
        )]
    );
}

#[test]
fn inline_html_tags_become_marks() {
    assert_eq!(
        parse("<b>x</b> and <em>y</em> <del>z</del>\n"),
        vec![Node::block(
            BlockKind::Paragraph,
            vec![
                Node::marked("x", marks(&[Mark::Bold])),
                Node::text(" and "),
                Node::marked("y", marks(&[Mark::Italic])),
                Node::text(" "),
                Node::marked("z", marks(&[Mark::Strikethrough])),
            ],
        )]
    );
}

#[test]
fn unclosed_html_marks_end_with_their_block() {
    assert_eq!(
        parse("a <strong>b\n\nc\n"),
        vec![
            Node::block(
                BlockKind::Paragraph,
                vec![Node::text("a "), Node::marked("b", marks(&[Mark::Bold]))],
            ),
            Node::paragraph("c"),
        ]
    );
}
