use std::collections::HashMap;

use pretty_assertions::assert_eq;
use richmark_email::{
    FragmentParser, HtmlNode, InlineNode, TextFragmentParser, html_fragment_to_inline_nodes,
    html_to_inline_nodes,
};
use rstest::rstest;
use serde_json::json;

fn string(value: &str) -> InlineNode {
    InlineNode::String {
        value: value.to_string(),
    }
}

#[test]
fn text_break_and_bold() {
    let nodes = vec![
        HtmlNode::text("hi"),
        HtmlNode::line_break(),
        HtmlNode::element("b", "bold"),
    ];
    assert_eq!(
        html_to_inline_nodes(&nodes, &TextFragmentParser),
        vec![
            string("hi"),
            InlineNode::LineBreak,
            InlineNode::Bold {
                content: vec![string("bold")],
            },
        ]
    );
}

#[test]
fn missing_text_value_is_an_empty_string() {
    let nodes = vec![HtmlNode {
        node_name: "#text".to_string(),
        node_value: None,
        text_content: None,
    }];
    assert_eq!(
        html_to_inline_nodes(&nodes, &TextFragmentParser),
        vec![string("")]
    );
}

#[rstest]
#[case("SPAN")]
#[case("#comment")]
#[case("A")]
#[case("DIV")]
fn other_nodes_are_skipped(#[case] name: &str) {
    let nodes = vec![HtmlNode::element(name, "ignored"), HtmlNode::text("kept")];
    assert_eq!(
        html_to_inline_nodes(&nodes, &TextFragmentParser),
        vec![string("kept")]
    );
}

#[test]
fn names_match_case_insensitively() {
    let nodes = vec![
        HtmlNode {
            node_name: "br".to_string(),
            node_value: None,
            text_content: None,
        },
        HtmlNode {
            node_name: "i".to_string(),
            node_value: None,
            text_content: Some("x".to_string()),
        },
    ];
    assert_eq!(
        html_to_inline_nodes(&nodes, &TextFragmentParser),
        vec![
            InlineNode::LineBreak,
            InlineNode::Italic {
                content: vec![string("x")],
            },
        ]
    );
}

#[test]
fn empty_container_has_no_content() {
    let nodes = vec![HtmlNode {
        node_name: "B".to_string(),
        node_value: None,
        text_content: None,
    }];
    assert_eq!(
        html_to_inline_nodes(&nodes, &TextFragmentParser),
        vec![InlineNode::Bold {
            content: Vec::new(),
        }]
    );
}

/// Answers from a fixed table, standing in for a DOM.
struct TableParser(HashMap<&'static str, Vec<HtmlNode>>);

impl FragmentParser for TableParser {
    fn parse_fragment(&self, html: &str) -> Vec<HtmlNode> {
        self.0
            .get(html)
            .cloned()
            .unwrap_or_else(|| vec![HtmlNode::text(html)])
    }
}

#[test]
fn containers_recurse_through_the_parser() {
    let parser = TableParser(HashMap::from([
        (
            "<b>loud <i>and</i></b> quiet",
            vec![
                HtmlNode::element("B", "loud <i>and</i>"),
                HtmlNode::text(" quiet"),
            ],
        ),
        (
            "loud <i>and</i>",
            vec![HtmlNode::text("loud "), HtmlNode::element("I", "and")],
        ),
    ]));

    assert_eq!(
        html_fragment_to_inline_nodes("<b>loud <i>and</i></b> quiet", &parser),
        vec![
            InlineNode::Bold {
                content: vec![
                    string("loud "),
                    InlineNode::Italic {
                        content: vec![string("and")],
                    },
                ],
            },
            string(" quiet"),
        ]
    );
}

#[test]
fn json_shapes() {
    let nodes: Vec<HtmlNode> = serde_json::from_value(json!([
        { "nodeName": "#text", "nodeValue": "hi" },
        { "nodeName": "BR" },
        { "nodeName": "I", "textContent": "soft" },
    ]))
    .unwrap();

    let inline = html_to_inline_nodes(&nodes, &TextFragmentParser);
    assert_eq!(
        serde_json::to_value(&inline).unwrap(),
        json!([
            { "kind": "string", "value": "hi" },
            { "kind": "lineBreak" },
            { "kind": "italic", "content": [{ "kind": "string", "value": "soft" }] },
        ])
    );
}
