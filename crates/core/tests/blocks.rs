use pretty_assertions::assert_eq;
use richmark_core::{
    Align, BlockFormat, BlockKind, BlockPatch, Document, Editor, Node, Op, PluginRegistry, Point,
    Selection, toggle_block_transaction,
};
use serde_json::json;

fn editor_with(children: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document::new(children), selection, PluginRegistry::richtext())
}

fn toggle(editor: &mut Editor, format: &str) {
    editor
        .run_command("block.toggle", Some(json!({ "format": format })))
        .unwrap();
}

fn is_active(editor: &Editor, format: &str) -> bool {
    editor
        .run_query::<bool>("block.is_active", Some(json!({ "format": format })))
        .unwrap()
}

#[test]
fn bulleted_list_toggle_wraps_and_restores_paragraphs() {
    let original = vec![Node::paragraph("one"), Node::paragraph("two")];
    let mut editor = editor_with(
        original.clone(),
        Selection::new(Point::new(vec![0, 0], 0), Point::new(vec![1, 0], 3)),
    );

    toggle(&mut editor, "bulleted-list");
    assert_eq!(
        editor.doc().children,
        vec![Node::list(
            BlockKind::BulletedList,
            vec![Node::list_item("one"), Node::list_item("two")],
        )]
    );
    assert!(is_active(&editor, "bulleted-list"));
    assert!(is_active(&editor, "list-item"));
    assert!(!is_active(&editor, "numbered-list"));

    toggle(&mut editor, "bulleted-list");
    assert_eq!(editor.doc().children, original);
    assert!(!is_active(&editor, "bulleted-list"));
}

#[test]
fn heading_toggle_twice_restores_kind_and_keeps_caret() {
    let mut editor = editor_with(
        vec![Node::paragraph("title")],
        Selection::collapsed(Point::new(vec![0, 0], 2)),
    );

    toggle(&mut editor, "heading-one");
    assert_eq!(
        editor.doc().children,
        vec![Node::block(BlockKind::HeadingOne, vec![Node::text("title")])]
    );
    assert!(is_active(&editor, "heading-one"));
    assert_eq!(
        editor.selection().cloned(),
        Some(Selection::collapsed(Point::new(vec![0, 0], 2)))
    );

    toggle(&mut editor, "heading-one");
    assert_eq!(editor.doc().children, vec![Node::paragraph("title")]);
}

#[test]
fn switching_list_kind_rewraps_items() {
    let mut editor = editor_with(
        vec![Node::list(
            BlockKind::BulletedList,
            vec![Node::list_item("a"), Node::list_item("b")],
        )],
        Selection::new(Point::new(vec![0, 0, 0], 0), Point::new(vec![0, 1, 0], 1)),
    );

    toggle(&mut editor, "numbered-list");
    assert_eq!(
        editor.doc().children,
        vec![Node::list(
            BlockKind::NumberedList,
            vec![Node::list_item("a"), Node::list_item("b")],
        )]
    );
    assert!(is_active(&editor, "numbered-list"));
    assert!(!is_active(&editor, "bulleted-list"));
}

#[test]
fn toggling_middle_item_off_splits_the_list() {
    let mut editor = editor_with(
        vec![Node::list(
            BlockKind::BulletedList,
            vec![
                Node::list_item("a"),
                Node::list_item("b"),
                Node::list_item("c"),
            ],
        )],
        Selection::collapsed(Point::new(vec![0, 1, 0], 0)),
    );

    toggle(&mut editor, "bulleted-list");
    assert_eq!(
        editor.doc().children,
        vec![
            Node::list(BlockKind::BulletedList, vec![Node::list_item("a")]),
            Node::paragraph("b"),
            Node::list(BlockKind::BulletedList, vec![Node::list_item("c")]),
        ]
    );
    assert_eq!(
        editor.selection().cloned(),
        Some(Selection::collapsed(Point::new(vec![1, 0], 0)))
    );
}

#[test]
fn heading_on_list_item_lifts_it_out_of_the_list() {
    let mut editor = editor_with(
        vec![Node::list(
            BlockKind::NumberedList,
            vec![Node::list_item("a"), Node::list_item("b")],
        )],
        Selection::collapsed(Point::new(vec![0, 1, 0], 1)),
    );

    toggle(&mut editor, "heading-two");
    assert_eq!(
        editor.doc().children,
        vec![
            Node::list(BlockKind::NumberedList, vec![Node::list_item("a")]),
            Node::block(BlockKind::HeadingTwo, vec![Node::text("b")]),
        ]
    );
}

#[test]
fn alignment_sets_and_clears_only_the_align_attribute() {
    let mut editor = editor_with(
        vec![Node::list(BlockKind::BulletedList, vec![Node::list_item("a")])],
        Selection::collapsed(Point::new(vec![0, 0, 0], 0)),
    );

    toggle(&mut editor, "center");
    let Node::Block(list) = &editor.doc().children[0] else {
        panic!("expected list block");
    };
    assert_eq!(list.kind, BlockKind::BulletedList);
    assert_eq!(list.align, None);
    let Node::Block(item) = &list.children[0] else {
        panic!("expected list item");
    };
    assert_eq!(item.kind, BlockKind::ListItem);
    assert_eq!(item.align, Some(Align::Center));
    assert!(is_active(&editor, "center"));
    assert!(!is_active(&editor, "left"));

    toggle(&mut editor, "center");
    assert_eq!(
        editor.doc().children,
        vec![Node::list(BlockKind::BulletedList, vec![Node::list_item("a")])]
    );
}

#[test]
fn alignment_patches_blocks_in_place_and_undoes() {
    let original = vec![Node::paragraph("one"), Node::paragraph("two")];
    let selection = Selection::new(Point::new(vec![0, 0], 1), Point::new(vec![1, 0], 1));
    let mut editor = editor_with(original.clone(), selection.clone());

    let tx = toggle_block_transaction(editor.doc(), &selection, BlockFormat::Align(Align::Right))
        .unwrap();
    assert_eq!(
        tx.ops,
        vec![
            Op::SetBlock {
                path: vec![0],
                patch: BlockPatch::align(Some(Align::Right)),
            },
            Op::SetBlock {
                path: vec![1],
                patch: BlockPatch::align(Some(Align::Right)),
            },
        ]
    );

    editor.apply(tx).unwrap();
    assert!(is_active(&editor, "right"));
    assert_eq!(editor.selection().cloned(), Some(selection));

    assert!(editor.undo());
    assert_eq!(editor.doc().children, original);
    assert!(!is_active(&editor, "right"));
}

#[test]
fn hanging_selection_does_not_touch_the_next_block() {
    let mut editor = editor_with(
        vec![Node::paragraph("one"), Node::paragraph("two")],
        Selection::new(Point::new(vec![0, 0], 0), Point::new(vec![1, 0], 0)),
    );

    toggle(&mut editor, "heading-one");
    assert_eq!(
        editor.doc().children,
        vec![
            Node::block(BlockKind::HeadingOne, vec![Node::text("one")]),
            Node::paragraph("two"),
        ]
    );
}

#[test]
fn block_commands_are_noops_without_selection() {
    let mut editor = editor_with(
        vec![Node::paragraph("one")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );
    editor.deselect();

    toggle(&mut editor, "heading-one");
    assert_eq!(editor.doc().children, vec![Node::paragraph("one")]);
    assert!(!is_active(&editor, "paragraph"));
    assert!(!editor.can_undo());
}

#[test]
fn unknown_format_is_a_command_error() {
    let mut editor = Editor::with_richtext_plugins();
    let err = editor
        .run_command("block.toggle", Some(json!({ "format": "heading-three" })))
        .unwrap_err();
    assert!(err.message().contains("heading-three"));
}
