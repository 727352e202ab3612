use pretty_assertions::assert_eq;
use richmark_core::{
    ApplyError, BlockKind, Document, Editor, EditorConfig, Node, Op, PluginRegistry, Point,
    Selection, Transaction, insert_text,
};
use serde_json::json;

fn editor_with_text(text: &str) -> Editor {
    let doc = Document {
        children: vec![Node::paragraph(text)],
    };
    let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
    Editor::new(doc, selection, PluginRegistry::core())
}

fn focus_offset(editor: &Editor) -> Option<usize> {
    editor.selection().map(|s| s.focus.offset)
}

#[test]
fn undo_redo_handles_multi_op_insert_order() {
    let mut editor = editor_with_text("");

    let tx = Transaction::new(vec![
        Op::InsertText {
            path: vec![0, 0],
            offset: 0,
            text: "a".to_string(),
        },
        Op::InsertText {
            path: vec![0, 0],
            offset: 1,
            text: "b".to_string(),
        },
    ])
    .selection_after(Selection::collapsed(Point::new(vec![0, 0], 2)))
    .source("test:multi_insert");

    editor.apply(tx).unwrap();
    assert_eq!(editor.doc().children, vec![Node::paragraph("ab")]);
    assert_eq!(focus_offset(&editor), Some(2));

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("")]);
    assert_eq!(focus_offset(&editor), Some(0));

    assert!(editor.redo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("ab")]);
    assert_eq!(focus_offset(&editor), Some(2));
}

#[test]
fn undo_redo_handles_multi_op_paste_newline_shape() {
    let mut editor = editor_with_text("XYZ");
    let selection_before = editor.selection().cloned();

    let tx = Transaction::new(vec![
        Op::RemoveText {
            path: vec![0, 0],
            range: 0..3,
        },
        Op::InsertText {
            path: vec![0, 0],
            offset: 0,
            text: "a".to_string(),
        },
        Op::InsertNode {
            path: vec![1],
            node: Node::paragraph("bXYZ"),
        },
    ])
    .selection_after(Selection::collapsed(Point::new(vec![1, 0], 1)))
    .source("test:paste_newline");

    editor.apply(tx).unwrap();
    let doc_after = editor.doc().clone();
    let selection_after = editor.selection().cloned();

    assert_eq!(doc_after.children.len(), 2);
    assert_eq!(
        selection_after,
        Some(Selection::collapsed(Point::new(vec![1, 0], 1)))
    );

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("XYZ")]);
    assert_eq!(editor.selection().cloned(), selection_before);

    assert!(editor.redo());
    assert_eq!(editor.doc(), &doc_after);
    assert_eq!(editor.selection().cloned(), selection_after);
}

#[test]
fn block_toggle_undoes_in_one_step() {
    let doc = Document::new(vec![Node::paragraph("one"), Node::paragraph("two")]);
    let selection = Selection::new(Point::new(vec![0, 0], 0), Point::new(vec![1, 0], 3));
    let mut editor = Editor::new(doc.clone(), selection, PluginRegistry::richtext());

    editor
        .run_command("block.toggle", Some(json!({ "format": "numbered-list" })))
        .unwrap();
    assert_eq!(editor.doc().children.len(), 1);

    assert!(editor.undo());
    assert_eq!(editor.doc(), &doc);
    assert!(!editor.can_undo());
    assert!(editor.can_redo());

    assert!(editor.redo());
    assert_eq!(
        editor.doc().children,
        vec![Node::list(
            BlockKind::NumberedList,
            vec![Node::list_item("one"), Node::list_item("two")],
        )]
    );
}

#[test]
fn new_edit_clears_redo_stack() {
    let mut editor = editor_with_text("");
    insert_text(&mut editor, "a").unwrap();
    assert!(editor.undo());
    assert!(editor.can_redo());

    insert_text(&mut editor, "b").unwrap();
    assert!(!editor.can_redo());
    assert!(!editor.redo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("b")]);
}

#[test]
fn undo_stack_is_capped() {
    let doc = Document::new(vec![Node::paragraph("")]);
    let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
    let config = EditorConfig {
        max_undo: 2,
        ..EditorConfig::default()
    };
    let mut editor = Editor::with_config(doc, selection, PluginRegistry::core(), config);

    for text in ["a", "b", "c"] {
        insert_text(&mut editor, text).unwrap();
    }
    assert_eq!(editor.doc().children, vec![Node::paragraph("abc")]);

    assert!(editor.undo());
    assert!(editor.undo());
    assert!(!editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("a")]);
}

#[test]
fn invalid_transaction_leaves_editor_untouched() {
    let mut editor = editor_with_text("abc");

    let err = editor
        .apply(Transaction::new(vec![Op::RemoveNode { path: vec![5] }]))
        .unwrap_err();
    assert!(matches!(err, ApplyError::InvalidPath(_)));
    assert_eq!(editor.doc().children, vec![Node::paragraph("abc")]);
    assert!(!editor.can_undo());
}

#[test]
fn empty_history_reports_nothing_to_do() {
    let mut editor = editor_with_text("abc");
    assert!(!editor.undo());
    assert!(!editor.redo());
}

#[test]
fn preview_leaves_the_editor_untouched() {
    let editor = editor_with_text("ab");
    let tx = Transaction::new(vec![Op::InsertText {
        path: vec![0, 0],
        offset: 1,
        text: "X".to_string(),
    }])
    .selection_after(Selection::collapsed(Point::new(vec![0, 0], 2)));

    let preview = editor.preview_transaction(&tx).unwrap();
    assert_eq!(preview.doc.plain_text(), "aXb");
    assert_eq!(
        preview.selection,
        Some(Selection::collapsed(Point::new(vec![0, 0], 2)))
    );
    assert_eq!(editor.doc().plain_text(), "ab");
    assert!(!editor.can_undo());
}

#[test]
fn plain_text_puts_each_block_on_its_own_line() {
    let doc = Document::new(vec![
        Node::paragraph("title"),
        Node::list(
            BlockKind::BulletedList,
            vec![Node::list_item("one"), Node::list_item("two")],
        ),
    ]);
    assert_eq!(doc.plain_text(), "title\none\ntwo");
}
