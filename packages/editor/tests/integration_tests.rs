//! End-to-end behaviour of the editor: replication, history, the style
//! resolver seen through selectables, serialization and clipboard.

use proptest::prelude::*;
use std::collections::HashSet;
use std::rc::Rc;
use trellis_editor::{
    resolve, AlignSelf, ChangeOrigin, Color, DataUrlFetcher, Dimension, DocumentStore,
    EditSession, EditorConfig, EditorError, IdPath, ImageBlob, Layout, NodeType, PartialStyle,
    Position, PositionConstraint, PositionConstraints, Project, ProjectJson, Selectable,
    SizeConstraint, StackDirection, StyleRecord,
};

fn store(client_id: u64) -> DocumentStore {
    DocumentStore::with_client_id(client_id, &EditorConfig::default())
}

fn sync(from: &mut DocumentStore, to: &mut DocumentStore) {
    for update in from.take_outgoing() {
        to.apply_update(&update).unwrap();
    }
}

fn page(store: &mut DocumentStore) -> String {
    store
        .transact(|tx| {
            let page = tx.create(NodeType::Page)?;
            tx.reparent(&page, None, None)?;
            Ok(page)
        })
        .unwrap()
}

fn fills(hex: &str) -> PartialStyle {
    PartialStyle {
        fills: Some(vec![Color::new(hex)]),
        ..Default::default()
    }
}

#[test]
fn test_x_stack_text_fill_scenario() {
    let mut store = store(1);
    let page = page(&mut store);
    let (frame, text) = store
        .transact(|tx| {
            let frame = tx.create(NodeType::Frame)?;
            let text = tx.create(NodeType::Text)?;
            tx.append(&page, &[frame.clone()])?;
            tx.append(&frame, &[text.clone()])?;
            tx.set_style(
                &IdPath::single(&frame),
                &PartialStyle {
                    layout: Some(Layout::Stack),
                    stack_direction: Some(StackDirection::X),
                    ..Default::default()
                },
            )?;
            tx.set_style(
                &IdPath::single(&text),
                &PartialStyle {
                    width: Some(SizeConstraint::Fill),
                    height: Some(SizeConstraint::Fill),
                    ..Default::default()
                },
            )?;
            Ok((frame, text))
        })
        .unwrap();

    let snapshot = store.snapshot().unwrap();
    let element = Selectable::root(snapshot, &text).unwrap();
    assert_eq!(element.parent().unwrap().id(), frame);

    let attrs = element.resolve();
    assert_eq!(attrs.position, Some(Position::Relative));
    assert_eq!(attrs.flex, Some(1.0));
    assert_eq!(attrs.align_self, Some(AlignSelf::Stretch));
    assert_eq!(attrs.width, None);
    assert_eq!(attrs.height, None);
}

#[test]
fn test_resolver_is_pure_and_ignores_components() {
    let style = StyleRecord {
        position: PositionConstraints {
            x: PositionConstraint::Start { start: 12.0 },
            y: PositionConstraint::End { end: 4.0 },
        },
        width: SizeConstraint::Fill,
        height: SizeConstraint::Fixed { value: 30.0 },
        ..Default::default()
    };

    let first = resolve(NodeType::Frame, &style, None);
    let second = resolve(NodeType::Frame, &style, None);
    assert_eq!(first, second);
    assert_eq!(first.left, Some(12.0));
    assert_eq!(first.bottom, Some(4.0));
    // Fill without a stacking parent falls back to the whole container
    assert_eq!(first.width, Some(Dimension::Percent(100.0)));
    assert_eq!(first.height, Some(Dimension::Px(30.0)));

    assert!(resolve(NodeType::Component, &style, Some(StackDirection::Y)).is_empty());
}

#[test]
fn test_instances_expand_with_independent_overrides() {
    let mut store = store(2);
    let page = page(&mut store);
    let (label, first, second) = store
        .transact(|tx| {
            let component = tx.create(NodeType::Component)?;
            tx.reparent(&component, None, None)?;
            let label = tx.create(NodeType::Text)?;
            tx.append(&component, &[label.clone()])?;
            tx.set_style(&IdPath::single(&label), &fills("#000000"))?;

            let first = tx.create(NodeType::Instance)?;
            let second = tx.create(NodeType::Instance)?;
            tx.append(&page, &[first.clone(), second.clone()])?;
            let reference = PartialStyle {
                main_component: Some(Some(component.clone())),
                ..Default::default()
            };
            tx.set_style(&IdPath::single(&first), &reference)?;
            tx.set_style(&IdPath::single(&second), &reference)?;
            Ok((label, first, second))
        })
        .unwrap();

    let in_first = IdPath::new(vec![first.clone(), label.clone()]).unwrap();
    store.set_style(&in_first, &fills("#ff0000")).unwrap();

    let snapshot = store.snapshot().unwrap();
    let first_label = Selectable::from_path(Rc::clone(&snapshot), in_first).unwrap();
    let second_label =
        Selectable::from_path(Rc::clone(&snapshot), IdPath::new(vec![second, label.clone()]).unwrap())
            .unwrap();
    let source = Selectable::root(snapshot, &label).unwrap();

    assert_eq!(first_label.style().fills, vec![Color::new("#ff0000")]);
    assert_eq!(second_label.style().fills, vec![Color::new("#000000")]);
    assert_eq!(source.style().fills, vec![Color::new("#000000")]);
    assert!(first_label.is_in_instance());
}

#[test]
fn test_undo_redo_restore_state_exactly() {
    let mut store = store(3);
    let page = page(&mut store);
    store.clear_history();
    let before = trellis_editor::to_json(&store.snapshot().unwrap());

    let mut frames = Vec::new();
    for i in 0..5 {
        let frame = store.create(NodeType::Frame).unwrap();
        store.append(&page, &[frame.clone()]).unwrap();
        store
            .set_style(&IdPath::single(&frame), &fills(&format!("#00000{}", i)))
            .unwrap();
        frames.push(frame);
    }
    let after = trellis_editor::to_json(&store.snapshot().unwrap());

    let mut undone = 0;
    while store.undo().unwrap() {
        undone += 1;
    }
    assert_eq!(undone, 15);
    assert_eq!(trellis_editor::to_json(&store.snapshot().unwrap()), before);

    while store.redo().unwrap() {}
    assert_eq!(trellis_editor::to_json(&store.snapshot().unwrap()), after);
    assert_eq!(frames.len(), store.snapshot().unwrap().child_ids(&page).len());
}

#[test]
fn test_undo_keeps_remote_edits() {
    let mut alice = store(10);
    let mut bob = store(11);
    let page = page(&mut alice);
    let frame = alice.create(NodeType::Frame).unwrap();
    alice.append(&page, &[frame.clone()]).unwrap();
    sync(&mut alice, &mut bob);

    alice.set_style(&IdPath::single(&frame), &fills("#111111")).unwrap();
    sync(&mut alice, &mut bob);
    bob.set_style(&IdPath::single(&frame), &fills("#222222")).unwrap();
    bob.set_name(&frame, Some("Bob's".to_string())).unwrap();
    sync(&mut bob, &mut alice);

    // Alice's fill was overwritten by Bob, so undoing it changes nothing
    assert!(alice.undo().unwrap());
    let snapshot = alice.snapshot().unwrap();
    assert_eq!(snapshot.node_style(&frame).fills, vec![Color::new("#222222")]);
    assert_eq!(snapshot.node(&frame).unwrap().name.as_deref(), Some("Bob's"));
}

#[test]
fn test_replicas_converge_in_any_order() {
    let mut alice = store(20);
    let mut bob = store(21);
    let mut carol = store(22);

    let page_a = page(&mut alice);
    let a_updates = alice.take_outgoing();
    let page_b = page(&mut bob);
    let frame = bob.create(NodeType::Frame).unwrap();
    bob.append(&page_b, &[frame.clone()]).unwrap();
    let b_updates = bob.take_outgoing();

    for update in &b_updates {
        alice.apply_update(update).unwrap();
    }
    for update in &a_updates {
        bob.apply_update(update).unwrap();
    }
    // Carol receives everything in reverse order
    for update in b_updates.iter().rev().chain(a_updates.iter().rev()) {
        carol.apply_update(update).unwrap();
    }

    let expected = trellis_editor::to_json(&alice.snapshot().unwrap());
    assert_eq!(trellis_editor::to_json(&bob.snapshot().unwrap()), expected);
    assert_eq!(trellis_editor::to_json(&carol.snapshot().unwrap()), expected);
    assert!(expected.nodes.contains_key(&page_a));
    assert!(expected.nodes.contains_key(&frame));
}

#[test]
fn test_remote_updates_notify_subscribers() {
    let mut alice = store(30);
    let mut bob = store(31);
    let origins = Rc::new(std::cell::RefCell::new(Vec::new()));
    let seen = Rc::clone(&origins);
    bob.subscribe(move |event| seen.borrow_mut().push(event.origin));

    page(&mut alice);
    sync(&mut alice, &mut bob);
    assert_eq!(*origins.borrow(), vec![ChangeOrigin::Remote]);
}

#[test]
fn test_disposed_store_rejects_everything() {
    let mut store = store(4);
    let page = page(&mut store);
    store.dispose();

    assert!(matches!(store.snapshot(), Err(EditorError::DisposedStore)));
    assert!(matches!(store.create(NodeType::Frame), Err(EditorError::DisposedStore)));
    assert!(matches!(store.remove(&[page]), Err(EditorError::DisposedStore)));
    assert!(matches!(store.undo(), Err(EditorError::DisposedStore)));
}

#[test]
fn test_project_json_round_trip() {
    let mut project = Project::with_client_id(40, EditorConfig::default());
    let page = project.create_page("Home").unwrap();
    project
        .store_mut()
        .transact(|tx| {
            let frame = tx.create(NodeType::Frame)?;
            tx.append(&page, &[frame.clone()])?;
            tx.set_name(&frame, Some("Hero".to_string()))?;
            tx.set_style(&IdPath::single(&frame), &fills("#abcdef"))?;
            tx.insert_image(&ImageBlob::new(vec![1, 2, 3], "image/png"))?;
            Ok(())
        })
        .unwrap();

    let bytes = project.to_bytes().unwrap();
    let mut copy = Project::with_client_id(41, EditorConfig::default());
    copy.load_bytes(&bytes).unwrap();
    assert_eq!(copy.to_bytes().unwrap(), bytes);
    assert_eq!(ProjectJson::from_bytes(&bytes).unwrap(), copy.to_json().unwrap());
    assert_eq!(copy.images().unwrap().len(), 1);
}

#[tokio::test]
async fn test_paste_next_to_nested_selection() {
    let mut session = EditSession::new("s", Project::with_client_id(50, EditorConfig::default()));
    session.setup_init_content().unwrap();
    let page = session.page_id().unwrap().to_string();
    let blob = ImageBlob::new(vec![9; 8], "image/png");

    let (first, inner, last) = session
        .project_mut()
        .store_mut()
        .transact(|tx| {
            let first = tx.create(NodeType::Frame)?;
            let last = tx.create(NodeType::Frame)?;
            let inner = tx.create(NodeType::Frame)?;
            tx.append(&page, &[first.clone(), last.clone()])?;
            tx.append(&first, &[inner.clone()])?;
            let hash = tx.insert_image(&blob)?;
            tx.set_style(
                &IdPath::single(&inner),
                &PartialStyle {
                    image_hash: Some(Some(hash)),
                    ..Default::default()
                },
            )?;
            Ok((first, inner, last))
        })
        .unwrap();

    session.select(IdPath::single(&inner), false).unwrap();
    let payload = session.copy().unwrap();
    assert_eq!(payload.images.len(), 1);

    let report = session.paste(&payload, &DataUrlFetcher).await.unwrap();
    // The image is already stored, nothing to fetch
    assert!(report.images_added.is_empty());
    assert!(report.image_errors.is_empty());

    let snapshot = session.project().store().snapshot().unwrap();
    let pasted = report.inserted[0].last().to_string();
    assert_eq!(snapshot.child_ids(&first), [inner, pasted.clone()]);
    assert_eq!(snapshot.child_ids(&page), [first.clone(), last]);
    assert_eq!(snapshot.images().len(), 1);

    // Pasting again goes right after the fresh copy, still inside the frame
    let report = session.paste(&payload, &DataUrlFetcher).await.unwrap();
    let snapshot = session.project().store().snapshot().unwrap();
    assert_eq!(snapshot.child_ids(&first)[1], pasted);
    assert_eq!(snapshot.child_ids(&first)[2], report.inserted[0].last());
}

#[test]
fn test_copy_follows_document_order_on_open_page() {
    let mut session = EditSession::new("s", Project::with_client_id(51, EditorConfig::default()));
    session.setup_init_content().unwrap();
    let page = session.page_id().unwrap().to_string();
    let other_page = session.project_mut().create_page("Page 1").unwrap();

    let (a, a_child, b, c, elsewhere) = session
        .project_mut()
        .store_mut()
        .transact(|tx| {
            let a = tx.create(NodeType::Frame)?;
            let b = tx.create(NodeType::Frame)?;
            let c = tx.create(NodeType::Text)?;
            tx.append(&page, &[a.clone(), b.clone(), c.clone()])?;
            let a_child = tx.create(NodeType::Text)?;
            tx.append(&a, &[a_child.clone()])?;
            let elsewhere = tx.create(NodeType::Frame)?;
            tx.append(&other_page, &[elsewhere.clone()])?;
            Ok((a, a_child, b, c, elsewhere))
        })
        .unwrap();

    // Clicked in reverse, with a child of a selected frame and an element
    // on a page that is not open
    for id in [&c, &elsewhere, &a_child, &b, &a] {
        session.select(IdPath::single(id), true).unwrap();
    }

    let selected: Vec<String> = session
        .selected_selectables()
        .unwrap()
        .iter()
        .map(|s| s.id().to_string())
        .collect();
    assert_eq!(selected, [a.clone(), b.clone(), c.clone()]);

    let payload = session.copy().unwrap();
    let copied: Vec<&str> = payload.nodes.iter().map(|node| node.id.as_str()).collect();
    assert_eq!(copied, [a.as_str(), b.as_str(), c.as_str()]);
    assert_eq!(payload.nodes[0].children.len(), 1);
    assert_eq!(payload.nodes[0].children[0].id, a_child);

    session.open_page(&other_page).unwrap();
    assert!(session.copy().unwrap().nodes.is_empty());
}

#[test]
fn test_page_names_increment() {
    let mut project = Project::with_client_id(60, EditorConfig::default());
    for _ in 0..3 {
        project.create_page("Page 1").unwrap();
    }
    let names: Vec<_> = project
        .pages()
        .unwrap()
        .into_iter()
        .filter_map(|page| page.name)
        .collect();
    assert_eq!(names, ["Page 1", "Page 2", "Page 3"]);
}

#[derive(Debug, Clone)]
enum TreeOp {
    Create(u8),
    Append(usize, usize),
    Reparent(usize, usize),
    Remove(usize),
}

fn tree_op() -> impl Strategy<Value = TreeOp> {
    prop_oneof![
        (0u8..3).prop_map(TreeOp::Create),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| TreeOp::Append(a, b)),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| TreeOp::Reparent(a, b)),
        any::<usize>().prop_map(TreeOp::Remove),
    ]
}

fn pick(ids: &[String], i: usize) -> String {
    ids[i % ids.len()].clone()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_tree_stays_a_forest(ops in prop::collection::vec(tree_op(), 1..40)) {
        let mut store = store(70);
        let mut ids = vec![page(&mut store)];

        for op in ops {
            // Rejected operations are expected; they must leave no trace
            let _ = match op {
                TreeOp::Create(kind) => {
                    let node_type = [NodeType::Frame, NodeType::Text, NodeType::Component][kind as usize];
                    store.create(node_type).map(|id| ids.push(id))
                }
                TreeOp::Append(a, b) => store.append(&pick(&ids, a), &[pick(&ids, b)]),
                TreeOp::Reparent(a, b) => store.reparent(&pick(&ids, a), Some(&pick(&ids, b)), None),
                TreeOp::Remove(a) => store.remove(&[pick(&ids, a)]),
            };

            let snapshot = store.snapshot().unwrap();
            let mut seen = HashSet::new();
            for node in snapshot.attached_nodes() {
                prop_assert!(seen.insert(node.id.clone()));
                match &node.parent {
                    None => prop_assert!(node.node_type.is_root_type()),
                    Some(parent) => {
                        let parent = snapshot.node(parent).unwrap();
                        prop_assert!(snapshot.is_attached(&parent.id));
                        prop_assert!(parent.node_type.can_contain(node.node_type));
                        prop_assert!(node.node_type != NodeType::Page);
                    }
                }
                prop_assert!(!snapshot.ancestors(&node.id).iter().any(|a| a.id == node.id));
            }
        }
    }
}
