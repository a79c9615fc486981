//! Integration tests: load → migrate → serialize.

use cds_core::document::{self, from_str, to_value};
use cds_core::error::Error;
use cds_core::model::*;
use cds_core::value::PropValue;
use pretty_assertions::assert_eq;

// ─── Migration ───────────────────────────────────────────────────────────

#[test]
fn format_one_upgrades_to_current_counterpart() {
    let legacy = from_str(include_str!("fixtures/legacy_v1.json")).expect("legacy load failed");
    let current = from_str(include_str!("fixtures/legacy_v3.json")).expect("current load failed");
    assert_eq!(to_value(&legacy), to_value(&current));
}

#[test]
fn remigrating_an_upgraded_document_is_a_no_op() {
    let legacy = from_str(include_str!("fixtures/legacy_v1.json")).unwrap();
    let saved = to_value(&legacy);
    let reloaded = document::from_value(saved.clone()).unwrap();
    assert_eq!(to_value(&reloaded), saved);
}

#[test]
fn legacy_duplicate_names_are_deduplicated() {
    let legacy = from_str(include_str!("fixtures/legacy_v1.json")).unwrap();
    let entry = legacy.find_by_path("card_1.entry").unwrap();
    let entry1 = legacy.find_by_path("card_1.entry1").unwrap();
    assert_eq!(legacy.kind(entry), Some(NodeKind::Field));
    assert_eq!(legacy.kind(entry1), Some(NodeKind::Button));
}

#[test]
fn current_format_with_duplicate_names_fails_to_load() {
    let text = r#"{
        "type": "stack", "stack_format": 3,
        "cards": [{"type": "card", "properties": {"name": "c"}, "childModels": [
            {"type": "button", "properties": {"name": "b"}},
            {"type": "button", "properties": {"name": "b"}}
        ]}]
    }"#;
    assert!(matches!(from_str(text).unwrap_err(), Error::Format { .. }));
}

#[test]
fn malformed_documents_fail_as_load_errors() {
    for text in [
        "not json",
        r#"{"type": "stack", "stack_format": "three", "cards": []}"#,
        r#"{"type": "card", "stack_format": 3, "cards": []}"#,
        r#"{"type": "stack", "stack_format": 3, "cards": []}"#,
        r#"{"type": "stack", "stack_format": 3, "cards": [{"type": "widget"}]}"#,
    ] {
        let err = from_str(text).unwrap_err();
        assert!(err.is_load_error(), "{text} gave {err}");
    }
}

// ─── Round trip & lookup ─────────────────────────────────────────────────

#[test]
fn three_card_stack_round_trips() {
    let graph = from_str(include_str!("fixtures/three_cards.json")).unwrap();
    assert_eq!(graph.card_count(), 3);
    let first = to_value(&graph);
    let second = to_value(&from_str(&document::to_string(&graph).unwrap()).unwrap());
    assert_eq!(first, second);
}

#[test]
fn find_by_path_addresses_cards_by_index() {
    let graph = from_str(include_str!("fixtures/three_cards.json")).unwrap();
    let button = graph.find_by_path("1.button1").expect("button1 on card 1");
    assert_eq!(graph.get(button).unwrap().name(), "button1");
    assert_eq!(graph.card_of(button), graph.card_at(1));
    assert_eq!(graph.find_by_path("5.x"), None);
    assert_eq!(graph.find_by_path("card_2.box"), graph.find_by_path("1.box"));
}

#[test]
fn shapes_keep_their_kind_and_radius() {
    let graph = from_str(include_str!("fixtures/three_cards.json")).unwrap();
    let bx = graph.find_by_path("1.box").unwrap();
    assert_eq!(graph.kind(bx), Some(NodeKind::Shape(ShapeKind::RoundRect)));
    assert_eq!(graph.property(bx, "corner_radius"), Some(&PropValue::Int(4)));
}

// ─── Edits through the model ─────────────────────────────────────────────

#[test]
fn remove_then_insert_restores_serialization() {
    let mut graph = from_str(include_str!("fixtures/three_cards.json")).unwrap();
    let before = to_value(&graph);
    let root = graph.root_id();
    let card = graph.card_at(1).unwrap();
    let removed = graph.remove_child(root, card).unwrap();
    assert_eq!(graph.card_count(), 2);
    graph.insert_child(root, removed, 1).unwrap();
    assert_eq!(to_value(&graph), before);
}
