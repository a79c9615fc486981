//! Stack document JSON format.
//!
//! Loading goes raw JSON → format check → data-phase migration → typed
//! records → subtrees → model-phase migration → graph. Nothing is installed
//! until every step has succeeded.

use crate::error::{Error, Result};
use crate::migrate;
use crate::model::{Node, NodeKind, StackGraph, Subtree, next_available_name};
use crate::value::PropValue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Format written by this version.
pub const CURRENT_FORMAT: u64 = 3;

/// Application version recorded in saved files.
pub const STACK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Stack properties kept in memory but never written.
const UNSAVED_STACK_PROPS: &[&str] = &["name", "position"];

#[derive(Debug, Serialize, Deserialize)]
struct StackRecord {
    #[serde(rename = "type")]
    kind: String,
    stack_format: u64,
    stack_version: String,
    #[serde(default)]
    properties: Map<String, Value>,
    #[serde(default)]
    handlers: BTreeMap<String, String>,
    #[serde(default)]
    cards: Vec<NodeRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    properties: Map<String, Value>,
    #[serde(default)]
    handlers: BTreeMap<String, String>,
    #[serde(
        rename = "childModels",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    children: Option<Vec<NodeRecord>>,
}

// ─── Serialize ───────────────────────────────────────────────────────────

/// Serialize a document to its JSON value.
pub fn to_value(graph: &StackGraph) -> Value {
    let stack = graph.stack();
    let record = StackRecord {
        kind: NodeKind::Stack.tag().to_string(),
        stack_format: CURRENT_FORMAT,
        stack_version: STACK_VERSION.to_string(),
        properties: properties_of(stack, UNSAVED_STACK_PROPS),
        handlers: handlers_of(stack),
        cards: graph
            .card_ids()
            .into_iter()
            .filter_map(|card| graph.subtree(card))
            .map(|card| record_of(&card))
            .collect(),
    };
    serde_json::to_value(record).unwrap_or(Value::Null)
}

/// Serialize a document as pretty-printed JSON text.
pub fn to_string(graph: &StackGraph) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_value(graph))?)
}

/// Serialize a detached subtree (clipboard payloads).
pub fn subtree_to_value(subtree: &Subtree) -> Value {
    serde_json::to_value(record_of(subtree)).unwrap_or(Value::Null)
}

fn record_of(subtree: &Subtree) -> NodeRecord {
    let node = &subtree.node;
    NodeRecord {
        kind: node.kind.tag().to_string(),
        properties: properties_of(node, &[]),
        handlers: handlers_of(node),
        children: node
            .kind
            .is_container()
            .then(|| subtree.children.iter().map(record_of).collect()),
    }
}

fn properties_of(node: &Node, skip: &[&str]) -> Map<String, Value> {
    node.properties()
        .filter(|(k, _)| !skip.contains(k))
        .map(|(k, v)| (k.to_string(), v.to_json()))
        .collect()
}

fn handlers_of(node: &Node) -> BTreeMap<String, String> {
    node.handlers()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ─── Deserialize ─────────────────────────────────────────────────────────

/// Build a document from a JSON value of any supported format.
pub fn from_value(mut value: Value) -> Result<StackGraph> {
    let format = migrate::detect_format(&value)?;
    migrate::migrate_data(&mut value, format)?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert("stack_format".into(), Value::from(CURRENT_FORMAT));
        obj.entry("stack_version")
            .or_insert_with(|| Value::from(STACK_VERSION));
    }
    let record: StackRecord = serde_json::from_value(value)?;
    if record.kind != NodeKind::Stack.tag() {
        return Err(Error::format(format!(
            "top-level type must be 'stack', found '{}'",
            record.kind
        )));
    }

    let mut stack = Node::named(NodeKind::Stack, "stack");
    apply_record(&mut stack, &record.properties, &record.handlers)?;

    let mut cards = record
        .cards
        .iter()
        .map(subtree_from_record)
        .collect::<Result<Vec<_>>>()?;
    if cards.is_empty() {
        return Err(Error::format("a stack must contain at least one card"));
    }
    for card in &cards {
        if card.node.kind != NodeKind::Card {
            return Err(Error::format(format!(
                "stack entries must be cards, found '{}'",
                card.node.kind.tag()
            )));
        }
    }
    fill_missing_names(&mut cards);
    migrate::migrate_model(&mut cards, format)?;

    let mut graph = StackGraph::with_stack(stack);
    let root = graph.root_id();
    for (i, card) in cards.into_iter().enumerate() {
        graph
            .insert_child(root, card, i)
            .map_err(|e| Error::format(e.to_string()))?;
    }
    log::debug!(
        "loaded stack (format {format}) with {} cards",
        graph.card_count()
    );
    Ok(graph)
}

pub fn from_str(text: &str) -> Result<StackGraph> {
    from_value(serde_json::from_str(text)?)
}

pub fn from_slice(bytes: &[u8]) -> Result<StackGraph> {
    from_value(serde_json::from_slice(bytes)?)
}

/// Decode a clipboard payload written by [`subtree_to_value`].
pub fn subtree_from_value(value: &Value) -> Result<Subtree> {
    let record: NodeRecord = serde_json::from_value(value.clone())?;
    let mut subtree = subtree_from_record(&record)?;
    fill_missing_names(std::slice::from_mut(&mut subtree));
    Ok(subtree)
}

fn subtree_from_record(record: &NodeRecord) -> Result<Subtree> {
    let kind = NodeKind::from_tag(&record.kind)
        .ok_or_else(|| Error::format(format!("unknown node type '{}'", record.kind)))?;
    if kind == NodeKind::Stack {
        return Err(Error::format("a stack cannot be nested"));
    }
    let mut node = Node::new(kind);
    apply_record(&mut node, &record.properties, &record.handlers)?;
    let children = match &record.children {
        Some(children) if kind.is_container() => children
            .iter()
            .map(subtree_from_record)
            .collect::<Result<Vec<_>>>()?,
        Some(children) if !children.is_empty() => {
            return Err(Error::format(format!("a {} cannot have children", kind.tag())));
        }
        _ => Vec::new(),
    };
    Ok(Subtree { node, children })
}

fn apply_record(
    node: &mut Node,
    properties: &Map<String, Value>,
    handlers: &BTreeMap<String, String>,
) -> Result<()> {
    let kind = node.kind;
    for (key, raw) in properties {
        let ty = kind.prop_type(key).ok_or_else(|| {
            Error::format(format!("unknown property '{key}' on {}", kind.tag()))
        })?;
        let value = PropValue::from_json(ty, key, raw)?;
        if key == "name" && value.as_str() == Some("") {
            continue;
        }
        node.set(key, value).map_err(|e| Error::format(e.to_string()))?;
    }
    for (event, source) in handlers {
        node.set_handler(event, source);
    }
    Ok(())
}

/// Nodes saved without a name get the next free `<kind>_N` among siblings.
fn fill_missing_names(siblings: &mut [Subtree]) {
    let mut taken: Vec<String> = siblings
        .iter()
        .map(|s| s.name().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    for sub in siblings.iter_mut() {
        if sub.name().is_empty() {
            let name = next_available_name(sub.node.kind.name_prefix(), &taken);
            let _ = sub.node.set("name", PropValue::text(name.clone()));
            taken.push(name);
        }
        fill_missing_names(&mut sub.children);
    }
}

// ─── Files ───────────────────────────────────────────────────────────────

pub fn read_file(path: &Path) -> Result<StackGraph> {
    let bytes = std::fs::read(path)?;
    from_slice(&bytes)
}

pub fn write_file(graph: &StackGraph, path: &Path) -> Result<()> {
    std::fs::write(path, to_string(graph)?)?;
    Ok(())
}
