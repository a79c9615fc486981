//! Upgrades for documents written by older versions.
//!
//! Two phases: the data phase rewrites raw JSON before it is decoded, the
//! model phase fixes up decoded subtrees before they enter a graph. Both are
//! no-ops for documents already at the current format, and running either a
//! second time changes nothing.

use crate::document::CURRENT_FORMAT;
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::model::{NodeKind, Subtree, dedup_name};
use crate::value::PropValue;
use serde_json::{Map, Value};

/// Property keys renamed when upgrading from format 1.
const RENAMED_KEYS: &[(&str, &str)] = &[
    ("canSave", "can_save"),
    ("canResize", "can_resize"),
    ("bgColor", "bg_color"),
    ("penColor", "pen_color"),
    ("penThickness", "pen_thickness"),
    ("fillColor", "fill_color"),
    ("fontSize", "font_size"),
    ("textColor", "text_color"),
    ("cornerRadius", "corner_radius"),
];

/// Type tags renamed when upgrading from format 1.
const RENAMED_TYPES: &[(&str, &str)] = &[("textfield", "field"), ("textlabel", "label")];

/// Read the `stack_format` of a raw document. Files predating the key are
/// format 1.
pub fn detect_format(value: &Value) -> Result<u64> {
    let Some(obj) = value.as_object() else {
        return Err(Error::format("document must be a JSON object"));
    };
    let format = match obj.get("stack_format") {
        None => 1,
        Some(v) => v
            .as_u64()
            .filter(|&f| f >= 1)
            .ok_or_else(|| Error::format(format!("stack_format must be a positive integer, got {v}")))?,
    };
    if format > CURRENT_FORMAT {
        return Err(Error::format(format!(
            "stack_format {format} is newer than supported format {CURRENT_FORMAT}"
        )));
    }
    Ok(format)
}

// ─── Data phase ──────────────────────────────────────────────────────────

/// Rewrite raw JSON from format `from` to the current layout.
pub fn migrate_data(value: &mut Value, from: u64) -> Result<()> {
    if from >= 2 {
        return Ok(());
    }
    let Some(stack) = value.as_object_mut() else {
        return Err(Error::format("document must be a JSON object"));
    };
    upgrade_record(stack);
    if let Some(cards) = stack.get_mut("cards") {
        upgrade_children(cards)?;
    }
    log::debug!("upgraded document data from format {from}");
    Ok(())
}

fn upgrade_children(list: &mut Value) -> Result<()> {
    let Some(items) = list.as_array_mut() else {
        return Err(Error::format("child list must be an array"));
    };
    for item in items {
        let Some(record) = item.as_object_mut() else {
            return Err(Error::format("child entries must be objects"));
        };
        upgrade_record(record);
        if let Some(children) = record.get_mut("childModels") {
            upgrade_children(children)?;
        }
    }
    Ok(())
}

fn upgrade_record(record: &mut Map<String, Value>) {
    if let Some(Value::String(tag)) = record.get_mut("type")
        && let Some((_, new)) = RENAMED_TYPES.iter().find(|(old, _)| *old == tag.as_str())
    {
        *tag = (*new).to_string();
    }
    if let Some(Value::Object(props)) = record.get_mut("properties") {
        for (old, new) in RENAMED_KEYS {
            if let Some(v) = props.remove(*old) {
                props.entry(*new).or_insert(v);
            }
        }
    }
}

// ─── Model phase ─────────────────────────────────────────────────────────

/// Fix up decoded cards from format `from`: sibling names made unique and
/// group geometry refitted to the children.
pub fn migrate_model(cards: &mut [Subtree], from: u64) -> Result<()> {
    if from >= 3 {
        return Ok(());
    }
    dedup_siblings(cards)?;
    for card in cards.iter_mut() {
        fit_groups(card)?;
    }
    log::debug!("upgraded document model from format {from}");
    Ok(())
}

fn dedup_siblings(siblings: &mut [Subtree]) -> Result<()> {
    let mut seen: Vec<String> = Vec::with_capacity(siblings.len());
    for sub in siblings.iter_mut() {
        let name = dedup_name(sub.name(), &seen);
        if name != sub.name() {
            log::warn!("renamed duplicate '{}' to '{name}'", sub.name());
            sub.node.set("name", PropValue::text(name.clone()))?;
        }
        seen.push(name);
        dedup_siblings(&mut sub.children)?;
    }
    Ok(())
}

/// Refit every group below `sub`, innermost first.
fn fit_groups(sub: &mut Subtree) -> Result<()> {
    for child in &mut sub.children {
        fit_groups(child)?;
    }
    if sub.node.kind != NodeKind::Group {
        return Ok(());
    }
    let Some(bounds) = sub
        .children
        .iter()
        .map(|c| c.node.frame())
        .reduce(|a, b| a.union(&b))
    else {
        return Ok(());
    };
    shift_children(sub, bounds)?;
    let origin = sub.node.position().offset(bounds.x, bounds.y);
    sub.node.set("position", PropValue::Point(origin))?;
    sub.node.set("size", PropValue::Size(bounds.size()))?;
    Ok(())
}

fn shift_children(sub: &mut Subtree, bounds: Rect) -> Result<()> {
    for child in &mut sub.children {
        let pos = child.node.position().offset(-bounds.x, -bounds.y);
        child.node.set("position", PropValue::Point(pos))?;
    }
    Ok(())
}
