//! Typed property values and their JSON encoding.

use crate::error::{Error, Result};
use crate::geometry::{Point, Size};
use serde_json::{Value, json};
use std::fmt;

/// The declared type of a property key in a node kind's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropType {
    Bool,
    Int,
    Float,
    Text,
    Color,
    /// One of a fixed set of words.
    Choice(&'static [&'static str]),
    Point,
    Size,
    Points,
}

/// A property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Color(String),
    Choice(String),
    Point(Point),
    Size(Size),
    Points(Vec<Point>),
}

impl PropValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn color(s: impl Into<String>) -> Self {
        Self::Color(s.into())
    }

    pub fn choice(s: impl Into<String>) -> Self {
        Self::Choice(s.into())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Color(s) | Self::Choice(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_point(&self) -> Option<Point> {
        match self {
            Self::Point(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_size(&self) -> Option<Size> {
        match self {
            Self::Size(s) => Some(*s),
            _ => None,
        }
    }

    /// Check this value against a declared type. Ints are accepted where a
    /// float is declared and widened.
    pub fn conform(self, ty: PropType, key: &str) -> Result<Self> {
        match (ty, self) {
            (PropType::Size, Self::Size(s)) if s.width < 0.0 || s.height < 0.0 => {
                Err(Error::invalid(format!("{key} must not be negative")))
            }
            (PropType::Bool, v @ Self::Bool(_))
            | (PropType::Int, v @ Self::Int(_))
            | (PropType::Float, v @ Self::Float(_))
            | (PropType::Text, v @ Self::Text(_))
            | (PropType::Color, v @ Self::Color(_))
            | (PropType::Point, v @ Self::Point(_))
            | (PropType::Size, v @ Self::Size(_))
            | (PropType::Points, v @ Self::Points(_)) => Ok(v),
            (PropType::Float, Self::Int(i)) => Ok(Self::Float(i as f64)),
            (PropType::Color, Self::Text(s)) => Ok(Self::Color(s)),
            (PropType::Choice(options), Self::Choice(s) | Self::Text(s)) => {
                if options.contains(&s.as_str()) {
                    Ok(Self::Choice(s))
                } else {
                    Err(Error::invalid(format!(
                        "'{s}' is not a valid {key} (expected one of {})",
                        options.join(", ")
                    )))
                }
            }
            (ty, v) => Err(Error::invalid(format!(
                "{key} expects {ty:?}, got {}",
                v.type_name()
            ))),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Color(_) => "color",
            Self::Choice(_) => "choice",
            Self::Point(_) => "point",
            Self::Size(_) => "size",
            Self::Points(_) => "points",
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => json!(b),
            Self::Int(i) => json!(i),
            Self::Float(f) => json!(f),
            Self::Text(s) | Self::Color(s) | Self::Choice(s) => json!(s),
            Self::Point(p) => json!([p.x, p.y]),
            Self::Size(s) => json!([s.width, s.height]),
            Self::Points(pts) => Value::Array(pts.iter().map(|p| json!([p.x, p.y])).collect()),
        }
    }

    /// Decode a JSON value as the declared type.
    pub fn from_json(ty: PropType, key: &str, value: &Value) -> Result<Self> {
        let bad = || Error::format(format!("property '{key}' has malformed value {value}"));
        let decoded = match ty {
            PropType::Bool => Self::Bool(value.as_bool().ok_or_else(bad)?),
            PropType::Int => Self::Int(
                value
                    .as_i64()
                    .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                    .ok_or_else(bad)?,
            ),
            PropType::Float => Self::Float(value.as_f64().ok_or_else(bad)?),
            PropType::Text => Self::Text(value.as_str().ok_or_else(bad)?.to_string()),
            PropType::Color => Self::Color(value.as_str().ok_or_else(bad)?.to_string()),
            PropType::Choice(_) => Self::Choice(value.as_str().ok_or_else(bad)?.to_string()),
            PropType::Point => {
                let (x, y) = pair(value).ok_or_else(bad)?;
                Self::Point(Point::new(x, y))
            }
            PropType::Size => {
                let (w, h) = pair(value).ok_or_else(bad)?;
                Self::Size(Size::new(w, h))
            }
            PropType::Points => {
                let items = value.as_array().ok_or_else(bad)?;
                let mut pts = Vec::with_capacity(items.len());
                for item in items {
                    let (x, y) = pair(item).ok_or_else(bad)?;
                    pts.push(Point::new(x, y));
                }
                Self::Points(pts)
            }
        };
        decoded
            .conform(ty, key)
            .map_err(|e| Error::format(e.to_string()))
    }
}

fn pair(value: &Value) -> Option<(f64, f64)> {
    match value.as_array()?.as_slice() {
        [a, b] => Some((a.as_f64()?, b.as_f64()?)),
        _ => None,
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Color(s) | Self::Choice(s) => f.write_str(s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_widens_to_float() {
        let v = PropValue::Int(3).conform(PropType::Float, "rotation").unwrap();
        assert_eq!(v, PropValue::Float(3.0));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = PropValue::text("big")
            .conform(PropType::Size, "size")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn choice_checks_options() {
        const ALIGN: &[&str] = &["left", "center", "right"];
        assert!(PropValue::text("center").conform(PropType::Choice(ALIGN), "alignment").is_ok());
        assert!(PropValue::text("middle").conform(PropType::Choice(ALIGN), "alignment").is_err());
    }

    #[test]
    fn point_json_shape() {
        let v = PropValue::Point(Point::new(10.0, 20.5));
        assert_eq!(v.to_json(), json!([10.0, 20.5]));
        let back = PropValue::from_json(PropType::Point, "position", &json!([10, 20.5])).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn malformed_json_is_format_error() {
        let err = PropValue::from_json(PropType::Size, "size", &json!([1])).unwrap_err();
        assert!(err.is_load_error());
    }
}
