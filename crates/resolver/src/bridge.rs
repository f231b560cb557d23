//! Conversion between dynamic values and native containers

use std::collections::BTreeMap;

use serde::ser::{Serialize, Serializer};

use crate::value::{Table, Value};

/// A value reduced to scalars, ordered lists and string-keyed maps
///
/// Functions and handles have no native shape and travel through as
/// [`Native::Opaque`].
#[derive(Debug, Clone, PartialEq)]
pub enum Native {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Native>),
    Map(BTreeMap<String, Native>),
    Opaque(Value),
}

impl Serialize for Native {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Nil => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::String(s) => serializer.serialize_str(s),
            Self::List(items) => items.serialize(serializer),
            Self::Map(map) => map.serialize(serializer),
            Self::Opaque(value) => serializer.serialize_str(&format!("<{}>", value.type_name())),
        }
    }
}

/// Convert a dynamic value into native containers
///
/// A table becomes a list when it has a 1..N sequence (other entries are
/// dropped), and a map otherwise.
pub fn to_native(value: &Value) -> Native {
    match value {
        Value::Nil => Native::Nil,
        Value::Bool(b) => Native::Bool(*b),
        Value::Number(n) => Native::Number(*n),
        Value::String(s) => Native::String(s.clone()),
        Value::Table(table) => {
            if table.sequence_len() == 0 {
                Native::Map(
                    table
                        .iter()
                        .map(|(k, v)| (k.to_string(), to_native(v)))
                        .collect(),
                )
            } else {
                Native::List(table.sequence().map(to_native).collect())
            }
        }
        other => Native::Opaque(other.clone()),
    }
}

/// Convert native containers back into a dynamic value
pub fn from_native(native: &Native) -> Value {
    match native {
        Native::Nil => Value::Nil,
        Native::Bool(b) => Value::Bool(*b),
        Native::Number(n) => Value::Number(*n),
        Native::String(s) => Value::String(s.clone()),
        Native::List(items) => Value::Table(Table::from_list(items.iter().map(from_native))),
        Native::Map(map) => {
            let mut table = Table::new();
            for (k, v) in map {
                table.set(k.as_str(), from_native(v));
            }
            Value::Table(table)
        }
        Native::Opaque(value) => value.clone(),
    }
}

/// Read "a string or a list of strings"
///
/// Non-string list elements are skipped and an empty table counts as an
/// empty list. Returns `None` for any other shape.
pub fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Table(_) => match to_native(value) {
            Native::List(items) => Some(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Native::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            Native::Map(map) if map.is_empty() => Some(Vec::new()),
            _ => None,
        },
        _ => None,
    }
}
