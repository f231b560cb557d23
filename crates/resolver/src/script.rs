//! Task script normalization
//!
//! A `script` can be declared as a plain string, a descriptor record holding
//! `code`, or an arbitrarily nested array mixing strings, records and
//! functions producing either. Downstream consumers only ever see the flat,
//! ordered list of segments produced here.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::value::{Table, Value};

/// One canonical script segment; always holds `code`
pub type Segment = BTreeMap<String, String>;

/// Flatten a declared `script` value into ordered segments
pub fn normalize(value: &Value) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    normalize_into(value, &mut segments)?;
    Ok(segments)
}

fn normalize_into(value: &Value, segments: &mut Vec<Segment>) -> Result<()> {
    match value {
        Value::String(code) => {
            segments.push(Segment::from([("code".to_string(), code.clone())]));
            Ok(())
        }
        Value::Table(table) if table.sequence_len() == 0 => {
            segments.push(record(table)?);
            Ok(())
        }
        Value::Table(table) => {
            for item in table.sequence() {
                match item {
                    Value::Function(f) => {
                        let produced = f.call(&[])?;
                        normalize_into(&produced, segments)?;
                    }
                    other => normalize_into(other, segments)?,
                }
            }
            Ok(())
        }
        other => Err(Error::schema(format!("'script' got an invalid value: {other}"))),
    }
}

fn record(table: &Table) -> Result<Segment> {
    if table.get_str("code").is_none() {
        return Err(Error::schema(
            "a 'script' record has to have a 'code' property",
        ));
    }

    let mut segment = Segment::new();
    for (key, value) in table.iter() {
        let Some(key) = key.as_name() else {
            return Err(Error::schema(format!(
                "a 'script' record's keys have to be strings, got {key}"
            )));
        };
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(Error::schema(format!(
                    "a 'script' record's '{key}' has to be a string or bool, got {other}"
                )));
            }
        };
        segment.insert(key.to_string(), text);
    }
    Ok(segment)
}
