//! Coercions shared by the per-entity field updaters

use std::collections::BTreeMap;

use crate::bridge::{self, Native};
use crate::error::{Error, Result};
use crate::store::EntityKind;
use crate::value::{Function, Handle, Table, Value};

pub(crate) fn string(kind: EntityKind, field: &str, value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_field(kind, field, "a string", value))
}

pub(crate) fn boolean(kind: EntityKind, field: &str, value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| Error::invalid_field(kind, field, "a bool", value))
}

pub(crate) fn table<'a>(kind: EntityKind, field: &str, value: &'a Value) -> Result<&'a Table> {
    value
        .as_table()
        .ok_or_else(|| Error::invalid_field(kind, field, "a table", value))
}

pub(crate) fn function(kind: EntityKind, field: &str, value: &Value) -> Result<Function> {
    value
        .as_function()
        .cloned()
        .ok_or_else(|| Error::invalid_field(kind, field, "a function", value))
}

/// "A string or a list of strings"
pub(crate) fn string_list(kind: EntityKind, field: &str, value: &Value) -> Result<Vec<String>> {
    bridge::string_list(value)
        .ok_or_else(|| Error::invalid_field(kind, field, "a string or a list of strings", value))
}

/// A string → string table
pub(crate) fn props(kind: EntityKind, field: &str, value: &Value) -> Result<BTreeMap<String, String>> {
    let table = table(kind, field, value)?;
    let mut props = BTreeMap::new();
    for (key, value) in table.iter() {
        let Some(key) = key.as_name() else {
            return Err(Error::schema(format!(
                "{kind}'s '{field}' table key must be a string: {key}"
            )));
        };
        let Some(value) = value.as_str() else {
            return Err(Error::schema(format!(
                "{kind}'s '{field}' table value must be a string: {value}"
            )));
        };
        props.insert(key.to_string(), value.to_string());
    }
    Ok(props)
}

/// Sequence entries bridged to native values
pub(crate) fn hooks(kind: EntityKind, field: &str, value: &Value) -> Result<Vec<Native>> {
    let table = table(kind, field, value)?;
    Ok(table.sequence().map(bridge::to_native).collect())
}

/// Run a prepare callback for the entity behind `handle`
///
/// Only an explicit `false` counts as a refusal.
pub(crate) fn run_prepare(prepare: &Function, handle: Handle, name: &str) -> Result<()> {
    match prepare.call(&[Value::Handle(handle)])? {
        Value::Bool(false) => Err(Error::PrepareRejected {
            kind: handle.kind(),
            name: name.to_string(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{HostId, Store};
    use crate::host::Host;
    use crate::registry::RegistryType;

    #[test]
    fn test_props_rejects_non_string_values() {
        let value = Value::from(Table::new().with("port", 22_i64));
        let err = props(EntityKind::Host, "props", &value).unwrap_err();
        assert!(err.to_string().contains("must be a string"));
    }

    #[test]
    fn test_props_rejects_positional_keys() {
        let value = Value::from(Table::from_list(["a"]));
        assert!(props(EntityKind::Task, "props", &value).is_err());
    }

    fn some_handle() -> (Handle, HostId) {
        let mut store = Store::new();
        let id = store.insert(Host::new("web01", RegistryType::Local));
        (Handle::Host(id), id)
    }

    #[test]
    fn test_prepare_results() {
        let (handle, _) = some_handle();

        let nil = Function::new(|_| Ok(Value::Nil));
        assert!(run_prepare(&nil, handle, "web01").is_ok());

        let yes = Function::new(|_| Ok(Value::Bool(true)));
        assert!(run_prepare(&yes, handle, "web01").is_ok());

        let no = Function::new(|_| Ok(Value::Bool(false)));
        let err = run_prepare(&no, handle, "web01").unwrap_err();
        assert!(err.to_string().contains("returned false from the prepare function"));

        let boom = Function::new(|_| anyhow::bail!("exploded"));
        let err = run_prepare(&boom, handle, "web01").unwrap_err();
        assert_eq!(err.to_string(), "exploded");
    }

    #[test]
    fn test_prepare_receives_the_handle() {
        let (handle, id) = some_handle();
        let check = Function::new(move |args| {
            assert_eq!(args, [Value::Handle(Handle::Host(id))]);
            Ok(Value::Nil)
        });
        run_prepare(&check, handle, "web01").unwrap();
    }
}
