//! Host declarations
//!
//! Host fields come in two families told apart by the first character of the
//! key: upper-case keys (`HostName`, `User`, `Port`, ...) are SSH passthrough
//! directives stored verbatim for config emission, everything else is a
//! semantic field with its own schema.

use std::collections::BTreeMap;

use crate::bridge::Native;
use crate::error::{Error, Result};
use crate::fields;
use crate::registry::RegistryType;
use crate::store::{Entity, EntityKind, HostId};
use crate::value::{Table, Value};

/// A declared machine
#[derive(Debug, Clone)]
pub struct Host {
    pub name: String,
    /// Every declared key, verbatim
    pub values: Table,
    /// SSH passthrough directives
    pub ssh_config: BTreeMap<String, String>,
    pub props: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub hooks_before_connect: Vec<Native>,
    pub hooks_after_connect: Vec<Native>,
    pub hooks_after_disconnect: Vec<Native>,
    pub description: String,
    pub hidden: bool,
    /// Scope the host was declared in
    pub registry: RegistryType,
    pub predecessor: Option<HostId>,
}

impl Host {
    pub fn new(name: impl Into<String>, registry: RegistryType) -> Self {
        Self {
            name: name.into(),
            values: Table::new(),
            ssh_config: BTreeMap::new(),
            props: BTreeMap::new(),
            tags: Vec::new(),
            hooks_before_connect: Vec::new(),
            hooks_after_connect: Vec::new(),
            hooks_after_disconnect: Vec::new(),
            description: String::new(),
            hidden: false,
            registry,
            predecessor: None,
        }
    }

    /// Whether `key` names an SSH passthrough directive
    pub fn is_passthrough(key: &str) -> bool {
        key.chars().next().is_some_and(char::is_uppercase)
    }

    /// Apply every named entry of `config`
    pub fn configure(&mut self, config: &Table) -> Result<()> {
        for (key, value) in config.named() {
            self.update(key, value.clone())?;
        }
        Ok(())
    }

    /// Update one field
    pub fn update(&mut self, key: &str, value: Value) -> Result<()> {
        const KIND: EntityKind = EntityKind::Host;

        self.values.set(key, value.clone());

        if Self::is_passthrough(key) {
            let directive = value.as_str().ok_or_else(|| {
                Error::invalid_field(KIND, key, "a string (SSH property)", &value)
            })?;
            self.ssh_config.insert(key.to_string(), directive.to_string());
            return Ok(());
        }

        match key {
            "props" => self.props = fields::props(KIND, key, &value)?,
            "tags" => {
                let table = fields::table(KIND, key, &value)?;
                let mut tags: Vec<String> = Vec::new();
                for (_, tag) in table.iter() {
                    let tag = tag
                        .as_str()
                        .ok_or_else(|| Error::schema(format!("unsupported format of tags: {tag}")))?;
                    if !tags.iter().any(|t| t == tag) {
                        tags.push(tag.to_string());
                    }
                }
                self.tags = tags;
            }
            "hooks_before_connect" => self.hooks_before_connect = fields::hooks(KIND, key, &value)?,
            "hooks_after_connect" => self.hooks_after_connect = fields::hooks(KIND, key, &value)?,
            "hooks_after_disconnect" => {
                self.hooks_after_disconnect = fields::hooks(KIND, key, &value)?;
            }
            "description" => self.description = fields::string(KIND, key, &value)?,
            "hidden" => self.hidden = fields::boolean(KIND, key, &value)?,
            _ => return Err(Error::unknown_field(KIND, key)),
        }
        Ok(())
    }

    /// Whether `expr` is this host's name or one of its tags
    pub fn matches(&self, expr: &str) -> bool {
        self.name == expr || self.tags.iter().any(|tag| tag == expr)
    }
}

impl Entity for Host {
    const KIND: EntityKind = EntityKind::Host;

    fn name(&self) -> &str {
        &self.name
    }

    fn shadow(&mut self, predecessor: HostId) {
        self.predecessor = Some(predecessor);
    }

    fn predecessor(&self) -> Option<HostId> {
        self.predecessor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Function;

    fn host() -> Host {
        Host::new("web01", RegistryType::Local)
    }

    #[test]
    fn test_passthrough_fields() {
        let mut h = host();
        h.update("HostName", Value::from("192.168.0.11")).unwrap();
        h.update("User", Value::from("deploy")).unwrap();
        assert_eq!(h.ssh_config["HostName"], "192.168.0.11");
        assert_eq!(h.ssh_config["User"], "deploy");
    }

    #[test]
    fn test_passthrough_requires_string() {
        let mut h = host();
        let err = h.update("Port", Value::from(22_i64)).unwrap_err();
        assert!(err.to_string().contains("'Port'"));
    }

    #[test]
    fn test_semantic_fields() {
        let mut h = host();
        let config = Table::new()
            .with("description", "web server")
            .with("hidden", true)
            .with("tags", Table::from_list(["web", "prod", "web"]))
            .with("props", Table::new().with("role", "frontend"));
        h.configure(&config).unwrap();

        assert_eq!(h.description, "web server");
        assert!(h.hidden);
        assert_eq!(h.tags, vec!["web", "prod"]);
        assert_eq!(h.props["role"], "frontend");
    }

    #[test]
    fn test_hooks_are_bridged() {
        let mut h = host();
        let hook = Function::new(|_| Ok(Value::Nil));
        let hooks = Table::from_list([Value::from("echo before"), Value::from(hook.clone())]);
        h.update("hooks_before_connect", Value::from(hooks)).unwrap();
        assert_eq!(
            h.hooks_before_connect,
            vec![
                Native::String("echo before".into()),
                Native::Opaque(Value::from(hook))
            ]
        );
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let mut h = host();
        let err = h.update("colour", Value::from("blue")).unwrap_err();
        assert!(matches!(err, Error::UnknownField { ref field, .. } if field == "colour"));
    }

    #[test]
    fn test_wrong_shape_names_field() {
        let mut h = host();
        let err = h.update("hidden", Value::from("yes")).unwrap_err();
        assert!(matches!(err, Error::InvalidField { ref field, .. } if field == "hidden"));
        let err = h.update("tags", Value::from(Table::from_list([1_i64]))).unwrap_err();
        assert!(err.to_string().contains("tags"));
    }

    #[test]
    fn test_raw_values_are_retained() {
        let mut h = host();
        h.update("HostName", Value::from("10.0.0.1")).unwrap();
        h.update("description", Value::from("db")).unwrap();
        assert_eq!(h.values.get_str("HostName"), Some(&Value::from("10.0.0.1")));
        assert_eq!(h.values.get_str("description"), Some(&Value::from("db")));
    }

    #[test]
    fn test_matches_name_or_tag() {
        let mut h = host();
        h.update("tags", Value::from(Table::from_list(["web"]))).unwrap();
        assert!(h.matches("web01"));
        assert!(h.matches("web"));
        assert!(!h.matches("db"));
    }
}
