//! Task declarations

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::fields;
use crate::registry::RegistryType;
use crate::script::{self, Segment};
use crate::store::{Entity, EntityKind, TaskId};
use crate::value::{Function, Table, Value};

/// Name given to tasks declared without one
pub const DEFAULT_TASK_NAME: &str = "default";

/// Where a task's script runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Local,
    #[default]
    Remote,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(Self::Local),
            "remote" => Some(Self::Remote),
            _ => None,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output prefix setting
///
/// Turning the prefix off keeps the custom text for when it is turned back on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Prefix {
    pub enabled: bool,
    /// Custom template; the default one is used when unset
    pub custom: Option<String>,
}

impl Prefix {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// A declared unit of work
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    /// Every declared key, verbatim
    pub values: Table,
    pub backend: Backend,
    pub targets: Vec<String>,
    pub filters: Vec<String>,
    pub description: String,
    pub pty: bool,
    pub parallel: bool,
    pub privileged: bool,
    pub disabled: bool,
    pub hidden: bool,
    /// Name of the driver to run with
    pub driver: Option<String>,
    pub script: Vec<Segment>,
    pub script_file: Option<String>,
    pub prefix: Prefix,
    pub prepare: Option<Function>,
    pub props: BTreeMap<String, String>,
    pub args: Vec<String>,
    pub registry: RegistryType,
    pub predecessor: Option<TaskId>,
}

impl Task {
    pub fn new(name: impl Into<String>, registry: RegistryType) -> Self {
        Self {
            name: name.into(),
            values: Table::new(),
            backend: Backend::default(),
            targets: Vec::new(),
            filters: Vec::new(),
            description: String::new(),
            pty: false,
            parallel: false,
            privileged: false,
            disabled: false,
            hidden: false,
            driver: None,
            script: Vec::new(),
            script_file: None,
            prefix: Prefix::default(),
            prepare: None,
            props: BTreeMap::new(),
            args: Vec::new(),
            registry,
            predecessor: None,
        }
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
        const KIND: EntityKind = EntityKind::Task;

        self.values.set(key, value.clone());

        match key {
            "backend" => {
                let backend = fields::string(KIND, key, &value)?;
                self.backend = Backend::parse(&backend).ok_or_else(|| {
                    Error::schema(format!(
                        "backend must be '{}' or '{}', got '{backend}'",
                        Backend::Local,
                        Backend::Remote
                    ))
                })?;
            }
            "targets" => self.targets = fields::string_list(KIND, key, &value)?,
            "filters" => self.filters = fields::string_list(KIND, key, &value)?,
            "description" => self.description = fields::string(KIND, key, &value)?,
            "pty" => self.pty = fields::boolean(KIND, key, &value)?,
            "driver" => self.driver = Some(fields::string(KIND, key, &value)?),
            "parallel" => self.parallel = fields::boolean(KIND, key, &value)?,
            "privileged" => self.privileged = fields::boolean(KIND, key, &value)?,
            "disabled" => self.disabled = fields::boolean(KIND, key, &value)?,
            "hidden" => self.hidden = fields::boolean(KIND, key, &value)?,
            "script" => {
                self.script = script::normalize(&value)?;
                self.check_script_source()?;
            }
            "script_file" => {
                self.script_file = Some(fields::string(KIND, key, &value)?);
                self.check_script_source()?;
            }
            "prefix" => match &value {
                Value::Bool(enabled) => self.prefix.enabled = *enabled,
                Value::String(text) => {
                    self.prefix.enabled = true;
                    self.prefix.custom = Some(text.clone());
                }
                other => return Err(Error::invalid_field(KIND, key, "a bool or a string", other)),
            },
            "prepare" => self.prepare = Some(fields::function(KIND, key, &value)?),
            "props" => self.props = fields::props(KIND, key, &value)?,
            "args" => {
                fields::table(KIND, key, &value)?;
                self.args = fields::string_list(KIND, key, &value)?;
            }
            _ => return Err(Error::unknown_field(KIND, key)),
        }
        Ok(())
    }

    fn check_script_source(&self) -> Result<()> {
        let has_file = self.script_file.as_deref().is_some_and(|f| !f.is_empty());
        if has_file && !self.script.is_empty() {
            return Err(Error::ScriptConflict {
                task: self.name.clone(),
            });
        }
        Ok(())
    }
}

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn name(&self) -> &str {
        &self.name
    }

    fn shadow(&mut self, predecessor: TaskId) {
        self.predecessor = Some(predecessor);
    }

    fn predecessor(&self) -> Option<TaskId> {
        self.predecessor
    }
}
