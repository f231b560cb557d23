//! Job declarations and composition
//!
//! A job bundles hosts, tasks and drivers into its own sub-registries. It is
//! composed from one declaration table in two passes: named entries first
//! (fields and inline `hosts`/`tasks`/`drivers` maps), then positional entries,
//! which must be handles of already-declared entities.
//!
//! Inline map entries are declared exactly like top-level ones, so they also
//! land in (and shadow within) the global registries.

use crate::context::Resolver;
use crate::driver::{DEFAULT_DRIVER_NAME, Driver};
use crate::error::{Error, Result};
use crate::fields;
use crate::host::Host;
use crate::store::{Entity, EntityKind, JobId, NameIndex};
use crate::task::Task;
use crate::value::{Function, Handle, Table, Value};

/// Name given to jobs declared without one
pub const DEFAULT_JOB_NAME: &str = "default";

/// A named bundle of hosts, tasks and drivers
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    /// Declared values, plus the raw bags of positional entities under
    /// `hosts`, `tasks` and `drivers`
    pub values: Table,
    pub description: String,
    pub hidden: bool,
    pub prepare: Option<Function>,
    pub hosts: NameIndex<Host>,
    pub tasks: NameIndex<Task>,
    pub drivers: NameIndex<Driver>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Table::new(),
            description: String::new(),
            hidden: false,
            prepare: None,
            hosts: NameIndex::new(),
            tasks: NameIndex::new(),
            drivers: NameIndex::new(),
        }
    }
}

impl Entity for Job {
    const KIND: EntityKind = EntityKind::Job;

    fn name(&self) -> &str {
        &self.name
    }
}

const KIND: EntityKind = EntityKind::Job;

impl Resolver {
    /// Compose `config` into the job
    pub(crate) fn configure_job(&mut self, id: JobId, config: &Table) -> Result<()> {
        for (key, value) in config.named() {
            self.update_job(id, key, value.clone())?;
        }

        for (_, value) in config.positional() {
            match value.as_handle() {
                Some(handle @ (Handle::Host(_) | Handle::Task(_) | Handle::Driver(_))) => {
                    self.attach(id, handle)?;
                }
                _ => {
                    return Err(Error::schema(format!(
                        "job '{}' expected a host, task or driver but got {value}",
                        self.jobs.get(id).name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Update one job field
    pub(crate) fn update_job(&mut self, id: JobId, key: &str, value: Value) -> Result<()> {
        self.jobs.get_mut(id).values.set(key, value.clone());

        match key {
            "description" => {
                let description = fields::string(KIND, key, &value)?;
                self.jobs.get_mut(id).description = description;
            }
            "hidden" => {
                let hidden = fields::boolean(KIND, key, &value)?;
                self.jobs.get_mut(id).hidden = hidden;
            }
            "prepare" => {
                let prepare = fields::function(KIND, key, &value)?;
                self.jobs.get_mut(id).prepare = Some(prepare);
            }
            "hosts" => {
                let mut scope = NameIndex::new();
                for (name, config) in inline_entries(key, &value)? {
                    let host = self.host(name, Some(config))?;
                    scope.insert(name, host);
                }
                self.jobs.get_mut(id).hosts = scope;
            }
            "tasks" => {
                let mut scope = NameIndex::new();
                for (name, config) in inline_entries(key, &value)? {
                    let task = self.task(name, Some(config))?;
                    scope.insert(name, task);
                }
                self.jobs.get_mut(id).tasks = scope;
            }
            "drivers" => {
                let mut scope = NameIndex::new();
                scope.insert(DEFAULT_DRIVER_NAME, self.default_driver());
                for (name, config) in inline_entries(key, &value)? {
                    let driver = self.driver(name, Some(config))?;
                    scope.insert(name, driver);
                }
                self.jobs.get_mut(id).drivers = scope;
            }
            _ => return Err(Error::unknown_field(KIND, key)),
        }
        Ok(())
    }

    /// Mirror a positional entity into the job and register it there
    fn attach(&mut self, id: JobId, handle: Handle) -> Result<()> {
        self.check(handle)?;
        let (field, name, bag) = match handle {
            Handle::Host(h) => {
                let host = self.hosts.get(h);
                ("hosts", host.name.clone(), host.values.clone())
            }
            Handle::Task(t) => {
                let task = self.tasks.get(t);
                ("tasks", task.name.clone(), task.values.clone())
            }
            Handle::Driver(d) => {
                let driver = self.drivers.get(d);
                ("drivers", driver.name.clone(), driver.values.clone())
            }
            Handle::Job(_) => {
                return Err(Error::schema("a job can't contain another job"));
            }
        };

        let job = self.jobs.get_mut(id);
        let mut mirror = match job.values.get_str(field) {
            None => Table::new(),
            Some(Value::Table(table)) => table.clone(),
            Some(_) => {
                return Err(Error::schema(format!(
                    "broken '{field}' table in job '{}'",
                    job.name
                )));
            }
        };
        mirror.set(name.as_str(), bag);
        job.values.set(field, mirror);

        match handle {
            Handle::Host(h) => {
                job.hosts.insert(&name, h);
            }
            Handle::Task(t) => {
                job.tasks.insert(&name, t);
            }
            Handle::Driver(d) => {
                job.drivers.insert(&name, d);
            }
            Handle::Job(_) => {}
        }
        Ok(())
    }
}

/// Entries of an inline `hosts`/`tasks`/`drivers` map
fn inline_entries<'a>(field: &str, value: &'a Value) -> Result<Vec<(&'a str, &'a Table)>> {
    let table = fields::table(KIND, field, value)?;
    let entity = field.trim_end_matches('s');
    table
        .iter()
        .map(|(key, config)| {
            let name = key.as_name().ok_or_else(|| {
                Error::schema(format!("expected string of {entity}'s name but got {key}"))
            })?;
            let config = config.as_table().ok_or_else(|| {
                Error::schema(format!("expected table of {entity}'s config but got {config}"))
            })?;
            Ok((name, config))
        })
        .collect()
}
