//! The resolver context
//!
//! [`Resolver`] owns everything a load produces: the entity registries, the
//! current registry scope, the loaded-module cache and the import marker.
//! One resolver is created per load and dropped at the end of it, so separate
//! loads never share state.

use std::fmt;

use log::debug;

use crate::driver::{DEFAULT_DRIVER_NAME, Driver};
use crate::error::{Error, Result};
use crate::fields;
use crate::host::Host;
use crate::job::{DEFAULT_JOB_NAME, Job};
use crate::package::{Fetcher, GitFetcher, ModuleContext, Package};
use crate::registry::Registry;
use crate::store::{DriverId, EntityKind, HostId, JobId, Store, TaskId};
use crate::task::{DEFAULT_TASK_NAME, Task};
use crate::value::{Handle, Table, Value};

/// Options that change how modules are loaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Refresh cached packages
    pub update: bool,
    /// Also refresh packages imported from the global scope
    pub with_global: bool,
}

/// Process-scoped resolution context
pub struct Resolver {
    registry: Registry,
    options: LoadOptions,
    pub(crate) hosts: Store<Host>,
    pub(crate) tasks: Store<Task>,
    pub(crate) drivers: Store<Driver>,
    pub(crate) jobs: Store<Job>,
    default_driver: DriverId,
    pub(crate) modules: Vec<Package>,
    pub(crate) importing: Option<ModuleContext>,
    pub(crate) fetcher: Box<dyn Fetcher>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .field("hosts", &self.hosts.len())
            .field("tasks", &self.tasks.len())
            .field("drivers", &self.drivers.len())
            .field("jobs", &self.jobs.len())
            .field("modules", &self.modules)
            .field("importing", &self.importing)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// Create a resolver declaring into `registry`
    ///
    /// The built-in default driver is registered up front.
    pub fn new(registry: Registry) -> Self {
        let mut drivers = Store::new();
        let default_driver = drivers.insert(Driver::builtin());
        Self {
            registry,
            options: LoadOptions::default(),
            hosts: Store::new(),
            tasks: Store::new(),
            drivers,
            jobs: Store::new(),
            default_driver,
            modules: Vec::new(),
            importing: None,
            fetcher: Box::new(GitFetcher),
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the collaborator used to download packages
    pub fn with_fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    pub fn options(&self) -> LoadOptions {
        self.options
    }

    /// Registry new declarations belong to
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Switch scope, e.g. from the global config to the project config
    pub fn enter_registry(&mut self, registry: Registry) {
        debug!(
            "entering {} registry at {}",
            registry.type_label(),
            registry.data_dir().display()
        );
        self.registry = registry;
    }

    // ------------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------------

    /// Declare a host, optionally configuring it
    pub fn host(&mut self, name: &str, config: Option<&Table>) -> Result<HostId> {
        debug!("register host: {name}");
        let id = self.hosts.insert(Host::new(name, self.registry.kind()));
        if let Some(config) = config {
            self.hosts.get_mut(id).configure(config)?;
        }
        Ok(id)
    }

    /// Declare a task, optionally configuring it
    pub fn task(&mut self, name: &str, config: Option<&Table>) -> Result<TaskId> {
        debug!("register task: {name}");
        let id = self.tasks.insert(Task::new(name, self.registry.kind()));
        if let Some(config) = config {
            self.tasks.get_mut(id).configure(config)?;
        }
        Ok(id)
    }

    /// Declare a task under the default name
    pub fn anonymous_task(&mut self, config: &Table) -> Result<TaskId> {
        self.task(DEFAULT_TASK_NAME, Some(config))
    }

    /// Declare a driver, optionally configuring it
    pub fn driver(&mut self, name: &str, config: Option<&Table>) -> Result<DriverId> {
        debug!("register driver: {name}");
        let id = self.drivers.insert(Driver::new(name, self.registry.kind()));
        if let Some(config) = config {
            self.drivers.get_mut(id).configure(config)?;
        }
        Ok(id)
    }

    /// Declare a driver under the default name
    pub fn anonymous_driver(&mut self, config: &Table) -> Result<DriverId> {
        self.driver(DEFAULT_DRIVER_NAME, Some(config))
    }

    /// Declare a job, optionally composing it
    pub fn job(&mut self, name: &str, config: Option<&Table>) -> Result<JobId> {
        debug!("register job: {name}");
        let id = self.jobs.insert(Job::new(name));
        if let Some(config) = config {
            self.configure_job(id, config)?;
        }
        Ok(id)
    }

    /// Declare a job under the default name
    pub fn anonymous_job(&mut self, config: &Table) -> Result<JobId> {
        self.job(DEFAULT_JOB_NAME, Some(config))
    }

    /// Constructor dispatch for dynamic callers
    ///
    /// Accepts `(name)`, `(name, config)`, or `(config)` for every kind but
    /// hosts, which always need a name.
    pub fn declare(&mut self, kind: EntityKind, args: &[Value]) -> Result<Handle> {
        let (name, config) = match args {
            [Value::Table(config)] if kind != EntityKind::Host => (default_name(kind), Some(config)),
            [Value::String(name)] => (name.as_str(), None),
            [Value::String(name), Value::Table(config)] => (name.as_str(), Some(config)),
            _ => {
                return Err(Error::schema(format!(
                    "{kind} requires a name and an optional config table"
                )));
            }
        };

        Ok(match kind {
            EntityKind::Host => Handle::Host(self.host(name, config)?),
            EntityKind::Task => Handle::Task(self.task(name, config)?),
            EntityKind::Driver => Handle::Driver(self.driver(name, config)?),
            EntityKind::Job => Handle::Job(self.job(name, config)?),
        })
    }

    // ------------------------------------------------------------------------
    // Handles
    // ------------------------------------------------------------------------

    /// Fail unless `handle` was issued by this resolver
    pub fn check(&self, handle: Handle) -> Result<()> {
        let known = match handle {
            Handle::Host(id) => self.hosts.contains(id),
            Handle::Task(id) => self.tasks.contains(id),
            Handle::Driver(id) => self.drivers.contains(id),
            Handle::Job(id) => self.jobs.contains(id),
        };
        if known {
            Ok(())
        } else {
            Err(Error::UnknownHandle {
                kind: handle.kind(),
            })
        }
    }

    /// Re-configure an entity with every named entry of `config`
    pub fn configure(&mut self, handle: Handle, config: &Table) -> Result<()> {
        self.check(handle)?;
        match handle {
            Handle::Host(id) => self.hosts.get_mut(id).configure(config),
            Handle::Task(id) => self.tasks.get_mut(id).configure(config),
            Handle::Driver(id) => self.drivers.get_mut(id).configure(config),
            Handle::Job(id) => self.configure_job(id, config),
        }
    }

    /// Set one field
    pub fn set(&mut self, handle: Handle, key: &str, value: Value) -> Result<()> {
        self.check(handle)?;
        match handle {
            Handle::Host(id) => self.hosts.get_mut(id).update(key, value),
            Handle::Task(id) => self.tasks.get_mut(id).update(key, value),
            Handle::Driver(id) => self.drivers.get_mut(id).update(key, value),
            Handle::Job(id) => self.update_job(id, key, value),
        }
    }

    /// Read a declared value; `name` yields the entity name
    ///
    /// Unknown handles read as nil.
    pub fn get(&self, handle: Handle, key: &str) -> Value {
        let entry = match handle {
            Handle::Host(id) => self.hosts.try_get(id).map(|host| (&host.name, &host.values)),
            Handle::Task(id) => self.tasks.try_get(id).map(|task| (&task.name, &task.values)),
            Handle::Driver(id) => self
                .drivers
                .try_get(id)
                .map(|driver| (&driver.name, &driver.values)),
            Handle::Job(id) => self.jobs.try_get(id).map(|job| (&job.name, &job.values)),
        };
        let Some((name, values)) = entry else {
            return Value::Nil;
        };
        if key == "name" {
            return Value::String(name.clone());
        }
        values.get_str(key).cloned().unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Registries
    // ------------------------------------------------------------------------

    pub fn hosts(&self) -> &Store<Host> {
        &self.hosts
    }

    pub fn tasks(&self) -> &Store<Task> {
        &self.tasks
    }

    pub fn drivers(&self) -> &Store<Driver> {
        &self.drivers
    }

    pub fn jobs(&self) -> &Store<Job> {
        &self.jobs
    }

    pub fn job_by_name(&self, name: &str) -> Option<JobId> {
        self.jobs.lookup(name)
    }

    /// The built-in driver seeded at construction
    pub fn default_driver(&self) -> DriverId {
        self.default_driver
    }

    /// Driver a task runs with, following its `driver` reference
    pub fn task_driver(&self, id: TaskId) -> Option<DriverId> {
        let task = self.tasks.try_get(id)?;
        self.drivers
            .lookup(task.driver.as_deref().unwrap_or(DEFAULT_DRIVER_NAME))
    }

    // ------------------------------------------------------------------------
    // Callbacks
    // ------------------------------------------------------------------------

    /// Resolve a driver's engine string
    pub fn engine(&self, id: DriverId) -> Result<String> {
        self.check(Handle::Driver(id))?;
        self.drivers.get(id).resolve_engine(id)
    }

    /// Run a task's prepare callback, if any
    pub fn prepare_task(&self, id: TaskId) -> Result<()> {
        self.check(Handle::Task(id))?;
        let task = self.tasks.get(id);
        match &task.prepare {
            Some(prepare) => fields::run_prepare(prepare, Handle::Task(id), &task.name),
            None => Ok(()),
        }
    }

    /// Run a job's prepare callback, if any
    pub fn prepare_job(&self, id: JobId) -> Result<()> {
        self.check(Handle::Job(id))?;
        let job = self.jobs.get(id);
        match &job.prepare {
            Some(prepare) => fields::run_prepare(prepare, Handle::Job(id), &job.name),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------------
    // Modules
    // ------------------------------------------------------------------------

    /// Module whose entrypoint is being evaluated right now
    pub fn current_module(&self) -> Option<&ModuleContext> {
        self.importing.as_ref()
    }

    /// Loaded modules in load order
    pub fn modules(&self) -> impl Iterator<Item = &Package> {
        self.modules.iter()
    }
}

fn default_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Host => "",
        EntityKind::Task => DEFAULT_TASK_NAME,
        EntityKind::Driver => DEFAULT_DRIVER_NAME,
        EntityKind::Job => DEFAULT_JOB_NAME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::registry::RegistryType;
    use crate::value::Function;
    use std::cell::Cell;
    use std::rc::Rc;

    fn resolver() -> Resolver {
        Resolver::new(Registry::local("/tmp/essh-test"))
    }

    #[test]
    fn test_redeclared_host_shadows() {
        let mut r = resolver();
        let first = r.host("web01", None).unwrap();
        let second = r.host("web01", None).unwrap();

        assert_eq!(r.hosts().lookup("web01"), Some(second));
        assert_eq!(r.hosts().get(second).predecessor, Some(first));
        assert_eq!(r.hosts().len(), 1);
        assert_eq!(r.hosts().overrides(second), vec![first]);
    }

    #[test]
    fn test_redeclared_task_and_driver_shadow() {
        let mut r = resolver();
        let t1 = r.task("deploy", None).unwrap();
        let t2 = r.task("deploy", None).unwrap();
        assert_eq!(r.tasks().get(t2).predecessor, Some(t1));

        let d = r.driver("docker", None).unwrap();
        let d2 = r.driver("docker", None).unwrap();
        assert_eq!(r.drivers().get(d2).predecessor, Some(d));
        assert_eq!(r.drivers().lookup("docker"), Some(d2));
    }

    #[test]
    fn test_anonymous_driver_shadows_builtin() {
        let mut r = resolver();
        let builtin = r.default_driver();
        let driver = r
            .anonymous_driver(&Table::new().with("engine", "sh"))
            .unwrap();
        assert_eq!(r.drivers().lookup(DEFAULT_DRIVER_NAME), Some(driver));
        assert_eq!(r.drivers().get(driver).predecessor, Some(builtin));
        assert_eq!(r.engine(builtin).unwrap(), "bash");
        assert_eq!(r.engine(driver).unwrap(), "sh");
    }

    #[test]
    fn test_unknown_field_on_every_kind() {
        let mut r = resolver();
        let handles = [
            Handle::Host(r.host("h", None).unwrap()),
            Handle::Task(r.task("t", None).unwrap()),
            Handle::Driver(r.driver("d", None).unwrap()),
            Handle::Job(r.job("j", None).unwrap()),
        ];
        for handle in handles {
            let err = r.set(handle, "bogus", Value::from("x")).unwrap_err();
            assert!(matches!(err, Error::UnknownField { ref field, .. } if field == "bogus"));
            assert_eq!(err.category(), ErrorCategory::Schema);
        }
    }

    #[test]
    fn test_declare_dispatch() {
        let mut r = resolver();
        let config = Value::from(Table::new().with("description", "anon"));

        let task = r.declare(EntityKind::Task, &[config.clone()]).unwrap();
        assert_eq!(r.get(task, "name"), Value::from(DEFAULT_TASK_NAME));

        let host = r
            .declare(EntityKind::Host, &[Value::from("web01"), config.clone()])
            .unwrap();
        assert_eq!(r.get(host, "description"), Value::from("anon"));

        assert!(r.declare(EntityKind::Host, &[config]).is_err());
        assert!(r.declare(EntityKind::Job, &[]).is_err());
        assert!(r.declare(EntityKind::Driver, &[Value::from(1_i64)]).is_err());
    }

    #[test]
    fn test_get_and_set_through_handles() {
        let mut r = resolver();
        let host = Handle::Host(r.host("web01", None).unwrap());
        r.set(host, "User", Value::from("deploy")).unwrap();
        r.configure(host, &Table::new().with("hidden", true)).unwrap();

        assert_eq!(r.get(host, "name"), Value::from("web01"));
        assert_eq!(r.get(host, "User"), Value::from("deploy"));
        assert_eq!(r.get(host, "hidden"), Value::Bool(true));
        assert_eq!(r.get(host, "missing"), Value::Nil);
    }

    #[test]
    fn test_entities_record_their_scope() {
        let mut r = Resolver::new(Registry::global("/tmp/essh-global"));
        let global = r.host("bastion", None).unwrap();
        r.enter_registry(Registry::local("/tmp/essh-local"));
        let local = r.host("web01", None).unwrap();

        assert_eq!(r.hosts().get(global).registry, RegistryType::Global);
        assert_eq!(r.hosts().get(local).registry, RegistryType::Local);
        assert_eq!(r.registry().type_label(), "local");
    }

    #[test]
    fn test_task_prepare() {
        let mut r = resolver();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let prepare = Function::new(move |_| {
            counter.set(counter.get() + 1);
            Ok(Value::Bool(false))
        });
        let task = r
            .task("deploy", Some(&Table::new().with("prepare", prepare)))
            .unwrap();

        let err = r.prepare_task(task).unwrap_err();
        assert!(matches!(err, Error::PrepareRejected { .. }));
        assert_eq!(err.category(), ErrorCategory::Callback);
        assert_eq!(calls.get(), 1);

        let plain = r.task("plain", None).unwrap();
        assert!(r.prepare_task(plain).is_ok());
    }

    #[test]
    fn test_task_driver_lookup() {
        let mut r = resolver();
        let plain = r.task("plain", None).unwrap();
        assert_eq!(r.task_driver(plain), Some(r.default_driver()));

        let docker = r.driver("docker", None).unwrap();
        let task = r
            .task("build", Some(&Table::new().with("driver", "docker")))
            .unwrap();
        assert_eq!(r.task_driver(task), Some(docker));

        let dangling = r
            .task("lost", Some(&Table::new().with("driver", "nope")))
            .unwrap();
        assert_eq!(r.task_driver(dangling), None);
    }

    #[test]
    fn test_failed_field_is_still_recorded() {
        let mut r = resolver();
        let task = Handle::Task(r.task("deploy", None).unwrap());
        assert!(r.set(task, "pty", Value::from("yes")).is_err());
        assert_eq!(r.get(task, "pty"), Value::from("yes"));
    }

    #[test]
    fn test_debug_summarizes_registries() {
        let mut r = resolver();
        r.host("web01", None).unwrap();
        let rendered = format!("{r:?}");
        assert!(rendered.starts_with("Resolver {"));
        assert!(rendered.contains("hosts: 1"));
        assert!(rendered.contains("drivers: 1"));
    }

    #[test]
    fn test_foreign_handles_are_rejected() {
        let mut other = resolver();
        other.job("setup", None).unwrap();
        let job = other.job("deploy", None).unwrap();
        let task = other.task("build", None).unwrap();

        let r = resolver();
        let mut r2 = resolver();
        let err = r2
            .configure(Handle::Job(job), &Table::new().with("hidden", true))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownHandle { kind: EntityKind::Job }));
        assert_eq!(err.category(), ErrorCategory::Schema);

        assert!(r2.set(Handle::Task(task), "pty", Value::Bool(true)).is_err());
        assert!(r.prepare_job(job).is_err());
        assert!(r.prepare_task(task).is_err());
        assert_eq!(r.task_driver(task), None);
        assert_eq!(r.get(Handle::Job(job), "name"), Value::Nil);
    }
}
