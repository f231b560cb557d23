//! # Resolver
//!
//! Configuration resolution for essh.
//!
//! This crate turns loosely-typed declarations coming out of a configuration
//! evaluator into a canonical, queryable graph of hosts, tasks, drivers and
//! jobs.
//!
//! ## Core Concepts
//!
//! - **Value**: The dynamic value type exchanged with the evaluator
//! - **Resolver**: Owns every registry, the module cache and the current scope
//! - **Store**: Arena plus name index per entity kind; redeclaring a name
//!   shadows the previous entity and links to it
//! - **HostQuery**: Selects hosts by name or tag, globally or inside a job
//! - **Package**: An imported module, fetched once and evaluated once
//!
//! ## Example
//!
//! ```ignore
//! use resolver::{Registry, Resolver, Table, Value};
//!
//! let mut resolver = Resolver::new(Registry::local(".essh"));
//!
//! resolver.host("web01", Some(&Table::new()
//!     .with("HostName", "192.168.0.11")
//!     .with("tags", Table::from_list(["web"]))))?;
//! resolver.host("db01", Some(&Table::new()
//!     .with("tags", Table::from_list(["db"]))))?;
//!
//! let web = resolver.select_hosts(&[Value::from("web")])?.get(&resolver);
//! assert_eq!(web.len(), 1);
//! ```

pub mod bridge;
pub mod context;
pub mod driver;
pub mod error;
mod fields;
pub mod host;
pub mod job;
pub mod package;
pub mod query;
pub mod registry;
pub mod script;
pub mod store;
pub mod task;
pub mod value;

pub use bridge::{Native, from_native, to_native};
pub use context::{LoadOptions, Resolver};
pub use driver::{DEFAULT_DRIVER_NAME, DEFAULT_ENGINE, Driver, Engine};
pub use error::{Error, ErrorCategory, Result};
pub use host::Host;
pub use job::{DEFAULT_JOB_NAME, Job};
pub use package::{ENTRYPOINT, Evaluator, Fetcher, GitFetcher, ModuleContext, Package};
pub use query::{Datasource, HostQuery};
pub use registry::{Registry, RegistryType};
pub use script::Segment;
pub use store::{DriverId, Entity, EntityKind, HostId, Id, JobId, NameIndex, Store, TaskId};
pub use task::{Backend, DEFAULT_TASK_NAME, Prefix, Task};
pub use value::{Function, Handle, Key, Table, Value};
