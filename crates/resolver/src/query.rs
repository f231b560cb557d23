//! Host selection
//!
//! A [`HostQuery`] picks hosts from a datasource (the global host registry or
//! one job's hosts) by selection and filter expressions. An expression matches
//! a host when it equals the host's name or one of its tags. A host is
//! selected when it matches any selection (no selections match everything)
//! and every filter.

use crate::bridge;
use crate::context::Resolver;
use crate::error::{Error, Result};
use crate::store::{HostId, JobId};
use crate::value::{Handle, Value};

/// Where a query reads hosts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Datasource {
    #[default]
    Global,
    Job(JobId),
}

/// Lazily evaluated host selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostQuery {
    datasource: Datasource,
    selections: Vec<String>,
    filters: Vec<String>,
}

impl HostQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read hosts from a job instead of the global registry
    #[must_use]
    pub fn on_job(mut self, job: JobId) -> Self {
        self.datasource = Datasource::Job(job);
        self
    }

    #[must_use]
    pub fn select<I, S>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selections.extend(exprs.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn filter<I, S>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.extend(exprs.into_iter().map(Into::into));
        self
    }

    /// Append filters given as a dynamic string or string list
    pub fn filter_value(self, value: &Value) -> Result<Self> {
        let exprs = expressions(value, "filter")?;
        Ok(self.filter(exprs))
    }

    pub fn datasource(&self) -> Datasource {
        self.datasource
    }

    pub fn selections(&self) -> &[String] {
        &self.selections
    }

    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    /// Matching hosts in declaration order
    pub fn get(&self, resolver: &Resolver) -> Vec<HostId> {
        self.candidates(resolver)
            .into_iter()
            .filter(|&id| self.accepts(resolver, id))
            .collect()
    }

    /// First matching host, if any
    pub fn first(&self, resolver: &Resolver) -> Option<HostId> {
        self.candidates(resolver)
            .into_iter()
            .find(|&id| self.accepts(resolver, id))
    }

    fn candidates(&self, resolver: &Resolver) -> Vec<HostId> {
        match self.datasource {
            Datasource::Global => resolver.hosts().ids().collect(),
            Datasource::Job(job) => resolver
                .jobs()
                .try_get(job)
                .map(|job| job.hosts.ids().collect())
                .unwrap_or_default(),
        }
    }

    fn accepts(&self, resolver: &Resolver, id: HostId) -> bool {
        let host = resolver.hosts().get(id);
        let selected =
            self.selections.is_empty() || self.selections.iter().any(|expr| host.matches(expr));
        selected && self.filters.iter().all(|expr| host.matches(expr))
    }
}

impl Resolver {
    /// Build a query from dynamic arguments
    ///
    /// Accepts nothing, a job handle, a selection (string or string list), or
    /// a job handle followed by a selection.
    pub fn select_hosts(&self, args: &[Value]) -> Result<HostQuery> {
        let query = HostQuery::new();
        if let Some(Value::Handle(handle)) = args.first() {
            self.check(*handle)?;
        }
        match args {
            [] => Ok(query),
            [Value::Handle(Handle::Job(job))] => Ok(query.on_job(*job)),
            [Value::Handle(Handle::Job(job)), selection] => {
                Ok(query.on_job(*job).select(expressions(selection, "select")?))
            }
            [Value::Handle(other)] => Err(Error::schema(format!(
                "select expects a job, got a {}",
                other.kind()
            ))),
            [selection] => Ok(query.select(expressions(selection, "select")?)),
            [_, _] => Err(Error::schema(
                "select with two arguments expects a job as the first one",
            )),
            _ => Err(Error::schema(format!(
                "select takes at most 2 arguments, got {}",
                args.len()
            ))),
        }
    }
}

fn expressions(value: &Value, method: &str) -> Result<Vec<String>> {
    match value {
        Value::String(_) | Value::Table(_) => bridge::string_list(value).ok_or_else(|| {
            Error::schema(format!("{method} expects a string or a list of strings"))
        }),
        other => Err(Error::schema(format!(
            "{method} expects a string or a list of strings, got {other}"
        ))),
    }
}
