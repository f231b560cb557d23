//! Hosts command - list and select declared hosts

use anyhow::{Context, Result};
use colored::Colorize;
use resolver::{Handle, Host, HostId, RegistryType, Resolver, Table, Value};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::Context as AppContext;
use crate::cli::HostsArgs;
use crate::loader;
use crate::ui;

#[derive(Serialize)]
struct HostRow<'a> {
    name: &'a str,
    description: &'a str,
    tags: &'a [String],
    hidden: bool,
    registry: RegistryType,
    ssh_config: &'a BTreeMap<String, String>,
    props: &'a BTreeMap<String, String>,
}

impl<'a> From<&'a Host> for HostRow<'a> {
    fn from(host: &'a Host) -> Self {
        Self {
            name: &host.name,
            description: &host.description,
            tags: &host.tags,
            hidden: host.hidden,
            registry: host.registry,
            ssh_config: &host.ssh_config,
            props: &host.props,
        }
    }
}

pub fn run(ctx: &AppContext, args: &HostsArgs) -> Result<()> {
    let resolver = loader::load(ctx)?;
    let hosts: Vec<&Host> = select(&resolver, args)?
        .into_iter()
        .map(|id| resolver.hosts().get(id))
        .filter(|host| args.all || !host.hidden)
        .collect();

    if args.json {
        let rows: Vec<HostRow> = hosts.iter().map(|host| HostRow::from(*host)).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if !ctx.quiet {
        ui::header("Hosts");
    }

    if hosts.is_empty() {
        println!("{}", "No hosts matched.".dimmed());
        return Ok(());
    }

    let width = ui::name_width(hosts.iter().map(|host| host.name.as_str()));
    for host in hosts {
        let mut details = format!(
            "{}  {}",
            ui::truncate(&host.description, 48),
            format!("[{}]", ui::list(&host.tags)).cyan()
        );
        if host.registry == RegistryType::Global {
            details.push_str(&format!("  {}", "(global)".dimmed()));
        }
        if host.hidden {
            details.push_str(&format!("  {}", "(hidden)".dimmed()));
        }
        ui::row(&host.name, width, &details);
    }

    Ok(())
}

/// Evaluate the selection given on the command line
fn select(resolver: &Resolver, args: &HostsArgs) -> Result<Vec<HostId>> {
    let mut query_args = Vec::new();
    if let Some(job) = &args.job {
        let id = resolver
            .job_by_name(job)
            .with_context(|| format!("Job '{job}' not found"))?;
        query_args.push(Value::from(Handle::Job(id)));
    }
    if !args.selectors.is_empty() {
        let selectors = Table::from_list(args.selectors.iter().map(String::as_str));
        query_args.push(Value::from(selectors));
    }

    let query = resolver
        .select_hosts(&query_args)?
        .filter(args.filters.iter().cloned());
    Ok(query.get(resolver))
}
