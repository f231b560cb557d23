//! Show command - inspect one declared entity

use anyhow::{Context, Result};
use colored::Colorize;
use resolver::{DEFAULT_DRIVER_NAME, NameIndex, Prefix, Resolver, Table, Value, to_native};
use std::collections::BTreeMap;

use crate::Context as AppContext;
use crate::cli::EntityArg;
use crate::loader;
use crate::ui;

pub fn run(ctx: &AppContext, kind: EntityArg, name: &str) -> Result<()> {
    let resolver = loader::load(ctx)?;
    match kind {
        EntityArg::Host => host(&resolver, name),
        EntityArg::Task => task(&resolver, name),
        EntityArg::Driver => driver(&resolver, name),
        EntityArg::Job => job(&resolver, name),
    }
}

fn host(resolver: &Resolver, name: &str) -> Result<()> {
    let hosts = resolver.hosts();
    let id = hosts
        .lookup(name)
        .with_context(|| format!("Host '{name}' not found"))?;
    let host = hosts.get(id);

    ui::header(&format!("Host {name}"));
    ui::kv("Description", &host.description);
    ui::kv("Registry", host.registry.as_str());
    ui::kv("Tags", &ui::list(&host.tags));
    ui::kv("Hidden", &host.hidden.to_string());
    let overridden: Vec<String> = hosts
        .overrides(id)
        .into_iter()
        .map(|previous| hosts.get(previous).registry.to_string())
        .collect();
    if !overridden.is_empty() {
        ui::kv("Overrides", &overridden.join(", "));
    }

    map_section("SSH config", &host.ssh_config);
    map_section("Props", &host.props);

    let hooks = [
        ("before_connect", host.hooks_before_connect.len()),
        ("after_connect", host.hooks_after_connect.len()),
        ("after_disconnect", host.hooks_after_disconnect.len()),
    ];
    if hooks.iter().any(|(_, count)| *count > 0) {
        ui::section("Hooks");
        for (hook, count) in hooks {
            ui::kv(hook, &count.to_string());
        }
    }

    declared_section(&host.values)
}

fn task(resolver: &Resolver, name: &str) -> Result<()> {
    let id = resolver
        .tasks()
        .lookup(name)
        .with_context(|| format!("Task '{name}' not found"))?;
    let task = resolver.tasks().get(id);

    ui::header(&format!("Task {name}"));
    ui::kv("Description", &task.description);
    ui::kv("Registry", task.registry.as_str());
    ui::kv("Backend", task.backend.as_str());
    ui::kv("Targets", &ui::list(&task.targets));
    ui::kv("Filters", &ui::list(&task.filters));

    let driver = task.driver.as_deref().unwrap_or(DEFAULT_DRIVER_NAME);
    match resolver.task_driver(id) {
        Some(driver_id) => {
            let engine = resolver.engine(driver_id)?;
            ui::kv("Driver", &format!("{driver} ({engine})"));
        }
        None => ui::kv("Driver", &format!("{driver} {}", "(not declared)".red())),
    }

    let prefix = match &task.prefix {
        Prefix { enabled: false, .. } => "off".to_string(),
        Prefix { custom: None, .. } => "on".to_string(),
        Prefix { custom: Some(text), .. } => format!("{text:?}"),
    };
    ui::kv("Prefix", &prefix);

    let flags: Vec<String> = [
        ("pty", task.pty),
        ("parallel", task.parallel),
        ("privileged", task.privileged),
        ("disabled", task.disabled),
        ("hidden", task.hidden),
    ]
    .into_iter()
    .filter(|(_, on)| *on)
    .map(|(flag, _)| flag.to_string())
    .collect();
    ui::kv("Flags", &ui::list(&flags));
    if !task.args.is_empty() {
        ui::kv("Args", &task.args.join(" "));
    }

    if let Some(file) = &task.script_file {
        ui::kv("Script file", file);
    }
    if !task.script.is_empty() {
        ui::section("Script");
        for segment in &task.script {
            let code = segment.get("code").map(String::as_str).unwrap_or_default();
            let options: Vec<String> = segment
                .iter()
                .filter(|(key, _)| key.as_str() != "code")
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            if options.is_empty() {
                println!("  {code}");
            } else {
                println!("  {code}  {}", format!("[{}]", options.join(", ")).dimmed());
            }
        }
    }

    map_section("Props", &task.props);
    declared_section(&task.values)
}

fn driver(resolver: &Resolver, name: &str) -> Result<()> {
    let id = resolver
        .drivers()
        .lookup(name)
        .with_context(|| format!("Driver '{name}' not found"))?;
    let driver = resolver.drivers().get(id);

    ui::header(&format!("Driver {name}"));
    ui::kv("Registry", driver.registry.as_str());
    ui::kv("Engine", &resolver.engine(id)?);
    declared_section(&driver.values)
}

fn job(resolver: &Resolver, name: &str) -> Result<()> {
    let id = resolver
        .job_by_name(name)
        .with_context(|| format!("Job '{name}' not found"))?;
    let job = resolver.jobs().get(id);

    ui::header(&format!("Job {name}"));
    ui::kv("Description", &job.description);
    ui::kv("Hidden", &job.hidden.to_string());

    ui::kv("Hosts", &ui::list(&names(&job.hosts)));
    ui::kv("Tasks", &ui::list(&names(&job.tasks)));
    ui::kv("Drivers", &ui::list(&names(&job.drivers)));

    declared_section(&job.values)
}

fn names<T>(index: &NameIndex<T>) -> Vec<String> {
    index.iter().map(|(name, _)| name.to_string()).collect()
}

fn map_section(title: &str, map: &BTreeMap<String, String>) {
    if map.is_empty() {
        return;
    }
    ui::section(title);
    for (key, value) in map {
        ui::kv(key, value);
    }
}

fn declared_section(values: &Table) -> Result<()> {
    ui::section("Declared");
    println!("{}", declared(values)?);
    Ok(())
}

/// Raw declared values as JSON
fn declared(values: &Table) -> Result<String> {
    let native = to_native(&Value::Table(values.clone()));
    Ok(serde_json::to_string_pretty(&native)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_renders_raw_values() {
        let values = Table::new()
            .with("HostName", "10.0.0.1")
            .with("tags", Table::from_list(["web", "eu"]));
        let json: serde_json::Value = serde_json::from_str(&declared(&values).unwrap()).unwrap();
        assert_eq!(json["HostName"], "10.0.0.1");
        assert_eq!(json["tags"], serde_json::json!(["web", "eu"]));
    }

    #[test]
    fn test_empty_declaration() {
        assert_eq!(declared(&Table::new()).unwrap(), "{}");
    }
}
