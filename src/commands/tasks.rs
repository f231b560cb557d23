//! Tasks command - list declared tasks

use anyhow::Result;
use colored::Colorize;
use resolver::{Backend, RegistryType, Resolver, Segment, Task};
use serde::Serialize;

use crate::Context as AppContext;
use crate::cli::TasksArgs;
use crate::loader;
use crate::ui;

#[derive(Serialize)]
struct TaskRow<'a> {
    name: &'a str,
    description: &'a str,
    backend: Backend,
    targets: &'a [String],
    filters: &'a [String],
    driver: Option<&'a str>,
    disabled: bool,
    hidden: bool,
    registry: RegistryType,
    script: &'a [Segment],
    script_file: Option<&'a str>,
}

impl<'a> From<&'a Task> for TaskRow<'a> {
    fn from(task: &'a Task) -> Self {
        Self {
            name: &task.name,
            description: &task.description,
            backend: task.backend,
            targets: &task.targets,
            filters: &task.filters,
            driver: task.driver.as_deref(),
            disabled: task.disabled,
            hidden: task.hidden,
            registry: task.registry,
            script: &task.script,
            script_file: task.script_file.as_deref(),
        }
    }
}

pub fn run(ctx: &AppContext, args: &TasksArgs) -> Result<()> {
    let resolver = loader::load(ctx)?;
    let tasks = visible(&resolver, args.all);

    if args.json {
        let rows: Vec<TaskRow> = tasks.iter().map(|task| TaskRow::from(*task)).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if !ctx.quiet {
        ui::header("Tasks");
    }

    if tasks.is_empty() {
        println!("{}", "No tasks declared.".dimmed());
        return Ok(());
    }

    let width = ui::name_width(tasks.iter().map(|task| task.name.as_str()));
    for task in tasks {
        let mut details = format!(
            "{}  {}",
            ui::truncate(&task.description, 48),
            format!("({} → {})", task.backend, ui::list(&task.targets)).dimmed()
        );
        if task.disabled {
            details.push_str(&format!("  {}", "disabled".yellow()));
        }
        ui::row(&task.name, width, &details);
    }

    Ok(())
}

/// Tasks to list, in declaration order
fn visible(resolver: &Resolver, all: bool) -> Vec<&Task> {
    resolver
        .tasks()
        .iter()
        .map(|(_, task)| task)
        .filter(|task| all || !(task.hidden || task.disabled))
        .collect()
}
