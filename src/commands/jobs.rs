//! Jobs command - list declared jobs

use anyhow::Result;
use colored::Colorize;

use crate::Context as AppContext;
use crate::loader;
use crate::ui;

pub fn run(ctx: &AppContext) -> Result<()> {
    let resolver = loader::load(ctx)?;
    let jobs = resolver.jobs();

    if !ctx.quiet {
        ui::header("Jobs");
    }

    if jobs.is_empty() {
        println!("{}", "No jobs declared.".dimmed());
        return Ok(());
    }

    let width = ui::name_width(jobs.iter().map(|(_, job)| job.name.as_str()));
    for (_, job) in jobs.iter() {
        let mut details = format!(
            "{}  {}",
            ui::truncate(&job.description, 48),
            format!(
                "({} hosts, {} tasks, {} drivers)",
                job.hosts.len(),
                job.tasks.len(),
                job.drivers.len()
            )
            .dimmed()
        );
        if job.hidden {
            details.push_str(&format!("  {}", "(hidden)".dimmed()));
        }
        ui::row(&job.name, width, &details);
    }

    Ok(())
}
