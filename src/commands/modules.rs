//! Modules command - list imported packages

use anyhow::Result;
use colored::Colorize;

use crate::Context as AppContext;
use crate::loader;
use crate::ui;

pub fn run(ctx: &AppContext) -> Result<()> {
    let resolver = loader::load(ctx)?;
    let modules: Vec<_> = resolver.modules().collect();

    if !ctx.quiet {
        ui::header("Modules");
    }

    if modules.is_empty() {
        println!("{}", "No modules imported.".dimmed());
        return Ok(());
    }

    let width = ui::name_width(modules.iter().map(|module| module.name.as_str()));
    for module in modules {
        ui::row(
            &module.name,
            width,
            &module.dir().display().to_string().dimmed().to_string(),
        );
    }

    Ok(())
}
