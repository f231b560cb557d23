//! Registry command - show both scopes and what they declare

use anyhow::Result;
use colored::Colorize;
use resolver::{Registry, RegistryType, Resolver};
use std::path::Path;

use crate::Context as AppContext;
use crate::loader::{self, Sources};
use crate::ui;

/// Entities declared per kind in one scope
#[derive(Debug, Default, PartialEq, Eq)]
struct Counts {
    hosts: usize,
    tasks: usize,
    drivers: usize,
}

pub fn run(ctx: &AppContext) -> Result<()> {
    let sources = Sources::resolve(ctx)?;
    let resolver = loader::load_from(&sources, ctx.options)?;

    let scopes = [
        (
            Registry::global(&sources.global_dir),
            &sources.global_config,
        ),
        (Registry::local(&sources.local_dir), &sources.local_config),
    ];

    for (registry, config) in scopes {
        ui::header(&format!("{} registry", registry.type_label()));
        kv_path("Config", config);
        kv_path("Data dir", registry.data_dir());
        kv_path("Packages", &registry.packages_dir());
        kv_path("Modules", &registry.modules_dir());
        kv_path("Tmp", &registry.tmp_dir());

        let counts = count(&resolver, registry.kind());
        ui::kv(
            "Declared",
            &format!(
                "{} hosts, {} tasks, {} drivers",
                counts.hosts, counts.tasks, counts.drivers
            ),
        );
    }

    println!();
    ui::info(&format!(
        "New declarations go to the {} registry",
        resolver.registry().type_label().bold()
    ));
    Ok(())
}

fn kv_path(key: &str, path: &Path) {
    let display = path.display().to_string();
    if path.exists() {
        ui::kv(key, &display);
    } else {
        ui::kv(key, &format!("{} {}", display, "(missing)".dimmed()));
    }
}

/// Visible entities declared in `kind` scope
fn count(resolver: &Resolver, kind: RegistryType) -> Counts {
    Counts {
        hosts: resolver
            .hosts()
            .iter()
            .filter(|(_, host)| host.registry == kind)
            .count(),
        tasks: resolver
            .tasks()
            .iter()
            .filter(|(_, task)| task.registry == kind)
            .count(),
        drivers: resolver
            .drivers()
            .iter()
            .filter(|(_, driver)| driver.registry == kind)
            .count(),
    }
}
