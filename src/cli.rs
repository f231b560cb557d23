use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "essh")]
#[command(version)]
#[command(about = "Declare hosts, tasks, drivers and jobs, then pick the hosts to act on", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Local config file (default: ./esshconfig.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Refresh cached packages while loading
    #[arg(long, global = true)]
    pub update: bool,

    /// With --update, also refresh packages imported by the global config
    #[arg(long, global = true, requires = "update")]
    pub with_global: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List hosts, optionally selected by name or tag
    Hosts(HostsArgs),

    /// List tasks
    Tasks(TasksArgs),

    /// List jobs
    Jobs,

    /// Show one declared entity
    Show {
        /// Kind of entity
        #[arg(value_enum)]
        kind: EntityArg,

        /// Entity name
        name: String,
    },

    /// Show registry scopes and their directories
    Registry,

    /// List imported modules
    Modules,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct HostsArgs {
    /// Host names or tags to select (default: all hosts)
    pub selectors: Vec<String>,

    /// Keep only hosts matching every filter
    #[arg(short, long = "filter")]
    pub filters: Vec<String>,

    /// Select from a job's hosts instead of the global ones
    #[arg(short, long)]
    pub job: Option<String>,

    /// Include hidden hosts
    #[arg(short, long)]
    pub all: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct TasksArgs {
    /// Include hidden and disabled tasks
    #[arg(short, long)]
    pub all: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum EntityArg {
    Host,
    Task,
    Driver,
    Job,
}
