//! TOML declaration frontend
//!
//! Declaration files are TOML documents whose top-level keys are processed in
//! document order:
//!
//! ```toml
//! import = ["github.com/acme/essh-hosts"]
//!
//! [hosts.web01]
//! HostName = "192.168.0.11"
//! tags = ["web"]
//!
//! [tasks.deploy]
//! targets = "web"
//! script = ["make build", { code = "make install", sudo = true }]
//!
//! [jobs.release]
//! description = "Release everything"
//! refs = { hosts = ["web01"], tasks = ["deploy"] }
//!
//! [export]
//! greeting = "hello"
//! ```
//!
//! The global config is loaded first into the global registry, then the
//! project config into the local one.

use anyhow::{Context, Result};
use resolver::{Error, Evaluator, Handle, LoadOptions, Registry, Resolver, Table, Value, bridge};
use std::fs;
use std::path::{Path, PathBuf};

use crate::Context as AppContext;
use crate::paths;

/// Evaluates TOML declaration files
#[derive(Debug, Default)]
pub struct TomlEvaluator;

impl Evaluator for TomlEvaluator {
    fn evaluate(&mut self, resolver: &mut Resolver, entrypoint: &Path) -> resolver::Result<Value> {
        let content = fs::read_to_string(entrypoint).map_err(|e| Error::io(entrypoint, e))?;
        let document = toml::from_str::<toml::Table>(&content).map_err(|e| Error::Evaluate {
            path: entrypoint.to_path_buf(),
            message: e.to_string(),
        })?;
        self.apply(resolver, &document)
    }
}

impl TomlEvaluator {
    /// Apply a parsed document, returning its `export` value
    pub fn apply(&mut self, resolver: &mut Resolver, document: &toml::Table) -> resolver::Result<Value> {
        let mut exported = Value::Nil;

        for (key, value) in document {
            match key.as_str() {
                "import" => {
                    for name in import_names(value)? {
                        resolver.import(&name, &mut *self)?;
                    }
                }
                "hosts" => {
                    for (name, config) in entries(key, value)? {
                        resolver.host(name, Some(&config))?;
                    }
                }
                "tasks" => {
                    for (name, config) in entries(key, value)? {
                        resolver.task(name, Some(&config))?;
                    }
                }
                "drivers" => {
                    for (name, config) in entries(key, value)? {
                        resolver.driver(name, Some(&config))?;
                    }
                }
                "jobs" => {
                    for (name, mut config) in entries(key, value)? {
                        if let Some(refs) = config.get_str("refs").cloned() {
                            config.set("refs", Value::Nil);
                            push_refs(resolver, name, &refs, &mut config)?;
                        }
                        resolver.job(name, Some(&config))?;
                    }
                }
                "export" => exported = convert(value),
                other => {
                    return Err(Error::schema(format!("unsupported top-level key '{other}'")));
                }
            }
        }

        Ok(exported)
    }
}

fn import_names(value: &toml::Value) -> resolver::Result<Vec<String>> {
    match value {
        toml::Value::String(name) => Ok(vec![name.clone()]),
        toml::Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::schema(format!("'import' expects strings, got {item}")))
            })
            .collect(),
        other => Err(Error::schema(format!(
            "'import' expects a string or an array of strings, got {other}"
        ))),
    }
}

/// Name and converted config of every entry in a `hosts`/`tasks`/... table
fn entries<'a>(section: &str, value: &'a toml::Value) -> resolver::Result<Vec<(&'a str, Table)>> {
    let table = value
        .as_table()
        .ok_or_else(|| Error::schema(format!("'{section}' has to be a table")))?;
    table
        .iter()
        .map(|(name, config)| match convert(config) {
            Value::Table(config) => Ok((name.as_str(), config)),
            _ => Err(Error::schema(format!(
                "'{section}.{name}' has to be a table"
            ))),
        })
        .collect()
}

/// Turn a job's `refs` into positional handles of declared entities
fn push_refs(resolver: &Resolver, job: &str, refs: &Value, config: &mut Table) -> resolver::Result<()> {
    let refs = refs
        .as_table()
        .ok_or_else(|| Error::schema(format!("job '{job}': 'refs' has to be a table")))?;

    for (kind, names) in refs.named() {
        let names = bridge::string_list(names).ok_or_else(|| {
            Error::schema(format!("job '{job}': 'refs.{kind}' has to be a list of names"))
        })?;
        for name in names {
            let handle = match kind {
                "hosts" => resolver.hosts().lookup(&name).map(Handle::Host),
                "tasks" => resolver.tasks().lookup(&name).map(Handle::Task),
                "drivers" => resolver.drivers().lookup(&name).map(Handle::Driver),
                other => {
                    return Err(Error::schema(format!(
                        "job '{job}': unsupported 'refs.{other}'"
                    )));
                }
            };
            let handle = handle.ok_or_else(|| {
                Error::schema(format!("job '{job}': '{name}' is not declared in {kind}"))
            })?;
            config.push(handle);
        }
    }
    Ok(())
}

/// Convert a TOML value into a resolver value
pub fn convert(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::from(s.as_str()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::from(*b),
        toml::Value::Datetime(dt) => Value::from(dt.to_string()),
        toml::Value::Array(items) => Value::from(Table::from_list(items.iter().map(convert))),
        toml::Value::Table(table) => {
            let mut converted = Table::new();
            for (key, value) in table {
                converted.set(key.as_str(), convert(value));
            }
            Value::from(converted)
        }
    }
}

/// Where a load reads from
#[derive(Debug, Clone)]
pub struct Sources {
    pub global_dir: PathBuf,
    pub global_config: PathBuf,
    pub local_dir: PathBuf,
    pub local_config: PathBuf,
}

impl Sources {
    pub fn resolve(ctx: &AppContext) -> Result<Self> {
        let global_dir = paths::global_dir()?;
        let local_config = paths::local_config(ctx.config.as_deref());
        Ok(Self {
            global_config: global_dir.join(paths::GLOBAL_CONFIG_FILE),
            global_dir,
            local_dir: paths::local_dir(&local_config),
            local_config,
        })
    }
}

/// Load the global then the local config
pub fn load(ctx: &AppContext) -> Result<Resolver> {
    let sources = Sources::resolve(ctx)?;
    load_from(&sources, ctx.options)
}

pub fn load_from(sources: &Sources, options: LoadOptions) -> Result<Resolver> {
    let mut resolver =
        Resolver::new(Registry::global(&sources.global_dir)).with_options(options);
    let mut evaluator = TomlEvaluator;

    evaluate_file(&mut resolver, &mut evaluator, &sources.global_config)?;

    resolver.enter_registry(Registry::local(&sources.local_dir));
    evaluate_file(&mut resolver, &mut evaluator, &sources.local_config)?;

    Ok(resolver)
}

fn evaluate_file(resolver: &mut Resolver, evaluator: &mut TomlEvaluator, path: &Path) -> Result<()> {
    if !path.is_file() {
        log::debug!("No config at {}", path.display());
        return Ok(());
    }

    log::debug!("Loading {}", path.display());
    evaluator
        .evaluate(resolver, path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use resolver::{DEFAULT_DRIVER_NAME, ENTRYPOINT, Fetcher, RegistryType};
    use tempfile::TempDir;

    fn parse(source: &str) -> toml::Table {
        toml::from_str(source).unwrap()
    }

    fn apply(source: &str) -> resolver::Result<Resolver> {
        let mut r = Resolver::new(Registry::local("/tmp/essh-loader-test"));
        TomlEvaluator.apply(&mut r, &parse(source))?;
        Ok(r)
    }

    #[test]
    fn test_hosts_and_tasks() {
        let r = apply(
            r#"
            [hosts.web01]
            HostName = "192.168.0.11"
            Port = "22"
            tags = ["web"]

            [tasks.deploy]
            targets = "web"
            script = ["make build", { code = "make install", sudo = true }]
            "#,
        )
        .unwrap();

        let host = r.hosts().find("web01").unwrap();
        assert_eq!(host.ssh_config["HostName"], "192.168.0.11");
        assert_eq!(host.tags, vec!["web"]);

        let task = r.tasks().find("deploy").unwrap();
        assert_eq!(task.targets, vec!["web"]);
        assert_eq!(task.script.len(), 2);
        assert_eq!(task.script[1]["sudo"], "true");
    }

    #[test]
    fn test_schema_errors_surface() {
        let err = apply("[hosts.web01]\nPort = 22\n").unwrap_err();
        assert!(err.to_string().contains("'Port'"));

        let err = apply("[tasks.deploy]\nretries = 3\n").unwrap_err();
        assert_eq!(err.to_string(), "unsupported task's field 'retries'");

        let err = apply("colour = \"blue\"\n").unwrap_err();
        assert!(err.to_string().contains("unsupported top-level key 'colour'"));
    }

    #[test]
    fn test_document_order_is_kept() {
        let r = apply(
            r#"
            [hosts.web02]
            [hosts.web01]
            [hosts.db01]
            "#,
        )
        .unwrap();
        let names: Vec<_> = r.hosts().iter().map(|(_, h)| h.name.as_str()).collect();
        assert_eq!(names, vec!["web02", "web01", "db01"]);
    }

    #[test]
    fn test_job_refs_become_positional_entries() {
        let r = apply(
            r#"
            [hosts.web01]
            [tasks.deploy]
            script = "make deploy"

            [jobs.release]
            description = "Release everything"
            refs = { hosts = ["web01"], tasks = "deploy" }

            [jobs.release.drivers.docker]
            engine = "docker run"
            "#,
        )
        .unwrap();

        let job = r.jobs().find("release").unwrap();
        assert_eq!(job.description, "Release everything");
        assert!(job.hosts.contains("web01"));
        assert!(job.tasks.contains("deploy"));
        assert!(job.drivers.contains("docker"));
        assert!(job.drivers.contains(DEFAULT_DRIVER_NAME));
    }

    #[test]
    fn test_job_refs_must_exist() {
        let err = apply("[jobs.release]\nrefs = { hosts = [\"nope\"] }\n").unwrap_err();
        assert!(err.to_string().contains("'nope' is not declared"));
    }

    #[test]
    fn test_export_is_returned() {
        let mut r = Resolver::new(Registry::local("/tmp/essh-loader-test"));
        let exported = TomlEvaluator
            .apply(&mut r, &parse("[export]\ngreeting = \"hello\"\n"))
            .unwrap();
        let greeting = exported.as_table().and_then(|t| t.get_str("greeting")).cloned();
        assert_eq!(greeting, Some(Value::from("hello")));
    }

    #[test]
    fn test_convert() {
        let value = convert(&toml::Value::Array(vec![
            toml::Value::Integer(1),
            toml::Value::String("a".into()),
        ]));
        let table = value.as_table().unwrap();
        assert_eq!(table.sequence_len(), 2);
        assert_eq!(table.get_index(1), Some(&Value::Number(1.0)));
    }

    /// Serves packages from a directory of prepared sources
    struct LocalFetcher(PathBuf);

    impl Fetcher for LocalFetcher {
        fn fetch(&self, src: &str, dst: &Path) -> anyhow::Result<()> {
            let source = self.0.join(src).join(ENTRYPOINT);
            fs::create_dir_all(dst)?;
            fs::copy(&source, dst.join(ENTRYPOINT))
                .with_context(|| format!("no package at {}", source.display()))?;
            Ok(())
        }
    }

    #[test]
    fn test_import_module_exports() {
        let dir = TempDir::new().unwrap();
        let sources = dir.path().join("sources");
        fs::create_dir_all(sources.join("acme")).unwrap();
        fs::write(
            sources.join("acme").join(ENTRYPOINT),
            "[hosts.bastion]\ntags = [\"jump\"]\n\n[export]\nname = \"acme\"\n",
        )
        .unwrap();

        let mut r = Resolver::new(Registry::local(dir.path().join(".essh")))
            .with_fetcher(LocalFetcher(sources));
        TomlEvaluator
            .apply(&mut r, &parse("import = [\"acme\", \"acme\"]\n"))
            .unwrap();

        assert!(r.hosts().lookup("bastion").is_some());
        let modules: Vec<_> = r.modules().map(|m| m.name.as_str()).collect();
        assert_eq!(modules, vec!["acme"]);
        let exported = r.modules().next().unwrap().value.clone();
        let name = exported.as_table().and_then(|t| t.get_str("name")).cloned();
        assert_eq!(name, Some(Value::from("acme")));
    }

    #[test]
    fn test_import_inside_module_is_nested() {
        let dir = TempDir::new().unwrap();
        let sources = dir.path().join("sources");
        fs::create_dir_all(sources.join("outer")).unwrap();
        fs::write(sources.join("outer").join(ENTRYPOINT), "import = \"inner\"\n").unwrap();

        let mut r = Resolver::new(Registry::local(dir.path().join(".essh")))
            .with_fetcher(LocalFetcher(sources));
        let err = TomlEvaluator
            .apply(&mut r, &parse("import = \"outer\"\n"))
            .unwrap_err();
        assert!(matches!(err.root(), Error::NestedImport { .. }));
    }

    #[test]
    fn test_load_global_then_local() {
        let dir = TempDir::new().unwrap();
        let global_dir = dir.path().join("global");
        fs::create_dir_all(&global_dir).unwrap();
        fs::write(
            global_dir.join(paths::GLOBAL_CONFIG_FILE),
            "[hosts.web01]\ndescription = \"global\"\n",
        )
        .unwrap();
        let local_config = dir.path().join(paths::LOCAL_CONFIG_FILE);
        fs::write(&local_config, "[hosts.web01]\ndescription = \"local\"\n").unwrap();

        let sources = Sources {
            global_config: global_dir.join(paths::GLOBAL_CONFIG_FILE),
            global_dir,
            local_dir: paths::local_dir(&local_config),
            local_config,
        };
        let r = load_from(&sources, LoadOptions::default()).unwrap();

        let id = r.hosts().lookup("web01").unwrap();
        let host = r.hosts().get(id);
        assert_eq!(host.description, "local");
        assert_eq!(host.registry, RegistryType::Local);
        let shadowed = r.hosts().overrides(id);
        assert_eq!(shadowed.len(), 1);
        assert_eq!(r.hosts().get(shadowed[0]).registry, RegistryType::Global);
        assert_eq!(r.registry().kind(), RegistryType::Local);
        assert_eq!(r.get(Handle::Host(id), "description"), Value::from("local"));
    }

    #[test]
    fn test_load_without_configs() {
        let dir = TempDir::new().unwrap();
        let sources = Sources {
            global_dir: dir.path().join("global"),
            global_config: dir.path().join("global/config.toml"),
            local_dir: dir.path().join(".essh"),
            local_config: dir.path().join("esshconfig.toml"),
        };
        let r = load_from(&sources, LoadOptions::default()).unwrap();
        assert!(r.hosts().is_empty());
        assert_eq!(r.drivers().len(), 1);
    }

    #[test]
    fn test_load_error_names_the_file() {
        let dir = TempDir::new().unwrap();
        let local_config = dir.path().join(paths::LOCAL_CONFIG_FILE);
        fs::write(&local_config, "[hosts.web01\n").unwrap();
        let sources = Sources {
            global_dir: dir.path().join("global"),
            global_config: dir.path().join("global/config.toml"),
            local_dir: paths::local_dir(&local_config),
            local_config,
        };
        let err = load_from(&sources, LoadOptions::default()).unwrap_err();
        assert!(err.to_string().starts_with("Failed to load"));
    }
}
