//! Module and package importing
//!
//! An import name identifies a package source. The package is downloaded into
//! the current registry's package cache on first use, its entrypoint is
//! evaluated once, and the resulting value is memoized for the rest of the
//! load. Imports can't nest.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use log::{debug, info, trace};

use crate::context::Resolver;
use crate::error::{Error, Result};
use crate::registry::{Registry, RegistryType};
use crate::value::{Table, Value};

/// File evaluated when a package is imported
pub const ENTRYPOINT: &str = "index.toml";

/// Downloads a package source into a directory
pub trait Fetcher {
    fn fetch(&self, src: &str, dst: &Path) -> anyhow::Result<()>;
}

/// Evaluates a declaration file against a resolver
pub trait Evaluator {
    /// Evaluate `entrypoint`, returning the value it exports
    fn evaluate(&mut self, resolver: &mut Resolver, entrypoint: &Path) -> Result<Value>;
}

/// An imported package
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    /// Value exported by the entrypoint
    pub value: Value,
    dir: PathBuf,
}

impl Package {
    pub fn new(name: impl Into<String>, registry: &Registry) -> Self {
        let name = name.into();
        let dir = registry.packages_dir().join(key(&name));
        Self {
            name,
            value: Value::Nil,
            dir,
        }
    }

    /// Cache key derived from the import name
    pub fn key(&self) -> String {
        key(&self.name)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entrypoint(&self) -> PathBuf {
        self.dir.join(ENTRYPOINT)
    }

    /// Make sure the package is present in the cache, refreshing it if asked
    pub fn load(&self, update: bool, fetcher: &dyn Fetcher) -> Result<()> {
        let exists = match fs::metadata(&self.dir) {
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(Error::io(&self.dir, e)),
        };

        if exists && !update {
            trace!("package '{}' found at {}", self.name, self.dir.display());
            return Ok(());
        }

        if exists {
            info!("Updating package '{}' (into {})", self.name, self.dir.display());
        } else {
            info!("Installing package '{}' (into {})", self.name, self.dir.display());
        }

        if let Some(parent) = self.dir.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        fetcher
            .fetch(&self.name, &self.dir)
            .map_err(|err| Error::Fetch {
                name: self.name.clone(),
                message: format!("{err:#}"),
            })
    }
}

fn key(name: &str) -> String {
    name.replace(['/', ':'], "-")
}

/// The module whose entrypoint is being evaluated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleContext {
    /// Package cache directory
    pub path: PathBuf,
    pub import_path: String,
}

impl ModuleContext {
    /// Expose the context to declarations
    pub fn to_value(&self) -> Value {
        Value::from(
            Table::new()
                .with("path", self.path.display().to_string())
                .with("import_path", self.import_path.as_str()),
        )
    }
}

impl Resolver {
    /// Import a module, fetching and evaluating it on first use
    pub fn import(&mut self, name: &str, evaluator: &mut dyn Evaluator) -> Result<Value> {
        if let Some(active) = &self.importing {
            return Err(Error::NestedImport {
                name: name.to_string(),
                active: active.import_path.clone(),
            });
        }

        if let Some(package) = self.modules.iter().find(|p| p.name == name) {
            trace!("module '{name}' already loaded");
            return Ok(package.value.clone());
        }

        let options = self.options();
        let update = options.update
            && (self.registry().kind() != RegistryType::Global || options.with_global);

        let mut package = Package::new(name, self.registry());
        package.load(update, self.fetcher.as_ref())?;

        let entrypoint = package.entrypoint();
        if !entrypoint.is_file() {
            return Err(Error::InvalidModule {
                name: name.to_string(),
                path: entrypoint,
            });
        }

        debug!("evaluating module '{name}' from {}", entrypoint.display());
        self.importing = Some(ModuleContext {
            path: package.dir().to_path_buf(),
            import_path: name.to_string(),
        });
        let result = evaluator.evaluate(self, &entrypoint);
        self.importing = None;

        package.value = result.map_err(|source| Error::Module {
            name: name.to_string(),
            source: Box::new(source),
        })?;
        let value = package.value.clone();
        self.modules.push(package);
        Ok(value)
    }
}

/// Fetches packages by shelling out to `git`
#[derive(Debug, Clone, Copy, Default)]
pub struct GitFetcher;

impl GitFetcher {
    /// Clone URL for an import name
    pub fn source_url(src: &str) -> String {
        let src = src.strip_prefix("git::").unwrap_or(src);
        if src.contains("://") || src.starts_with('/') || src.starts_with('.') || src.starts_with("git@") {
            src.to_string()
        } else {
            format!("https://{src}")
        }
    }

    fn git(&self) -> Command {
        let mut cmd = Command::new("git");
        // git must not route through essh itself while packages are loading
        if let Some(git_ssh) = std::env::var_os("GIT_SSH")
            && Path::new(&git_ssh).file_name() == Some(OsStr::new("essh"))
        {
            cmd.env("GIT_SSH", "ssh");
        }
        cmd
    }

    fn run(mut cmd: Command, description: &str) -> anyhow::Result<()> {
        let output = cmd
            .output()
            .with_context(|| format!("Failed to execute: {description}"))?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{description} failed: {}", stderr.trim())
        }
    }
}

impl Fetcher for GitFetcher {
    fn fetch(&self, src: &str, dst: &Path) -> anyhow::Result<()> {
        if dst.join(".git").is_dir() {
            let mut cmd = self.git();
            cmd.arg("-C").arg(dst).args(["pull", "--ff-only"]);
            return Self::run(cmd, "git pull");
        }

        let url = Self::source_url(src);
        debug!("cloning {url} into {}", dst.display());
        let mut cmd = self.git();
        cmd.args(["clone", "--depth", "1", &url]).arg(dst);
        Self::run(cmd, "git clone")
    }
}
