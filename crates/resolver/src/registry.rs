//! Registry scope: where declarations come from and where their data lives
//!
//! Declarations are loaded first from the global scope (the user's home) and
//! then from the local scope (the project). Each scope owns a data directory
//! with a fixed layout:
//!
//! ```text
//! <data_dir>/
//! ├── tmp/        # scratch space
//! ├── modules/    # modules directory
//! └── packages/   # one cache directory per imported package
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Scope type of a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryType {
    Global,
    Local,
}

impl RegistryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for RegistryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registry scope and its storage layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    data_dir: PathBuf,
    kind: RegistryType,
}

impl Registry {
    pub fn new(data_dir: impl Into<PathBuf>, kind: RegistryType) -> Self {
        Self {
            data_dir: data_dir.into(),
            kind,
        }
    }

    pub fn global(data_dir: impl Into<PathBuf>) -> Self {
        Self::new(data_dir, RegistryType::Global)
    }

    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        Self::new(data_dir, RegistryType::Local)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.data_dir.join("tmp")
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.data_dir.join("modules")
    }

    /// Root of the package cache
    pub fn packages_dir(&self) -> PathBuf {
        self.data_dir.join("packages")
    }

    pub fn kind(&self) -> RegistryType {
        self.kind
    }

    /// Scope-type label, `global` or `local`
    pub fn type_label(&self) -> &'static str {
        self.kind.as_str()
    }
}
