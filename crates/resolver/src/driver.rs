//! Driver declarations
//!
//! A driver resolves to an engine string that wraps task scripts. The engine
//! is either fixed, or computed by a callback every time it is resolved.

use crate::error::{Error, Result};
use crate::registry::RegistryType;
use crate::store::{DriverId, Entity, EntityKind};
use crate::value::{Function, Handle, Table, Value};

/// Name of the built-in driver, also used for drivers declared without a name
pub const DEFAULT_DRIVER_NAME: &str = "default";

/// Engine of the built-in driver
pub const DEFAULT_ENGINE: &str = "bash";

/// How a driver produces its engine
#[derive(Debug, Clone)]
pub enum Engine {
    Fixed(String),
    /// Invoked with the driver handle on every resolution
    Callback(Function),
}

/// A declared execution environment
#[derive(Debug, Clone)]
pub struct Driver {
    pub name: String,
    /// Every declared key, verbatim
    pub values: Table,
    pub engine: Option<Engine>,
    pub registry: RegistryType,
    pub predecessor: Option<DriverId>,
}

impl Driver {
    pub fn new(name: impl Into<String>, registry: RegistryType) -> Self {
        Self {
            name: name.into(),
            values: Table::new(),
            engine: None,
            registry,
            predecessor: None,
        }
    }

    /// The driver every resolver starts with
    pub fn builtin() -> Self {
        let mut driver = Self::new(DEFAULT_DRIVER_NAME, RegistryType::Global);
        driver.engine = Some(Engine::Fixed(DEFAULT_ENGINE.to_string()));
        driver
    }

    /// Apply every named entry of `config`
    pub fn configure(&mut self, config: &Table) -> Result<()> {
        for (key, value) in config.named() {
            self.update(key, value.clone())?;
        }
        Ok(())
    }

    /// Update one field
    pub fn update(&mut self, key: &str, value: Value) -> Result<()> {
        const KIND: EntityKind = EntityKind::Driver;

        self.values.set(key, value.clone());

        match key {
            "engine" => {
                self.engine = Some(match value {
                    Value::String(engine) => Engine::Fixed(engine),
                    Value::Function(f) => Engine::Callback(f),
                    other => {
                        return Err(Error::invalid_field(KIND, key, "a function or a string", &other));
                    }
                });
            }
            _ => return Err(Error::unknown_field(KIND, key)),
        }
        Ok(())
    }

    /// Resolve the engine string; `id` must be this driver's id
    ///
    /// Callback engines are never cached.
    pub fn resolve_engine(&self, id: DriverId) -> Result<String> {
        match &self.engine {
            Some(Engine::Fixed(engine)) => Ok(engine.clone()),
            Some(Engine::Callback(f)) => match f.call(&[Value::Handle(Handle::Driver(id))])? {
                Value::String(engine) => Ok(engine),
                other => Err(Error::EngineNotString {
                    driver: self.name.clone(),
                    got: other.to_string(),
                }),
            },
            None => Err(Error::schema(format!(
                "driver '{}' has no engine",
                self.name
            ))),
        }
    }
}

impl Entity for Driver {
    const KIND: EntityKind = EntityKind::Driver;

    fn name(&self) -> &str {
        &self.name
    }

    fn shadow(&mut self, predecessor: DriverId) {
        self.predecessor = Some(predecessor);
    }

    fn predecessor(&self) -> Option<DriverId> {
        self.predecessor
    }
}
