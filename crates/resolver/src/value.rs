//! Dynamic values exchanged with the declaration evaluator
//!
//! The evaluator is a black box to the resolver: whatever language it runs,
//! the values it hands over are flattened into [`Value`]. Tables keep
//! insertion order and may mix positional and named entries, which is what
//! lets one declaration table carry both fields and entity handles.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::store::{DriverId, EntityKind, HostId, JobId, TaskId};

/// Key of a table entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Positional entry, 1-based
    Index(i64),
    /// Named entry
    Name(String),
}

impl Key {
    /// Name of the entry, if it is a named one
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Index(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<i64> for Key {
    fn from(index: i64) -> Self {
        Self::Index(index)
    }
}

/// Insertion-ordered table of positional and named entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    entries: IndexMap<Key, Value>,
    // largest N such that indices 1..N are all present
    border: usize,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sequence with entries 1..N
    pub fn from_list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut table = Self::new();
        for item in items {
            table.push(item);
        }
        table
    }

    /// Builder-style [`Table::set`]
    pub fn with(mut self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Set an entry; a nil value removes it
    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        let index = match key {
            Key::Index(i) => usize::try_from(i).ok().filter(|i| *i > 0),
            Key::Name(_) => None,
        };

        if value.is_nil() {
            if self.entries.shift_remove(&key).is_some()
                && let Some(i) = index
                && i <= self.border
            {
                self.border = i - 1;
            }
            return;
        }

        self.entries.insert(key, value);
        if index == Some(self.border + 1) {
            self.border += 1;
            while self.entries.contains_key(&Key::Index(self.border as i64 + 1)) {
                self.border += 1;
            }
        }
    }

    /// Append after the current sequence
    pub fn push(&mut self, value: impl Into<Value>) {
        let next = self.border as i64 + 1;
        self.set(Key::Index(next), value);
    }

    /// Get an entry by key
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Get a named entry
    pub fn get_str(&self, name: &str) -> Option<&Value> {
        self.entries.get(&Key::Name(name.to_string()))
    }

    /// Get a positional entry
    pub fn get_index(&self, index: i64) -> Option<&Value> {
        self.entries.get(&Key::Index(index))
    }

    /// Largest N such that indices 1..N are all present
    pub fn sequence_len(&self) -> usize {
        self.border
    }

    /// Entries 1..N in index order
    pub fn sequence(&self) -> impl Iterator<Item = &Value> {
        (1..=self.border as i64).filter_map(|i| self.get_index(i))
    }

    /// Positional entries sorted by index
    pub fn positional(&self) -> Vec<(i64, &Value)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .filter_map(|(k, v)| match k {
                Key::Index(i) => Some((*i, v)),
                Key::Name(_) => None,
            })
            .collect();
        entries.sort_by_key(|(i, _)| *i);
        entries
    }

    /// All entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.entries.iter()
    }

    /// Named entries in insertion order
    pub fn named(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| k.as_name().map(|name| (name, v)))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// 2^53, past which f64 no longer holds every integer
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

type Callback = dyn Fn(&[Value]) -> anyhow::Result<Value>;

/// Callable provided by the evaluator
///
/// Functions compare by identity.
#[derive(Clone)]
pub struct Function(Rc<Callback>);

impl Function {
    /// Wrap a closure
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + 'static,
    {
        Self(Rc::new(f))
    }

    /// Invoke the callable
    pub fn call(&self, args: &[Value]) -> anyhow::Result<Value> {
        (self.0)(args)
    }

    /// Whether both wrap the same callable
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({:p})", Rc::as_ptr(&self.0))
    }
}

/// Reference to a declared entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    Host(HostId),
    Task(TaskId),
    Driver(DriverId),
    Job(JobId),
}

impl Handle {
    /// Kind of the referenced entity
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Host(_) => EntityKind::Host,
            Self::Task(_) => EntityKind::Task,
            Self::Driver(_) => EntityKind::Driver,
            Self::Job(_) => EntityKind::Job,
        }
    }
}

/// A dynamic value
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Table(Table),
    Function(Function),
    Handle(Handle),
}

impl Value {
    /// Short name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Table(_) => "table",
            Self::Function(_) => "function",
            Self::Handle(_) => "handle",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            Self::Handle(h) => Some(*h),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Table(a), Self::Table(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Handle(a), Self::Handle(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER => {
                write!(f, "{}", *n as i64)
            }
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Table(t) => write!(f, "table ({} entries)", t.len()),
            Self::Function(_) => write!(f, "function"),
            Self::Handle(h) => write!(f, "{} handle", h.kind()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<Table> for Value {
    fn from(t: Table) -> Self {
        Self::Table(t)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Self::Function(f)
    }
}

impl From<Handle> for Value {
    fn from(h: Handle) -> Self {
        Self::Handle(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_len_stops_at_gap() {
        let mut table = Table::from_list(["a", "b"]);
        table.set(4_i64, "d");
        table.set("name", "x");
        assert_eq!(table.sequence_len(), 2);
        let seq: Vec<_> = table.sequence().collect();
        assert_eq!(seq, vec![&Value::from("a"), &Value::from("b")]);
    }

    #[test]
    fn test_set_nil_removes_entry() {
        let mut table = Table::new().with("a", 1_i64).with("b", 2_i64);
        table.set("a", Value::Nil);
        assert_eq!(table.len(), 1);
        assert!(table.get_str("a").is_none());
    }

    #[test]
    fn test_set_existing_keeps_position() {
        let table = Table::new()
            .with("first", 1_i64)
            .with("second", 2_i64)
            .with("first", 3_i64);
        let names: Vec<_> = table.named().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(table.get_str("first"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn test_functions_compare_by_identity() {
        let f = Function::new(|_| Ok(Value::Nil));
        let g = Function::new(|_| Ok(Value::Nil));
        assert_eq!(Value::from(f.clone()), Value::from(f));
        assert_ne!(
            Value::from(g),
            Value::from(Function::new(|_| Ok(Value::Nil)))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(1.5).to_string(), "1.5");
        assert_eq!(Value::from("hi").to_string(), "\"hi\"");
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(Value::Number(-42.0).to_string(), "-42");
        assert_eq!(Value::Number(1e20).to_string(), "100000000000000000000");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "inf");
    }

    #[test]
    fn test_sequence_fills_gaps() {
        let mut table = Table::new();
        table.set(2_i64, "b");
        table.set(3_i64, "c");
        assert_eq!(table.sequence_len(), 0);
        table.set(1_i64, "a");
        assert_eq!(table.sequence_len(), 3);

        table.set(2_i64, Value::Nil);
        assert_eq!(table.sequence_len(), 1);
        table.push("again");
        assert_eq!(table.sequence_len(), 3);
        assert_eq!(table.get_index(2), Some(&Value::from("again")));
    }

    #[test]
    fn test_large_list() {
        let table = Table::from_list((0..20_000_i64).map(Value::from));
        assert_eq!(table.sequence_len(), 20_000);
        assert_eq!(table.sequence().count(), 20_000);
        assert_eq!(table.get_index(20_000), Some(&Value::Number(19_999.0)));
    }

    #[test]
    fn test_positional_sorted_by_index() {
        let table = Table::new()
            .with(3_i64, "c")
            .with("name", "x")
            .with(1_i64, "a");
        let indices: Vec<_> = table.positional().into_iter().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![1, 3]);
    }
}
