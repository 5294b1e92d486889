//! JSON configuration document addressed by dot paths

use std::fs;
use std::path::Path;

use cfgdeck_history::{ApplyDirection, ApplyError, ApplyInstruction, ApplyTarget, ConfigChange, ConfigPath};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

/// In-memory configuration document.
///
/// Paths are dot separated; object members are addressed by key and array
/// items by index (`characters.0.name`). User edits return the
/// [`ConfigChange`] they produced so the caller can hand it to the history.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigStore {
    root: Value,
}

impl ConfigStore {
    /// Create an empty document
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Wrap an existing document; the root must be an object
    pub fn from_value(root: Value) -> StoreResult<Self> {
        if !root.is_object() {
            return Err(StoreError::NotAnObject("<root>".to_string()));
        }
        Ok(Self { root })
    }

    /// Read a document from a JSON file
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let store = Self::from_value(serde_json::from_str(&raw)?)?;
        debug!(path = ?path.as_ref(), "Config document loaded");
        Ok(store)
    }

    /// Read a document, starting empty when the file does not exist
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            info!(path = ?path.as_ref(), "Config document not found, starting empty");
            Ok(Self::new())
        }
    }

    /// Write the document as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.root)?)?;
        debug!(path = ?path, "Config document saved");
        Ok(())
    }

    /// The whole document
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Value at `path`; an empty path is the whole document
    pub fn get(&self, path: impl Into<ConfigPath>) -> Option<&Value> {
        let path = path.into();
        let mut current = &self.root;
        for segment in path.segments() {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// True when a value exists at `path`
    pub fn contains(&self, path: impl Into<ConfigPath>) -> bool {
        self.get(path).is_some()
    }

    /// Write `value` at `path`, creating intermediate objects.
    ///
    /// Returns a `Modify` change when the field existed and an `Add` otherwise.
    pub fn set(&mut self, path: impl Into<ConfigPath>, value: Value) -> StoreResult<ConfigChange> {
        let path = path.into();
        let change = match self.write(&path, value.clone(), ItemWrite::Replace)? {
            Some(old) => ConfigChange::modify(path, Some(old), value),
            None => ConfigChange::add(path, value),
        };
        Ok(change)
    }

    /// Create a new field, failing if one already exists at `path`.
    ///
    /// An array index equal to the array length appends an item.
    pub fn insert(&mut self, path: impl Into<ConfigPath>, value: Value) -> StoreResult<ConfigChange> {
        let path = path.into();
        if self.get(path.clone()).is_some() {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        self.write(&path, value.clone(), ItemWrite::Insert)?;
        Ok(ConfigChange::add(path, value))
    }

    /// Remove the field at `path`
    pub fn remove(&mut self, path: impl Into<ConfigPath>) -> StoreResult<ConfigChange> {
        let path = path.into();
        let old = self.take(&path)?;
        Ok(ConfigChange::delete(path, old))
    }

    fn write(&mut self, path: &ConfigPath, value: Value, mode: ItemWrite) -> StoreResult<Option<Value>> {
        let (parents, last) = split(path)?;
        match container_mut(&mut self.root, &parents, path, true)? {
            Value::Object(map) => Ok(map.insert(last.to_string(), value)),
            Value::Array(items) => {
                let index = parse_index(last, path)?;
                match mode {
                    ItemWrite::Replace => {
                        let slot = items
                            .get_mut(index)
                            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
                        Ok(Some(std::mem::replace(slot, value)))
                    }
                    // Mirrors `take`, which shifts later items down
                    ItemWrite::Insert if index <= items.len() => {
                        items.insert(index, value);
                        Ok(None)
                    }
                    ItemWrite::Insert => Err(StoreError::NotFound(path.to_string())),
                }
            }
            _ => Err(StoreError::NotAnObject(path.to_string())),
        }
    }

    fn take(&mut self, path: &ConfigPath) -> StoreResult<Value> {
        let (parents, last) = split(path)?;
        match container_mut(&mut self.root, &parents, path, false)? {
            Value::Object(map) => map
                .remove(last)
                .ok_or_else(|| StoreError::NotFound(path.to_string())),
            Value::Array(items) => {
                let index = parse_index(last, path)?;
                if index < items.len() {
                    Ok(items.remove(index))
                } else {
                    Err(StoreError::NotFound(path.to_string()))
                }
            }
            _ => Err(StoreError::NotAnObject(path.to_string())),
        }
    }
}

/// How a write addressed to an array index treats the existing items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemWrite {
    Replace,
    Insert,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Replays history instructions without producing change notifications
impl ApplyTarget for ConfigStore {
    fn apply(
        &mut self,
        instruction: &ApplyInstruction,
        direction: ApplyDirection,
    ) -> Result<(), ApplyError> {
        let target = instruction.target();
        let result = match instruction {
            ApplyInstruction::Modify {
                value: Some(value), ..
            } => self
                .write(target, value.clone(), ItemWrite::Replace)
                .map(|_| ()),
            ApplyInstruction::Add { value, .. } => self
                .write(target, value.clone(), ItemWrite::Insert)
                .map(|_| ()),
            ApplyInstruction::Modify { value: None, .. } | ApplyInstruction::Delete { .. } => {
                self.take(target).map(|_| ())
            }
        };

        result.map_err(|e| {
            warn!(target_path = %target, ?direction, error = %e, "Store rejected instruction");
            ApplyError::new(target.clone(), e.to_string())
        })
    }
}

fn split(path: &ConfigPath) -> StoreResult<(Vec<&str>, &str)> {
    let mut segments: Vec<&str> = path.segments().collect();
    let last = segments
        .pop()
        .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
    Ok((segments, last))
}

fn parse_index(segment: &str, path: &ConfigPath) -> StoreResult<usize> {
    segment
        .parse()
        .map_err(|_| StoreError::InvalidPath(format!("{} (expected an array index, got '{}')", path, segment)))
}

/// Walk to the value holding the last segment of `path`
fn container_mut<'v>(
    root: &'v mut Value,
    parents: &[&str],
    path: &ConfigPath,
    create: bool,
) -> StoreResult<&'v mut Value> {
    let mut current = root;
    for segment in parents {
        current = match current {
            Value::Object(map) => {
                if create {
                    map.entry(segment.to_string())
                        .or_insert_with(|| Value::Object(Map::new()))
                } else {
                    map.get_mut(*segment)
                        .ok_or_else(|| StoreError::NotFound(path.to_string()))?
                }
            }
            Value::Array(items) => {
                let index = parse_index(segment, path)?;
                items
                    .get_mut(index)
                    .ok_or_else(|| StoreError::NotFound(path.to_string()))?
            }
            _ => return Err(StoreError::NotAnObject(path.to_string())),
        };
    }
    Ok(current)
}
