//! Key/value configuration store
//!
//! Thin abstraction over the platform's persistent configuration store. The
//! engine only ever talks to the `ConfigStore` trait; `DirStore` is the
//! portable filesystem-backed implementation (one directory per key, one
//! `values.json` per key) used by the CLI and the test suite. A native-API
//! backed implementation for a specific platform plugs in behind the same
//! trait without touching the engine.
//!
//! # Contract
//!
//! - `get` never errors on absence; a missing key or value is `Ok(None)`
//! - `set` creates every missing intermediate container along the key path
//! - privileged locations surface `PermissionDenied`, never a panic

// Library API - consumed by embedding front ends as well as the CLI
#![allow(dead_code)]

use crate::error::{Result, TweakError};
use crate::types::ConfigValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

/// File holding the values of one key inside its directory.
const VALUES_FILE: &str = "values.json";

/// Top-level root of the configuration store.
///
/// Generalizes over the kinds of locations the engine mutates: system-wide
/// settings, per-application settings, service definitions and boot flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StoreRoot {
    #[strum(serialize = "system")]
    System,
    #[strum(serialize = "software")]
    Software,
    #[strum(serialize = "services")]
    Services,
    #[strum(serialize = "boot")]
    Boot,
}

/// An addressable location in the store: root plus backslash-separated path.
///
/// Parses from strings like `system\Power\Throttling` (forward slashes are
/// accepted and normalized). Segment names are restricted to a conservative
/// character set so keys map cleanly onto artifact file names and store
/// directories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigKey {
    pub root: StoreRoot,
    pub path: String,
}

impl ConfigKey {
    /// Create a key from a root and a pre-normalized path.
    pub fn new(root: StoreRoot, path: impl Into<String>) -> Result<Self> {
        let path = normalize_path(&path.into())?;
        Ok(Self { root, path })
    }

    /// Path segments in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('\\').filter(|s| !s.is_empty())
    }

    /// Stable file-name stem for backup artifacts: root and segments joined
    /// with underscores, everything outside `[A-Za-z0-9._-]` replaced.
    ///
    /// Sanitization can collide for distinct keys; artifact *content* carries
    /// the real key and consumers re-check it before trusting a match.
    pub fn sanitized_stem(&self) -> String {
        let mut stem = self.root.to_string();
        for seg in self.segments() {
            stem.push('_');
            for c in seg.chars() {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    stem.push(c);
                } else {
                    stem.push('_');
                }
            }
        }
        stem
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.root)
        } else {
            write!(f, "{}\\{}", self.root, self.path)
        }
    }
}

impl FromStr for ConfigKey {
    type Err = TweakError;

    /// Parse `root\seg\seg` (or `root/seg/seg`).
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.replace('/', "\\");
        let mut parts = normalized.splitn(2, '\\');
        let root_str = parts.next().unwrap_or_default();
        let root = StoreRoot::from_str(root_str.trim())
            .map_err(|_| TweakError::store(format!("unknown store root '{}'", root_str)))?;
        let path = parts.next().unwrap_or_default();
        Self::new(root, path)
    }
}

fn normalize_path(raw: &str) -> Result<String> {
    let normalized = raw.replace('/', "\\");
    let mut segments = Vec::new();
    for seg in normalized.split('\\') {
        let seg = seg.trim();
        if seg.is_empty() {
            continue;
        }
        if seg == "." || seg == ".." {
            return Err(TweakError::store(format!(
                "invalid key path segment '{}'",
                seg
            )));
        }
        if !seg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
        {
            return Err(TweakError::store(format!(
                "key path segment '{}' contains unsupported characters",
                seg
            )));
        }
        segments.push(seg);
    }
    Ok(segments.join("\\"))
}

/// Recursive snapshot of a key's subtree: its values and all child keys.
///
/// This is the unit of backup and restore. It is fully self-contained and
/// serializes to plain JSON.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeySubtree {
    #[serde(default)]
    pub values: BTreeMap<String, ConfigValue>,
    #[serde(default)]
    pub children: BTreeMap<String, KeySubtree>,
}

impl KeySubtree {
    /// Total number of values in this subtree, children included.
    pub fn value_count(&self) -> usize {
        self.values.len()
            + self
                .children
                .values()
                .map(KeySubtree::value_count)
                .sum::<usize>()
    }
}

/// Abstraction over the platform configuration store.
///
/// Implementations are shared behind `Arc` across the engine components,
/// hence the `Send + Sync` bound.
pub trait ConfigStore: Send + Sync {
    /// Read one value. Absence is `Ok(None)`, never an error.
    fn get(&self, key: &ConfigKey, name: &str) -> Result<Option<ConfigValue>>;

    /// Write one value, creating missing intermediate containers.
    fn set(&self, key: &ConfigKey, name: &str, value: ConfigValue) -> Result<()>;

    /// Remove one value. Returns whether it existed.
    fn remove(&self, key: &ConfigKey, name: &str) -> Result<bool>;

    /// Whether the key itself exists.
    fn exists(&self, key: &ConfigKey) -> bool;

    /// Export the full subtree at `key`, or `None` if the key is absent.
    /// Never creates the key.
    fn export_subtree(&self, key: &ConfigKey) -> Result<Option<KeySubtree>>;

    /// Replace the subtree at `key` wholesale with `tree`.
    fn import_subtree(&self, key: &ConfigKey, tree: &KeySubtree) -> Result<()>;

    /// Remove the key and everything below it. Absent key is a no-op.
    fn remove_tree(&self, key: &ConfigKey) -> Result<()>;
}

/// Filesystem-backed store: each key is a directory, each key's values live
/// in a `values.json` next to its child key directories.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Open (and create if missing) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| map_io(e, &root))?;
        Ok(Self { root })
    }

    /// Directory that backs `key`.
    fn key_dir(&self, key: &ConfigKey) -> PathBuf {
        let mut dir = self.root.join(key.root.to_string());
        for seg in key.segments() {
            dir.push(seg);
        }
        dir
    }

    fn read_values(&self, dir: &Path) -> Result<BTreeMap<String, ConfigValue>> {
        let file = dir.join(VALUES_FILE);
        match fs::read_to_string(&file) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                TweakError::store(format!("corrupt values file {}: {}", file.display(), e))
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(map_io(e, &file)),
        }
    }

    fn write_values(&self, dir: &Path, values: &BTreeMap<String, ConfigValue>) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| map_io(e, dir))?;
        let file = dir.join(VALUES_FILE);
        let json = serde_json::to_string_pretty(values)?;
        fs::write(&file, json).map_err(|e| map_io(e, &file))
    }

    fn export_dir(&self, dir: &Path) -> Result<KeySubtree> {
        let mut tree = KeySubtree {
            values: self.read_values(dir)?,
            children: BTreeMap::new(),
        };
        let entries = fs::read_dir(dir).map_err(|e| map_io(e, dir))?;
        for entry in entries {
            let entry = entry.map_err(|e| map_io(e, dir))?;
            let path = entry.path();
            if path.is_dir() {
                let name = entry.file_name().to_string_lossy().to_string();
                tree.children.insert(name, self.export_dir(&path)?);
            }
        }
        Ok(tree)
    }

    fn import_dir(&self, dir: &Path, tree: &KeySubtree) -> Result<()> {
        self.write_values(dir, &tree.values)?;
        for (name, child) in &tree.children {
            self.import_dir(&dir.join(name), child)?;
        }
        Ok(())
    }
}

impl ConfigStore for DirStore {
    fn get(&self, key: &ConfigKey, name: &str) -> Result<Option<ConfigValue>> {
        let dir = self.key_dir(key);
        if !dir.is_dir() {
            log::trace!("get {}\\{}: key absent", key, name);
            return Ok(None);
        }
        let values = self.read_values(&dir)?;
        let found = values.get(name).cloned();
        if found.is_none() {
            log::trace!("get {}\\{}: value absent", key, name);
        }
        Ok(found)
    }

    fn set(&self, key: &ConfigKey, name: &str, value: ConfigValue) -> Result<()> {
        let dir = self.key_dir(key);
        let mut values = if dir.is_dir() {
            self.read_values(&dir)?
        } else {
            BTreeMap::new()
        };
        values.insert(name.to_string(), value);
        self.write_values(&dir, &values)
    }

    fn remove(&self, key: &ConfigKey, name: &str) -> Result<bool> {
        let dir = self.key_dir(key);
        if !dir.is_dir() {
            return Ok(false);
        }
        let mut values = self.read_values(&dir)?;
        if values.remove(name).is_none() {
            return Ok(false);
        }
        self.write_values(&dir, &values)?;
        Ok(true)
    }

    fn exists(&self, key: &ConfigKey) -> bool {
        self.key_dir(key).is_dir()
    }

    fn export_subtree(&self, key: &ConfigKey) -> Result<Option<KeySubtree>> {
        let dir = self.key_dir(key);
        if !dir.is_dir() {
            return Ok(None);
        }
        self.export_dir(&dir).map(Some)
    }

    fn import_subtree(&self, key: &ConfigKey, tree: &KeySubtree) -> Result<()> {
        // Wholesale replacement: values written after the snapshot was taken
        // are dropped along with it. Coarse, but it is what makes restore
        // idempotent.
        self.remove_tree(key)?;
        self.import_dir(&self.key_dir(key), tree)
    }

    fn remove_tree(&self, key: &ConfigKey) -> Result<()> {
        let dir = self.key_dir(key);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io(e, &dir)),
        }
    }
}

fn map_io(e: io::Error, path: &Path) -> TweakError {
    if e.kind() == io::ErrorKind::PermissionDenied {
        TweakError::permission(format!("{}", path.display()))
    } else {
        TweakError::Io(e)
    }
}
