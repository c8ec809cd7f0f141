//! Comment-preserving configuration tree.
//!
//! [`ConfigTree`] wraps a `toml_edit` document so that comments, key order and
//! keys this crate knows nothing about survive a load → modify → save cycle.
//! Leaves are either scalar strings or ordered lists of strings; sections may
//! nest to any depth and are addressed with a dotted [`KeyPath`].

use std::fmt;
use std::str::FromStr;

use toml_edit::{Array, DocumentMut, Item, Key, Table, TableLike, Value};

/// Dotted path to a section or key, e.g. `StdReport.Defaults.unit_system`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    /// Build a path from individual segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The empty path, naming the top level of the tree.
    pub fn root() -> Self {
        KeyPath(Vec::new())
    }

    /// Path segments, outermost section first.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Final segment (the key name).
    pub fn leaf(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }

    /// Path with `key` appended.
    pub fn child(&self, key: &str) -> KeyPath {
        let mut segments = self.0.clone();
        segments.push(key.to_string());
        KeyPath(segments)
    }

    /// Path of the enclosing section.
    pub fn parent(&self) -> KeyPath {
        let mut segments = self.0.clone();
        segments.pop();
        KeyPath(segments)
    }

    fn split_last(&self) -> Option<(&String, &[String])> {
        self.0.split_last()
    }
}

impl From<&str> for KeyPath {
    fn from(path: &str) -> Self {
        KeyPath(
            path.split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// A leaf value in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeValue {
    /// Single string value.
    Scalar(String),
    /// Ordered sequence of strings.
    List(Vec<String>),
}

impl TreeValue {
    /// Convenience constructor for scalars.
    pub fn scalar(value: impl Into<String>) -> Self {
        TreeValue::Scalar(value.into())
    }

    fn to_value(&self) -> Value {
        match self {
            TreeValue::Scalar(s) => Value::from(s.as_str()),
            TreeValue::List(items) => {
                let mut array = Array::new();
                for item in items {
                    array.push(item.as_str());
                }
                Value::Array(array)
            }
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(TreeValue::Scalar(s.value().clone())),
            Value::Integer(i) => Some(TreeValue::Scalar(i.value().to_string())),
            Value::Float(f) => Some(TreeValue::Scalar(f.value().to_string())),
            Value::Boolean(b) => Some(TreeValue::Scalar(b.value().to_string())),
            Value::Array(array) => Some(TreeValue::List(
                array
                    .iter()
                    .filter_map(|v| match TreeValue::from_value(v)? {
                        TreeValue::Scalar(s) => Some(s),
                        TreeValue::List(_) => None,
                    })
                    .collect(),
            )),
            Value::Datetime(_) | Value::InlineTable(_) => None,
        }
    }
}

impl fmt::Display for TreeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeValue::Scalar(s) => write!(f, "{}", s),
            TreeValue::List(items) => write!(f, "{}", items.join(", ")),
        }
    }
}

/// Ordered, comment-preserving configuration tree.
#[derive(Debug, Clone, Default)]
pub struct ConfigTree {
    doc: DocumentMut,
}

impl ConfigTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a leaf value.
    pub fn get(&self, path: &KeyPath) -> Option<TreeValue> {
        match self.item(path)? {
            Item::Value(value) => TreeValue::from_value(value),
            _ => None,
        }
    }

    /// Get a scalar leaf as a string.
    pub fn get_str(&self, path: &KeyPath) -> Option<String> {
        match self.get(path)? {
            TreeValue::Scalar(s) => Some(s),
            TreeValue::List(_) => None,
        }
    }

    /// Whether a leaf exists at `path`.
    pub fn contains(&self, path: &KeyPath) -> bool {
        matches!(self.item(path), Some(Item::Value(_)))
    }

    /// Whether a section exists at `path`.
    pub fn has_section(&self, path: &KeyPath) -> bool {
        if path.segments().is_empty() {
            return true;
        }
        self.item(path).and_then(Item::as_table_like).is_some()
    }

    /// Set a leaf value, creating any missing sections on the way.
    ///
    /// Replacing an existing leaf keeps its key comment and trailing comment.
    /// Parents written as inline tables stay inline and keep their other keys.
    pub fn set(&mut self, path: &KeyPath, value: TreeValue) {
        let Some((leaf, parents)) = path.split_last() else {
            return;
        };
        let Some(table) = self.section_mut_or_create(parents) else {
            return;
        };
        let mut new_value = value.to_value();

        match table.get_mut(leaf) {
            Some(Item::Value(existing)) => {
                *new_value.decor_mut() = existing.decor().clone();
                *existing = new_value;
            }
            Some(item) => *item = Item::Value(new_value),
            None => {
                table.insert(leaf, Item::Value(new_value));
            }
        }
        tracing::debug!(key = %path, "set configuration value");
    }

    /// Set a leaf only if nothing is stored there yet. Returns whether it was set.
    pub fn set_default(&mut self, path: &KeyPath, value: TreeValue) -> bool {
        if self.contains(path) {
            return false;
        }
        self.set(path, value);
        true
    }

    /// Remove a leaf, returning its value.
    pub fn remove(&mut self, path: &KeyPath) -> Option<TreeValue> {
        let (leaf, parents) = path.split_last()?;
        let table = self.section_mut(parents)?;
        if !matches!(table.get(leaf), Some(Item::Value(_))) {
            return None;
        }
        let removed = table.remove(leaf)?;
        tracing::debug!(key = %path, "removed configuration value");
        removed.as_value().and_then(TreeValue::from_value)
    }

    /// Remove a whole section. Returns whether anything was removed.
    pub fn remove_section(&mut self, path: &KeyPath) -> bool {
        let Some((leaf, parents)) = path.split_last() else {
            return false;
        };
        let Some(table) = self.section_mut(parents) else {
            return false;
        };
        if !matches!(table.get(leaf), Some(item) if item.is_table_like()) {
            return false;
        }
        table.remove(leaf).is_some()
    }

    /// Rename a key or section in place, keeping its position and comment.
    ///
    /// If `new_name` already exists in the same section, the old entry is
    /// dropped instead and the existing one wins. Returns whether the tree
    /// changed.
    pub fn rename(&mut self, path: &KeyPath, new_name: &str) -> bool {
        let Some((leaf, parents)) = path.split_last() else {
            return false;
        };
        let Some(table) = self.section_mut(parents) else {
            return false;
        };
        if !table.contains_key(leaf) {
            return false;
        }
        if table.contains_key(new_name) {
            table.remove(leaf);
            return true;
        }

        // Entries are re-inserted in order; clearing keeps the section's own
        // header, position and decor.
        let entries: Vec<(Key, Item)> = table
            .iter()
            .filter_map(|(k, _)| table.get_key_value(k))
            .map(|(key, item)| (key.clone(), item.clone()))
            .collect();
        table.clear();
        for (key, item) in entries {
            let key = if key.get() == leaf.as_str() {
                Key::new(new_name).with_leaf_decor(key.leaf_decor().clone())
            } else {
                key
            };
            insert_formatted(table, &key, item);
        }
        tracing::debug!(from = %path, to = new_name, "renamed configuration key");
        true
    }

    /// Move a leaf to another path, carrying its comment along.
    ///
    /// An existing value at the destination is kept and the source is
    /// dropped. Returns whether the source existed.
    pub fn move_value(&mut self, from: &KeyPath, to: &KeyPath) -> bool {
        let comment = self.comment(from);
        let Some(value) = self.remove(from) else {
            return false;
        };
        if self.set_default(to, value) {
            if let Some(comment) = comment {
                self.set_comment(to, &comment);
            }
        }
        tracing::debug!(from = %from, to = %to, "moved configuration value");
        true
    }

    /// Comment attached above a key or section header, without `#` markers.
    pub fn comment(&self, path: &KeyPath) -> Option<String> {
        let (leaf, parents) = path.split_last()?;
        let table = self.section(parents)?;
        let (key, item) = table.get_key_value(leaf)?;
        let prefix = match item {
            Item::Table(section) => section.decor().prefix(),
            _ => key.leaf_decor().prefix(),
        }?;
        strip_comment(prefix.as_str()?)
    }

    /// Attach a comment above a key or section header.
    ///
    /// Keys inside inline tables cannot carry comments and are left alone.
    pub fn set_comment(&mut self, path: &KeyPath, text: &str) {
        let Some((leaf, parents)) = path.split_last() else {
            return;
        };
        let parent_is_inline = self
            .item(&path.parent())
            .is_some_and(Item::is_inline_table);
        let Some(table) = self.section_mut(parents) else {
            return;
        };
        let rendered = render_comment(text);
        if let Some(Item::Table(section)) = table.get_mut(leaf) {
            section.decor_mut().set_prefix(format!("\n{}", rendered));
        } else if matches!(table.get(leaf), Some(Item::Value(_))) && !parent_is_inline {
            if let Some(mut key) = table.key_mut(leaf) {
                key.leaf_decor_mut().set_prefix(rendered);
            }
        }
    }

    /// Paths of every leaf in document order.
    pub fn leaf_paths(&self) -> Vec<KeyPath> {
        let mut paths = Vec::new();
        collect_leaves(self.doc.as_table(), &KeyPath::root(), &mut paths);
        paths
    }

    /// Names of the direct children of a section that are themselves sections.
    pub fn section_names(&self, path: &KeyPath) -> Vec<String> {
        let table: Option<&dyn TableLike> = if path.segments().is_empty() {
            Some(self.doc.as_table())
        } else {
            self.item(path).and_then(Item::as_table_like)
        };
        table
            .map(|t| {
                t.iter()
                    .filter(|(_, item)| item.is_table_like())
                    .map(|(k, _)| k.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Names of the direct leaf keys of a section.
    pub fn keys(&self, path: &KeyPath) -> Vec<String> {
        let table: Option<&dyn TableLike> = if path.segments().is_empty() {
            Some(self.doc.as_table())
        } else {
            self.item(path).and_then(Item::as_table_like)
        };
        table
            .map(|t| {
                t.iter()
                    .filter(|(_, item)| item.is_value())
                    .map(|(k, _)| k.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Deep overlay: returns a tree where `upper` wins on every key it holds
    /// and anything only present in `self` is filled in.
    ///
    /// The result keeps `upper`'s formatting and order; keys taken from
    /// `self` are appended at the end of their section.
    pub fn overlay(&self, upper: &ConfigTree) -> ConfigTree {
        let mut merged = upper.clone();
        fill_missing(merged.doc.as_item_mut(), self.doc.as_table());
        merged
    }

    fn item(&self, path: &KeyPath) -> Option<&Item> {
        let (leaf, parents) = path.split_last()?;
        let mut table: &dyn TableLike = self.doc.as_table();
        for segment in parents {
            table = table.get(segment)?.as_table_like()?;
        }
        table.get(leaf)
    }

    fn section(&self, segments: &[String]) -> Option<&dyn TableLike> {
        let mut table: &dyn TableLike = self.doc.as_table();
        for segment in segments {
            table = table.get(segment)?.as_table_like()?;
        }
        Some(table)
    }

    fn section_mut(&mut self, segments: &[String]) -> Option<&mut dyn TableLike> {
        let mut table: &mut dyn TableLike = self.doc.as_table_mut();
        for segment in segments {
            table = table.get_mut(segment)?.as_table_like_mut()?;
        }
        Some(table)
    }

    /// Walk to a section, creating missing ones as implicit tables.
    ///
    /// Existing inline tables are walked into rather than replaced. A leaf
    /// standing where a section is needed gives way to a new section.
    fn section_mut_or_create(&mut self, segments: &[String]) -> Option<&mut dyn TableLike> {
        let mut table: &mut dyn TableLike = self.doc.as_table_mut();
        for segment in segments {
            if !table.get(segment).is_some_and(Item::is_table_like) {
                let mut section = Table::new();
                section.set_implicit(true);
                // An inline parent turns this into an inline table.
                table.insert(segment, Item::Table(section));
            }
            table = table.get_mut(segment)?.as_table_like_mut()?;
        }
        Some(table)
    }
}

impl FromStr for ConfigTree {
    type Err = toml_edit::TomlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { doc: s.parse()? })
    }
}

impl fmt::Display for ConfigTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.doc)
    }
}

fn fill_missing(target: &mut Item, source: &dyn TableLike) {
    let inline = target.is_inline_table();
    let Some(table) = target.as_table_like_mut() else {
        return;
    };
    for (key, item) in source.iter() {
        if let Some(existing) = table.get_mut(key) {
            if let Some(source_section) = item.as_table_like() {
                fill_missing(existing, source_section);
            }
            continue;
        }
        if inline {
            if let Some(value) = inline_value(detach(item)) {
                table.insert(key, Item::Value(value));
            }
        } else if let Some((formatted_key, _)) = source.get_key_value(key) {
            insert_formatted(table, formatted_key, detach(item));
        }
    }
}

/// Insert `item` under `key` with the key's own formatting.
fn insert_formatted(table: &mut dyn TableLike, key: &Key, item: Item) {
    table.insert(key.get(), item);
    if let Some(mut inserted) = table.key_mut(key.get()) {
        *inserted.leaf_decor_mut() = key.leaf_decor().clone();
        *inserted.dotted_decor_mut() = key.dotted_decor().clone();
    }
}

/// Convert an item for use inside an inline table, which holds single-line
/// values without comments.
fn inline_value(item: Item) -> Option<Value> {
    let mut value = item.into_value().ok()?;
    match &mut value {
        Value::Array(array) => array.fmt(),
        Value::InlineTable(table) => table.fmt(),
        _ => {}
    }
    value.decor_mut().clear();
    Some(value)
}

/// Copy an item without the document position of its tables, so it sorts
/// after whatever precedes it in the destination document.
fn detach(item: &Item) -> Item {
    match item {
        Item::Table(source) => {
            let mut table = Table::new();
            *table.decor_mut() = source.decor().clone();
            table.set_implicit(source.is_implicit());
            table.set_dotted(source.is_dotted());
            for (key, child) in source.iter() {
                if let Some((formatted_key, _)) = source.get_key_value(key) {
                    table.insert_formatted(formatted_key, detach(child));
                }
            }
            Item::Table(table)
        }
        other => other.clone(),
    }
}

fn collect_leaves(table: &dyn TableLike, prefix: &KeyPath, out: &mut Vec<KeyPath>) {
    for (key, item) in table.iter() {
        let path = prefix.child(key);
        match item.as_table_like() {
            Some(section) => collect_leaves(section, &path, out),
            None => out.push(path),
        }
    }
}

fn strip_comment(raw: &str) -> Option<String> {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim())
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn render_comment(text: &str) -> String {
    text.lines().map(|line| format!("# {}\n", line)).collect()
}
