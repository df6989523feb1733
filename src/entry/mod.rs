//! Bibliographic entries.
//!
//! A [`BibEntry`] is a typed record of string fields identified by an opaque id
//! that is distinct from its citation key. The citation key lives in the field
//! map under [`KEY_FIELD`]. The id can only change through the rename protocol:
//! the entry proposes the change to a [`RenameGuard`] (normally the
//! [`BibDatabase`](crate::BibDatabase) that owns it) which may veto it.

pub mod types;
mod write;

use crate::error::{EntryError, RenameError};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub use types::{EntryType, EntryTypeSchema, EntryTypes};
pub use write::{BraceFormatter, FieldFormatter, WriterConfig};

/// Field holding the citation key.
pub const KEY_FIELD: &str = "bibtexkey";

/// Reserved name under which the entry id would be addressed; never a regular field.
pub const ID_FIELD: &str = "__id";

/// Source of process-unique entry and string ids.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Process-wide counter shared by every parser that uses the default generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessIds;

impl IdGenerator for ProcessIds {
    fn next_id(&self) -> String {
        NEXT_ID.fetch_add(1, Ordering::Relaxed).to_string()
    }
}

/// Arbiter of entry id changes.
pub trait RenameGuard {
    /// Accept or veto renaming `entry` from `old_id` to `new_id`.
    fn try_rename_entry(
        &self,
        entry: &BibEntry,
        old_id: &str,
        new_id: &str,
    ) -> Result<(), RenameError>;
}

/// Guard for entries not owned by any database; accepts every rename.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl RenameGuard for Detached {
    fn try_rename_entry(&self, _: &BibEntry, _: &str, _: &str) -> Result<(), RenameError> {
        Ok(())
    }
}

/// A single bibliographic record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BibEntry {
    id: String,
    entry_type: Arc<EntryType>,
    fields: HashMap<CompactString, String>,
}

impl BibEntry {
    /// Create an entry with no fields.
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::NullId`] when `id` is empty.
    pub fn new(id: impl Into<String>, entry_type: Arc<EntryType>) -> Result<Self, EntryError> {
        let id = id.into();
        if id.is_empty() {
            return Err(EntryError::NullId);
        }
        Ok(Self {
            id,
            entry_type,
            fields: HashMap::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn entry_type(&self) -> &Arc<EntryType> {
        &self.entry_type
    }

    pub fn set_entry_type(&mut self, entry_type: Arc<EntryType>) {
        self.entry_type = entry_type;
    }

    /// Value of `name`, if set.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Set a field value.
    ///
    /// Writes to the citation key through this method bypass a database's key
    /// counts; use [`BibDatabase::set_field`](crate::BibDatabase::set_field) on
    /// stored entries.
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::ReservedField`] for [`ID_FIELD`].
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) -> Result<(), EntryError> {
        if name == ID_FIELD {
            return Err(EntryError::ReservedField(name.to_string()));
        }
        self.put_field(name, value.into());
        Ok(())
    }

    /// Remove a field, returning its previous value.
    ///
    /// # Errors
    ///
    /// Returns [`EntryError::ReservedField`] for [`ID_FIELD`].
    pub fn clear_field(&mut self, name: &str) -> Result<Option<String>, EntryError> {
        if name == ID_FIELD {
            return Err(EntryError::ReservedField(name.to_string()));
        }
        Ok(self.fields.remove(name))
    }

    pub(crate) fn put_field(&mut self, name: &str, value: String) {
        self.fields.insert(CompactString::from(name), value);
    }

    pub(crate) fn remove_field(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    /// Change the id, subject to `guard`'s approval.
    ///
    /// # Errors
    ///
    /// [`EntryError::NullId`] for an empty id; [`EntryError::KeyCollision`]
    /// when the guard vetoes. The id is unchanged on error.
    pub fn set_id(&mut self, new_id: &str, guard: &dyn RenameGuard) -> Result<(), EntryError> {
        if new_id.is_empty() {
            return Err(EntryError::NullId);
        }
        guard.try_rename_entry(self, &self.id, new_id)?;
        self.id = new_id.to_string();
        Ok(())
    }

    pub(crate) fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    /// The citation key, if one is set.
    pub fn cite_key(&self) -> Option<&str> {
        self.field(KEY_FIELD)
    }

    /// Names of all set fields, sorted.
    pub fn field_names(&self) -> BTreeSet<&str> {
        self.fields.keys().map(CompactString::as_str).collect()
    }

    /// Iterate over `(name, value)` pairs in no particular order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether every field the entry type requires is set.
    pub fn has_all_required_fields(&self) -> bool {
        self.entry_type
            .required_fields()
            .iter()
            .all(|f| self.fields.contains_key(f.as_str()))
    }

    /// Short `author: title (year)` description, each part truncated to `max_chars`.
    pub fn author_title_year(&self, max_chars: usize) -> String {
        let part = |name: &str| match self.field(name) {
            None => "N/A".to_string(),
            Some(v) if v.chars().count() > max_chars => {
                let mut cut: String = v.chars().take(max_chars).collect();
                cut.push_str("...");
                cut
            }
            Some(v) => v.to_string(),
        };
        format!("{}: {} ({})", part("author"), part("title"), part("year"))
    }
}
