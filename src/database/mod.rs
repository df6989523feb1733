//! In-memory bibliographic database.
//!
//! [`BibDatabase`] stores entries by id, counts how many entries carry each
//! citation key, and keeps the `@string` table and preamble of a BibTeX file.
//!
//! # Example
//!
//! ```
//! use bibstore::{BibDatabase, BibEntry, EntryType, KEY_FIELD};
//!
//! let mut db = BibDatabase::new();
//! let mut entry = BibEntry::new("e1", EntryType::other()).unwrap();
//! entry.set_field(KEY_FIELD, "doe2001").unwrap();
//!
//! let duplicate = db.insert_entry(entry).unwrap();
//! assert!(!duplicate);
//! assert_eq!(db.number_of_key_occurrences("doe2001"), 1);
//! ```

mod keys;
mod sorter;
mod strings;

use crate::entry::{BibEntry, EntryType, KEY_FIELD, RenameGuard};
use crate::error::{EntryError, KeyCollision, RenameError};
use keys::KeyCounts;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use strings::StringTable;
use tracing::{debug, warn};

pub use sorter::EntrySorter;
pub use strings::BibString;

/// Change notifications delivered to [`DatabaseListener`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DatabaseEvent {
    EntryAdded { id: String },
    EntryRemoved { id: String },
    EntryChanged { id: String, field: String },
    EntryRenamed { old_id: String, new_id: String },
    DuplicateKey { key: String },
}

/// Observer of database changes.
pub trait DatabaseListener: Send + Sync {
    fn database_changed(&self, event: &DatabaseEvent);
}

/// Entries, citation key counts, string definitions and preamble of one BibTeX file.
#[derive(Default)]
pub struct BibDatabase {
    entries: HashMap<String, BibEntry>,
    /// Entry ids in insertion order.
    order: Vec<String>,
    keys: KeyCounts,
    strings: StringTable,
    preamble: Option<String>,
    listeners: Vec<Arc<dyn DatabaseListener>>,
    revision: u64,
}

impl fmt::Debug for BibDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BibDatabase")
            .field("entries", &self.entries.len())
            .field("strings", &self.strings.len())
            .field("preamble", &self.preamble)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl BibDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter bumped by every change to the entry set or to an entry.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn fire(&self, event: DatabaseEvent) {
        for listener in &self.listeners {
            listener.database_changed(&event);
        }
    }

    pub fn add_listener(&mut self, listener: Arc<dyn DatabaseListener>) {
        self.listeners.push(listener);
    }

    /// Detach a listener previously added with [`BibDatabase::add_listener`].
    pub fn remove_listener(&mut self, listener: &Arc<dyn DatabaseListener>) {
        self.listeners.retain(|l| !Arc::ptr_eq(l, listener));
    }

    // Entries

    /// Store an entry under its id.
    ///
    /// Returns whether the entry's citation key was already carried by another
    /// entry.
    ///
    /// # Errors
    ///
    /// [`KeyCollision::DuplicateEntryId`] when the id is taken; the database is
    /// left unchanged.
    pub fn insert_entry(&mut self, entry: BibEntry) -> Result<bool, KeyCollision> {
        if self.entries.contains_key(entry.id()) {
            return Err(KeyCollision::DuplicateEntryId(entry.id().to_string()));
        }
        let id = entry.id().to_string();
        let key = entry.cite_key().map(str::to_string);
        self.entries.insert(id.clone(), entry);
        self.order.push(id.clone());
        self.touch();
        self.fire(DatabaseEvent::EntryAdded { id });
        Ok(self.check_for_duplicate_key_and_add(None, key.as_deref(), false))
    }

    /// Remove and return the entry stored under `id`.
    pub fn remove_entry(&mut self, id: &str) -> Option<BibEntry> {
        let entry = self.entries.remove(id)?;
        self.order.retain(|o| o != id);
        self.keys.remove(entry.cite_key());
        self.touch();
        self.fire(DatabaseEvent::EntryRemoved { id: id.to_string() });
        Some(entry)
    }

    pub fn entry_by_id(&self, id: &str) -> Option<&BibEntry> {
        self.entries.get(id)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Entry ids in insertion order.
    pub fn key_set(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = &BibEntry> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// First entry, in insertion order, carrying citation key `key`.
    pub fn entry_by_key(&self, key: &str) -> Option<&BibEntry> {
        self.entries().find(|e| e.cite_key() == Some(key))
    }

    pub fn entries_by_key(&self, key: &str) -> Vec<&BibEntry> {
        self.entries().filter(|e| e.cite_key() == Some(key)).collect()
    }

    pub fn number_of_key_occurrences(&self, key: &str) -> usize {
        self.keys.count(key)
    }

    /// Set or clear (`None`) the citation key of a stored entry. An empty key
    /// clears it.
    ///
    /// Returns `false` for an unknown id, otherwise whether the new key is a
    /// duplicate.
    pub fn set_cite_key_for_entry(&mut self, id: &str, key: Option<&str>) -> bool {
        self.update_cite_key(id, key, false)
    }

    fn update_cite_key(&mut self, id: &str, key: Option<&str>, issue_warning: bool) -> bool {
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        let key = key.filter(|k| !k.is_empty());
        let old_key = entry.cite_key().map(str::to_string);
        match key {
            Some(key) => entry.put_field(KEY_FIELD, key.to_string()),
            None => {
                entry.remove_field(KEY_FIELD);
            }
        }
        self.touch();
        self.fire(DatabaseEvent::EntryChanged {
            id: id.to_string(),
            field: KEY_FIELD.to_string(),
        });
        self.check_for_duplicate_key_and_add(old_key.as_deref(), key, issue_warning)
    }

    /// Move one key count from `old_key` to `new_key`.
    ///
    /// Returns whether `new_key` was already in use. With `issue_warning` a
    /// duplicate is logged and announced to listeners; it is never refused.
    fn check_for_duplicate_key_and_add(
        &mut self,
        old_key: Option<&str>,
        new_key: Option<&str>,
        issue_warning: bool,
    ) -> bool {
        let duplicate = self.keys.replace(old_key, new_key);
        if duplicate
            && issue_warning
            && let Some(key) = new_key
        {
            warn!(key, "duplicate citation key");
            self.fire(DatabaseEvent::DuplicateKey {
                key: key.to_string(),
            });
        }
        duplicate
    }

    /// Set a field of a stored entry.
    ///
    /// Citation key writes keep key counts exact, and a duplicate key is
    /// announced to listeners as [`DatabaseEvent::DuplicateKey`].
    ///
    /// # Errors
    ///
    /// [`EntryError::UnknownEntry`] for an unknown id, or the entry's own
    /// rejection of the field name.
    pub fn set_field(&mut self, id: &str, name: &str, value: &str) -> Result<(), EntryError> {
        if name == KEY_FIELD {
            return self.set_key_field(id, Some(value));
        }
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| EntryError::UnknownEntry(id.to_string()))?;
        entry.set_field(name, value)?;
        self.touch();
        self.fire(DatabaseEvent::EntryChanged {
            id: id.to_string(),
            field: name.to_string(),
        });
        Ok(())
    }

    /// Clear a field of a stored entry, returning its previous value.
    pub fn clear_field(&mut self, id: &str, name: &str) -> Result<Option<String>, EntryError> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| EntryError::UnknownEntry(id.to_string()))?;
        if name == KEY_FIELD {
            let old = entry.cite_key().map(str::to_string);
            self.set_key_field(id, None)?;
            return Ok(old);
        }
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| EntryError::UnknownEntry(id.to_string()))?;
        let old = entry.clear_field(name)?;
        self.touch();
        self.fire(DatabaseEvent::EntryChanged {
            id: id.to_string(),
            field: name.to_string(),
        });
        Ok(old)
    }

    fn set_key_field(&mut self, id: &str, key: Option<&str>) -> Result<(), EntryError> {
        if !self.entries.contains_key(id) {
            return Err(EntryError::UnknownEntry(id.to_string()));
        }
        self.update_cite_key(id, key, true);
        Ok(())
    }

    /// Replace the type of a stored entry. Returns `false` for an unknown id.
    pub fn set_entry_type(&mut self, id: &str, entry_type: Arc<EntryType>) -> bool {
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        entry.set_entry_type(entry_type);
        self.touch();
        self.fire(DatabaseEvent::EntryChanged {
            id: id.to_string(),
            field: "entrytype".to_string(),
        });
        true
    }

    /// Change the id of a stored entry.
    ///
    /// The change is validated as a [`RenameGuard`] first and the entry is only
    /// re-filed once accepted.
    ///
    /// # Errors
    ///
    /// [`EntryError::NullId`], [`EntryError::UnknownEntry`], or
    /// [`EntryError::KeyCollision`] when the new id is taken.
    pub fn rename_entry(&mut self, old_id: &str, new_id: &str) -> Result<(), EntryError> {
        if new_id.is_empty() {
            return Err(EntryError::NullId);
        }
        let entry = self
            .entries
            .get(old_id)
            .ok_or_else(|| EntryError::UnknownEntry(old_id.to_string()))?;
        self.try_rename_entry(entry, old_id, new_id)?;

        let mut entry = self
            .entries
            .remove(old_id)
            .ok_or_else(|| EntryError::UnknownEntry(old_id.to_string()))?;
        entry.assign_id(new_id.to_string());
        self.entries.insert(new_id.to_string(), entry);
        if let Some(slot) = self.order.iter_mut().find(|id| id.as_str() == old_id) {
            *slot = new_id.to_string();
        }
        self.touch();
        self.fire(DatabaseEvent::EntryRenamed {
            old_id: old_id.to_string(),
            new_id: new_id.to_string(),
        });
        Ok(())
    }

    /// Ordered view of the entries under `compare`, kept current across mutations.
    pub fn sorter<F>(&self, compare: F) -> EntrySorter<F>
    where
        F: Fn(&BibEntry, &BibEntry) -> Ordering,
    {
        let mut sorter = EntrySorter::new(compare);
        sorter.refresh(self);
        sorter
    }

    // Strings

    /// Add a string definition.
    ///
    /// # Errors
    ///
    /// [`KeyCollision::DuplicateStringName`] if the name is taken (case-sensitive),
    /// [`KeyCollision::DuplicateStringId`] if the id is.
    pub fn add_string(&mut self, string: BibString) -> Result<(), KeyCollision> {
        debug!(name = %string.name, "adding string");
        self.strings.add(string)
    }

    pub fn remove_string(&mut self, id: &str) -> Option<BibString> {
        self.strings.remove(id)
    }

    pub fn string(&self, id: &str) -> Option<&BibString> {
        self.strings.get(id)
    }

    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    pub fn has_string_label(&self, name: &str) -> bool {
        self.strings.has_label(name)
    }

    /// String definitions in insertion order.
    pub fn strings(&self) -> impl Iterator<Item = &BibString> {
        self.strings.iter()
    }

    /// Content of the string named `label` (case-insensitive), with nested
    /// references resolved. Falls back to the standard month macros.
    pub fn resolve_string(&self, label: &str) -> Option<String> {
        self.strings.resolve_label(label, &mut HashSet::new())
    }

    /// Replace every `#label#` reference in `content`.
    pub fn resolve_for_strings(&self, content: &str) -> String {
        self.strings.resolve_content(content, &mut HashSet::new())
    }

    // Preamble

    pub fn set_preamble(&mut self, preamble: Option<String>) {
        self.preamble = preamble;
    }

    pub fn preamble(&self) -> Option<&str> {
        self.preamble.as_deref()
    }
}

impl RenameGuard for BibDatabase {
    /// Vetoes unless `entry` is the very entry stored under `old_id` and
    /// `new_id` is free.
    fn try_rename_entry(
        &self,
        entry: &BibEntry,
        old_id: &str,
        new_id: &str,
    ) -> Result<(), RenameError> {
        match self.entries.get(old_id) {
            Some(stored) if std::ptr::eq(stored, entry) => {}
            _ => return Err(RenameError::WrongOldId(old_id.to_string())),
        }
        if new_id != old_id && self.entries.contains_key(new_id) {
            return Err(RenameError::IdInUse(new_id.to_string()));
        }
        Ok(())
    }
}

/// A [`BibDatabase`] shared between threads.
///
/// Readers never observe a half-applied mutation; writers are serialised.
#[derive(Debug, Clone, Default)]
pub struct SharedDatabase(Arc<RwLock<BibDatabase>>);

impl SharedDatabase {
    pub fn new(db: BibDatabase) -> Self {
        Self(Arc::new(RwLock::new(db)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, BibDatabase> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, BibDatabase> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<BibDatabase> for SharedDatabase {
    fn from(db: BibDatabase) -> Self {
        Self::new(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Detached, ID_FIELD};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn keyed(id: &str, key: &str) -> BibEntry {
        let mut entry = BibEntry::new(id, EntryType::other()).unwrap();
        entry.set_field(KEY_FIELD, key).unwrap();
        entry
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<DatabaseEvent>>);

    impl DatabaseListener for Recorder {
        fn database_changed(&self, event: &DatabaseEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_duplicate_key_counting() {
        let mut db = BibDatabase::new();
        assert!(!db.insert_entry(keyed("1", "a")).unwrap());
        assert!(db.insert_entry(keyed("2", "a")).unwrap());
        assert!(!db.insert_entry(keyed("3", "b")).unwrap());
        assert_eq!(db.number_of_key_occurrences("a"), 2);
        assert_eq!(db.number_of_key_occurrences("b"), 1);

        db.remove_entry("1");
        assert_eq!(db.number_of_key_occurrences("a"), 1);
        assert!(!db.set_cite_key_for_entry("2", Some("a")));
        assert_eq!(db.number_of_key_occurrences("a"), 1);
    }

    #[test]
    fn test_insert_duplicate_id_leaves_db_unchanged() {
        let mut db = BibDatabase::new();
        db.insert_entry(keyed("1", "a")).unwrap();
        let revision = db.revision();
        assert_eq!(
            db.insert_entry(keyed("1", "other")),
            Err(KeyCollision::DuplicateEntryId("1".to_string()))
        );
        assert_eq!(db.entry_count(), 1);
        assert_eq!(db.number_of_key_occurrences("other"), 0);
        assert_eq!(db.revision(), revision);
        assert_eq!(db.entry_by_id("1").unwrap().cite_key(), Some("a"));
    }

    #[test]
    fn test_set_cite_key_for_entry() {
        let mut db = BibDatabase::new();
        db.insert_entry(keyed("1", "a")).unwrap();
        db.insert_entry(keyed("2", "b")).unwrap();

        assert!(!db.set_cite_key_for_entry("missing", Some("a")));
        assert!(db.set_cite_key_for_entry("2", Some("a")));
        assert_eq!(db.number_of_key_occurrences("a"), 2);
        assert_eq!(db.number_of_key_occurrences("b"), 0);

        assert!(!db.set_cite_key_for_entry("2", None));
        assert_eq!(db.entry_by_id("2").unwrap().cite_key(), None);
        assert_eq!(db.number_of_key_occurrences("a"), 1);
    }

    #[test]
    fn test_empty_cite_key_clears_field() {
        let mut db = BibDatabase::new();
        db.insert_entry(keyed("1", "a")).unwrap();

        assert!(!db.set_cite_key_for_entry("1", Some("")));
        assert_eq!(db.entry_by_id("1").unwrap().cite_key(), None);
        assert_eq!(db.entry_by_id("1").unwrap().field(KEY_FIELD), None);
        assert_eq!(db.number_of_key_occurrences("a"), 0);
        assert_eq!(db.number_of_key_occurrences(""), 0);
    }

    #[test]
    fn test_key_counts_match_entries() {
        let mut db = BibDatabase::new();
        db.insert_entry(keyed("1", "a")).unwrap();
        db.insert_entry(keyed("2", "b")).unwrap();
        db.set_field("2", KEY_FIELD, "a").unwrap();
        db.set_cite_key_for_entry("1", Some("c"));
        db.remove_entry("2");

        for key in ["a", "b", "c"] {
            assert_eq!(
                db.number_of_key_occurrences(key),
                db.entries_by_key(key).len(),
                "key {key}"
            );
        }
    }

    #[test]
    fn test_set_field_routes_key() {
        let mut db = BibDatabase::new();
        db.insert_entry(keyed("1", "a")).unwrap();
        db.set_field("1", KEY_FIELD, "z").unwrap();
        assert_eq!(db.number_of_key_occurrences("a"), 0);
        assert_eq!(db.number_of_key_occurrences("z"), 1);

        db.set_field("1", "title", "T").unwrap();
        assert_eq!(db.entry_by_id("1").unwrap().field("title"), Some("T"));
        assert_eq!(db.clear_field("1", "title").unwrap(), Some("T".to_string()));
        assert_eq!(db.clear_field("1", KEY_FIELD).unwrap(), Some("z".to_string()));
        assert_eq!(db.number_of_key_occurrences("z"), 0);

        assert_eq!(
            db.set_field("1", ID_FIELD, "2"),
            Err(EntryError::ReservedField(ID_FIELD.to_string()))
        );
        assert_eq!(
            db.set_field("9", "title", "T"),
            Err(EntryError::UnknownEntry("9".to_string()))
        );
    }

    #[test]
    fn test_key_lookups() {
        let mut db = BibDatabase::new();
        db.insert_entry(keyed("1", "a")).unwrap();
        db.insert_entry(keyed("2", "b")).unwrap();
        db.insert_entry(keyed("3", "a")).unwrap();

        assert_eq!(db.entry_by_key("a").map(BibEntry::id), Some("1"));
        let ids: Vec<&str> = db.entries_by_key("a").into_iter().map(BibEntry::id).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(db.entry_by_key("c"), None);
        assert_eq!(db.key_set().collect::<Vec<_>>(), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_rename_entry() {
        let mut db = BibDatabase::new();
        db.insert_entry(keyed("1", "a")).unwrap();
        db.insert_entry(keyed("2", "b")).unwrap();

        assert_eq!(
            db.rename_entry("1", "2"),
            Err(EntryError::KeyCollision(RenameError::IdInUse("2".to_string())))
        );
        assert_eq!(db.rename_entry("1", ""), Err(EntryError::NullId));
        assert_eq!(
            db.rename_entry("7", "8"),
            Err(EntryError::UnknownEntry("7".to_string()))
        );

        db.rename_entry("1", "10").unwrap();
        assert_eq!(db.entry_by_id("1"), None);
        assert_eq!(db.entry_by_id("10").unwrap().cite_key(), Some("a"));
        assert_eq!(db.key_set().collect::<Vec<_>>(), vec!["10", "2"]);
        assert_eq!(db.number_of_key_occurrences("a"), 1);
    }

    #[test]
    fn test_guard_checks_sender_identity() {
        let mut db = BibDatabase::new();
        db.insert_entry(keyed("1", "a")).unwrap();

        let stored = db.entry_by_id("1").unwrap();
        assert_eq!(db.try_rename_entry(stored, "1", "5"), Ok(()));

        let mut copy = stored.clone();
        assert_eq!(
            copy.set_id("5", &db),
            Err(EntryError::KeyCollision(RenameError::WrongOldId("1".to_string())))
        );
        assert_eq!(copy.id(), "1");
        assert_eq!(copy.set_id("5", &Detached), Ok(()));
    }

    #[test]
    fn test_strings_and_preamble() {
        let mut db = BibDatabase::new();
        db.add_string(BibString::new("s1", "acm", "ACM")).unwrap();
        assert_eq!(
            db.add_string(BibString::new("s2", "acm", "again")),
            Err(KeyCollision::DuplicateStringName("acm".to_string()))
        );
        assert!(db.has_string_label("acm"));
        assert!(!db.has_string_label("ACM"));
        assert_eq!(db.string_count(), 1);
        assert_eq!(db.string("s1").map(|s| s.content.as_str()), Some("ACM"));
        assert_eq!(db.resolve_string("ACM"), Some("ACM".to_string()));
        assert_eq!(db.resolve_for_strings("#acm# #may#"), "ACM May");
        assert_eq!(db.remove_string("s1").map(|s| s.name), Some("acm".to_string()));
        assert_eq!(db.string_count(), 0);

        assert_eq!(db.preamble(), None);
        db.set_preamble(Some("first".to_string()));
        db.set_preamble(Some("second".to_string()));
        assert_eq!(db.preamble(), Some("second"));
    }

    #[test]
    fn test_listener_events() {
        let recorder = Arc::new(Recorder::default());
        let mut db = BibDatabase::new();
        db.add_listener(recorder.clone());

        db.insert_entry(keyed("1", "a")).unwrap();
        db.insert_entry(keyed("2", "b")).unwrap();
        db.set_field("2", KEY_FIELD, "a").unwrap();
        assert_eq!(db.number_of_key_occurrences("a"), 2);
        assert_eq!(db.number_of_key_occurrences("b"), 0);
        db.rename_entry("2", "3").unwrap();
        db.remove_entry("1");

        let listener: Arc<dyn DatabaseListener> = recorder.clone();
        db.remove_listener(&listener);
        db.remove_entry("3");

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                DatabaseEvent::EntryAdded { id: "1".to_string() },
                DatabaseEvent::EntryAdded { id: "2".to_string() },
                DatabaseEvent::EntryChanged {
                    id: "2".to_string(),
                    field: KEY_FIELD.to_string()
                },
                DatabaseEvent::DuplicateKey { key: "a".to_string() },
                DatabaseEvent::EntryRenamed {
                    old_id: "2".to_string(),
                    new_id: "3".to_string()
                },
                DatabaseEvent::EntryRemoved { id: "1".to_string() },
            ]
        );
    }

    #[test]
    fn test_shared_database_concurrent_writers() {
        let shared = SharedDatabase::default();
        std::thread::scope(|scope| {
            for t in 0..4 {
                let shared = shared.clone();
                scope.spawn(move || {
                    for i in 0..25 {
                        let id = format!("{t}-{i}");
                        shared.write().insert_entry(keyed(&id, "same")).unwrap();
                    }
                });
            }
        });
        let db = shared.read();
        assert_eq!(db.entry_count(), 100);
        assert_eq!(db.number_of_key_occurrences("same"), 100);
    }
}
