use super::BibDatabase;
use crate::entry::BibEntry;
use std::cmp::Ordering;

/// Comparator-ordered view of a database's entry ids.
///
/// The sorter holds no borrow of the database. Each access takes the database
/// and re-sorts when its revision has moved since the last sort.
pub struct EntrySorter<F> {
    compare: F,
    ids: Vec<String>,
    revision: Option<u64>,
}

impl<F> EntrySorter<F>
where
    F: Fn(&BibEntry, &BibEntry) -> Ordering,
{
    pub(crate) fn new(compare: F) -> Self {
        Self {
            compare,
            ids: Vec::new(),
            revision: None,
        }
    }

    /// Bring the order up to date with `db`.
    pub fn refresh(&mut self, db: &BibDatabase) {
        if self.revision == Some(db.revision()) {
            return;
        }
        let mut entries: Vec<&BibEntry> = db.entries().collect();
        entries.sort_by(|a, b| (self.compare)(*a, *b));
        self.ids = entries.into_iter().map(|e| e.id().to_string()).collect();
        self.revision = Some(db.revision());
    }

    pub fn len(&mut self, db: &BibDatabase) -> usize {
        self.refresh(db);
        self.ids.len()
    }

    pub fn is_empty(&mut self, db: &BibDatabase) -> bool {
        self.len(db) == 0
    }

    /// Id of the entry at `index` in sorted order.
    pub fn id_at(&mut self, db: &BibDatabase, index: usize) -> Option<&str> {
        self.refresh(db);
        self.ids.get(index).map(String::as_str)
    }

    /// All ids in sorted order.
    pub fn ids(&mut self, db: &BibDatabase) -> &[String] {
        self.refresh(db);
        &self.ids
    }
}
