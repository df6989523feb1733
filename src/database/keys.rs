//! Citation key occurrence counts.

use std::collections::HashMap;

/// Number of stored entries carrying each non-empty citation key.
#[derive(Debug, Clone, Default)]
pub(crate) struct KeyCounts {
    counts: HashMap<String, usize>,
}

impl KeyCounts {
    /// Count one more occurrence of `key`. Returns whether it was already present.
    pub(crate) fn add(&mut self, key: Option<&str>) -> bool {
        let Some(key) = key.filter(|k| !k.is_empty()) else {
            return false;
        };
        let count = self.counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        *count > 1
    }

    /// Count one occurrence of `key` less, dropping it at zero.
    pub(crate) fn remove(&mut self, key: Option<&str>) {
        let Some(key) = key.filter(|k| !k.is_empty()) else {
            return;
        };
        if let Some(count) = self.counts.get_mut(key) {
            if *count > 1 {
                *count -= 1;
            } else {
                self.counts.remove(key);
            }
        }
    }

    /// Move one occurrence from `old_key` to `new_key`.
    ///
    /// Returns whether `new_key` was already in use. A key replaced by itself
    /// is never reported.
    pub(crate) fn replace(&mut self, old_key: Option<&str>, new_key: Option<&str>) -> bool {
        match old_key {
            None => self.add(new_key),
            Some(old) if Some(old) == new_key => false,
            Some(_) => {
                self.remove(old_key);
                self.add(new_key)
            }
        }
    }

    pub(crate) fn count(&self, key: &str) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }
}
