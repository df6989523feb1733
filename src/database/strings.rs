//! `@string` definitions and `#label#` reference resolution.

use crate::error::KeyCollision;
use crate::utils::{Segment, string_segments};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Month macros predefined by BibTeX styles.
const MONTHS: &[(&str, &str)] = &[
    ("jan", "January"),
    ("feb", "February"),
    ("mar", "March"),
    ("apr", "April"),
    ("may", "May"),
    ("jun", "June"),
    ("jul", "July"),
    ("aug", "August"),
    ("sep", "September"),
    ("oct", "October"),
    ("nov", "November"),
    ("dec", "December"),
];

/// A named string macro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibString {
    pub id: String,
    pub name: String,
    pub content: String,
}

impl BibString {
    pub fn new(id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Insertion-ordered string definitions with unique ids and names.
#[derive(Debug, Clone, Default)]
pub(crate) struct StringTable {
    strings: Vec<BibString>,
}

impl StringTable {
    pub(crate) fn add(&mut self, string: BibString) -> Result<(), KeyCollision> {
        if self.has_label(&string.name) {
            return Err(KeyCollision::DuplicateStringName(string.name));
        }
        if self.get(&string.id).is_some() {
            return Err(KeyCollision::DuplicateStringId(string.id));
        }
        self.strings.push(string);
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<BibString> {
        let pos = self.strings.iter().position(|s| s.id == id)?;
        Some(self.strings.remove(pos))
    }

    pub(crate) fn get(&self, id: &str) -> Option<&BibString> {
        self.strings.iter().find(|s| s.id == id)
    }

    pub(crate) fn has_label(&self, name: &str) -> bool {
        self.strings.iter().any(|s| s.name == name)
    }

    pub(crate) fn len(&self) -> usize {
        self.strings.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &BibString> {
        self.strings.iter()
    }

    /// Resolve a label to its content, following nested references.
    ///
    /// Names match case-insensitively. Unknown labels fall back to the month
    /// macros; `None` if that fails too. A label already being resolved
    /// further up `used` resolves to itself.
    pub(crate) fn resolve_label(&self, label: &str, used: &mut HashSet<String>) -> Option<String> {
        let lower = label.to_lowercase();
        let Some(string) = self.strings.iter().find(|s| s.name.to_lowercase() == lower) else {
            return MONTHS
                .iter()
                .find(|(abbr, _)| *abbr == lower)
                .map(|(_, month)| month.to_string());
        };
        if !used.insert(string.id.clone()) {
            debug!(label, "circular string reference");
            return Some(label.to_string());
        }
        let resolved = self.resolve_content(&string.content, used);
        used.remove(&string.id);
        Some(resolved)
    }

    /// Replace every `#label#` in `content` with the label's resolution.
    ///
    /// Unresolvable references are kept as written.
    pub(crate) fn resolve_content(&self, content: &str, used: &mut HashSet<String>) -> String {
        let mut out = String::with_capacity(content.len());
        for segment in string_segments(content) {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Label(label) => match self.resolve_label(label, used) {
                    Some(resolved) => out.push_str(&resolved),
                    None => {
                        out.push('#');
                        out.push_str(label);
                        out.push('#');
                    }
                },
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn table(defs: &[(&str, &str)]) -> StringTable {
        let mut table = StringTable::default();
        for (i, (name, content)) in defs.iter().enumerate() {
            table.add(BibString::new(format!("s{i}"), *name, *content)).unwrap();
        }
        table
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let mut table = table(&[("acm", "ACM")]);
        assert_eq!(
            table.add(BibString::new("s9", "acm", "other")),
            Err(KeyCollision::DuplicateStringName("acm".to_string()))
        );
        assert_eq!(
            table.add(BibString::new("s0", "ieee", "IEEE")),
            Err(KeyCollision::DuplicateStringId("s0".to_string()))
        );
        assert!(table.add(BibString::new("s1", "ACM", "upper")).is_ok());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut table = table(&[("a", "1"), ("b", "2"), ("c", "3")]);
        assert_eq!(table.remove("s1").map(|s| s.name), Some("b".to_string()));
        assert_eq!(table.remove("s1"), None);
        let names: Vec<&str> = table.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[rstest]
    #[case("#acm# Press", "Association for Computing Machinery Press")]
    #[case("#ACM#", "Association for Computing Machinery")]
    #[case("#jan# 2001", "January 2001")]
    #[case("#nope#", "#nope#")]
    #[case("#full#", "Proc. of Association for Computing Machinery")]
    #[case("C# and F#", "C# and F#")]
    #[case("##", "##")]
    #[case("#a cm#", "#a cm#")]
    #[case("#loop#", "loop")]
    fn test_resolve_content(#[case] content: &str, #[case] expected: &str) {
        let table = table(&[
            ("acm", "Association for Computing Machinery"),
            ("full", "Proc. of #acm#"),
            ("loop", "#loop#"),
        ]);
        assert_eq!(table.resolve_content(content, &mut HashSet::new()), expected);
    }

    #[test]
    fn test_resolve_label() {
        let table = table(&[("acm", "ACM")]);
        let mut used = HashSet::new();
        assert_eq!(table.resolve_label("Acm", &mut used), Some("ACM".to_string()));
        assert_eq!(table.resolve_label("dec", &mut used), Some("December".to_string()));
        assert_eq!(table.resolve_label("ieee", &mut used), None);
        assert!(used.is_empty());
    }
}
