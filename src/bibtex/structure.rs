//! Output structures of a BibTeX parse.

use crate::database::BibDatabase;
use crate::entry::EntryType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Everything read from one BibTeX input.
#[derive(Debug, Default)]
pub struct ParseResult {
    /// Entries, strings and preamble.
    pub database: BibDatabase,
    /// Key/value pairs from metadata comments.
    pub metadata: HashMap<String, String>,
    /// Custom entry types declared in comments, by lower-cased name.
    pub entry_types: HashMap<String, Arc<EntryType>>,
    /// Non-fatal problems, in input order.
    pub warnings: Vec<ParseWarning>,
}

impl ParseResult {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A problem that did not stop the parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseWarning {
    /// An entry reuses a citation key already carried by another entry.
    DuplicateKey { key: String, line: usize },
    /// An entry has no citation key.
    EmptyKey { description: String, line: usize },
    /// An entry type was neither known nor declared; the entry became `other`.
    UnknownEntryType { name: String, entry_id: String },
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::DuplicateKey { key, line } => {
                write!(f, "Duplicate BibTeX key '{key}' (line {line})")
            }
            ParseWarning::EmptyKey { description, line } => {
                write!(f, "Empty BibTeX key: {description} (line {line})")
            }
            ParseWarning::UnknownEntryType { name, entry_id } => write!(
                f,
                "Unknown entry type '{name}' of entry {entry_id}, changed to 'other'"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display() {
        let warning = ParseWarning::DuplicateKey {
            key: "doe01".to_string(),
            line: 12,
        };
        assert_eq!(warning.to_string(), "Duplicate BibTeX key 'doe01' (line 12)");

        let warning = ParseWarning::UnknownEntryType {
            name: "dataset".to_string(),
            entry_id: "7".to_string(),
        };
        assert!(warning.to_string().contains("'other'"));
    }

    #[test]
    fn test_has_warnings() {
        let mut result = ParseResult::default();
        assert!(!result.has_warnings());
        result.warnings.push(ParseWarning::EmptyKey {
            description: "N/A: N/A (N/A)".to_string(),
            line: 1,
        });
        assert!(result.has_warnings());
    }
}
