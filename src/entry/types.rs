//! Entry type descriptors and the schema lookup consulted by the parser.
//!
//! An [`EntryType`] names a kind of bibliographic record (`article`, `book`, ...)
//! and lists the fields it requires and accepts. The parser never hard-codes
//! these; it asks an injected [`EntryTypeSchema`] whether a type token names a
//! known type.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Matches a custom type declaration body: `name: req[a;b] opt[c;d]`.
static TYPE_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([^\s:]+)\s*:\s*req\[([^\]]*)\]\s*opt\[([^\]]*)\]").unwrap()
});

/// The standard BibTeX types as `(name, required, optional)`.
pub(crate) const STANDARD_TYPES: &[(&str, &[&str], &[&str])] = &[
    (
        "article",
        &["author", "title", "journal", "year"],
        &["volume", "number", "pages", "month", "note"],
    ),
    (
        "book",
        &["author", "title", "publisher", "year"],
        &["editor", "volume", "number", "series", "address", "edition", "month", "note"],
    ),
    (
        "booklet",
        &["title"],
        &["author", "howpublished", "address", "month", "year", "note"],
    ),
    (
        "conference",
        &["author", "title", "booktitle", "year"],
        &[
            "editor", "volume", "number", "series", "pages", "address", "month",
            "organization", "publisher", "note",
        ],
    ),
    (
        "inbook",
        &["author", "title", "chapter", "pages", "publisher", "year"],
        &["editor", "volume", "number", "series", "type", "address", "edition", "month", "note"],
    ),
    (
        "incollection",
        &["author", "title", "booktitle", "publisher", "year"],
        &[
            "editor", "volume", "number", "series", "type", "chapter", "pages", "address",
            "edition", "month", "note",
        ],
    ),
    (
        "inproceedings",
        &["author", "title", "booktitle", "year"],
        &[
            "editor", "volume", "number", "series", "pages", "address", "month",
            "organization", "publisher", "note",
        ],
    ),
    (
        "manual",
        &["title"],
        &["author", "organization", "address", "edition", "month", "year", "note"],
    ),
    (
        "mastersthesis",
        &["author", "title", "school", "year"],
        &["type", "address", "month", "note"],
    ),
    (
        "misc",
        &[],
        &["author", "title", "howpublished", "month", "year", "note"],
    ),
    (
        "phdthesis",
        &["author", "title", "school", "year"],
        &["type", "address", "month", "note"],
    ),
    (
        "proceedings",
        &["title", "year"],
        &["editor", "volume", "number", "series", "address", "month", "organization", "publisher", "note"],
    ),
    (
        "techreport",
        &["author", "title", "institution", "year"],
        &["type", "number", "address", "month", "note"],
    ),
    (
        "unpublished",
        &["author", "title", "note"],
        &["month", "year"],
    ),
    ("other", &[], &[]),
];

static OTHER: LazyLock<Arc<EntryType>> =
    LazyLock::new(|| Arc::new(EntryType::new("other", &[], &[])));

/// A kind of bibliographic entry with its required and optional fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryType {
    name: String,
    required: Vec<String>,
    optional: Vec<String>,
}

impl EntryType {
    /// Create a type descriptor. The name is stored lower-cased.
    pub fn new(name: impl Into<String>, required: &[&str], optional: &[&str]) -> Self {
        Self {
            name: name.into().to_lowercase(),
            required: required.iter().map(|f| f.to_lowercase()).collect(),
            optional: optional.iter().map(|f| f.to_lowercase()).collect(),
        }
    }

    /// The shared fallback type used for entries whose type could not be resolved.
    pub fn other() -> Arc<EntryType> {
        Arc::clone(&OTHER)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required_fields(&self) -> &[String] {
        &self.required
    }

    pub fn optional_fields(&self) -> &[String] {
        &self.optional
    }

    /// Whether `field` is listed as required or optional for this type.
    pub fn is_known_field(&self, field: &str) -> bool {
        self.required.iter().chain(&self.optional).any(|f| f == field)
    }

    /// Parse a custom type declaration of the form `name: req[a;b] opt[c;d]`.
    ///
    /// Returns `None` when the text does not have that shape.
    pub fn parse_declaration(text: &str) -> Option<EntryType> {
        let caps = TYPE_DECLARATION.captures(text)?;
        let split = |list: &str| -> Vec<String> {
            list.split(';')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_lowercase)
                .collect()
        };
        Some(EntryType {
            name: caps[1].to_lowercase(),
            required: split(&caps[2]),
            optional: split(&caps[3]),
        })
    }

    /// Render this type in the declaration form read by [`EntryType::parse_declaration`].
    pub fn to_declaration(&self) -> String {
        format!(
            "{}: req[{}] opt[{}]",
            self.name,
            self.required.join(";"),
            self.optional.join(";")
        )
    }
}

/// Lookup service from a lower-cased type name to its descriptor.
pub trait EntryTypeSchema: Send + Sync {
    /// Resolve `name`; `None` when the name does not denote a known type.
    fn entry_type(&self, name: &str) -> Option<Arc<EntryType>>;
}

/// A registry of entry types keyed by lower-cased name.
#[derive(Debug, Clone, Default)]
pub struct EntryTypes {
    types: HashMap<String, Arc<EntryType>>,
}

impl EntryTypes {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard BibTeX types plus `other`.
    #[must_use]
    pub fn bibtex() -> Self {
        let mut types = Self::new();
        for (name, required, optional) in STANDARD_TYPES {
            if *name == "other" {
                types.types.insert(name.to_string(), EntryType::other());
            } else {
                types.insert(EntryType::new(*name, required, optional));
            }
        }
        types
    }

    /// Add or replace a type.
    pub fn insert(&mut self, entry_type: EntryType) -> &mut Self {
        self.types
            .insert(entry_type.name.clone(), Arc::new(entry_type));
        self
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl EntryTypeSchema for EntryTypes {
    fn entry_type(&self, name: &str) -> Option<Arc<EntryType>> {
        self.types.get(&name.to_lowercase()).cloned()
    }
}
