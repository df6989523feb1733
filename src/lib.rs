//! A BibTeX parser and in-memory bibliographic database.
//!
//! `bibstore` reads BibTeX source into a [`BibDatabase`]: entries indexed by
//! an internal id, citation keys with duplicate tracking, `@string` macros, the
//! `@preamble`, and application metadata stored in `@comment` blocks.
//!
//! # Features
//!
//! - `diagnostics` - Render parse errors with source context using `ariadne`
//!
//! # Basic Usage
//!
//! ```rust
//! use bibstore::{BibtexParser, BraceFormatter, WriterConfig};
//!
//! let input = r#"
//! @string{acm = "ACM"}
//! @inproceedings{doe2020,
//!   author = {Jane Doe},
//!   title = {Parsing {BibTeX}},
//!   booktitle = acm # " Conference",
//!   year = 2020,
//! }
//! @comment{jabref-meta: databaseType:bibtex;}
//! "#;
//!
//! let result = BibtexParser::new().parse(input).unwrap();
//! let db = &result.database;
//! let entry = db.entry_by_key("doe2020").unwrap();
//!
//! // Bare words are kept as `#label#` string references.
//! assert_eq!(entry.field("booktitle"), Some("#acm# Conference"));
//! assert_eq!(db.resolve_for_strings("#acm# Conference"), "ACM Conference");
//! assert_eq!(result.metadata["databaseType"], "bibtex;");
//!
//! let written = entry.to_bibtex(&BraceFormatter, &WriterConfig::new()).unwrap();
//! assert!(written.starts_with("@INPROCEEDINGS{doe2020,\n  author = {Jane Doe},\n"));
//! ```
//!
//! # Error Handling
//!
//! Parsing either succeeds completely or fails with a [`BibError`]. Structural
//! errors carry the line they were detected on:
//!
//! ```rust
//! use bibstore::BibtexParser;
//!
//! let err = BibtexParser::new()
//!     .parse("@article{key1,\n  author = {Jane")
//!     .unwrap_err();
//! assert_eq!(err.line(), Some(2));
//! ```
//!
//! # Thread Safety
//!
//! Parsers are `Send + Sync` and can be shared between threads. A database is
//! mutated through `&mut self`; wrap it in a [`SharedDatabase`] to share it.

pub mod bibtex;
pub mod database;
#[cfg(feature = "diagnostics")]
pub mod diagnostics;
pub mod entry;
pub mod error;

// Reexports
pub use bibtex::{BibtexParser, ParseResult, ParseWarning, ParserConfig, is_recognized_format};
pub use database::{BibDatabase, BibString, DatabaseEvent, DatabaseListener, SharedDatabase};
#[cfg(feature = "diagnostics")]
pub use diagnostics::parse_with_diagnostics;
pub use entry::{
    BibEntry, BraceFormatter, Detached, EntryType, EntryTypeSchema, EntryTypes, FieldFormatter,
    ID_FIELD, IdGenerator, KEY_FIELD, ProcessIds, RenameGuard, WriterConfig,
};
pub use error::{
    BibError, EntryError, FormatError, KeyCollision, ParseError, RenameError, SourceSpan,
    SyntaxError,
};

mod scanner;
mod utils;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_public_types_are_thread_safe() {
        assert_send_sync::<BibtexParser>();
        assert_send_sync::<BibDatabase>();
        assert_send_sync::<SharedDatabase>();
        assert_send_sync::<ParseResult>();
    }

    #[test]
    fn test_parse_into_shared_database() {
        let result = BibtexParser::new()
            .parse("@misc{a, note = {x}}")
            .unwrap();
        let shared = SharedDatabase::from(result.database);
        let reader = shared.clone();
        let id = reader.read().key_set().next().unwrap().to_string();
        assert!(!shared.write().set_cite_key_for_entry(&id, Some("b")));
        assert_eq!(reader.read().number_of_key_occurrences("a"), 0);
        assert_eq!(reader.read().number_of_key_occurrences("b"), 1);
    }
}
