//! BibTeX format parser.
//!
//! Reads BibTeX source into a [`BibDatabase`](crate::BibDatabase): entries of
//! the types known to the configured schema, `@string` definitions, the
//! `@preamble`, and key/value metadata embedded in `@comment` blocks.
//!
//! # Example
//!
//! ```
//! use bibstore::bibtex::BibtexParser;
//!
//! let input = r#"@article{key1, author = {Jane Doe}, title = "A Title", year = 2020}"#;
//!
//! let result = BibtexParser::new().parse(input).unwrap();
//! let entry = result.database.entry_by_key("key1").unwrap();
//! assert_eq!(entry.entry_type().name(), "article");
//! assert_eq!(entry.field("author"), Some("Jane Doe"));
//! assert_eq!(entry.field("year"), Some("2020"));
//! ```

mod config;
mod parse;
mod structure;

use crate::error::BibError;
use crate::scanner::Scanner;
use crate::utils::is_entry_start_line;
pub use config::{ENTRYTYPE_FLAG, META_FLAG, META_FLAG_OLD, ParserConfig, UnknownEntryTypes};
use parse::BibtexReader;
use std::io::BufRead;
pub use structure::{ParseResult, ParseWarning};
use tracing::debug;

/// Parser for BibTeX databases.
///
/// Parsing is all-or-nothing: a structural error, a duplicate entry id or a
/// duplicate string name aborts the parse and no partial result is returned.
/// Problems that do not abort it are reported in [`ParseResult::warnings`].
///
/// # Examples
///
/// With custom configuration:
/// ```
/// use bibstore::bibtex::{BibtexParser, ParserConfig, UnknownEntryTypes};
///
/// let mut config = ParserConfig::new();
/// config.set_unknown_entry_types(UnknownEntryTypes::Resolve);
///
/// let input = "@comment{jabref-entrytype: Dataset: req[title] opt[url]}\n\
///              @dataset{d1, title = {Numbers}}";
/// let result = BibtexParser::with_config(config).parse(input).unwrap();
/// let entry = result.database.entry_by_key("d1").unwrap();
/// assert_eq!(entry.entry_type().name(), "dataset");
/// ```
#[derive(Debug, Clone, Default)]
pub struct BibtexParser {
    config: ParserConfig,
}

impl BibtexParser {
    /// Creates a parser for the standard BibTeX entry types.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse BibTeX source text.
    ///
    /// # Errors
    ///
    /// [`BibError::Parse`] with the offending position for structural errors,
    /// [`BibError::Collision`] for duplicate entry ids or string names, and
    /// [`BibError::Config`] when the configuration does not validate.
    #[tracing::instrument(skip_all, fields(input_len = input.len()))]
    pub fn parse(&self, input: &str) -> Result<ParseResult, BibError> {
        self.validate_config()?;
        let result = BibtexReader::new(Scanner::new(input), &self.config).parse()?;
        log_summary(&result);
        Ok(result)
    }

    /// Parse BibTeX source decoded as UTF-8 from a reader.
    ///
    /// # Errors
    ///
    /// As [`BibtexParser::parse`], plus [`BibError::Io`] for read failures and
    /// invalid UTF-8.
    #[tracing::instrument(skip_all)]
    pub fn parse_reader<R: BufRead>(&self, reader: R) -> Result<ParseResult, BibError> {
        self.validate_config()?;
        let result = BibtexReader::new(Scanner::from_reader(reader), &self.config).parse()?;
        log_summary(&result);
        Ok(result)
    }

    fn validate_config(&self) -> Result<(), BibError> {
        self.config.validate().map_err(BibError::Config)
    }
}

fn log_summary(result: &ParseResult) {
    debug!(
        entries = result.database.entry_count(),
        strings = result.database.string_count(),
        metadata = result.metadata.len(),
        warnings = result.warnings.len(),
        "parsed BibTeX input"
    );
}

/// Whether `text` looks like BibTeX: some line opens a `@type{` block or
/// carries the JabRef signature.
pub fn is_recognized_format(text: &str) -> bool {
    text.lines().any(is_entry_start_line)
}
