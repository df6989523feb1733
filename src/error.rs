//! Error types for BibTeX parsing and database operations.
//!
//! This module defines a structured error hierarchy. Structural parse failures
//! carry the 1-based line on which they were detected, collisions name the
//! offending id or label, and entry-level errors describe rejected mutations.

use thiserror::Error;

/// A byte-offset span into the original source text.
///
/// Both `start` and `end` are byte offsets (not character indices) from the
/// beginning of the source string.  `start` is inclusive, `end` is exclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpan {
    /// Inclusive start byte offset.
    pub start: usize,
    /// Exclusive end byte offset.
    pub end: usize,
}

impl SourceSpan {
    /// Create a new `SourceSpan`.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Top-level error type for a parse invocation.
#[derive(Error, Debug)]
pub enum BibError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Duplicate key in BibTeX input: {0}")]
    Collision(#[from] KeyCollision),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("Invalid parser configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BibError {
    /// The line the failure was detected on, when it is known.
    pub fn line(&self) -> Option<usize> {
        match self {
            BibError::Parse(e) => e.line,
            _ => None,
        }
    }
}

/// Parse error with location information.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Error in BibTeX input{}: {error}",
    match (line, column) {
        (Some(l), Some(c)) => format!(" at line {} column {}", l, c),
        (Some(l), None) => format!(" at line {}", l),
        (None, Some(c)) => format!(" at column {}", c),
        (None, None) => String::new(),
    }
)]
pub struct ParseError {
    /// Line number where the error occurred (1-based, None if not available)
    pub line: Option<usize>,
    /// Column number where the error occurred (1-based, None if not available)
    pub column: Option<usize>,
    /// Byte-offset span into the source text, for rich diagnostic rendering.
    pub span: Option<SourceSpan>,
    /// The specific error that occurred
    pub error: SyntaxError,
}

impl ParseError {
    /// Create a new ParseError.
    pub fn new(line: Option<usize>, column: Option<usize>, error: SyntaxError) -> Self {
        Self {
            line,
            column,
            span: None,
            error,
        }
    }

    /// Attach a byte-offset span to this error, returning `self` (builder style).
    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    /// Create a ParseError with line and column information.
    pub fn at_position(line: usize, column: usize, error: SyntaxError) -> Self {
        Self::new(Some(line), Some(column), error)
    }
}

/// Structural violations found while scanning BibTeX text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("Expected {expected} but received {}", describe(.found))]
    Expected {
        expected: String,
        found: Option<char>,
    },

    #[error("EOF in mid-string")]
    UnexpectedEof,

    #[error("Empty text token. This could be caused by a missing comma between two fields.")]
    EmptyTextToken,

    #[error("Character '{0}' is not allowed in bibtex keys")]
    IllegalKeyCharacter(char),

    #[error("Invalid numeric value: \"{0}\"")]
    InvalidNumber(String),

    #[error("Field rejected: {0}")]
    InvalidField(#[from] EntryError),
}

fn describe(found: &Option<char>) -> String {
    match found {
        Some(c) => format!("'{}'", c.escape_debug()),
        None => "end of input".to_string(),
    }
}

/// An id or label that is already taken.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KeyCollision {
    #[error("ID is already in use, please choose another: {0}")]
    DuplicateEntryId(String),

    #[error("A string with this label already exists: {0}")]
    DuplicateStringName(String),

    #[error("Duplicate string id: {0}")]
    DuplicateStringId(String),
}

/// Reasons a database vetoes an entry id change.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenameError {
    #[error("Wrong old ID: {0}")]
    WrongOldId(String),

    #[error("New ID already in use, please choose another: {0}")]
    IdInUse(String),
}

/// Rejected mutations on a single entry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntryError {
    #[error("The field name '{0}' is reserved")]
    ReservedField(String),

    #[error("Every entry must have an ID")]
    NullId,

    #[error("Couldn't change ID: {0}")]
    KeyCollision(#[from] RenameError),

    #[error("No entry with ID {0}")]
    UnknownEntry(String),
}

/// Failures while formatting a field value for output.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("Unbalanced braces in field '{field}'")]
    UnbalancedBraces { field: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let error = ParseError::new(Some(42), None, SyntaxError::EmptyTextToken);

        let display = format!("{}", error);
        assert!(display.contains("line 42"));
        assert!(display.contains("BibTeX input"));
        assert!(display.contains("missing comma"));
    }

    #[test]
    fn test_parse_error_with_position() {
        let error = ParseError::at_position(10, 25, SyntaxError::IllegalKeyCharacter('#'));

        let display = format!("{}", error);
        assert!(display.contains("line 10 column 25"));
        assert!(display.contains("'#'"));
    }

    #[test]
    fn test_parse_error_without_position() {
        let error = ParseError::new(None, None, SyntaxError::UnexpectedEof);

        let display = format!("{}", error);
        assert!(display.contains("EOF in mid-string"));
        assert!(!display.contains("line"));
        assert!(!display.contains("column"));
    }

    #[test]
    fn test_expected_display() {
        let error = SyntaxError::Expected {
            expected: "'{' or '('".to_string(),
            found: Some('x'),
        };
        assert_eq!(format!("{}", error), "Expected '{' or '(' but received 'x'");

        let error = SyntaxError::Expected {
            expected: "','".to_string(),
            found: None,
        };
        assert_eq!(format!("{}", error), "Expected ',' but received end of input");
    }

    #[test]
    fn test_bib_error_line() {
        let error: BibError = ParseError::at_position(3, 1, SyntaxError::UnexpectedEof).into();
        assert_eq!(error.line(), Some(3));

        let error: BibError = KeyCollision::DuplicateEntryId("x".to_string()).into();
        assert_eq!(error.line(), None);
        assert!(format!("{}", error).contains("ID is already in use"));
    }

    #[test]
    fn test_entry_error_from_rename() {
        let error: EntryError = RenameError::IdInUse("id7".to_string()).into();
        assert_eq!(
            format!("{}", error),
            "Couldn't change ID: New ID already in use, please choose another: id7"
        );
    }
}
