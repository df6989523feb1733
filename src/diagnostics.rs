//! Pretty diagnostic reporting using [ariadne].
//!
//! Renders [`ParseError`] values with the offending source line underlined.
//! Only compiled with the `diagnostics` Cargo feature:
//!
//! ```toml
//! [dependencies]
//! bibstore = { version = "0.1", features = ["diagnostics"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use bibstore::{BibError, BibtexParser};
//!
//! let source = "@article{key1,\n  author = {Jane";
//! match BibtexParser::new().parse(source) {
//!     Ok(result) => println!("Parsed {} entries", result.database.entry_count()),
//!     Err(BibError::Parse(e)) => eprintln!("{}", e.to_diagnostic("refs.bib", source)),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

use crate::bibtex::{BibtexParser, ParseResult};
use crate::error::{BibError, ParseError};
use ariadne::{Color, Config, IndexType, Label, Report, ReportKind, Source};

impl ParseError {
    /// Render this error as an Ariadne report.
    ///
    /// The returned `String` contains ANSI colour codes when the terminal
    /// supports them.
    ///
    /// # Arguments
    ///
    /// * `filename` – Label shown in the report header (e.g. `"refs.bib"`).
    /// * `source`   – The source text that was parsed.
    pub fn to_diagnostic(&self, filename: &str, source: &str) -> String {
        let mut buf = Vec::new();
        let range = self.primary_byte_range(source);

        let written = Report::build(ReportKind::Error, (filename, range.clone()))
            .with_config(Config::default().with_index_type(IndexType::Byte))
            .with_message(self.to_string())
            .with_label(
                Label::new((filename, range))
                    .with_message(self.error.to_string())
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);

        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => self.to_string(),
        }
    }

    /// Byte range of `source` to underline: the explicit span, else the
    /// reported line, else the start of the file.
    fn primary_byte_range(&self, source: &str) -> std::ops::Range<usize> {
        if let Some(ref span) = self.span {
            return span.start..span.end;
        }
        if let Some(line) = self.line {
            let index = line.saturating_sub(1);
            let start: usize = source.split_inclusive('\n').take(index).map(str::len).sum();
            let len = source
                .lines()
                .nth(index)
                .map(str::len)
                .unwrap_or(0);
            return start..start + len;
        }
        0..0
    }
}

/// Parse BibTeX text and, on a structural error, return a rendered diagnostic.
///
/// Collisions and I/O failures are returned as their plain messages.
pub fn parse_with_diagnostics(
    parser: &BibtexParser,
    input: &str,
    filename: &str,
) -> Result<ParseResult, String> {
    parser.parse(input).map_err(|e| match e {
        BibError::Parse(e) => e.to_diagnostic(filename, input),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyntaxError;

    #[test]
    fn test_to_diagnostic_with_span() {
        let source = "@misc{bad#key,\n  note = {x}}\n";
        let err = match BibtexParser::new().parse(source) {
            Err(BibError::Parse(err)) => err,
            other => panic!("expected a parse error, got {other:?}"),
        };
        assert_eq!(err.primary_byte_range(source), 9..10);

        let diag = err.to_diagnostic("test.bib", source);
        assert!(diag.contains("test.bib"));
    }

    #[test]
    fn test_to_diagnostic_line_only() {
        let source = "@misc{a,\n  note = {x}}\n";
        let err = ParseError::new(Some(2), None, SyntaxError::IllegalKeyCharacter('#'));
        assert_eq!(err.primary_byte_range(source), 9..22);

        let diag = err.to_diagnostic("test.bib", source);
        assert!(diag.contains("test.bib"));
    }

    #[test]
    fn test_to_diagnostic_no_position() {
        let err = ParseError::new(None, None, SyntaxError::UnexpectedEof);

        // Should not panic without position info
        let diag = err.to_diagnostic("test.bib", "some content\n");
        assert!(diag.contains("test.bib"));
    }

    #[test]
    fn test_parse_with_diagnostics() {
        let parser = BibtexParser::new();
        let source = "@article{key1,\n  author = {Jane";
        let diag = parse_with_diagnostics(&parser, source, "refs.bib").unwrap_err();
        assert!(diag.contains("refs.bib"));

        let result = parse_with_diagnostics(&parser, "@misc{a,}", "refs.bib").unwrap();
        assert_eq!(result.database.entry_count(), 1);

        let collision = parse_with_diagnostics(&parser, "@string{a={1}}@string{a={2}}", "refs.bib")
            .unwrap_err();
        assert!(collision.contains("A string with this label already exists"));
    }
}
