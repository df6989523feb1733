//! BibTeX write-back of single entries.

use super::{BibEntry, ID_FIELD, KEY_FIELD};
use crate::error::{BibError, FormatError};
use crate::utils::{Segment, string_segments};
use itertools::Itertools;
use std::collections::HashSet;
use std::io;

/// Fields that never appear in written output unless the entry type lists them.
pub(crate) const DEFAULT_NON_WRITABLE: &[&str] = &[
    ID_FIELD,
    "__search",
    "__groupsearch",
    "__markedentry",
    "entrytype",
];

/// Converts a stored field value into its BibTeX source form.
pub trait FieldFormatter {
    /// Format `value` of field `field_name`.
    fn format(&self, value: &str, field_name: &str) -> Result<String, FormatError>;
}

/// Wraps text in braces and emits `#label#` string references bare.
///
/// `Doe and #jan# 2001` becomes `{Doe and } # jan # { 2001}`. A `#` that does
/// not enclose a plain label is kept as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct BraceFormatter;

impl FieldFormatter for BraceFormatter {
    fn format(&self, value: &str, field_name: &str) -> Result<String, FormatError> {
        let mut depth = 0usize;
        for c in value.chars() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth = depth.checked_sub(1).ok_or_else(|| FormatError::UnbalancedBraces {
                        field: field_name.to_string(),
                    })?
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(FormatError::UnbalancedBraces {
                field: field_name.to_string(),
            });
        }

        if value.is_empty() {
            return Ok("{}".to_string());
        }
        Ok(string_segments(value)
            .into_iter()
            .map(|segment| match segment {
                Segment::Text(text) => format!("{{{text}}}"),
                Segment::Label(label) => label.to_string(),
            })
            .join(" # "))
    }
}

/// Output settings for entry write-back.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub(crate) non_writable: HashSet<String>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            non_writable: DEFAULT_NON_WRITABLE.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl WriterConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the non-writable field list.
    pub fn set_non_writable_fields(&mut self, fields: Vec<String>) -> &mut Self {
        self.non_writable = fields.into_iter().collect();
        self
    }

    pub fn add_non_writable_field(&mut self, field: &str) -> &mut Self {
        self.non_writable.insert(field.to_string());
        self
    }

    pub fn is_writable(&self, field: &str) -> bool {
        !self.non_writable.contains(field)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.is_writable(ID_FIELD) {
            return Err(format!("{ID_FIELD} must stay non-writable"));
        }
        Ok(())
    }
}

impl BibEntry {
    /// Render this entry as BibTeX source.
    ///
    /// # Errors
    ///
    /// Propagates the formatter's rejection of a field value.
    pub fn to_bibtex(
        &self,
        formatter: &dyn FieldFormatter,
        config: &WriterConfig,
    ) -> Result<String, FormatError> {
        let mut out = format!(
            "@{}{{{},\n",
            self.entry_type.name().to_uppercase(),
            self.cite_key().unwrap_or_default()
        );
        let mut written: HashSet<&str> = HashSet::from([KEY_FIELD]);

        let schema_fields = self
            .entry_type
            .required_fields()
            .iter()
            .chain(self.entry_type.optional_fields())
            .map(String::as_str);
        for name in schema_fields {
            if written.insert(name) {
                self.write_field(&mut out, name, formatter)?;
            }
        }

        for name in self.field_names() {
            if written.insert(name) && config.is_writable(name) {
                self.write_field(&mut out, name, formatter)?;
            }
        }

        out.push_str("}\n");
        Ok(out)
    }

    /// Write this entry as BibTeX source to `out`.
    pub fn write<W: io::Write>(
        &self,
        out: &mut W,
        formatter: &dyn FieldFormatter,
        config: &WriterConfig,
    ) -> Result<(), BibError> {
        let text = self.to_bibtex(formatter, config)?;
        out.write_all(text.as_bytes())?;
        Ok(())
    }

    fn write_field(
        &self,
        out: &mut String,
        name: &str,
        formatter: &dyn FieldFormatter,
    ) -> Result<(), FormatError> {
        if let Some(value) = self.field(name) {
            out.push_str("  ");
            out.push_str(name);
            out.push_str(" = ");
            out.push_str(&formatter.format(value, name)?);
            out.push_str(",\n");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryType, EntryTypeSchema, EntryTypes};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("Jane Doe", "{Jane Doe}")]
    #[case("", "{}")]
    #[case("#jan#", "jan")]
    #[case("Doe and #jan# 2001", "{Doe and } # jan # { 2001}")]
    #[case("C# and F#", "{C# and F#}")]
    #[case("{Nested {braces}}", "{{Nested {braces}}}")]
    fn test_brace_formatter(#[case] value: &str, #[case] expected: &str) {
        assert_eq!(BraceFormatter.format(value, "title").unwrap(), expected);
    }

    #[rstest]
    #[case("{open")]
    #[case("close}")]
    #[case("}{")]
    fn test_brace_formatter_rejects_unbalanced(#[case] value: &str) {
        assert_eq!(
            BraceFormatter.format(value, "title"),
            Err(FormatError::UnbalancedBraces {
                field: "title".to_string()
            })
        );
    }

    #[test]
    fn test_write_orders_fields() {
        let article = EntryTypes::bibtex().entry_type("article").unwrap();
        let mut entry = BibEntry::new("1", article).unwrap();
        entry.set_field(KEY_FIELD, "doe01").unwrap();
        entry.set_field("year", "2001").unwrap();
        entry.set_field("author", "Jane Doe").unwrap();
        entry.set_field("title", "On Things").unwrap();
        entry.set_field("zzz", "last").unwrap();
        entry.set_field("abstract", "first extra").unwrap();
        entry.set_field("pages", "1--2").unwrap();
        entry.set_field("__markedentry", "x").unwrap();

        let out = entry.to_bibtex(&BraceFormatter, &WriterConfig::new()).unwrap();
        assert_eq!(
            out,
            "@ARTICLE{doe01,\n\
             \x20 author = {Jane Doe},\n\
             \x20 title = {On Things},\n\
             \x20 year = {2001},\n\
             \x20 pages = {1--2},\n\
             \x20 abstract = {first extra},\n\
             \x20 zzz = {last},\n\
             }\n"
        );
    }

    #[test]
    fn test_write_without_key() {
        let entry = BibEntry::new("1", EntryType::other()).unwrap();
        let mut buf = Vec::new();
        entry
            .write(&mut buf, &BraceFormatter, &WriterConfig::default())
            .unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "@OTHER{,\n}\n");
    }

    #[test]
    fn test_writer_config() {
        let mut config = WriterConfig::new();
        assert!(!config.is_writable("__search"));
        config.add_non_writable_field("note");
        assert!(!config.is_writable("note"));
        assert!(config.validate().is_ok());

        config.set_non_writable_fields(vec!["note".to_string()]);
        assert!(config.is_writable("__search"));
        assert!(config.validate().is_err());
    }
}
