//! Parser configuration.

use crate::entry::{EntryTypeSchema, EntryTypes, IdGenerator, ProcessIds};
use std::fmt;
use std::sync::Arc;

/// Prefix of metadata comments: `@comment{jabref-meta: key:value}`.
pub const META_FLAG: &str = "jabref-meta: ";
/// Metadata prefix written by older versions of the format.
pub const META_FLAG_OLD: &str = "bibkeeper-meta: ";
/// Prefix of custom entry type declarations.
pub const ENTRYTYPE_FLAG: &str = "jabref-entrytype: ";

/// What to do with `@name{...}` blocks whose name is not a known entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownEntryTypes {
    /// Discard the block.
    #[default]
    Skip,
    /// Parse it as an entry; after the whole input is read, apply a custom
    /// type declared in a comment, or fall back to `other` with a warning.
    Resolve,
}

/// Configuration for BibTeX parsing.
///
/// # Examples
///
/// ```
/// use bibstore::bibtex::{ParserConfig, UnknownEntryTypes};
///
/// let mut config = ParserConfig::new();
/// config
///     .set_unknown_entry_types(UnknownEntryTypes::Resolve)
///     .set_concatenated_fields(vec!["author".to_string()]);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct ParserConfig {
    pub(crate) entry_types: Arc<dyn EntryTypeSchema>,
    pub(crate) id_generator: Arc<dyn IdGenerator>,
    pub(crate) meta_flag: String,
    pub(crate) legacy_meta_flag: Option<String>,
    pub(crate) entry_type_flag: String,
    pub(crate) unknown_entry_types: UnknownEntryTypes,
    /// Fields whose repeated occurrences are joined with ` and `.
    pub(crate) concatenated_fields: Vec<String>,
}

impl fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserConfig")
            .field("meta_flag", &self.meta_flag)
            .field("legacy_meta_flag", &self.legacy_meta_flag)
            .field("entry_type_flag", &self.entry_type_flag)
            .field("unknown_entry_types", &self.unknown_entry_types)
            .field("concatenated_fields", &self.concatenated_fields)
            .finish_non_exhaustive()
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            entry_types: Arc::new(EntryTypes::bibtex()),
            id_generator: Arc::new(ProcessIds),
            meta_flag: META_FLAG.to_string(),
            legacy_meta_flag: Some(META_FLAG_OLD.to_string()),
            entry_type_flag: ENTRYTYPE_FLAG.to_string(),
            unknown_entry_types: UnknownEntryTypes::default(),
            concatenated_fields: vec!["author".to_string(), "editor".to_string()],
        }
    }
}

impl ParserConfig {
    /// Standard BibTeX types, process-wide ids, JabRef comment markers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the schema consulted for entry type names.
    pub fn set_entry_types(&mut self, schema: impl EntryTypeSchema + 'static) -> &mut Self {
        self.entry_types = Arc::new(schema);
        self
    }

    pub fn set_id_generator(&mut self, generator: impl IdGenerator + 'static) -> &mut Self {
        self.id_generator = Arc::new(generator);
        self
    }

    pub fn set_meta_flag(&mut self, flag: impl Into<String>) -> &mut Self {
        self.meta_flag = flag.into();
        self
    }

    /// Set or disable (`None`) the legacy metadata prefix.
    pub fn set_legacy_meta_flag(&mut self, flag: Option<String>) -> &mut Self {
        self.legacy_meta_flag = flag;
        self
    }

    pub fn set_entry_type_flag(&mut self, flag: impl Into<String>) -> &mut Self {
        self.entry_type_flag = flag.into();
        self
    }

    pub fn set_unknown_entry_types(&mut self, policy: UnknownEntryTypes) -> &mut Self {
        self.unknown_entry_types = policy;
        self
    }

    /// Set the fields whose repeated values are joined with ` and `.
    pub fn set_concatenated_fields(&mut self, fields: Vec<String>) -> &mut Self {
        self.concatenated_fields = fields;
        self
    }

    pub(crate) fn concatenates(&self, field: &str) -> bool {
        self.concatenated_fields.iter().any(|f| f == field)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.meta_flag.is_empty() {
            return Err("Metadata prefix cannot be empty".to_string());
        }
        if self.entry_type_flag.is_empty() {
            return Err("Entry type prefix cannot be empty".to_string());
        }
        if self.meta_flag == self.entry_type_flag {
            return Err("Metadata and entry type prefixes must differ".to_string());
        }
        if self.legacy_meta_flag.as_deref() == Some("") {
            return Err("Legacy metadata prefix cannot be empty".to_string());
        }
        if let Some(field) = self
            .concatenated_fields
            .iter()
            .find(|f| f.is_empty() || f.to_lowercase() != **f)
        {
            return Err(format!(
                "Concatenated field names must be non-empty and lower-case: {field:?}"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ParserConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.unknown_entry_types, UnknownEntryTypes::Skip);
        assert!(config.concatenates("author"));
        assert!(config.concatenates("editor"));
        assert!(!config.concatenates("title"));
        assert!(config.entry_types.entry_type("article").is_some());
    }

    #[test]
    fn test_setters_chain() {
        let mut config = ParserConfig::new();
        config
            .set_meta_flag("x-meta: ")
            .set_legacy_meta_flag(None)
            .set_entry_type_flag("x-type: ")
            .set_entry_types(EntryTypes::new());
        assert!(config.validate().is_ok());
        assert_eq!(config.meta_flag, "x-meta: ");
        assert!(config.entry_types.entry_type("article").is_none());
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = ParserConfig::new();
        config.set_meta_flag("");
        assert!(config.validate().is_err());

        let mut config = ParserConfig::new();
        config.set_entry_type_flag(META_FLAG);
        assert!(config.validate().is_err());

        let mut config = ParserConfig::new();
        config.set_legacy_meta_flag(Some(String::new()));
        assert!(config.validate().is_err());

        let mut config = ParserConfig::new();
        config.set_concatenated_fields(vec!["Author".to_string()]);
        assert!(config.validate().is_err());
    }
}
