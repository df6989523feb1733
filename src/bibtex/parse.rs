//! The BibTeX state machine.

use super::config::{ParserConfig, UnknownEntryTypes};
use super::structure::{ParseResult, ParseWarning};
use crate::database::BibString;
use crate::entry::{BibEntry, EntryType, KEY_FIELD};
use crate::error::{BibError, ParseError, SourceSpan, SyntaxError};
use crate::scanner::Scanner;
use crate::utils::{is_forbidden_key_char, is_text_token_char, normalize_number};
use std::sync::Arc;
use tracing::debug;

type Result<T> = std::result::Result<T, BibError>;

/// Outcome of scanning a citation key.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum KeyScan {
    /// Terminated by `,` or end of input.
    Key(String),
    /// Hit `=`: the text read so far may be a field name rather than a key.
    NoLabel(String),
}

pub(crate) struct BibtexReader<'a, 'c> {
    s: Scanner<'a>,
    config: &'c ParserConfig,
    result: ParseResult,
    /// Ids of entries parsed under a provisional type.
    provisional: Vec<String>,
}

impl<'a, 'c> BibtexReader<'a, 'c> {
    pub(crate) fn new(s: Scanner<'a>, config: &'c ParserConfig) -> Self {
        Self {
            s,
            config,
            result: ParseResult::default(),
            provisional: Vec::new(),
        }
    }

    /// Locate `error` at the last consumed character.
    fn error(&self, error: SyntaxError) -> BibError {
        let (pos, len) = self.s.last_char();
        ParseError::at_position(pos.line, pos.column, error)
            .with_span(SourceSpan::new(pos.offset, pos.offset + len))
            .into()
    }

    /// Read the whole input.
    pub(crate) fn parse(mut self) -> Result<ParseResult> {
        self.skip_whitespace()?;
        while !self.s.is_eof() {
            if !self.consume_uncritically('@')? {
                break;
            }
            self.skip_whitespace()?;
            let line = self.s.line();
            let token = self.parse_text_token()?.to_lowercase();

            if let Some(entry_type) = self.config.entry_types.entry_type(&token) {
                let entry = self.parse_entry(entry_type)?;
                self.store_entry(entry, line)?;
            } else {
                match token.as_str() {
                    "preamble" => {
                        self.skip_whitespace()?;
                        let preamble = self.parse_bracketed_text()?;
                        self.result.database.set_preamble(Some(preamble));
                    }
                    "string" => {
                        let string = self.parse_string()?;
                        self.result.database.add_string(string)?;
                    }
                    "comment" => self.parse_comment()?,
                    _ if !token.is_empty()
                        && self.config.unknown_entry_types == UnknownEntryTypes::Resolve =>
                    {
                        let provisional = Arc::new(EntryType::new(token.as_str(), &[], &[]));
                        let entry = self.parse_entry(provisional)?;
                        self.provisional.push(entry.id().to_string());
                        self.store_entry(entry, line)?;
                    }
                    _ => debug!(block = %token, line, "skipping unrecognised block"),
                }
            }
            self.skip_whitespace()?;
        }
        self.resolve_provisional_types();
        Ok(self.result)
    }

    fn store_entry(&mut self, entry: BibEntry, line: usize) -> Result<()> {
        let key = entry.cite_key().map(str::to_string);
        let description = entry.author_title_year(40);
        let duplicate = self.result.database.insert_entry(entry)?;
        match key {
            Some(key) if duplicate => {
                self.result
                    .warnings
                    .push(ParseWarning::DuplicateKey { key, line });
            }
            Some(_) => {}
            None => {
                self.result
                    .warnings
                    .push(ParseWarning::EmptyKey { description, line });
            }
        }
        Ok(())
    }

    fn resolve_provisional_types(&mut self) {
        for id in std::mem::take(&mut self.provisional) {
            let Some(name) = self
                .result
                .database
                .entry_by_id(&id)
                .map(|e| e.entry_type().name().to_string())
            else {
                continue;
            };
            let resolved = match self.result.entry_types.get(&name) {
                Some(declared) => Arc::clone(declared),
                None => {
                    self.result.warnings.push(ParseWarning::UnknownEntryType {
                        name,
                        entry_id: id.clone(),
                    });
                    EntryType::other()
                }
            };
            self.result.database.set_entry_type(&id, resolved);
        }
    }

    // Character-level helpers

    fn skip_whitespace(&mut self) -> Result<()> {
        loop {
            match self.s.read()? {
                None => {
                    self.s.mark_eof();
                    return Ok(());
                }
                Some(c) if c.is_whitespace() => {}
                c => {
                    self.s.unread(c);
                    return Ok(());
                }
            }
        }
    }

    /// Skip up to and including `expected`. `false` if the input ran out first.
    fn consume_uncritically(&mut self, expected: char) -> Result<bool> {
        loop {
            match self.s.read()? {
                Some(c) if c == expected => return Ok(true),
                Some(_) => {}
                None => {
                    self.s.mark_eof();
                    return Ok(false);
                }
            }
        }
    }

    fn consume(&mut self, expected: char) -> Result<()> {
        let found = self.s.read()?;
        if found == Some(expected) {
            Ok(())
        } else {
            Err(self.error(SyntaxError::Expected {
                expected: format!("'{expected}'"),
                found,
            }))
        }
    }

    fn consume_either(&mut self, a: char, b: char) -> Result<()> {
        let found = self.s.read()?;
        if found == Some(a) || found == Some(b) {
            Ok(())
        } else {
            Err(self.error(SyntaxError::Expected {
                expected: format!("'{a}' or '{b}'"),
                found,
            }))
        }
    }

    // Grammar

    pub(crate) fn parse_text_token(&mut self) -> Result<String> {
        let mut token = String::new();
        loop {
            match self.s.read()? {
                None => {
                    self.s.mark_eof();
                    return Ok(token);
                }
                Some(c) if is_text_token_char(c) => token.push(c),
                c => {
                    self.s.unread(c);
                    return Ok(token);
                }
            }
        }
    }

    pub(crate) fn parse_key(&mut self) -> Result<KeyScan> {
        let mut key = String::new();
        loop {
            match self.s.read()? {
                None => {
                    self.s.mark_eof();
                    return Ok(KeyScan::Key(key));
                }
                Some(c) if c.is_alphanumeric() => key.push(c),
                Some(',') => {
                    self.s.unread(Some(','));
                    return Ok(KeyScan::Key(key));
                }
                Some(c) if c.is_whitespace() => {}
                Some('=') => return Ok(KeyScan::NoLabel(key)),
                Some(c) if is_forbidden_key_char(c) => {
                    return Err(self.error(SyntaxError::IllegalKeyCharacter(c)));
                }
                Some(c) => key.push(c),
            }
        }
    }

    fn parse_entry(&mut self, entry_type: Arc<EntryType>) -> Result<BibEntry> {
        let id = self.config.id_generator.next_id();
        let mut entry =
            BibEntry::new(id, entry_type).map_err(|e| self.error(SyntaxError::InvalidField(e)))?;

        self.skip_whitespace()?;
        self.consume_either('{', '(')?;
        self.skip_whitespace()?;

        let mut key = String::new();
        loop {
            match self.parse_key()? {
                KeyScan::Key(text) => {
                    key.push_str(&text);
                    break;
                }
                KeyScan::NoLabel(text) => {
                    let next = self.s.peek()?;
                    if next.is_some_and(|c| c.is_whitespace() || c == '{' || c == '"') {
                        let name = text.to_lowercase();
                        let content = self.parse_field_content()?;
                        self.store_field(&mut entry, &name, content)?;
                        break;
                    }
                    key.push_str(&text);
                    key.push('=');
                }
            }
        }
        if !key.is_empty() {
            entry.put_field(KEY_FIELD, key);
        }

        loop {
            self.skip_whitespace()?;
            if matches!(self.s.peek()?, Some('}' | ')')) {
                break;
            }
            self.consume(',')?;
            self.skip_whitespace()?;
            if matches!(self.s.peek()?, Some('}' | ')')) {
                break;
            }
            self.parse_field(&mut entry)?;
        }
        self.consume_either('}', ')')?;
        Ok(entry)
    }

    fn parse_field(&mut self, entry: &mut BibEntry) -> Result<()> {
        let name = self.parse_text_token()?.to_lowercase();
        self.skip_whitespace()?;
        self.consume('=')?;
        let content = self.parse_field_content()?;
        self.store_field(entry, &name, content)
    }

    fn store_field(&self, entry: &mut BibEntry, name: &str, content: String) -> Result<()> {
        if content.is_empty() {
            return Ok(());
        }
        let value = match entry.field(name) {
            None => content,
            Some(existing) if self.config.concatenates(name) => format!("{existing} and {content}"),
            Some(_) => {
                debug!(field = name, "ignoring repeated field");
                return Ok(());
            }
        };
        entry
            .set_field(name, value)
            .map_err(|e| self.error(SyntaxError::InvalidField(e)))
    }

    pub(crate) fn parse_field_content(&mut self) -> Result<String> {
        self.skip_whitespace()?;
        let mut value = String::new();
        loop {
            match self.s.peek()? {
                Some(',' | '}' | ')') => break,
                None => return Err(self.error(SyntaxError::UnexpectedEof)),
                Some('"') => {
                    self.consume('"')?;
                    self.parse_quoted_into(&mut value)?;
                }
                Some('{') => value.push_str(&self.parse_bracketed_text()?),
                Some(c) if c.is_ascii_digit() => {
                    let token = self.parse_text_token()?;
                    let number = normalize_number(&token)
                        .ok_or_else(|| self.error(SyntaxError::InvalidNumber(token)))?;
                    value.push_str(&number);
                }
                Some('#') => self.consume('#')?,
                Some(_) => {
                    let token = self.parse_text_token()?;
                    if token.is_empty() {
                        return Err(self.error(SyntaxError::EmptyTextToken));
                    }
                    value.push('#');
                    value.push_str(&token);
                    value.push('#');
                }
            }
            self.skip_whitespace()?;
        }
        Ok(value)
    }

    /// Append a quoted run up to its closing `"`, which is consumed. A `"`
    /// right after a backslash is content.
    fn parse_quoted_into(&mut self, value: &mut String) -> Result<()> {
        // A run never ends on a backslash, so the lookback can start empty for
        // every run of a concatenation.
        let mut last = None;
        loop {
            let next = self.s.peek()?;
            if next == Some('"') && last != Some('\\') {
                break;
            }
            let Some(c) = self.s.read()? else {
                return Err(self.error(SyntaxError::UnexpectedEof));
            };
            value.push(c);
            last = Some(c);
        }
        self.consume('"')
    }

    /// Read `{...}` with nesting; whitespace runs become one space. The outer
    /// braces are not part of the result.
    pub(crate) fn parse_bracketed_text(&mut self) -> Result<String> {
        self.consume('{')?;
        let mut value = String::new();
        let mut depth = 0usize;
        loop {
            match self.s.read()? {
                None => return Err(self.error(SyntaxError::UnexpectedEof)),
                Some('}') if depth == 0 => return Ok(value),
                Some(c) if c.is_whitespace() => {
                    self.skip_whitespace()?;
                    value.push(' ');
                }
                Some(c) => {
                    match c {
                        '{' => depth += 1,
                        '}' => depth -= 1,
                        _ => {}
                    }
                    value.push(c);
                }
            }
        }
    }

    /// Read `{...}` with nesting, keeping the text between the outer braces
    /// unchanged.
    pub(crate) fn parse_bracketed_text_exactly(&mut self) -> Result<String> {
        self.consume('{')?;
        let mut value = String::new();
        let mut depth = 0usize;
        loop {
            match self.s.read()? {
                None => return Err(self.error(SyntaxError::UnexpectedEof)),
                Some('}') if depth == 0 => return Ok(value),
                Some(c) => {
                    match c {
                        '{' => depth += 1,
                        '}' => depth -= 1,
                        _ => {}
                    }
                    value.push(c);
                }
            }
        }
    }

    fn parse_string(&mut self) -> Result<BibString> {
        self.skip_whitespace()?;
        self.consume_either('{', '(')?;
        self.skip_whitespace()?;
        let name = self.parse_text_token()?;
        self.skip_whitespace()?;
        self.consume('=')?;
        let content = self.parse_field_content()?;
        self.consume_either('}', ')')?;
        Ok(BibString::new(self.config.id_generator.next_id(), name, content))
    }

    fn parse_comment(&mut self) -> Result<()> {
        self.skip_whitespace()?;
        if self.s.peek()? != Some('{') {
            debug!(line = self.s.line(), "skipping unbraced comment");
            return Ok(());
        }
        // Long metadata values are wrapped over several lines on save.
        let comment: String = self
            .parse_bracketed_text_exactly()?
            .chars()
            .filter(|c| !matches!(c, '\r' | '\n'))
            .collect();

        let meta = comment.strip_prefix(self.config.meta_flag.as_str()).or_else(|| {
            self.config
                .legacy_meta_flag
                .as_deref()
                .and_then(|flag| comment.strip_prefix(flag))
        });
        if let Some(meta) = meta {
            match meta.split_once(':') {
                Some((key, value)) if !key.is_empty() => {
                    self.result
                        .metadata
                        .insert(key.to_string(), value.to_string());
                }
                _ => debug!(comment = %meta, "malformed metadata comment"),
            }
        } else if let Some(declaration) = comment.strip_prefix(self.config.entry_type_flag.as_str()) {
            match EntryType::parse_declaration(declaration) {
                Some(entry_type) => {
                    self.result
                        .entry_types
                        .insert(entry_type.name().to_string(), Arc::new(entry_type));
                }
                None => debug!(declaration, "malformed entry type declaration"),
            }
        }
        Ok(())
    }
}
