//! Pushback character access over BibTeX input with position tracking.

use std::io::{self, BufRead};
use std::iter::Fuse;

type CharSource<'a> = Fuse<Box<dyn Iterator<Item = io::Result<char>> + 'a>>;

/// Location of a character in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Position {
    /// 1-based line.
    pub(crate) line: usize,
    /// 1-based column, counted in chars.
    pub(crate) column: usize,
    /// Byte offset from the start of the input.
    pub(crate) offset: usize,
}

impl Position {
    const START: Position = Position {
        line: 1,
        column: 1,
        offset: 0,
    };

    fn advance(self, c: char) -> Position {
        if c == '\n' {
            Position {
                line: self.line + 1,
                column: 1,
                offset: self.offset + 1,
            }
        } else {
            Position {
                line: self.line,
                column: self.column + 1,
                offset: self.offset + c.len_utf8(),
            }
        }
    }
}

/// A char-based scanner with one character of pushback.
///
/// `None` from [`Scanner::read`] is the end-of-stream sentinel. The underlying
/// source is fused, so reading past the end keeps yielding `None`.
pub(crate) struct Scanner<'a> {
    source: CharSource<'a>,
    pushback: Option<char>,
    /// Position of the next character to be read.
    pos: Position,
    /// Position of the last character read; restored by [`Scanner::unread`].
    prev: Position,
    /// Byte length of the last character read, 0 once it is pushed back.
    last_len: usize,
    eof: bool,
}

impl<'a> Scanner<'a> {
    /// Create a scanner over an in-memory string.
    pub(crate) fn new(src: &'a str) -> Self {
        Self::with_source(Box::new(src.chars().map(Ok::<char, io::Error>)))
    }

    /// Create a scanner decoding UTF-8 from a buffered reader.
    pub(crate) fn from_reader<R: BufRead + 'a>(reader: R) -> Self {
        Self::with_source(Box::new(Utf8Chars::new(reader)))
    }

    fn with_source(source: Box<dyn Iterator<Item = io::Result<char>> + 'a>) -> Self {
        Self {
            source: source.fuse(),
            pushback: None,
            pos: Position::START,
            prev: Position::START,
            last_len: 0,
            eof: false,
        }
    }

    /// Consume the next char.
    pub(crate) fn read(&mut self) -> io::Result<Option<char>> {
        let next = match self.pushback.take() {
            Some(c) => Some(c),
            None => self.source.next().transpose()?,
        };
        self.prev = self.pos;
        self.last_len = 0;
        if let Some(c) = next {
            self.pos = self.pos.advance(c);
            self.last_len = c.len_utf8();
        }
        Ok(next)
    }

    /// Push back the char returned by the last [`Scanner::read`] so the next
    /// read returns it again.
    ///
    /// Pushing back the end-of-stream sentinel does nothing.
    pub(crate) fn unread(&mut self, c: Option<char>) {
        if let Some(c) = c {
            debug_assert!(self.pushback.is_none(), "only one char of pushback");
            self.pos = self.prev;
            self.last_len = 0;
            self.pushback = Some(c);
        }
    }

    /// Peek at the next char without consuming it.
    pub(crate) fn peek(&mut self) -> io::Result<Option<char>> {
        let c = self.read()?;
        self.unread(c);
        Ok(c)
    }

    /// The current 1-based line number.
    pub(crate) fn line(&self) -> usize {
        self.pos.line
    }

    /// Where the last consumed character starts and its byte length. When
    /// nothing is consumed (end of input, or the char was pushed back) this is
    /// the empty range at the next character.
    pub(crate) fn last_char(&self) -> (Position, usize) {
        if self.last_len > 0 {
            (self.prev, self.last_len)
        } else {
            (self.pos, 0)
        }
    }

    /// Record that the end of the input has been reached.
    pub(crate) fn mark_eof(&mut self) {
        self.eof = true;
    }

    /// Whether the parser has seen the end of the input.
    pub(crate) fn is_eof(&self) -> bool {
        self.eof
    }
}

/// Decodes a [`BufRead`] into chars one line at a time.
struct Utf8Chars<R> {
    reader: R,
    buf: String,
    pos: usize,
    done: bool,
}

impl<R: BufRead> Utf8Chars<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            pos: 0,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for Utf8Chars<R> {
    type Item = io::Result<char>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(c) = self.buf[self.pos..].chars().next() {
                self.pos += c.len_utf8();
                return Some(Ok(c));
            }
            if self.done {
                return None;
            }
            self.buf.clear();
            self.pos = 0;
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => self.done = true,
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
