//! Token locator — finds the command a cursor is on.
//!
//! Catscript statements start at column 0 with a command identifier made of
//! uppercase letters, digits, `_` and `.`, optionally followed by `!`:
//!
//! ```text
//! @label: UTIL.LOG! "hello"
//! WAIT 10
//! ```
//!
//! An identifier with a dot is `<scope>.<command>`; without one the command
//! lives in `BASE`. The scanners here are small hand-written state machines
//! over bytes. All offsets are byte offsets into the line; use `byte_offset`
//! to convert an LSP character position first.

use std::ops::Range;

use crate::schema::BASE_SCOPE;

/// A command identifier located in a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandToken<'a> {
    pub scope: &'a str,
    pub command: &'a str,
    /// Byte span of the whole match, label prefix included.
    pub span: Range<usize>,
}

fn is_ident(b: u8) -> bool {
    b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_' || b == b'.'
}

fn is_label(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Convert an LSP character offset (UTF-16 code units) into a byte offset,
/// clamped to the line length.
pub fn byte_offset(line: &str, character: u32) -> usize {
    let mut units = 0u32;
    for (idx, ch) in line.char_indices() {
        if units >= character {
            return idx;
        }
        units += ch.len_utf16() as u32;
    }
    line.len()
}

/// Command token under the cursor for hover.
///
/// Matches `[@label: ]IDENT[!]` anchored at column 0. Returns `None` when the
/// line does not start with a command or `offset` lies past the match.
pub fn hover_token(line: &str, offset: usize) -> Option<CommandToken<'_>> {
    let bytes = line.as_bytes();
    let mut pos = 0;

    // Label: '@' label-chars ':' whitespace
    if bytes.first() == Some(&b'@') {
        let mut i = 1;
        while i < bytes.len() && is_label(bytes[i]) {
            i += 1;
        }
        if i == 1 || bytes.get(i) != Some(&b':') {
            return None;
        }
        i += 1;
        let ws_start = i;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i == ws_start {
            return None;
        }
        pos = i;
    }

    let ident_start = pos;
    while pos < bytes.len() && is_ident(bytes[pos]) {
        pos += 1;
    }
    if pos == ident_start {
        return None;
    }
    let ident = &line[ident_start..pos];

    if bytes.get(pos) == Some(&b'!') {
        pos += 1;
    }
    if offset >= pos {
        return None;
    }

    let mut parts = ident.split('.');
    let first = parts.next().unwrap_or_default();
    let (scope, command) = match parts.next() {
        Some(second) => (first, second),
        None => (BASE_SCOPE, first),
    };

    Some(CommandToken {
        scope,
        command,
        span: 0..pos,
    })
}

/// Whether the cursor already sits past a command, in argument position.
///
/// Looks at the line up to one byte before the cursor for an identifier run
/// that starts the line or follows whitespace and is itself followed by
/// whitespace.
pub fn completion_suppressed(line: &str, cursor: usize) -> bool {
    let end = cursor.saturating_sub(1).min(line.len());
    let bytes = &line.as_bytes()[..end];

    let mut i = 0;
    while i < bytes.len() {
        let at_boundary = i == 0 || bytes[i - 1].is_ascii_whitespace();
        if at_boundary && is_ident(bytes[i]) {
            let mut j = i;
            while j < bytes.len() && is_ident(bytes[j]) {
                j += 1;
            }
            if j < bytes.len() && bytes[j].is_ascii_whitespace() {
                return true;
            }
            i = j;
        } else {
            i += 1;
        }
    }
    false
}

/// Scope name typed before a `.` that triggered completion.
///
/// `cursor` is just after the dot; the scope is the word touching the byte
/// two positions back (the last character before the dot).
pub fn dot_scope(line: &str, cursor: usize) -> Option<&str> {
    let col = cursor.checked_sub(2)?;
    word_at(line, col)
}

/// Word (`[A-Za-z0-9_]+`) containing or ending at `col`.
pub fn word_at(line: &str, col: usize) -> Option<&str> {
    if col > line.len() {
        return None;
    }
    let bytes = line.as_bytes();

    let mut start = col;
    while start > 0 && is_word(bytes[start - 1]) {
        start -= 1;
    }

    let mut end = col;
    while end < bytes.len() && is_word(bytes[end]) {
        end += 1;
    }

    if start == end {
        return None;
    }

    Some(&line[start..end])
}
