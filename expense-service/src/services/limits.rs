//! Input limits checked before a message reaches the parser.

use crate::error::LimitError;
use crate::services::parser::content_lines;

/// Maximum message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4096;
/// Maximum number of non-blank lines.
pub const MAX_LINES: usize = 100;
/// Maximum length of a single line in characters, surrounding whitespace excluded.
pub const MAX_LINE_LENGTH: usize = 100;

/// What the guard hands on to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guarded<'a> {
    /// Absent, empty or whitespace-only input. Not a failure.
    Empty,
    Text(&'a str),
}

/// Check `text` against the limits in precedence order: total length,
/// line count, then per-line length. Every ceiling is inclusive.
pub fn check_limits(text: Option<&str>) -> Result<Guarded<'_>, LimitError> {
    let text = match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Ok(Guarded::Empty),
    };

    let length = text.chars().count();
    if length > MAX_MESSAGE_LENGTH {
        return Err(LimitError::MessageTooLong {
            length,
            max: MAX_MESSAGE_LENGTH,
        });
    }

    let count = content_lines(text).count();
    if count > MAX_LINES {
        return Err(LimitError::TooManyLines {
            count,
            max: MAX_LINES,
        });
    }

    for line in content_lines(text) {
        let line = line.trim();
        let length = line.chars().count();
        if length > MAX_LINE_LENGTH {
            return Err(LimitError::LineTooLong {
                line: line.to_string(),
                length,
                max: MAX_LINE_LENGTH,
            });
        }
    }

    Ok(Guarded::Text(text))
}
