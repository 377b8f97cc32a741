use super::parsers::{
    is_block_comment_end, is_block_comment_start, is_line_comment_start, is_word_byte,
};
use crate::error::SessionError;

#[derive(Clone, Copy)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    BackQuoted,
    LineComment,
    BlockComment(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// Keyword, identifier or number.
    Word,
    /// `'...'`, quotes included.
    StringLiteral,
    /// `"..."` or `` `...` ``, quotes included.
    QuotedIdent,
    Placeholder,
    Symbol(u8),
}

/// A top-level token; `start..end` is a byte range into the scanned SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl Token {
    pub(crate) fn text<'a>(&self, sql: &'a str) -> &'a str {
        &sql[self.start..self.end]
    }

    pub(crate) fn is_keyword(&self, sql: &str, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text(sql).eq_ignore_ascii_case(keyword)
    }
}

/// Split SQL into top-level tokens, dropping whitespace and comments.
///
/// String literals accept backslash escapes and doubled quotes; block comments nest.
///
/// # Errors
/// Returns `SessionError::Client` for an unterminated literal, identifier or block comment.
pub(crate) fn tokenize(sql: &str) -> Result<Vec<Token>, SessionError> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut state = State::Normal;
    let mut start = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                _ if b.is_ascii_whitespace() => {}
                _ if is_line_comment_start(bytes, idx) => {
                    state = State::LineComment;
                    idx += 1;
                }
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'\'' => {
                    state = State::SingleQuoted;
                    start = idx;
                }
                b'"' => {
                    state = State::DoubleQuoted;
                    start = idx;
                }
                b'`' => {
                    state = State::BackQuoted;
                    start = idx;
                }
                b'?' => tokens.push(Token {
                    kind: TokenKind::Placeholder,
                    start: idx,
                    end: idx + 1,
                }),
                _ if is_word_byte(b) => {
                    let mut end = idx + 1;
                    while end < bytes.len() && is_word_byte(bytes[end]) {
                        end += 1;
                    }
                    tokens.push(Token {
                        kind: TokenKind::Word,
                        start: idx,
                        end,
                    });
                    idx = end - 1;
                }
                _ => tokens.push(Token {
                    kind: TokenKind::Symbol(b),
                    start: idx,
                    end: idx + 1,
                }),
            },
            State::SingleQuoted | State::DoubleQuoted | State::BackQuoted => {
                let (quote, kind) = match state {
                    State::SingleQuoted => (b'\'', TokenKind::StringLiteral),
                    State::DoubleQuoted => (b'"', TokenKind::QuotedIdent),
                    _ => (b'`', TokenKind::QuotedIdent),
                };
                if b == b'\\' {
                    idx += 1; // skip escaped byte
                } else if b == quote {
                    if bytes.get(idx + 1) == Some(&quote) {
                        idx += 1; // skip doubled quote
                    } else {
                        tokens.push(Token {
                            kind,
                            start,
                            end: idx + 1,
                        });
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
        }
        idx += 1;
    }

    match state {
        State::Normal | State::LineComment => Ok(tokens),
        State::SingleQuoted => Err(SessionError::Client(format!(
            "Unterminated string literal at position {start}"
        ))),
        State::DoubleQuoted | State::BackQuoted => Err(SessionError::Client(format!(
            "Unterminated quoted identifier at position {start}"
        ))),
        State::BlockComment(_) => Err(SessionError::Client(
            "Unterminated block comment".to_string(),
        )),
    }
}
