use super::scanner::{Token, TokenKind};

pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

pub(super) fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// Index of the token right after the first run of `keywords` at or after `from`.
pub(crate) fn skip_until_keywords(
    sql: &str,
    tokens: &[Token],
    from: usize,
    keywords: &[&str],
) -> Option<usize> {
    if keywords.is_empty() || from + keywords.len() > tokens.len() {
        return None;
    }
    (from..=tokens.len() - keywords.len())
        .find(|&i| {
            keywords
                .iter()
                .zip(&tokens[i..])
                .all(|(kw, tok)| tok.is_keyword(sql, kw))
        })
        .map(|i| i + keywords.len())
}

/// One argument of a function call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Argument<'a> {
    /// A lone string literal, quotes included.
    Literal(&'a str),
    /// Anything else, as written.
    Expression(&'a str),
}

/// Read the argument list of a call whose `(` is `tokens[at]`.
///
/// Returns the arguments and the index after the closing `)`, or `None` if `tokens[at]`
/// is not `(` or the list is never closed.
pub(crate) fn read_parameters<'a>(
    sql: &'a str,
    tokens: &[Token],
    at: usize,
) -> Option<(Vec<Argument<'a>>, usize)> {
    if tokens.get(at)?.kind != TokenKind::Symbol(b'(') {
        return None;
    }

    let mut args = Vec::new();
    let mut depth = 0u32;
    let mut arg_start = at + 1;
    for (i, tok) in tokens.iter().enumerate().skip(at + 1) {
        match tok.kind {
            TokenKind::Symbol(b'(' | b'[') => depth += 1,
            TokenKind::Symbol(b')') if depth == 0 => {
                if i > arg_start || !args.is_empty() {
                    args.push(argument(sql, &tokens[arg_start..i]));
                }
                return Some((args, i + 1));
            }
            TokenKind::Symbol(b')' | b']') => depth = depth.saturating_sub(1),
            TokenKind::Symbol(b',') if depth == 0 => {
                args.push(argument(sql, &tokens[arg_start..i]));
                arg_start = i + 1;
            }
            _ => {}
        }
    }
    None
}

fn argument<'a>(sql: &'a str, tokens: &[Token]) -> Argument<'a> {
    match tokens {
        [only] if only.kind == TokenKind::StringLiteral => Argument::Literal(only.text(sql)),
        [first, .., last] => Argument::Expression(&sql[first.start..last.end]),
        [only] => Argument::Expression(only.text(sql)),
        [] => Argument::Expression(""),
    }
}

/// Strip the surrounding quotes of a string literal and resolve its escapes.
pub(crate) fn unescape(literal: &str) -> String {
    let body = literal
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(literal);

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some('b') => out.push('\u{8}'),
                Some('f') => out.push('\u{c}'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            '\'' if chars.peek() == Some(&'\'') => {
                chars.next();
                out.push('\'');
            }
            _ => out.push(ch),
        }
    }
    out
}
