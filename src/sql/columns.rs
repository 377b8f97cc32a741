use std::fmt;

use crate::error::SessionError;

/// One column of an `input(...)` structure: a name and its ClickHouse type, as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: String,
}

impl ColumnSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.data_type.starts_with("Nullable(")
    }
}

impl fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.data_type)
    }
}

/// Parse a structure like `a Int32, b Nullable(String), e Enum8('x' = 1)`.
///
/// # Errors
/// Returns `SessionError::Client` for an empty list, a column without a type, or
/// unbalanced quotes/parentheses.
pub fn parse_columns(structure: &str) -> Result<Vec<ColumnSpec>, SessionError> {
    let items = split_top_level(structure)?;
    if items.iter().all(|s| s.trim().is_empty()) {
        return Err(SessionError::Client(
            "Column list of input() must not be empty".to_string(),
        ));
    }
    items.into_iter().map(parse_column).collect()
}

fn parse_column(item: &str) -> Result<ColumnSpec, SessionError> {
    let item = item.trim();
    let (name, rest) = match item.chars().next() {
        Some(quote @ ('`' | '"')) => {
            let body = &item[1..];
            let close = body.find(quote).ok_or_else(|| {
                SessionError::Client(format!("Unterminated column name in {item:?}"))
            })?;
            (body[..close].to_string(), &body[close + 1..])
        }
        Some(_) => {
            let end = item.find(char::is_whitespace).unwrap_or(item.len());
            (item[..end].to_string(), &item[end..])
        }
        None => {
            return Err(SessionError::Client(
                "Empty column definition in input()".to_string(),
            ));
        }
    };

    let data_type = rest.trim();
    if name.is_empty() || data_type.is_empty() {
        return Err(SessionError::Client(format!(
            "Column definition {item:?} needs a name and a type"
        )));
    }
    Ok(ColumnSpec::new(name, data_type))
}

fn split_top_level(s: &str) -> Result<Vec<&str>, SessionError> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (idx, ch) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(SessionError::Client(format!(
                        "Unbalanced parentheses in column list {s:?}"
                    )));
                }
            }
            ',' if depth == 0 => {
                items.push(&s[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }

    if quote.is_some() || depth != 0 {
        return Err(SessionError::Client(format!(
            "Unbalanced quotes or parentheses in column list {s:?}"
        )));
    }
    items.push(&s[start..]);
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_structure() {
        assert_eq!(
            parse_columns("a Int32, b String").expect("columns"),
            vec![ColumnSpec::new("a", "Int32"), ColumnSpec::new("b", "String")]
        );
    }

    #[test]
    fn parses_nested_and_quoted() {
        let cols = parse_columns(
            "`my col` Nullable(String), \"m\" Map(String, Array(UInt8)), e Enum8('a,b' = 1, 'c' = 2)",
        )
        .expect("columns");
        assert_eq!(cols.len(), 3);
        assert_eq!(cols[0], ColumnSpec::new("my col", "Nullable(String)"));
        assert!(cols[0].is_nullable());
        assert_eq!(cols[1].data_type, "Map(String, Array(UInt8))");
        assert_eq!(cols[2].data_type, "Enum8('a,b' = 1, 'c' = 2)");
        assert_eq!(cols[2].to_string(), "e: Enum8('a,b' = 1, 'c' = 2)");
    }

    #[test]
    fn rejects_malformed_structures() {
        for bad in ["", "   ", "a", "a Int32,", "a Tuple(Int32", "a Int32)", "`a Int32"] {
            assert!(
                matches!(parse_columns(bad), Err(SessionError::Client(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
