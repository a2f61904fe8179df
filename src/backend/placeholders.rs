//! Named-to-positional placeholder rewriting for drivers that only accept `?`.

/// Rewrites `:name` placeholders to `?`, returning the new statement and the
/// names in binding order.
///
/// Text inside `'...'`, `"..."`, `` `...` `` and `[...]` is copied verbatim,
/// and `::` (a cast in some dialects) is not treated as a placeholder.
pub fn to_positional(sql: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(sql.len());
    let mut names = Vec::new();
    let mut chars = sql.chars().peekable();
    let mut closing: Option<char> = None;
    let mut prev = '\0';

    while let Some(c) = chars.next() {
        if let Some(end) = closing {
            out.push(c);
            if c == end {
                closing = None;
            }
            prev = c;
            continue;
        }

        match c {
            '\'' | '"' | '`' => closing = Some(c),
            '[' => closing = Some(']'),
            ':' if prev != ':'
                && chars
                    .peek()
                    .is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') =>
            {
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        name.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                names.push(name);
                out.push('?');
                prev = '?';
                continue;
            },
            _ => {},
        }

        out.push(c);
        prev = c;
    }

    (out, names)
}
