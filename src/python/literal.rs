//! Python string literals and identifiers.

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// A name usable as a variable or keyword argument.
pub fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c == '_' || c.is_alphabetic());
    starts_well && chars.all(|c| c == '_' || c.is_alphanumeric()) && !is_keyword(word)
}

/// Prefix letters of a literal, lowercased (`rb`, `f`, ...).
pub fn prefix(literal: &str) -> String {
    literal
        .chars()
        .take_while(|c| *c != '\'' && *c != '"')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Value of a `str` literal written with its prefix and quotes. Bytes and
/// f-strings have no plain value.
pub fn string_value(literal: &str) -> Option<String> {
    let prefix = prefix(literal);
    if prefix.contains('b') || prefix.contains('f') {
        return None;
    }
    let quoted = &literal[prefix.len()..];
    let width = if quoted.starts_with("'''") || quoted.starts_with("\"\"\"") {
        3
    } else {
        1
    };
    if quoted.len() < 2 * width {
        return None;
    }
    unescape(&quoted[width..quoted.len() - width], prefix.contains('r'))
}

/// Value of a literal piece of an f-string.
pub fn fstring_piece(text: &str, raw: bool) -> Option<String> {
    unescape(&text.replace("{{", "{").replace("}}", "}"), raw)
}

/// Resolves backslash escapes. Named `\N{...}` escapes are not supported.
pub fn unescape(body: &str, raw: bool) -> Option<String> {
    if raw {
        return Some(body.to_string());
    }
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            '\\' | '\'' | '"' => out.push(next),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut value = next.to_digit(8)?;
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value)?);
            }
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.by_ref().take(width).collect();
                if digits.len() != width {
                    return None;
                }
                out.push(char::from_u32(u32::from_str_radix(&digits, 16).ok()?)?);
            }
            'N' => return None,
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}
