use std::fmt::Write as _;

/// Escapes user supplied text before it is broadcast to browsers.
///
/// `&`, `<` and `>` become HTML entities and every non-ASCII character becomes
/// a numeric character reference, so the payload is plain ASCII.
pub(crate) fn escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            c if c.is_ascii() => escaped.push(c),
            c => {
                let _ = write!(escaped, "&#{};", c as u32);
            }
        }
    }
    escaped
}
