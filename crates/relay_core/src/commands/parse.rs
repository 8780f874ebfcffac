//! Turning a chat line into a command name and its arguments.

/// Splits `text` into a command name and arguments when it starts with
/// `prefix`. Returns `None` for ordinary chat and for a bare prefix.
pub fn parse_invocation(prefix: &str, text: &str) -> Option<(String, Vec<String>)> {
    let rest = text.trim_start().strip_prefix(prefix)?;
    if rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut words = split_arguments(rest).into_iter();
    let name = words.next()?;
    Some((name, words.collect()))
}

/// Whitespace-separated words, with `"double quoted"` runs kept as one word
/// and the quotes removed. An unterminated quote runs to the end of the line.
pub fn split_arguments(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;

    for c in text.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if in_word {
        words.push(current);
    }
    words
}
