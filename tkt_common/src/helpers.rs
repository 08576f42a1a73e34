/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Keeps only the ASCII digits of `raw` and returns the last `n` of them, or `None` if there are fewer than `n`.
pub fn last_n_digits(raw: &str, n: usize) -> Option<String> {
    let digits = raw.chars().filter(char::is_ascii_digit).collect::<String>();
    (digits.len() >= n).then(|| digits[digits.len() - n..].to_string())
}
