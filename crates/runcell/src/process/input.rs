//! Standard input normalization

/// Rewrite request input into the bytes piped to a program
///
/// Single-line input is treated as whitespace-separated values and rewritten
/// one value per line, so a program that reads one token per line can
/// consume a line typed as `3 4`. Input that already contains a line break
/// is passed through verbatim. Returns `None` when there is nothing to
/// write; standard input is then closed immediately.
pub fn normalize_input(input: Option<&str>) -> Option<String> {
    let input = input?;
    if input.contains('\n') {
        return Some(input.to_owned());
    }

    let values: Vec<&str> = input.split_whitespace().collect();
    if values.is_empty() {
        return None;
    }

    let mut normalized = values.join("\n");
    normalized.push('\n');
    Some(normalized)
}
