// src/interp/line.rs

//! Classification of a single (already trimmed, non-comment) line.

/// What a config line means to the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    /// `if [ ... ]; then`
    Open,
    /// `fi`
    Close,
    /// `else` / `elif`: recognised only so they can be rejected.
    Unsupported(&'a str),
    /// `KEY=value` (value still raw: comments and expansion not applied).
    Assignment { key: &'a str, value: &'a str },
    /// Anything else; ignored.
    Other,
}

/// `if`, `fi`, `else` or `elif` lines; `None` for anything else.
pub fn block_keyword(line: &str) -> Option<Line<'_>> {
    if line == "fi" {
        return Some(Line::Close);
    }

    let keyword = line
        .split(|c: char| c.is_whitespace() || c == ';' || c == '[')
        .next()
        .unwrap_or_default();

    match keyword {
        "if" => Some(Line::Open),
        "else" | "elif" => Some(Line::Unsupported(keyword)),
        _ => None,
    }
}

pub fn classify(line: &str) -> Result<Line<'_>, String> {
    if let Some(keyword) = block_keyword(line) {
        return Ok(keyword);
    }

    if line.contains('=') && !line.contains("==") {
        let body = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);
        if let Some((key, value)) = body.split_once('=') {
            if !is_identifier(key) {
                return Err(format!("malformed assignment: '{key}' is not a valid variable name"));
            }
            return Ok(Line::Assignment { key, value });
        }
    }

    Ok(Line::Other)
}

/// Evaluate the single `a == b` comparison of an (already expanded) `if` line.
pub fn evaluate_condition(expanded: &str) -> Result<bool, String> {
    let tokens: Vec<&str> = expanded.split_whitespace().collect();

    if let Some(op) = tokens
        .iter()
        .find(|t| matches!(**t, "&&" | "||" | "-a" | "-o"))
    {
        return Err(format!(
            "multi-term conditional ('{op}') is not supported; use a single `==` comparison"
        ));
    }

    let eq_positions: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| **t == "==")
        .map(|(i, _)| i)
        .collect();

    let pos = match eq_positions.as_slice() {
        [pos] => *pos,
        [] => return Err("conditional must compare with `==`".to_string()),
        _ => return Err("conditional must contain exactly one `==`".to_string()),
    };

    // tokens[0] is the `if` keyword itself.
    if pos < 2 || pos + 1 >= tokens.len() {
        return Err("`==` needs an operand on each side".to_string());
    }

    Ok(tokens[pos - 1] == tokens[pos + 1])
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Drop an inline `# comment` from an assignment value.
pub fn strip_inline_comment(value: &str) -> &str {
    value.split('#').next().unwrap_or_default().trim()
}
