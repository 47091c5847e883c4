//! Entry class discovery for JVM sources
//!
//! A lightweight lexer skips comments and string/char literals, then looks
//! for `public [modifiers] class Name` at brace depth zero. Nested public
//! classes and text that only looks like a declaration are ignored.

use crate::language::PrepareError;

/// Modifiers that may sit between `public` and `class`
const CLASS_MODIFIERS: &[&str] = &["abstract", "final", "static", "strictfp", "sealed"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    Open,
    Close,
    Other,
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Byte length of a quoted literal starting at `rest[0]`
///
/// Unterminated literals end at the line break.
fn quoted_len(rest: &str, quote: char) -> usize {
    let mut chars = rest.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '\n' => return i,
            c if c == quote => return i + c.len_utf8(),
            _ => {}
        }
    }
    rest.len()
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        loop {
            let rest = &self.src[self.pos..];
            let c = rest.chars().next()?;

            if c.is_whitespace() {
                self.pos += c.len_utf8();
                continue;
            }
            if rest.starts_with("//") {
                self.pos += rest.find('\n').map_or(rest.len(), |i| i + 1);
                continue;
            }
            if let Some(body) = rest.strip_prefix("/*") {
                self.pos += body.find("*/").map_or(rest.len(), |i| i + 4);
                continue;
            }
            if let Some(body) = rest.strip_prefix("\"\"\"") {
                self.pos += body.find("\"\"\"").map_or(rest.len(), |i| i + 6);
                return Some(Token::Other);
            }
            if c == '"' || c == '\'' {
                self.pos += quoted_len(rest, c);
                return Some(Token::Other);
            }
            if is_ident_start(c) {
                let len = rest
                    .find(|ch: char| !is_ident_part(ch))
                    .unwrap_or(rest.len());
                self.pos += len;
                return Some(Token::Ident(&rest[..len]));
            }

            self.pos += c.len_utf8();
            return Some(match c {
                '{' => Token::Open,
                '}' => Token::Close,
                _ => Token::Other,
            });
        }
    }
}

/// Distinct top-level public class names, in declaration order
pub fn public_classes(source: &str) -> Vec<String> {
    let tokens: Vec<Token<'_>> = Lexer::new(source).collect();
    let mut names: Vec<String> = Vec::new();
    let mut depth = 0usize;

    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Open => depth += 1,
            Token::Close => depth = depth.saturating_sub(1),
            Token::Ident("public") if depth == 0 => {
                let mut j = i + 1;
                while let Some(Token::Ident(word)) = tokens.get(j)
                    && CLASS_MODIFIERS.contains(word)
                {
                    j += 1;
                }
                if let (Some(Token::Ident("class")), Some(Token::Ident(name))) =
                    (tokens.get(j), tokens.get(j + 1))
                    && !names.iter().any(|n| n == name)
                {
                    names.push((*name).to_owned());
                }
            }
            _ => {}
        }
    }

    names
}

/// Resolve the entry class for `source`
///
/// Falls back to `default` when no public class is declared and refuses to
/// guess when several are.
pub fn entry_class(source: &str, default: &str) -> Result<String, PrepareError> {
    let mut names = public_classes(source);
    match names.len() {
        0 => Ok(default.to_owned()),
        1 => Ok(names.remove(0)),
        _ => Err(PrepareError::AmbiguousClass(names)),
    }
}
