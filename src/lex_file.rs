//! Parsing of lex definition texts.
//!
//! Each non-empty line defines one pattern in the form
//! ```text
//! name:<NAME>     pattern:<REGEX>
//! ```
//! where the two parts are separated by at least five spaces. The priority of a pattern is
//! given by its line order, the first definition has the highest priority.

use std::collections::BTreeSet;

use crate::{LexGenError, LexGenErrorKind, Pattern, Result};

const SEPARATOR: &str = "     ";
const NAME_PREFIX: &str = "name:";
const PATTERN_PREFIX: &str = "pattern:";

/// Parse the pattern definitions of a lex definition text.
/// # Errors
/// Returns a `LexFileError` with the 1-based line number for malformed lines and a
/// `DuplicatePattern` error if a name is defined twice.
pub fn parse_lex_definitions(text: &str) -> Result<Vec<Pattern>> {
    let mut patterns = Vec::new();
    let mut names = BTreeSet::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let error = |message: &str| {
            LexGenError::new(LexGenErrorKind::LexFileError {
                line: index + 1,
                message: message.to_string(),
            })
        };
        let (name, regex) = line
            .split_once(SEPARATOR)
            .ok_or_else(|| error("expected name and pattern separated by five spaces"))?;
        let name = name
            .strip_prefix(NAME_PREFIX)
            .ok_or_else(|| error("expected 'name:' at the start of the line"))?;
        let regex = regex
            .trim_start_matches(' ')
            .strip_prefix(PATTERN_PREFIX)
            .ok_or_else(|| error("expected 'pattern:' after the name"))?;
        if name.is_empty() {
            return Err(error("empty name"));
        }
        if regex.is_empty() {
            return Err(error("empty pattern"));
        }
        if !names.insert(name.to_string()) {
            return Err(LexGenError::new(LexGenErrorKind::DuplicatePattern(
                name.to_string(),
            )));
        }
        patterns.push(Pattern::new(name, regex, patterns.len()));
    }
    Ok(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITIONS: &str = "\
name:if     pattern:if
name:else     pattern:else

  name:id       pattern:[a-z][a-z0-9_]*
name:space     pattern:\\n|\\t   
";

    fn line_error(text: &str) -> usize {
        let error = parse_lex_definitions(text).unwrap_err();
        match *error.source {
            LexGenErrorKind::LexFileError { line, .. } => line,
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn test_parse_lex_definitions() {
        let patterns = parse_lex_definitions(DEFINITIONS).unwrap();
        assert_eq!(
            patterns,
            vec![
                Pattern::new("if", "if", 0),
                Pattern::new("else", "else", 1),
                Pattern::new("id", "[a-z][a-z0-9_]*", 2),
                Pattern::new("space", "\\n|\\t", 3),
            ]
        );
    }

    #[test]
    fn test_malformed_lines() {
        assert_eq!(line_error("name:a     pattern:a\nname:b pattern:b"), 2);
        assert_eq!(line_error("id:a     pattern:a"), 1);
        assert_eq!(line_error("name:a     regex:a"), 1);
        assert_eq!(line_error("\n\nname:     pattern:a"), 3);
        assert_eq!(line_error("name:a     pattern:"), 1);
    }

    #[test]
    fn test_duplicate_names() {
        let error = parse_lex_definitions("name:a     pattern:a\nname:a     pattern:b").unwrap_err();
        assert!(matches!(
            error.kind(),
            LexGenErrorKind::DuplicatePattern(name) if name == "a"
        ));
    }
}
