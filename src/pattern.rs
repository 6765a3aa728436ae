//! The input and output records of the scanner generator.

/// A named regular expression with a priority.
///
/// The priority reflects the declaration order of the pattern. Lower values denote higher
/// priorities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    /// The name of the pattern, which becomes the name of the tokens it matches.
    pub name: String,
    /// The regex text.
    pub regex: String,
    /// The priority of the pattern.
    pub priority: usize,
}

impl Pattern {
    /// Create a new pattern.
    pub fn new<N, R>(name: N, regex: R, priority: usize) -> Self
    where
        N: Into<String>,
        R: Into<String>,
    {
        Pattern {
            name: name.into(),
            regex: regex.into(),
            priority,
        }
    }

    /// Create patterns from `(name, regex)` pairs, assigning priorities by position.
    pub fn from_pairs<I, N, R>(pairs: I) -> Vec<Pattern>
    where
        I: IntoIterator<Item = (N, R)>,
        N: Into<String>,
        R: Into<String>,
    {
        pairs
            .into_iter()
            .enumerate()
            .map(|(priority, (name, regex))| Pattern::new(name, regex, priority))
            .collect()
    }
}

/// A token produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    /// The name of the pattern that matched.
    pub name: String,
    /// The matched text.
    pub value: String,
}

impl Token {
    /// Create a new token.
    pub fn new<N, V>(name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Token {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}, {}>", self.name, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_assigns_declaration_order() {
        let patterns = Pattern::from_pairs([("if", "if"), ("else", "else")]);
        assert_eq!(patterns[0], Pattern::new("if", "if", 0));
        assert_eq!(patterns[1], Pattern::new("else", "else", 1));
    }

    #[test]
    fn test_token_display() {
        assert_eq!(Token::new("num", "42").to_string(), "<num, 42>");
    }
}
