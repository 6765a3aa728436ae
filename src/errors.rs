use thiserror::Error;

/// The result type for the `lexgen` crate.
pub type Result<T> = std::result::Result<T, LexGenError>;

/// The error type for the `lexgen` crate.
#[derive(Error, Debug)]
pub struct LexGenError {
    /// The source of the error.
    pub source: Box<LexGenErrorKind>,
}

impl LexGenError {
    /// Create a new `LexGenError`.
    pub fn new(kind: LexGenErrorKind) -> Self {
        LexGenError {
            source: Box::new(kind),
        }
    }

    /// Get the kind of the error.
    pub fn kind(&self) -> &LexGenErrorKind {
        &self.source
    }
}

impl std::fmt::Display for LexGenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// The error kind type.
#[derive(Error, Debug)]
pub enum LexGenErrorKind {
    /// A pattern's regex text is malformed.
    #[error(transparent)]
    RegexSyntaxError(#[from] RegexSyntaxError),

    /// An invariant of the automaton construction has been violated.
    #[error("Internal build error: {0}")]
    InternalBuildError(String),

    /// The scanned input contains text no pattern matches.
    #[error("No pattern matches the input at position {position} (pending text '{}')", .buffer.escape_default())]
    UnmatchedInputError {
        /// The char index at which scanning got stuck.
        position: usize,
        /// The text consumed for the token in progress.
        buffer: String,
    },

    /// Two patterns of one compilation share the same name.
    #[error("Duplicate pattern name '{0}'")]
    DuplicatePattern(String),

    /// A line of a lex definition text is malformed.
    #[error("Lex definition error in line {line}: {message}")]
    LexFileError {
        /// The 1-based line number.
        line: usize,
        /// What is wrong with the line.
        message: String,
    },

    /// A std::io error occurred.
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl From<RegexSyntaxError> for LexGenError {
    fn from(error: RegexSyntaxError) -> Self {
        LexGenError::new(LexGenErrorKind::RegexSyntaxError(error))
    }
}

impl From<std::io::Error> for LexGenError {
    fn from(error: std::io::Error) -> Self {
        LexGenError::new(LexGenErrorKind::IoError(error))
    }
}

/// A syntax error in a regex.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct RegexSyntaxError {
    /// The name of the pattern the regex belongs to, if known.
    pub pattern: Option<String>,
    /// The char index into the regex text.
    pub position: usize,
    /// What went wrong.
    pub kind: RegexSyntaxErrorKind,
}

impl RegexSyntaxError {
    /// Create a new syntax error without pattern name.
    pub fn new(position: usize, kind: RegexSyntaxErrorKind) -> Self {
        RegexSyntaxError {
            pattern: None,
            position,
            kind,
        }
    }

    /// Attach the pattern name.
    pub fn with_pattern(mut self, name: &str) -> Self {
        self.pattern = Some(name.to_string());
        self
    }
}

impl std::fmt::Display for RegexSyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.pattern {
            Some(name) => write!(
                f,
                "Regex syntax error in pattern '{}' at position {}: {}",
                name, self.position, self.kind
            ),
            None => write!(
                f,
                "Regex syntax error at position {}: {}",
                self.position, self.kind
            ),
        }
    }
}

/// The kinds of regex syntax errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegexSyntaxErrorKind {
    /// The regex is empty.
    #[error("empty regex")]
    EmptyRegex,

    /// An opening delimiter has no closing one or vice versa.
    #[error("unbalanced delimiter '{0}'")]
    UnbalancedDelimiter(char),

    /// A backslash is followed by a character that can't be escaped.
    #[error("invalid escape target {0:?}")]
    InvalidEscape(Option<char>),

    /// A character range inside brackets is invalid.
    #[error("invalid range '{0}-{1}'")]
    InvalidRange(char, char),

    /// An alternation lacks one of its sides.
    #[error("dangling alternation")]
    DanglingAlternation,

    /// A group or bracket expression has no content.
    #[error("empty group")]
    EmptyGroup,

    /// A postfix operator has nothing to apply to.
    #[error("operator '{0}' without operand")]
    MissingOperand(char),

    /// The content of a `{...}` repetition is malformed.
    #[error("invalid repetition: {0}")]
    InvalidRepetition(String),

    /// The character is not part of the alphabet.
    #[error("character {0:?} is not in the alphabet")]
    UnknownCharacter(char),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_syntax_error_display() {
        let error = RegexSyntaxError::new(3, RegexSyntaxErrorKind::InvalidRange('z', 'a'))
            .with_pattern("ident");
        assert_eq!(
            error.to_string(),
            "Regex syntax error in pattern 'ident' at position 3: invalid range 'z-a'"
        );

        let error: LexGenError = error.into();
        assert!(matches!(
            error.kind(),
            LexGenErrorKind::RegexSyntaxError(RegexSyntaxError { position: 3, .. })
        ));
    }

    #[test]
    fn test_unmatched_input_display() {
        let error = LexGenError::new(LexGenErrorKind::UnmatchedInputError {
            position: 4,
            buffer: "a\n".to_string(),
        });
        assert_eq!(
            error.to_string(),
            "No pattern matches the input at position 4 (pending text 'a\\n')"
        );
    }
}
