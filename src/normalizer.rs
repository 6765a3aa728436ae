//! This module contains the regex normalizer.
//! The normalizer rewrites the infix regex syntax into a postfix token sequence that the
//! Thompson builder evaluates left to right.
//!
//! Concatenation is positional in the postfix form: consecutive operands are concatenated by
//! the builder when it reaches the end of a group or the end of the input. Alternation is
//! emitted as a trailing `|` after both of its sides. A side consisting of more than one
//! operand is wrapped in a group so that `|` always combines exactly two fragments.

use std::time::Instant;

use log::trace;

use crate::{
    alphabet::{self, CharClass},
    errors::{RegexSyntaxError, RegexSyntaxErrorKind},
};

/// A bounded or unbounded repetition `{n}`, `{n,}` or `{n,m}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repetition {
    /// `{n}`
    Exactly(usize),
    /// `{n,}`
    AtLeast(usize),
    /// `{n,m}`
    Bounded(usize, usize),
}

// Upper limit for the counts of a repetition. Each count is expanded into copies of the
// repeated fragment.
const MAX_REPETITION: usize = 1000;

impl std::fmt::Display for Repetition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Repetition::Exactly(n) => write!(f, "{{{}}}", n),
            Repetition::AtLeast(n) => write!(f, "{{{},}}", n),
            Repetition::Bounded(n, m) => write!(f, "{{{},{}}}", n, m),
        }
    }
}

/// A token of the postfix form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostfixToken {
    /// A literal character of the alphabet. Escapes are already resolved.
    Char(char),
    /// The wildcard `.`.
    Any,
    /// A character range inside brackets, already validated.
    Range(char, char),
    /// `(`
    OpenGroup,
    /// `)`
    CloseGroup,
    /// `[`
    OpenClass,
    /// `]`
    CloseClass,
    /// `*`
    Star,
    /// `+`
    Plus,
    /// `?`
    Question,
    /// `|`
    Alternation,
    /// `{n}`, `{n,}` or `{n,m}`
    Repeat(Repetition),
}

impl std::fmt::Display for PostfixToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostfixToken::Char(c) => write!(f, "{}", alphabet::escape(*c)),
            PostfixToken::Any => write!(f, "."),
            PostfixToken::Range(first, last) => {
                write!(f, "{}-{}", alphabet::escape(*first), alphabet::escape(*last))
            }
            PostfixToken::OpenGroup => write!(f, "("),
            PostfixToken::CloseGroup => write!(f, ")"),
            PostfixToken::OpenClass => write!(f, "["),
            PostfixToken::CloseClass => write!(f, "]"),
            PostfixToken::Star => write!(f, "*"),
            PostfixToken::Plus => write!(f, "+"),
            PostfixToken::Question => write!(f, "?"),
            PostfixToken::Alternation => write!(f, "|"),
            PostfixToken::Repeat(repetition) => write!(f, "{}", repetition),
        }
    }
}

/// The postfix form of a regex.
/// Its string representation is the postfix regex text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Postfix(Vec<PostfixToken>);

impl Postfix {
    /// Get the tokens.
    pub fn tokens(&self) -> &[PostfixToken] {
        &self.0
    }
}

impl std::fmt::Display for Postfix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.iter().try_for_each(|token| write!(f, "{}", token))
    }
}

impl<'a> IntoIterator for &'a Postfix {
    type Item = &'a PostfixToken;
    type IntoIter = std::slice::Iter<'a, PostfixToken>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

type NormalizeResult<T> = std::result::Result<T, RegexSyntaxError>;

/// Rewrite an infix regex into its postfix form.
/// # Errors
/// A `RegexSyntaxError` is returned for unbalanced delimiters, invalid escapes, invalid or
/// inverted ranges, dangling alternations and other malformed input. The error carries the
/// char index of the offending position.
pub fn normalize(regex: &str) -> NormalizeResult<Postfix> {
    let now = Instant::now();
    let mut normalizer = Normalizer {
        chars: regex.chars().collect(),
        pos: 0,
    };
    if normalizer.chars.is_empty() {
        return Err(RegexSyntaxError::new(0, RegexSyntaxErrorKind::EmptyRegex));
    }
    let tokens = normalizer.alternation()?;
    if let Some(c) = normalizer.peek() {
        // Only a closing parenthesis without matching opening one stops the top level.
        return Err(normalizer.error(RegexSyntaxErrorKind::UnbalancedDelimiter(c)));
    }
    let postfix = Postfix(tokens);
    trace!(
        "Normalized '{}' to '{}' in {} milliseconds.",
        regex.escape_default(),
        postfix.to_string().escape_default(),
        now.elapsed().as_millis()
    );
    Ok(postfix)
}

struct Normalizer {
    chars: Vec<char>,
    pos: usize,
}

impl Normalizer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn error(&self, kind: RegexSyntaxErrorKind) -> RegexSyntaxError {
        RegexSyntaxError::new(self.pos, kind)
    }

    /// Alternatives separated by `|` up to the end of the enclosing group.
    fn alternation(&mut self) -> NormalizeResult<Vec<PostfixToken>> {
        let mut output = Vec::new();
        let mut alternatives = 0;
        loop {
            let (mut tokens, operands) = self.concatenation()?;
            let at_bar = self.peek() == Some('|');
            let is_alternation = alternatives > 0 || at_bar;
            if is_alternation && operands == 0 {
                return Err(self.error(RegexSyntaxErrorKind::DanglingAlternation));
            }
            if is_alternation && operands > 1 {
                tokens.insert(0, PostfixToken::OpenGroup);
                tokens.push(PostfixToken::CloseGroup);
            }
            output.append(&mut tokens);
            if alternatives > 0 {
                output.push(PostfixToken::Alternation);
            }
            alternatives += 1;
            if !at_bar {
                break;
            }
            self.pos += 1;
        }
        Ok(output)
    }

    /// A sequence of operands with their postfix operators.
    /// Returns the tokens and the number of operands.
    fn concatenation(&mut self) -> NormalizeResult<(Vec<PostfixToken>, usize)> {
        let mut tokens = Vec::new();
        let mut operands = 0;
        while let Some(c) = self.peek() {
            if c == '|' || c == ')' {
                break;
            }
            self.operand(&mut tokens)?;
            self.postfix_operators(&mut tokens)?;
            operands += 1;
        }
        Ok((tokens, operands))
    }

    fn operand(&mut self, tokens: &mut Vec<PostfixToken>) -> NormalizeResult<()> {
        let start = self.pos;
        let Some(c) = self.next() else {
            return Err(self.error(RegexSyntaxErrorKind::EmptyRegex));
        };
        match c {
            '(' => {
                let mut inner = self.alternation()?;
                if self.next() != Some(')') {
                    return Err(RegexSyntaxError::new(
                        start,
                        RegexSyntaxErrorKind::UnbalancedDelimiter('('),
                    ));
                }
                if inner.is_empty() {
                    return Err(RegexSyntaxError::new(start, RegexSyntaxErrorKind::EmptyGroup));
                }
                tokens.push(PostfixToken::OpenGroup);
                tokens.append(&mut inner);
                tokens.push(PostfixToken::CloseGroup);
            }
            '[' => self.class(start, tokens)?,
            '\\' => tokens.push(PostfixToken::Char(self.escape(start)?)),
            '.' => tokens.push(PostfixToken::Any),
            // A comma has no meaning outside of braces.
            ',' => tokens.push(PostfixToken::Char(',')),
            ']' | '}' => {
                return Err(RegexSyntaxError::new(
                    start,
                    RegexSyntaxErrorKind::UnbalancedDelimiter(c),
                ))
            }
            '*' | '+' | '?' | '{' => {
                return Err(RegexSyntaxError::new(
                    start,
                    RegexSyntaxErrorKind::MissingOperand(c),
                ))
            }
            c if alphabet::is_operand(c) => tokens.push(PostfixToken::Char(c)),
            c => {
                return Err(RegexSyntaxError::new(
                    start,
                    RegexSyntaxErrorKind::UnknownCharacter(c),
                ))
            }
        }
        Ok(())
    }

    fn postfix_operators(&mut self, tokens: &mut Vec<PostfixToken>) -> NormalizeResult<()> {
        while let Some(c) = self.peek() {
            match c {
                '*' => tokens.push(PostfixToken::Star),
                '+' => tokens.push(PostfixToken::Plus),
                '?' => tokens.push(PostfixToken::Question),
                '{' => {
                    let repetition = self.repetition()?;
                    tokens.push(PostfixToken::Repeat(repetition));
                    continue;
                }
                _ => break,
            }
            self.pos += 1;
        }
        Ok(())
    }

    /// Resolves the escape whose backslash is at `start`.
    fn escape(&mut self, start: usize) -> NormalizeResult<char> {
        let target = self.next();
        target.and_then(alphabet::resolve_escape).ok_or_else(|| {
            RegexSyntaxError::new(start, RegexSyntaxErrorKind::InvalidEscape(target))
        })
    }

    /// The members of a bracket expression whose `[` is at `start`.
    fn class(&mut self, start: usize, tokens: &mut Vec<PostfixToken>) -> NormalizeResult<()> {
        let unbalanced =
            || RegexSyntaxError::new(start, RegexSyntaxErrorKind::UnbalancedDelimiter('['));
        let mut members = Vec::new();
        loop {
            let member_start = self.pos;
            let first = match self.next() {
                None => return Err(unbalanced()),
                Some(']') => break,
                Some('[') => {
                    return Err(RegexSyntaxError::new(
                        member_start,
                        RegexSyntaxErrorKind::UnbalancedDelimiter('['),
                    ))
                }
                Some('\\') => self.escape(member_start)?,
                Some(c) if alphabet::is_operand(c) || alphabet::is_operator(c) => c,
                Some(c) => {
                    return Err(RegexSyntaxError::new(
                        member_start,
                        RegexSyntaxErrorKind::UnknownCharacter(c),
                    ))
                }
            };
            let is_range = self.peek() == Some('-')
                && !matches!(self.chars.get(self.pos + 1), None | Some(']'));
            if !is_range {
                members.push(PostfixToken::Char(first));
                continue;
            }
            self.pos += 1;
            let last_start = self.pos;
            let last = match self.next() {
                Some('\\') => self.escape(last_start)?,
                Some(c) => c,
                None => return Err(unbalanced()),
            };
            if CharClass::range(first, last).is_none() {
                return Err(RegexSyntaxError::new(
                    member_start,
                    RegexSyntaxErrorKind::InvalidRange(first, last),
                ));
            }
            members.push(PostfixToken::Range(first, last));
        }
        if members.is_empty() {
            return Err(RegexSyntaxError::new(start, RegexSyntaxErrorKind::EmptyGroup));
        }
        tokens.push(PostfixToken::OpenClass);
        tokens.append(&mut members);
        tokens.push(PostfixToken::CloseClass);
        Ok(())
    }

    /// Parses `{n}`, `{n,}` or `{n,m}` starting at the opening brace.
    fn repetition(&mut self) -> NormalizeResult<Repetition> {
        let start = self.pos;
        self.pos += 1;
        let invalid = |message: &str| {
            RegexSyntaxError::new(
                start,
                RegexSyntaxErrorKind::InvalidRepetition(message.to_string()),
            )
        };
        let least = self
            .number()
            .ok_or_else(|| invalid("expected a count after '{'"))?;
        let repetition = match self.next() {
            Some('}') => Repetition::Exactly(least),
            Some(',') => match self.number() {
                None => match self.next() {
                    Some('}') => Repetition::AtLeast(least),
                    Some(_) => return Err(invalid("expected '}' after ','")),
                    None => {
                        return Err(RegexSyntaxError::new(
                            start,
                            RegexSyntaxErrorKind::UnbalancedDelimiter('{'),
                        ))
                    }
                },
                Some(most) => {
                    match self.next() {
                        Some('}') => {}
                        Some(_) => return Err(invalid("expected '}' after the upper bound")),
                        None => {
                            return Err(RegexSyntaxError::new(
                                start,
                                RegexSyntaxErrorKind::UnbalancedDelimiter('{'),
                            ))
                        }
                    }
                    if most < least {
                        return Err(invalid("the upper bound is less than the lower bound"));
                    }
                    Repetition::Bounded(least, most)
                }
            },
            Some(_) => return Err(invalid("expected ',' or '}' after the count")),
            None => {
                return Err(RegexSyntaxError::new(
                    start,
                    RegexSyntaxErrorKind::UnbalancedDelimiter('{'),
                ))
            }
        };
        let largest = match repetition {
            Repetition::Exactly(n) | Repetition::AtLeast(n) => n,
            Repetition::Bounded(_, m) => m,
        };
        if largest > MAX_REPETITION {
            return Err(invalid(&format!(
                "the count {} exceeds the limit of {}",
                largest, MAX_REPETITION
            )));
        }
        Ok(repetition)
    }

    fn number(&mut self) -> Option<usize> {
        let mut value: Option<usize> = None;
        while let Some(digit) = self.peek().and_then(|c| c.to_digit(10)) {
            value = Some(
                value
                    .unwrap_or(0)
                    .saturating_mul(10)
                    .saturating_add(digit as usize),
            );
            self.pos += 1;
        }
        value
    }
}
