//! The fixed alphabet the scanner generator recognizes.
//!
//! The alphabet consists of the printable ASCII characters plus line feed and tab. The
//! characters `( ) [ ] { } , * + ? | . \` are operators of the regex syntax and have to be
//! escaped to be matched literally. Line feed and tab are written as `\n` and `\t`.

use std::ops::RangeInclusive;

/// The operator characters of the regex syntax.
pub const OPERATORS: &[char] = &[
    '(', ')', '[', ']', '{', '}', ',', '*', '+', '?', '|', '.', '\\',
];

const PRINTABLE: RangeInclusive<char> = ' '..='~';

/// Returns true if the character is part of the alphabet.
#[inline]
pub fn contains(c: char) -> bool {
    c == '\n' || c == '\t' || PRINTABLE.contains(&c)
}

/// Returns true if the character is an operator of the regex syntax.
#[inline]
pub fn is_operator(c: char) -> bool {
    OPERATORS.contains(&c)
}

/// Returns true if the character stands for itself in a regex.
#[inline]
pub fn is_operand(c: char) -> bool {
    PRINTABLE.contains(&c) && !is_operator(c)
}

/// Resolves the character following a backslash.
///
/// Operators escape to themselves, `n` and `t` resolve to line feed and tab. Every other
/// character is no valid escape target.
pub fn resolve_escape(c: char) -> Option<char> {
    match c {
        'n' => Some('\n'),
        't' => Some('\t'),
        c if is_operator(c) => Some(c),
        _ => None,
    }
}

/// The characters matched by the wildcard `.`, i.e. all but the line break.
pub fn wildcard() -> impl Iterator<Item = char> {
    ('\0'..=*PRINTABLE.end()).filter(|c| *c != '\n' && contains(*c))
}

/// Renders a character the way it has to be written in a regex.
pub fn escape(c: char) -> String {
    match c {
        '\n' => "\\n".to_string(),
        '\t' => "\\t".to_string(),
        c if is_operator(c) => format!("\\{}", c),
        c => c.to_string(),
    }
}

/// The classes of characters that may form a range inside brackets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    /// `0-9`
    Digit,
    /// `A-Z`
    Upper,
    /// `a-z`
    Lower,
}

impl CharClass {
    /// Get the class of the character, if it has one.
    pub fn of(c: char) -> Option<CharClass> {
        match c {
            '0'..='9' => Some(CharClass::Digit),
            'A'..='Z' => Some(CharClass::Upper),
            'a'..='z' => Some(CharClass::Lower),
            _ => None,
        }
    }

    /// Validates the range `first-last`.
    ///
    /// Both ends must belong to the same class and must not be inverted.
    pub fn range(first: char, last: char) -> Option<RangeInclusive<char>> {
        match (CharClass::of(first), CharClass::of(last)) {
            (Some(a), Some(b)) if a == b && first <= last => Some(first..=last),
            _ => None,
        }
    }
}
