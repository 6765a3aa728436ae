//! This module contains the tokenizer that splits an input into tokens with the minimized DFA
//! of a compilation.
//!
//! The tokenizer follows the maximal munch rule: a token is extended as long as the DFA has a
//! transition for the next character. When the DFA gets stuck in an accepting state the token
//! ends and the character is scanned again from the start state. Getting stuck in a
//! non-accepting state, or reaching the end of the input in one, is an error.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::trace;

use crate::{dfa::Dfa, LexGenError, LexGenErrorKind, Pattern, PatternID, Result, StateID, Token};

/// The tokenizer of a compiled set of patterns.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    // The patterns, indexed by their id.
    patterns: Vec<Pattern>,
    // The minimized DFA of all patterns.
    dfa: Dfa,
    // The single-pattern DFAs of the patterns that share an accepting state with other
    // patterns.
    disambiguators: BTreeMap<PatternID, Dfa>,
}

impl Tokenizer {
    pub(crate) fn new(
        patterns: Vec<Pattern>,
        dfa: Dfa,
        disambiguators: BTreeMap<PatternID, Dfa>,
    ) -> Self {
        Tokenizer {
            patterns,
            dfa,
            disambiguators,
        }
    }

    /// Get the patterns in priority order. The position of a pattern is its id.
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Get the minimized DFA.
    pub fn dfa(&self) -> &Dfa {
        &self.dfa
    }

    /// Split the whole input into tokens.
    /// # Errors
    /// An `UnmatchedInputError` is returned if a part of the input is not matched by any
    /// pattern.
    pub fn scan(&self, input: &str) -> Result<Vec<Token>> {
        self.tokens(input).collect()
    }

    /// Returns an iterator over the tokens of the input.
    /// The iterator stops after the first error.
    pub fn tokens(&self, input: &str) -> Tokens<'_> {
        Tokens {
            tokenizer: self,
            input: input.chars().collect(),
            pos: 0,
            failed: false,
        }
    }

    /// Find the longest token starting at `start`.
    /// Returns the token and the position behind it.
    fn next_token(&self, input: &[char], start: usize) -> Result<(Token, usize)> {
        let mut state = self.dfa.start_state();
        let mut pos = start;
        while let Some(next_state) = input
            .get(pos)
            .and_then(|ch| self.dfa.next_state(state, *ch))
        {
            state = next_state;
            pos += 1;
        }

        // An accepting start state would yield an empty token.
        if pos == start || !self.dfa.is_accepting(state) {
            return Err(LexGenError::new(LexGenErrorKind::UnmatchedInputError {
                position: pos,
                buffer: input[start..pos].iter().collect(),
            }));
        }
        let value: String = input[start..pos].iter().collect();
        let pattern_id = self.resolve(state, &value)?;
        let token = Token::new(self.patterns[pattern_id].name.clone(), value);
        trace!("Token {} at {}..{}", token, start, pos);
        Ok((token, pos))
    }

    /// Select the pattern of a token that ended in the given accepting state.
    ///
    /// If the state accepts more than one pattern the first one, in priority order, whose own
    /// DFA accepts the whole token wins. If there is none, the highest priority pattern is
    /// used.
    fn resolve(&self, state: StateID, value: &str) -> Result<PatternID> {
        let candidates = self.dfa.patterns_of(state);
        let highest = candidates.first().copied().ok_or_else(|| {
            LexGenError::new(LexGenErrorKind::InternalBuildError(format!(
                "accepting state {} has no pattern",
                state
            )))
        })?;
        if candidates.len() == 1 {
            return Ok(highest);
        }
        let selected = candidates
            .iter()
            .copied()
            .find(|pattern_id| {
                self.disambiguators
                    .get(pattern_id)
                    .is_some_and(|dfa| dfa.accepts(value))
            })
            .unwrap_or(highest);
        trace!(
            "'{}' is matched by {}, selected {}",
            value.escape_default(),
            candidates
                .iter()
                .map(|p| self.patterns[*p].name.as_str())
                .join(", "),
            self.patterns[selected].name
        );
        Ok(selected)
    }
}

/// An iterator over the tokens of an input, created by [`Tokenizer::tokens`].
#[derive(Debug)]
pub struct Tokens<'a> {
    tokenizer: &'a Tokenizer,
    input: Vec<char>,
    pos: usize,
    failed: bool,
}

impl Iterator for Tokens<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.input.len() {
            return None;
        }
        match self.tokenizer.next_token(&self.input, self.pos) {
            Ok((token, end)) => {
                self.pos = end;
                Some(Ok(token))
            }
            Err(error) => {
                self.failed = true;
                Some(Err(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;

    // Initialize the logger for the tests
    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn tokenizer(pairs: &[(&str, &str)]) -> Tokenizer {
        compile(&Pattern::from_pairs(pairs.iter().copied())).unwrap()
    }

    fn tokens(pairs: &[(&str, &str)], input: &str) -> Vec<(String, String)> {
        tokenizer(pairs)
            .scan(input)
            .unwrap()
            .into_iter()
            .map(|t| (t.name, t.value))
            .collect()
    }

    fn expected(tokens: &[(&str, &str)]) -> Vec<(String, String)> {
        tokens
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    fn unmatched(pairs: &[(&str, &str)], input: &str) -> (usize, String) {
        let error = tokenizer(pairs).scan(input).unwrap_err();
        match *error.source {
            LexGenErrorKind::UnmatchedInputError { position, buffer } => (position, buffer),
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn test_maximal_munch() {
        init();
        assert_eq!(
            tokens(&[("aLoop", "a*")], "aaaaaaaaaa"),
            expected(&[("aLoop", "aaaaaaaaaa")])
        );
    }

    #[test]
    fn test_consecutive_keywords() {
        init();
        assert_eq!(
            tokens(&[("if", "if"), ("else", "else")], "ifelse"),
            expected(&[("if", "if"), ("else", "else")])
        );
    }

    #[test]
    fn test_bounded_repetition() {
        init();
        let patterns = &[("a3to5", "a{3,5}")];
        for input in ["aaa", "aaaa", "aaaaa"] {
            assert_eq!(tokens(patterns, input), expected(&[("a3to5", input)]));
        }
        assert_eq!(unmatched(patterns, "aa"), (2, "aa".to_string()));

        // The first five characters form a token, the last one is left over.
        let tokenizer = tokenizer(patterns);
        let mut iter = tokenizer.tokens("aaaaaa");
        assert_eq!(iter.next().unwrap().unwrap(), Token::new("a3to5", "aaaaa"));
        let error = iter.next().unwrap().unwrap_err();
        assert!(matches!(
            error.kind(),
            LexGenErrorKind::UnmatchedInputError { position: 6, buffer } if buffer == "a"
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_character_class() {
        init();
        let patterns = &[("abc", "[a-c]+")];
        assert_eq!(tokens(patterns, "abcabc"), expected(&[("abc", "abcabc")]));
        assert_eq!(unmatched(patterns, "d"), (0, String::new()));
    }

    #[test]
    fn test_unmatched_character_position() {
        init();
        let patterns = &[("word", "[a-z]+"), ("space", " ")];
        assert_eq!(unmatched(patterns, "ab cd#ef"), (5, String::new()));
        assert_eq!(unmatched(patterns, "ab\ncd"), (2, String::new()));
    }

    #[test]
    fn test_keyword_and_identifier() {
        init();
        let patterns = &[("if", "if"), ("id", "[a-z]+"), ("ws", " ")];
        let tokenizer = tokenizer(patterns);
        // Only the patterns sharing an accepting state need their own DFA.
        assert_eq!(
            tokenizer.disambiguators.keys().copied().collect::<Vec<_>>(),
            vec![PatternID::new(0), PatternID::new(1)]
        );
        assert_eq!(
            tokens(patterns, "if ifx i"),
            expected(&[
                ("if", "if"),
                ("ws", " "),
                ("id", "ifx"),
                ("ws", " "),
                ("id", "i"),
            ])
        );
    }

    #[test]
    fn test_priority_decides_between_equal_matches() {
        init();
        assert_eq!(
            tokens(&[("id", "[a-z]+"), ("if", "if")], "if"),
            expected(&[("id", "if")])
        );
    }

    #[test]
    fn test_stuck_in_non_accepting_state() {
        init();
        let patterns = &[("ab", "ab"), ("abcd", "abcd"), ("c", "c")];
        // After "abc" only a 'd' continues the token, "ab" is not given back.
        assert_eq!(unmatched(patterns, "abcabcd"), (3, "abc".to_string()));
        assert_eq!(unmatched(patterns, "abc"), (3, "abc".to_string()));
        assert_eq!(
            tokens(patterns, "abcdcab"),
            expected(&[("abcd", "abcd"), ("c", "c"), ("ab", "ab")])
        );
    }

    #[test]
    fn test_no_empty_tokens() {
        init();
        let patterns = &[("aLoop", "a*"), ("b", "b")];
        assert_eq!(
            tokens(patterns, "aab"),
            expected(&[("aLoop", "aa"), ("b", "b")])
        );
        assert_eq!(unmatched(patterns, "aac"), (2, String::new()));
    }

    #[test]
    fn test_line_breaks_and_tabs() {
        init();
        let patterns = &[("num", "[0-9]+"), ("nl", "\\n"), ("tab", "\\t")];
        assert_eq!(
            tokens(patterns, "12\n3\t4"),
            expected(&[
                ("num", "12"),
                ("nl", "\n"),
                ("num", "3"),
                ("tab", "\t"),
                ("num", "4"),
            ])
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenizer(&[("a", "a")]).scan("").unwrap().is_empty());
    }
}
