//! The compilation pipeline from a list of patterns to a tokenizer.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use log::{debug, trace};

use crate::{
    dfa::Dfa, normalizer::normalize, thompson::ThompsonBuilder, tokenizer::Tokenizer,
    LexGenError, LexGenErrorKind, Pattern, PatternID, Result,
};

/// Compile the patterns into a tokenizer.
///
/// The patterns are ordered by priority, patterns with equal priority keep their relative
/// order. The position of a pattern in this order is its id.
/// # Errors
/// Returns a `DuplicatePattern` error if two patterns share a name, and a `RegexSyntaxError`
/// naming the pattern if a regex is malformed.
pub fn compile(patterns: &[Pattern]) -> Result<Tokenizer> {
    let now = Instant::now();
    let mut names = BTreeSet::new();
    if let Some(duplicate) = patterns.iter().find(|p| !names.insert(p.name.as_str())) {
        return Err(LexGenError::new(LexGenErrorKind::DuplicatePattern(
            duplicate.name.clone(),
        )));
    }

    let mut patterns = patterns.to_vec();
    patterns.sort_by_key(|pattern| pattern.priority);

    let dfa = build_dfa(&patterns)?;

    // Patterns that share an accepting state with others need their own DFA to resolve the
    // token name.
    let shared: BTreeSet<PatternID> = dfa
        .accepting_states()
        .values()
        .filter(|pattern_ids| pattern_ids.len() > 1)
        .flatten()
        .copied()
        .collect();
    let disambiguators = shared
        .into_iter()
        .map(|pattern_id| Ok((pattern_id, compile_single(&patterns[pattern_id])?)))
        .collect::<Result<BTreeMap<_, _>>>()?;
    debug!(
        "Compiled {} patterns into a DFA with {} states, {} patterns need disambiguation.",
        patterns.len(),
        dfa.states().len(),
        disambiguators.len()
    );
    trace!("Compilation took {} milliseconds.", now.elapsed().as_millis());

    Ok(Tokenizer::new(patterns, dfa, disambiguators))
}

/// Compile a single pattern into its minimized DFA.
/// # Errors
/// Returns a `RegexSyntaxError` naming the pattern if its regex is malformed.
pub fn compile_single(pattern: &Pattern) -> Result<Dfa> {
    build_dfa(std::slice::from_ref(pattern))
}

// The patterns must be in priority order.
fn build_dfa(patterns: &[Pattern]) -> Result<Dfa> {
    let mut builder = ThompsonBuilder::new();
    let nfas = patterns
        .iter()
        .enumerate()
        .map(|(index, pattern)| {
            let postfix = normalize(&pattern.regex)
                .map_err(|error| LexGenError::from(error.with_pattern(&pattern.name)))?;
            builder.build(&postfix, PatternID::new(index))
        })
        .collect::<Result<Vec<_>>>()?;
    let nfa = builder.merge(nfas)?;
    Dfa::try_from(&nfa)?.minimize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegexSyntaxErrorKind;

    #[test]
    fn test_duplicate_names_are_rejected() {
        let patterns = Pattern::from_pairs([("a", "a"), ("b", "b"), ("a", "aa")]);
        let error = compile(&patterns).unwrap_err();
        assert!(matches!(
            error.kind(),
            LexGenErrorKind::DuplicatePattern(name) if name == "a"
        ));
    }

    #[test]
    fn test_syntax_errors_name_the_pattern() {
        let patterns = Pattern::from_pairs([("good", "a+"), ("bad", "(ab")]);
        let error = compile(&patterns).unwrap_err();
        match error.kind() {
            LexGenErrorKind::RegexSyntaxError(syntax_error) => {
                assert_eq!(syntax_error.pattern.as_deref(), Some("bad"));
                assert_eq!(syntax_error.position, 0);
                assert_eq!(
                    syntax_error.kind,
                    RegexSyntaxErrorKind::UnbalancedDelimiter('(')
                );
            }
            other => panic!("unexpected error {}", other),
        }
        assert!(error.to_string().contains("'bad'"));
    }

    #[test]
    fn test_patterns_are_ordered_by_priority() {
        let patterns = vec![
            Pattern::new("id", "[a-z]+", 1),
            Pattern::new("if", "if", 0),
        ];
        let tokenizer = compile(&patterns).unwrap();
        let names: Vec<&str> = tokenizer.patterns().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["if", "id"]);
        let tokens = tokenizer.scan("if").unwrap();
        assert_eq!(tokens, vec![crate::Token::new("if", "if")]);
    }

    #[test]
    fn test_compile_single() {
        let dfa = compile_single(&Pattern::new("hex", "0x[0-9a-f]{1,4}", 0)).unwrap();
        assert!(dfa.accepts("0x1f"));
        assert!(dfa.accepts("0xbeef"));
        assert!(!dfa.accepts("0x"));
        assert!(!dfa.accepts("0x12345"));
        assert_eq!(dfa.accepting_states().len(), 4);
    }
}
