#![forbid(missing_docs)]
//! The `lexgen` crate is a scanner generator.
//! It compiles a prioritized list of named regular expressions into a minimized DFA and splits
//! input text into tokens with it.
//!
//! The pipeline consists of the normalization of each regex to postfix form, the Thompson
//! construction of one NFA per pattern, the subset construction of a DFA from the merged NFA
//! and its minimization. The tokenizer applies the maximal munch rule and resolves
//! overlapping patterns by priority.
//!
//! ```
//! use lexgen::{compile, Pattern, Token};
//!
//! let patterns = Pattern::from_pairs([("if", "if"), ("id", "[a-z]+"), ("ws", " ")]);
//! let tokenizer = compile(&patterns).unwrap();
//! let tokens = tokenizer.scan("if ifx").unwrap();
//! assert_eq!(
//!     tokens,
//!     vec![
//!         Token::new("if", "if"),
//!         Token::new("ws", " "),
//!         Token::new("id", "ifx"),
//!     ]
//! );
//! ```

// Macros that simplify the rendering of dot files for test purposes.
// The files are written to `target/testout`.
#[cfg(test)]
macro_rules! nfa_render_to {
    ($nfa:expr, $label:expr) => {
        let label: &str = $label;
        std::fs::create_dir_all("target/testout").unwrap();
        let mut f = std::fs::File::create(format!("target/testout/{}.dot", label)).unwrap();
        $crate::dot::nfa_render($nfa, label, &mut f);
    };
}

#[cfg(test)]
macro_rules! dfa_render_to {
    ($dfa:expr, $label:expr) => {
        let label: &str = $label;
        std::fs::create_dir_all("target/testout").unwrap();
        let mut f = std::fs::File::create(format!("target/testout/{}.dot", label)).unwrap();
        $crate::dot::dfa_render($dfa, label, &mut f);
    };
}

/// The fixed alphabet and the operator characters of the regex syntax.
pub mod alphabet;

/// Module that provides the id types for states and patterns.
mod ids;
pub use ids::{PatternID, StateID};

/// Module with error definitions
mod errors;
pub use errors::{LexGenError, LexGenErrorKind, RegexSyntaxError, RegexSyntaxErrorKind, Result};

/// Module with the pattern and token records.
mod pattern;
pub use pattern::{Pattern, Token};

/// The normalizer rewrites a regex into postfix form.
mod normalizer;
pub use normalizer::{normalize, Postfix, PostfixToken, Repetition};

/// The nfa module contains the NFA types.
mod nfa;
pub use nfa::{EpsilonTransition, Nfa, NfaState, NfaTransition, PatternNfa};

/// The Thompson construction of NFAs from postfix regexes.
mod thompson;
pub use thompson::ThompsonBuilder;

/// Module that provides the DFA, its construction and minimization.
mod dfa;
pub use dfa::{Dfa, DfaState};

/// The tokenizer
mod tokenizer;
pub use tokenizer::{Tokenizer, Tokens};

/// The compilation pipeline
mod compiler;
pub use compiler::{compile, compile_single};

/// Parsing of lex definition texts
mod lex_file;
pub use lex_file::parse_lex_definitions;

/// Output of token sequences
mod writer;
pub use writer::write_tokens;

/// Module with conversion to graphviz dot format
mod dot;
pub use dot::{dfa_render, nfa_render};
