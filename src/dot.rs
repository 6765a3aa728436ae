//! The `dot` module contains the conversion of the automata to the graphviz dot format.

use std::io::Write;

use dot_writer::{Attributes, Color, DotWriter, RankDirection, Shape};
use itertools::Itertools;

use crate::{dfa::Dfa, nfa::Nfa, StateID};

fn node_name(state_id: StateID) -> String {
    format!("node_{}", state_id)
}

/// Render the merged NFA to the graphviz dot format.
/// Accepting states are labeled with the id of their pattern.
pub fn nfa_render<W: Write>(nfa: &Nfa, label: &str, output: &mut W) {
    let mut writer = DotWriter::from(output);
    writer.set_pretty_print(true);
    let mut digraph = writer.digraph();
    digraph
        .set_label(label)
        .set_rank_direction(RankDirection::LeftRight);
    // node_auto numbers the nodes in creation order, which is the order of the state ids.
    for state in nfa.states() {
        let mut source_node = digraph.node_auto();
        source_node.set_label(&state.id().to_string());
        if state.id() == nfa.start_state() {
            source_node
                .set_shape(Shape::Circle)
                .set_color(Color::Blue)
                .set_pen_width(3.0);
        }
        if let Some(pattern_id) = nfa.accepting_states().get(&state.id()) {
            source_node
                .set_color(Color::Red)
                .set_pen_width(3.0)
                .set_label(&format!("{}\n#{}", state.id(), pattern_id));
        }
    }
    for state in nfa.states() {
        for transition in state.transitions() {
            digraph
                .edge(
                    node_name(state.id()),
                    node_name(transition.target_state()),
                )
                .attributes()
                .set_label(&transition.ch().escape_default().to_string());
        }
        for epsilon_transition in state.epsilon_transitions() {
            digraph
                .edge(
                    node_name(state.id()),
                    node_name(epsilon_transition.target_state()),
                )
                .attributes()
                .set_label("ε");
        }
    }
}

/// Render a DFA to the graphviz dot format.
/// Accepting states are labeled with the ids of their patterns.
pub fn dfa_render<W: Write>(dfa: &Dfa, label: &str, output: &mut W) {
    let mut writer = DotWriter::from(output);
    writer.set_pretty_print(true);
    let mut digraph = writer.digraph();
    digraph
        .set_label(label)
        .set_rank_direction(RankDirection::LeftRight);
    // Render the states of the DFA
    for state in dfa.states() {
        let mut source_node = digraph.node_auto();
        source_node.set_label(&state.id().to_string());
        if state.id() == dfa.start_state() {
            source_node
                .set_shape(Shape::Circle)
                .set_color(Color::Blue)
                .set_pen_width(3.0);
        }
        let pattern_ids = dfa.patterns_of(state.id());
        if !pattern_ids.is_empty() {
            source_node
                .set_color(Color::Red)
                .set_pen_width(3.0)
                .set_label(&format!(
                    "{}\n{}",
                    state.id(),
                    pattern_ids.iter().map(|p| format!("#{}", p)).join(" ")
                ));
        }
    }
    // Render the transitions of the DFA
    for state in dfa.states() {
        for (ch, target_id) in state.transitions() {
            digraph
                .edge(node_name(state.id()), node_name(*target_id))
                .attributes()
                .set_label(&ch.escape_default().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compile, normalizer::normalize, thompson::ThompsonBuilder, Pattern, PatternID};

    #[test]
    fn test_render_nfa() {
        let mut builder = ThompsonBuilder::new();
        let nfa = builder
            .build(&normalize("a|b").unwrap(), PatternID::new(0))
            .unwrap();
        let nfa = builder.merge(vec![nfa]).unwrap();
        let mut output = Vec::new();
        nfa_render(&nfa, "a_or_b", &mut output);
        let dot = String::from_utf8(output).unwrap();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("a_or_b"));
        assert!(dot.contains("ε"));
        nfa_render_to!(&nfa, "a_or_b");
    }

    #[test]
    fn test_render_dfa() {
        let tokenizer = compile(&Pattern::from_pairs([("if", "if"), ("id", "[a-z]+")])).unwrap();
        let mut output = Vec::new();
        dfa_render(tokenizer.dfa(), "keyword_identifier", &mut output);
        let dot = String::from_utf8(output).unwrap();
        assert!(dot.contains("keyword_identifier"));
        assert!(dot.contains("#0 #1"));
        dfa_render_to!(tokenizer.dfa(), "keyword_identifier");
    }
}
