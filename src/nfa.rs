//! This module contains the NFA (Non-deterministic Finite Automaton) types.
//! A `PatternNfa` is the result of the Thompson construction for a single pattern. All
//! pattern NFAs of a compilation are merged into one `Nfa` which is later converted to a DFA
//! (Deterministic Finite Automaton) by the subset construction.

use std::collections::{BTreeMap, BTreeSet};

use crate::{PatternID, StateID};

/// A state of an NFA together with its outgoing edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NfaState {
    state: StateID,
    epsilon_transitions: Vec<EpsilonTransition>,
    transitions: Vec<NfaTransition>,
}

impl NfaState {
    pub(crate) fn new(state: StateID) -> Self {
        Self {
            state,
            epsilon_transitions: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Get the id of the state.
    pub fn id(&self) -> StateID {
        self.state
    }

    /// Get the edges labeled with a character.
    pub fn transitions(&self) -> &[NfaTransition] {
        &self.transitions
    }

    /// Get the epsilon edges.
    pub fn epsilon_transitions(&self) -> &[EpsilonTransition] {
        &self.epsilon_transitions
    }

    pub(crate) fn add_transition(&mut self, ch: char, target_state: StateID) {
        self.transitions.push(NfaTransition { ch, target_state });
    }

    pub(crate) fn add_epsilon_transition(&mut self, target_state: StateID) {
        self.epsilon_transitions
            .push(EpsilonTransition { target_state });
    }

    /// Copy of this state with the given id and all targets mapped through `map`.
    pub(crate) fn remapped<F>(&self, id: StateID, map: F) -> Self
    where
        F: Fn(StateID) -> StateID,
    {
        NfaState {
            state: id,
            epsilon_transitions: self
                .epsilon_transitions
                .iter()
                .map(|e| EpsilonTransition {
                    target_state: map(e.target_state),
                })
                .collect(),
            transitions: self
                .transitions
                .iter()
                .map(|t| NfaTransition {
                    ch: t.ch,
                    target_state: map(t.target_state),
                })
                .collect(),
        }
    }
}

/// An edge labeled with a character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfaTransition {
    ch: char,
    target_state: StateID,
}

impl NfaTransition {
    /// The character that labels the edge.
    pub fn ch(&self) -> char {
        self.ch
    }

    /// The next state to transition to.
    pub fn target_state(&self) -> StateID {
        self.target_state
    }
}

/// An edge labeled with ε.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpsilonTransition {
    target_state: StateID,
}

impl EpsilonTransition {
    /// The next state to transition to.
    pub fn target_state(&self) -> StateID {
        self.target_state
    }
}

/// The NFA of a single pattern as produced by the Thompson construction.
///
/// The state ids are unique within the compilation the NFA belongs to. They form the
/// contiguous range starting at the id of the first state. The NFA has exactly one accepting
/// state.
#[derive(Debug, Clone)]
pub struct PatternNfa {
    pub(crate) pattern: PatternID,
    pub(crate) states: Vec<NfaState>,
    pub(crate) start_state: StateID,
    pub(crate) accept_state: StateID,
    pub(crate) alphabet: BTreeSet<char>,
}

impl PatternNfa {
    /// Get the pattern the NFA recognizes.
    pub fn pattern(&self) -> PatternID {
        self.pattern
    }

    /// Get the states.
    pub fn states(&self) -> &[NfaState] {
        &self.states
    }

    /// Get the start state.
    pub fn start_state(&self) -> StateID {
        self.start_state
    }

    /// Get the accepting states along with the pattern they accept.
    pub fn accepting_states(&self) -> BTreeMap<StateID, PatternID> {
        BTreeMap::from([(self.accept_state, self.pattern)])
    }

    /// Get the characters used on the edges.
    pub fn alphabet(&self) -> &BTreeSet<char> {
        &self.alphabet
    }

    /// Returns true if the NFA matches the whole input.
    pub fn matches(&self, input: &str) -> bool {
        let offset = self.states.first().map_or(0, |s| s.id().as_usize());
        simulate(
            move |id| &self.states[id.as_usize() - offset],
            self.start_state,
            input,
        )
        .contains(&self.accept_state)
    }
}

/// The NFA that recognizes all patterns of a compilation.
/// The start state is always the first state in the vector, i.e. state 0, and has an epsilon
/// edge to the start state of each pattern NFA.
#[derive(Debug, Clone, Default)]
pub struct Nfa {
    pub(crate) states: Vec<NfaState>,
    pub(crate) accepting_states: BTreeMap<StateID, PatternID>,
    pub(crate) alphabet: BTreeSet<char>,
}

impl Nfa {
    /// Get the states.
    pub fn states(&self) -> &[NfaState] {
        &self.states
    }

    /// Get the start state.
    pub fn start_state(&self) -> StateID {
        StateID::default()
    }

    /// Get the accepting states along with the pattern they accept.
    pub fn accepting_states(&self) -> &BTreeMap<StateID, PatternID> {
        &self.accepting_states
    }

    /// Get the characters used on the edges.
    pub fn alphabet(&self) -> &BTreeSet<char> {
        &self.alphabet
    }

    /// Calculate the epsilon closure of a state.
    pub fn epsilon_closure(&self, state: StateID) -> Vec<StateID> {
        self.epsilon_closure_set([state])
    }

    /// Calculate the epsilon closure of a set of states.
    /// The result is sorted and free of duplicates.
    pub fn epsilon_closure_set<I>(&self, states: I) -> Vec<StateID>
    where
        I: IntoIterator<Item = StateID>,
    {
        epsilon_closure(move |id| &self.states[id], states)
            .into_iter()
            .collect()
    }

    /// Calculate the set of states reachable from the given states by the character.
    pub fn move_set(&self, states: &[StateID], ch: char) -> Vec<StateID> {
        let mut target_states: Vec<StateID> = states
            .iter()
            .flat_map(|state| self.states[*state].transitions())
            .filter(|transition| transition.ch() == ch)
            .map(|transition| transition.target_state())
            .collect();
        target_states.sort_unstable();
        target_states.dedup();
        target_states
    }

    /// Get the patterns whose matches the NFA accepts for the whole input.
    pub fn matching_patterns(&self, input: &str) -> BTreeSet<PatternID> {
        simulate(move |id| &self.states[id], self.start_state(), input)
            .iter()
            .filter_map(|state| self.accepting_states.get(state).copied())
            .collect()
    }
}

fn epsilon_closure<'a, F, I>(state: F, states: I) -> BTreeSet<StateID>
where
    F: Fn(StateID) -> &'a NfaState,
    I: IntoIterator<Item = StateID>,
{
    let mut closure = BTreeSet::new();
    let mut work_list: Vec<StateID> = states.into_iter().collect();
    while let Some(id) = work_list.pop() {
        if closure.insert(id) {
            work_list.extend(
                state(id)
                    .epsilon_transitions()
                    .iter()
                    .map(|e| e.target_state()),
            );
        }
    }
    closure
}

// Set simulation of an NFA. Returns the states reached after consuming the whole input.
fn simulate<'a, F>(state: F, start_state: StateID, input: &str) -> BTreeSet<StateID>
where
    F: Fn(StateID) -> &'a NfaState + Copy,
{
    let mut current = epsilon_closure(state, [start_state]);
    for ch in input.chars() {
        let moved = current
            .iter()
            .flat_map(|id| state(*id).transitions())
            .filter(|transition| transition.ch() == ch)
            .map(|transition| transition.target_state())
            .collect::<Vec<_>>();
        current = epsilon_closure(state, moved);
        if current.is_empty() {
            break;
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    // 0 -ε-> 1 -a-> 2 -ε-> 3, 2 -ε-> 1
    fn a_plus() -> Nfa {
        let mut states: Vec<NfaState> = (0..4).map(|i| NfaState::new(StateID::new(i))).collect();
        states[0].add_epsilon_transition(StateID::new(1));
        states[1].add_transition('a', StateID::new(2));
        states[2].add_epsilon_transition(StateID::new(3));
        states[2].add_epsilon_transition(StateID::new(1));
        Nfa {
            states,
            accepting_states: BTreeMap::from([(StateID::new(3), PatternID::new(0))]),
            alphabet: BTreeSet::from(['a']),
        }
    }

    #[test]
    fn test_epsilon_closure() {
        let nfa = a_plus();
        assert_eq!(
            nfa.epsilon_closure(StateID::new(0)),
            vec![StateID::new(0), StateID::new(1)]
        );
        assert_eq!(
            nfa.epsilon_closure(StateID::new(2)),
            vec![StateID::new(1), StateID::new(2), StateID::new(3)]
        );
    }

    #[test]
    fn test_move_set() {
        let nfa = a_plus();
        assert_eq!(
            nfa.move_set(&[StateID::new(0), StateID::new(1)], 'a'),
            vec![StateID::new(2)]
        );
        assert!(nfa.move_set(&[StateID::new(0)], 'a').is_empty());
        assert!(nfa.move_set(&[StateID::new(1)], 'b').is_empty());
    }

    #[test]
    fn test_matching_patterns() {
        let nfa = a_plus();
        assert!(nfa.matching_patterns("").is_empty());
        assert_eq!(
            nfa.matching_patterns("aaa"),
            BTreeSet::from([PatternID::new(0)])
        );
        assert!(nfa.matching_patterns("ab").is_empty());
    }
}
